//! Builders for small compiled units and distance files used by tests and benchmarks.

use std::io::Write;

use tempfile::NamedTempFile;

use crate::ir::{BasicBlock, DebugLoc, Function, GlobalVariable, Instruction, Module, Op};

/// Writes `content` to a temporary distance file, deleted when the handle is dropped.
pub fn distance_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("failed to create distance file");
    file.write_all(content.as_bytes())
        .expect("failed to write distance file");
    file
}

/// A block with a call located at `filename:line`, followed by a return.
pub fn block_at(label: &str, filename: &str, line: u32) -> BasicBlock {
    BasicBlock::new(
        label,
        vec![
            Instruction::new(Op::Call {
                ty: crate::ir::Type::Void,
                callee: "work".into(),
                args: vec![],
            })
            .at(DebugLoc::new(filename, line)),
            Instruction::new(Op::Ret { value: None }),
        ],
    )
}

/// A block without any debug location.
pub fn unlocated_block(label: &str) -> BasicBlock {
    BasicBlock::new(label, vec![Instruction::new(Op::Unreachable)])
}

#[derive(Debug)]
pub struct UnitBuilder {
    module: Module,
}

impl UnitBuilder {
    pub fn new(source_file_name: &str) -> Self {
        Self {
            module: Module::new(source_file_name),
        }
    }

    pub fn function(mut self, name: &str, blocks: Vec<BasicBlock>) -> Self {
        self.module.functions.push(Function::new(name, blocks));
        self
    }

    pub fn global(mut self, global: GlobalVariable) -> Self {
        self.module.globals.push(global);
        self
    }

    pub fn build(self) -> Module {
        self.module
    }
}

/// A unit with `functions` functions of `blocks` blocks each, located on consecutive lines of
/// `filename`.
pub fn synthetic_unit(filename: &str, functions: usize, blocks: usize) -> Module {
    (0..functions)
        .fold(UnitBuilder::new(filename), |builder, f| {
            let body = (0..blocks)
                .map(|b| {
                    let line = (f * blocks + b + 1) as u32;
                    block_at(&format!("bb{b}"), filename, line)
                })
                .collect();
            builder.function(&format!("f{f}"), body)
        })
        .build()
}
