//! Owned model of the compiler intermediate representation the pass operates on.
//!
//! A [`Module`] is one compiled unit: a list of [`GlobalVariable`]s and [`Function`]s, each
//! function a list of [`BasicBlock`]s made of [`Instruction`]s. Instructions optionally carry a
//! [`DebugLoc`] attached by the frontend. Units are exchanged as JSON and can be printed in a
//! textual form through [`std::fmt::Display`].

mod display;

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Type {
    Void,
    Int(u32),
    Ptr,
}

impl Type {
    pub const I64: Type = Type::Int(64);
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Linkage {
    #[default]
    External,
    Internal,
    Private,
    Weak,
    LinkOnce,
    Common,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstantInt {
    pub ty: Type,
    pub value: i64,
}

impl ConstantInt {
    pub fn null(ty: Type) -> Self {
        Self { ty, value: 0 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalVariable {
    pub name: String,
    pub ty: Type,
    #[serde(default)]
    pub linkage: Linkage,
    #[serde(default)]
    pub constant: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initializer: Option<ConstantInt>,
}

impl GlobalVariable {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
            linkage: Linkage::External,
            constant: false,
            initializer: None,
        }
    }

    /// A global without initializer only references a definition provided by another unit.
    pub fn is_declaration(&self) -> bool {
        self.initializer.is_none()
    }
}

/// Source location attached to an instruction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DebugLoc {
    pub filename: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub directory: String,
    pub line: u32,
    #[serde(default)]
    pub column: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inlined_at: Option<Box<DebugLoc>>,
}

impl DebugLoc {
    pub fn new(filename: impl Into<String>, line: u32) -> Self {
        Self {
            filename: filename.into(),
            directory: String::new(),
            line,
            column: 0,
            inlined_at: None,
        }
    }

    pub fn inlined_at(mut self, site: DebugLoc) -> Self {
        self.inlined_at = Some(Box::new(site));
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operand {
    Local(String),
    Global(String),
    ConstInt { ty: Type, value: i64 },
}

impl Operand {
    pub fn local(name: impl Into<String>) -> Self {
        Operand::Local(name.into())
    }

    pub fn global(name: impl Into<String>) -> Self {
        Operand::Global(name.into())
    }

    pub fn i64(value: i64) -> Self {
        Operand::ConstInt {
            ty: Type::I64,
            value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Op {
    Phi {
        ty: Type,
        incoming: Vec<(Operand, String)>,
    },
    Alloca {
        ty: Type,
    },
    LandingPad {
        ty: Type,
    },
    CleanupPad,
    CatchPad,
    CatchSwitch {
        handlers: Vec<String>,
    },
    Load {
        ty: Type,
        ptr: Operand,
    },
    Store {
        ty: Type,
        value: Operand,
        ptr: Operand,
    },
    Add {
        ty: Type,
        lhs: Operand,
        rhs: Operand,
    },
    Call {
        ty: Type,
        callee: String,
        #[serde(default)]
        args: Vec<Operand>,
    },
    Br {
        dest: String,
    },
    CondBr {
        cond: Operand,
        then_dest: String,
        else_dest: String,
    },
    Ret {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<Operand>,
    },
    Unreachable,
    /// Any instruction the pass does not need to understand, kept verbatim.
    Other {
        text: String,
    },
}

impl Op {
    pub fn is_phi(&self) -> bool {
        matches!(self, Op::Phi { .. })
    }

    pub fn is_eh_pad(&self) -> bool {
        matches!(
            self,
            Op::LandingPad { .. } | Op::CleanupPad | Op::CatchPad | Op::CatchSwitch { .. }
        )
    }

    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Op::Br { .. }
                | Op::CondBr { .. }
                | Op::Ret { .. }
                | Op::Unreachable
                | Op::CatchSwitch { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(flatten)]
    pub op: Op,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug_loc: Option<DebugLoc>,
}

impl Instruction {
    pub fn new(op: Op) -> Self {
        Self {
            result: None,
            op,
            debug_loc: None,
        }
    }

    pub fn named(result: impl Into<String>, op: Op) -> Self {
        Self {
            result: Some(result.into()),
            op,
            debug_loc: None,
        }
    }

    pub fn at(mut self, loc: DebugLoc) -> Self {
        self.debug_loc = Some(loc);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicBlock {
    pub label: String,
    #[serde(default)]
    pub instructions: Vec<Instruction>,
}

impl BasicBlock {
    pub fn new(label: impl Into<String>, instructions: Vec<Instruction>) -> Self {
        Self {
            label: label.into(),
            instructions,
        }
    }

    /// Index of the earliest position at which ordinary instructions may be inserted.
    ///
    /// Leading PHI nodes, exception-handling pads and stack allocations have to stay at the top
    /// of the block and are skipped. Returns `None` for blocks that cannot host new instructions
    /// at all (a catch switch is both pad and terminator).
    pub fn first_insertion_point(&self) -> Option<usize> {
        let index = self
            .instructions
            .iter()
            .position(|inst| {
                !inst.op.is_phi() && !inst.op.is_eh_pad() && !matches!(inst.op, Op::Alloca { .. })
            })
            .unwrap_or(self.instructions.len());

        match self.instructions.get(index) {
            None if self
                .instructions
                .last()
                .is_some_and(|inst| inst.op.is_terminator()) =>
            {
                None
            }
            _ => Some(index),
        }
    }

    pub fn insert(&mut self, index: usize, instructions: impl IntoIterator<Item = Instruction>) {
        self.instructions.splice(index..index, instructions);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    #[serde(default)]
    pub blocks: Vec<BasicBlock>,
}

impl Function {
    pub fn new(name: impl Into<String>, blocks: Vec<BasicBlock>) -> Self {
        Self {
            name: name.into(),
            blocks,
        }
    }

    /// A function without a body is an external declaration.
    pub fn is_declaration(&self) -> bool {
        self.blocks.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    pub name: String,
    #[serde(default)]
    pub source_file_name: String,
    #[serde(default)]
    pub globals: Vec<GlobalVariable>,
    #[serde(default)]
    pub functions: Vec<Function>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            source_file_name: name.clone(),
            name,
            globals: vec![],
            functions: vec![],
        }
    }

    /// Functions are found whether they are defined or only declared in this unit.
    pub fn get_function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn get_named_global(&self, name: &str) -> Option<&GlobalVariable> {
        self.globals.iter().find(|g| g.name == name)
    }

    /// Returns the global called `name`, declaring it as an external `ty` if it does not exist.
    pub fn get_or_insert_global(&mut self, name: &str, ty: Type) -> &mut GlobalVariable {
        let index = match self.globals.iter().position(|g| g.name == name) {
            Some(index) => index,
            None => {
                self.globals.push(GlobalVariable::new(name, ty));
                self.globals.len() - 1
            }
        };
        &mut self.globals[index]
    }
}

/// Hands out SSA names for injected values which do not clash with names in a function.
///
/// Block labels and instruction results share one namespace.
#[derive(Debug)]
pub struct ValueNamer {
    used: HashSet<String>,
    next: usize,
}

impl ValueNamer {
    const PREFIX: &'static str = "dfuzz.";

    pub fn for_function(function: &Function) -> Self {
        let used = function
            .blocks
            .iter()
            .flat_map(|block| {
                block
                    .instructions
                    .iter()
                    .filter_map(|inst| inst.result.clone())
                    .chain(std::iter::once(block.label.clone()))
            })
            .collect();
        Self { used, next: 0 }
    }

    pub fn fresh(&mut self) -> String {
        loop {
            let name = format!("{}{}", Self::PREFIX, self.next);
            self.next += 1;
            if self.used.insert(name.clone()) {
                return name;
            }
        }
    }
}
