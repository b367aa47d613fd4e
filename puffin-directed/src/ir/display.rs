use std::fmt;

use itertools::Itertools;

use super::{
    BasicBlock, ConstantInt, DebugLoc, Function, GlobalVariable, Instruction, Linkage, Module, Op,
    Operand, Type,
};

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Void => write!(f, "void"),
            Type::Int(bits) => write!(f, "i{bits}"),
            Type::Ptr => write!(f, "ptr"),
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Local(name) => write!(f, "%{name}"),
            Operand::Global(name) => write!(f, "@{name}"),
            Operand::ConstInt { value, .. } => write!(f, "{value}"),
        }
    }
}

impl fmt::Display for DebugLoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.filename, self.line, self.column)?;
        if let Some(site) = &self.inlined_at {
            write!(f, " @[ {site} ]")?;
        }
        Ok(())
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Op::Phi { ty, incoming } => write!(
                f,
                "phi {ty} {}",
                incoming
                    .iter()
                    .map(|(value, label)| format!("[ {value}, %{label} ]"))
                    .join(", ")
            ),
            Op::Alloca { ty } => write!(f, "alloca {ty}"),
            Op::LandingPad { ty } => write!(f, "landingpad {ty}"),
            Op::CleanupPad => write!(f, "cleanuppad"),
            Op::CatchPad => write!(f, "catchpad"),
            Op::CatchSwitch { handlers } => write!(
                f,
                "catchswitch [{}]",
                handlers.iter().map(|h| format!("label %{h}")).join(", ")
            ),
            Op::Load { ty, ptr } => write!(f, "load {ty}, ptr {ptr}"),
            Op::Store { ty, value, ptr } => write!(f, "store {ty} {value}, ptr {ptr}"),
            Op::Add { ty, lhs, rhs } => write!(f, "add {ty} {lhs}, {rhs}"),
            Op::Call { ty, callee, args } => write!(
                f,
                "call {ty} @{callee}({})",
                args.iter().map(|arg| arg.to_string()).join(", ")
            ),
            Op::Br { dest } => write!(f, "br label %{dest}"),
            Op::CondBr {
                cond,
                then_dest,
                else_dest,
            } => write!(f, "br i1 {cond}, label %{then_dest}, label %{else_dest}"),
            Op::Ret { value: Some(value) } => write!(f, "ret {value}"),
            Op::Ret { value: None } => write!(f, "ret void"),
            Op::Unreachable => write!(f, "unreachable"),
            Op::Other { text } => write!(f, "{text}"),
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(result) = &self.result {
            write!(f, "%{result} = ")?;
        }
        write!(f, "{}", self.op)?;
        if let Some(loc) = &self.debug_loc {
            write!(f, ", !dbg {loc}")?;
        }
        Ok(())
    }
}

impl fmt::Display for BasicBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}:", self.label)?;
        for inst in &self.instructions {
            writeln!(f, "  {inst}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_declaration() {
            return writeln!(f, "declare @{}()", self.name);
        }

        writeln!(f, "define @{}() {{", self.name)?;
        for (i, block) in self.blocks.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{block}")?;
        }
        writeln!(f, "}}")
    }
}

impl fmt::Display for Linkage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keyword = match self {
            Linkage::External => "external",
            Linkage::Internal => "internal",
            Linkage::Private => "private",
            Linkage::Weak => "weak",
            Linkage::LinkOnce => "linkonce",
            Linkage::Common => "common",
        };
        write!(f, "{keyword}")
    }
}

impl fmt::Display for GlobalVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.constant { "constant" } else { "global" };
        match (&self.initializer, self.linkage) {
            (Some(ConstantInt { value, .. }), Linkage::External) => {
                write!(f, "@{} = {kind} {} {value}", self.name, self.ty)
            }
            (Some(ConstantInt { value, .. }), linkage) => {
                write!(f, "@{} = {linkage} {kind} {} {value}", self.name, self.ty)
            }
            (None, linkage) => write!(f, "@{} = {linkage} {kind} {}", self.name, self.ty),
        }
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "; ModuleID = '{}'", self.name)?;
        writeln!(f, "source_filename = \"{}\"", self.source_file_name)?;

        if !self.globals.is_empty() {
            writeln!(f)?;
        }
        for global in &self.globals {
            writeln!(f, "{global}")?;
        }

        for function in &self.functions {
            writeln!(f)?;
            write!(f, "{function}")?;
        }
        Ok(())
    }
}
