//! Textual listing of programs for diagnostics.
//!
//! The format is meant for humans reading test failures and event logs; it is
//! not parsed back.

use std::fmt;

use crate::{
    ir::{BasicBlock, Instruction, Phi, Program, TryCatch, VarId},
    utils::escape_dot,
};

fn write_list(f: &mut fmt::Formatter<'_>, vars: &[VarId]) -> fmt::Result {
    for (position, var) in vars.iter().enumerate() {
        if position > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{var}")?;
    }
    Ok(())
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nop => f.write_str("nop"),
            Self::Const { dest, value } => write!(f, "{dest} := {value}"),
            Self::Null { dest } => write!(f, "{dest} := null"),
            Self::Copy { dest, src } => write!(f, "{dest} := {src}"),
            Self::Binary {
                dest,
                op,
                left,
                right,
            } => write!(f, "{dest} := {left} {op} {right}"),
            Self::Neg { dest, operand } => write!(f, "{dest} := -{operand}"),
            Self::NewArray {
                dest,
                element,
                size,
            } => write!(f, "{dest} := new {element}[{size}]"),
            Self::UnwrapArray {
                dest,
                array,
                element,
            } => write!(f, "{dest} := {array}.data as {element}[]"),
            Self::LoadElement { dest, array, index } => write!(f, "{dest} := {array}[{index}]"),
            Self::StoreElement {
                array,
                index,
                value,
            } => write!(f, "{array}[{index}] := {value}"),
            Self::ArrayLength { dest, array } => write!(f, "{dest} := {array}.length"),
            Self::Invoke {
                dest,
                instance,
                method,
                arguments,
                kind,
            } => {
                if let Some(dest) = dest {
                    write!(f, "{dest} := ")?;
                }
                write!(f, "invoke{kind} ")?;
                if let Some(instance) = instance {
                    write!(f, "{instance}.")?;
                }
                write!(f, "{method}(")?;
                write_list(f, arguments)?;
                f.write_str(")")
            }
            Self::InitClass { class_name } => write!(f, "initclass {class_name}"),
            Self::Jump { target } => write!(f, "goto {target}"),
            Self::Branch {
                condition,
                operand,
                true_target,
                false_target,
            } => write!(
                f,
                "if {operand} {condition} then goto {true_target} else goto {false_target}"
            ),
            Self::BinaryBranch {
                condition,
                left,
                right,
                true_target,
                false_target,
            } => write!(
                f,
                "if {left} {condition} {right} then goto {true_target} else goto {false_target}"
            ),
            Self::Switch {
                value,
                cases,
                default,
            } => {
                write!(f, "switch {value} ")?;
                for case in cases {
                    write!(f, "case {}: goto {}; ", case.value, case.target)?;
                }
                write!(f, "default: goto {default}")
            }
            Self::Return { value: Some(value) } => write!(f, "return {value}"),
            Self::Return { value: None } => f.write_str("return"),
            Self::Throw { exception } => write!(f, "throw {exception}"),
        }
    }
}

impl fmt::Display for Phi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} := phi ", self.dest)?;
        for (position, incoming) in self.incomings.iter().enumerate() {
            if position > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{} from {}", incoming.value, incoming.source)?;
        }
        Ok(())
    }
}

impl fmt::Display for TryCatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "catch {} {} => {}",
            self.exception_type.as_deref().unwrap_or("*"),
            self.exception_variable,
            self.handler
        )
    }
}

impl fmt::Display for BasicBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}:", self.id)?;
        for phi in &self.phis {
            writeln!(f, "    {phi}")?;
        }
        for insn in &self.instructions {
            writeln!(f, "    {insn}")?;
        }
        for try_catch in &self.try_catches {
            writeln!(f, "    {try_catch}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for block in self.blocks() {
            write!(f, "{block}")?;
        }
        Ok(())
    }
}

impl Program {
    /// Renders the control-flow graph in Graphviz DOT format.
    ///
    /// Each block becomes a box node holding its listing. Exception edges
    /// are dashed.
    #[must_use]
    pub fn to_dot(&self, name: &str) -> String {
        let mut out = format!("digraph \"{}\" {{\n    node [shape=box];\n", escape_dot(name));
        for block in self.blocks() {
            let label = block.to_string().replace("    ", "  ");
            out.push_str(&format!(
                "    b{} [label=\"{}\"];\n",
                block.id.index(),
                escape_dot(&label)
            ));
            if let Some(terminator) = block.terminator() {
                let mut seen = Vec::new();
                for target in terminator.targets() {
                    if !seen.contains(&target) {
                        seen.push(target);
                        out.push_str(&format!(
                            "    b{} -> b{};\n",
                            block.id.index(),
                            target.index()
                        ));
                    }
                }
            }
            for tc in &block.try_catches {
                out.push_str(&format!(
                    "    b{} -> b{} [style=dashed];\n",
                    block.id.index(),
                    tc.handler.index()
                ));
            }
        }
        out.push_str("}\n");
        out
    }
}
