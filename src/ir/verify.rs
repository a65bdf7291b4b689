//! Structural verification of programs.
//!
//! Passes keep programs valid by construction; the verifier exists to catch
//! the cases where they do not. The scheduler runs it after every pass when
//! [`crate::compiler::OptimizerConfig::verify`] is set, and the tests run it
//! on every program they transform.
//!
//! Checked properties:
//!
//! - every block and variable reference is in range
//! - every reachable block ends in its only terminator
//! - every variable has at most one definition
//! - every phi has exactly one incoming per reachable predecessor and no
//!   incoming from a block that is not a predecessor
//! - every use is dominated by its definition; a phi incoming value must be
//!   available at the end of its source block
//!
//! Variables without any definition are method parameters and are available
//! everywhere.

use std::collections::HashSet;

use crate::{
    analysis::ControlFlowGraph,
    ir::{BlockId, Program, VarId},
    Error, Result,
};

/// Position of a definition within its block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum DefPosition {
    Phi,
    Instruction(usize),
    ExceptionEdge,
}

/// Verifies `program`.
///
/// # Errors
///
/// Returns [`Error::Verification`] describing the first violation found, or
/// [`Error::GraphError`] if the control-flow graph cannot be built.
pub fn verify(program: &Program) -> Result<()> {
    check_references(program)?;
    let cfg = ControlFlowGraph::build(program)?;
    let definitions = collect_definitions(program)?;

    for block in program.blocks() {
        if !cfg.is_reachable(block.id) {
            continue;
        }
        check_terminator(program, block.id)?;
        check_phis(program, &cfg, block.id)?;

        for (position, insn) in block.instructions.iter().enumerate() {
            for var in insn.uses() {
                let available = match definitions[var.index()] {
                    None => true,
                    Some((def_block, def_pos)) if def_block == block.id => {
                        def_pos < DefPosition::Instruction(position)
                    }
                    Some((def_block, _)) => cfg.dominates(def_block, block.id),
                };
                if !available {
                    return Err(Error::Verification(format!(
                        "{}: use of {var} in `{insn}` is not dominated by its definition",
                        block.id
                    )));
                }
            }
        }

        for phi in &block.phis {
            for incoming in &phi.incomings {
                if !cfg.is_reachable(incoming.source) {
                    continue;
                }
                let available = match definitions[incoming.value.index()] {
                    None => true,
                    Some((def_block, _)) => cfg.dominates(def_block, incoming.source),
                };
                if !available {
                    return Err(Error::Verification(format!(
                        "{}: phi {} takes {} from {} where it is not available",
                        block.id, phi.dest, incoming.value, incoming.source
                    )));
                }
            }
        }
    }

    Ok(())
}

fn check_references(program: &Program) -> Result<()> {
    let blocks = program.block_count();
    let vars = program.variable_count();
    let bad_var = |var: VarId| var.index() >= vars;
    let bad_block = |block: BlockId| block.index() >= blocks;

    for block in program.blocks() {
        for insn in &block.instructions {
            if insn.dest().is_some_and(bad_var) || insn.uses().into_iter().any(bad_var) {
                return Err(Error::Verification(format!(
                    "{}: `{insn}` references a variable outside 0..{vars}",
                    block.id
                )));
            }
            if insn.targets().into_iter().any(bad_block) {
                return Err(Error::Verification(format!(
                    "{}: `{insn}` references a block outside 0..{blocks}",
                    block.id
                )));
            }
        }
        for phi in &block.phis {
            let dangling = bad_var(phi.dest)
                || phi
                    .incomings
                    .iter()
                    .any(|inc| bad_var(inc.value) || bad_block(inc.source));
            if dangling {
                return Err(Error::Verification(format!(
                    "{}: phi `{phi}` has a dangling reference",
                    block.id
                )));
            }
        }
        for try_catch in &block.try_catches {
            if bad_block(try_catch.handler) || bad_var(try_catch.exception_variable) {
                return Err(Error::Verification(format!(
                    "{}: `{try_catch}` has a dangling reference",
                    block.id
                )));
            }
        }
    }
    Ok(())
}

fn collect_definitions(program: &Program) -> Result<Vec<Option<(BlockId, DefPosition)>>> {
    let mut definitions = vec![None; program.variable_count()];
    let mut define = |var: VarId, block: BlockId, position: DefPosition| -> Result<()> {
        let slot = &mut definitions[var.index()];
        if slot.is_some() {
            return Err(Error::Verification(format!(
                "{block}: {var} is defined more than once"
            )));
        }
        *slot = Some((block, position));
        Ok(())
    };

    for block in program.blocks() {
        for phi in &block.phis {
            define(phi.dest, block.id, DefPosition::Phi)?;
        }
        for (position, insn) in block.instructions.iter().enumerate() {
            if let Some(dest) = insn.dest() {
                define(dest, block.id, DefPosition::Instruction(position))?;
            }
        }
        for try_catch in &block.try_catches {
            define(
                try_catch.exception_variable,
                block.id,
                DefPosition::ExceptionEdge,
            )?;
        }
    }
    Ok(definitions)
}

fn check_terminator(program: &Program, block: BlockId) -> Result<()> {
    let instructions = &program[block].instructions;
    match instructions.last() {
        Some(last) if last.is_terminator() => {}
        _ => {
            return Err(Error::Verification(format!(
                "{block}: block does not end with a terminator"
            )))
        }
    }
    if instructions[..instructions.len() - 1]
        .iter()
        .any(|insn| insn.is_terminator())
    {
        return Err(Error::Verification(format!(
            "{block}: terminator in the middle of the block"
        )));
    }
    Ok(())
}

fn check_phis(program: &Program, cfg: &ControlFlowGraph, block: BlockId) -> Result<()> {
    let predecessors: HashSet<BlockId> = cfg.block_predecessors(block).collect();
    for phi in &program[block].phis {
        let mut seen = HashSet::new();
        for incoming in &phi.incomings {
            if !predecessors.contains(&incoming.source) {
                return Err(Error::Verification(format!(
                    "{block}: phi {} has an incoming from non-predecessor {}",
                    phi.dest, incoming.source
                )));
            }
            if !seen.insert(incoming.source) {
                return Err(Error::Verification(format!(
                    "{block}: phi {} has two incomings from {}",
                    phi.dest, incoming.source
                )));
            }
        }
        if let Some(missing) = predecessors
            .iter()
            .find(|pred| cfg.is_reachable(**pred) && !seen.contains(*pred))
        {
            return Err(Error::Verification(format!(
                "{block}: phi {} lacks an incoming from predecessor {missing}",
                phi.dest
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BinaryOp, BranchCondition, Instruction, ProgramBuilder};

    fn diamond() -> (ProgramBuilder, [BlockId; 4]) {
        let mut b = ProgramBuilder::new(1);
        let entry = b.block();
        let left = b.block();
        let right = b.block();
        let join = b.block();
        b.branch(entry, BranchCondition::Equal, b.parameter(1), left, right);
        (b, [entry, left, right, join])
    }

    #[test]
    fn test_valid_diamond() {
        let (mut b, [_, left, right, join]) = diamond();
        let x = b.constant(left, 1);
        b.jump(left, join);
        let y = b.constant(right, 2);
        b.jump(right, join);
        let merged = b.phi(join);
        b.incoming(join, merged, left, x);
        b.incoming(join, merged, right, y);
        b.ret(join, Some(merged));

        assert!(verify(&b.build()).is_ok());
    }

    #[test]
    fn test_missing_phi_incoming() {
        let (mut b, [_, left, right, join]) = diamond();
        let x = b.constant(left, 1);
        b.jump(left, join);
        b.jump(right, join);
        let merged = b.phi(join);
        b.incoming(join, merged, left, x);
        b.ret(join, Some(merged));

        let err = verify(&b.build()).unwrap_err();
        assert!(err.to_string().contains("lacks an incoming"));
    }

    #[test]
    fn test_use_not_dominated() {
        let (mut b, [_, left, right, join]) = diamond();
        let x = b.constant(left, 1);
        b.jump(left, join);
        b.jump(right, join);
        b.ret(join, Some(x));

        let err = verify(&b.build()).unwrap_err();
        assert!(err.to_string().contains("not dominated"));
    }

    #[test]
    fn test_use_before_definition_in_block() {
        let mut b = ProgramBuilder::new(0);
        let entry = b.block();
        let later = b.var();
        let sum = b.binary(entry, BinaryOp::Add, later, later);
        b.push(entry, Instruction::Const { dest: later, value: 1 });
        b.ret(entry, Some(sum));

        assert!(matches!(verify(&b.build()), Err(Error::Verification(_))));
    }

    #[test]
    fn test_double_definition() {
        let mut b = ProgramBuilder::new(0);
        let entry = b.block();
        let x = b.constant(entry, 1);
        b.push(entry, Instruction::Const { dest: x, value: 2 });
        b.ret(entry, Some(x));

        let err = verify(&b.build()).unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_missing_terminator() {
        let mut b = ProgramBuilder::new(0);
        let entry = b.block();
        b.constant(entry, 1);
        assert!(verify(&b.build()).is_err());
    }

    #[test]
    fn test_exception_variable_used_in_handler() {
        let mut b = ProgramBuilder::new(0);
        let entry = b.block();
        let handler = b.block();
        let exception = b.try_catch(entry, None, handler);
        b.ret(entry, None);
        b.throw(handler, exception);
        assert!(verify(&b.build()).is_ok());
    }
}
