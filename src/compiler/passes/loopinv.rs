//! Loop inversion pass.
//!
//! Rewrites loops of the shape `while (true) { condition; body }` into
//! `if (condition) { do { body } while (condition') }`. The condition blocks
//! are duplicated; the body then jumps to the copy instead of back to the
//! original head, so the loop that remains is entered at the body and its
//! only back edges come from the condition copy.
//!
//! # Example
//!
//! Before:
//! ```text
//! $B1: @5 := phi($B0: @2, $B3: @7)       // head = condition
//!      if @5 < @1 goto $B2 else $B4
//! $B2: ...                                // body
//! $B3: @7 := @5 add @3
//!      goto $B1
//! ```
//!
//! After:
//! ```text
//! $B1: @5 := phi($B0: @2)                 // first check, runs once
//!      if @5 < @1 goto $B2 else $B4
//! $B2: @9 := phi($B1: @5, $B5: @8)        // new loop header
//!      ...
//! $B3: @7 := @9 add @3
//!      goto $B5
//! $B5: @8 := phi($B3: @7)                 // condition copy
//!      if @8 < @1 goto $B2 else $B4
//! ```
//!
//! # Algorithm
//!
//! For each natural loop, innermost first:
//!
//! 1. Find the body start: from the common dominator of the back-edge
//!    sources, climb the dominator tree to the highest block that dominates
//!    no loop exit. Loop blocks it does not dominate form the condition.
//! 2. Reject the loop if a body block branches into the condition anywhere
//!    but at the head.
//! 3. Copy the condition blocks and every variable they define.
//! 4. Redirect the back edges to the copied head and split the head's phis
//!    between the original (entry edges) and the copy (back edges).
//! 5. Give every block entered from a copied block a mirrored phi incoming.
//! 6. Let the [`SsaUpdater`] merge original and copied definitions wherever
//!    both reach a use.
//!
//! Inverting a loop changes the shape of every enclosing loop, so those are
//! postponed to another detection sweep; sweeps repeat until nothing is
//! postponed.
//!
//! With [`LoopInversionPass::with_profitability`], a loop is only inverted
//! when its body holds a loop-invariant division, remainder or array length.
//! The guard is what allows such an instruction to be hoisted.

use std::{
    cmp::Reverse,
    collections::{BTreeMap, BTreeSet, HashMap, HashSet},
};

use strum::Display;

use crate::{
    analysis::{detect_loops, ControlFlowGraph, LoopInfo},
    compiler::{pass::ProgramPass, CompilerContext, EventKind},
    ir::{
        BinaryOp, BlockId, CopyTable, Incoming, Instruction, MethodRef, Program, Remapper,
        SsaUpdater, VarId,
    },
    utils::graph::NodeId,
    Result,
};

/// Why a loop was not inverted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum SkipReason {
    /// No block of the loop leaves it.
    #[strum(to_string = "loop has no exit")]
    NoExits,
    /// The loop has no back edge source.
    #[strum(to_string = "loop has no back edge")]
    NoLatches,
    /// The loop header is the program entry.
    #[strum(to_string = "loop header is the entry block")]
    EntryHeader,
    /// Every block on the path to the back edges can leave the loop, so
    /// there is no body to rotate.
    #[strum(to_string = "no body separate from the condition")]
    NoBody,
    /// A body block jumps into the condition somewhere other than the head.
    #[strum(to_string = "body re-enters the condition")]
    NotInvertible,
    /// The body has no loop-invariant instruction that may trap, so the guard
    /// would not let anything be hoisted.
    #[strum(to_string = "inversion is not profitable")]
    Unprofitable,
}

/// What one application of the pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InversionReport {
    /// Heads of the inverted loops, in inversion order.
    pub inverted: Vec<BlockId>,
    /// Heads of the loops left alone, each reported once.
    pub skipped: Vec<(BlockId, SkipReason)>,
}

/// A loop split into condition and body.
#[derive(Debug, Clone)]
struct LoopWithExits {
    head: BlockId,
    body_start: BlockId,
    nodes: BTreeSet<BlockId>,
    condition: BTreeSet<BlockId>,
}

impl LoopWithExits {
    /// Splits `info` into condition and body, or explains why it cannot be
    /// inverted.
    fn analyze(cfg: &ControlFlowGraph, info: &LoopInfo) -> std::result::Result<Self, SkipReason> {
        let dominators = cfg.dominators();
        let head = BlockId::from(info.header);

        if info.latches.is_empty() {
            return Err(SkipReason::NoLatches);
        }
        if info.exits.is_empty() {
            return Err(SkipReason::NoExits);
        }
        if info.header == dominators.entry() {
            return Err(SkipReason::EntryHeader);
        }

        let dominates_exit =
            |node: NodeId| info.exits.iter().any(|&exit| dominators.dominates(node, exit));

        let mut body_start = dominators
            .common_dominator_of(info.latches.iter().copied())
            .ok_or(SkipReason::NoLatches)?;
        if body_start == info.header || dominates_exit(body_start) {
            return Err(SkipReason::NoBody);
        }
        while let Some(parent) = dominators.immediate_dominator(body_start) {
            if parent == info.header || dominates_exit(parent) {
                break;
            }
            body_start = parent;
        }

        let nodes: BTreeSet<BlockId> = info.body.iter().map(|&n| BlockId::from(n)).collect();
        let condition: BTreeSet<BlockId> = info
            .body
            .iter()
            .copied()
            .filter(|&n| n == info.header || !dominators.dominates(body_start, n))
            .map(BlockId::from)
            .collect();

        let shape = LoopWithExits {
            head,
            body_start: BlockId::from(body_start),
            nodes,
            condition,
        };
        if shape.can_invert(cfg) {
            Ok(shape)
        } else {
            Err(SkipReason::NotInvertible)
        }
    }

    fn is_body(&self, block: BlockId) -> bool {
        self.nodes.contains(&block) && !self.condition.contains(&block)
    }

    fn body(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.nodes.iter().copied().filter(|b| self.is_body(*b))
    }

    /// Every in-loop successor of a body block must be a body block or the
    /// head; anything else would leave a second entry into the rotated loop.
    fn can_invert(&self, cfg: &ControlFlowGraph) -> bool {
        self.body().all(|block| {
            cfg.block_successors(block)
                .all(|succ| succ == self.head || !self.nodes.contains(&succ) || self.is_body(succ))
        })
    }

    /// Returns `true` if a body block holds an instruction that may trap and
    /// whose operands are all loop invariant.
    ///
    /// Invariant operands are defined outside the loop, or earlier in the
    /// same block by an instruction that is itself invariant.
    fn is_profitable(&self, program: &Program) -> bool {
        let places = program.definition_places();
        let outside = |var: VarId| {
            places
                .get(var.index())
                .copied()
                .flatten()
                .map_or(true, |block| !self.nodes.contains(&block))
        };

        self.body().any(|block| {
            let mut invariants: HashSet<VarId> = HashSet::new();
            for insn in &program[block].instructions {
                let traps = match insn {
                    Instruction::Binary { op, .. } => matches!(op, BinaryOp::Div | BinaryOp::Rem),
                    Instruction::ArrayLength { .. } => true,
                    Instruction::Const { .. }
                    | Instruction::Null { .. }
                    | Instruction::Copy { .. }
                    | Instruction::Neg { .. } => false,
                    _ => continue,
                };
                let invariant = insn
                    .uses()
                    .into_iter()
                    .all(|var| invariants.contains(&var) || outside(var));
                if !invariant {
                    continue;
                }
                if traps {
                    return true;
                }
                invariants.extend(insn.dest());
            }
            false
        })
    }

    /// Performs the inversion on `program`.
    fn invert(&self, program: &mut Program) -> Result<()> {
        let table = self.copy_condition(program);
        let head_copy = table.map_block(self.head);

        for phi in &mut program[self.head].phis {
            phi.remove_incomings(|incoming| self.nodes.contains(&incoming.source));
        }

        for block in self.body() {
            let block = &mut program[block];
            for insn in &mut block.instructions {
                insn.map_targets(|target| if target == self.head { head_copy } else { target });
            }
            for try_catch in &mut block.try_catches {
                if try_catch.handler == self.head {
                    try_catch.handler = head_copy;
                }
            }
        }

        self.mirror_incomings(program, &table);

        let mut versions: Vec<_> = table.variables.iter().map(|(&v, &c)| (v, c)).collect();
        versions.sort();
        let mut updater = SsaUpdater::new(program)?;
        for (original, copy) in versions {
            let mut definitions: HashMap<BlockId, _> = HashMap::new();
            for &block in &self.condition {
                definitions.insert(block, original);
                definitions.insert(table.map_block(block), copy);
            }
            updater.rewrite(original, &definitions);
        }
        Ok(())
    }

    /// Duplicates the condition blocks and the variables they define.
    fn copy_condition(&self, program: &mut Program) -> CopyTable {
        let mut table = CopyTable::default();
        for &block in &self.condition {
            table.blocks.insert(block, program.create_block());
        }
        for &block in &self.condition {
            for var in program[block].defined_variables() {
                let debug_name = program.variable(var).and_then(|v| v.debug_name.clone());
                table
                    .variables
                    .insert(var, program.create_named_variable(debug_name));
            }
        }

        for &block in &self.condition {
            let mut copy = program[block].clone();
            copy.id = table.map_block(block);
            table.apply_to_block(&mut copy);
            if block == self.head {
                // Only the back edges enter the copied head; their values are
                // fixed up by the updater.
                for (phi, original) in copy.phis.iter_mut().zip(&program[block].phis) {
                    phi.incomings = original
                        .incomings
                        .iter()
                        .filter(|incoming| self.nodes.contains(&incoming.source))
                        .copied()
                        .collect();
                }
            }
            let id = copy.id;
            program[id] = copy;
        }
        table
    }

    /// Adds `(copy of c, copy of value)` next to every `(c, value)` incoming
    /// of a block outside the condition.
    fn mirror_incomings(&self, program: &mut Program, table: &CopyTable) {
        let targets: BTreeSet<BlockId> = self
            .condition
            .iter()
            .flat_map(|&block| program[block].successors())
            .filter(|succ| !self.condition.contains(succ))
            .collect();

        for target in targets {
            for phi in &mut program[target].phis {
                let mirrored: Vec<Incoming> = phi
                    .incomings
                    .iter()
                    .filter(|incoming| self.condition.contains(&incoming.source))
                    .map(|incoming| {
                        Incoming::new(
                            table.map_block(incoming.source),
                            table.map_variable(incoming.value),
                        )
                    })
                    .collect();
                phi.incomings.extend(mirrored);
            }
        }
    }
}

/// Loop inversion pass.
pub struct LoopInversionPass {
    max_rounds: usize,
    profitability: bool,
}

impl Default for LoopInversionPass {
    fn default() -> Self {
        Self::new(64)
    }
}

impl LoopInversionPass {
    /// Creates the pass with a bound on detection sweeps.
    #[must_use]
    pub fn new(max_rounds: usize) -> Self {
        Self {
            max_rounds,
            profitability: false,
        }
    }

    /// Restricts inversion to loops passing the profitability check.
    #[must_use]
    pub fn with_profitability(mut self, enabled: bool) -> Self {
        self.profitability = enabled;
        self
    }

    /// Inverts every invertible loop of `program`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::GraphError`] if the program refers to blocks
    /// that do not exist.
    pub fn apply(&self, program: &mut Program) -> Result<InversionReport> {
        let mut report = InversionReport::default();
        let mut reported: HashSet<BlockId> = HashSet::new();

        for _ in 0..self.max_rounds {
            let cfg = ControlFlowGraph::build(program)?;
            let forest = detect_loops(cfg.graph(), cfg.dominators());

            let mut order: Vec<(usize, &LoopInfo)> = forest.loops().iter().enumerate().collect();
            order.sort_by_key(|(_, info)| (Reverse(info.depth), info.header));

            let mut should_skip: HashSet<usize> = HashSet::new();
            let mut postponed = false;
            let mut shapes: BTreeMap<usize, LoopWithExits> = BTreeMap::new();

            for (id, info) in order {
                if should_skip.contains(&id) {
                    postponed = true;
                    continue;
                }
                let analyzed = LoopWithExits::analyze(&cfg, info).and_then(|shape| {
                    if self.profitability && !shape.is_profitable(program) {
                        Err(SkipReason::Unprofitable)
                    } else {
                        Ok(shape)
                    }
                });
                match analyzed {
                    Ok(shape) => {
                        shape.invert(program)?;
                        report.inverted.push(shape.head);
                        should_skip.extend(forest.ancestors(id).skip(1));
                        shapes.insert(id, shape);
                    }
                    Err(reason) => {
                        let head = BlockId::from(info.header);
                        if reported.insert(head) {
                            report.skipped.push((head, reason));
                        }
                    }
                }
            }

            // Rotated loops are headed by their body start from now on and
            // must not be reported as skipped later.
            reported.extend(shapes.values().map(|shape| shape.body_start));

            if !postponed {
                break;
            }
        }
        Ok(report)
    }
}

impl ProgramPass for LoopInversionPass {
    fn name(&self) -> &'static str {
        "loop-inversion"
    }

    fn description(&self) -> &'static str {
        "Rotates while loops into guarded do-while loops"
    }

    fn run_on_method(
        &self,
        program: &mut Program,
        method: &MethodRef,
        ctx: &CompilerContext,
    ) -> Result<bool> {
        let report = self.apply(program)?;
        for head in &report.inverted {
            ctx.events
                .record(EventKind::LoopInverted)
                .at(method.clone(), head.index())
                .pass(self.name())
                .message(format!("inverted loop headed by {head}"));
        }
        for (head, reason) in &report.skipped {
            ctx.events
                .record(EventKind::LoopSkipped)
                .at(method.clone(), head.index())
                .pass(self.name())
                .message(format!("loop headed by {head}: {reason}"));
        }
        Ok(!report.inverted.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{
        verify, BinaryBranchCondition, BinaryOp, BranchCondition, Interpreter, Outcome,
        ProgramBuilder, Value,
    };

    /// sum = 0; i = 0; while (i < n) { sum += i; i++ } return sum
    fn counting_loop() -> Program {
        let mut b = ProgramBuilder::new(1);
        let entry = b.block();
        let head = b.block();
        let body = b.block();
        let latch = b.block();
        let exit = b.block();
        let zero = b.constant(entry, 0);
        let one = b.constant(entry, 1);
        b.jump(entry, head);
        let i = b.phi(head);
        let sum = b.phi(head);
        b.compare_branch(head, BinaryBranchCondition::Less, i, b.parameter(1), body, exit);
        let next_sum = b.binary(body, BinaryOp::Add, sum, i);
        b.jump(body, latch);
        let next_i = b.binary(latch, BinaryOp::Add, i, one);
        b.jump(latch, head);
        b.incoming(head, i, entry, zero);
        b.incoming(head, i, latch, next_i);
        b.incoming(head, sum, entry, zero);
        b.incoming(head, sum, latch, next_sum);
        b.ret(exit, Some(sum));
        b.build()
    }

    fn run(program: &Program, n: i64) -> (Outcome, usize) {
        let execution = Interpreter::new()
            .run(program, None, &[Value::Int(n)])
            .unwrap();
        (execution.outcome.clone(), execution.visits_of(BlockId::new(2)))
    }

    #[test]
    fn test_inverts_while_loop() {
        let original = counting_loop();
        let mut program = original.clone();

        let report = LoopInversionPass::default().apply(&mut program).unwrap();

        assert_eq!(report.inverted, vec![BlockId::new(1)]);
        verify(&program).unwrap();
        // The head copy is the only new block.
        assert_eq!(program.block_count(), original.block_count() + 1);
        let head_copy = BlockId::new(5);
        assert_eq!(program[BlockId::new(3)].successors(), vec![head_copy]);
        assert_eq!(program[BlockId::new(1)].phis[0].incomings.len(), 1);

        for n in 0..6 {
            assert_eq!(run(&original, n), run(&program, n), "n = {n}");
        }
    }

    #[test]
    fn test_rotated_loop_is_not_inverted_again() {
        let mut program = counting_loop();
        let pass = LoopInversionPass::default();
        pass.apply(&mut program).unwrap();
        let once = program.clone();

        let report = pass.apply(&mut program).unwrap();

        assert!(report.inverted.is_empty());
        assert_eq!(report.skipped, vec![(BlockId::new(2), SkipReason::NoBody)]);
        assert_eq!(program, once);
    }

    #[test]
    fn test_do_while_is_skipped() {
        // entry -> body -> (body | exit)
        let mut b = ProgramBuilder::new(1);
        let entry = b.block();
        let body = b.block();
        let exit = b.block();
        b.jump(entry, body);
        let i = b.phi(body);
        let one = b.constant(body, 1);
        let next = b.binary(body, BinaryOp::Sub, i, one);
        b.branch(body, BranchCondition::Greater, next, body, exit);
        b.incoming(body, i, entry, b.parameter(1));
        b.incoming(body, i, body, next);
        b.ret(exit, None);
        let mut program = b.build();
        let before = program.clone();

        let report = LoopInversionPass::default().apply(&mut program).unwrap();

        assert!(report.inverted.is_empty());
        assert_eq!(report.skipped, vec![(body, SkipReason::NoBody)]);
        assert_eq!(program, before);
    }

    #[test]
    fn test_loop_without_exit_is_skipped() {
        let mut b = ProgramBuilder::new(0);
        let entry = b.block();
        let head = b.block();
        let body = b.block();
        b.jump(entry, head);
        b.jump(head, body);
        b.jump(body, head);
        let mut program = b.build();

        let report = LoopInversionPass::default().apply(&mut program).unwrap();
        assert_eq!(report.skipped, vec![(head, SkipReason::NoExits)]);
    }

    #[test]
    fn test_nested_loops_are_both_inverted() {
        // for (i = 0; i < n; i++) for (j = 0; j < i; j++) acc += j
        let mut b = ProgramBuilder::new(1);
        let entry = b.block();
        let outer = b.block();
        let inner_pre = b.block();
        let inner = b.block();
        let inner_body = b.block();
        let outer_latch = b.block();
        let exit = b.block();

        let zero = b.constant(entry, 0);
        let one = b.constant(entry, 1);
        b.jump(entry, outer);

        let i = b.phi(outer);
        let acc = b.phi(outer);
        b.compare_branch(outer, BinaryBranchCondition::Less, i, b.parameter(1), inner_pre, exit);
        b.jump(inner_pre, inner);

        let j = b.phi(inner);
        let inner_acc = b.phi(inner);
        b.compare_branch(inner, BinaryBranchCondition::Less, j, i, inner_body, outer_latch);
        let next_acc = b.binary(inner_body, BinaryOp::Add, inner_acc, j);
        let next_j = b.binary(inner_body, BinaryOp::Add, j, one);
        b.jump(inner_body, inner);

        let next_i = b.binary(outer_latch, BinaryOp::Add, i, one);
        b.jump(outer_latch, outer);
        b.ret(exit, Some(acc));

        b.incoming(outer, i, entry, zero);
        b.incoming(outer, i, outer_latch, next_i);
        b.incoming(outer, acc, entry, zero);
        b.incoming(outer, acc, outer_latch, inner_acc);
        b.incoming(inner, j, inner_pre, zero);
        b.incoming(inner, j, inner_body, next_j);
        b.incoming(inner, inner_acc, inner_pre, acc);
        b.incoming(inner, inner_acc, inner_body, next_acc);
        let original = b.build();
        verify(&original).unwrap();

        let mut program = original.clone();
        let report = LoopInversionPass::default().apply(&mut program).unwrap();

        assert_eq!(report.inverted, vec![inner, outer]);
        verify(&program).unwrap();
        for n in 0..6 {
            let before = Interpreter::new()
                .run(&original, None, &[Value::Int(n)])
                .unwrap();
            let after = Interpreter::new()
                .run(&program, None, &[Value::Int(n)])
                .unwrap();
            assert_eq!(before.outcome, after.outcome, "n = {n}");
            assert_eq!(
                before.visits_of(inner_body),
                after.visits_of(inner_body),
                "n = {n}"
            );
        }
    }

    /// sum = 0; i = 0; while (i < n) { sum += 100 / (d + 1); i++ } return sum
    fn invariant_division_loop() -> Program {
        let mut b = ProgramBuilder::new(2);
        let entry = b.block();
        let head = b.block();
        let body = b.block();
        let exit = b.block();
        let zero = b.constant(entry, 0);
        let one = b.constant(entry, 1);
        let hundred = b.constant(entry, 100);
        b.jump(entry, head);
        let i = b.phi(head);
        let sum = b.phi(head);
        b.compare_branch(head, BinaryBranchCondition::Less, i, b.parameter(1), body, exit);
        let divisor = b.binary(body, BinaryOp::Add, b.parameter(2), one);
        let quotient = b.binary(body, BinaryOp::Div, hundred, divisor);
        let next_sum = b.binary(body, BinaryOp::Add, sum, quotient);
        let next_i = b.binary(body, BinaryOp::Add, i, one);
        b.jump(body, head);
        b.incoming(head, i, entry, zero);
        b.incoming(head, i, body, next_i);
        b.incoming(head, sum, entry, zero);
        b.incoming(head, sum, body, next_sum);
        b.ret(exit, Some(sum));
        b.build()
    }

    #[test]
    fn test_profitability_skips_loop_without_trapping_invariant() {
        let original = counting_loop();
        let mut program = original.clone();

        let report = LoopInversionPass::default()
            .with_profitability(true)
            .apply(&mut program)
            .unwrap();

        assert!(report.inverted.is_empty());
        assert_eq!(
            report.skipped,
            vec![(BlockId::new(1), SkipReason::Unprofitable)]
        );
        assert_eq!(program, original);

        let report = LoopInversionPass::default().apply(&mut program).unwrap();
        assert_eq!(report.inverted, vec![BlockId::new(1)]);
    }

    #[test]
    fn test_profitability_accepts_invariant_division() {
        let original = invariant_division_loop();
        let mut program = original.clone();

        let report = LoopInversionPass::default()
            .with_profitability(true)
            .apply(&mut program)
            .unwrap();

        assert_eq!(report.inverted, vec![BlockId::new(1)]);
        verify(&program).unwrap();
        for n in 0..4 {
            for d in [-1, 0, 4] {
                let args = [Value::Int(n), Value::Int(d)];
                let before = Interpreter::new().run(&original, None, &args).unwrap();
                let after = Interpreter::new().run(&program, None, &args).unwrap();
                assert_eq!(before.outcome, after.outcome, "n = {n}, d = {d}");
            }
        }
    }

    #[test]
    fn test_inverts_condition_inside_try_catch() {
        // sum = 0; i = 0;
        // try { while (true) { q = 10 / (n - i); if (i >= 5) break; sum += q; i++ } }
        // catch (*) { return sum > 3 ? exception : sum; }
        // return sum;
        let mut b = ProgramBuilder::new(1);
        let entry = b.block();
        let head = b.block();
        let body = b.block();
        let exit = b.block();
        let handler = b.block();
        let caught_late = b.block();
        let caught_early = b.block();

        let zero = b.constant(entry, 0);
        let one = b.constant(entry, 1);
        let three = b.constant(entry, 3);
        let five = b.constant(entry, 5);
        let ten = b.constant(entry, 10);
        b.jump(entry, head);

        let i = b.phi(head);
        let sum = b.phi(head);
        let remaining = b.binary(head, BinaryOp::Sub, b.parameter(1), i);
        let quotient = b.binary(head, BinaryOp::Div, ten, remaining);
        b.compare_branch(head, BinaryBranchCondition::Less, i, five, body, exit);
        let exception = b.try_catch(head, None, handler);

        let next_sum = b.binary(body, BinaryOp::Add, sum, quotient);
        let next_i = b.binary(body, BinaryOp::Add, i, one);
        b.jump(body, head);
        b.ret(exit, Some(sum));

        let partial = b.phi(handler);
        b.incoming(handler, partial, head, sum);
        b.compare_branch(
            handler,
            BinaryBranchCondition::Greater,
            partial,
            three,
            caught_late,
            caught_early,
        );
        b.ret(caught_late, Some(exception));
        b.ret(caught_early, Some(partial));

        b.incoming(head, i, entry, zero);
        b.incoming(head, i, body, next_i);
        b.incoming(head, sum, entry, zero);
        b.incoming(head, sum, body, next_sum);
        let original = b.build();
        verify(&original).unwrap();
        let mut program = original.clone();

        let report = LoopInversionPass::default().apply(&mut program).unwrap();

        assert_eq!(report.inverted, vec![head]);
        verify(&program).unwrap();
        let head_copy = BlockId::new(original.block_count());
        let copied = &program[head_copy].try_catches;
        assert_eq!(copied.len(), 1);
        assert_eq!(copied[0].handler, handler);
        assert_ne!(copied[0].exception_variable, exception);
        assert!(program[handler]
            .phis
            .iter()
            .any(|phi| phi.incomings.iter().any(|inc| inc.source == head_copy)));

        for n in 0..8 {
            let args = [Value::Int(n)];
            let before = Interpreter::new().run(&original, None, &args).unwrap();
            let after = Interpreter::new().run(&program, None, &args).unwrap();
            assert_eq!(before.outcome, after.outcome, "n = {n}");
            assert_eq!(before.visits_of(body), after.visits_of(body), "n = {n}");
        }
    }
}
