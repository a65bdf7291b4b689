//! Repair of SSA form after definitions were duplicated.
//!
//! When a pass copies a region of a program, every variable defined in the
//! region gets a second definition in the copy. Uses outside both regions may
//! now be reached by either definition. [`SsaUpdater::rewrite`] resolves each
//! such use to the definition that reaches it. Where the two meet, it inserts
//! merge phis at the join blocks.
//!
//! Resolution walks predecessors on demand: the value at the end of a block
//! is its own definition if it has one, otherwise the value at its entry; the
//! value at the entry of a block with one predecessor is that predecessor's
//! end value, and with several predecessors it is a new phi. Phis are
//! memoized before their operands are resolved, which makes loops terminate.
//! Phis whose operands turn out to be a single value are folded away before
//! anything is written back.

use std::collections::HashMap;

use crate::{
    analysis::ControlFlowGraph,
    ir::{BlockId, Incoming, Phi, Program, VarId},
    Result,
};

struct PendingPhi {
    block: BlockId,
    dest: VarId,
    incomings: Vec<Incoming>,
}

/// Rewrites uses of duplicated variables to their reaching definitions.
pub struct SsaUpdater<'a> {
    program: &'a mut Program,
    cfg: ControlFlowGraph,
}

struct Resolution<'r> {
    var: VarId,
    definitions: &'r HashMap<BlockId, VarId>,
    entry_values: HashMap<BlockId, VarId>,
    pending: Vec<PendingPhi>,
    alias: HashMap<VarId, VarId>,
}

impl<'a> SsaUpdater<'a> {
    /// Prepares an updater for the current shape of `program`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::GraphError`] if the control-flow graph cannot be built.
    pub fn new(program: &'a mut Program) -> Result<Self> {
        let cfg = ControlFlowGraph::build(program)?;
        Ok(SsaUpdater { program, cfg })
    }

    /// Returns the control-flow graph the updater resolves against.
    #[must_use]
    pub fn cfg(&self) -> &ControlFlowGraph {
        &self.cfg
    }

    /// Rewrites the uses of `var`.
    ///
    /// `definitions` maps every block that owns a version of `var` to the
    /// version live at the end of that block. Blocks listed there are left
    /// untouched. Every other reachable block gets its instruction uses
    /// resolved, and every phi incoming carrying `var` from an unlisted
    /// source is resolved at the end of that source.
    ///
    /// Returns the number of phis inserted.
    pub fn rewrite(&mut self, var: VarId, definitions: &HashMap<BlockId, VarId>) -> usize {
        let mut instruction_sites: Vec<BlockId> = Vec::new();
        let mut phi_sites: Vec<(BlockId, usize, usize, BlockId)> = Vec::new();

        for block in self.program.blocks() {
            if !self.cfg.is_reachable(block.id) {
                continue;
            }
            if !definitions.contains_key(&block.id)
                && block.instructions.iter().any(|insn| insn.uses().contains(&var))
            {
                instruction_sites.push(block.id);
            }
            for (phi_index, phi) in block.phis.iter().enumerate() {
                for (incoming_index, incoming) in phi.incomings.iter().enumerate() {
                    if incoming.value == var
                        && !definitions.contains_key(&incoming.source)
                        && self.cfg.is_reachable(incoming.source)
                    {
                        phi_sites.push((block.id, phi_index, incoming_index, incoming.source));
                    }
                }
            }
        }

        if instruction_sites.is_empty() && phi_sites.is_empty() {
            return 0;
        }

        let mut resolution = Resolution {
            var,
            definitions,
            entry_values: HashMap::new(),
            pending: Vec::new(),
            alias: HashMap::new(),
        };

        let instruction_values: Vec<(BlockId, VarId)> = instruction_sites
            .into_iter()
            .map(|block| (block, self.read_at_entry(&mut resolution, block)))
            .collect();
        let phi_values: Vec<(BlockId, usize, usize, VarId)> = phi_sites
            .into_iter()
            .map(|(block, phi, incoming, source)| {
                (block, phi, incoming, self.read_at_end(&mut resolution, source))
            })
            .collect();

        resolution.fold_trivial_phis();

        for (block, value) in instruction_values {
            let value = resolution.resolve(value);
            for insn in &mut self.program[block].instructions {
                insn.map_uses(|used| if used == var { value } else { used });
            }
        }
        for (block, phi, incoming, value) in phi_values {
            self.program[block].phis[phi].incomings[incoming].value = resolution.resolve(value);
        }

        let mut inserted = 0;
        for pending in std::mem::take(&mut resolution.pending) {
            if resolution.alias.contains_key(&pending.dest) {
                continue;
            }
            let mut phi = Phi::new(pending.dest);
            for incoming in pending.incomings {
                phi.add_incoming(incoming.source, resolution.resolve(incoming.value));
            }
            self.program[pending.block].phis.push(phi);
            inserted += 1;
        }
        inserted
    }

    fn read_at_end(&mut self, resolution: &mut Resolution<'_>, block: BlockId) -> VarId {
        match resolution.definitions.get(&block) {
            Some(&version) => version,
            None => self.read_at_entry(resolution, block),
        }
    }

    fn read_at_entry(&mut self, resolution: &mut Resolution<'_>, block: BlockId) -> VarId {
        if let Some(&value) = resolution.entry_values.get(&block) {
            return value;
        }

        let predecessors: Vec<BlockId> = self
            .cfg
            .block_predecessors(block)
            .filter(|pred| self.cfg.is_reachable(*pred))
            .collect();

        match predecessors.as_slice() {
            // Reached the entry without meeting a definition: the use was not
            // dominated to begin with, keep it as it was.
            [] => resolution.var,
            [single] => {
                let value = self.read_at_end(resolution, *single);
                resolution.entry_values.insert(block, value);
                value
            }
            _ => {
                let debug_name = self
                    .program
                    .variable(resolution.var)
                    .and_then(|v| v.debug_name.clone());
                let dest = self.program.create_named_variable(debug_name);
                resolution.entry_values.insert(block, dest);
                let slot = resolution.pending.len();
                resolution.pending.push(PendingPhi {
                    block,
                    dest,
                    incomings: Vec::new(),
                });
                for &pred in &predecessors {
                    let value = self.read_at_end(resolution, pred);
                    resolution.pending[slot]
                        .incomings
                        .push(Incoming::new(pred, value));
                }
                dest
            }
        }
    }
}

impl Resolution<'_> {
    fn resolve(&self, mut value: VarId) -> VarId {
        while let Some(&next) = self.alias.get(&value) {
            value = next;
        }
        value
    }

    fn fold_trivial_phis(&mut self) {
        let mut changed = true;
        while changed {
            changed = false;
            for index in 0..self.pending.len() {
                let dest = self.pending[index].dest;
                if self.alias.contains_key(&dest) {
                    continue;
                }
                let mut unique: Option<VarId> = None;
                let mut trivial = true;
                for incoming in &self.pending[index].incomings {
                    let value = self.resolve(incoming.value);
                    if value == dest || unique == Some(value) {
                        continue;
                    }
                    if unique.is_some() {
                        trivial = false;
                        break;
                    }
                    unique = Some(value);
                }
                if let (true, Some(value)) = (trivial, unique) {
                    self.alias.insert(dest, value);
                    changed = true;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{verify, BinaryOp, BranchCondition, ProgramBuilder};

    #[test]
    fn test_merge_at_join() {
        // entry -> {left, right} -> join; left defines x, right defines a copy x'
        let mut b = ProgramBuilder::new(1);
        let entry = b.block();
        let left = b.block();
        let right = b.block();
        let join = b.block();
        b.branch(entry, BranchCondition::Equal, b.parameter(1), left, right);
        let x = b.constant(left, 1);
        b.jump(left, join);
        let x_copy = b.constant(right, 2);
        b.jump(right, join);
        let doubled = b.binary(join, BinaryOp::Add, x, x);
        b.ret(join, Some(doubled));
        let mut program = b.build();

        let definitions = HashMap::from([(left, x), (right, x_copy)]);
        let inserted = SsaUpdater::new(&mut program)
            .unwrap()
            .rewrite(x, &definitions);

        assert_eq!(inserted, 1);
        let phi = &program[join].phis[0];
        assert_eq!(phi.incoming_from(left), Some(x));
        assert_eq!(phi.incoming_from(right), Some(x_copy));
        assert_eq!(program[join].instructions[0].uses(), vec![phi.dest, phi.dest]);
        verify(&program).unwrap();
    }

    #[test]
    fn test_single_reaching_definition_needs_no_phi() {
        let mut b = ProgramBuilder::new(0);
        let entry = b.block();
        let next = b.block();
        let x = b.constant(entry, 1);
        b.jump(entry, next);
        b.ret(next, Some(x));
        let mut program = b.build();
        let x_copy = program.create_variable();

        // Only the copy's region reaches `next`.
        let definitions = HashMap::from([(entry, x_copy)]);
        let inserted = SsaUpdater::new(&mut program)
            .unwrap()
            .rewrite(x, &definitions);

        assert_eq!(inserted, 0);
        assert_eq!(program[next].instructions[0].uses(), vec![x_copy]);
    }

    #[test]
    fn test_loop_phi_is_folded_when_trivial() {
        // entry(def x) -> head <-> body; head -> exit uses x
        let mut b = ProgramBuilder::new(1);
        let entry = b.block();
        let head = b.block();
        let body = b.block();
        let exit = b.block();
        let x = b.constant(entry, 5);
        b.jump(entry, head);
        b.branch(head, BranchCondition::Equal, b.parameter(1), body, exit);
        b.jump(body, head);
        b.ret(exit, Some(x));
        let mut program = b.build();

        let definitions = HashMap::from([(entry, x)]);
        let inserted = SsaUpdater::new(&mut program)
            .unwrap()
            .rewrite(x, &definitions);

        assert_eq!(inserted, 0);
        assert!(program[head].phis.is_empty());
        assert_eq!(program[exit].instructions[0].uses(), vec![x]);
    }
}
