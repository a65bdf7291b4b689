//! Call-site inlining pass.
//!
//! Replaces calls to small, statically bound methods with a copy of the
//! callee's body. Work happens in two phases:
//!
//! 1. **Planning** walks the program's call sites from the last block and last
//!    instruction backwards, copies every eligible callee and recursively plans
//!    the callee's own call sites. Nothing is modified yet.
//! 2. **Execution** splices each planned callee into the caller, then executes
//!    the callee's inner plan inside the freshly inlined blocks.
//!
//! Because sites are planned back to front, splicing one site only moves
//! instructions that come after it. The block and instruction coordinates of
//! every site still waiting in the plan remain valid.
//!
//! # Budget
//!
//! A callee qualifies when its [`complexity`] does not exceed the budget of
//! its nesting depth `d`: `threshold - d`, plus another `threshold` when the
//! program being planned is itself simpler than `threshold`. Planning stops
//! at [`InliningConfig::max_depth`].
//!
//! # Splicing
//!
//! ```text
//! B:  a; x := invoke f(y); b; jump S        B:  a; [initclass]; jump F0
//!                                      =>   F0..Fn: body of f, returns jump to T
//!                                           T:  x := <returned value>; b; jump S
//! ```
//!
//! The `initclass` is emitted for static and constructor calls. It stays in
//! `B`, so it runs once even when `F0` is a loop header.
//!
//! Callee variable 0 becomes the call's instance, variables `1..=n` become
//! its arguments and every other variable is renumbered into a fresh range.
//! Try/catch regions covering `B` are copied onto `T` and every inlined block.

use std::collections::{HashMap, HashSet};

use strum::Display;

use crate::{
    compiler::{
        pass::ProgramPass, ClassSource, CompilerContext, EventKind, InliningConfig,
        MethodModifiers,
    },
    ir::{
        BlockId, Incoming, Instruction, InvocationKind, MethodRef, Phi, Program, ProgramMapper,
        Remapper, SsaUpdater, TryCatch, VarId,
    },
    Result,
};

/// Why an inlined call needs an explicit class initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum ClassInitReason {
    /// The call has no instance, so nothing has initialized the class yet.
    #[strum(serialize = "static dispatch")]
    StaticDispatch,
    /// The call constructs a new instance.
    #[strum(serialize = "constructor")]
    Constructor,
}

impl ClassInitReason {
    /// Returns the reason a call to `method` needs a class initialization.
    #[must_use]
    pub fn of(method: &MethodRef, instance: Option<VarId>) -> Option<Self> {
        if method.is_constructor() {
            Some(ClassInitReason::Constructor)
        } else if instance.is_none() {
            Some(ClassInitReason::StaticDispatch)
        } else {
            None
        }
    }
}

/// Why a call site was left alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum RejectReason {
    /// The class source does not know the method.
    #[strum(serialize = "unresolved method")]
    Unresolved,
    /// The method is abstract, native, or has an empty body.
    #[strum(serialize = "no body")]
    NoBody,
    /// Inlining would drop the monitor the callee holds.
    #[strum(serialize = "synchronized")]
    Synchronized,
    /// The callee is more complex than the budget allows.
    #[strum(serialize = "over budget")]
    OverBudget,
    /// A handler covering the call merges a value defined after the call.
    #[strum(serialize = "handler needs a value defined after the call")]
    HandlerValue,
}

/// A call site that was not inlined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    /// Block of the call, relative to the program being planned
    pub block: BlockId,
    /// Nesting depth of the program being planned
    pub depth: usize,
    /// The called method
    pub method: MethodRef,
    /// Why the call was left alone
    pub reason: RejectReason,
    /// Complexity of the callee, when it was computed
    pub complexity: Option<usize>,
}

/// One call site scheduled for inlining.
#[derive(Debug, Clone)]
pub struct PlanEntry {
    /// Block holding the call, relative to the program being planned
    pub block: BlockId,
    /// Position of the call within the block
    pub index: usize,
    /// The called method
    pub method: MethodRef,
    /// Private copy of the callee's body
    pub program: Program,
    /// Nesting depth at which the call was found
    pub depth: usize,
    /// Call sites of the copied callee, relative to `program`
    pub inner: Vec<PlanEntry>,
    /// Whether an `InitClass` runs in the caller before entering the body
    pub class_init: Option<ClassInitReason>,
}

impl PlanEntry {
    /// Returns the number of call sites this entry inlines, itself included.
    #[must_use]
    pub fn size(&self) -> usize {
        1 + self.inner.iter().map(PlanEntry::size).sum::<usize>()
    }
}

/// A call that was replaced by its callee's body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlinedSite {
    /// Block of the caller that held the call
    pub block: BlockId,
    /// The inlined method
    pub method: MethodRef,
    /// Nesting depth of the site
    pub depth: usize,
    /// Class initialization inserted for this site
    pub class_init: Option<ClassInitReason>,
}

/// Outcome of running the inliner on one program.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InliningReport {
    /// Inlined call sites in execution order
    pub inlined: Vec<InlinedSite>,
    /// Call sites that were considered and left alone
    pub rejected: Vec<Rejection>,
}

/// Computes the complexity score of a program.
///
/// Each block contributes its instruction count without the terminator and
/// without `nop`s. A call adds one plus its operand count. A two-way branch
/// adds 2 and a switch adds 3.
///
/// A block without any instruction scores 0, not -1; such blocks only exist
/// while a program is being assembled.
#[must_use]
pub fn complexity(program: &Program) -> usize {
    program
        .blocks()
        .iter()
        .map(|block| {
            let instructions = &block.instructions;
            let nops = instructions.iter().filter(|insn| insn.is_nop()).count();
            let calls: usize = instructions
                .iter()
                .map(|insn| match insn {
                    Instruction::Invoke {
                        instance,
                        arguments,
                        ..
                    } => arguments.len() + usize::from(instance.is_some()) + 1,
                    _ => 0,
                })
                .sum();
            let branching = match instructions.last() {
                Some(Instruction::Switch { .. }) => 3,
                Some(Instruction::Branch { .. } | Instruction::BinaryBranch { .. }) => 2,
                _ => 0,
            };
            instructions.len().saturating_sub(1 + nops) + calls + branching
        })
        .sum()
}

/// Call-site inlining pass.
pub struct InliningPass {
    config: InliningConfig,
}

impl Default for InliningPass {
    fn default() -> Self {
        Self::new(InliningConfig::default())
    }
}

impl InliningPass {
    /// Creates an inliner with the given budget.
    #[must_use]
    pub fn new(config: InliningConfig) -> Self {
        Self { config }
    }

    /// Returns the budget this inliner applies.
    #[must_use]
    pub fn config(&self) -> &InliningConfig {
        &self.config
    }

    /// Returns the complexity a callee may have at nesting `depth` inside a
    /// program of complexity `own`.
    #[must_use]
    pub fn budget(&self, own: usize, depth: usize) -> usize {
        let threshold = self.config.threshold;
        let mut budget = threshold.saturating_sub(depth);
        if own < threshold {
            budget += threshold;
        }
        budget
    }

    /// Builds the plan for `program` without modifying it.
    ///
    /// Rejected call sites are appended to `rejected`.
    pub fn plan(
        &self,
        program: &Program,
        classes: &dyn ClassSource,
        rejected: &mut Vec<Rejection>,
    ) -> Vec<PlanEntry> {
        self.build_plan(program, classes, 0, rejected)
    }

    /// Inlines every eligible call site of `program`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::GraphError`] if the control-flow graph of the
    /// spliced program cannot be built while repairing handler variables.
    pub fn apply(&self, program: &mut Program, classes: &dyn ClassSource) -> Result<InliningReport> {
        let mut report = InliningReport::default();
        let plan = self.build_plan(program, classes, 0, &mut report.rejected);
        let mut exception_vars = Vec::new();
        for entry in plan {
            exec_entry(program, entry, 0, &mut report.inlined, &mut exception_vars);
        }

        if !exception_vars.is_empty() {
            let mut updater = SsaUpdater::new(program)?;
            for (var, definitions) in exception_vars {
                updater.rewrite(var, &definitions);
            }
        }
        Ok(report)
    }

    fn build_plan(
        &self,
        program: &Program,
        classes: &dyn ClassSource,
        depth: usize,
        rejected: &mut Vec<Rejection>,
    ) -> Vec<PlanEntry> {
        if depth >= self.config.max_depth {
            return Vec::new();
        }
        let own = complexity(program);
        let mut plan = Vec::new();

        for block in program.blocks().iter().rev() {
            for (index, insn) in block.instructions.iter().enumerate().rev() {
                let Instruction::Invoke {
                    method,
                    instance,
                    kind,
                    ..
                } = insn
                else {
                    continue;
                };
                if *kind == InvocationKind::Virtual {
                    continue;
                }

                let mut reject = |reason, complexity| {
                    rejected.push(Rejection {
                        block: block.id,
                        depth,
                        method: method.clone(),
                        reason,
                        complexity,
                    });
                };

                let Some(model) = classes.method(method) else {
                    reject(RejectReason::Unresolved, None);
                    continue;
                };
                let Some(body) = model.body().filter(|body| body.block_count() > 0) else {
                    reject(RejectReason::NoBody, None);
                    continue;
                };
                if model.modifiers.contains(MethodModifiers::SYNCHRONIZED) {
                    reject(RejectReason::Synchronized, None);
                    continue;
                }
                let score = complexity(body);
                if score > self.budget(own, depth) {
                    reject(RejectReason::OverBudget, Some(score));
                    continue;
                }
                if handler_needs_later_value(program, block.id, index) {
                    reject(RejectReason::HandlerValue, Some(score));
                    continue;
                }

                let callee = body.clone();
                let class_init = ClassInitReason::of(method, *instance);
                let inner = self.build_plan(&callee, classes, depth + 1, rejected);
                plan.push(PlanEntry {
                    block: block.id,
                    index,
                    method: method.clone(),
                    program: callee,
                    depth,
                    inner,
                    class_init,
                });
            }
        }
        plan
    }
}

/// Returns `true` if a handler phi takes from `block` a value that is only
/// defined after the instruction at `index`. Such a value does not exist yet
/// when the inlined body throws.
fn handler_needs_later_value(program: &Program, block: BlockId, index: usize) -> bool {
    let source = &program[block];
    if source.try_catches.is_empty() {
        return false;
    }
    let later: HashSet<VarId> = source.instructions[index..]
        .iter()
        .filter_map(Instruction::dest)
        .collect();
    source.try_catches.iter().any(|tc| {
        program[tc.handler].phis.iter().any(|phi| {
            phi.incomings
                .iter()
                .any(|inc| inc.source == block && later.contains(&inc.value))
        })
    })
}

/// Exception variables that gained extra definitions, with every block that
/// now defines a version of them.
type ExceptionVersions = Vec<(VarId, HashMap<BlockId, VarId>)>;

fn exec_entry(
    program: &mut Program,
    entry: PlanEntry,
    offset: usize,
    inlined: &mut Vec<InlinedSite>,
    exception_vars: &mut ExceptionVersions,
) {
    let block = entry.block.offset(offset);
    let Some(Instruction::Invoke {
        dest,
        instance,
        arguments,
        ..
    }) = program[block].instructions.get(entry.index).cloned()
    else {
        return;
    };

    let callee = entry.program;
    let split = program.create_block();
    let first = program.create_block();
    for _ in 1..callee.block_count() {
        program.create_block();
    }
    let variable_offset = program.variable_count();
    for _ in 0..callee.variable_count() {
        program.create_variable();
    }

    // Everything after the call moves to the split block.
    let tail = program[block].instructions.split_off(entry.index + 1);
    program[block].instructions.pop();
    // The callee's entry block may be a loop header, so the initialization
    // stays in the caller where it runs once.
    if let Some(class_name) = entry.class_init.map(|_| entry.method.class_name.clone()) {
        program[block]
            .instructions
            .push(Instruction::InitClass { class_name });
    }
    program[block].instructions.push(Instruction::Jump { target: first });
    program[split].instructions = tail;
    copy_try_catches(program, block, split, exception_vars);

    let mapper = ProgramMapper::new(
        |b: BlockId| b.offset(first.index()),
        |v: VarId| match v.index() {
            0 => instance.unwrap_or(VarId::new(variable_offset)),
            i if i <= arguments.len() => arguments[i - 1],
            i => VarId::new(i + variable_offset),
        },
    );

    let mut results = Vec::new();
    for (i, source) in callee.blocks().iter().enumerate() {
        let target = first.offset(i);
        let mut copy = source.clone();
        copy.id = target;
        mapper.apply_to_block(&mut copy);
        if let Some(Instruction::Return { value }) = copy.instructions.last().cloned() {
            if let Some(value) = value {
                results.push(Incoming::new(target, value));
            }
            copy.instructions.pop();
            copy.instructions.push(Instruction::Jump { target: split });
        }
        program[target].phis = copy.phis;
        program[target].instructions = copy.instructions;
        program[target].try_catches = copy.try_catches;
        copy_try_catches(program, block, target, exception_vars);
    }

    if let Some(dest) = dest {
        match results.as_slice() {
            [] => {}
            [single] => program[split]
                .instructions
                .insert(0, Instruction::Copy { dest, src: single.value }),
            _ => program[split].phis.push(Phi {
                dest,
                incomings: results,
            }),
        }
    }

    let successors = program[split]
        .terminator()
        .map(Instruction::targets)
        .unwrap_or_default();
    for successor in successors {
        for phi in &mut program[successor].phis {
            phi.replace_source(block, split);
        }
    }

    inlined.push(InlinedSite {
        block,
        method: entry.method,
        depth: entry.depth,
        class_init: entry.class_init,
    });

    for inner in entry.inner {
        exec_entry(program, inner, first.index(), inlined, exception_vars);
    }
}

/// Protects `target` with the handlers of `source`, each with a fresh
/// exception variable. Handler phis receive a matching incoming from
/// `target`.
fn copy_try_catches(
    program: &mut Program,
    source: BlockId,
    target: BlockId,
    exception_vars: &mut ExceptionVersions,
) {
    let originals = program[source].try_catches.clone();
    for original in originals {
        let exception = program.create_variable();
        for phi in &mut program[original.handler].phis {
            let mirrored: Vec<VarId> = phi
                .incomings
                .iter()
                .filter(|inc| inc.source == source)
                .map(|inc| {
                    if inc.value == original.exception_variable {
                        exception
                    } else {
                        inc.value
                    }
                })
                .collect();
            for value in mirrored {
                phi.add_incoming(target, value);
            }
        }
        program[target].try_catches.push(TryCatch::new(
            original.exception_type.clone(),
            original.handler,
            exception,
        ));

        // A copied region may itself be copied again; all versions belong to
        // the variable the handler originally received.
        let var = original.exception_variable;
        let position = match exception_vars
            .iter()
            .position(|(v, versions)| *v == var || versions.values().any(|d| *d == var))
        {
            Some(position) => position,
            None => {
                exception_vars.push((var, HashMap::from([(source, var)])));
                exception_vars.len() - 1
            }
        };
        exception_vars[position].1.insert(target, exception);
    }
}

impl ProgramPass for InliningPass {
    fn name(&self) -> &'static str {
        "inlining"
    }

    fn description(&self) -> &'static str {
        "Replaces calls to small methods with a copy of their body"
    }

    fn run_on_method(
        &self,
        program: &mut Program,
        method: &MethodRef,
        ctx: &CompilerContext,
    ) -> Result<bool> {
        let report = self.apply(program, ctx.classes())?;
        for site in &report.inlined {
            ctx.events
                .record(EventKind::MethodInlined)
                .at(method.clone(), site.block.index())
                .pass(self.name())
                .message(format!("inlined {} at depth {}", site.method, site.depth));
            if let Some(reason) = site.class_init {
                ctx.events
                    .record(EventKind::ClassInitInserted)
                    .at(method.clone(), site.block.index())
                    .pass(self.name())
                    .message(format!(
                        "initialize {} ({reason})",
                        site.method.class_name
                    ));
            }
        }
        for rejection in &report.rejected {
            let mut message = format!("{}: {}", rejection.method, rejection.reason);
            if let Some(score) = rejection.complexity {
                message.push_str(&format!(" (complexity {score})"));
            }
            ctx.events
                .record(EventKind::InlineRejected)
                .at(method.clone(), rejection.block.index())
                .pass(self.name())
                .message(message);
        }
        Ok(!report.inlined.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        compiler::{ClassModel, ClassRepository, MethodModel, MethodModifiers, OptimizerConfig},
        ir::{
            verify, BinaryBranchCondition, BinaryOp, Interpreter, Outcome, ProgramBuilder, Value,
            CONSTRUCTOR_NAME,
        },
    };

    fn util(name: &str) -> MethodRef {
        MethodRef::new("demo.Util", name, "(I)I")
    }

    /// static int inc(int x) { return x + 1; }
    fn inc_body() -> Program {
        let mut b = ProgramBuilder::new(1);
        let entry = b.block();
        let one = b.constant(entry, 1);
        let sum = b.binary(entry, BinaryOp::Add, b.parameter(1), one);
        b.ret(entry, Some(sum));
        b.build()
    }

    /// static int abs(int x) { if (x < 0) return -x; return x; }
    fn abs_body() -> Program {
        let mut b = ProgramBuilder::new(1);
        let entry = b.block();
        let negative = b.block();
        let positive = b.block();
        let zero = b.constant(entry, 0);
        b.compare_branch(
            entry,
            BinaryBranchCondition::Less,
            b.parameter(1),
            zero,
            negative,
            positive,
        );
        let negated = b.var();
        b.push(
            negative,
            Instruction::Neg {
                dest: negated,
                operand: b.parameter(1),
            },
        );
        b.ret(negative, Some(negated));
        b.ret(positive, Some(b.parameter(1)));
        b.build()
    }

    /// A body of exactly `score` complexity: `score` constants and a return.
    fn body_of_complexity(score: usize) -> Program {
        let mut b = ProgramBuilder::new(1);
        let entry = b.block();
        for value in 0..score {
            b.constant(entry, value as i64);
        }
        b.ret(entry, Some(b.parameter(1)));
        b.build()
    }

    fn repository(methods: Vec<(MethodRef, Program)>) -> ClassRepository {
        let mut class = ClassModel::new("demo.Util");
        for (reference, program) in methods {
            class = class.with_method(MethodModel::new(
                reference,
                MethodModifiers::STATIC,
                program,
            ));
        }
        let repo = ClassRepository::new();
        repo.insert(class);
        repo
    }

    /// int f(int x) { return callee(x) * 2; }
    fn caller_of(callee: &MethodRef) -> Program {
        let mut b = ProgramBuilder::new(1);
        let entry = b.block();
        let two = b.constant(entry, 2);
        let result = b
            .invoke(
                entry,
                callee.clone(),
                InvocationKind::Static,
                None,
                vec![b.parameter(1)],
                true,
            )
            .unwrap();
        let doubled = b.binary(entry, BinaryOp::Mul, result, two);
        b.ret(entry, Some(doubled));
        b.build()
    }

    fn run(program: &Program, classes: &dyn ClassSource, x: i64) -> (Outcome, Vec<String>) {
        let execution = Interpreter::new()
            .with_classes(classes)
            .run(program, None, &[Value::Int(x)])
            .unwrap();
        (execution.outcome, execution.class_inits)
    }

    #[test]
    fn test_complexity_score() {
        assert_eq!(complexity(&inc_body()), 2);
        // entry: const + branch(2), negative: neg, positive: nothing
        assert_eq!(complexity(&abs_body()), 4);
        assert_eq!(complexity(&caller_of(&util("inc"))), 3 + 2);
        assert_eq!(complexity(&body_of_complexity(7)), 7);

        let mut unfinished = inc_body();
        unfinished.create_block();
        assert_eq!(complexity(&unfinished), 2);
    }

    #[test]
    fn test_budget() {
        let pass = InliningPass::default();
        assert_eq!(pass.budget(3, 0), 30);
        assert_eq!(pass.budget(15, 0), 15);
        assert_eq!(pass.budget(40, 2), 13);
        assert_eq!(pass.budget(40, 20), 0);
    }

    #[test]
    fn test_inlines_single_return() {
        let classes = repository(vec![(util("inc"), inc_body())]);
        let original = caller_of(&util("inc"));
        let mut program = original.clone();

        let report = InliningPass::default().apply(&mut program, &classes).unwrap();

        assert_eq!(report.inlined.len(), 1);
        assert_eq!(
            report.inlined[0].class_init,
            Some(ClassInitReason::StaticDispatch)
        );
        verify(&program).unwrap();
        assert!(program
            .blocks()
            .iter()
            .flat_map(|b| &b.instructions)
            .all(|insn| !matches!(insn, Instruction::Invoke { .. })));
        // split block starts with the result copy
        assert!(matches!(
            program[BlockId::new(1)].instructions[0],
            Instruction::Copy { .. }
        ));
        for x in [-3, 0, 41] {
            assert_eq!(run(&original, &classes, x), run(&program, &classes, x));
        }
    }

    #[test]
    fn test_multiple_returns_merge_in_phi() {
        let classes = repository(vec![(util("abs"), abs_body())]);
        let original = caller_of(&util("abs"));
        let mut program = original.clone();

        InliningPass::default().apply(&mut program, &classes).unwrap();

        verify(&program).unwrap();
        let split = &program[BlockId::new(1)];
        assert_eq!(split.phis.len(), 1);
        assert_eq!(split.phis[0].incomings.len(), 2);
        for x in [-7, 0, 7] {
            assert_eq!(run(&original, &classes, x), run(&program, &classes, x));
        }
    }

    #[test]
    fn test_threshold_plus_one_is_rejected() {
        let config = InliningConfig::default();
        // The caller is large enough that no extra budget is granted.
        let mut b = ProgramBuilder::new(1);
        let entry = b.block();
        for value in 0..config.threshold {
            b.constant(entry, value as i64);
        }
        let result = b.invoke(
            entry,
            util("big"),
            InvocationKind::Static,
            None,
            vec![b.parameter(1)],
            true,
        );
        b.ret(entry, result);
        let program = b.build();
        assert!(complexity(&program) >= config.threshold);

        let pass = InliningPass::new(config.clone());
        let over = repository(vec![(util("big"), body_of_complexity(config.threshold + 1))]);
        let mut rejected = Vec::new();
        assert!(pass.plan(&program, &over, &mut rejected).is_empty());
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].reason, RejectReason::OverBudget);
        assert_eq!(rejected[0].complexity, Some(config.threshold + 1));

        let exact = repository(vec![(util("big"), body_of_complexity(config.threshold))]);
        let mut rejected = Vec::new();
        assert_eq!(pass.plan(&program, &exact, &mut rejected).len(), 1);
        assert!(rejected.is_empty());
    }

    #[test]
    fn test_virtual_and_bodiless_calls_are_kept() {
        let abstract_method = MethodRef::new("demo.Util", "shape", "(I)I");
        let repo = ClassRepository::new();
        repo.insert(
            ClassModel::new("demo.Util")
                .with_method(MethodModel::declaration(
                    abstract_method.clone(),
                    MethodModifiers::ABSTRACT,
                ))
                .with_method(MethodModel::new(
                    util("inc"),
                    MethodModifiers::empty(),
                    inc_body(),
                )),
        );

        let mut b = ProgramBuilder::new(1);
        let entry = b.block();
        let this = b.parameter(0);
        b.invoke(
            entry,
            util("inc"),
            InvocationKind::Virtual,
            Some(this),
            vec![b.parameter(1)],
            true,
        );
        b.invoke(
            entry,
            abstract_method.clone(),
            InvocationKind::Special,
            Some(this),
            vec![b.parameter(1)],
            true,
        );
        b.invoke(
            entry,
            MethodRef::new("demo.Missing", "f", "()V"),
            InvocationKind::Static,
            None,
            vec![],
            false,
        );
        b.ret(entry, None);
        let mut program = b.build();
        let before = program.clone();

        let report = InliningPass::default().apply(&mut program, &repo).unwrap();

        assert!(report.inlined.is_empty());
        assert_eq!(program, before);
        let reasons: Vec<RejectReason> = report.rejected.iter().map(|r| r.reason).collect();
        assert_eq!(reasons, vec![RejectReason::Unresolved, RejectReason::NoBody]);
    }

    #[test]
    fn test_synchronized_callee_is_rejected() {
        let repo = ClassRepository::new();
        repo.insert(ClassModel::new("demo.Util").with_method(MethodModel::new(
            util("inc"),
            MethodModifiers::STATIC | MethodModifiers::SYNCHRONIZED,
            inc_body(),
        )));
        let mut program = caller_of(&util("inc"));
        let before = program.clone();

        let report = InliningPass::default().apply(&mut program, &repo).unwrap();

        assert!(report.inlined.is_empty());
        assert_eq!(program, before);
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].reason, RejectReason::Synchronized);
        assert_eq!(report.rejected[0].reason.to_string(), "synchronized");
    }

    #[test]
    fn test_nested_inlining_stops_at_max_depth() {
        // static int rec(int x) { return rec(x); }
        let mut b = ProgramBuilder::new(1);
        let entry = b.block();
        let result = b.invoke(
            entry,
            util("rec"),
            InvocationKind::Static,
            None,
            vec![b.parameter(1)],
            true,
        );
        b.ret(entry, result);
        let rec = b.build();
        let classes = repository(vec![(util("rec"), rec.clone())]);

        let pass = InliningPass::new(InliningConfig::new().with_max_depth(3));
        let mut rejected = Vec::new();
        let plan = pass.plan(&rec, &classes, &mut rejected);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].size(), 3);
        assert_eq!(plan[0].inner[0].index, 0);

        let mut program = rec;
        let report = pass.apply(&mut program, &classes).unwrap();
        assert_eq!(report.inlined.len(), 3);
        assert_eq!(
            report.inlined.iter().map(|s| s.depth).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        verify(&program).unwrap();
        let remaining = program
            .blocks()
            .iter()
            .flat_map(|b| &b.instructions)
            .filter(|insn| matches!(insn, Instruction::Invoke { .. }))
            .count();
        assert_eq!(remaining, 1);
    }

    #[test]
    fn test_constructor_gets_class_init() {
        let init = MethodRef::new("demo.Point", CONSTRUCTOR_NAME, "()V");
        let mut b = ProgramBuilder::new(0);
        let entry = b.block();
        b.ret(entry, None);
        let repo = ClassRepository::new();
        repo.insert(ClassModel::new("demo.Point").with_method(MethodModel::new(
            init.clone(),
            MethodModifiers::empty(),
            b.build(),
        )));

        let mut b = ProgramBuilder::new(0);
        let entry = b.block();
        let object = b.null(entry);
        b.invoke(entry, init, InvocationKind::Special, Some(object), vec![], false);
        b.ret(entry, None);
        let mut program = b.build();

        let report = InliningPass::default().apply(&mut program, &repo).unwrap();

        assert_eq!(report.inlined[0].class_init, Some(ClassInitReason::Constructor));
        verify(&program).unwrap();
        // null; initclass; jump
        assert_eq!(
            program[BlockId::new(0)].instructions[1],
            Instruction::InitClass {
                class_name: "demo.Point".to_string()
            }
        );
    }

    #[test]
    fn test_class_init_stays_out_of_inlined_loop() {
        // static int spin(int x) { while (x < 0) {} return x; }
        let mut b = ProgramBuilder::new(1);
        let head = b.block();
        let done = b.block();
        let zero = b.constant(head, 0);
        b.compare_branch(
            head,
            BinaryBranchCondition::Less,
            b.parameter(1),
            zero,
            head,
            done,
        );
        b.ret(done, Some(b.parameter(1)));
        let classes = repository(vec![(util("spin"), b.build())]);

        // int f(int x) { return spin(x); }
        let mut b = ProgramBuilder::new(1);
        let entry = b.block();
        let result = b.invoke(
            entry,
            util("spin"),
            InvocationKind::Static,
            None,
            vec![b.parameter(1)],
            true,
        );
        b.ret(entry, result);
        let original = b.build();
        let mut program = original.clone();

        let report = InliningPass::default().apply(&mut program, &classes).unwrap();

        assert_eq!(report.inlined.len(), 1);
        verify(&program).unwrap();
        let inits: Vec<BlockId> = program
            .blocks()
            .iter()
            .filter(|block| {
                block
                    .instructions
                    .iter()
                    .any(|insn| matches!(insn, Instruction::InitClass { .. }))
            })
            .map(|block| block.id)
            .collect();
        assert_eq!(inits, vec![BlockId::new(0)]);
        let caller = &program[BlockId::new(0)].instructions;
        assert!(matches!(
            caller[caller.len() - 2],
            Instruction::InitClass { .. }
        ));
        assert_eq!(
            caller.last(),
            Some(&Instruction::Jump {
                target: BlockId::new(2)
            })
        );
        for x in [0, 3] {
            assert_eq!(run(&original, &classes, x), run(&program, &classes, x));
        }
    }

    #[test]
    fn test_caller_handlers_cover_inlined_blocks() {
        // static int div(int x) { return 10 / x; }
        let mut b = ProgramBuilder::new(1);
        let entry = b.block();
        let ten = b.constant(entry, 10);
        let quotient = b.binary(entry, BinaryOp::Div, ten, b.parameter(1));
        b.ret(entry, Some(quotient));
        let classes = repository(vec![(util("div"), b.build())]);

        // try { return div(x); } catch (*) { return -1; }
        let mut b = ProgramBuilder::new(1);
        let entry = b.block();
        let handler = b.block();
        let result = b.invoke(
            entry,
            util("div"),
            InvocationKind::Static,
            None,
            vec![b.parameter(1)],
            true,
        );
        b.ret(entry, result);
        b.try_catch(entry, None, handler);
        let minus_one = b.constant(handler, -1);
        b.ret(handler, Some(minus_one));
        let original = b.build();
        let mut program = original.clone();

        InliningPass::default().apply(&mut program, &classes).unwrap();

        verify(&program).unwrap();
        let split = &program[BlockId::new(2)];
        let inlined = &program[BlockId::new(3)];
        assert_eq!(split.try_catches.len(), 1);
        assert_eq!(inlined.try_catches.len(), 1);
        assert_ne!(
            split.try_catches[0].exception_variable,
            inlined.try_catches[0].exception_variable
        );
        for x in [0, 5] {
            assert_eq!(run(&original, &classes, x), run(&program, &classes, x));
        }
    }

    #[test]
    fn test_pass_records_events() {
        let classes: Arc<dyn ClassSource> = Arc::new(repository(vec![(util("inc"), inc_body())]));
        let ctx = CompilerContext::new(classes, OptimizerConfig::new());
        let caller = MethodRef::new("demo.Main", "f", "(I)I");
        let mut program = caller_of(&util("inc"));

        let changed = InliningPass::default()
            .run_on_method(&mut program, &caller, &ctx)
            .unwrap();

        assert!(changed);
        assert_eq!(ctx.events.count_kind(EventKind::MethodInlined), 1);
        assert_eq!(ctx.events.count_kind(EventKind::ClassInitInserted), 1);
        assert!(!ctx.events.has(EventKind::InlineRejected));
    }
}
