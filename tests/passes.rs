//! Integration tests for the optimization pipeline.
//!
//! These tests run whole methods through the pass scheduler and check that
//! the transformed programs still verify and compute the same results.

use std::sync::Arc;

use optiscope::{
    compiler::{EventKind, InliningConfig, RejectReason},
    prelude::*,
    Result,
};
use proptest::prelude::*;

fn util(name: &str) -> MethodRef {
    MethodRef::new("demo.Util", name, "(I)I")
}

fn main_method() -> MethodRef {
    MethodRef::new("demo.Main", "count", "(I)I")
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

fn classes() -> Arc<ClassRepository> {
    let repo = ClassRepository::new();
    repo.insert(ClassModel::new("demo.Util").with_method(MethodModel::new(
        util("inc"),
        MethodModifiers::STATIC,
        inc_body(),
    )));
    Arc::new(repo)
}

/// ```text
/// static int count(int n) {
///     int acc = 0;
///     for (int i = 0; i < n; i++) acc = Util.inc(acc);
///     return acc;
/// }
/// ```
fn counting_caller() -> Program {
    let mut b = ProgramBuilder::new(1);
    let n = b.parameter(1);
    let entry = b.block();
    let head = b.block();
    let body = b.block();
    let exit = b.block();

    let zero = b.constant(entry, 0);
    let one = b.constant(entry, 1);
    b.jump(entry, head);

    let i = b.phi(head);
    let acc = b.phi(head);
    b.compare_branch(head, BinaryBranchCondition::GreaterOrEqual, i, n, exit, body);

    let called = b
        .invoke(
            body,
            util("inc"),
            InvocationKind::Static,
            None,
            vec![acc],
            true,
        )
        .unwrap_or(acc);
    let next_i = b.binary(body, BinaryOp::Add, i, one);
    b.jump(body, head);

    b.incoming(head, i, entry, zero);
    b.incoming(head, i, body, next_i);
    b.incoming(head, acc, entry, zero);
    b.incoming(head, acc, body, called);
    b.ret(exit, Some(acc));
    b.build()
}

fn run(program: &Program, classes: &dyn ClassSource, n: i64) -> Result<(Outcome, Vec<String>)> {
    let execution = Interpreter::new()
        .with_classes(classes)
        .run(program, None, &[Value::Int(n)])?;
    Ok((execution.outcome, execution.class_inits))
}

fn has_invoke(program: &Program) -> bool {
    program
        .blocks()
        .iter()
        .flat_map(|block| &block.instructions)
        .any(|insn| matches!(insn, Instruction::Invoke { .. }))
}

#[test]
fn pipeline_inverts_and_inlines() -> Result<()> {
    let classes = classes();
    let config = OptimizerConfig::new().with_parallel(false);
    let ctx = CompilerContext::new(classes.clone(), config.clone());
    let original = counting_caller();
    ctx.add_program(main_method(), original.clone());

    let changed = PassScheduler::from_config(&config).run_pipeline(&ctx)?;
    assert!(changed);

    let optimized = ctx.program(&main_method()).expect("program is put back");
    verify(&optimized)?;
    assert!(!has_invoke(&optimized));
    assert!(ctx.events.has(EventKind::LoopInverted));
    assert!(ctx.events.has(EventKind::MethodInlined));
    assert!(ctx.events.has(EventKind::ClassInitInserted));

    for n in 0..6 {
        assert_eq!(
            run(&original, classes.as_ref(), n)?,
            run(&optimized, classes.as_ref(), n)?,
            "n = {n}"
        );
    }
    let (outcome, inits) = run(&optimized, classes.as_ref(), 4)?;
    assert_eq!(outcome, Outcome::Returned(Some(Value::Int(4))));
    assert_eq!(inits, vec!["demo.Util".to_string()]);
    Ok(())
}

#[test]
fn parallel_pipeline_processes_every_method() -> Result<()> {
    let classes = classes();
    let config = OptimizerConfig::new().with_parallel(true);
    let ctx = CompilerContext::new(classes.clone(), config.clone());

    let methods: Vec<MethodRef> = (0..8)
        .map(|index| MethodRef::new("demo.Main", format!("count{index}"), "(I)I"))
        .collect();
    for method in &methods {
        ctx.add_program(method.clone(), counting_caller());
    }

    PassScheduler::from_config(&config).run_pipeline(&ctx)?;

    for method in &methods {
        let program = ctx.program(method).expect("program is put back");
        verify(&program)?;
        assert!(!has_invoke(&program), "{method} still calls");
        let (outcome, _) = run(&program, classes.as_ref(), 3)?;
        assert_eq!(outcome, Outcome::Returned(Some(Value::Int(3))));
    }
    assert_eq!(ctx.events.count_kind(EventKind::MethodInlined), methods.len());
    Ok(())
}

#[test]
fn over_budget_call_is_kept() -> Result<()> {
    let classes = classes();
    let config = OptimizerConfig::new()
        .with_parallel(false)
        .with_loop_inversion(false)
        .with_inlining(InliningConfig::new().with_threshold(1));
    let ctx = CompilerContext::new(classes.clone(), config.clone());
    ctx.add_program(main_method(), counting_caller());

    PassScheduler::from_config(&config).run_pipeline(&ctx)?;

    let program = ctx.program(&main_method()).expect("program is put back");
    assert!(has_invoke(&program));
    assert!(ctx.events.has(EventKind::InlineRejected));
    assert!(!ctx.events.has(EventKind::MethodInlined));

    let mut direct = counting_caller();
    let report = InliningPass::new(InliningConfig::new().with_threshold(1))
        .apply(&mut direct, classes.as_ref())?;
    assert!(report.inlined.is_empty());
    assert_eq!(report.rejected.len(), 1);
    assert_eq!(report.rejected[0].reason, RejectReason::OverBudget);
    Ok(())
}

#[test]
fn unresolved_calls_survive_the_pipeline() -> Result<()> {
    let config = OptimizerConfig::new().with_parallel(false);
    let ctx = CompilerContext::new(Arc::new(ClassRepository::new()), config.clone());
    ctx.add_program(main_method(), counting_caller());

    PassScheduler::from_config(&config).run_pipeline(&ctx)?;

    let program = ctx.program(&main_method()).expect("program is put back");
    verify(&program)?;
    assert!(has_invoke(&program));
    assert!(ctx.events.has(EventKind::InlineRejected));
    Ok(())
}

#[test]
fn profitability_check_keeps_plain_counting_loop() -> Result<()> {
    let classes = classes();
    let config = OptimizerConfig::new()
        .with_parallel(false)
        .with_inversion_profitability(true);
    let ctx = CompilerContext::new(classes.clone(), config.clone());
    let original = counting_caller();
    ctx.add_program(main_method(), original.clone());

    PassScheduler::from_config(&config).run_pipeline(&ctx)?;

    let optimized = ctx.program(&main_method()).expect("program is put back");
    verify(&optimized)?;
    assert!(!ctx.events.has(EventKind::LoopInverted));
    assert!(ctx
        .events
        .filter_kind(EventKind::LoopSkipped)
        .any(|event| event.message.contains("not profitable")));
    assert!(ctx.events.has(EventKind::MethodInlined));
    for n in 0..4 {
        assert_eq!(
            run(&original, classes.as_ref(), n)?,
            run(&optimized, classes.as_ref(), n)?,
            "n = {n}"
        );
    }
    Ok(())
}

/// One step of a generated straight-line block.
#[derive(Debug, Clone)]
enum Op {
    Constant(i64),
    NewArray,
    /// Unwraps the n-th array created so far, or the parameter if none
    Unwrap(usize),
}

fn ops() -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(
        prop_oneof![
            (0i64..100).prop_map(Op::Constant),
            Just(Op::NewArray),
            (0usize..8).prop_map(Op::Unwrap),
        ],
        1..24,
    )
}

fn straight_line(ops: &[Op]) -> Program {
    let mut b = ProgramBuilder::new(1);
    let entry = b.block();
    let mut arrays: Vec<VarId> = Vec::new();
    for op in ops {
        match op {
            Op::Constant(value) => {
                b.constant(entry, *value);
            }
            Op::NewArray => {
                let size = b.constant(entry, 4);
                arrays.push(b.new_array(entry, ElementType::Int, size));
            }
            Op::Unwrap(index) => {
                let array = if arrays.is_empty() {
                    b.parameter(1)
                } else {
                    arrays[index % arrays.len()]
                };
                b.unwrap_array(entry, array, ElementType::Int);
            }
        }
    }
    b.ret(entry, None);
    b.build()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn unwraps_follow_their_array(ops in ops()) {
        let mut program = straight_line(&ops);
        let before = program.instruction_count();

        UnwrapMotionPass::new().apply(&mut program);

        let instructions = &program.blocks()[0].instructions;
        for (position, insn) in instructions.iter().enumerate() {
            let Instruction::UnwrapArray { array, .. } = insn else {
                continue;
            };
            let previous = instructions[..position]
                .iter()
                .rev()
                .find(|insn| !matches!(insn, Instruction::UnwrapArray { .. }));
            if let Some(previous) = previous {
                prop_assert_eq!(previous.dest(), Some(*array), "at {}", position);
            }
        }
        // Moved unwraps leave a nop behind, nothing is dropped.
        let live = instructions.iter().filter(|insn| !insn.is_nop()).count();
        prop_assert_eq!(live, before);
    }
}
