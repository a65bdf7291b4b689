//! Reference interpreter for [`Program`]s.
//!
//! The interpreter gives programs an executable meaning so that a program can
//! be compared with its transformed version. Values are 64-bit integers,
//! `null`, arrays, and runtime exceptions. Calls are resolved through a
//! [`ClassSource`]; raised values travel along try/catch edges exactly like
//! the control-flow graph models them.
//!
//! Besides the outcome, an [`Execution`] records how often each block of the
//! top-level program was entered and the order in which classes were
//! initialized, so tests can check that a rewrite preserved iteration counts
//! and initialization side effects.

use std::{cell::RefCell, collections::HashSet, fmt, rc::Rc};

use crate::{
    compiler::ClassSource,
    ir::{
        BinaryBranchCondition, BinaryOp, BlockId, BranchCondition, ElementType, Instruction,
        MethodRef, Program, VarId,
    },
    Error, Result,
};

/// Exception type raised for division by zero.
pub const ARITHMETIC_EXCEPTION: &str = "java.lang.ArithmeticException";
/// Exception type raised when `null` is dereferenced.
pub const NULL_POINTER_EXCEPTION: &str = "java.lang.NullPointerException";
/// Exception type raised for out-of-range element accesses.
pub const INDEX_EXCEPTION: &str = "java.lang.ArrayIndexOutOfBoundsException";
/// Exception type raised for negative array sizes.
pub const NEGATIVE_SIZE_EXCEPTION: &str = "java.lang.NegativeArraySizeException";

/// Shared, mutable array storage.
pub type ArrayRef = Rc<RefCell<Vec<Value>>>;

/// A runtime value.
#[derive(Debug, Clone)]
pub enum Value {
    /// Any integral value
    Int(i64),
    /// The null reference
    Null,
    /// A reference to an array
    Array(ArrayRef),
    /// A runtime exception object of the named type
    Exception(String),
}

impl Value {
    /// Returns the integer payload.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(value) => Some(*value),
            _ => None,
        }
    }

    fn same_reference(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Exception(a), Value::Exception(b)) => a == b,
            _ => false,
        }
    }

    fn default_for(element: ElementType) -> Value {
        match element {
            ElementType::Object => Value::Null,
            _ => Value::Int(0),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Array(a), Value::Array(b)) => *a.borrow() == *b.borrow(),
            _ => self.same_reference(other),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(value) => write!(f, "{value}"),
            Value::Null => f.write_str("null"),
            Value::Array(items) => {
                f.write_str("[")?;
                for (index, item) in items.borrow().iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Exception(class) => write!(f, "<{class}>"),
        }
    }
}

/// How a program run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The program returned, with or without a value.
    Returned(Option<Value>),
    /// A value was raised and not caught.
    Raised(Value),
}

/// Observable result of running a program.
#[derive(Debug, Clone, PartialEq)]
pub struct Execution {
    /// How the run ended
    pub outcome: Outcome,
    /// Number of times each block of the top-level program was entered
    pub visits: Vec<usize>,
    /// Classes in the order they were first initialized
    pub class_inits: Vec<String>,
    /// Number of instructions executed across all frames
    pub steps: usize,
}

impl Execution {
    /// Returns the number of times `block` was entered.
    #[must_use]
    pub fn visits_of(&self, block: BlockId) -> usize {
        self.visits.get(block.index()).copied().unwrap_or(0)
    }
}

/// Executes programs.
///
/// ```rust
/// use optiscope::ir::{BinaryOp, Interpreter, Outcome, ProgramBuilder, Value};
///
/// let mut b = ProgramBuilder::new(1);
/// let entry = b.block();
/// let two = b.constant(entry, 2);
/// let product = b.binary(entry, BinaryOp::Mul, b.parameter(1), two);
/// b.ret(entry, Some(product));
///
/// let run = Interpreter::new()
///     .run(&b.build(), None, &[Value::Int(21)])
///     .unwrap();
/// assert_eq!(run.outcome, Outcome::Returned(Some(Value::Int(42))));
/// ```
pub struct Interpreter<'a> {
    classes: Option<&'a dyn ClassSource>,
    fuel: usize,
    max_depth: usize,
}

impl Default for Interpreter<'_> {
    fn default() -> Self {
        Interpreter {
            classes: None,
            fuel: 1_000_000,
            max_depth: 64,
        }
    }
}

enum Flow {
    Goto(BlockId),
    Raise(Value),
    Return(Option<Value>),
}

struct Machine<'a, 'i> {
    interpreter: &'i Interpreter<'a>,
    steps: usize,
    visits: Vec<usize>,
    class_inits: Vec<String>,
    initialized: HashSet<String>,
}

impl<'a> Interpreter<'a> {
    /// Creates an interpreter without a class source, a budget of one million
    /// instructions and a call depth limit of 64.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves calls through `classes`.
    #[must_use]
    pub fn with_classes(mut self, classes: &'a dyn ClassSource) -> Self {
        self.classes = Some(classes);
        self
    }

    /// Sets the instruction budget.
    #[must_use]
    pub fn with_fuel(mut self, fuel: usize) -> Self {
        self.fuel = fuel;
        self
    }

    /// Sets the call depth limit.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Runs `program` with the given receiver and arguments.
    ///
    /// Variable 0 receives `instance` (or `null`), variables `1..=n` the
    /// arguments.
    ///
    /// # Errors
    ///
    /// - [`Error::ExecutionLimit`] when the instruction budget is spent
    /// - [`Error::RecursionLimit`] when calls nest deeper than allowed
    /// - [`Error::Error`] for reads of undefined variables, ill-typed
    ///   operands, or calls that cannot be resolved
    pub fn run(
        &self,
        program: &Program,
        instance: Option<Value>,
        arguments: &[Value],
    ) -> Result<Execution> {
        let mut machine = Machine {
            interpreter: self,
            steps: 0,
            visits: vec![0; program.block_count()],
            class_inits: Vec::new(),
            initialized: HashSet::new(),
        };
        let outcome = machine.call(program, instance, arguments, 0)?;
        Ok(Execution {
            outcome,
            visits: machine.visits,
            class_inits: machine.class_inits,
            steps: machine.steps,
        })
    }
}

impl Machine<'_, '_> {
    fn call(
        &mut self,
        program: &Program,
        instance: Option<Value>,
        arguments: &[Value],
        depth: usize,
    ) -> Result<Outcome> {
        if depth > self.interpreter.max_depth {
            return Err(Error::RecursionLimit(self.interpreter.max_depth));
        }

        let mut frame: Vec<Option<Value>> = vec![None; program.variable_count()];
        set(&mut frame, VarId::new(0), instance.unwrap_or(Value::Null))?;
        for (index, argument) in arguments.iter().enumerate() {
            set(&mut frame, VarId::new(index + 1), argument.clone())?;
        }

        let mut previous: Option<BlockId> = None;
        let mut current = program.entry();
        loop {
            let block = program
                .block(current)
                .ok_or_else(|| Error::Error(format!("jump to missing block {current}")))?;
            if depth == 0 {
                self.visits[current.index()] += 1;
            }

            if let Some(previous) = previous {
                let mut values = Vec::with_capacity(block.phis.len());
                for phi in &block.phis {
                    let source = phi.incoming_from(previous).ok_or_else(|| {
                        Error::Error(format!("phi {} has no value for {previous}", phi.dest))
                    })?;
                    values.push((phi.dest, get(&frame, source)?));
                }
                for (dest, value) in values {
                    set(&mut frame, dest, value)?;
                }
            }

            let mut flow = None;
            for insn in &block.instructions {
                self.consume()?;
                if let Some(next) = self.execute(insn, &mut frame, depth)? {
                    flow = Some(next);
                    break;
                }
            }

            let flow = flow.ok_or_else(|| {
                Error::Error(format!("block {current} ends without a terminator"))
            })?;
            match flow {
                Flow::Goto(target) => {
                    previous = Some(current);
                    current = target;
                }
                Flow::Return(value) => return Ok(Outcome::Returned(value)),
                Flow::Raise(exception) => {
                    let handler = block
                        .try_catches
                        .iter()
                        .find(|tc| catches(tc.exception_type.as_deref(), &exception));
                    match handler {
                        Some(tc) => {
                            set(&mut frame, tc.exception_variable, exception)?;
                            previous = Some(current);
                            current = tc.handler;
                        }
                        None => return Ok(Outcome::Raised(exception)),
                    }
                }
            }
        }
    }

    fn consume(&mut self) -> Result<()> {
        self.steps += 1;
        if self.steps > self.interpreter.fuel {
            return Err(Error::ExecutionLimit(self.interpreter.fuel));
        }
        Ok(())
    }

    fn initialize(&mut self, class_name: &str) {
        if self.initialized.insert(class_name.to_string()) {
            self.class_inits.push(class_name.to_string());
        }
    }

    fn execute(
        &mut self,
        insn: &Instruction,
        frame: &mut [Option<Value>],
        depth: usize,
    ) -> Result<Option<Flow>> {
        match insn {
            Instruction::Nop => {}
            Instruction::Const { dest, value } => set(frame, *dest, Value::Int(*value))?,
            Instruction::Null { dest } => set(frame, *dest, Value::Null)?,
            Instruction::Copy { dest, src } => {
                let value = get(frame, *src)?;
                set(frame, *dest, value)?;
            }
            Instruction::Binary {
                dest,
                op,
                left,
                right,
            } => {
                let left = int(frame, *left)?;
                let right = int(frame, *right)?;
                match binary(*op, left, right) {
                    Some(value) => set(frame, *dest, Value::Int(value))?,
                    None => return Ok(Some(raise(ARITHMETIC_EXCEPTION))),
                }
            }
            Instruction::Neg { dest, operand } => {
                let value = int(frame, *operand)?.wrapping_neg();
                set(frame, *dest, Value::Int(value))?;
            }
            Instruction::NewArray {
                dest,
                element,
                size,
            } => {
                let size = int(frame, *size)?;
                let Ok(size) = usize::try_from(size) else {
                    return Ok(Some(raise(NEGATIVE_SIZE_EXCEPTION)));
                };
                let items = vec![Value::default_for(*element); size];
                set(frame, *dest, Value::Array(Rc::new(RefCell::new(items))))?;
            }
            Instruction::UnwrapArray { dest, array, .. } => match get(frame, *array)? {
                Value::Null => return Ok(Some(raise(NULL_POINTER_EXCEPTION))),
                value @ Value::Array(_) => set(frame, *dest, value)?,
                other => return Err(Error::Error(format!("unwrap of non-array {other}"))),
            },
            Instruction::LoadElement { dest, array, index } => {
                let index = int(frame, *index)?;
                let items = match array_of(frame, *array)? {
                    Ok(items) => items,
                    Err(flow) => return Ok(Some(flow)),
                };
                let value = usize::try_from(index)
                    .ok()
                    .and_then(|i| items.borrow().get(i).cloned());
                match value {
                    Some(value) => set(frame, *dest, value)?,
                    None => return Ok(Some(raise(INDEX_EXCEPTION))),
                }
            }
            Instruction::StoreElement {
                array,
                index,
                value,
            } => {
                let index = int(frame, *index)?;
                let value = get(frame, *value)?;
                let items = match array_of(frame, *array)? {
                    Ok(items) => items,
                    Err(flow) => return Ok(Some(flow)),
                };
                let mut items = items.borrow_mut();
                match usize::try_from(index).ok().and_then(|i| items.get_mut(i)) {
                    Some(slot) => *slot = value,
                    None => return Ok(Some(raise(INDEX_EXCEPTION))),
                }
            }
            Instruction::ArrayLength { dest, array } => {
                let items = match array_of(frame, *array)? {
                    Ok(items) => items,
                    Err(flow) => return Ok(Some(flow)),
                };
                let length = items.borrow().len();
                set(frame, *dest, Value::Int(length as i64))?;
            }
            Instruction::Invoke {
                dest,
                instance,
                method,
                arguments,
                ..
            } => {
                let instance = instance.map(|v| get(frame, v)).transpose()?;
                if instance.is_none() || method.is_constructor() {
                    self.initialize(&method.class_name);
                }
                if matches!(instance, Some(Value::Null)) {
                    return Ok(Some(raise(NULL_POINTER_EXCEPTION)));
                }
                let arguments = arguments
                    .iter()
                    .map(|v| get(frame, *v))
                    .collect::<Result<Vec<_>>>()?;
                match self.invoke(method, instance, &arguments, depth)? {
                    Outcome::Returned(value) => {
                        if let Some(dest) = dest {
                            let value = value.ok_or_else(|| {
                                Error::Error(format!("{method} returned no value"))
                            })?;
                            set(frame, *dest, value)?;
                        }
                    }
                    Outcome::Raised(exception) => return Ok(Some(Flow::Raise(exception))),
                }
            }
            Instruction::InitClass { class_name } => self.initialize(class_name),
            Instruction::Jump { target } => return Ok(Some(Flow::Goto(*target))),
            Instruction::Branch {
                condition,
                operand,
                true_target,
                false_target,
            } => {
                let value = get(frame, *operand)?;
                let taken = match condition {
                    BranchCondition::Null => matches!(value, Value::Null),
                    BranchCondition::NotNull => !matches!(value, Value::Null),
                    _ => {
                        let value = value.as_int().ok_or_else(|| {
                            Error::Error(format!("branch on non-integer {value}"))
                        })?;
                        compare_to_zero(*condition, value)
                    }
                };
                let target = if taken { true_target } else { false_target };
                return Ok(Some(Flow::Goto(*target)));
            }
            Instruction::BinaryBranch {
                condition,
                left,
                right,
                true_target,
                false_target,
            } => {
                let taken = match condition {
                    BinaryBranchCondition::ReferenceEqual => {
                        get(frame, *left)?.same_reference(&get(frame, *right)?)
                    }
                    BinaryBranchCondition::ReferenceNotEqual => {
                        !get(frame, *left)?.same_reference(&get(frame, *right)?)
                    }
                    _ => compare(*condition, int(frame, *left)?, int(frame, *right)?),
                };
                let target = if taken { true_target } else { false_target };
                return Ok(Some(Flow::Goto(*target)));
            }
            Instruction::Switch {
                value,
                cases,
                default,
            } => {
                let value = int(frame, *value)?;
                let target = cases
                    .iter()
                    .find(|case| case.value == value)
                    .map_or(*default, |case| case.target);
                return Ok(Some(Flow::Goto(target)));
            }
            Instruction::Return { value } => {
                let value = value.map(|v| get(frame, v)).transpose()?;
                return Ok(Some(Flow::Return(value)));
            }
            Instruction::Throw { exception } => {
                let value = match get(frame, *exception)? {
                    Value::Null => Value::Exception(NULL_POINTER_EXCEPTION.to_string()),
                    value => value,
                };
                return Ok(Some(Flow::Raise(value)));
            }
        }
        Ok(None)
    }

    fn invoke(
        &mut self,
        method: &MethodRef,
        instance: Option<Value>,
        arguments: &[Value],
        depth: usize,
    ) -> Result<Outcome> {
        let classes = self
            .interpreter
            .classes
            .ok_or_else(|| Error::Error(format!("no class source to resolve {method}")))?;
        let model = classes
            .method(method)
            .ok_or_else(|| Error::Error(format!("unknown method {method}")))?;
        let body = model
            .body()
            .ok_or_else(|| Error::Error(format!("{method} has no body")))?;
        self.call(body, instance, arguments, depth + 1)
    }
}

fn raise(class_name: &str) -> Flow {
    Flow::Raise(Value::Exception(class_name.to_string()))
}

fn catches(exception_type: Option<&str>, exception: &Value) -> bool {
    match (exception_type, exception) {
        (None, _) => true,
        (Some(expected), Value::Exception(actual)) => expected == actual,
        _ => false,
    }
}

fn get(frame: &[Option<Value>], var: VarId) -> Result<Value> {
    frame
        .get(var.index())
        .and_then(Clone::clone)
        .ok_or_else(|| Error::Error(format!("read of undefined variable {var}")))
}

fn set(frame: &mut [Option<Value>], var: VarId, value: Value) -> Result<()> {
    let slot = frame
        .get_mut(var.index())
        .ok_or_else(|| Error::Error(format!("write to unknown variable {var}")))?;
    *slot = Some(value);
    Ok(())
}

fn int(frame: &[Option<Value>], var: VarId) -> Result<i64> {
    let value = get(frame, var)?;
    value
        .as_int()
        .ok_or_else(|| Error::Error(format!("expected an integer in {var}, found {value}")))
}

/// Returns the array behind `var`, or the exception to raise for `null`.
fn array_of(frame: &[Option<Value>], var: VarId) -> Result<std::result::Result<ArrayRef, Flow>> {
    match get(frame, var)? {
        Value::Array(items) => Ok(Ok(items)),
        Value::Null => Ok(Err(raise(NULL_POINTER_EXCEPTION))),
        other => Err(Error::Error(format!("expected an array in {var}, found {other}"))),
    }
}

fn binary(op: BinaryOp, left: i64, right: i64) -> Option<i64> {
    Some(match op {
        BinaryOp::Add => left.wrapping_add(right),
        BinaryOp::Sub => left.wrapping_sub(right),
        BinaryOp::Mul => left.wrapping_mul(right),
        BinaryOp::Div => {
            if right == 0 {
                return None;
            }
            left.wrapping_div(right)
        }
        BinaryOp::Rem => {
            if right == 0 {
                return None;
            }
            left.wrapping_rem(right)
        }
        BinaryOp::And => left & right,
        BinaryOp::Or => left | right,
        BinaryOp::Xor => left ^ right,
        BinaryOp::Shl => left.wrapping_shl((right & 63) as u32),
        BinaryOp::Shr => left.wrapping_shr((right & 63) as u32),
        BinaryOp::Compare => match left.cmp(&right) {
            std::cmp::Ordering::Less => -1,
            std::cmp::Ordering::Equal => 0,
            std::cmp::Ordering::Greater => 1,
        },
    })
}

fn compare_to_zero(condition: BranchCondition, value: i64) -> bool {
    match condition {
        BranchCondition::Equal => value == 0,
        BranchCondition::NotEqual => value != 0,
        BranchCondition::Less => value < 0,
        BranchCondition::LessOrEqual => value <= 0,
        BranchCondition::Greater => value > 0,
        BranchCondition::GreaterOrEqual => value >= 0,
        BranchCondition::Null | BranchCondition::NotNull => false,
    }
}

fn compare(condition: BinaryBranchCondition, left: i64, right: i64) -> bool {
    match condition {
        BinaryBranchCondition::Equal => left == right,
        BinaryBranchCondition::NotEqual => left != right,
        BinaryBranchCondition::Less => left < right,
        BinaryBranchCondition::LessOrEqual => left <= right,
        BinaryBranchCondition::Greater => left > right,
        BinaryBranchCondition::GreaterOrEqual => left >= right,
        BinaryBranchCondition::ReferenceEqual => left == right,
        BinaryBranchCondition::ReferenceNotEqual => left != right,
    }
}
