//! Compiled functions.

use std::ops::Deref;
use std::sync::Arc;

use nodevm_core::{OpCode, STACK_INVALID, TypeDesc, Word};

use super::InstructionReader;

/// A graph input as seen by a compiled function.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionArgument {
    pub name: String,
    pub typedesc: TypeDesc,
    /// Stack slot the caller's value is copied to, `STACK_INVALID` if the
    /// input is not read.
    pub stack_index: Word,
    /// Number of consumers of a resource argument.
    pub use_count: u32,
}

impl FunctionArgument {
    pub fn is_used(&self) -> bool {
        self.stack_index != STACK_INVALID
    }
}

/// A graph output as seen by a compiled function.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionReturn {
    pub name: String,
    pub typedesc: TypeDesc,
    pub stack_index: Word,
}

/// A compiled graph: flat instruction words plus argument and return tables.
///
/// Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    name: String,
    code: Vec<Word>,
    entry: usize,
    arguments: Vec<FunctionArgument>,
    returns: Vec<FunctionReturn>,
}

impl Function {
    pub fn new(
        name: impl Into<String>,
        code: Vec<Word>,
        entry: usize,
        arguments: Vec<FunctionArgument>,
        returns: Vec<FunctionReturn>,
    ) -> Self {
        Self {
            name: name.into(),
            code,
            entry,
            arguments,
            returns,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn code(&self) -> &[Word] {
        &self.code
    }

    /// Address of the first instruction of the main block.
    pub fn entry(&self) -> usize {
        self.entry
    }

    pub fn arguments(&self) -> &[FunctionArgument] {
        &self.arguments
    }

    pub fn returns(&self) -> &[FunctionReturn] {
        &self.returns
    }

    pub fn argument(&self, name: &str) -> Option<&FunctionArgument> {
        self.arguments.iter().find(|a| a.name == name)
    }

    pub fn return_value(&self, name: &str) -> Option<&FunctionReturn> {
        self.returns.iter().find(|r| r.name == name)
    }

    /// Every opcode in the code, in address order, skipping operands.
    pub fn opcodes(&self) -> Vec<OpCode> {
        let mut ops = Vec::new();
        let mut reader = InstructionReader::new(&self.code);
        while !reader.is_at_end() {
            let op = reader.read_opcode();
            for &operand in op.operands() {
                reader.skip_operand(operand);
            }
            ops.push(op);
        }
        ops
    }

    /// Number of instructions, block terminators excluded.
    pub fn instruction_count(&self) -> usize {
        self.opcodes().iter().filter(|&&op| op != OpCode::End).count()
    }

    /// Check that the code is exactly the given opcode sequence.
    ///
    /// Panics with a descriptive message if the sequences don't match.
    #[track_caller]
    pub fn assert_opcodes(&self, expected: &[OpCode]) {
        let actual = self.opcodes();
        assert_eq!(
            actual,
            expected,
            "Bytecode mismatch.\nExpected: {:?}\nActual:   {:?}",
            expected.iter().map(|op| op.name()).collect::<Vec<_>>(),
            actual.iter().map(|op| op.name()).collect::<Vec<_>>(),
        );
    }

    /// Check that the code contains the given opcodes in order, not
    /// necessarily contiguous.
    #[track_caller]
    pub fn assert_contains_opcodes(&self, expected: &[OpCode]) {
        let actual = self.opcodes();
        let mut expected_iter = expected.iter().peekable();

        for op in &actual {
            if expected_iter.peek() == Some(&op) {
                expected_iter.next();
            }
        }

        if expected_iter.peek().is_some() {
            let remaining: Vec<_> = expected_iter.map(|op| op.name()).collect();
            panic!(
                "Missing opcodes in sequence.\nExpected to find: {:?}\nActual bytecode:  {:?}",
                remaining,
                actual.iter().map(|op| op.name()).collect::<Vec<_>>(),
            );
        }
    }
}

/// Reference-counted handle to an immutable [`Function`].
///
/// `retain` hands out another reference; `release` gives one back and reports
/// whether it was the last, in which case the function is dropped.
///
/// # Thread Safety
///
/// `SharedFunction` is `Send + Sync`; any number of evaluators may run the
/// same function concurrently.
#[derive(Debug)]
pub struct SharedFunction(Arc<Function>);

impl SharedFunction {
    pub fn new(function: Function) -> Self {
        Self(Arc::new(function))
    }

    /// Take another reference.
    #[must_use]
    pub fn retain(&self) -> SharedFunction {
        SharedFunction(Arc::clone(&self.0))
    }

    /// Give up this reference. Returns `true` if it was the last one and the
    /// function was destroyed.
    pub fn release(self) -> bool {
        Arc::into_inner(self.0).is_some()
    }

    /// Number of live references.
    pub fn users(&self) -> usize {
        Arc::strong_count(&self.0)
    }

    pub fn ptr_eq(&self, other: &SharedFunction) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Deref for SharedFunction {
    type Target = Function;

    fn deref(&self) -> &Function {
        &self.0
    }
}
