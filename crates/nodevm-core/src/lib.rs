//! Shared types for the nodevm crates.
//!
//! This crate holds everything the graph, compiler and evaluator agree on:
//! the closed set of socket types, literal values, vector/matrix math, the
//! opcode enumeration with its operand layouts, identifiers, and the error
//! hierarchy.

mod error;
mod ids;
mod math;
mod opcode;
mod typedesc;
mod value;

pub use error::{CompileError, GraphError, NodeVmError};
pub use ids::{BlockId, ImageKey, NodeId, ObjectKey};
pub use math::{Float3, Float4, Matrix44};
pub use opcode::{OpCode, Operand};
pub use typedesc::{TypeDesc, word_size};
pub use value::Value;

/// One word of bytecode or value stack.
pub type Word = u32;

/// Capacity of the evaluation value stack, in words.
pub const STACK_SIZE: usize = 4095;

/// Unused stack slot / invalid jump target.
pub const STACK_INVALID: Word = 0xFFFF_FFFF;
