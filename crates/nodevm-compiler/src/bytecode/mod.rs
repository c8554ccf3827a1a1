//! Bytecode format.
//!
//! Every opcode and every operand word is a `u32`:
//!
//! - floats are stored by bit pattern, ints reinterpreted as `u32`
//! - `FLOAT3` / `FLOAT4` take 3 / 4 words, `MATRIX44` takes 16 words
//!   (`data[0][0], data[0][1], ..., data[3][3]`)
//! - strings are packed 4 bytes per word, little-endian, up to and including
//!   the first word that contains a zero byte
//! - stack indices and jump addresses are one word; `STACK_INVALID` marks an
//!   unused slot or a missing jump target
//!
//! This module contains:
//!
//! - [`BytecodeWriter`] - Appends instructions while compiling
//! - [`InstructionReader`] - Cursor used by the evaluator and disassembler
//! - [`Function`] and [`SharedFunction`] - Compiled programs

mod function;
mod reader;
mod writer;

pub use function::{Function, FunctionArgument, FunctionReturn, SharedFunction};
pub use reader::InstructionReader;
pub use writer::BytecodeWriter;
