//! Node graph compiler.
//!
//! Turns a finalized [`NodeGraph`](nodevm_graph::NodeGraph) into a
//! [`Function`]: flat bytecode for the stack evaluator plus argument and
//! return tables.
//!
//! ## Modules
//!
//! - [`bytecode`]: Instruction encoding, the cursor reader and compiled functions
//! - [`bvm`]: The bytecode compiler (scheduling, slot allocation, resource
//!   lifetimes, emission)
//! - [`codegen`]: Backend-agnostic expansion driving a [`CodeGenerator`]
//! - [`debug`]: Disassembler
//!
//! ## Example
//!
//! ```
//! use nodevm_compiler::{BvmCompiler, disassemble};
//! use nodevm_core::TypeDesc;
//! use nodevm_graph::{NodeGraph, NodeTypeRegistry};
//!
//! let registry = NodeTypeRegistry::with_builtin_types();
//! let mut graph = NodeGraph::new(&registry);
//! let x = graph.add_input("x", TypeDesc::Float).unwrap();
//! let sine = graph.add_node("SINE", "").unwrap();
//! graph.link(x, graph.input_socket(sine, "value").unwrap()).unwrap();
//! let out = graph.add_output("y", TypeDesc::Float, 0.0f32).unwrap();
//! graph.link(graph.output_socket(sine, "value").unwrap(), out).unwrap();
//! graph.finalize().unwrap();
//!
//! let function = BvmCompiler::default().compile(&graph).unwrap();
//! assert!(disassemble(&function).contains("SINE"));
//! ```

mod allocator;
pub mod bvm;
pub mod bytecode;
pub mod codegen;
mod config;
pub mod debug;

pub use allocator::StackAllocator;
pub use bvm::{BvmCompiler, SlotAssignment};
pub use bytecode::{
    BytecodeWriter, Function, FunctionArgument, FunctionReturn, InstructionReader, SharedFunction,
};
pub use codegen::{CodeGenerator, DebugCodeGenerator, NodeCompiler};
pub use config::CompilerConfig;
pub use debug::disassemble;
