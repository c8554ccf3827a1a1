//! Node graph compiler and stack evaluator.
//!
//! A host builds a typed [`NodeGraph`] of node instances, finalizes it,
//! compiles it to a [`SharedFunction`] and evaluates that function against
//! per-call arguments and [`EvalGlobals`]. The [`Context`] ties the pieces
//! together; the crates behind it can also be used directly.
//!
//! ## Crates
//!
//! - [`nodevm_core`]: Socket types, values, math, opcodes and errors
//! - [`nodevm_graph`]: Node types, the registry, graph building and
//!   finalization
//! - [`nodevm_compiler`]: Slot allocation, resource lifetimes and bytecode
//!   emission
//! - [`nodevm_vm`]: The evaluator, opcode kernels and function cache
//!
//! ## Example
//!
//! ```
//! use nodevm::{Context, EvalGlobals, EvalValue, Float3, TypeDesc};
//!
//! let ctx = Context::with_builtin_types();
//! let mut graph = ctx.new_graph();
//! let v = graph.add_input("v", TypeDesc::Float3).unwrap();
//! let len = graph.add_node("LENGTH_FLOAT3", "").unwrap();
//! graph.link(v, graph.input_socket(len, "value").unwrap()).unwrap();
//! let out = graph.add_output("length", TypeDesc::Float, 0.0f32).unwrap();
//! graph.link(graph.output_socket(len, "length").unwrap(), out).unwrap();
//! graph.finalize().unwrap();
//!
//! let function = ctx.compile(&graph).unwrap();
//! let args = [Float3::new(3.0, 4.0, 0.0).into()];
//! assert_eq!(ctx.call(&function, &EvalGlobals::new(), &args), vec![EvalValue::Float(5.0)]);
//! ```

mod context;

pub use context::{Context, Result};

pub use nodevm_compiler::{
    BvmCompiler, CodeGenerator, CompilerConfig, Function, FunctionArgument, FunctionReturn,
    SharedFunction, disassemble,
};
pub use nodevm_core::{
    CompileError, Float3, Float4, GraphError, ImageKey, Matrix44, NodeId, NodeVmError, ObjectKey,
    OpCode, TypeDesc, Value,
};
pub use nodevm_graph::{InputKey, LinkOutcome, NodeGraph, NodeType, NodeTypeRegistry, OutputKey};
pub use nodevm_vm::{
    Dupli, DupliList, EvalGlobals, EvalValue, Evaluator, FunctionCache, HostObject, Image, Mesh,
};

pub use nodevm_compiler as compiler;
pub use nodevm_core as core;
pub use nodevm_graph as graph;
pub use nodevm_vm as vm;
