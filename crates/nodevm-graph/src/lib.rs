//! Node graph IR.
//!
//! Typed node graphs and the passes that prepare them for compilation.
//!
//! ## Modules
//!
//! - [`node_type`]: Node type signatures (sockets, kinds, opcodes)
//! - [`registry`]: Name-indexed node type registry
//! - [`builtins`]: Built-in node types, one per opcode
//! - [`graph`]: Graph construction, links and conversions
//! - [`block`]: Lexical blocks of a finalized graph
//!
//! Finalization and fingerprinting are implemented on [`NodeGraph`] in
//! private modules.

pub mod block;
pub mod builtins;
mod convert;
mod finalize;
mod fingerprint;
pub mod graph;
pub mod node_type;
pub mod registry;

pub use block::NodeBlock;
pub use graph::{
    GraphInput, GraphOutput, InputBinding, InputKey, LinkOutcome, NodeGraph, NodeInstance,
    OutputKey,
};
pub use node_type::{InputValueKind, NodeInput, NodeKind, NodeOutput, NodeType, OutputValueKind};
pub use registry::NodeTypeRegistry;
