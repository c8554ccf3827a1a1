//! Unified error types for nodevm.
//!
//! This module provides the error type hierarchy for the two fallible
//! phases: building/finalizing a node graph and compiling it to bytecode.
//! Evaluation has no error channel.
//!
//! ## Error Hierarchy
//!
//! ```text
//! NodeVmError (top-level wrapper)
//! ├── GraphError   - Registry, graph construction and finalization errors
//! └── CompileError - Bytecode generation errors
//! ```
//!
//! ## Usage
//!
//! Each phase-specific error can be handled directly, or converted to
//! `NodeVmError` with `?`:
//!
//! ```ignore
//! use nodevm_core::NodeVmError;
//!
//! fn build(ctx: &Context) -> Result<SharedFunction, NodeVmError> {
//!     let mut graph = ctx.new_graph();
//!     graph.add_node("ADD_FLOAT", "")?;   // GraphError -> NodeVmError
//!     graph.finalize()?;
//!     ctx.compile(&graph)                 // CompileError -> NodeVmError
//! }
//! ```

use thiserror::Error;

use crate::{NodeId, TypeDesc};

// ============================================================================
// Graph Errors
// ============================================================================

/// Errors raised while registering node types or building a graph.
///
/// Unsupported type conversions are not errors: linking two incompatible
/// sockets leaves the input unbound.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// No node type with this name is registered.
    #[error("unknown node type '{0}'")]
    UnknownNodeType(String),

    /// A node type with this name is already registered.
    #[error("node type '{0}' is already registered")]
    DuplicateNodeType(String),

    /// The node id does not refer to a live node.
    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    /// The node has no socket with this name or index.
    #[error("node '{node}' has no {direction} socket '{socket}'")]
    UnknownSocket {
        node: String,
        direction: &'static str,
        socket: String,
    },

    /// A graph input with this name already exists.
    #[error("graph input '{0}' already exists")]
    DuplicateInput(String),

    /// A graph output with this name already exists.
    #[error("graph output '{0}' already exists")]
    DuplicateOutput(String),

    /// No pass/argument node type exists for this type.
    #[error("no {role} node type for type {typedesc}")]
    UnknownType {
        role: &'static str,
        typedesc: TypeDesc,
    },

    /// String literals are stored zero-terminated and cannot hold a NUL.
    #[error("string literal {0:?} contains a NUL byte")]
    InvalidString(String),

    /// The graph has been finalized and can no longer be modified.
    #[error("graph is already finalized")]
    AlreadyFinalized,
}

// ============================================================================
// Compile Errors
// ============================================================================

/// Errors raised while lowering a finalized graph to bytecode.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// No contiguous run of free stack words was large enough.
    #[error("stack exhausted: no room for {requested} words in a stack of {capacity}")]
    StackExhausted { requested: usize, capacity: usize },

    /// The graph must be finalized before compiling.
    #[error("graph is not finalized")]
    NotFinalized,

    /// A graph output does not resolve to a node output.
    #[error("graph output '{0}' does not resolve to a node")]
    UnresolvedOutput(String),
}

// ============================================================================
// Unified Error Type
// ============================================================================

/// Top-level error type for nodevm.
///
/// Wraps the phase-specific errors so callers can use `?` across graph
/// building and compilation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NodeVmError {
    /// A graph error.
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// A compilation error.
    #[error(transparent)]
    Compile(#[from] CompileError),
}

impl NodeVmError {
    /// Check if this is a graph error.
    pub fn is_graph(&self) -> bool {
        matches!(self, NodeVmError::Graph(_))
    }

    /// Check if this is a compilation error.
    pub fn is_compile(&self) -> bool {
        matches!(self, NodeVmError::Compile(_))
    }
}

// ============================================================================
// Tests
// ============================================================================
