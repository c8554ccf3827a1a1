//! Lexical blocks of a finalized graph.

use nodevm_core::{BlockId, NodeId};

use crate::graph::OutputKey;

/// A scope of node instances.
///
/// The `main` block has no parent and no kernel. Every kernel instance opens
/// one child block holding the nodes that read its block-local variables.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeBlock {
    pub(crate) id: BlockId,
    pub(crate) parent: Option<BlockId>,
    pub(crate) kernel: Option<NodeId>,
    pub(crate) members: Vec<NodeId>,
    pub(crate) locals: Vec<(String, OutputKey)>,
}

impl NodeBlock {
    pub(crate) fn new(id: BlockId, parent: Option<BlockId>, kernel: Option<NodeId>) -> Self {
        Self {
            id,
            parent,
            kernel,
            members: Vec::new(),
            locals: Vec::new(),
        }
    }

    pub fn id(&self) -> BlockId {
        self.id
    }

    pub fn parent(&self) -> Option<BlockId> {
        self.parent
    }

    /// Kernel instance that runs this block, `None` for `main`.
    pub fn kernel(&self) -> Option<NodeId> {
        self.kernel
    }

    /// Member instances in topological order.
    pub fn members(&self) -> &[NodeId] {
        &self.members
    }

    /// Block-local variables by name.
    pub fn locals(&self) -> &[(String, OutputKey)] {
        &self.locals
    }

    pub fn local(&self, name: &str) -> Option<OutputKey> {
        self.locals
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, key)| *key)
    }

    pub fn is_main(&self) -> bool {
        self.parent.is_none()
    }
}
