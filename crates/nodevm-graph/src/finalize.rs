//! Graph finalization passes.
//!
//! [`NodeGraph::finalize`] rewrites a graph into the form the compiler
//! expects. The passes run in this order:
//!
//! 1. **Materialization**: every expression input that is not linked gets a
//!    `VALUE_*` node holding its literal or socket default.
//! 2. **Pass elision**: links through `PASS_*` nodes are redirected to the
//!    node at the bottom of the chain.
//! 3. **Pruning**: nodes not reachable from a graph output are removed.
//! 4. **Indexing**: nodes get topological indices, producers first.
//! 5. **Blocks**: nodes are grouped into the `main` block and the blocks
//!    opened by kernel nodes.
//! 6. **Variables**: unbound variable inputs are bound to the innermost block
//!    variable of the same name. Steps 4-6 repeat until nothing new is bound.

use nodevm_core::{BlockId, GraphError, NodeId, TypeDesc, Value};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, instrument, warn};

use crate::block::NodeBlock;
use crate::graph::{InputBinding, InputKey, NodeGraph, NodeInstance, OutputKey};
use crate::node_type::{InputValueKind, OutputValueKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

enum VariableSource {
    Local(OutputKey),
    Literal(Value),
}

impl NodeGraph<'_> {
    /// Run the finalization passes. The graph is read-only afterwards.
    #[cfg_attr(feature = "profiling", profiling::function)]
    #[instrument(skip_all, name = "finalize")]
    pub fn finalize(&mut self) -> Result<(), GraphError> {
        self.check_mutable()?;

        let materialized = self.materialize_inputs()?;
        let elided = self.elide_passes()?;
        let pruned = self.prune();

        let mut bound = 0;
        loop {
            self.assign_indices();
            self.assign_blocks();
            let n = self.bind_variables()?;
            if n == 0 {
                break;
            }
            bound += n;
        }

        self.finalized = true;
        debug!(
            nodes = self.node_count(),
            blocks = self.blocks.len(),
            materialized,
            elided,
            pruned,
            bound,
            "graph finalized"
        );
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// Live nodes sorted by topological index. Unindexed nodes come last.
    pub fn nodes_in_order(&self) -> Vec<NodeId> {
        let mut ids = self.live_ids();
        ids.sort_by_key(|&id| {
            self.node(id)
                .and_then(NodeInstance::index)
                .unwrap_or(usize::MAX)
        });
        ids
    }

    /// Block opened by a kernel node.
    pub fn kernel_block(&self, kernel: NodeId) -> Option<BlockId> {
        self.blocks
            .iter()
            .find(|b| b.kernel == Some(kernel))
            .map(|b| b.id)
    }

    /// Whether `inner` is `outer` or nested inside it.
    pub fn block_contains(&self, outer: BlockId, inner: BlockId) -> bool {
        let mut current = Some(inner);
        while let Some(id) = current {
            if id == outer {
                return true;
            }
            current = self.block(id).and_then(NodeBlock::parent);
        }
        false
    }

    /// Nesting depth of a block; `main` is 0.
    pub fn block_depth(&self, block: BlockId) -> usize {
        block_depth(&self.blocks, block)
    }

    fn is_pass(&self, id: NodeId) -> bool {
        self.node(id).is_some_and(|n| n.node_type().is_pass())
    }

    // ------------------------------------------------------------------------
    // Passes
    // ------------------------------------------------------------------------

    fn materialize_inputs(&mut self) -> Result<usize, GraphError> {
        let mut pending = Vec::new();
        for (id, node) in self.nodes() {
            for (socket, input) in node.node_type().inputs().iter().enumerate() {
                if input.value_kind != InputValueKind::Expression {
                    continue;
                }
                match &node.inputs[socket] {
                    InputBinding::Link(_) => {}
                    InputBinding::Value(value) => {
                        pending.push((InputKey::new(id, socket), value.clone()));
                    }
                    InputBinding::Unbound => {
                        pending.push((InputKey::new(id, socket), input.default.clone()));
                    }
                }
            }
        }

        let count = pending.len();
        for (key, value) in pending {
            let producer = self.add_value_node(value)?;
            self.bind(key, InputBinding::Link(producer))?;
        }
        Ok(count)
    }

    fn elide_passes(&mut self) -> Result<usize, GraphError> {
        let mut links = Vec::new();
        for (id, node) in self.nodes() {
            if node.node_type().is_pass() {
                continue;
            }
            for (socket, binding) in node.inputs.iter().enumerate() {
                if let InputBinding::Link(from) = binding
                    && self.is_pass(from.node)
                {
                    links.push((InputKey::new(id, socket), *from));
                }
            }
        }

        let elided = links.len();
        for (key, from) in links {
            let root = self.resolve_pass_chain(from)?;
            self.bind(key, InputBinding::Link(root))?;
        }

        for i in 0..self.outputs.len() {
            let proxy = self.outputs[i].proxy;
            let root = self.resolve_pass_chain(OutputKey::new(proxy, 0))?;
            self.outputs[i].key = Some(root);
        }
        Ok(elided)
    }

    /// Follow a chain of pass nodes down to the producing output.
    fn resolve_pass_chain(&mut self, from: OutputKey) -> Result<OutputKey, GraphError> {
        let mut current = from;
        let mut visited = FxHashSet::default();
        loop {
            let node = self.get(current.node)?;
            if !node.node_type().is_pass() {
                return Ok(current);
            }
            if !visited.insert(current.node) {
                warn!(node = node.name(), "pass chain loops back on itself");
                let default = node.node_type().inputs()[0].default.clone();
                return self.add_value_node(default);
            }
            match &node.inputs[0] {
                InputBinding::Link(up) => current = *up,
                InputBinding::Value(value) => {
                    let value = value.clone();
                    return self.add_value_node(value);
                }
                InputBinding::Unbound => {
                    let default = node.node_type().inputs()[0].default.clone();
                    return self.add_value_node(default);
                }
            }
        }
    }

    fn prune(&mut self) -> usize {
        let mut reachable = vec![false; self.nodes.len()];
        let mut stack: Vec<NodeId> = self
            .outputs
            .iter()
            .filter_map(|o| o.key)
            .map(|k| k.node)
            .collect();

        while let Some(id) = stack.pop() {
            let Some(node) = self.node(id) else { continue };
            if std::mem::replace(&mut reachable[id.as_usize()], true) {
                continue;
            }
            stack.extend(node.inputs.iter().filter_map(|binding| match binding {
                InputBinding::Link(key) => Some(key.node),
                _ => None,
            }));
        }

        let dead: Vec<NodeId> = self
            .live_ids()
            .into_iter()
            .filter(|id| !reachable[id.as_usize()])
            .collect();
        for &id in &dead {
            self.remove_node(id);
        }

        for input in &mut self.inputs {
            if let Some(key) = input.key
                && !reachable[key.node.as_usize()]
            {
                input.key = None;
            }
        }

        if !dead.is_empty() {
            debug!(removed = dead.len(), "pruned unreachable nodes");
        }
        dead.len()
    }

    /// The producer an input depends on; links to variable outputs do not
    /// count.
    fn dependency(&self, node: &NodeInstance, socket: usize) -> Option<NodeId> {
        let key = node.link(socket)?;
        let producer = self.node(key.node)?;
        let output = producer.node_type().outputs().get(key.socket)?;
        (output.value_kind == OutputValueKind::Expression).then_some(key.node)
    }

    fn assign_indices(&mut self) {
        let mut marks = vec![Mark::Unvisited; self.nodes.len()];
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<(NodeId, usize)> = Vec::new();

        for root in self.live_ids() {
            if marks[root.as_usize()] != Mark::Unvisited {
                continue;
            }
            marks[root.as_usize()] = Mark::InProgress;
            stack.push((root, 0));

            while let Some(&(id, next)) = stack.last() {
                let Some(node) = self.node(id) else {
                    stack.pop();
                    continue;
                };
                if next >= node.inputs.len() {
                    marks[id.as_usize()] = Mark::Done;
                    order.push(id);
                    stack.pop();
                    continue;
                }
                if let Some(top) = stack.last_mut() {
                    top.1 += 1;
                }

                let Some(dep) = self.dependency(node, next) else {
                    continue;
                };
                match marks[dep.as_usize()] {
                    Mark::Unvisited => {
                        marks[dep.as_usize()] = Mark::InProgress;
                        stack.push((dep, 0));
                    }
                    Mark::InProgress => {
                        warn!(node = node.name(), socket = next, "self-referencing link skipped");
                    }
                    Mark::Done => {}
                }
            }
        }

        for (index, id) in order.into_iter().enumerate() {
            if let Some(Some(node)) = self.nodes.get_mut(id.as_usize()) {
                node.index = Some(index);
            }
        }
    }

    fn assign_blocks(&mut self) {
        let order = self.nodes_in_order();

        // Kernel variables each node reads, directly or through its inputs.
        let mut vars: Vec<Vec<OutputKey>> = vec![Vec::new(); self.nodes.len()];
        for &id in &order {
            let Some(node) = self.node(id) else { continue };
            let mut used = Vec::new();
            for socket in 0..node.inputs.len() {
                let Some(key) = node.link(socket) else { continue };
                let Some(producer) = self.node(key.node) else { continue };
                match producer.node_type().outputs().get(key.socket) {
                    Some(o) if o.value_kind == OutputValueKind::Variable => {
                        if producer.node_type().is_kernel() {
                            used.push(key);
                        }
                    }
                    Some(_) => used.extend_from_slice(&vars[key.node.as_usize()]),
                    None => {}
                }
            }
            if node.node_type().is_kernel() {
                used.retain(|k| k.node != id);
            }
            used.sort();
            used.dedup();
            vars[id.as_usize()] = used;
        }

        let mut builder = BlockBuilder::new(&vars);
        for &id in &order {
            if self.node(id).is_some_and(|n| n.node_type().is_kernel()) {
                builder.open(id);
            }
        }

        let mut assigned = Vec::with_capacity(order.len());
        for &id in &order {
            let block = builder.scope_of(&vars[id.as_usize()]);
            assigned.push((id, block));
        }

        let mut blocks = builder.blocks;
        for block in &mut blocks {
            let Some(kernel) = block.kernel else { continue };
            let Some(node) = self.node(kernel) else { continue };
            block.locals = node
                .node_type()
                .outputs()
                .iter()
                .enumerate()
                .filter(|(_, o)| o.value_kind == OutputValueKind::Variable)
                .map(|(socket, o)| (o.name.clone(), OutputKey::new(kernel, socket)))
                .collect();
        }

        for (id, block) in assigned {
            blocks[block.as_usize()].members.push(id);
            if let Some(Some(node)) = self.nodes.get_mut(id.as_usize()) {
                node.block = Some(block);
            }
        }
        self.blocks = blocks;
    }

    fn bind_variables(&mut self) -> Result<usize, GraphError> {
        let order = self.nodes_in_order();

        // Innermost block a node's value is used in. Consumers have higher
        // indices, so a reverse walk sees them first.
        let mut scope: Vec<BlockId> = vec![BlockId::MAIN; self.nodes.len()];
        for &id in &order {
            if let Some(block) = self.node(id).and_then(NodeInstance::block) {
                scope[id.as_usize()] = block;
            }
        }
        for &id in order.iter().rev() {
            let Some(node) = self.node(id) else { continue };
            let used_in = if node.node_type().is_kernel() {
                self.kernel_block(id).unwrap_or(scope[id.as_usize()])
            } else {
                scope[id.as_usize()]
            };
            for socket in 0..node.inputs.len() {
                let Some(key) = node.link(socket) else { continue };
                let producer = key.node.as_usize();
                if self.block_depth(used_in) > self.block_depth(scope[producer]) {
                    scope[producer] = used_in;
                }
            }
        }

        let mut pending = Vec::new();
        for &id in &order {
            let Some(node) = self.node(id) else { continue };
            for (socket, input) in node.node_type().inputs().iter().enumerate() {
                if input.value_kind != InputValueKind::Variable {
                    continue;
                }
                let source = match &node.inputs[socket] {
                    InputBinding::Link(_) => continue,
                    InputBinding::Value(value) => VariableSource::Literal(value.clone()),
                    InputBinding::Unbound => {
                        match self.find_local(scope[id.as_usize()], &input.name, input.typedesc) {
                            Some(key) => VariableSource::Local(key),
                            None => VariableSource::Literal(input.default.clone()),
                        }
                    }
                };
                pending.push((InputKey::new(id, socket), source));
            }
        }

        let count = pending.len();
        for (key, source) in pending {
            let producer = match source {
                VariableSource::Local(local) => local,
                VariableSource::Literal(value) => self.add_value_node(value)?,
            };
            self.bind(key, InputBinding::Link(producer))?;
        }
        Ok(count)
    }

    /// Innermost variable called `name` visible from `block`.
    fn find_local(&self, block: BlockId, name: &str, typedesc: TypeDesc) -> Option<OutputKey> {
        let mut current = Some(block);
        while let Some(id) = current {
            let block = self.block(id)?;
            if let Some(key) = block.local(name)
                && self.output_type(key).ok() == Some(typedesc)
            {
                return Some(key);
            }
            current = block.parent;
        }
        None
    }
}

fn block_depth(blocks: &[NodeBlock], block: BlockId) -> usize {
    let mut depth = 0;
    let mut current = blocks.get(block.as_usize()).and_then(NodeBlock::parent);
    while let Some(id) = current {
        depth += 1;
        current = blocks.get(id.as_usize()).and_then(NodeBlock::parent);
    }
    depth
}

/// Creates kernel blocks on demand, parents first.
struct BlockBuilder<'a> {
    vars: &'a [Vec<OutputKey>],
    blocks: Vec<NodeBlock>,
    opened: FxHashMap<NodeId, BlockId>,
    visiting: FxHashSet<NodeId>,
}

impl<'a> BlockBuilder<'a> {
    fn new(vars: &'a [Vec<OutputKey>]) -> Self {
        Self {
            vars,
            blocks: vec![NodeBlock::new(BlockId::MAIN, None, None)],
            opened: FxHashMap::default(),
            visiting: FxHashSet::default(),
        }
    }

    /// Deepest block among those owning `vars`.
    fn scope_of(&mut self, vars: &[OutputKey]) -> BlockId {
        let mut best = BlockId::MAIN;
        let mut best_depth = 0;
        for key in vars {
            let block = self.open(key.node);
            let depth = block_depth(&self.blocks, block);
            if depth > best_depth {
                best = block;
                best_depth = depth;
            }
        }
        best
    }

    fn open(&mut self, kernel: NodeId) -> BlockId {
        if let Some(&block) = self.opened.get(&kernel) {
            return block;
        }
        if !self.visiting.insert(kernel) {
            warn!(%kernel, "kernel block nested inside itself");
            return BlockId::MAIN;
        }
        let vars = self.vars;
        let parent = self.scope_of(&vars[kernel.as_usize()]);
        self.visiting.remove(&kernel);

        let id = BlockId::new(self.blocks.len() as u32);
        self.blocks.push(NodeBlock::new(id, Some(parent), Some(kernel)));
        self.opened.insert(kernel, id);
        id
    }
}
