//! Bytecode compiler.
//!
//! Lowers a finalized [`NodeGraph`] to a [`Function`].
//!
//! ## Passes
//!
//! 1. **Schedule**: the blocks are flattened into execution order. A kernel
//!    contributes a `Begin` event (its outputs get storage), then its body,
//!    then its own `Step`.
//! 2. **Dependency analysis**: every use of an output is anchored to the node
//!    of the producer's block that triggers it: the consumer itself, or the
//!    kernel whose body contains the consumer. The latest anchor is the last
//!    use.
//! 3. **Slot allocation**: outputs get contiguous stack words from a
//!    first-fit allocator, in schedule order, and give them back after their
//!    last use. Graph inputs are allocated up front; graph outputs are never
//!    released.
//! 4. **Resource lifetimes**: each mesh/dupli output gets one
//!    `INIT_*_PTR(slot, n)` before its producer, where `n` counts its anchors
//!    plus the graph outputs reading it, and one `RELEASE_*_PTR(slot)` after
//!    each anchor. Resource arguments skip the `INIT`; the evaluator stores
//!    them with their use count.
//! 5. **Emission**: blocks are written innermost first so kernel jump targets
//!    are known. Every block ends with `END`.

use nodevm_core::{
    BlockId, CompileError, NodeId, OpCode, STACK_INVALID, TypeDesc, Value, Word,
};
use nodevm_graph::{InputValueKind, NodeGraph, NodeKind, OutputKey};
use rustc_hash::FxHashMap;
use tracing::{debug, info, instrument, warn};

use crate::allocator::StackAllocator;
use crate::bytecode::{BytecodeWriter, Function, FunctionArgument, FunctionReturn};
use crate::config::CompilerConfig;

/// Storage assigned to one output during compilation.
///
/// Events count allocations and releases in order; a value is live between
/// its allocation and its release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotAssignment {
    pub output: OutputKey,
    pub typedesc: TypeDesc,
    pub start: Word,
    pub size: usize,
    pub alloc_event: usize,
    /// `None` for values that stay allocated until the function ends.
    pub free_event: Option<usize>,
}

impl SlotAssignment {
    /// Whether two values share stack words while both are live.
    pub fn overlaps(&self, other: &SlotAssignment) -> bool {
        let a = self.start as usize..self.start as usize + self.size;
        let b = other.start as usize..other.start as usize + other.size;
        let words = a.start < b.end && b.start < a.end;
        let live = self.alloc_event < other.free_event.unwrap_or(usize::MAX)
            && other.alloc_event < self.free_event.unwrap_or(usize::MAX);
        words && live
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Event {
    /// Kernel outputs are allocated before its body runs.
    Begin(NodeId),
    Step(NodeId),
}

#[derive(Debug, Clone, Copy)]
struct ResourceOp {
    op: OpCode,
    slot: Word,
    count: Option<i32>,
}

/// Compiles finalized graphs to bytecode functions.
///
/// # Example
///
/// ```
/// use nodevm_compiler::{BvmCompiler, CompilerConfig};
/// use nodevm_core::TypeDesc;
/// use nodevm_graph::{NodeGraph, NodeTypeRegistry};
///
/// let registry = NodeTypeRegistry::with_builtin_types();
/// let mut graph = NodeGraph::new(&registry);
/// let out = graph.add_output("value", TypeDesc::Float, 1.5f32).unwrap();
/// graph.finalize().unwrap();
///
/// let mut compiler = BvmCompiler::new(CompilerConfig::default());
/// let function = compiler.compile(&graph).unwrap();
/// assert_eq!(function.returns()[0].name, "value");
/// ```
#[derive(Debug, Default)]
pub struct BvmCompiler {
    config: CompilerConfig,
    layout: Vec<SlotAssignment>,
}

impl BvmCompiler {
    pub fn new(config: CompilerConfig) -> Self {
        Self {
            config,
            layout: Vec::new(),
        }
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Slot assignments of the last successful compile.
    pub fn layout(&self) -> &[SlotAssignment] {
        &self.layout
    }

    /// Compile a finalized graph.
    pub fn compile(&mut self, graph: &NodeGraph<'_>) -> Result<Function, CompileError> {
        self.compile_named("graph", graph)
    }

    /// Compile a finalized graph into a function called `name`.
    #[cfg_attr(feature = "profiling", profiling::function)]
    #[instrument(skip_all, name = "compile", fields(function = name))]
    pub fn compile_named(
        &mut self,
        name: &str,
        graph: &NodeGraph<'_>,
    ) -> Result<Function, CompileError> {
        if !graph.is_finalized() {
            return Err(CompileError::NotFinalized);
        }
        for output in graph.outputs() {
            if output.key.is_none() {
                return Err(CompileError::UnresolvedOutput(output.name.clone()));
            }
        }

        let mut session = Session::new(graph, self.config.effective_stack_size());
        session.schedule();
        session.analyze_uses();
        session.allocate_slots()?;
        session.plan_resources();
        let function = session.emit(name)?;

        info!(
            function = name,
            instructions = function.instruction_count(),
            words = function.code().len(),
            blocks = graph.blocks().len(),
            peak_stack = session.peak,
            "compiled node graph"
        );
        self.layout = session.layout;
        Ok(function)
    }
}

/// State of one compile.
struct Session<'g, 'r> {
    graph: &'g NodeGraph<'r>,
    capacity: usize,
    events: Vec<Event>,
    step_of: FxHashMap<NodeId, usize>,
    /// Distinct anchors per output, in schedule order.
    anchors: FxHashMap<OutputKey, Vec<NodeId>>,
    /// Graph outputs reading each output.
    returned: FxHashMap<OutputKey, u32>,
    slots: FxHashMap<OutputKey, usize>,
    layout: Vec<SlotAssignment>,
    peak: usize,
    inits_before: FxHashMap<NodeId, Vec<ResourceOp>>,
    releases_after: FxHashMap<NodeId, Vec<ResourceOp>>,
}

impl<'g, 'r> Session<'g, 'r> {
    fn new(graph: &'g NodeGraph<'r>, capacity: usize) -> Self {
        let mut returned = FxHashMap::default();
        for output in graph.outputs() {
            if let Some(key) = output.key {
                *returned.entry(key).or_insert(0) += 1;
            }
        }
        Self {
            graph,
            capacity,
            events: Vec::new(),
            step_of: FxHashMap::default(),
            anchors: FxHashMap::default(),
            returned,
            slots: FxHashMap::default(),
            layout: Vec::new(),
            peak: 0,
            inits_before: FxHashMap::default(),
            releases_after: FxHashMap::default(),
        }
    }

    fn kind(&self, id: NodeId) -> Option<NodeKind> {
        self.graph.node(id).map(|n| n.node_type().kind())
    }

    // ------------------------------------------------------------------------
    // Schedule
    // ------------------------------------------------------------------------

    fn schedule(&mut self) {
        let mut events = Vec::new();
        self.linearize(BlockId::MAIN, &mut events);
        for (step, event) in events.iter().enumerate() {
            if let Event::Step(id) = event {
                self.step_of.insert(*id, step);
            }
        }
        self.events = events;
    }

    fn linearize(&self, block: BlockId, events: &mut Vec<Event>) {
        let Some(block) = self.graph.block(block) else { return };
        for &id in block.members() {
            if self.kind(id) == Some(NodeKind::Kernel) {
                events.push(Event::Begin(id));
                if let Some(body) = self.graph.kernel_block(id) {
                    self.linearize(body, events);
                }
            }
            events.push(Event::Step(id));
        }
    }

    // ------------------------------------------------------------------------
    // Dependency analysis
    // ------------------------------------------------------------------------

    /// Node of the producer's block whose execution performs a use by
    /// `consumer`.
    fn anchor(&self, consumer: NodeId, producer: NodeId) -> NodeId {
        let block_of = |id: NodeId| self.graph.node(id).and_then(|n| n.block());
        let (Some(target), Some(mut current)) = (block_of(producer), block_of(consumer)) else {
            return consumer;
        };
        let mut anchor = consumer;
        while current != target {
            let Some(block) = self.graph.block(current) else {
                return consumer;
            };
            match (block.kernel(), block.parent()) {
                (Some(kernel), Some(parent)) => {
                    anchor = kernel;
                    current = parent;
                }
                _ => return consumer,
            }
        }
        anchor
    }

    fn analyze_uses(&mut self) {
        let mut anchors: FxHashMap<OutputKey, Vec<NodeId>> = FxHashMap::default();
        for event in &self.events {
            let Event::Step(consumer) = *event else { continue };
            let Some(node) = self.graph.node(consumer) else { continue };
            for socket in 0..node.inputs().len() {
                let Some(key) = node.link(socket) else { continue };
                let anchor = self.anchor(consumer, key.node);
                let list = anchors.entry(key).or_default();
                if !list.contains(&anchor) {
                    list.push(anchor);
                }
            }
        }
        for list in anchors.values_mut() {
            list.sort_by_key(|id| self.step_of.get(id).copied().unwrap_or(usize::MAX));
        }
        debug!(values = anchors.len(), "analyzed uses");
        self.anchors = anchors;
    }

    fn last_use(&self, key: OutputKey) -> Option<usize> {
        self.anchors
            .get(&key)?
            .iter()
            .filter_map(|id| self.step_of.get(id).copied())
            .max()
    }

    // ------------------------------------------------------------------------
    // Slot allocation
    // ------------------------------------------------------------------------

    fn allocate_slots(&mut self) -> Result<(), CompileError> {
        let graph = self.graph;
        let mut allocator = StackAllocator::new(self.capacity);
        let mut event = 0;

        let mut frees_at: FxHashMap<usize, Vec<OutputKey>> = FxHashMap::default();
        for &key in self.anchors.keys() {
            if self.returned.contains_key(&key) {
                continue;
            }
            if let Some(step) = self.last_use(key) {
                frees_at.entry(step).or_default().push(key);
            }
        }
        for keys in frees_at.values_mut() {
            keys.sort();
        }

        for input in graph.inputs() {
            if let Some(key) = input.key {
                self.allocate(&mut allocator, &mut event, key)?;
            }
        }

        let events = std::mem::take(&mut self.events);
        for (step, &ev) in events.iter().enumerate() {
            match ev {
                Event::Begin(kernel) => self.allocate_outputs(&mut allocator, &mut event, kernel)?,
                Event::Step(id) => {
                    match self.kind(id) {
                        Some(NodeKind::Function) => {
                            self.allocate_outputs(&mut allocator, &mut event, id)?
                        }
                        Some(NodeKind::Kernel | NodeKind::Argument | NodeKind::Pass) | None => {}
                    }
                    if let Some(keys) = frees_at.get(&step) {
                        for &key in keys {
                            self.free(&mut allocator, &mut event, key);
                        }
                    }
                    self.free_unused_outputs(&mut allocator, &mut event, id);
                }
            }
        }
        self.events = events;
        Ok(())
    }

    fn allocate_outputs(
        &mut self,
        allocator: &mut StackAllocator,
        event: &mut usize,
        id: NodeId,
    ) -> Result<(), CompileError> {
        let count = self
            .graph
            .node(id)
            .map_or(0, |n| n.node_type().outputs().len());
        for socket in 0..count {
            self.allocate(allocator, event, OutputKey::new(id, socket))?;
        }
        Ok(())
    }

    fn allocate(
        &mut self,
        allocator: &mut StackAllocator,
        event: &mut usize,
        key: OutputKey,
    ) -> Result<(), CompileError> {
        if self.slots.contains_key(&key) {
            return Ok(());
        }
        let Some(typedesc) = self
            .graph
            .node(key.node)
            .and_then(|n| n.node_type().outputs().get(key.socket))
            .map(|o| o.typedesc)
        else {
            return Ok(());
        };
        let size = typedesc.stack_size();
        let start = allocator.allocate(size)?;
        self.peak = self.peak.max(allocator.in_use());
        self.slots.insert(key, self.layout.len());
        self.layout.push(SlotAssignment {
            output: key,
            typedesc,
            start,
            size,
            alloc_event: *event,
            free_event: None,
        });
        *event += 1;
        Ok(())
    }

    fn free(&mut self, allocator: &mut StackAllocator, event: &mut usize, key: OutputKey) {
        if self.returned.contains_key(&key) {
            return;
        }
        let Some(&index) = self.slots.get(&key) else { return };
        let slot = &mut self.layout[index];
        if slot.free_event.is_some() {
            return;
        }
        allocator.release(slot.start, slot.size);
        slot.free_event = Some(*event);
        *event += 1;
    }

    fn free_unused_outputs(&mut self, allocator: &mut StackAllocator, event: &mut usize, id: NodeId) {
        let count = self
            .graph
            .node(id)
            .map_or(0, |n| n.node_type().outputs().len());
        for socket in 0..count {
            let key = OutputKey::new(id, socket);
            if !self.anchors.contains_key(&key) {
                self.free(allocator, event, key);
            }
        }
    }

    fn slot(&self, key: OutputKey) -> Option<Word> {
        self.slots.get(&key).map(|&i| self.layout[i].start)
    }

    // ------------------------------------------------------------------------
    // Resource lifetimes
    // ------------------------------------------------------------------------

    fn use_count(&self, key: OutputKey) -> u32 {
        let anchors = self.anchors.get(&key).map_or(0, Vec::len) as u32;
        anchors + self.returned.get(&key).copied().unwrap_or(0)
    }

    fn plan_resources(&mut self) {
        let graph = self.graph;
        let mut inits = 0;
        for (id, node) in graph.nodes() {
            // The caller initializes argument resources with their use count.
            let is_argument = node.node_type().is_argument();
            for (socket, output) in node.node_type().outputs().iter().enumerate() {
                let (init, release) = match output.typedesc {
                    TypeDesc::Mesh => (OpCode::InitMeshPtr, OpCode::ReleaseMeshPtr),
                    TypeDesc::Duplis => (OpCode::InitDuplisPtr, OpCode::ReleaseDuplisPtr),
                    _ => continue,
                };
                let key = OutputKey::new(id, socket);
                let Some(slot) = self.slot(key) else { continue };
                let count = self.use_count(key);
                let release_op = ResourceOp {
                    op: release,
                    slot,
                    count: None,
                };

                if !is_argument {
                    self.inits_before.entry(id).or_default().push(ResourceOp {
                        op: init,
                        slot,
                        count: Some(count.max(1) as i32),
                    });
                    inits += 1;
                }

                if count == 0 && !is_argument {
                    self.releases_after.entry(id).or_default().push(release_op);
                    continue;
                }
                for &anchor in self.anchors.get(&key).into_iter().flatten() {
                    self.releases_after.entry(anchor).or_default().push(release_op);
                }
            }
        }
        if inits > 0 {
            debug!(resources = inits, "inserted resource lifetimes");
        }
    }

    // ------------------------------------------------------------------------
    // Emission
    // ------------------------------------------------------------------------

    fn emit(&self, name: &str) -> Result<Function, CompileError> {
        let mut writer = BytecodeWriter::new();
        let mut entries: Vec<Word> = vec![STACK_INVALID; self.graph.blocks().len()];

        for block in self.graph.blocks().iter().rev() {
            entries[block.id().as_usize()] = writer.current_address() as Word;
            for &id in block.members() {
                self.emit_node(&mut writer, &entries, id);
            }
            writer.write_opcode(OpCode::End);
        }
        let entry = entries
            .get(BlockId::MAIN.as_usize())
            .map_or(0, |&e| e as usize);

        let arguments = self
            .graph
            .inputs()
            .iter()
            .map(|input| {
                let (stack_index, use_count) = match input.key.and_then(|k| self.slot(k).map(|s| (k, s))) {
                    Some((key, slot)) if input.typedesc.is_resource() => (slot, self.use_count(key)),
                    Some((_, slot)) => (slot, 0),
                    None => (STACK_INVALID, 0),
                };
                FunctionArgument {
                    name: input.name.clone(),
                    typedesc: input.typedesc,
                    stack_index,
                    use_count,
                }
            })
            .collect();

        let mut returns = Vec::with_capacity(self.graph.outputs().len());
        for output in self.graph.outputs() {
            let stack_index = output
                .key
                .and_then(|key| self.slot(key))
                .ok_or_else(|| CompileError::UnresolvedOutput(output.name.clone()))?;
            returns.push(FunctionReturn {
                name: output.name.clone(),
                typedesc: output.typedesc,
                stack_index,
            });
        }

        Ok(Function::new(
            name,
            writer.into_code(),
            entry,
            arguments,
            returns,
        ))
    }

    fn emit_node(&self, writer: &mut BytecodeWriter, entries: &[Word], id: NodeId) {
        let Some(node) = self.graph.node(id) else { return };
        let node_type = node.node_type();
        let is_kernel = match node_type.kind() {
            NodeKind::Function => false,
            NodeKind::Kernel => true,
            NodeKind::Argument | NodeKind::Pass => return,
        };
        let Some(op) = node_type.opcode() else {
            warn!(node = node.name(), node_type = node_type.name(), "node type has no opcode");
            return;
        };

        for resource in self.inits_before.get(&id).into_iter().flatten() {
            write_resource_op(writer, resource);
        }

        writer.write_opcode(op);
        let body = if is_kernel {
            self.graph.kernel_block(id)
        } else {
            None
        };

        for (socket, input) in node_type.inputs().iter().enumerate() {
            let link = node.link(socket);
            let stack_index = link.and_then(|key| self.slot(key)).unwrap_or(STACK_INVALID);

            if is_kernel {
                let producer_block = link.and_then(|key| self.graph.node(key.node)?.block());
                let jump = match (body, producer_block) {
                    (Some(body), Some(block)) if self.graph.block_contains(body, block) => {
                        entries[body.as_usize()]
                    }
                    _ => STACK_INVALID,
                };
                writer.write_jump_address(jump);
                writer.write_stack_index(stack_index);
            } else if input.value_kind == InputValueKind::Constant {
                let value = node.input_value(socket).unwrap_or(&input.default);
                write_literal(writer, value);
            } else {
                writer.write_stack_index(stack_index);
            }
        }

        for socket in 0..node_type.outputs().len() {
            let stack_index = self
                .slot(OutputKey::new(id, socket))
                .unwrap_or(STACK_INVALID);
            writer.write_stack_index(stack_index);
        }

        for resource in self.releases_after.get(&id).into_iter().flatten() {
            write_resource_op(writer, resource);
        }
    }
}

fn write_resource_op(writer: &mut BytecodeWriter, resource: &ResourceOp) {
    writer.write_opcode(resource.op);
    writer.write_stack_index(resource.slot);
    if let Some(count) = resource.count {
        writer.write_int(count);
    }
}

fn write_literal(writer: &mut BytecodeWriter, value: &Value) {
    match value {
        Value::Float(v) => writer.write_float(*v),
        Value::Float3(v) => writer.write_float3(*v),
        Value::Float4(v) => writer.write_float4(*v),
        Value::Int(v) => writer.write_int(*v),
        Value::Matrix44(m) => writer.write_matrix44(m),
        Value::String(s) => writer.write_string(s),
        Value::Object(key) => writer.write_object(*key),
        Value::Mesh | Value::Duplis => {}
    }
}
