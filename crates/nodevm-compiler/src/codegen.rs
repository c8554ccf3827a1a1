//! Generic code generation.
//!
//! [`NodeCompiler`] walks a finalized graph from its outputs and hands every
//! node to a [`CodeGenerator`] as a call with value handles for its inputs and
//! outputs. A backend decides what a handle is; [`DebugCodeGenerator`] just
//! numbers them and prints an SSA-style listing.
//!
//! ## Expansion
//!
//! Each node kind has one expansion rule:
//!
//! - `Function` / `Kernel`: allocate the outputs, expand every linked input,
//!   create constants for constant inputs, then emit the call. Inputs of a
//!   kernel that come from its body are expanded in a child scope, so body
//!   values never leak into the enclosing block.
//! - `Pass`: expand the upstream node.
//! - `Argument`: look up the handle mapped for the graph input.
//!
//! A node is expanded once per scope chain.

use std::fmt::Write as _;

use nodevm_core::{CompileError, NodeId, TypeDesc, Value};
use nodevm_graph::{InputValueKind, NodeGraph, NodeKind, NodeType, OutputKey};
use rustc_hash::FxHashMap;
use tracing::{instrument, trace};

/// Backend interface driven by [`NodeCompiler`].
pub trait CodeGenerator {
    /// Handle to one value in the generated code.
    type Value: Copy;

    fn node_graph_begin(&mut self, name: &str, graph: &NodeGraph<'_>);
    fn node_graph_end(&mut self);

    /// Bind graph output `output_index` to a value.
    fn store_return_value(&mut self, output_index: usize, typedesc: TypeDesc, value: Self::Value);

    /// Handle for graph input `input_index`.
    fn map_argument(&mut self, input_index: usize, typedesc: TypeDesc) -> Self::Value;

    /// Fresh storage for a node output.
    fn alloc_node_value(&mut self, typedesc: TypeDesc) -> Self::Value;

    fn create_constant(&mut self, typedesc: TypeDesc, value: &Value) -> Self::Value;

    /// Emit one node call.
    fn eval_node(&mut self, node_type: &NodeType, inputs: &[Self::Value], outputs: &[Self::Value]);
}

/// Expands a finalized graph into calls on a [`CodeGenerator`].
pub struct NodeCompiler<'g, 'r> {
    graph: &'g NodeGraph<'r>,
}

/// Values defined in one scope. Lookups fall through to outer scopes.
struct Scopes<V> {
    stack: Vec<FxHashMap<OutputKey, V>>,
}

impl<V: Copy> Scopes<V> {
    fn new() -> Self {
        Self {
            stack: vec![FxHashMap::default()],
        }
    }

    fn find(&self, key: OutputKey) -> Option<V> {
        self.stack.iter().rev().find_map(|scope| scope.get(&key).copied())
    }

    fn has_node(&self, node: NodeId) -> bool {
        self.find(OutputKey::new(node, 0)).is_some()
    }

    fn set(&mut self, key: OutputKey, value: V) {
        if let Some(scope) = self.stack.last_mut() {
            scope.insert(key, value);
        }
    }

    fn push(&mut self) {
        self.stack.push(FxHashMap::default());
    }

    fn pop(&mut self) {
        self.stack.pop();
    }
}

impl<'g, 'r> NodeCompiler<'g, 'r> {
    pub fn new(graph: &'g NodeGraph<'r>) -> Self {
        Self { graph }
    }

    /// Run `generator` over the graph.
    #[instrument(skip_all, name = "codegen", fields(function = name))]
    pub fn generate<G: CodeGenerator>(
        &self,
        name: &str,
        generator: &mut G,
    ) -> Result<(), CompileError> {
        if !self.graph.is_finalized() {
            return Err(CompileError::NotFinalized);
        }

        generator.node_graph_begin(name, self.graph);

        let mut arguments = FxHashMap::default();
        for (index, input) in self.graph.inputs().iter().enumerate() {
            if let Some(key) = input.key {
                arguments.insert(key, generator.map_argument(index, input.typedesc));
            }
        }

        let mut scopes = Scopes::new();
        for (index, output) in self.graph.outputs().iter().enumerate() {
            let key = output
                .key
                .ok_or_else(|| CompileError::UnresolvedOutput(output.name.clone()))?;
            self.expand_node(key.node, &mut scopes, &arguments, generator);
            let value = scopes
                .find(key)
                .ok_or_else(|| CompileError::UnresolvedOutput(output.name.clone()))?;
            generator.store_return_value(index, output.typedesc, value);
        }

        generator.node_graph_end();
        Ok(())
    }

    fn expand_node<G: CodeGenerator>(
        &self,
        id: NodeId,
        scopes: &mut Scopes<G::Value>,
        arguments: &FxHashMap<OutputKey, G::Value>,
        generator: &mut G,
    ) {
        if scopes.has_node(id) {
            return;
        }
        let Some(node) = self.graph.node(id) else { return };
        match node.node_type().kind() {
            NodeKind::Function | NodeKind::Kernel => {
                self.expand_expression_node(id, scopes, arguments, generator)
            }
            NodeKind::Pass => {
                if let Some(up) = node.link(0) {
                    self.expand_node(up.node, scopes, arguments, generator);
                    if let Some(value) = scopes.find(up) {
                        scopes.set(OutputKey::new(id, 0), value);
                    }
                }
            }
            NodeKind::Argument => {
                let key = OutputKey::new(id, 0);
                if let Some(&value) = arguments.get(&key) {
                    scopes.set(key, value);
                }
            }
        }
    }

    fn expand_expression_node<G: CodeGenerator>(
        &self,
        id: NodeId,
        scopes: &mut Scopes<G::Value>,
        arguments: &FxHashMap<OutputKey, G::Value>,
        generator: &mut G,
    ) {
        let Some(node) = self.graph.node(id) else { return };
        let node_type = node.node_type();
        let body = if node_type.is_kernel() {
            self.graph.kernel_block(id)
        } else {
            None
        };

        let mut outputs = Vec::with_capacity(node_type.outputs().len());
        for (socket, output) in node_type.outputs().iter().enumerate() {
            let value = generator.alloc_node_value(output.typedesc);
            scopes.set(OutputKey::new(id, socket), value);
            outputs.push(value);
        }

        let mut inputs = Vec::with_capacity(node_type.inputs().len());
        for (socket, input) in node_type.inputs().iter().enumerate() {
            let link = node.link(socket);
            let value = match (input.value_kind, link) {
                (InputValueKind::Constant, _) | (_, None) => {
                    let value = node.input_value(socket).unwrap_or(&input.default);
                    generator.create_constant(input.typedesc, value)
                }
                (_, Some(key)) => {
                    let in_body = body.is_some_and(|body| {
                        self.graph
                            .node(key.node)
                            .and_then(|n| n.block())
                            .is_some_and(|block| self.graph.block_contains(body, block))
                    });
                    if in_body {
                        scopes.push();
                    }
                    self.expand_node(key.node, scopes, arguments, generator);
                    let found = scopes.find(key);
                    if in_body {
                        scopes.pop();
                    }
                    match found {
                        Some(value) => value,
                        None => generator.create_constant(input.typedesc, &input.default),
                    }
                }
            };
            inputs.push(value);
        }

        trace!(node = node.name(), "expanded node");
        generator.eval_node(node_type, &inputs, &outputs);
    }
}

/// Writes a readable SSA-style listing instead of code.
///
/// ```text
/// graph add {
///   %0 = arg 0 FLOAT
///   %1 = alloc FLOAT
///   %2 = alloc FLOAT
///   %3 = FLOAT 2
///   %2 = VALUE_FLOAT(%3)
///   %1 = ADD_FLOAT(%0, %2)
///   return 0 %1
/// }
/// ```
#[derive(Debug, Default)]
pub struct DebugCodeGenerator {
    text: String,
    next: usize,
}

impl DebugCodeGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }

    fn fresh(&mut self) -> usize {
        let value = self.next;
        self.next += 1;
        value
    }
}

fn join_values(values: &[usize]) -> String {
    values
        .iter()
        .map(|v| format!("%{v}"))
        .collect::<Vec<_>>()
        .join(", ")
}

impl CodeGenerator for DebugCodeGenerator {
    type Value = usize;

    fn node_graph_begin(&mut self, name: &str, _graph: &NodeGraph<'_>) {
        self.next = 0;
        let _ = writeln!(self.text, "graph {name} {{");
    }

    fn node_graph_end(&mut self) {
        self.text.push_str("}\n");
    }

    fn store_return_value(&mut self, output_index: usize, _typedesc: TypeDesc, value: usize) {
        let _ = writeln!(self.text, "  return {output_index} %{value}");
    }

    fn map_argument(&mut self, input_index: usize, typedesc: TypeDesc) -> usize {
        let value = self.fresh();
        let _ = writeln!(self.text, "  %{value} = arg {input_index} {typedesc}");
        value
    }

    fn alloc_node_value(&mut self, typedesc: TypeDesc) -> usize {
        let value = self.fresh();
        let _ = writeln!(self.text, "  %{value} = alloc {typedesc}");
        value
    }

    fn create_constant(&mut self, typedesc: TypeDesc, value: &Value) -> usize {
        let handle = self.fresh();
        let _ = writeln!(self.text, "  %{handle} = {typedesc} {value}");
        handle
    }

    fn eval_node(&mut self, node_type: &NodeType, inputs: &[usize], outputs: &[usize]) {
        let _ = writeln!(
            self.text,
            "  {} = {}({})",
            join_values(outputs),
            node_type.name(),
            join_values(inputs)
        );
    }
}
