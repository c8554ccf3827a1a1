//! Node graph construction.
//!
//! A [`NodeGraph`] is built by caller code through [`NodeGraph::add_node`],
//! [`NodeGraph::link`] and friends, then rewritten once by
//! [`NodeGraph::finalize`]. After finalization the graph is read-only and is
//! handed to the compiler.
//!
//! ## Storage
//!
//! Node instances live in an index arena addressed by [`NodeId`]. Removing a
//! node leaves a tombstone, so ids handed out earlier stay valid (they just
//! stop resolving).
//!
//! ## Links
//!
//! Linking sockets of different types inserts conversion nodes where a
//! conversion exists. When none exists the input is left unbound and keeps its
//! default; this is reported through [`LinkOutcome::Unsupported`], not as an
//! error.

use std::sync::Arc;

use nodevm_core::{BlockId, GraphError, NodeId, TypeDesc, Value};
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::block::NodeBlock;
use crate::builtins::{arg_type_name, pass_type_name, value_type_name};
use crate::node_type::{InputValueKind, NodeType};
use crate::registry::NodeTypeRegistry;

// ============================================================================
// Socket Keys
// ============================================================================

/// Addresses one output socket of a node instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutputKey {
    pub node: NodeId,
    pub socket: usize,
}

impl OutputKey {
    pub const fn new(node: NodeId, socket: usize) -> Self {
        Self { node, socket }
    }
}

/// Addresses one input socket of a node instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InputKey {
    pub node: NodeId,
    pub socket: usize,
}

impl InputKey {
    pub const fn new(node: NodeId, socket: usize) -> Self {
        Self { node, socket }
    }
}

// ============================================================================
// Node Instances
// ============================================================================

/// What an input socket reads from.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum InputBinding {
    /// Uses the socket default.
    #[default]
    Unbound,
    /// Reads another node's output.
    Link(OutputKey),
    /// Uses a literal set on this instance.
    Value(Value),
}

/// A node in a graph.
#[derive(Debug, Clone)]
pub struct NodeInstance {
    node_type: Arc<NodeType>,
    name: String,
    pub(crate) inputs: Vec<InputBinding>,
    pub(crate) index: Option<usize>,
    pub(crate) block: Option<BlockId>,
}

impl NodeInstance {
    fn new(node_type: Arc<NodeType>, name: String) -> Self {
        let inputs = vec![InputBinding::Unbound; node_type.inputs().len()];
        Self {
            node_type,
            name,
            inputs,
            index: None,
            block: None,
        }
    }

    pub fn node_type(&self) -> &Arc<NodeType> {
        &self.node_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn inputs(&self) -> &[InputBinding] {
        &self.inputs
    }

    pub fn input(&self, socket: usize) -> Option<&InputBinding> {
        self.inputs.get(socket)
    }

    /// The output an input socket is linked to, if any.
    pub fn link(&self, socket: usize) -> Option<OutputKey> {
        match self.inputs.get(socket) {
            Some(InputBinding::Link(key)) => Some(*key),
            _ => None,
        }
    }

    /// Literal used for an input that is not linked: the bound value or the
    /// socket default.
    pub fn input_value(&self, socket: usize) -> Option<&Value> {
        match self.inputs.get(socket)? {
            InputBinding::Value(value) => Some(value),
            InputBinding::Unbound => Some(&self.node_type.inputs()[socket].default),
            InputBinding::Link(_) => None,
        }
    }

    /// Topological index assigned by `finalize()`.
    pub fn index(&self) -> Option<usize> {
        self.index
    }

    /// Owning block assigned by `finalize()`.
    pub fn block(&self) -> Option<BlockId> {
        self.block
    }
}

// ============================================================================
// Graph Interface
// ============================================================================

/// A named graph input, produced by an `ARG_*` node.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphInput {
    pub name: String,
    pub typedesc: TypeDesc,
    /// Output of the argument node; cleared when nothing reads the input.
    pub key: Option<OutputKey>,
}

/// A named graph output, collected by a `PASS_*` proxy node.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphOutput {
    pub name: String,
    pub typedesc: TypeDesc,
    pub proxy: NodeId,
    /// Producing output after `finalize()`.
    pub key: Option<OutputKey>,
}

/// Result of [`NodeGraph::link`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    /// Types matched; the input reads the output directly.
    Linked,
    /// A conversion node was inserted; the id is the node the input reads.
    Converted(NodeId),
    /// No conversion exists; the input is unbound and keeps its default.
    Unsupported,
}

// ============================================================================
// NodeGraph
// ============================================================================

/// A typed node graph.
///
/// # Example
///
/// ```
/// use nodevm_core::TypeDesc;
/// use nodevm_graph::{NodeGraph, NodeTypeRegistry};
///
/// let registry = NodeTypeRegistry::with_builtin_types();
/// let mut graph = NodeGraph::new(&registry);
///
/// let add = graph.add_node("ADD_FLOAT", "").unwrap();
/// graph.set_input_value(graph.input_socket(add, "value_a").unwrap(), 1.0f32).unwrap();
/// graph.set_input_value(graph.input_socket(add, "value_b").unwrap(), 2.0f32).unwrap();
///
/// let result = graph.add_output("result", TypeDesc::Float, 0.0f32).unwrap();
/// graph.link(graph.output_socket(add, "value").unwrap(), result).unwrap();
/// graph.finalize().unwrap();
/// assert!(graph.is_finalized());
/// ```
#[derive(Debug)]
pub struct NodeGraph<'r> {
    registry: &'r NodeTypeRegistry,
    pub(crate) nodes: Vec<Option<NodeInstance>>,
    pub(crate) names: FxHashMap<String, NodeId>,
    pub(crate) inputs: Vec<GraphInput>,
    pub(crate) outputs: Vec<GraphOutput>,
    pub(crate) blocks: Vec<NodeBlock>,
    pub(crate) finalized: bool,
}

impl<'r> NodeGraph<'r> {
    /// Create an empty graph over a registry.
    pub fn new(registry: &'r NodeTypeRegistry) -> Self {
        Self {
            registry,
            nodes: Vec::new(),
            names: FxHashMap::default(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            blocks: Vec::new(),
            finalized: false,
        }
    }

    pub fn registry(&self) -> &'r NodeTypeRegistry {
        self.registry
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub(crate) fn check_mutable(&self) -> Result<(), GraphError> {
        if self.finalized {
            return Err(GraphError::AlreadyFinalized);
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Nodes
    // ------------------------------------------------------------------------

    /// Add an instance of a registered node type.
    ///
    /// An empty name defaults to the type name; taken names get a numeric
    /// suffix (`name2`, `name3`, ...).
    pub fn add_node(&mut self, type_name: &str, name: &str) -> Result<NodeId, GraphError> {
        self.check_mutable()?;
        let node_type = self
            .registry
            .get(type_name)
            .ok_or_else(|| GraphError::UnknownNodeType(type_name.to_string()))?;
        let base = if name.is_empty() { type_name } else { name };
        let name = self.unique_name(base);

        let id = NodeId::new(self.nodes.len() as u32);
        self.names.insert(name.clone(), id);
        self.nodes
            .push(Some(NodeInstance::new(Arc::clone(node_type), name)));
        Ok(id)
    }

    fn unique_name(&self, base: &str) -> String {
        if !self.names.contains_key(base) {
            return base.to_string();
        }
        (2..)
            .map(|n| format!("{base}{n}"))
            .find(|candidate| !self.names.contains_key(candidate))
            .unwrap_or_else(|| base.to_string())
    }

    pub fn node(&self, id: NodeId) -> Option<&NodeInstance> {
        self.nodes.get(id.as_usize()).and_then(Option::as_ref)
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Result<&mut NodeInstance, GraphError> {
        self.nodes
            .get_mut(id.as_usize())
            .and_then(Option::as_mut)
            .ok_or(GraphError::UnknownNode(id))
    }

    pub(crate) fn get(&self, id: NodeId) -> Result<&NodeInstance, GraphError> {
        self.node(id).ok_or(GraphError::UnknownNode(id))
    }

    pub fn find_node(&self, name: &str) -> Option<NodeId> {
        self.names.get(name).copied()
    }

    /// Live nodes in id order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &NodeInstance)> {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(i, node)| node.as_ref().map(|n| (NodeId::new(i as u32), n)))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    pub(crate) fn live_ids(&self) -> Vec<NodeId> {
        self.nodes().map(|(id, _)| id).collect()
    }

    /// Remove a node, leaving a tombstone.
    pub(crate) fn remove_node(&mut self, id: NodeId) {
        if let Some(slot) = self.nodes.get_mut(id.as_usize())
            && let Some(node) = slot.take()
        {
            self.names.remove(node.name());
        }
    }

    // ------------------------------------------------------------------------
    // Sockets
    // ------------------------------------------------------------------------

    /// Resolve an input socket by name.
    pub fn input_socket(&self, node: NodeId, name: &str) -> Result<InputKey, GraphError> {
        let instance = self.get(node)?;
        instance
            .node_type()
            .input_index(name)
            .map(|socket| InputKey::new(node, socket))
            .ok_or_else(|| GraphError::UnknownSocket {
                node: instance.name().to_string(),
                direction: "input",
                socket: name.to_string(),
            })
    }

    /// Resolve an output socket by name.
    pub fn output_socket(&self, node: NodeId, name: &str) -> Result<OutputKey, GraphError> {
        let instance = self.get(node)?;
        instance
            .node_type()
            .output_index(name)
            .map(|socket| OutputKey::new(node, socket))
            .ok_or_else(|| GraphError::UnknownSocket {
                node: instance.name().to_string(),
                direction: "output",
                socket: name.to_string(),
            })
    }

    pub(crate) fn output_type(&self, key: OutputKey) -> Result<TypeDesc, GraphError> {
        let instance = self.get(key.node)?;
        instance
            .node_type()
            .outputs()
            .get(key.socket)
            .map(|o| o.typedesc)
            .ok_or_else(|| GraphError::UnknownSocket {
                node: instance.name().to_string(),
                direction: "output",
                socket: key.socket.to_string(),
            })
    }

    fn input_desc(&self, key: InputKey) -> Result<(TypeDesc, InputValueKind), GraphError> {
        let instance = self.get(key.node)?;
        instance
            .node_type()
            .inputs()
            .get(key.socket)
            .map(|i| (i.typedesc, i.value_kind))
            .ok_or_else(|| GraphError::UnknownSocket {
                node: instance.name().to_string(),
                direction: "input",
                socket: key.socket.to_string(),
            })
    }

    pub(crate) fn bind(&mut self, key: InputKey, binding: InputBinding) -> Result<(), GraphError> {
        let instance = self.node_mut(key.node)?;
        let name = instance.name().to_string();
        let slot = instance
            .inputs
            .get_mut(key.socket)
            .ok_or_else(|| GraphError::UnknownSocket {
                node: name,
                direction: "input",
                socket: key.socket.to_string(),
            })?;
        *slot = binding;
        Ok(())
    }

    /// Bind a literal to an input.
    ///
    /// Int and float literals are converted to the socket type; other
    /// mismatched literals are ignored and the input keeps its binding.
    pub fn set_input_value(
        &mut self,
        key: InputKey,
        value: impl Into<Value>,
    ) -> Result<(), GraphError> {
        self.check_mutable()?;
        let (typedesc, _) = self.input_desc(key)?;
        let value = value.into();
        check_literal(&value)?;
        let value = match (value, typedesc) {
            (value, t) if value.type_desc() == t => value,
            (Value::Int(v), TypeDesc::Float) => Value::Float(v as f32),
            (Value::Float(v), TypeDesc::Int) => Value::Int(v as i32),
            (value, t) => {
                debug!(value = %value, socket = %t, "ignoring literal of mismatched type");
                return Ok(());
            }
        };
        self.bind(key, InputBinding::Value(value))
    }

    /// Link an output to an input.
    ///
    /// Constant inputs cannot be linked; like a missing conversion this leaves
    /// the input unbound and returns [`LinkOutcome::Unsupported`].
    pub fn link(&mut self, from: OutputKey, to: InputKey) -> Result<LinkOutcome, GraphError> {
        self.check_mutable()?;
        let from_type = self.output_type(from)?;
        let (to_type, value_kind) = self.input_desc(to)?;

        if value_kind == InputValueKind::Constant {
            debug!(from = %from.node, to = %to.node, "cannot link a constant input");
            self.bind(to, InputBinding::Unbound)?;
            return Ok(LinkOutcome::Unsupported);
        }

        if from_type == to_type {
            self.bind(to, InputBinding::Link(from))?;
            return Ok(LinkOutcome::Linked);
        }

        match self.insert_conversion(from, from_type, to_type)? {
            Some(converted) => {
                debug!(from = %from_type, to = %to_type, node = %converted.node, "inserted conversion");
                self.bind(to, InputBinding::Link(converted))?;
                Ok(LinkOutcome::Converted(converted.node))
            }
            None => {
                debug!(from = %from_type, to = %to_type, "unsupported conversion, input left unbound");
                self.bind(to, InputBinding::Unbound)?;
                Ok(LinkOutcome::Unsupported)
            }
        }
    }

    // ------------------------------------------------------------------------
    // Interface
    // ------------------------------------------------------------------------

    /// Add a graph input backed by an `ARG_*` node.
    pub fn add_input(&mut self, name: &str, typedesc: TypeDesc) -> Result<OutputKey, GraphError> {
        self.check_mutable()?;
        if self.inputs.iter().any(|i| i.name == name) {
            return Err(GraphError::DuplicateInput(name.to_string()));
        }
        let type_name = arg_type_name(typedesc);
        if !self.registry.contains(&type_name) {
            return Err(GraphError::UnknownType {
                role: "argument",
                typedesc,
            });
        }
        let node = self.add_node(&type_name, name)?;
        let key = OutputKey::new(node, 0);
        self.inputs.push(GraphInput {
            name: name.to_string(),
            typedesc,
            key: Some(key),
        });
        Ok(key)
    }

    /// Add a graph output backed by a `PASS_*` proxy holding `default`.
    pub fn add_output(
        &mut self,
        name: &str,
        typedesc: TypeDesc,
        default: impl Into<Value>,
    ) -> Result<InputKey, GraphError> {
        self.check_mutable()?;
        if self.outputs.iter().any(|o| o.name == name) {
            return Err(GraphError::DuplicateOutput(name.to_string()));
        }
        let default = default.into();
        check_literal(&default)?;
        let type_name = pass_type_name(typedesc);
        if !self.registry.contains(&type_name) {
            return Err(GraphError::UnknownType {
                role: "pass",
                typedesc,
            });
        }
        let proxy = self.add_node(&type_name, name)?;
        let key = InputKey::new(proxy, 0);
        self.set_input_value(key, default)?;
        self.outputs.push(GraphOutput {
            name: name.to_string(),
            typedesc,
            proxy,
            key: None,
        });
        Ok(key)
    }

    /// Output of the argument node behind a graph input.
    pub fn input_key(&self, name: &str) -> Option<OutputKey> {
        self.inputs.iter().find(|i| i.name == name)?.key
    }

    /// Input of the proxy node behind a graph output.
    pub fn output_key(&self, name: &str) -> Option<InputKey> {
        self.outputs
            .iter()
            .find(|o| o.name == name)
            .map(|o| InputKey::new(o.proxy, 0))
    }

    pub fn inputs(&self) -> &[GraphInput] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[GraphOutput] {
        &self.outputs
    }

    // ------------------------------------------------------------------------
    // Blocks
    // ------------------------------------------------------------------------

    /// Blocks of a finalized graph; `blocks()[0]` is `main`.
    pub fn blocks(&self) -> &[NodeBlock] {
        &self.blocks
    }

    pub fn block(&self, id: BlockId) -> Option<&NodeBlock> {
        self.blocks.get(id.as_usize())
    }

    pub fn main_block(&self) -> Option<&NodeBlock> {
        self.block(BlockId::MAIN)
    }

    /// Add a `VALUE_*` node producing `value`.
    pub(crate) fn add_value_node(&mut self, value: Value) -> Result<OutputKey, GraphError> {
        let type_name = value_type_name(value.type_desc());
        let node = self.add_node(&type_name, "")?;
        self.bind(InputKey::new(node, 0), InputBinding::Value(value))?;
        Ok(OutputKey::new(node, 0))
    }
}

/// Reject literals the bytecode cannot encode.
fn check_literal(value: &Value) -> Result<(), GraphError> {
    match value {
        Value::String(s) if s.contains('\0') => Err(GraphError::InvalidString(s.clone())),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> NodeTypeRegistry {
        NodeTypeRegistry::with_builtin_types()
    }

    #[test]
    fn add_node_uses_type_name() {
        let registry = registry();
        let mut graph = NodeGraph::new(&registry);
        let a = graph.add_node("ADD_FLOAT", "").unwrap();
        let b = graph.add_node("ADD_FLOAT", "").unwrap();
        let c = graph.add_node("ADD_FLOAT", "").unwrap();
        assert_eq!(graph.node(a).unwrap().name(), "ADD_FLOAT");
        assert_eq!(graph.node(b).unwrap().name(), "ADD_FLOAT2");
        assert_eq!(graph.node(c).unwrap().name(), "ADD_FLOAT3");
        assert_eq!(graph.find_node("ADD_FLOAT2"), Some(b));
    }

    #[test]
    fn add_node_unknown_type() {
        let registry = registry();
        let mut graph = NodeGraph::new(&registry);
        let err = graph.add_node("NOPE", "x").unwrap_err();
        assert_eq!(err, GraphError::UnknownNodeType("NOPE".to_string()));
    }

    #[test]
    fn string_literal_with_nul_is_rejected() {
        let registry = registry();
        let mut graph = NodeGraph::new(&registry);
        let before = graph.node_count();
        let err = graph
            .add_output("s", TypeDesc::String, "ab\0cd")
            .unwrap_err();
        assert_eq!(err, GraphError::InvalidString("ab\0cd".to_string()));
        assert_eq!(graph.node_count(), before);
        assert!(graph.outputs().is_empty());

        let key = graph.add_output("s", TypeDesc::String, "abcd").unwrap();
        let err = graph.set_input_value(key, "x\0").unwrap_err();
        assert!(matches!(err, GraphError::InvalidString(_)));
        let proxy = graph.node(key.node).unwrap();
        assert_eq!(proxy.input_value(0), Some(&Value::String("abcd".to_string())));
    }

    #[test]
    fn unknown_socket_name() {
        let registry = registry();
        let mut graph = NodeGraph::new(&registry);
        let add = graph.add_node("ADD_FLOAT", "add").unwrap();
        let err = graph.input_socket(add, "value_c").unwrap_err();
        assert_eq!(
            err,
            GraphError::UnknownSocket {
                node: "add".to_string(),
                direction: "input",
                socket: "value_c".to_string(),
            }
        );
    }

    #[test]
    fn link_same_type() {
        let registry = registry();
        let mut graph = NodeGraph::new(&registry);
        let a = graph.add_node("ADD_FLOAT", "a").unwrap();
        let b = graph.add_node("SINE", "b").unwrap();
        let from = graph.output_socket(a, "value").unwrap();
        let to = graph.input_socket(b, "value").unwrap();
        assert_eq!(graph.link(from, to).unwrap(), LinkOutcome::Linked);
        assert_eq!(graph.node(b).unwrap().link(0), Some(from));
    }

    #[test]
    fn link_constant_input_is_unsupported() {
        let registry = registry();
        let mut graph = NodeGraph::new(&registry);
        let a = graph.add_node("FLOAT_TO_INT", "a").unwrap();
        let mix = graph.add_node("MIX_RGB", "mix").unwrap();
        let from = graph.output_socket(a, "value").unwrap();
        let to = graph.input_socket(mix, "mode").unwrap();
        assert_eq!(graph.link(from, to).unwrap(), LinkOutcome::Unsupported);
        assert_eq!(graph.node(mix).unwrap().input(0), Some(&InputBinding::Unbound));
    }

    #[test]
    fn duplicate_interface_names() {
        let registry = registry();
        let mut graph = NodeGraph::new(&registry);
        graph.add_input("x", TypeDesc::Float).unwrap();
        assert_eq!(
            graph.add_input("x", TypeDesc::Int).unwrap_err(),
            GraphError::DuplicateInput("x".to_string())
        );
        graph.add_output("y", TypeDesc::Float, 0.0f32).unwrap();
        assert_eq!(
            graph.add_output("y", TypeDesc::Float, 0.0f32).unwrap_err(),
            GraphError::DuplicateOutput("y".to_string())
        );
    }

    #[test]
    fn interface_keys() {
        let registry = registry();
        let mut graph = NodeGraph::new(&registry);
        let input = graph.add_input("x", TypeDesc::Float3).unwrap();
        let output = graph.add_output("y", TypeDesc::Float3, Value::zero(TypeDesc::Float3)).unwrap();
        assert_eq!(graph.input_key("x"), Some(input));
        assert_eq!(graph.output_key("y"), Some(output));
        assert_eq!(graph.node(input.node).unwrap().node_type().name(), "ARG_FLOAT3");
        assert_eq!(graph.node(output.node).unwrap().node_type().name(), "PASS_FLOAT3");
        assert_eq!(graph.input_key("z"), None);
    }

    #[test]
    fn set_input_value_coerces_numbers() {
        let registry = registry();
        let mut graph = NodeGraph::new(&registry);
        let add = graph.add_node("ADD_FLOAT", "").unwrap();
        let key = graph.input_socket(add, "value_a").unwrap();
        graph.set_input_value(key, 3).unwrap();
        assert_eq!(graph.node(add).unwrap().input_value(0), Some(&Value::Float(3.0)));

        graph.set_input_value(key, "text").unwrap();
        assert_eq!(graph.node(add).unwrap().input_value(0), Some(&Value::Float(3.0)));
    }

    #[test]
    fn input_value_falls_back_to_default() {
        let registry = registry();
        let mut graph = NodeGraph::new(&registry);
        let div = graph.add_node("DIV_MATRIX44_FLOAT", "").unwrap();
        assert_eq!(graph.node(div).unwrap().input_value(1), Some(&Value::Float(1.0)));
    }

    #[test]
    fn finalized_graph_is_read_only() {
        let registry = registry();
        let mut graph = NodeGraph::new(&registry);
        graph.finalize().unwrap();
        assert_eq!(
            graph.add_node("ADD_FLOAT", "").unwrap_err(),
            GraphError::AlreadyFinalized
        );
    }
}
