//! Node type signatures.
//!
//! A [`NodeType`] is registered once and shared by every instance through an
//! `Arc`. Its sockets are ordered: socket order is operand order in the
//! bytecode.

use nodevm_core::{OpCode, TypeDesc, Value};

/// Closed set of node kinds, each with its own expansion rule in codegen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Lowers to a single instruction.
    Function,
    /// Lowers to a single instruction that runs a nested block.
    Kernel,
    /// Identity proxy, elided by `finalize()`.
    Pass,
    /// Produces a graph input; no instruction.
    Argument,
}

/// How an input receives its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum InputValueKind {
    /// Literal only, encoded inline in the instruction.
    Constant,
    /// Linked to another node's output (or a materialized constant node).
    #[default]
    Expression,
    /// Bound to a block-local variable.
    Variable,
}

/// How an output publishes its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OutputValueKind {
    /// Ordinary result, available after the node has run.
    #[default]
    Expression,
    /// Block-local variable the node publishes to its nested block.
    Variable,
}

/// Typed input socket.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeInput {
    pub name: String,
    pub typedesc: TypeDesc,
    pub default: Value,
    pub value_kind: InputValueKind,
}

/// Typed output socket.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeOutput {
    pub name: String,
    pub typedesc: TypeDesc,
    pub value_kind: OutputValueKind,
}

/// A named operation signature.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeType {
    name: String,
    kind: NodeKind,
    opcode: Option<OpCode>,
    inputs: Vec<NodeInput>,
    outputs: Vec<NodeOutput>,
}

impl NodeType {
    /// Create a node type without sockets.
    ///
    /// Function and Kernel types resolve their opcode from the name.
    pub fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        let name = name.into();
        let opcode = match kind {
            NodeKind::Function | NodeKind::Kernel => OpCode::from_name(&name),
            NodeKind::Pass | NodeKind::Argument => None,
        };
        Self {
            name,
            kind,
            opcode,
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// Add an expression input with a default value.
    pub fn input(self, name: &str, default: impl Into<Value>) -> Self {
        self.input_with(name, default.into(), InputValueKind::Expression)
    }

    /// Add a constant-only input.
    pub fn constant(self, name: &str, default: impl Into<Value>) -> Self {
        self.input_with(name, default.into(), InputValueKind::Constant)
    }

    /// Add a variable input.
    pub fn variable(self, name: &str, default: impl Into<Value>) -> Self {
        self.input_with(name, default.into(), InputValueKind::Variable)
    }

    /// Add an input of the given kind; the socket type is the default's type.
    pub fn input_with(mut self, name: &str, default: Value, value_kind: InputValueKind) -> Self {
        self.inputs.push(NodeInput {
            name: name.to_string(),
            typedesc: default.type_desc(),
            default,
            value_kind,
        });
        self
    }

    /// Add an expression output.
    pub fn output(self, name: &str, typedesc: TypeDesc) -> Self {
        self.output_with(name, typedesc, OutputValueKind::Expression)
    }

    /// Add an output of the given kind.
    pub fn output_with(
        mut self,
        name: &str,
        typedesc: TypeDesc,
        value_kind: OutputValueKind,
    ) -> Self {
        self.outputs.push(NodeOutput {
            name: name.to_string(),
            typedesc,
            value_kind,
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Opcode this type lowers to, for Function and Kernel kinds.
    pub fn opcode(&self) -> Option<OpCode> {
        self.opcode
    }

    pub fn inputs(&self) -> &[NodeInput] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[NodeOutput] {
        &self.outputs
    }

    pub fn input_index(&self, name: &str) -> Option<usize> {
        self.inputs.iter().position(|i| i.name == name)
    }

    pub fn output_index(&self, name: &str) -> Option<usize> {
        self.outputs.iter().position(|o| o.name == name)
    }

    pub fn is_kernel(&self) -> bool {
        self.kind == NodeKind::Kernel
    }

    pub fn is_pass(&self) -> bool {
        self.kind == NodeKind::Pass
    }

    pub fn is_argument(&self) -> bool {
        self.kind == NodeKind::Argument
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_collects_sockets() {
        let nt = NodeType::new("ADD_FLOAT", NodeKind::Function)
            .input("value_a", 0.0f32)
            .input("value_b", 0.0f32)
            .output("value", TypeDesc::Float);
        assert_eq!(nt.opcode(), Some(OpCode::AddFloat));
        assert_eq!(nt.inputs().len(), 2);
        assert_eq!(nt.input_index("value_b"), Some(1));
        assert_eq!(nt.output_index("value"), Some(0));
        assert_eq!(nt.input_index("value_c"), None);
    }

    #[test]
    fn input_type_follows_default() {
        let nt = NodeType::new("MIX_RGB", NodeKind::Function).constant("mode", 0);
        assert_eq!(nt.inputs()[0].typedesc, TypeDesc::Int);
        assert_eq!(nt.inputs()[0].value_kind, InputValueKind::Constant);
    }

    #[test]
    fn pass_types_have_no_opcode() {
        let nt = NodeType::new("PASS_FLOAT", NodeKind::Pass);
        assert!(nt.is_pass());
        assert_eq!(nt.opcode(), None);
    }
}
