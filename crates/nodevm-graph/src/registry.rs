//! Node type registry.
//!
//! The registry owns every [`NodeType`] a graph may instantiate. It is an
//! ordinary value: build it once, then lend it to any number of graphs.

use std::sync::Arc;

use nodevm_core::GraphError;
use rustc_hash::FxHashMap;

use crate::builtins::builtin_node_types;
use crate::node_type::NodeType;

/// Name-indexed collection of node types.
///
/// # Thread Safety
///
/// The registry is immutable while graphs borrow it, so a single instance
/// can back graphs on several threads at once.
///
/// # Example
///
/// ```
/// use nodevm_graph::NodeTypeRegistry;
///
/// let registry = NodeTypeRegistry::with_builtin_types();
/// assert!(registry.contains("ADD_FLOAT"));
/// assert!(registry.contains("PASS_MESH"));
/// ```
#[derive(Debug, Default)]
pub struct NodeTypeRegistry {
    types: Vec<Arc<NodeType>>,
    by_name: FxHashMap<String, usize>,
}

impl NodeTypeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding every built-in node type.
    pub fn with_builtin_types() -> Self {
        let mut registry = Self::new();
        for nt in builtin_node_types() {
            registry.insert(nt);
        }
        registry
    }

    /// Add the built-in node types to this registry.
    ///
    /// Fails without registering anything further if a built-in name is
    /// already taken.
    pub fn register_builtin_types(&mut self) -> Result<(), GraphError> {
        for nt in builtin_node_types() {
            self.register(nt)?;
        }
        Ok(())
    }

    /// Register a node type.
    pub fn register(&mut self, node_type: NodeType) -> Result<Arc<NodeType>, GraphError> {
        if self.by_name.contains_key(node_type.name()) {
            return Err(GraphError::DuplicateNodeType(node_type.name().to_string()));
        }
        Ok(self.insert(node_type))
    }

    fn insert(&mut self, node_type: NodeType) -> Arc<NodeType> {
        let node_type = Arc::new(node_type);
        let index = self.types.len();
        self.by_name.insert(node_type.name().to_string(), index);
        self.types.push(Arc::clone(&node_type));
        node_type
    }

    /// Look up a node type by name.
    pub fn get(&self, name: &str) -> Option<&Arc<NodeType>> {
        self.by_name.get(name).map(|&index| &self.types[index])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Iterate node types in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<NodeType>> {
        self.types.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node_type::{InputValueKind, NodeKind};
    use nodevm_core::{OpCode, Operand, TypeDesc};

    #[test]
    fn new_registry_is_empty() {
        let registry = NodeTypeRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
        assert!(registry.get("ADD_FLOAT").is_none());
    }

    #[test]
    fn register_and_get() {
        let mut registry = NodeTypeRegistry::new();
        let nt = registry
            .register(
                NodeType::new("ADD_FLOAT", NodeKind::Function)
                    .input("value_a", 0.0f32)
                    .input("value_b", 0.0f32)
                    .output("value", TypeDesc::Float),
            )
            .unwrap();
        assert_eq!(nt.name(), "ADD_FLOAT");
        assert!(Arc::ptr_eq(registry.get("ADD_FLOAT").unwrap(), &nt));
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut registry = NodeTypeRegistry::new();
        registry
            .register(NodeType::new("FOO", NodeKind::Function))
            .unwrap();
        let err = registry
            .register(NodeType::new("FOO", NodeKind::Function))
            .unwrap_err();
        assert_eq!(err, GraphError::DuplicateNodeType("FOO".to_string()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn builtins_twice_fails() {
        let mut registry = NodeTypeRegistry::with_builtin_types();
        assert!(registry.register_builtin_types().is_err());
    }

    #[test]
    fn builtin_helper_types_for_every_type() {
        let registry = NodeTypeRegistry::with_builtin_types();
        for t in TypeDesc::ALL {
            let pass = registry.get(&format!("PASS_{}", t.name())).unwrap();
            assert_eq!(pass.kind(), NodeKind::Pass);
            assert_eq!(pass.inputs()[0].typedesc, t);
            let arg = registry.get(&format!("ARG_{}", t.name())).unwrap();
            assert!(arg.inputs().is_empty());
            assert_eq!(arg.outputs()[0].typedesc, t);
            let value = registry.get(&format!("VALUE_{}", t.name())).unwrap();
            assert_eq!(value.inputs()[0].value_kind, InputValueKind::Constant);
        }
    }

    #[test]
    fn builtin_function_types_resolve_opcodes() {
        let registry = NodeTypeRegistry::with_builtin_types();
        for nt in registry.iter() {
            match nt.kind() {
                NodeKind::Function | NodeKind::Kernel => {
                    assert!(nt.opcode().is_some(), "{} has no opcode", nt.name());
                }
                NodeKind::Pass | NodeKind::Argument => assert!(nt.opcode().is_none()),
            }
        }
    }

    #[test]
    fn every_node_opcode_has_a_node_type() {
        let registry = NodeTypeRegistry::with_builtin_types();
        let skip = [
            OpCode::Noop,
            OpCode::End,
            OpCode::InitMeshPtr,
            OpCode::ReleaseMeshPtr,
            OpCode::InitDuplisPtr,
            OpCode::ReleaseDuplisPtr,
        ];
        for op in OpCode::ALL {
            if skip.contains(&op) {
                continue;
            }
            assert!(registry.contains(op.name()), "missing node type {}", op.name());
        }
    }

    #[test]
    fn builtin_signatures_match_operand_layouts() {
        let registry = NodeTypeRegistry::with_builtin_types();
        for nt in registry.iter() {
            let Some(op) = nt.opcode() else { continue };
            let mut expected = Vec::new();
            for input in nt.inputs() {
                if nt.is_kernel() {
                    expected.push(Operand::Jump);
                    expected.push(Operand::Stack);
                    continue;
                }
                match input.value_kind {
                    InputValueKind::Constant => match input.typedesc {
                        TypeDesc::Float => expected.push(Operand::Float),
                        TypeDesc::Float3 => expected.push(Operand::Float3),
                        TypeDesc::Float4 => expected.push(Operand::Float4),
                        TypeDesc::Int => expected.push(Operand::Int),
                        TypeDesc::Matrix44 => expected.push(Operand::Matrix44),
                        TypeDesc::String => expected.push(Operand::String),
                        TypeDesc::Object => expected.push(Operand::Object),
                        TypeDesc::Mesh | TypeDesc::Duplis => {}
                    },
                    InputValueKind::Expression | InputValueKind::Variable => {
                        expected.push(Operand::Stack)
                    }
                }
            }
            expected.extend(nt.outputs().iter().map(|_| Operand::Stack));
            assert_eq!(op.operands(), expected.as_slice(), "layout of {}", nt.name());
        }
    }
}
