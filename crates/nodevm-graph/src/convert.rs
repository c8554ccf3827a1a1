//! Implicit socket type conversions.
//!
//! | from     | to       | nodes                                     |
//! |----------|----------|-------------------------------------------|
//! | INT      | FLOAT    | `INT_TO_FLOAT`                            |
//! | FLOAT    | INT      | `FLOAT_TO_INT`                            |
//! | FLOAT    | FLOAT3/4 | `SET_FLOAT3/4`, value in every component  |
//! | FLOAT3/4 | FLOAT    | `GET_ELEM_FLOAT3/4`, component 0          |
//! | FLOAT3   | FLOAT4   | 3x `GET_ELEM_FLOAT3` into `SET_FLOAT4`    |
//! | FLOAT4   | FLOAT3   | 3x `GET_ELEM_FLOAT4` into `SET_FLOAT3`    |
//!
//! Every other pair is unsupported.

use nodevm_core::{GraphError, TypeDesc};

use crate::graph::{InputBinding, InputKey, NodeGraph, OutputKey};

impl NodeGraph<'_> {
    /// Insert the conversion nodes for `from_type -> to_type`, fed by `from`.
    ///
    /// Returns the output the converted value is read from, or `None` when no
    /// conversion exists.
    pub(crate) fn insert_conversion(
        &mut self,
        from: OutputKey,
        from_type: TypeDesc,
        to_type: TypeDesc,
    ) -> Result<Option<OutputKey>, GraphError> {
        use TypeDesc::*;

        let converted = match (from_type, to_type) {
            (Int, Float) => self.unary_conversion("INT_TO_FLOAT", from)?,
            (Float, Int) => self.unary_conversion("FLOAT_TO_INT", from)?,
            (Float, Float3) => self.splat("SET_FLOAT3", 3, from)?,
            (Float, Float4) => self.splat("SET_FLOAT4", 4, from)?,
            (Float3, Float) => self.element("GET_ELEM_FLOAT3", 0, from)?,
            (Float4, Float) => self.element("GET_ELEM_FLOAT4", 0, from)?,
            (Float3, Float4) => self.reshape("GET_ELEM_FLOAT3", "SET_FLOAT4", from)?,
            (Float4, Float3) => self.reshape("GET_ELEM_FLOAT4", "SET_FLOAT3", from)?,
            _ => return Ok(None),
        };
        Ok(Some(converted))
    }

    fn unary_conversion(&mut self, type_name: &str, from: OutputKey) -> Result<OutputKey, GraphError> {
        let node = self.add_node(type_name, "")?;
        self.bind(InputKey::new(node, 0), InputBinding::Link(from))?;
        Ok(OutputKey::new(node, 0))
    }

    fn splat(&mut self, type_name: &str, components: usize, from: OutputKey) -> Result<OutputKey, GraphError> {
        let node = self.add_node(type_name, "")?;
        for socket in 0..components {
            self.bind(InputKey::new(node, socket), InputBinding::Link(from))?;
        }
        Ok(OutputKey::new(node, 0))
    }

    fn element(&mut self, type_name: &str, index: i32, from: OutputKey) -> Result<OutputKey, GraphError> {
        let node = self.add_node(type_name, "")?;
        self.bind(InputKey::new(node, 0), InputBinding::Value(index.into()))?;
        self.bind(InputKey::new(node, 1), InputBinding::Link(from))?;
        Ok(OutputKey::new(node, 0))
    }

    fn reshape(&mut self, get_elem: &str, set: &str, from: OutputKey) -> Result<OutputKey, GraphError> {
        let node = self.add_node(set, "")?;
        for component in 0..3 {
            let elem = self.element(get_elem, component, from)?;
            self.bind(InputKey::new(node, component as usize), InputBinding::Link(elem))?;
        }
        Ok(OutputKey::new(node, 0))
    }
}

#[cfg(test)]
mod tests {
    use nodevm_core::Value;

    use crate::{LinkOutcome, NodeGraph, NodeTypeRegistry};

    #[test]
    fn int_to_float() {
        let registry = NodeTypeRegistry::with_builtin_types();
        let mut graph = NodeGraph::new(&registry);
        let random = graph.add_node("INT_TO_RANDOM", "").unwrap();
        let sine = graph.add_node("SINE", "").unwrap();
        let from = graph.output_socket(random, "irandom").unwrap();
        let to = graph.input_socket(sine, "value").unwrap();

        let LinkOutcome::Converted(conv) = graph.link(from, to).unwrap() else {
            panic!("expected a conversion");
        };
        let conv = graph.node(conv).unwrap();
        assert_eq!(conv.node_type().name(), "INT_TO_FLOAT");
        assert_eq!(conv.link(0), Some(from));
    }

    #[test]
    fn float_to_float3_feeds_every_component() {
        let registry = NodeTypeRegistry::with_builtin_types();
        let mut graph = NodeGraph::new(&registry);
        let sine = graph.add_node("SINE", "").unwrap();
        let len = graph.add_node("LENGTH_FLOAT3", "").unwrap();
        let from = graph.output_socket(sine, "value").unwrap();
        let to = graph.input_socket(len, "value").unwrap();

        let LinkOutcome::Converted(set) = graph.link(from, to).unwrap() else {
            panic!("expected a conversion");
        };
        let set = graph.node(set).unwrap();
        assert_eq!(set.node_type().name(), "SET_FLOAT3");
        for socket in 0..3 {
            assert_eq!(set.link(socket), Some(from));
        }
    }

    #[test]
    fn float4_to_float_reads_component_zero() {
        let registry = NodeTypeRegistry::with_builtin_types();
        let mut graph = NodeGraph::new(&registry);
        let mix = graph.add_node("MIX_RGB", "").unwrap();
        let sine = graph.add_node("SINE", "").unwrap();
        let from = graph.output_socket(mix, "color").unwrap();
        let to = graph.input_socket(sine, "value").unwrap();

        let LinkOutcome::Converted(get) = graph.link(from, to).unwrap() else {
            panic!("expected a conversion");
        };
        let get = graph.node(get).unwrap();
        assert_eq!(get.node_type().name(), "GET_ELEM_FLOAT4");
        assert_eq!(get.input_value(0), Some(&Value::Int(0)));
    }

    #[test]
    fn float3_to_float4_assembles_components() {
        let registry = NodeTypeRegistry::with_builtin_types();
        let mut graph = NodeGraph::new(&registry);
        let cross = graph.add_node("CROSS_FLOAT3", "").unwrap();
        let mix = graph.add_node("MIX_RGB", "").unwrap();
        let from = graph.output_socket(cross, "value").unwrap();
        let to = graph.input_socket(mix, "color1").unwrap();

        let LinkOutcome::Converted(set) = graph.link(from, to).unwrap() else {
            panic!("expected a conversion");
        };
        let set = graph.node(set).unwrap().clone();
        assert_eq!(set.node_type().name(), "SET_FLOAT4");
        for component in 0..3 {
            let elem = set.link(component).unwrap();
            let elem = graph.node(elem.node).unwrap();
            assert_eq!(elem.node_type().name(), "GET_ELEM_FLOAT3");
            assert_eq!(elem.input_value(0), Some(&Value::Int(component as i32)));
        }
        assert_eq!(set.link(3), None);
    }

    #[test]
    fn mesh_to_float_is_unsupported() {
        let registry = NodeTypeRegistry::with_builtin_types();
        let mut graph = NodeGraph::new(&registry);
        let load = graph.add_node("MESH_LOAD", "").unwrap();
        let sine = graph.add_node("SINE", "").unwrap();
        let from = graph.output_socket(load, "mesh").unwrap();
        let to = graph.input_socket(sine, "value").unwrap();
        let before = graph.node_count();

        assert_eq!(graph.link(from, to).unwrap(), LinkOutcome::Unsupported);
        assert_eq!(graph.node(sine).unwrap().link(0), None);
        assert_eq!(graph.node_count(), before);
    }
}
