//! Content hash of a finalized graph.
//!
//! Two graphs built the same way hash the same, regardless of node names or
//! the ids their nodes happened to get. The hash covers node types in
//! topological order, every input binding, and the graph interface.

use nodevm_core::Value;
use xxhash_rust::xxh64::xxh64;

use crate::graph::{InputBinding, NodeGraph, OutputKey};

/// Domain-specific mixing constants for fingerprint computation.
mod hash_constants {
    pub const SEP: u64 = 0x4bc94d6bd06053ad;
    pub const NODE: u64 = 0x2fac10b63a6cc57c;
    pub const LINK: u64 = 0x5ea77ffbcdf5f302;
    pub const LITERAL: u64 = 0x7d3c8b4a92e15f6d;
    pub const DEFAULT: u64 = 0x3e9f5d2a8c7b1403;
    pub const INPUT: u64 = 0x9a7f3d5e2b8c4601;
    pub const OUTPUT: u64 = 0x1a095090689d4647;
    pub const UNUSED: u64 = 0x94d049bb133111eb;
}

struct Fingerprint(u64);

impl Fingerprint {
    fn mix(&mut self, part: u64) {
        self.0 = self.0.wrapping_mul(hash_constants::SEP).wrapping_add(part);
    }

    fn mix_bytes(&mut self, domain: u64, bytes: &[u8]) {
        self.mix(domain ^ xxh64(bytes, 0));
    }
}

fn push_floats(bytes: &mut Vec<u8>, values: &[f32]) {
    for v in values {
        bytes.extend_from_slice(&v.to_bits().to_le_bytes());
    }
}

fn value_bytes(value: &Value) -> Vec<u8> {
    let mut bytes = value.type_desc().name().as_bytes().to_vec();
    match value {
        Value::Float(v) => push_floats(&mut bytes, &[*v]),
        Value::Float3(v) => push_floats(&mut bytes, &v.to_array()),
        Value::Float4(v) => push_floats(&mut bytes, &v.to_array()),
        Value::Matrix44(m) => push_floats(&mut bytes, m.data.as_flattened()),
        Value::Int(v) => bytes.extend_from_slice(&v.to_le_bytes()),
        Value::String(s) => bytes.extend_from_slice(s.as_bytes()),
        Value::Object(key) => bytes.extend_from_slice(&key.index().to_le_bytes()),
        Value::Mesh | Value::Duplis => {}
    }
    bytes
}

impl NodeGraph<'_> {
    /// Deterministic XXH64 fingerprint, usable as a function cache key.
    ///
    /// Only meaningful after `finalize()`; before that, node indices are not
    /// assigned and links hash by id.
    pub fn fingerprint(&self) -> u64 {
        let order = self.nodes_in_order();
        let position = |key: OutputKey| -> u64 {
            let index = self
                .node(key.node)
                .and_then(|n| n.index())
                .unwrap_or(key.node.as_usize());
            ((index as u64) << 16) | key.socket as u64
        };

        let mut fp = Fingerprint(0);
        for id in order {
            let Some(node) = self.node(id) else { continue };
            fp.mix_bytes(hash_constants::NODE, node.node_type().name().as_bytes());
            for (socket, binding) in node.inputs().iter().enumerate() {
                match binding {
                    InputBinding::Link(key) => fp.mix(hash_constants::LINK ^ position(*key)),
                    InputBinding::Value(value) => {
                        fp.mix_bytes(hash_constants::LITERAL, &value_bytes(value))
                    }
                    InputBinding::Unbound => fp.mix(hash_constants::DEFAULT ^ socket as u64),
                }
            }
        }

        for input in self.inputs() {
            fp.mix_bytes(hash_constants::INPUT, input.name.as_bytes());
            fp.mix_bytes(hash_constants::INPUT, input.typedesc.name().as_bytes());
            match input.key {
                Some(key) => fp.mix(position(key)),
                None => fp.mix(hash_constants::UNUSED),
            }
        }
        for output in self.outputs() {
            fp.mix_bytes(hash_constants::OUTPUT, output.name.as_bytes());
            fp.mix_bytes(hash_constants::OUTPUT, output.typedesc.name().as_bytes());
            match output.key {
                Some(key) => fp.mix(position(key)),
                None => fp.mix(hash_constants::UNUSED),
            }
        }
        fp.0
    }
}

#[cfg(test)]
mod tests {
    use nodevm_core::TypeDesc;

    use crate::{NodeGraph, NodeTypeRegistry};

    fn build(graph: &mut NodeGraph<'_>, name: &str, b: f32) {
        let add = graph.add_node("ADD_FLOAT", name).unwrap();
        graph
            .set_input_value(graph.input_socket(add, "value_a").unwrap(), 1.0f32)
            .unwrap();
        graph
            .set_input_value(graph.input_socket(add, "value_b").unwrap(), b)
            .unwrap();
        let out = graph.add_output("result", TypeDesc::Float, 0.0f32).unwrap();
        graph.link(graph.output_socket(add, "value").unwrap(), out).unwrap();
        graph.finalize().unwrap();
    }

    #[test]
    fn same_structure_same_fingerprint() {
        let registry = NodeTypeRegistry::with_builtin_types();
        let mut a = NodeGraph::new(&registry);
        let mut b = NodeGraph::new(&registry);
        build(&mut a, "first", 2.0);
        build(&mut b, "second", 2.0);
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn literal_changes_fingerprint() {
        let registry = NodeTypeRegistry::with_builtin_types();
        let mut a = NodeGraph::new(&registry);
        let mut b = NodeGraph::new(&registry);
        build(&mut a, "add", 2.0);
        build(&mut b, "add", 3.0);
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn unused_nodes_do_not_matter() {
        let registry = NodeTypeRegistry::with_builtin_types();
        let mut a = NodeGraph::new(&registry);
        let mut b = NodeGraph::new(&registry);
        b.add_node("SINE", "dead").unwrap();
        build(&mut a, "add", 2.0);
        build(&mut b, "add", 2.0);
        assert_eq!(a.fingerprint(), b.fingerprint());
    }
}
