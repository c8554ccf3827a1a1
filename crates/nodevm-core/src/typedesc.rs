//! Socket type descriptors.
//!
//! Every socket of a node type carries a [`TypeDesc`]. The set of types is
//! closed: the compiler needs to know the word size of each one to lay out
//! the value stack, and the evaluator needs to know which ones are
//! reference-counted resources.

use std::fmt;

/// Number of 32-bit words a value of each type occupies on the value stack.
pub mod word_size {
    pub const FLOAT: usize = 1;
    pub const FLOAT3: usize = 3;
    pub const FLOAT4: usize = 4;
    pub const INT: usize = 1;
    pub const MATRIX44: usize = 16;
    /// Code offset of the packed literal inside the function.
    pub const STRING: usize = 1;
    /// Host object key.
    pub const OBJECT: usize = 1;
    /// Resource handle.
    pub const MESH: usize = 1;
    /// Resource handle.
    pub const DUPLIS: usize = 1;
}

/// Base type of a socket or value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TypeDesc {
    Float,
    Float3,
    Float4,
    Int,
    Matrix44,
    String,
    /// Reference to a host object, resolved through the evaluation globals.
    Object,
    Mesh,
    Duplis,
}

impl TypeDesc {
    /// All type descriptors, in registration order.
    pub const ALL: [TypeDesc; 9] = [
        TypeDesc::Float,
        TypeDesc::Float3,
        TypeDesc::Float4,
        TypeDesc::Int,
        TypeDesc::Matrix44,
        TypeDesc::String,
        TypeDesc::Object,
        TypeDesc::Mesh,
        TypeDesc::Duplis,
    ];

    /// Registered type name, as used in node type names (`PASS_FLOAT3`, ...).
    pub const fn name(self) -> &'static str {
        match self {
            TypeDesc::Float => "FLOAT",
            TypeDesc::Float3 => "FLOAT3",
            TypeDesc::Float4 => "FLOAT4",
            TypeDesc::Int => "INT",
            TypeDesc::Matrix44 => "MATRIX44",
            TypeDesc::String => "STRING",
            TypeDesc::Object => "OBJECT",
            TypeDesc::Mesh => "MESH",
            TypeDesc::Duplis => "DUPLIS",
        }
    }

    /// Look up a type by its registered name.
    pub fn from_name(name: &str) -> Option<TypeDesc> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }

    /// Number of stack words a value of this type occupies.
    pub const fn stack_size(self) -> usize {
        match self {
            TypeDesc::Float => word_size::FLOAT,
            TypeDesc::Float3 => word_size::FLOAT3,
            TypeDesc::Float4 => word_size::FLOAT4,
            TypeDesc::Int => word_size::INT,
            TypeDesc::Matrix44 => word_size::MATRIX44,
            TypeDesc::String => word_size::STRING,
            TypeDesc::Object => word_size::OBJECT,
            TypeDesc::Mesh => word_size::MESH,
            TypeDesc::Duplis => word_size::DUPLIS,
        }
    }

    /// Whether values of this type are reference-counted resources whose
    /// lifetime is driven by init/release instructions.
    pub const fn is_resource(self) -> bool {
        matches!(self, TypeDesc::Mesh | TypeDesc::Duplis)
    }
}

impl fmt::Display for TypeDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for t in TypeDesc::ALL {
            assert_eq!(TypeDesc::from_name(t.name()), Some(t));
        }
        assert_eq!(TypeDesc::from_name("VECTOR"), None);
    }

    #[test]
    fn stack_sizes() {
        assert_eq!(TypeDesc::Float.stack_size(), 1);
        assert_eq!(TypeDesc::Float3.stack_size(), 3);
        assert_eq!(TypeDesc::Float4.stack_size(), 4);
        assert_eq!(TypeDesc::Matrix44.stack_size(), 16);
        assert_eq!(TypeDesc::Mesh.stack_size(), 1);
    }

    #[test]
    fn resources() {
        assert!(TypeDesc::Mesh.is_resource());
        assert!(TypeDesc::Duplis.is_resource());
        assert!(!TypeDesc::Object.is_resource());
        assert!(!TypeDesc::Float.is_resource());
    }

    #[test]
    fn display_uses_name() {
        assert_eq!(TypeDesc::Matrix44.to_string(), "MATRIX44");
    }
}
