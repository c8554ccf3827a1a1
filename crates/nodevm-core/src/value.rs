//! Literal values.
//!
//! A [`Value`] is a constant of one of the base types. Values appear as
//! socket defaults, as literal input bindings, and as decoded evaluation
//! results.

use std::fmt;

use crate::{Float3, Float4, Matrix44, ObjectKey, TypeDesc};

/// Literal constant of one of the base types.
///
/// Resource types carry no payload: a literal mesh or dupli list is always
/// the empty one.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Float(f32),
    Float3(Float3),
    Float4(Float4),
    Int(i32),
    Matrix44(Matrix44),
    String(String),
    Object(ObjectKey),
    Mesh,
    Duplis,
}

impl Value {
    /// Type descriptor of this value.
    pub fn type_desc(&self) -> TypeDesc {
        match self {
            Value::Float(_) => TypeDesc::Float,
            Value::Float3(_) => TypeDesc::Float3,
            Value::Float4(_) => TypeDesc::Float4,
            Value::Int(_) => TypeDesc::Int,
            Value::Matrix44(_) => TypeDesc::Matrix44,
            Value::String(_) => TypeDesc::String,
            Value::Object(_) => TypeDesc::Object,
            Value::Mesh => TypeDesc::Mesh,
            Value::Duplis => TypeDesc::Duplis,
        }
    }

    /// Zero value of a type: 0, zero vectors, the identity matrix, the empty
    /// string, no object, and empty resources.
    pub fn zero(typedesc: TypeDesc) -> Value {
        match typedesc {
            TypeDesc::Float => Value::Float(0.0),
            TypeDesc::Float3 => Value::Float3(Float3::ZERO),
            TypeDesc::Float4 => Value::Float4(Float4::ZERO),
            TypeDesc::Int => Value::Int(0),
            TypeDesc::Matrix44 => Value::Matrix44(Matrix44::IDENTITY),
            TypeDesc::String => Value::String(String::new()),
            TypeDesc::Object => Value::Object(ObjectKey::NONE),
            TypeDesc::Mesh => Value::Mesh,
            TypeDesc::Duplis => Value::Duplis,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float3(&self) -> Option<Float3> {
        match self {
            Value::Float3(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float4(&self) -> Option<Float4> {
        match self {
            Value::Float4(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_matrix44(&self) -> Option<Matrix44> {
        match self {
            Value::Matrix44(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Float(v) => write!(f, "{v}"),
            Value::Float3(v) => write!(f, "({}, {}, {})", v.x, v.y, v.z),
            Value::Float4(v) => write!(f, "({}, {}, {}, {})", v.x, v.y, v.z, v.w),
            Value::Int(v) => write!(f, "{v}"),
            Value::Matrix44(m) => {
                f.write_str("[")?;
                for (i, col) in m.data.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "({}, {}, {}, {})", col[0], col[1], col[2], col[3])?;
                }
                f.write_str("]")
            }
            Value::String(s) => write!(f, "{s:?}"),
            Value::Object(key) => write!(f, "{key}"),
            Value::Mesh => f.write_str("<mesh>"),
            Value::Duplis => f.write_str("<duplis>"),
        }
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<Float3> for Value {
    fn from(v: Float3) -> Self {
        Value::Float3(v)
    }
}

impl From<Float4> for Value {
    fn from(v: Float4) -> Self {
        Value::Float4(v)
    }
}

impl From<Matrix44> for Value {
    fn from(v: Matrix44) -> Self {
        Value::Matrix44(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<ObjectKey> for Value {
    fn from(v: ObjectKey) -> Self {
        Value::Object(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_matches_type() {
        for t in TypeDesc::ALL {
            assert_eq!(Value::zero(t).type_desc(), t);
        }
        assert_eq!(
            Value::zero(TypeDesc::Matrix44),
            Value::Matrix44(Matrix44::IDENTITY)
        );
    }

    #[test]
    fn accessors() {
        assert_eq!(Value::from(2.5f32).as_float(), Some(2.5));
        assert_eq!(Value::from(3).as_int(), Some(3));
        assert_eq!(Value::from(3).as_float(), None);
        assert_eq!(Value::from("abc").as_str(), Some("abc"));
    }

    #[test]
    fn display() {
        assert_eq!(Value::Float3(Float3::new(1.0, 2.0, 3.0)).to_string(), "(1, 2, 3)");
        assert_eq!(Value::from("x").to_string(), "\"x\"");
        assert_eq!(Value::Mesh.to_string(), "<mesh>");
    }
}
