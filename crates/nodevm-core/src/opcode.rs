//! Bytecode operation codes.
//!
//! This module defines the closed instruction set of the node VM. Every
//! opcode and every operand occupies one 32-bit word; the operands of each
//! opcode follow it inline in a fixed order: inputs first, then outputs.

use std::fmt;
use std::sync::OnceLock;

use num_enum::{IntoPrimitive, TryFromPrimitive};
use rustc_hash::FxHashMap;

/// Kind of an inline operand following an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operand {
    /// Value stack index.
    Stack,
    /// Entry address of a nested block, or the invalid sentinel.
    Jump,
    Float,
    Float3,
    Float4,
    Int,
    Matrix44,
    /// Packed string literal, four bytes per word.
    String,
    /// Host object key.
    Object,
}

impl Operand {
    /// Number of words this operand occupies, or `None` for variable-length
    /// string literals.
    pub const fn word_count(self) -> Option<usize> {
        match self {
            Operand::Stack | Operand::Jump | Operand::Float | Operand::Int | Operand::Object => {
                Some(1)
            }
            Operand::Float3 => Some(3),
            Operand::Float4 => Some(4),
            Operand::Matrix44 => Some(16),
            Operand::String => None,
        }
    }
}

/// Bytecode operation codes.
///
/// The VM addresses a fixed-size value stack through indices baked into the
/// bytecode at compile time. Kernel opcodes (`MESH_ARRAY`, `MESH_DISPLACE`)
/// carry a jump operand before each input, naming the nested block that has
/// to run before the input can be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u32)]
pub enum OpCode {
    // =========================================================================
    // Control
    // =========================================================================
    /// No operation.
    Noop = 0,
    /// End of a block; returns to the caller of the block.
    End,

    // =========================================================================
    // Constants
    // =========================================================================
    /// Store a float literal.
    ValueFloat,
    /// Store a float3 literal.
    ValueFloat3,
    /// Store a float4 literal.
    ValueFloat4,
    /// Store an int literal.
    ValueInt,
    /// Store a matrix literal.
    ValueMatrix44,
    /// Store the code offset of a packed string literal.
    ValueString,
    /// Store a host object key.
    ValueObject,
    /// Store an empty mesh into an initialized handle.
    ValueMesh,
    /// Store an empty dupli list into an initialized handle.
    ValueDuplis,

    // =========================================================================
    // Conversions
    // =========================================================================
    /// Truncate a float to an int.
    FloatToInt,
    /// Convert an int to a float.
    IntToFloat,
    /// Assemble a float3 from three floats.
    SetFloat3,
    /// Extract one component of a float3.
    GetElemFloat3,
    /// Assemble a float4 from four floats.
    SetFloat4,
    /// Extract one component of a float4.
    GetElemFloat4,

    // =========================================================================
    // Resource Lifetime
    // =========================================================================
    /// Create a mesh handle with the given use count.
    InitMeshPtr,
    /// Drop one use of a mesh handle.
    ReleaseMeshPtr,
    /// Create a dupli list handle with the given use count.
    InitDuplisPtr,
    /// Drop one use of a dupli list handle.
    ReleaseDuplisPtr,

    // =========================================================================
    // Iterators
    // =========================================================================
    /// `start + index0 * step` for the enclosing iteration index.
    RangeInt,

    // =========================================================================
    // Float Math
    // =========================================================================
    AddFloat,
    SubFloat,
    MulFloat,
    /// Division; 0 when dividing by zero.
    DivFloat,
    Sine,
    Cosine,
    Tangent,
    Arcsine,
    Arccosine,
    Arctangent,
    /// Power; 0 for a negative base.
    Power,
    /// Logarithm of `a` to base `b`; 0 for negative operands.
    Logarithm,
    Minimum,
    Maximum,
    /// Half-up rounding.
    Round,
    /// 1.0 if `a < b`, else 0.0.
    LessThan,
    /// 1.0 if `a > b`, else 0.0.
    GreaterThan,
    /// Float remainder; 0 when dividing by zero.
    Modulo,
    Absolute,
    /// Clamp to `[0, 1]`.
    ClampOne,
    /// Square root; 0 for non-positive input.
    Sqrt,

    // =========================================================================
    // Vector Math
    // =========================================================================
    AddFloat3,
    SubFloat3,
    /// Component-wise product.
    MulFloat3,
    /// Component-wise safe division.
    DivFloat3,
    MulFloat3Float,
    DivFloat3Float,
    AverageFloat3,
    DotFloat3,
    CrossFloat3,
    /// Normalized vector and original length.
    NormalizeFloat3,
    LengthFloat3,

    // =========================================================================
    // Matrix Math
    // =========================================================================
    AddMatrix44,
    SubMatrix44,
    MulMatrix44,
    MulMatrix44Float,
    DivMatrix44Float,
    NegateMatrix44,
    TransposeMatrix44,
    /// Inverse; the identity for a singular matrix.
    InvertMatrix44,
    AdjointMatrix44,
    DeterminantMatrix44,
    /// Transform a point.
    MulMatrix44Float3,
    MulMatrix44Float4,
    Matrix44ToLoc,
    Matrix44ToEuler,
    Matrix44ToAxisangle,
    Matrix44ToScale,
    LocToMatrix44,
    EulerToMatrix44,
    AxisangleToMatrix44,
    ScaleToMatrix44,

    // =========================================================================
    // Color
    // =========================================================================
    /// Blend two colors with one of the mix modes.
    MixRgb,

    // =========================================================================
    // Random
    // =========================================================================
    IntToRandom,
    FloatToRandom,

    // =========================================================================
    // Procedural Textures
    // =========================================================================
    TexProcVoronoi,
    TexProcMagic,
    TexProcMarble,
    TexProcClouds,
    TexProcWood,
    TexProcMusgrave,
    TexProcStucci,
    TexProcDistnoise,

    // =========================================================================
    // Objects
    // =========================================================================
    ObjectLookup,
    ObjectTransform,
    ObjectFinalMesh,
    EffectorTransform,
    EffectorClosestPoint,

    // =========================================================================
    // Meshes
    // =========================================================================
    MeshLoad,
    MeshCombine,
    /// Kernel: concatenate `count` transformed copies of a mesh.
    MeshArray,
    /// Kernel: offset every vertex by a per-vertex vector.
    MeshDisplace,
    MeshBoolean,
    MeshClosestPoint,

    // =========================================================================
    // Curves
    // =========================================================================
    CurvePath,

    // =========================================================================
    // Images
    // =========================================================================
    ImageSample,

    // =========================================================================
    // Duplis
    // =========================================================================
    MakeDupli,
    DuplisCombine,
}

impl OpCode {
    /// Every opcode, in encoding order.
    pub const ALL: &'static [OpCode] = &[
        OpCode::Noop,
        OpCode::End,
        OpCode::ValueFloat,
        OpCode::ValueFloat3,
        OpCode::ValueFloat4,
        OpCode::ValueInt,
        OpCode::ValueMatrix44,
        OpCode::ValueString,
        OpCode::ValueObject,
        OpCode::ValueMesh,
        OpCode::ValueDuplis,
        OpCode::FloatToInt,
        OpCode::IntToFloat,
        OpCode::SetFloat3,
        OpCode::GetElemFloat3,
        OpCode::SetFloat4,
        OpCode::GetElemFloat4,
        OpCode::InitMeshPtr,
        OpCode::ReleaseMeshPtr,
        OpCode::InitDuplisPtr,
        OpCode::ReleaseDuplisPtr,
        OpCode::RangeInt,
        OpCode::AddFloat,
        OpCode::SubFloat,
        OpCode::MulFloat,
        OpCode::DivFloat,
        OpCode::Sine,
        OpCode::Cosine,
        OpCode::Tangent,
        OpCode::Arcsine,
        OpCode::Arccosine,
        OpCode::Arctangent,
        OpCode::Power,
        OpCode::Logarithm,
        OpCode::Minimum,
        OpCode::Maximum,
        OpCode::Round,
        OpCode::LessThan,
        OpCode::GreaterThan,
        OpCode::Modulo,
        OpCode::Absolute,
        OpCode::ClampOne,
        OpCode::Sqrt,
        OpCode::AddFloat3,
        OpCode::SubFloat3,
        OpCode::MulFloat3,
        OpCode::DivFloat3,
        OpCode::MulFloat3Float,
        OpCode::DivFloat3Float,
        OpCode::AverageFloat3,
        OpCode::DotFloat3,
        OpCode::CrossFloat3,
        OpCode::NormalizeFloat3,
        OpCode::LengthFloat3,
        OpCode::AddMatrix44,
        OpCode::SubMatrix44,
        OpCode::MulMatrix44,
        OpCode::MulMatrix44Float,
        OpCode::DivMatrix44Float,
        OpCode::NegateMatrix44,
        OpCode::TransposeMatrix44,
        OpCode::InvertMatrix44,
        OpCode::AdjointMatrix44,
        OpCode::DeterminantMatrix44,
        OpCode::MulMatrix44Float3,
        OpCode::MulMatrix44Float4,
        OpCode::Matrix44ToLoc,
        OpCode::Matrix44ToEuler,
        OpCode::Matrix44ToAxisangle,
        OpCode::Matrix44ToScale,
        OpCode::LocToMatrix44,
        OpCode::EulerToMatrix44,
        OpCode::AxisangleToMatrix44,
        OpCode::ScaleToMatrix44,
        OpCode::MixRgb,
        OpCode::IntToRandom,
        OpCode::FloatToRandom,
        OpCode::TexProcVoronoi,
        OpCode::TexProcMagic,
        OpCode::TexProcMarble,
        OpCode::TexProcClouds,
        OpCode::TexProcWood,
        OpCode::TexProcMusgrave,
        OpCode::TexProcStucci,
        OpCode::TexProcDistnoise,
        OpCode::ObjectLookup,
        OpCode::ObjectTransform,
        OpCode::ObjectFinalMesh,
        OpCode::EffectorTransform,
        OpCode::EffectorClosestPoint,
        OpCode::MeshLoad,
        OpCode::MeshCombine,
        OpCode::MeshArray,
        OpCode::MeshDisplace,
        OpCode::MeshBoolean,
        OpCode::MeshClosestPoint,
        OpCode::CurvePath,
        OpCode::ImageSample,
        OpCode::MakeDupli,
        OpCode::DuplisCombine,
    ];

    /// Decode an opcode word.
    pub fn from_u32(word: u32) -> Option<OpCode> {
        OpCode::try_from(word).ok()
    }

    /// Look up an opcode by its node type name (`"ADD_FLOAT"`, ...).
    ///
    /// The name table is built once on first use.
    pub fn from_name(name: &str) -> Option<OpCode> {
        static TABLE: OnceLock<FxHashMap<&'static str, OpCode>> = OnceLock::new();
        TABLE
            .get_or_init(|| OpCode::ALL.iter().map(|op| (op.name(), *op)).collect())
            .get(name)
            .copied()
    }

    /// Inline operand layout of this opcode.
    pub const fn operands(self) -> &'static [Operand] {
        use Operand::*;
        match self {
            OpCode::Noop => &[],
            OpCode::End => &[],
            OpCode::ValueFloat => &[Float, Stack],
            OpCode::ValueFloat3 => &[Float3, Stack],
            OpCode::ValueFloat4 => &[Float4, Stack],
            OpCode::ValueInt => &[Int, Stack],
            OpCode::ValueMatrix44 => &[Matrix44, Stack],
            OpCode::ValueString => &[String, Stack],
            OpCode::ValueObject => &[Object, Stack],
            OpCode::ValueMesh => &[Stack],
            OpCode::ValueDuplis => &[Stack],
            OpCode::FloatToInt => &[Stack, Stack],
            OpCode::IntToFloat => &[Stack, Stack],
            OpCode::SetFloat3 => &[Stack, Stack, Stack, Stack],
            OpCode::GetElemFloat3 => &[Int, Stack, Stack],
            OpCode::SetFloat4 => &[Stack, Stack, Stack, Stack, Stack],
            OpCode::GetElemFloat4 => &[Int, Stack, Stack],
            OpCode::InitMeshPtr => &[Stack, Int],
            OpCode::ReleaseMeshPtr => &[Stack],
            OpCode::InitDuplisPtr => &[Stack, Int],
            OpCode::ReleaseDuplisPtr => &[Stack],
            OpCode::RangeInt => &[Stack, Int, Int, Int, Stack],
            OpCode::AddFloat => &[Stack, Stack, Stack],
            OpCode::SubFloat => &[Stack, Stack, Stack],
            OpCode::MulFloat => &[Stack, Stack, Stack],
            OpCode::DivFloat => &[Stack, Stack, Stack],
            OpCode::Sine => &[Stack, Stack],
            OpCode::Cosine => &[Stack, Stack],
            OpCode::Tangent => &[Stack, Stack],
            OpCode::Arcsine => &[Stack, Stack],
            OpCode::Arccosine => &[Stack, Stack],
            OpCode::Arctangent => &[Stack, Stack],
            OpCode::Power => &[Stack, Stack, Stack],
            OpCode::Logarithm => &[Stack, Stack, Stack],
            OpCode::Minimum => &[Stack, Stack, Stack],
            OpCode::Maximum => &[Stack, Stack, Stack],
            OpCode::Round => &[Stack, Stack],
            OpCode::LessThan => &[Stack, Stack, Stack],
            OpCode::GreaterThan => &[Stack, Stack, Stack],
            OpCode::Modulo => &[Stack, Stack, Stack],
            OpCode::Absolute => &[Stack, Stack],
            OpCode::ClampOne => &[Stack, Stack],
            OpCode::Sqrt => &[Stack, Stack],
            OpCode::AddFloat3 => &[Stack, Stack, Stack],
            OpCode::SubFloat3 => &[Stack, Stack, Stack],
            OpCode::MulFloat3 => &[Stack, Stack, Stack],
            OpCode::DivFloat3 => &[Stack, Stack, Stack],
            OpCode::MulFloat3Float => &[Stack, Stack, Stack],
            OpCode::DivFloat3Float => &[Stack, Stack, Stack],
            OpCode::AverageFloat3 => &[Stack, Stack, Stack],
            OpCode::DotFloat3 => &[Stack, Stack, Stack],
            OpCode::CrossFloat3 => &[Stack, Stack, Stack],
            OpCode::NormalizeFloat3 => &[Stack, Stack, Stack],
            OpCode::LengthFloat3 => &[Stack, Stack],
            OpCode::AddMatrix44 => &[Stack, Stack, Stack],
            OpCode::SubMatrix44 => &[Stack, Stack, Stack],
            OpCode::MulMatrix44 => &[Stack, Stack, Stack],
            OpCode::MulMatrix44Float => &[Stack, Stack, Stack],
            OpCode::DivMatrix44Float => &[Stack, Stack, Stack],
            OpCode::NegateMatrix44 => &[Stack, Stack],
            OpCode::TransposeMatrix44 => &[Stack, Stack],
            OpCode::InvertMatrix44 => &[Stack, Stack],
            OpCode::AdjointMatrix44 => &[Stack, Stack],
            OpCode::DeterminantMatrix44 => &[Stack, Stack],
            OpCode::MulMatrix44Float3 => &[Stack, Stack, Stack],
            OpCode::MulMatrix44Float4 => &[Stack, Stack, Stack],
            OpCode::Matrix44ToLoc => &[Stack, Stack],
            OpCode::Matrix44ToEuler => &[Int, Stack, Stack],
            OpCode::Matrix44ToAxisangle => &[Stack, Stack, Stack],
            OpCode::Matrix44ToScale => &[Stack, Stack],
            OpCode::LocToMatrix44 => &[Stack, Stack],
            OpCode::EulerToMatrix44 => &[Int, Stack, Stack],
            OpCode::AxisangleToMatrix44 => &[Stack, Stack, Stack],
            OpCode::ScaleToMatrix44 => &[Stack, Stack],
            OpCode::MixRgb => &[Int, Stack, Stack, Stack, Stack],
            OpCode::IntToRandom => &[Int, Stack, Stack, Stack],
            OpCode::FloatToRandom => &[Int, Stack, Stack, Stack],
            OpCode::TexProcVoronoi => &[Int, Int, Stack, Stack, Stack, Stack, Stack, Stack, Stack, Stack, Stack, Stack, Stack, Stack],
            OpCode::TexProcMagic => &[Stack, Stack, Int, Stack, Stack, Stack],
            OpCode::TexProcMarble => &[Stack, Stack, Stack, Stack, Int, Int, Int, Int, Int, Stack, Stack],
            OpCode::TexProcClouds => &[Stack, Stack, Stack, Int, Int, Int, Stack, Stack, Stack],
            OpCode::TexProcWood => &[Stack, Stack, Stack, Stack, Int, Int, Int, Int, Stack, Stack],
            OpCode::TexProcMusgrave => &[Stack, Stack, Stack, Stack, Stack, Stack, Stack, Stack, Stack, Int, Int, Stack, Stack],
            OpCode::TexProcStucci => &[Stack, Stack, Stack, Int, Int, Int, Stack, Stack],
            OpCode::TexProcDistnoise => &[Stack, Stack, Stack, Stack, Int, Int, Stack, Stack],
            OpCode::ObjectLookup => &[Int, Stack],
            OpCode::ObjectTransform => &[Stack, Stack],
            OpCode::ObjectFinalMesh => &[Stack, Stack],
            OpCode::EffectorTransform => &[Int, Stack],
            OpCode::EffectorClosestPoint => &[Stack, Stack, Stack, Stack, Stack],
            OpCode::MeshLoad => &[Stack, Stack],
            OpCode::MeshCombine => &[Stack, Stack, Stack],
            OpCode::MeshArray => &[Jump, Stack, Jump, Stack, Jump, Stack, Stack, Stack],
            OpCode::MeshDisplace => &[Jump, Stack, Jump, Stack, Stack, Stack],
            OpCode::MeshBoolean => &[Stack, Stack, Stack, Stack, Stack, Stack, Stack, Stack, Stack, Stack],
            OpCode::MeshClosestPoint => &[Stack, Stack, Stack, Stack, Stack, Stack, Stack],
            OpCode::CurvePath => &[Stack, Stack, Stack, Stack, Stack, Stack, Stack, Stack, Stack, Stack, Stack],
            OpCode::ImageSample => &[Stack, Stack, Stack],
            OpCode::MakeDupli => &[Stack, Stack, Stack, Stack, Stack, Stack],
            OpCode::DuplisCombine => &[Stack, Stack, Stack],
        }
    }

    /// Get the human-readable name of this opcode.
    pub const fn name(self) -> &'static str {
        match self {
            OpCode::Noop => "NOOP",
            OpCode::End => "END",
            OpCode::ValueFloat => "VALUE_FLOAT",
            OpCode::ValueFloat3 => "VALUE_FLOAT3",
            OpCode::ValueFloat4 => "VALUE_FLOAT4",
            OpCode::ValueInt => "VALUE_INT",
            OpCode::ValueMatrix44 => "VALUE_MATRIX44",
            OpCode::ValueString => "VALUE_STRING",
            OpCode::ValueObject => "VALUE_OBJECT",
            OpCode::ValueMesh => "VALUE_MESH",
            OpCode::ValueDuplis => "VALUE_DUPLIS",
            OpCode::FloatToInt => "FLOAT_TO_INT",
            OpCode::IntToFloat => "INT_TO_FLOAT",
            OpCode::SetFloat3 => "SET_FLOAT3",
            OpCode::GetElemFloat3 => "GET_ELEM_FLOAT3",
            OpCode::SetFloat4 => "SET_FLOAT4",
            OpCode::GetElemFloat4 => "GET_ELEM_FLOAT4",
            OpCode::InitMeshPtr => "INIT_MESH_PTR",
            OpCode::ReleaseMeshPtr => "RELEASE_MESH_PTR",
            OpCode::InitDuplisPtr => "INIT_DUPLIS_PTR",
            OpCode::ReleaseDuplisPtr => "RELEASE_DUPLIS_PTR",
            OpCode::RangeInt => "RANGE_INT",
            OpCode::AddFloat => "ADD_FLOAT",
            OpCode::SubFloat => "SUB_FLOAT",
            OpCode::MulFloat => "MUL_FLOAT",
            OpCode::DivFloat => "DIV_FLOAT",
            OpCode::Sine => "SINE",
            OpCode::Cosine => "COSINE",
            OpCode::Tangent => "TANGENT",
            OpCode::Arcsine => "ARCSINE",
            OpCode::Arccosine => "ARCCOSINE",
            OpCode::Arctangent => "ARCTANGENT",
            OpCode::Power => "POWER",
            OpCode::Logarithm => "LOGARITHM",
            OpCode::Minimum => "MINIMUM",
            OpCode::Maximum => "MAXIMUM",
            OpCode::Round => "ROUND",
            OpCode::LessThan => "LESS_THAN",
            OpCode::GreaterThan => "GREATER_THAN",
            OpCode::Modulo => "MODULO",
            OpCode::Absolute => "ABSOLUTE",
            OpCode::ClampOne => "CLAMP_ONE",
            OpCode::Sqrt => "SQRT",
            OpCode::AddFloat3 => "ADD_FLOAT3",
            OpCode::SubFloat3 => "SUB_FLOAT3",
            OpCode::MulFloat3 => "MUL_FLOAT3",
            OpCode::DivFloat3 => "DIV_FLOAT3",
            OpCode::MulFloat3Float => "MUL_FLOAT3_FLOAT",
            OpCode::DivFloat3Float => "DIV_FLOAT3_FLOAT",
            OpCode::AverageFloat3 => "AVERAGE_FLOAT3",
            OpCode::DotFloat3 => "DOT_FLOAT3",
            OpCode::CrossFloat3 => "CROSS_FLOAT3",
            OpCode::NormalizeFloat3 => "NORMALIZE_FLOAT3",
            OpCode::LengthFloat3 => "LENGTH_FLOAT3",
            OpCode::AddMatrix44 => "ADD_MATRIX44",
            OpCode::SubMatrix44 => "SUB_MATRIX44",
            OpCode::MulMatrix44 => "MUL_MATRIX44",
            OpCode::MulMatrix44Float => "MUL_MATRIX44_FLOAT",
            OpCode::DivMatrix44Float => "DIV_MATRIX44_FLOAT",
            OpCode::NegateMatrix44 => "NEGATE_MATRIX44",
            OpCode::TransposeMatrix44 => "TRANSPOSE_MATRIX44",
            OpCode::InvertMatrix44 => "INVERT_MATRIX44",
            OpCode::AdjointMatrix44 => "ADJOINT_MATRIX44",
            OpCode::DeterminantMatrix44 => "DETERMINANT_MATRIX44",
            OpCode::MulMatrix44Float3 => "MUL_MATRIX44_FLOAT3",
            OpCode::MulMatrix44Float4 => "MUL_MATRIX44_FLOAT4",
            OpCode::Matrix44ToLoc => "MATRIX44_TO_LOC",
            OpCode::Matrix44ToEuler => "MATRIX44_TO_EULER",
            OpCode::Matrix44ToAxisangle => "MATRIX44_TO_AXISANGLE",
            OpCode::Matrix44ToScale => "MATRIX44_TO_SCALE",
            OpCode::LocToMatrix44 => "LOC_TO_MATRIX44",
            OpCode::EulerToMatrix44 => "EULER_TO_MATRIX44",
            OpCode::AxisangleToMatrix44 => "AXISANGLE_TO_MATRIX44",
            OpCode::ScaleToMatrix44 => "SCALE_TO_MATRIX44",
            OpCode::MixRgb => "MIX_RGB",
            OpCode::IntToRandom => "INT_TO_RANDOM",
            OpCode::FloatToRandom => "FLOAT_TO_RANDOM",
            OpCode::TexProcVoronoi => "TEX_PROC_VORONOI",
            OpCode::TexProcMagic => "TEX_PROC_MAGIC",
            OpCode::TexProcMarble => "TEX_PROC_MARBLE",
            OpCode::TexProcClouds => "TEX_PROC_CLOUDS",
            OpCode::TexProcWood => "TEX_PROC_WOOD",
            OpCode::TexProcMusgrave => "TEX_PROC_MUSGRAVE",
            OpCode::TexProcStucci => "TEX_PROC_STUCCI",
            OpCode::TexProcDistnoise => "TEX_PROC_DISTNOISE",
            OpCode::ObjectLookup => "OBJECT_LOOKUP",
            OpCode::ObjectTransform => "OBJECT_TRANSFORM",
            OpCode::ObjectFinalMesh => "OBJECT_FINAL_MESH",
            OpCode::EffectorTransform => "EFFECTOR_TRANSFORM",
            OpCode::EffectorClosestPoint => "EFFECTOR_CLOSEST_POINT",
            OpCode::MeshLoad => "MESH_LOAD",
            OpCode::MeshCombine => "MESH_COMBINE",
            OpCode::MeshArray => "MESH_ARRAY",
            OpCode::MeshDisplace => "MESH_DISPLACE",
            OpCode::MeshBoolean => "MESH_BOOLEAN",
            OpCode::MeshClosestPoint => "MESH_CLOSEST_POINT",
            OpCode::CurvePath => "CURVE_PATH",
            OpCode::ImageSample => "IMAGE_SAMPLE",
            OpCode::MakeDupli => "MAKE_DUPLI",
            OpCode::DuplisCombine => "DUPLIS_COMBINE",
        }
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
