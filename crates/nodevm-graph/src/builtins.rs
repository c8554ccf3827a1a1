//! Built-in node types.
//!
//! One node type per opcode, plus the `PASS_*`, `ARG_*` and `VALUE_*` helper
//! types for every socket type. Socket order matches the operand layout of
//! the corresponding opcode.

use nodevm_core::{Float3, Float4, Matrix44, ObjectKey, TypeDesc, Value};

use crate::node_type::{NodeKind, NodeType, OutputValueKind};

const F3_ZERO: Float3 = Float3::ZERO;
const F4_ZERO: Float4 = Float4::ZERO;
const F4_BLACK: Float4 = Float4::new(0.0, 0.0, 0.0, 1.0);
const IDENTITY: Matrix44 = Matrix44::IDENTITY;
const NO_OBJECT: ObjectKey = ObjectKey::NONE;

/// Default euler rotation order (XYZ).
pub const EULER_ORDER_DEFAULT: i32 = 1;

fn function(name: &str) -> NodeType {
    NodeType::new(name, NodeKind::Function)
}

fn kernel(name: &str) -> NodeType {
    NodeType::new(name, NodeKind::Kernel)
}

/// Name of the pass-through node type for a socket type.
pub fn pass_type_name(typedesc: TypeDesc) -> String {
    format!("PASS_{}", typedesc.name())
}

/// Name of the argument node type for a socket type.
pub fn arg_type_name(typedesc: TypeDesc) -> String {
    format!("ARG_{}", typedesc.name())
}

/// Name of the constant node type for a socket type.
pub fn value_type_name(typedesc: TypeDesc) -> String {
    format!("VALUE_{}", typedesc.name())
}

/// All built-in node types, in registration order.
pub fn builtin_node_types() -> Vec<NodeType> {
    let mut types = Vec::new();

    for t in TypeDesc::ALL {
        types.push(
            NodeType::new(pass_type_name(t), NodeKind::Pass)
                .input("value", Value::zero(t))
                .output("value", t),
        );
        types.push(NodeType::new(arg_type_name(t), NodeKind::Argument).output("value", t));
        types.push(
            function(&value_type_name(t))
                .constant("value", Value::zero(t))
                .output("value", t),
        );
    }

    types.extend(conversion_types());
    types.extend(math_types());
    types.extend(matrix_types());
    types.extend(texture_types());
    types.extend(geometry_types());
    types
}

fn conversion_types() -> Vec<NodeType> {
    vec![
        function("FLOAT_TO_INT")
            .input("value", 0.0f32)
            .output("value", TypeDesc::Int),
        function("INT_TO_FLOAT")
            .input("value", 0)
            .output("value", TypeDesc::Float),
        function("RANGE_INT")
            .variable("index0", 0)
            .constant("start", 0)
            .constant("end", 0)
            .constant("step", 1)
            .output("value", TypeDesc::Int),
        function("SET_FLOAT3")
            .input("value_x", 0.0f32)
            .input("value_y", 0.0f32)
            .input("value_z", 0.0f32)
            .output("value", TypeDesc::Float3),
        function("GET_ELEM_FLOAT3")
            .constant("index", 0)
            .input("value", F3_ZERO)
            .output("value", TypeDesc::Float),
        function("SET_FLOAT4")
            .input("value_x", 0.0f32)
            .input("value_y", 0.0f32)
            .input("value_z", 0.0f32)
            .input("value_w", 0.0f32)
            .output("value", TypeDesc::Float4),
        function("GET_ELEM_FLOAT4")
            .constant("index", 0)
            .input("value", F4_ZERO)
            .output("value", TypeDesc::Float),
    ]
}

fn math_types() -> Vec<NodeType> {
    let binary = |name: &str| {
        function(name)
            .input("value_a", 0.0f32)
            .input("value_b", 0.0f32)
            .output("value", TypeDesc::Float)
    };
    let unary = |name: &str| {
        function(name)
            .input("value", 0.0f32)
            .output("value", TypeDesc::Float)
    };
    let binary3 = |name: &str, out: TypeDesc| {
        function(name)
            .input("value_a", F3_ZERO)
            .input("value_b", F3_ZERO)
            .output("value", out)
    };

    let mut types = vec![
        binary("ADD_FLOAT"),
        binary("SUB_FLOAT"),
        binary("MUL_FLOAT"),
        binary("DIV_FLOAT"),
        unary("SINE"),
        unary("COSINE"),
        unary("TANGENT"),
        unary("ARCSINE"),
        unary("ARCCOSINE"),
        unary("ARCTANGENT"),
        binary("POWER"),
        binary("LOGARITHM"),
        binary("MINIMUM"),
        binary("MAXIMUM"),
        unary("ROUND"),
        binary("LESS_THAN"),
        binary("GREATER_THAN"),
        binary("MODULO"),
        unary("ABSOLUTE"),
        unary("CLAMP_ONE"),
        unary("SQRT"),
        binary3("ADD_FLOAT3", TypeDesc::Float3),
        binary3("SUB_FLOAT3", TypeDesc::Float3),
        binary3("MUL_FLOAT3", TypeDesc::Float3),
        binary3("DIV_FLOAT3", TypeDesc::Float3),
        binary3("AVERAGE_FLOAT3", TypeDesc::Float3),
        binary3("DOT_FLOAT3", TypeDesc::Float),
        binary3("CROSS_FLOAT3", TypeDesc::Float3),
    ];

    types.extend([
        function("MUL_FLOAT3_FLOAT")
            .input("value_a", F3_ZERO)
            .input("value_b", 0.0f32)
            .output("value", TypeDesc::Float3),
        function("DIV_FLOAT3_FLOAT")
            .input("value_a", F3_ZERO)
            .input("value_b", 0.0f32)
            .output("value", TypeDesc::Float3),
        function("NORMALIZE_FLOAT3")
            .input("value", F3_ZERO)
            .output("vector", TypeDesc::Float3)
            .output("value", TypeDesc::Float),
        function("LENGTH_FLOAT3")
            .input("value", F3_ZERO)
            .output("length", TypeDesc::Float),
        function("MIX_RGB")
            .constant("mode", 0)
            .input("factor", 0.0f32)
            .input("color1", F4_BLACK)
            .input("color2", F4_BLACK)
            .output("color", TypeDesc::Float4),
        function("INT_TO_RANDOM")
            .constant("seed", 0)
            .input("value", 0)
            .output("irandom", TypeDesc::Int)
            .output("frandom", TypeDesc::Float),
        function("FLOAT_TO_RANDOM")
            .constant("seed", 0)
            .input("value", 0.0f32)
            .output("irandom", TypeDesc::Int)
            .output("frandom", TypeDesc::Float),
    ]);
    types
}

fn matrix_types() -> Vec<NodeType> {
    let binary = |name: &str| {
        function(name)
            .input("value_a", IDENTITY)
            .input("value_b", IDENTITY)
            .output("value", TypeDesc::Matrix44)
    };
    let unary = |name: &str, out: TypeDesc| {
        function(name)
            .input("value", IDENTITY)
            .output("value", out)
    };

    vec![
        binary("ADD_MATRIX44"),
        binary("SUB_MATRIX44"),
        binary("MUL_MATRIX44"),
        function("MUL_MATRIX44_FLOAT")
            .input("value_a", IDENTITY)
            .input("value_b", 0.0f32)
            .output("value", TypeDesc::Matrix44),
        function("DIV_MATRIX44_FLOAT")
            .input("value_a", IDENTITY)
            .input("value_b", 1.0f32)
            .output("value", TypeDesc::Matrix44),
        unary("NEGATE_MATRIX44", TypeDesc::Matrix44),
        unary("TRANSPOSE_MATRIX44", TypeDesc::Matrix44),
        unary("INVERT_MATRIX44", TypeDesc::Matrix44),
        unary("ADJOINT_MATRIX44", TypeDesc::Matrix44),
        unary("DETERMINANT_MATRIX44", TypeDesc::Float),
        function("MUL_MATRIX44_FLOAT3")
            .input("value_a", IDENTITY)
            .input("value_b", F3_ZERO)
            .output("value", TypeDesc::Float3),
        function("MUL_MATRIX44_FLOAT4")
            .input("value_a", IDENTITY)
            .input("value_b", F4_ZERO)
            .output("value", TypeDesc::Float4),
        function("MATRIX44_TO_LOC")
            .input("matrix", IDENTITY)
            .output("loc", TypeDesc::Float3),
        function("MATRIX44_TO_EULER")
            .constant("order", EULER_ORDER_DEFAULT)
            .input("matrix", IDENTITY)
            .output("euler", TypeDesc::Float3),
        function("MATRIX44_TO_AXISANGLE")
            .input("matrix", IDENTITY)
            .output("axis", TypeDesc::Float3)
            .output("angle", TypeDesc::Float),
        function("MATRIX44_TO_SCALE")
            .input("matrix", IDENTITY)
            .output("scale", TypeDesc::Float3),
        function("LOC_TO_MATRIX44")
            .input("loc", F3_ZERO)
            .output("matrix", TypeDesc::Matrix44),
        function("EULER_TO_MATRIX44")
            .constant("order", EULER_ORDER_DEFAULT)
            .input("euler", F3_ZERO)
            .output("matrix", TypeDesc::Matrix44),
        function("AXISANGLE_TO_MATRIX44")
            .input("axis", F3_ZERO)
            .input("angle", 0.0f32)
            .output("matrix", TypeDesc::Matrix44),
        function("SCALE_TO_MATRIX44")
            .input("scale", F3_ZERO)
            .output("matrix", TypeDesc::Matrix44),
    ]
}

fn texture_types() -> Vec<NodeType> {
    vec![
        function("TEX_PROC_VORONOI")
            .constant("distance_metric", 0)
            .constant("color_type", 0)
            .input("minkowski_exponent", 2.5f32)
            .input("scale", 1.0f32)
            .input("noise_size", 1.0f32)
            .input("nabla", 0.05f32)
            .input("w1", 1.0f32)
            .input("w2", 0.0f32)
            .input("w3", 0.0f32)
            .input("w4", 0.0f32)
            .input("position", F3_ZERO)
            .output("intensity", TypeDesc::Float)
            .output("color", TypeDesc::Float4)
            .output("normal", TypeDesc::Float3),
        function("TEX_PROC_MAGIC")
            .input("position", F3_ZERO)
            .input("turbulence", 1.0f32)
            .constant("depth", 2)
            .output("intensity", TypeDesc::Float)
            .output("color", TypeDesc::Float4)
            .output("normal", TypeDesc::Float3),
        function("TEX_PROC_MARBLE")
            .input("position", F3_ZERO)
            .input("size", 1.0f32)
            .input("nabla", 0.05f32)
            .input("turbulence", 1.0f32)
            .constant("depth", 2)
            .constant("noise_basis", 0)
            .constant("noise_basis_2", 0)
            .constant("noise_hard", 0)
            .constant("marble_type", 0)
            .output("intensity", TypeDesc::Float)
            .output("normal", TypeDesc::Float3),
        function("TEX_PROC_CLOUDS")
            .input("position", F3_ZERO)
            .input("nabla", 0.05f32)
            .input("size", 1.0f32)
            .constant("depth", 2)
            .constant("noise_basis", 0)
            .constant("noise_hard", 0)
            .output("intensity", TypeDesc::Float)
            .output("color", TypeDesc::Float4)
            .output("normal", TypeDesc::Float3),
        function("TEX_PROC_WOOD")
            .input("position", F3_ZERO)
            .input("nabla", 0.05f32)
            .input("size", 1.0f32)
            .input("turbulence", 1.0f32)
            .constant("noise_basis", 0)
            .constant("noise_basis_2", 0)
            .constant("noise_hard", 0)
            .constant("wood_type", 0)
            .output("intensity", TypeDesc::Float)
            .output("normal", TypeDesc::Float3),
        function("TEX_PROC_MUSGRAVE")
            .input("position", F3_ZERO)
            .input("nabla", 0.05f32)
            .input("size", 1.0f32)
            .input("dimension", 1.0f32)
            .input("lacunarity", 1.0f32)
            .input("octaves", 1.0f32)
            .input("intensity", 1.0f32)
            .input("offset", 1.0f32)
            .input("gain", 1.0f32)
            .constant("noise_basis", 0)
            .constant("musgrave_type", 0)
            .output("intensity", TypeDesc::Float)
            .output("normal", TypeDesc::Float3),
        function("TEX_PROC_STUCCI")
            .input("position", F3_ZERO)
            .input("size", 1.0f32)
            .input("turbulence", 1.0f32)
            .constant("noise_basis", 0)
            .constant("noise_hard", 0)
            .constant("stucci_type", 0)
            .output("intensity", TypeDesc::Float)
            .output("normal", TypeDesc::Float3),
        function("TEX_PROC_DISTNOISE")
            .input("position", F3_ZERO)
            .input("size", 1.0f32)
            .input("nabla", 0.05f32)
            .input("dist_amount", 1.0f32)
            .constant("noise_dist", 0)
            .constant("noise_basis", 0)
            .output("intensity", TypeDesc::Float)
            .output("normal", TypeDesc::Float3),
    ]
}

fn geometry_types() -> Vec<NodeType> {
    vec![
        function("OBJECT_LOOKUP")
            .constant("key", 0)
            .output("object", TypeDesc::Object),
        function("OBJECT_TRANSFORM")
            .input("object", NO_OBJECT)
            .output("transform", TypeDesc::Matrix44),
        function("OBJECT_FINAL_MESH")
            .input("object", NO_OBJECT)
            .output("mesh", TypeDesc::Mesh),
        function("EFFECTOR_TRANSFORM")
            .constant("object", 0)
            .output("transform", TypeDesc::Matrix44),
        function("EFFECTOR_CLOSEST_POINT")
            .input("object", NO_OBJECT)
            .input("vector", F3_ZERO)
            .output("position", TypeDesc::Float3)
            .output("normal", TypeDesc::Float3)
            .output("tangent", TypeDesc::Float3),
        function("MESH_LOAD")
            .input("base_mesh", NO_OBJECT)
            .output("mesh", TypeDesc::Mesh),
        function("MESH_COMBINE")
            .input("mesh_a", Value::Mesh)
            .input("mesh_b", Value::Mesh)
            .output("mesh_out", TypeDesc::Mesh),
        kernel("MESH_ARRAY")
            .input("mesh_in", Value::Mesh)
            .input("count", 1)
            .input("transform", IDENTITY)
            .output("mesh_out", TypeDesc::Mesh)
            .output_with("index0", TypeDesc::Int, OutputValueKind::Variable),
        kernel("MESH_DISPLACE")
            .input("mesh_in", Value::Mesh)
            .input("vector", F3_ZERO)
            .output("mesh_out", TypeDesc::Mesh)
            .output_with("index0", TypeDesc::Int, OutputValueKind::Variable),
        function("MESH_BOOLEAN")
            .input("mesh_in", Value::Mesh)
            .input("object", NO_OBJECT)
            .input("transform", IDENTITY)
            .input("inverse_transform", IDENTITY)
            .input("operation", -1)
            .input("separate", 0)
            .input("dissolve", 1)
            .input("connect_regions", 1)
            .input("threshold", 0.0f32)
            .output("mesh_out", TypeDesc::Mesh),
        function("MESH_CLOSEST_POINT")
            .input("mesh", Value::Mesh)
            .input("transform", IDENTITY)
            .input("inverse_transform", IDENTITY)
            .input("vector", F3_ZERO)
            .output("position", TypeDesc::Float3)
            .output("normal", TypeDesc::Float3)
            .output("tangent", TypeDesc::Float3),
        function("CURVE_PATH")
            .input("object", NO_OBJECT)
            .input("transform", IDENTITY)
            .input("inverse_transform", IDENTITY)
            .input("parameter", 0.0f32)
            .output("location", TypeDesc::Float3)
            .output("direction", TypeDesc::Float3)
            .output("normal", TypeDesc::Float3)
            .output("rotation", TypeDesc::Matrix44)
            .output("radius", TypeDesc::Float)
            .output("weight", TypeDesc::Float)
            .output("tilt", TypeDesc::Float),
        function("IMAGE_SAMPLE")
            .input("image", 0)
            .input("uv", F3_ZERO)
            .output("color", TypeDesc::Float4),
        function("MAKE_DUPLI")
            .input("object", NO_OBJECT)
            .input("transform", IDENTITY)
            .input("index", 0)
            .input("hide", 0)
            .input("recursive", 1)
            .output("dupli", TypeDesc::Duplis),
        function("DUPLIS_COMBINE")
            .input("duplis_a", Value::Duplis)
            .input("duplis_b", Value::Duplis)
            .output("duplis", TypeDesc::Duplis),
    ]
}
