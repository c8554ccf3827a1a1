//! End-to-end tests: graph building, finalization, compilation and
//! evaluation through the [`Context`] facade.

use nodevm::{
    BvmCompiler, CompileError, CompilerConfig, Context, EvalGlobals, EvalValue, Float3, Function,
    GraphError, HostObject, LinkOutcome, Matrix44, Mesh, NodeGraph, NodeId, NodeVmError, ObjectKey,
    OpCode, TypeDesc, Value,
};
use nodevm::compiler::InstructionReader;
use nodevm::core::Word;

// =============================================================================
// Helpers
// =============================================================================

fn node(graph: &mut NodeGraph<'_>, type_name: &str) -> NodeId {
    graph
        .add_node(type_name, "")
        .unwrap_or_else(|e| panic!("failed to add {type_name}: {e}"))
}

fn link(graph: &mut NodeGraph<'_>, from: (NodeId, &str), to: (NodeId, &str)) -> LinkOutcome {
    let from = graph.output_socket(from.0, from.1).unwrap();
    let to = graph.input_socket(to.0, to.1).unwrap();
    graph.link(from, to).unwrap()
}

fn set(graph: &mut NodeGraph<'_>, to: (NodeId, &str), value: impl Into<Value>) {
    let key = graph.input_socket(to.0, to.1).unwrap();
    graph.set_input_value(key, value).unwrap();
}

fn output(graph: &mut NodeGraph<'_>, from: (NodeId, &str), name: &str, typedesc: TypeDesc) {
    let to = graph.add_output(name, typedesc, Value::zero(typedesc)).unwrap();
    let from = graph.output_socket(from.0, from.1).unwrap();
    graph.link(from, to).unwrap();
}

/// Operand words of every instruction with opcode `op`, in address order.
fn instructions(function: &Function, op: OpCode) -> Vec<Vec<Word>> {
    let code = function.code();
    let mut reader = InstructionReader::new(code);
    let mut found = Vec::new();
    while !reader.is_at_end() {
        let current = reader.read_opcode();
        let start = reader.pc();
        for &operand in current.operands() {
            reader.skip_operand(operand);
        }
        if current == op {
            found.push(code[start..reader.pc()].to_vec());
        }
    }
    found
}

fn triangle() -> Mesh {
    Mesh::new(
        vec![
            Float3::new(0.0, 0.0, 0.0),
            Float3::new(1.0, 0.0, 0.0),
            Float3::new(0.0, 1.0, 0.0),
        ],
        vec![vec![0, 1, 2]],
    )
}

// =============================================================================
// Scenarios
// =============================================================================

#[test]
fn test_add_constants() {
    let ctx = Context::with_builtin_types();
    let mut graph = ctx.new_graph();
    let add = node(&mut graph, "ADD_FLOAT");
    set(&mut graph, (add, "value_a"), 1.0f32);
    set(&mut graph, (add, "value_b"), 2.0f32);
    output(&mut graph, (add, "value"), "result", TypeDesc::Float);
    graph.finalize().unwrap();

    let function = ctx.compile(&graph).unwrap();
    let results = ctx.call(&function, &EvalGlobals::new(), &[]);
    assert_eq!(results, vec![EvalValue::Float(3.0)]);
}

#[test]
fn test_float3_constant_output() {
    let ctx = Context::with_builtin_types();
    let mut graph = ctx.new_graph();
    let v = Float3::new(0.3, -0.6, 0.0);
    graph.add_output("vector", TypeDesc::Float3, v).unwrap();
    graph.finalize().unwrap();

    let function = ctx.compile(&graph).unwrap();
    function.assert_opcodes(&[OpCode::ValueFloat3, OpCode::End]);
    let results = ctx.call(&function, &EvalGlobals::new(), &[]);
    let out = results[0].as_float3().unwrap();
    assert_eq!(out.x.to_bits(), 0.3f32.to_bits());
    assert_eq!(out.y.to_bits(), (-0.6f32).to_bits());
    assert_eq!(out.z.to_bits(), 0.0f32.to_bits());
}

#[test]
fn test_divide_by_zero() {
    let ctx = Context::with_builtin_types();
    let mut graph = ctx.new_graph();
    let x = graph.add_input("x", TypeDesc::Float).unwrap();
    let div = node(&mut graph, "DIV_FLOAT");
    graph
        .link(x, graph.input_socket(div, "value_a").unwrap())
        .unwrap();
    set(&mut graph, (div, "value_b"), 0.0f32);
    output(&mut graph, (div, "value"), "q", TypeDesc::Float);
    graph.finalize().unwrap();

    let function = ctx.compile(&graph).unwrap();
    let globals = EvalGlobals::new();
    for x in [1.0f32, -3.5, 0.0] {
        assert_eq!(
            ctx.call(&function, &globals, &[x.into()]),
            vec![EvalValue::Float(0.0)],
            "{x} / 0"
        );
    }
}

#[test]
fn test_unreachable_nodes_are_pruned() {
    let ctx = Context::with_builtin_types();

    let build = |with_dead_node: bool| {
        let mut graph = ctx.new_graph();
        let x = graph.add_input("x", TypeDesc::Float).unwrap();
        let cos = node(&mut graph, "COSINE");
        graph.link(x, graph.input_socket(cos, "value").unwrap()).unwrap();
        output(&mut graph, (cos, "value"), "y", TypeDesc::Float);
        if with_dead_node {
            let sine = node(&mut graph, "SINE");
            graph.link(x, graph.input_socket(sine, "value").unwrap()).unwrap();
        }
        graph.finalize().unwrap();
        ctx.compile(&graph).unwrap()
    };

    let pruned = build(true);
    let reference = build(false);
    assert!(!pruned.opcodes().contains(&OpCode::Sine));
    assert_eq!(pruned.instruction_count(), reference.instruction_count());
    assert_eq!(pruned.code(), reference.code());
}

#[test]
fn test_concurrent_evaluation() {
    let ctx = Context::with_builtin_types();
    let mut graph = ctx.new_graph();
    let x = graph.add_input("x", TypeDesc::Float).unwrap();
    let sine = node(&mut graph, "SINE");
    let mul = node(&mut graph, "MUL_FLOAT");
    graph.link(x, graph.input_socket(sine, "value").unwrap()).unwrap();
    link(&mut graph, (sine, "value"), (mul, "value_a"));
    graph.link(x, graph.input_socket(mul, "value_b").unwrap()).unwrap();
    output(&mut graph, (mul, "value"), "y", TypeDesc::Float);
    graph.finalize().unwrap();

    let function = ctx.compile(&graph).unwrap();
    let globals = EvalGlobals::new();
    let inputs: Vec<f32> = (0..200).map(|i| i as f32 * 0.05).collect();
    let sequential: Vec<Vec<EvalValue>> = inputs
        .iter()
        .map(|&x| ctx.call(&function, &globals, &[x.into()]))
        .collect();

    let (a, b) = std::thread::scope(|s| {
        let run = || {
            let function = function.retain();
            let ctx = &ctx;
            let globals = &globals;
            let inputs = &inputs;
            move || {
                inputs
                    .iter()
                    .map(|&x| ctx.call(&function, globals, &[x.into()]))
                    .collect::<Vec<_>>()
            }
        };
        let a = s.spawn(run());
        let b = s.spawn(run());
        (a.join().unwrap(), b.join().unwrap())
    });
    assert_eq!(a, sequential);
    assert_eq!(b, sequential);
    assert_eq!(function.users(), 1);
}

// =============================================================================
// Finalization
// =============================================================================

#[test]
fn test_topological_order() {
    let ctx = Context::with_builtin_types();
    let mut graph = ctx.new_graph();
    let x = graph.add_input("x", TypeDesc::Float3).unwrap();
    // Added consumers first so creation order disagrees with data flow.
    let scale = node(&mut graph, "MUL_FLOAT3_FLOAT");
    let len = node(&mut graph, "LENGTH_FLOAT3");
    let normalize = node(&mut graph, "NORMALIZE_FLOAT3");
    graph.link(x, graph.input_socket(normalize, "value").unwrap()).unwrap();
    graph.link(x, graph.input_socket(len, "value").unwrap()).unwrap();
    link(&mut graph, (normalize, "vector"), (scale, "value_a"));
    link(&mut graph, (len, "length"), (scale, "value_b"));
    output(&mut graph, (scale, "value"), "v", TypeDesc::Float3);
    graph.finalize().unwrap();

    for (_, instance) in graph.nodes() {
        let index = instance.index().unwrap();
        for socket in 0..instance.node_type().inputs().len() {
            if let Some(producer) = instance.link(socket) {
                let producer = graph.node(producer.node).unwrap().index().unwrap();
                assert!(producer < index, "{} reads a later node", instance.name());
            }
        }
    }

    let function = ctx.compile(&graph).unwrap();
    let v = Float3::new(0.0, 3.0, 4.0);
    let results = ctx.call(&function, &EvalGlobals::new(), &[v.into()]);
    let out = results[0].as_float3().unwrap();
    assert!((out - Float3::new(0.0, 3.0, 4.0)).length() < 1e-5);
}

#[test]
fn test_unsupported_conversion_keeps_default() {
    let ctx = Context::with_builtin_types();
    let mut graph = ctx.new_graph();
    let m = graph.add_input("m", TypeDesc::Matrix44).unwrap();
    let add = node(&mut graph, "ADD_FLOAT");
    set(&mut graph, (add, "value_b"), 2.0f32);
    let outcome = graph
        .link(m, graph.input_socket(add, "value_a").unwrap())
        .unwrap();
    assert_eq!(outcome, LinkOutcome::Unsupported);
    output(&mut graph, (add, "value"), "r", TypeDesc::Float);
    graph.finalize().unwrap();

    let function = ctx.compile(&graph).unwrap();
    assert!(!function.argument("m").unwrap().is_used());
    let results = ctx.call(
        &function,
        &EvalGlobals::new(),
        &[Matrix44::from_translation(Float3::new(9.0, 9.0, 9.0)).into()],
    );
    assert_eq!(results, vec![EvalValue::Float(2.0)]);
}

#[test]
fn test_implicit_conversion() {
    let ctx = Context::with_builtin_types();
    let mut graph = ctx.new_graph();
    let x = graph.add_input("x", TypeDesc::Int).unwrap();
    let out = graph.add_output("v", TypeDesc::Float3, Float3::ZERO).unwrap();
    let abs = node(&mut graph, "ABSOLUTE");
    assert!(matches!(
        graph.link(x, graph.input_socket(abs, "value").unwrap()).unwrap(),
        LinkOutcome::Converted(_)
    ));
    let value = graph.output_socket(abs, "value").unwrap();
    assert!(matches!(graph.link(value, out).unwrap(), LinkOutcome::Converted(_)));
    graph.finalize().unwrap();

    let function = ctx.compile(&graph).unwrap();
    function.assert_contains_opcodes(&[OpCode::IntToFloat, OpCode::Absolute, OpCode::SetFloat3]);
    let results = ctx.call(&function, &EvalGlobals::new(), &[(-2).into()]);
    assert_eq!(results, vec![EvalValue::Float3(Float3::splat(2.0))]);
}

// =============================================================================
// Compilation
// =============================================================================

#[test]
fn test_stack_exhaustion() {
    let ctx = Context::with_builtin_types().with_config(CompilerConfig::new().with_stack_size(20));
    let mut graph = ctx.new_graph();
    graph.add_output("a", TypeDesc::Matrix44, Matrix44::IDENTITY).unwrap();
    graph.add_output("b", TypeDesc::Matrix44, Matrix44::IDENTITY).unwrap();
    graph.finalize().unwrap();

    let err = ctx.compile(&graph).unwrap_err();
    assert_eq!(
        err,
        NodeVmError::Compile(CompileError::StackExhausted {
            requested: 16,
            capacity: 20
        })
    );
}

#[test]
fn test_string_literals_keep_stream_aligned() {
    let ctx = Context::with_builtin_types();
    let mut graph = ctx.new_graph();
    let err = graph
        .add_output("bad", TypeDesc::String, "a\0bczzzz")
        .unwrap_err();
    assert_eq!(err, GraphError::InvalidString("a\0bczzzz".to_string()));

    graph.add_output("short", TypeDesc::String, "ab").unwrap();
    graph.add_output("aligned", TypeDesc::String, "zzzz").unwrap();
    graph.add_output("n", TypeDesc::Int, 42).unwrap();
    graph.finalize().unwrap();

    let function = ctx.compile(&graph).unwrap();
    let results = ctx.call(&function, &EvalGlobals::new(), &[]);
    assert_eq!(
        results,
        vec![
            EvalValue::String("ab".to_string()),
            EvalValue::String("zzzz".to_string()),
            EvalValue::Int(42),
        ]
    );
}

#[test]
fn test_live_slots_never_overlap() {
    let ctx = Context::with_builtin_types();
    let mut graph = ctx.new_graph();
    let m = graph.add_input("m", TypeDesc::Matrix44).unwrap();
    let v = graph.add_input("v", TypeDesc::Float3).unwrap();
    let invert = node(&mut graph, "INVERT_MATRIX44");
    let transform = node(&mut graph, "MUL_MATRIX44_FLOAT3");
    let loc = node(&mut graph, "MATRIX44_TO_LOC");
    let add = node(&mut graph, "ADD_FLOAT3");
    graph.link(m, graph.input_socket(invert, "value").unwrap()).unwrap();
    graph.link(m, graph.input_socket(loc, "matrix").unwrap()).unwrap();
    link(&mut graph, (invert, "value"), (transform, "value_a"));
    graph.link(v, graph.input_socket(transform, "value_b").unwrap()).unwrap();
    link(&mut graph, (transform, "value"), (add, "value_a"));
    link(&mut graph, (loc, "loc"), (add, "value_b"));
    output(&mut graph, (add, "value"), "p", TypeDesc::Float3);
    graph.finalize().unwrap();

    let mut compiler = BvmCompiler::new(CompilerConfig::default());
    let function = compiler.compile(&graph).unwrap();
    let layout = compiler.layout();
    for (i, a) in layout.iter().enumerate() {
        for b in &layout[i + 1..] {
            assert!(!a.overlaps(b), "{a:?} overlaps {b:?}");
        }
    }

    // inverse(translate(t)) * v + t == v
    let t = Float3::new(1.0, -2.0, 3.0);
    let v = Float3::new(0.5, 0.25, -4.0);
    let results = nodevm::Evaluator::new().call(
        &function,
        &EvalGlobals::new(),
        &[Matrix44::from_translation(t).into(), v.into()],
    );
    let p = results[0].as_float3().unwrap();
    assert!((p - v).length() < 1e-5);
}

#[test]
fn test_resource_init_and_release_counts() {
    let ctx = Context::with_builtin_types();
    let mut graph = ctx.new_graph();
    let lookup = node(&mut graph, "OBJECT_LOOKUP");
    set(&mut graph, (lookup, "key"), 7);
    let mesh = node(&mut graph, "OBJECT_FINAL_MESH");
    link(&mut graph, (lookup, "object"), (mesh, "object"));
    let combine_a = node(&mut graph, "MESH_COMBINE");
    let combine_b = node(&mut graph, "MESH_COMBINE");
    let closest = node(&mut graph, "MESH_CLOSEST_POINT");
    link(&mut graph, (mesh, "mesh"), (combine_a, "mesh_a"));
    link(&mut graph, (mesh, "mesh"), (combine_a, "mesh_b"));
    link(&mut graph, (mesh, "mesh"), (combine_b, "mesh_a"));
    link(&mut graph, (combine_a, "mesh_out"), (combine_b, "mesh_b"));
    link(&mut graph, (mesh, "mesh"), (closest, "mesh"));
    output(&mut graph, (combine_b, "mesh_out"), "mesh", TypeDesc::Mesh);
    output(&mut graph, (closest, "position"), "p", TypeDesc::Float3);
    graph.finalize().unwrap();

    let function = ctx.compile(&graph).unwrap();
    let object_mesh = instructions(&function, OpCode::ObjectFinalMesh)[0][1];
    let inits = instructions(&function, OpCode::InitMeshPtr);
    let releases = instructions(&function, OpCode::ReleaseMeshPtr);

    // Three consumer nodes of the object mesh.
    let init = inits.iter().filter(|i| i[0] == object_mesh).count();
    assert_eq!(init, 1);
    assert!(inits.contains(&vec![object_mesh, 3]));
    let released = releases.iter().filter(|r| r[0] == object_mesh).count();
    assert_eq!(released, 3);

    let mut globals = EvalGlobals::new();
    globals.add_object(
        ObjectKey::new(7),
        HostObject::new(Matrix44::IDENTITY).with_mesh(triangle()),
    );
    let results = ctx.call(&function, &globals, &[]);
    assert_eq!(results[0].as_mesh().unwrap().vertex_count(), 9);
    assert!(results[1].as_float3().unwrap().length() < 1e-6);
}

// =============================================================================
// Kernels
// =============================================================================

#[test]
fn test_mesh_array_with_index_dependent_transform() {
    let ctx = Context::with_builtin_types();
    let mut graph = ctx.new_graph();
    let base = graph.add_input("base", TypeDesc::Mesh).unwrap();
    let array = node(&mut graph, "MESH_ARRAY");
    let to_float = node(&mut graph, "INT_TO_FLOAT");
    let offset = node(&mut graph, "SET_FLOAT3");
    let matrix = node(&mut graph, "LOC_TO_MATRIX44");
    graph
        .link(base, graph.input_socket(array, "mesh_in").unwrap())
        .unwrap();
    set(&mut graph, (array, "count"), 3);
    link(&mut graph, (array, "index0"), (to_float, "value"));
    link(&mut graph, (to_float, "value"), (offset, "value_x"));
    link(&mut graph, (offset, "value"), (matrix, "loc"));
    link(&mut graph, (matrix, "matrix"), (array, "transform"));
    output(&mut graph, (array, "mesh_out"), "mesh", TypeDesc::Mesh);
    graph.finalize().unwrap();

    let function = ctx.compile(&graph).unwrap();
    let results = ctx.call(&function, &EvalGlobals::new(), &[triangle().into()]);
    let mesh = results[0].as_mesh().unwrap();
    assert_eq!(mesh.vertex_count(), 9);
    assert_eq!(mesh.polygons, vec![vec![0, 1, 2], vec![3, 4, 5], vec![6, 7, 8]]);
    assert_eq!(mesh.vertices[3], Float3::new(1.0, 0.0, 0.0));
    assert_eq!(mesh.vertices[4], Float3::new(2.0, 0.0, 0.0));
    assert_eq!(mesh.vertices[8], Float3::new(2.0, 1.0, 0.0));
}

#[test]
fn test_mesh_array_zero_count() {
    let ctx = Context::with_builtin_types();
    let mut graph = ctx.new_graph();
    let base = graph.add_input("base", TypeDesc::Mesh).unwrap();
    let array = node(&mut graph, "MESH_ARRAY");
    graph
        .link(base, graph.input_socket(array, "mesh_in").unwrap())
        .unwrap();
    set(&mut graph, (array, "count"), 0);
    output(&mut graph, (array, "mesh_out"), "mesh", TypeDesc::Mesh);
    graph.finalize().unwrap();

    let function = ctx.compile(&graph).unwrap();
    let results = ctx.call(&function, &EvalGlobals::new(), &[triangle().into()]);
    assert!(results[0].as_mesh().unwrap().is_empty());
}

#[test]
fn test_mesh_displace_per_vertex() {
    let ctx = Context::with_builtin_types();
    let mut graph = ctx.new_graph();
    let base = graph.add_input("base", TypeDesc::Mesh).unwrap();
    let displace = node(&mut graph, "MESH_DISPLACE");
    let to_float = node(&mut graph, "INT_TO_FLOAT");
    let offset = node(&mut graph, "SET_FLOAT3");
    graph
        .link(base, graph.input_socket(displace, "mesh_in").unwrap())
        .unwrap();
    link(&mut graph, (displace, "index0"), (to_float, "value"));
    link(&mut graph, (to_float, "value"), (offset, "value_z"));
    link(&mut graph, (offset, "value"), (displace, "vector"));
    output(&mut graph, (displace, "mesh_out"), "mesh", TypeDesc::Mesh);
    graph.finalize().unwrap();

    let function = ctx.compile(&graph).unwrap();
    let results = ctx.call(&function, &EvalGlobals::new(), &[triangle().into()]);
    let mesh = results[0].as_mesh().unwrap();
    assert_eq!(
        mesh.vertices,
        vec![
            Float3::new(0.0, 0.0, 0.0),
            Float3::new(1.0, 0.0, 1.0),
            Float3::new(0.0, 1.0, 2.0),
        ]
    );
}

/// Instruction names of one disassembled block.
fn block_ops(section: &str) -> Vec<&str> {
    section
        .lines()
        .filter(|l| l.starts_with(|c: char| c.is_ascii_digit()))
        .filter_map(|l| l.split_whitespace().nth(1))
        .collect()
}

fn block_entry(section: &str) -> Word {
    section
        .lines()
        .find(|l| l.starts_with(|c: char| c.is_ascii_digit()))
        .and_then(|l| l[..4].parse().ok())
        .unwrap()
}

#[test]
fn test_nested_kernels() {
    let ctx = Context::with_builtin_types();
    let mut graph = ctx.new_graph();
    let base = graph.add_input("base", TypeDesc::Mesh).unwrap();

    // Outer: displace every base vertex by the closest point of an array
    // built per vertex.
    let displace = node(&mut graph, "MESH_DISPLACE");
    let closest = node(&mut graph, "MESH_CLOSEST_POINT");
    graph
        .link(base, graph.input_socket(displace, "mesh_in").unwrap())
        .unwrap();
    set(&mut graph, (closest, "vector"), Float3::new(10.0, 0.0, 0.0));
    link(&mut graph, (closest, "position"), (displace, "vector"));

    // Inner: copy j is offset by (2j, 0, i) for outer vertex i. The range
    // reads `index0` without a link, so it must pick the array's index.
    let array = node(&mut graph, "MESH_ARRAY");
    let range = node(&mut graph, "RANGE_INT");
    let copy_x = node(&mut graph, "INT_TO_FLOAT");
    let vertex_z = node(&mut graph, "INT_TO_FLOAT");
    let offset = node(&mut graph, "SET_FLOAT3");
    let matrix = node(&mut graph, "LOC_TO_MATRIX44");
    graph
        .link(base, graph.input_socket(array, "mesh_in").unwrap())
        .unwrap();
    set(&mut graph, (array, "count"), 2);
    set(&mut graph, (range, "step"), 2);
    link(&mut graph, (range, "value"), (copy_x, "value"));
    link(&mut graph, (displace, "index0"), (vertex_z, "value"));
    link(&mut graph, (copy_x, "value"), (offset, "value_x"));
    link(&mut graph, (vertex_z, "value"), (offset, "value_z"));
    link(&mut graph, (offset, "value"), (matrix, "loc"));
    link(&mut graph, (matrix, "matrix"), (array, "transform"));
    link(&mut graph, (array, "mesh_out"), (closest, "mesh"));

    output(&mut graph, (displace, "mesh_out"), "mesh", TypeDesc::Mesh);
    graph.finalize().unwrap();

    let outer = graph.kernel_block(displace).unwrap();
    let inner = graph.kernel_block(array).unwrap();
    assert_eq!(graph.blocks().len(), 3);
    assert_eq!(graph.block(inner).unwrap().parent(), Some(outer));
    assert_eq!(graph.node(array).unwrap().block(), Some(outer));
    assert_eq!(graph.node(vertex_z).unwrap().block(), Some(outer));
    assert_eq!(graph.node(range).unwrap().block(), Some(inner));

    let function = ctx.compile(&graph).unwrap();
    let text = nodevm::disassemble(&function);
    let sections: Vec<&str> = text.split("\n\n").collect();
    assert_eq!(sections.len(), 3, "{text}");

    // Innermost block first, then the outer body, then main.
    assert_eq!(
        block_ops(sections[0]),
        ["RANGE_INT", "INT_TO_FLOAT", "SET_FLOAT3", "LOC_TO_MATRIX44", "END"]
    );
    let body = block_ops(sections[1]);
    assert!(body.contains(&"MESH_ARRAY"), "{text}");
    assert!(body.contains(&"MESH_CLOSEST_POINT"), "{text}");
    assert!(!body.contains(&"MESH_DISPLACE"), "{text}");
    assert!(!body.contains(&"RANGE_INT"), "{text}");
    assert_eq!(body.last(), Some(&"END"));
    let main = block_ops(sections[2]);
    assert!(main.contains(&"MESH_DISPLACE"), "{text}");
    assert!(!main.contains(&"MESH_ARRAY"), "{text}");
    assert_eq!(function.entry(), block_entry(sections[2]) as usize);

    let array_op = &instructions(&function, OpCode::MeshArray)[0];
    let displace_op = &instructions(&function, OpCode::MeshDisplace)[0];
    let range_op = &instructions(&function, OpCode::RangeInt)[0];
    assert_eq!(array_op[4], block_entry(sections[0]));
    assert_eq!(displace_op[2], block_entry(sections[1]));
    assert_eq!(range_op[0], array_op[7], "range reads the inner index");
    assert_ne!(range_op[0], displace_op[5]);

    let results = ctx.call(&function, &EvalGlobals::new(), &[triangle().into()]);
    let mesh = results[0].as_mesh().unwrap();
    // The vertex nearest (10, 0, 0) is (3, 0, i), from the second copy.
    assert_eq!(
        mesh.vertices,
        vec![
            Float3::new(3.0, 0.0, 0.0),
            Float3::new(4.0, 0.0, 1.0),
            Float3::new(3.0, 1.0, 2.0),
        ]
    );
    assert_eq!(mesh.polygons, vec![vec![0, 1, 2]]);
}

#[test]
fn test_dupli_list_output() {
    let ctx = Context::with_builtin_types();
    let mut graph = ctx.new_graph();
    let a = node(&mut graph, "MAKE_DUPLI");
    let b = node(&mut graph, "MAKE_DUPLI");
    let combine = node(&mut graph, "DUPLIS_COMBINE");
    set(&mut graph, (a, "object"), ObjectKey::new(1));
    set(&mut graph, (b, "object"), ObjectKey::new(2));
    set(&mut graph, (b, "index"), 5);
    link(&mut graph, (a, "dupli"), (combine, "duplis_a"));
    link(&mut graph, (b, "dupli"), (combine, "duplis_b"));
    output(&mut graph, (combine, "duplis"), "duplis", TypeDesc::Duplis);
    graph.finalize().unwrap();

    let function = ctx.compile(&graph).unwrap();
    let results = ctx.call(&function, &EvalGlobals::new(), &[]);
    let duplis = results[0].as_duplis().unwrap();
    assert_eq!(duplis.len(), 2);
    let objects: Vec<_> = duplis.iter().map(|d| (d.object, d.index)).collect();
    assert_eq!(objects, vec![(ObjectKey::new(1), 0), (ObjectKey::new(2), 5)]);
}

#[test]
fn test_texture_is_deterministic() {
    let ctx = Context::with_builtin_types();
    let mut graph = ctx.new_graph();
    let p = graph.add_input("p", TypeDesc::Float3).unwrap();
    let clouds = node(&mut graph, "TEX_PROC_CLOUDS");
    graph
        .link(p, graph.input_socket(clouds, "position").unwrap())
        .unwrap();
    output(&mut graph, (clouds, "intensity"), "i", TypeDesc::Float);
    output(&mut graph, (clouds, "color"), "c", TypeDesc::Float4);
    graph.finalize().unwrap();

    let function = ctx.compile(&graph).unwrap();
    let globals = EvalGlobals::new();
    let pos = Float3::new(0.25, 1.5, -0.75);
    let first = ctx.call(&function, &globals, &[pos.into()]);
    let second = ctx.call(&function, &globals, &[pos.into()]);
    assert_eq!(first, second);
    let intensity = first[0].as_float().unwrap();
    assert!(intensity.is_finite());
}

// =============================================================================
// Function Cache
// =============================================================================

#[test]
fn test_cache_accounting() {
    let ctx = Context::with_builtin_types();
    let mut graph = ctx.new_graph();
    graph.add_output("v", TypeDesc::Int, 4).unwrap();
    graph.finalize().unwrap();
    let key = graph.fingerprint();

    let held = ctx.compile_cached(key, &graph).unwrap();
    assert_eq!(held.users(), 2);
    let again = ctx.compile_cached(key, &graph).unwrap();
    assert!(again.ptr_eq(&held));
    assert!(!again.release());

    // Replacing the entry drops the cache's reference but not ours.
    let replacement = ctx.compile(&graph).unwrap();
    ctx.cache().set(key, Some(&replacement));
    assert_eq!(held.users(), 1);
    assert_eq!(
        ctx.call(&held, &EvalGlobals::new(), &[]),
        vec![EvalValue::Int(4)]
    );
    assert!(held.release());

    assert!(ctx.cache().remove(&key));
    assert_eq!(replacement.users(), 1);
    assert!(ctx.cache().is_empty());
}
