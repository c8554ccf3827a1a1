//! Bytecode evaluator.
//!
//! [`Evaluator::eval`] runs a compiled [`Function`] against a set of
//! arguments and writes its return values. Every call builds a fresh
//! [`Frame`]: a value stack plus the resource arenas for meshes and dupli
//! lists. Nothing survives between calls.
//!
//! ## Dispatch
//!
//! [`Frame::run`] reads one opcode per iteration and matches on it. Operands
//! are decoded in the order the compiler wrote them (inputs, then outputs),
//! so every handler below reads its stack indices before touching the stack.
//! Kernel opcodes carry a jump operand per input; a valid jump runs the
//! nested block as a subroutine, which returns at its `END`.

use nodevm_compiler::{Function, InstructionReader};
use nodevm_core::{
    Float3, Float4, Matrix44, ObjectKey, OpCode, STACK_INVALID, TypeDesc, Value, Word,
};
use tracing::{instrument, trace};

use crate::globals::{DupliList, EvalGlobals, Mesh};
use crate::kernels::noise::Fractal;
use crate::kernels::{color, math, mesh, object, texture};
use crate::resources::ResourceArena;
use crate::stack::ValueStack;

static EMPTY_MESH: Mesh = Mesh::EMPTY;
static EMPTY_DUPLIS: DupliList = DupliList::EMPTY;

// ----------------------------------------------------------------------------
// Values
// ----------------------------------------------------------------------------

/// Argument or result of an evaluation.
///
/// Unlike [`Value`], resources carry their payload.
#[derive(Debug, Clone, PartialEq)]
pub enum EvalValue {
    Float(f32),
    Float3(Float3),
    Float4(Float4),
    Int(i32),
    Matrix44(Matrix44),
    String(String),
    Object(ObjectKey),
    Mesh(Mesh),
    Duplis(DupliList),
}

impl EvalValue {
    pub fn zero(typedesc: TypeDesc) -> EvalValue {
        Value::zero(typedesc).into()
    }

    pub fn typedesc(&self) -> TypeDesc {
        match self {
            EvalValue::Float(_) => TypeDesc::Float,
            EvalValue::Float3(_) => TypeDesc::Float3,
            EvalValue::Float4(_) => TypeDesc::Float4,
            EvalValue::Int(_) => TypeDesc::Int,
            EvalValue::Matrix44(_) => TypeDesc::Matrix44,
            EvalValue::String(_) => TypeDesc::String,
            EvalValue::Object(_) => TypeDesc::Object,
            EvalValue::Mesh(_) => TypeDesc::Mesh,
            EvalValue::Duplis(_) => TypeDesc::Duplis,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            EvalValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float3(&self) -> Option<Float3> {
        match self {
            EvalValue::Float3(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float4(&self) -> Option<Float4> {
        match self {
            EvalValue::Float4(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            EvalValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_matrix44(&self) -> Option<Matrix44> {
        match self {
            EvalValue::Matrix44(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            EvalValue::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<ObjectKey> {
        match self {
            EvalValue::Object(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_mesh(&self) -> Option<&Mesh> {
        match self {
            EvalValue::Mesh(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_duplis(&self) -> Option<&DupliList> {
        match self {
            EvalValue::Duplis(v) => Some(v),
            _ => None,
        }
    }
}

impl From<Value> for EvalValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Float(v) => EvalValue::Float(v),
            Value::Float3(v) => EvalValue::Float3(v),
            Value::Float4(v) => EvalValue::Float4(v),
            Value::Int(v) => EvalValue::Int(v),
            Value::Matrix44(v) => EvalValue::Matrix44(v),
            Value::String(v) => EvalValue::String(v),
            Value::Object(v) => EvalValue::Object(v),
            Value::Mesh => EvalValue::Mesh(Mesh::default()),
            Value::Duplis => EvalValue::Duplis(DupliList::default()),
        }
    }
}

impl From<f32> for EvalValue {
    fn from(v: f32) -> Self {
        EvalValue::Float(v)
    }
}

impl From<i32> for EvalValue {
    fn from(v: i32) -> Self {
        EvalValue::Int(v)
    }
}

impl From<Float3> for EvalValue {
    fn from(v: Float3) -> Self {
        EvalValue::Float3(v)
    }
}

impl From<Float4> for EvalValue {
    fn from(v: Float4) -> Self {
        EvalValue::Float4(v)
    }
}

impl From<Matrix44> for EvalValue {
    fn from(v: Matrix44) -> Self {
        EvalValue::Matrix44(v)
    }
}

impl From<&str> for EvalValue {
    fn from(v: &str) -> Self {
        EvalValue::String(v.to_owned())
    }
}

impl From<ObjectKey> for EvalValue {
    fn from(v: ObjectKey) -> Self {
        EvalValue::Object(v)
    }
}

impl From<Mesh> for EvalValue {
    fn from(v: Mesh) -> Self {
        EvalValue::Mesh(v)
    }
}

impl From<DupliList> for EvalValue {
    fn from(v: DupliList) -> Self {
        EvalValue::Duplis(v)
    }
}

// ----------------------------------------------------------------------------
// Evaluator
// ----------------------------------------------------------------------------

/// Runs compiled functions.
///
/// # Thread Safety
///
/// The evaluator holds no state; all per-call storage lives in the call.
/// Share one instance, or a [`SharedFunction`](nodevm_compiler::SharedFunction),
/// across threads freely.
///
/// # Example
///
/// ```
/// use nodevm_compiler::BvmCompiler;
/// use nodevm_core::TypeDesc;
/// use nodevm_graph::{NodeGraph, NodeTypeRegistry};
/// use nodevm_vm::{EvalGlobals, EvalValue, Evaluator};
///
/// let registry = NodeTypeRegistry::with_builtin_types();
/// let mut graph = NodeGraph::new(&registry);
/// let x = graph.add_input("x", TypeDesc::Float).unwrap();
/// let out = graph.add_output("y", TypeDesc::Float, 0.0f32).unwrap();
/// graph.link(x, out).unwrap();
/// graph.finalize().unwrap();
/// let function = BvmCompiler::default().compile(&graph).unwrap();
///
/// let results = Evaluator::new().call(&function, &EvalGlobals::new(), &[4.0f32.into()]);
/// assert_eq!(results, vec![EvalValue::Float(4.0)]);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct Evaluator;

impl Evaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate `function`.
    ///
    /// `arguments` and `results` are ordered like the function's argument
    /// and return tables.
    ///
    /// # Panics
    ///
    /// Panics if the slices do not match the tables in length or argument
    /// types, or if the code contains an unknown opcode.
    #[cfg_attr(feature = "profiling", profiling::function)]
    #[instrument(skip_all, fields(function = function.name()))]
    pub fn eval(
        &self,
        function: &Function,
        globals: &EvalGlobals,
        arguments: &[EvalValue],
        results: &mut [EvalValue],
    ) {
        assert_eq!(
            arguments.len(),
            function.arguments().len(),
            "argument count mismatch for '{}'",
            function.name()
        );
        assert_eq!(
            results.len(),
            function.returns().len(),
            "result count mismatch for '{}'",
            function.name()
        );

        let mut frame = Frame::new(function.code(), globals);
        for (arg, value) in function.arguments().iter().zip(arguments) {
            assert_eq!(
                value.typedesc(),
                arg.typedesc,
                "argument '{}' has the wrong type",
                arg.name
            );
            if arg.is_used() {
                frame.store_argument(arg.stack_index, value, arg.use_count);
            }
        }

        frame.run(function.entry());

        for (ret, result) in function.returns().iter().zip(results.iter_mut()) {
            *result = frame.take_result(ret.typedesc, ret.stack_index);
        }
    }

    /// Evaluate `function` and collect its results.
    pub fn call(
        &self,
        function: &Function,
        globals: &EvalGlobals,
        arguments: &[EvalValue],
    ) -> Vec<EvalValue> {
        let mut results: Vec<EvalValue> = function
            .returns()
            .iter()
            .map(|ret| EvalValue::zero(ret.typedesc))
            .collect();
        self.eval(function, globals, arguments, &mut results);
        results
    }
}

// ----------------------------------------------------------------------------
// Frame
// ----------------------------------------------------------------------------

/// Storage of one evaluation.
struct Frame<'a> {
    code: &'a [Word],
    globals: &'a EvalGlobals,
    stack: ValueStack,
    meshes: ResourceArena<Mesh>,
    duplis: ResourceArena<DupliList>,
    /// String arguments. Their stack word is `code.len() + index`, past any
    /// literal offset.
    strings: Vec<String>,
}

impl<'a> Frame<'a> {
    fn new(code: &'a [Word], globals: &'a EvalGlobals) -> Self {
        Self {
            code,
            globals,
            stack: ValueStack::new(),
            meshes: ResourceArena::new(),
            duplis: ResourceArena::new(),
            strings: Vec::new(),
        }
    }

    fn store_argument(&mut self, index: Word, value: &EvalValue, use_count: u32) {
        match value {
            EvalValue::Float(v) => self.stack.store_float(index, *v),
            EvalValue::Float3(v) => self.stack.store_float3(index, *v),
            EvalValue::Float4(v) => self.stack.store_float4(index, *v),
            EvalValue::Int(v) => self.stack.store_int(index, *v),
            EvalValue::Matrix44(v) => self.stack.store_matrix44(index, v),
            EvalValue::String(v) => {
                let word = (self.code.len() + self.strings.len()) as Word;
                self.strings.push(v.clone());
                self.stack.store_word(index, word);
            }
            EvalValue::Object(v) => self.stack.store_object(index, *v),
            EvalValue::Mesh(v) => {
                let handle = self.meshes.insert(v.clone(), use_count);
                self.stack.store_word(index, handle);
            }
            EvalValue::Duplis(v) => {
                let handle = self.duplis.insert(v.clone(), use_count);
                self.stack.store_word(index, handle);
            }
        }
    }

    /// Read a return value. Resource results are copied out and their
    /// reference released.
    fn take_result(&mut self, typedesc: TypeDesc, index: Word) -> EvalValue {
        match typedesc {
            TypeDesc::Float => EvalValue::Float(self.stack.load_float(index)),
            TypeDesc::Float3 => EvalValue::Float3(self.stack.load_float3(index)),
            TypeDesc::Float4 => EvalValue::Float4(self.stack.load_float4(index)),
            TypeDesc::Int => EvalValue::Int(self.stack.load_int(index)),
            TypeDesc::Matrix44 => EvalValue::Matrix44(self.stack.load_matrix44(index)),
            TypeDesc::String => EvalValue::String(self.string(self.stack.load_word(index))),
            TypeDesc::Object => EvalValue::Object(self.stack.load_object(index)),
            TypeDesc::Mesh => {
                let handle = self.stack.load_word(index);
                let mesh = self.meshes.get(handle).cloned().unwrap_or_default();
                self.meshes.release(handle);
                EvalValue::Mesh(mesh)
            }
            TypeDesc::Duplis => {
                let handle = self.stack.load_word(index);
                let duplis = self.duplis.get(handle).cloned().unwrap_or_default();
                self.duplis.release(handle);
                EvalValue::Duplis(duplis)
            }
        }
    }

    fn string(&self, word: Word) -> String {
        let offset = word as usize;
        if word == STACK_INVALID {
            String::new()
        } else if offset < self.code.len() {
            InstructionReader::at(self.code, offset).read_string()
        } else {
            self.strings
                .get(offset - self.code.len())
                .cloned()
                .unwrap_or_default()
        }
    }

    fn mesh(&self, index: Word) -> &Mesh {
        self.meshes
            .get(self.stack.load_word(index))
            .unwrap_or(&EMPTY_MESH)
    }

    fn set_mesh(&mut self, index: Word, mesh: Mesh) {
        let handle = self.stack.load_word(index);
        self.meshes.set(handle, mesh);
    }

    fn duplis(&self, index: Word) -> &DupliList {
        self.duplis
            .get(self.stack.load_word(index))
            .unwrap_or(&EMPTY_DUPLIS)
    }

    fn set_duplis(&mut self, index: Word, duplis: DupliList) {
        let handle = self.stack.load_word(index);
        self.duplis.set(handle, duplis);
    }

    fn jump(&mut self, address: Word) {
        if address != STACK_INVALID {
            self.run(address as usize);
        }
    }

    // ------------------------------------------------------------------------
    // Operand helpers
    // ------------------------------------------------------------------------

    fn unary_float(&mut self, reader: &mut InstructionReader<'_>, f: impl Fn(f32) -> f32) {
        let a = reader.read_stack_index();
        let r = reader.read_stack_index();
        self.stack.store_float(r, f(self.stack.load_float(a)));
    }

    fn binary_float(&mut self, reader: &mut InstructionReader<'_>, f: impl Fn(f32, f32) -> f32) {
        let a = reader.read_stack_index();
        let b = reader.read_stack_index();
        let r = reader.read_stack_index();
        let v = f(self.stack.load_float(a), self.stack.load_float(b));
        self.stack.store_float(r, v);
    }

    fn binary_float3(
        &mut self,
        reader: &mut InstructionReader<'_>,
        f: impl Fn(Float3, Float3) -> Float3,
    ) {
        let a = reader.read_stack_index();
        let b = reader.read_stack_index();
        let r = reader.read_stack_index();
        let v = f(self.stack.load_float3(a), self.stack.load_float3(b));
        self.stack.store_float3(r, v);
    }

    fn float3_float(&mut self, reader: &mut InstructionReader<'_>, f: impl Fn(Float3, f32) -> Float3) {
        let a = reader.read_stack_index();
        let b = reader.read_stack_index();
        let r = reader.read_stack_index();
        let v = f(self.stack.load_float3(a), self.stack.load_float(b));
        self.stack.store_float3(r, v);
    }

    fn unary_matrix(
        &mut self,
        reader: &mut InstructionReader<'_>,
        f: impl Fn(&Matrix44) -> Matrix44,
    ) {
        let a = reader.read_stack_index();
        let r = reader.read_stack_index();
        let v = f(&self.stack.load_matrix44(a));
        self.stack.store_matrix44(r, &v);
    }

    fn binary_matrix(
        &mut self,
        reader: &mut InstructionReader<'_>,
        f: impl Fn(&Matrix44, &Matrix44) -> Matrix44,
    ) {
        let a = reader.read_stack_index();
        let b = reader.read_stack_index();
        let r = reader.read_stack_index();
        let v = f(&self.stack.load_matrix44(a), &self.stack.load_matrix44(b));
        self.stack.store_matrix44(r, &v);
    }

    fn matrix_float(
        &mut self,
        reader: &mut InstructionReader<'_>,
        f: impl Fn(&Matrix44, f32) -> Matrix44,
    ) {
        let a = reader.read_stack_index();
        let b = reader.read_stack_index();
        let r = reader.read_stack_index();
        let v = f(&self.stack.load_matrix44(a), self.stack.load_float(b));
        self.stack.store_matrix44(r, &v);
    }

    fn matrix_to_float3(&mut self, reader: &mut InstructionReader<'_>, f: impl Fn(&Matrix44) -> Float3) {
        let a = reader.read_stack_index();
        let r = reader.read_stack_index();
        let v = f(&self.stack.load_matrix44(a));
        self.stack.store_float3(r, v);
    }

    fn float3_to_matrix(&mut self, reader: &mut InstructionReader<'_>, f: impl Fn(Float3) -> Matrix44) {
        let a = reader.read_stack_index();
        let r = reader.read_stack_index();
        let v = f(self.stack.load_float3(a));
        self.stack.store_matrix44(r, &v);
    }

    fn store_tex_result(
        &mut self,
        result: &texture::TexResult,
        intensity: Word,
        color: Option<Word>,
        normal: Word,
    ) {
        self.stack.store_float(intensity, result.intensity);
        if let Some(color) = color {
            self.stack.store_float4(color, result.color);
        }
        self.stack.store_float3(normal, result.normal);
    }

    // ------------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------------

    /// Run instructions from `entry` until the block's `END`.
    fn run(&mut self, entry: usize) {
        let code = self.code;
        let mut reader = InstructionReader::at(code, entry);
        loop {
            let pc = reader.pc();
            let op = reader.read_opcode();
            trace!(pc, op = op.name(), "dispatch");

            match op {
                OpCode::Noop => {}
                OpCode::End => return,

                // ============================================================
                // Constants
                // ============================================================
                OpCode::ValueFloat => {
                    let v = reader.read_float();
                    let r = reader.read_stack_index();
                    self.stack.store_float(r, v);
                }
                OpCode::ValueFloat3 => {
                    let v = reader.read_float3();
                    let r = reader.read_stack_index();
                    self.stack.store_float3(r, v);
                }
                OpCode::ValueFloat4 => {
                    let v = reader.read_float4();
                    let r = reader.read_stack_index();
                    self.stack.store_float4(r, v);
                }
                OpCode::ValueInt => {
                    let v = reader.read_int();
                    let r = reader.read_stack_index();
                    self.stack.store_int(r, v);
                }
                OpCode::ValueMatrix44 => {
                    let v = reader.read_matrix44();
                    let r = reader.read_stack_index();
                    self.stack.store_matrix44(r, &v);
                }
                OpCode::ValueString => {
                    let offset = reader.pc() as Word;
                    reader.read_string();
                    let r = reader.read_stack_index();
                    self.stack.store_word(r, offset);
                }
                OpCode::ValueObject => {
                    let v = reader.read_object();
                    let r = reader.read_stack_index();
                    self.stack.store_object(r, v);
                }
                OpCode::ValueMesh => {
                    let r = reader.read_stack_index();
                    self.set_mesh(r, Mesh::default());
                }
                OpCode::ValueDuplis => {
                    let r = reader.read_stack_index();
                    self.set_duplis(r, DupliList::default());
                }

                // ============================================================
                // Conversions
                // ============================================================
                OpCode::FloatToInt => {
                    let a = reader.read_stack_index();
                    let r = reader.read_stack_index();
                    self.stack.store_int(r, self.stack.load_float(a) as i32);
                }
                OpCode::IntToFloat => {
                    let a = reader.read_stack_index();
                    let r = reader.read_stack_index();
                    self.stack.store_float(r, self.stack.load_int(a) as f32);
                }
                OpCode::SetFloat3 => {
                    let x = reader.read_stack_index();
                    let y = reader.read_stack_index();
                    let z = reader.read_stack_index();
                    let r = reader.read_stack_index();
                    let v = Float3::new(
                        self.stack.load_float(x),
                        self.stack.load_float(y),
                        self.stack.load_float(z),
                    );
                    self.stack.store_float3(r, v);
                }
                OpCode::GetElemFloat3 => {
                    let index = reader.read_int();
                    let a = reader.read_stack_index();
                    let r = reader.read_stack_index();
                    let v = self.stack.load_float3(a).to_array();
                    let elem = usize::try_from(index)
                        .ok()
                        .and_then(|i| v.get(i).copied())
                        .unwrap_or(0.0);
                    self.stack.store_float(r, elem);
                }
                OpCode::SetFloat4 => {
                    let x = reader.read_stack_index();
                    let y = reader.read_stack_index();
                    let z = reader.read_stack_index();
                    let w = reader.read_stack_index();
                    let r = reader.read_stack_index();
                    let v = Float4::new(
                        self.stack.load_float(x),
                        self.stack.load_float(y),
                        self.stack.load_float(z),
                        self.stack.load_float(w),
                    );
                    self.stack.store_float4(r, v);
                }
                OpCode::GetElemFloat4 => {
                    let index = reader.read_int();
                    let a = reader.read_stack_index();
                    let r = reader.read_stack_index();
                    let v = self.stack.load_float4(a).to_array();
                    let elem = usize::try_from(index)
                        .ok()
                        .and_then(|i| v.get(i).copied())
                        .unwrap_or(0.0);
                    self.stack.store_float(r, elem);
                }

                // ============================================================
                // Resource lifetime
                // ============================================================
                OpCode::InitMeshPtr => {
                    let r = reader.read_stack_index();
                    let count = reader.read_int();
                    let handle = self.meshes.init(count.max(1) as u32);
                    self.stack.store_word(r, handle);
                }
                OpCode::ReleaseMeshPtr => {
                    let r = reader.read_stack_index();
                    self.meshes.release(self.stack.load_word(r));
                }
                OpCode::InitDuplisPtr => {
                    let r = reader.read_stack_index();
                    let count = reader.read_int();
                    let handle = self.duplis.init(count.max(1) as u32);
                    self.stack.store_word(r, handle);
                }
                OpCode::ReleaseDuplisPtr => {
                    let r = reader.read_stack_index();
                    self.duplis.release(self.stack.load_word(r));
                }

                // ============================================================
                // Iterators
                // ============================================================
                OpCode::RangeInt => {
                    let index = reader.read_stack_index();
                    let start = reader.read_int();
                    let _end = reader.read_int();
                    let step = reader.read_int();
                    let r = reader.read_stack_index();
                    let v = math::range_int(self.stack.load_int(index), start, step);
                    self.stack.store_int(r, v);
                }

                // ============================================================
                // Float math
                // ============================================================
                OpCode::AddFloat => self.binary_float(&mut reader, |a, b| a + b),
                OpCode::SubFloat => self.binary_float(&mut reader, |a, b| a - b),
                OpCode::MulFloat => self.binary_float(&mut reader, |a, b| a * b),
                OpCode::DivFloat => self.binary_float(&mut reader, math::div_safe),
                OpCode::Sine => self.unary_float(&mut reader, f32::sin),
                OpCode::Cosine => self.unary_float(&mut reader, f32::cos),
                OpCode::Tangent => self.unary_float(&mut reader, f32::tan),
                OpCode::Arcsine => self.unary_float(&mut reader, f32::asin),
                OpCode::Arccosine => self.unary_float(&mut reader, f32::acos),
                OpCode::Arctangent => self.unary_float(&mut reader, f32::atan),
                OpCode::Power => self.binary_float(&mut reader, math::pow_safe),
                OpCode::Logarithm => self.binary_float(&mut reader, math::log_safe),
                OpCode::Minimum => self.binary_float(&mut reader, f32::min),
                OpCode::Maximum => self.binary_float(&mut reader, f32::max),
                OpCode::Round => self.unary_float(&mut reader, math::round),
                OpCode::LessThan => {
                    self.binary_float(&mut reader, |a, b| if a < b { 1.0 } else { 0.0 })
                }
                OpCode::GreaterThan => {
                    self.binary_float(&mut reader, |a, b| if a > b { 1.0 } else { 0.0 })
                }
                OpCode::Modulo => self.binary_float(&mut reader, math::modulo_safe),
                OpCode::Absolute => self.unary_float(&mut reader, f32::abs),
                OpCode::ClampOne => self.unary_float(&mut reader, math::clamp_one),
                OpCode::Sqrt => self.unary_float(&mut reader, math::sqrt_safe),

                // ============================================================
                // Vector math
                // ============================================================
                OpCode::AddFloat3 => self.binary_float3(&mut reader, |a, b| a + b),
                OpCode::SubFloat3 => self.binary_float3(&mut reader, |a, b| a - b),
                OpCode::MulFloat3 => self.binary_float3(&mut reader, Float3::mul_elem),
                OpCode::DivFloat3 => self.binary_float3(&mut reader, math::div_float3),
                OpCode::MulFloat3Float => self.float3_float(&mut reader, |a, b| a * b),
                OpCode::DivFloat3Float => self.float3_float(&mut reader, math::div_float3_float),
                OpCode::AverageFloat3 => self.binary_float3(&mut reader, math::average_float3),
                OpCode::CrossFloat3 => self.binary_float3(&mut reader, Float3::cross),
                OpCode::DotFloat3 => {
                    let a = reader.read_stack_index();
                    let b = reader.read_stack_index();
                    let r = reader.read_stack_index();
                    let v = self.stack.load_float3(a).dot(self.stack.load_float3(b));
                    self.stack.store_float(r, v);
                }
                OpCode::NormalizeFloat3 => {
                    let a = reader.read_stack_index();
                    let r_vector = reader.read_stack_index();
                    let r_length = reader.read_stack_index();
                    let (v, len) = self.stack.load_float3(a).normalize();
                    self.stack.store_float3(r_vector, v);
                    self.stack.store_float(r_length, len);
                }
                OpCode::LengthFloat3 => {
                    let a = reader.read_stack_index();
                    let r = reader.read_stack_index();
                    self.stack.store_float(r, self.stack.load_float3(a).length());
                }

                // ============================================================
                // Matrix math
                // ============================================================
                OpCode::AddMatrix44 => self.binary_matrix(&mut reader, |a, b| a.zip(b, |x, y| x + y)),
                OpCode::SubMatrix44 => self.binary_matrix(&mut reader, |a, b| a.zip(b, |x, y| x - y)),
                OpCode::MulMatrix44 => self.binary_matrix(&mut reader, |a, b| *a * *b),
                OpCode::MulMatrix44Float => self.matrix_float(&mut reader, |m, f| m.map(|v| v * f)),
                OpCode::DivMatrix44Float => self.matrix_float(&mut reader, math::div_matrix44_float),
                OpCode::NegateMatrix44 => self.unary_matrix(&mut reader, |m| m.map(|v| -v)),
                OpCode::TransposeMatrix44 => self.unary_matrix(&mut reader, Matrix44::transpose),
                OpCode::InvertMatrix44 => self.unary_matrix(&mut reader, math::invert_safe),
                OpCode::AdjointMatrix44 => self.unary_matrix(&mut reader, Matrix44::adjoint),
                OpCode::DeterminantMatrix44 => {
                    let a = reader.read_stack_index();
                    let r = reader.read_stack_index();
                    let v = self.stack.load_matrix44(a).determinant();
                    self.stack.store_float(r, v);
                }
                OpCode::MulMatrix44Float3 => {
                    let a = reader.read_stack_index();
                    let b = reader.read_stack_index();
                    let r = reader.read_stack_index();
                    let v = self
                        .stack
                        .load_matrix44(a)
                        .transform_point(self.stack.load_float3(b));
                    self.stack.store_float3(r, v);
                }
                OpCode::MulMatrix44Float4 => {
                    let a = reader.read_stack_index();
                    let b = reader.read_stack_index();
                    let r = reader.read_stack_index();
                    let v = self
                        .stack
                        .load_matrix44(a)
                        .transform_float4(self.stack.load_float4(b));
                    self.stack.store_float4(r, v);
                }
                OpCode::Matrix44ToLoc => self.matrix_to_float3(&mut reader, Matrix44::loc),
                OpCode::Matrix44ToScale => self.matrix_to_float3(&mut reader, Matrix44::scale),
                OpCode::Matrix44ToEuler => {
                    // Only XYZ order is supported; the order operand is ignored.
                    let _order = reader.read_int();
                    self.matrix_to_float3(&mut reader, Matrix44::to_euler);
                }
                OpCode::Matrix44ToAxisangle => {
                    let a = reader.read_stack_index();
                    let r_axis = reader.read_stack_index();
                    let r_angle = reader.read_stack_index();
                    let (axis, angle) = self.stack.load_matrix44(a).to_axis_angle();
                    self.stack.store_float3(r_axis, axis);
                    self.stack.store_float(r_angle, angle);
                }
                OpCode::LocToMatrix44 => self.float3_to_matrix(&mut reader, Matrix44::from_translation),
                OpCode::ScaleToMatrix44 => self.float3_to_matrix(&mut reader, Matrix44::from_scale),
                OpCode::EulerToMatrix44 => {
                    let _order = reader.read_int();
                    self.float3_to_matrix(&mut reader, Matrix44::from_euler);
                }
                OpCode::AxisangleToMatrix44 => {
                    let axis = reader.read_stack_index();
                    let angle = reader.read_stack_index();
                    let r = reader.read_stack_index();
                    let m = Matrix44::from_axis_angle(
                        self.stack.load_float3(axis),
                        self.stack.load_float(angle),
                    );
                    self.stack.store_matrix44(r, &m);
                }

                // ============================================================
                // Color
                // ============================================================
                OpCode::MixRgb => {
                    let mode = reader.read_int();
                    let fac = reader.read_stack_index();
                    let a = reader.read_stack_index();
                    let b = reader.read_stack_index();
                    let r = reader.read_stack_index();
                    let v = color::mix_rgb(
                        mode,
                        self.stack.load_float(fac),
                        self.stack.load_float4(a),
                        self.stack.load_float4(b),
                    );
                    self.stack.store_float4(r, v);
                }

                // ============================================================
                // Random
                // ============================================================
                OpCode::IntToRandom => {
                    let seed = reader.read_int();
                    let a = reader.read_stack_index();
                    let r_int = reader.read_stack_index();
                    let r_float = reader.read_stack_index();
                    let (i, f) = math::int_to_random(seed, self.stack.load_int(a));
                    self.stack.store_int(r_int, i);
                    self.stack.store_float(r_float, f);
                }
                OpCode::FloatToRandom => {
                    let seed = reader.read_int();
                    let a = reader.read_stack_index();
                    let r_int = reader.read_stack_index();
                    let r_float = reader.read_stack_index();
                    let (i, f) = math::float_to_random(seed, self.stack.load_float(a));
                    self.stack.store_int(r_int, i);
                    self.stack.store_float(r_float, f);
                }

                // ============================================================
                // Procedural textures
                // ============================================================
                OpCode::TexProcVoronoi => {
                    let distance_metric = reader.read_int();
                    let color_type = reader.read_int();
                    let minkowski = reader.read_stack_index();
                    let scale = reader.read_stack_index();
                    let noise_size = reader.read_stack_index();
                    let nabla = reader.read_stack_index();
                    let weights = [
                        reader.read_stack_index(),
                        reader.read_stack_index(),
                        reader.read_stack_index(),
                        reader.read_stack_index(),
                    ];
                    let pos = reader.read_stack_index();
                    let r_intensity = reader.read_stack_index();
                    let r_color = reader.read_stack_index();
                    let r_normal = reader.read_stack_index();
                    let params = texture::VoronoiParams {
                        distance_metric,
                        color_type,
                        minkowski_exponent: self.stack.load_float(minkowski),
                        scale: self.stack.load_float(scale),
                        noise_size: self.stack.load_float(noise_size),
                        nabla: self.stack.load_float(nabla),
                        weights: weights.map(|w| self.stack.load_float(w)),
                    };
                    let result = texture::voronoi_texture(&params, self.stack.load_float3(pos));
                    self.store_tex_result(&result, r_intensity, Some(r_color), r_normal);
                }
                OpCode::TexProcMagic => {
                    let pos = reader.read_stack_index();
                    let turbulence = reader.read_stack_index();
                    let depth = reader.read_int();
                    let r_intensity = reader.read_stack_index();
                    let r_color = reader.read_stack_index();
                    let r_normal = reader.read_stack_index();
                    let result = texture::magic_texture(
                        self.stack.load_float3(pos),
                        self.stack.load_float(turbulence),
                        depth,
                    );
                    self.store_tex_result(&result, r_intensity, Some(r_color), r_normal);
                }
                OpCode::TexProcMarble => {
                    let pos = reader.read_stack_index();
                    let size = reader.read_stack_index();
                    let nabla = reader.read_stack_index();
                    let turbulence = reader.read_stack_index();
                    let params = texture::MarbleParams {
                        size: self.stack.load_float(size),
                        nabla: self.stack.load_float(nabla),
                        turbulence: self.stack.load_float(turbulence),
                        depth: reader.read_int(),
                        noise_basis: reader.read_int(),
                        noise_basis_2: reader.read_int(),
                        noise_hard: reader.read_int() != 0,
                        marble_type: reader.read_int(),
                    };
                    let r_intensity = reader.read_stack_index();
                    let r_normal = reader.read_stack_index();
                    let result = texture::marble_texture(&params, self.stack.load_float3(pos));
                    self.store_tex_result(&result, r_intensity, None, r_normal);
                }
                OpCode::TexProcClouds => {
                    let pos = reader.read_stack_index();
                    let nabla = reader.read_stack_index();
                    let size = reader.read_stack_index();
                    let params = texture::CloudsParams {
                        nabla: self.stack.load_float(nabla),
                        size: self.stack.load_float(size),
                        depth: reader.read_int(),
                        noise_basis: reader.read_int(),
                        noise_hard: reader.read_int() != 0,
                    };
                    let r_intensity = reader.read_stack_index();
                    let r_color = reader.read_stack_index();
                    let r_normal = reader.read_stack_index();
                    let result = texture::clouds_texture(&params, self.stack.load_float3(pos));
                    self.store_tex_result(&result, r_intensity, Some(r_color), r_normal);
                }
                OpCode::TexProcWood => {
                    let pos = reader.read_stack_index();
                    let nabla = reader.read_stack_index();
                    let size = reader.read_stack_index();
                    let turbulence = reader.read_stack_index();
                    let params = texture::WoodParams {
                        nabla: self.stack.load_float(nabla),
                        size: self.stack.load_float(size),
                        turbulence: self.stack.load_float(turbulence),
                        noise_basis: reader.read_int(),
                        noise_basis_2: reader.read_int(),
                        noise_hard: reader.read_int() != 0,
                        wood_type: reader.read_int(),
                    };
                    let r_intensity = reader.read_stack_index();
                    let r_normal = reader.read_stack_index();
                    let result = texture::wood_texture(&params, self.stack.load_float3(pos));
                    self.store_tex_result(&result, r_intensity, None, r_normal);
                }
                OpCode::TexProcMusgrave => {
                    let pos = reader.read_stack_index();
                    let nabla = reader.read_stack_index();
                    let size = reader.read_stack_index();
                    let dimension = reader.read_stack_index();
                    let lacunarity = reader.read_stack_index();
                    let octaves = reader.read_stack_index();
                    let intensity = reader.read_stack_index();
                    let offset = reader.read_stack_index();
                    let gain = reader.read_stack_index();
                    let basis = reader.read_int();
                    let musgrave_type = reader.read_int();
                    let r_intensity = reader.read_stack_index();
                    let r_normal = reader.read_stack_index();
                    let params = texture::MusgraveParams {
                        nabla: self.stack.load_float(nabla),
                        size: self.stack.load_float(size),
                        fractal: Fractal {
                            dimension: self.stack.load_float(dimension),
                            lacunarity: self.stack.load_float(lacunarity),
                            octaves: self.stack.load_float(octaves),
                            offset: self.stack.load_float(offset),
                            gain: self.stack.load_float(gain),
                            basis,
                        },
                        intensity: self.stack.load_float(intensity),
                        musgrave_type,
                    };
                    let result = texture::musgrave_texture(&params, self.stack.load_float3(pos));
                    self.store_tex_result(&result, r_intensity, None, r_normal);
                }
                OpCode::TexProcStucci => {
                    let pos = reader.read_stack_index();
                    let size = reader.read_stack_index();
                    let turbulence = reader.read_stack_index();
                    let params = texture::StucciParams {
                        size: self.stack.load_float(size),
                        turbulence: self.stack.load_float(turbulence),
                        noise_basis: reader.read_int(),
                        noise_hard: reader.read_int() != 0,
                        stucci_type: reader.read_int(),
                    };
                    let r_intensity = reader.read_stack_index();
                    let r_normal = reader.read_stack_index();
                    let result = texture::stucci_texture(&params, self.stack.load_float3(pos));
                    self.store_tex_result(&result, r_intensity, None, r_normal);
                }
                OpCode::TexProcDistnoise => {
                    let pos = reader.read_stack_index();
                    let size = reader.read_stack_index();
                    let nabla = reader.read_stack_index();
                    let distortion = reader.read_stack_index();
                    let params = texture::DistNoiseParams {
                        size: self.stack.load_float(size),
                        nabla: self.stack.load_float(nabla),
                        distortion: self.stack.load_float(distortion),
                        noise_dist: reader.read_int(),
                        noise_basis: reader.read_int(),
                    };
                    let r_intensity = reader.read_stack_index();
                    let r_normal = reader.read_stack_index();
                    let result = texture::distnoise_texture(&params, self.stack.load_float3(pos));
                    self.store_tex_result(&result, r_intensity, None, r_normal);
                }

                // ============================================================
                // Objects
                // ============================================================
                OpCode::ObjectLookup => {
                    let key = reader.read_int();
                    let r = reader.read_stack_index();
                    self.stack.store_object(r, ObjectKey::new(key as u32));
                }
                OpCode::ObjectTransform => {
                    let obj = reader.read_stack_index();
                    let r = reader.read_stack_index();
                    let m = object::object_transform(self.globals, self.stack.load_object(obj));
                    self.stack.store_matrix44(r, &m);
                }
                OpCode::ObjectFinalMesh | OpCode::MeshLoad => {
                    let obj = reader.read_stack_index();
                    let r = reader.read_stack_index();
                    let mesh = object::object_mesh(self.globals, self.stack.load_object(obj));
                    self.set_mesh(r, mesh);
                }
                OpCode::EffectorTransform => {
                    let key = reader.read_int();
                    let r = reader.read_stack_index();
                    let m = object::object_transform(self.globals, ObjectKey::new(key as u32));
                    self.stack.store_matrix44(r, &m);
                }
                OpCode::EffectorClosestPoint => {
                    let obj = reader.read_stack_index();
                    let vector = reader.read_stack_index();
                    let r_pos = reader.read_stack_index();
                    let r_nor = reader.read_stack_index();
                    let r_tan = reader.read_stack_index();
                    let hit = object::effector_closest_point(
                        self.globals,
                        self.stack.load_object(obj),
                        self.stack.load_float3(vector),
                    );
                    self.stack.store_float3(r_pos, hit.position);
                    self.stack.store_float3(r_nor, hit.normal);
                    self.stack.store_float3(r_tan, hit.tangent);
                }

                // ============================================================
                // Meshes
                // ============================================================
                OpCode::MeshCombine => {
                    let a = reader.read_stack_index();
                    let b = reader.read_stack_index();
                    let r = reader.read_stack_index();
                    let result = mesh::combine(self.mesh(a), self.mesh(b));
                    self.set_mesh(r, result);
                }
                OpCode::MeshArray => {
                    let jump_mesh = reader.read_jump_address();
                    let mesh_in = reader.read_stack_index();
                    let jump_count = reader.read_jump_address();
                    let count = reader.read_stack_index();
                    let jump_transform = reader.read_jump_address();
                    let transform = reader.read_stack_index();
                    let r = reader.read_stack_index();
                    let index0 = reader.read_stack_index();

                    self.stack.store_int(index0, 0);
                    self.jump(jump_mesh);
                    self.jump(jump_count);
                    let chunk = self.mesh(mesh_in).clone();
                    let count = self.stack.load_int(count);

                    let mut result = Mesh::default();
                    for i in 0..count.max(0) {
                        self.stack.store_int(index0, i);
                        self.jump(jump_transform);
                        let m = self.stack.load_matrix44(transform);
                        mesh::append_array_copy(&mut result, &chunk, &m);
                    }
                    self.set_mesh(r, result);
                }
                OpCode::MeshDisplace => {
                    let jump_mesh = reader.read_jump_address();
                    let mesh_in = reader.read_stack_index();
                    let jump_vector = reader.read_jump_address();
                    let vector = reader.read_stack_index();
                    let r = reader.read_stack_index();
                    let index0 = reader.read_stack_index();

                    self.stack.store_int(index0, 0);
                    self.jump(jump_mesh);
                    let base = self.mesh(mesh_in).clone();
                    let result = mesh::displace(&base, |i, _| {
                        self.stack.store_int(index0, i as i32);
                        self.jump(jump_vector);
                        self.stack.load_float3(vector)
                    });
                    self.set_mesh(r, result);
                }
                OpCode::MeshBoolean => {
                    let mesh_in = reader.read_stack_index();
                    let obj = reader.read_stack_index();
                    let _transform = reader.read_stack_index();
                    let inverse = reader.read_stack_index();
                    let operation = reader.read_stack_index();
                    // Topology options: separate, dissolve, connect regions, threshold.
                    for _ in 0..4 {
                        reader.read_stack_index();
                    }
                    let r = reader.read_stack_index();

                    let inverse = self.stack.load_matrix44(inverse);
                    let other = self
                        .globals
                        .object(self.stack.load_object(obj))
                        .and_then(|o| o.mesh.as_ref().map(|m| m.transformed(&(inverse * o.transform))));
                    let result = mesh::boolean(
                        self.mesh(mesh_in),
                        other.as_ref(),
                        self.stack.load_int(operation),
                    );
                    self.set_mesh(r, result);
                }
                OpCode::MeshClosestPoint => {
                    let mesh_in = reader.read_stack_index();
                    let transform = reader.read_stack_index();
                    let inverse = reader.read_stack_index();
                    let vector = reader.read_stack_index();
                    let r_pos = reader.read_stack_index();
                    let r_nor = reader.read_stack_index();
                    let r_tan = reader.read_stack_index();
                    let hit = mesh::closest_point(
                        self.mesh(mesh_in),
                        &self.stack.load_matrix44(transform),
                        &self.stack.load_matrix44(inverse),
                        self.stack.load_float3(vector),
                    );
                    self.stack.store_float3(r_pos, hit.position);
                    self.stack.store_float3(r_nor, hit.normal);
                    self.stack.store_float3(r_tan, hit.tangent);
                }

                // ============================================================
                // Curves and images
                // ============================================================
                OpCode::CurvePath => {
                    let obj = reader.read_stack_index();
                    let transform = reader.read_stack_index();
                    let _inverse = reader.read_stack_index();
                    let parameter = reader.read_stack_index();
                    let r_location = reader.read_stack_index();
                    let r_direction = reader.read_stack_index();
                    let r_normal = reader.read_stack_index();
                    let r_rotation = reader.read_stack_index();
                    let r_radius = reader.read_stack_index();
                    let r_weight = reader.read_stack_index();
                    let r_tilt = reader.read_stack_index();
                    let sample = object::curve_path(
                        self.globals,
                        self.stack.load_object(obj),
                        &self.stack.load_matrix44(transform),
                        self.stack.load_float(parameter),
                    );
                    self.stack.store_float3(r_location, sample.location);
                    self.stack.store_float3(r_direction, sample.direction);
                    self.stack.store_float3(r_normal, sample.normal);
                    self.stack.store_matrix44(r_rotation, &sample.rotation);
                    self.stack.store_float(r_radius, sample.radius);
                    self.stack.store_float(r_weight, sample.weight);
                    self.stack.store_float(r_tilt, sample.tilt);
                }
                OpCode::ImageSample => {
                    let image = reader.read_stack_index();
                    let uv = reader.read_stack_index();
                    let r = reader.read_stack_index();
                    let color = object::image_sample(
                        self.globals,
                        self.stack.load_int(image),
                        self.stack.load_float3(uv),
                    );
                    self.stack.store_float4(r, color);
                }

                // ============================================================
                // Duplis
                // ============================================================
                OpCode::MakeDupli => {
                    let obj = reader.read_stack_index();
                    let transform = reader.read_stack_index();
                    let index = reader.read_stack_index();
                    let hide = reader.read_stack_index();
                    let recursive = reader.read_stack_index();
                    let r = reader.read_stack_index();
                    let duplis = object::make_dupli(
                        self.stack.load_object(obj),
                        self.stack.load_matrix44(transform),
                        self.stack.load_int(index),
                        self.stack.load_int(hide) != 0,
                        self.stack.load_int(recursive) != 0,
                    );
                    self.set_duplis(r, duplis);
                }
                OpCode::DuplisCombine => {
                    let a = reader.read_stack_index();
                    let b = reader.read_stack_index();
                    let r = reader.read_stack_index();
                    let result = object::duplis_combine(self.duplis(a), self.duplis(b));
                    self.set_duplis(r, result);
                }
            }
        }
    }
}
