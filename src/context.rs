//! Global context: node type registry, compiler settings and function cache.

use nodevm_compiler::{BvmCompiler, CompilerConfig, SharedFunction};
use nodevm_core::NodeVmError;
use nodevm_graph::{NodeGraph, NodeTypeRegistry};
use nodevm_vm::{EvalGlobals, EvalValue, Evaluator, FunctionCache};
use tracing::debug;

/// Result type for context operations.
pub type Result<T> = std::result::Result<T, NodeVmError>;

/// Owns everything shared between graphs: the node type registry, the
/// compiler configuration and a cache of compiled functions.
///
/// Dropping the context releases its cached functions. Functions handed out
/// earlier stay valid until their holders release them.
///
/// # Example
///
/// ```
/// use nodevm::{Context, EvalGlobals, EvalValue, TypeDesc};
///
/// let ctx = Context::with_builtin_types();
/// let mut graph = ctx.new_graph();
/// let add = graph.add_node("ADD_FLOAT", "add").unwrap();
/// graph.set_input_value(graph.input_socket(add, "value_a").unwrap(), 1.0f32).unwrap();
/// graph.set_input_value(graph.input_socket(add, "value_b").unwrap(), 2.0f32).unwrap();
/// let out = graph.add_output("result", TypeDesc::Float, 0.0f32).unwrap();
/// graph.link(graph.output_socket(add, "value").unwrap(), out).unwrap();
/// graph.finalize().unwrap();
///
/// let function = ctx.compile(&graph).unwrap();
/// let results = ctx.call(&function, &EvalGlobals::new(), &[]);
/// assert_eq!(results, vec![EvalValue::Float(3.0)]);
/// ```
#[derive(Debug)]
pub struct Context {
    registry: NodeTypeRegistry,
    config: CompilerConfig,
    evaluator: Evaluator,
    cache: FunctionCache<u64>,
}

impl Default for Context {
    fn default() -> Self {
        Self {
            registry: NodeTypeRegistry::new(),
            config: CompilerConfig::default(),
            evaluator: Evaluator::new(),
            cache: FunctionCache::new(),
        }
    }
}

impl Context {
    /// Context with an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Context with every built-in node type registered.
    pub fn with_builtin_types() -> Self {
        Self {
            registry: NodeTypeRegistry::with_builtin_types(),
            ..Self::default()
        }
    }

    pub fn with_config(mut self, config: CompilerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    pub fn registry(&self) -> &NodeTypeRegistry {
        &self.registry
    }

    /// Mutable registry, for registering custom node types before building
    /// graphs.
    pub fn registry_mut(&mut self) -> &mut NodeTypeRegistry {
        &mut self.registry
    }

    pub fn new_graph(&self) -> NodeGraph<'_> {
        NodeGraph::new(&self.registry)
    }

    /// Compile a finalized graph.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn compile(&self, graph: &NodeGraph<'_>) -> Result<SharedFunction> {
        let function = BvmCompiler::new(self.config).compile(graph)?;
        Ok(SharedFunction::new(function))
    }

    /// Compile a finalized graph, or reuse the function cached under `key`.
    ///
    /// [`NodeGraph::fingerprint`] makes a good key.
    pub fn compile_cached(&self, key: u64, graph: &NodeGraph<'_>) -> Result<SharedFunction> {
        self.cache.acquire_or_try_insert_with(key, || {
            debug!(key, "function cache miss");
            self.compile(graph)
        })
    }

    pub fn cache(&self) -> &FunctionCache<u64> {
        &self.cache
    }

    /// Evaluate a function. See [`Evaluator::eval`].
    pub fn eval(
        &self,
        function: &SharedFunction,
        globals: &EvalGlobals,
        arguments: &[EvalValue],
        results: &mut [EvalValue],
    ) {
        self.evaluator.eval(function, globals, arguments, results);
    }

    /// Evaluate a function and collect its results.
    pub fn call(
        &self,
        function: &SharedFunction,
        globals: &EvalGlobals,
        arguments: &[EvalValue],
    ) -> Vec<EvalValue> {
        self.evaluator.call(function, globals, arguments)
    }
}

#[cfg(test)]
mod tests {
    use nodevm_core::{CompileError, TypeDesc};

    use super::*;

    fn constant_graph(ctx: &Context, value: f32) -> NodeGraph<'_> {
        let mut graph = ctx.new_graph();
        graph.add_output("v", TypeDesc::Float, value).unwrap();
        graph.finalize().unwrap();
        graph
    }

    #[test]
    fn empty_registry() {
        let ctx = Context::new();
        assert!(ctx.registry().is_empty());
        let mut graph = ctx.new_graph();
        assert!(graph.add_node("ADD_FLOAT", "").is_err());
    }

    #[test]
    fn compile_cached_reuses_function() {
        let ctx = Context::with_builtin_types();
        let graph = constant_graph(&ctx, 2.5);
        let key = graph.fingerprint();

        let a = ctx.compile_cached(key, &graph).unwrap();
        let b = ctx.compile_cached(key, &graph).unwrap();
        assert!(a.ptr_eq(&b));
        assert_eq!(a.users(), 3);
        assert_eq!(ctx.cache().len(), 1);
        assert_eq!(ctx.call(&a, &EvalGlobals::new(), &[]), vec![EvalValue::Float(2.5)]);
    }

    #[test]
    fn compile_cached_from_many_threads() {
        let ctx = Context::with_builtin_types();
        let graph = constant_graph(&ctx, 1.5);
        let key = graph.fingerprint();

        let functions: Vec<SharedFunction> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| s.spawn(|| ctx.compile_cached(key, &graph).unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert_eq!(ctx.cache().len(), 1);
        assert!(functions.iter().all(|f| f.ptr_eq(&functions[0])));
        // One reference per thread plus the cache's.
        assert_eq!(functions[0].users(), 9);
    }

    #[test]
    fn compile_errors_convert() {
        let ctx = Context::with_builtin_types();
        let mut graph = ctx.new_graph();
        graph.add_output("v", TypeDesc::Float, 0.0f32).unwrap();
        let err = ctx.compile(&graph).unwrap_err();
        assert!(err.is_compile());
        assert_eq!(err, NodeVmError::Compile(CompileError::NotFinalized));
    }
}
