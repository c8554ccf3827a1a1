//! Compiler configuration.

use nodevm_core::STACK_SIZE;

/// Settings for [`BvmCompiler`](crate::BvmCompiler).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompilerConfig {
    /// Words of value stack available to the compiled function. Clamped to
    /// the evaluator's capacity.
    pub stack_size: usize,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            stack_size: STACK_SIZE,
        }
    }
}

impl CompilerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stack_size(mut self, stack_size: usize) -> Self {
        self.stack_size = stack_size;
        self
    }

    /// Stack size actually used for allocation.
    pub fn effective_stack_size(&self) -> usize {
        self.stack_size.min(STACK_SIZE)
    }
}
