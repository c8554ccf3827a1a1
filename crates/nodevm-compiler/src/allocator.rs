//! Value stack slot allocation.

use nodevm_core::CompileError;
use tracing::error;

/// First-fit allocator over a table of stack words.
#[derive(Debug, Clone)]
pub struct StackAllocator {
    used: Vec<bool>,
}

impl StackAllocator {
    pub fn new(capacity: usize) -> Self {
        Self {
            used: vec![false; capacity],
        }
    }

    pub fn capacity(&self) -> usize {
        self.used.len()
    }

    /// Reserve `size` contiguous words and return the first index.
    pub fn allocate(&mut self, size: usize) -> Result<u32, CompileError> {
        let capacity = self.used.len();
        let mut start = 0;
        while start + size <= capacity {
            match self.used[start..start + size].iter().rposition(|&u| u) {
                Some(taken) => start += taken + 1,
                None => {
                    self.used[start..start + size].fill(true);
                    return Ok(start as u32);
                }
            }
        }
        error!(requested = size, capacity, "value stack exhausted");
        Err(CompileError::StackExhausted {
            requested: size,
            capacity,
        })
    }

    /// Return words to the free table.
    pub fn release(&mut self, start: u32, size: usize) {
        let start = start as usize;
        if let Some(words) = self.used.get_mut(start..start + size) {
            words.fill(false);
        }
    }

    /// Number of words currently reserved.
    pub fn in_use(&self) -> usize {
        self.used.iter().filter(|&&u| u).count()
    }
}
