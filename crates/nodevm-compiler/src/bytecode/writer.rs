//! Bytecode writer.

use nodevm_core::{Float3, Float4, Matrix44, ObjectKey, OpCode, Word};

/// Appends instruction words.
#[derive(Debug, Clone, Default)]
pub struct BytecodeWriter {
    code: Vec<Word>,
}

impl BytecodeWriter {
    /// Create a new empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Address the next word will be written at.
    pub fn current_address(&self) -> usize {
        self.code.len()
    }

    pub fn write_opcode(&mut self, op: OpCode) {
        self.code.push(op.into());
    }

    pub fn write_stack_index(&mut self, index: Word) {
        self.code.push(index);
    }

    pub fn write_jump_address(&mut self, address: Word) {
        self.code.push(address);
    }

    pub fn write_float(&mut self, value: f32) {
        self.code.push(value.to_bits());
    }

    pub fn write_float3(&mut self, value: Float3) {
        for v in value.to_array() {
            self.write_float(v);
        }
    }

    pub fn write_float4(&mut self, value: Float4) {
        for v in value.to_array() {
            self.write_float(v);
        }
    }

    pub fn write_int(&mut self, value: i32) {
        self.code.push(value as Word);
    }

    /// Write a matrix column by column.
    pub fn write_matrix44(&mut self, value: &Matrix44) {
        for col in &value.data {
            for &v in col {
                self.write_float(v);
            }
        }
    }

    /// Write a zero-terminated string, four bytes per word.
    ///
    /// A string whose length is a multiple of four is followed by an all-zero
    /// word. Anything from the first NUL byte on is dropped.
    pub fn write_string(&mut self, value: &str) {
        let bytes = value.as_bytes();
        let bytes = &bytes[..bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len())];
        for chunk in bytes.chunks(4) {
            let mut word = [0u8; 4];
            word[..chunk.len()].copy_from_slice(chunk);
            self.code.push(Word::from_le_bytes(word));
        }
        if bytes.len() % 4 == 0 {
            self.code.push(0);
        }
    }

    pub fn write_object(&mut self, key: ObjectKey) {
        self.code.push(key.index());
    }

    pub fn code(&self) -> &[Word] {
        &self.code
    }

    pub fn into_code(self) -> Vec<Word> {
        self.code
    }
}
