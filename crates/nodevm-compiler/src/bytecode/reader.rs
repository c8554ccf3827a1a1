//! Instruction cursor.

use nodevm_core::{Float3, Float4, Matrix44, ObjectKey, OpCode, Operand, Word};

/// Reads instruction words, advancing by operand size.
///
/// The evaluator and the disassembler both decode through this type.
#[derive(Debug, Clone)]
pub struct InstructionReader<'a> {
    code: &'a [Word],
    pc: usize,
}

impl<'a> InstructionReader<'a> {
    /// Create a reader at the start of `code`.
    pub fn new(code: &'a [Word]) -> Self {
        Self::at(code, 0)
    }

    /// Create a reader at `pc`.
    pub fn at(code: &'a [Word], pc: usize) -> Self {
        Self { code, pc }
    }

    /// Address of the next word.
    #[inline]
    pub fn pc(&self) -> usize {
        self.pc
    }

    #[inline]
    pub fn is_at_end(&self) -> bool {
        self.pc >= self.code.len()
    }

    #[inline]
    fn read_word(&mut self) -> Word {
        let word = self.code[self.pc];
        self.pc += 1;
        word
    }

    /// Read an opcode.
    ///
    /// # Panics
    ///
    /// Panics on a word that is not an opcode; the code is corrupt.
    #[inline]
    pub fn read_opcode(&mut self) -> OpCode {
        let pc = self.pc;
        let word = self.read_word();
        match OpCode::from_u32(word) {
            Some(op) => op,
            None => panic!("unknown opcode {word} at address {pc}"),
        }
    }

    #[inline]
    pub fn read_stack_index(&mut self) -> Word {
        self.read_word()
    }

    #[inline]
    pub fn read_jump_address(&mut self) -> Word {
        self.read_word()
    }

    #[inline]
    pub fn read_float(&mut self) -> f32 {
        f32::from_bits(self.read_word())
    }

    pub fn read_float3(&mut self) -> Float3 {
        Float3::new(self.read_float(), self.read_float(), self.read_float())
    }

    pub fn read_float4(&mut self) -> Float4 {
        Float4::new(
            self.read_float(),
            self.read_float(),
            self.read_float(),
            self.read_float(),
        )
    }

    #[inline]
    pub fn read_int(&mut self) -> i32 {
        self.read_word() as i32
    }

    pub fn read_matrix44(&mut self) -> Matrix44 {
        let mut data = [[0.0; 4]; 4];
        for col in &mut data {
            for v in col.iter_mut() {
                *v = self.read_float();
            }
        }
        Matrix44::from_cols(data)
    }

    /// Read a packed zero-terminated string.
    pub fn read_string(&mut self) -> String {
        let mut bytes = Vec::new();
        loop {
            let word = self.read_word().to_le_bytes();
            match word.iter().position(|&b| b == 0) {
                Some(end) => {
                    bytes.extend_from_slice(&word[..end]);
                    break;
                }
                None => bytes.extend_from_slice(&word),
            }
        }
        String::from_utf8_lossy(&bytes).into_owned()
    }

    pub fn read_object(&mut self) -> ObjectKey {
        ObjectKey::new(self.read_word())
    }

    /// Advance past one operand without decoding it.
    pub fn skip_operand(&mut self, operand: Operand) {
        match operand.word_count() {
            Some(words) => self.pc += words,
            None => {
                self.read_string();
            }
        }
    }
}
