//! Per-call value stack.

use nodevm_core::{Float3, Float4, Matrix44, ObjectKey, STACK_SIZE, Word};

/// Fixed-capacity word array addressed by the stack indices baked into the
/// bytecode.
///
/// Values are stored by bit pattern: floats via `to_bits`, ints reinterpreted
/// as `u32`, vectors and matrices as consecutive words. Indices come from the
/// compiler and are not checked beyond the slice bounds.
pub struct ValueStack {
    words: Box<[Word]>,
}

impl Default for ValueStack {
    fn default() -> Self {
        Self {
            words: vec![0; STACK_SIZE].into_boxed_slice(),
        }
    }
}

impl ValueStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn capacity(&self) -> usize {
        self.words.len()
    }

    #[inline]
    pub fn load_word(&self, index: Word) -> Word {
        self.words[index as usize]
    }

    #[inline]
    pub fn store_word(&mut self, index: Word, word: Word) {
        self.words[index as usize] = word;
    }

    pub fn load_words(&self, index: Word, len: usize) -> &[Word] {
        let start = index as usize;
        &self.words[start..start + len]
    }

    pub fn store_words(&mut self, index: Word, words: &[Word]) {
        let start = index as usize;
        self.words[start..start + words.len()].copy_from_slice(words);
    }

    #[inline]
    pub fn load_float(&self, index: Word) -> f32 {
        f32::from_bits(self.load_word(index))
    }

    #[inline]
    pub fn store_float(&mut self, index: Word, value: f32) {
        self.store_word(index, value.to_bits());
    }

    #[inline]
    pub fn load_int(&self, index: Word) -> i32 {
        self.load_word(index) as i32
    }

    #[inline]
    pub fn store_int(&mut self, index: Word, value: i32) {
        self.store_word(index, value as Word);
    }

    pub fn load_float3(&self, index: Word) -> Float3 {
        Float3::new(
            self.load_float(index),
            self.load_float(index + 1),
            self.load_float(index + 2),
        )
    }

    pub fn store_float3(&mut self, index: Word, value: Float3) {
        self.store_float(index, value.x);
        self.store_float(index + 1, value.y);
        self.store_float(index + 2, value.z);
    }

    pub fn load_float4(&self, index: Word) -> Float4 {
        Float4::new(
            self.load_float(index),
            self.load_float(index + 1),
            self.load_float(index + 2),
            self.load_float(index + 3),
        )
    }

    pub fn store_float4(&mut self, index: Word, value: Float4) {
        for (i, v) in value.to_array().into_iter().enumerate() {
            self.store_float(index + i as Word, v);
        }
    }

    pub fn load_matrix44(&self, index: Word) -> Matrix44 {
        let mut data = [[0.0; 4]; 4];
        let mut word = index;
        for col in &mut data {
            for v in col.iter_mut() {
                *v = self.load_float(word);
                word += 1;
            }
        }
        Matrix44::from_cols(data)
    }

    pub fn store_matrix44(&mut self, index: Word, value: &Matrix44) {
        let mut word = index;
        for col in &value.data {
            for &v in col {
                self.store_float(word, v);
                word += 1;
            }
        }
    }

    #[inline]
    pub fn load_object(&self, index: Word) -> ObjectKey {
        ObjectKey::new(self.load_word(index))
    }

    #[inline]
    pub fn store_object(&mut self, index: Word, key: ObjectKey) {
        self.store_word(index, key.index());
    }
}
