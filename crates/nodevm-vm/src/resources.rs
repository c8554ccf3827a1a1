//! Reference-counted resource storage.
//!
//! Meshes and dupli lists do not fit in stack words. The stack holds a
//! handle into a [`ResourceArena`] instead, and the compiler brackets every
//! resource value with `INIT_*_PTR(slot, n)` and `n` matching
//! `RELEASE_*_PTR(slot)` instructions.
//!
//! A handle word packs a slot index (low 20 bits) and a generation (high 12
//! bits). Generation 0 is never issued, so a zeroed stack word and the
//! invalid sentinel never resolve.

use nodevm_core::Word;

const INDEX_BITS: u32 = 20;
const INDEX_MASK: Word = (1 << INDEX_BITS) - 1;
const GENERATION_MAX: Word = (1 << (32 - INDEX_BITS)) - 2;

#[derive(Debug)]
struct Slot<T> {
    generation: Word,
    refs: u32,
    value: Option<T>,
}

/// Generational arena of reference-counted values, owned by one evaluation.
#[derive(Debug)]
pub struct ResourceArena<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
}

impl<T> Default for ResourceArena<T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }
}

impl<T> ResourceArena<T> {
    pub fn new() -> Self {
        Self::default()
    }

    fn pack(index: u32, generation: Word) -> Word {
        index | (generation << INDEX_BITS)
    }

    fn slot(&self, handle: Word) -> Option<&Slot<T>> {
        let slot = self.slots.get((handle & INDEX_MASK) as usize)?;
        (slot.refs > 0 && slot.generation == handle >> INDEX_BITS).then_some(slot)
    }

    fn slot_mut(&mut self, handle: Word) -> Option<&mut Slot<T>> {
        let slot = self.slots.get_mut((handle & INDEX_MASK) as usize)?;
        (slot.refs > 0 && slot.generation == handle >> INDEX_BITS).then_some(slot)
    }

    /// Create an empty entry referenced `count` times.
    pub fn init(&mut self, count: u32) -> Word {
        let refs = count.max(1);
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.refs = refs;
                slot.value = None;
                Self::pack(index, slot.generation)
            }
            None => {
                let index = self.slots.len() as u32;
                debug_assert!(index <= INDEX_MASK, "resource arena full");
                self.slots.push(Slot {
                    generation: 1,
                    refs,
                    value: None,
                });
                Self::pack(index, 1)
            }
        }
    }

    /// Create an entry holding `value`, referenced `count` times.
    pub fn insert(&mut self, value: T, count: u32) -> Word {
        let handle = self.init(count);
        self.set(handle, value);
        handle
    }

    /// Store the payload of a live entry. Stale handles are ignored.
    pub fn set(&mut self, handle: Word, value: T) {
        if let Some(slot) = self.slot_mut(handle) {
            slot.value = Some(value);
        }
    }

    /// Payload of a live entry; `None` for empty entries and stale handles.
    pub fn get(&self, handle: Word) -> Option<&T> {
        self.slot(handle)?.value.as_ref()
    }

    /// Drop one reference. Returns `true` if it was the last and the payload
    /// was freed.
    pub fn release(&mut self, handle: Word) -> bool {
        let index = handle & INDEX_MASK;
        let Some(slot) = self.slot_mut(handle) else {
            return false;
        };
        slot.refs -= 1;
        if slot.refs > 0 {
            return false;
        }
        slot.value = None;
        slot.generation = if slot.generation >= GENERATION_MAX {
            1
        } else {
            slot.generation + 1
        };
        self.free.push(index);
        true
    }

    pub fn ref_count(&self, handle: Word) -> u32 {
        self.slot(handle).map_or(0, |slot| slot.refs)
    }

    /// Number of live entries.
    pub fn live(&self) -> usize {
        self.slots.iter().filter(|slot| slot.refs > 0).count()
    }
}

#[cfg(test)]
mod tests {
    use nodevm_core::STACK_INVALID;

    use super::*;

    #[test]
    fn init_set_release() {
        let mut arena = ResourceArena::new();
        let handle = arena.init(2);
        assert_eq!(arena.get(handle), None);
        arena.set(handle, "mesh");
        assert_eq!(arena.get(handle), Some(&"mesh"));
        assert_eq!(arena.ref_count(handle), 2);

        assert!(!arena.release(handle));
        assert_eq!(arena.get(handle), Some(&"mesh"));
        assert!(arena.release(handle));
        assert_eq!(arena.get(handle), None);
        assert_eq!(arena.live(), 0);
    }

    #[test]
    fn stale_handles_do_not_resolve() {
        let mut arena = ResourceArena::new();
        let old = arena.insert(1, 1);
        assert!(arena.release(old));
        let new = arena.insert(2, 1);
        // Same slot, new generation.
        assert_eq!(old & INDEX_MASK, new & INDEX_MASK);
        assert_ne!(old, new);
        assert_eq!(arena.get(old), None);
        assert!(!arena.release(old));
        assert_eq!(arena.get(new), Some(&2));
    }

    #[test]
    fn invalid_words_read_as_empty() {
        let mut arena: ResourceArena<i32> = ResourceArena::new();
        arena.insert(5, 1);
        assert_eq!(arena.get(0), None);
        assert_eq!(arena.get(STACK_INVALID), None);
        assert_eq!(arena.ref_count(0), 0);
    }

    #[test]
    fn zero_count_keeps_one_reference() {
        let mut arena = ResourceArena::new();
        let handle = arena.insert('x', 0);
        assert_eq!(arena.ref_count(handle), 1);
        assert!(arena.release(handle));
    }
}
