//! Identifier types for graph entities and host data.
//!
//! Node instances and blocks live in index arenas inside a graph, so their
//! identifiers are plain indices. Host keys name entries of the read-only
//! lookup tables supplied at evaluation time.

use std::fmt;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u32);

        impl $name {
            /// Create a new id with the given index.
            #[inline]
            pub const fn new(index: u32) -> Self {
                Self(index)
            }

            /// Get the underlying index.
            #[inline]
            pub const fn index(self) -> u32 {
                self.0
            }

            /// Get the underlying index as `usize`, for arena access.
            #[inline]
            pub const fn as_usize(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "_{}"), self.0)
            }
        }

        impl From<u32> for $name {
            fn from(index: u32) -> Self {
                Self::new(index)
            }
        }

        impl From<$name> for u32 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id!(
    /// Identifies a node instance inside a `NodeGraph`.
    ///
    /// Ids stay stable when nodes are removed: removed instances leave a
    /// tombstone in the arena.
    ///
    /// # Example
    ///
    /// ```
    /// use nodevm_core::NodeId;
    ///
    /// let node = NodeId::new(3);
    /// assert_eq!(node.index(), 3);
    /// assert_eq!(node.to_string(), "node_3");
    /// ```
    NodeId,
    "node"
);

define_id!(
    /// Identifies a lexical block of a finalized graph.
    ///
    /// Block 0 is always the `main` block.
    BlockId,
    "block"
);

define_id!(
    /// Key of a host object in the evaluation globals.
    ObjectKey,
    "object"
);

define_id!(
    /// Key of a host image in the evaluation globals.
    ImageKey,
    "image"
);

impl BlockId {
    /// The root block every finalized graph has.
    pub const MAIN: BlockId = BlockId::new(0);
}

impl ObjectKey {
    /// Key that never resolves to a host object.
    pub const NONE: ObjectKey = ObjectKey::new(u32::MAX);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_id_creation() {
        let node = NodeId::new(42);
        assert_eq!(node.index(), 42);
        assert_eq!(node.as_usize(), 42);
    }

    #[test]
    fn id_display() {
        assert_eq!(format!("{}", NodeId::new(5)), "node_5");
        assert_eq!(format!("{}", BlockId::new(2)), "block_2");
        assert_eq!(format!("{}", ObjectKey::new(7)), "object_7");
        assert_eq!(format!("{}", ImageKey::new(1)), "image_1");
    }

    #[test]
    fn id_equality_and_order() {
        let a = NodeId::new(1);
        let b = NodeId::new(1);
        let c = NodeId::new(2);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a < c);
    }

    #[test]
    fn id_conversions() {
        let block: BlockId = 10.into();
        assert_eq!(block.index(), 10);
        let raw: u32 = ObjectKey::new(20).into();
        assert_eq!(raw, 20);
    }

    #[test]
    fn none_object_key() {
        assert_eq!(ObjectKey::NONE.index(), u32::MAX);
    }

    #[test]
    fn main_block_is_zero() {
        assert_eq!(BlockId::MAIN.index(), 0);
    }
}
