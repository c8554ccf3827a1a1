//! Opcode kernel bodies.
//!
//! The evaluator decodes operands and owns the value stack; the functions in
//! these modules only compute. Each opcode maps to one function here (or to
//! an inline expression in the dispatch loop for the trivial ones):
//!
//! | Opcodes | Module |
//! |---------|--------|
//! | float, vector and matrix math, `RANGE_INT`, random | [`math`] |
//! | `MIX_RGB` | [`color`] |
//! | `TEX_PROC_*` | [`texture`] (built on [`noise`]) |
//! | `MESH_*` | [`mesh`] |
//! | `OBJECT_*`, `EFFECTOR_*`, `CURVE_PATH`, `IMAGE_SAMPLE`, duplis | [`object`] |

pub mod color;
pub mod math;
pub mod mesh;
pub mod noise;
pub mod object;
pub mod texture;
