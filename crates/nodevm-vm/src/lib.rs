//! Stack evaluator for compiled node functions.
//!
//! ## Modules
//!
//! - [`eval`]: The dispatch loop and argument/result marshalling
//! - [`kernels`]: Opcode bodies (math, color, textures, meshes, objects)
//! - [`globals`]: Host objects, images and the resource payload types
//! - [`cache`]: Keyed cache of shared functions
//!
//! The value stack and the resource arena are per-call storage; they are
//! public for hosts that want to drive the kernels directly.

pub mod cache;
pub mod eval;
pub mod globals;
pub mod kernels;
mod resources;
mod stack;

pub use cache::FunctionCache;
pub use eval::{EvalValue, Evaluator};
pub use globals::{Dupli, DupliList, EvalGlobals, HostObject, Image, Mesh};
pub use resources::ResourceArena;
pub use stack::ValueStack;
