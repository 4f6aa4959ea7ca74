//! Core runtime infrastructure.
//!
//! Fundamental types shared by every component:
//! - `Value` - tagged word: inline integer or heap handle
//! - `Heap` - slab of header+payload objects with mark & sweep
//! - `Env` - lexical/dynamic frame chains and the globals handle
//! - `Block` - captured anonymous callables

pub mod env;
pub mod heap;
pub mod value;

pub use env::{Block, Env, Globals};
pub use heap::{Heap, HeapObject, Method, ObjectId, ObjectKind};
pub use value::{FastHashMap, Value};
