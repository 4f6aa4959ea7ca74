//! Object model and method-dispatch core of the Quartz runtime.
//!
//! A compiled Quartz program represents source as functions over this
//! crate's primitives: it constructs values against a [`Runtime`], defines
//! methods on classes and modules, and dispatches calls through
//! [`Runtime::send`]. Resolution walks inheritance and module-inclusion
//! chains (singleton classes first, undefined markers stop the walk),
//! arguments bind through the path-descriptor binder, and exceptions
//! unwind along the dynamic caller chain as [`Raised`] values.

pub mod core;
pub mod errors;
mod runtime;

pub use self::core::env::{Block, Env, Globals};
pub use self::core::heap::{Heap, HeapObject, Method, ObjectId, ObjectKind};
pub use self::core::value::{
    fast_map_new, int_to_hex_string, int_to_string, object_pointer_id, FastHashMap, Value,
    INT_BUF_LEN,
};

pub use runtime::{
    ArgSlot, BeginFn, CoreObjects, MethodFn, Raised, RtResult, Runtime, RuntimeConfig,
    AT_EXIT_HANDLERS_GLOBAL,
};
