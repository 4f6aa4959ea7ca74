//! The runtime context.
//!
//! All process-wide state (the heap, globals, interned symbols, the core
//! class graph, at-exit handlers) hangs off one `Runtime` passed by `&mut`
//! into every operation. There is no ambient module state and no locking;
//! the runtime is single-threaded by construction.

use std::cell::RefCell;
use std::rc::Rc;

use crate::core::env::Globals;
use crate::core::heap::{Heap, HeapObject, ObjectId, ObjectKind};
use crate::core::value::{fast_map_new, FastHashMap, Value};
use crate::core::{Block, Env};

mod args;
mod block;
mod class;
mod coerce;
mod dispatch;
mod exception;
mod gc;
mod object;
mod regexp;
mod resolve;

pub use args::ArgSlot;
pub use exception::AT_EXIT_HANDLERS_GLOBAL;

/// Non-local control carried through `Result`: a raised exception unwinding
/// toward a rescue frame, or a block `break` unwinding toward the call that
/// ran the block.
#[derive(Debug, Clone, Copy)]
pub enum Raised {
    Exception(Value),
    Break(Value),
}

pub type RtResult<T> = Result<T, Raised>;

/// Native shape of every method and block body: runtime, call env, `self`,
/// positional arguments, and the out-of-band block, producing a value or
/// unwinding.
pub type MethodFn =
    fn(&mut Runtime, &Env, Value, &[Value], Option<&Rc<Block>>) -> RtResult<Value>;

/// Body shape for `call_begin` and class/module body evaluation.
pub type BeginFn = fn(&mut Runtime, &Env, Value) -> RtResult<Value>;

#[derive(Clone, Copy, Debug)]
pub struct RuntimeConfig {
    /// Allocation count that arms `Heap::should_gc`.
    pub gc_object_threshold: usize,
    /// Allocated-byte estimate that arms `Heap::should_gc`.
    pub gc_byte_threshold: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            gc_object_threshold: 100_000,
            gc_byte_threshold: 32 * 1024 * 1024,
        }
    }
}

/// Handles to the objects every program starts from.
pub struct CoreObjects {
    pub nil_obj: Value,
    pub true_obj: Value,
    pub false_obj: Value,
    pub main_obj: Value,
    pub object_class: ObjectId,
    pub module_class: ObjectId,
    pub class_class: ObjectId,
    pub nil_class: ObjectId,
    pub true_class: ObjectId,
    pub false_class: ObjectId,
    pub integer_class: ObjectId,
    pub symbol_class: ObjectId,
    pub string_class: ObjectId,
    pub array_class: ObjectId,
    pub hash_class: ObjectId,
    pub range_class: ObjectId,
    pub regexp_class: ObjectId,
    pub match_data_class: ObjectId,
    pub proc_class: ObjectId,
    pub io_class: ObjectId,
    pub exception_class: ObjectId,
}

pub struct Runtime {
    pub heap: Heap,
    pub(crate) globals: Globals,
    pub(crate) symbols: FastHashMap<String, Value>,
    pub core: CoreObjects,
    root_env: Env,
    pub(crate) temp_roots: Vec<Value>,
    #[allow(dead_code)]
    config: RuntimeConfig,
}

impl Runtime {
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        let mut heap = Heap::new();
        heap.gc_threshold = config.gc_object_threshold;
        heap.gc_threshold_bytes = config.gc_byte_threshold;

        let globals: Globals = Rc::new(RefCell::new(fast_map_new()));
        let root_env = Env::root(globals.clone(), "(root)");

        let core = bootstrap(&mut heap, &root_env);
        let mut rt = Self {
            heap,
            globals,
            symbols: fast_map_new(),
            core,
            root_env,
            temp_roots: Vec::new(),
            config,
        };
        rt.install_core_constants();
        rt.install_core_globals();
        rt
    }

    /// The bootstrap frame; embedders derive their top-level env from it.
    pub fn root_env(&self) -> &Env {
        &self.root_env
    }

    pub fn nil(&self) -> Value {
        self.core.nil_obj
    }

    pub fn bool_value(&self, b: bool) -> Value {
        if b {
            self.core.true_obj
        } else {
            self.core.false_obj
        }
    }

    pub fn main_object(&self) -> Value {
        self.core.main_obj
    }

    /// Intern a symbol; equal text always yields the identical handle.
    pub fn intern(&mut self, name: &str) -> Value {
        if let Some(v) = self.symbols.get(name) {
            return *v;
        }
        let id = self.heap.alloc(HeapObject::new(
            self.core.symbol_class,
            ObjectKind::Symbol(name.to_string()),
        ));
        let v = Value::object(id);
        self.symbols.insert(name.to_string(), v);
        v
    }

    /// Pin a value against collection while native code holds it outside
    /// any environment. Pop in reverse order of pushes.
    pub fn push_temp_root(&mut self, v: Value) {
        self.temp_roots.push(v);
    }

    pub fn pop_temp_root(&mut self) {
        self.temp_roots.pop();
    }

    fn install_core_constants(&mut self) {
        let pairs: &[(&str, ObjectId)] = &[
            ("Object", self.core.object_class),
            ("Module", self.core.module_class),
            ("Class", self.core.class_class),
            ("NilClass", self.core.nil_class),
            ("TrueClass", self.core.true_class),
            ("FalseClass", self.core.false_class),
            ("Integer", self.core.integer_class),
            ("Symbol", self.core.symbol_class),
            ("String", self.core.string_class),
            ("Array", self.core.array_class),
            ("Hash", self.core.hash_class),
            ("Range", self.core.range_class),
            ("Regexp", self.core.regexp_class),
            ("MatchData", self.core.match_data_class),
            ("Proc", self.core.proc_class),
            ("IO", self.core.io_class),
            ("Exception", self.core.exception_class),
        ];
        for (name, id) in pairs {
            self.const_set_on(self.core.object_class, name, Value::object(*id));
        }

        // Exception hierarchy.
        let exception = self.core.exception_class;
        let script_error = self.define_core_class("ScriptError", exception);
        self.define_core_class("SyntaxError", script_error);
        let standard_error = self.define_core_class("StandardError", exception);
        let name_error = self.define_core_class("NameError", standard_error);
        self.define_core_class("NoMethodError", name_error);
        self.define_core_class("ArgumentError", standard_error);
        self.define_core_class("TypeError", standard_error);
        self.define_core_class("LocalJumpError", standard_error);
        self.define_core_class("IOError", standard_error);
        self.define_core_class("SystemExit", exception);
    }

    fn install_core_globals(&mut self) {
        let stderr = self.io_new(2);
        self.globals.borrow_mut().insert("$stderr".to_string(), stderr);
    }

    fn define_core_class(&mut self, name: &str, superclass: ObjectId) -> ObjectId {
        let env = self.root_env.capture();
        let id = self.heap.alloc(HeapObject::new(
            self.core.class_class,
            ObjectKind::Class(Box::new(crate::core::heap::ModuleObject::new(
                name,
                Some(superclass),
                env,
            ))),
        ));
        self.const_set_on(self.core.object_class, name, Value::object(id));
        id
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the self-referential root of the class graph: `Object` has no
/// superclass, `Class` is an instance of itself, and everything else is an
/// instance of `Class`.
fn bootstrap(heap: &mut Heap, root_env: &Env) -> CoreObjects {
    use crate::core::heap::ModuleObject;

    let placeholder = ObjectId(0);
    let class_kind = |name: &str, superclass: Option<ObjectId>| {
        ObjectKind::Class(Box::new(ModuleObject::new(name, superclass, root_env.capture())))
    };

    let object_class = heap.alloc(HeapObject::new(placeholder, class_kind("Object", None)));
    let module_class =
        heap.alloc(HeapObject::new(placeholder, class_kind("Module", Some(object_class))));
    let class_class =
        heap.alloc(HeapObject::new(placeholder, class_kind("Class", Some(module_class))));
    for id in [object_class, module_class, class_class] {
        heap.get_mut(id).class = class_class;
    }

    let mut core_class = |name: &str| {
        heap.alloc(HeapObject::new(class_class, class_kind(name, Some(object_class))))
    };
    let nil_class = core_class("NilClass");
    let true_class = core_class("TrueClass");
    let false_class = core_class("FalseClass");
    let integer_class = core_class("Integer");
    let symbol_class = core_class("Symbol");
    let string_class = core_class("String");
    let array_class = core_class("Array");
    let hash_class = core_class("Hash");
    let range_class = core_class("Range");
    let regexp_class = core_class("Regexp");
    let match_data_class = core_class("MatchData");
    let proc_class = core_class("Proc");
    let io_class = core_class("IO");
    let exception_class = core_class("Exception");

    let nil_obj = Value::object(heap.alloc(HeapObject::new(nil_class, ObjectKind::Nil)));
    let true_obj = Value::object(heap.alloc(HeapObject::new(true_class, ObjectKind::True)));
    let false_obj = Value::object(heap.alloc(HeapObject::new(false_class, ObjectKind::False)));
    let main_obj = Value::object(heap.alloc(HeapObject::new(object_class, ObjectKind::Object)));

    CoreObjects {
        nil_obj,
        true_obj,
        false_obj,
        main_obj,
        object_class,
        module_class,
        class_class,
        nil_class,
        true_class,
        false_class,
        integer_class,
        symbol_class,
        string_class,
        array_class,
        hash_class,
        range_class,
        regexp_class,
        match_data_class,
        proc_class,
        io_class,
        exception_class,
    }
}
