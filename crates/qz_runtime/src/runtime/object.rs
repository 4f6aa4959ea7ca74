//! Value-model operations: predicates, class-of, instance variables,
//! singleton classes, truthiness, and construction helpers.

use std::rc::Rc;

use crate::core::heap::{
    ExceptionObject, HashKey, HashObject, HeapObject, IoObject, ModuleObject, ObjectId,
    ObjectKind, ProcObject, RangeObject,
};
use crate::core::{Block, Value};

use super::Runtime;

impl Runtime {
    /// Class of any value. Integers report the Integer class; everything
    /// else carries its class in the object header.
    pub fn class_of(&self, v: Value) -> ObjectId {
        if v.is_integer() {
            self.core.integer_class
        } else {
            self.heap.get(v.as_object_id()).class
        }
    }

    pub fn class_name_of(&self, v: Value) -> String {
        self.module_name(self.class_of(v))
    }

    pub fn module_name(&self, id: ObjectId) -> String {
        match &self.heap.get(id).kind {
            ObjectKind::Class(m) | ObjectKind::Module(m) => m.name.clone(),
            other => panic!("expected a class or module, found {}", other.name()),
        }
    }

    pub(crate) fn module_ref(&self, id: ObjectId) -> &ModuleObject {
        match &self.heap.get(id).kind {
            ObjectKind::Class(m) | ObjectKind::Module(m) => m,
            other => panic!("expected a class or module, found {}", other.name()),
        }
    }

    pub(crate) fn module_mut(&mut self, id: ObjectId) -> &mut ModuleObject {
        match &mut self.heap.get_mut(id).kind {
            ObjectKind::Class(m) | ObjectKind::Module(m) => m,
            other => panic!("expected a class or module, found {}", other.name()),
        }
    }

    fn kind_of(&self, v: Value) -> Option<&ObjectKind> {
        if v.is_integer() {
            None
        } else {
            Some(&self.heap.get(v.as_object_id()).kind)
        }
    }

    pub fn is_nil(&self, v: Value) -> bool {
        matches!(self.kind_of(v), Some(ObjectKind::Nil))
    }

    pub fn is_string(&self, v: Value) -> bool {
        matches!(self.kind_of(v), Some(ObjectKind::Str(_)))
    }

    pub fn is_symbol(&self, v: Value) -> bool {
        matches!(self.kind_of(v), Some(ObjectKind::Symbol(_)))
    }

    pub fn is_array(&self, v: Value) -> bool {
        matches!(self.kind_of(v), Some(ObjectKind::Array(_)))
    }

    pub fn is_hash(&self, v: Value) -> bool {
        matches!(self.kind_of(v), Some(ObjectKind::Hash(_)))
    }

    pub fn is_range(&self, v: Value) -> bool {
        matches!(self.kind_of(v), Some(ObjectKind::Range(_)))
    }

    pub fn is_proc(&self, v: Value) -> bool {
        matches!(self.kind_of(v), Some(ObjectKind::Proc(_)))
    }

    pub fn is_lambda(&self, v: Value) -> bool {
        matches!(self.kind_of(v), Some(ObjectKind::Proc(p)) if p.lambda)
    }

    pub fn is_exception(&self, v: Value) -> bool {
        matches!(self.kind_of(v), Some(ObjectKind::Exception(_)))
    }

    pub fn is_class(&self, v: Value) -> bool {
        matches!(self.kind_of(v), Some(ObjectKind::Class(_)))
    }

    pub fn is_module_or_class(&self, v: Value) -> bool {
        matches!(
            self.kind_of(v),
            Some(ObjectKind::Class(_) | ObjectKind::Module(_))
        )
    }

    pub fn is_io(&self, v: Value) -> bool {
        matches!(self.kind_of(v), Some(ObjectKind::Io(_)))
    }

    /// Only nil and false are falsy. Zero is truthy.
    pub fn truthy(&self, v: Value) -> bool {
        !matches!(self.kind_of(v), Some(ObjectKind::Nil | ObjectKind::False))
    }

    /// Deterministic identity: an integer is its own id, a reference maps
    /// stably from its handle.
    pub fn object_id(&self, v: Value) -> i64 {
        if v.is_integer() {
            v.as_integer()
        } else {
            v.as_object_id().0 as i64
        }
    }

    pub fn ivar_get(&self, v: Value, name: &str) -> Value {
        debug_assert!(name.starts_with('@'));
        if v.is_integer() {
            return self.core.nil_obj;
        }
        self.heap
            .get(v.as_object_id())
            .ivars
            .get(name)
            .copied()
            .unwrap_or(self.core.nil_obj)
    }

    pub fn ivar_set(&mut self, v: Value, name: &str, value: Value) {
        debug_assert!(name.starts_with('@'));
        if v.is_integer() {
            panic!("cannot set instance variable {name} on an Integer");
        }
        self.heap
            .get_mut(v.as_object_id())
            .ivars
            .insert(name.to_string(), value);
    }

    /// The value's singleton class if one was ever created.
    pub fn singleton_class_of(&self, v: Value) -> Option<ObjectId> {
        if v.is_integer() {
            return None;
        }
        self.heap.get(v.as_object_id()).singleton_class
    }

    /// The value's singleton class, created and cached on first use. The
    /// singleton sits between the value and its nominal class.
    pub fn singleton_class_create(&mut self, v: Value) -> ObjectId {
        assert!(!v.is_integer(), "Integer values cannot have a singleton class");
        let id = v.as_object_id();
        if let Some(sc) = self.heap.get(id).singleton_class {
            return sc;
        }
        let nominal = self.heap.get(id).class;
        let name = format!("#<Class:{}>", self.module_name(nominal));
        let env = self.module_ref(nominal).env.capture();
        let singleton = self.heap.alloc(HeapObject::new(
            self.core.class_class,
            ObjectKind::Class(Box::new(ModuleObject::new(&name, Some(nominal), env))),
        ));
        self.heap.get_mut(id).singleton_class = Some(singleton);
        singleton
    }

    // ---- construction helpers ----

    pub fn string_new(&mut self, s: &str) -> Value {
        let id = self.heap.alloc(HeapObject::new(
            self.core.string_class,
            ObjectKind::Str(s.to_string()),
        ));
        Value::object(id)
    }

    pub fn array_new(&mut self, items: Vec<Value>) -> Value {
        let id = self
            .heap
            .alloc(HeapObject::new(self.core.array_class, ObjectKind::Array(items)));
        Value::object(id)
    }

    pub fn hash_new(&mut self) -> Value {
        let id = self.heap.alloc(HeapObject::new(
            self.core.hash_class,
            ObjectKind::Hash(HashObject::new()),
        ));
        Value::object(id)
    }

    pub fn range_new(&mut self, begin: Value, end: Value, exclude_end: bool) -> Value {
        let id = self.heap.alloc(HeapObject::new(
            self.core.range_class,
            ObjectKind::Range(RangeObject { begin, end, exclude_end }),
        ));
        Value::object(id)
    }

    pub fn io_new(&mut self, fileno: i32) -> Value {
        let id = self
            .heap
            .alloc(HeapObject::new(self.core.io_class, ObjectKind::Io(IoObject { fileno })));
        Value::object(id)
    }

    pub fn void_ptr_new(&mut self, ptr: *mut std::ffi::c_void) -> Value {
        let id = self.heap.alloc(HeapObject::new(
            self.core.object_class,
            ObjectKind::VoidPtr(ptr),
        ));
        Value::object(id)
    }

    /// A plain instance of the given class.
    pub fn object_new(&mut self, class: ObjectId) -> Value {
        let id = self.heap.alloc(HeapObject::new(class, ObjectKind::Object));
        Value::object(id)
    }

    /// A bare exception value; its backtrace is captured when it is raised.
    pub fn exception_new(&mut self, class: Value, message: &str) -> Value {
        assert!(self.is_class(class), "exception class must be a Class");
        self.exception_alloc(class.as_object_id(), message.to_string(), Vec::new())
    }

    pub(crate) fn exception_alloc(
        &mut self,
        class: ObjectId,
        message: String,
        backtrace: Vec<String>,
    ) -> Value {
        let id = self.heap.alloc(HeapObject::new(
            class,
            ObjectKind::Exception(Box::new(ExceptionObject { message, backtrace })),
        ));
        Value::object(id)
    }

    pub(crate) fn proc_alloc(&mut self, block: Rc<Block>, lambda: bool) -> Value {
        let id = self.heap.alloc(HeapObject::new(
            self.core.proc_class,
            ObjectKind::Proc(ProcObject { block, lambda }),
        ));
        Value::object(id)
    }

    // ---- typed accessors ----

    pub fn string_content(&self, v: Value) -> Option<&str> {
        match self.kind_of(v) {
            Some(ObjectKind::Str(s)) => Some(s),
            _ => None,
        }
    }

    pub fn symbol_text(&self, v: Value) -> Option<&str> {
        match self.kind_of(v) {
            Some(ObjectKind::Symbol(s)) => Some(s),
            _ => None,
        }
    }

    pub fn array_items(&self, v: Value) -> Option<&Vec<Value>> {
        match self.kind_of(v) {
            Some(ObjectKind::Array(items)) => Some(items),
            _ => None,
        }
    }

    pub fn array_push(&mut self, ary: Value, item: Value) {
        match &mut self.heap.get_mut(ary.as_object_id()).kind {
            ObjectKind::Array(items) => items.push(item),
            other => panic!("expected an Array, found {}", other.name()),
        }
    }

    pub fn exception_message(&self, v: Value) -> Option<&str> {
        match self.kind_of(v) {
            Some(ObjectKind::Exception(e)) => Some(&e.message),
            _ => None,
        }
    }

    pub fn exception_backtrace(&self, v: Value) -> Option<&[String]> {
        match self.kind_of(v) {
            Some(ObjectKind::Exception(e)) => Some(&e.backtrace),
            _ => None,
        }
    }

    pub fn proc_block(&self, v: Value) -> Option<Rc<Block>> {
        match self.kind_of(v) {
            Some(ObjectKind::Proc(p)) => Some(p.block.clone()),
            _ => None,
        }
    }

    pub fn io_fileno(&self, v: Value) -> Option<i32> {
        match self.kind_of(v) {
            Some(ObjectKind::Io(io)) => Some(io.fileno),
            _ => None,
        }
    }

    /// Structural key for integers, symbols and strings; identity for
    /// everything else.
    pub(crate) fn hash_key_for(&self, v: Value) -> HashKey {
        if v.is_integer() {
            return HashKey::Integer(v.as_integer());
        }
        match self.kind_of(v) {
            Some(ObjectKind::Str(s)) => HashKey::Str(s.clone()),
            _ => HashKey::Ident(v.raw()),
        }
    }

    pub fn hash_get(&self, hash: Value, key: Value) -> Option<Value> {
        let k = self.hash_key_for(key);
        match self.kind_of(hash) {
            Some(ObjectKind::Hash(h)) => h.entries.get(&k).copied(),
            _ => None,
        }
    }

    pub fn hash_insert(&mut self, hash: Value, key: Value, value: Value) {
        let k = self.hash_key_for(key);
        match &mut self.heap.get_mut(hash.as_object_id()).kind {
            ObjectKind::Hash(h) => {
                h.entries.insert(k, value);
            }
            other => panic!("expected a Hash, found {}", other.name()),
        }
    }
}
