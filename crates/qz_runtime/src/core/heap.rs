//! Heap management and object layout.
//!
//! Objects live in a slab indexed by `ObjectId`; a `Value` holding a handle
//! stays valid until a sweep proves the object unreachable. Every object
//! carries a common header (class handle, optional singleton class, instance
//! variables) followed by a kind payload.

use std::collections::HashSet;

use indexmap::IndexMap;

use super::env::{Block, Env};
use super::value::{fast_hasher, fast_map_new, FastHashMap, Value};
use crate::runtime::MethodFn;
use std::rc::Rc;

/// Handle to a heap-allocated object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId(pub usize);

/// A method-table entry. An entry with `undefined` set exists to block
/// inherited lookup and is never invoked.
#[derive(Clone)]
pub struct Method {
    pub fun: MethodFn,
    pub env: Option<Env>,
    pub undefined: bool,
}

impl Method {
    pub fn from_fn(fun: MethodFn) -> Self {
        Self { fun, env: None, undefined: false }
    }

    pub fn from_block(block: &Block) -> Self {
        Self {
            fun: block.fun,
            env: Some(block.env.capture()),
            undefined: false,
        }
    }

    pub fn undefined_marker() -> Self {
        fn stub(
            _rt: &mut crate::Runtime,
            _env: &Env,
            _self_value: Value,
            _args: &[Value],
            _block: Option<&Rc<Block>>,
        ) -> crate::RtResult<Value> {
            unreachable!("invoked an undefined-method marker entry")
        }
        Self { fun: stub, env: None, undefined: true }
    }
}

pub type MethodTable = IndexMap<String, Method, ahash::RandomState>;

pub fn method_table_new() -> MethodTable {
    IndexMap::with_hasher(fast_hasher())
}

/// Shared payload of Class and Module objects.
pub struct ModuleObject {
    pub name: String,
    pub superclass: Option<ObjectId>,
    pub included_modules: Vec<ObjectId>,
    pub methods: MethodTable,
    pub constants: FastHashMap<String, Value>,
    /// Defining environment; the closure-env fallback for methods defined
    /// from plain functions, and the anchor for constant lookup.
    pub env: Env,
}

impl ModuleObject {
    pub fn new(name: &str, superclass: Option<ObjectId>, env: Env) -> Self {
        Self {
            name: name.to_string(),
            superclass,
            included_modules: Vec::new(),
            methods: method_table_new(),
            constants: fast_map_new(),
            env,
        }
    }
}

/// Hash keys compare by content for integers, symbols and strings, and by
/// identity for everything else. Symbols are interned, so identity equality
/// is content equality for them.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum HashKey {
    Integer(i64),
    Str(String),
    Ident(u64),
}

pub type HashEntries = IndexMap<HashKey, Value, ahash::RandomState>;

pub struct HashObject {
    pub entries: HashEntries,
}

impl HashObject {
    pub fn new() -> Self {
        Self { entries: IndexMap::with_hasher(fast_hasher()) }
    }
}

impl Default for HashObject {
    fn default() -> Self {
        Self::new()
    }
}

pub struct RangeObject {
    pub begin: Value,
    pub end: Value,
    pub exclude_end: bool,
}

pub struct RegexpObject {
    pub pattern: String,
    pub regex: regex::Regex,
}

pub struct MatchDataObject {
    /// Byte spans of each capture group; group 0 is the whole match.
    pub spans: Vec<Option<(usize, usize)>>,
    /// Copy of the subject string the match ran against.
    pub subject: String,
}

pub struct ProcObject {
    pub block: Rc<Block>,
    pub lambda: bool,
}

pub struct IoObject {
    pub fileno: i32,
}

pub struct ExceptionObject {
    pub message: String,
    /// Innermost call site first.
    pub backtrace: Vec<String>,
}

/// Kind payload of a heap object.
pub enum ObjectKind {
    Nil,
    True,
    False,
    Symbol(String),
    Str(String),
    Array(Vec<Value>),
    Hash(HashObject),
    Range(RangeObject),
    Regexp(RegexpObject),
    MatchData(Box<MatchDataObject>),
    Proc(ProcObject),
    Io(IoObject),
    Exception(Box<ExceptionObject>),
    Class(Box<ModuleObject>),
    Module(Box<ModuleObject>),
    Object,
    VoidPtr(*mut std::ffi::c_void),
}

impl ObjectKind {
    pub fn name(&self) -> &'static str {
        match self {
            ObjectKind::Nil => "Nil",
            ObjectKind::True => "True",
            ObjectKind::False => "False",
            ObjectKind::Symbol(_) => "Symbol",
            ObjectKind::Str(_) => "String",
            ObjectKind::Array(_) => "Array",
            ObjectKind::Hash(_) => "Hash",
            ObjectKind::Range(_) => "Range",
            ObjectKind::Regexp(_) => "Regexp",
            ObjectKind::MatchData(_) => "MatchData",
            ObjectKind::Proc(_) => "Proc",
            ObjectKind::Io(_) => "Io",
            ObjectKind::Exception(_) => "Exception",
            ObjectKind::Class(_) => "Class",
            ObjectKind::Module(_) => "Module",
            ObjectKind::Object => "Object",
            ObjectKind::VoidPtr(_) => "VoidPointer",
        }
    }
}

/// Header + payload of every non-integer value.
pub struct HeapObject {
    pub class: ObjectId,
    pub singleton_class: Option<ObjectId>,
    pub ivars: FastHashMap<String, Value>,
    pub kind: ObjectKind,
}

impl HeapObject {
    pub fn new(class: ObjectId, kind: ObjectKind) -> Self {
        Self {
            class,
            singleton_class: None,
            ivars: fast_map_new(),
            kind,
        }
    }

    /// Rough footprint estimate used for GC pacing.
    fn size(&self) -> usize {
        let base = std::mem::size_of::<HeapObject>();
        let deep = match &self.kind {
            ObjectKind::Symbol(s) | ObjectKind::Str(s) => s.capacity(),
            ObjectKind::Array(v) => v.capacity() * std::mem::size_of::<Value>(),
            ObjectKind::Hash(h) => {
                h.entries.capacity()
                    * (std::mem::size_of::<HashKey>() + std::mem::size_of::<Value>())
            }
            ObjectKind::Regexp(r) => r.pattern.capacity() + 256,
            ObjectKind::MatchData(m) => {
                m.subject.capacity() + m.spans.capacity() * std::mem::size_of::<Option<(usize, usize)>>()
            }
            ObjectKind::Exception(e) => {
                e.message.capacity() + e.backtrace.iter().map(|l| l.capacity()).sum::<usize>()
            }
            ObjectKind::Class(m) | ObjectKind::Module(m) => {
                m.name.capacity()
                    + m.methods.capacity() * std::mem::size_of::<Method>()
                    + m.constants.capacity() * std::mem::size_of::<Value>()
            }
            _ => 0,
        };
        base + deep + self.ivars.capacity() * std::mem::size_of::<Value>()
    }
}

pub struct Heap {
    pub(crate) objects: Vec<Option<HeapObject>>,
    free_list: Vec<usize>,
    marks: Vec<u64>,
    pub(crate) alloc_count: usize,
    pub(crate) gc_threshold: usize,
    pub(crate) alloc_bytes: usize,
    pub(crate) gc_threshold_bytes: usize,
}

impl Heap {
    pub fn new() -> Self {
        Self {
            objects: Vec::with_capacity(1024),
            free_list: Vec::new(),
            marks: Vec::new(),
            alloc_count: 0,
            gc_threshold: 100_000,
            gc_threshold_bytes: 32 * 1024 * 1024,
            alloc_bytes: 0,
        }
    }

    pub fn alloc(&mut self, obj: HeapObject) -> ObjectId {
        self.alloc_count += 1;
        self.alloc_bytes += obj.size();

        if let Some(id) = self.free_list.pop() {
            self.objects[id] = Some(obj);
            ObjectId(id)
        } else {
            let id = self.objects.len();
            self.objects.push(Some(obj));
            ObjectId(id)
        }
    }

    #[inline]
    pub fn should_gc(&self) -> bool {
        self.alloc_count >= self.gc_threshold || self.alloc_bytes >= self.gc_threshold_bytes
    }

    pub fn get(&self, id: ObjectId) -> &HeapObject {
        self.objects[id.0]
            .as_ref()
            .expect("object was garbage collected")
    }

    pub fn get_mut(&mut self, id: ObjectId) -> &mut HeapObject {
        self.objects[id.0]
            .as_mut()
            .expect("object was garbage collected")
    }

    pub fn is_marked(&self, id: ObjectId) -> bool {
        let word = id.0 >> 6;
        let bit = id.0 & 63;
        self.marks.get(word).is_some_and(|w| (w & (1 << bit)) != 0)
    }

    fn set_mark(&mut self, id: ObjectId) -> bool {
        let word = id.0 >> 6;
        let bit = id.0 & 63;
        if word >= self.marks.len() {
            self.marks.resize(word + 1, 0);
        }
        let w = &mut self.marks[word];
        let mask = 1 << bit;
        if (*w & mask) != 0 {
            return false;
        }
        *w |= mask;
        true
    }

    /// Mark every object reachable from `roots` and the given live
    /// environments. Environments are reference-counted frames outside the
    /// heap; they are traced for the values they hold, following both the
    /// lexical and the dynamic chain and any captured frames reachable
    /// through blocks and methods.
    pub fn mark_all(&mut self, roots: &[Value], envs: &[&Env]) {
        self.marks.clear();

        let mut pending: Vec<Value> = roots.to_vec();
        let mut pending_envs: Vec<Env> = envs.iter().map(|e| (*e).clone()).collect();
        let mut seen_envs: HashSet<usize> = HashSet::new();

        loop {
            while let Some(env) = pending_envs.pop() {
                if !seen_envs.insert(env.frame_id()) {
                    continue;
                }
                env.trace(&mut pending, &mut pending_envs);
            }

            let Some(val) = pending.pop() else {
                if pending_envs.is_empty() {
                    break;
                }
                continue;
            };
            if val.is_integer() {
                continue;
            }
            let id = val.as_object_id();
            if id.0 >= self.objects.len() || self.objects[id.0].is_none() {
                continue;
            }
            if !self.set_mark(id) {
                continue;
            }
            let obj = self.objects[id.0].as_ref().expect("checked above");
            pending.push(Value::object(obj.class));
            if let Some(sc) = obj.singleton_class {
                pending.push(Value::object(sc));
            }
            for v in obj.ivars.values() {
                pending.push(*v);
            }
            match &obj.kind {
                ObjectKind::Array(items) => pending.extend(items.iter().copied()),
                ObjectKind::Hash(h) => pending.extend(h.entries.values().copied()),
                ObjectKind::Range(r) => {
                    pending.push(r.begin);
                    pending.push(r.end);
                }
                ObjectKind::Proc(p) => {
                    pending.push(p.block.self_value);
                    pending_envs.push(p.block.env.clone());
                }
                ObjectKind::Class(m) | ObjectKind::Module(m) => {
                    if let Some(superclass) = m.superclass {
                        pending.push(Value::object(superclass));
                    }
                    for inc in &m.included_modules {
                        pending.push(Value::object(*inc));
                    }
                    for v in m.constants.values() {
                        pending.push(*v);
                    }
                    for method in m.methods.values() {
                        if let Some(env) = &method.env {
                            pending_envs.push(env.clone());
                        }
                    }
                    pending_envs.push(m.env.clone());
                }
                _ => {}
            }
        }
    }

    /// Sweep unreachable objects and update thresholds.
    pub fn sweep(&mut self) {
        let mut live_bytes = 0;
        let mut live_count = 0;

        self.free_list.clear();

        for i in 0..self.objects.len() {
            if let Some(obj) = &self.objects[i] {
                if !self.is_marked(ObjectId(i)) {
                    self.objects[i] = None;
                    self.free_list.push(i);
                } else {
                    live_bytes += obj.size();
                    live_count += 1;
                }
            } else {
                self.free_list.push(i);
            }
        }

        while self.objects.last().is_some_and(|o| o.is_none()) {
            self.objects.pop();
        }
        let new_len = self.objects.len();
        self.free_list.retain(|&i| i < new_len);

        self.marks.clear();
        self.alloc_count = 0;
        self.alloc_bytes = live_bytes;

        // Grow slower once the live set is large to bound pause growth.
        let growth_factor = if live_bytes > 10 * 1024 * 1024 { 1.5 } else { 2.0 };
        self.gc_threshold = ((live_count as f64 * growth_factor) as usize).max(32_768);
        self.gc_threshold_bytes =
            ((live_bytes as f64 * growth_factor) as usize).max(1024 * 1024);
    }

    pub fn live_count(&self) -> usize {
        self.objects.iter().filter(|o| o.is_some()).count()
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}
