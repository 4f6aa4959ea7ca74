//! Lexical environments.
//!
//! A frame links two chains: `outer` is the lexical chain closures capture,
//! `caller` is the dynamic chain exceptions unwind along. Locals are shared
//! between a frame and its captures through one reference-counted map, so a
//! closure observes later writes the way the defining frame does.

use std::cell::RefCell;
use std::rc::Rc;

use super::value::{fast_map_new, FastHashMap, Value};
use crate::runtime::MethodFn;

pub type Locals = Rc<RefCell<FastHashMap<String, Value>>>;
pub type Globals = Rc<RefCell<FastHashMap<String, Value>>>;

/// An anonymous callable passed out-of-band with a call: a function pointer
/// plus the captured environment and the `self` it closes over.
pub struct Block {
    pub fun: MethodFn,
    pub env: Env,
    pub self_value: Value,
}

struct EnvData {
    outer: Option<Env>,
    caller: Option<Env>,
    locals: Locals,
    globals: Globals,
    file: Rc<str>,
    line: usize,
    method_name: Option<Rc<str>>,
    block: Option<Rc<Block>>,
    rescue: bool,
    exception: Option<Value>,
    last_match: Option<Value>,
}

#[derive(Clone)]
pub struct Env(Rc<RefCell<EnvData>>);

impl Env {
    /// Top-of-program frame: no outer, no caller.
    pub fn root(globals: Globals, file: &str) -> Self {
        Self(Rc::new(RefCell::new(EnvData {
            outer: None,
            caller: None,
            locals: Rc::new(RefCell::new(fast_map_new())),
            globals,
            file: Rc::from(file),
            line: 0,
            method_name: None,
            block: None,
            rescue: false,
            exception: None,
            last_match: None,
        })))
    }

    /// Call frame on top of a closure's environment: lexical link to
    /// `outer`, dynamic link to `caller`, fresh locals. File and line start
    /// out as the call site's; the dispatcher restamps them as needed.
    pub fn block_env(outer: &Env, caller: &Env) -> Self {
        let globals = outer.0.borrow().globals.clone();
        let (file, line) = {
            let c = caller.0.borrow();
            (c.file.clone(), c.line)
        };
        Self(Rc::new(RefCell::new(EnvData {
            outer: Some(outer.clone()),
            caller: Some(caller.clone()),
            locals: Rc::new(RefCell::new(fast_map_new())),
            globals,
            file,
            line,
            method_name: None,
            block: None,
            rescue: false,
            exception: None,
            last_match: None,
        })))
    }

    /// Capture for a closure: same frame contents, shared locals, caller
    /// link cleared. Only call-time envs carry a live caller.
    pub fn capture(&self) -> Self {
        let d = self.0.borrow();
        Self(Rc::new(RefCell::new(EnvData {
            outer: d.outer.clone(),
            caller: None,
            locals: d.locals.clone(),
            globals: d.globals.clone(),
            file: d.file.clone(),
            line: d.line,
            method_name: d.method_name.clone(),
            block: d.block.clone(),
            rescue: false,
            exception: None,
            last_match: d.last_match,
        })))
    }

    /// Lexical lookup: this frame's locals, then the outer chain.
    pub fn var_get(&self, name: &str) -> Option<Value> {
        let d = self.0.borrow();
        if let Some(v) = d.locals.borrow().get(name) {
            return Some(*v);
        }
        let mut outer = d.outer.clone();
        drop(d);
        while let Some(env) = outer {
            let d = env.0.borrow();
            if let Some(v) = d.locals.borrow().get(name) {
                return Some(*v);
            }
            outer = d.outer.clone();
        }
        None
    }

    /// Bind in this frame.
    pub fn var_set(&self, name: &str, value: Value) {
        let d = self.0.borrow();
        d.locals.borrow_mut().insert(name.to_string(), value);
    }

    /// Assign to an existing binding, walking the outer chain; falls back to
    /// binding in this frame.
    pub fn var_assign(&self, name: &str, value: Value) {
        let mut env = self.clone();
        loop {
            let next = {
                let d = env.0.borrow();
                let mut locals = d.locals.borrow_mut();
                if locals.contains_key(name) {
                    locals.insert(name.to_string(), value);
                    return;
                }
                d.outer.clone()
            };
            match next {
                Some(outer) => env = outer,
                None => break,
            }
        }
        self.var_set(name, value);
    }

    pub fn global_get(&self, name: &str) -> Option<Value> {
        self.0.borrow().globals.borrow().get(name).copied()
    }

    pub fn global_set(&self, name: &str, value: Value) {
        let d = self.0.borrow();
        d.globals.borrow_mut().insert(name.to_string(), value);
    }

    pub fn globals(&self) -> Globals {
        self.0.borrow().globals.clone()
    }

    pub fn file(&self) -> Rc<str> {
        self.0.borrow().file.clone()
    }

    pub fn line(&self) -> usize {
        self.0.borrow().line
    }

    /// Stamp the call-site location; compiled code calls this before each
    /// dispatch so backtraces point at source positions.
    pub fn set_location(&self, file: &Rc<str>, line: usize) {
        let mut d = self.0.borrow_mut();
        d.file = file.clone();
        d.line = line;
    }

    pub fn method_name(&self) -> Option<Rc<str>> {
        self.0.borrow().method_name.clone()
    }

    pub fn set_method_name(&self, name: &str) {
        self.0.borrow_mut().method_name = Some(Rc::from(name));
    }

    pub fn block(&self) -> Option<Rc<Block>> {
        self.0.borrow().block.clone()
    }

    pub fn set_block(&self, block: Option<Rc<Block>>) {
        self.0.borrow_mut().block = block;
    }

    pub fn rescue(&self) -> bool {
        self.0.borrow().rescue
    }

    pub fn set_rescue(&self, rescue: bool) {
        self.0.borrow_mut().rescue = rescue;
    }

    pub fn exception(&self) -> Option<Value> {
        self.0.borrow().exception
    }

    pub fn set_exception(&self, exception: Option<Value>) {
        self.0.borrow_mut().exception = exception;
    }

    pub fn last_match(&self) -> Option<Value> {
        self.0.borrow().last_match
    }

    pub fn set_last_match(&self, m: Option<Value>) {
        self.0.borrow_mut().last_match = m;
    }

    pub fn outer(&self) -> Option<Env> {
        self.0.borrow().outer.clone()
    }

    pub fn caller(&self) -> Option<Env> {
        self.0.borrow().caller.clone()
    }

    pub fn clear_caller(&self) {
        self.0.borrow_mut().caller = None;
    }

    /// Stable identity of the frame, for cycle detection while tracing.
    pub(crate) fn frame_id(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }

    /// Push every value this frame holds into `pending` and every linked
    /// frame into `pending_envs`.
    pub(crate) fn trace(&self, pending: &mut Vec<Value>, pending_envs: &mut Vec<Env>) {
        let d = self.0.borrow();
        for v in d.locals.borrow().values() {
            pending.push(*v);
        }
        if let Some(exc) = d.exception {
            pending.push(exc);
        }
        if let Some(m) = d.last_match {
            pending.push(m);
        }
        if let Some(block) = &d.block {
            pending.push(block.self_value);
            pending_envs.push(block.env.clone());
        }
        if let Some(outer) = &d.outer {
            pending_envs.push(outer.clone());
        }
        if let Some(caller) = &d.caller {
            pending_envs.push(caller.clone());
        }
    }
}
