//! Class and module registry: construction, module inclusion, method
//! definition and undefinition, ancestor walks, and constants.

use std::rc::Rc;

use crate::core::heap::{HeapObject, Method, ModuleObject, ObjectId, ObjectKind};
use crate::core::{Block, Env, Value};
use crate::errors::messages;

use super::{BeginFn, MethodFn, RtResult, Runtime};

impl Runtime {
    pub fn class_new(&mut self, env: &Env, name: &str, superclass: Value) -> Value {
        assert!(self.is_class(superclass), "superclass of {name} must be a Class");
        let superclass = superclass.as_object_id();
        let id = self.heap.alloc(HeapObject::new(
            self.core.class_class,
            ObjectKind::Class(Box::new(ModuleObject::new(
                name,
                Some(superclass),
                env.capture(),
            ))),
        ));
        Value::object(id)
    }

    pub fn module_new(&mut self, env: &Env, name: &str) -> Value {
        let id = self.heap.alloc(HeapObject::new(
            self.core.module_class,
            ObjectKind::Module(Box::new(ModuleObject::new(name, None, env.capture()))),
        ));
        Value::object(id)
    }

    /// Append a module to the class's inclusion list. Duplicate inclusions
    /// and self-inclusion are ignored. The resolver and the ancestor walk
    /// read a class's own table through its inclusion list, so the first
    /// include seeds the list with the class itself as its implicit first
    /// entry.
    pub fn include_module(&mut self, klass: Value, module: Value) {
        assert!(self.is_module_or_class(module), "can only include a Module");
        let klass_id = self.target_module(klass);
        let module_id = module.as_object_id();
        if klass_id == module_id {
            return;
        }
        let m = self.module_mut(klass_id);
        if m.included_modules.is_empty() {
            m.included_modules.push(klass_id);
        }
        if !m.included_modules.contains(&module_id) {
            m.included_modules.push(module_id);
        }
    }

    /// Define a method from a native function. On the main object this
    /// defines on its class, so top-level definitions land on `Object`.
    pub fn define_method(&mut self, target: Value, name: &str, fun: MethodFn) {
        let id = self.target_module(target);
        self.module_mut(id).methods.insert(name.to_string(), Method::from_fn(fun));
    }

    /// Define a method from a block, keeping the block's captured
    /// environment as the method's closure env.
    pub fn define_method_with_block(&mut self, target: Value, name: &str, block: &Rc<Block>) {
        let id = self.target_module(target);
        self.module_mut(id)
            .methods
            .insert(name.to_string(), Method::from_block(block));
    }

    /// Insert an undefined marker: lookup stops there instead of falling
    /// through to ancestors.
    pub fn undefine_method(&mut self, target: Value, name: &str) {
        let id = self.target_module(target);
        self.module_mut(id)
            .methods
            .insert(name.to_string(), Method::undefined_marker());
    }

    pub fn define_singleton_method(
        &mut self,
        env: &Env,
        target: Value,
        name: &str,
        fun: MethodFn,
    ) -> RtResult<()> {
        let singleton = self.singleton_target(env, target)?;
        self.module_mut(singleton)
            .methods
            .insert(name.to_string(), Method::from_fn(fun));
        Ok(())
    }

    pub fn define_singleton_method_with_block(
        &mut self,
        env: &Env,
        target: Value,
        name: &str,
        block: &Rc<Block>,
    ) -> RtResult<()> {
        let singleton = self.singleton_target(env, target)?;
        self.module_mut(singleton)
            .methods
            .insert(name.to_string(), Method::from_block(block));
        Ok(())
    }

    pub fn undefine_singleton_method(
        &mut self,
        env: &Env,
        target: Value,
        name: &str,
    ) -> RtResult<()> {
        let singleton = self.singleton_target(env, target)?;
        self.module_mut(singleton)
            .methods
            .insert(name.to_string(), Method::undefined_marker());
        Ok(())
    }

    fn singleton_target(&mut self, env: &Env, target: Value) -> RtResult<ObjectId> {
        if target.is_integer() {
            return Err(self.raise(
                env,
                "TypeError",
                "can't define singleton method for Integer".to_string(),
            ));
        }
        Ok(self.singleton_class_create(target))
    }

    /// Ancestor list: superclass chain from `klass` upward. A class without
    /// included modules is emitted directly; one with modules appears
    /// through its inclusion list, which carries the class itself as its
    /// first entry followed by the modules in insertion order. Always ends
    /// at the top class.
    pub fn class_ancestors(&self, klass: ObjectId) -> Vec<ObjectId> {
        let mut ancestors = Vec::new();
        let mut current = Some(klass);
        while let Some(id) = current {
            let m = self.module_ref(id);
            if m.included_modules.is_empty() {
                ancestors.push(id);
            }
            for inc in &m.included_modules {
                ancestors.push(*inc);
            }
            current = m.superclass;
        }
        ancestors
    }

    pub fn is_a(&self, obj: Value, class_or_module: Value) -> bool {
        if obj == class_or_module {
            return true;
        }
        let target = class_or_module.as_object_id();
        self.class_ancestors(self.class_of(obj)).contains(&target)
    }

    /// Method names visible on a class, as interned symbols, in the
    /// resolver's walk order: own table (through the inclusion list when
    /// modules are included), then the superclass chain, each table in
    /// definition order.
    pub fn method_names(&mut self, klass: ObjectId) -> Vec<Value> {
        let mut names: Vec<String> = Vec::new();
        let mut current = Some(klass);
        while let Some(id) = current {
            let m = self.module_ref(id);
            if m.included_modules.is_empty() {
                names.extend(m.methods.keys().cloned());
            }
            for inc in &m.included_modules {
                names.extend(self.module_ref(*inc).methods.keys().cloned());
            }
            current = m.superclass;
        }
        names.iter().map(|n| self.intern(n)).collect()
    }

    pub fn const_set(&mut self, module: Value, name: &str, value: Value) {
        let id = self.target_module(module);
        self.const_set_on(id, name, value);
    }

    pub(crate) fn const_set_on(&mut self, module: ObjectId, name: &str, value: Value) {
        self.module_mut(module).constants.insert(name.to_string(), value);
    }

    /// Constant lookup: the receiver's module (or its class, for plain
    /// instances), its superclass chain, then `Object`. Returns None when
    /// missing.
    pub fn const_get_or_null(&self, receiver: Value, name: &str) -> Option<Value> {
        let start = if self.is_module_or_class(receiver) {
            receiver.as_object_id()
        } else {
            self.class_of(receiver)
        };
        let mut current = Some(start);
        while let Some(id) = current {
            let m = self.module_ref(id);
            if let Some(v) = m.constants.get(name) {
                return Some(*v);
            }
            current = m.superclass;
        }
        self.module_ref(self.core.object_class).constants.get(name).copied()
    }

    pub fn const_get(&mut self, env: &Env, receiver: Value, name: &str) -> RtResult<Value> {
        match self.const_get_or_null(receiver, name) {
            Some(v) => Ok(v),
            None => Err(self.raise(env, "NameError", messages::uninitialized_constant(name))),
        }
    }

    /// Run a class or module body in a fresh frame whose caller is the
    /// current env; the caller link is dropped once the body returns.
    pub fn eval_class_or_module_body(
        &mut self,
        env: &Env,
        class_or_module: Value,
        fun: BeginFn,
    ) -> RtResult<Value> {
        let body_env = Env::block_env(env, env);
        let result = fun(self, &body_env, class_or_module);
        body_env.clear_caller();
        result
    }

    /// The module a method definition lands on: the target itself for a
    /// class or module, the target's class for the main object.
    pub(crate) fn target_module(&self, target: Value) -> ObjectId {
        if target == self.core.main_obj {
            return self.class_of(target);
        }
        if self.is_module_or_class(target) {
            return target.as_object_id();
        }
        panic!(
            "method definition target must be a class, a module, or the main object, found {}",
            self.class_name_of(target)
        );
    }
}
