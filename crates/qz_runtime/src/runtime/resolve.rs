//! Method resolution: the ancestor walk, `respond_to`, and `defined`.

use tracing::trace;

use crate::core::heap::{Method, ObjectId};
use crate::core::{Env, Value};

use super::Runtime;

fn is_constant_name(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_ascii_uppercase())
}

fn is_global_name(name: &str) -> bool {
    name.starts_with('$')
}

impl Runtime {
    /// Walk the lookup chain for `name` starting at `klass`. A class with
    /// included modules is reached through its module walk (the inclusion
    /// list carries the class itself as its first entry), so its own table
    /// is consulted directly only when the inclusion list is empty. Returns
    /// the method together with the class or module that defines it.
    pub fn find_method(&self, klass: ObjectId, name: &str) -> Option<(Method, ObjectId)> {
        let m = self.module_ref(klass);

        if m.included_modules.is_empty() {
            if let Some(method) = m.methods.get(name) {
                return Some((method.clone(), klass));
            }
        }

        for module_id in &m.included_modules {
            if let Some(method) = self.module_ref(*module_id).methods.get(name) {
                return Some((method.clone(), *module_id));
            }
        }

        match m.superclass {
            Some(superclass) => self.find_method(superclass, name),
            None => None,
        }
    }

    /// Like `find_method`, but an undefined marker resolves to nothing
    /// instead of falling through to ancestors.
    pub fn find_method_without_undefined(
        &self,
        klass: ObjectId,
        name: &str,
    ) -> Option<(Method, ObjectId)> {
        match self.find_method(klass, name) {
            Some((method, _)) if method.undefined => None,
            found => found,
        }
    }

    /// True when a non-undefined method exists on the object's singleton
    /// class (if any) or anywhere on its class chain.
    pub fn respond_to(&self, obj: Value, name: &str) -> bool {
        if obj.is_integer() {
            return self
                .find_method_without_undefined(self.core.integer_class, name)
                .is_some();
        }
        if let Some(singleton) = self.singleton_class_of(obj) {
            if self.find_method_without_undefined(singleton, name).is_some() {
                return true;
            }
        }
        self.find_method_without_undefined(self.class_of(obj), name)
            .is_some()
    }

    /// Classify what `name` means for `receiver`: a constant, a global
    /// variable, a method, or nothing. Never raises.
    pub fn defined(&self, env: &Env, receiver: Value, name: &str) -> Option<&'static str> {
        if is_constant_name(name) {
            if self.const_get_or_null(receiver, name).is_some() {
                return Some("constant");
            }
        } else if is_global_name(name) {
            let value = env.global_get(name).unwrap_or(self.core.nil_obj);
            if !self.is_nil(value) {
                return Some("global-variable");
            }
        } else if self.respond_to(receiver, name) {
            return Some("method");
        }
        None
    }

    /// `defined` as a host value: a String or nil.
    pub fn defined_obj(&mut self, env: &Env, receiver: Value, name: &str) -> Value {
        match self.defined(env, receiver, name) {
            Some(kind) => {
                trace!(name, kind, "defined");
                self.string_new(kind)
            }
            None => self.core.nil_obj,
        }
    }
}
