//! Conversions between host-language shapes: array coercion, splatting,
//! shallow copies, and boolean inversion.

use crate::core::{Env, ObjectKind, Value};
use crate::errors::messages;

use super::{RtResult, Runtime};

impl Runtime {
    /// Sending-side splat: a copy when already an array, otherwise a
    /// non-raising `to_ary`.
    pub fn splat(&mut self, env: &Env, obj: Value) -> RtResult<Value> {
        if let Some(items) = self.array_items(obj) {
            let copy = items.clone();
            return Ok(self.array_new(copy));
        }
        self.to_ary(env, obj, false)
    }

    /// Coerce to an array. Arrays pass through. An object responding to
    /// `to_ary` is sent it; a non-array result falls back to wrapping when
    /// it is nil or `raise_for_non_array` is unset, and raises `TypeError`
    /// otherwise. Objects without `to_ary` wrap into a singleton array.
    pub fn to_ary(&mut self, env: &Env, obj: Value, raise_for_non_array: bool) -> RtResult<Value> {
        if self.is_array(obj) {
            return Ok(obj);
        }
        if self.respond_to(obj, "to_ary") {
            let ary = self.send(env, obj, "to_ary", &[], None)?;
            if self.is_array(ary) {
                return Ok(ary);
            }
            if self.is_nil(ary) || !raise_for_non_array {
                return Ok(self.array_new(vec![obj]));
            }
            let class_name = self.class_name_of(obj);
            let result_class = self.class_name_of(ary);
            return Err(self.raise(
                env,
                "TypeError",
                messages::cannot_convert_to_array(&class_name, &result_class),
            ));
        }
        Ok(self.array_new(vec![obj]))
    }

    /// Shallow copy for the kinds that support it. Nil, true and false are
    /// singletons and return themselves; a symbol duplicates into a string
    /// carrying its text. Anything else is a fatal error in the host
    /// program.
    pub fn dup(&mut self, obj: Value) -> Value {
        if obj.is_integer() {
            panic!("don't know how to dup this kind of object yet: Integer");
        }
        match &self.heap.get(obj.as_object_id()).kind {
            ObjectKind::Array(items) => {
                let copy = items.clone();
                self.array_new(copy)
            }
            ObjectKind::Str(s) => {
                let copy = s.clone();
                self.string_new(&copy)
            }
            ObjectKind::Symbol(s) => {
                let copy = s.clone();
                self.string_new(&copy)
            }
            ObjectKind::Nil | ObjectKind::True | ObjectKind::False => obj,
            other => panic!("don't know how to dup this kind of object yet: {}", other.name()),
        }
    }

    pub fn bool_not(&self, val: Value) -> Value {
        self.bool_value(!self.truthy(val))
    }
}
