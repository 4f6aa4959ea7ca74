//! Argument binding.
//!
//! The binder is the single expression of the language's argument
//! semantics: every call site resolves its named slots through the same
//! path-descriptor walk over a possibly-nested array value. The index-shift
//! rules are what make defaults-on-left, splats, and negative indices
//! cooperate; treat them as one unit when changing anything here.

use crate::core::{Env, Value};
use crate::errors::messages;

use super::{RtResult, Runtime};

/// Typed out-slot for `arg_spread`. One slot per positional argument, in
/// order: a raw value, a type-checked integer, a string (nil passes as
/// `None`), a truthiness bool, or the raw pointer held by the receiver's
/// `@_ptr` instance variable.
pub enum ArgSlot<'a> {
    Obj(&'a mut Value),
    Int(&'a mut i64),
    Str(&'a mut Option<String>),
    Bool(&'a mut bool),
    VoidPtr(&'a mut *mut std::ffi::c_void),
}

impl Runtime {
    /// The tail of `value` from `index` up to `len - offset_from_end`, as a
    /// fresh array; empty when `value` is not an array or the range is
    /// empty.
    fn splat_value(&mut self, value: Value, index: i64, offset_from_end: i64) -> Value {
        let mut items = Vec::new();
        if let Some(ary) = self.array_items(value) {
            let end = ary.len() as i64 - offset_from_end;
            let start = index.max(0);
            for s in start..end {
                items.push(ary[s as usize]);
            }
        }
        self.array_new(items)
    }

    /// Resolve one destination slot from a structured argument shape.
    ///
    /// `total_count` and `default_count` describe the destructuring target
    /// at the outermost level; `defaults_on_right` distinguishes trailing
    /// defaults (`a, b = 1`) from leading ones (`a = 1, b`). A nil
    /// `default_value` means the slot has no default.
    #[allow(clippy::too_many_arguments)]
    pub fn arg_value_by_path(
        &mut self,
        value: Value,
        default_value: Value,
        splat: bool,
        total_count: i64,
        default_count: i64,
        defaults_on_right: bool,
        offset_from_end: i64,
        path: &[i64],
    ) -> Value {
        let has_default = default_value != self.core.nil_obj;
        let defaults_on_left = !defaults_on_right;
        let required_count = total_count - default_count;
        let mut return_value = value;
        for (i, &step) in path.iter().enumerate() {
            let mut index = step;

            if splat && i == path.len() - 1 {
                return self.splat_value(return_value, index, offset_from_end);
            }

            if let Some(ary) = self.array_items(return_value) {
                let ary_len = ary.len() as i64;

                let first_required = default_count;
                let remain = ary_len - required_count;

                if has_default && index >= remain && index < first_required && defaults_on_left {
                    // A defaulted slot with not enough values to fill all
                    // the required slots plus this one.
                    return default_value;
                }

                if i == 0 && path.len() == 1 {
                    // Shift the index left so provided values bind to
                    // required slots first.
                    let extra_count = ary_len - required_count;
                    if defaults_on_left
                        && extra_count > 0
                        && default_count >= extra_count
                        && index >= extra_count
                    {
                        index -= default_count - extra_count;
                    } else if ary_len <= required_count && defaults_on_left {
                        index -= default_count;
                    }
                }

                if index < 0 {
                    // Negative offsets count from the right when the array
                    // is full; otherwise assume a splat precedes this slot.
                    if ary_len >= total_count {
                        index += ary_len;
                    } else {
                        index += total_count - 1;
                    }
                }

                if index < 0 {
                    return_value = default_value;
                } else if index < ary_len {
                    return_value = ary[index as usize];
                } else {
                    return_value = default_value;
                }
            } else if index == 0 {
                // A scalar is its own slot zero.
            } else {
                return_value = default_value;
            }
        }
        return_value
    }

    /// The simpler walk used for block-parameter destructuring: no
    /// default/required accounting, negative indices count from the right,
    /// out-of-range resolves to `default_value`.
    pub fn array_value_by_path(
        &mut self,
        value: Value,
        default_value: Value,
        splat: bool,
        offset_from_end: i64,
        path: &[i64],
    ) -> Value {
        let mut return_value = value;
        for (i, &step) in path.iter().enumerate() {
            let mut index = step;

            if splat && i == path.len() - 1 {
                return self.splat_value(return_value, index, offset_from_end);
            }

            if let Some(ary) = self.array_items(return_value) {
                let ary_len = ary.len() as i64;
                if index < 0 {
                    index += ary_len;
                }
                if index < 0 {
                    return_value = default_value;
                } else if index < ary_len {
                    return_value = ary[index as usize];
                } else {
                    return_value = default_value;
                }
            } else if index == 0 {
                // A scalar is its own slot zero.
            } else {
                return_value = default_value;
            }
        }
        return_value
    }

    /// Look up a keyword argument in the trailing keyword hash. The last
    /// positional element counts as the keyword hash only when it is a
    /// Hash; a missing keyword without a default raises `ArgumentError`.
    pub fn kwarg_value_by_name(
        &mut self,
        env: &Env,
        args: &[Value],
        name: &str,
        default_value: Option<Value>,
    ) -> RtResult<Value> {
        let hash = args.last().copied().filter(|v| self.is_hash(*v));
        let key = self.intern(name);
        if let Some(found) = hash.and_then(|h| self.hash_get(h, key)) {
            return Ok(found);
        }
        match default_value {
            Some(v) => Ok(v),
            None => Err(self.raise(env, "ArgumentError", messages::missing_keyword(name))),
        }
    }

    pub fn args_to_array(&mut self, args: &[Value]) -> Value {
        self.array_new(args.to_vec())
    }

    /// Pack block arguments: a single argument given to a block that wants
    /// several is spread through `to_ary` (raising when a converter returns
    /// a non-array); otherwise the arguments pack as given.
    pub fn block_args_to_array(
        &mut self,
        env: &Env,
        signature_size: usize,
        args: &[Value],
    ) -> RtResult<Value> {
        if args.len() == 1 && signature_size > 1 {
            return self.to_ary(env, args[0], true);
        }
        Ok(self.args_to_array(args))
    }

    /// Destructure positional arguments into typed out-slots. Too few
    /// arguments raise `ArgumentError`; a mistyped argument raises
    /// `TypeError`.
    pub fn arg_spread(
        &mut self,
        env: &Env,
        args: &[Value],
        targets: &mut [ArgSlot<'_>],
    ) -> RtResult<()> {
        for (i, target) in targets.iter_mut().enumerate() {
            if i >= args.len() {
                return Err(self.raise(
                    env,
                    "ArgumentError",
                    messages::wrong_number_of_arguments(args.len(), i + 1),
                ));
            }
            let obj = args[i];
            match target {
                ArgSlot::Obj(slot) => **slot = obj,
                ArgSlot::Int(slot) => {
                    if !obj.is_integer() {
                        let class_name = self.class_name_of(obj);
                        return Err(self.raise(
                            env,
                            "TypeError",
                            messages::no_implicit_conversion(&class_name, "Integer"),
                        ));
                    }
                    **slot = obj.as_integer();
                }
                ArgSlot::Str(slot) => {
                    if self.is_nil(obj) {
                        **slot = None;
                        continue;
                    }
                    let content = self.string_content(obj).map(|s| s.to_string());
                    match content {
                        Some(s) => **slot = Some(s),
                        None => {
                            let class_name = self.class_name_of(obj);
                            return Err(self.raise(
                                env,
                                "TypeError",
                                messages::no_implicit_conversion(&class_name, "String"),
                            ));
                        }
                    }
                }
                ArgSlot::Bool(slot) => **slot = self.truthy(obj),
                ArgSlot::VoidPtr(slot) => {
                    let ptr_val = self.ivar_get(obj, "@_ptr");
                    let ptr = if ptr_val.is_integer() {
                        None
                    } else {
                        match &self.heap.get(ptr_val.as_object_id()).kind {
                            crate::core::ObjectKind::VoidPtr(p) => Some(*p),
                            _ => None,
                        }
                    };
                    match ptr {
                        Some(p) => **slot = p,
                        None => {
                            let class_name = self.class_name_of(obj);
                            return Err(self.raise(
                                env,
                                "TypeError",
                                messages::no_implicit_conversion(&class_name, "VoidPointer"),
                            ));
                        }
                    }
                }
            }
        }
        Ok(())
    }
}
