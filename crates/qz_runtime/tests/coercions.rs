//! Coercions, identity, formatting helpers, and the regexp wrappers.

mod common;

use std::rc::Rc;

use common::*;
use qz_runtime::{
    int_to_hex_string, int_to_string, object_pointer_id, Block, Env, RtResult, Runtime, Value,
    INT_BUF_LEN,
};

#[test]
fn to_ary_wraps_plain_objects() {
    let (mut rt, env) = runtime_and_env();
    let obj = Value::integer(5);
    let wrapped = rt.to_ary(&env, obj, true).unwrap();
    let items = rt.array_items(wrapped).unwrap();
    assert_eq!(items, &vec![obj]);
}

#[test]
fn to_ary_is_idempotent_on_arrays() {
    let (mut rt, env) = runtime_and_env();
    let ary = rt.array_new(vec![Value::integer(1)]);
    let once = rt.to_ary(&env, ary, true).unwrap();
    let twice = rt.to_ary(&env, once, true).unwrap();
    assert_eq!(once, ary);
    assert_eq!(twice, once);
}

fn to_ary_pair(
    rt: &mut Runtime,
    _env: &Env,
    _self_value: Value,
    _args: &[Value],
    _block: Option<&Rc<Block>>,
) -> RtResult<Value> {
    Ok(rt.array_new(vec![Value::integer(1), Value::integer(2)]))
}

fn to_ary_bogus(
    _rt: &mut Runtime,
    _env: &Env,
    _self_value: Value,
    _args: &[Value],
    _block: Option<&Rc<Block>>,
) -> RtResult<Value> {
    Ok(Value::integer(0))
}

#[test]
fn to_ary_sends_the_conversion_method() {
    let (mut rt, env) = runtime_and_env();
    let object = object_class(&rt);
    let convertible = rt.class_new(&env, "Convertible", object);
    rt.define_method(convertible, "to_ary", to_ary_pair);

    let obj = rt.object_new(convertible.as_object_id());
    let ary = rt.to_ary(&env, obj, true).unwrap();
    let items = rt.array_items(ary).unwrap();
    assert_eq!(items, &vec![Value::integer(1), Value::integer(2)]);
}

#[test]
fn to_ary_rejects_a_bogus_converter_when_raising() {
    let (mut rt, env) = runtime_and_env();
    let object = object_class(&rt);
    let bogus = rt.class_new(&env, "Bogus", object);
    rt.define_method(bogus, "to_ary", to_ary_bogus);

    let obj = rt.object_new(bogus.as_object_id());
    let raised = rt.to_ary(&env, obj, true).unwrap_err();
    assert_eq!(raised_class_name(&rt, raised), "TypeError");

    // Without raising, the object wraps instead.
    let wrapped = rt.to_ary(&env, obj, false).unwrap();
    let items = rt.array_items(wrapped).unwrap();
    assert_eq!(items, &vec![obj]);
}

#[test]
fn splat_copies_arrays() {
    let (mut rt, env) = runtime_and_env();
    let ary = rt.array_new(vec![Value::integer(1), Value::integer(2)]);
    let copy = rt.splat(&env, ary).unwrap();
    assert_ne!(copy, ary, "splat of an array is a fresh copy");
    assert_eq!(rt.array_items(copy).unwrap(), rt.array_items(ary).unwrap());

    // Appending to the copy leaves the original alone.
    rt.array_push(copy, Value::integer(3));
    assert_eq!(rt.array_items(ary).unwrap().len(), 2);
}

#[test]
fn dup_copies_arrays_and_strings() {
    let (mut rt, _env) = runtime_and_env();
    let ary = rt.array_new(vec![Value::integer(1)]);
    let ary_copy = rt.dup(ary);
    assert_ne!(ary_copy, ary);
    assert_eq!(rt.array_items(ary_copy).unwrap(), rt.array_items(ary).unwrap());

    let s = rt.string_new("hello");
    let s_copy = rt.dup(s);
    assert_ne!(s_copy, s);
    assert_eq!(rt.string_content(s_copy), Some("hello"));
}

#[test]
fn dup_of_a_symbol_is_a_string() {
    let (mut rt, _env) = runtime_and_env();
    let sym = rt.intern("tag");
    let copy = rt.dup(sym);
    assert!(rt.is_string(copy));
    assert_eq!(rt.string_content(copy), Some("tag"));
}

#[test]
fn dup_of_singletons_returns_the_value_itself() {
    let (mut rt, _env) = runtime_and_env();
    let nil = rt.nil();
    let t = rt.bool_value(true);
    let f = rt.bool_value(false);
    assert_eq!(rt.dup(nil), nil);
    assert_eq!(rt.dup(t), t);
    assert_eq!(rt.dup(f), f);
}

#[test]
fn truthiness_only_excludes_nil_and_false() {
    let (mut rt, _env) = runtime_and_env();
    let nil = rt.nil();
    let f = rt.bool_value(false);
    let t = rt.bool_value(true);
    let zero = Value::integer(0);
    let empty = rt.string_new("");

    assert!(!rt.truthy(nil));
    assert!(!rt.truthy(f));
    assert!(rt.truthy(t));
    assert!(rt.truthy(zero));
    assert!(rt.truthy(empty));

    assert_eq!(rt.bool_not(nil), t);
    assert_eq!(rt.bool_not(zero), f);
    let not_not_zero = rt.bool_not(rt.bool_not(zero));
    assert_eq!(not_not_zero, t);
}

#[test]
fn object_id_is_stable_and_integers_are_their_own_id() {
    let (mut rt, _env) = runtime_and_env();
    for i in [0i64, 1, -1, 9999, -12345] {
        assert_eq!(rt.object_id(Value::integer(i)), i);
    }
    let s = rt.string_new("x");
    assert_eq!(rt.object_id(s), rt.object_id(s));
    let other = rt.string_new("x");
    assert_ne!(rt.object_id(s), rt.object_id(other), "distinct identities");
}

#[test]
fn symbols_are_interned() {
    let (mut rt, _env) = runtime_and_env();
    let a = rt.intern("name");
    let b = rt.intern("name");
    let c = rt.intern("other");
    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_eq!(rt.symbol_text(a), Some("name"));
}

#[test]
fn integer_formatting_matches_printf_shapes() {
    let mut buf = [0u8; INT_BUF_LEN];
    assert_eq!(int_to_string(0, &mut buf), "0");
    let mut buf = [0u8; INT_BUF_LEN];
    assert_eq!(int_to_string(4711, &mut buf), "4711");
    let mut buf = [0u8; INT_BUF_LEN];
    assert_eq!(int_to_string(-8, &mut buf), "-8");

    let mut buf = [0u8; INT_BUF_LEN];
    assert_eq!(int_to_hex_string(0, &mut buf, false), "0");
    let mut buf = [0u8; INT_BUF_LEN];
    assert_eq!(int_to_hex_string(0xdead, &mut buf, false), "0xdead");
    let mut buf = [0u8; INT_BUF_LEN];
    assert_eq!(int_to_hex_string(0xdead, &mut buf, true), "0XDEAD");
}

#[test]
fn object_pointer_id_is_hex_prefixed_and_stable() {
    let (mut rt, _env) = runtime_and_env();
    let s = rt.string_new("x");
    let mut buf = [0u8; INT_BUF_LEN];
    let first = object_pointer_id(s, &mut buf).to_string();
    assert!(first.starts_with("0x"));
    let mut buf = [0u8; INT_BUF_LEN];
    assert_eq!(object_pointer_id(s, &mut buf), first);
}

#[test]
fn range_values_hold_their_bounds() {
    let (mut rt, _env) = runtime_and_env();
    let r = rt.range_new(Value::integer(1), Value::integer(5), true);
    assert!(rt.is_range(r));
}

#[test]
fn to_proc_passes_procs_and_rejects_plain_objects() {
    let (mut rt, env) = runtime_and_env();
    let block = rt.block_new(&env, rt.nil(), to_ary_pair);
    let proc = rt.proc_new(block);
    assert_eq!(rt.to_proc(&env, proc).unwrap(), proc);

    let raised = rt.to_proc(&env, Value::integer(1)).unwrap_err();
    assert_eq!(raised_class_name(&rt, raised), "TypeError");
}

#[test]
fn lambdas_carry_the_strictness_flag() {
    let (mut rt, env) = runtime_and_env();
    let block = rt.block_new(&env, rt.nil(), to_ary_pair);
    let lambda = rt.lambda(block.clone());
    let plain = rt.proc_new(block);
    assert!(rt.is_lambda(lambda));
    assert!(!rt.is_lambda(plain));

    let from_some = rt.proc_from_block_maybe(Some(&rt.proc_block(plain).unwrap()));
    assert!(rt.is_proc(from_some));
    let from_none = rt.proc_from_block_maybe(None);
    assert!(rt.is_nil(from_none));
}
