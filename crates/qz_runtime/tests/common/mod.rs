#![allow(dead_code)]

use std::rc::Rc;

use qz_runtime::{Block, Env, Raised, RtResult, Runtime, Value};

pub fn runtime_and_env() -> (Runtime, Env) {
    let rt = Runtime::new();
    let env = rt.root_env().clone();
    (rt, env)
}

pub fn object_class(rt: &Runtime) -> Value {
    Value::object(rt.core.object_class)
}

/// Class name of the exception carried by a raise, panicking on a break.
pub fn raised_class_name(rt: &Runtime, raised: Raised) -> String {
    match raised {
        Raised::Exception(v) => rt.class_name_of(v),
        Raised::Break(_) => panic!("expected an exception, found a break"),
    }
}

pub fn expect_exception(result: RtResult<Value>) -> Raised {
    match result {
        Ok(v) => panic!("expected a raise, got {v:?}"),
        Err(raised) => raised,
    }
}

// A few reusable method bodies.

pub fn returns_one(
    _rt: &mut Runtime,
    _env: &Env,
    _self_value: Value,
    _args: &[Value],
    _block: Option<&Rc<Block>>,
) -> RtResult<Value> {
    Ok(Value::integer(1))
}

pub fn returns_two(
    _rt: &mut Runtime,
    _env: &Env,
    _self_value: Value,
    _args: &[Value],
    _block: Option<&Rc<Block>>,
) -> RtResult<Value> {
    Ok(Value::integer(2))
}

pub fn returns_self(
    _rt: &mut Runtime,
    _env: &Env,
    self_value: Value,
    _args: &[Value],
    _block: Option<&Rc<Block>>,
) -> RtResult<Value> {
    Ok(self_value)
}

pub fn returns_first_arg(
    rt: &mut Runtime,
    _env: &Env,
    _self_value: Value,
    args: &[Value],
    _block: Option<&Rc<Block>>,
) -> RtResult<Value> {
    Ok(args.first().copied().unwrap_or(rt.nil()))
}
