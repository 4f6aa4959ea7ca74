//! Raising, rescuing, top-level reporting, `SystemExit`, and at-exit
//! handlers.

mod common;

use std::rc::Rc;

use common::*;
use qz_runtime::{Block, Env, Raised, RtResult, Runtime, Value, AT_EXIT_HANDLERS_GLOBAL};

fn explode(
    rt: &mut Runtime,
    env: &Env,
    _self_value: Value,
    _args: &[Value],
    _block: Option<&Rc<Block>>,
) -> RtResult<Value> {
    Err(rt.raise(env, "TypeError", "boom".to_string()))
}

#[test]
fn raise_sets_the_exception_slot_and_unwinds() {
    let (mut rt, env) = runtime_and_env();
    let object = object_class(&rt);
    rt.define_method(object, "explode", explode);

    let main = rt.main_object();
    let raised = expect_exception(rt.send(&env, main, "explode", &[], None));
    assert_eq!(raised_class_name(&rt, raised), "TypeError");
    match raised {
        Raised::Exception(exc) => {
            assert_eq!(rt.exception_message(exc), Some("boom"));
            // The unwind left the exception in the top frame for the
            // top-level handler.
            assert_eq!(env.exception(), Some(exc));
        }
        Raised::Break(_) => unreachable!(),
    }
}

#[test]
fn rescue_clears_the_exception_and_resumes_in_the_handler() {
    let (mut rt, env) = runtime_and_env();
    let main = rt.main_object();

    let result = rt
        .rescue(
            &env,
            main,
            |rt, env, _selfv| Err(rt.raise(env, "TypeError", "caught me".to_string())),
            |rt, _env, _selfv, exception| {
                assert_eq!(rt.exception_message(exception), Some("caught me"));
                Ok(Value::integer(1))
            },
        )
        .unwrap();
    assert_eq!(result, Value::integer(1));
    assert!(env.exception().is_none());
}

#[test]
fn rescue_passes_a_clean_body_through() {
    let (mut rt, env) = runtime_and_env();
    let main = rt.main_object();
    let result = rt
        .rescue(
            &env,
            main,
            |_rt, _env, _selfv| Ok(Value::integer(5)),
            |_rt, _env, _selfv, _exception| panic!("handler must not run"),
        )
        .unwrap();
    assert_eq!(result, Value::integer(5));
}

#[test]
fn rescue_does_not_catch_a_block_break() {
    let (mut rt, env) = runtime_and_env();
    let main = rt.main_object();
    let result = rt.rescue(
        &env,
        main,
        |_rt, _env, _selfv| Err(Raised::Break(Value::integer(3))),
        |_rt, _env, _selfv, _exception| panic!("handler must not run"),
    );
    assert!(matches!(result, Err(Raised::Break(v)) if v == Value::integer(3)));
}

#[test]
fn backtrace_walks_the_dynamic_chain() {
    let (mut rt, env) = runtime_and_env();
    let object = object_class(&rt);
    rt.define_method(object, "explode", explode);

    let file: Rc<str> = Rc::from("main.qz");
    env.set_location(&file, 3);

    let main = rt.main_object();
    let raised = expect_exception(rt.send(&env, main, "explode", &[], None));
    let Raised::Exception(exc) = raised else { unreachable!() };

    let backtrace = rt.exception_backtrace(exc).unwrap();
    assert_eq!(backtrace.len(), 2);
    assert_eq!(backtrace[0], "main.qz:3:in 'explode'");
    assert_eq!(backtrace[1], "main.qz:3");
}

#[test]
fn report_format_with_backtrace() {
    let (mut rt, env) = runtime_and_env();
    let object = object_class(&rt);
    rt.define_method(object, "explode", explode);

    let file: Rc<str> = Rc::from("main.qz");
    env.set_location(&file, 3);
    let main = rt.main_object();
    let Raised::Exception(exc) = expect_exception(rt.send(&env, main, "explode", &[], None))
    else {
        unreachable!()
    };

    let report = rt.format_exception_report(exc);
    let expected = "Traceback (most recent call last):\n        1: from main.qz:3\nmain.qz:3:in 'explode': boom (TypeError)\n";
    assert_eq!(report, expected);
}

#[test]
fn report_format_without_backtrace() {
    let (mut rt, env) = runtime_and_env();
    let type_error = rt.const_get(&env, rt.main_object(), "TypeError").unwrap();
    let exc = rt.exception_new(type_error, "plain");
    assert_eq!(rt.format_exception_report(exc), "plain (TypeError)\n");
}

#[test]
fn raising_a_bare_exception_fills_its_backtrace() {
    let (mut rt, env) = runtime_and_env();
    let type_error = rt.const_get(&env, rt.main_object(), "TypeError").unwrap();
    let exc = rt.exception_new(type_error, "late");
    assert!(rt.exception_backtrace(exc).unwrap().is_empty());

    let Raised::Exception(same) = rt.raise_exception(&env, exc) else {
        unreachable!()
    };
    assert_eq!(same, exc);
    assert!(!rt.exception_backtrace(exc).unwrap().is_empty());
    assert_eq!(env.exception(), Some(exc));
}

#[test]
fn system_exit_status_comes_from_the_status_ivar() {
    let (mut rt, env) = runtime_and_env();
    let Raised::Exception(exc) = rt.raise(&env, "SystemExit", "exit".to_string()) else {
        unreachable!()
    };

    rt.ivar_set(exc, "@status", Value::integer(7));
    assert_eq!(rt.exit_status_of(exc), 7);

    rt.ivar_set(exc, "@status", Value::integer(300));
    assert_eq!(rt.exit_status_of(exc), 1);

    rt.ivar_set(exc, "@status", Value::integer(-1));
    assert_eq!(rt.exit_status_of(exc), 1);

    let nil = rt.nil();
    rt.ivar_set(exc, "@status", nil);
    assert_eq!(rt.exit_status_of(exc), 1);

    rt.ivar_set(exc, "@status", Value::integer(0));
    assert_eq!(rt.exit_status_of(exc), 0);
}

#[test]
fn system_exit_is_an_exception() {
    let (mut rt, env) = runtime_and_env();
    let Raised::Exception(exc) = rt.raise(&env, "SystemExit", "exit".to_string()) else {
        unreachable!()
    };
    let exception_class = rt.const_get(&env, rt.main_object(), "Exception").unwrap();
    assert!(rt.is_a(exc, exception_class));
    assert_eq!(rt.class_name_of(exc), "SystemExit");
}

fn record_self_in_order(
    rt: &mut Runtime,
    env: &Env,
    self_value: Value,
    _args: &[Value],
    _block: Option<&Rc<Block>>,
) -> RtResult<Value> {
    let order = env.global_get("$order").expect("$order array");
    rt.array_push(order, self_value);
    Ok(rt.nil())
}

#[test]
fn at_exit_handlers_run_in_reverse_registration_order() {
    let (mut rt, env) = runtime_and_env();
    let order = rt.array_new(Vec::new());
    env.global_set("$order", order);

    for marker in [1, 2, 3] {
        let block = rt.block_new(&env, Value::integer(marker), record_self_in_order);
        let proc = rt.proc_new(block);
        rt.at_exit(&env, proc);
    }

    // Registration populated the global handler array.
    let handlers = env.global_get(AT_EXIT_HANDLERS_GLOBAL).unwrap();
    assert_eq!(rt.array_items(handlers).unwrap().len(), 3);

    rt.run_at_exit_handlers(&env);
    let recorded = rt.array_items(order).unwrap();
    assert_eq!(
        recorded,
        &vec![Value::integer(3), Value::integer(2), Value::integer(1)]
    );
}

fn breaks_immediately(
    _rt: &mut Runtime,
    _env: &Env,
    _self_value: Value,
    _args: &[Value],
    _block: Option<&Rc<Block>>,
) -> RtResult<Value> {
    Err(Raised::Break(Value::integer(9)))
}

#[test]
fn at_exit_swallows_a_break() {
    let (mut rt, env) = runtime_and_env();
    let block = rt.block_new(&env, rt.nil(), breaks_immediately);
    let proc = rt.proc_new(block);
    rt.at_exit(&env, proc);
    // Must not unwind.
    rt.run_at_exit_handlers(&env);
}

#[test]
fn run_block_without_break_returns_the_break_value() {
    let (mut rt, env) = runtime_and_env();
    let block = rt.block_new(&env, rt.nil(), breaks_immediately);
    let v = rt
        .run_block_without_break(&env, Some(&block), &[], None)
        .unwrap();
    assert_eq!(v, Value::integer(9));

    let result: RtResult<Value> = Err(Raised::Break(Value::integer(4)));
    assert_eq!(Runtime::catch_break(result).unwrap(), Value::integer(4));
}

#[test]
fn missing_block_raises_local_jump_error() {
    let (mut rt, env) = runtime_and_env();
    let raised = rt.run_block(&env, None, &[], None).unwrap_err();
    assert_eq!(raised_class_name(&rt, raised), "LocalJumpError");
}

#[test]
fn raise_exception_keeps_an_existing_backtrace() {
    let (mut rt, env) = runtime_and_env();
    let file: Rc<str> = Rc::from("a.qz");
    env.set_location(&file, 1);
    let Raised::Exception(exc) = rt.raise(&env, "TypeError", "first".to_string()) else {
        unreachable!()
    };
    let original = rt.exception_backtrace(exc).unwrap().to_vec();

    let file: Rc<str> = Rc::from("b.qz");
    env.set_location(&file, 2);
    let Raised::Exception(same) = rt.raise_exception(&env, exc) else {
        unreachable!()
    };
    assert_eq!(same, exc);
    assert_eq!(rt.exception_backtrace(exc).unwrap(), &original[..]);
}
