//! Blocks, procs and lambdas.

use std::rc::Rc;

use crate::core::{Block, Env, Value};
use crate::errors::messages;

use super::{MethodFn, Raised, RtResult, Runtime};

impl Runtime {
    /// Capture the current env (caller link cleared) together with `self`.
    pub fn block_new(&self, env: &Env, self_value: Value, fun: MethodFn) -> Rc<Block> {
        Rc::new(Block {
            fun,
            env: env.capture(),
            self_value,
        })
    }

    /// Invoke a block on a fresh frame over its captured env, with the
    /// current env as the dynamic caller. A missing block raises
    /// `LocalJumpError`.
    pub fn run_block(
        &mut self,
        env: &Env,
        block: Option<&Rc<Block>>,
        args: &[Value],
        inner_block: Option<&Rc<Block>>,
    ) -> RtResult<Value> {
        let Some(block) = block else {
            return Err(self.raise(env, "LocalJumpError", messages::NO_BLOCK_GIVEN.to_string()));
        };
        let block_env = Env::block_env(&block.env, env);
        (block.fun)(self, &block_env, block.self_value, args, inner_block)
    }

    /// Like `run_block`, but a `break` out of the block yields the break
    /// value instead of unwinding further. At-exit handlers run this way.
    pub fn run_block_without_break(
        &mut self,
        env: &Env,
        block: Option<&Rc<Block>>,
        args: &[Value],
        inner_block: Option<&Rc<Block>>,
    ) -> RtResult<Value> {
        match self.run_block(env, block, args, inner_block) {
            Err(Raised::Break(v)) => Ok(v),
            other => other,
        }
    }

    /// Unwrap a `break` that has reached the call that ran the block.
    pub fn catch_break(result: RtResult<Value>) -> RtResult<Value> {
        match result {
            Err(Raised::Break(v)) => Ok(v),
            other => other,
        }
    }

    pub fn proc_new(&mut self, block: Rc<Block>) -> Value {
        self.proc_alloc(block, false)
    }

    /// A lambda is a proc with the strictness flag set.
    pub fn lambda(&mut self, block: Rc<Block>) -> Value {
        self.proc_alloc(block, true)
    }

    /// Wrap a maybe-block: a Proc when present, nil when absent.
    pub fn proc_from_block_maybe(&mut self, block: Option<&Rc<Block>>) -> Value {
        match block {
            Some(block) => self.proc_new(block.clone()),
            None => self.core.nil_obj,
        }
    }

    /// Coerce to a Proc: a Proc passes through, anything responding to
    /// `to_proc` is sent it, everything else is a `TypeError`.
    pub fn to_proc(&mut self, env: &Env, obj: Value) -> RtResult<Value> {
        if self.is_proc(obj) {
            return Ok(obj);
        }
        if self.respond_to(obj, "to_proc") {
            let result = self.send(env, obj, "to_proc", &[], None)?;
            if self.is_proc(result) {
                return Ok(result);
            }
        }
        let class_name = self.class_name_of(obj);
        Err(self.raise(
            env,
            "TypeError",
            messages::wrong_argument_type(&class_name, "Proc"),
        ))
    }
}
