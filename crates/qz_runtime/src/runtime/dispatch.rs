//! The dispatcher: `send`, invocation on a resolved class, and the
//! begin/rescue scopes. This is the only component that synthesizes call
//! environments; every other component routes through it.

use std::rc::Rc;

use tracing::trace;

use crate::core::heap::ObjectId;
use crate::core::{Block, Env, Value};
use crate::errors::messages;

use super::{BeginFn, Raised, RtResult, Runtime};

impl Runtime {
    /// Invoke `name` on `receiver`. Integers dispatch straight to the
    /// Integer class; everything else consults the receiver's singleton
    /// class first, then its class chain.
    pub fn send(
        &mut self,
        env: &Env,
        receiver: Value,
        name: &str,
        args: &[Value],
        block: Option<&Rc<Block>>,
    ) -> RtResult<Value> {
        let klass: ObjectId;
        if receiver.is_integer() {
            klass = self.core.integer_class;
        } else {
            if let Some(singleton) = self.singleton_class_of(receiver) {
                if let Some((method, _)) = self.find_method(singleton, name) {
                    if method.undefined {
                        let class_name = self.class_name_of(receiver);
                        return Err(self.raise(
                            env,
                            "NoMethodError",
                            messages::undefined_method(name, &class_name),
                        ));
                    }
                    let instance_class = self.class_of(receiver);
                    return self.call_method_on_class(
                        env,
                        singleton,
                        instance_class,
                        name,
                        receiver,
                        args,
                        block,
                    );
                }
            }
            klass = self.class_of(receiver);
        }
        self.call_method_on_class(env, klass, klass, name, receiver, args, block)
    }

    /// Resolve `method_name` on `klass` and invoke it. The call env's outer
    /// link is the method's captured env when it has one, otherwise the
    /// defining module's env; the call site's file, line, method name and
    /// block are stamped onto the new frame.
    pub fn call_method_on_class(
        &mut self,
        env: &Env,
        klass: ObjectId,
        instance_class: ObjectId,
        method_name: &str,
        self_value: Value,
        args: &[Value],
        block: Option<&Rc<Block>>,
    ) -> RtResult<Value> {
        match self.find_method(klass, method_name) {
            Some((method, defining_module)) if !method.undefined => {
                trace!(
                    method = method_name,
                    defined_in = %self.module_name(defining_module),
                    "dispatch"
                );
                let closure_env = match &method.env {
                    Some(captured) => captured.clone(),
                    None => self.module_ref(defining_module).env.clone(),
                };
                let call_env = Env::block_env(&closure_env, env);
                call_env.set_location(&env.file(), env.line());
                call_env.set_method_name(method_name);
                call_env.set_block(block.cloned());
                (method.fun)(self, &call_env, self_value, args, block)
            }
            _ => {
                let class_name = self.module_name(instance_class);
                Err(self.raise(
                    env,
                    "NoMethodError",
                    messages::undefined_method(method_name, &class_name),
                ))
            }
        }
    }

    /// A begin-scope: a fresh frame over the current env, used by compiled
    /// `begin` bodies.
    pub fn call_begin(&mut self, env: &Env, self_value: Value, fun: BeginFn) -> RtResult<Value> {
        let begin_env = Env::block_env(env, env);
        fun(self, &begin_env, self_value)
    }

    /// Run `body` under a rescue-flagged frame. A raise unwinding into this
    /// frame clears the exception slot and resumes in `handler`, which
    /// receives the exception value. A block `break` passes through.
    pub fn rescue<B, H>(
        &mut self,
        env: &Env,
        self_value: Value,
        body: B,
        handler: H,
    ) -> RtResult<Value>
    where
        B: FnOnce(&mut Runtime, &Env, Value) -> RtResult<Value>,
        H: FnOnce(&mut Runtime, &Env, Value, Value) -> RtResult<Value>,
    {
        let begin_env = Env::block_env(env, env);
        begin_env.set_rescue(true);
        match body(self, &begin_env, self_value) {
            Err(Raised::Exception(exception)) => {
                begin_env.set_rescue(false);
                begin_env.set_exception(None);
                handler(self, &begin_env, self_value, exception)
            }
            other => other,
        }
    }
}
