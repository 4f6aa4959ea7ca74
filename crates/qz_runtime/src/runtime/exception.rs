//! The exception pipeline: raising, backtrace capture, top-level
//! reporting, `SystemExit`, and at-exit handlers.

use std::fmt::Write as _;

use tracing::debug;

use crate::core::{Env, ObjectKind, Value};
use crate::errors::messages;

use super::{Raised, Runtime};

/// Global array of procs run when the process exits through `SystemExit`,
/// most recently registered first.
pub const AT_EXIT_HANDLERS_GLOBAL: &str = "$QZ_at_exit_handlers";

fn write_to_fd(fd: i32, bytes: &[u8]) {
    let mut written = 0;
    while written < bytes.len() {
        let rest = &bytes[written..];
        let n = unsafe { libc::write(fd, rest.as_ptr() as *const libc::c_void, rest.len()) };
        if n <= 0 {
            break;
        }
        written += n as usize;
    }
}

/// Stamp the exception onto the raising frame, then walk the dynamic chain
/// until a rescue-flagged frame takes it; without one, the top frame keeps
/// it for the top-level handler.
fn store_exception(env: &Env, exception: Value) {
    env.set_exception(Some(exception));
    let mut current = env.clone();
    while !current.rescue() {
        let Some(caller) = current.caller() else {
            break;
        };
        current = caller;
    }
    current.set_exception(Some(exception));
}

impl Runtime {
    /// Construct an exception of the named class (a constant on `Object`),
    /// capture a backtrace from the dynamic chain, store it in the env's
    /// exception slot, and hand back the unwind token.
    pub fn raise(&mut self, env: &Env, class_name: &str, message: String) -> Raised {
        debug!(class = class_name, message = %message, "raise");
        let class_value = self.const_get_or_null(Value::object(self.core.object_class), class_name);
        let class_id = match class_value {
            Some(v) if self.is_class(v) => v.as_object_id(),
            _ => self.core.exception_class,
        };
        let backtrace = self.build_backtrace(env);
        let exception = self.exception_alloc(class_id, message, backtrace);
        store_exception(env, exception);
        Raised::Exception(exception)
    }

    /// Re-raise an existing exception value, capturing a backtrace only if
    /// it does not carry one yet.
    pub fn raise_exception(&mut self, env: &Env, exception: Value) -> Raised {
        let needs_backtrace = self
            .exception_backtrace(exception)
            .is_some_and(|bt| bt.is_empty());
        if needs_backtrace {
            let backtrace = self.build_backtrace(env);
            if let ObjectKind::Exception(e) =
                &mut self.heap.get_mut(exception.as_object_id()).kind
            {
                e.backtrace = backtrace;
            }
        }
        store_exception(env, exception);
        Raised::Exception(exception)
    }

    /// One `file:line:in 'method'` entry per dynamic frame, innermost
    /// first.
    pub fn build_backtrace(&self, env: &Env) -> Vec<String> {
        let mut backtrace = Vec::new();
        let mut current = Some(env.clone());
        while let Some(e) = current {
            let entry = match e.method_name() {
                Some(name) => format!("{}:{}:in '{}'", e.file(), e.line(), name),
                None => format!("{}:{}", e.file(), e.line()),
            };
            backtrace.push(entry);
            current = e.caller();
        }
        backtrace
    }

    /// The report printed for an uncaught exception: outermost frames
    /// first, the raise site fused with the message line.
    pub fn format_exception_report(&self, exception: Value) -> String {
        let message = self.exception_message(exception).unwrap_or("").to_string();
        let class_name = self.class_name_of(exception);
        let backtrace = self.exception_backtrace(exception).unwrap_or(&[]);

        let mut out = String::new();
        if !backtrace.is_empty() {
            out.push_str(messages::TRACEBACK_HEADER);
            out.push('\n');
            for i in (1..backtrace.len()).rev() {
                let _ = writeln!(out, "        {}: from {}", i, backtrace[i]);
            }
            let _ = write!(out, "{}: ", backtrace[0]);
        }
        let _ = writeln!(out, "{message} ({class_name})");
        out
    }

    pub fn print_exception_with_backtrace(&mut self, env: &Env, exception: Value) {
        let report = self.format_exception_report(exception);
        let fd = env
            .global_get("$stderr")
            .and_then(|io| self.io_fileno(io))
            .unwrap_or(2);
        write_to_fd(fd, report.as_bytes());
    }

    /// Final disposition of an exception that reached the top of the
    /// dynamic chain: `SystemExit` terminates the process (optionally
    /// running at-exit handlers first), anything else prints its report to
    /// `$stderr`.
    pub fn handle_top_level_exception(&mut self, env: &Env, run_exit_handlers: bool) {
        let Some(exception) = env.exception() else {
            return;
        };
        env.set_rescue(false);
        let system_exit =
            self.const_get_or_null(Value::object(self.core.object_class), "SystemExit");
        if system_exit.is_some_and(|se| self.is_a(exception, se)) {
            if run_exit_handlers {
                self.run_at_exit_handlers(env);
            }
            std::process::exit(self.exit_status_of(exception));
        }
        self.print_exception_with_backtrace(env, exception);
    }

    /// The process exit status a `SystemExit` carries: its `@status`
    /// instance variable when that is an integer in `[0, 255]`, else 1.
    pub fn exit_status_of(&self, exception: Value) -> i32 {
        let status = self.ivar_get(exception, "@status");
        if status.is_integer() {
            let v = status.as_integer();
            if (0..=255).contains(&v) {
                return v as i32;
            }
        }
        1
    }

    /// Register a proc to run when the process exits normally.
    pub fn at_exit(&mut self, env: &Env, proc: Value) {
        debug_assert!(self.is_proc(proc));
        let handlers = match env.global_get(AT_EXIT_HANDLERS_GLOBAL) {
            Some(v) if self.is_array(v) => v,
            _ => {
                let ary = self.array_new(Vec::new());
                env.global_set(AT_EXIT_HANDLERS_GLOBAL, ary);
                ary
            }
        };
        self.array_push(handlers, proc);
    }

    /// Run registered at-exit handlers in reverse registration order, each
    /// as a block with no arguments and without propagating a break.
    pub fn run_at_exit_handlers(&mut self, env: &Env) {
        let Some(handlers) = env.global_get(AT_EXIT_HANDLERS_GLOBAL) else {
            return;
        };
        let Some(items) = self.array_items(handlers).cloned() else {
            return;
        };
        for proc in items.iter().rev() {
            let block = self
                .proc_block(*proc)
                .expect("at-exit handler is not a Proc");
            let _ = self.run_block_without_break(env, Some(&block), &[], None);
        }
    }
}
