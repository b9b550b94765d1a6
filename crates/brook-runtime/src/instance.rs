//! Engine instances.
//!
//! An [`EngineInstance`] owns one engine runtime and one context. Instances
//! never share a heap: values cross between them through
//! [`transfer`](crate::transfer), and every script-visible handle an
//! instance keeps (timer callbacks, exported functions, the HTTP handler) is
//! stored here so it is released before the engine itself.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;

use rquickjs::context::EvalOptions;
use rquickjs::{Context, Ctx, Function, Persistent, Value};

use crate::console::Console;
use crate::error::{describe_exception, RuntimeError};
use crate::scheduler::TimerRegistry;

/// Identifier of an engine instance within one [`Runtime`](crate::Runtime).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(pub u64);

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What an instance was created for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceRole {
    /// Bound to the entry script; the only instance with `require`.
    Root,
    /// Created by `require` for one module evaluation.
    Module,
}

/// A function kept alive so another instance can call it.
#[derive(Clone)]
pub(crate) struct Retained {
    function: Persistent<Function<'static>>,
    this: Option<Persistent<Value<'static>>>,
}

pub(crate) type TimerCallback = Persistent<Function<'static>>;

/// One engine runtime + context with its own globals and timer registry.
pub(crate) struct EngineInstance {
    id: InstanceId,
    role: InstanceRole,
    label: String,
    busy: Cell<bool>,
    timers: RefCell<TimerRegistry<TimerCallback>>,
    functions: RefCell<HashMap<usize, Retained>>,
    next_slot: Cell<usize>,
    http_handler: RefCell<Option<Persistent<Function<'static>>>>,
    // `context` must drop before `runtime`.
    context: Context,
    runtime: rquickjs::Runtime,
}

struct BusyGuard<'a>(&'a Cell<bool>);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl EngineInstance {
    pub(crate) fn new(
        id: InstanceId,
        role: InstanceRole,
        label: impl Into<String>,
    ) -> Result<Self, RuntimeError> {
        let runtime = rquickjs::Runtime::new()?;
        let context = Context::full(&runtime)?;
        Ok(Self {
            id,
            role,
            label: label.into(),
            busy: Cell::new(false),
            timers: RefCell::new(TimerRegistry::new()),
            functions: RefCell::new(HashMap::new()),
            next_slot: Cell::new(0),
            http_handler: RefCell::new(None),
            context,
            runtime,
        })
    }

    pub(crate) fn id(&self) -> InstanceId {
        self.id
    }

    /// Whether script code of this instance is on the stack right now.
    #[cfg(test)]
    pub(crate) fn is_busy(&self) -> bool {
        self.busy.get()
    }

    /// Run `f` inside this instance's context.
    ///
    /// Fails with [`RuntimeError::InstanceBusy`] instead of re-entering an
    /// instance that is already executing.
    pub(crate) fn enter<F, R>(&self, f: F) -> Result<R, RuntimeError>
    where
        F: for<'js> FnOnce(Ctx<'js>) -> Result<R, RuntimeError>,
    {
        if self.busy.replace(true) {
            return Err(RuntimeError::InstanceBusy(self.id));
        }
        let _guard = BusyGuard(&self.busy);
        self.context.with(f)
    }

    /// Run queued promise jobs until none are left. Exceptions thrown by a
    /// job are reported to `console` and do not stop the drain.
    pub(crate) fn drain_jobs(&self, console: &Console) {
        if self.busy.replace(true) {
            return;
        }
        let _guard = BusyGuard(&self.busy);
        loop {
            match self.runtime.execute_pending_job() {
                Ok(true) => {}
                Ok(false) => break,
                Err(job) => {
                    let message = job.0.with(|ctx| describe_exception(&ctx, ctx.catch()));
                    report_uncaught(console, self.id, &message);
                }
            }
        }
    }

    /// Keep `function` alive and return the slot other instances use to
    /// call it. The slot stays valid until [`release_function`] or drop.
    ///
    /// [`release_function`]: Self::release_function
    pub(crate) fn retain_function<'js>(
        &self,
        ctx: &Ctx<'js>,
        function: Function<'js>,
        this: Option<Value<'js>>,
    ) -> usize {
        let retained = Retained {
            function: Persistent::save(ctx, function),
            this: this.map(|value| Persistent::save(ctx, value)),
        };
        let slot = self.next_slot.get();
        self.next_slot.set(slot + 1);
        self.functions.borrow_mut().insert(slot, retained);
        slot
    }

    /// Forget a retained function once the last proxy for it is gone.
    pub(crate) fn release_function(&self, slot: usize) {
        // dropping it can drop proxies that release slots here again
        let released = self.functions.borrow_mut().remove(&slot);
        drop(released);
    }

    #[cfg(test)]
    pub(crate) fn retained_count(&self) -> usize {
        self.functions.borrow().len()
    }

    /// Run a full cycle collection of this instance's heap.
    #[cfg(test)]
    pub(crate) fn collect_garbage(&self) {
        self.runtime.run_gc();
    }

    pub(crate) fn retained_function<'js>(
        &self,
        ctx: &Ctx<'js>,
        slot: usize,
    ) -> Result<(Function<'js>, Value<'js>), RuntimeError> {
        let retained = self
            .functions
            .borrow()
            .get(&slot)
            .cloned()
            .ok_or(RuntimeError::InstanceGone(self.id))?;
        let function = retained.function.restore(ctx)?;
        let this = match retained.this {
            Some(this) => this.restore(ctx)?,
            None => Value::new_undefined(ctx.clone()),
        };
        Ok((function, this))
    }

    pub(crate) fn timers(&self) -> &RefCell<TimerRegistry<TimerCallback>> {
        &self.timers
    }

    pub(crate) fn live_timers(&self) -> usize {
        self.timers.borrow().len()
    }

    pub(crate) fn set_http_handler<'js>(&self, ctx: &Ctx<'js>, handler: Function<'js>) {
        *self.http_handler.borrow_mut() = Some(Persistent::save(ctx, handler));
    }

    pub(crate) fn http_handler<'js>(
        &self,
        ctx: &Ctx<'js>,
    ) -> Result<Option<Function<'js>>, RuntimeError> {
        let handler = self.http_handler.borrow().clone();
        match handler {
            Some(handler) => Ok(Some(handler.restore(ctx)?)),
            None => Ok(None),
        }
    }
}

impl fmt::Debug for EngineInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineInstance")
            .field("id", &self.id)
            .field("role", &self.role)
            .field("label", &self.label)
            .field("busy", &self.busy.get())
            .finish_non_exhaustive()
    }
}

impl Drop for EngineInstance {
    fn drop(&mut self) {
        // persistent handles must be released while the engine is alive
        self.timers.get_mut().clear();
        self.functions.get_mut().clear();
        self.http_handler.get_mut().take();
    }
}

/// Evaluate script text as a classic (sloppy-mode) global script, so plain
/// assignments such as `exports = ...` create globals.
pub(crate) fn eval_script<'js>(
    ctx: &Ctx<'js>,
    source: impl Into<Vec<u8>>,
) -> rquickjs::Result<Value<'js>> {
    let mut options = EvalOptions::default();
    options.global = true;
    options.strict = false;
    ctx.eval_with_options(source, options)
}

/// Report an exception nobody caught.
pub(crate) fn report_uncaught(console: &Console, instance: InstanceId, message: &str) {
    tracing::error!(%instance, "uncaught exception: {}", message);
    console.write_line(&format!("Uncaught {message}"));
}
