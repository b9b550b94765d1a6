//! Host API surface registered onto every engine instance.
//!
//! Each submodule installs one global (`console`, `fs`, `process`, the timer
//! functions, `http`, and `require` on the root instance). Host functions
//! capture a [`Scope`] holding weak references back to the runtime, so the
//! engine heap never keeps the runtime alive.

mod console;
mod fs;
mod http;
mod process;
mod require;
mod timers;

use std::rc::{Rc, Weak};

use rquickjs::function::{Func, Rest, This};
use rquickjs::{Coerced, Ctx, FromJs, Value};

use crate::error::RuntimeError;
use crate::instance::{EngineInstance, InstanceId, InstanceRole};
use crate::runtime::Shared;

/// What a host function needs to reach outside its own engine.
#[derive(Clone)]
pub(crate) struct Scope {
    pub(crate) id: InstanceId,
    pub(crate) shared: Weak<Shared>,
    pub(crate) instance: Weak<EngineInstance>,
}

impl Scope {
    pub(crate) fn shared(&self) -> Result<Rc<Shared>, RuntimeError> {
        self.shared.upgrade().ok_or(RuntimeError::InstanceGone(self.id))
    }

    pub(crate) fn instance(&self) -> Result<Rc<EngineInstance>, RuntimeError> {
        self.instance.upgrade().ok_or(RuntimeError::InstanceGone(self.id))
    }
}

/// Register the host API surface in `ctx`.
pub(crate) fn install(ctx: &Ctx<'_>, scope: &Scope, role: InstanceRole) -> rquickjs::Result<()> {
    let shared = scope.shared().map_err(|err| err.throw(ctx))?;

    console::install(ctx, shared.options.console.clone())?;
    fs::install(ctx)?;
    process::install(ctx, &shared.options.argv)?;
    timers::install(ctx, scope)?;
    http::install(ctx, scope)?;
    if role == InstanceRole::Root {
        require::install(ctx, scope)?;
    }
    Ok(())
}

/// Wrap a variadic host function.
pub(crate) fn native<'js, F>(f: F) -> Func<F, (Ctx<'js>, Rest<Value<'js>>)>
where
    F: Fn(Ctx<'js>, Rest<Value<'js>>) -> rquickjs::Result<Value<'js>> + 'static,
{
    Func::from(f)
}

/// Like [`native`], for functions that read their receiver.
pub(crate) fn method<'js, F>(f: F) -> Func<F, (Ctx<'js>, This<Value<'js>>, Rest<Value<'js>>)>
where
    F: Fn(Ctx<'js>, This<Value<'js>>, Rest<Value<'js>>) -> rquickjs::Result<Value<'js>> + 'static,
{
    Func::from(f)
}

/// Argument `index` coerced to a string. Missing or `undefined` is an
/// `InvalidArgument` naming `what`.
pub(crate) fn string_arg<'js>(
    ctx: &Ctx<'js>,
    args: &Rest<Value<'js>>,
    index: usize,
    what: &str,
) -> Result<String, RuntimeError> {
    match args.0.get(index) {
        Some(value) if !value.is_undefined() => {
            Ok(Coerced::<String>::from_js(ctx, value.clone())?.0)
        }
        _ => Err(RuntimeError::InvalidArgument(format!("{what} is required"))),
    }
}
