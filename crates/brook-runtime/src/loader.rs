//! `require`: load a module file into a fresh engine instance.
//!
//! There is no cache and no search path. Every call reads
//! `<base_path>/modules/<name>.js` again, evaluates it in a new instance
//! carrying its own host API surface and timer registry, and hands the
//! value of its global `exports` back to the caller.
//!
//! Exported functions run in the module's instance. While one of them runs,
//! the calling instance is still busy, so a function passed in from the
//! caller can only be invoked later (from a timer, for example). Calling it
//! synchronously, as in `mod.each(items, fn)`, throws `InstanceBusy` in the
//! module. Callers that need a synchronous callback API should keep that
//! loop on their own side.

use std::path::{Path, PathBuf};

use rquickjs::{Ctx, Value};

use crate::bindings::Scope;
use crate::error::{script_error, RuntimeError};
use crate::instance::{eval_script, InstanceRole};
use crate::transfer::Transfer;

/// File a module name resolves to.
pub fn module_path(base_path: &Path, name: &str) -> PathBuf {
    base_path.join("modules").join(format!("{name}.js"))
}

pub(crate) fn require<'js>(
    ctx: &Ctx<'js>,
    scope: &Scope,
    name: &str,
) -> Result<Value<'js>, RuntimeError> {
    let shared = scope.shared()?;
    let caller = scope.instance()?;

    let path = module_path(&shared.options.base_path, name);
    let source = brook_posix::fs::read_text_file(&path).map_err(|err| RuntimeError::ModuleNotFound {
        name: name.to_string(),
        path: path.clone(),
        reason: err.to_string(),
    })?;

    let module = shared.spawn_instance(InstanceRole::Module, name)?;
    tracing::debug!(
        module = name,
        instance = %module.id(),
        path = %path.display(),
        "loading module"
    );

    let transfer = Transfer::new(module.clone(), caller);
    module.enter(|mctx| {
        if let Err(err) = eval_script(&mctx, source) {
            let message = match script_error(&mctx, err) {
                RuntimeError::Script(message) => message,
                other => other.to_string(),
            };
            tracing::error!(module = name, "module evaluation failed: {}", message);
            return Err(RuntimeError::ModuleEvaluation {
                name: name.to_string(),
                message,
            });
        }
        let exports: Value = mctx.globals().get("exports")?;
        transfer.copy(&mctx, ctx, exports)
    })
}
