//! Runtime error types.
//!
//! Host functions return `Result<_, RuntimeError>`; the binding layer turns an
//! error into a thrown script `Error` whose `name` is [`RuntimeError::name`].

use std::path::PathBuf;

use rquickjs::{Coerced, Ctx, Exception, FromJs, Value};

use crate::instance::InstanceId;

/// Errors that can occur while loading, evaluating, or calling into scripts.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// File or socket I/O error
    #[error("{0}")]
    Io(#[from] std::io::Error),

    /// `require` could not read the module file
    #[error("Module not found: {} ({reason})", path.display())]
    ModuleNotFound {
        /// Requested module name
        name: String,
        /// Resolved file path
        path: PathBuf,
        /// Underlying read failure
        reason: String,
    },

    /// The module file threw while being evaluated
    #[error("Error in module '{name}': {message}")]
    ModuleEvaluation {
        /// Requested module name
        name: String,
        /// Description of the thrown value
        message: String,
    },

    /// Malformed argument passed to a host function
    #[error("{0}")]
    InvalidArgument(String),

    /// Uncaught exception during script evaluation
    #[error("{0}")]
    Script(String),

    /// A call tried to enter an instance that is already executing
    #[error("engine instance {0} is already executing")]
    InstanceBusy(InstanceId),

    /// A call targeted an instance that has been torn down
    #[error("engine instance {0} no longer exists")]
    InstanceGone(InstanceId),

    /// Engine-level failure (allocation, conversion, ...)
    #[error("engine error: {0}")]
    Engine(#[from] rquickjs::Error),
}

impl RuntimeError {
    /// Script-visible error name.
    pub fn name(&self) -> &'static str {
        match self {
            RuntimeError::Io(_) => "IOError",
            RuntimeError::ModuleNotFound { .. } => "ModuleNotFound",
            RuntimeError::ModuleEvaluation { .. } => "ModuleEvaluationError",
            RuntimeError::InvalidArgument(_) => "InvalidArgument",
            RuntimeError::Script(_) => "ScriptError",
            RuntimeError::InstanceBusy(_) => "InstanceBusy",
            RuntimeError::InstanceGone(_) => "InstanceGone",
            RuntimeError::Engine(_) => "EngineError",
        }
    }

    /// Raise this error as a script exception in `ctx`.
    ///
    /// Engine errors are passed through untouched so a pending exception
    /// stays the one the script sees.
    pub(crate) fn throw(self, ctx: &Ctx<'_>) -> rquickjs::Error {
        if let RuntimeError::Engine(err) = self {
            return err;
        }
        let message = self.to_string();
        match Exception::from_message(ctx.clone(), &message) {
            Ok(exception) => {
                if let Err(err) = exception.as_object().set("name", self.name()) {
                    return err;
                }
                ctx.throw(exception.into_object().into_value())
            }
            Err(err) => err,
        }
    }
}

/// Convert an engine error into a [`RuntimeError`], catching the pending
/// exception if there is one.
pub(crate) fn script_error(ctx: &Ctx<'_>, err: rquickjs::Error) -> RuntimeError {
    match err {
        rquickjs::Error::Exception => RuntimeError::Script(describe_exception(ctx, ctx.catch())),
        other => RuntimeError::Engine(other),
    }
}

/// Render a thrown value as `Name: message`, or its string coercion.
pub(crate) fn describe_exception<'js>(ctx: &Ctx<'js>, caught: Value<'js>) -> String {
    if let Some(obj) = caught.as_object() {
        if let Some(exception) = Exception::from_object(obj.clone()) {
            let message = exception.message().unwrap_or_default();
            let name: Option<String> = obj.get("name").ok().flatten();
            return match name {
                Some(name) if !name.is_empty() => format!("{name}: {message}"),
                _ => message,
            };
        }
    }

    match Coerced::<String>::from_js(ctx, caught) {
        Ok(value) => value.0,
        Err(err) => format!("(unprintable exception: {err})"),
    }
}
