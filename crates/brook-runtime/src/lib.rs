//! Brook runtime
//!
//! Embeds a JavaScript engine and exposes a small host API to scripts:
//! `console`, `fs`, `process`, timers, `require` and `http`. Callbacks that
//! originate on other OS threads (timer fires, inbound HTTP requests) are
//! queued on a dispatcher and run one at a time on the thread that owns the
//! [`Runtime`].
//!
//! ```ignore
//! use brook_runtime::{RunMode, Runtime, RuntimeOptions};
//!
//! let runtime = Runtime::new(RuntimeOptions::default())?;
//! runtime.eval("setTimeout(() => console.log('later'), 10)")?;
//! runtime.run(RunMode::UntilIdle);
//! ```

mod bindings;
pub mod config;
pub mod console;
pub mod error;
mod http;
mod instance;
pub mod loader;
mod runtime;
pub mod scheduler;
pub mod transfer;

pub use config::{ConfigError, Manifest, RuntimeOptions};
pub use console::{CapturedOutput, Console};
pub use error::RuntimeError;
pub use instance::InstanceId;
pub use loader::module_path;
pub use runtime::{RunMode, RunOutcome, Runtime};
pub use scheduler::{ShutdownHandle, TimerId};
