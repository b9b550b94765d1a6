//! Scheduling: the dispatcher queue, the timer thread, and per-instance
//! timer registries.
//!
//! Foreign threads (the timer thread, HTTP connection threads) never touch an
//! engine. They post [`Task`]s into the [`Dispatcher`], which is drained by the
//! thread that owns the [`Runtime`](crate::Runtime).

mod dispatcher;
mod registry;
mod timer;

use std::fmt;

pub use dispatcher::ShutdownHandle;
pub(crate) use dispatcher::{DispatchHandle, Dispatcher, Task};
pub(crate) use registry::{TimerKind, TimerRegistry};
pub(crate) use timer::{TimerArm, TimerThread};

/// Handle returned by `setTimeout` / `setInterval`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u64);

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
