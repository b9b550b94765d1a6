//! The dispatcher queue.
//!
//! One unbounded FIFO per [`Runtime`](crate::Runtime). Producers hold a
//! [`DispatchHandle`]; the owning thread pops tasks and runs them one at a
//! time, so script callbacks never overlap.

use crossbeam::channel::{self, Receiver, Sender};

use super::TimerId;
use crate::instance::InstanceId;

/// Work item for the dispatcher.
#[derive(Debug)]
pub(crate) enum Task {
    /// A timer armed by `instance` came due.
    Timer { instance: InstanceId, timer: TimerId },
    /// An HTTP request is waiting in the pending registry. `done` is
    /// signalled once the handler has run.
    Request {
        instance: InstanceId,
        request: u64,
        done: Sender<()>,
    },
    /// Stop the run loop after the tasks queued before this one.
    Shutdown,
}

/// Producer side of the dispatcher queue.
#[derive(Debug, Clone)]
pub(crate) struct DispatchHandle {
    tx: Sender<Task>,
}

impl DispatchHandle {
    /// Enqueue without waiting. Returns false once the dispatcher is gone.
    pub(crate) fn post(&self, task: Task) -> bool {
        self.tx.send(task).is_ok()
    }

    /// Enqueue the task built by `make` and block until it completes.
    ///
    /// Returns false if the task was dropped without running.
    pub(crate) fn call(&self, make: impl FnOnce(Sender<()>) -> Task) -> bool {
        let (done_tx, done_rx) = channel::bounded(1);
        if !self.post(make(done_tx)) {
            return false;
        }
        done_rx.recv().is_ok()
    }
}

/// Thread-safe handle that asks a running [`Runtime`](crate::Runtime) to
/// stop.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    dispatch: DispatchHandle,
}

impl ShutdownHandle {
    pub(crate) fn new(dispatch: DispatchHandle) -> Self {
        Self { dispatch }
    }

    /// Request shutdown. Tasks queued before the request still run.
    pub fn shutdown(&self) {
        if !self.dispatch.post(Task::Shutdown) {
            tracing::debug!("shutdown requested after the runtime was dropped");
        }
    }
}

/// Consumer side of the dispatcher queue.
pub(crate) struct Dispatcher {
    rx: Receiver<Task>,
    handle: DispatchHandle,
}

impl Dispatcher {
    pub(crate) fn new() -> Self {
        let (tx, rx) = channel::unbounded();
        Self {
            rx,
            handle: DispatchHandle { tx },
        }
    }

    pub(crate) fn handle(&self) -> DispatchHandle {
        self.handle.clone()
    }

    pub(crate) fn try_next(&self) -> Option<Task> {
        self.rx.try_recv().ok()
    }

    /// Block until a task arrives.
    pub(crate) fn next(&self) -> Option<Task> {
        self.rx.recv().ok()
    }

    /// Block for at most `timeout`.
    #[cfg(test)]
    pub(crate) fn next_timeout(&self, timeout: std::time::Duration) -> Option<Task> {
        self.rx.recv_timeout(timeout).ok()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.rx.len()
    }
}
