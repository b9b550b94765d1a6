//! Timer thread
//!
//! Arms timeouts and intervals on one OS thread that waits for the next wake
//! time with a condvar timeout. A firing never runs script code: it posts a
//! [`Task::Timer`] to the dispatcher.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use super::{DispatchHandle, Task, TimerId};
use crate::instance::InstanceId;

/// Timer-thread side of a timer: shared between the heap entry and the
/// registry record.
#[derive(Debug, Default)]
pub(crate) struct TimerArm {
    cancelled: AtomicBool,
    /// A tick is sitting in the dispatcher queue.
    pending: AtomicBool,
}

impl TimerArm {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn cancel(&self) {
        self.cancelled.store(true, AtomicOrdering::Release);
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancelled.load(AtomicOrdering::Acquire)
    }

    /// Claim the pending slot. Fails if a tick is already queued.
    pub(crate) fn try_mark_pending(&self) -> bool {
        self.pending
            .compare_exchange(false, true, AtomicOrdering::AcqRel, AtomicOrdering::Acquire)
            .is_ok()
    }

    pub(crate) fn clear_pending(&self) {
        self.pending.store(false, AtomicOrdering::Release);
    }
}

/// Entry in the timer heap
struct TimerEntry {
    wake_at: Instant,
    /// Tie-breaker so equal wake times fire in arming order
    seq: u64,
    instance: InstanceId,
    timer: TimerId,
    /// Set for intervals
    period: Option<Duration>,
    arm: Arc<TimerArm>,
}

// Reverse ordering for min-heap (earliest wake time first)
impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .wake_at
            .cmp(&self.wake_at)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.wake_at == other.wake_at && self.seq == other.seq
    }
}

impl Eq for TimerEntry {}

struct TimerState {
    armed: BinaryHeap<TimerEntry>,
    next_seq: u64,
}

impl TimerState {
    fn push(&mut self, mut entry: TimerEntry) {
        entry.seq = self.next_seq;
        self.next_seq += 1;
        self.armed.push(entry);
    }
}

/// Timer thread shared by every instance of one runtime.
pub(crate) struct TimerThread {
    state: Mutex<TimerState>,
    /// Wakes the thread when an earlier entry is armed or on shutdown
    notify: Condvar,
    shutdown: AtomicBool,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl TimerThread {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Start the timer thread, posting fires to `dispatch`.
    pub(crate) fn start(self: &Arc<Self>, dispatch: DispatchHandle) -> io::Result<()> {
        let timer = Arc::clone(self);
        let handle = thread::Builder::new()
            .name("brook-timer".to_string())
            .spawn(move || timer.run_loop(dispatch))?;
        *self.handle.lock() = Some(handle);
        Ok(())
    }

    /// Stop the timer thread
    pub(crate) fn stop(&self) {
        self.shutdown.store(true, AtomicOrdering::Release);
        {
            let _state = self.state.lock();
            self.notify.notify_one();
        }

        if let Some(handle) = self.handle.lock().take() {
            let start = Instant::now();
            let timeout = Duration::from_secs(2);
            loop {
                if handle.is_finished() {
                    let _ = handle.join();
                    return;
                }
                if start.elapsed() > timeout {
                    tracing::warn!("timer thread did not stop within {:?}", timeout);
                    return;
                }
                thread::sleep(Duration::from_millis(5));
            }
        }
    }

    /// Arm a timer. `period` makes it repeat at a fixed rate after the first
    /// fire at `now + delay`.
    pub(crate) fn arm(
        &self,
        instance: InstanceId,
        timer: TimerId,
        delay: Duration,
        period: Option<Duration>,
        arm: Arc<TimerArm>,
    ) {
        let wake_at = Instant::now() + delay;
        let mut state = self.state.lock();
        state.push(TimerEntry {
            wake_at,
            seq: 0,
            instance,
            timer,
            period,
            arm,
        });
        tracing::trace!(%instance, %timer, ?delay, ?period, "timer armed");
        self.notify.notify_one();
    }

    fn run_loop(&self, dispatch: DispatchHandle) {
        loop {
            if self.shutdown.load(AtomicOrdering::Acquire) {
                break;
            }

            let mut state = self.state.lock();

            // stop() may have notified between the check above and the lock
            if self.shutdown.load(AtomicOrdering::Acquire) {
                break;
            }

            let now = Instant::now();
            while state.armed.peek().is_some_and(|entry| entry.wake_at <= now) {
                let Some(mut entry) = state.armed.pop() else {
                    break;
                };
                if entry.arm.is_cancelled() {
                    continue;
                }

                if entry.arm.try_mark_pending() {
                    let task = Task::Timer {
                        instance: entry.instance,
                        timer: entry.timer,
                    };
                    if !dispatch.post(task) {
                        tracing::debug!("dispatcher gone, timer thread exiting");
                        return;
                    }
                } else {
                    tracing::trace!(
                        instance = %entry.instance,
                        timer = %entry.timer,
                        "tick dropped, previous one still queued"
                    );
                }

                if let Some(period) = entry.period {
                    let mut next = entry.wake_at + period;
                    while next <= now {
                        next += period;
                    }
                    entry.wake_at = next;
                    state.push(entry);
                }
            }

            match state.armed.peek().map(|entry| entry.wake_at) {
                Some(wake_at) => {
                    let now = Instant::now();
                    if wake_at > now {
                        self.notify.wait_for(&mut state, wake_at - now);
                    }
                }
                None => self.notify.wait(&mut state),
            }
        }

        tracing::debug!("timer thread shutting down");
    }

    /// Number of armed entries, cancelled ones included until they surface.
    #[cfg(test)]
    pub(crate) fn armed_count(&self) -> usize {
        self.state.lock().armed.len()
    }
}

impl Default for TimerThread {
    fn default() -> Self {
        Self {
            state: Mutex::new(TimerState {
                armed: BinaryHeap::new(),
                next_seq: 0,
            }),
            notify: Condvar::new(),
            shutdown: AtomicBool::new(false),
            handle: Mutex::new(None),
        }
    }
}

impl Drop for TimerThread {
    fn drop(&mut self) {
        self.stop();
    }
}
