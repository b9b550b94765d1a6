//! Per-instance timer registry.
//!
//! Owned by the dispatcher thread, so it needs no locking. A handle present
//! in the registry has not been cleared and, for a timeout, has not fired.

use std::collections::HashMap;
use std::sync::Arc;

use super::{TimerArm, TimerId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TimerKind {
    Timeout,
    Interval,
}

struct TimerRecord<C> {
    kind: TimerKind,
    arm: Arc<TimerArm>,
    callback: C,
}

pub(crate) struct TimerRegistry<C> {
    records: HashMap<TimerId, TimerRecord<C>>,
}

impl<C: Clone> TimerRegistry<C> {
    pub(crate) fn new() -> Self {
        Self {
            records: HashMap::new(),
        }
    }

    pub(crate) fn insert(&mut self, id: TimerId, kind: TimerKind, arm: Arc<TimerArm>, callback: C) {
        self.records.insert(id, TimerRecord { kind, arm, callback });
    }

    /// Clear a timer of the given kind. Unknown handles and handles of the
    /// other kind are left alone.
    pub(crate) fn cancel(&mut self, id: TimerId, kind: TimerKind) -> bool {
        match self.records.get(&id) {
            Some(record) if record.kind == kind => {}
            _ => return false,
        }
        match self.records.remove(&id) {
            Some(record) => {
                record.arm.cancel();
                true
            }
            None => false,
        }
    }

    /// Look up a timer that came due and return the callback to run.
    ///
    /// A timeout is reaped; an interval stays registered and its pending
    /// tick is released so the timer thread may queue the next one.
    pub(crate) fn take_due(&mut self, id: TimerId) -> Option<C> {
        let kind = self.records.get(&id)?.kind;
        match kind {
            TimerKind::Timeout => self.records.remove(&id).map(|record| record.callback),
            TimerKind::Interval => {
                let record = self.records.get(&id)?;
                record.arm.clear_pending();
                Some(record.callback.clone())
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, id: TimerId) -> bool {
        self.records.contains_key(&id)
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Cancel every timer.
    pub(crate) fn clear(&mut self) {
        for (_, record) in self.records.drain() {
            record.arm.cancel();
        }
    }
}

impl<C: Clone> Default for TimerRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}
