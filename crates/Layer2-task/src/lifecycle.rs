//! Lifecycle Controller
//!
//! pause / resume / stop as state-machine operations. Each one checks the current
//! status and writes the new one under a single store lock acquisition, so a refused
//! call leaves the record untouched.

use crate::state::TaskStatus;
use crate::store::{StoreInner, TaskStore};
use crate::task::TaskId;
use agentpod_foundation::{Error, Resource, Result};
use tracing::{info, warn};

#[derive(Clone)]
pub struct LifecycleController {
    store: TaskStore,
}

impl LifecycleController {
    pub fn new(store: TaskStore) -> Self {
        Self { store }
    }

    /// RUNNING -> PAUSED; closes the pause gate
    pub fn pause(&self, id: &TaskId) -> Result<()> {
        self.apply(id, "pause", &[TaskStatus::Running], TaskStatus::Paused, |inner, id| {
            if let Some(entry) = inner.entry_mut(id) {
                entry.control.gate.close();
            }
        })
    }

    /// PAUSED -> RUNNING; opens the pause gate
    pub fn resume(&self, id: &TaskId) -> Result<()> {
        self.apply(id, "resume", &[TaskStatus::Paused], TaskStatus::Running, |inner, id| {
            if let Some(entry) = inner.entry_mut(id) {
                entry.control.gate.open();
            }
        })
    }

    /// RUNNING or PAUSED -> STOPPED; raises the cancellation signal and cancels the
    /// scheduled unit
    pub fn stop(&self, id: &TaskId) -> Result<()> {
        let from = [TaskStatus::Running, TaskStatus::Paused];
        self.apply(id, "stop", &from, TaskStatus::Stopped, |inner, id| {
            if let Some(entry) = inner.entry_mut(id) {
                entry.control.cancel.cancel();
                // a paused unit must wake up to observe the cancellation
                entry.control.gate.open();
            }
            inner.cancel_unit(id);
        })
    }

    /// Check `from -> next` and run `effect` in the same lock acquisition
    fn apply(
        &self,
        id: &TaskId,
        operation: &'static str,
        from: &[TaskStatus],
        next: TaskStatus,
        effect: impl FnOnce(&mut StoreInner, &TaskId),
    ) -> Result<()> {
        let outcome = self.store.locked(|inner| {
            let entry = match inner.entry_mut(id) {
                Some(entry) => entry,
                None => return Err(Error::not_found(Resource::Task, id)),
            };

            let current = entry.record.status;
            if !from.contains(&current) || !entry.record.transition(next) {
                return Err(Error::invalid_transition(id, current, operation));
            }

            effect(inner, id);
            Ok(current)
        });

        match &outcome {
            Ok(prev) => info!("Task {} {}: {} -> {}", id, operation, prev, next),
            Err(e) => warn!("Refused {} on task {}: {}", operation, id, e),
        }
        outcome.map(|_| ())
    }
}
