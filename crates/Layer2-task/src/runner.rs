//! Execution Runner
//!
//! Launch moves a record CREATED -> RUNNING and registers its unit in one lock
//! acquisition, then spawns the unit. The unit drives the engine, honors the pause
//! gate and cancellation at every step boundary, writes the terminal outcome through
//! the store, and deregisters itself when it exits, whatever the outcome.

use crate::engine::{AutomationEngine, EngineError, EngineRequest, StepEvent, StepObserver};
use crate::normalizer::{normalize, NormalizedResult};
use crate::state::TaskStatus;
use crate::store::{TaskControl, TaskStore};
use crate::task::{BrowserData, StepDescriptor, TaskId, TaskRecord};
use agentpod_foundation::{Error, Resource, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

#[derive(Clone)]
pub struct ExecutionRunner {
    store: TaskStore,
    engine: Arc<dyn AutomationEngine>,
}

impl ExecutionRunner {
    pub fn new(store: TaskStore, engine: Arc<dyn AutomationEngine>) -> Self {
        Self { store, engine }
    }

    pub fn engine_name(&self) -> &'static str {
        self.engine.name()
    }

    /// Schedule the unit for a CREATED record
    pub fn launch(&self, id: TaskId, request: EngineRequest) -> Result<JoinHandle<()>> {
        let (control, unit) = self.store.locked(|inner| {
            let entry = inner
                .entry_mut(&id)
                .ok_or_else(|| Error::not_found(Resource::Task, id))?;

            let current = entry.record.status;
            if current != TaskStatus::Created || !entry.record.transition(TaskStatus::Running) {
                return Err(Error::invalid_transition(id, current, "launch"));
            }

            let control = entry.control.clone();
            let unit = control.cancel.child_token();
            inner.register_unit(id, unit.clone());
            Ok((control, unit))
        })?;

        Ok(self.spawn_unit(id, request, control, unit))
    }

    /// Create a record and schedule its unit in one step, refusing once `max_units`
    /// units are in flight. `request` builds the engine input for the new id.
    pub fn launch_new(
        &self,
        task: impl Into<String>,
        init: impl FnOnce(&mut TaskRecord),
        max_units: usize,
        request: impl FnOnce(TaskId) -> EngineRequest,
    ) -> Result<(TaskId, JoinHandle<()>)> {
        let (id, control, unit) = self
            .store
            .admit(task, init, max_units)
            .map_err(|in_flight| {
                Error::InvalidInput(format!(
                    "too many running tasks ({} of {})",
                    in_flight, max_units
                ))
            })?;

        let handle = self.spawn_unit(id, request(id), control, unit);
        Ok((id, handle))
    }

    fn spawn_unit(
        &self,
        id: TaskId,
        request: EngineRequest,
        control: TaskControl,
        unit: CancellationToken,
    ) -> JoinHandle<()> {
        info!("Task {} launched on {} engine", id, self.engine.name());

        let unit_future = run_unit(
            self.store.clone(),
            Arc::clone(&self.engine),
            id,
            request,
            control,
            unit,
        );
        tokio::spawn(unit_future.instrument(info_span!("task", task_id = %id)))
    }
}

// ============================================================================
// Unit
// ============================================================================

/// Deregisters the unit when the future completes or is dropped
struct UnitGuard {
    store: TaskStore,
    id: TaskId,
}

impl Drop for UnitGuard {
    fn drop(&mut self) {
        self.store.deregister_unit(&self.id);
        debug!("Task {} unit deregistered", self.id);
    }
}

enum Outcome {
    Completed(NormalizedResult),
    Fault(String),
    Cancelled,
}

enum Finalize {
    Written(TaskStatus),
    Discarded(TaskStatus),
    Paused,
}

async fn run_unit(
    store: TaskStore,
    engine: Arc<dyn AutomationEngine>,
    id: TaskId,
    request: EngineRequest,
    control: TaskControl,
    unit: CancellationToken,
) {
    let _guard = UnitGuard {
        store: store.clone(),
        id,
    };
    let save_browser_data = request.settings.save_browser_data;
    let observer = TaskObserver {
        store: store.clone(),
        id,
        control: control.clone(),
    };

    let result = tokio::select! {
        biased;
        _ = unit.cancelled() => Err(EngineError::Cancelled),
        result = engine.run(request, &observer) => result,
    };

    let outcome = match result {
        Ok(history) => Outcome::Completed(normalize(history.as_ref())),
        Err(EngineError::Cancelled) => Outcome::Cancelled,
        Err(EngineError::Fault(message)) => {
            warn!("Task {} engine fault: {}", id, message);
            Outcome::Fault(message)
        }
    };

    let mut outcome = outcome;
    loop {
        // a paused task holds here until resumed or stopped
        if !matches!(outcome, Outcome::Cancelled) {
            outcome = tokio::select! {
                biased;
                _ = unit.cancelled() => Outcome::Cancelled,
                _ = control.gate.wait_open() => outcome,
            };
        }

        match finalize(&store, id, &outcome, save_browser_data) {
            Finalize::Written(status) => {
                info!("Task {} {}", id, status);
                break;
            }
            Finalize::Discarded(status) => {
                debug!("Task {} outcome discarded, record is {}", id, status);
                break;
            }
            Finalize::Paused => continue,
        }
    }
}

/// Write the terminal outcome if the record is still RUNNING.
///
/// Normalized steps are merged by engine step index, so steps recorded at a
/// boundary are not repeated even when malformed actions were dropped.
fn finalize(store: &TaskStore, id: TaskId, outcome: &Outcome, save_browser_data: bool) -> Finalize {
    let written = store.update_entry(&id, |entry| {
        let record = &mut entry.record;

        match outcome {
            Outcome::Cancelled => {
                return if record.transition(TaskStatus::Stopped) {
                    Finalize::Written(TaskStatus::Stopped)
                } else {
                    Finalize::Discarded(record.status)
                };
            }
            _ if record.status == TaskStatus::Paused => return Finalize::Paused,
            _ if record.status != TaskStatus::Running => return Finalize::Discarded(record.status),
            _ => {}
        }

        match outcome {
            Outcome::Completed(result) => {
                // steps reported at a boundary are already recorded
                let missing = result
                    .step_indices
                    .iter()
                    .zip(&result.steps)
                    .filter(|(index, _)| !entry.boundary_steps.contains(index))
                    .map(|(_, step)| step.clone());
                record.steps.extend(missing);
                for shot in &result.screenshots {
                    if !record.screenshots.contains(shot) {
                        record.screenshots.push(shot.clone());
                    }
                }
                record.recordings.extend(result.recordings.iter().cloned());
                record.output_files.extend(result.output_files.iter().cloned());
                record.output = result.output.clone();

                if save_browser_data {
                    if let Some(cookies) = &result.cookies {
                        record.browser_data = Some(BrowserData {
                            cookies: cookies.clone(),
                        });
                    }
                }

                record.transition(TaskStatus::Finished);
                Finalize::Written(TaskStatus::Finished)
            }
            Outcome::Fault(message) => {
                record.output = Some(message.clone());
                record.transition(TaskStatus::Failed);
                Finalize::Written(TaskStatus::Failed)
            }
            Outcome::Cancelled => Finalize::Discarded(record.status),
        }
    });

    // record deleted under us
    written.unwrap_or(Finalize::Discarded(TaskStatus::Stopped))
}

// ============================================================================
// Step boundaries
// ============================================================================

struct TaskObserver {
    store: TaskStore,
    id: TaskId,
    control: TaskControl,
}

#[async_trait]
impl StepObserver for TaskObserver {
    async fn on_step(&self, event: StepEvent) -> std::result::Result<(), EngineError> {
        if self.control.cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        let index = event.index;
        let step = StepDescriptor {
            evaluation_previous_goal: event
                .evaluation_previous_goal
                .unwrap_or_else(|| format!("Step {} completed", index)),
            next_goal: event.next_goal.unwrap_or_else(|| {
                format!("Execute {}", event.action.as_deref().unwrap_or("unknown"))
            }),
            url: event.url.unwrap_or_else(|| "unknown".to_string()),
        };
        let screenshot = event.screenshot;
        let live_url = event.live_url;

        let recorded = self
            .store
            .update_entry(&self.id, |entry| {
                if entry.record.is_terminal() {
                    return false;
                }
                entry.record.steps.push(step);
                entry.boundary_steps.insert(index);
                if let Some(reference) = screenshot {
                    entry.record.screenshots.push(reference);
                }
                if live_url.is_some() {
                    entry.record.live_url = live_url;
                }
                true
            })
            .unwrap_or(false);

        if !recorded {
            return Err(EngineError::Cancelled);
        }
        debug!("Task {} step {} recorded", self.id, index);

        if !self.control.gate.is_open() {
            info!("Task {} holding after step {}", self.id, index);
        }
        tokio::select! {
            biased;
            _ = self.control.cancel.cancelled() => Err(EngineError::Cancelled),
            _ = self.control.gate.wait_open() => Ok(()),
        }
    }
}
