//! Task Record Store
//!
//! One record per task behind a single coarse lock. Every operation holds the lock
//! for its full duration and never across an `.await`, so check-and-write sequences
//! are atomic. Absent ids are reported as `None`/`false`; callers decide whether
//! that is a `NotFound`.
//!
//! The store also owns the in-flight registry: one cancellation token per scheduled
//! unit, inserted before the unit is spawned and removed by the unit itself.

use crate::gate::PauseGate;
use crate::state::TaskStatus;
use crate::task::{BrowserData, StepDescriptor, TaskId, TaskRecord};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Per-task control handles shared between the store, the lifecycle controller and
/// the runner
#[derive(Debug, Clone)]
pub struct TaskControl {
    pub gate: PauseGate,
    pub cancel: CancellationToken,
}

impl TaskControl {
    fn new() -> Self {
        Self {
            gate: PauseGate::new(),
            cancel: CancellationToken::new(),
        }
    }
}

pub(crate) struct TaskEntry {
    /// Creation order; breaks ties between equal timestamps
    seq: u64,
    pub(crate) record: TaskRecord,
    pub(crate) control: TaskControl,
    /// Engine step indices already recorded at step boundaries
    pub(crate) boundary_steps: HashSet<usize>,
}

#[derive(Default)]
pub(crate) struct StoreInner {
    entries: HashMap<TaskId, TaskEntry>,
    units: HashMap<TaskId, CancellationToken>,
    next_seq: u64,
}

impl StoreInner {
    pub(crate) fn entry_mut(&mut self, id: &TaskId) -> Option<&mut TaskEntry> {
        self.entries.get_mut(id)
    }

    pub(crate) fn register_unit(&mut self, id: TaskId, token: CancellationToken) {
        self.units.insert(id, token);
    }

    fn insert(&mut self, record: TaskRecord) -> TaskControl {
        let seq = self.next_seq;
        self.next_seq += 1;
        let control = TaskControl::new();
        self.entries.insert(
            record.id,
            TaskEntry {
                seq,
                record,
                control: control.clone(),
                boundary_steps: HashSet::new(),
            },
        );
        control
    }

    /// Cancel and drop the scheduled unit, if one is registered
    pub(crate) fn cancel_unit(&mut self, id: &TaskId) -> bool {
        match self.units.remove(id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }
}

fn new_record(task: impl Into<String>, init: impl FnOnce(&mut TaskRecord)) -> TaskRecord {
    let mut record = TaskRecord::new(TaskId::new(), task);
    init(&mut record);
    // `init` may not pick the status
    record.status = TaskStatus::Created;
    record.finished_at = None;
    record
}

/// In-memory task store
#[derive(Clone, Default)]
pub struct TaskStore {
    inner: Arc<Mutex<StoreInner>>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` with the lock held
    pub(crate) fn locked<R>(&self, f: impl FnOnce(&mut StoreInner) -> R) -> R {
        let mut inner = self.inner.lock();
        f(&mut inner)
    }

    /// Run `f` on one entry with the lock held
    pub(crate) fn update_entry<R>(&self, id: &TaskId, f: impl FnOnce(&mut TaskEntry) -> R) -> Option<R> {
        self.locked(|inner| inner.entries.get_mut(id).map(f))
    }

    // ========================================================================
    // Create / Read
    // ========================================================================

    /// Allocate an id and an initial CREATED record
    pub fn create(&self, task: impl Into<String>) -> TaskId {
        self.create_with(task, |_| {})
    }

    /// Like `create`, letting the caller fill in creation-time fields
    pub fn create_with(&self, task: impl Into<String>, init: impl FnOnce(&mut TaskRecord)) -> TaskId {
        let record = new_record(task, init);
        let id = record.id;
        self.locked(|inner| {
            inner.insert(record);
        });

        debug!("Created task {}", id);
        id
    }

    /// Create a record and move it straight to RUNNING with its unit registered.
    ///
    /// Refused with the current in-flight count when `max_units` units are already
    /// registered. The check, the insert and the registration share one acquisition.
    pub(crate) fn admit(
        &self,
        task: impl Into<String>,
        init: impl FnOnce(&mut TaskRecord),
        max_units: usize,
    ) -> Result<(TaskId, TaskControl, CancellationToken), usize> {
        let mut record = new_record(task, init);
        let id = record.id;
        record.transition(TaskStatus::Running);

        let (control, unit) = self.locked(|inner| {
            if inner.units.len() >= max_units {
                return Err(inner.units.len());
            }
            let control = inner.insert(record);
            let unit = control.cancel.child_token();
            inner.register_unit(id, unit.clone());
            Ok((control, unit))
        })?;

        debug!("Admitted task {}", id);
        Ok((id, control, unit))
    }

    pub fn get(&self, id: &TaskId) -> Option<TaskRecord> {
        self.locked(|inner| inner.entries.get(id).map(|e| e.record.clone()))
    }

    pub fn status(&self, id: &TaskId) -> Option<TaskStatus> {
        self.locked(|inner| inner.entries.get(id).map(|e| e.record.status))
    }

    pub fn control(&self, id: &TaskId) -> Option<TaskControl> {
        self.locked(|inner| inner.entries.get(id).map(|e| e.control.clone()))
    }

    /// Page of records, newest first; `page` is 1-based
    pub fn list(&self, page: usize, limit: usize) -> (Vec<TaskRecord>, usize) {
        self.locked(|inner| {
            let total = inner.entries.len();
            let mut entries: Vec<&TaskEntry> = inner.entries.values().collect();
            entries.sort_by(|a, b| {
                b.record
                    .created_at
                    .cmp(&a.record.created_at)
                    .then(b.seq.cmp(&a.seq))
            });

            let start = page.max(1).saturating_sub(1).saturating_mul(limit);
            let records = entries
                .into_iter()
                .skip(start)
                .take(limit)
                .map(|e| e.record.clone())
                .collect();
            (records, total)
        })
    }

    pub fn len(&self) -> usize {
        self.locked(|inner| inner.entries.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ========================================================================
    // Mutations (all refuse terminal records)
    // ========================================================================

    /// Legal transition only; terminal statuses stamp `finished_at`
    pub fn update_status(&self, id: &TaskId, status: TaskStatus) -> bool {
        self.update_entry(id, |e| e.record.transition(status))
            .unwrap_or(false)
    }

    pub fn append_step(&self, id: &TaskId, step: StepDescriptor) -> bool {
        self.mutate_live(id, |r| r.steps.push(step))
    }

    pub fn append_screenshot(&self, id: &TaskId, reference: impl Into<String>) -> bool {
        let reference = reference.into();
        self.mutate_live(id, |r| r.screenshots.push(reference))
    }

    pub fn append_recording(&self, id: &TaskId, reference: impl Into<String>) -> bool {
        let reference = reference.into();
        self.mutate_live(id, |r| r.recordings.push(reference))
    }

    pub fn append_output_file(&self, id: &TaskId, file_name: impl Into<String>) -> bool {
        let file_name = file_name.into();
        self.mutate_live(id, |r| r.output_files.push(file_name))
    }

    pub fn set_output(&self, id: &TaskId, output: impl Into<String>) -> bool {
        let output = output.into();
        self.mutate_live(id, |r| r.output = Some(output))
    }

    pub fn set_live_url(&self, id: &TaskId, url: impl Into<String>) -> bool {
        let url = url.into();
        self.mutate_live(id, |r| r.live_url = Some(url))
    }

    pub fn set_browser_data(&self, id: &TaskId, data: BrowserData) -> bool {
        self.mutate_live(id, |r| r.browser_data = Some(data))
    }

    fn mutate_live(&self, id: &TaskId, f: impl FnOnce(&mut TaskRecord)) -> bool {
        self.update_entry(id, |e| {
            if e.record.is_terminal() {
                return false;
            }
            f(&mut e.record);
            true
        })
        .unwrap_or(false)
    }

    // ========================================================================
    // Removal
    // ========================================================================

    /// Remove a record that is not running or paused.
    ///
    /// `Ok(None)` when absent, `Err(status)` when the record is still active.
    pub fn remove_inactive(&self, id: &TaskId) -> Result<Option<TaskRecord>, TaskStatus> {
        self.locked(|inner| {
            let status = match inner.entries.get(id) {
                Some(entry) => entry.record.status,
                None => return Ok(None),
            };
            if status.is_active() {
                return Err(status);
            }
            inner.units.remove(id);
            Ok(inner.entries.remove(id).map(|e| e.record))
        })
    }

    // ========================================================================
    // In-flight registry
    // ========================================================================

    /// Drop the unit's registration (called by the unit itself on exit)
    pub fn deregister_unit(&self, id: &TaskId) {
        self.locked(|inner| {
            inner.units.remove(id);
        });
    }

    pub fn is_registered(&self, id: &TaskId) -> bool {
        self.locked(|inner| inner.units.contains_key(id))
    }

    /// Number of scheduled units that have not exited yet
    pub fn in_flight(&self) -> usize {
        self.locked(|inner| inner.units.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(n: usize) -> StepDescriptor {
        StepDescriptor {
            evaluation_previous_goal: format!("Step {} completed", n),
            next_goal: "Execute click".to_string(),
            url: "https://example.com".to_string(),
        }
    }

    #[test]
    fn test_create_and_get() {
        let store = TaskStore::new();
        let id = store.create("open example.com");

        let record = store.get(&id).unwrap();
        assert_eq!(record.task, "open example.com");
        assert_eq!(record.status, TaskStatus::Created);
        assert!(record.output.is_none());
        assert!(store.get(&TaskId::new()).is_none());
    }

    #[test]
    fn test_appends_preserve_order() {
        let store = TaskStore::new();
        let id = store.create("t");
        store.update_status(&id, TaskStatus::Running);

        for n in 0..3 {
            assert!(store.append_step(&id, step(n)));
            assert!(store.append_screenshot(&id, format!("shot-{}.png", n)));
        }

        let record = store.get(&id).unwrap();
        assert_eq!(record.steps.len(), 3);
        assert_eq!(record.steps[2], step(2));
        assert_eq!(record.screenshots, vec!["shot-0.png", "shot-1.png", "shot-2.png"]);
    }

    #[test]
    fn test_terminal_record_is_frozen() {
        let store = TaskStore::new();
        let id = store.create("t");
        assert!(store.update_status(&id, TaskStatus::Running));
        assert!(store.update_status(&id, TaskStatus::Finished));

        let before = store.get(&id).unwrap();
        assert!(before.finished_at.is_some());

        assert!(!store.update_status(&id, TaskStatus::Running));
        assert!(!store.append_step(&id, step(0)));
        assert!(!store.append_output_file(&id, "late.csv"));
        assert!(!store.set_output(&id, "late"));

        let after = store.get(&id).unwrap();
        assert_eq!(after.status, TaskStatus::Finished);
        assert_eq!(after.finished_at, before.finished_at);
        assert!(after.steps.is_empty());
        assert!(after.output.is_none());
    }

    #[test]
    fn test_unknown_id_mutations_are_noops() {
        let store = TaskStore::new();
        let ghost = TaskId::new();
        assert!(!store.update_status(&ghost, TaskStatus::Running));
        assert!(!store.append_screenshot(&ghost, "x.png"));
        assert!(store.is_empty());
    }

    #[test]
    fn test_list_newest_first_and_paged() {
        let store = TaskStore::new();
        let ids: Vec<TaskId> = (0..7).map(|n| store.create(format!("task {}", n))).collect();

        let (page1, total) = store.list(1, 5);
        assert_eq!(total, 7);
        assert_eq!(page1.len(), 5);
        assert_eq!(page1[0].id, ids[6]);
        assert_eq!(page1[4].id, ids[2]);

        let (page2, _) = store.list(2, 5);
        assert_eq!(page2.iter().map(|r| r.id).collect::<Vec<_>>(), vec![ids[1], ids[0]]);

        let (page3, _) = store.list(3, 5);
        assert!(page3.is_empty());
    }

    #[test]
    fn test_list_empty_store() {
        let (records, total) = TaskStore::new().list(2, 5);
        assert!(records.is_empty());
        assert_eq!(total, 0);
    }

    #[test]
    fn test_remove_inactive() {
        let store = TaskStore::new();
        let created = store.create("a");
        let running = store.create("b");
        store.update_status(&running, TaskStatus::Running);

        assert!(store.remove_inactive(&created).unwrap().is_some());
        assert_eq!(store.remove_inactive(&running).unwrap_err(), TaskStatus::Running);
        assert!(store.remove_inactive(&TaskId::new()).unwrap().is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_unit_registry() {
        let store = TaskStore::new();
        let id = store.create("a");
        let token = CancellationToken::new();

        store.locked(|inner| inner.register_unit(id, token.clone()));
        assert!(store.is_registered(&id));
        assert_eq!(store.in_flight(), 1);

        assert!(store.locked(|inner| inner.cancel_unit(&id)));
        assert!(token.is_cancelled());
        assert_eq!(store.in_flight(), 0);

        // deregistering twice is harmless
        store.deregister_unit(&id);
        store.deregister_unit(&id);
    }
}
