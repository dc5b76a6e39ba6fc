use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::notify::{NotificationGate, Notifier};
use crate::storage::{Snapshot, Storage};
use crate::task::Task;

/// A single state transition on the task collection.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Add {
        id: Uuid,
        text: String,
        due_date: Option<DateTime<Utc>>,
    },
    Toggle(Uuid),
    Delete(Uuid),
    ClearCompleted,
    UpdateNotes {
        id: Uuid,
        notes: String,
    },
    /// Removes the notes field so the task matches one that never had notes.
    ClearNotes(Uuid),
    StartTimer(Uuid),
    StopTimer(Uuid),
    UpdateDueDate {
        id: Uuid,
        due_date: Option<DateTime<Utc>>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Changed,
    Unchanged,
}

impl Applied {
    pub fn changed(self) -> bool {
        self == Self::Changed
    }

    fn from_bool(changed: bool) -> Self {
        if changed {
            Self::Changed
        } else {
            Self::Unchanged
        }
    }
}

/// The in-memory task collection, in insertion order. Knows nothing
/// about persistence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskList {
    tasks: Vec<Task>,
}

impl TaskList {
    pub fn new(tasks: Vec<Task>) -> Self {
        Self { tasks }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, id: Uuid) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    fn get_mut(&mut self, id: Uuid) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|task| task.id == id)
    }

    /// Applies one action. Unknown ids and empty text leave the
    /// collection untouched.
    pub fn apply(&mut self, action: &Action, now: DateTime<Utc>) -> Applied {
        let changed = match action {
            Action::Add { id, text, due_date } => {
                if text.trim().is_empty() || self.get(*id).is_some() {
                    false
                } else {
                    let mut task = Task::new(*id, text.clone(), now);
                    task.due_date = *due_date;
                    self.tasks.push(task);
                    true
                }
            }
            Action::Toggle(id) => match self.get_mut(*id) {
                Some(task) => {
                    task.fold_timer(now);
                    task.completed = !task.completed;
                    true
                }
                None => false,
            },
            Action::Delete(id) => {
                let before = self.tasks.len();
                self.tasks.retain(|task| task.id != *id);
                self.tasks.len() != before
            }
            Action::ClearCompleted => {
                let before = self.tasks.len();
                self.tasks.retain(|task| !task.completed);
                self.tasks.len() != before
            }
            Action::UpdateNotes { id, notes } => match self.get_mut(*id) {
                Some(task) => {
                    task.notes = Some(notes.clone());
                    true
                }
                None => false,
            },
            Action::ClearNotes(id) => self
                .get_mut(*id)
                .map(|task| task.notes.take().is_some())
                .unwrap_or(false),
            // A running timer keeps its reference point, and completed
            // tasks cannot be timed.
            Action::StartTimer(id) => match self.get_mut(*id) {
                Some(task) if !task.completed && task.start_time.is_none() => {
                    task.start_time = Some(now);
                    true
                }
                _ => false,
            },
            Action::StopTimer(id) => self
                .get_mut(*id)
                .map(|task| task.fold_timer(now))
                .unwrap_or(false),
            Action::UpdateDueDate { id, due_date } => match self.get_mut(*id) {
                Some(task) => {
                    task.due_date = *due_date;
                    true
                }
                None => false,
            },
        };

        Applied::from_bool(changed)
    }
}

/// The single owner of the task collection. Every mutation that changes
/// the collection is followed by a synchronous save of the full snapshot.
#[derive(Debug)]
pub struct TaskStore<S: Storage> {
    list: TaskList,
    storage: S,
}

impl<S: Storage> TaskStore<S> {
    #[instrument(skip(storage))]
    pub fn open(storage: S) -> anyhow::Result<Self> {
        let tasks = storage
            .load()?
            .map(|snapshot| snapshot.state.todos)
            .unwrap_or_default();
        info!(count = tasks.len(), "opened task store");
        Ok(Self {
            list: TaskList::new(tasks),
            storage,
        })
    }

    pub fn tasks(&self) -> &[Task] {
        self.list.tasks()
    }

    pub fn get(&self, id: Uuid) -> Option<&Task> {
        self.list.get(id)
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn into_storage(self) -> S {
        self.storage
    }

    /// Replaces the in-memory collection with whatever storage holds now.
    #[instrument(skip(self))]
    pub fn reload(&mut self) -> anyhow::Result<()> {
        let tasks = self
            .storage
            .load()?
            .map(|snapshot| snapshot.state.todos)
            .unwrap_or_default();
        debug!(count = tasks.len(), "reloaded task store");
        self.list = TaskList::new(tasks);
        Ok(())
    }

    #[instrument(skip(self, now))]
    pub fn dispatch(&mut self, action: Action, now: DateTime<Utc>) -> anyhow::Result<Applied> {
        let applied = self.list.apply(&action, now);
        debug!(?applied, "applied action");
        if applied.changed() {
            self.persist()?;
        }
        Ok(applied)
    }

    /// Adds a task with a fresh id. Text is trimmed; empty text adds
    /// nothing and returns `None`.
    pub fn add(
        &mut self,
        text: &str,
        due_date: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Option<Uuid>> {
        let text = text.trim();
        if text.is_empty() {
            debug!("ignoring add with empty text");
            return Ok(None);
        }

        let mut id = Uuid::new_v4();
        while self.get(id).is_some() {
            id = Uuid::new_v4();
        }

        let applied = self.dispatch(
            Action::Add {
                id,
                text: text.to_string(),
                due_date,
            },
            now,
        )?;
        Ok(applied.changed().then_some(id))
    }

    pub fn toggle(&mut self, id: Uuid, now: DateTime<Utc>) -> anyhow::Result<Applied> {
        self.dispatch(Action::Toggle(id), now)
    }

    pub fn delete(&mut self, id: Uuid, now: DateTime<Utc>) -> anyhow::Result<Applied> {
        self.dispatch(Action::Delete(id), now)
    }

    pub fn clear_completed(&mut self, now: DateTime<Utc>) -> anyhow::Result<Applied> {
        self.dispatch(Action::ClearCompleted, now)
    }

    pub fn update_notes(
        &mut self,
        id: Uuid,
        notes: String,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Applied> {
        self.dispatch(Action::UpdateNotes { id, notes }, now)
    }

    pub fn clear_notes(&mut self, id: Uuid, now: DateTime<Utc>) -> anyhow::Result<Applied> {
        self.dispatch(Action::ClearNotes(id), now)
    }

    pub fn start_timer(&mut self, id: Uuid, now: DateTime<Utc>) -> anyhow::Result<Applied> {
        self.dispatch(Action::StartTimer(id), now)
    }

    pub fn stop_timer(&mut self, id: Uuid, now: DateTime<Utc>) -> anyhow::Result<Applied> {
        self.dispatch(Action::StopTimer(id), now)
    }

    pub fn update_due_date(
        &mut self,
        id: Uuid,
        due_date: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Applied> {
        self.dispatch(Action::UpdateDueDate { id, due_date }, now)
    }

    /// Runs the notification gate over every task. Returns how many
    /// reminders fired.
    #[instrument(skip(self, gate, now))]
    pub fn check_notifications<N: Notifier>(
        &self,
        gate: &mut NotificationGate<N>,
        now: DateTime<Utc>,
    ) -> usize {
        let fired = self
            .tasks()
            .iter()
            .filter(|task| gate.evaluate(task, now))
            .count();
        debug!(fired, total = self.tasks().len(), "checked notifications");
        fired
    }

    fn persist(&mut self) -> anyhow::Result<()> {
        let snapshot = Snapshot::new(self.list.tasks().to_vec());
        self.storage.save(&snapshot)
    }
}
