use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One to-do item as it is kept in the collection and on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,

    pub text: String,

    #[serde(default)]
    pub completed: bool,

    pub created_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    /// Tracked work time in milliseconds.
    #[serde(default)]
    pub time_spent: u64,

    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub start_time: Option<DateTime<Utc>>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Task {
    pub fn new(id: Uuid, text: String, now: DateTime<Utc>) -> Self {
        Self {
            id,
            text,
            completed: false,
            created_at: now,
            due_date: None,
            notes: None,
            time_spent: 0,
            start_time: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.start_time.is_some()
    }

    /// Time spent including the still-running stretch, if any.
    pub fn elapsed(&self, now: DateTime<Utc>) -> u64 {
        match self.start_time {
            Some(start) => self.time_spent.saturating_add(millis_between(start, now)),
            None => self.time_spent,
        }
    }

    /// Stops a running timer, folding the running stretch into `time_spent`.
    /// Returns false when no timer was running.
    pub fn fold_timer(&mut self, now: DateTime<Utc>) -> bool {
        let Some(start) = self.start_time.take() else {
            return false;
        };
        self.time_spent = self.time_spent.saturating_add(millis_between(start, now));
        true
    }

    pub fn note_lines(&self) -> Vec<String> {
        split_note_lines(self.notes.as_deref().unwrap_or_default())
    }

    pub fn short_id(&self) -> String {
        self.id.simple().to_string()[..8].to_string()
    }
}

/// Splits a stored notes string into its non-blank lines.
pub fn split_note_lines(notes: &str) -> Vec<String> {
    notes
        .split('\n')
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect()
}

pub fn join_note_lines(lines: &[String]) -> String {
    lines.join("\n")
}

/// Milliseconds from `start` to `end`, zero if the clock went backwards.
pub fn millis_between(start: DateTime<Utc>, end: DateTime<Utc>) -> u64 {
    u64::try_from((end - start).num_milliseconds()).unwrap_or(0)
}
