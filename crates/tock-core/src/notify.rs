use std::collections::HashSet;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::task::Task;

pub const REMINDER_TITLE: &str = "Task Due Tomorrow";

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// The host's notification capability.
pub trait Notifier {
    /// Asks the host for permission to show notifications.
    fn request_permission(&mut self) -> bool;

    fn show(&mut self, title: &str, body: &str) -> anyhow::Result<()>;
}

impl Notifier for Box<dyn Notifier> {
    fn request_permission(&mut self) -> bool {
        (**self).request_permission()
    }

    fn show(&mut self, title: &str, body: &str) -> anyhow::Result<()> {
        (**self).show(title, body)
    }
}

/// A host without any notification capability.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unavailable;

impl Notifier for Unavailable {
    fn request_permission(&mut self) -> bool {
        false
    }

    fn show(&mut self, _title: &str, _body: &str) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Prints reminders to stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn request_permission(&mut self) -> bool {
        true
    }

    fn show(&mut self, title: &str, body: &str) -> anyhow::Result<()> {
        eprintln!("[{title}] {body}");
        Ok(())
    }
}

#[cfg(feature = "desktop")]
#[derive(Debug, Clone, Copy, Default)]
pub struct DesktopNotifier;

#[cfg(feature = "desktop")]
impl Notifier for DesktopNotifier {
    fn request_permission(&mut self) -> bool {
        true
    }

    fn show(&mut self, title: &str, body: &str) -> anyhow::Result<()> {
        notify_rust::Notification::new()
            .summary(title)
            .body(body)
            .appname("tock")
            .icon("appointment-soon")
            .show()
            .map(|_| ())
            .map_err(|err| anyhow!("desktop notification failed: {err}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifierKind {
    Desktop,
    Terminal,
    Off,
}

impl FromStr for NotifierKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "desktop" | "on" | "yes" | "true" | "1" => Ok(Self::Desktop),
            "terminal" | "stderr" => Ok(Self::Terminal),
            "off" | "no" | "false" | "0" => Ok(Self::Off),
            other => Err(anyhow!("invalid notifications setting: {other}")),
        }
    }
}

pub fn build_notifier(kind: NotifierKind) -> Box<dyn Notifier> {
    match kind {
        #[cfg(feature = "desktop")]
        NotifierKind::Desktop => Box::new(DesktopNotifier),
        #[cfg(not(feature = "desktop"))]
        NotifierKind::Desktop => {
            warn!("built without desktop notifications; using terminal");
            Box::new(TerminalNotifier)
        }
        NotifierKind::Terminal => Box::new(TerminalNotifier),
        NotifierKind::Off => Box::new(Unavailable),
    }
}

/// Whole days from `now` until `due`, rounded up.
pub fn days_until(due: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let diff = (due - now).num_milliseconds();
    let days = diff.div_euclid(DAY_MS);
    if diff.rem_euclid(DAY_MS) == 0 {
        days
    } else {
        days + 1
    }
}

/// True when an open task is due within the next day window.
pub fn should_remind(task: &Task, now: DateTime<Utc>) -> bool {
    match task.due_date {
        Some(due) if !task.completed => days_until(due, now) == 1,
        _ => false,
    }
}

pub fn reminder_body(task: &Task) -> String {
    format!(
        "Friendly reminder: \"{}\" is due tomorrow. You've got this!",
        task.text
    )
}

/// Decides whether a task's due date warrants a reminder and shows it
/// through the host notifier.
///
/// A task is reminded at most once per due date for the lifetime of the
/// gate, so a long-running session does not repeat itself every tick.
#[derive(Debug)]
pub struct NotificationGate<N: Notifier> {
    notifier: N,
    granted: bool,
    reminded: HashSet<(Uuid, DateTime<Utc>)>,
}

impl<N: Notifier> NotificationGate<N> {
    pub fn new(notifier: N) -> Self {
        Self {
            notifier,
            granted: false,
            reminded: HashSet::new(),
        }
    }

    #[instrument(skip(self))]
    pub fn request_permission(&mut self) -> bool {
        self.granted = self.notifier.request_permission();
        info!(granted = self.granted, "notification permission");
        self.granted
    }

    pub fn is_granted(&self) -> bool {
        self.granted
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    /// Fires at most one reminder for `task`. Returns whether one was shown.
    pub fn evaluate(&mut self, task: &Task, now: DateTime<Utc>) -> bool {
        if !self.granted || !should_remind(task, now) {
            return false;
        }

        let Some(due) = task.due_date else {
            return false;
        };
        if !self.reminded.insert((task.id, due)) {
            debug!(id = %task.id, "already reminded for this due date");
            return false;
        }

        match self.notifier.show(REMINDER_TITLE, &reminder_body(task)) {
            Ok(()) => {
                info!(id = %task.id, "reminder shown");
                true
            }
            Err(err) => {
                warn!(id = %task.id, error = %err, "failed to show reminder");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use uuid::Uuid;

    use super::{NotificationGate, Notifier, NotifierKind, Unavailable, days_until, should_remind};
    use crate::task::Task;

    #[derive(Debug, Default)]
    struct Recording {
        allow: bool,
        shown: Vec<(String, String)>,
    }

    impl Notifier for Recording {
        fn request_permission(&mut self) -> bool {
            self.allow
        }

        fn show(&mut self, title: &str, body: &str) -> anyhow::Result<()> {
            self.shown.push((title.to_string(), body.to_string()));
            Ok(())
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 10, 12, 0, 0)
            .single()
            .expect("valid now")
    }

    fn task_due(offset: Duration) -> Task {
        let mut task = Task::new(Uuid::new_v4(), "Pay rent".to_string(), now());
        task.due_date = Some(now() + offset);
        task
    }

    #[test]
    fn rounds_partial_days_up() {
        assert_eq!(days_until(now() + Duration::hours(1), now()), 1);
        assert_eq!(days_until(now() + Duration::hours(24), now()), 1);
        assert_eq!(days_until(now() + Duration::hours(25), now()), 2);
        assert_eq!(days_until(now(), now()), 0);
        assert_eq!(days_until(now() - Duration::hours(12), now()), 0);
        assert_eq!(days_until(now() - Duration::hours(36), now()), -1);
    }

    #[test]
    fn due_tomorrow_open_task_fires() {
        assert!(should_remind(&task_due(Duration::days(1)), now()));
        assert!(should_remind(&task_due(Duration::hours(3)), now()));
    }

    #[test]
    fn completed_or_far_tasks_do_not_fire() {
        let mut done = task_due(Duration::days(1));
        done.completed = true;
        assert!(!should_remind(&done, now()));
        assert!(!should_remind(&task_due(Duration::days(2)), now()));
        assert!(!should_remind(&task_due(Duration::days(5)), now()));

        let mut undated = task_due(Duration::days(1));
        undated.due_date = None;
        assert!(!should_remind(&undated, now()));
    }

    #[test]
    fn gate_needs_permission() {
        let mut gate = NotificationGate::new(Recording::default());
        assert!(!gate.request_permission());
        assert!(!gate.evaluate(&task_due(Duration::days(1)), now()));
        assert!(gate.notifier().shown.is_empty());
    }

    #[test]
    fn unavailable_host_denies_permission() {
        let mut gate = NotificationGate::new(Unavailable);
        assert!(!gate.request_permission());
        assert!(!gate.is_granted());
    }

    #[test]
    fn gate_reminds_once_per_due_date() {
        let mut gate = NotificationGate::new(Recording {
            allow: true,
            shown: vec![],
        });
        assert!(gate.request_permission());

        let mut task = task_due(Duration::hours(20));
        assert!(gate.evaluate(&task, now()));
        assert!(!gate.evaluate(&task, now() + Duration::hours(1)));
        assert_eq!(gate.notifier().shown.len(), 1);
        assert_eq!(gate.notifier().shown[0].0, "Task Due Tomorrow");
        assert!(gate.notifier().shown[0].1.contains("\"Pay rent\""));

        task.due_date = Some(now() + Duration::hours(22));
        assert!(gate.evaluate(&task, now()));
        assert_eq!(gate.notifier().shown.len(), 2);
    }

    #[test]
    fn parses_notifier_kind() {
        assert_eq!(
            "desktop".parse::<NotifierKind>().expect("parse"),
            NotifierKind::Desktop
        );
        assert_eq!(
            "Terminal".parse::<NotifierKind>().expect("parse"),
            NotifierKind::Terminal
        );
        assert_eq!("off".parse::<NotifierKind>().expect("parse"), NotifierKind::Off);
        assert!("loud".parse::<NotifierKind>().is_err());
    }
}
