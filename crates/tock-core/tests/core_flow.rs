use chrono::{Duration, Utc};
use tempfile::tempdir;
use tock_core::cli::{Command, NoteCommand};
use tock_core::commands::dispatch;
use tock_core::config::Config;
use tock_core::notify::{NotificationGate, Notifier};
use tock_core::render::Renderer;
use tock_core::storage::{JsonFileStorage, Storage};
use tock_core::store::TaskStore;

#[derive(Debug, Default)]
struct Inbox {
    messages: Vec<String>,
}

impl Notifier for Inbox {
    fn request_permission(&mut self) -> bool {
        true
    }

    fn show(&mut self, _title: &str, body: &str) -> anyhow::Result<()> {
        self.messages.push(body.to_string());
        Ok(())
    }
}

#[test]
fn task_lifecycle_survives_reopen() {
    let temp = tempdir().expect("tempdir");
    let now = Utc::now();

    let mut store =
        TaskStore::open(JsonFileStorage::open(temp.path()).expect("open storage")).expect("store");
    let id = store
        .add("Buy milk", None, now)
        .expect("add")
        .expect("id for non-empty text");
    assert_eq!(store.tasks().len(), 1);
    assert_eq!(store.tasks()[0].text, "Buy milk");
    assert!(!store.tasks()[0].completed);

    store.start_timer(id, now).expect("start");
    store
        .toggle(id, now + Duration::seconds(90))
        .expect("toggle");

    let reopened =
        TaskStore::open(JsonFileStorage::open(temp.path()).expect("open storage")).expect("store");
    let task = reopened.get(id).expect("task persisted");
    assert!(task.completed);
    assert!(task.start_time.is_none());
    assert_eq!(task.time_spent, 90_000);

    let mut reopened = reopened;
    reopened.delete(id, now).expect("delete");
    let storage = JsonFileStorage::open(temp.path()).expect("open storage");
    let snapshot = storage.load().expect("load").expect("snapshot");
    assert!(snapshot.state.todos.is_empty());
}

#[test]
fn reminders_only_for_open_tasks_due_tomorrow() {
    let temp = tempdir().expect("tempdir");
    let now = Utc::now();
    let mut store =
        TaskStore::open(JsonFileStorage::open(temp.path()).expect("open storage")).expect("store");

    store
        .add("File taxes", Some(now + Duration::hours(23)), now)
        .expect("add");
    let done = store
        .add("Call mom", Some(now + Duration::hours(10)), now)
        .expect("add")
        .expect("id");
    store.toggle(done, now).expect("toggle");
    store
        .add("Plan holiday", Some(now + Duration::days(3)), now)
        .expect("add");
    store.add("No deadline", None, now).expect("add");

    let mut gate = NotificationGate::new(Inbox::default());
    assert!(gate.request_permission());
    assert_eq!(store.check_notifications(&mut gate, now), 1);
    assert_eq!(gate.notifier().messages.len(), 1);
    assert!(gate.notifier().messages[0].contains("File taxes"));
}

#[test]
fn commands_drive_the_store() {
    let temp = tempdir().expect("tempdir");
    let mut store =
        TaskStore::open(JsonFileStorage::open(temp.path()).expect("open storage")).expect("store");
    let cfg = Config::default();
    let renderer = Renderer::plain();

    dispatch(
        &mut store,
        &cfg,
        &renderer,
        Command::Add {
            text: vec!["Write".to_string(), "report".to_string()],
            due: Some("+2d".to_string()),
        },
    )
    .expect("add");
    dispatch(
        &mut store,
        &cfg,
        &renderer,
        Command::Add {
            text: vec!["Review".to_string()],
            due: None,
        },
    )
    .expect("add");
    assert_eq!(store.tasks().len(), 2);
    assert_eq!(store.tasks()[0].text, "Write report");
    assert!(store.tasks()[0].due_date.is_some());

    for action in [
        NoteCommand::Add {
            task: "1".to_string(),
            text: vec!["outline".to_string()],
        },
        NoteCommand::Add {
            task: "1".to_string(),
            text: vec!["draft".to_string(), "intro".to_string()],
        },
        NoteCommand::Rm {
            task: "1".to_string(),
            line: 1,
        },
    ] {
        dispatch(&mut store, &cfg, &renderer, Command::Note { action }).expect("note");
    }
    assert_eq!(store.tasks()[0].notes.as_deref(), Some("draft intro"));

    dispatch(
        &mut store,
        &cfg,
        &renderer,
        Command::Done {
            task: "2".to_string(),
        },
    )
    .expect("done");
    dispatch(&mut store, &cfg, &renderer, Command::Clear).expect("clear");
    assert_eq!(store.tasks().len(), 1);
    assert_eq!(store.tasks()[0].text, "Write report");

    dispatch(
        &mut store,
        &cfg,
        &renderer,
        Command::Due {
            task: "1".to_string(),
            when: "none".to_string(),
        },
    )
    .expect("due");
    assert!(store.tasks()[0].due_date.is_none());

    // Misses are reported, not errors.
    dispatch(
        &mut store,
        &cfg,
        &renderer,
        Command::Stop {
            task: "9".to_string(),
        },
    )
    .expect("stop on missing task");

    assert!(
        dispatch(
            &mut store,
            &cfg,
            &renderer,
            Command::Add {
                text: vec!["  ".to_string()],
                due: None,
            },
        )
        .is_err()
    );
    assert_eq!(store.tasks().len(), 1);
}

#[test]
fn persisted_document_uses_camel_case_layout() {
    let temp = tempdir().expect("tempdir");
    let now = Utc::now();
    let mut store =
        TaskStore::open(JsonFileStorage::open(temp.path()).expect("open storage")).expect("store");
    let id = store
        .add("Stretch", Some(now + Duration::days(1)), now)
        .expect("add")
        .expect("id");
    store.start_timer(id, now).expect("start");

    let raw = std::fs::read_to_string(temp.path().join(tock_core::storage::STORAGE_KEY))
        .expect("read snapshot");
    let doc: serde_json::Value = serde_json::from_str(&raw).expect("json");
    assert_eq!(doc["version"], 0);

    let todo = &doc["state"]["todos"][0];
    assert_eq!(todo["text"], "Stretch");
    assert_eq!(todo["completed"], false);
    assert_eq!(todo["timeSpent"], 0);
    assert_eq!(todo["startTime"], now.timestamp_millis());
    assert!(todo["createdAt"].is_string());
    assert!(todo["dueDate"].is_string());
}

#[test]
fn reload_picks_up_writes_from_another_store() {
    let temp = tempdir().expect("tempdir");
    let now = Utc::now();
    let mut watcher =
        TaskStore::open(JsonFileStorage::open(temp.path()).expect("open storage")).expect("store");
    let mut writer =
        TaskStore::open(JsonFileStorage::open(temp.path()).expect("open storage")).expect("store");

    writer.add("Written elsewhere", None, now).expect("add");
    assert!(watcher.tasks().is_empty());

    watcher.reload().expect("reload");
    assert_eq!(watcher.tasks().len(), 1);
    assert_eq!(watcher.tasks()[0].text, "Written elsewhere");
}

#[test]
fn clearing_notes_removes_the_field_on_disk() {
    let temp = tempdir().expect("tempdir");
    let mut store =
        TaskStore::open(JsonFileStorage::open(temp.path()).expect("open storage")).expect("store");
    let cfg = Config::default();
    let renderer = Renderer::plain();

    dispatch(
        &mut store,
        &cfg,
        &renderer,
        Command::Add {
            text: vec!["rc.local:fix".to_string(), "boot".to_string()],
            due: None,
        },
    )
    .expect("add");
    for action in [
        NoteCommand::Set {
            task: "1".to_string(),
            text: vec!["check".to_string(), "fstab".to_string()],
        },
        NoteCommand::Clear {
            task: "1".to_string(),
        },
    ] {
        dispatch(&mut store, &cfg, &renderer, Command::Note { action }).expect("note");
    }

    let raw = std::fs::read_to_string(temp.path().join(tock_core::storage::STORAGE_KEY))
        .expect("read snapshot");
    let doc: serde_json::Value = serde_json::from_str(&raw).expect("json");
    let todo = &doc["state"]["todos"][0];
    assert_eq!(todo["text"], "rc.local:fix boot");
    assert!(todo.get("notes").is_none());
}
