mod notes;
mod task_ops;
mod views;

use anyhow::anyhow;
use chrono::Utc;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::cli::Command;
use crate::config::Config;
use crate::render::Renderer;
use crate::session;
use crate::storage::Storage;
use crate::store::TaskStore;
use crate::task::Task;

#[instrument(skip(store, cfg, renderer, command))]
pub fn dispatch<S: Storage>(
    store: &mut TaskStore<S>,
    cfg: &Config,
    renderer: &Renderer,
    command: Command,
) -> anyhow::Result<()> {
    let now = Utc::now();
    debug!(?command, "dispatching command");

    match command {
        Command::Add { text, due } => task_ops::cmd_add(store, &text, due.as_deref(), now),
        Command::List { pending, completed } => {
            views::cmd_list(store, renderer, pending, completed, now)
        }
        Command::Info { task } => views::cmd_info(store, renderer, &task, now),
        Command::Done { task } => task_ops::cmd_done(store, &task, now),
        Command::Delete { task } => task_ops::cmd_delete(store, &task, now),
        Command::Clear => task_ops::cmd_clear(store, now),
        Command::Start { task } => task_ops::cmd_start(store, &task, now),
        Command::Stop { task } => task_ops::cmd_stop(store, &task, now),
        Command::Due { task, when } => task_ops::cmd_due(store, &task, &when, now),
        Command::Note { action } => notes::cmd_note(store, action, now),
        Command::Stats => views::cmd_stats(store, renderer),
        Command::Remind => session::remind_once(store, cfg, now),
        Command::Watch => session::run_watch(store, cfg, renderer),
        Command::Config => views::cmd_config(cfg),
    }
}

/// Resolves a selector to a task id. A number is a 1-based position in
/// the collection; anything else is matched as an id prefix.
pub fn resolve_task(tasks: &[Task], selector: &str) -> anyhow::Result<Option<Uuid>> {
    let selector = selector.trim();
    if selector.is_empty() {
        return Err(anyhow!("task selector cannot be empty"));
    }

    if let Ok(position) = selector.parse::<usize>() {
        return Ok(position
            .checked_sub(1)
            .and_then(|idx| tasks.get(idx))
            .map(|task| task.id));
    }

    let needle = selector.to_ascii_lowercase().replace('-', "");
    let mut matches = tasks
        .iter()
        .filter(|task| task.id.simple().to_string().starts_with(&needle));
    let Some(first) = matches.next() else {
        return Ok(None);
    };
    if matches.next().is_some() {
        return Err(anyhow!("task selector '{selector}' is ambiguous"));
    }
    Ok(Some(first.id))
}

/// Like [`resolve_task`], but reports a miss to the user.
fn select<S: Storage>(store: &TaskStore<S>, selector: &str) -> anyhow::Result<Option<Uuid>> {
    let id = resolve_task(store.tasks(), selector)?;
    if id.is_none() {
        warn!(selector, "no task matches selector");
        println!("No task matches '{selector}'.");
    }
    Ok(id)
}

fn position_of<S: Storage>(store: &TaskStore<S>, id: Uuid) -> usize {
    store
        .tasks()
        .iter()
        .position(|task| task.id == id)
        .map(|idx| idx + 1)
        .unwrap_or(0)
}

fn describe<S: Storage>(store: &TaskStore<S>, id: Uuid) -> String {
    match store.get(id) {
        Some(task) => format!("{} '{}'", position_of(store, id), task.text),
        None => id.to_string(),
    }
}
