use chrono::{DateTime, Utc};
use tracing::{info, instrument};

use super::select;
use crate::config::Config;
use crate::datetime::display_zone;
use crate::render::Renderer;
use crate::stats::Statistics;
use crate::storage::Storage;
use crate::store::TaskStore;

#[instrument(skip(store, renderer, now))]
pub(super) fn cmd_list<S: Storage>(
    store: &TaskStore<S>,
    renderer: &Renderer,
    pending_only: bool,
    completed_only: bool,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command list");

    let tasks = store.tasks();
    if tasks.is_empty() {
        println!("No tasks yet. Add one with 'tock add <text>'.");
        return Ok(());
    }

    let rows: Vec<_> = tasks
        .iter()
        .enumerate()
        .filter(|(_, task)| {
            if pending_only {
                !task.completed
            } else if completed_only {
                task.completed
            } else {
                true
            }
        })
        .map(|(idx, task)| (idx + 1, task))
        .collect();

    renderer.print_task_table(&rows, now)?;

    let completed = tasks.iter().filter(|task| task.completed).count();
    renderer.print_summary(completed, tasks.len())
}

#[instrument(skip(store, renderer, now))]
pub(super) fn cmd_info<S: Storage>(
    store: &TaskStore<S>,
    renderer: &Renderer,
    selector: &str,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command info");

    let Some(task) = select(store, selector)?.and_then(|id| store.get(id)) else {
        return Ok(());
    };
    renderer.print_task_info(task, now)
}

#[instrument(skip(store, renderer))]
pub(super) fn cmd_stats<S: Storage>(
    store: &TaskStore<S>,
    renderer: &Renderer,
) -> anyhow::Result<()> {
    info!("command stats");

    let stats = Statistics::collect(store.tasks(), display_zone());
    renderer.print_statistics(&stats)
}

pub(super) fn cmd_config(cfg: &Config) -> anyhow::Result<()> {
    let mut entries: Vec<_> = cfg.iter().collect();
    entries.sort();
    for (k, v) in entries {
        println!("{k}={v}");
    }
    for file in &cfg.loaded_files {
        println!("# loaded {}", file.display());
    }
    Ok(())
}
