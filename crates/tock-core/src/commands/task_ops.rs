use anyhow::{Context, anyhow};
use chrono::{DateTime, Utc};
use tracing::{info, instrument};

use super::{describe, select};
use crate::datetime::{format_display_date, parse_date_expr};
use crate::storage::Storage;
use crate::store::TaskStore;
use crate::timefmt::format_duration_u64;

#[instrument(skip(store, words, now))]
pub(super) fn cmd_add<S: Storage>(
    store: &mut TaskStore<S>,
    words: &[String],
    due: Option<&str>,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command add");

    let text = words.join(" ");
    if text.trim().is_empty() {
        return Err(anyhow!("task text cannot be empty"));
    }

    let due_date = due
        .map(|expr| parse_date_expr(expr, now))
        .transpose()
        .context("invalid --due")?;

    let Some(id) = store.add(&text, due_date, now)? else {
        return Err(anyhow!("task text cannot be empty"));
    };

    println!("Created task {}.", describe(store, id));
    Ok(())
}

#[instrument(skip(store, now))]
pub(super) fn cmd_done<S: Storage>(
    store: &mut TaskStore<S>,
    selector: &str,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command done");

    let Some(id) = select(store, selector)? else {
        return Ok(());
    };
    let was_running = store.get(id).is_some_and(|task| task.is_running());

    store.toggle(id, now)?;

    let Some(task) = store.get(id) else {
        return Ok(());
    };
    if task.completed {
        println!("Completed task {}.", describe(store, id));
        if was_running {
            println!(
                "Stopped timer at {}.",
                format_duration_u64(task.time_spent)
            );
        }
    } else {
        println!("Reopened task {}.", describe(store, id));
    }
    Ok(())
}

#[instrument(skip(store, now))]
pub(super) fn cmd_delete<S: Storage>(
    store: &mut TaskStore<S>,
    selector: &str,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command delete");

    let Some(id) = select(store, selector)? else {
        return Ok(());
    };
    let label = describe(store, id);
    store.delete(id, now)?;
    println!("Deleted task {label}.");
    Ok(())
}

#[instrument(skip(store, now))]
pub(super) fn cmd_clear<S: Storage>(
    store: &mut TaskStore<S>,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command clear");

    let before = store.tasks().len();
    store.clear_completed(now)?;
    let removed = before - store.tasks().len();
    println!("Cleared {removed} completed task(s).");
    Ok(())
}

#[instrument(skip(store, now))]
pub(super) fn cmd_start<S: Storage>(
    store: &mut TaskStore<S>,
    selector: &str,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command start");

    let Some(id) = select(store, selector)? else {
        return Ok(());
    };

    if store.start_timer(id, now)?.changed() {
        println!("Started task {}.", describe(store, id));
        return Ok(());
    }

    match store.get(id) {
        Some(task) if task.completed => {
            println!("Task {} is completed; reopen it first.", describe(store, id));
        }
        Some(task) => println!(
            "Task {} is already running ({}).",
            describe(store, id),
            format_duration_u64(task.elapsed(now))
        ),
        None => {}
    }
    Ok(())
}

#[instrument(skip(store, now))]
pub(super) fn cmd_stop<S: Storage>(
    store: &mut TaskStore<S>,
    selector: &str,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command stop");

    let Some(id) = select(store, selector)? else {
        return Ok(());
    };

    if store.stop_timer(id, now)?.changed() {
        let spent = store.get(id).map(|task| task.time_spent).unwrap_or(0);
        println!(
            "Stopped task {}, {} tracked.",
            describe(store, id),
            format_duration_u64(spent)
        );
    } else {
        println!("Task {} is not running.", describe(store, id));
    }
    Ok(())
}

#[instrument(skip(store, now))]
pub(super) fn cmd_due<S: Storage>(
    store: &mut TaskStore<S>,
    selector: &str,
    when: &str,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command due");

    let due_date = match when.trim().to_ascii_lowercase().as_str() {
        "none" | "clear" | "" => None,
        _ => Some(parse_date_expr(when, now)?),
    };

    let Some(id) = select(store, selector)? else {
        return Ok(());
    };
    store.update_due_date(id, due_date, now)?;

    match due_date {
        Some(date) => println!(
            "Task {} is due {}.",
            describe(store, id),
            format_display_date(date)
        ),
        None => println!("Cleared due date of task {}.", describe(store, id)),
    }
    Ok(())
}
