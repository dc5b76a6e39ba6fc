use anyhow::anyhow;
use chrono::{DateTime, Utc};
use tracing::{info, instrument};

use super::{describe, select};
use crate::cli::NoteCommand;
use crate::storage::Storage;
use crate::store::TaskStore;
use crate::task::join_note_lines;

#[instrument(skip(store, action, now))]
pub(super) fn cmd_note<S: Storage>(
    store: &mut TaskStore<S>,
    action: NoteCommand,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command note");

    let selector = match &action {
        NoteCommand::Add { task, .. }
        | NoteCommand::Rm { task, .. }
        | NoteCommand::Set { task, .. }
        | NoteCommand::Clear { task } => task.clone(),
    };
    let Some(id) = select(store, &selector)? else {
        return Ok(());
    };
    let mut lines = store.get(id).map(|task| task.note_lines()).unwrap_or_default();

    let notes = match action {
        NoteCommand::Add { text, .. } => {
            lines.push(note_text(&text)?);
            join_note_lines(&lines)
        }
        NoteCommand::Rm { line, .. } => {
            if line == 0 || line > lines.len() {
                return Err(anyhow!(
                    "task {} has no note line {line}",
                    describe(store, id)
                ));
            }
            lines.remove(line - 1);
            join_note_lines(&lines)
        }
        NoteCommand::Set { text, .. } => note_text(&text)?,
        NoteCommand::Clear { .. } => String::new(),
    };

    if notes.is_empty() {
        store.clear_notes(id, now)?;
    } else {
        store.update_notes(id, notes, now)?;
    }
    let count = store.get(id).map(|task| task.note_lines().len()).unwrap_or(0);
    println!("Task {} has {count} note line(s).", describe(store, id));
    Ok(())
}

fn note_text(words: &[String]) -> anyhow::Result<String> {
    let text = words.join(" ");
    let text = text.trim();
    if text.is_empty() {
        return Err(anyhow!("note text cannot be empty"));
    }
    if text.contains('\n') {
        return Err(anyhow!("a note line cannot contain a newline"));
    }
    Ok(text.to_string())
}
