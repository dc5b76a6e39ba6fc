use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
pub struct PreprocessedArgs {
    pub cleaned_args: Vec<OsString>,
    pub rc_overrides: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "tock",
    version,
    about = "Tock: a task list with per-task timers and due-date reminders",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[arg(
        long = "rc",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append,
        global = true
    )]
    pub rc_overrides: Vec<KeyVal>,

    #[arg(long = "tockrc", global = true)]
    pub tockrc: Option<PathBuf>,

    #[arg(long = "data", global = true)]
    pub data: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Add a task.
    Add {
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,

        /// Due date expression, e.g. tomorrow, friday, +2d, 2026-05-01.
        #[arg(long)]
        due: Option<String>,
    },
    /// List tasks in insertion order.
    List {
        #[arg(long, conflicts_with = "completed")]
        pending: bool,

        #[arg(long)]
        completed: bool,
    },
    /// Show one task in full.
    Info { task: String },
    /// Toggle a task between done and not done.
    #[command(alias = "toggle")]
    Done { task: String },
    #[command(alias = "rm")]
    Delete { task: String },
    /// Remove every completed task.
    Clear,
    /// Start the task's timer.
    Start { task: String },
    /// Stop the task's timer.
    Stop { task: String },
    /// Set a due date, or `none` to clear it.
    Due { task: String, when: String },
    /// Edit a task's note lines.
    Note {
        #[command(subcommand)]
        action: NoteCommand,
    },
    /// Completed count, total time and per-task time series.
    Stats,
    /// Check due dates once and show reminders.
    Remind,
    /// Live timer display with periodic reminders, until Ctrl-C.
    Watch,
    /// Print the effective configuration.
    Config,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum NoteCommand {
    /// Append a note line.
    Add {
        task: String,
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    /// Remove a note line by its 1-based number.
    Rm { task: String, line: usize },
    /// Replace all notes with a single line.
    Set {
        task: String,
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    /// Remove all notes.
    Clear { task: String },
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

/// Pulls positional `rc.key=value` / `rc.key:value` overrides out of argv.
/// Only words before the subcommand are considered, so task and note text
/// is passed through untouched.
#[tracing::instrument(skip_all)]
pub fn preprocess_args(raw: &[OsString]) -> anyhow::Result<PreprocessedArgs> {
    let mut cleaned = Vec::with_capacity(raw.len());
    let mut overrides: Vec<(String, String)> = Vec::new();

    let mut iter = raw.iter().cloned();
    if let Some(bin) = iter.next() {
        cleaned.push(bin);
    }

    let mut expects_value = false;
    while let Some(arg) = iter.next() {
        let s = arg.to_string_lossy().into_owned();

        if expects_value {
            expects_value = false;
            cleaned.push(arg);
            continue;
        }

        if let Some(rest) = s.strip_prefix("rc.") {
            let parsed = if let Some((k, v)) = rest.split_once('=') {
                Some((format!("rc.{k}"), v.to_string()))
            } else if let Some((k, v)) = rest.split_once(':') {
                Some((format!("rc.{k}"), v.to_string()))
            } else {
                None
            };

            if let Some((k, v)) = parsed {
                debug!(key = %k, value = %v, "captured positional rc override");
                overrides.push((k, v));
                continue;
            }
        }

        let is_subcommand = s == "--" || !s.starts_with('-');
        expects_value = VALUE_FLAGS.contains(&s.as_str());
        cleaned.push(arg);

        if is_subcommand {
            cleaned.extend(iter.by_ref());
            break;
        }
    }

    Ok(PreprocessedArgs {
        cleaned_args: cleaned,
        rc_overrides: overrides,
    })
}

// Global flags whose value is the next word.
const VALUE_FLAGS: [&str; 3] = ["--rc", "--tockrc", "--data"];
