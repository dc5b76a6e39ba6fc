use std::future::Future;
use std::io::{self, Write};
use std::time::Duration;

use anyhow::{Context, anyhow};
use chrono::{DateTime, Utc};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

use crate::config::Config;
use crate::notify::{NotificationGate, Notifier, build_notifier};
use crate::render::Renderer;
use crate::storage::Storage;
use crate::store::TaskStore;

/// Requests permission and evaluates every task once.
#[instrument(skip(store, cfg, now))]
pub fn remind_once<S: Storage>(
    store: &TaskStore<S>,
    cfg: &Config,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command remind");

    let mut gate = NotificationGate::new(build_notifier(cfg.notifier_kind()?));
    if !gate.request_permission() {
        println!("Notifications are unavailable; no reminders shown.");
        return Ok(());
    }

    let fired = store.check_notifications(&mut gate, now);
    println!("{fired} reminder(s) shown.");
    Ok(())
}

/// Runs the watch session on a single-threaded runtime until Ctrl-C.
#[instrument(skip(store, cfg, renderer))]
pub fn run_watch<S: Storage>(
    store: &mut TaskStore<S>,
    cfg: &Config,
    renderer: &Renderer,
) -> anyhow::Result<()> {
    info!("command watch");

    let refresh = cfg.watch_refresh()?;
    let reminder = cfg.reminder_interval()?;
    let gate = NotificationGate::new(build_notifier(cfg.notifier_kind()?));

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build watch runtime")?;

    let mut session = Session::new(store, gate, renderer, io::stdout());
    runtime.block_on(session.run(refresh, reminder, async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    }))?;

    println!();
    Ok(())
}

/// A live view over the store: a status line redrawn on every display
/// tick and a reminder check on every reminder tick.
pub struct Session<'a, S: Storage, N: Notifier, W: Write> {
    store: &'a mut TaskStore<S>,
    gate: NotificationGate<N>,
    renderer: &'a Renderer,
    out: W,
    reminders_fired: usize,
}

impl<'a, S: Storage, N: Notifier, W: Write> Session<'a, S, N, W> {
    pub fn new(
        store: &'a mut TaskStore<S>,
        gate: NotificationGate<N>,
        renderer: &'a Renderer,
        out: W,
    ) -> Self {
        Self {
            store,
            gate,
            renderer,
            out,
            reminders_fired: 0,
        }
    }

    pub fn reminders_fired(&self) -> usize {
        self.reminders_fired
    }

    pub fn gate(&self) -> &NotificationGate<N> {
        &self.gate
    }

    /// Ticks until `shutdown` resolves. The first reminder check happens
    /// one full `reminder` period after start.
    pub async fn run<F>(
        &mut self,
        refresh: Duration,
        reminder: Duration,
        shutdown: F,
    ) -> anyhow::Result<()>
    where
        F: Future<Output = ()>,
    {
        let granted = self.gate.request_permission();
        debug!(granted, ?refresh, ?reminder, "watch session started");

        let mut display = tokio::time::interval(refresh);
        display.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let first_reminder = Instant::now()
            .checked_add(reminder)
            .ok_or_else(|| anyhow!("reminder interval {reminder:?} is out of range"))?;
        let mut reminders = tokio::time::interval_at(first_reminder, reminder);
        reminders.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("watch session stopping");
                    break;
                }
                _ = display.tick() => {
                    self.on_display_tick(Utc::now())?;
                }
                _ = reminders.tick() => {
                    self.on_reminder_tick(Utc::now());
                }
            }
        }

        Ok(())
    }

    /// Redraws the status line. Display only; the store is not mutated.
    pub fn on_display_tick(&mut self, now: DateTime<Utc>) -> anyhow::Result<()> {
        self.refresh_store();
        let line = self.renderer.status_line(self.store.tasks(), now);
        write!(self.out, "\r{line}\x1b[K")?;
        self.out.flush()?;
        Ok(())
    }

    pub fn on_reminder_tick(&mut self, now: DateTime<Utc>) -> usize {
        self.refresh_store();
        let fired = self.store.check_notifications(&mut self.gate, now);
        self.reminders_fired += fired;
        fired
    }

    // Other tock invocations may have written since the last tick.
    fn refresh_store(&mut self) {
        if let Err(err) = self.store.reload() {
            warn!(error = %err, "failed to reload tasks; keeping previous state");
        }
    }
}
