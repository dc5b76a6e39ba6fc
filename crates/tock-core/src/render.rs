use std::io::{self, IsTerminal, Write};

use chrono::{DateTime, Utc};
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::datetime::{format_display_date, format_display_datetime};
use crate::notify::days_until;
use crate::stats::Statistics;
use crate::task::Task;
use crate::timefmt::{format_duration_u64, whole_minutes};

const CHART_WIDTH: usize = 40;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> Self {
        let color = cfg.get_bool("color").unwrap_or(true) && io::stdout().is_terminal();
        Self { color }
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    /// Tasks are shown with their 1-based position in the full collection.
    #[tracing::instrument(skip(self, tasks, now))]
    pub fn print_task_table(
        &self,
        tasks: &[(usize, &Task)],
        now: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let out = io::stdout().lock();
        self.write_task_table(out, tasks, now)
    }

    pub fn write_task_table<W: Write>(
        &self,
        writer: W,
        tasks: &[(usize, &Task)],
        now: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let headers = vec![
            "#".to_string(),
            "ID".to_string(),
            "Done".to_string(),
            "Due".to_string(),
            "Time".to_string(),
            "Task".to_string(),
        ];

        let mut rows = Vec::with_capacity(tasks.len());
        for (position, task) in tasks {
            let done = if task.completed { "[x]" } else { "[ ]" }.to_string();

            let due = match task.due_date {
                Some(due_date) => {
                    let label = format_display_date(due_date);
                    if task.completed {
                        label
                    } else if due_date < now {
                        self.paint(&label, "31")
                    } else if days_until(due_date, now) == 1 {
                        self.paint(&label, "33")
                    } else {
                        label
                    }
                }
                None => String::new(),
            };

            let mut time = format_duration_u64(task.elapsed(now));
            if task.is_running() {
                time = self.paint(&format!("{time} >"), "32");
            }

            let mut text = task.text.clone();
            let notes = task.note_lines().len();
            if notes > 0 {
                text = format!("{text} [{notes}]");
            }
            if task.completed {
                text = self.paint(&text, "90");
            }

            rows.push(vec![
                self.paint(&position.to_string(), "33"),
                task.short_id(),
                done,
                due,
                time,
                text,
            ]);
        }

        write_table(writer, headers, rows)
    }

    #[tracing::instrument(skip(self, task, now))]
    pub fn print_task_info(&self, task: &Task, now: DateTime<Utc>) -> anyhow::Result<()> {
        let out = io::stdout().lock();
        self.write_task_info(out, task, now)
    }

    pub fn write_task_info<W: Write>(
        &self,
        mut out: W,
        task: &Task,
        now: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        writeln!(out, "id        {}", task.id)?;
        writeln!(out, "text      {}", task.text)?;
        writeln!(
            out,
            "status    {}",
            if task.completed { "completed" } else { "pending" }
        )?;
        writeln!(out, "created   {}", format_display_datetime(task.created_at))?;
        if let Some(due) = task.due_date {
            writeln!(out, "due       {}", format_display_datetime(due))?;
        }
        writeln!(out, "time      {}", format_duration_u64(task.elapsed(now)))?;
        if let Some(start) = task.start_time {
            writeln!(out, "running   since {}", format_display_datetime(start))?;
        }

        let lines = task.note_lines();
        if !lines.is_empty() {
            writeln!(out, "notes")?;
            for (idx, line) in lines.iter().enumerate() {
                writeln!(out, "  {}. {}", idx + 1, line)?;
            }
        }

        Ok(())
    }

    pub fn print_summary(&self, completed: usize, total: usize) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out)?;
        writeln!(out, "{completed} of {total} completed")?;
        Ok(())
    }

    #[tracing::instrument(skip(self, stats))]
    pub fn print_statistics(&self, stats: &Statistics) -> anyhow::Result<()> {
        let out = io::stdout().lock();
        self.write_statistics(out, stats)
    }

    pub fn write_statistics<W: Write>(&self, mut out: W, stats: &Statistics) -> anyhow::Result<()> {
        writeln!(
            out,
            "Completed Tasks   {} of {}",
            stats.completed, stats.total
        )?;
        writeln!(out, "Total Time Spent  {}m", stats.total_minutes())?;
        writeln!(out)?;
        writeln!(out, "Task Completion Time (minutes)")?;

        if stats.series.is_empty() {
            writeln!(out, "  no completed tasks yet")?;
            return Ok(());
        }

        let max = stats
            .series
            .iter()
            .map(|point| point.minutes)
            .fold(0.0_f64, f64::max);
        let label_width = stats
            .series
            .iter()
            .map(|point| UnicodeWidthStr::width(point.text.as_str()))
            .max()
            .unwrap_or(0)
            .min(24);

        for point in &stats.series {
            let bar_len = if max > 0.0 {
                ((point.minutes / max) * CHART_WIDTH as f64).round() as usize
            } else {
                0
            };
            let label = truncate(&point.text, label_width);
            let padding = label_width.saturating_sub(UnicodeWidthStr::width(label.as_str()));
            writeln!(
                out,
                "  {} {}{} |{} {:.1}",
                point.date.format("%Y-%m-%d"),
                label,
                " ".repeat(padding),
                self.paint(&"#".repeat(bar_len), "34"),
                point.minutes
            )?;
        }

        Ok(())
    }

    /// One line describing every running timer, for the watch session.
    pub fn status_line(&self, tasks: &[Task], now: DateTime<Utc>) -> String {
        let running: Vec<String> = tasks
            .iter()
            .enumerate()
            .filter(|(_, task)| task.is_running())
            .map(|(idx, task)| {
                format!(
                    "{}. {} {}",
                    idx + 1,
                    task.text,
                    format_duration_u64(task.elapsed(now))
                )
            })
            .collect();

        if running.is_empty() {
            let done = tasks.iter().filter(|task| task.completed).count();
            let spent = tasks
                .iter()
                .fold(0u64, |acc, task| acc.saturating_add(task.time_spent));
            format!(
                "no timer running - {done} of {} completed, {}m tracked",
                tasks.len(),
                whole_minutes(spent)
            )
        } else {
            running.join(" | ")
        }
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn truncate(text: &str, width: usize) -> String {
    if UnicodeWidthStr::width(text) <= width {
        return text.to_string();
    }
    let mut out = String::new();
    for ch in text.chars() {
        let next = format!("{out}{ch}");
        if UnicodeWidthStr::width(next.as_str()) + 1 > width {
            break;
        }
        out = next;
    }
    out.push('~');
    out
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for idx in 0..column_count {
        write!(writer, "{:-<width$} ", "", width = widths[idx])?;
    }
    writeln!(writer)?;

    for row in rows {
        for idx in 0..column_count {
            let cell = &row[idx];
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use uuid::Uuid;

    use super::{Renderer, strip_ansi, truncate};
    use crate::datetime::DisplayZone;
    use crate::stats::Statistics;
    use crate::task::Task;

    fn now() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 3, 15, 0, 0)
            .single()
            .expect("valid now")
    }

    #[test]
    fn table_lists_position_timer_and_notes() {
        let mut running = Task::new(Uuid::new_v4(), "Write docs".to_string(), now());
        running.start_time = Some(now() - Duration::seconds(65));
        running.notes = Some("outline\nexamples".to_string());
        let mut done = Task::new(Uuid::new_v4(), "Ship".to_string(), now());
        done.completed = true;
        done.time_spent = 3_661_000;

        let mut out = Vec::new();
        Renderer::plain()
            .write_task_table(&mut out, &[(1, &running), (2, &done)], now())
            .expect("render table");
        let text = String::from_utf8(out).expect("utf8");

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("# "));
        assert!(lines[2].contains("0:01:05 >"));
        assert!(lines[2].contains("Write docs [2]"));
        assert!(lines[3].contains("[x]"));
        assert!(lines[3].contains("1:01:01"));
    }

    #[test]
    fn info_numbers_note_lines() {
        let mut task = Task::new(Uuid::new_v4(), "Plan trip".to_string(), now());
        task.notes = Some("book hotel\n\nrent car".to_string());
        let mut out = Vec::new();
        Renderer::plain()
            .write_task_info(&mut out, &task, now())
            .expect("render info");
        let text = String::from_utf8(out).expect("utf8");
        assert!(text.contains("  1. book hotel\n"));
        assert!(text.contains("  2. rent car\n"));
        assert!(text.contains("time      0:00:00"));
    }

    #[test]
    fn statistics_chart_scales_bars() {
        let mut a = Task::new(Uuid::new_v4(), "A".to_string(), now());
        a.completed = true;
        a.time_spent = 20 * 60_000;
        let mut b = Task::new(Uuid::new_v4(), "B".to_string(), now());
        b.completed = true;
        b.time_spent = 10 * 60_000;
        let stats = Statistics::collect(&[a, b], DisplayZone::Named(chrono_tz::UTC));

        let mut out = Vec::new();
        Renderer::plain()
            .write_statistics(&mut out, &stats)
            .expect("render stats");
        let text = String::from_utf8(out).expect("utf8");
        assert!(text.contains("Completed Tasks   2 of 2"));
        assert!(text.contains("Total Time Spent  30m"));
        assert!(text.contains(&format!("|{} 20.0", "#".repeat(40))));
        assert!(text.contains(&format!("|{} 10.0", "#".repeat(20))));
    }

    #[test]
    fn status_line_shows_running_timers() {
        let mut task = Task::new(Uuid::new_v4(), "Focus".to_string(), now());
        task.start_time = Some(now() - Duration::minutes(2));
        let idle = Task::new(Uuid::new_v4(), "Idle".to_string(), now());
        let line = Renderer::plain().status_line(&[idle.clone(), task], now());
        assert_eq!(line, "2. Focus 0:02:00");

        let line = Renderer::plain().status_line(&[idle], now());
        assert_eq!(line, "no timer running - 0 of 1 completed, 0m tracked");
    }

    #[test]
    fn helpers() {
        assert_eq!(strip_ansi("\x1b[31mred\x1b[0m"), "red");
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a long description", 6), "a lon~");
    }
}
