use std::io::{IsTerminal, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossterm::{
    cursor, queue,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{Clear, ClearType},
};

use crate::config::RunConfig;
use crate::metrics::ProgressUpdate;

use super::report::{RunReport, RunReporter};

const MAX_ERROR_KEY_CHARS: usize = 100;
const PROGRESS_BAR_WIDTH: usize = 30;

/// Prints the run header and final report to stdout and a live progress bar to
/// stderr.
#[derive(Debug)]
pub struct ConsoleReporter {
    no_color: bool,
    progress_enabled: bool,
    line_open: AtomicBool,
}

impl ConsoleReporter {
    /// The progress bar is only drawn when stderr is a terminal.
    #[must_use]
    pub fn new(no_color: bool) -> Self {
        Self {
            no_color,
            progress_enabled: std::io::stderr().is_terminal(),
            line_open: AtomicBool::new(false),
        }
    }

    fn close_progress_line(&self) {
        if self.line_open.swap(false, Ordering::AcqRel) {
            let mut out = std::io::stderr();
            if out.write_all(b"\n").and_then(|()| out.flush()).is_err() {
                tracing::debug!("Failed to terminate progress line");
            }
        }
    }
}

impl RunReporter for ConsoleReporter {
    fn started(&self, config: &RunConfig) {
        for line in header_lines(config) {
            println!("{}", line);
        }
    }

    fn warmup(&self, count: u64) {
        println!("Warming up with {} requests...", count);
    }

    fn progress(&self, update: ProgressUpdate) {
        if !self.progress_enabled {
            return;
        }
        let line = build_progress_line(update, self.no_color);
        if render_progress_line(&line).is_err() {
            return;
        }
        self.line_open.store(true, Ordering::Release);
    }

    fn finished(&self, report: &RunReport) {
        self.close_progress_line();
        for line in summary_lines(report) {
            println!("{}", line);
        }
    }
}

pub(crate) fn header_lines(config: &RunConfig) -> Vec<String> {
    let mut lines = vec![
        format!("Target: {}", config.url),
        format!("Method: {}", config.method.as_str().to_ascii_uppercase()),
        format!("Total Requests: {}", config.num_requests.get()),
        format!("Concurrency: {}", config.concurrency.get()),
    ];
    if let Some(proxy) = config.masked_proxy() {
        lines.push(format!("Proxy: {}", proxy));
    }
    lines
}

pub(crate) fn summary_lines(report: &RunReport) -> Vec<String> {
    let stats = &report.statistics;
    let mut lines = Vec::new();
    if report.interrupted {
        lines.push("Load test interrupted; showing partial results.".to_owned());
    }
    lines.push(format!(
        "Started: {}",
        report.started_at.format("%Y-%m-%d %H:%M:%S")
    ));
    lines.push(format!("Duration: {}", format_secs(report.duration)));
    lines.push(format!("Total Requests: {}", stats.total));
    lines.push(format!(
        "Successful: {} ({})",
        stats.successful,
        format_x100(report.success_rate_x100, "%")
    ));
    lines.push(format!(
        "Failed: {} ({})",
        stats.failed,
        format_x100(report.failure_rate_x100, "%")
    ));
    lines.push(format!(
        "Requests/sec: {}",
        format_x100(report.requests_per_sec_x100, "")
    ));
    lines.push(format!(
        "Response Time (avg/min/max): {} / {} / {}",
        format_ms(report.avg_response_time),
        format_ms(report.min_response_time),
        format_ms(report.max_response_time)
    ));
    lines.push(format!(
        "Response Time (p50/p90/p99): {} / {} / {}",
        format_ms(report.p50),
        format_ms(report.p90),
        format_ms(report.p99)
    ));

    if !report.status_counts.is_empty() {
        lines.push("Status Codes:".to_owned());
        for (label, count) in &report.status_counts {
            lines.push(format!("  {}: {}", label, count));
        }
    }
    if !report.error_counts.is_empty() {
        lines.push("Errors:".to_owned());
        for (key, count) in &report.error_counts {
            lines.push(format!("  {}: {}", truncate_key(key), count));
        }
    }
    lines
}

fn truncate_key(key: &str) -> String {
    if key.chars().count() <= MAX_ERROR_KEY_CHARS {
        return key.to_owned();
    }
    let mut truncated: String = key.chars().take(MAX_ERROR_KEY_CHARS).collect();
    truncated.push_str("...");
    truncated
}

fn format_x100(value_x100: u64, suffix: &str) -> String {
    let whole = value_x100.checked_div(100).unwrap_or(0);
    let frac = value_x100.checked_rem(100).unwrap_or(0);
    format!("{}.{:02}{}", whole, frac, suffix)
}

fn format_ms(duration: Duration) -> String {
    let micros = duration.as_micros();
    let whole = micros.checked_div(1000).unwrap_or(0);
    let hundredths = micros
        .checked_rem(1000)
        .and_then(|rem| rem.checked_div(10))
        .unwrap_or(0);
    format!("{}.{:02}ms", whole, hundredths)
}

fn format_secs(duration: Duration) -> String {
    let millis = duration.as_millis();
    let whole = millis.checked_div(1000).unwrap_or(0);
    let hundredths = millis
        .checked_rem(1000)
        .and_then(|rem| rem.checked_div(10))
        .unwrap_or(0);
    format!("{}.{:02}s", whole, hundredths)
}

struct ProgressSegment {
    text: String,
    color: Option<Color>,
}

impl ProgressSegment {
    const fn plain(text: String) -> Self {
        Self { text, color: None }
    }

    const fn colored(text: String, color: Color) -> Self {
        Self {
            text,
            color: Some(color),
        }
    }
}

fn build_progress_line(update: ProgressUpdate, no_color: bool) -> Vec<ProgressSegment> {
    let goal = u128::from(update.target.max(1));
    let current = u128::from(update.total).min(goal);
    let width = u128::from(u64::try_from(PROGRESS_BAR_WIDTH).unwrap_or(u64::MAX));

    let scaled = current
        .saturating_mul(width)
        .checked_div(goal)
        .unwrap_or(0);
    let complete = usize::try_from(scaled)
        .unwrap_or(PROGRESS_BAR_WIDTH)
        .min(PROGRESS_BAR_WIDTH);
    let incomplete = PROGRESS_BAR_WIDTH.saturating_sub(complete);
    let percent_x100 = u64::try_from(current.saturating_mul(10_000).checked_div(goal).unwrap_or(0))
        .unwrap_or(u64::MAX);

    let bar = format!("[{}{}]", "#".repeat(complete), "-".repeat(incomplete));
    let counts = format!(" {}/{} {}", update.total, update.target, format_x100(percent_x100, "%"));
    let ok = format!(" | ok {}", update.successful);
    let failed = format!(" | failed {}", update.failed);

    if no_color {
        vec![
            ProgressSegment::plain(bar),
            ProgressSegment::plain(counts),
            ProgressSegment::plain(ok),
            ProgressSegment::plain(failed),
        ]
    } else {
        vec![
            ProgressSegment::plain(bar),
            ProgressSegment::colored(counts, Color::Cyan),
            ProgressSegment::colored(ok, Color::Green),
            ProgressSegment::colored(failed, Color::Red),
        ]
    }
}

fn render_progress_line(line: &[ProgressSegment]) -> Result<(), std::io::Error> {
    let mut out = std::io::stderr();
    queue!(out, cursor::MoveToColumn(0), Clear(ClearType::CurrentLine))?;
    for segment in line {
        if let Some(color) = segment.color {
            queue!(
                out,
                SetForegroundColor(color),
                Print(&segment.text),
                ResetColor
            )?;
        } else {
            queue!(out, Print(&segment.text))?;
        }
    }
    out.flush()?;
    Ok(())
}

#[cfg(test)]
pub(crate) fn progress_text(update: ProgressUpdate) -> String {
    build_progress_line(update, true)
        .into_iter()
        .map(|segment| segment.text)
        .collect()
}
