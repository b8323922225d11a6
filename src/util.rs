use chrono::Utc;
use owo_colors::OwoColorize;

use serde::Serialize;

use crate::mirror::{SyncReport, SyncStats, SyncSummary};

/// Try to enable ANSI escape sequence support on Windows consoles.
/// Returns true if enabling succeeded (or platform likely already supports ANSI), false otherwise.
#[cfg(windows)]
pub fn try_enable_ansi_on_windows() -> bool {
    enable_ansi_support::enable_ansi_support().is_ok()
}

#[cfg(not(windows))]
pub fn try_enable_ansi_on_windows() -> bool {
    true
}

/// Convert a byte count into a human readable string using IEC units (KiB/MiB/GiB).
pub fn human_bytes(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;
    let b = bytes as f64;
    if b >= GB {
        format!("{:.2} GiB", b / GB)
    } else if b >= MB {
        format!("{:.2} MiB", b / MB)
    } else if b >= KB {
        format!("{:.2} KiB", b / KB)
    } else {
        format!("{} B", bytes)
    }
}

/// The two counts plus what this run did. A mismatch is highlighted but is
/// informational only.
pub fn summary_lines(report: &SyncReport) -> Vec<String> {
    let s = &report.summary;
    let st = &report.stats;
    let elapsed = report.elapsed.as_secs_f64();
    let rate = if elapsed > 0.0 { st.bytes as f64 / 1024.0 / 1024.0 / elapsed } else { 0.0 };
    vec![
        format!("Total files on remote: {}", s.remote_files),
        format!("Total files on local:  {}", s.local_files),
        format!(
            "Downloaded {} ({}), skipped {}, {} directories in {:.2}s ({:.2} MiB/s)",
            st.downloaded,
            human_bytes(st.bytes),
            st.skipped,
            st.directories,
            elapsed,
            rate
        ),
    ]
}

pub fn print_summary(report: &SyncReport) {
    let color = try_enable_ansi_on_windows();
    for line in summary_lines(report) {
        println!("{}", line);
    }
    if !report.summary.is_complete() {
        let note = format!(
            "Local count differs from remote by {}; some files may be missing",
            report.summary.remote_files.abs_diff(report.summary.local_files)
        );
        if color {
            println!("{}", note.yellow());
        } else {
            println!("{}", note);
        }
    }
}

#[derive(Serialize)]
struct JsonSummary<'a> {
    remote_root: &'a str,
    local_root: String,
    #[serde(flatten)]
    summary: SyncSummary,
    complete: bool,
    #[serde(flatten)]
    stats: SyncStats,
    elapsed_secs: f64,
    finished_at: String,
}

/// Single-line JSON summary for machine consumption.
pub fn summary_json(report: &SyncReport) -> serde_json::Result<String> {
    serde_json::to_string(&JsonSummary {
        remote_root: &report.root.remote,
        local_root: report.root.local.to_string_lossy().to_string(),
        summary: report.summary,
        complete: report.summary.is_complete(),
        stats: report.stats,
        elapsed_secs: report.elapsed.as_secs_f64(),
        finished_at: Utc::now().to_rfc3339(),
    })
}
