use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use super::entry::{PathPair, TransferOutcome};
use super::helpers::display_path;

/// Receives walk events. Passed explicitly into the synchronizer; every
/// method defaults to a no-op.
pub trait SyncObserver {
    fn directory_entered(&mut self, _pair: &PathPair) {}
    fn transfer_started(&mut self, _pair: &PathPair, _total: u64) {}
    /// Bytes received so far for the current file. Non-decreasing, and the
    /// last call for a file always reports `transferred == total`.
    fn transfer_progress(&mut self, _transferred: u64, _total: u64) {}
    fn file_finished(&mut self, _pair: &PathPair, _outcome: &TransferOutcome) {}
}

/// Observer that ignores everything.
pub struct NoopObserver;

impl SyncObserver for NoopObserver {}

/// Terminal rendering: one progress bar per file being downloaded plus a
/// line per Downloaded/Skipped decision.
pub struct ConsoleObserver {
    file_style: ProgressStyle,
    current: Option<ProgressBar>,
    quiet: bool,
}

impl ConsoleObserver {
    pub fn new(quiet: bool) -> anyhow::Result<Self> {
        let file_style = ProgressStyle::with_template(
            "{spinner:.green} {msg} [{bar:30.cyan/blue}] {bytes}/{total_bytes} ({eta})",
        )?
        .progress_chars("=> ");
        Ok(Self { file_style, current: None, quiet })
    }

    fn println(&self, line: String) {
        match &self.current {
            Some(pb) => pb.println(line),
            None => println!("{}", line),
        }
    }
}

impl SyncObserver for ConsoleObserver {
    fn directory_entered(&mut self, pair: &PathPair) {
        tracing::debug!("entering {} -> {}", pair.remote, display_path(&pair.local));
    }

    fn transfer_started(&mut self, pair: &PathPair, total: u64) {
        if let Some(old) = self.current.take() {
            old.finish_and_clear();
        }
        let pb = if self.quiet {
            ProgressBar::with_draw_target(Some(total), ProgressDrawTarget::hidden())
        } else {
            ProgressBar::new(total)
        };
        pb.set_style(self.file_style.clone());
        let name = pair.remote.rsplit('/').next().unwrap_or(pair.remote.as_str()).to_string();
        pb.set_message(name);
        self.current = Some(pb);
    }

    fn transfer_progress(&mut self, transferred: u64, _total: u64) {
        if let Some(pb) = &self.current {
            pb.set_position(transferred);
        }
    }

    fn file_finished(&mut self, pair: &PathPair, outcome: &TransferOutcome) {
        if !self.quiet {
            let line = match outcome {
                TransferOutcome::Downloaded(_) => {
                    format!("Downloaded {} to {}", pair.remote, display_path(&pair.local))
                }
                TransferOutcome::Skipped(reason) => {
                    format!("Skipped {} ({})", pair.remote, reason)
                }
            };
            self.println(line);
        }
        if let Some(pb) = self.current.take() {
            pb.finish_and_clear();
        }
    }
}

impl Drop for ConsoleObserver {
    fn drop(&mut self) {
        if let Some(pb) = self.current.take() {
            pb.finish_and_clear();
        }
    }
}
