// mirror module: remote tree -> local tree orchestration
mod counter;
mod entry;
pub(crate) mod helpers;
mod local;
pub mod memory;
mod progress;
pub mod remote;
pub mod session;
mod sync;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

pub use self::counter::{count_local, count_remote, count_remote_within};
pub use self::entry::{
    EntryKind, PathPair, RemoteEntry, SkipReason, SyncStats, SyncSummary, TransferOutcome,
};
pub use self::helpers::{normalize_path, remote_basename, remote_join};
pub use self::local::{LocalEntry, LocalProbe, PartFile};
pub use self::progress::{ConsoleObserver, NoopObserver, SyncObserver};
pub use self::sync::{SkipPolicy, SyncOptions, TreeSynchronizer};

use self::remote::RemoteFs;
use self::session::ConnectTarget;
use crate::MirrorError;

/// Everything one run needs, after CLI flags and file defaults are merged.
pub struct MirrorArgs {
    pub target: ConnectTarget,
    pub remote_dir: String,
    pub local_dir: PathBuf,
    pub options: SyncOptions,
    pub strict: bool,
    pub quiet: bool,
    pub json: bool,
}

/// Result of a completed walk.
#[derive(Clone, Debug, PartialEq)]
pub struct SyncReport {
    pub root: PathPair,
    pub summary: SyncSummary,
    pub stats: SyncStats,
    pub elapsed: Duration,
}

impl SyncReport {
    /// Strict-mode check: a count mismatch becomes an error.
    pub fn ensure_complete(&self) -> Result<(), MirrorError> {
        if self.summary.is_complete() {
            Ok(())
        } else {
            Err(MirrorError::CountMismatch {
                remote: self.summary.remote_files,
                local: self.summary.local_files,
            })
        }
    }
}

/// Count remote files, mirror the tree, count local files. A count mismatch
/// is only logged here; callers decide whether it matters.
pub fn run_mirror<R: RemoteFs + ?Sized>(
    remote: &R,
    local: &LocalProbe,
    root: PathPair,
    options: &SyncOptions,
    observer: &mut dyn SyncObserver,
) -> Result<SyncReport, MirrorError> {
    let start = Instant::now();
    let remote_files = count_remote_within(remote, &root.remote, options.max_depth)?;
    tracing::info!("{} files under remote {}", remote_files, root.remote);

    let stats = TreeSynchronizer::new(remote, local, options).sync(root.clone(), observer)?;
    tracing::info!(
        "walk done: {} dirs, {} downloaded ({} bytes), {} skipped",
        stats.directories,
        stats.downloaded,
        stats.bytes,
        stats.skipped
    );

    let local_files = count_local(local, &root.local)?;
    let summary = SyncSummary { remote_files, local_files };
    if !summary.is_complete() {
        tracing::warn!(
            "count mismatch: {} remote files vs {} local files under {}",
            remote_files,
            local_files,
            root.local.display()
        );
    }
    Ok(SyncReport { root, summary, stats, elapsed: start.elapsed() })
}

/// Entry point of one mirror run.
///
/// Connects, resolves the remote root (leading `~` expands to the remote
/// home), mirrors into `<local-dir>/<basename(remote-dir)>`, prints the
/// summary and closes the connection on every path.
pub fn handle_mirror(args: MirrorArgs) -> Result<SyncReport> {
    let MirrorArgs { target, remote_dir, local_dir, options, strict, quiet, json } = args;

    let conn = session::connect(&target)?;
    let remote = conn
        .remote()
        .ok_or_else(|| MirrorError::Connection("SFTP channel not available".to_string()))?;
    let remote_root = normalize_path(&conn.expand_remote_tilde(&remote_dir)?, false);
    let root = PathPair::root(&remote_root, &local_dir);
    tracing::info!("mirroring {} into {}", root.remote, root.local.display());

    let mut observer = ConsoleObserver::new(quiet || json)?;
    let report = run_mirror(remote, &LocalProbe::new(), root, &options, &mut observer)
        .with_context(|| format!("mirror of {} failed", remote_root))?;
    drop(observer);

    if json {
        println!("{}", crate::util::summary_json(&report).context("cannot encode JSON summary")?);
    } else {
        crate::util::print_summary(&report);
    }
    if strict {
        report.ensure_complete()?;
    }
    Ok(report)
}
