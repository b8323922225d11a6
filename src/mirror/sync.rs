use std::io::Read;

use serde::{Deserialize, Serialize};

use super::entry::{PathPair, SkipReason, SyncStats, TransferOutcome};
use super::helpers::display_path;
use super::local::{LocalProbe, PartFile};
use super::progress::SyncObserver;
use super::remote::RemoteFs;
use crate::MirrorError;

/// When a remote file counts as already mirrored.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkipPolicy {
    /// Anything at the local path means done. Partial files are never retried.
    #[default]
    Exists,
    /// A local regular file with exactly the remote size means done.
    Size,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncOptions {
    pub skip_policy: SkipPolicy,
    /// Sort each listing by name instead of keeping server order.
    pub sort_entries: bool,
    /// Root is depth 0; entering a directory deeper than this aborts the walk.
    pub max_depth: Option<usize>,
    pub buf_size: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self { skip_policy: SkipPolicy::Exists, sort_entries: false, max_depth: None, buf_size: 256 * 1024 }
    }
}

enum Step {
    Enter { pair: PathPair, depth: usize },
    Fetch { pair: PathPair, size: u64 },
}

/// Mirrors a remote subtree into a local one, depth-first pre-order in
/// listing order. Symlinked directories are walked like real ones, so
/// `max_depth` is the only guard against link loops and hostile servers.
pub struct TreeSynchronizer<'a, R: RemoteFs + ?Sized> {
    remote: &'a R,
    local: &'a LocalProbe,
    options: &'a SyncOptions,
}

impl<'a, R: RemoteFs + ?Sized> TreeSynchronizer<'a, R> {
    pub fn new(remote: &'a R, local: &'a LocalProbe, options: &'a SyncOptions) -> Self {
        Self { remote, local, options }
    }

    /// Walk the tree under `root`. Any error aborts the whole walk; files
    /// already written stay on disk.
    pub fn sync(
        &self,
        root: PathPair,
        observer: &mut dyn SyncObserver,
    ) -> Result<SyncStats, MirrorError> {
        let mut stats = SyncStats::default();
        let mut buf = vec![0u8; self.options.buf_size.max(1)];
        let mut stack = vec![Step::Enter { pair: root, depth: 0 }];
        while let Some(step) = stack.pop() {
            match step {
                Step::Enter { pair, depth } => {
                    if let Some(limit) = self.options.max_depth
                        && depth > limit
                    {
                        return Err(MirrorError::DepthLimitExceeded { path: pair.remote, limit });
                    }
                    // local directory first, then the listing
                    self.local.ensure_dir(&pair.local)?;
                    self.local.remove_stale_parts(&pair.local)?;
                    stats.directories += 1;
                    observer.directory_entered(&pair);
                    let mut entries = self.remote.list(&pair.remote)?;
                    if self.options.sort_entries {
                        entries.sort_by(|a, b| a.name.cmp(&b.name));
                    }
                    // reversed so the first listed entry is popped first
                    for entry in entries.into_iter().rev() {
                        let child = pair.child(&entry.name);
                        if entry.is_dir() {
                            stack.push(Step::Enter { pair: child, depth: depth + 1 });
                        } else {
                            stack.push(Step::Fetch { pair: child, size: entry.size });
                        }
                    }
                }
                Step::Fetch { pair, size } => {
                    let outcome = match self.skip_reason(&pair, size) {
                        Some(reason) => {
                            tracing::debug!("skip {} ({})", pair.remote, reason);
                            TransferOutcome::Skipped(reason)
                        }
                        None => {
                            let n = self.fetch(&pair, size, &mut buf, observer)?;
                            tracing::debug!(
                                "downloaded {} -> {} ({} bytes)",
                                pair.remote,
                                display_path(&pair.local),
                                n
                            );
                            TransferOutcome::Downloaded(n)
                        }
                    };
                    stats.record(&outcome);
                    observer.file_finished(&pair, &outcome);
                }
            }
        }
        Ok(stats)
    }

    fn skip_reason(&self, pair: &PathPair, size: u64) -> Option<SkipReason> {
        match self.options.skip_policy {
            SkipPolicy::Exists => {
                self.local.exists(&pair.local).then_some(SkipReason::AlreadyExists)
            }
            SkipPolicy::Size => (self.local.file_size(&pair.local) == Some(size))
                .then_some(SkipReason::SizeMatches),
        }
    }

    fn fetch(
        &self,
        pair: &PathPair,
        size: u64,
        buf: &mut [u8],
        observer: &mut dyn SyncObserver,
    ) -> Result<u64, MirrorError> {
        let reader = self.remote.open_read(&pair.remote)?;
        let mut part = self.local.create_part(&pair.local)?;
        observer.transfer_started(pair, size);
        let received = copy_with_progress(reader, &mut part, buf, size, &pair.remote, &mut |n: u64| {
            observer.transfer_progress(n, size)
        })?;
        if received != size {
            tracing::warn!(
                "{}: listed {} bytes but received {}; remote file changed during transfer?",
                pair.remote,
                size,
                received
            );
        }
        part.commit()?;
        Ok(received)
    }
}

// Copy `reader` into `part`, reporting progress clamped to `total`. Reports 0
// first and guarantees the last report equals `total`. Returns bytes read.
fn copy_with_progress(
    mut reader: impl Read,
    part: &mut PartFile,
    buf: &mut [u8],
    total: u64,
    remote_path: &str,
    report: &mut dyn FnMut(u64),
) -> Result<u64, MirrorError> {
    let mut received = 0u64;
    let mut last = 0u64;
    report(0);
    loop {
        let n = match reader.read(buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(MirrorError::Connection(format!(
                    "remote read failed: {}: {}",
                    remote_path, e
                )));
            }
        };
        part.write_all(&buf[..n])?;
        received += n as u64;
        let shown = received.min(total);
        if shown != last {
            report(shown);
            last = shown;
        }
    }
    if last != total {
        report(total);
    }
    Ok(received)
}
