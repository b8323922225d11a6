use std::path::{Path, PathBuf};

use serde::Serialize;

use super::helpers::{remote_basename, remote_join};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

/// One record from a single directory listing. `size` is 0 for directories.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteEntry {
    pub name: String,
    pub kind: EntryKind,
    pub size: u64,
}

impl RemoteEntry {
    pub fn file(name: impl Into<String>, size: u64) -> Self {
        Self { name: name.into(), kind: EntryKind::File, size }
    }

    pub fn dir(name: impl Into<String>) -> Self {
        Self { name: name.into(), kind: EntryKind::Directory, size: 0 }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

/// Joint remote/local coordinate of one walk step. The local side is always
/// the local root joined with the path relative to the remote root.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathPair {
    pub remote: String,
    pub local: PathBuf,
}

impl PathPair {
    /// Root pair for a run: the remote root's final component becomes a
    /// folder under `local_dir`. A remote root without a final component
    /// (`/`) mirrors straight into `local_dir`.
    pub fn root(remote_root: &str, local_dir: &Path) -> Self {
        let local = match remote_basename(remote_root) {
            Some(name) => local_dir.join(name),
            None => local_dir.to_path_buf(),
        };
        Self { remote: remote_root.to_string(), local }
    }

    pub fn child(&self, name: &str) -> Self {
        Self { remote: remote_join(&self.remote, name), local: self.local.join(name) }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    AlreadyExists,
    /// Size policy: a local file of exactly the remote size is present.
    SizeMatches,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::AlreadyExists => f.write_str("already exists"),
            SkipReason::SizeMatches => f.write_str("same size already present"),
        }
    }
}

/// Per-file result, consumed by observers only.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransferOutcome {
    Downloaded(u64),
    Skipped(SkipReason),
}

/// Remote vs local leaf-file totals computed once per run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    pub remote_files: u64,
    pub local_files: u64,
}

impl SyncSummary {
    pub fn is_complete(&self) -> bool {
        self.remote_files == self.local_files
    }
}

/// What the walk did during this run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SyncStats {
    pub directories: u64,
    pub downloaded: u64,
    pub skipped: u64,
    pub bytes: u64,
}

impl SyncStats {
    pub(crate) fn record(&mut self, outcome: &TransferOutcome) {
        match outcome {
            TransferOutcome::Downloaded(n) => {
                self.downloaded += 1;
                self.bytes += n;
            }
            TransferOutcome::Skipped(_) => self.skipped += 1,
        }
    }
}
