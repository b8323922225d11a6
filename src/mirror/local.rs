use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::helpers::display_path;
use crate::MirrorError;

const PART_MARKER: &str = ".mirror.part.";

/// Whether `name` is a staged download (`<name>.mirror.part.<pid>`).
pub fn is_part_name(name: &str) -> bool {
    name.rsplit_once(PART_MARKER).is_some_and(|(base, pid)| {
        !base.is_empty() && !pid.is_empty() && pid.bytes().all(|b| b.is_ascii_digit())
    })
}

/// One local listing record, enough for counting.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalEntry {
    pub name: String,
    pub is_dir: bool,
}

/// Local side of a mirror run.
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalProbe;

impl LocalProbe {
    pub fn new() -> Self {
        Self
    }

    /// Create `path` and any missing ancestors. Existing directories are fine;
    /// an existing non-directory is an error.
    pub fn ensure_dir(&self, path: &Path) -> Result<(), MirrorError> {
        if path.is_dir() {
            return Ok(());
        }
        std::fs::create_dir_all(path).map_err(|e| MirrorError::local(path, e))?;
        tracing::debug!("created local directory {}", display_path(path));
        Ok(())
    }

    pub fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    /// Size of a regular file at `path`, None for anything else.
    pub fn file_size(&self, path: &Path) -> Option<u64> {
        match std::fs::metadata(path) {
            Ok(md) if md.is_file() => Some(md.len()),
            _ => None,
        }
    }

    /// One level of `path`, without staged part files. A missing directory
    /// lists as empty.
    pub fn list_files(&self, path: &Path) -> Result<Vec<LocalEntry>, MirrorError> {
        if !path.exists() {
            return Ok(Vec::new());
        }
        let mut out = Vec::new();
        for entry in WalkDir::new(path).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| MirrorError::local(path, e))?;
            let name = entry.file_name().to_string_lossy().to_string();
            let is_dir = entry.file_type().is_dir();
            if !is_dir && is_part_name(&name) {
                continue;
            }
            out.push(LocalEntry { name, is_dir });
        }
        Ok(out)
    }

    /// Delete part files left in `dir` by a run that was killed before its
    /// drop cleanup could happen. Returns how many were removed.
    pub fn remove_stale_parts(&self, dir: &Path) -> Result<usize, MirrorError> {
        let mut removed = 0;
        for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| MirrorError::local(dir, e))?;
            if !entry.file_type().is_file() || !is_part_name(&entry.file_name().to_string_lossy()) {
                continue;
            }
            std::fs::remove_file(entry.path()).map_err(|e| MirrorError::local(entry.path(), e))?;
            tracing::info!("removed stale partial download {}", display_path(entry.path()));
            removed += 1;
        }
        Ok(removed)
    }

    /// Start a staged write for `target`. Bytes land in a sibling temp file
    /// and only appear at `target` after `PartFile::commit`.
    pub fn create_part(&self, target: &Path) -> Result<PartFile, MirrorError> {
        let parent = target.parent().unwrap_or_else(|| Path::new("."));
        let file_name = target.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
        let tmp = parent.join(format!("{}{}{}", file_name, PART_MARKER, std::process::id()));
        let file = File::create(&tmp).map_err(|e| MirrorError::local(&tmp, e))?;
        Ok(PartFile { file: Some(file), tmp, target: target.to_path_buf() })
    }
}

/// Temp file that is renamed onto its target on commit and removed on drop
/// otherwise.
pub struct PartFile {
    file: Option<File>,
    tmp: PathBuf,
    target: PathBuf,
}

impl PartFile {
    pub fn write_all(&mut self, buf: &[u8]) -> Result<(), MirrorError> {
        match self.file.as_mut() {
            Some(f) => f.write_all(buf).map_err(|e| MirrorError::local(&self.tmp, e)),
            None => Err(MirrorError::local(&self.tmp, "part file already closed")),
        }
    }

    /// fsync, then atomically move into place.
    pub fn commit(mut self) -> Result<(), MirrorError> {
        if let Some(f) = self.file.take() {
            f.sync_all().map_err(|e| MirrorError::local(&self.tmp, e))?;
        }
        atomic_rename_with_retries(&self.tmp, &self.target)
            .map_err(|e| MirrorError::local(&self.target, e))
    }
}

impl Drop for PartFile {
    fn drop(&mut self) {
        drop(self.file.take());
        if self.tmp.exists() {
            let _ = std::fs::remove_file(&self.tmp);
        }
    }
}

/// Rename `tmp_path` onto `local_target`, retrying a few times if the target
/// already exists or is temporarily permission-denied (Windows semantics).
pub(crate) fn atomic_rename_with_retries(
    tmp_path: &Path,
    local_target: &Path,
) -> Result<(), std::io::Error> {
    use std::time::Duration;
    let mut attempts = 0;
    loop {
        match std::fs::rename(tmp_path, local_target) {
            Ok(()) => return Ok(()),
            Err(e) => {
                let kind = e.kind();
                if attempts < 2
                    && (kind == std::io::ErrorKind::AlreadyExists
                        || kind == std::io::ErrorKind::PermissionDenied)
                {
                    let _ = std::fs::remove_file(local_target);
                    std::thread::sleep(Duration::from_millis(50));
                    attempts += 1;
                    continue;
                }
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::read_to_string;

    #[test]
    fn ensure_dir_creates_ancestors_and_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let deep = tmp.path().join("a").join("b").join("c");
        let probe = LocalProbe::new();
        probe.ensure_dir(&deep).unwrap();
        assert!(deep.is_dir());
        probe.ensure_dir(&deep).unwrap();
    }

    #[test]
    fn ensure_dir_over_file_is_local_io() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("blocker");
        std::fs::write(&blocker, b"x").unwrap();
        let err = LocalProbe::new().ensure_dir(&blocker.join("sub")).unwrap_err();
        assert!(matches!(err, MirrorError::LocalIo { .. }));
    }

    #[test]
    fn list_files_one_level_and_missing_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir(tmp.path().join("d")).unwrap();
        std::fs::write(tmp.path().join("d").join("inner"), b"").unwrap();
        std::fs::write(tmp.path().join("f"), b"").unwrap();
        let probe = LocalProbe::new();
        let mut got = probe.list_files(tmp.path()).unwrap();
        got.sort_by(|a, b| a.name.cmp(&b.name));
        assert_eq!(
            got,
            vec![
                LocalEntry { name: "d".into(), is_dir: true },
                LocalEntry { name: "f".into(), is_dir: false },
            ]
        );
        assert!(probe.list_files(&tmp.path().join("missing")).unwrap().is_empty());
    }

    #[test]
    fn part_names() {
        assert!(is_part_name("a.txt.mirror.part.4242"));
        assert!(!is_part_name("a.txt"));
        assert!(!is_part_name(".mirror.part.1"));
        assert!(!is_part_name("a.mirror.part."));
        assert!(!is_part_name("a.mirror.part.x1"));
    }

    #[test]
    fn stale_parts_are_removed_and_hidden_from_listing() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("a.txt"), b"a").unwrap();
        std::fs::write(tmp.path().join("b.bin.mirror.part.77"), b"half").unwrap();
        std::fs::create_dir(tmp.path().join("keep.mirror.part.1")).unwrap();
        let probe = LocalProbe::new();
        let mut names: Vec<_> =
            probe.list_files(tmp.path()).unwrap().into_iter().map(|e| e.name).collect();
        names.sort();
        assert_eq!(names, ["a.txt", "keep.mirror.part.1"]);

        assert_eq!(probe.remove_stale_parts(tmp.path()).unwrap(), 1);
        assert!(!tmp.path().join("b.bin.mirror.part.77").exists());
        assert!(tmp.path().join("a.txt").exists());
        assert!(tmp.path().join("keep.mirror.part.1").is_dir());
    }

    #[test]
    fn file_size_only_for_files() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("f"), b"12345").unwrap();
        let probe = LocalProbe::new();
        assert_eq!(probe.file_size(&tmp.path().join("f")), Some(5));
        assert_eq!(probe.file_size(tmp.path()), None);
        assert_eq!(probe.file_size(&tmp.path().join("missing")), None);
    }

    #[test]
    fn part_file_commit_moves_into_place() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("a.txt");
        let mut part = LocalProbe::new().create_part(&target).unwrap();
        part.write_all(b"hello ").unwrap();
        part.write_all(b"tmp").unwrap();
        assert!(!target.exists());
        part.commit().unwrap();
        assert_eq!(read_to_string(&target).unwrap(), "hello tmp");
        let leftovers: Vec<_> = std::fs::read_dir(tmp.path()).unwrap().flatten().collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[test]
    fn dropped_part_file_leaves_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("b.txt");
        {
            let mut part = LocalProbe::new().create_part(&target).unwrap();
            part.write_all(b"partial").unwrap();
        }
        assert!(!target.exists());
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[test]
    fn atomic_rename_overwrite_existing() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("b.tmp");
        let target = tmp.path().join("b.txt");
        std::fs::write(&target, "old").unwrap();
        std::fs::write(&src, "new content").unwrap();
        atomic_rename_with_retries(&src, &target).expect("rename should succeed");
        assert_eq!(read_to_string(&target).unwrap(), "new content");
        assert!(!src.exists());
    }
}
