use std::io::Read;
use std::path::Path;

use ssh2::FileStat;

use super::entry::RemoteEntry;
use crate::MirrorError;

/// Remote side of a mirror run: one-level listings plus a byte reader per file.
/// Tests inject `MemoryRemote`; the real run uses `Ssh2Remote`.
pub trait RemoteFs {
    /// List one directory level. `.` and `..` are never returned.
    fn list(&self, path: &str) -> Result<Vec<RemoteEntry>, MirrorError>;
    fn open_read(&self, path: &str) -> Result<Box<dyn Read + '_>, MirrorError>;
}

/// Adapter that owns an `ssh2::Sftp` channel.
pub struct Ssh2Remote(pub ssh2::Sftp);

impl RemoteFs for Ssh2Remote {
    fn list(&self, path: &str) -> Result<Vec<RemoteEntry>, MirrorError> {
        let raw = self.0.readdir(Path::new(path)).map_err(|e| MirrorError::from_ssh2(path, e))?;
        let mut entries = Vec::with_capacity(raw.len());
        for (pathbuf, stat) in raw {
            let resolved = classify_entry(&pathbuf, &stat, |p| {
                let target = p.to_string_lossy();
                self.0.stat(p).map_err(|e| MirrorError::from_ssh2(&target, e))
            })?;
            entries.extend(resolved);
        }
        Ok(entries)
    }

    fn open_read(&self, path: &str) -> Result<Box<dyn Read + '_>, MirrorError> {
        match self.0.open(Path::new(path)) {
            Ok(f) => Ok(Box::new(f)),
            Err(e) => Err(MirrorError::from_ssh2(path, e)),
        }
    }
}

/// Turn one `readdir` record into an entry. Symlinks are resolved through
/// `follow` and take the type and size of their target. `.`/`..` and
/// entries that are neither files nor directories yield None; a name that is
/// not valid UTF-8 is an error, since it could neither be mirrored nor counted.
pub(crate) fn classify_entry<F>(
    path: &Path,
    stat: &FileStat,
    follow: F,
) -> Result<Option<RemoteEntry>, MirrorError>
where
    F: FnOnce(&Path) -> Result<FileStat, MirrorError>,
{
    let Some(os_name) = path.file_name() else {
        return Ok(None);
    };
    let Some(name) = os_name.to_str() else {
        return Err(MirrorError::InvalidName(path.to_string_lossy().to_string()));
    };
    if matches!(name, "." | "..") {
        return Ok(None);
    }
    let target;
    let stat = if stat.file_type().is_symlink() {
        target = follow(path)?;
        tracing::debug!("following symlink {}", path.display());
        &target
    } else {
        stat
    };
    if stat.is_dir() {
        Ok(Some(RemoteEntry::dir(name)))
    } else if stat.is_file() {
        Ok(Some(RemoteEntry::file(name, stat.size.unwrap_or(0))))
    } else {
        // sockets, devices, fifos: neither mirrored nor counted
        tracing::warn!("skipping special remote entry {} (perm={:?})", path.display(), stat.perm);
        Ok(None)
    }
}
