use std::path::{Path, PathBuf};

use super::helpers::remote_join;
use super::local::LocalProbe;
use super::remote::RemoteFs;
use crate::MirrorError;

// Count leaf files below `root`. `list` returns (child, is_dir) for one level.
// Iterative so tree depth never touches the call stack. The root is depth 0;
// a directory deeper than `max_depth` aborts the count.
fn count_tree<P, F>(root: P, max_depth: Option<usize>, mut list: F) -> Result<u64, MirrorError>
where
    P: AsRef<Path>,
    F: FnMut(&P) -> Result<Vec<(P, bool)>, MirrorError>,
{
    let mut files = 0u64;
    let mut pending = vec![(root, 0usize)];
    while let Some((dir, depth)) = pending.pop() {
        if let Some(limit) = max_depth
            && depth > limit
        {
            let path = dir.as_ref().display().to_string();
            return Err(MirrorError::DepthLimitExceeded { path, limit });
        }
        for (child, is_dir) in list(&dir)? {
            if is_dir {
                pending.push((child, depth + 1));
            } else {
                files += 1;
            }
        }
    }
    Ok(files)
}

/// Number of files in the remote tree rooted at `root`.
pub fn count_remote<R: RemoteFs + ?Sized>(remote: &R, root: &str) -> Result<u64, MirrorError> {
    count_remote_within(remote, root, None)
}

/// Like `count_remote`, but fails with `DepthLimitExceeded` once a directory
/// sits deeper than `max_depth` below `root` (symlinked directory loops).
pub fn count_remote_within<R: RemoteFs + ?Sized>(
    remote: &R,
    root: &str,
    max_depth: Option<usize>,
) -> Result<u64, MirrorError> {
    count_tree(root.to_string(), max_depth, |dir: &String| {
        Ok(remote
            .list(dir)?
            .into_iter()
            .map(|e| (remote_join(dir, &e.name), e.is_dir()))
            .collect())
    })
}

/// Number of files present locally under `root`. A missing root counts 0,
/// and staged `.mirror.part.` files are not counted.
pub fn count_local(probe: &LocalProbe, root: &Path) -> Result<u64, MirrorError> {
    count_tree(root.to_path_buf(), None, |dir: &PathBuf| {
        Ok(probe.list_files(dir)?.into_iter().map(|e| (dir.join(e.name), e.is_dir)).collect())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mirror::memory::MemoryRemote;

    #[test]
    fn empty_tree_counts_zero() {
        let r = MemoryRemote::new("/d");
        assert_eq!(count_remote(&r, "/d").unwrap(), 0);
    }

    #[test]
    fn nested_empty_dirs_count_zero() {
        let mut r = MemoryRemote::new("/d");
        let a = r.add_dir("/d", "a");
        let b = r.add_dir(&a, "b");
        r.add_dir(&b, "c");
        r.add_dir("/d", "e");
        assert_eq!(count_remote(&r, "/d").unwrap(), 0);
    }

    #[test]
    fn flat_and_nested_files() {
        let mut r = MemoryRemote::new("/d");
        for i in 0..7 {
            r.add_file("/d", &format!("f{}", i), b"x");
        }
        assert_eq!(count_remote(&r, "/d").unwrap(), 7);
        let sub = r.add_dir("/d", "sub");
        r.add_file(&sub, "deep", b"");
        assert_eq!(count_remote(&r, "/d").unwrap(), 8);
    }

    #[test]
    fn remote_listing_error_propagates() {
        let mut r = MemoryRemote::new("/d");
        let sub = r.add_dir("/d", "sub");
        r.fail_listing(&sub, MirrorError::PermissionDenied(sub.clone()));
        assert_eq!(count_remote(&r, "/d").unwrap_err(), MirrorError::PermissionDenied(sub));
    }

    #[test]
    fn remote_depth_limit_stops_the_count() {
        let mut r = MemoryRemote::new("/d");
        let a = r.add_dir("/d", "a");
        let b = r.add_dir(&a, "b");
        r.add_file(&b, "f", b"x");
        assert_eq!(count_remote_within(&r, "/d", Some(2)).unwrap(), 1);
        assert_eq!(
            count_remote_within(&r, "/d", Some(1)).unwrap_err(),
            MirrorError::DepthLimitExceeded { path: "/d/a/b".into(), limit: 1 }
        );
    }

    #[test]
    fn local_counts_files_only() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("data");
        std::fs::create_dir_all(root.join("sub").join("empty")).unwrap();
        std::fs::write(root.join("a.txt"), b"a").unwrap();
        std::fs::write(root.join("sub").join("b.txt"), b"b").unwrap();
        let probe = LocalProbe::new();
        assert_eq!(count_local(&probe, &root).unwrap(), 2);
        assert_eq!(count_local(&probe, &root.join("sub").join("empty")).unwrap(), 0);
        assert_eq!(count_local(&probe, &tmp.path().join("missing")).unwrap(), 0);
    }

    #[test]
    fn leftover_part_files_are_not_counted() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("a.txt"), b"a").unwrap();
        std::fs::write(tmp.path().join("b.txt.mirror.part.4242"), b"half").unwrap();
        assert_eq!(count_local(&LocalProbe::new(), tmp.path()).unwrap(), 1);
    }
}
