use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{self, Read};

use super::entry::RemoteEntry;
use super::helpers::remote_join;
use crate::MirrorError;

enum Node {
    Dir(Vec<String>),
    File(Vec<u8>),
}

/// In-memory remote tree. Listings come back in insertion order, which is
/// deliberately not sorted, so callers see the same ordering hazards as with
/// a real server. Failures can be injected per path.
#[derive(Default)]
pub struct MemoryRemote {
    nodes: HashMap<String, Node>,
    // path -> (listings that still succeed, error afterwards)
    list_failures: HashMap<String, (usize, MirrorError)>,
    list_calls: RefCell<HashMap<String, usize>>,
    open_failures: HashMap<String, MirrorError>,
    read_failures: HashMap<String, usize>,
}

impl MemoryRemote {
    /// Tree with a single empty root directory.
    pub fn new(root: &str) -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(root.to_string(), Node::Dir(Vec::new()));
        Self { nodes, ..Default::default() }
    }

    /// Add an empty directory `name` under `parent`; returns the full path.
    pub fn add_dir(&mut self, parent: &str, name: &str) -> String {
        let full = remote_join(parent, name);
        self.link(parent, name);
        self.nodes.insert(full.clone(), Node::Dir(Vec::new()));
        full
    }

    pub fn add_file(&mut self, parent: &str, name: &str, data: &[u8]) -> String {
        let full = remote_join(parent, name);
        self.link(parent, name);
        self.nodes.insert(full.clone(), Node::File(data.to_vec()));
        full
    }

    pub fn fail_listing(&mut self, path: &str, err: MirrorError) {
        self.fail_listing_after(path, 0, err);
    }

    /// Let `ok_calls` listings of `path` succeed, then fail every later one.
    pub fn fail_listing_after(&mut self, path: &str, ok_calls: usize, err: MirrorError) {
        self.list_failures.insert(path.to_string(), (ok_calls, err));
    }

    /// How many times `path` has been listed.
    pub fn list_count(&self, path: &str) -> usize {
        self.list_calls.borrow().get(path).copied().unwrap_or(0)
    }

    pub fn fail_open(&mut self, path: &str, err: MirrorError) {
        self.open_failures.insert(path.to_string(), err);
    }

    /// The reader for `path` yields `after` bytes and then errors out.
    pub fn fail_read_after(&mut self, path: &str, after: usize) {
        self.read_failures.insert(path.to_string(), after);
    }

    fn link(&mut self, parent: &str, name: &str) {
        match self.nodes.get_mut(parent) {
            Some(Node::Dir(children)) => children.push(name.to_string()),
            _ => panic!("parent {} is not a directory in MemoryRemote", parent),
        }
    }
}

impl super::remote::RemoteFs for MemoryRemote {
    fn list(&self, path: &str) -> Result<Vec<RemoteEntry>, MirrorError> {
        let calls = {
            let mut counts = self.list_calls.borrow_mut();
            let c = counts.entry(path.to_string()).or_insert(0);
            *c += 1;
            *c
        };
        if let Some((ok_calls, err)) = self.list_failures.get(path)
            && calls > *ok_calls
        {
            return Err(err.clone());
        }
        let Some(Node::Dir(children)) = self.nodes.get(path) else {
            return Err(MirrorError::NotFound(path.to_string()));
        };
        let entries = children
            .iter()
            .map(|name| match self.nodes.get(&remote_join(path, name)) {
                Some(Node::File(data)) => RemoteEntry::file(name.clone(), data.len() as u64),
                _ => RemoteEntry::dir(name.clone()),
            })
            .collect();
        Ok(entries)
    }

    fn open_read(&self, path: &str) -> Result<Box<dyn Read + '_>, MirrorError> {
        if let Some(err) = self.open_failures.get(path) {
            return Err(err.clone());
        }
        match self.nodes.get(path) {
            Some(Node::File(data)) => match self.read_failures.get(path) {
                Some(after) => Ok(Box::new(PartialReader::new(data, *after))),
                None => Ok(Box::new(io::Cursor::new(data.as_slice()))),
            },
            _ => Err(MirrorError::NotFound(path.to_string())),
        }
    }
}

// Yields the first `limit` bytes, then fails to simulate a dropped transport.
struct PartialReader<'a> {
    data: &'a [u8],
    pos: usize,
    limit: usize,
}

impl<'a> PartialReader<'a> {
    fn new(data: &'a [u8], limit: usize) -> Self {
        Self { data, pos: 0, limit: limit.min(data.len()) }
    }
}

impl Read for PartialReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pos >= self.limit {
            return Err(io::Error::new(io::ErrorKind::ConnectionAborted, "simulated transport failure"));
        }
        let n = std::cmp::min(buf.len(), self.limit - self.pos);
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mirror::remote::RemoteFs;

    #[test]
    fn listing_keeps_insertion_order() {
        let mut r = MemoryRemote::new("/data");
        r.add_file("/data", "z.txt", b"z");
        let sub = r.add_dir("/data", "sub");
        r.add_file("/data", "a.txt", b"aa");
        r.add_file(&sub, "b.txt", b"bbb");
        let names: Vec<_> = r.list("/data").unwrap().into_iter().map(|e| e.name).collect();
        assert_eq!(names, ["z.txt", "sub", "a.txt"]);
        let sub_entries = r.list("/data/sub").unwrap();
        assert_eq!(sub_entries, vec![RemoteEntry::file("b.txt", 3)]);
    }

    #[test]
    fn listing_failure_after_successful_calls() {
        let mut r = MemoryRemote::new("/d");
        r.fail_listing_after("/d", 1, MirrorError::Connection("dropped".into()));
        assert!(r.list("/d").is_ok());
        assert_eq!(r.list("/d").unwrap_err(), MirrorError::Connection("dropped".into()));
        assert_eq!(r.list_count("/d"), 2);
    }

    #[test]
    fn missing_path_is_not_found() {
        let r = MemoryRemote::new("/data");
        assert_eq!(r.list("/nope").unwrap_err(), MirrorError::NotFound("/nope".into()));
        assert!(matches!(r.open_read("/data/x"), Err(MirrorError::NotFound(_))));
    }

    #[test]
    fn partial_reader_fails_after_limit() {
        let mut r = MemoryRemote::new("/d");
        r.add_file("/d", "f", b"hello world");
        r.fail_read_after("/d/f", 5);
        let mut reader = r.open_read("/d/f").unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(reader.read(&mut buf).unwrap(), 4);
        assert_eq!(reader.read(&mut buf).unwrap(), 1);
        assert!(reader.read(&mut buf).is_err());
    }
}
