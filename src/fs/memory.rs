//! In-memory filesystem
//!
//! Files are byte vectors addressed by inode number, so an unlinked file stays
//! readable through handles that were open on it.

use super::{normalize, DirEntry, EntryKind, FileSystem, FsError, Handle, Metadata, OpenMode, Whence};
use rustc_hash::FxHashMap;
use std::collections::{BTreeMap, BTreeSet};

const MAX_OPEN: usize = 1024;

/// Default cap on a single file's size
pub const DEFAULT_MAX_FILE_SIZE: usize = 64 * 1024 * 1024;

#[derive(Debug, Clone)]
struct OpenFile {
    inode: usize,
    position: usize,
    mode: OpenMode,
}

#[derive(Debug, Clone)]
pub struct MemoryFs {
    /// Normalized path to inode
    files: BTreeMap<String, usize>,
    /// Normalized directory paths; the root is `""`
    dirs: BTreeSet<String>,
    inodes: Vec<Vec<u8>>,
    open: FxHashMap<Handle, OpenFile>,
    next_handle: Handle,
    /// Writes past this size fail with `EFBIG`
    max_file_size: usize,
}

fn key(path: &str) -> Result<String, FsError> {
    normalize(path)
        .map(|parts| parts.join("/"))
        .ok_or(FsError::NOT_PERMITTED)
}

fn parent(key: &str) -> &str {
    key.rsplit_once('/').map_or("", |(dir, _)| dir)
}

impl MemoryFs {
    pub fn new() -> Self {
        let mut dirs = BTreeSet::new();
        dirs.insert(String::new());
        MemoryFs {
            files: BTreeMap::new(),
            dirs,
            inodes: Vec::new(),
            open: FxHashMap::default(),
            next_handle: 0,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }

    pub fn with_max_file_size(mut self, bytes: usize) -> Self {
        self.max_file_size = bytes;
        self
    }

    /// Add a file (and any missing parent directories)
    pub fn with_file(mut self, path: &str, contents: impl Into<Vec<u8>>) -> Self {
        if let Ok(key) = key(path) {
            self.make_parents(&key);
            self.inodes.push(contents.into());
            self.files.insert(key, self.inodes.len() - 1);
        }
        self
    }

    /// Add an empty directory (and any missing parents)
    pub fn with_dir(mut self, path: &str) -> Self {
        if let Ok(key) = key(path) {
            self.make_parents(&key);
            self.dirs.insert(key);
        }
        self
    }

    /// Current contents of the file at `path`
    pub fn contents(&self, path: &str) -> Option<&[u8]> {
        let key = key(path).ok()?;
        self.files.get(&key).map(|&inode| self.inodes[inode].as_slice())
    }

    pub fn exists(&self, path: &str) -> bool {
        key(path).is_ok_and(|key| self.files.contains_key(&key) || self.dirs.contains(&key))
    }

    fn make_parents(&mut self, key: &str) {
        let mut dir = parent(key);
        while !dir.is_empty() {
            self.dirs.insert(dir.to_string());
            dir = parent(dir);
        }
    }

    fn handle(&mut self, handle: Handle) -> Result<&mut OpenFile, FsError> {
        self.open.get_mut(&handle).ok_or(FsError::BAD_DESCRIPTOR)
    }
}

impl Default for MemoryFs {
    fn default() -> Self {
        Self::new()
    }
}

impl FileSystem for MemoryFs {
    fn open(&mut self, path: &str, mode: OpenMode) -> Result<Handle, FsError> {
        let key = key(path)?;
        if self.dirs.contains(&key) {
            return Err(FsError::IS_DIRECTORY);
        }
        if self.open.len() >= MAX_OPEN {
            return Err(FsError::TOO_MANY_FILES);
        }

        let inode = match self.files.get(&key) {
            Some(&inode) => {
                if mode.truncate && mode.write {
                    self.inodes[inode].clear();
                }
                inode
            }
            None if mode.create => {
                if !self.dirs.contains(parent(&key)) {
                    return Err(FsError::NOT_FOUND);
                }
                self.inodes.push(Vec::new());
                let inode = self.inodes.len() - 1;
                self.files.insert(key, inode);
                inode
            }
            None => return Err(FsError::NOT_FOUND),
        };

        let handle = self.next_handle;
        self.next_handle += 1;
        self.open.insert(
            handle,
            OpenFile {
                inode,
                position: 0,
                mode,
            },
        );
        log::trace!("memfs open {} -> handle {}", path, handle);
        Ok(handle)
    }

    fn read(&mut self, handle: Handle, buf: &mut [u8]) -> Result<usize, FsError> {
        let file = self.open.get_mut(&handle).ok_or(FsError::BAD_DESCRIPTOR)?;
        if !file.mode.read {
            return Err(FsError::BAD_DESCRIPTOR);
        }
        let data = &self.inodes[file.inode];
        let start = file.position.min(data.len());
        let n = buf.len().min(data.len() - start);
        buf[..n].copy_from_slice(&data[start..start + n]);
        file.position = start + n;
        Ok(n)
    }

    fn write(&mut self, handle: Handle, bytes: &[u8]) -> Result<usize, FsError> {
        let file = self.open.get_mut(&handle).ok_or(FsError::BAD_DESCRIPTOR)?;
        if !file.mode.write {
            return Err(FsError::BAD_DESCRIPTOR);
        }
        let data = &mut self.inodes[file.inode];
        if file.mode.append {
            file.position = data.len();
        }
        let end = file
            .position
            .checked_add(bytes.len())
            .filter(|&end| end <= self.max_file_size)
            .ok_or(FsError::FILE_TOO_LARGE)?;
        if data.len() < end {
            data.resize(end, 0);
        }
        data[file.position..end].copy_from_slice(bytes);
        file.position = end;
        Ok(bytes.len())
    }

    fn seek(&mut self, handle: Handle, offset: i64, whence: Whence) -> Result<u64, FsError> {
        let file = self.open.get(&handle).ok_or(FsError::BAD_DESCRIPTOR)?;
        let base = match whence {
            Whence::Set => 0,
            Whence::Current => file.position as i64,
            Whence::End => self.inodes[file.inode].len() as i64,
        };
        let target = base.checked_add(offset).filter(|&p| p >= 0).ok_or(FsError::INVALID)?;
        self.handle(handle)?.position = target as usize;
        Ok(target as u64)
    }

    fn close(&mut self, handle: Handle) -> Result<(), FsError> {
        self.open.remove(&handle).map(|_| ()).ok_or(FsError::BAD_DESCRIPTOR)
    }

    fn unlink(&mut self, path: &str) -> Result<(), FsError> {
        let key = key(path)?;
        if self.dirs.contains(&key) {
            return Err(FsError::IS_DIRECTORY);
        }
        self.files.remove(&key).map(|_| ()).ok_or(FsError::NOT_FOUND)
    }

    fn read_dir(&mut self, path: &str) -> Result<Vec<DirEntry>, FsError> {
        let key = key(path)?;
        if !self.dirs.contains(&key) {
            return Err(if self.files.contains_key(&key) {
                FsError::NOT_DIRECTORY
            } else {
                FsError::NOT_FOUND
            });
        }

        let child = |entry: &str| -> Option<String> {
            if entry.is_empty() || parent(entry) != key {
                return None;
            }
            Some(entry.rsplit('/').next().unwrap_or(entry).to_string())
        };
        let mut entries: Vec<DirEntry> = self
            .files
            .keys()
            .filter_map(|f| child(f.as_str()))
            .map(|name| DirEntry {
                name,
                kind: EntryKind::File,
            })
            .chain(self.dirs.iter().filter_map(|d| child(d.as_str())).map(|name| DirEntry {
                name,
                kind: EntryKind::Directory,
            }))
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn metadata(&self, path: &str) -> Result<Metadata, FsError> {
        let key = key(path)?;
        if self.dirs.contains(&key) {
            return Ok(Metadata {
                kind: EntryKind::Directory,
                size: 0,
            });
        }
        let &inode = self.files.get(&key).ok_or(FsError::NOT_FOUND)?;
        Ok(Metadata {
            kind: EntryKind::File,
            size: self.inodes[inode].len() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_then_read() {
        let mut fs = MemoryFs::new();
        let h = fs.open("out.txt", OpenMode::from_fopen("w").unwrap()).unwrap();
        assert_eq!(fs.write(h, b"hello").unwrap(), 5);
        fs.close(h).unwrap();
        assert_eq!(fs.contents("./out.txt"), Some(&b"hello"[..]));

        let h = fs.open("out.txt", OpenMode::read_only()).unwrap();
        let mut buf = [0u8; 16];
        assert_eq!(fs.read(h, &mut buf).unwrap(), 5);
        assert_eq!(fs.read(h, &mut buf).unwrap(), 0);
        assert_eq!(fs.seek(h, -2, Whence::End).unwrap(), 3);
        assert_eq!(fs.read(h, &mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"lo");
    }

    #[test]
    fn test_append_and_truncate() {
        let mut fs = MemoryFs::new().with_file("log", "a");
        let h = fs.open("log", OpenMode::from_fopen("a").unwrap()).unwrap();
        fs.write(h, b"b").unwrap();
        assert_eq!(fs.contents("log"), Some(&b"ab"[..]));
        let h = fs.open("log", OpenMode::from_fopen("w").unwrap()).unwrap();
        assert_eq!(fs.contents("log"), Some(&b""[..]));
        assert_eq!(fs.write(h, b"x").unwrap(), 1);
    }

    #[test]
    fn test_errors() {
        let mut fs = MemoryFs::new().with_dir("d");
        assert_eq!(fs.open("missing", OpenMode::read_only()), Err(FsError::NOT_FOUND));
        assert_eq!(fs.open("d", OpenMode::read_only()), Err(FsError::IS_DIRECTORY));
        assert_eq!(
            fs.open("nodir/f", OpenMode::from_fopen("w").unwrap()),
            Err(FsError::NOT_FOUND)
        );
        let h = fs.open("d/f", OpenMode::from_fopen("r+").unwrap_or_default());
        assert_eq!(h, Err(FsError::NOT_FOUND));
        assert_eq!(fs.close(42), Err(FsError::BAD_DESCRIPTOR));
        assert_eq!(fs.unlink("d"), Err(FsError::IS_DIRECTORY));
    }

    #[test]
    fn test_unlinked_file_stays_readable() {
        let mut fs = MemoryFs::new().with_file("tmp", "data");
        let h = fs.open("tmp", OpenMode::read_only()).unwrap();
        fs.unlink("tmp").unwrap();
        assert!(!fs.exists("tmp"));
        let mut buf = [0u8; 4];
        assert_eq!(fs.read(h, &mut buf).unwrap(), 4);
    }

    #[test]
    fn test_writes_past_the_size_cap_fail() {
        let mut fs = MemoryFs::new().with_max_file_size(8);
        let h = fs.open("f", OpenMode::from_fopen("w").unwrap()).unwrap();
        assert_eq!(fs.write(h, b"12345678").unwrap(), 8);
        assert_eq!(fs.write(h, b"9"), Err(FsError::FILE_TOO_LARGE));

        assert_eq!(fs.seek(h, i64::MAX, Whence::Set).unwrap(), i64::MAX as u64);
        assert_eq!(fs.write(h, b"x"), Err(FsError::FILE_TOO_LARGE));
        assert_eq!(fs.contents("f"), Some(&b"12345678"[..]));
    }

    #[test]
    fn test_metadata() {
        let fs = MemoryFs::new().with_file("d/a.txt", "hello").with_dir("d/empty");
        assert_eq!(
            fs.metadata("d/a.txt"),
            Ok(Metadata {
                kind: EntryKind::File,
                size: 5
            })
        );
        assert_eq!(fs.metadata("d").map(|m| m.kind), Ok(EntryKind::Directory));
        assert_eq!(fs.metadata("./d/empty/.").map(|m| m.kind), Ok(EntryKind::Directory));
        assert_eq!(fs.metadata("d/missing"), Err(FsError::NOT_FOUND));
    }

    #[test]
    fn test_read_dir() {
        let mut fs = MemoryFs::new()
            .with_file("test_dir/file2.c", "")
            .with_file("test_dir/file1.txt", "")
            .with_file("test_dir/subdir1/nested.txt", "")
            .with_dir("test_dir/subdir2");
        let names: Vec<_> = fs
            .read_dir("test_dir")
            .unwrap()
            .into_iter()
            .map(|e| (e.name, e.kind))
            .collect();
        assert_eq!(
            names,
            vec![
                ("file1.txt".to_string(), EntryKind::File),
                ("file2.c".to_string(), EntryKind::File),
                ("subdir1".to_string(), EntryKind::Directory),
                ("subdir2".to_string(), EntryKind::Directory),
            ]
        );
        assert_eq!(fs.read_dir("test_dir/file1.txt"), Err(FsError::NOT_DIRECTORY));
        assert_eq!(fs.read_dir(".").unwrap().len(), 1);
    }
}
