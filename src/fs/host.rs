//! Host filesystem confined to a root directory

use super::{normalize, DirEntry, EntryKind, FileSystem, FsError, Handle, Metadata, OpenMode, Whence};
use rustc_hash::FxHashMap;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct HostFs {
    root: PathBuf,
    open: FxHashMap<Handle, File>,
    next_handle: Handle,
}

impl From<io::Error> for FsError {
    fn from(err: io::Error) -> Self {
        if let Some(errno) = err.raw_os_error() {
            return FsError { errno };
        }
        match err.kind() {
            io::ErrorKind::NotFound => FsError::NOT_FOUND,
            io::ErrorKind::PermissionDenied => FsError::ACCESS,
            io::ErrorKind::AlreadyExists => FsError::EXISTS,
            io::ErrorKind::InvalidInput => FsError::INVALID,
            _ => FsError::IO,
        }
    }
}

impl HostFs {
    /// Files are looked up below `root`; paths cannot climb out of it
    pub fn new(root: impl Into<PathBuf>) -> Self {
        HostFs {
            root: root.into(),
            open: FxHashMap::default(),
            next_handle: 0,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, FsError> {
        let parts = normalize(path).ok_or(FsError::ACCESS)?;
        Ok(parts.iter().fold(self.root.clone(), |acc, part| acc.join(part)))
    }

    fn file(&mut self, handle: Handle) -> Result<&mut File, FsError> {
        self.open.get_mut(&handle).ok_or(FsError::BAD_DESCRIPTOR)
    }
}

impl FileSystem for HostFs {
    fn open(&mut self, path: &str, mode: OpenMode) -> Result<Handle, FsError> {
        let full = self.resolve(path)?;
        if full.is_dir() {
            return Err(FsError::IS_DIRECTORY);
        }
        let file = OpenOptions::new()
            .read(mode.read)
            .write(mode.write && !mode.append)
            .append(mode.append)
            .create(mode.create)
            .truncate(mode.truncate && mode.write)
            .open(&full)?;

        let handle = self.next_handle;
        self.next_handle += 1;
        self.open.insert(handle, file);
        log::trace!("host open {} -> handle {}", full.display(), handle);
        Ok(handle)
    }

    fn read(&mut self, handle: Handle, buf: &mut [u8]) -> Result<usize, FsError> {
        Ok(self.file(handle)?.read(buf)?)
    }

    fn write(&mut self, handle: Handle, data: &[u8]) -> Result<usize, FsError> {
        let file = self.file(handle)?;
        file.write_all(data)?;
        Ok(data.len())
    }

    fn seek(&mut self, handle: Handle, offset: i64, whence: Whence) -> Result<u64, FsError> {
        let from = match whence {
            Whence::Set => SeekFrom::Start(u64::try_from(offset).map_err(|_| FsError::INVALID)?),
            Whence::Current => SeekFrom::Current(offset),
            Whence::End => SeekFrom::End(offset),
        };
        Ok(self.file(handle)?.seek(from)?)
    }

    fn close(&mut self, handle: Handle) -> Result<(), FsError> {
        let mut file = self.open.remove(&handle).ok_or(FsError::BAD_DESCRIPTOR)?;
        file.flush()?;
        Ok(())
    }

    fn unlink(&mut self, path: &str) -> Result<(), FsError> {
        let full = self.resolve(path)?;
        if full.is_dir() {
            return Err(FsError::IS_DIRECTORY);
        }
        std::fs::remove_file(full)?;
        Ok(())
    }

    fn read_dir(&mut self, path: &str) -> Result<Vec<DirEntry>, FsError> {
        let full = self.resolve(path)?;
        let mut entries = Vec::new();
        for entry in std::fs::read_dir(full)? {
            let entry = entry?;
            let kind = if entry.file_type()?.is_dir() {
                EntryKind::Directory
            } else {
                EntryKind::File
            };
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                kind,
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn metadata(&self, path: &str) -> Result<Metadata, FsError> {
        let meta = std::fs::metadata(self.resolve(path)?)?;
        Ok(if meta.is_dir() {
            Metadata {
                kind: EntryKind::Directory,
                size: 0,
            }
        } else {
            Metadata {
                kind: EntryKind::File,
                size: meta.len(),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_under_root() {
        let dir = tempfile::tempdir().unwrap();
        let mut fs = HostFs::new(dir.path());
        let h = fs.open("notes.txt", OpenMode::from_fopen("w").unwrap()).unwrap();
        fs.write(h, b"line\n").unwrap();
        fs.close(h).unwrap();
        assert_eq!(std::fs::read(dir.path().join("notes.txt")).unwrap(), b"line\n");

        let h = fs.open("/notes.txt", OpenMode::read_only()).unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(fs.read(h, &mut buf).unwrap(), 5);
        fs.close(h).unwrap();

        fs.unlink("notes.txt").unwrap();
        assert_eq!(fs.open("notes.txt", OpenMode::read_only()), Err(FsError::NOT_FOUND));
    }

    #[test]
    fn test_cannot_escape_root() {
        let dir = tempfile::tempdir().unwrap();
        let mut fs = HostFs::new(dir.path());
        assert_eq!(fs.open("../outside", OpenMode::read_only()), Err(FsError::ACCESS));
    }

    #[test]
    fn test_metadata() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/data.bin"), [0u8; 12]).unwrap();
        let fs = HostFs::new(dir.path());
        assert_eq!(
            fs.metadata("sub/data.bin"),
            Ok(Metadata {
                kind: EntryKind::File,
                size: 12
            })
        );
        assert_eq!(fs.metadata("sub").map(|m| m.kind), Ok(EntryKind::Directory));
        assert_eq!(fs.metadata("sub/missing"), Err(FsError::NOT_FOUND));
        assert_eq!(fs.metadata("../etc"), Err(FsError::ACCESS));
    }

    #[test]
    fn test_read_dir_sorted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("b")).unwrap();
        std::fs::write(dir.path().join("a.txt"), "x").unwrap();
        let mut fs = HostFs::new(dir.path());
        let entries = fs.read_dir(".").unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "a.txt");
        assert_eq!(entries[1].kind, EntryKind::Directory);
    }
}
