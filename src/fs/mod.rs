//! Filesystem capability
//!
//! Programs reach files only through the [`FileSystem`] trait, so a run can be
//! pointed at a throwaway in-memory tree ([`MemoryFs`]) or at a real directory
//! it cannot escape ([`HostFs`]). Handles are small integers owned by the
//! implementation; the interpreter maps C file descriptors, `FILE *` and
//! `DIR *` onto them.
//!
//! Failures carry a C `errno` value so `perror` can print the usual text.

mod host;
mod memory;

pub use host::HostFs;
pub use memory::MemoryFs;

use thiserror::Error;

/// Implementation-defined open-file handle
pub type Handle = usize;

/// How a file is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OpenMode {
    pub read: bool,
    pub write: bool,
    pub create: bool,
    pub truncate: bool,
    pub append: bool,
}

/// `open(2)` flag values, as the prelude defines them
pub const O_ACCMODE: i64 = 3;
pub const O_WRONLY: i64 = 1;
pub const O_RDWR: i64 = 2;
pub const O_CREAT: i64 = 64;
pub const O_TRUNC: i64 = 512;
pub const O_APPEND: i64 = 1024;

impl OpenMode {
    pub fn read_only() -> Self {
        OpenMode {
            read: true,
            ..Default::default()
        }
    }

    /// Decode `open(2)` flags
    pub fn from_flags(flags: i64) -> Self {
        let access = flags & O_ACCMODE;
        OpenMode {
            read: access != O_WRONLY,
            write: access == O_WRONLY || access == O_RDWR,
            create: flags & O_CREAT != 0,
            truncate: flags & O_TRUNC != 0,
            append: flags & O_APPEND != 0,
        }
    }

    /// Decode an `fopen` mode string (`"r"`, `"w+"`, `"ab"`, ...)
    pub fn from_fopen(mode: &str) -> Option<Self> {
        let mut chars = mode.chars();
        let base = chars.next()?;
        let mut plus = false;
        for c in chars {
            match c {
                '+' => plus = true,
                'b' | 't' => {}
                _ => return None,
            }
        }
        let mode = match base {
            'r' => OpenMode {
                read: true,
                write: plus,
                ..Default::default()
            },
            'w' => OpenMode {
                read: plus,
                write: true,
                create: true,
                truncate: true,
                append: false,
            },
            'a' => OpenMode {
                read: plus,
                write: true,
                create: true,
                truncate: false,
                append: true,
            },
            _ => return None,
        };
        Some(mode)
    }
}

/// Origin of a seek
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    Set,
    Current,
    End,
}

impl Whence {
    /// `SEEK_SET`, `SEEK_CUR`, `SEEK_END`
    pub fn from_c(value: i64) -> Option<Self> {
        match value {
            0 => Some(Whence::Set),
            1 => Some(Whence::Current),
            2 => Some(Whence::End),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

/// One directory entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub kind: EntryKind,
}

/// What `stat` reports about a path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Metadata {
    pub kind: EntryKind,
    /// Bytes for files, 0 for directories
    pub size: u64,
}

/// A failed filesystem operation, as a C `errno`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{}", self.message())]
pub struct FsError {
    pub errno: i32,
}

impl FsError {
    pub const NOT_PERMITTED: FsError = FsError { errno: 1 };
    pub const NOT_FOUND: FsError = FsError { errno: 2 };
    pub const IO: FsError = FsError { errno: 5 };
    pub const BAD_DESCRIPTOR: FsError = FsError { errno: 9 };
    pub const ACCESS: FsError = FsError { errno: 13 };
    pub const EXISTS: FsError = FsError { errno: 17 };
    pub const NOT_DIRECTORY: FsError = FsError { errno: 20 };
    pub const IS_DIRECTORY: FsError = FsError { errno: 21 };
    pub const INVALID: FsError = FsError { errno: 22 };
    pub const TOO_MANY_FILES: FsError = FsError { errno: 24 };
    pub const FILE_TOO_LARGE: FsError = FsError { errno: 27 };
    pub const ILLEGAL_SEEK: FsError = FsError { errno: 29 };
    pub const NOT_EMPTY: FsError = FsError { errno: 39 };

    /// `strerror` text
    pub fn message(&self) -> &'static str {
        match self.errno {
            0 => "Success",
            1 => "Operation not permitted",
            2 => "No such file or directory",
            5 => "Input/output error",
            9 => "Bad file descriptor",
            12 => "Cannot allocate memory",
            13 => "Permission denied",
            17 => "File exists",
            20 => "Not a directory",
            21 => "Is a directory",
            22 => "Invalid argument",
            24 => "Too many open files",
            27 => "File too large",
            28 => "No space left on device",
            29 => "Illegal seek",
            39 => "Directory not empty",
            _ => "Unknown error",
        }
    }
}

/// Storage a program's file and directory calls operate on
pub trait FileSystem: Send {
    fn open(&mut self, path: &str, mode: OpenMode) -> Result<Handle, FsError>;

    /// Read up to `buf.len()` bytes; `Ok(0)` at end of file
    fn read(&mut self, handle: Handle, buf: &mut [u8]) -> Result<usize, FsError>;

    fn write(&mut self, handle: Handle, data: &[u8]) -> Result<usize, FsError>;

    /// Move the file position; returns the new offset from the start
    fn seek(&mut self, handle: Handle, offset: i64, whence: Whence) -> Result<u64, FsError>;

    fn close(&mut self, handle: Handle) -> Result<(), FsError>;

    fn unlink(&mut self, path: &str) -> Result<(), FsError>;

    /// Entries of the directory at `path`, sorted by name, without `.` and `..`
    fn read_dir(&mut self, path: &str) -> Result<Vec<DirEntry>, FsError>;

    /// Kind and size of the entry at `path`, following symlinks
    fn metadata(&self, path: &str) -> Result<Metadata, FsError>;
}

/// Split `path` into normal components, resolving `.` and `..` lexically.
/// Leading `/` is ignored: every path is relative to the filesystem root.
/// Returns `None` when `..` would climb above the root.
pub(crate) fn normalize(path: &str) -> Option<Vec<&str>> {
    let mut parts = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            other => parts.push(other),
        }
    }
    Some(parts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fopen_modes() {
        let r = OpenMode::from_fopen("r").unwrap();
        assert!(r.read && !r.write && !r.create);
        let w = OpenMode::from_fopen("wb").unwrap();
        assert!(w.write && w.create && w.truncate && !w.read);
        let a = OpenMode::from_fopen("a+").unwrap();
        assert!(a.read && a.append && !a.truncate);
        assert!(OpenMode::from_fopen("x").is_none());
        assert!(OpenMode::from_fopen("rw").is_none());
    }

    #[test]
    fn test_open_flags() {
        let mode = OpenMode::from_flags(O_WRONLY | O_CREAT | O_TRUNC);
        assert!(!mode.read && mode.write && mode.create && mode.truncate);
        let mode = OpenMode::from_flags(0);
        assert_eq!(mode, OpenMode::read_only());
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("./a//b/../c").unwrap(), vec!["a", "c"]);
        assert_eq!(normalize("/etc/passwd").unwrap(), vec!["etc", "passwd"]);
        assert!(normalize("a/../../b").is_none());
        assert!(normalize(".").unwrap().is_empty());
    }

    #[test]
    fn test_error_text() {
        assert_eq!(FsError::NOT_FOUND.to_string(), "No such file or directory");
        assert_eq!(FsError { errno: 999 }.message(), "Unknown error");
    }
}
