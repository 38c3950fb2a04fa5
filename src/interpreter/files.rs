//! `<stdio.h>` streams, POSIX descriptors and directory streams
//!
//! C descriptors index a small table whose first three entries are the
//! captured console; every other entry wraps a [`FileSystem`] handle.
//! A `FILE *` is a `struct __krun_file` in program memory holding its
//! descriptor and the end-of-file and error flags, so `feof` and friends
//! read back exactly what the program could inspect itself. A `DIR *` is a
//! `struct __krun_dir` whose embedded `struct dirent` is refilled by each
//! `readdir`.
//!
//! Failing calls follow C: they return `-1` or NULL and set `errno`, which
//! `perror` reports.

use crate::fs::{EntryKind, FileSystem, FsError, Handle, Metadata, OpenMode, Whence, O_CREAT, O_TRUNC, O_WRONLY};
use crate::interpreter::builtins::{int_arg, ptr_arg, Builtin, HEAP_ALIGN};
use crate::interpreter::constants::FIRST_FILE_DESCRIPTOR;
use crate::interpreter::engine::Interpreter;
use crate::interpreter::errors::{AtLocation, RuntimeError};
use crate::memory::value::{Address, Value, NULL};
use crate::memory::Region;
use crate::parser::ast::{SourceLocation, Type};
use rustc_hash::FxHashMap;

const FILE_STRUCT: &str = "__krun_file";
const DIR_STRUCT: &str = "__krun_dir";
const DIRENT_STRUCT: &str = "dirent";
const STAT_STRUCT: &str = "stat";

/// `d_type` values
const DT_DIR: i64 = 4;
const DT_REG: i64 = 8;

/// `st_mode` file type bits
const S_IFDIR: i64 = 0o040000;
const S_IFREG: i64 = 0o100000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Descriptor {
    Stdin,
    Stdout,
    Stderr,
    File(Handle),
}

/// An open `DIR *`: a snapshot of the listing and the read position
#[derive(Debug, Clone)]
struct DirStream {
    entries: Vec<(String, EntryKind)>,
    position: usize,
}

/// Descriptor, directory stream and `errno` state of one run
pub(crate) struct FileTable {
    fs: Box<dyn FileSystem>,
    descriptors: Vec<Option<Descriptor>>,
    dirs: FxHashMap<i64, DirStream>,
    next_dir: i64,
    errno: i32,
}

impl FileTable {
    pub(crate) fn new(fs: Box<dyn FileSystem>) -> Self {
        FileTable {
            fs,
            descriptors: vec![
                Some(Descriptor::Stdin),
                Some(Descriptor::Stdout),
                Some(Descriptor::Stderr),
            ],
            dirs: FxHashMap::default(),
            next_dir: 1,
            errno: 0,
        }
    }

    fn descriptor(&self, fd: i64) -> Result<Descriptor, FsError> {
        usize::try_from(fd)
            .ok()
            .and_then(|i| self.descriptors.get(i).copied().flatten())
            .ok_or(FsError::BAD_DESCRIPTOR)
    }

    pub(crate) fn errno(&self) -> i32 {
        self.errno
    }
}

impl Interpreter {
    /// Record `err` in `errno` and produce the C failure value
    pub(crate) fn fail(&mut self, err: FsError) -> i64 {
        log::debug!("library call failed: {}", err);
        self.files.errno = err.errno;
        -1
    }

    pub(crate) fn fd_write(&mut self, fd: i64, bytes: &[u8]) -> Result<usize, FsError> {
        match self.files.descriptor(fd)? {
            Descriptor::Stdout => {
                self.console.write_stdout(bytes);
                Ok(bytes.len())
            }
            Descriptor::Stderr => {
                self.console.write_stderr(bytes);
                Ok(bytes.len())
            }
            Descriptor::Stdin => Err(FsError::BAD_DESCRIPTOR),
            Descriptor::File(handle) => self.files.fs.write(handle, bytes),
        }
    }

    fn fd_read(&mut self, fd: i64, len: usize) -> Result<Vec<u8>, FsError> {
        match self.files.descriptor(fd)? {
            Descriptor::Stdin => Ok(self.console.read(len).to_vec()),
            Descriptor::Stdout | Descriptor::Stderr => Err(FsError::BAD_DESCRIPTOR),
            Descriptor::File(handle) => {
                let mut buf = vec![0; len];
                let n = self.files.fs.read(handle, &mut buf)?;
                buf.truncate(n);
                Ok(buf)
            }
        }
    }

    /// Open `path` on the lowest free descriptor
    fn fd_open(&mut self, path: &str, mode: OpenMode) -> Result<i64, FsError> {
        let handle = self.files.fs.open(path, mode)?;
        let table = &mut self.files.descriptors;
        let first = FIRST_FILE_DESCRIPTOR as usize;
        let fd = match table.iter().skip(first).position(Option::is_none) {
            Some(free) => {
                table[first + free] = Some(Descriptor::File(handle));
                first + free
            }
            None => {
                table.push(Some(Descriptor::File(handle)));
                table.len() - 1
            }
        };
        log::debug!("opened {} as fd {}", path, fd);
        Ok(fd as i64)
    }

    fn fd_close(&mut self, fd: i64) -> Result<(), FsError> {
        let descriptor = self.files.descriptor(fd)?;
        if let Descriptor::File(handle) = descriptor {
            self.files.fs.close(handle)?;
        }
        self.files.descriptors[fd as usize] = None;
        Ok(())
    }

    /// Offset and type of a field of one of the prelude's library structs
    fn library_member(&self, tag: &str, field: &str, location: SourceLocation) -> Result<(usize, Type), RuntimeError> {
        self.layouts
            .get(tag)
            .and_then(|layout| layout.field(field))
            .map(|f| (f.offset, f.ty.clone()))
            .ok_or_else(|| RuntimeError::Unsupported {
                message: format!("library type 'struct {}' has no field '{}'", tag, field),
                location,
            })
    }

    fn library_field(&self, tag: &str, field: &str, location: SourceLocation) -> Result<usize, RuntimeError> {
        self.library_member(tag, field, location).map(|(offset, _)| offset)
    }

    fn library_block(&mut self, tag: &str, label: &str, region: Region, location: SourceLocation) -> Result<Address, RuntimeError> {
        let ty = Type::Struct(tag.to_string());
        let size = self.layouts.size_of(&ty).unwrap_or(0);
        let align = match region {
            Region::Heap => HEAP_ALIGN,
            _ => self.layouts.align_of(&ty).unwrap_or(1),
        };
        self.memory.allocate_zeroed(size, align, region, label).at(location)
    }

    fn read_int_field(&self, base: Address, tag: &str, field: &str, location: SourceLocation) -> Result<i64, RuntimeError> {
        if base == NULL {
            return Err(RuntimeError::memory(crate::memory::MemoryError::Null, location));
        }
        let offset = self.library_field(tag, field, location)?;
        let value = self.memory.read_scalar(base + offset as Address, &Type::Int).at(location)?;
        Ok(value.as_int().unwrap_or(0))
    }

    /// Store `value` into an integer field, converted to the field's type
    fn write_int_field(&mut self, base: Address, tag: &str, field: &str, value: i64, location: SourceLocation) -> Result<(), RuntimeError> {
        let (offset, ty) = self.library_member(tag, field, location)?;
        self.memory
            .write_scalar(base + offset as Address, &ty, &Value::Int(value))
            .at(location)
    }

    /// Allocate a `FILE` for descriptor `fd`
    pub(crate) fn new_stream(&mut self, fd: i64, region: Region, location: SourceLocation) -> Result<Address, RuntimeError> {
        let stream = self.library_block(FILE_STRUCT, "FILE", region, location)?;
        self.write_int_field(stream, FILE_STRUCT, "fd", fd, location)?;
        Ok(stream)
    }

    /// Descriptor behind a `FILE *`
    pub(crate) fn stream_fd(&self, stream: Address, location: SourceLocation) -> Result<i64, RuntimeError> {
        self.read_int_field(stream, FILE_STRUCT, "fd", location)
    }

    /// `fgetc`: next byte of `stream`, or `EOF` with the matching flag set
    fn stream_getc(&mut self, stream: Address, location: SourceLocation) -> Result<i64, RuntimeError> {
        let fd = self.stream_fd(stream, location)?;
        match self.fd_read(fd, 1) {
            Ok(bytes) => match bytes.first() {
                Some(&byte) => Ok(byte as i64),
                None => {
                    self.write_int_field(stream, FILE_STRUCT, "eof", 1, location)?;
                    Ok(-1)
                }
            },
            Err(err) => {
                self.write_int_field(stream, FILE_STRUCT, "error", 1, location)?;
                Ok(self.fail(err))
            }
        }
    }

    /// Write to a stream; the number of bytes written or `-1`
    fn stream_write(&mut self, stream: Address, bytes: &[u8], location: SourceLocation) -> Result<i64, RuntimeError> {
        let fd = self.stream_fd(stream, location)?;
        match self.fd_write(fd, bytes) {
            Ok(n) => Ok(n as i64),
            Err(err) => {
                self.write_int_field(stream, FILE_STRUCT, "error", 1, location)?;
                Ok(self.fail(err))
            }
        }
    }

    fn path_arg(&self, args: &[Value], i: usize, location: SourceLocation) -> Result<String, RuntimeError> {
        let bytes = self.memory.read_c_string(ptr_arg(args, i)).at(location)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    pub(crate) fn call_io(
        &mut self,
        builtin: Builtin,
        args: &[Value],
        location: SourceLocation,
    ) -> Result<Value, RuntimeError> {
        use Builtin::*;

        let result = match builtin {
            Stream => {
                let index = int_arg(args, 0);
                let stream = usize::try_from(index)
                    .ok()
                    .and_then(|i| self.streams.get(i).copied())
                    .unwrap_or(NULL);
                return Ok(Value::Pointer(stream));
            }

            Putchar => {
                let c = int_arg(args, 0) as u8;
                let stdout = self.streams[1];
                match self.stream_write(stdout, &[c], location)? {
                    -1 => -1,
                    _ => c as i64,
                }
            }
            Fputc | Putc => {
                let c = int_arg(args, 0) as u8;
                match self.stream_write(ptr_arg(args, 1), &[c], location)? {
                    -1 => -1,
                    _ => c as i64,
                }
            }
            Puts => {
                let mut line = self.memory.read_c_string(ptr_arg(args, 0)).at(location)?;
                line.push(b'\n');
                let stdout = self.streams[1];
                self.stream_write(stdout, &line, location)?
            }
            Fputs => {
                let text = self.memory.read_c_string(ptr_arg(args, 0)).at(location)?;
                match self.stream_write(ptr_arg(args, 1), &text, location)? {
                    -1 => -1,
                    _ => 1,
                }
            }

            Getchar => {
                let stdin = self.streams[0];
                self.stream_getc(stdin, location)?
            }
            Fgetc | Getc => self.stream_getc(ptr_arg(args, 0), location)?,
            Fgets => return self.fgets(ptr_arg(args, 0), int_arg(args, 1), ptr_arg(args, 2), location),

            Fopen => {
                let path = self.path_arg(args, 0, location)?;
                let mode = self.path_arg(args, 1, location)?;
                let Some(mode) = OpenMode::from_fopen(&mode) else {
                    self.fail(FsError::INVALID);
                    return Ok(Value::Pointer(NULL));
                };
                return match self.fd_open(&path, mode) {
                    Ok(fd) => Ok(Value::Pointer(self.new_stream(fd, Region::Heap, location)?)),
                    Err(err) => {
                        self.fail(err);
                        Ok(Value::Pointer(NULL))
                    }
                };
            }
            Fclose => {
                let stream = ptr_arg(args, 0);
                let fd = self.stream_fd(stream, location)?;
                let closed = self.fd_close(fd);
                // The standard streams live in static memory
                if !self.streams.contains(&stream) {
                    self.memory.free(stream).at(location)?;
                }
                match closed {
                    Ok(()) => 0,
                    Err(err) => self.fail(err),
                }
            }
            Fflush => {
                self.stream_fd(ptr_arg(args, 0), location)?;
                0
            }
            Feof => self.read_int_field(ptr_arg(args, 0), FILE_STRUCT, "eof", location)?,
            Ferror => self.read_int_field(ptr_arg(args, 0), FILE_STRUCT, "error", location)?,
            Perror => {
                let prefix = match ptr_arg(args, 0) {
                    NULL => Vec::new(),
                    s => self.memory.read_c_string(s).at(location)?,
                };
                let mut line = prefix;
                if !line.is_empty() {
                    line.extend_from_slice(b": ");
                }
                line.extend_from_slice(FsError { errno: self.files.errno() }.message().as_bytes());
                line.push(b'\n');
                self.console.write_stderr(&line);
                return Ok(Value::Void);
            }

            Open | Creat => {
                let path = self.path_arg(args, 0, location)?;
                let flags = if builtin == Creat {
                    O_WRONLY | O_CREAT | O_TRUNC
                } else {
                    int_arg(args, 1)
                };
                match self.fd_open(&path, OpenMode::from_flags(flags)) {
                    Ok(fd) => fd,
                    Err(err) => self.fail(err),
                }
            }
            Close => match self.fd_close(int_arg(args, 0)) {
                Ok(()) => 0,
                Err(err) => self.fail(err),
            },
            Read => {
                let buf = ptr_arg(args, 1);
                // One byte past the buffer is enough to report an overrun
                let room = self
                    .memory
                    .block_info(buf)
                    .map_or(0, |(base, size, _)| (base + size as Address - buf) as usize);
                let len = (int_arg(args, 2) as u64 as usize).min(room.saturating_add(1));
                match self.fd_read(int_arg(args, 0), len) {
                    Ok(data) => {
                        if !data.is_empty() {
                            self.memory.write(buf, &data).at(location)?;
                        }
                        data.len() as i64
                    }
                    Err(err) => self.fail(err),
                }
            }
            Write => {
                let len = int_arg(args, 2) as u64 as usize;
                let data = self.memory.read(ptr_arg(args, 1), len).at(location)?;
                match self.fd_write(int_arg(args, 0), &data) {
                    Ok(n) => n as i64,
                    Err(err) => self.fail(err),
                }
            }
            Lseek => {
                let seek = Whence::from_c(int_arg(args, 2))
                    .ok_or(FsError::INVALID)
                    .and_then(|whence| match self.files.descriptor(int_arg(args, 0))? {
                        Descriptor::File(handle) => self.files.fs.seek(handle, int_arg(args, 1), whence),
                        _ => Err(FsError::ILLEGAL_SEEK),
                    });
                match seek {
                    Ok(offset) => offset as i64,
                    Err(err) => self.fail(err),
                }
            }
            Unlink => {
                let path = self.path_arg(args, 0, location)?;
                match self.files.fs.unlink(&path) {
                    Ok(()) => 0,
                    Err(err) => self.fail(err),
                }
            }
            Stat => {
                let path = self.path_arg(args, 0, location)?;
                match self.files.fs.metadata(&path) {
                    Ok(meta) => {
                        self.fill_stat(ptr_arg(args, 1), meta, location)?;
                        0
                    }
                    Err(err) => self.fail(err),
                }
            }

            Opendir => return self.opendir(args, location),
            Readdir => return self.readdir(ptr_arg(args, 0), location),
            Rewinddir => {
                let id = self.read_int_field(ptr_arg(args, 0), DIR_STRUCT, "handle", location)?;
                if let Some(dir) = self.files.dirs.get_mut(&id) {
                    dir.position = 0;
                }
                return Ok(Value::Void);
            }
            Closedir => {
                let dir = ptr_arg(args, 0);
                let id = self.read_int_field(dir, DIR_STRUCT, "handle", location)?;
                match self.files.dirs.remove(&id) {
                    Some(_) => {
                        self.memory.free(dir).at(location)?;
                        0
                    }
                    None => self.fail(FsError::BAD_DESCRIPTOR),
                }
            }

            other => {
                return Err(RuntimeError::Unsupported {
                    message: format!("{:?} is not an I/O function", other),
                    location,
                })
            }
        };
        Ok(Value::Int(result))
    }

    fn fgets(&mut self, buf: Address, size: i64, stream: Address, location: SourceLocation) -> Result<Value, RuntimeError> {
        if size <= 0 {
            return Ok(Value::Pointer(NULL));
        }
        let mut line = Vec::new();
        let mut at_end = false;
        while (line.len() as i64) < size - 1 {
            match self.stream_getc(stream, location)? {
                -1 => {
                    at_end = true;
                    break;
                }
                c => {
                    line.push(c as u8);
                    if c == b'\n' as i64 {
                        break;
                    }
                }
            }
        }
        if line.is_empty() && at_end {
            return Ok(Value::Pointer(NULL));
        }
        line.push(0);
        self.memory.write(buf, &line).at(location)?;
        Ok(Value::Pointer(buf))
    }

    /// Fill the `struct stat` at `buf`; fields the filesystem does not track are 0
    fn fill_stat(&mut self, buf: Address, meta: Metadata, location: SourceLocation) -> Result<(), RuntimeError> {
        if buf == NULL {
            return Err(RuntimeError::memory(crate::memory::MemoryError::Null, location));
        }
        let size = self.layouts.size_of(&Type::Struct(STAT_STRUCT.to_string())).unwrap_or(0);
        self.memory.fill(buf, 0, size).at(location)?;

        let mode = match meta.kind {
            EntryKind::Directory => S_IFDIR | 0o755,
            EntryKind::File => S_IFREG | 0o644,
        };
        let links = match meta.kind {
            EntryKind::Directory => 2,
            EntryKind::File => 1,
        };
        self.write_int_field(buf, STAT_STRUCT, "st_mode", mode, location)?;
        self.write_int_field(buf, STAT_STRUCT, "st_nlink", links, location)?;
        self.write_int_field(buf, STAT_STRUCT, "st_size", meta.size as i64, location)?;
        Ok(())
    }

    fn opendir(&mut self, args: &[Value], location: SourceLocation) -> Result<Value, RuntimeError> {
        let path = self.path_arg(args, 0, location)?;
        let listing = match self.files.fs.read_dir(&path) {
            Ok(listing) => listing,
            Err(err) => {
                self.fail(err);
                return Ok(Value::Pointer(NULL));
            }
        };

        let mut entries = vec![
            (".".to_string(), EntryKind::Directory),
            ("..".to_string(), EntryKind::Directory),
        ];
        entries.extend(listing.into_iter().map(|e| (e.name, e.kind)));

        let id = self.files.next_dir;
        self.files.next_dir += 1;
        self.files.dirs.insert(id, DirStream { entries, position: 0 });

        let dir = self.library_block(DIR_STRUCT, "DIR", Region::Heap, location)?;
        self.write_int_field(dir, DIR_STRUCT, "handle", id, location)?;
        log::debug!("opendir {} -> stream {}", path, id);
        Ok(Value::Pointer(dir))
    }

    fn readdir(&mut self, dir: Address, location: SourceLocation) -> Result<Value, RuntimeError> {
        let id = self.read_int_field(dir, DIR_STRUCT, "handle", location)?;
        let Some(stream) = self.files.dirs.get_mut(&id) else {
            self.fail(FsError::BAD_DESCRIPTOR);
            return Ok(Value::Pointer(NULL));
        };
        let Some((name, kind)) = stream.entries.get(stream.position).cloned() else {
            return Ok(Value::Pointer(NULL));
        };
        stream.position += 1;
        let inode = stream.position as i64;

        let entry = dir + self.library_field(DIR_STRUCT, "entry", location)? as Address;
        let ino = self.library_field(DIRENT_STRUCT, "d_ino", location)? as Address;
        let d_type = self.library_field(DIRENT_STRUCT, "d_type", location)? as Address;
        let d_name = self.library_field(DIRENT_STRUCT, "d_name", location)? as Address;

        let kind = match kind {
            EntryKind::Directory => DT_DIR,
            EntryKind::File => DT_REG,
        };
        let mut name = name.into_bytes();
        name.truncate(255);
        name.push(0);

        self.memory.write_scalar(entry + ino, &Type::ULong, &Value::Int(inode)).at(location)?;
        self.memory.write_scalar(entry + d_type, &Type::UChar, &Value::Int(kind)).at(location)?;
        self.memory.write(entry + d_name, &name).at(location)?;
        Ok(Value::Pointer(entry))
    }
}
