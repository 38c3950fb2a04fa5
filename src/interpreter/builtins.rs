//! Built-in C library
//!
//! The library functions a fixture can call without defining them. Each one
//! is a [`Builtin`]; the resolver checks calls against its [`Signature`] and
//! inserts the argument conversions, so by the time [`Interpreter::call_builtin`]
//! runs, every argument is already a value of the parameter's type.
//!
//! # Supported Built-ins
//!
//! - stdio: `printf` family, character and line I/O, `fopen`/`fclose`, `perror`
//! - stdlib: `malloc`, `calloc`, `realloc`, `free`, `exit`, `abs`, `labs`, `atoi`, `atol`
//! - string: `str*` and `mem*` functions (see [`strings`](super::strings))
//! - ctype: classification and case mapping
//! - POSIX: descriptor and directory calls (see [`files`](super::files))
//!
//! A user definition with the same name always wins over the built-in.

use crate::interpreter::engine::Interpreter;
use crate::interpreter::errors::{AtLocation, RuntimeError};
use crate::interpreter::format;
use crate::memory::value::{Address, Value, NULL};
use crate::memory::Region;
use crate::parser::ast::{SourceLocation, Type};

/// Alignment of every heap allocation
pub const HEAP_ALIGN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    // stdio
    Printf,
    Sprintf,
    Snprintf,
    Fprintf,
    Putchar,
    Puts,
    Getchar,
    Fputs,
    Fputc,
    Putc,
    Fgetc,
    Getc,
    Fgets,
    Fopen,
    Fclose,
    Fflush,
    Feof,
    Ferror,
    Perror,
    // stdlib
    Malloc,
    Calloc,
    Realloc,
    Free,
    Exit,
    Abs,
    Labs,
    Atoi,
    Atol,
    // string
    Strlen,
    Strcpy,
    Strncpy,
    Strcat,
    Strncat,
    Strcmp,
    Strncmp,
    Strchr,
    Strrchr,
    Strstr,
    Strdup,
    Memset,
    Memcpy,
    Memmove,
    Memcmp,
    // ctype
    Isdigit,
    Isalpha,
    Isalnum,
    Isspace,
    Isupper,
    Islower,
    Ispunct,
    Isxdigit,
    Toupper,
    Tolower,
    // POSIX
    Open,
    Creat,
    Close,
    Read,
    Write,
    Lseek,
    Unlink,
    Stat,
    Opendir,
    Readdir,
    Rewinddir,
    Closedir,
    /// `stdin`, `stdout` and `stderr` expand to calls of this
    Stream,
}

/// Parameter and return types of a built-in
#[derive(Debug, Clone)]
pub struct Signature {
    pub return_type: Type,
    pub params: Vec<Type>,
    pub variadic: bool,
}

fn file_ptr() -> Type {
    Type::Struct("__krun_file".to_string()).pointer_to()
}

fn dir_ptr() -> Type {
    Type::Struct("__krun_dir".to_string()).pointer_to()
}

impl Builtin {
    pub fn from_name(name: &str) -> Option<Builtin> {
        use Builtin::*;
        let builtin = match name {
            "printf" => Printf,
            "sprintf" => Sprintf,
            "snprintf" => Snprintf,
            "fprintf" => Fprintf,
            "putchar" => Putchar,
            "puts" => Puts,
            "getchar" => Getchar,
            "fputs" => Fputs,
            "fputc" => Fputc,
            "putc" => Putc,
            "fgetc" => Fgetc,
            "getc" => Getc,
            "fgets" => Fgets,
            "fopen" => Fopen,
            "fclose" => Fclose,
            "fflush" => Fflush,
            "feof" => Feof,
            "ferror" => Ferror,
            "perror" => Perror,
            "malloc" => Malloc,
            "calloc" => Calloc,
            "realloc" => Realloc,
            "free" => Free,
            "exit" => Exit,
            "abs" => Abs,
            "labs" => Labs,
            "atoi" => Atoi,
            "atol" => Atol,
            "strlen" => Strlen,
            "strcpy" => Strcpy,
            "strncpy" => Strncpy,
            "strcat" => Strcat,
            "strncat" => Strncat,
            "strcmp" => Strcmp,
            "strncmp" => Strncmp,
            "strchr" => Strchr,
            "strrchr" => Strrchr,
            "strstr" => Strstr,
            "strdup" => Strdup,
            "memset" => Memset,
            "memcpy" => Memcpy,
            "memmove" => Memmove,
            "memcmp" => Memcmp,
            "isdigit" => Isdigit,
            "isalpha" => Isalpha,
            "isalnum" => Isalnum,
            "isspace" => Isspace,
            "isupper" => Isupper,
            "islower" => Islower,
            "ispunct" => Ispunct,
            "isxdigit" => Isxdigit,
            "toupper" => Toupper,
            "tolower" => Tolower,
            "open" => Open,
            "creat" => Creat,
            "close" => Close,
            "read" => Read,
            "write" => Write,
            "lseek" => Lseek,
            "unlink" => Unlink,
            "stat" => Stat,
            "opendir" => Opendir,
            "readdir" => Readdir,
            "rewinddir" => Rewinddir,
            "closedir" => Closedir,
            "__krun_stream" => Stream,
            _ => return None,
        };
        Some(builtin)
    }

    pub fn signature(&self) -> Signature {
        use Builtin::*;
        let int = Type::Int;
        let long = Type::Long;
        let size = Type::ULong;
        let string = Type::char_pointer();
        let void_ptr = Type::void_pointer();

        let (return_type, params, variadic) = match self {
            Printf => (int, vec![string], true),
            Sprintf => (int, vec![string.clone(), string], true),
            Snprintf => (int, vec![string.clone(), size, string], true),
            Fprintf => (int, vec![file_ptr(), string], true),
            Putchar => (int.clone(), vec![int], false),
            Puts => (int, vec![string], false),
            Getchar => (int, vec![], false),
            Fputs => (int, vec![string, file_ptr()], false),
            Fputc | Putc => (int.clone(), vec![int, file_ptr()], false),
            Fgetc | Getc | Fclose | Fflush | Feof | Ferror => (int, vec![file_ptr()], false),
            Fgets => (string.clone(), vec![string, int, file_ptr()], false),
            Fopen => (file_ptr(), vec![string.clone(), string], false),
            Perror => (Type::Void, vec![string], false),
            Malloc => (void_ptr, vec![size], false),
            Calloc => (void_ptr, vec![size.clone(), size], false),
            Realloc => (void_ptr.clone(), vec![void_ptr, size], false),
            Free => (Type::Void, vec![void_ptr], false),
            Exit => (Type::Void, vec![int], false),
            Abs => (int.clone(), vec![int], false),
            Labs => (long.clone(), vec![long], false),
            Atoi => (int, vec![string], false),
            Atol => (long, vec![string], false),
            Strlen => (size, vec![string], false),
            Strcpy | Strcat | Strstr => (string.clone(), vec![string.clone(), string], false),
            Strncpy | Strncat => (string.clone(), vec![string.clone(), string, size], false),
            Strcmp => (int, vec![string.clone(), string], false),
            Strncmp => (int, vec![string.clone(), string, size], false),
            Strchr | Strrchr => (string.clone(), vec![string, int], false),
            Strdup => (string.clone(), vec![string], false),
            Memset => (void_ptr.clone(), vec![void_ptr, int, size], false),
            Memcpy | Memmove => (void_ptr.clone(), vec![void_ptr.clone(), void_ptr, size], false),
            Memcmp => (int, vec![void_ptr.clone(), void_ptr, size], false),
            Isdigit | Isalpha | Isalnum | Isspace | Isupper | Islower | Ispunct | Isxdigit
            | Toupper | Tolower => (int.clone(), vec![int], false),
            Open => (int.clone(), vec![string, int], true),
            Creat => (int, vec![string, Type::UInt], false),
            Close => (int.clone(), vec![int], false),
            Read | Write => (long, vec![int, void_ptr, size], false),
            Lseek => (long.clone(), vec![int.clone(), long, int], false),
            Unlink => (int, vec![string], false),
            Stat => (int, vec![string, Type::Struct("stat".to_string()).pointer_to()], false),
            Opendir => (dir_ptr(), vec![string], false),
            Readdir => (Type::Struct("dirent".to_string()).pointer_to(), vec![dir_ptr()], false),
            Rewinddir => (Type::Void, vec![dir_ptr()], false),
            Closedir => (int, vec![dir_ptr()], false),
            Stream => (file_ptr(), vec![int], false),
        };
        Signature {
            return_type,
            params,
            variadic,
        }
    }
}

/// Integer argument `i` (zero when absent)
pub(crate) fn int_arg(args: &[Value], i: usize) -> i64 {
    args.get(i).and_then(Value::as_int).unwrap_or(0)
}

/// Pointer argument `i` (NULL when absent)
pub(crate) fn ptr_arg(args: &[Value], i: usize) -> Address {
    args.get(i).and_then(Value::as_address).unwrap_or(NULL)
}

impl Interpreter {
    pub(crate) fn call_builtin(
        &mut self,
        builtin: Builtin,
        args: &[Value],
        location: SourceLocation,
    ) -> Result<Value, RuntimeError> {
        use Builtin::*;
        log::trace!("builtin {:?} with {} argument(s)", builtin, args.len());

        match builtin {
            Printf => {
                let out = self.format_from(args, 0, location)?;
                self.console.write_stdout(&out);
                Ok(Value::Int(out.len() as i64))
            }
            Fprintf => {
                let out = self.format_from(args, 1, location)?;
                let fd = self.stream_fd(ptr_arg(args, 0), location)?;
                Ok(Value::Int(match self.fd_write(fd, &out) {
                    Ok(_) => out.len() as i64,
                    Err(err) => self.fail(err),
                }))
            }
            Sprintf => {
                let mut out = self.format_from(args, 1, location)?;
                let len = out.len();
                out.push(0);
                self.memory.write(ptr_arg(args, 0), &out).at(location)?;
                Ok(Value::Int(len as i64))
            }
            Snprintf => {
                let mut out = self.format_from(args, 2, location)?;
                let len = out.len();
                let capacity = int_arg(args, 1) as u64 as usize;
                if capacity > 0 {
                    out.truncate(capacity - 1);
                    out.push(0);
                    self.memory.write(ptr_arg(args, 0), &out).at(location)?;
                }
                Ok(Value::Int(len as i64))
            }

            Malloc => self.malloc(int_arg(args, 0) as u64 as usize, false),
            Calloc => {
                let count = int_arg(args, 0) as u64 as usize;
                let size = int_arg(args, 1) as u64 as usize;
                match count.checked_mul(size) {
                    Some(total) => self.malloc(total, true),
                    None => Ok(Value::Pointer(NULL)),
                }
            }
            Realloc => self.realloc(ptr_arg(args, 0), int_arg(args, 1) as u64 as usize, location),
            Free => {
                self.memory.free(ptr_arg(args, 0)).at(location)?;
                Ok(Value::Void)
            }
            Exit => Err(RuntimeError::Exit {
                code: int_arg(args, 0) as i32,
            }),
            Abs => Ok(Value::Int((int_arg(args, 0) as i32).wrapping_abs() as i64)),
            Labs => Ok(Value::Int(int_arg(args, 0).wrapping_abs())),

            Atoi | Atol | Strlen | Strcpy | Strncpy | Strcat | Strncat | Strcmp | Strncmp
            | Strchr | Strrchr | Strstr | Strdup | Memset | Memcpy | Memmove | Memcmp => {
                self.call_string(builtin, args, location)
            }

            Isdigit | Isalpha | Isalnum | Isspace | Isupper | Islower | Ispunct | Isxdigit
            | Toupper | Tolower => Ok(Value::Int(ctype(builtin, int_arg(args, 0)))),

            Putchar | Puts | Getchar | Fputs | Fputc | Putc | Fgetc | Getc | Fgets | Fopen
            | Fclose | Fflush | Feof | Ferror | Perror | Open | Creat | Close | Read | Write
            | Lseek | Unlink | Stat | Opendir | Readdir | Rewinddir | Closedir | Stream => {
                self.call_io(builtin, args, location)
            }
        }
    }

    /// Format `args[index]` as the format string with the arguments after it
    fn format_from(
        &self,
        args: &[Value],
        index: usize,
        location: SourceLocation,
    ) -> Result<Vec<u8>, RuntimeError> {
        let fmt = self.memory.read_c_string(ptr_arg(args, index)).at(location)?;
        let rest = args.get(index + 1..).unwrap_or(&[]);
        format::format(&self.memory, &fmt, rest, location)
    }

    /// `malloc`/`calloc`; NULL when the heap limit would be exceeded
    pub(crate) fn malloc(&mut self, size: usize, zeroed: bool) -> Result<Value, RuntimeError> {
        let result = if zeroed {
            self.memory.allocate_zeroed(size, HEAP_ALIGN, Region::Heap, "calloc")
        } else {
            self.memory.allocate(size, HEAP_ALIGN, Region::Heap, "malloc")
        };
        match result {
            Ok(address) => Ok(Value::Pointer(address)),
            Err(err) => {
                log::debug!("allocation of {} bytes failed: {}", size, err);
                Ok(Value::Pointer(NULL))
            }
        }
    }

    fn realloc(&mut self, old: Address, size: usize, location: SourceLocation) -> Result<Value, RuntimeError> {
        if old == NULL {
            return self.malloc(size, false);
        }
        let old_size = match self.memory.block_info(old) {
            Some((base, len, Region::Heap)) if base == old => len,
            _ => {
                return Err(RuntimeError::memory(
                    crate::memory::MemoryError::InvalidFree {
                        address: old,
                        reason: "realloc of a pointer malloc did not return",
                    },
                    location,
                ))
            }
        };
        if size == 0 {
            self.memory.free(old).at(location)?;
            return Ok(Value::Pointer(NULL));
        }
        let Value::Pointer(new) = self.malloc(size, false)? else {
            return Ok(Value::Pointer(NULL));
        };
        if new == NULL {
            return Ok(Value::Pointer(NULL));
        }
        self.memory.copy(new, old, old_size.min(size)).at(location)?;
        self.memory.free(old).at(location)?;
        Ok(Value::Pointer(new))
    }
}

/// `<ctype.h>` in the C locale; `EOF` and values outside `unsigned char` classify as false
fn ctype(builtin: Builtin, c: i64) -> i64 {
    let Ok(byte) = u8::try_from(c) else {
        return match builtin {
            Builtin::Toupper | Builtin::Tolower => c,
            _ => 0,
        };
    };
    let yes = match builtin {
        Builtin::Isdigit => byte.is_ascii_digit(),
        Builtin::Isalpha => byte.is_ascii_alphabetic(),
        Builtin::Isalnum => byte.is_ascii_alphanumeric(),
        Builtin::Isspace => matches!(byte, b' ' | b'\t' | b'\n' | b'\r' | 0x0b | 0x0c),
        Builtin::Isupper => byte.is_ascii_uppercase(),
        Builtin::Islower => byte.is_ascii_lowercase(),
        Builtin::Ispunct => byte.is_ascii_punctuation(),
        Builtin::Isxdigit => byte.is_ascii_hexdigit(),
        Builtin::Toupper => return byte.to_ascii_uppercase() as i64,
        Builtin::Tolower => return byte.to_ascii_lowercase() as i64,
        _ => false,
    };
    yes as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        assert_eq!(Builtin::from_name("printf"), Some(Builtin::Printf));
        assert_eq!(Builtin::from_name("__krun_stream"), Some(Builtin::Stream));
        assert_eq!(Builtin::from_name("scanf"), None);
    }

    #[test]
    fn test_signatures() {
        let sig = Builtin::Printf.signature();
        assert!(sig.variadic);
        assert_eq!(sig.params, vec![Type::char_pointer()]);
        assert_eq!(Builtin::Strlen.signature().return_type, Type::ULong);
        assert_eq!(Builtin::Free.signature().return_type, Type::Void);
        assert_eq!(
            Builtin::Stat.signature().params[1],
            Type::Struct("stat".to_string()).pointer_to()
        );
    }

    #[test]
    fn test_ctype() {
        assert_eq!(ctype(Builtin::Isdigit, '7' as i64), 1);
        assert_eq!(ctype(Builtin::Isdigit, -1), 0);
        assert_eq!(ctype(Builtin::Isspace, '\n' as i64), 1);
        assert_eq!(ctype(Builtin::Toupper, 'q' as i64), 'Q' as i64);
        assert_eq!(ctype(Builtin::Tolower, -1), -1);
        assert_eq!(ctype(Builtin::Ispunct, '!' as i64), 1);
    }
}
