//! `<string.h>` and the string conversions of `<stdlib.h>`
//!
//! Every function works on program memory through the checked [`Memory`]
//! API, so an overrun of the destination buffer or a missing terminator is
//! reported as a runtime error instead of corrupting a neighbour.
//!
//! [`Memory`]: crate::memory::Memory

use crate::interpreter::builtins::{int_arg, ptr_arg, Builtin, HEAP_ALIGN};
use crate::interpreter::engine::Interpreter;
use crate::interpreter::errors::{AtLocation, RuntimeError};
use crate::memory::value::{Address, Value, NULL};
use crate::memory::Region;
use crate::parser::ast::SourceLocation;
use std::cmp::Ordering;

/// `strcmp`-style result: difference of the first differing bytes
fn compare(a: &[u8], b: &[u8]) -> i64 {
    for (x, y) in a.iter().zip(b) {
        if x != y {
            return *x as i64 - *y as i64;
        }
    }
    match a.len().cmp(&b.len()) {
        Ordering::Less => -(b[a.len()] as i64),
        Ordering::Greater => a[b.len()] as i64,
        Ordering::Equal => 0,
    }
}

/// Leading integer of `text` the way `strtol` reads it (base 10, wrapping)
fn parse_integer(text: &[u8]) -> i64 {
    let mut rest = text;
    while let [c, tail @ ..] = rest {
        if !matches!(c, b' ' | b'\t' | b'\n' | b'\r' | 0x0b | 0x0c) {
            break;
        }
        rest = tail;
    }
    let negative = match rest.first() {
        Some(b'-') => {
            rest = &rest[1..];
            true
        }
        Some(b'+') => {
            rest = &rest[1..];
            false
        }
        _ => false,
    };
    let mut n: i64 = 0;
    for &c in rest.iter().take_while(|c| c.is_ascii_digit()) {
        n = n.wrapping_mul(10).wrapping_add((c - b'0') as i64);
    }
    if negative {
        n.wrapping_neg()
    } else {
        n
    }
}

impl Interpreter {
    fn c_string(&self, address: Address, location: SourceLocation) -> Result<Vec<u8>, RuntimeError> {
        self.memory.read_c_string(address).at(location)
    }

    /// The first `n` bytes of the string at `address`, stopping early at its terminator
    fn c_string_prefix(&self, address: Address, n: usize, location: SourceLocation) -> Result<Vec<u8>, RuntimeError> {
        let mut bytes = Vec::new();
        while bytes.len() < n {
            let byte = self.memory.read(address + bytes.len() as Address, 1).at(location)?[0];
            if byte == 0 {
                break;
            }
            bytes.push(byte);
        }
        Ok(bytes)
    }

    pub(crate) fn call_string(
        &mut self,
        builtin: Builtin,
        args: &[Value],
        location: SourceLocation,
    ) -> Result<Value, RuntimeError> {
        let dst = ptr_arg(args, 0);
        let src = ptr_arg(args, 1);
        let n = int_arg(args, 2) as u64 as usize;

        let result = match builtin {
            Builtin::Atoi => Value::Int(parse_integer(&self.c_string(dst, location)?) as i32 as i64),
            Builtin::Atol => Value::Int(parse_integer(&self.c_string(dst, location)?)),
            Builtin::Strlen => Value::Int(self.c_string(dst, location)?.len() as i64),

            Builtin::Strcpy => {
                let mut bytes = self.c_string(src, location)?;
                bytes.push(0);
                self.memory.write(dst, &bytes).at(location)?;
                Value::Pointer(dst)
            }
            Builtin::Strncpy => {
                let bytes = self.c_string_prefix(src, n, location)?;
                self.memory.fill(dst, 0, n).at(location)?;
                self.memory.write(dst, &bytes).at(location)?;
                Value::Pointer(dst)
            }
            Builtin::Strcat | Builtin::Strncat => {
                let start = dst + self.c_string(dst, location)?.len() as Address;
                let mut bytes = if builtin == Builtin::Strcat {
                    self.c_string(src, location)?
                } else {
                    self.c_string_prefix(src, n, location)?
                };
                bytes.push(0);
                self.memory.write(start, &bytes).at(location)?;
                Value::Pointer(dst)
            }

            Builtin::Strcmp => {
                let (a, b) = (self.c_string(dst, location)?, self.c_string(src, location)?);
                Value::Int(compare(&a, &b))
            }
            Builtin::Strncmp => {
                let a = self.c_string_prefix(dst, n, location)?;
                let b = self.c_string_prefix(src, n, location)?;
                Value::Int(compare(&a, &b))
            }

            Builtin::Strchr | Builtin::Strrchr => {
                let bytes = self.c_string(dst, location)?;
                let c = int_arg(args, 1) as u8;
                let found = if c == 0 {
                    Some(bytes.len())
                } else if builtin == Builtin::Strchr {
                    bytes.iter().position(|&b| b == c)
                } else {
                    bytes.iter().rposition(|&b| b == c)
                };
                Value::Pointer(found.map_or(NULL, |i| dst + i as Address))
            }
            Builtin::Strstr => {
                let haystack = self.c_string(dst, location)?;
                let needle = self.c_string(src, location)?;
                let found = if needle.is_empty() {
                    Some(0)
                } else {
                    haystack.windows(needle.len()).position(|w| w == needle.as_slice())
                };
                Value::Pointer(found.map_or(NULL, |i| dst + i as Address))
            }
            Builtin::Strdup => {
                let mut bytes = self.c_string(dst, location)?;
                bytes.push(0);
                match self.memory.allocate(bytes.len(), HEAP_ALIGN, Region::Heap, "strdup") {
                    Ok(copy) => {
                        self.memory.write(copy, &bytes).at(location)?;
                        Value::Pointer(copy)
                    }
                    Err(_) => Value::Pointer(NULL),
                }
            }

            Builtin::Memset => {
                self.memory.fill(dst, int_arg(args, 1) as u8, n).at(location)?;
                Value::Pointer(dst)
            }
            Builtin::Memcpy | Builtin::Memmove => {
                self.memory.copy(dst, src, n).at(location)?;
                Value::Pointer(dst)
            }
            Builtin::Memcmp => {
                let a = self.memory.read(dst, n).at(location)?;
                let b = self.memory.read(src, n).at(location)?;
                Value::Int(compare(&a, &b))
            }

            other => {
                return Err(RuntimeError::Unsupported {
                    message: format!("{:?} is not a string function", other),
                    location,
                })
            }
        };
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compare() {
        assert_eq!(compare(b"abc", b"abc"), 0);
        assert_eq!(compare(b"abc", b"abd"), -1);
        assert_eq!(compare(b"b", b"a"), 1);
        assert_eq!(compare(b"ab", b"abc"), -99);
        assert_eq!(compare(b"abc", b""), 97);
    }

    #[test]
    fn test_parse_integer() {
        assert_eq!(parse_integer(b"  42abc"), 42);
        assert_eq!(parse_integer(b"-17"), -17);
        assert_eq!(parse_integer(b"+8"), 8);
        assert_eq!(parse_integer(b"x1"), 0);
        assert_eq!(parse_integer(b""), 0);
    }
}
