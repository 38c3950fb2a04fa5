//! `printf`-family formatting
//!
//! [`format`] expands a C format string against already-evaluated arguments
//! and returns the produced bytes. The output matches glibc for the
//! conversions the C subset uses:
//!
//! - flags `-`, `+`, space, `0`, `#`
//! - field width and precision, either literal or `*` (taken from the arguments)
//! - length modifiers `hh`, `h`, `l`, `ll`, `z`, `j`, `t`, `L`
//! - conversions `d i u o x X c s f F e E g G p %`
//!
//! Arguments arrive after the default argument promotions, so every integer
//! is a [`Value::Int`] normalized to its promoted type and every floating
//! value is a `double`.

use crate::interpreter::errors::{AtLocation, RuntimeError};
use crate::memory::value::{Address, Value, NULL};
use crate::memory::Memory;
use crate::parser::ast::SourceLocation;

#[derive(Debug, Default, Clone, Copy)]
struct Spec {
    left: bool,
    plus: bool,
    space: bool,
    zero: bool,
    alternate: bool,
    width: usize,
    precision: Option<usize>,
    length: Length,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum Length {
    Char,
    Short,
    #[default]
    Int,
    Long,
}

struct Args<'a> {
    values: &'a [Value],
    next: usize,
    location: SourceLocation,
}

impl Args<'_> {
    fn next(&mut self, conversion: char) -> Result<&Value, RuntimeError> {
        let value = self.values.get(self.next).ok_or_else(|| RuntimeError::InvalidFormat {
            message: format!("missing argument for '%{}'", conversion),
            location: self.location,
        })?;
        self.next += 1;
        Ok(value)
    }

    fn int(&mut self, conversion: char) -> Result<i64, RuntimeError> {
        Ok(match self.next(conversion)? {
            Value::Int(n) => *n,
            Value::Pointer(addr) => *addr as i64,
            Value::Float(f) => *f as i64,
            _ => 0,
        })
    }
}

/// Expand `format` with `args`; `%s` and `%p` arguments are read from `memory`
pub fn format(
    memory: &Memory,
    format: &[u8],
    args: &[Value],
    location: SourceLocation,
) -> Result<Vec<u8>, RuntimeError> {
    let mut out = Vec::with_capacity(format.len());
    let mut args = Args {
        values: args,
        next: 0,
        location,
    };
    let invalid = |message: String| RuntimeError::InvalidFormat { message, location };

    let mut i = 0;
    while i < format.len() {
        let byte = format[i];
        i += 1;
        if byte != b'%' {
            out.push(byte);
            continue;
        }

        let mut spec = Spec::default();
        while let Some(&flag) = format.get(i) {
            match flag {
                b'-' => spec.left = true,
                b'+' => spec.plus = true,
                b' ' => spec.space = true,
                b'0' => spec.zero = true,
                b'#' => spec.alternate = true,
                _ => break,
            }
            i += 1;
        }

        if format.get(i) == Some(&b'*') {
            i += 1;
            let width = args.int('*')?;
            if width < 0 {
                spec.left = true;
            }
            spec.width = width.unsigned_abs() as usize;
        } else {
            spec.width = read_number(format, &mut i);
        }

        if format.get(i) == Some(&b'.') {
            i += 1;
            if format.get(i) == Some(&b'*') {
                i += 1;
                let precision = args.int('*')?;
                spec.precision = (precision >= 0).then_some(precision as usize);
            } else {
                spec.precision = Some(read_number(format, &mut i));
            }
        }

        spec.length = match format.get(i) {
            Some(b'h') if format.get(i + 1) == Some(&b'h') => {
                i += 2;
                Length::Char
            }
            Some(b'h') => {
                i += 1;
                Length::Short
            }
            Some(b'l') if format.get(i + 1) == Some(&b'l') => {
                i += 2;
                Length::Long
            }
            Some(b'l' | b'z' | b'j' | b't' | b'L') => {
                i += 1;
                Length::Long
            }
            _ => Length::Int,
        };

        let Some(&conversion) = format.get(i) else {
            return Err(invalid("format string ends inside a conversion".to_string()));
        };
        i += 1;
        let conversion = conversion as char;

        match conversion {
            '%' => out.push(b'%'),
            'd' | 'i' => {
                let n = signed(args.int(conversion)?, spec.length);
                let sign = sign_prefix(n < 0, &spec);
                let digits = integer_digits(n.unsigned_abs() as u128, 10, false, spec.precision);
                pad_number(&mut out, &spec, sign, &digits);
            }
            'u' | 'o' | 'x' | 'X' => {
                let n = unsigned(args.int(conversion)?, spec.length);
                let (radix, upper) = match conversion {
                    'o' => (8, false),
                    'x' => (16, false),
                    'X' => (16, true),
                    _ => (10, false),
                };
                let mut digits = integer_digits(n as u128, radix, upper, spec.precision);
                let mut prefix = "";
                if spec.alternate {
                    match conversion {
                        'o' if !digits.starts_with('0') => digits.insert(0, '0'),
                        'x' if n != 0 => prefix = "0x",
                        'X' if n != 0 => prefix = "0X",
                        _ => {}
                    }
                }
                pad_number(&mut out, &spec, prefix, &digits);
            }
            'c' => {
                let c = args.int(conversion)? as u8;
                pad(&mut out, &spec, &[c]);
            }
            's' => {
                let address = match args.next(conversion)? {
                    Value::Pointer(addr) => *addr,
                    other => other.as_address().unwrap_or(NULL),
                };
                let text = if address == NULL {
                    b"(null)".to_vec()
                } else {
                    read_string(memory, address, spec.precision, location)?
                };
                let text = match spec.precision {
                    Some(p) if p < text.len() => &text[..p],
                    _ => &text[..],
                };
                pad(&mut out, &spec, text);
            }
            'p' => {
                let address = args.next(conversion)?.as_address().unwrap_or(NULL);
                let text = if address == NULL {
                    "(nil)".to_string()
                } else {
                    format!("0x{:x}", address)
                };
                pad(&mut out, &spec, text.as_bytes());
            }
            'f' | 'F' | 'e' | 'E' | 'g' | 'G' => {
                let value = args.next(conversion)?.as_f64().unwrap_or(0.0);
                let sign = sign_prefix(value.is_sign_negative() && !value.is_nan(), &spec);
                let body = float_body(value.abs(), conversion, &spec);
                if value.is_finite() {
                    pad_number(&mut out, &Spec { precision: None, ..spec }, sign, &body);
                } else {
                    let text = format!("{}{}", sign, body);
                    pad(&mut out, &spec, text.as_bytes());
                }
            }
            'n' => return Err(invalid("'%n' is not supported".to_string())),
            other => return Err(invalid(format!("unknown conversion '%{}'", other))),
        }
    }
    Ok(out)
}

fn read_number(format: &[u8], i: &mut usize) -> usize {
    let mut n = 0usize;
    while let Some(d) = format.get(*i).filter(|b| b.is_ascii_digit()) {
        n = n.saturating_mul(10).saturating_add((d - b'0') as usize);
        *i += 1;
    }
    n
}

/// Bytes of the string at `address`; with a precision, stops after that many
fn read_string(
    memory: &Memory,
    address: Address,
    limit: Option<usize>,
    location: SourceLocation,
) -> Result<Vec<u8>, RuntimeError> {
    let Some(limit) = limit else {
        return memory.read_c_string(address).at(location);
    };
    let mut bytes = Vec::new();
    while bytes.len() < limit {
        let byte = memory.read(address + bytes.len() as Address, 1).at(location)?[0];
        if byte == 0 {
            break;
        }
        bytes.push(byte);
    }
    Ok(bytes)
}

fn signed(n: i64, length: Length) -> i64 {
    match length {
        Length::Char => n as i8 as i64,
        Length::Short => n as i16 as i64,
        Length::Int => n as i32 as i64,
        Length::Long => n,
    }
}

fn unsigned(n: i64, length: Length) -> u64 {
    match length {
        Length::Char => n as u8 as u64,
        Length::Short => n as u16 as u64,
        Length::Int => n as u32 as u64,
        Length::Long => n as u64,
    }
}

fn sign_prefix(negative: bool, spec: &Spec) -> &'static str {
    if negative {
        "-"
    } else if spec.plus {
        "+"
    } else if spec.space {
        " "
    } else {
        ""
    }
}

fn integer_digits(n: u128, radix: u32, upper: bool, precision: Option<usize>) -> String {
    if n == 0 && precision == Some(0) {
        return String::new();
    }
    let mut digits = match radix {
        8 => format!("{:o}", n),
        16 if upper => format!("{:X}", n),
        16 => format!("{:x}", n),
        _ => n.to_string(),
    };
    if let Some(p) = precision {
        if digits.len() < p {
            digits.insert_str(0, &"0".repeat(p - digits.len()));
        }
    }
    digits
}

/// Pad a number: zeros go between the sign or prefix and the digits
fn pad_number(out: &mut Vec<u8>, spec: &Spec, prefix: &str, digits: &str) {
    let len = prefix.len() + digits.len();
    let fill = spec.width.saturating_sub(len);
    if spec.left {
        out.extend_from_slice(prefix.as_bytes());
        out.extend_from_slice(digits.as_bytes());
        out.extend(std::iter::repeat(b' ').take(fill));
    } else if spec.zero && spec.precision.is_none() {
        out.extend_from_slice(prefix.as_bytes());
        out.extend(std::iter::repeat(b'0').take(fill));
        out.extend_from_slice(digits.as_bytes());
    } else {
        out.extend(std::iter::repeat(b' ').take(fill));
        out.extend_from_slice(prefix.as_bytes());
        out.extend_from_slice(digits.as_bytes());
    }
}

fn pad(out: &mut Vec<u8>, spec: &Spec, text: &[u8]) {
    let fill = spec.width.saturating_sub(text.len());
    if !spec.left {
        out.extend(std::iter::repeat(b' ').take(fill));
    }
    out.extend_from_slice(text);
    if spec.left {
        out.extend(std::iter::repeat(b' ').take(fill));
    }
}

/// Digits of a non-negative float for `%f`, `%e` or `%g` (sign handled by the caller)
fn float_body(value: f64, conversion: char, spec: &Spec) -> String {
    let upper = conversion.is_ascii_uppercase();
    if !value.is_finite() {
        let text = if value.is_nan() { "nan" } else { "inf" };
        return if upper { text.to_uppercase() } else { text.to_string() };
    }

    let precision = spec.precision.unwrap_or(6);
    let body = match conversion.to_ascii_lowercase() {
        'f' => fixed(value, precision, spec.alternate),
        'e' => exponential(value, precision, spec.alternate),
        _ => general(value, precision, spec.alternate),
    };
    if upper {
        body.to_uppercase()
    } else {
        body
    }
}

fn fixed(value: f64, precision: usize, alternate: bool) -> String {
    let mut text = format!("{:.*}", precision, value);
    if alternate && precision == 0 {
        text.push('.');
    }
    text
}

/// Split Rust's `{:e}` output into mantissa and decimal exponent
fn exponent_parts(value: f64, precision: usize) -> (String, i32) {
    let text = format!("{:.*e}", precision, value);
    match text.split_once('e') {
        Some((mantissa, exp)) => (mantissa.to_string(), exp.parse().unwrap_or(0)),
        None => (text, 0),
    }
}

fn exponential(value: f64, precision: usize, alternate: bool) -> String {
    let (mut mantissa, exp) = exponent_parts(value, precision);
    if alternate && precision == 0 {
        mantissa.push('.');
    }
    format!("{}e{}{:02}", mantissa, if exp < 0 { '-' } else { '+' }, exp.abs())
}

fn general(value: f64, precision: usize, alternate: bool) -> String {
    let p = precision.max(1);
    let (_, exp) = exponent_parts(value, p - 1);
    let mut text = if exp >= -4 && (exp as i64) < p as i64 {
        fixed(value, (p as i64 - 1 - exp as i64) as usize, alternate)
    } else {
        exponential(value, p - 1, alternate)
    };
    if !alternate {
        text = strip_fraction_zeros(&text);
    }
    text
}

/// Drop trailing zeros (and a bare point) from the fraction, keeping any exponent
fn strip_fraction_zeros(text: &str) -> String {
    let (number, exponent) = match text.find('e') {
        Some(pos) => text.split_at(pos),
        None => (text, ""),
    };
    if !number.contains('.') {
        return text.to_string();
    }
    let trimmed = number.trim_end_matches('0').trim_end_matches('.');
    format!("{}{}", trimmed, exponent)
}
