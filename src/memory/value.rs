//! Runtime value representation
//!
//! A [`Value`] is what an rvalue evaluates to. It carries no type of its own:
//! the resolver has typed every expression, and the evaluator passes that
//! [`Type`] alongside whenever a value is converted, stored or loaded.
//!
//! # Integer representation
//!
//! All integer types live in `Value::Int(i64)`, normalized to the type's width:
//! signed types are sign-extended, narrower unsigned types are zero-extended,
//! and `unsigned long` keeps its 64-bit pattern (so values above `i64::MAX`
//! appear negative). [`Value::to_i128`] recovers the mathematical value.

use crate::parser::ast::Type;

/// Memory address type (64-bit). Address 0 is NULL.
pub type Address = u64;

pub const NULL: Address = 0;

/// Runtime values in the interpreter
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    Int(i64),
    Float(f64),
    Pointer(Address),
    /// Raw bytes of a struct or union
    Bytes(Vec<u8>),
    #[default]
    Void,
}

impl Value {
    /// Integer value, if this is an integer
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Pointer value; integers convert (`p == 0`, `(char *) 0`)
    pub fn as_address(&self) -> Option<Address> {
        match self {
            Value::Pointer(addr) => Some(*addr),
            Value::Int(n) => Some(*n as Address),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    /// C truthiness: non-zero scalars are true
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Int(n) => *n != 0,
            Value::Float(f) => *f != 0.0,
            Value::Pointer(addr) => *addr != NULL,
            Value::Bytes(_) | Value::Void => false,
        }
    }

    pub fn from_bool(b: bool) -> Value {
        Value::Int(b as i64)
    }

    /// Mathematical value of an integer of type `ty`
    pub fn to_i128(&self, ty: &Type) -> i128 {
        match self {
            Value::Int(n) if *ty == Type::ULong => *n as u64 as i128,
            Value::Int(n) => *n as i128,
            Value::Pointer(addr) => *addr as i128,
            Value::Float(f) => *f as i128,
            Value::Bytes(_) | Value::Void => 0,
        }
    }
}

/// Wrap an integer to the width and signedness of `ty`.
pub fn wrap_integer(value: i128, ty: &Type) -> i64 {
    match ty {
        Type::Char => value as i8 as i64,
        Type::UChar => value as u8 as i64,
        Type::Short => value as i16 as i64,
        Type::UShort => value as u16 as i64,
        Type::Int => value as i32 as i64,
        Type::UInt => value as u32 as i64,
        Type::ULong => value as u64 as i64,
        _ => value as i64,
    }
}

/// Whether `value` is representable in integer type `ty` without wrapping
pub fn fits_integer(value: i128, ty: &Type) -> bool {
    let (min, max): (i128, i128) = match ty {
        Type::Char => (i8::MIN as i128, i8::MAX as i128),
        Type::UChar => (0, u8::MAX as i128),
        Type::Short => (i16::MIN as i128, i16::MAX as i128),
        Type::UShort => (0, u16::MAX as i128),
        Type::Int => (i32::MIN as i128, i32::MAX as i128),
        Type::UInt => (0, u32::MAX as i128),
        Type::ULong => (0, u64::MAX as i128),
        _ => (i64::MIN as i128, i64::MAX as i128),
    };
    (min..=max).contains(&value)
}

/// Convert `value` of type `from` to type `to` (C11 6.3 conversions).
pub fn convert(value: &Value, from: &Type, to: &Type) -> Value {
    let from = from.decay();
    match to {
        Type::Void => Value::Void,
        t if t.is_integer() => match value {
            Value::Float(f) => Value::Int(wrap_integer(float_to_integer(*f, t), t)),
            other => Value::Int(wrap_integer(other.to_i128(&from), t)),
        },
        Type::Float => Value::Float(to_float(value, &from) as f32 as f64),
        Type::Double => Value::Float(to_float(value, &from)),
        Type::Pointer(_) | Type::Array(..) => match value {
            Value::Pointer(addr) => Value::Pointer(*addr),
            other => Value::Pointer(other.to_i128(&from) as u64),
        },
        // Struct values are copied byte for byte
        _ => value.clone(),
    }
}

fn to_float(value: &Value, from: &Type) -> f64 {
    match value {
        Value::Float(f) => *f,
        other => other.to_i128(from) as f64,
    }
}

/// Float to integer truncates toward zero. Out of range values and NaN give
/// the x86-64 "integer indefinite" result: the minimum of the 32- or 64-bit
/// conversion the target type goes through.
fn float_to_integer(f: f64, to: &Type) -> i128 {
    const TWO_63: f64 = 9_223_372_036_854_775_808.0;

    let via_i32 = |f: f64| -> i128 {
        if f > -2_147_483_649.0 && f < 2_147_483_648.0 {
            f.trunc() as i32 as i128
        } else {
            i32::MIN as i128
        }
    };
    let via_i64 = |f: f64| -> i128 {
        if (-TWO_63..TWO_63).contains(&f) {
            f.trunc() as i64 as i128
        } else {
            i64::MIN as i128
        }
    };

    match to {
        Type::ULong if f >= TWO_63 => (via_i64(f - TWO_63) as u64 ^ (1 << 63)) as i128,
        Type::UInt | Type::Long | Type::ULong => via_i64(f),
        _ => via_i32(f),
    }
}

/// Byte width of a scalar type, `None` for aggregates and void
pub fn scalar_size(ty: &Type) -> Option<usize> {
    match ty {
        Type::Float => Some(4),
        Type::Double | Type::Pointer(_) => Some(8),
        other => other.integer_width(),
    }
}

/// Little-endian encoding of a scalar value as `ty`
pub fn encode(value: &Value, ty: &Type) -> Vec<u8> {
    match ty {
        Type::Float => (value.as_f64().unwrap_or(0.0) as f32).to_le_bytes().to_vec(),
        Type::Double => value.as_f64().unwrap_or(0.0).to_le_bytes().to_vec(),
        Type::Pointer(_) => value.as_address().unwrap_or(NULL).to_le_bytes().to_vec(),
        Type::Struct(_) | Type::Array(..) => match value {
            Value::Bytes(bytes) => bytes.clone(),
            _ => Vec::new(),
        },
        other => {
            let width = other.integer_width().unwrap_or(8);
            let n = match value {
                Value::Pointer(addr) => *addr as i64,
                Value::Float(f) => *f as i64,
                Value::Int(n) => *n,
                _ => 0,
            };
            n.to_le_bytes()[..width].to_vec()
        }
    }
}

/// Decode a scalar of type `ty` from little-endian bytes
pub fn decode(bytes: &[u8], ty: &Type) -> Value {
    let mut buf = [0u8; 8];
    let len = bytes.len().min(8);
    buf[..len].copy_from_slice(&bytes[..len]);

    match ty {
        Type::Float => {
            let mut b = [0u8; 4];
            b.copy_from_slice(&buf[..4]);
            Value::Float(f32::from_le_bytes(b) as f64)
        }
        Type::Double => Value::Float(f64::from_le_bytes(buf)),
        Type::Pointer(_) => Value::Pointer(u64::from_le_bytes(buf)),
        Type::Struct(_) | Type::Array(..) => Value::Bytes(bytes.to_vec()),
        other => Value::Int(wrap_integer(i64::from_le_bytes(buf) as i128, other)),
    }
}
