//! C conversion rules
//!
//! Integer promotions and the usual arithmetic conversions (C11 6.3.1), plus
//! the compatibility check applied wherever a value is implicitly converted:
//! assignment, initialization, argument passing and `return`.

use crate::parser::ast::{Expr, ExprKind, Type};

/// Integer promotion: types narrower than `int` become `int`
pub fn promote(ty: &Type) -> Type {
    match ty {
        Type::Char | Type::UChar | Type::Short | Type::UShort => Type::Int,
        other => other.decay(),
    }
}

/// Default argument promotion for variadic arguments
pub fn promote_argument(ty: &Type) -> Type {
    match ty {
        Type::Float => Type::Double,
        other => promote(other),
    }
}

/// Common type of two arithmetic operands
pub fn usual_arithmetic(left: &Type, right: &Type) -> Type {
    if *left == Type::Double || *right == Type::Double {
        return Type::Double;
    }
    if *left == Type::Float || *right == Type::Float {
        return Type::Float;
    }

    let (l, r) = (promote(left), promote(right));
    if l == r {
        return l;
    }
    if l.is_signed() == r.is_signed() {
        return if l.integer_rank() >= r.integer_rank() { l } else { r };
    }

    let (signed, unsigned) = if l.is_signed() { (l, r) } else { (r, l) };
    if unsigned.integer_rank() >= signed.integer_rank() {
        unsigned
    } else if signed.integer_width() > unsigned.integer_width() {
        // `long` holds every `unsigned int`
        signed
    } else {
        signed.to_unsigned()
    }
}

/// A literal `0` (possibly cast) or `NULL`
pub fn is_null_constant(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Null => true,
        ExprKind::IntLiteral(0) => true,
        ExprKind::Cast { expr, .. } => is_null_constant(expr),
        _ => false,
    }
}

/// Whether a value of type `from` may be implicitly converted to `to`
pub fn convertible(from: &Type, to: &Type) -> bool {
    let from = from.decay();
    match (&from, to) {
        (_, Type::Void) => true,
        (Type::Void, _) => false,
        (f, t) if f.is_arithmetic() && t.is_arithmetic() => true,
        (f, t) if (f.is_integer() || f.is_pointer()) && t.is_pointer() => true,
        (Type::Pointer(_), t) if t.is_integer() => true,
        (Type::Struct(a), Type::Struct(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_promotions() {
        assert_eq!(promote(&Type::Char), Type::Int);
        assert_eq!(promote(&Type::UShort), Type::Int);
        assert_eq!(promote(&Type::UInt), Type::UInt);
        assert_eq!(promote(&Type::Char.array_of(Some(4))), Type::char_pointer());
        assert_eq!(promote_argument(&Type::Float), Type::Double);
    }

    #[test]
    fn test_usual_arithmetic_conversions() {
        assert_eq!(usual_arithmetic(&Type::Char, &Type::Char), Type::Int);
        assert_eq!(usual_arithmetic(&Type::Int, &Type::Double), Type::Double);
        assert_eq!(usual_arithmetic(&Type::Float, &Type::Long), Type::Float);
        assert_eq!(usual_arithmetic(&Type::Int, &Type::UInt), Type::UInt);
        assert_eq!(usual_arithmetic(&Type::Long, &Type::UInt), Type::Long);
        assert_eq!(usual_arithmetic(&Type::Long, &Type::ULong), Type::ULong);
        assert_eq!(usual_arithmetic(&Type::Short, &Type::Long), Type::Long);
    }

    #[test]
    fn test_convertible() {
        assert!(convertible(&Type::Int, &Type::Double));
        assert!(convertible(&Type::Char.array_of(Some(3)), &Type::char_pointer()));
        assert!(convertible(&Type::void_pointer(), &Type::Int.pointer_to()));
        assert!(!convertible(&Type::Struct("a".into()), &Type::Struct("b".into())));
        assert!(!convertible(&Type::Void, &Type::Int));
        assert!(!convertible(&Type::Double, &Type::Int.pointer_to()));
    }
}
