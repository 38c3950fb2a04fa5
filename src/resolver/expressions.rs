//! Expression typing
//!
//! Every expression gets its C type. Operands are converted the way C
//! converts them (integer promotions, usual arithmetic conversions, array
//! decay, argument and assignment conversions) and each such conversion is
//! inserted into the tree as an explicit `Cast` node, so the interpreter only
//! ever combines values of the same type.
//!
//! Resolution of an expression is idempotent: a node that already carries a
//! type is left alone.

use super::errors::ResolveError;
use super::types::{convertible, is_null_constant, promote, promote_argument, usual_arithmetic};
use super::Resolver;
use crate::parser::ast::*;

/// Wrap `expr` in a conversion to `to`
fn wrap_cast(expr: &mut Expr, to: &Type) {
    let location = expr.location;
    let inner = std::mem::replace(expr, Expr::typed(ExprKind::Null, Type::void_pointer(), location));
    *expr = Expr::typed(
        ExprKind::Cast {
            target: to.clone(),
            expr: Box::new(inner),
        },
        to.clone(),
        location,
    );
}

impl Resolver {
    /// Implicitly convert a resolved expression to `to`
    pub(crate) fn coerce(&self, expr: &mut Expr, to: &Type, context: &str) -> Result<(), ResolveError> {
        let from = expr.resolved_type().clone();
        if from == *to {
            return Ok(());
        }
        if !convertible(&from, to) {
            return Err(ResolveError::mismatch(
                format!("incompatible types in {}: '{}' to '{}'", context, from, to),
                expr.location,
            ));
        }
        wrap_cast(expr, to);
        Ok(())
    }

    pub(crate) fn resolve_expr(&mut self, expr: &mut Expr) -> Result<(), ResolveError> {
        if expr.ty.is_some() {
            return Ok(());
        }
        let location = expr.location;
        let ty = match &mut expr.kind {
            ExprKind::IntLiteral(_) => Type::Int,
            ExprKind::FloatLiteral(_) => Type::Double,
            ExprKind::StringLiteral { bytes, .. } => Type::Char.array_of(Some(bytes.len() + 1)),
            ExprKind::Null => Type::void_pointer(),

            ExprKind::Ident { name, binding } => {
                let symbol = self.scopes.lookup(name).ok_or_else(|| ResolveError::UndeclaredIdentifier {
                    name: name.clone(),
                    location,
                })?;
                *binding = Some(symbol.binding);
                symbol.ty.clone()
            }

            ExprKind::Binary { op, left, right } => self.resolve_binary(*op, left, right, location)?,

            ExprKind::Unary { op, operand } => self.resolve_unary(*op, operand, location)?,

            ExprKind::Assign { lhs, rhs } => {
                self.resolve_expr(lhs)?;
                self.resolve_expr(rhs)?;
                self.check_modifiable(lhs, "assignment")?;
                let target = lhs.resolved_type().clone();
                self.coerce(rhs, &target, "assignment")?;
                target
            }

            ExprKind::CompoundAssign { op, lhs, rhs } => {
                self.resolve_expr(lhs)?;
                self.resolve_expr(rhs)?;
                self.check_modifiable(lhs, "assignment")?;
                let target = lhs.resolved_type().clone();
                let value = rhs.resolved_type().decay();
                match op {
                    BinOp::Add | BinOp::Sub if target.is_pointer() && value.is_integer() => {
                        self.coerce(rhs, &Type::Long, "pointer arithmetic")?;
                    }
                    BinOp::Shl | BinOp::Shr if target.is_integer() && value.is_integer() => {
                        self.coerce(rhs, &promote(&value), "shift")?;
                    }
                    BinOp::Mod | BinOp::BitAnd | BinOp::BitOr | BinOp::BitXor
                        if target.is_integer() && value.is_integer() =>
                    {
                        self.coerce(rhs, &usual_arithmetic(&target, &value), "assignment")?;
                    }
                    BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div
                        if target.is_arithmetic() && value.is_arithmetic() =>
                    {
                        self.coerce(rhs, &usual_arithmetic(&target, &value), "assignment")?;
                    }
                    _ => {
                        return Err(ResolveError::mismatch(
                            format!(
                                "invalid operands to '{}=' ('{}' and '{}')",
                                op.symbol(),
                                target,
                                value
                            ),
                            location,
                        ))
                    }
                }
                target
            }

            ExprKind::Ternary {
                condition,
                then_expr,
                else_expr,
            } => {
                self.resolve_condition(condition)?;
                self.resolve_expr(then_expr)?;
                self.resolve_expr(else_expr)?;
                self.resolve_branches(then_expr, else_expr, location)?
            }

            ExprKind::Call { name, args, target } => {
                let resolved = self.call_target(name).ok_or_else(|| ResolveError::UndefinedFunction {
                    name: name.clone(),
                    location,
                })?;
                *target = Some(resolved);
                for arg in args.iter_mut() {
                    self.resolve_expr(arg)?;
                }
                self.resolve_call(name, resolved, args, location)?
            }

            ExprKind::Index { array, index } => {
                self.resolve_expr(array)?;
                self.resolve_expr(index)?;
                if array.resolved_type().decay().is_integer() && index.resolved_type().is_pointer_like() {
                    std::mem::swap(array, index);
                }
                let base = array.resolved_type().decay();
                if !base.is_pointer() || !index.resolved_type().is_integer() {
                    return Err(ResolveError::mismatch(
                        format!("'{}' cannot be subscripted", array.resolved_type()),
                        location,
                    ));
                }
                self.coerce(index, &Type::Long, "subscript")?;
                let element = base.pointee().cloned().unwrap_or(Type::Void);
                self.require_complete(&element, location)?;
                element
            }

            ExprKind::Member { object, member, offset } => {
                self.resolve_expr(object)?;
                let field = self.layouts.member(object.resolved_type(), member, location)?;
                *offset = Some(field.offset);
                field.ty.clone()
            }

            ExprKind::PointerMember { object, member, offset } => {
                self.resolve_expr(object)?;
                let pointer = object.resolved_type().decay();
                let target = pointer.pointee().ok_or_else(|| {
                    ResolveError::mismatch(format!("'->' applied to non-pointer '{}'", pointer), location)
                })?;
                let field = self.layouts.member(target, member, location)?;
                *offset = Some(field.offset);
                field.ty.clone()
            }

            ExprKind::Cast { target, expr: inner } => {
                self.resolve_expr(inner)?;
                let from = inner.resolved_type().decay();
                let valid = match (&from, &*target) {
                    (_, Type::Void) => true,
                    (f, t) if f.is_floating() && t.is_pointer() => false,
                    (f, t) if f.is_pointer() && t.is_floating() => false,
                    (f, t) => f.is_scalar() && t.is_scalar(),
                };
                if !valid {
                    return Err(ResolveError::mismatch(
                        format!("cannot cast '{}' to '{}'", from, target),
                        location,
                    ));
                }
                target.clone()
            }

            ExprKind::SizeofType { target, size } => {
                *size = Some(self.layouts.size_of(target).ok_or_else(|| ResolveError::IncompleteType {
                    ty: target.clone(),
                    location,
                })?);
                Type::ULong
            }

            ExprKind::SizeofExpr { expr: inner, size } => {
                self.resolve_expr(inner)?;
                let ty = inner.resolved_type();
                *size = Some(self.layouts.size_of(ty).ok_or_else(|| ResolveError::IncompleteType {
                    ty: ty.clone(),
                    location,
                })?);
                Type::ULong
            }

            ExprKind::Comma { left, right } => {
                self.resolve_expr(left)?;
                self.resolve_expr(right)?;
                right.resolved_type().decay()
            }
        };
        expr.ty = Some(ty);
        Ok(())
    }

    fn resolve_binary(
        &mut self,
        op: BinOp,
        left: &mut Expr,
        right: &mut Expr,
        location: SourceLocation,
    ) -> Result<Type, ResolveError> {
        self.resolve_expr(left)?;
        self.resolve_expr(right)?;
        let lt = left.resolved_type().decay();
        let rt = right.resolved_type().decay();
        let invalid = || {
            ResolveError::mismatch(
                format!("invalid operands to binary '{}' ('{}' and '{}')", op.symbol(), lt, rt),
                location,
            )
        };

        match op {
            BinOp::And | BinOp::Or => {
                if !lt.is_scalar() || !rt.is_scalar() {
                    return Err(invalid());
                }
                Ok(Type::Int)
            }
            BinOp::Add | BinOp::Sub if lt.is_pointer() && rt.is_integer() => {
                self.coerce(right, &Type::Long, "pointer arithmetic")?;
                Ok(lt)
            }
            BinOp::Add if lt.is_integer() && rt.is_pointer() => {
                self.coerce(left, &Type::Long, "pointer arithmetic")?;
                Ok(rt)
            }
            BinOp::Sub if lt.is_pointer() && rt.is_pointer() => Ok(Type::Long),
            BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div => {
                if !lt.is_arithmetic() || !rt.is_arithmetic() {
                    return Err(invalid());
                }
                let common = usual_arithmetic(&lt, &rt);
                self.coerce(left, &common, "arithmetic")?;
                self.coerce(right, &common, "arithmetic")?;
                Ok(common)
            }
            BinOp::Mod | BinOp::BitAnd | BinOp::BitOr | BinOp::BitXor => {
                if !lt.is_integer() || !rt.is_integer() {
                    return Err(invalid());
                }
                let common = usual_arithmetic(&lt, &rt);
                self.coerce(left, &common, "arithmetic")?;
                self.coerce(right, &common, "arithmetic")?;
                Ok(common)
            }
            BinOp::Shl | BinOp::Shr => {
                if !lt.is_integer() || !rt.is_integer() {
                    return Err(invalid());
                }
                let (l, r) = (promote(&lt), promote(&rt));
                self.coerce(left, &l, "shift")?;
                self.coerce(right, &r, "shift")?;
                Ok(l)
            }
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
                if lt.is_arithmetic() && rt.is_arithmetic() {
                    let common = usual_arithmetic(&lt, &rt);
                    self.coerce(left, &common, "comparison")?;
                    self.coerce(right, &common, "comparison")?;
                } else if lt.is_pointer() && rt.is_pointer() {
                    self.coerce(left, &lt, "comparison")?;
                    self.coerce(right, &lt, "comparison")?;
                } else if lt.is_pointer() && rt.is_integer() {
                    self.coerce(right, &lt, "comparison")?;
                } else if lt.is_integer() && rt.is_pointer() {
                    self.coerce(left, &rt, "comparison")?;
                } else {
                    return Err(invalid());
                }
                Ok(Type::Int)
            }
        }
    }

    fn resolve_unary(&mut self, op: UnOp, operand: &mut Expr, location: SourceLocation) -> Result<Type, ResolveError> {
        self.resolve_expr(operand)?;
        let ty = operand.resolved_type().clone();
        let invalid = |what: &str| {
            ResolveError::mismatch(format!("invalid operand '{}' to {}", ty, what), location)
        };

        match op {
            UnOp::Neg | UnOp::Plus => {
                if !ty.is_arithmetic() {
                    return Err(invalid("unary minus or plus"));
                }
                let promoted = promote(&ty);
                self.coerce(operand, &promoted, "arithmetic")?;
                Ok(promoted)
            }
            UnOp::BitNot => {
                if !ty.is_integer() {
                    return Err(invalid("'~'"));
                }
                let promoted = promote(&ty);
                self.coerce(operand, &promoted, "arithmetic")?;
                Ok(promoted)
            }
            UnOp::Not => {
                if !ty.decay().is_scalar() {
                    return Err(invalid("'!'"));
                }
                Ok(Type::Int)
            }
            UnOp::PreInc | UnOp::PreDec | UnOp::PostInc | UnOp::PostDec => {
                self.check_modifiable(operand, "increment or decrement")?;
                if !ty.is_scalar() {
                    return Err(invalid("increment or decrement"));
                }
                Ok(ty)
            }
            UnOp::Deref => match ty.decay() {
                Type::Pointer(target) if target.is_void() => Err(ResolveError::mismatch(
                    "dereference of 'void *'",
                    location,
                )),
                Type::Pointer(target) => Ok(*target),
                _ => Err(invalid("'*'")),
            },
            UnOp::AddrOf => {
                if !operand.is_lvalue() {
                    return Err(ResolveError::NotAssignable {
                        what: "operand of '&' (not an lvalue)".to_string(),
                        location,
                    });
                }
                Ok(ty.pointer_to())
            }
        }
    }

    /// Common type of the two arms of `?:`, converting both arms to it
    fn resolve_branches(
        &mut self,
        then_expr: &mut Expr,
        else_expr: &mut Expr,
        location: SourceLocation,
    ) -> Result<Type, ResolveError> {
        let tt = then_expr.resolved_type().decay();
        let et = else_expr.resolved_type().decay();
        let ty = if tt.is_arithmetic() && et.is_arithmetic() {
            usual_arithmetic(&tt, &et)
        } else if tt.is_pointer() && et.is_pointer() {
            if tt == Type::void_pointer() { et } else { tt }
        } else if tt.is_pointer() && is_null_constant(else_expr) {
            tt
        } else if et.is_pointer() && is_null_constant(then_expr) {
            et
        } else if tt == et {
            tt
        } else {
            return Err(ResolveError::mismatch(
                format!("mismatched operands to '?:' ('{}' and '{}')", tt, et),
                location,
            ));
        };
        self.coerce(then_expr, &ty, "conditional")?;
        self.coerce(else_expr, &ty, "conditional")?;
        Ok(ty)
    }

    fn resolve_call(
        &mut self,
        name: &str,
        target: CallTarget,
        args: &mut [Expr],
        location: SourceLocation,
    ) -> Result<Type, ResolveError> {
        let (params, variadic, return_type) = match target {
            CallTarget::User => {
                let sig = self.functions.get(name).cloned().ok_or_else(|| ResolveError::UndefinedFunction {
                    name: name.to_string(),
                    location,
                })?;
                (sig.params, false, sig.return_type)
            }
            CallTarget::Builtin(builtin) => {
                let sig = builtin.signature();
                (sig.params, sig.variadic, sig.return_type)
            }
        };

        let arity_ok = if variadic {
            args.len() >= params.len()
        } else {
            args.len() == params.len()
        };
        if !arity_ok {
            return Err(ResolveError::ArgumentCount {
                name: name.to_string(),
                expected: params.len(),
                found: args.len(),
                location,
            });
        }

        for (i, arg) in args.iter_mut().enumerate() {
            let param = match params.get(i) {
                Some(param) => param.decay(),
                None => {
                    let ty = arg.resolved_type();
                    if !ty.decay().is_scalar() {
                        return Err(ResolveError::mismatch(
                            format!("'{}' passed as a variadic argument to '{}'", ty, name),
                            arg.location,
                        ));
                    }
                    promote_argument(ty)
                }
            };
            self.coerce(arg, &param, "argument passing")?;
        }
        Ok(return_type)
    }

    /// Reject assignment targets that are not modifiable lvalues
    fn check_modifiable(&self, expr: &Expr, context: &str) -> Result<(), ResolveError> {
        let what = match &expr.kind {
            _ if !expr.is_lvalue() => Some("expression"),
            ExprKind::StringLiteral { .. } => Some("string literal"),
            _ if expr.resolved_type().is_array() => Some("array"),
            _ => None,
        };
        if let Some(what) = what {
            return Err(ResolveError::NotAssignable {
                what: format!("{} in {}", what, context),
                location: expr.location,
            });
        }

        let mut root = expr;
        while let ExprKind::Member { object, .. } = &root.kind {
            root = object;
        }
        if let ExprKind::Ident { name, .. } = &root.kind {
            if self.scopes.lookup(name).is_some_and(|s| s.is_const) {
                return Err(ResolveError::ConstAssignment {
                    name: name.clone(),
                    location: expr.location,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::resolve_source;
    use super::*;

    fn main_return(source: &str) -> Expr {
        let resolved = resolve_source(source).unwrap();
        let main = resolved.program.function("main").unwrap();
        main.body
            .iter()
            .find_map(|stmt| match stmt {
                Stmt::Return { expr: Some(expr), .. } => Some(expr.clone()),
                _ => None,
            })
            .unwrap()
    }

    #[test]
    fn test_char_arithmetic_promotes_to_int() {
        let expr = main_return("int main() { char c = 'a'; return c + 1; }");
        let ExprKind::Binary { left, .. } = &expr.kind else {
            panic!("expected binary");
        };
        assert_eq!(left.ty, Some(Type::Int));
        assert!(matches!(left.kind, ExprKind::Cast { .. }));
    }

    #[test]
    fn test_pointer_arithmetic_keeps_pointer_type() {
        let expr = main_return("int main() { int a[4]; int *p = a; return *(p + 2); }");
        let ExprKind::Unary { operand, .. } = &expr.kind else {
            panic!("expected deref");
        };
        assert_eq!(operand.ty, Some(Type::Int.pointer_to()));
    }

    #[test]
    fn test_member_offsets() {
        let expr = main_return(
            "struct point { int x; int y; }; int main() { struct point pt; struct point *pp = &pt; return pp->y; }",
        );
        assert!(matches!(expr.kind, ExprKind::PointerMember { offset: Some(4), .. }));
        assert_eq!(expr.ty, Some(Type::Int));
    }

    #[test]
    fn test_sizeof() {
        let expr = main_return("int main() { int a[10]; return sizeof a / sizeof(int); }");
        let ExprKind::Cast { expr: inner, .. } = &expr.kind else {
            panic!("expected conversion to int");
        };
        let ExprKind::Binary { left, .. } = &inner.kind else {
            panic!("expected division");
        };
        assert!(matches!(left.kind, ExprKind::SizeofExpr { size: Some(40), .. }));
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            resolve_source("int main() { return y; }").unwrap_err(),
            ResolveError::UndeclaredIdentifier { .. }
        ));
        assert!(matches!(
            resolve_source("int main() { return nosuch(1); }").unwrap_err(),
            ResolveError::UndefinedFunction { .. }
        ));
        assert!(matches!(
            resolve_source("int f(int a) { return a; } int main() { return f(1, 2); }").unwrap_err(),
            ResolveError::ArgumentCount { expected: 1, found: 2, .. }
        ));
        assert!(matches!(
            resolve_source("int main() { const int k = 1; k = 2; return k; }").unwrap_err(),
            ResolveError::ConstAssignment { .. }
        ));
        assert!(matches!(
            resolve_source("int main() { int a[2]; int b[2]; a = b; return 0; }").unwrap_err(),
            ResolveError::NotAssignable { .. }
        ));
        assert!(matches!(
            resolve_source("int main() { 1 = 2; return 0; }").unwrap_err(),
            ResolveError::NotAssignable { .. }
        ));
        assert!(matches!(
            resolve_source("struct s { int a; }; int main() { struct s v; return v.b; }").unwrap_err(),
            ResolveError::UnknownMember { .. }
        ));
    }

    #[test]
    fn test_variadic_arguments_are_promoted() {
        let resolved = resolve_source("int main() { float f = 1.5f; printf(\"%f\", f); return 0; }").unwrap();
        let main = resolved.program.function("main").unwrap();
        let Stmt::Expr(Expr {
            kind: ExprKind::Call { args, .. },
            ..
        }) = &main.body[1]
        else {
            panic!("expected call");
        };
        assert_eq!(args[1].ty, Some(Type::Double));
    }
}
