//! Expression evaluation implementation
//!
//! Evaluation relies on the resolver's work: every expression carries its
//! type, every implicit conversion is an explicit `Cast` node, every name is
//! bound to a frame slot or a static object, and every member access knows
//! its byte offset. The evaluator therefore never infers a type; it reads
//! [`Expr::resolved_type`] and converts only where a `Cast` says so.
//!
//! Operators live in [`ops`](crate::interpreter::ops); lvalue addressing is
//! in [`ops::access`](crate::interpreter::ops::access).

use crate::interpreter::engine::Interpreter;
use crate::interpreter::errors::RuntimeError;
use crate::memory::value::{convert, decode, wrap_integer, Value, NULL};
use crate::parser::ast::*;

impl Interpreter {
    /// Evaluate an expression and return its value
    pub(crate) fn evaluate_expr(&mut self, expr: &Expr) -> Result<Value, RuntimeError> {
        let location = expr.location;
        let ty = expr.resolved_type();

        match &expr.kind {
            ExprKind::IntLiteral(n) => Ok(Value::Int(wrap_integer(*n as i128, ty))),

            ExprKind::FloatLiteral(f) => Ok(match ty {
                Type::Float => Value::Float(*f as f32 as f64),
                _ => Value::Float(*f),
            }),

            ExprKind::StringLiteral { bytes, id } => Ok(Value::Pointer(self.literal_address(*id, bytes, location)?)),

            ExprKind::Null => Ok(Value::Pointer(NULL)),

            ExprKind::Ident { name, binding } => {
                let address = self.binding_address(*binding, name, location)?;
                self.load(address, ty, location)
            }

            ExprKind::Binary { op, left, right } => self.evaluate_binary(*op, left, right, ty, location),

            ExprKind::Unary { op, operand } => self.evaluate_unary(*op, operand, ty, location),

            ExprKind::Assign { lhs, rhs } => self.evaluate_assign(lhs, rhs, location),

            ExprKind::CompoundAssign { op, lhs, rhs } => self.evaluate_compound_assign(*op, lhs, rhs, location),

            ExprKind::Ternary {
                condition,
                then_expr,
                else_expr,
            } => {
                if self.evaluate_expr(condition)?.is_truthy() {
                    self.evaluate_expr(then_expr)
                } else {
                    self.evaluate_expr(else_expr)
                }
            }

            ExprKind::Call { name, args, target } => self.evaluate_call(name, args, *target, location),

            ExprKind::Index { .. } | ExprKind::PointerMember { .. } => {
                let address = self.address_of(expr)?;
                self.load(address, ty, location)
            }

            ExprKind::Member { object, offset, .. } => {
                if object.is_lvalue() {
                    let address = self.address_of(expr)?;
                    return self.load(address, ty, location);
                }
                // Member of a struct rvalue such as `f().x`
                let Value::Bytes(bytes) = self.evaluate_expr(object)? else {
                    return Err(RuntimeError::Unsupported {
                        message: "member access on a non-struct value".to_string(),
                        location,
                    });
                };
                let start = offset.unwrap_or(0);
                let size = self.layouts.size_of(ty).unwrap_or(0);
                match bytes.get(start..start + size) {
                    Some(field) if ty.is_struct() => Ok(Value::Bytes(field.to_vec())),
                    Some(field) if ty.is_scalar() => Ok(decode(field, ty)),
                    _ => Err(RuntimeError::Unsupported {
                        message: format!("array member of a struct value has no address (type '{}')", ty),
                        location,
                    }),
                }
            }

            ExprKind::Cast { target, expr: inner } => {
                let value = self.evaluate_expr(inner)?;
                Ok(convert(&value, inner.resolved_type(), target))
            }

            ExprKind::SizeofType { size, .. } | ExprKind::SizeofExpr { size, .. } => match size {
                Some(size) => Ok(Value::Int(*size as i64)),
                None => Err(RuntimeError::Unsupported {
                    message: "sizeof of an incomplete type".to_string(),
                    location,
                }),
            },

            ExprKind::Comma { left, right } => {
                self.evaluate_expr(left)?;
                self.evaluate_expr(right)
            }
        }
    }

    fn evaluate_call(
        &mut self,
        name: &str,
        args: &[Expr],
        target: Option<CallTarget>,
        location: SourceLocation,
    ) -> Result<Value, RuntimeError> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.evaluate_expr(arg)?);
        }

        match target {
            Some(CallTarget::User) => {
                let def = self
                    .functions
                    .get(name)
                    .cloned()
                    .ok_or_else(|| RuntimeError::UndefinedFunction {
                        name: name.to_string(),
                        location,
                    })?;
                self.call_function(&def, values, location)
            }
            Some(CallTarget::Builtin(builtin)) => self.call_builtin(builtin, &values, location),
            None => Err(RuntimeError::UndefinedFunction {
                name: name.to_string(),
                location,
            }),
        }
    }
}
