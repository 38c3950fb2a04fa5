//! Lvalue addressing: identifiers, `*p`, `a[i]`, `s.f`, `p->f`

use crate::interpreter::engine::Interpreter;
use crate::interpreter::errors::RuntimeError;
use crate::memory::value::{Address, NULL};
use crate::memory::MemoryError;
use crate::parser::ast::{Expr, ExprKind, UnOp};

impl Interpreter {
    /// Address of the object an lvalue expression designates
    pub(crate) fn address_of(&mut self, expr: &Expr) -> Result<Address, RuntimeError> {
        let location = expr.location;
        match &expr.kind {
            ExprKind::Ident { name, binding } => self.binding_address(*binding, name, location),

            ExprKind::Unary {
                op: UnOp::Deref,
                operand,
            } => Ok(self.evaluate_pointer(operand)?),

            ExprKind::Index { array, index } => {
                let base = self.evaluate_pointer(array)?;
                let index = self.evaluate_expr(index)?.as_int().unwrap_or(0);
                let stride = self.layouts.size_of(expr.resolved_type()).unwrap_or(1) as i64;
                Ok(base.wrapping_add(index.wrapping_mul(stride) as Address))
            }

            ExprKind::Member { object, offset, .. } => {
                let base = self.address_of(object)?;
                Ok(base + offset.unwrap_or(0) as Address)
            }

            ExprKind::PointerMember { object, offset, .. } => {
                let base = self.evaluate_pointer(object)?;
                if base == NULL {
                    return Err(RuntimeError::memory(MemoryError::Null, location));
                }
                Ok(base.wrapping_add(offset.unwrap_or(0) as Address))
            }

            ExprKind::StringLiteral { bytes, id } => self.literal_address(*id, bytes, location),

            _ => Err(RuntimeError::Unsupported {
                message: "expression does not designate an object".to_string(),
                location,
            }),
        }
    }

    /// Evaluate a pointer-valued (or array) expression to an address
    fn evaluate_pointer(&mut self, expr: &Expr) -> Result<Address, RuntimeError> {
        let value = self.evaluate_expr(expr)?;
        value.as_address().ok_or_else(|| RuntimeError::Unsupported {
            message: format!("'{}' value used as a pointer", expr.resolved_type()),
            location: expr.location,
        })
    }
}
