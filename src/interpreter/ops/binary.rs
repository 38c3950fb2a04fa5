use crate::config::OverflowPolicy;
use crate::interpreter::engine::Interpreter;
use crate::interpreter::errors::RuntimeError;
use crate::memory::value::{fits_integer, wrap_integer, Address, Value};
use crate::parser::ast::{BinOp, Expr, SourceLocation, Type};

impl Interpreter {
    pub(crate) fn evaluate_binary(
        &mut self,
        op: BinOp,
        left: &Expr,
        right: &Expr,
        ty: &Type,
        location: SourceLocation,
    ) -> Result<Value, RuntimeError> {
        match op {
            BinOp::And => {
                if !self.evaluate_expr(left)?.is_truthy() {
                    return Ok(Value::Int(0));
                }
                Ok(Value::from_bool(self.evaluate_expr(right)?.is_truthy()))
            }
            BinOp::Or => {
                if self.evaluate_expr(left)?.is_truthy() {
                    return Ok(Value::Int(1));
                }
                Ok(Value::from_bool(self.evaluate_expr(right)?.is_truthy()))
            }
            _ => {
                let l = self.evaluate_expr(left)?;
                let r = self.evaluate_expr(right)?;
                self.binary_values(op, &l, &r, left.resolved_type(), right.resolved_type(), ty, location)
            }
        }
    }

    /// Apply a non-logical operator to evaluated operands.
    ///
    /// Operands arrive already converted to the operator's common type,
    /// except for pointer arithmetic and shifts whose sides keep their own
    /// types. `ty` is the result type.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn binary_values(
        &self,
        op: BinOp,
        l: &Value,
        r: &Value,
        lt: &Type,
        rt: &Type,
        ty: &Type,
        location: SourceLocation,
    ) -> Result<Value, RuntimeError> {
        let (lt, rt) = (lt.decay(), rt.decay());

        if op.is_comparison() {
            return Ok(Value::from_bool(compare(op, l, r, &lt)));
        }

        match (op, lt.is_pointer(), rt.is_pointer()) {
            (BinOp::Add | BinOp::Sub, true, false) => {
                let stride = self.layouts.stride(&lt) as i64;
                let offset = r.as_int().unwrap_or(0).wrapping_mul(stride) as Address;
                let base = l.as_address().unwrap_or(0);
                return Ok(Value::Pointer(match op {
                    BinOp::Add => base.wrapping_add(offset),
                    _ => base.wrapping_sub(offset),
                }));
            }
            (BinOp::Add, false, true) => {
                let stride = self.layouts.stride(&rt) as i64;
                let offset = l.as_int().unwrap_or(0).wrapping_mul(stride) as Address;
                return Ok(Value::Pointer(r.as_address().unwrap_or(0).wrapping_add(offset)));
            }
            (BinOp::Sub, true, true) => {
                let stride = self.layouts.stride(&lt).max(1) as i64;
                let diff = l.as_address().unwrap_or(0).wrapping_sub(r.as_address().unwrap_or(0)) as i64;
                return Ok(Value::Int(diff / stride));
            }
            _ => {}
        }

        if ty.is_floating() {
            let (a, b) = (l.as_f64().unwrap_or(0.0), r.as_f64().unwrap_or(0.0));
            let result = match op {
                BinOp::Add => a + b,
                BinOp::Sub => a - b,
                BinOp::Mul => a * b,
                BinOp::Div => a / b,
                _ => {
                    return Err(RuntimeError::Unsupported {
                        message: format!("operator '{}' on '{}'", op.symbol(), ty),
                        location,
                    })
                }
            };
            return Ok(Value::Float(match ty {
                Type::Float => result as f32 as f64,
                _ => result,
            }));
        }

        self.integer_op(op, l.to_i128(ty), r.to_i128(&rt), ty, location)
    }

    /// Integer arithmetic on mathematical values, wrapped (or trapped) to `ty`
    pub(crate) fn integer_op(
        &self,
        op: BinOp,
        a: i128,
        b: i128,
        ty: &Type,
        location: SourceLocation,
    ) -> Result<Value, RuntimeError> {
        let bits = ty.integer_width().unwrap_or(4) as u32 * 8;
        let raw = match op {
            BinOp::Add => a.wrapping_add(b),
            BinOp::Sub => a.wrapping_sub(b),
            BinOp::Mul => a.wrapping_mul(b),
            BinOp::Div | BinOp::Mod => {
                if b == 0 {
                    return Err(RuntimeError::DivisionByZero {
                        operation: if op == BinOp::Div { "division" } else { "modulo" },
                        location,
                    });
                }
                if op == BinOp::Div {
                    a / b
                } else {
                    a % b
                }
            }
            BinOp::BitAnd => a & b,
            BinOp::BitOr => a | b,
            BinOp::BitXor => a ^ b,
            // Shift counts are taken modulo the width of the promoted left operand
            BinOp::Shl => a.wrapping_shl(b as u32 & (bits - 1)),
            BinOp::Shr => a.wrapping_shr(b as u32 & (bits - 1)),
            _ => {
                return Err(RuntimeError::Unsupported {
                    message: format!("operator '{}' on '{}'", op.symbol(), ty),
                    location,
                })
            }
        };
        match op {
            BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div => self.checked_integer(raw, ty, op.symbol(), location),
            _ => Ok(Value::Int(wrap_integer(raw, ty))),
        }
    }

    /// Wrap `raw` to `ty`, or fail under the trapping overflow policy
    pub(crate) fn checked_integer(
        &self,
        raw: i128,
        ty: &Type,
        operation: &str,
        location: SourceLocation,
    ) -> Result<Value, RuntimeError> {
        if self.config.overflow == OverflowPolicy::Trap && ty.is_signed() && !fits_integer(raw, ty) {
            return Err(RuntimeError::IntegerOverflow {
                operation: operation.to_string(),
                ty: ty.to_string(),
                location,
            });
        }
        Ok(Value::Int(wrap_integer(raw, ty)))
    }
}

fn compare(op: BinOp, l: &Value, r: &Value, ty: &Type) -> bool {
    let ordering = if ty.is_floating() {
        l.as_f64().unwrap_or(0.0).partial_cmp(&r.as_f64().unwrap_or(0.0))
    } else if ty.is_pointer() {
        Some(l.as_address().unwrap_or(0).cmp(&r.as_address().unwrap_or(0)))
    } else {
        Some(l.to_i128(ty).cmp(&r.to_i128(ty)))
    };
    // NaN compares unequal to everything
    let Some(ordering) = ordering else {
        return op == BinOp::Ne;
    };
    match op {
        BinOp::Eq => ordering.is_eq(),
        BinOp::Ne => ordering.is_ne(),
        BinOp::Lt => ordering.is_lt(),
        BinOp::Le => ordering.is_le(),
        BinOp::Gt => ordering.is_gt(),
        BinOp::Ge => ordering.is_ge(),
        _ => false,
    }
}
