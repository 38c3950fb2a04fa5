use crate::interpreter::engine::Interpreter;
use crate::interpreter::errors::RuntimeError;
use crate::memory::value::{wrap_integer, Address, Value};
use crate::parser::ast::{Expr, SourceLocation, Type, UnOp};

impl Interpreter {
    pub(crate) fn evaluate_unary(
        &mut self,
        op: UnOp,
        operand: &Expr,
        ty: &Type,
        location: SourceLocation,
    ) -> Result<Value, RuntimeError> {
        match op {
            UnOp::Neg => {
                let value = self.evaluate_expr(operand)?;
                if ty.is_floating() {
                    return Ok(Value::Float(-value.as_f64().unwrap_or(0.0)));
                }
                self.checked_integer(-value.to_i128(ty), ty, "-", location)
            }
            UnOp::Plus => self.evaluate_expr(operand),
            UnOp::BitNot => {
                let value = self.evaluate_expr(operand)?;
                Ok(Value::Int(wrap_integer(!value.to_i128(ty), ty)))
            }
            UnOp::Not => Ok(Value::from_bool(!self.evaluate_expr(operand)?.is_truthy())),

            UnOp::Deref => {
                let address = self.address_of_deref(operand)?;
                self.load(address, ty, location)
            }
            UnOp::AddrOf => Ok(Value::Pointer(self.address_of(operand)?)),

            UnOp::PreInc | UnOp::PreDec | UnOp::PostInc | UnOp::PostDec => {
                let address = self.address_of(operand)?;
                let target = operand.resolved_type();
                let old = self.load(address, target, location)?;
                let delta = if matches!(op, UnOp::PreInc | UnOp::PostInc) { 1 } else { -1 };
                let new = self.step(&old, target, delta, location)?;
                self.store(address, target, &new, location)?;
                Ok(if matches!(op, UnOp::PreInc | UnOp::PreDec) { new } else { old })
            }
        }
    }

    fn address_of_deref(&mut self, operand: &Expr) -> Result<Address, RuntimeError> {
        let value = self.evaluate_expr(operand)?;
        value.as_address().ok_or_else(|| RuntimeError::Unsupported {
            message: format!("dereference of a '{}' value", operand.resolved_type()),
            location: operand.location,
        })
    }

    /// `value + delta` for `++`/`--`, scaled by the element size for pointers
    fn step(&self, value: &Value, ty: &Type, delta: i64, location: SourceLocation) -> Result<Value, RuntimeError> {
        match ty {
            Type::Pointer(_) => {
                let stride = self.layouts.stride(ty) as i64;
                let address = value.as_address().unwrap_or(0);
                Ok(Value::Pointer(address.wrapping_add(delta.wrapping_mul(stride) as Address)))
            }
            Type::Float => Ok(Value::Float((value.as_f64().unwrap_or(0.0) + delta as f64) as f32 as f64)),
            Type::Double => Ok(Value::Float(value.as_f64().unwrap_or(0.0) + delta as f64)),
            // Narrow types are promoted first, so only int and wider can overflow
            _ if ty.integer_width().unwrap_or(0) < 4 => {
                Ok(Value::Int(wrap_integer(value.to_i128(ty) + delta as i128, ty)))
            }
            _ => {
                let symbol = if delta > 0 { "++" } else { "--" };
                self.checked_integer(value.to_i128(ty) + delta as i128, ty, symbol, location)
            }
        }
    }
}
