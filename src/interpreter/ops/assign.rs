//! Simple and compound assignment
//!
//! The resolver has already converted a simple assignment's right operand
//! to the target type. For `a op= b` it converted `b` to the type the
//! operation is carried out in, so the stored value is read, converted to
//! that type, combined, and converted back to the target type.

use crate::interpreter::engine::Interpreter;
use crate::interpreter::errors::RuntimeError;
use crate::memory::value::{convert, Value};
use crate::parser::ast::{BinOp, Expr, SourceLocation};
use crate::resolver::types::promote;

impl Interpreter {
    pub(crate) fn evaluate_assign(&mut self, lhs: &Expr, rhs: &Expr, location: SourceLocation) -> Result<Value, RuntimeError> {
        let address = self.address_of(lhs)?;
        let value = self.evaluate_expr(rhs)?;
        self.store(address, lhs.resolved_type(), &value, location)?;
        Ok(value)
    }

    pub(crate) fn evaluate_compound_assign(
        &mut self,
        op: BinOp,
        lhs: &Expr,
        rhs: &Expr,
        location: SourceLocation,
    ) -> Result<Value, RuntimeError> {
        let target = lhs.resolved_type();
        let address = self.address_of(lhs)?;
        let current = self.load(address, target, location)?;
        let operand = self.evaluate_expr(rhs)?;
        let operand_ty = rhs.resolved_type();

        let result = if target.is_pointer() {
            self.binary_values(op, &current, &operand, target, operand_ty, target, location)?
        } else {
            let work = match op {
                BinOp::Shl | BinOp::Shr => promote(target),
                _ => operand_ty.clone(),
            };
            let widened = convert(&current, target, &work);
            let combined = self.binary_values(op, &widened, &operand, &work, operand_ty, &work, location)?;
            convert(&combined, &work, target)
        };

        self.store(address, target, &result, location)?;
        Ok(result)
    }
}
