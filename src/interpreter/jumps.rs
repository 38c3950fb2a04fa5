use crate::interpreter::engine::{ControlFlow, Interpreter};
use crate::interpreter::errors::RuntimeError;
use crate::memory::value::Value;
use crate::parser::ast::{CaseNode, Expr};

impl Interpreter {
    pub(crate) fn execute_return(&mut self, expr: Option<&Expr>) -> Result<(), RuntimeError> {
        let value = match expr {
            Some(expr) => self.evaluate_expr(expr)?,
            None => Value::Void,
        };
        self.control_flow = ControlFlow::Return(value);
        Ok(())
    }

    /// Jump to the matching label (or `default`) and fall through the
    /// remaining cases until `break`. `continue` and `return` propagate.
    pub(crate) fn execute_switch(&mut self, expr: &Expr, cases: &[CaseNode]) -> Result<(), RuntimeError> {
        let selector = self.evaluate_expr(expr)?.as_int().unwrap_or(0);

        let mut match_index: Option<usize> = None;
        let mut default_index: Option<usize> = None;

        for (i, case) in cases.iter().enumerate() {
            match case {
                CaseNode::Case { value, .. } => {
                    if self.evaluate_expr(value)?.as_int() == Some(selector) {
                        match_index = Some(i);
                        break;
                    }
                }
                CaseNode::Default { .. } => default_index = Some(i),
            }
        }

        let Some(start) = match_index.or(default_index) else {
            return Ok(());
        };

        self.enter_scope();
        for case in &cases[start..] {
            self.execute_statements(case.statements())?;
            match self.control_flow {
                ControlFlow::Normal => {}
                ControlFlow::Break => {
                    self.control_flow = ControlFlow::Normal;
                    break;
                }
                ControlFlow::Continue | ControlFlow::Return(_) => break,
            }
        }
        self.exit_scope()
    }
}
