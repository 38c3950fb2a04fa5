//! Loop statement execution (`while`, `do-while`, `for`).
//!
//! `break` and `continue` are reported by [`LoopBodyResult`] so the loop
//! drivers never inspect `control_flow` directly. A `return` inside a body
//! yields [`LoopBodyResult::Exit`]: the loop unwinds at once and leaves the
//! pending return for the enclosing call.

use crate::interpreter::engine::{ControlFlow, Interpreter};
use crate::interpreter::errors::RuntimeError;
use crate::parser::ast::{Expr, Stmt};

/// How one execution of a loop body ended
pub(crate) enum LoopBodyResult {
    /// Ran to completion or hit `continue`
    Continue,
    /// Hit `break`
    Break,
    /// Hit `return`; `self.control_flow` still holds it
    Exit,
}

impl Interpreter {
    pub(crate) fn execute_loop_body(&mut self, body: &Stmt) -> Result<LoopBodyResult, RuntimeError> {
        self.execute_substatement(body)?;
        match self.control_flow {
            ControlFlow::Normal => Ok(LoopBodyResult::Continue),
            ControlFlow::Continue => {
                self.control_flow = ControlFlow::Normal;
                Ok(LoopBodyResult::Continue)
            }
            ControlFlow::Break => {
                self.control_flow = ControlFlow::Normal;
                Ok(LoopBodyResult::Break)
            }
            ControlFlow::Return(_) => Ok(LoopBodyResult::Exit),
        }
    }

    fn condition_holds(&mut self, condition: &Expr) -> Result<bool, RuntimeError> {
        Ok(self.evaluate_expr(condition)?.is_truthy())
    }

    pub(crate) fn execute_while(&mut self, condition: &Expr, body: &Stmt) -> Result<(), RuntimeError> {
        while self.condition_holds(condition)? {
            match self.execute_loop_body(body)? {
                LoopBodyResult::Exit | LoopBodyResult::Break => break,
                LoopBodyResult::Continue => {}
            }
        }
        Ok(())
    }

    /// The body always runs once; `continue` jumps to the condition.
    pub(crate) fn execute_do_while(&mut self, body: &Stmt, condition: &Expr) -> Result<(), RuntimeError> {
        loop {
            match self.execute_loop_body(body)? {
                LoopBodyResult::Exit | LoopBodyResult::Break => break,
                LoopBodyResult::Continue => {}
            }
            if !self.condition_holds(condition)? {
                break;
            }
        }
        Ok(())
    }

    /// `init`, `condition` and `increment` are all optional; a missing
    /// condition is always true. The init declaration gets a scope of its
    /// own that outlives every iteration.
    pub(crate) fn execute_for(
        &mut self,
        init: Option<&Stmt>,
        condition: Option<&Expr>,
        increment: Option<&Expr>,
        body: &Stmt,
    ) -> Result<(), RuntimeError> {
        self.enter_scope();

        if let Some(init) = init {
            self.execute_statement(init)?;
        }

        loop {
            if let Some(condition) = condition {
                if !self.condition_holds(condition)? {
                    break;
                }
            }

            match self.execute_loop_body(body)? {
                LoopBodyResult::Exit | LoopBodyResult::Break => break,
                LoopBodyResult::Continue => {}
            }

            if let Some(increment) = increment {
                self.evaluate_expr(increment)?;
            }
        }

        self.exit_scope()
    }
}
