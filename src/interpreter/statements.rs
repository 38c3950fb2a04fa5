//! Statement execution implementation
//!
//! All statement execution methods are `pub(crate)` methods on the
//! [`Interpreter`], so they share its memory, stack and console.
//!
//! # Control Flow
//!
//! `break`, `continue` and `return` set [`ControlFlow`]; statement lists stop
//! as soon as it is no longer `Normal` and the enclosing loop, switch or
//! call consumes it.
//!
//! # Declarations
//!
//! A block-scope object gets a fresh stack block when its declaration runs,
//! and is released when the enclosing scope exits. Objects without an
//! initializer stay uninitialized; a brace list zero-fills the whole object
//! before the listed elements are stored.

use crate::interpreter::engine::{ControlFlow, Interpreter};
use crate::interpreter::errors::{AtLocation, RuntimeError};
use crate::memory::value::Address;
use crate::parser::ast::*;

impl Interpreter {
    pub(crate) fn execute_statements(&mut self, statements: &[Stmt]) -> Result<(), RuntimeError> {
        for stmt in statements {
            self.execute_statement(stmt)?;
            if self.control_flow != ControlFlow::Normal {
                break;
            }
        }
        Ok(())
    }

    pub(crate) fn execute_statement(&mut self, stmt: &Stmt) -> Result<(), RuntimeError> {
        self.current_location = stmt.location();

        match stmt {
            Stmt::Declaration(decls) => {
                for decl in decls {
                    self.execute_declaration(decl)?;
                }
                Ok(())
            }
            Stmt::Expr(expr) => {
                self.evaluate_expr(expr)?;
                Ok(())
            }
            Stmt::Block { statements, .. } => {
                self.enter_scope();
                let result = self.execute_statements(statements);
                self.exit_scope()?;
                result
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
                ..
            } => {
                if self.evaluate_expr(condition)?.is_truthy() {
                    self.execute_substatement(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.execute_substatement(else_branch)
                } else {
                    Ok(())
                }
            }
            Stmt::While { condition, body, .. } => self.execute_while(condition, body),
            Stmt::DoWhile { body, condition, .. } => self.execute_do_while(body, condition),
            Stmt::For {
                init,
                condition,
                increment,
                body,
                ..
            } => self.execute_for(init.as_deref(), condition.as_ref(), increment.as_ref(), body),
            Stmt::Switch { expr, cases, .. } => self.execute_switch(expr, cases),
            Stmt::Break { .. } => {
                self.control_flow = ControlFlow::Break;
                Ok(())
            }
            Stmt::Continue { .. } => {
                self.control_flow = ControlFlow::Continue;
                Ok(())
            }
            Stmt::Return { expr, .. } => self.execute_return(expr.as_ref()),
            Stmt::Empty { .. } => Ok(()),
        }
    }

    /// Body of an `if` or loop. A bare declaration there gets its own scope.
    pub(crate) fn execute_substatement(&mut self, stmt: &Stmt) -> Result<(), RuntimeError> {
        if matches!(stmt, Stmt::Declaration(_)) {
            self.enter_scope();
            let result = self.execute_statement(stmt);
            self.exit_scope()?;
            result
        } else {
            self.execute_statement(stmt)
        }
    }

    fn execute_declaration(&mut self, decl: &Declaration) -> Result<(), RuntimeError> {
        match decl.binding {
            Some(Binding::Local(slot)) => {
                let address = self.allocate_local(slot, &decl.ty, &decl.name, decl.location)?;
                if let Some(init) = &decl.init {
                    self.initialize(address, &decl.ty, init)?;
                }
                Ok(())
            }
            // Static storage is set up before main runs
            Some(Binding::Global(_)) => Ok(()),
            None => Err(RuntimeError::UnresolvedSymbol {
                name: decl.name.clone(),
                location: decl.location,
            }),
        }
    }

    /// Store an initializer into the object of type `ty` at `address`
    pub(crate) fn initialize(&mut self, address: Address, ty: &Type, init: &Initializer) -> Result<(), RuntimeError> {
        match init {
            Initializer::Expr(expr) => {
                if let (Type::Array(_, Some(len)), ExprKind::StringLiteral { bytes, .. }) = (ty, &expr.kind) {
                    let mut data = bytes.clone();
                    data.resize(*len, 0);
                    return self.memory.write(address, &data).at(expr.location);
                }
                let value = self.evaluate_expr(expr)?;
                self.store(address, ty, &value, expr.location)
            }
            Initializer::List(items, location) => {
                if ty.is_scalar() {
                    return match items.first() {
                        Some(item) => self.initialize(address, ty, item),
                        None => self.memory.fill(address, 0, self.layouts.size_of(ty).unwrap_or(0)).at(*location),
                    };
                }

                let size = self.layouts.size_of(ty).unwrap_or(0);
                self.memory.fill(address, 0, size).at(*location)?;

                match ty {
                    Type::Array(elem, _) => {
                        let stride = self.layouts.size_of(elem).unwrap_or(0) as Address;
                        for (i, item) in items.iter().enumerate() {
                            self.initialize(address + i as Address * stride, elem, item)?;
                        }
                    }
                    Type::Struct(name) => {
                        let fields: Vec<(usize, Type)> = self
                            .layouts
                            .get(name)
                            .map(|layout| layout.fields.iter().map(|f| (f.offset, f.ty.clone())).collect())
                            .unwrap_or_default();
                        for ((offset, field_ty), item) in fields.iter().zip(items) {
                            self.initialize(address + *offset as Address, field_ty, item)?;
                        }
                    }
                    _ => {}
                }
                Ok(())
            }
        }
    }
}
