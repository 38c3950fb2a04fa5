//! Statement resolution
//!
//! Blocks open a scope, local declarations get frame slots (or static-segment
//! slots for `static` locals), conditions are checked to be scalar and
//! `break`/`continue` are checked to sit inside something they can leave.

use super::errors::ResolveError;
use super::scope::Symbol;
use super::types::promote;
use super::Resolver;
use crate::parser::ast::*;
use rustc_hash::FxHashSet;

impl Resolver {
    pub(crate) fn resolve_statements(&mut self, statements: &mut [Stmt]) -> Result<(), ResolveError> {
        for stmt in statements {
            self.resolve_statement(stmt)?;
        }
        Ok(())
    }

    fn resolve_scoped(&mut self, statements: &mut [Stmt]) -> Result<(), ResolveError> {
        self.scopes.push();
        let result = self.resolve_statements(statements);
        self.scopes.pop();
        result
    }

    pub(crate) fn resolve_statement(&mut self, stmt: &mut Stmt) -> Result<(), ResolveError> {
        match stmt {
            Stmt::Declaration(decls) => {
                for decl in decls {
                    self.resolve_local(decl)?;
                }
                Ok(())
            }
            Stmt::Expr(expr) => self.resolve_expr(expr),
            Stmt::Block { statements, .. } => self.resolve_scoped(statements),
            Stmt::If {
                condition,
                then_branch,
                else_branch,
                ..
            } => {
                self.resolve_condition(condition)?;
                self.resolve_substatement(then_branch)?;
                if let Some(else_branch) = else_branch {
                    self.resolve_substatement(else_branch)?;
                }
                Ok(())
            }
            Stmt::While { condition, body, .. } | Stmt::DoWhile { body, condition, .. } => {
                self.resolve_condition(condition)?;
                self.loop_depth += 1;
                let result = self.resolve_substatement(body);
                self.loop_depth -= 1;
                result
            }
            Stmt::For {
                init,
                condition,
                increment,
                body,
                ..
            } => {
                // The init clause gets a scope of its own around the loop
                self.scopes.push();
                let result = self.resolve_for(init, condition, increment, body);
                self.scopes.pop();
                result
            }
            Stmt::Switch {
                expr,
                cases,
                location,
            } => self.resolve_switch(expr, cases, *location),
            Stmt::Break { location } => {
                if self.loop_depth == 0 && self.switch_depth == 0 {
                    return Err(ResolveError::MisplacedJump {
                        keyword: "break",
                        context: "a loop or switch",
                        location: *location,
                    });
                }
                Ok(())
            }
            Stmt::Continue { location } => {
                if self.loop_depth == 0 {
                    return Err(ResolveError::MisplacedJump {
                        keyword: "continue",
                        context: "a loop",
                        location: *location,
                    });
                }
                Ok(())
            }
            Stmt::Return { expr, location } => {
                let return_type = self.return_type.clone();
                match expr {
                    Some(expr) if return_type.is_void() => {
                        self.resolve_expr(expr)?;
                        if !expr.resolved_type().is_void() {
                            return Err(ResolveError::mismatch(
                                format!("void function '{}' returns a value", self.current_function),
                                *location,
                            ));
                        }
                        Ok(())
                    }
                    Some(expr) => {
                        self.resolve_expr(expr)?;
                        self.coerce(expr, &return_type, "return")
                    }
                    None => Ok(()),
                }
            }
            Stmt::Empty { .. } => Ok(()),
        }
    }

    /// A branch or loop body; a lone declaration still gets its own scope
    fn resolve_substatement(&mut self, stmt: &mut Stmt) -> Result<(), ResolveError> {
        if let Stmt::Declaration(_) = stmt {
            self.scopes.push();
            let result = self.resolve_statement(stmt);
            self.scopes.pop();
            return result;
        }
        self.resolve_statement(stmt)
    }

    fn resolve_for(
        &mut self,
        init: &mut Option<Box<Stmt>>,
        condition: &mut Option<Expr>,
        increment: &mut Option<Expr>,
        body: &mut Stmt,
    ) -> Result<(), ResolveError> {
        if let Some(init) = init {
            self.resolve_statement(init)?;
        }
        if let Some(condition) = condition {
            self.resolve_condition(condition)?;
        }
        if let Some(increment) = increment {
            self.resolve_expr(increment)?;
        }
        self.loop_depth += 1;
        let result = self.resolve_substatement(body);
        self.loop_depth -= 1;
        result
    }

    fn resolve_switch(
        &mut self,
        expr: &mut Expr,
        cases: &mut [CaseNode],
        location: SourceLocation,
    ) -> Result<(), ResolveError> {
        self.resolve_expr(expr)?;
        let controlling = expr.resolved_type().clone();
        if !controlling.is_integer() {
            return Err(ResolveError::mismatch(
                format!("switch on non-integer type '{}'", controlling),
                location,
            ));
        }
        self.coerce(expr, &promote(&controlling), "switch")?;

        self.switch_depth += 1;
        self.scopes.push();
        let result = self.resolve_cases(cases);
        self.scopes.pop();
        self.switch_depth -= 1;
        result
    }

    fn resolve_cases(&mut self, cases: &mut [CaseNode]) -> Result<(), ResolveError> {
        let mut seen = FxHashSet::default();
        let mut has_default = false;
        for case in cases {
            match case {
                CaseNode::Case {
                    value,
                    statements,
                    location,
                } => {
                    if let ExprKind::IntLiteral(n) = value.kind {
                        if !seen.insert(n) {
                            return Err(ResolveError::DuplicateCase {
                                value: n,
                                location: *location,
                            });
                        }
                    }
                    self.resolve_statements(statements)?;
                }
                CaseNode::Default {
                    statements,
                    location,
                } => {
                    if has_default {
                        return Err(ResolveError::MisplacedJump {
                            keyword: "default",
                            context: "a switch without another default",
                            location: *location,
                        });
                    }
                    has_default = true;
                    self.resolve_statements(statements)?;
                }
            }
        }
        Ok(())
    }

    /// Controlling expressions must be scalar
    pub(crate) fn resolve_condition(&mut self, condition: &mut Expr) -> Result<(), ResolveError> {
        self.resolve_expr(condition)?;
        let ty = condition.resolved_type();
        if !ty.decay().is_scalar() {
            return Err(ResolveError::mismatch(
                format!("'{}' used where a scalar is required", ty),
                condition.location,
            ));
        }
        Ok(())
    }

    fn resolve_local(&mut self, decl: &mut Declaration) -> Result<(), ResolveError> {
        match decl.storage {
            StorageClass::Extern => {
                let binding = match self.scopes.lookup_global(&decl.name) {
                    Some(symbol) => symbol.binding,
                    None => {
                        let index = self.new_global(decl)?;
                        let symbol = self.symbol_for(decl, Binding::Global(index));
                        self.scopes.declare_global(&decl.name, symbol);
                        Binding::Global(index)
                    }
                };
                decl.binding = Some(binding);
                let symbol = self.symbol_for(decl, binding);
                self.scopes.declare(&decl.name, symbol)
            }
            StorageClass::Static => {
                if let Some(init) = &mut decl.init {
                    decl.ty = self.resolve_initializer(init, &decl.ty)?;
                }
                let index = self.new_global(decl)?;
                decl.binding = Some(Binding::Global(index));
                let symbol = self.symbol_for(decl, Binding::Global(index));
                self.scopes.declare(&decl.name, symbol)
            }
            StorageClass::Auto => {
                if let Some(init) = &mut decl.init {
                    decl.ty = self.resolve_initializer(init, &decl.ty)?;
                }
                self.require_complete(&decl.ty, decl.location)?;
                let slot = self.next_slot;
                self.next_slot += 1;
                decl.binding = Some(Binding::Local(slot));
                let symbol = self.symbol_for(decl, Binding::Local(slot));
                self.scopes.declare(&decl.name, symbol)
            }
        }
    }

    fn symbol_for(&self, decl: &Declaration, binding: Binding) -> Symbol {
        Symbol {
            ty: decl.ty.clone(),
            binding,
            storage: decl.storage,
            is_const: decl.is_const,
            location: decl.location,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::resolve_source;
    use super::*;

    #[test]
    fn test_locals_get_distinct_slots() {
        let resolved = resolve_source(
            "int main() { int a = 1; { int a = 2; int b; } for (int i = 0; i < 3; i++) ; return a; }",
        )
        .unwrap();
        let main = resolved.program.function("main").unwrap();
        assert_eq!(main.frame_size, 4);
    }

    #[test]
    fn test_break_outside_loop() {
        let err = resolve_source("int main() { break; }").unwrap_err();
        assert!(matches!(err, ResolveError::MisplacedJump { keyword: "break", .. }));
        let err = resolve_source("int main() { switch (1) { case 1: continue; } }").unwrap_err();
        assert!(matches!(err, ResolveError::MisplacedJump { keyword: "continue", .. }));
    }

    #[test]
    fn test_duplicate_case() {
        let err = resolve_source("int main() { switch (1) { case 1: break; case 1: break; } }")
            .unwrap_err();
        assert!(matches!(err, ResolveError::DuplicateCase { value: 1, .. }));
    }

    #[test]
    fn test_redeclaration_in_same_scope() {
        let err = resolve_source("int main() { int x; int x; return 0; }").unwrap_err();
        assert!(matches!(err, ResolveError::Redeclaration { .. }));
        assert!(resolve_source("int main() { int x; { int x; } return 0; }").is_ok());
    }

    #[test]
    fn test_void_function_returning_value() {
        let err = resolve_source("void f() { return 1; } int main() { f(); return 0; }").unwrap_err();
        assert!(matches!(err, ResolveError::TypeMismatch { .. }));
    }
}
