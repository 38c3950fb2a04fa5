//! Lexical scopes
//!
//! A stack of symbol maps: file scope at the bottom, then the function's
//! parameter scope, then one map per nested block. Lookup walks from the
//! innermost scope outwards so the nearest declaration wins.

use super::errors::ResolveError;
use crate::parser::ast::{Binding, SourceLocation, StorageClass, Type};
use rustc_hash::FxHashMap;

/// What a name refers to
#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub ty: Type,
    pub binding: Binding,
    pub storage: StorageClass,
    pub is_const: bool,
    pub location: SourceLocation,
}

#[derive(Debug, Default)]
pub struct ScopeStack {
    scopes: Vec<FxHashMap<String, Symbol>>,
}

impl ScopeStack {
    /// A stack holding only the (empty) file scope
    pub fn new() -> Self {
        ScopeStack {
            scopes: vec![FxHashMap::default()],
        }
    }

    pub fn push(&mut self) {
        self.scopes.push(FxHashMap::default());
    }

    pub fn pop(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_file_scope(&self) -> bool {
        self.scopes.len() == 1
    }

    /// Declare `name` in the innermost scope. Declaring a name twice in one
    /// scope is an error.
    pub fn declare(&mut self, name: &str, symbol: Symbol) -> Result<(), ResolveError> {
        let innermost = self.scopes.len() - 1;
        let scope = &mut self.scopes[innermost];
        if scope.contains_key(name) {
            return Err(ResolveError::Redeclaration {
                name: name.to_string(),
                location: symbol.location,
            });
        }
        scope.insert(name.to_string(), symbol);
        Ok(())
    }

    /// Declare or replace `name` at file scope (tentative definitions, `extern`)
    pub fn declare_global(&mut self, name: &str, symbol: Symbol) {
        self.scopes[0].insert(name.to_string(), symbol);
    }

    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    pub fn lookup_global(&self, name: &str) -> Option<&Symbol> {
        self.scopes[0].get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local(slot: usize, ty: Type) -> Symbol {
        Symbol {
            ty,
            binding: Binding::Local(slot),
            storage: StorageClass::Auto,
            is_const: false,
            location: SourceLocation::default(),
        }
    }

    #[test]
    fn test_nearest_declaration_wins() {
        let mut scopes = ScopeStack::new();
        scopes.declare("x", local(0, Type::Int)).unwrap();
        scopes.push();
        scopes.declare("x", local(1, Type::Char)).unwrap();
        assert_eq!(scopes.lookup("x").unwrap().binding, Binding::Local(1));
        scopes.pop();
        assert_eq!(scopes.lookup("x").unwrap().binding, Binding::Local(0));
    }

    #[test]
    fn test_duplicate_in_same_scope() {
        let mut scopes = ScopeStack::new();
        scopes.push();
        scopes.declare("n", local(0, Type::Int)).unwrap();
        assert!(matches!(
            scopes.declare("n", local(1, Type::Int)),
            Err(ResolveError::Redeclaration { .. })
        ));
    }

    #[test]
    fn test_file_scope_is_never_popped() {
        let mut scopes = ScopeStack::new();
        scopes.pop();
        assert!(scopes.is_file_scope());
        assert_eq!(scopes.depth(), 1);
    }
}
