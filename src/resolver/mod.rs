//! Type and symbol resolution
//!
//! The resolver walks the parsed [`Program`] once, in place, and fills in
//! everything the interpreter needs to run it without further analysis:
//!
//! - a storage [`Binding`] for every declaration and identifier (a slot in the
//!   enclosing function's frame, or a slot in the static segment)
//! - the type of every expression, with each implicit conversion made into an
//!   explicit `Cast` node
//! - member offsets and `sizeof` values, from the struct [`Layouts`]
//! - the length of arrays sized by their initializer, and brace-elided
//!   initializer lists rewritten into fully braced form
//!
//! It also rejects programs that parse but have no meaning (see
//! [`ResolveError`]). Resolution is split across submodules the way parsing
//! is: declarations here, then [`statements`] and [`expressions`].

mod errors;
mod expressions;
pub mod layout;
pub mod scope;
mod statements;
pub mod types;

pub use errors::ResolveError;
pub use layout::Layouts;

use crate::interpreter::builtins::Builtin;
use crate::parser::ast::*;
use rustc_hash::FxHashMap;
use scope::{ScopeStack, Symbol};
use std::collections::VecDeque;

/// One object in the static segment: a global or a `static` local
#[derive(Debug, Clone)]
pub struct GlobalSlot {
    pub name: String,
    pub ty: Type,
    /// Resolved initializer; the object is zero-filled first either way
    pub init: Option<Initializer>,
    pub location: SourceLocation,
}

/// A program ready to run
#[derive(Debug, Clone)]
pub struct ResolvedProgram {
    pub program: Program,
    pub layouts: Layouts,
    pub globals: Vec<GlobalSlot>,
}

#[derive(Debug, Clone)]
pub(crate) struct FunctionSig {
    pub(crate) return_type: Type,
    pub(crate) params: Vec<Type>,
    pub(crate) defined: bool,
}

/// Resolve `program`; see the module documentation.
pub fn resolve(program: Program) -> Result<ResolvedProgram, ResolveError> {
    Resolver::new().resolve(program)
}

pub struct Resolver {
    pub(crate) scopes: ScopeStack,
    pub(crate) layouts: Layouts,
    pub(crate) functions: FxHashMap<String, FunctionSig>,
    pub(crate) globals: Vec<GlobalSlot>,
    /// Next free frame slot in the function being resolved
    pub(crate) next_slot: usize,
    pub(crate) current_function: String,
    pub(crate) return_type: Type,
    pub(crate) loop_depth: usize,
    pub(crate) switch_depth: usize,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Resolver {
    pub fn new() -> Self {
        Resolver {
            scopes: ScopeStack::new(),
            layouts: Layouts::new(),
            functions: FxHashMap::default(),
            globals: Vec::new(),
            next_slot: 0,
            current_function: String::new(),
            return_type: Type::Int,
            loop_depth: 0,
            switch_depth: 0,
        }
    }

    pub fn resolve(mut self, mut program: Program) -> Result<ResolvedProgram, ResolveError> {
        for def in &program.structs {
            self.layouts.define(def)?;
        }
        self.collect_functions(&program)?;

        for item in &mut program.items {
            match item {
                Item::Globals(decls) => {
                    for decl in decls {
                        self.resolve_global(decl)?;
                    }
                }
                Item::Function(def) => self.resolve_function(def)?,
                Item::Prototype(_) => {}
            }
        }

        log::debug!(
            "resolved {} function(s), {} static object(s), {} struct layout(s)",
            self.functions.values().filter(|f| f.defined).count(),
            self.globals.len(),
            program.structs.len()
        );
        Ok(ResolvedProgram {
            program,
            layouts: self.layouts,
            globals: self.globals,
        })
    }

    /// Record every function signature up front so calls may precede definitions
    fn collect_functions(&mut self, program: &Program) -> Result<(), ResolveError> {
        for item in &program.items {
            match item {
                Item::Function(def) => {
                    if self.functions.get(&def.name).is_some_and(|f| f.defined) {
                        return Err(ResolveError::Redeclaration {
                            name: def.name.clone(),
                            location: def.location,
                        });
                    }
                    self.functions.insert(
                        def.name.clone(),
                        FunctionSig {
                            return_type: def.return_type.clone(),
                            params: def.params.iter().map(|p| p.ty.clone()).collect(),
                            defined: true,
                        },
                    );
                }
                Item::Prototype(decl) => {
                    self.functions
                        .entry(decl.name.clone())
                        .or_insert_with(|| FunctionSig {
                            return_type: decl.return_type.clone(),
                            params: decl.params.iter().map(|p| p.ty.clone()).collect(),
                            defined: false,
                        });
                }
                Item::Globals(_) => {}
            }
        }

        if !self.functions.get("main").is_some_and(|f| f.defined) {
            return Err(ResolveError::MissingMain);
        }
        Ok(())
    }

    /// The call target for `name`: user definitions shadow built-ins
    pub(crate) fn call_target(&self, name: &str) -> Option<CallTarget> {
        match self.functions.get(name) {
            Some(sig) if sig.defined => Some(CallTarget::User),
            _ => Builtin::from_name(name).map(CallTarget::Builtin),
        }
    }

    fn resolve_function(&mut self, def: &mut FunctionDef) -> Result<(), ResolveError> {
        log::trace!("resolving function {}", def.name);
        self.next_slot = 0;
        self.current_function = def.name.clone();
        self.return_type = def.return_type.clone();
        self.scopes.push();

        for param in &mut def.params {
            let slot = self.next_slot;
            self.next_slot += 1;
            param.slot = Some(slot);
            self.require_complete(&param.ty, param.location)?;
            if let Some(name) = &param.name {
                self.scopes.declare(
                    name,
                    Symbol {
                        ty: param.ty.clone(),
                        binding: Binding::Local(slot),
                        storage: StorageClass::Auto,
                        is_const: false,
                        location: param.location,
                    },
                )?;
            }
        }

        // Parameters and the outermost block share one scope
        let result = self.resolve_statements(&mut def.body);
        self.scopes.pop();
        result?;

        def.frame_size = self.next_slot;
        Ok(())
    }

    fn resolve_global(&mut self, decl: &mut Declaration) -> Result<(), ResolveError> {
        if self.functions.contains_key(&decl.name) {
            return Err(ResolveError::Redeclaration {
                name: decl.name.clone(),
                location: decl.location,
            });
        }
        if let Some(init) = &mut decl.init {
            decl.ty = self.resolve_initializer(init, &decl.ty)?;
        }

        let existing = self.scopes.lookup_global(&decl.name).cloned();
        let index = match existing {
            Some(symbol) => {
                let Binding::Global(index) = symbol.binding else {
                    return Err(ResolveError::Redeclaration {
                        name: decl.name.clone(),
                        location: decl.location,
                    });
                };
                let slot = &mut self.globals[index];
                let same_type = slot.ty == decl.ty
                    || matches!((&slot.ty, &decl.ty), (Type::Array(a, _), Type::Array(b, _)) if a == b);
                if !same_type || (slot.init.is_some() && decl.init.is_some()) {
                    return Err(ResolveError::Redeclaration {
                        name: decl.name.clone(),
                        location: decl.location,
                    });
                }
                if decl.storage != StorageClass::Extern {
                    if let Type::Array(_, Some(_)) = decl.ty {
                        slot.ty = decl.ty.clone();
                    }
                    if decl.init.is_some() {
                        slot.init = decl.init.clone();
                    }
                }
                index
            }
            None => self.new_global(decl)?,
        };

        decl.binding = Some(Binding::Global(index));
        let ty = self.globals[index].ty.clone();
        self.scopes.declare_global(
            &decl.name,
            Symbol {
                ty,
                binding: Binding::Global(index),
                storage: decl.storage,
                is_const: decl.is_const,
                location: decl.location,
            },
        );
        Ok(())
    }

    /// Allocate a static-segment slot for `decl`
    pub(crate) fn new_global(&mut self, decl: &Declaration) -> Result<usize, ResolveError> {
        if decl.storage != StorageClass::Extern {
            self.require_complete(&decl.ty, decl.location)?;
        }
        let name = if self.scopes.is_file_scope() {
            decl.name.clone()
        } else {
            format!("{}.{}", self.current_function, decl.name)
        };
        self.globals.push(GlobalSlot {
            name,
            ty: decl.ty.clone(),
            init: decl.init.clone(),
            location: decl.location,
        });
        Ok(self.globals.len() - 1)
    }

    pub(crate) fn require_complete(&self, ty: &Type, location: SourceLocation) -> Result<(), ResolveError> {
        match self.layouts.size_of(ty) {
            Some(_) => Ok(()),
            None => Err(ResolveError::IncompleteType {
                ty: ty.clone(),
                location,
            }),
        }
    }

    /// Resolve an initializer for an object of type `ty` and return the
    /// completed type (the length of an unsized array is taken from its
    /// initializer). Brace lists are rewritten into fully braced form with
    /// one entry per initialized element.
    pub(crate) fn resolve_initializer(
        &mut self,
        init: &mut Initializer,
        ty: &Type,
    ) -> Result<Type, ResolveError> {
        match init {
            Initializer::Expr(expr) => {
                if let (Type::Array(elem, len), ExprKind::StringLiteral { bytes, .. }) = (ty, &expr.kind) {
                    if !elem.is_character() {
                        return Err(ResolveError::InvalidInitializer {
                            message: format!("string literal cannot initialize '{}'", ty),
                            location: expr.location,
                        });
                    }
                    let len = match len {
                        Some(n) if bytes.len() > *n => {
                            return Err(ResolveError::InvalidInitializer {
                                message: format!("string of length {} does not fit in '{}'", bytes.len(), ty),
                                location: expr.location,
                            });
                        }
                        Some(n) => *n,
                        None => bytes.len() + 1,
                    };
                    return Ok(Type::Array(elem.clone(), Some(len)));
                }
                if ty.is_array() {
                    return Err(ResolveError::InvalidInitializer {
                        message: format!("'{}' needs a brace-enclosed initializer", ty),
                        location: expr.location,
                    });
                }
                self.resolve_expr(expr)?;
                self.coerce(expr, ty, "initialization")?;
                Ok(ty.clone())
            }
            Initializer::List(items, location) => {
                let location = *location;
                if ty.is_scalar() {
                    if items.len() != 1 {
                        return Err(ResolveError::InvalidInitializer {
                            message: format!("'{}' takes exactly one initializer", ty),
                            location,
                        });
                    }
                    let mut inner = items.remove(0);
                    let ty = self.resolve_initializer(&mut inner, ty)?;
                    *init = inner;
                    return Ok(ty);
                }

                let mut queue: VecDeque<Initializer> = std::mem::take(items).into();
                let (normalized, ty) = self.fill_aggregate(&mut queue, ty, location)?;
                if let Some(extra) = queue.front() {
                    return Err(ResolveError::InvalidInitializer {
                        message: format!("excess elements in initializer for '{}'", ty),
                        location: extra.location(),
                    });
                }
                *items = normalized;
                Ok(ty)
            }
        }
    }

    /// Consume initializers from `queue` for the elements of aggregate `ty`,
    /// descending into sub-aggregates whose braces were elided.
    fn fill_aggregate(
        &mut self,
        queue: &mut VecDeque<Initializer>,
        ty: &Type,
        location: SourceLocation,
    ) -> Result<(Vec<Initializer>, Type), ResolveError> {
        let (elements, complete) = match ty {
            Type::Array(elem, Some(len)) => (Members::Repeated(&**elem, *len), true),
            Type::Array(elem, None) => (Members::Repeated(&**elem, queue.len()), false),
            Type::Struct(name) => {
                let layout = self.layouts.get(name).ok_or_else(|| ResolveError::IncompleteType {
                    ty: ty.clone(),
                    location,
                })?;
                let fields = layout.fields.iter().map(|f| f.ty.clone());
                if layout.is_union {
                    (Members::Fields(fields.take(1).collect()), true)
                } else {
                    (Members::Fields(fields.collect()), true)
                }
            }
            other => {
                return Err(ResolveError::InvalidInitializer {
                    message: format!("brace list cannot initialize '{}'", other),
                    location,
                })
            }
        };

        let mut out = Vec::new();
        for index in 0..elements.len() {
            let element = elements.get(index);
            let Some(front) = queue.front_mut() else {
                break;
            };
            if !(element.is_array() || element.is_struct()) {
                let mut item = queue.pop_front().unwrap_or_else(|| Initializer::List(Vec::new(), location));
                self.resolve_initializer(&mut item, element)?;
                out.push(item);
                continue;
            }

            let takes_whole = match front {
                Initializer::List(..) => true,
                Initializer::Expr(expr) if element.is_array() => {
                    matches!(expr.kind, ExprKind::StringLiteral { .. })
                }
                Initializer::Expr(expr) => {
                    self.resolve_expr(expr)?;
                    expr.ty.as_ref() == Some(element)
                }
            };
            if takes_whole {
                if let Some(mut item) = queue.pop_front() {
                    self.resolve_initializer(&mut item, element)?;
                    out.push(item);
                }
            } else {
                let (inner, _) = self.fill_aggregate(queue, element, location)?;
                out.push(Initializer::List(inner, location));
            }
        }

        let ty = match ty {
            Type::Array(elem, None) if !complete => Type::Array(elem.clone(), Some(out.len())),
            other => other.clone(),
        };
        Ok((out, ty))
    }
}

/// Element types of an aggregate being initialized. Arrays are not expanded
/// so a huge array with a short initializer costs nothing.
enum Members<'a> {
    Repeated(&'a Type, usize),
    Fields(Vec<Type>),
}

impl Members<'_> {
    fn len(&self) -> usize {
        match self {
            Members::Repeated(_, len) => *len,
            Members::Fields(fields) => fields.len(),
        }
    }

    fn get(&self, index: usize) -> &Type {
        match self {
            Members::Repeated(elem, _) => *elem,
            Members::Fields(fields) => &fields[index],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    pub(crate) fn resolve_source(source: &str) -> Result<ResolvedProgram, ResolveError> {
        let program = Parser::new(source)
            .expect("lexes")
            .parse_program()
            .expect("parses");
        resolve(program)
    }

    fn global<'a>(resolved: &'a ResolvedProgram, name: &str) -> &'a GlobalSlot {
        resolved.globals.iter().find(|g| g.name == name).unwrap()
    }

    #[test]
    fn test_missing_main() {
        assert_eq!(resolve_source("int f() { return 1; }").unwrap_err(), ResolveError::MissingMain);
    }

    #[test]
    fn test_unsized_arrays_take_initializer_length() {
        let resolved = resolve_source(
            r#"
            int days[] = {31, 28, 31};
            char msg[] = "hello";
            int grid[][2] = {1, 2, 3, 4, 5};
            int main() { return 0; }
            "#,
        )
        .unwrap();
        assert_eq!(global(&resolved, "days").ty, Type::Int.array_of(Some(3)));
        assert_eq!(global(&resolved, "msg").ty, Type::Char.array_of(Some(6)));
        assert_eq!(global(&resolved, "grid").ty, Type::Int.array_of(Some(2)).array_of(Some(3)));
    }

    #[test]
    fn test_brace_elision_is_normalized() {
        let resolved = resolve_source(
            r#"
            struct point { int x; int y; };
            struct point pts[2] = {1, 2, 3, 4};
            int main() { return 0; }
            "#,
        )
        .unwrap();
        let Some(Initializer::List(items, _)) = &global(&resolved, "pts").init else {
            panic!("expected a list");
        };
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|i| matches!(i, Initializer::List(fields, _) if fields.len() == 2)));
    }

    #[test]
    fn test_short_initializer_for_huge_array() {
        let resolved = resolve_source("char big[100000000000] = {1, 2}; int main() { return 0; }").unwrap();
        let Some(Initializer::List(items, _)) = &global(&resolved, "big").init else {
            panic!("expected a list");
        };
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn test_excess_initializers() {
        let err = resolve_source("int a[2] = {1, 2, 3}; int main() { return 0; }").unwrap_err();
        assert!(matches!(err, ResolveError::InvalidInitializer { .. }));
    }

    #[test]
    fn test_static_locals_live_in_static_segment() {
        let resolved = resolve_source(
            "int counter() { static int n = 0; return ++n; } int main() { return counter(); }",
        )
        .unwrap();
        assert_eq!(global(&resolved, "counter.n").ty, Type::Int);
    }

    #[test]
    fn test_tentative_definitions_merge() {
        let resolved = resolve_source("int x; extern int x; int x = 3; int main() { return x; }").unwrap();
        assert_eq!(resolved.globals.len(), 1);
        assert!(resolved.globals[0].init.is_some());
    }

    #[test]
    fn test_user_definition_shadows_builtin() {
        let resolved = resolve_source(
            "int strlen(char *s) { int n = 0; while (*s++) n++; return n; } int main() { return strlen(\"ab\"); }",
        )
        .unwrap();
        let main = resolved.program.function("main").unwrap();
        let Stmt::Return { expr: Some(expr), .. } = &main.body[0] else {
            panic!("expected return");
        };
        assert!(matches!(expr.kind, ExprKind::Call { target: Some(CallTarget::User), .. }));
    }
}
