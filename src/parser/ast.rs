// AST (Abstract Syntax Tree) definitions for the evaluator
//
// The parser builds these nodes; the resolver then fills in the `Option`
// annotation slots (expression types, storage bindings, member offsets,
// sizes, frame sizes) in place before the interpreter walks the tree.

use crate::interpreter::builtins::Builtin;
use std::fmt;

/// Unique identifier for AST nodes that need stable identity at runtime
/// (string literals are allocated once per node).
pub type NodeId = usize;

/// Source location information for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

impl SourceLocation {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// C types understood by the evaluator.
///
/// Struct and union types are referenced by tag; their layout lives in the
/// resolver's [`Layouts`](crate::resolver::layout::Layouts) registry.
#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Void,
    Char,
    UChar,
    Short,
    UShort,
    Int,
    UInt,
    Long,
    ULong,
    Float,
    Double,
    Pointer(Box<Type>),
    Array(Box<Type>, Option<usize>),
    Struct(String),
}

impl Type {
    pub fn pointer_to(self) -> Type {
        Type::Pointer(Box::new(self))
    }

    pub fn array_of(self, len: Option<usize>) -> Type {
        Type::Array(Box::new(self), len)
    }

    pub fn char_pointer() -> Type {
        Type::Char.pointer_to()
    }

    pub fn void_pointer() -> Type {
        Type::Void.pointer_to()
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Type::Void)
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            Type::Char
                | Type::UChar
                | Type::Short
                | Type::UShort
                | Type::Int
                | Type::UInt
                | Type::Long
                | Type::ULong
        )
    }

    pub fn is_floating(&self) -> bool {
        matches!(self, Type::Float | Type::Double)
    }

    pub fn is_arithmetic(&self) -> bool {
        self.is_integer() || self.is_floating()
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, Type::Pointer(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Type::Array(..))
    }

    /// Pointer or array, i.e. anything that can be indexed or dereferenced.
    pub fn is_pointer_like(&self) -> bool {
        self.is_pointer() || self.is_array()
    }

    pub fn is_scalar(&self) -> bool {
        self.is_arithmetic() || self.is_pointer()
    }

    pub fn is_struct(&self) -> bool {
        matches!(self, Type::Struct(_))
    }

    pub fn is_signed(&self) -> bool {
        matches!(
            self,
            Type::Char | Type::Short | Type::Int | Type::Long | Type::Float | Type::Double
        )
    }

    /// `char` or `unsigned char`
    pub fn is_character(&self) -> bool {
        matches!(self, Type::Char | Type::UChar)
    }

    /// Target of a pointer, or element of an array.
    pub fn pointee(&self) -> Option<&Type> {
        match self {
            Type::Pointer(inner) | Type::Array(inner, _) => Some(inner),
            _ => None,
        }
    }

    /// Array-to-pointer decay; every other type is returned unchanged.
    pub fn decay(&self) -> Type {
        match self {
            Type::Array(elem, _) => Type::Pointer(elem.clone()),
            other => other.clone(),
        }
    }

    /// Width in bytes of an integer type.
    pub fn integer_width(&self) -> Option<usize> {
        match self {
            Type::Char | Type::UChar => Some(1),
            Type::Short | Type::UShort => Some(2),
            Type::Int | Type::UInt => Some(4),
            Type::Long | Type::ULong => Some(8),
            _ => None,
        }
    }

    /// Integer conversion rank (C11 6.3.1.1), used by the usual arithmetic conversions.
    pub fn integer_rank(&self) -> u8 {
        match self {
            Type::Char | Type::UChar => 1,
            Type::Short | Type::UShort => 2,
            Type::Int | Type::UInt => 3,
            Type::Long | Type::ULong => 4,
            _ => 0,
        }
    }

    /// The unsigned counterpart of a signed integer type.
    pub fn to_unsigned(&self) -> Type {
        match self {
            Type::Char => Type::UChar,
            Type::Short => Type::UShort,
            Type::Int => Type::UInt,
            Type::Long => Type::ULong,
            other => other.clone(),
        }
    }

    pub fn struct_name(&self) -> Option<&str> {
        match self {
            Type::Struct(name) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Void => write!(f, "void"),
            Type::Char => write!(f, "char"),
            Type::UChar => write!(f, "unsigned char"),
            Type::Short => write!(f, "short"),
            Type::UShort => write!(f, "unsigned short"),
            Type::Int => write!(f, "int"),
            Type::UInt => write!(f, "unsigned int"),
            Type::Long => write!(f, "long"),
            Type::ULong => write!(f, "unsigned long"),
            Type::Float => write!(f, "float"),
            Type::Double => write!(f, "double"),
            Type::Pointer(inner) => write!(f, "{} *", inner),
            Type::Array(elem, Some(len)) => write!(f, "{}[{}]", elem, len),
            Type::Array(elem, None) => write!(f, "{}[]", elem),
            Type::Struct(name) => write!(f, "struct {}", name),
        }
    }
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    // Comparison
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    // Logical
    And,
    Or,
    // Bitwise
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

impl BinOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::And => "&&",
            BinOp::Or => "||",
            BinOp::BitAnd => "&",
            BinOp::BitOr => "|",
            BinOp::BitXor => "^",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
        }
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge
        )
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Neg,     // -x
    Plus,    // +x
    Not,     // !x
    BitNot,  // ~x
    PreInc,  // ++x
    PreDec,  // --x
    PostInc, // x++
    PostDec, // x--
    Deref,   // *x
    AddrOf,  // &x
}

/// Where a named object lives, as decided by the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    /// Slot index inside the enclosing function's frame
    Local(usize),
    /// Index into the static segment (globals and `static` locals)
    Global(usize),
}

/// Resolved target of a call expression
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallTarget {
    User,
    Builtin(Builtin),
}

static UNTYPED: Type = Type::Int;

/// An expression together with its resolved type.
#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    /// Filled in by the resolver (pre-filled by the parser for literals)
    pub ty: Option<Type>,
    pub location: SourceLocation,
}

impl Expr {
    pub fn new(kind: ExprKind, location: SourceLocation) -> Self {
        Expr {
            kind,
            ty: None,
            location,
        }
    }

    pub fn typed(kind: ExprKind, ty: Type, location: SourceLocation) -> Self {
        Expr {
            kind,
            ty: Some(ty),
            location,
        }
    }

    /// The resolved type; `int` for an expression the resolver has not typed
    pub fn resolved_type(&self) -> &Type {
        self.ty.as_ref().unwrap_or(&UNTYPED)
    }

    /// Whether the expression designates a storage location.
    pub fn is_lvalue(&self) -> bool {
        match &self.kind {
            ExprKind::Ident { .. }
            | ExprKind::Index { .. }
            | ExprKind::PointerMember { .. }
            | ExprKind::StringLiteral { .. } => true,
            ExprKind::Unary { op: UnOp::Deref, .. } => true,
            ExprKind::Member { object, .. } => object.is_lvalue(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    IntLiteral(i64),
    FloatLiteral(f64),
    StringLiteral {
        bytes: Vec<u8>,
        id: NodeId,
    },
    Null,
    Ident {
        name: String,
        binding: Option<Binding>,
    },
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnOp,
        operand: Box<Expr>,
    },
    Assign {
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    CompoundAssign {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Ternary {
        condition: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
    },
    Call {
        name: String,
        args: Vec<Expr>,
        target: Option<CallTarget>,
    },
    Index {
        array: Box<Expr>,
        index: Box<Expr>,
    },
    Member {
        object: Box<Expr>,
        member: String,
        offset: Option<usize>,
    },
    PointerMember {
        object: Box<Expr>,
        member: String,
        offset: Option<usize>,
    },
    Cast {
        target: Type,
        expr: Box<Expr>,
    },
    SizeofType {
        target: Type,
        size: Option<usize>,
    },
    SizeofExpr {
        expr: Box<Expr>,
        size: Option<usize>,
    },
    Comma {
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

/// Initializer of a declaration: a single expression or a brace list.
#[derive(Debug, Clone)]
pub enum Initializer {
    Expr(Expr),
    List(Vec<Initializer>, SourceLocation),
}

impl Initializer {
    pub fn location(&self) -> SourceLocation {
        match self {
            Initializer::Expr(expr) => expr.location,
            Initializer::List(_, location) => *location,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageClass {
    Auto,
    Static,
    Extern,
}

/// One declarator of a declaration statement: `int x = 1, *p;` yields two.
#[derive(Debug, Clone)]
pub struct Declaration {
    pub name: String,
    pub ty: Type,
    pub storage: StorageClass,
    pub is_const: bool,
    pub init: Option<Initializer>,
    pub location: SourceLocation,
    /// Filled in by the resolver
    pub binding: Option<Binding>,
}

/// Switch case
#[derive(Debug, Clone)]
pub enum CaseNode {
    Case {
        value: Expr,
        statements: Vec<Stmt>,
        location: SourceLocation,
    },
    Default {
        statements: Vec<Stmt>,
        location: SourceLocation,
    },
}

impl CaseNode {
    pub fn statements(&self) -> &[Stmt] {
        match self {
            CaseNode::Case { statements, .. } | CaseNode::Default { statements, .. } => statements,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Declaration(Vec<Declaration>),
    Expr(Expr),
    Block {
        statements: Vec<Stmt>,
        location: SourceLocation,
    },
    If {
        condition: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
        location: SourceLocation,
    },
    While {
        condition: Expr,
        body: Box<Stmt>,
        location: SourceLocation,
    },
    DoWhile {
        body: Box<Stmt>,
        condition: Expr,
        location: SourceLocation,
    },
    For {
        init: Option<Box<Stmt>>,
        condition: Option<Expr>,
        increment: Option<Expr>,
        body: Box<Stmt>,
        location: SourceLocation,
    },
    Switch {
        expr: Expr,
        cases: Vec<CaseNode>,
        location: SourceLocation,
    },
    Break {
        location: SourceLocation,
    },
    Continue {
        location: SourceLocation,
    },
    Return {
        expr: Option<Expr>,
        location: SourceLocation,
    },
    Empty {
        location: SourceLocation,
    },
}

impl Stmt {
    /// Get the source location of this statement
    pub fn location(&self) -> SourceLocation {
        match self {
            Stmt::Declaration(decls) => decls.first().map(|d| d.location).unwrap_or_default(),
            Stmt::Expr(expr) => expr.location,
            Stmt::Block { location, .. }
            | Stmt::If { location, .. }
            | Stmt::While { location, .. }
            | Stmt::DoWhile { location, .. }
            | Stmt::For { location, .. }
            | Stmt::Switch { location, .. }
            | Stmt::Break { location }
            | Stmt::Continue { location }
            | Stmt::Return { location, .. }
            | Stmt::Empty { location } => *location,
        }
    }
}

/// Function parameter
#[derive(Debug, Clone)]
pub struct Param {
    pub name: Option<String>,
    pub ty: Type,
    pub location: SourceLocation,
    /// Frame slot assigned by the resolver
    pub slot: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct FunctionDef {
    pub name: String,
    pub return_type: Type,
    pub params: Vec<Param>,
    pub body: Vec<Stmt>,
    pub location: SourceLocation,
    /// Number of local slots, filled in by the resolver
    pub frame_size: usize,
}

/// A prototype such as `int getline(char s[], int lim);`
#[derive(Debug, Clone)]
pub struct FunctionDecl {
    pub name: String,
    pub return_type: Type,
    pub params: Vec<Param>,
    pub location: SourceLocation,
}

/// Struct field
#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub ty: Type,
    pub location: SourceLocation,
}

/// Struct or union definition
#[derive(Debug, Clone)]
pub struct StructDef {
    pub name: String,
    pub fields: Vec<Field>,
    pub is_union: bool,
    pub location: SourceLocation,
}

/// Top-level item of a translation unit
#[derive(Debug, Clone)]
pub enum Item {
    Function(FunctionDef),
    Prototype(FunctionDecl),
    Globals(Vec<Declaration>),
}

/// Top-level program structure
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub items: Vec<Item>,
    /// Every struct/union definition, wherever it appeared (tags share one namespace)
    pub structs: Vec<StructDef>,
}

impl Program {
    pub fn new() -> Self {
        Program::default()
    }

    pub fn functions(&self) -> impl Iterator<Item = &FunctionDef> {
        self.items.iter().filter_map(|item| match item {
            Item::Function(def) => Some(def),
            _ => None,
        })
    }

    pub fn function(&self, name: &str) -> Option<&FunctionDef> {
        self.functions().find(|f| f.name == name)
    }
}
