//! The Surface AST: the sugar-rich tree produced by the parser.
//!
//! Covers expressions, patterns, type expressions, declarations, and
//! modules. The parser has already inserted unit literals for `if` without
//! `else` and expanded record field shorthand, so neither appears here.

use std::path::PathBuf;

use vibefun_common::Location;

// ── Literals and operators ──────────────────────────────────────────────

/// A literal value. Shared between the surface and core trees.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    Unit,
}

impl std::fmt::Display for Literal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Literal::Int(n) => write!(f, "{n}"),
            Literal::Float(x) => write!(f, "{x}"),
            Literal::Str(s) => write!(f, "{s:?}"),
            Literal::Bool(b) => write!(f, "{b}"),
            Literal::Unit => write!(f, "()"),
        }
    }
}

/// Binary operators, including the sugar forms eliminated by desugaring
/// (`Pipe`, `ComposeFwd`, `ComposeBack`, `Cons`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    /// String concatenation `&`.
    Concat,
    /// List cons `::`.
    Cons,
    /// `x |> f`.
    Pipe,
    /// `f >> g`.
    ComposeFwd,
    /// `f << g`.
    ComposeBack,
    /// `r := v`.
    RefAssign,
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Not,
    /// Reference dereference `!r`.
    Deref,
}

// ── Expressions ─────────────────────────────────────────────────────────

/// A surface expression: a kind plus the location of the source syntax.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub loc: Location,
}

impl Expr {
    pub fn new(kind: ExprKind, loc: Location) -> Self {
        Expr { kind, loc }
    }
}

/// An element of a list literal.
#[derive(Debug, Clone, PartialEq)]
pub enum ListItem {
    Item(Expr),
    /// `...xs` spread.
    Spread(Expr),
}

/// An entry of a record literal. Later entries win on field shadowing.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordItem {
    Field(String, Expr),
    /// `...base` spread.
    Spread(Expr),
}

/// One case of a `match` expression.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchCase {
    pub pattern: Pattern,
    pub guard: Option<Expr>,
    pub body: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Lit(Literal),
    /// Identifier reference.
    Var(String),
    /// N-ary lambda; parameters are patterns.
    Lambda { params: Vec<Pattern>, body: Box<Expr> },
    /// N-ary application. `f()` has an empty argument list.
    Call { func: Box<Expr>, args: Vec<Expr> },
    BinOp { op: BinOp, lhs: Box<Expr>, rhs: Box<Expr> },
    UnOp { op: UnOp, operand: Box<Expr> },
    If { cond: Box<Expr>, then: Box<Expr>, els: Box<Expr> },
    Match { scrutinee: Box<Expr>, cases: Vec<MatchCase> },
    /// Sequence of let declarations with a trailing expression.
    /// A missing tail is ill-formed and rejected by the desugarer.
    Block { decls: Vec<LetDecl>, tail: Option<Box<Expr>> },
    List(Vec<ListItem>),
    Record(Vec<RecordItem>),
    RecordAccess { record: Box<Expr>, field: String },
    RecordUpdate { record: Box<Expr>, fields: Vec<(String, Expr)> },
    /// Variant construction via capitalized identifier application.
    Variant { ctor: String, args: Vec<Expr> },
    Tuple(Vec<Expr>),
    /// Type annotation on an expression: `(e: T)`.
    Annotated { expr: Box<Expr>, ty: TypeExpr },
    While { cond: Box<Expr>, body: Box<Expr> },
    /// `unsafe { e }`.
    Unsafe(Box<Expr>),
}

// ── Patterns ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Pattern {
    pub kind: PatternKind,
    pub loc: Location,
}

impl Pattern {
    pub fn new(kind: PatternKind, loc: Location) -> Self {
        Pattern { kind, loc }
    }

    /// Collect the variable names bound by this pattern, in source order.
    pub fn bound_names(&self, out: &mut Vec<String>) {
        match &self.kind {
            PatternKind::Wildcard | PatternKind::Lit(_) => {}
            PatternKind::Var(name) => out.push(name.clone()),
            PatternKind::Variant { args, .. } => {
                for arg in args {
                    arg.bound_names(out);
                }
            }
            PatternKind::Tuple(items) => {
                for item in items {
                    item.bound_names(out);
                }
            }
            PatternKind::Record(fields) => {
                for (_, pat) in fields {
                    pat.bound_names(out);
                }
            }
            PatternKind::List { items, rest } => {
                for item in items {
                    item.bound_names(out);
                }
                if let Some(rest) = rest {
                    out.push(rest.clone());
                }
            }
            PatternKind::Or(alts) => {
                // Alternatives bind identical sets (the desugarer enforces
                // this), so the first alternative is representative.
                if let Some(first) = alts.first() {
                    first.bound_names(out);
                }
            }
            PatternKind::Annotated { pat, .. } => pat.bound_names(out),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PatternKind {
    Wildcard,
    Var(String),
    Lit(Literal),
    Variant { ctor: String, args: Vec<Pattern> },
    Tuple(Vec<Pattern>),
    /// Named fields only; record patterns have no spread form.
    Record(Vec<(String, Pattern)>),
    /// `[p1, p2, ...rest]` -- at most one trailing rest binder.
    List { items: Vec<Pattern>, rest: Option<String> },
    /// `p1 | p2 | ...` -- alternatives may not bind variables.
    Or(Vec<Pattern>),
    /// `(p: T)`.
    Annotated { pat: Box<Pattern>, ty: TypeExpr },
}

// ── Type expressions ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct TypeExpr {
    pub kind: TypeExprKind,
    pub loc: Location,
}

impl TypeExpr {
    pub fn new(kind: TypeExprKind, loc: Location) -> Self {
        TypeExpr { kind, loc }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeExprKind {
    /// Lowercase type variable, e.g. `a`.
    Var(String),
    /// Pascal-case type constant, e.g. `Int`.
    Const(String),
    /// Type application, e.g. `List<T>`.
    App { ctor: String, args: Vec<TypeExpr> },
    /// Function type; `->` is right-associative.
    Fun { params: Vec<TypeExpr>, ret: Box<TypeExpr> },
    Record(Vec<(String, TypeExpr)>),
    Union(Vec<TypeExpr>),
    Tuple(Vec<TypeExpr>),
    Unit,
}

// ── Declarations ────────────────────────────────────────────────────────

/// A `let` binding, at top level or inside a block.
#[derive(Debug, Clone, PartialEq)]
pub struct LetDecl {
    pub name: String,
    pub rec: bool,
    pub mutable: bool,
    pub annotation: Option<TypeExpr>,
    pub value: Expr,
    pub loc: Location,
}

/// The body of a `type` declaration.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeDeclBody {
    Alias(TypeExpr),
    Record(Vec<(String, TypeExpr)>),
    Variant(Vec<VariantCtor>),
}

/// One constructor of a variant type declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantCtor {
    pub name: String,
    pub args: Vec<TypeExpr>,
    pub loc: Location,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeDecl {
    pub name: String,
    pub params: Vec<String>,
    pub body: TypeDeclBody,
    pub loc: Location,
}

/// An `external` declaration binding a JS value.
///
/// Overloads are repeated declarations sharing `name` (and JS name); the
/// type checker groups them and resolves call sites by arity.
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalDecl {
    pub name: String,
    pub ty: TypeExpr,
    pub js_name: String,
    pub from_module: Option<String>,
    pub loc: Location,
}

/// One imported name, optionally renamed.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportName {
    pub name: String,
    pub alias: Option<String>,
    pub loc: Location,
}

impl ImportName {
    /// The name the import binds locally.
    pub fn local_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportDecl {
    pub names: Vec<ImportName>,
    /// The module specifier as written: `./util`, `@/lib/x`, `lodash`.
    pub specifier: String,
    /// True for `import type { ... }`.
    pub type_only: bool,
    pub loc: Location,
}

/// What a re-export declaration forwards.
#[derive(Debug, Clone, PartialEq)]
pub enum Reexport {
    Named(Vec<ImportName>),
    Wildcard,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReexportDecl {
    pub reexport: Reexport,
    pub specifier: String,
    pub loc: Location,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportDecl {
    pub names: Vec<String>,
    pub loc: Location,
}

/// A top-level declaration.
#[derive(Debug, Clone, PartialEq)]
pub enum Decl {
    Let(LetDecl),
    Type(TypeDecl),
    External(ExternalDecl),
    Import(ImportDecl),
    Reexport(ReexportDecl),
    Export(ExportDecl),
}

impl Decl {
    /// The declaration's source location.
    pub fn loc(&self) -> &Location {
        match self {
            Decl::Let(d) => &d.loc,
            Decl::Type(d) => &d.loc,
            Decl::External(d) => &d.loc,
            Decl::Import(d) => &d.loc,
            Decl::Reexport(d) => &d.loc,
            Decl::Export(d) => &d.loc,
        }
    }
}

// ── Modules ─────────────────────────────────────────────────────────────

/// A parsed source unit: its path plus declarations in source order.
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    pub path: PathBuf,
    pub decls: Vec<Decl>,
}
