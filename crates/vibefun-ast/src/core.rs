//! The Core AST: the minimal subset the type checker consumes.
//!
//! No pipes, no composition, no multi-argument lambdas or applications, no
//! list literals, no while loops, no blocks, no if expressions, no
//! or-patterns, no annotated patterns. Variant construction and list
//! `Nil`/`Cons` appear as ordinary constructor applications; the reference
//! operators and string concatenation pass through for code generation to
//! handle.

use std::path::PathBuf;

use vibefun_common::Location;

use crate::surface::{
    ExportDecl, ExternalDecl, ImportDecl, Literal, ReexportDecl, TypeDecl, TypeExpr,
};

// ── Operators ───────────────────────────────────────────────────────────

/// Core binary operators. The sugar forms (`|>`, `>>`, `<<`, `::`) are gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreBinOp {
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
    Concat,
    RefAssign,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreUnOp {
    Neg,
    Not,
    Deref,
}

// ── Expressions ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct CoreExpr {
    pub kind: CoreExprKind,
    pub loc: Location,
}

impl CoreExpr {
    pub fn new(kind: CoreExprKind, loc: Location) -> Self {
        CoreExpr { kind, loc }
    }
}

/// An entry of a core record. Merge semantics are last-writer-wins in
/// source order; the runtime performs the merge.
#[derive(Debug, Clone, PartialEq)]
pub enum CoreRecordItem {
    Field(String, CoreExpr),
    Spread(CoreExpr),
}

/// One binding of a `let rec` group.
#[derive(Debug, Clone, PartialEq)]
pub struct CoreBinding {
    pub name: String,
    pub annotation: Option<TypeExpr>,
    pub value: CoreExpr,
    pub loc: Location,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoreMatchCase {
    pub pattern: CorePattern,
    pub guard: Option<CoreExpr>,
    pub body: CoreExpr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CoreExprKind {
    Lit(Literal),
    Var(String),
    /// Single-parameter lambda. Pattern parameters are preserved; the type
    /// checker performs the destructuring.
    Lambda { param: CorePattern, body: Box<CoreExpr> },
    /// Unary application.
    Apply { func: Box<CoreExpr>, arg: Box<CoreExpr> },
    Let {
        name: String,
        mutable: bool,
        annotation: Option<TypeExpr>,
        value: Box<CoreExpr>,
        body: Box<CoreExpr>,
    },
    /// Mutually recursive bindings sharing one generalization point.
    LetRec { bindings: Vec<CoreBinding>, body: Box<CoreExpr> },
    Match { scrutinee: Box<CoreExpr>, cases: Vec<CoreMatchCase> },
    Record(Vec<CoreRecordItem>),
    RecordAccess { record: Box<CoreExpr>, field: String },
    Tuple(Vec<CoreExpr>),
    BinOp { op: CoreBinOp, lhs: Box<CoreExpr>, rhs: Box<CoreExpr> },
    UnOp { op: CoreUnOp, operand: Box<CoreExpr> },
    /// Expression-level annotation, consumed by the checker as a
    /// unification constraint.
    Annotated { expr: Box<CoreExpr>, ty: TypeExpr },
    Unsafe(Box<CoreExpr>),
}

// ── Patterns ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct CorePattern {
    pub kind: CorePatternKind,
    pub loc: Location,
}

impl CorePattern {
    pub fn new(kind: CorePatternKind, loc: Location) -> Self {
        CorePattern { kind, loc }
    }

    /// Collect bound variable names in source order.
    pub fn bound_names(&self, out: &mut Vec<String>) {
        match &self.kind {
            CorePatternKind::Wildcard | CorePatternKind::Lit(_) => {}
            CorePatternKind::Var(name) => out.push(name.clone()),
            CorePatternKind::Variant { args, .. } => {
                for arg in args {
                    arg.bound_names(out);
                }
            }
            CorePatternKind::Tuple(items) => {
                for item in items {
                    item.bound_names(out);
                }
            }
            CorePatternKind::Record(fields) => {
                for (_, pat) in fields {
                    pat.bound_names(out);
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CorePatternKind {
    Wildcard,
    Var(String),
    Lit(Literal),
    Variant { ctor: String, args: Vec<CorePattern> },
    Tuple(Vec<CorePattern>),
    Record(Vec<(String, CorePattern)>),
}

// ── Declarations and modules ────────────────────────────────────────────

/// A top-level core `let`. Recursive groups keep their binding list so
/// mutually recursive functions are generalized together.
#[derive(Debug, Clone, PartialEq)]
pub struct CoreLetDecl {
    pub name: String,
    pub mutable: bool,
    pub annotation: Option<TypeExpr>,
    pub value: CoreExpr,
    pub loc: Location,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CoreDecl {
    Let(CoreLetDecl),
    /// A `let rec` group; singleton groups are the common case.
    LetRec(Vec<CoreLetDecl>),
    /// Type, external, import, and export declarations pass through
    /// desugaring unchanged; the checker and resolver consume them.
    Type(TypeDecl),
    External(ExternalDecl),
    Import(ImportDecl),
    Reexport(ReexportDecl),
    Export(ExportDecl),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoreModule {
    pub path: PathBuf,
    pub decls: Vec<CoreDecl>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc() -> Location {
        Location::new("t.vf", 1, 1, 0)
    }

    #[test]
    fn core_pattern_bound_names() {
        let pat = CorePattern::new(
            CorePatternKind::Variant {
                ctor: "Cons".into(),
                args: vec![
                    CorePattern::new(CorePatternKind::Var("head".into()), loc()),
                    CorePattern::new(CorePatternKind::Var("tail".into()), loc()),
                ],
            },
            loc(),
        );
        let mut names = Vec::new();
        pat.bound_names(&mut names);
        assert_eq!(names, vec!["head".to_string(), "tail".to_string()]);
    }
}
