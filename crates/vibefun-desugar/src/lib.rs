//! Surface → Core lowering for the Vibefun front-end.
//!
//! Eliminates every sugar form: multi-parameter lambdas curry, n-ary calls
//! nest, pipes and compositions become applications, list literals and
//! patterns become `Cons`/`Nil`, `if` becomes `match` on `Bool`, blocks
//! become `let` chains, `while` becomes a recursive driver function, and
//! or-patterns duplicate their match case per alternative.
//!
//! Ordering constraints: or-pattern expansion runs before list-pattern
//! lowering, pipes and compositions lower before currying, and blocks
//! lower outside-in. Every generated node reuses the location of the
//! surface construct that produced it.
//!
//! Desugaring is total on well-formed input; the only failures are
//! ill-formed trees (empty block, or-pattern with inconsistent bindings),
//! each reported as a coded diagnostic and stopping the current module.

pub mod fresh;

use vibefun_ast::core::{
    CoreBinOp, CoreBinding, CoreDecl, CoreExpr, CoreExprKind, CoreLetDecl, CoreMatchCase,
    CoreModule, CorePattern, CorePatternKind, CoreRecordItem, CoreUnOp,
};
use vibefun_ast::surface::{
    BinOp, Decl, Expr, ExprKind, LetDecl, ListItem, Literal, MatchCase, Module, Pattern,
    PatternKind, RecordItem, UnOp,
};
use vibefun_common::{registry, Diagnostic, Location};

use crate::fresh::FreshNames;

/// A desugaring session. Owns the fresh-name generator so generated names
/// stay unique across one module.
#[derive(Debug, Default)]
pub struct Desugarer {
    fresh: FreshNames,
}

impl Desugarer {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Modules and declarations ────────────────────────────────────────

    /// Lower a surface module to a core module.
    ///
    /// Consecutive `let rec` declarations form one mutually recursive
    /// group; the type checker generalizes each group simultaneously.
    pub fn desugar_module(&mut self, module: &Module) -> Result<CoreModule, Diagnostic> {
        let mut decls = Vec::new();
        let mut iter = module.decls.iter().peekable();

        while let Some(decl) = iter.next() {
            match decl {
                Decl::Let(d) if d.rec => {
                    let mut group = vec![self.desugar_let_decl(d)?];
                    while let Some(Decl::Let(next)) = iter.peek() {
                        if !next.rec {
                            break;
                        }
                        group.push(self.desugar_let_decl(next)?);
                        iter.next();
                    }
                    decls.push(CoreDecl::LetRec(group));
                }
                Decl::Let(d) => decls.push(CoreDecl::Let(self.desugar_let_decl(d)?)),
                Decl::Type(d) => decls.push(CoreDecl::Type(d.clone())),
                Decl::External(d) => decls.push(CoreDecl::External(d.clone())),
                Decl::Import(d) => decls.push(CoreDecl::Import(d.clone())),
                Decl::Reexport(d) => decls.push(CoreDecl::Reexport(d.clone())),
                Decl::Export(d) => decls.push(CoreDecl::Export(d.clone())),
            }
        }

        Ok(CoreModule { path: module.path.clone(), decls })
    }

    fn desugar_let_decl(&mut self, decl: &LetDecl) -> Result<CoreLetDecl, Diagnostic> {
        Ok(CoreLetDecl {
            name: decl.name.clone(),
            mutable: decl.mutable,
            annotation: decl.annotation.clone(),
            value: self.desugar_expr(&decl.value)?,
            loc: decl.loc.clone(),
        })
    }

    // ── Expressions ─────────────────────────────────────────────────────

    /// Lower one surface expression.
    pub fn desugar_expr(&mut self, expr: &Expr) -> Result<CoreExpr, Diagnostic> {
        let loc = expr.loc.clone();
        let kind = match &expr.kind {
            ExprKind::Lit(lit) => CoreExprKind::Lit(lit.clone()),
            ExprKind::Var(name) => CoreExprKind::Var(name.clone()),

            ExprKind::Lambda { params, body } => {
                return self.desugar_lambda(params, body, &loc);
            }

            ExprKind::Call { func, args } => {
                let mut acc = self.desugar_expr(func)?;
                if args.is_empty() {
                    // `f()` applies the unit literal.
                    acc = apply(acc, CoreExpr::new(CoreExprKind::Lit(Literal::Unit), loc.clone()), &loc);
                } else {
                    for arg in args {
                        acc = apply(acc, self.desugar_expr(arg)?, &loc);
                    }
                }
                return Ok(acc);
            }

            ExprKind::BinOp { op, lhs, rhs } => {
                return self.desugar_binop(*op, lhs, rhs, &loc);
            }

            ExprKind::UnOp { op, operand } => CoreExprKind::UnOp {
                op: match op {
                    UnOp::Neg => CoreUnOp::Neg,
                    UnOp::Not => CoreUnOp::Not,
                    UnOp::Deref => CoreUnOp::Deref,
                },
                operand: Box::new(self.desugar_expr(operand)?),
            },

            ExprKind::If { cond, then, els } => {
                // `if c then t else e` is `match c { true => t, false => e }`.
                // The parser already inserted the unit literal for a missing
                // else branch.
                let scrutinee = self.desugar_expr(cond)?;
                let then_case = CoreMatchCase {
                    pattern: CorePattern::new(
                        CorePatternKind::Lit(Literal::Bool(true)),
                        then.loc.clone(),
                    ),
                    guard: None,
                    body: self.desugar_expr(then)?,
                };
                let else_case = CoreMatchCase {
                    pattern: CorePattern::new(
                        CorePatternKind::Lit(Literal::Bool(false)),
                        els.loc.clone(),
                    ),
                    guard: None,
                    body: self.desugar_expr(els)?,
                };
                CoreExprKind::Match {
                    scrutinee: Box::new(scrutinee),
                    cases: vec![then_case, else_case],
                }
            }

            ExprKind::Match { scrutinee, cases } => {
                let scrutinee = self.desugar_expr(scrutinee)?;
                let mut core_cases = Vec::new();
                for case in cases {
                    self.desugar_match_case(case, &mut core_cases)?;
                }
                CoreExprKind::Match {
                    scrutinee: Box::new(scrutinee),
                    cases: core_cases,
                }
            }

            ExprKind::Block { decls, tail } => {
                let Some(tail) = tail else {
                    return Err(registry::create("VF3001", loc, &[]));
                };
                return self.desugar_block(decls, tail);
            }

            ExprKind::List(items) => return self.desugar_list(items, &loc),

            ExprKind::Record(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(match item {
                        RecordItem::Field(name, value) => {
                            CoreRecordItem::Field(name.clone(), self.desugar_expr(value)?)
                        }
                        RecordItem::Spread(value) => {
                            CoreRecordItem::Spread(self.desugar_expr(value)?)
                        }
                    });
                }
                CoreExprKind::Record(out)
            }

            ExprKind::RecordAccess { record, field } => CoreExprKind::RecordAccess {
                record: Box::new(self.desugar_expr(record)?),
                field: field.clone(),
            },

            ExprKind::RecordUpdate { record, fields } => {
                // `{ ...base, x: v }` is a record literal whose first item
                // spreads the base; later fields win.
                let mut out = vec![CoreRecordItem::Spread(self.desugar_expr(record)?)];
                for (name, value) in fields {
                    out.push(CoreRecordItem::Field(name.clone(), self.desugar_expr(value)?));
                }
                CoreExprKind::Record(out)
            }

            ExprKind::Variant { ctor, args } => {
                // Constructors are ordinary functions in the checker's
                // environment; construction is application.
                let mut acc = CoreExpr::new(CoreExprKind::Var(ctor.clone()), loc.clone());
                for arg in args {
                    acc = apply(acc, self.desugar_expr(arg)?, &loc);
                }
                return Ok(acc);
            }

            ExprKind::Tuple(items) => {
                let items = items
                    .iter()
                    .map(|item| self.desugar_expr(item))
                    .collect::<Result<Vec<_>, _>>()?;
                CoreExprKind::Tuple(items)
            }

            ExprKind::Annotated { expr: inner, ty } => CoreExprKind::Annotated {
                expr: Box::new(self.desugar_expr(inner)?),
                ty: ty.clone(),
            },

            ExprKind::While { cond, body } => return self.desugar_while(cond, body, &loc),

            ExprKind::Unsafe(inner) => {
                CoreExprKind::Unsafe(Box::new(self.desugar_expr(inner)?))
            }
        };
        Ok(CoreExpr::new(kind, loc))
    }

    /// Curry an n-ary lambda into right-nested single-parameter lambdas.
    ///
    /// A parameter pattern containing an or-pattern cannot survive as a
    /// core lambda parameter; the lambda is rewritten to match on a fresh
    /// variable so the match-level expansion applies.
    fn desugar_lambda(
        &mut self,
        params: &[Pattern],
        body: &Expr,
        loc: &Location,
    ) -> Result<CoreExpr, Diagnostic> {
        let mut acc = self.desugar_expr(body)?;
        if params.is_empty() {
            // `() => e` takes the unit literal.
            let param = CorePattern::new(CorePatternKind::Lit(Literal::Unit), loc.clone());
            return Ok(CoreExpr::new(
                CoreExprKind::Lambda { param, body: Box::new(acc) },
                loc.clone(),
            ));
        }
        for param in params.iter().rev() {
            if contains_or_pattern(param) {
                let var = self.fresh.tmp();
                let scrutinee =
                    CoreExpr::new(CoreExprKind::Var(var.clone()), param.loc.clone());
                let mut cases = Vec::new();
                self.desugar_match_case(
                    &MatchCase {
                        pattern: param.clone(),
                        guard: None,
                        body: Expr::new(ExprKind::Lit(Literal::Unit), param.loc.clone()),
                    },
                    &mut cases,
                )?;
                // Reuse the expanded patterns but share the already-lowered body.
                for case in &mut cases {
                    case.body = acc.clone();
                }
                acc = CoreExpr::new(
                    CoreExprKind::Lambda {
                        param: CorePattern::new(CorePatternKind::Var(var), param.loc.clone()),
                        body: Box::new(CoreExpr::new(
                            CoreExprKind::Match { scrutinee: Box::new(scrutinee), cases },
                            param.loc.clone(),
                        )),
                    },
                    loc.clone(),
                );
            } else {
                acc = CoreExpr::new(
                    CoreExprKind::Lambda {
                        param: self.desugar_pattern(param)?,
                        body: Box::new(acc),
                    },
                    loc.clone(),
                );
            }
        }
        Ok(acc)
    }

    /// Lower the operator sugar: pipes and compositions disappear before
    /// any currying happens, cons becomes constructor application, and the
    /// remaining operators map one-to-one.
    fn desugar_binop(
        &mut self,
        op: BinOp,
        lhs: &Expr,
        rhs: &Expr,
        loc: &Location,
    ) -> Result<CoreExpr, Diagnostic> {
        let core_op = match op {
            BinOp::Pipe => {
                // `x |> f` is `f(x)`.
                let arg = self.desugar_expr(lhs)?;
                let func = self.desugar_expr(rhs)?;
                return Ok(apply(func, arg, loc));
            }
            BinOp::ComposeFwd | BinOp::ComposeBack => {
                // `f >> g` is `(v) => g(f(v))`; `<<` mirrors.
                let var = self.fresh.composed();
                let (inner, outer) = if op == BinOp::ComposeFwd {
                    (self.desugar_expr(lhs)?, self.desugar_expr(rhs)?)
                } else {
                    (self.desugar_expr(rhs)?, self.desugar_expr(lhs)?)
                };
                let arg = CoreExpr::new(CoreExprKind::Var(var.clone()), loc.clone());
                let body = apply(outer, apply(inner, arg, loc), loc);
                return Ok(CoreExpr::new(
                    CoreExprKind::Lambda {
                        param: CorePattern::new(CorePatternKind::Var(var), loc.clone()),
                        body: Box::new(body),
                    },
                    loc.clone(),
                ));
            }
            BinOp::Cons => {
                // `a :: t` is `Cons(a, t)`.
                let head = self.desugar_expr(lhs)?;
                let tail = self.desugar_expr(rhs)?;
                let ctor = CoreExpr::new(CoreExprKind::Var("Cons".into()), loc.clone());
                return Ok(apply(apply(ctor, head, loc), tail, loc));
            }
            BinOp::Add => CoreBinOp::Add,
            BinOp::Sub => CoreBinOp::Sub,
            BinOp::Mul => CoreBinOp::Mul,
            BinOp::Div => CoreBinOp::Div,
            BinOp::Mod => CoreBinOp::Mod,
            BinOp::Eq => CoreBinOp::Eq,
            BinOp::Ne => CoreBinOp::Ne,
            BinOp::Lt => CoreBinOp::Lt,
            BinOp::Le => CoreBinOp::Le,
            BinOp::Gt => CoreBinOp::Gt,
            BinOp::Ge => CoreBinOp::Ge,
            BinOp::And => CoreBinOp::And,
            BinOp::Or => CoreBinOp::Or,
            BinOp::Concat => CoreBinOp::Concat,
            BinOp::RefAssign => CoreBinOp::RefAssign,
        };
        Ok(CoreExpr::new(
            CoreExprKind::BinOp {
                op: core_op,
                lhs: Box::new(self.desugar_expr(lhs)?),
                rhs: Box::new(self.desugar_expr(rhs)?),
            },
            loc.clone(),
        ))
    }

    /// Lower a block outside-in: each declaration becomes an enclosing
    /// `let`, ending at the trailing expression. Consecutive `rec`
    /// declarations share one `letrec` group.
    fn desugar_block(&mut self, decls: &[LetDecl], tail: &Expr) -> Result<CoreExpr, Diagnostic> {
        let mut body = self.desugar_expr(tail)?;

        // Split into runs of rec / non-rec declarations, then fold from
        // the innermost (last) group outward.
        let mut groups: Vec<&[LetDecl]> = Vec::new();
        let mut start = 0;
        for i in 1..=decls.len() {
            let boundary = i == decls.len()
                || decls[i].rec != decls[start].rec
                || !decls[start].rec;
            if boundary {
                groups.push(&decls[start..i]);
                start = i;
            }
        }

        for group in groups.into_iter().rev() {
            if group[0].rec {
                let bindings = group
                    .iter()
                    .map(|d| {
                        Ok(CoreBinding {
                            name: d.name.clone(),
                            annotation: d.annotation.clone(),
                            value: self.desugar_expr(&d.value)?,
                            loc: d.loc.clone(),
                        })
                    })
                    .collect::<Result<Vec<_>, Diagnostic>>()?;
                let loc = group[0].loc.clone();
                body = CoreExpr::new(
                    CoreExprKind::LetRec { bindings, body: Box::new(body) },
                    loc,
                );
            } else {
                let d = &group[0];
                body = CoreExpr::new(
                    CoreExprKind::Let {
                        name: d.name.clone(),
                        mutable: d.mutable,
                        annotation: d.annotation.clone(),
                        value: Box::new(self.desugar_expr(&d.value)?),
                        body: Box::new(body),
                    },
                    d.loc.clone(),
                );
            }
        }
        Ok(body)
    }

    /// Lower a list literal to `Cons`/`Nil` construction; spread segments
    /// become `concat` applications, left to right.
    fn desugar_list(&mut self, items: &[ListItem], loc: &Location) -> Result<CoreExpr, Diagnostic> {
        let mut acc = CoreExpr::new(CoreExprKind::Var("Nil".into()), loc.clone());
        for item in items.iter().rev() {
            acc = match item {
                ListItem::Item(e) => {
                    let head = self.desugar_expr(e)?;
                    let ctor = CoreExpr::new(CoreExprKind::Var("Cons".into()), loc.clone());
                    apply(apply(ctor, head, loc), acc, loc)
                }
                ListItem::Spread(e) => {
                    let spread = self.desugar_expr(e)?;
                    let concat = CoreExpr::new(CoreExprKind::Var("concat".into()), loc.clone());
                    apply(apply(concat, spread, loc), acc, loc)
                }
            };
        }
        Ok(acc)
    }

    /// Lower `while c { b }` to a recursive nullary driver:
    /// `letrec loop = () => match c { true => { b; loop() }, false => () }
    ///  in loop()`. The loop's value is unit.
    fn desugar_while(
        &mut self,
        cond: &Expr,
        body: &Expr,
        loc: &Location,
    ) -> Result<CoreExpr, Diagnostic> {
        let loop_name = self.fresh.loop_fn();
        let tmp = self.fresh.tmp();

        let call_loop = apply(
            CoreExpr::new(CoreExprKind::Var(loop_name.clone()), loc.clone()),
            CoreExpr::new(CoreExprKind::Lit(Literal::Unit), loc.clone()),
            loc,
        );

        // true => let $tmp = b in loop()
        let run_then_repeat = CoreExpr::new(
            CoreExprKind::Let {
                name: tmp,
                mutable: false,
                annotation: None,
                value: Box::new(self.desugar_expr(body)?),
                body: Box::new(call_loop.clone()),
            },
            loc.clone(),
        );

        let match_expr = CoreExpr::new(
            CoreExprKind::Match {
                scrutinee: Box::new(self.desugar_expr(cond)?),
                cases: vec![
                    CoreMatchCase {
                        pattern: CorePattern::new(
                            CorePatternKind::Lit(Literal::Bool(true)),
                            loc.clone(),
                        ),
                        guard: None,
                        body: run_then_repeat,
                    },
                    CoreMatchCase {
                        pattern: CorePattern::new(
                            CorePatternKind::Lit(Literal::Bool(false)),
                            loc.clone(),
                        ),
                        guard: None,
                        body: CoreExpr::new(CoreExprKind::Lit(Literal::Unit), loc.clone()),
                    },
                ],
            },
            loc.clone(),
        );

        let driver = CoreExpr::new(
            CoreExprKind::Lambda {
                param: CorePattern::new(CorePatternKind::Lit(Literal::Unit), loc.clone()),
                body: Box::new(match_expr),
            },
            loc.clone(),
        );

        Ok(CoreExpr::new(
            CoreExprKind::LetRec {
                bindings: vec![CoreBinding {
                    name: loop_name,
                    annotation: None,
                    value: driver,
                    loc: loc.clone(),
                }],
                body: Box::new(call_loop),
            },
            loc.clone(),
        ))
    }

    // ── Match cases and patterns ────────────────────────────────────────

    /// Expand one surface match case into core cases.
    ///
    /// A case whose pattern contains or-patterns becomes one core case per
    /// alternative, all sharing the body; the guard, if present, is
    /// duplicated exactly. Or-pattern expansion happens here, before any
    /// list-pattern lowering.
    fn desugar_match_case(
        &mut self,
        case: &MatchCase,
        out: &mut Vec<CoreMatchCase>,
    ) -> Result<(), Diagnostic> {
        let alternatives = expand_or_patterns(&case.pattern)?;
        let guard = match &case.guard {
            Some(guard) => Some(self.desugar_expr(guard)?),
            None => None,
        };
        let body = self.desugar_expr(&case.body)?;
        for alt in &alternatives {
            out.push(CoreMatchCase {
                pattern: self.desugar_pattern(alt)?,
                guard: guard.clone(),
                body: body.clone(),
            });
        }
        Ok(())
    }

    /// Lower one (or-free) surface pattern to a core pattern.
    pub fn desugar_pattern(&mut self, pattern: &Pattern) -> Result<CorePattern, Diagnostic> {
        let loc = pattern.loc.clone();
        let kind = match &pattern.kind {
            PatternKind::Wildcard => CorePatternKind::Wildcard,
            PatternKind::Var(name) => CorePatternKind::Var(name.clone()),
            PatternKind::Lit(lit) => CorePatternKind::Lit(lit.clone()),
            PatternKind::Variant { ctor, args } => CorePatternKind::Variant {
                ctor: ctor.clone(),
                args: args
                    .iter()
                    .map(|arg| self.desugar_pattern(arg))
                    .collect::<Result<Vec<_>, _>>()?,
            },
            PatternKind::Tuple(items) => CorePatternKind::Tuple(
                items
                    .iter()
                    .map(|item| self.desugar_pattern(item))
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            PatternKind::Record(fields) => CorePatternKind::Record(
                fields
                    .iter()
                    .map(|(name, pat)| Ok((name.clone(), self.desugar_pattern(pat)?)))
                    .collect::<Result<Vec<_>, Diagnostic>>()?,
            ),
            PatternKind::List { items, rest } => {
                // `[p, ...r]` reduces to Cons/Nil variant patterns; the
                // trailing rest binder matches the remaining list.
                let mut acc = match rest {
                    Some(rest) => CorePattern::new(CorePatternKind::Var(rest.clone()), loc.clone()),
                    None => CorePattern::new(
                        CorePatternKind::Variant { ctor: "Nil".into(), args: vec![] },
                        loc.clone(),
                    ),
                };
                for item in items.iter().rev() {
                    let head = self.desugar_pattern(item)?;
                    acc = CorePattern::new(
                        CorePatternKind::Variant {
                            ctor: "Cons".into(),
                            args: vec![head, acc],
                        },
                        loc.clone(),
                    );
                }
                return Ok(acc);
            }
            PatternKind::Or(_) => {
                unreachable!("or-patterns are expanded before pattern lowering")
            }
            // The annotation is discarded here; the checker consumes
            // annotations at the enclosing let / parameter / scrutinee
            // boundary.
            PatternKind::Annotated { pat, .. } => return self.desugar_pattern(pat),
        };
        Ok(CorePattern::new(kind, loc))
    }
}

/// Build a unary application node at `loc`.
fn apply(func: CoreExpr, arg: CoreExpr, loc: &Location) -> CoreExpr {
    CoreExpr::new(
        CoreExprKind::Apply { func: Box::new(func), arg: Box::new(arg) },
        loc.clone(),
    )
}

/// Whether a pattern contains an or-pattern anywhere.
fn contains_or_pattern(pattern: &Pattern) -> bool {
    match &pattern.kind {
        PatternKind::Or(_) => true,
        PatternKind::Wildcard | PatternKind::Var(_) | PatternKind::Lit(_) => false,
        PatternKind::Variant { args, .. } => args.iter().any(contains_or_pattern),
        PatternKind::Tuple(items) => items.iter().any(contains_or_pattern),
        PatternKind::Record(fields) => fields.iter().any(|(_, p)| contains_or_pattern(p)),
        PatternKind::List { items, .. } => items.iter().any(contains_or_pattern),
        PatternKind::Annotated { pat, .. } => contains_or_pattern(pat),
    }
}

/// Expand every or-pattern in `pattern` into a list of or-free
/// alternatives. Nested or-patterns multiply out (cartesian product).
///
/// Alternatives must bind identical variable sets; an inconsistent
/// binding is an ill-formed-input error.
pub fn expand_or_patterns(pattern: &Pattern) -> Result<Vec<Pattern>, Diagnostic> {
    match &pattern.kind {
        PatternKind::Wildcard | PatternKind::Var(_) | PatternKind::Lit(_) => {
            Ok(vec![pattern.clone()])
        }
        PatternKind::Or(alts) => {
            // Every alternative must bind exactly the same variables; a
            // name bound in one alternative but not another would be
            // undefined when the other alternative matches.
            let mut expected: Option<Vec<String>> = None;
            let mut out = Vec::new();
            for alt in alts {
                let mut bound = Vec::new();
                alt.bound_names(&mut bound);
                bound.sort();
                bound.dedup();
                match &expected {
                    None => expected = Some(bound),
                    Some(first) if *first != bound => {
                        let offending = first
                            .iter()
                            .find(|name| !bound.contains(name))
                            .or_else(|| bound.iter().find(|name| !first.contains(name)))
                            .cloned()
                            .unwrap_or_default();
                        return Err(registry::create(
                            "VF3002",
                            alt.loc.clone(),
                            &[("name", &offending)],
                        ));
                    }
                    Some(_) => {}
                }
                out.extend(expand_or_patterns(alt)?);
            }
            Ok(out)
        }
        PatternKind::Variant { ctor, args } => {
            let expanded = cartesian(args)?;
            Ok(expanded
                .into_iter()
                .map(|args| {
                    Pattern::new(
                        PatternKind::Variant { ctor: ctor.clone(), args },
                        pattern.loc.clone(),
                    )
                })
                .collect())
        }
        PatternKind::Tuple(items) => {
            let expanded = cartesian(items)?;
            Ok(expanded
                .into_iter()
                .map(|items| Pattern::new(PatternKind::Tuple(items), pattern.loc.clone()))
                .collect())
        }
        PatternKind::Record(fields) => {
            let pats: Vec<Pattern> = fields.iter().map(|(_, p)| p.clone()).collect();
            let expanded = cartesian(&pats)?;
            Ok(expanded
                .into_iter()
                .map(|pats| {
                    let fields = fields
                        .iter()
                        .zip(pats)
                        .map(|((name, _), pat)| (name.clone(), pat))
                        .collect();
                    Pattern::new(PatternKind::Record(fields), pattern.loc.clone())
                })
                .collect())
        }
        PatternKind::List { items, rest } => {
            let expanded = cartesian(items)?;
            Ok(expanded
                .into_iter()
                .map(|items| {
                    Pattern::new(
                        PatternKind::List { items, rest: rest.clone() },
                        pattern.loc.clone(),
                    )
                })
                .collect())
        }
        PatternKind::Annotated { pat, ty } => {
            Ok(expand_or_patterns(pat)?
                .into_iter()
                .map(|inner| {
                    Pattern::new(
                        PatternKind::Annotated { pat: Box::new(inner), ty: ty.clone() },
                        pattern.loc.clone(),
                    )
                })
                .collect())
        }
    }
}

/// Cartesian product of the expansions of each sub-pattern.
fn cartesian(patterns: &[Pattern]) -> Result<Vec<Vec<Pattern>>, Diagnostic> {
    let mut out: Vec<Vec<Pattern>> = vec![Vec::new()];
    for pattern in patterns {
        let alts = expand_or_patterns(pattern)?;
        let mut next = Vec::with_capacity(out.len() * alts.len());
        for prefix in &out {
            for alt in &alts {
                let mut row = prefix.clone();
                row.push(alt.clone());
                next.push(row);
            }
        }
        out = next;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc() -> Location {
        Location::new("t.vf", 1, 1, 0)
    }

    fn var(name: &str) -> Expr {
        Expr::new(ExprKind::Var(name.into()), loc())
    }

    fn int(n: i64) -> Expr {
        Expr::new(ExprKind::Lit(Literal::Int(n)), loc())
    }

    #[test]
    fn lambda_curries_right_nested() {
        let mut d = Desugarer::new();
        let lambda = Expr::new(
            ExprKind::Lambda {
                params: vec![
                    Pattern::new(PatternKind::Var("x".into()), loc()),
                    Pattern::new(PatternKind::Var("y".into()), loc()),
                ],
                body: Box::new(var("x")),
            },
            loc(),
        );
        let core = d.desugar_expr(&lambda).unwrap();
        let CoreExprKind::Lambda { param, body } = &core.kind else {
            panic!("expected outer lambda, got {:?}", core.kind);
        };
        assert_eq!(param.kind, CorePatternKind::Var("x".into()));
        let CoreExprKind::Lambda { param, .. } = &body.kind else {
            panic!("expected inner lambda, got {:?}", body.kind);
        };
        assert_eq!(param.kind, CorePatternKind::Var("y".into()));
    }

    #[test]
    fn call_nests_left() {
        let mut d = Desugarer::new();
        let call = Expr::new(
            ExprKind::Call {
                func: Box::new(var("f")),
                args: vec![int(1), int(2), int(3)],
            },
            loc(),
        );
        let core = d.desugar_expr(&call).unwrap();
        // ((f 1) 2) 3
        let CoreExprKind::Apply { func, arg } = &core.kind else {
            panic!("expected application");
        };
        assert_eq!(arg.kind, CoreExprKind::Lit(Literal::Int(3)));
        let CoreExprKind::Apply { func, arg } = &func.kind else {
            panic!("expected nested application");
        };
        assert_eq!(arg.kind, CoreExprKind::Lit(Literal::Int(2)));
        let CoreExprKind::Apply { func, arg } = &func.kind else {
            panic!("expected innermost application");
        };
        assert_eq!(arg.kind, CoreExprKind::Lit(Literal::Int(1)));
        assert_eq!(func.kind, CoreExprKind::Var("f".into()));
    }

    #[test]
    fn zero_arg_call_applies_unit() {
        let mut d = Desugarer::new();
        let call = Expr::new(
            ExprKind::Call { func: Box::new(var("f")), args: vec![] },
            loc(),
        );
        let core = d.desugar_expr(&call).unwrap();
        let CoreExprKind::Apply { arg, .. } = &core.kind else {
            panic!("expected application");
        };
        assert_eq!(arg.kind, CoreExprKind::Lit(Literal::Unit));
    }

    #[test]
    fn pipe_becomes_application() {
        let mut d = Desugarer::new();
        let pipe = Expr::new(
            ExprKind::BinOp {
                op: BinOp::Pipe,
                lhs: Box::new(int(1)),
                rhs: Box::new(var("f")),
            },
            loc(),
        );
        let core = d.desugar_expr(&pipe).unwrap();
        let CoreExprKind::Apply { func, arg } = &core.kind else {
            panic!("expected application");
        };
        assert_eq!(func.kind, CoreExprKind::Var("f".into()));
        assert_eq!(arg.kind, CoreExprKind::Lit(Literal::Int(1)));
    }

    #[test]
    fn compose_forward_builds_lambda() {
        let mut d = Desugarer::new();
        let compose = Expr::new(
            ExprKind::BinOp {
                op: BinOp::ComposeFwd,
                lhs: Box::new(var("f")),
                rhs: Box::new(var("g")),
            },
            loc(),
        );
        let core = d.desugar_expr(&compose).unwrap();
        // (v) => g(f(v))
        let CoreExprKind::Lambda { param, body } = &core.kind else {
            panic!("expected lambda");
        };
        let CorePatternKind::Var(v) = &param.kind else {
            panic!("expected var param");
        };
        assert!(v.starts_with("$composed_"));
        let CoreExprKind::Apply { func, arg } = &body.kind else {
            panic!("expected outer application");
        };
        assert_eq!(func.kind, CoreExprKind::Var("g".into()));
        let CoreExprKind::Apply { func, arg: inner_arg } = &arg.kind else {
            panic!("expected inner application");
        };
        assert_eq!(func.kind, CoreExprKind::Var("f".into()));
        assert_eq!(inner_arg.kind, CoreExprKind::Var(v.clone()));
    }

    #[test]
    fn compose_backward_mirrors() {
        let mut d = Desugarer::new();
        let compose = Expr::new(
            ExprKind::BinOp {
                op: BinOp::ComposeBack,
                lhs: Box::new(var("f")),
                rhs: Box::new(var("g")),
            },
            loc(),
        );
        let core = d.desugar_expr(&compose).unwrap();
        // (v) => f(g(v))
        let CoreExprKind::Lambda { body, .. } = &core.kind else {
            panic!("expected lambda");
        };
        let CoreExprKind::Apply { func, .. } = &body.kind else {
            panic!("expected application");
        };
        assert_eq!(func.kind, CoreExprKind::Var("f".into()));
    }

    #[test]
    fn list_literal_builds_cons_chain() {
        let mut d = Desugarer::new();
        let list = Expr::new(
            ExprKind::List(vec![ListItem::Item(int(1)), ListItem::Item(int(2))]),
            loc(),
        );
        let core = d.desugar_expr(&list).unwrap();
        // Cons(1, Cons(2, Nil))
        let CoreExprKind::Apply { func, arg: tail } = &core.kind else {
            panic!("expected application");
        };
        let CoreExprKind::Apply { func: cons, arg: head } = &func.kind else {
            panic!("expected cons head application");
        };
        assert_eq!(cons.kind, CoreExprKind::Var("Cons".into()));
        assert_eq!(head.kind, CoreExprKind::Lit(Literal::Int(1)));
        let CoreExprKind::Apply { arg: tail2, .. } = &tail.kind else {
            panic!("expected tail application");
        };
        assert_eq!(tail2.kind, CoreExprKind::Var("Nil".into()));
    }

    #[test]
    fn list_spread_uses_concat() {
        let mut d = Desugarer::new();
        // [a, ...xs, b] => Cons(a, concat(xs, Cons(b, Nil)))
        let list = Expr::new(
            ExprKind::List(vec![
                ListItem::Item(var("a")),
                ListItem::Spread(var("xs")),
                ListItem::Item(var("b")),
            ]),
            loc(),
        );
        let core = d.desugar_expr(&list).unwrap();
        let CoreExprKind::Apply { func, arg: rest } = &core.kind else {
            panic!("expected application");
        };
        let CoreExprKind::Apply { func: cons, .. } = &func.kind else {
            panic!("expected cons");
        };
        assert_eq!(cons.kind, CoreExprKind::Var("Cons".into()));
        // rest = concat(xs, Cons(b, Nil))
        let CoreExprKind::Apply { func: concat_app, .. } = &rest.kind else {
            panic!("expected concat application");
        };
        let CoreExprKind::Apply { func: concat, arg: xs } = &concat_app.kind else {
            panic!("expected concat head");
        };
        assert_eq!(concat.kind, CoreExprKind::Var("concat".into()));
        assert_eq!(xs.kind, CoreExprKind::Var("xs".into()));
    }

    #[test]
    fn if_lowers_to_bool_match() {
        let mut d = Desugarer::new();
        let ife = Expr::new(
            ExprKind::If {
                cond: Box::new(var("c")),
                then: Box::new(int(1)),
                els: Box::new(int(2)),
            },
            loc(),
        );
        let core = d.desugar_expr(&ife).unwrap();
        let CoreExprKind::Match { cases, .. } = &core.kind else {
            panic!("expected match");
        };
        assert_eq!(cases.len(), 2);
        assert_eq!(cases[0].pattern.kind, CorePatternKind::Lit(Literal::Bool(true)));
        assert_eq!(cases[1].pattern.kind, CorePatternKind::Lit(Literal::Bool(false)));
    }

    #[test]
    fn empty_block_is_vf3001() {
        let mut d = Desugarer::new();
        let block = Expr::new(ExprKind::Block { decls: vec![], tail: None }, loc());
        let err = d.desugar_expr(&block).unwrap_err();
        assert_eq!(err.code, "VF3001");
    }

    #[test]
    fn block_lowers_to_let_chain() {
        let mut d = Desugarer::new();
        let block = Expr::new(
            ExprKind::Block {
                decls: vec![
                    LetDecl {
                        name: "a".into(),
                        rec: false,
                        mutable: false,
                        annotation: None,
                        value: int(1),
                        loc: loc(),
                    },
                    LetDecl {
                        name: "b".into(),
                        rec: false,
                        mutable: false,
                        annotation: None,
                        value: var("a"),
                        loc: loc(),
                    },
                ],
                tail: Some(Box::new(var("b"))),
            },
            loc(),
        );
        let core = d.desugar_expr(&block).unwrap();
        let CoreExprKind::Let { name, body, .. } = &core.kind else {
            panic!("expected outer let");
        };
        assert_eq!(name, "a");
        let CoreExprKind::Let { name, body, .. } = &body.kind else {
            panic!("expected inner let");
        };
        assert_eq!(name, "b");
        assert_eq!(body.kind, CoreExprKind::Var("b".into()));
    }

    #[test]
    fn while_lowers_to_letrec_driver() {
        let mut d = Desugarer::new();
        let w = Expr::new(
            ExprKind::While {
                cond: Box::new(var("c")),
                body: Box::new(var("step")),
            },
            loc(),
        );
        let core = d.desugar_expr(&w).unwrap();
        let CoreExprKind::LetRec { bindings, body } = &core.kind else {
            panic!("expected letrec");
        };
        assert_eq!(bindings.len(), 1);
        assert!(bindings[0].name.starts_with("$loop_"));
        // The letrec body invokes the driver with unit.
        let CoreExprKind::Apply { func, arg } = &body.kind else {
            panic!("expected driver call");
        };
        assert_eq!(func.kind, CoreExprKind::Var(bindings[0].name.clone()));
        assert_eq!(arg.kind, CoreExprKind::Lit(Literal::Unit));
    }

    #[test]
    fn or_pattern_duplicates_cases_sharing_body_and_guard() {
        let mut d = Desugarer::new();
        let m = Expr::new(
            ExprKind::Match {
                scrutinee: Box::new(var("v")),
                cases: vec![
                    MatchCase {
                        pattern: Pattern::new(
                            PatternKind::Or(vec![
                                Pattern::new(
                                    PatternKind::Variant { ctor: "A".into(), args: vec![] },
                                    loc(),
                                ),
                                Pattern::new(
                                    PatternKind::Variant { ctor: "B".into(), args: vec![] },
                                    loc(),
                                ),
                            ]),
                            loc(),
                        ),
                        guard: Some(var("g")),
                        body: int(1),
                    },
                    MatchCase {
                        pattern: Pattern::new(PatternKind::Wildcard, loc()),
                        guard: None,
                        body: int(0),
                    },
                ],
            },
            loc(),
        );
        let core = d.desugar_expr(&m).unwrap();
        let CoreExprKind::Match { cases, .. } = &core.kind else {
            panic!("expected match");
        };
        assert_eq!(cases.len(), 3);
        assert_eq!(
            cases[0].pattern.kind,
            CorePatternKind::Variant { ctor: "A".into(), args: vec![] }
        );
        assert_eq!(
            cases[1].pattern.kind,
            CorePatternKind::Variant { ctor: "B".into(), args: vec![] }
        );
        assert_eq!(cases[0].body, cases[1].body);
        assert_eq!(cases[0].guard, cases[1].guard);
        assert!(cases[0].guard.is_some());
    }

    #[test]
    fn or_pattern_with_consistent_bindings_expands() {
        // Some(x) | Ok(x) binds `x` in both alternatives; both expand.
        let p = Pattern::new(
            PatternKind::Or(vec![
                Pattern::new(
                    PatternKind::Variant {
                        ctor: "Some".into(),
                        args: vec![Pattern::new(PatternKind::Var("x".into()), loc())],
                    },
                    loc(),
                ),
                Pattern::new(
                    PatternKind::Variant {
                        ctor: "Ok".into(),
                        args: vec![Pattern::new(PatternKind::Var("x".into()), loc())],
                    },
                    loc(),
                ),
            ]),
            loc(),
        );
        let alts = expand_or_patterns(&p).unwrap();
        assert_eq!(alts.len(), 2);
    }

    #[test]
    fn or_pattern_binding_is_vf3002() {
        let bad = Pattern::new(
            PatternKind::Or(vec![
                Pattern::new(
                    PatternKind::Variant {
                        ctor: "Some".into(),
                        args: vec![Pattern::new(PatternKind::Var("x".into()), loc())],
                    },
                    loc(),
                ),
                Pattern::new(PatternKind::Variant { ctor: "None".into(), args: vec![] }, loc()),
            ]),
            loc(),
        );
        let err = expand_or_patterns(&bad).unwrap_err();
        assert_eq!(err.code, "VF3002");
        assert!(err.message.contains('x'));
    }

    #[test]
    fn nested_or_patterns_multiply_out() {
        // Pair(A | B, C | D) expands to four alternatives.
        let p = Pattern::new(
            PatternKind::Variant {
                ctor: "Pair".into(),
                args: vec![
                    Pattern::new(
                        PatternKind::Or(vec![
                            Pattern::new(
                                PatternKind::Variant { ctor: "A".into(), args: vec![] },
                                loc(),
                            ),
                            Pattern::new(
                                PatternKind::Variant { ctor: "B".into(), args: vec![] },
                                loc(),
                            ),
                        ]),
                        loc(),
                    ),
                    Pattern::new(
                        PatternKind::Or(vec![
                            Pattern::new(
                                PatternKind::Variant { ctor: "C".into(), args: vec![] },
                                loc(),
                            ),
                            Pattern::new(
                                PatternKind::Variant { ctor: "D".into(), args: vec![] },
                                loc(),
                            ),
                        ]),
                        loc(),
                    ),
                ],
            },
            loc(),
        );
        let alts = expand_or_patterns(&p).unwrap();
        assert_eq!(alts.len(), 4);
    }

    #[test]
    fn list_pattern_lowers_to_cons_nil() {
        let mut d = Desugarer::new();
        let p = Pattern::new(
            PatternKind::List {
                items: vec![Pattern::new(PatternKind::Var("h".into()), loc())],
                rest: Some("t".into()),
            },
            loc(),
        );
        let core = d.desugar_pattern(&p).unwrap();
        let CorePatternKind::Variant { ctor, args } = &core.kind else {
            panic!("expected variant pattern");
        };
        assert_eq!(ctor, "Cons");
        assert_eq!(args[0].kind, CorePatternKind::Var("h".into()));
        assert_eq!(args[1].kind, CorePatternKind::Var("t".into()));
    }

    #[test]
    fn annotated_pattern_is_stripped() {
        let mut d = Desugarer::new();
        let p = Pattern::new(
            PatternKind::Annotated {
                pat: Box::new(Pattern::new(PatternKind::Var("x".into()), loc())),
                ty: vibefun_ast::surface::TypeExpr::new(
                    vibefun_ast::surface::TypeExprKind::Const("Int".into()),
                    loc(),
                ),
            },
            loc(),
        );
        let core = d.desugar_pattern(&p).unwrap();
        assert_eq!(core.kind, CorePatternKind::Var("x".into()));
    }

    #[test]
    fn record_update_becomes_spread_record() {
        let mut d = Desugarer::new();
        let update = Expr::new(
            ExprKind::RecordUpdate {
                record: Box::new(var("base")),
                fields: vec![("x".into(), int(1))],
            },
            loc(),
        );
        let core = d.desugar_expr(&update).unwrap();
        let CoreExprKind::Record(items) = &core.kind else {
            panic!("expected record");
        };
        assert!(matches!(&items[0], CoreRecordItem::Spread(e) if e.kind == CoreExprKind::Var("base".into())));
        assert!(matches!(&items[1], CoreRecordItem::Field(name, _) if name == "x"));
    }

    #[test]
    fn locations_are_preserved() {
        let mut d = Desugarer::new();
        let at = Location::new("m.vf", 7, 3, 99);
        let pipe = Expr::new(
            ExprKind::BinOp {
                op: BinOp::Pipe,
                lhs: Box::new(Expr::new(ExprKind::Lit(Literal::Int(1)), at.clone())),
                rhs: Box::new(Expr::new(ExprKind::Var("f".into()), at.clone())),
            },
            at.clone(),
        );
        let core = d.desugar_expr(&pipe).unwrap();
        assert_eq!(core.loc, at);
    }

    #[test]
    fn desugaring_core_subset_is_identity_shaped() {
        // An expression already in the core subset maps to itself
        // structurally (modulo node identity).
        let mut d = Desugarer::new();
        let e = Expr::new(
            ExprKind::Lambda {
                params: vec![Pattern::new(PatternKind::Var("x".into()), loc())],
                body: Box::new(var("x")),
            },
            loc(),
        );
        let once = d.desugar_expr(&e).unwrap();
        let CoreExprKind::Lambda { param, body } = &once.kind else {
            panic!("expected lambda");
        };
        assert_eq!(param.kind, CorePatternKind::Var("x".into()));
        assert_eq!(body.kind, CoreExprKind::Var("x".into()));
    }
}
