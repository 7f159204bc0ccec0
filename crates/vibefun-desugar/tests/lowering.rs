//! Module-level lowering tests: declaration grouping and the match-case
//! expansion behavior the checker depends on.

use vibefun_ast::core::{CoreDecl, CoreExprKind, CorePatternKind};
use vibefun_ast::surface::{
    BinOp, Decl, Expr, ExprKind, LetDecl, Literal, MatchCase, Module, Pattern, PatternKind,
};
use vibefun_common::Location;
use vibefun_desugar::Desugarer;

fn loc() -> Location {
    Location::new("m.vf", 1, 1, 0)
}

fn var(name: &str) -> Expr {
    Expr::new(ExprKind::Var(name.into()), loc())
}

fn int(n: i64) -> Expr {
    Expr::new(ExprKind::Lit(Literal::Int(n)), loc())
}

fn let_decl(name: &str, rec: bool, value: Expr) -> Decl {
    Decl::Let(LetDecl {
        name: name.into(),
        rec,
        mutable: false,
        annotation: None,
        value,
        loc: loc(),
    })
}

#[test]
fn consecutive_rec_lets_form_one_group() {
    let module = Module {
        path: "/m.vf".into(),
        decls: vec![
            let_decl("a", false, int(1)),
            let_decl("f", true, var("g")),
            let_decl("g", true, var("f")),
            let_decl("b", false, int(2)),
        ],
    };
    let core = Desugarer::new().desugar_module(&module).unwrap();

    assert_eq!(core.decls.len(), 3);
    assert!(matches!(&core.decls[0], CoreDecl::Let(d) if d.name == "a"));
    match &core.decls[1] {
        CoreDecl::LetRec(group) => {
            let names: Vec<&str> = group.iter().map(|d| d.name.as_str()).collect();
            assert_eq!(names, vec!["f", "g"]);
        }
        other => panic!("expected a rec group, got {other:?}"),
    }
    assert!(matches!(&core.decls[2], CoreDecl::Let(d) if d.name == "b"));
}

#[test]
fn separated_rec_lets_do_not_group() {
    let module = Module {
        path: "/m.vf".into(),
        decls: vec![
            let_decl("f", true, int(1)),
            let_decl("x", false, int(2)),
            let_decl("g", true, int(3)),
        ],
    };
    let core = Desugarer::new().desugar_module(&module).unwrap();

    assert_eq!(core.decls.len(), 3);
    assert!(matches!(&core.decls[0], CoreDecl::LetRec(g) if g.len() == 1));
    assert!(matches!(&core.decls[1], CoreDecl::Let(_)));
    assert!(matches!(&core.decls[2], CoreDecl::LetRec(g) if g.len() == 1));
}

#[test]
fn or_pattern_with_shared_binding_duplicates_the_case() {
    // match v { Some(x) | Ok(x) => x + 1, _ => 0 }
    let some_x = Pattern::new(
        PatternKind::Variant {
            ctor: "Some".into(),
            args: vec![Pattern::new(PatternKind::Var("x".into()), loc())],
        },
        loc(),
    );
    let ok_x = Pattern::new(
        PatternKind::Variant {
            ctor: "Ok".into(),
            args: vec![Pattern::new(PatternKind::Var("x".into()), loc())],
        },
        loc(),
    );
    let module = Module {
        path: "/m.vf".into(),
        decls: vec![let_decl(
            "f",
            false,
            Expr::new(
                ExprKind::Match {
                    scrutinee: Box::new(var("v")),
                    cases: vec![
                        MatchCase {
                            pattern: Pattern::new(PatternKind::Or(vec![some_x, ok_x]), loc()),
                            guard: None,
                            body: Expr::new(
                                ExprKind::BinOp {
                                    op: BinOp::Add,
                                    lhs: Box::new(var("x")),
                                    rhs: Box::new(int(1)),
                                },
                                loc(),
                            ),
                        },
                        MatchCase {
                            pattern: Pattern::new(PatternKind::Wildcard, loc()),
                            guard: None,
                            body: int(0),
                        },
                    ],
                },
                loc(),
            ),
        )],
    };

    let core = Desugarer::new().desugar_module(&module).unwrap();
    let CoreDecl::Let(decl) = &core.decls[0] else {
        panic!("expected a let declaration");
    };
    let CoreExprKind::Match { cases, .. } = &decl.value.kind else {
        panic!("expected a match, got {:?}", decl.value.kind);
    };

    assert_eq!(cases.len(), 3, "two expanded alternatives plus the wildcard");
    assert!(
        matches!(&cases[0].pattern.kind, CorePatternKind::Variant { ctor, .. } if ctor == "Some")
    );
    assert!(
        matches!(&cases[1].pattern.kind, CorePatternKind::Variant { ctor, .. } if ctor == "Ok")
    );
    assert_eq!(cases[0].body, cases[1].body, "alternatives share the body");

    // Both expanded patterns bind x.
    let mut names = Vec::new();
    cases[0].pattern.bound_names(&mut names);
    assert_eq!(names, vec!["x".to_string()]);
}
