//! Built-in types and values registered before any module is checked.
//!
//! The desugarer lowers list syntax to `Cons`/`Nil` applications and list
//! spreads to `concat`, and the `ref`/`!`/`:=` family needs `Ref<T>`, so
//! these exist in every compilation session. `Option` and `Result` are
//! built in as well; their constructors are ordinary polymorphic
//! functions, like every user-declared constructor.

use vibefun_ast::surface::{TypeExpr, TypeExprKind};
use vibefun_common::Location;

use crate::env::{Binding, TypeDefs, TypeEnv};
use crate::ty::{Scheme, Type, TyVar};

/// Register the built-in type declarations.
pub fn register_types(defs: &mut TypeDefs) {
    let loc = Location::none("<builtin>");
    let var = |name: &str| TypeExpr::new(TypeExprKind::Var(name.into()), loc.clone());
    let list_a = TypeExpr::new(
        TypeExprKind::App { ctor: "List".into(), args: vec![var("a")] },
        loc.clone(),
    );

    defs.insert(
        "List".into(),
        crate::env::TypeDef::Variant {
            params: vec!["a".into()],
            ctors: vec![
                ("Nil".into(), vec![]),
                ("Cons".into(), vec![var("a"), list_a]),
            ],
        },
    );
    defs.insert(
        "Option".into(),
        crate::env::TypeDef::Variant {
            params: vec!["a".into()],
            ctors: vec![("None".into(), vec![]), ("Some".into(), vec![var("a")])],
        },
    );
    defs.insert(
        "Result".into(),
        crate::env::TypeDef::Variant {
            params: vec!["a".into(), "e".into()],
            ctors: vec![("Ok".into(), vec![var("a")]), ("Err".into(), vec![var("e")])],
        },
    );
    defs.insert("Ref".into(), crate::env::TypeDef::External { arity: 1 });
}

/// Register the built-in value bindings.
///
/// Schemes here are written with explicit quantified variables; the ids
/// are local to each scheme and freshened at instantiation.
pub fn register_values(env: &mut TypeEnv) {
    let a = TyVar(0);

    // ref : (a) -> Ref<a>
    env.insert(
        "ref".into(),
        Binding::Value(Scheme {
            vars: vec![a],
            ty: Type::fun(vec![Type::Var(a)], Type::reference(Type::Var(a))),
        }),
    );

    // concat : (List<a>) -> (List<a>) -> List<a>, curried like every
    // desugared application target.
    env.insert(
        "concat".into(),
        Binding::Value(Scheme {
            vars: vec![a],
            ty: Type::fun(
                vec![Type::list(Type::Var(a))],
                Type::fun(vec![Type::list(Type::Var(a))], Type::list(Type::Var(a))),
            ),
        }),
    );
}
