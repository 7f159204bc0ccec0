//! Type environments: the scoped value environment, the type-definition
//! table, and the constructor table.
//!
//! The value environment is a scope stack; entering a function or let body
//! pushes a frame and lookups search innermost-outward. Bindings are plain
//! values with schemes, externals (scheme plus JS name and source module),
//! or overloaded externals resolved by arity at call sites.

use rustc_hash::FxHashMap;
use vibefun_ast::surface::TypeExpr;

use crate::ty::Scheme;

/// One `external` alternative: its scheme plus JS binding data.
#[derive(Clone, Debug)]
pub struct ExternalBinding {
    pub scheme: Scheme,
    pub js_name: String,
    pub from_module: Option<String>,
    /// Parameter count, used for overload resolution by arity.
    pub arity: usize,
}

/// A name binding in the value environment.
#[derive(Clone, Debug)]
pub enum Binding {
    Value(Scheme),
    External(ExternalBinding),
    /// Alternatives sharing one name and JS target, distinguished by
    /// arity at the call site.
    ExternalOverload(Vec<ExternalBinding>),
}

/// The scoped value environment.
pub struct TypeEnv {
    /// Index 0 is the module-global scope.
    scopes: Vec<FxHashMap<String, Binding>>,
}

impl TypeEnv {
    /// Create an environment with one empty global scope.
    pub fn new() -> Self {
        TypeEnv { scopes: vec![FxHashMap::default()] }
    }

    /// Push a new empty scope.
    pub fn push_scope(&mut self) {
        self.scopes.push(FxHashMap::default());
    }

    /// Pop the top scope.
    ///
    /// # Panics
    ///
    /// Panics when only the global scope remains.
    pub fn pop_scope(&mut self) {
        assert!(self.scopes.len() > 1, "cannot pop the global scope");
        self.scopes.pop();
    }

    /// Insert into the current (topmost) scope.
    pub fn insert(&mut self, name: String, binding: Binding) {
        self.scopes
            .last_mut()
            .expect("scope stack is never empty")
            .insert(name, binding);
    }

    /// Insert a plain value scheme into the current scope.
    pub fn insert_value(&mut self, name: String, scheme: Scheme) {
        self.insert(name, Binding::Value(scheme));
    }

    /// Look up a name, innermost scope first.
    pub fn lookup(&self, name: &str) -> Option<&Binding> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    /// The global (module-level) scope's bindings.
    pub fn globals(&self) -> &FxHashMap<String, Binding> {
        &self.scopes[0]
    }

    /// Number of scopes on the stack.
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }
}

impl Default for TypeEnv {
    fn default() -> Self {
        Self::new()
    }
}

// ── Type definitions ────────────────────────────────────────────────────

/// One registered type declaration. Field and constructor types stay as
/// surface type expressions; they are converted (with the parameter
/// mapping) at each use site.
#[derive(Clone, Debug)]
pub enum TypeDef {
    Alias {
        params: Vec<String>,
        ty: TypeExpr,
    },
    Record {
        params: Vec<String>,
        fields: Vec<(String, TypeExpr)>,
    },
    Variant {
        params: Vec<String>,
        ctors: Vec<(String, Vec<TypeExpr>)>,
    },
    /// An opaque type that exists only on the JS side (e.g. `Promise`),
    /// registered implicitly from external declaration signatures.
    External { arity: usize },
}

impl TypeDef {
    /// The declaration's type-parameter count.
    pub fn arity(&self) -> usize {
        match self {
            TypeDef::Alias { params, .. }
            | TypeDef::Record { params, .. }
            | TypeDef::Variant { params, .. } => params.len(),
            TypeDef::External { arity } => *arity,
        }
    }
}

/// One variant constructor's registration.
#[derive(Clone, Debug)]
pub struct CtorInfo {
    /// The owning variant type's name.
    pub type_name: String,
    /// The owning type's parameters.
    pub type_params: Vec<String>,
    /// Argument types as declared (may reference the type parameters).
    pub args: Vec<TypeExpr>,
}

/// The type-definition table plus the constructor index.
#[derive(Debug, Default)]
pub struct TypeDefs {
    defs: FxHashMap<String, TypeDef>,
    ctors: FxHashMap<String, CtorInfo>,
}

impl TypeDefs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a type declaration; variant constructors index themselves.
    pub fn insert(&mut self, name: String, def: TypeDef) {
        if let TypeDef::Variant { params, ctors } = &def {
            for (ctor_name, args) in ctors {
                self.ctors.insert(
                    ctor_name.clone(),
                    CtorInfo {
                        type_name: name.clone(),
                        type_params: params.clone(),
                        args: args.clone(),
                    },
                );
            }
        }
        self.defs.insert(name, def);
    }

    pub fn lookup(&self, name: &str) -> Option<&TypeDef> {
        self.defs.get(name)
    }

    pub fn lookup_ctor(&self, name: &str) -> Option<&CtorInfo> {
        self.ctors.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.defs.contains_key(name)
    }

    /// Record declarations that contain the given field name, for the
    /// nominal lookup used by field access on not-yet-known record types.
    pub fn records_with_field(&self, field: &str) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .defs
            .iter()
            .filter(|(_, def)| match def {
                TypeDef::Record { fields, .. } => fields.iter().any(|(f, _)| f == field),
                _ => false,
            })
            .map(|(name, _)| name.as_str())
            .collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ty::Type;
    use vibefun_ast::surface::TypeExprKind;
    use vibefun_common::Location;

    fn loc() -> Location {
        Location::new("t.vf", 1, 1, 0)
    }

    #[test]
    fn lookup_searches_outward() {
        let mut env = TypeEnv::new();
        env.insert_value("x".into(), Scheme::mono(Type::int()));

        env.push_scope();
        assert!(env.lookup("x").is_some());
        assert!(env.lookup("y").is_none());
    }

    #[test]
    fn shadowing_and_scope_pop() {
        let mut env = TypeEnv::new();
        env.insert_value("x".into(), Scheme::mono(Type::int()));

        env.push_scope();
        env.insert_value("x".into(), Scheme::mono(Type::string()));
        match env.lookup("x") {
            Some(Binding::Value(scheme)) => assert_eq!(scheme.ty, Type::string()),
            other => panic!("unexpected binding: {other:?}"),
        }

        env.pop_scope();
        match env.lookup("x") {
            Some(Binding::Value(scheme)) => assert_eq!(scheme.ty, Type::int()),
            other => panic!("unexpected binding: {other:?}"),
        }
    }

    #[test]
    #[should_panic(expected = "cannot pop the global scope")]
    fn popping_global_scope_panics() {
        let mut env = TypeEnv::new();
        env.pop_scope();
    }

    #[test]
    fn variant_registration_indexes_ctors() {
        let mut defs = TypeDefs::new();
        defs.insert(
            "Shape".into(),
            TypeDef::Variant {
                params: vec![],
                ctors: vec![
                    (
                        "Circle".into(),
                        vec![TypeExpr::new(TypeExprKind::Const("Float".into()), loc())],
                    ),
                    ("Point".into(), vec![]),
                ],
            },
        );

        let circle = defs.lookup_ctor("Circle").expect("Circle is registered");
        assert_eq!(circle.type_name, "Shape");
        assert_eq!(circle.args.len(), 1);
        assert!(defs.lookup_ctor("Square").is_none());
    }

    #[test]
    fn records_with_field_sorted() {
        let mut defs = TypeDefs::new();
        defs.insert(
            "B".into(),
            TypeDef::Record {
                params: vec![],
                fields: vec![("x".into(), TypeExpr::new(TypeExprKind::Const("Int".into()), loc()))],
            },
        );
        defs.insert(
            "A".into(),
            TypeDef::Record {
                params: vec![],
                fields: vec![("x".into(), TypeExpr::new(TypeExprKind::Const("Int".into()), loc()))],
            },
        );
        assert_eq!(defs.records_with_field("x"), vec!["A", "B"]);
        assert!(defs.records_with_field("missing").is_empty());
    }
}
