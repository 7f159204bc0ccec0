//! Type representation for the Vibefun type system.
//!
//! Defines the internal `Type` enum, type variables (`TyVar`), and
//! polymorphic type schemes (`Scheme`). Internal types are distinct from
//! surface type expressions: annotations are converted into these during
//! checking.

use std::collections::BTreeMap;
use std::fmt;

use rustc_hash::FxHashMap;

/// A type variable, identified by a `u32` index into the unification table.
///
/// Variables are created during inference at a fixed level and unified with
/// concrete types or other variables; the `ena` crate handles the
/// union-find mechanics.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TyVar(pub u32);

/// A Vibefun type.
///
/// - `Var`: an inference variable (resolved by unification)
/// - `Const`: a base type constant (Int, String, Bool, ...)
/// - `Fun`: a function type
/// - `App`: an opaque type constructor applied to arguments (`Ref<Int>`,
///   external `Promise<Response>`)
/// - `Record`: a closed record; fields compare by name, order irrelevant
/// - `Variant`: a nominal variant type; identity is the declaration name
/// - `Union`: an alternative set, used by external signatures
/// - `Tuple`: a tuple type
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Type {
    Var(TyVar),
    Const(String),
    Fun(Vec<Type>, Box<Type>),
    App(Box<Type>, Vec<Type>),
    Record(BTreeMap<String, Type>),
    Variant { name: String, args: Vec<Type> },
    Union(Vec<Type>),
    Tuple(Vec<Type>),
}

impl Type {
    pub fn int() -> Type {
        Type::Const("Int".into())
    }

    pub fn float() -> Type {
        Type::Const("Float".into())
    }

    pub fn string() -> Type {
        Type::Const("String".into())
    }

    pub fn bool() -> Type {
        Type::Const("Bool".into())
    }

    pub fn unit() -> Type {
        Type::Const("Unit".into())
    }

    /// A function type. Curried chains use one parameter per link.
    pub fn fun(params: Vec<Type>, ret: Type) -> Type {
        Type::Fun(params, Box::new(ret))
    }

    /// The built-in `List<T>` variant type.
    pub fn list(inner: Type) -> Type {
        Type::Variant { name: "List".into(), args: vec![inner] }
    }

    /// The built-in `Option<T>` variant type.
    pub fn option(inner: Type) -> Type {
        Type::Variant { name: "Option".into(), args: vec![inner] }
    }

    /// The built-in `Result<T, E>` variant type.
    pub fn result(ok: Type, err: Type) -> Type {
        Type::Variant { name: "Result".into(), args: vec![ok, err] }
    }

    /// The built-in mutable reference type `Ref<T>`.
    pub fn reference(inner: Type) -> Type {
        Type::App(Box::new(Type::Const("Ref".into())), vec![inner])
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Var(v) => write!(f, "?{}", v.0),
            Type::Const(name) => write!(f, "{name}"),
            Type::Fun(params, ret) => {
                write!(f, "(")?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{p}")?;
                }
                write!(f, ") -> {ret}")
            }
            Type::App(ctor, args) => {
                write!(f, "{ctor}")?;
                write_type_args(f, args)
            }
            Type::Record(fields) => {
                write!(f, "{{")?;
                for (i, (name, ty)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{name}: {ty}")?;
                }
                write!(f, "}}")
            }
            Type::Variant { name, args } => {
                write!(f, "{name}")?;
                write_type_args(f, args)
            }
            Type::Union(alts) => {
                for (i, alt) in alts.iter().enumerate() {
                    if i > 0 {
                        write!(f, " | ")?;
                    }
                    write!(f, "{alt}")?;
                }
                Ok(())
            }
            Type::Tuple(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ")")
            }
        }
    }
}

fn write_type_args(f: &mut fmt::Formatter<'_>, args: &[Type]) -> fmt::Result {
    if !args.is_empty() {
        write!(f, "<")?;
        for (i, arg) in args.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{arg}")?;
        }
        write!(f, ">")?;
    }
    Ok(())
}

/// A polymorphic type scheme: a type with universally quantified variables.
///
/// The type of `identity` is `forall a. (a) -> a`, represented as
/// `Scheme { vars: [a], ty: Fun([Var(a)], Var(a)) }`. Unquantified
/// variables remain free and subject to further unification.
#[derive(Clone, Debug)]
pub struct Scheme {
    /// The quantified (generic) type variables.
    pub vars: Vec<TyVar>,
    /// The underlying type (may reference vars).
    pub ty: Type,
}

impl Scheme {
    /// Create a monomorphic scheme (no quantified variables).
    pub fn mono(ty: Type) -> Self {
        Scheme { vars: Vec::new(), ty }
    }

    /// Create a self-contained scheme from a resolved type by collecting
    /// its free variables and remapping them to sequential ids from 0.
    ///
    /// This makes the scheme independent of any particular inference
    /// context's unification table, which is what cross-module export
    /// needs: without normalization, variable ids from the exporting
    /// module would index out of bounds in the importing module's table.
    pub fn normalize_from_ty(ty: Type) -> Self {
        let mut seen: Vec<TyVar> = Vec::new();
        collect_free_vars(&ty, &mut seen);
        if seen.is_empty() {
            return Scheme { vars: Vec::new(), ty };
        }
        let mut mapping: FxHashMap<TyVar, TyVar> = FxHashMap::default();
        let mut vars = Vec::new();
        for var in &seen {
            if !mapping.contains_key(var) {
                let fresh = TyVar(mapping.len() as u32);
                mapping.insert(*var, fresh);
                vars.push(fresh);
            }
        }
        let ty = remap_vars(&ty, &mapping);
        Scheme { vars, ty }
    }
}

/// Collect all variable references in a type, in order of first appearance.
fn collect_free_vars(ty: &Type, out: &mut Vec<TyVar>) {
    match ty {
        Type::Var(v) => out.push(*v),
        Type::Const(_) => {}
        Type::Fun(params, ret) => {
            for p in params {
                collect_free_vars(p, out);
            }
            collect_free_vars(ret, out);
        }
        Type::App(ctor, args) => {
            collect_free_vars(ctor, out);
            for a in args {
                collect_free_vars(a, out);
            }
        }
        Type::Record(fields) => {
            for ty in fields.values() {
                collect_free_vars(ty, out);
            }
        }
        Type::Variant { args, .. } => {
            for a in args {
                collect_free_vars(a, out);
            }
        }
        Type::Union(alts) => {
            for a in alts {
                collect_free_vars(a, out);
            }
        }
        Type::Tuple(items) => {
            for item in items {
                collect_free_vars(item, out);
            }
        }
    }
}

/// Remap variable ids in a type according to the given mapping.
fn remap_vars(ty: &Type, mapping: &FxHashMap<TyVar, TyVar>) -> Type {
    match ty {
        Type::Var(v) => match mapping.get(v) {
            Some(new) => Type::Var(*new),
            None => ty.clone(),
        },
        Type::Const(_) => ty.clone(),
        Type::Fun(params, ret) => Type::Fun(
            params.iter().map(|p| remap_vars(p, mapping)).collect(),
            Box::new(remap_vars(ret, mapping)),
        ),
        Type::App(ctor, args) => Type::App(
            Box::new(remap_vars(ctor, mapping)),
            args.iter().map(|a| remap_vars(a, mapping)).collect(),
        ),
        Type::Record(fields) => Type::Record(
            fields
                .iter()
                .map(|(name, ty)| (name.clone(), remap_vars(ty, mapping)))
                .collect(),
        ),
        Type::Variant { name, args } => Type::Variant {
            name: name.clone(),
            args: args.iter().map(|a| remap_vars(a, mapping)).collect(),
        },
        Type::Union(alts) => {
            Type::Union(alts.iter().map(|a| remap_vars(a, mapping)).collect())
        }
        Type::Tuple(items) => {
            Type::Tuple(items.iter().map(|i| remap_vars(i, mapping)).collect())
        }
    }
}

// ── ena trait implementations ──────────────────────────────────────────

impl ena::unify::UnifyKey for TyVar {
    type Value = Option<Type>;

    fn index(&self) -> u32 {
        self.0
    }

    fn from_index(u: u32) -> Self {
        TyVar(u)
    }

    fn tag() -> &'static str {
        "TyVar"
    }
}

impl ena::unify::EqUnifyValue for Type {}
