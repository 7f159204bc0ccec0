//! Maranget's usefulness algorithm for exhaustiveness and redundancy
//! checking ("Warnings for Pattern Matching", 2007).
//!
//! Operates on an abstract pattern representation ([`Pat`]), not AST
//! nodes; the checker translates core patterns into `Pat` and supplies
//! type shapes through [`TypeShapeSource`]. The core predicate is
//! usefulness: a row is useful against a matrix if some value matches the
//! row and no row of the matrix. Exhaustiveness asks whether a wildcard
//! row is useful after all cases (and if so, builds a witness);
//! redundancy asks whether each case is useful given the cases before it.

use std::fmt;

use crate::ty::Type;

/// The kind of a literal pattern value. Bool and Unit literals are
/// translated to constructors before reaching this module, so only the
/// infinite-domain literals remain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LitKind {
    Int,
    Float,
    String,
}

/// Abstract pattern representation for the usefulness algorithm.
#[derive(Clone, Debug, PartialEq)]
pub enum Pat {
    /// Matches anything (wildcard or variable binding).
    Wildcard,
    /// A constructor with sub-patterns. Variant constructors, `true` /
    /// `false`, `()`, tuples, and records all take this form.
    Constructor { name: String, args: Vec<Pat> },
    /// A literal of an infinite domain (Int, Float, String).
    Literal { value: String, kind: LitKind },
}

impl Pat {
    fn ctor(name: impl Into<String>, args: Vec<Pat>) -> Pat {
        Pat::Constructor { name: name.into(), args }
    }

    /// The specialization key of this pattern's head, if it has one.
    fn head_key(&self) -> Option<&str> {
        match self {
            Pat::Wildcard => None,
            Pat::Constructor { name, .. } => Some(name),
            Pat::Literal { value, .. } => Some(value),
        }
    }
}

impl fmt::Display for Pat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pat::Wildcard => write!(f, "_"),
            Pat::Constructor { name, args } => {
                write!(f, "{name}")?;
                if !args.is_empty() {
                    write!(f, "(")?;
                    for (i, arg) in args.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{arg}")?;
                    }
                    write!(f, ")")?;
                }
                Ok(())
            }
            Pat::Literal { value, .. } => write!(f, "{value}"),
        }
    }
}

/// A constructor's signature: name and argument count.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CtorSig {
    pub name: String,
    pub arity: usize,
}

/// The shape of a column's type, as the algorithm needs it.
#[derive(Clone, Debug)]
pub enum TypeShape {
    /// A known, finite constructor set: variants, Bool (`true`/`false`),
    /// Unit (`()`), tuples and records (one constructor).
    Finite(Vec<CtorSig>),
    /// Int, Float, String: only a wildcard row covers these.
    Infinite,
    /// An unresolved type; treated like an infinite domain.
    Open,
}

/// Supplies type shapes and constructor argument types to the algorithm.
pub trait TypeShapeSource {
    fn shape(&self, ty: &Type) -> TypeShape;
    /// Argument types of `ctor` at this instance of `ty`, in pattern
    /// order. Called only for constructors the shape reported.
    fn ctor_args(&self, ty: &Type, ctor: &str) -> Vec<Type>;
}

/// The outcome of analyzing one `match`.
#[derive(Debug)]
pub struct MatchAnalysis {
    /// A witness value escaping every (unguarded) case, if any.
    pub missing: Option<Pat>,
    /// Indices of unreachable cases.
    pub redundant: Vec<usize>,
}

/// Analyze a match: `rows` are the cases in source order, each flagged
/// with whether it carries a guard. Guarded rows contribute no coverage
/// (their guard may fail) but are themselves checked for reachability.
pub fn analyze(
    rows: &[(Pat, bool)],
    scrutinee: &Type,
    source: &dyn TypeShapeSource,
) -> MatchAnalysis {
    let types = vec![scrutinee.clone()];

    let unguarded: Vec<Vec<Pat>> = rows
        .iter()
        .filter(|(_, guarded)| !guarded)
        .map(|(pat, _)| vec![pat.clone()])
        .collect();

    let missing = witness(&unguarded, &types, source).map(|mut w| {
        debug_assert_eq!(w.len(), 1);
        w.remove(0)
    });

    let mut redundant = Vec::new();
    let mut coverage: Vec<Vec<Pat>> = Vec::new();
    for (index, (pat, guarded)) in rows.iter().enumerate() {
        if !is_useful(&coverage, &[pat.clone()], &types, source) {
            redundant.push(index);
        }
        if !guarded {
            coverage.push(vec![pat.clone()]);
        }
    }

    MatchAnalysis { missing, redundant }
}

// ── Core recursion ──────────────────────────────────────────────────────

/// Find a value vector matched by no row, or `None` if the matrix covers
/// the column types completely.
fn witness(
    matrix: &[Vec<Pat>],
    types: &[Type],
    source: &dyn TypeShapeSource,
) -> Option<Vec<Pat>> {
    let Some(first_ty) = types.first() else {
        // No columns left: one empty value, matched iff any row remains.
        return if matrix.is_empty() { Some(Vec::new()) } else { None };
    };

    let shape = source.shape(first_ty);
    let heads: Vec<&str> = matrix.iter().filter_map(|row| row[0].head_key()).collect();

    let complete_sigs = match &shape {
        TypeShape::Finite(sigs) => {
            sigs.iter().all(|sig| heads.contains(&sig.name.as_str())).then_some(sigs)
        }
        TypeShape::Infinite | TypeShape::Open => None,
    };

    match complete_sigs {
        Some(sigs) => {
            // Every constructor appears; recurse into each specialization.
            for sig in sigs {
                let specialized = specialize(matrix, &sig.name, sig.arity);
                let mut rec_types = source.ctor_args(first_ty, &sig.name);
                rec_types.extend_from_slice(&types[1..]);
                if let Some(mut w) = witness(&specialized, &rec_types, source) {
                    let rest = w.split_off(sig.arity);
                    let mut out = vec![Pat::ctor(sig.name.clone(), w)];
                    out.extend(rest);
                    return Some(out);
                }
            }
            None
        }
        None => {
            // Some constructor is missing (or the domain is infinite):
            // only wildcard rows constrain the remaining columns.
            let default: Vec<Vec<Pat>> = matrix
                .iter()
                .filter(|row| matches!(row[0], Pat::Wildcard))
                .map(|row| row[1..].to_vec())
                .collect();
            let rest = witness(&default, &types[1..], source)?;

            let head = match &shape {
                TypeShape::Finite(sigs) => {
                    let sig = sigs
                        .iter()
                        .find(|sig| !heads.contains(&sig.name.as_str()))
                        .expect("an incomplete finite signature has a missing ctor");
                    Pat::ctor(sig.name.clone(), vec![Pat::Wildcard; sig.arity])
                }
                TypeShape::Infinite | TypeShape::Open => Pat::Wildcard,
            };

            let mut out = vec![head];
            out.extend(rest);
            Some(out)
        }
    }
}

/// Is `row` useful against `matrix`: does some value match `row` but no
/// matrix row?
fn is_useful(
    matrix: &[Vec<Pat>],
    row: &[Pat],
    types: &[Type],
    source: &dyn TypeShapeSource,
) -> bool {
    let Some(head) = row.first() else {
        return matrix.is_empty();
    };
    let first_ty = &types[0];

    match head {
        Pat::Constructor { name, args } => {
            let specialized = specialize(matrix, name, args.len());
            let mut rec_row = args.clone();
            rec_row.extend_from_slice(&row[1..]);
            let mut rec_types = source.ctor_args(first_ty, name);
            rec_types.extend_from_slice(&types[1..]);
            is_useful(&specialized, &rec_row, &rec_types, source)
        }
        Pat::Literal { value, .. } => {
            let specialized = specialize(matrix, value, 0);
            is_useful(&specialized, &row[1..], &types[1..], source)
        }
        Pat::Wildcard => {
            let heads: Vec<&str> =
                matrix.iter().filter_map(|r| r[0].head_key()).collect();
            let complete = match source.shape(first_ty) {
                TypeShape::Finite(sigs) => sigs
                    .iter()
                    .all(|sig| heads.contains(&sig.name.as_str()))
                    .then_some(sigs),
                TypeShape::Infinite | TypeShape::Open => None,
            };
            match complete {
                Some(sigs) => sigs.iter().any(|sig| {
                    let specialized = specialize(matrix, &sig.name, sig.arity);
                    let mut rec_row = vec![Pat::Wildcard; sig.arity];
                    rec_row.extend_from_slice(&row[1..]);
                    let mut rec_types = source.ctor_args(first_ty, &sig.name);
                    rec_types.extend_from_slice(&types[1..]);
                    is_useful(&specialized, &rec_row, &rec_types, source)
                }),
                None => {
                    let default: Vec<Vec<Pat>> = matrix
                        .iter()
                        .filter(|r| matches!(r[0], Pat::Wildcard))
                        .map(|r| r[1..].to_vec())
                        .collect();
                    is_useful(&default, &row[1..], &types[1..], source)
                }
            }
        }
    }
}

/// Specialize a matrix by a head constructor (or literal key): rows
/// starting with that constructor contribute their sub-patterns, wildcard
/// rows contribute fresh wildcards, everything else drops.
fn specialize(matrix: &[Vec<Pat>], key: &str, arity: usize) -> Vec<Vec<Pat>> {
    let mut out = Vec::new();
    for row in matrix {
        match &row[0] {
            Pat::Constructor { name, args } if name == key => {
                let mut new_row = args.clone();
                new_row.extend_from_slice(&row[1..]);
                out.push(new_row);
            }
            Pat::Literal { value, .. } if value == key => {
                out.push(row[1..].to_vec());
            }
            Pat::Wildcard => {
                let mut new_row = vec![Pat::Wildcard; arity];
                new_row.extend_from_slice(&row[1..]);
                out.push(new_row);
            }
            _ => {}
        }
    }
    out
}

// ── Tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use rustc_hash::FxHashMap;

    /// Fixed-shape source for the tests: Shape = Circle(Float) | Point,
    /// plus Bool, Unit, Option<Shape>, and Int.
    struct FixedShapes;

    impl TypeShapeSource for FixedShapes {
        fn shape(&self, ty: &Type) -> TypeShape {
            match ty {
                Type::Const(name) if name == "Bool" => TypeShape::Finite(vec![
                    CtorSig { name: "true".into(), arity: 0 },
                    CtorSig { name: "false".into(), arity: 0 },
                ]),
                Type::Const(name) if name == "Unit" => {
                    TypeShape::Finite(vec![CtorSig { name: "()".into(), arity: 0 }])
                }
                Type::Const(name) if name == "Int" => TypeShape::Infinite,
                Type::Variant { name, .. } if name == "Shape" => TypeShape::Finite(vec![
                    CtorSig { name: "Circle".into(), arity: 1 },
                    CtorSig { name: "Point".into(), arity: 0 },
                ]),
                Type::Variant { name, .. } if name == "Option" => TypeShape::Finite(vec![
                    CtorSig { name: "None".into(), arity: 0 },
                    CtorSig { name: "Some".into(), arity: 1 },
                ]),
                Type::Variant { name, .. } if name == "List" => TypeShape::Finite(vec![
                    CtorSig { name: "Nil".into(), arity: 0 },
                    CtorSig { name: "Cons".into(), arity: 2 },
                ]),
                _ => TypeShape::Open,
            }
        }

        fn ctor_args(&self, ty: &Type, ctor: &str) -> Vec<Type> {
            let mut table: FxHashMap<&str, Vec<Type>> = FxHashMap::default();
            table.insert("Circle", vec![Type::float()]);
            table.insert("Point", vec![]);
            table.insert("None", vec![]);
            table.insert("true", vec![]);
            table.insert("false", vec![]);
            table.insert("()", vec![]);
            match (ty, ctor) {
                (Type::Variant { args, .. }, "Some") => vec![args[0].clone()],
                (Type::Variant { args, .. }, "Cons") => {
                    vec![args[0].clone(), Type::list(args[0].clone())]
                }
                _ => table.remove(ctor).unwrap_or_default(),
            }
        }
    }

    fn shape_ty() -> Type {
        Type::Variant { name: "Shape".into(), args: vec![] }
    }

    fn option_shape() -> Type {
        Type::Variant { name: "Option".into(), args: vec![shape_ty()] }
    }

    fn lit_int(n: i64) -> Pat {
        Pat::Literal { value: n.to_string(), kind: LitKind::Int }
    }

    fn bool_ctor(b: bool) -> Pat {
        Pat::ctor(b.to_string(), vec![])
    }

    fn run(rows: &[Pat], ty: &Type) -> MatchAnalysis {
        let rows: Vec<(Pat, bool)> = rows.iter().cloned().map(|p| (p, false)).collect();
        analyze(&rows, ty, &FixedShapes)
    }

    // ── Exhaustiveness ───────────────────────────────────────────────

    #[test]
    fn bool_both_literals_exhaustive() {
        let analysis = run(&[bool_ctor(true), bool_ctor(false)], &Type::bool());
        assert!(analysis.missing.is_none());
    }

    #[test]
    fn bool_single_literal_non_exhaustive() {
        let analysis = run(&[bool_ctor(true)], &Type::bool());
        assert_eq!(analysis.missing.unwrap().to_string(), "false");
    }

    #[test]
    fn wildcard_always_exhaustive() {
        let analysis = run(&[Pat::Wildcard], &shape_ty());
        assert!(analysis.missing.is_none());
    }

    #[test]
    fn sum_type_all_ctors_exhaustive() {
        let analysis = run(
            &[
                Pat::ctor("Circle", vec![Pat::Wildcard]),
                Pat::ctor("Point", vec![]),
            ],
            &shape_ty(),
        );
        assert!(analysis.missing.is_none());
    }

    #[test]
    fn sum_type_missing_ctor_witnessed() {
        let analysis = run(&[Pat::ctor("Circle", vec![Pat::Wildcard])], &shape_ty());
        assert_eq!(analysis.missing.unwrap().to_string(), "Point");
    }

    #[test]
    fn nested_missing_case_witnessed() {
        // match opt { Some(Circle(_)) => .., None => .. }  -- missing Some(Point)
        let analysis = run(
            &[
                Pat::ctor("Some", vec![Pat::ctor("Circle", vec![Pat::Wildcard])]),
                Pat::ctor("None", vec![]),
            ],
            &option_shape(),
        );
        assert_eq!(analysis.missing.unwrap().to_string(), "Some(Point)");
    }

    #[test]
    fn option_missing_none_witnessed() {
        let analysis = run(
            &[Pat::ctor("Some", vec![Pat::Wildcard])],
            &option_shape(),
        );
        assert_eq!(analysis.missing.unwrap().to_string(), "None");
    }

    #[test]
    fn int_literals_never_exhaustive() {
        let analysis = run(&[lit_int(1), lit_int(2)], &Type::int());
        assert_eq!(analysis.missing.unwrap().to_string(), "_");
    }

    #[test]
    fn int_with_wildcard_exhaustive() {
        let analysis = run(&[lit_int(1), lit_int(2), Pat::Wildcard], &Type::int());
        assert!(analysis.missing.is_none());
    }

    #[test]
    fn unit_single_ctor_exhaustive() {
        let analysis = run(&[Pat::ctor("()", vec![])], &Type::unit());
        assert!(analysis.missing.is_none());
    }

    #[test]
    fn list_unrolls_as_needed() {
        // match xs { Nil => .., Cons(_, Nil) => .. } -- missing Cons(_, Cons(_, _))
        let list_int = Type::list(Type::int());
        let analysis = run(
            &[
                Pat::ctor("Nil", vec![]),
                Pat::ctor("Cons", vec![Pat::Wildcard, Pat::ctor("Nil", vec![])]),
            ],
            &list_int,
        );
        assert_eq!(
            analysis.missing.unwrap().to_string(),
            "Cons(_, Cons(_, _))"
        );
    }

    // ── Redundancy ───────────────────────────────────────────────────

    #[test]
    fn case_after_wildcard_is_redundant() {
        let analysis = run(
            &[Pat::Wildcard, Pat::ctor("Circle", vec![Pat::Wildcard])],
            &shape_ty(),
        );
        assert_eq!(analysis.redundant, vec![1]);
    }

    #[test]
    fn duplicate_case_is_redundant() {
        let analysis = run(
            &[
                Pat::ctor("Circle", vec![Pat::Wildcard]),
                Pat::ctor("Circle", vec![Pat::Wildcard]),
                Pat::ctor("Point", vec![]),
            ],
            &shape_ty(),
        );
        assert_eq!(analysis.redundant, vec![1]);
    }

    #[test]
    fn wildcard_after_all_ctors_is_redundant() {
        let analysis = run(
            &[
                Pat::ctor("Circle", vec![Pat::Wildcard]),
                Pat::ctor("Point", vec![]),
                Pat::Wildcard,
            ],
            &shape_ty(),
        );
        assert_eq!(analysis.redundant, vec![2]);
    }

    #[test]
    fn duplicate_int_literal_redundant() {
        let analysis = run(&[lit_int(1), lit_int(1), Pat::Wildcard], &Type::int());
        assert_eq!(analysis.redundant, vec![1]);
    }

    #[test]
    fn no_false_redundancy() {
        let analysis = run(
            &[
                Pat::ctor("Circle", vec![Pat::Wildcard]),
                Pat::ctor("Point", vec![]),
            ],
            &shape_ty(),
        );
        assert!(analysis.redundant.is_empty());
    }

    // ── Guards ───────────────────────────────────────────────────────

    #[test]
    fn guarded_case_contributes_no_coverage() {
        // match b { true if g => .., false => .. } -- true is not covered
        let rows = vec![(bool_ctor(true), true), (bool_ctor(false), false)];
        let analysis = analyze(&rows, &Type::bool(), &FixedShapes);
        assert_eq!(analysis.missing.unwrap().to_string(), "true");
    }

    #[test]
    fn case_behind_guarded_case_is_not_redundant() {
        let rows = vec![
            (bool_ctor(true), true),
            (bool_ctor(true), false),
            (bool_ctor(false), false),
        ];
        let analysis = analyze(&rows, &Type::bool(), &FixedShapes);
        assert!(analysis.redundant.is_empty());
        assert!(analysis.missing.is_none());
    }
}
