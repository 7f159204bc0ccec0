//! Type errors with source locations and their mapping onto coded
//! diagnostics.
//!
//! Every error carries the original source location (desugaring preserved
//! them), so diagnostics point at user-written syntax. Severity and phase
//! come from the registry definition of each code.

use std::fmt;

use vibefun_common::{registry, Diagnostic, Location};

use crate::ty::{Type, TyVar};

/// A type error encountered during checking.
#[derive(Clone, Debug)]
pub enum TypeError {
    /// Two types that should be equal are not.
    Mismatch {
        expected: Type,
        found: Type,
        loc: Location,
    },
    /// A type variable occurs in its own definition (infinite type).
    InfiniteType {
        var: TyVar,
        ty: Type,
        loc: Location,
    },
    /// Wrong number of arguments or type parameters.
    ArityMismatch {
        expected: usize,
        found: usize,
        loc: Location,
    },
    /// A variable is used but not bound in any scope.
    UnboundVariable { name: String, loc: Location },
    /// A capitalized name is not a known constructor.
    UnboundConstructor { name: String, loc: Location },
    /// A match does not cover every value of the scrutinee's type.
    NonExhaustiveMatch {
        scrutinee_type: String,
        witness: String,
        loc: Location,
    },
    /// A match case is unreachable (warning).
    RedundantCase { index: usize, loc: Location },
    /// No alternative of an overloaded external matches the call arity.
    NoMatchingOverload {
        name: String,
        found: usize,
        candidates: Vec<usize>,
        loc: Location,
    },
    /// Field access on a type lacking that field.
    UnknownField {
        ty: String,
        field: String,
        loc: Location,
    },
    /// A type annotation names an undeclared type.
    UnknownTypeName { name: String, loc: Location },
    /// A name imported from a module the target does not export.
    ImportNotExported {
        name: String,
        module: String,
        loc: Location,
    },
    /// A name exported more than once from one module.
    DuplicateExport { name: String, loc: Location },
    /// Two wildcard re-exports bring in the same name.
    ReexportConflict {
        name: String,
        first: String,
        second: String,
        loc: Location,
    },
}

impl TypeError {
    /// The location the error points at.
    pub fn location(&self) -> &Location {
        match self {
            TypeError::Mismatch { loc, .. }
            | TypeError::InfiniteType { loc, .. }
            | TypeError::ArityMismatch { loc, .. }
            | TypeError::UnboundVariable { loc, .. }
            | TypeError::UnboundConstructor { loc, .. }
            | TypeError::NonExhaustiveMatch { loc, .. }
            | TypeError::RedundantCase { loc, .. }
            | TypeError::NoMatchingOverload { loc, .. }
            | TypeError::UnknownField { loc, .. }
            | TypeError::UnknownTypeName { loc, .. }
            | TypeError::ImportNotExported { loc, .. }
            | TypeError::DuplicateExport { loc, .. }
            | TypeError::ReexportConflict { loc, .. } => loc,
        }
    }

    /// Convert into a registry-coded diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let loc = self.location().clone();
        match self {
            TypeError::Mismatch { expected, found, .. } => registry::create(
                "VF4001",
                loc,
                &[("expected", &expected.to_string()), ("found", &found.to_string())],
            ),
            TypeError::InfiniteType { var, ty, .. } => registry::create(
                "VF4002",
                loc,
                &[("var", &format!("?{}", var.0)), ("ty", &ty.to_string())],
            ),
            TypeError::ArityMismatch { expected, found, .. } => registry::create(
                "VF4003",
                loc,
                &[("expected", &expected.to_string()), ("found", &found.to_string())],
            ),
            TypeError::UnboundVariable { name, .. } => {
                registry::create("VF4004", loc, &[("name", name)])
            }
            TypeError::UnboundConstructor { name, .. } => {
                registry::create("VF4005", loc, &[("name", name)])
            }
            TypeError::NonExhaustiveMatch { scrutinee_type, witness, .. } => registry::create(
                "VF4006",
                loc,
                &[("ty", scrutinee_type), ("witness", witness)],
            ),
            TypeError::RedundantCase { index, .. } => {
                registry::create("VF4007", loc, &[("index", &(index + 1).to_string())])
            }
            TypeError::NoMatchingOverload { name, found, candidates, .. } => {
                let candidates = candidates
                    .iter()
                    .map(|n| n.to_string())
                    .collect::<Vec<_>>()
                    .join(" or ");
                registry::create(
                    "VF4008",
                    loc,
                    &[
                        ("name", name),
                        ("found", &found.to_string()),
                        ("candidates", &candidates),
                    ],
                )
            }
            TypeError::UnknownField { ty, field, .. } => {
                registry::create("VF4009", loc, &[("ty", ty), ("field", field)])
            }
            TypeError::UnknownTypeName { name, .. } => {
                registry::create("VF4010", loc, &[("name", name)])
            }
            TypeError::ImportNotExported { name, module, .. } => {
                registry::create("VF5001", loc, &[("name", name), ("module", module)])
            }
            TypeError::DuplicateExport { name, .. } => {
                registry::create("VF5100", loc, &[("name", name)])
            }
            TypeError::ReexportConflict { name, first, second, .. } => registry::create(
                "VF5101",
                loc,
                &[("name", name), ("first", first), ("second", second)],
            ),
        }
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeError::Mismatch { expected, found, .. } => {
                write!(f, "type mismatch: expected `{expected}`, found `{found}`")
            }
            TypeError::InfiniteType { var, ty, .. } => {
                write!(f, "infinite type: `?{}` occurs in `{}`", var.0, ty)
            }
            TypeError::ArityMismatch { expected, found, .. } => {
                write!(f, "arity mismatch: expected {expected} argument(s), found {found}")
            }
            TypeError::UnboundVariable { name, .. } => {
                write!(f, "undefined variable `{name}`")
            }
            TypeError::UnboundConstructor { name, .. } => {
                write!(f, "unknown constructor `{name}`")
            }
            TypeError::NonExhaustiveMatch { scrutinee_type, witness, .. } => {
                write!(
                    f,
                    "non-exhaustive match on `{scrutinee_type}`: `{witness}` is not covered"
                )
            }
            TypeError::RedundantCase { index, .. } => {
                write!(f, "match case {} is unreachable", index + 1)
            }
            TypeError::NoMatchingOverload { name, found, candidates, .. } => {
                let candidates = candidates
                    .iter()
                    .map(|n| n.to_string())
                    .collect::<Vec<_>>()
                    .join(" or ");
                write!(
                    f,
                    "no overload of `{name}` takes {found} argument(s); candidates take {candidates}"
                )
            }
            TypeError::UnknownField { ty, field, .. } => {
                write!(f, "type `{ty}` has no field `{field}`")
            }
            TypeError::UnknownTypeName { name, .. } => {
                write!(f, "unknown type `{name}`")
            }
            TypeError::ImportNotExported { name, module, .. } => {
                write!(f, "`{name}` is not exported by `{module}`")
            }
            TypeError::DuplicateExport { name, .. } => {
                write!(f, "`{name}` is exported more than once")
            }
            TypeError::ReexportConflict { name, first, second, .. } => {
                write!(f, "re-exports of `{name}` from `{first}` and `{second}` conflict")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc() -> Location {
        Location::new("t.vf", 2, 4, 12)
    }

    #[test]
    fn mismatch_maps_to_vf4001() {
        let err = TypeError::Mismatch {
            expected: Type::int(),
            found: Type::string(),
            loc: loc(),
        };
        let d = err.to_diagnostic();
        assert_eq!(d.code, "VF4001");
        assert_eq!(d.message, "expected `Int`, found `String`");
        assert_eq!(d.location, loc());
    }

    #[test]
    fn redundant_case_is_a_warning() {
        let err = TypeError::RedundantCase { index: 1, loc: loc() };
        let d = err.to_diagnostic();
        assert_eq!(d.code, "VF4007");
        assert!(!d.is_error());
        assert!(d.message.contains('2'), "index is reported 1-based");
    }

    #[test]
    fn overload_error_lists_candidates() {
        let err = TypeError::NoMatchingOverload {
            name: "fetch".into(),
            found: 3,
            candidates: vec![1, 2],
            loc: loc(),
        };
        let d = err.to_diagnostic();
        assert_eq!(d.code, "VF4008");
        assert!(d.message.contains("1 or 2"), "message: {}", d.message);
    }
}
