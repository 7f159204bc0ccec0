//! The static diagnostic registry.
//!
//! Every diagnostic the front-end can emit is defined here, keyed by its
//! stable `VFxxxx` code. Emission sites supply only the code, a location, and
//! template parameters; the text lives in one place so wording changes stay
//! local and machine output stays stable.

use crate::diagnostic::{Diagnostic, Phase, Severity};
use crate::span::Location;

/// A compile-time diagnostic definition.
pub struct DiagnosticDef {
    pub code: &'static str,
    pub title: &'static str,
    /// Message template. `{name}` placeholders are substituted by [`create`].
    pub message: &'static str,
    /// Optional hint template.
    pub hint: Option<&'static str>,
    pub severity: Severity,
    pub phase: Phase,
    /// Longer prose shown by `--explain`-style tooling.
    pub explanation: &'static str,
    /// A minimal source example that triggers the diagnostic.
    pub example: &'static str,
}

/// The full registry, in code order.
pub static DEFINITIONS: &[DiagnosticDef] = &[
    // ── Desugarer (VF3xxx) ──────────────────────────────────────────────
    DiagnosticDef {
        code: "VF3001",
        title: "Empty block",
        message: "block has no trailing expression",
        hint: Some("a block must end with an expression that gives it a value"),
        severity: Severity::Error,
        phase: Phase::Desugar,
        explanation: "Blocks are expressions: the declarations run in order and the \
                      trailing expression is the block's value. A block containing \
                      only declarations (or nothing) has no value.",
        example: "let x = { let y = 1 }",
    },
    DiagnosticDef {
        code: "VF3002",
        title: "Inconsistent or-pattern bindings",
        message: "or-pattern alternatives bind different variables: `{name}` is not bound in every alternative",
        hint: Some("every alternative of a `|` pattern must bind the same variables"),
        severity: Severity::Error,
        phase: Phase::Desugar,
        explanation: "A variable bound in one alternative of an or-pattern but not in \
                      another would be undefined whenever the other alternative \
                      matches, so every alternative must bind exactly the same set of \
                      names.",
        example: "match v { Some(x) | None => x }",
    },
    // ── Type checker (VF4xxx) ───────────────────────────────────────────
    DiagnosticDef {
        code: "VF4001",
        title: "Type mismatch",
        message: "expected `{expected}`, found `{found}`",
        hint: None,
        severity: Severity::Error,
        phase: Phase::TypeCheck,
        explanation: "Two types that must be equal could not be unified.",
        example: "let n: Int = \"hello\"",
    },
    DiagnosticDef {
        code: "VF4002",
        title: "Infinite type",
        message: "infinite type: `{var}` occurs in `{ty}`",
        hint: Some("a value cannot have a type that refers to itself"),
        severity: Severity::Error,
        phase: Phase::TypeCheck,
        explanation: "Unifying a type variable with a type containing that same \
                      variable would build an infinitely-nested type.",
        example: "let f = (x) => x(x)",
    },
    DiagnosticDef {
        code: "VF4003",
        title: "Arity mismatch",
        message: "expected {expected} argument(s), found {found}",
        hint: None,
        severity: Severity::Error,
        phase: Phase::TypeCheck,
        explanation: "A function or constructor was applied to the wrong number of \
                      arguments.",
        example: "let p = Some(1, 2)",
    },
    DiagnosticDef {
        code: "VF4004",
        title: "Undefined variable",
        message: "undefined variable `{name}`",
        hint: None,
        severity: Severity::Error,
        phase: Phase::TypeCheck,
        explanation: "The name is not bound in any enclosing scope, nor imported, nor \
                      a known built-in.",
        example: "let y = x + 1",
    },
    DiagnosticDef {
        code: "VF4005",
        title: "Unknown constructor",
        message: "unknown constructor `{name}`",
        hint: None,
        severity: Severity::Error,
        phase: Phase::TypeCheck,
        explanation: "A capitalized name was used as a variant constructor but no \
                      variant type in scope declares it.",
        example: "let v = Sum(1)",
    },
    DiagnosticDef {
        code: "VF4006",
        title: "Non-exhaustive match",
        message: "non-exhaustive match on `{ty}`: `{witness}` is not covered",
        hint: Some("add the missing case or a wildcard `_` case"),
        severity: Severity::Error,
        phase: Phase::TypeCheck,
        explanation: "Some value of the scrutinee's type escapes every pattern in the \
                      match. The reported witness is one such value.",
        example: "match o { Some(x) => x }",
    },
    DiagnosticDef {
        code: "VF4007",
        title: "Redundant match case",
        message: "match case {index} is unreachable",
        hint: Some("remove this case or reorder the match"),
        severity: Severity::Warning,
        phase: Phase::TypeCheck,
        explanation: "Every value matched by this case is already matched by an \
                      earlier one.",
        example: "match b { _ => 0, true => 1 }",
    },
    DiagnosticDef {
        code: "VF4008",
        title: "No matching overload",
        message: "no overload of `{name}` takes {found} argument(s); candidates take {candidates}",
        hint: None,
        severity: Severity::Error,
        phase: Phase::TypeCheck,
        explanation: "An overloaded external declaration is resolved by the number of \
                      arguments at the call site; no declared alternative has this \
                      arity.",
        example: "fetch(url, opts, extra)",
    },
    DiagnosticDef {
        code: "VF4009",
        title: "Unknown field",
        message: "type `{ty}` has no field `{field}`",
        hint: None,
        severity: Severity::Error,
        phase: Phase::TypeCheck,
        explanation: "Field access requires the record type to declare the accessed \
                      field.",
        example: "point.z",
    },
    DiagnosticDef {
        code: "VF4010",
        title: "Unknown type",
        message: "unknown type `{name}`",
        hint: None,
        severity: Severity::Error,
        phase: Phase::TypeCheck,
        explanation: "A type annotation refers to a type name that is neither built in \
                      nor declared nor imported.",
        example: "let x: Missing = 1",
    },
    // ── Imports (VF5000–VF5006) ─────────────────────────────────────────
    DiagnosticDef {
        code: "VF5000",
        title: "Module not found",
        message: "cannot resolve import `{specifier}`{suggestion}",
        hint: Some("tried: {tried}"),
        severity: Severity::Error,
        phase: Phase::Imports,
        explanation: "No file satisfied the import specifier after applying relative, \
                      path-alias, and package resolution in order.",
        example: "import { f } from \"./missing\"",
    },
    DiagnosticDef {
        code: "VF5001",
        title: "Import not exported",
        message: "`{name}` is not exported by `{module}`",
        hint: None,
        severity: Severity::Error,
        phase: Phase::Imports,
        explanation: "The imported name does not appear in the target module's export \
                      set.",
        example: "import { missing } from \"./util\"",
    },
    DiagnosticDef {
        code: "VF5002",
        title: "Duplicate import",
        message: "`{name}` is imported from both `{first}` and `{second}`",
        hint: Some("rename one of the imports or drop one"),
        severity: Severity::Error,
        phase: Phase::Imports,
        explanation: "The same name may not be imported from two different modules \
                      into one unit; importing the same name twice from the same \
                      module is deduplicated silently.",
        example: "import { f } from \"./a\"\nimport { f } from \"./b\"",
    },
    DiagnosticDef {
        code: "VF5003",
        title: "Import shadowed",
        message: "imported name `{name}` is shadowed by a later `let` in this module",
        hint: Some("rename the local binding or the import"),
        severity: Severity::Error,
        phase: Phase::Imports,
        explanation: "A top-level `let` with the same name as an earlier import makes \
                      the import unreachable; function parameters may shadow freely \
                      because they live in an inner scope.",
        example: "import { f } from \"./a\"\nlet f = 1",
    },
    DiagnosticDef {
        code: "VF5004",
        title: "Self import",
        message: "module cannot import itself",
        hint: None,
        severity: Severity::Error,
        phase: Phase::Imports,
        explanation: "An import edge from a module to itself is always an error, \
                      regardless of whether it is type-only.",
        example: "import { f } from \"./self\"",
    },
    DiagnosticDef {
        code: "VF5005",
        title: "Entry point not found",
        message: "entry point `{path}` not found",
        hint: None,
        severity: Severity::Error,
        phase: Phase::Imports,
        explanation: "The compilation entry point must exist; nothing can be compiled \
                      without it.",
        example: "",
    },
    DiagnosticDef {
        code: "VF5006",
        title: "Invalid project configuration",
        message: "invalid vibefun.json: {error}",
        hint: None,
        severity: Severity::Error,
        phase: Phase::Imports,
        explanation: "A vibefun.json was found but could not be parsed; a syntactically \
                      invalid config is fatal, while an absent one is silently ignored.",
        example: "{ \"compilerOptions\": ",
    },
    // ── Exports (VF51xx) ────────────────────────────────────────────────
    DiagnosticDef {
        code: "VF5100",
        title: "Duplicate export",
        message: "`{name}` is exported more than once",
        hint: None,
        severity: Severity::Error,
        phase: Phase::Exports,
        explanation: "A module's export set may contain each name once.",
        example: "export { f }\nexport { f }",
    },
    DiagnosticDef {
        code: "VF5101",
        title: "Re-export conflict",
        message: "re-exports of `{name}` from `{first}` and `{second}` conflict",
        hint: Some("export the name explicitly to pick one"),
        severity: Severity::Error,
        phase: Phase::Exports,
        explanation: "Two wildcard re-exports bring in the same name from different \
                      modules; the conflict surfaces when the export environment is \
                      built.",
        example: "export * from \"./a\"\nexport * from \"./b\"",
    },
    // ── Modules (VF59xx, warnings) ──────────────────────────────────────
    DiagnosticDef {
        code: "VF5900",
        title: "Circular dependency",
        message: "circular dependency: {cycle}",
        hint: Some("break the cycle: evaluate lazily, extract the shared code into a \
                    new module, inject the dependency, or communicate through events"),
        severity: Severity::Warning,
        phase: Phase::Modules,
        explanation: "The modules form a strongly connected component with at least \
                      one value-level edge, so their initialization order is \
                      observable. Cycles whose edges are all `import type` are safe \
                      and not reported.",
        example: "",
    },
    DiagnosticDef {
        code: "VF5901",
        title: "Case-sensitivity mismatch",
        message: "import path `{imported}` matches `{actual}` only case-insensitively",
        hint: Some("this import will fail on case-sensitive file systems"),
        severity: Severity::Warning,
        phase: Phase::Modules,
        explanation: "The import resolved on this file system, but the final path \
                      segment differs from the on-disk name by case.",
        example: "import { f } from \"./Utils\"",
    },
];

/// Look up a definition by code.
pub fn definition(code: &str) -> Option<&'static DiagnosticDef> {
    DEFINITIONS.iter().find(|d| d.code == code)
}

/// Substitute `{name}` placeholders in a template.
fn substitute(template: &str, params: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (key, value) in params {
        out = out.replace(&format!("{{{key}}}"), value);
    }
    out
}

/// Create a diagnostic from its registry definition.
///
/// # Panics
///
/// Panics if `code` is not in the registry. Codes are compile-time constants
/// at every emission site, so an unknown code is a bug, not an input error.
pub fn create(code: &str, location: Location, params: &[(&str, &str)]) -> Diagnostic {
    let def = definition(code)
        .unwrap_or_else(|| panic!("unknown diagnostic code {code}"));
    let message = substitute(def.message, params);
    let hint = def.hint.map(|h| substitute(h, params));
    Diagnostic {
        code: def.code,
        severity: def.severity,
        phase: def.phase,
        message,
        hint,
        location,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_unique_and_sorted() {
        let codes: Vec<&str> = DEFINITIONS.iter().map(|d| d.code).collect();
        let mut sorted = codes.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(codes.len(), sorted.len(), "duplicate diagnostic code");
        assert_eq!(codes, sorted, "registry must stay in code order");
    }

    #[test]
    fn create_substitutes_params() {
        let d = create(
            "VF4001",
            Location::new("t.vf", 1, 1, 0),
            &[("expected", "Int"), ("found", "String")],
        );
        assert_eq!(d.message, "expected `Int`, found `String`");
        assert_eq!(d.severity, Severity::Error);
        assert_eq!(d.phase, Phase::TypeCheck);
    }

    #[test]
    fn warnings_have_warning_severity() {
        for code in ["VF4007", "VF5900", "VF5901"] {
            assert_eq!(definition(code).unwrap().severity, Severity::Warning);
        }
    }

    #[test]
    #[should_panic(expected = "unknown diagnostic code")]
    fn unknown_code_panics() {
        create("VF9999", Location::new("t.vf", 1, 1, 0), &[]);
    }
}
