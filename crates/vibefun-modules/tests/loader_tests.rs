//! File-system-backed loader tests.
//!
//! The real parser is out of scope for this crate, so these tests use a
//! line-oriented fixture parser that understands just enough syntax to
//! produce import, re-export, and let declarations.

use std::fs;
use std::path::{Path, PathBuf};

use vibefun_ast::surface::{
    Decl, Expr, ExprKind, ImportDecl, ImportName, LetDecl, Literal, Module, Reexport,
    ReexportDecl,
};
use vibefun_common::{Diagnostic, LineIndex, Location};
use vibefun_modules::{Loader, SourceParser};

/// Parses `import { a, b } from "./x"`, `import type { T } from "./x"`,
/// `export * from "./x"`, and `let name = ...` lines.
struct FixtureParser;

impl SourceParser for FixtureParser {
    fn parse(&self, path: &Path, source: &str) -> (Module, Vec<Diagnostic>) {
        let index = LineIndex::new(source);
        let file = path.display().to_string();
        let mut decls = Vec::new();
        let mut offset = 0u32;

        for line in source.lines() {
            let loc = index.location(file.clone(), offset);
            let trimmed = line.trim();

            if let Some(rest) = trimmed.strip_prefix("import type {") {
                decls.push(import_decl(rest, true, &loc));
            } else if let Some(rest) = trimmed.strip_prefix("import {") {
                decls.push(import_decl(rest, false, &loc));
            } else if let Some(rest) = trimmed.strip_prefix("export * from") {
                decls.push(Decl::Reexport(ReexportDecl {
                    reexport: Reexport::Wildcard,
                    specifier: quoted(rest),
                    loc: loc.clone(),
                }));
            } else if let Some(rest) = trimmed.strip_prefix("let ") {
                let name = rest.split_whitespace().next().unwrap_or("").to_string();
                decls.push(Decl::Let(LetDecl {
                    name,
                    rec: false,
                    mutable: false,
                    annotation: None,
                    value: Expr::new(ExprKind::Lit(Literal::Unit), loc.clone()),
                    loc: loc.clone(),
                }));
            }

            offset += line.len() as u32 + 1;
        }

        (Module { path: path.to_path_buf(), decls }, vec![])
    }
}

fn import_decl(rest: &str, type_only: bool, loc: &Location) -> Decl {
    let (names_part, from_part) = rest.split_once('}').expect("fixture import has `}`");
    let names = names_part
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|name| ImportName { name: name.to_string(), alias: None, loc: loc.clone() })
        .collect();
    Decl::Import(ImportDecl {
        names,
        specifier: quoted(from_part),
        type_only,
        loc: loc.clone(),
    })
}

fn quoted(text: &str) -> String {
    let start = text.find('"').expect("fixture specifier is quoted") + 1;
    let end = text[start..].find('"').expect("fixture specifier is closed") + start;
    text[start..end].to_string()
}

fn load(entry: &Path) -> (Option<vibefun_modules::ModuleSet>, Vec<Diagnostic>) {
    Loader::new(&FixtureParser).load(entry)
}

// ── Tests ──────────────────────────────────────────────────────────────

#[test]
fn discovers_transitive_imports() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();
    fs::write(root.join("main.vf"), "import { a } from \"./a\"\n").unwrap();
    fs::write(root.join("a.vf"), "import { b } from \"./b\"\n").unwrap();
    fs::write(root.join("b.vf"), "let b = 1\n").unwrap();

    let (set, diagnostics) = load(&root.join("main.vf"));
    assert!(diagnostics.is_empty(), "unexpected: {diagnostics:?}");
    assert_eq!(set.unwrap().modules.len(), 3);
}

#[test]
fn missing_entry_point_is_fatal() {
    let tmp = tempfile::tempdir().unwrap();
    let (set, diagnostics) = load(&tmp.path().join("absent.vf"));
    assert!(set.is_none());
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].code, "VF5005");
}

#[test]
fn missing_import_is_collected_not_fatal() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();
    fs::write(
        root.join("main.vf"),
        "import { x } from \"./missing\"\nimport { a } from \"./a\"\n",
    )
    .unwrap();
    fs::write(root.join("a.vf"), "let a = 1\n").unwrap();

    let (set, diagnostics) = load(&root.join("main.vf"));
    let set = set.expect("discovery continues past a missing import");
    assert_eq!(set.modules.len(), 2, "main and a are still loaded");
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].code, "VF5000");
    // The tried paths are listed for the user.
    let hint = diagnostics[0].hint.as_deref().unwrap_or("");
    assert!(hint.contains("missing.vf"), "hint was: {hint}");
    assert!(hint.contains("index.vf"), "hint was: {hint}");
}

#[test]
fn near_match_is_suggested() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();
    fs::write(root.join("main.vf"), "import { f } from \"./utli\"\n").unwrap();
    fs::write(root.join("utils.vf"), "let f = 1\n").unwrap();

    let (_, diagnostics) = load(&root.join("main.vf"));
    assert_eq!(diagnostics[0].code, "VF5000");
    assert!(
        diagnostics[0].message.contains("did you mean `utils.vf`"),
        "message was: {}",
        diagnostics[0].message
    );
}

#[test]
fn directory_import_resolves_to_index() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();
    fs::create_dir(root.join("lib")).unwrap();
    fs::write(root.join("main.vf"), "import { f } from \"./lib\"\n").unwrap();
    fs::write(root.join("lib/index.vf"), "let f = 1\n").unwrap();

    let (set, diagnostics) = load(&root.join("main.vf"));
    assert!(diagnostics.is_empty(), "unexpected: {diagnostics:?}");
    let set = set.unwrap();
    assert!(set
        .modules
        .keys()
        .any(|path| path.ends_with("lib/index.vf")));
}

#[test]
fn file_takes_precedence_over_directory() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();
    fs::create_dir(root.join("util")).unwrap();
    fs::write(root.join("main.vf"), "import { f } from \"./util\"\n").unwrap();
    fs::write(root.join("util.vf"), "let f = 1\n").unwrap();
    fs::write(root.join("util/index.vf"), "let f = 2\n").unwrap();

    let (set, _) = load(&root.join("main.vf"));
    let set = set.unwrap();
    let main = &set.modules[&root.join("main.vf").canonicalize().unwrap()];
    let target = &main.resolved_imports["./util"];
    assert!(target.ends_with("util.vf"), "resolved: {}", target.display());
}

#[test]
fn symlinked_modules_collapse_to_one_entry() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();
    fs::write(
        root.join("main.vf"),
        "import { b } from \"./b.vf\"\nimport { b } from \"./alias.vf\"\n",
    )
    .unwrap();
    fs::write(root.join("b.vf"), "let b = 1\n").unwrap();
    std::os::unix::fs::symlink(root.join("b.vf"), root.join("alias.vf")).unwrap();

    let (set, _) = load(&root.join("main.vf"));
    let set = set.unwrap();
    // main + one shared entry for b/alias.
    assert_eq!(set.modules.len(), 2);

    let main = &set.modules[&root.join("main.vf").canonicalize().unwrap()];
    assert_eq!(
        main.resolved_imports["./b.vf"],
        main.resolved_imports["./alias.vf"]
    );
}

#[test]
fn alias_paths_resolve_before_node_modules() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();
    fs::write(
        root.join("vibefun.json"),
        r#"{ "compilerOptions": { "paths": { "@/*": ["src/*"] } } }"#,
    )
    .unwrap();
    fs::create_dir_all(root.join("src")).unwrap();
    fs::create_dir_all(root.join("node_modules")).unwrap();
    fs::write(root.join("main.vf"), "import { f } from \"@/util\"\n").unwrap();
    fs::write(root.join("src/util.vf"), "let f = 1\n").unwrap();

    let (set, diagnostics) = load(&root.join("main.vf"));
    assert!(diagnostics.is_empty(), "unexpected: {diagnostics:?}");
    let set = set.unwrap();
    assert!(set.modules.keys().any(|p| p.ends_with("src/util.vf")));
}

#[test]
fn bare_specifier_walks_node_modules() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();
    fs::create_dir_all(root.join("app/node_modules")).unwrap();
    fs::write(root.join("app/main.vf"), "import { map } from \"listkit\"\n").unwrap();
    fs::write(root.join("app/node_modules/listkit.vf"), "let map = 1\n").unwrap();

    let (set, diagnostics) = load(&root.join("app/main.vf"));
    assert!(diagnostics.is_empty(), "unexpected: {diagnostics:?}");
    let set = set.unwrap();
    assert!(set.modules.keys().any(|p| p.ends_with("listkit.vf")));
}

#[test]
fn scoped_package_resolves_index() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();
    fs::create_dir_all(root.join("node_modules/@org/kit")).unwrap();
    fs::write(root.join("main.vf"), "import { f } from \"@org/kit\"\n").unwrap();
    fs::write(root.join("node_modules/@org/kit/index.vf"), "let f = 1\n").unwrap();

    let (set, diagnostics) = load(&root.join("main.vf"));
    assert!(diagnostics.is_empty(), "unexpected: {diagnostics:?}");
    let set = set.unwrap();
    assert!(set
        .modules
        .keys()
        .any(|p| p.ends_with("node_modules/@org/kit/index.vf")));
}

#[test]
fn parse_once_per_real_path() {
    // Two modules importing the same target load it once.
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();
    fs::write(
        root.join("main.vf"),
        "import { a } from \"./a\"\nimport { b } from \"./b\"\n",
    )
    .unwrap();
    fs::write(root.join("a.vf"), "import { s } from \"./shared\"\n").unwrap();
    fs::write(root.join("b.vf"), "import { s } from \"./shared\"\n").unwrap();
    fs::write(root.join("shared.vf"), "let s = 1\n").unwrap();

    let (set, diagnostics) = load(&root.join("main.vf"));
    assert!(diagnostics.is_empty());
    assert_eq!(set.unwrap().modules.len(), 4);
}
