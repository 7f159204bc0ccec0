//! Module loading: path resolution and transitive discovery.
//!
//! Given an entry point, produces every parsed surface module reachable
//! through import and re-export declarations, keyed by canonical real path
//! so symlinked and plain references collapse into one cache entry.
//!
//! Resolution precedence: relative paths, then project-config alias
//! mappings, then `node_modules` package lookup. File-vs-directory rule: a
//! specifier ending in `.vf` is used as-is, otherwise `<path>.vf` is tried
//! before `<path>/index.vf`; a trailing slash forces the directory form.
//!
//! Error policy is collect-don't-fail: only a missing entry point (and an
//! invalid project config) aborts loading. Parse errors, unresolved
//! imports, unreadable files, and circular symlinks become diagnostics and
//! discovery continues so everything is reported in one run.

use std::collections::VecDeque;
use std::path::{Component, Path, PathBuf};

use rustc_hash::{FxHashMap, FxHashSet};
use vibefun_ast::surface::{Decl, Module};
use vibefun_common::{registry, Diagnostic, Location};

use crate::config::ProjectConfig;

/// The seam to the out-of-scope parser: source text in, surface module and
/// parse diagnostics out.
pub trait SourceParser {
    fn parse(&self, path: &Path, source: &str) -> (Module, Vec<Diagnostic>);
}

/// One loaded module: its canonical path, source text, parsed tree, and
/// the resolved target of each import specifier.
#[derive(Debug)]
pub struct LoadedModule {
    pub path: PathBuf,
    pub source: String,
    pub module: Module,
    /// Specifier text -> canonical path, for specifiers that resolved.
    pub resolved_imports: FxHashMap<String, PathBuf>,
}

/// The complete set of discovered modules.
#[derive(Debug)]
pub struct ModuleSet {
    /// Canonical path of the entry point.
    pub entry: PathBuf,
    /// All modules keyed by canonical path. Unordered; callers must use
    /// the resolver's compilation order.
    pub modules: FxHashMap<PathBuf, LoadedModule>,
}

/// The module loader. Owns the config and the diagnostic accumulator for
/// one load.
pub struct Loader<'p> {
    parser: &'p dyn SourceParser,
    config: Option<ProjectConfig>,
    discover_config: bool,
    diagnostics: Vec<Diagnostic>,
}

impl<'p> Loader<'p> {
    /// A loader that discovers `vibefun.json` by walking up from the
    /// entry point.
    pub fn new(parser: &'p dyn SourceParser) -> Self {
        Loader { parser, config: None, discover_config: true, diagnostics: Vec::new() }
    }

    /// A loader using an already-resolved configuration (typically the
    /// session's); no discovery happens, even when `config` is `None`.
    pub fn with_config(parser: &'p dyn SourceParser, config: Option<ProjectConfig>) -> Self {
        Loader { parser, config, discover_config: false, diagnostics: Vec::new() }
    }

    /// Load the transitive module set starting from `entry`.
    ///
    /// Returns `None` for the fatal failures (entry point missing, invalid
    /// project config); every other problem is a collected diagnostic.
    pub fn load(mut self, entry: &Path) -> (Option<ModuleSet>, Vec<Diagnostic>) {
        let entry_real = match entry.canonicalize() {
            Ok(path) => path,
            Err(_) => {
                self.diagnostics.push(registry::create(
                    "VF5005",
                    Location::none(entry.display().to_string()),
                    &[("path", &entry.display().to_string())],
                ));
                return (None, self.diagnostics);
            }
        };

        if self.discover_config {
            let start = entry_real.parent().unwrap_or(Path::new("."));
            match ProjectConfig::discover(start) {
                Ok(config) => self.config = config,
                Err(diagnostic) => {
                    self.diagnostics.push(diagnostic);
                    return (None, self.diagnostics);
                }
            }
        }

        let mut modules: FxHashMap<PathBuf, LoadedModule> = FxHashMap::default();
        let mut queued: FxHashSet<PathBuf> = FxHashSet::default();
        let mut queue: VecDeque<PathBuf> = VecDeque::new();

        queued.insert(entry_real.clone());
        queue.push_back(entry_real.clone());

        while let Some(path) = queue.pop_front() {
            let source = match std::fs::read_to_string(&path) {
                Ok(source) => source,
                Err(err) => {
                    // Permission or I/O failure on an already-resolved
                    // path; record and keep discovering.
                    self.diagnostics.push(registry::create(
                        "VF5000",
                        Location::none(path.display().to_string()),
                        &[
                            ("specifier", &path.display().to_string()),
                            ("suggestion", &format!(": {err}")),
                            ("tried", &path.display().to_string()),
                        ],
                    ));
                    continue;
                }
            };

            let (module, parse_errors) = self.parser.parse(&path, &source);
            self.diagnostics.extend(parse_errors);

            let dir = path.parent().unwrap_or(Path::new(".")).to_path_buf();
            let mut resolved_imports = FxHashMap::default();

            for (specifier, loc) in import_specifiers(&module) {
                if resolved_imports.contains_key(specifier) {
                    continue;
                }
                if let Some(target) = self.resolve_specifier(specifier, &dir, loc) {
                    if queued.insert(target.clone()) {
                        queue.push_back(target.clone());
                    }
                    resolved_imports.insert(specifier.to_string(), target);
                }
            }

            modules.insert(
                path.clone(),
                LoadedModule { path: path.clone(), source, module, resolved_imports },
            );
        }

        (
            Some(ModuleSet { entry: entry_real, modules }),
            self.diagnostics,
        )
    }

    // ── Specifier resolution ────────────────────────────────────────────

    /// Resolve one import specifier to a canonical path, collecting a
    /// `VF5000` diagnostic (with the tried paths and a near-match
    /// suggestion) on failure and a `VF5901` warning on a
    /// case-insensitive-only match.
    fn resolve_specifier(
        &mut self,
        specifier: &str,
        from_dir: &Path,
        loc: &Location,
    ) -> Option<PathBuf> {
        let mut tried: Vec<PathBuf> = Vec::new();

        let found = if specifier.starts_with("./") || specifier.starts_with("../") {
            let base = normalize(&from_dir.join(specifier));
            self.try_candidates(&candidates(&base, specifier), &mut tried, loc)
        } else {
            let aliased = self
                .config
                .as_ref()
                .map(|c| c.expand(specifier))
                .unwrap_or_default();
            if !aliased.is_empty() {
                // First successful target wins.
                let mut hit = None;
                for target in &aliased {
                    let target = normalize(target);
                    if let Some(found) =
                        self.try_candidates(&candidates(&target, specifier), &mut tried, loc)
                    {
                        hit = Some(found);
                        break;
                    }
                }
                hit
            } else {
                self.resolve_package(specifier, from_dir, &mut tried, loc)
            }
        };

        match found {
            Some(found) => match found.canonicalize() {
                Ok(real) => Some(real),
                Err(err) => {
                    // Circular symlink or the like.
                    self.diagnostics.push(registry::create(
                        "VF5000",
                        loc.clone(),
                        &[
                            ("specifier", specifier),
                            ("suggestion", &format!(": {err}")),
                            ("tried", &display_paths(&tried)),
                        ],
                    ));
                    None
                }
            },
            None => {
                let suggestion = self
                    .near_match(&tried)
                    .map(|name| format!("; did you mean `{name}`?"))
                    .unwrap_or_default();
                self.diagnostics.push(registry::create(
                    "VF5000",
                    loc.clone(),
                    &[
                        ("specifier", specifier),
                        ("suggestion", &suggestion),
                        ("tried", &display_paths(&tried)),
                    ],
                ));
                None
            }
        }
    }

    /// Walk ancestors looking for `node_modules/<pkg>.vf` or
    /// `node_modules/<pkg>/index.vf`. Scoped packages (`@org/pkg`) walk
    /// the same way.
    fn resolve_package(
        &mut self,
        specifier: &str,
        from_dir: &Path,
        tried: &mut Vec<PathBuf>,
        loc: &Location,
    ) -> Option<PathBuf> {
        let mut dir = Some(from_dir);
        while let Some(current) = dir {
            let node_modules = current.join("node_modules");
            if node_modules.is_dir() {
                let base = node_modules.join(specifier);
                if let Some(found) =
                    self.try_candidates(&candidates(&base, specifier), tried, loc)
                {
                    return Some(found);
                }
            }
            dir = current.parent();
        }
        None
    }

    /// Try candidate files in order; the first that exists wins. Each
    /// existing candidate gets the case-sensitivity check before being
    /// accepted.
    fn try_candidates(
        &mut self,
        candidates: &[PathBuf],
        tried: &mut Vec<PathBuf>,
        loc: &Location,
    ) -> Option<PathBuf> {
        for candidate in candidates {
            if candidate.is_file() {
                self.check_case(candidate, loc);
                return Some(candidate.clone());
            }
            tried.push(candidate.clone());
        }
        None
    }

    /// Compare the final path segment against the directory contents; a
    /// case-insensitive-only match is a warning, not a failure.
    fn check_case(&mut self, candidate: &Path, loc: &Location) {
        let (Some(parent), Some(name)) = (candidate.parent(), candidate.file_name()) else {
            return;
        };
        let Ok(entries) = std::fs::read_dir(parent) else {
            return;
        };
        let name = name.to_string_lossy().to_string();
        let mut insensitive_match = None;
        for entry in entries.flatten() {
            let entry_name = entry.file_name().to_string_lossy().to_string();
            if entry_name == name {
                return; // exact match, nothing to warn about
            }
            if entry_name.eq_ignore_ascii_case(&name) {
                insensitive_match = Some(entry_name);
            }
        }
        if let Some(actual) = insensitive_match {
            self.diagnostics.push(registry::create(
                "VF5901",
                loc.clone(),
                &[("imported", &name), ("actual", &actual)],
            ));
        }
    }

    /// Look for an on-disk near match of the first tried candidate, for
    /// the "did you mean" suggestion.
    fn near_match(&self, tried: &[PathBuf]) -> Option<String> {
        let first = tried.first()?;
        let parent = first.parent()?;
        let wanted = first.file_name()?.to_string_lossy().to_string();
        let entries = std::fs::read_dir(parent).ok()?;

        let mut best: Option<(usize, String)> = None;
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().to_string();
            let distance = levenshtein(&wanted, &name);
            if distance > 0 && distance <= 2 {
                match &best {
                    Some((best_distance, best_name))
                        if (*best_distance, best_name.as_str()) <= (distance, name.as_str()) => {}
                    _ => best = Some((distance, name)),
                }
            }
        }
        best.map(|(_, name)| name)
    }
}

// ── Helpers ─────────────────────────────────────────────────────────────

/// Import and re-export specifiers of a module, in declaration order.
fn import_specifiers(module: &Module) -> Vec<(&str, &Location)> {
    let mut out = Vec::new();
    for decl in &module.decls {
        match decl {
            Decl::Import(d) => out.push((d.specifier.as_str(), &d.loc)),
            Decl::Reexport(d) => out.push((d.specifier.as_str(), &d.loc)),
            _ => {}
        }
    }
    out
}

/// Candidate files for a resolved base path, per the file/directory rule.
/// `.vf` specifiers are used as-is and never get a second extension; a
/// trailing slash forces the directory form.
fn candidates(base: &Path, specifier: &str) -> Vec<PathBuf> {
    if specifier.ends_with(".vf") {
        vec![base.to_path_buf()]
    } else if specifier.ends_with('/') {
        vec![base.join("index.vf")]
    } else {
        let mut with_ext = base.as_os_str().to_os_string();
        with_ext.push(".vf");
        vec![PathBuf::from(with_ext), base.join("index.vf")]
    }
}

/// Lexically normalize a path: resolve `.` and `..` components without
/// touching the file system. Symlinks are resolved later by
/// `canonicalize`.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other),
        }
    }
    out
}

fn display_paths(paths: &[PathBuf]) -> String {
    if paths.is_empty() {
        return "(none)".to_string();
    }
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Classic dynamic-programming edit distance, used for "did you mean"
/// suggestions only.
fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];
    for (i, &ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, &cb) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != cb);
            current[j + 1] = substitution.min(prev[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut prev, &mut current);
    }
    prev[b.len()]
}
