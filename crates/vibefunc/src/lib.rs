//! The Vibefun compilation session: loader, resolver, desugarer, and type
//! checker wired into one pipeline.
//!
//! A [`Session`] owns everything the stages share: the single append-only
//! diagnostic collector, the per-module source map, and the resolved
//! project configuration. [`compile`] threads the session through every
//! stage: the configuration is resolved into the session before anything
//! loads, the loader runs with the session's config and fills the source
//! map, and the resolver and checker append to the session's collector.
//! No stage unwinds across a stage boundary; a module whose desugaring
//! fails is skipped by the checker and everything else proceeds so one
//! run reports as much as possible.
//!
//! Command-line wrapping and code generation live elsewhere; this crate
//! ends at the typed Core representation.

use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;
use vibefun_common::json::JsonOutput;
use vibefun_common::{render, Diagnostic, DiagnosticCollector};
use vibefun_desugar::Desugarer;
use vibefun_modules::{resolve, Loader, ProjectConfig, SourceParser};
use vibefun_typeck::{Checker, Scheme};

/// One compilation session's shared state, passed through every stage.
///
/// The collector is the only append-only shared structure; the source map
/// is filled by the loader (keyed by canonical path, like the module set)
/// and read back when diagnostics render; the project configuration is
/// resolved once, before loading.
pub struct Session {
    pub collector: DiagnosticCollector,
    /// Source text per canonical module path.
    pub sources: FxHashMap<PathBuf, String>,
    pub config: Option<ProjectConfig>,
}

impl Session {
    /// An empty session: no config, no sources, nothing collected.
    pub fn new() -> Self {
        Session {
            collector: DiagnosticCollector::new(),
            sources: FxHashMap::default(),
            config: None,
        }
    }

    /// Render every collected diagnostic against its source text.
    ///
    /// Diagnostics group by file in order of first appearance; within a
    /// file they keep discovery order. A diagnostic whose file has no
    /// loaded source renders against empty text.
    pub fn render_diagnostics(&self, color: bool) -> String {
        let mut file_order: Vec<&str> = Vec::new();
        for diagnostic in self.collector.iter() {
            if !file_order.contains(&diagnostic.location.file.as_str()) {
                file_order.push(&diagnostic.location.file);
            }
        }

        let mut out = Vec::new();
        for file in file_order {
            let source = self
                .sources
                .get(Path::new(file))
                .map(String::as_str)
                .unwrap_or("");
            for diagnostic in self.collector.iter().filter(|d| d.location.file == file) {
                out.push(render::render(diagnostic, source, color));
            }
        }
        out.join("\n")
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// The outcome of one compilation session.
#[derive(Debug)]
pub struct CompileResult {
    /// False iff any error-severity diagnostic was collected. Warnings
    /// alone leave a compilation successful.
    pub success: bool,
    /// Canonical module paths in dependency order.
    pub compilation_order: Vec<PathBuf>,
    /// Every diagnostic from every stage, in discovery order.
    pub diagnostics: Vec<Diagnostic>,
    /// Top-level binding schemes per module.
    pub module_types: FxHashMap<PathBuf, FxHashMap<String, Scheme>>,
}

impl CompileResult {
    /// The machine-readable JSON document for this result.
    pub fn to_json(&self) -> String {
        JsonOutput::from_diagnostics(&self.diagnostics).to_json()
    }
}

/// Run the full front-end pipeline from `entry`.
///
/// The parser is the out-of-scope collaborator producing Surface ASTs;
/// the driver threads it into the loader.
pub fn compile(entry: &Path, parser: &dyn SourceParser) -> CompileResult {
    let mut session = Session::new();

    // Resolve the project configuration into the session before anything
    // loads. A malformed vibefun.json is fatal; absence is silent.
    let start_dir = match entry.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    match ProjectConfig::discover(start_dir) {
        Ok(config) => session.config = config,
        Err(diagnostic) => {
            session.collector.push(diagnostic);
            return finish(session, Vec::new(), FxHashMap::default());
        }
    }

    // Stage 1: load, with the session's config. Only a missing entry
    // point is fatal from here; everything else is collected.
    let loader = Loader::with_config(parser, session.config.clone());
    let (set, load_diagnostics) = loader.load(entry);
    session.collector.extend(load_diagnostics);
    let Some(set) = set else {
        return finish(session, Vec::new(), FxHashMap::default());
    };
    for (path, module) in &set.modules {
        session.sources.insert(path.clone(), module.source.clone());
    }

    // Stage 2: resolve. Graph construction, import validity, cycle
    // classification, deterministic ordering.
    let resolution = resolve(&set);
    session.collector.extend(resolution.diagnostics);

    // Stage 3: desugar and check, in compilation order. One desugarer
    // per session keeps generated names unique across modules.
    let mut desugarer = Desugarer::new();
    let mut checker = Checker::new();
    let mut module_types = FxHashMap::default();

    for path in &resolution.compilation_order {
        let loaded = &set.modules[path];
        match desugarer.desugar_module(&loaded.module) {
            Ok(core) => {
                let schemes = checker.check_module(&core, &loaded.resolved_imports);
                session.collector.extend(checker.take_diagnostics());
                module_types.insert(path.clone(), schemes);
            }
            Err(diagnostic) => {
                // Desugaring stops this module; the rest still compile.
                session.collector.push(diagnostic);
            }
        }
    }

    finish(session, resolution.compilation_order, module_types)
}

/// Close out a session into its result.
fn finish(
    session: Session,
    compilation_order: Vec<PathBuf>,
    module_types: FxHashMap<PathBuf, FxHashMap<String, Scheme>>,
) -> CompileResult {
    CompileResult {
        success: !session.collector.has_errors(),
        compilation_order,
        diagnostics: session.collector.into_vec(),
        module_types,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vibefun_common::{registry, Location};

    #[test]
    fn new_session_is_empty() {
        let session = Session::new();
        assert!(session.config.is_none());
        assert!(session.sources.is_empty());
        assert!(session.collector.is_empty());
    }

    #[test]
    fn render_groups_by_file_in_first_appearance_order() {
        let mut session = Session::new();
        session
            .sources
            .insert(PathBuf::from("b.vf"), "let z = w\n".to_string());
        session
            .sources
            .insert(PathBuf::from("a.vf"), "let y = x\n".to_string());

        // Discovery order interleaves the files; rendering regroups them.
        session.collector.push(registry::create(
            "VF4004",
            Location::new("b.vf", 1, 9, 8),
            &[("name", "w")],
        ));
        session.collector.push(registry::create(
            "VF4004",
            Location::new("a.vf", 1, 9, 8),
            &[("name", "x")],
        ));
        session.collector.push(registry::create(
            "VF5901",
            Location::new("b.vf", 1, 1, 0),
            &[("imported", "B.vf"), ("actual", "b.vf")],
        ));

        let out = session.render_diagnostics(false);
        let w_pos = out.find("`w`").expect("b.vf error rendered");
        let warn_pos = out.find("VF5901").expect("b.vf warning rendered");
        let x_pos = out.find("`x`").expect("a.vf error rendered");
        assert!(
            w_pos < warn_pos && warn_pos < x_pos,
            "both b.vf diagnostics render before a.vf's: {out}"
        );
    }

    #[test]
    fn render_survives_a_missing_source() {
        let mut session = Session::new();
        session.collector.push(registry::create(
            "VF4004",
            Location::new("gone.vf", 1, 1, 0),
            &[("name", "x")],
        ));
        let out = session.render_diagnostics(false);
        assert!(out.contains("VF4004"));
    }
}
