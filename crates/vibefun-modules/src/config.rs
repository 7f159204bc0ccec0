//! Project configuration (`vibefun.json`).
//!
//! Looked up by walking from the entry point's directory upward; the first
//! file found marks the project root. Absence is silent, a syntactically
//! invalid file is fatal. The only recognized field is
//! `compilerOptions.paths`, a map from alias patterns (`@/*`) to arrays of
//! target templates, checked before `node_modules` resolution with
//! first-matching-pattern, first-successful-target semantics.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use vibefun_common::{registry, Diagnostic, Location};

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(default, rename = "compilerOptions")]
    compiler_options: RawCompilerOptions,
}

#[derive(Debug, Default, Deserialize)]
struct RawCompilerOptions {
    /// `serde_json`'s preserve_order keeps patterns in declaration order,
    /// which first-matching-pattern semantics depend on.
    #[serde(default)]
    paths: serde_json::Map<String, serde_json::Value>,
}

/// A parsed project configuration.
#[derive(Debug, Clone)]
pub struct ProjectConfig {
    /// Directory containing `vibefun.json`; alias targets resolve against it.
    pub root: PathBuf,
    /// Alias patterns in declaration order, each with its target templates.
    pub paths: Vec<(String, Vec<String>)>,
}

impl ProjectConfig {
    /// Walk ancestors of `start_dir` looking for `vibefun.json`.
    ///
    /// Returns `Ok(None)` when no config exists anywhere up the tree.
    pub fn discover(start_dir: &Path) -> Result<Option<ProjectConfig>, Diagnostic> {
        let mut dir = Some(start_dir);
        while let Some(current) = dir {
            let candidate = current.join("vibefun.json");
            if candidate.is_file() {
                return Self::load(&candidate).map(Some);
            }
            dir = current.parent();
        }
        Ok(None)
    }

    /// Parse one `vibefun.json` file. Invalid JSON is fatal.
    pub fn load(path: &Path) -> Result<ProjectConfig, Diagnostic> {
        let text = std::fs::read_to_string(path).map_err(|err| {
            registry::create(
                "VF5006",
                Location::none(path.display().to_string()),
                &[("error", &err.to_string())],
            )
        })?;
        let raw: RawConfig = serde_json::from_str(&text).map_err(|err| {
            registry::create(
                "VF5006",
                Location::none(path.display().to_string()),
                &[("error", &err.to_string())],
            )
        })?;

        let mut paths = Vec::new();
        for (pattern, targets) in raw.compiler_options.paths {
            let targets = match targets {
                serde_json::Value::Array(items) => items
                    .into_iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect(),
                serde_json::Value::String(s) => vec![s],
                _ => Vec::new(),
            };
            paths.push((pattern, targets));
        }

        Ok(ProjectConfig {
            root: path.parent().unwrap_or(Path::new(".")).to_path_buf(),
            paths,
        })
    }

    /// Expand a specifier against the alias table.
    ///
    /// Returns the candidate target paths for the first matching pattern,
    /// in template order, resolved against the project root. An empty
    /// result means no pattern matched.
    pub fn expand(&self, specifier: &str) -> Vec<PathBuf> {
        for (pattern, targets) in &self.paths {
            if let Some(captured) = match_pattern(pattern, specifier) {
                return targets
                    .iter()
                    .map(|template| self.root.join(template.replacen('*', captured, 1)))
                    .collect();
            }
        }
        Vec::new()
    }
}

/// Match a specifier against an alias pattern with at most one `*`.
///
/// Returns the text captured by the wildcard, or `""` for an exact match.
fn match_pattern<'a>(pattern: &str, specifier: &'a str) -> Option<&'a str> {
    match pattern.split_once('*') {
        Some((prefix, suffix)) => {
            if specifier.len() >= prefix.len() + suffix.len()
                && specifier.starts_with(prefix)
                && specifier.ends_with(suffix)
            {
                Some(&specifier[prefix.len()..specifier.len() - suffix.len()])
            } else {
                None
            }
        }
        None => (pattern == specifier).then_some(""),
    }
}
