//! Module discovery, dependency graph, and compilation ordering.
//!
//! Three pieces: [`config`] reads the optional `vibefun.json` project
//! configuration, [`loader`] resolves import specifiers to real paths and
//! discovers the transitive module set, and [`resolver`] builds the typed
//! dependency graph, classifies cycles, and computes a deterministic
//! compilation order.

pub mod config;
pub mod graph;
pub mod loader;
pub mod resolver;

pub use config::ProjectConfig;
pub use graph::{Edge, EdgeKind, ModuleGraph};
pub use loader::{LoadedModule, Loader, ModuleSet, SourceParser};
pub use resolver::{resolve, Resolution};
