//! Dependency resolution: graph construction, cycle classification, and
//! compilation ordering.
//!
//! Cycle detection uses Tarjan's strongly-connected-components algorithm:
//! one pass, O(V+E), and it yields every cycle including self-loops. Every
//! SCC of size greater than one, plus any single node with a self-edge, is
//! a cycle. A self-edge is a compile error; a larger cycle is a warning if
//! any edge in it is a value edge and silent if every edge is type-only.
//!
//! The compilation order is a topological sort of the SCC-contracted DAG.
//! Modules within an SCC are ordered lexicographically by path, and ready
//! SCCs are popped in lexicographic order of their smallest member, so the
//! order is reproducible run to run.

use std::collections::BinaryHeap;
use std::path::{Path, PathBuf};

use rustc_hash::{FxHashMap, FxHashSet};
use vibefun_ast::surface::Decl;
use vibefun_common::{registry, Diagnostic};

use crate::graph::{Edge, EdgeKind, ModuleGraph};
use crate::loader::ModuleSet;

/// The resolver's output: a deterministic compilation order, the
/// diagnostics it produced, and the graph for downstream consumers.
#[derive(Debug)]
pub struct Resolution {
    pub compilation_order: Vec<PathBuf>,
    pub diagnostics: Vec<Diagnostic>,
    pub graph: ModuleGraph,
}

/// Build the dependency graph for a module set, validate imports, classify
/// cycles, and compute the compilation order.
pub fn resolve(modules: &ModuleSet) -> Resolution {
    let mut diagnostics = Vec::new();
    let graph = build_graph(modules);

    check_imports(modules, &mut diagnostics);

    let sccs = tarjan(&graph);
    let mut scc_of = vec![0usize; graph.node_count()];
    for (scc_id, members) in sccs.iter().enumerate() {
        for &node in members {
            scc_of[node] = scc_id;
        }
    }

    classify_cycles(&graph, &sccs, &mut diagnostics);

    let compilation_order = topological_order(&graph, &sccs, &scc_of);

    Resolution { compilation_order, diagnostics, graph }
}

// ── Graph construction ──────────────────────────────────────────────────

/// Walk every module's import and re-export declarations and record typed
/// edges. Re-exports are conservatively value edges; wildcard imports too.
fn build_graph(modules: &ModuleSet) -> ModuleGraph {
    let mut graph = ModuleGraph::new();

    // Insert nodes in sorted order so indices are deterministic even
    // though the module map is unordered.
    let mut paths: Vec<&PathBuf> = modules.modules.keys().collect();
    paths.sort();
    for path in &paths {
        graph.add_module((*path).clone());
    }

    for path in paths {
        let loaded = &modules.modules[path];
        let from = graph.resolve(path).expect("node was just inserted");
        for decl in &loaded.module.decls {
            let (specifier, kind, loc) = match decl {
                Decl::Import(d) => (
                    &d.specifier,
                    if d.type_only { EdgeKind::Type } else { EdgeKind::Value },
                    &d.loc,
                ),
                Decl::Reexport(d) => (&d.specifier, EdgeKind::Value, &d.loc),
                _ => continue,
            };
            let Some(target) = loaded.resolved_imports.get(specifier) else {
                continue; // resolution already failed in the loader
            };
            if graph.resolve(target).is_some() {
                graph.add_edge(from, Edge { to: target.clone(), kind, location: loc.clone() });
            }
        }
    }

    graph
}

// ── Import validity ─────────────────────────────────────────────────────

/// Per-module name checks: a name imported from two different modules is
/// an error, importing it twice from the same module deduplicates
/// silently, and a later top-level `let` shadowing an import is an error.
/// Function parameters shadow freely because they live in inner scopes.
fn check_imports(modules: &ModuleSet, diagnostics: &mut Vec<Diagnostic>) {
    let mut paths: Vec<&PathBuf> = modules.modules.keys().collect();
    paths.sort();

    for path in paths {
        let loaded = &modules.modules[path];
        // local name -> specifier it was imported from
        let mut imported: FxHashMap<&str, &str> = FxHashMap::default();

        for decl in &loaded.module.decls {
            match decl {
                Decl::Import(import) => {
                    for name in &import.names {
                        let local = name.local_name();
                        match imported.get(local) {
                            Some(&first) if first != import.specifier.as_str() => {
                                diagnostics.push(registry::create(
                                    "VF5002",
                                    name.loc.clone(),
                                    &[
                                        ("name", local),
                                        ("first", first),
                                        ("second", &import.specifier),
                                    ],
                                ));
                            }
                            Some(_) => {} // same module twice: dedup silently
                            None => {
                                imported.insert(local, &import.specifier);
                            }
                        }
                    }
                }
                Decl::Let(decl) => {
                    if imported.contains_key(decl.name.as_str()) {
                        diagnostics.push(registry::create(
                            "VF5003",
                            decl.loc.clone(),
                            &[("name", &decl.name)],
                        ));
                    }
                }
                _ => {}
            }
        }
    }
}

// ── Tarjan's SCC ────────────────────────────────────────────────────────

struct TarjanState<'g> {
    graph: &'g ModuleGraph,
    index: Vec<Option<u32>>,
    lowlink: Vec<u32>,
    on_stack: Vec<bool>,
    stack: Vec<usize>,
    next_index: u32,
    sccs: Vec<Vec<usize>>,
}

/// Tarjan's algorithm. SCCs are emitted with dependencies before
/// dependents (reverse topological order of the condensation).
fn tarjan(graph: &ModuleGraph) -> Vec<Vec<usize>> {
    let n = graph.node_count();
    let mut state = TarjanState {
        graph,
        index: vec![None; n],
        lowlink: vec![0; n],
        on_stack: vec![false; n],
        stack: Vec::new(),
        next_index: 0,
        sccs: Vec::new(),
    };
    for node in 0..n {
        if state.index[node].is_none() {
            strong_connect(&mut state, node);
        }
    }
    state.sccs
}

fn strong_connect(state: &mut TarjanState, v: usize) {
    state.index[v] = Some(state.next_index);
    state.lowlink[v] = state.next_index;
    state.next_index += 1;
    state.stack.push(v);
    state.on_stack[v] = true;

    for i in 0..state.graph.edges(v).len() {
        let to = state.graph.edges(v)[i].to.clone();
        let Some(w) = state.graph.resolve(&to) else {
            continue;
        };
        match state.index[w] {
            None => {
                strong_connect(state, w);
                state.lowlink[v] = state.lowlink[v].min(state.lowlink[w]);
            }
            Some(w_index) if state.on_stack[w] => {
                state.lowlink[v] = state.lowlink[v].min(w_index);
            }
            Some(_) => {}
        }
    }

    if state.lowlink[v] == state.index[v].expect("v was just indexed") {
        let mut scc = Vec::new();
        loop {
            let w = state.stack.pop().expect("stack holds the SCC members");
            state.on_stack[w] = false;
            scc.push(w);
            if w == v {
                break;
            }
        }
        state.sccs.push(scc);
    }
}

// ── Cycle classification ────────────────────────────────────────────────

/// Emit `VF5004` for self-edges and `VF5900` once per value cycle.
/// Type-only cycles are silent.
fn classify_cycles(graph: &ModuleGraph, sccs: &[Vec<usize>], diagnostics: &mut Vec<Diagnostic>) {
    for scc in sccs {
        let members: FxHashSet<usize> = scc.iter().copied().collect();

        // Self-edges are always errors, independent of SCC size.
        for &node in scc {
            for edge in graph.edges(node) {
                if graph.resolve(&edge.to) == Some(node) {
                    diagnostics.push(registry::create(
                        "VF5004",
                        edge.location.clone(),
                        &[],
                    ));
                }
            }
        }

        if scc.len() < 2 {
            continue;
        }

        // Intra-SCC edges decide the cycle's kind: type-only iff every
        // edge inside the component is a type edge.
        let mut sorted: Vec<usize> = scc.clone();
        sorted.sort_by(|&a, &b| graph.path(a).cmp(graph.path(b)));

        let mut first_value_edge = None;
        let mut all_type_only = true;
        for &node in &sorted {
            for edge in graph.edges(node) {
                let Some(to) = graph.resolve(&edge.to) else {
                    continue;
                };
                if !members.contains(&to) || to == node {
                    continue;
                }
                if edge.kind == EdgeKind::Value {
                    all_type_only = false;
                    if first_value_edge.is_none() {
                        first_value_edge = Some(edge.location.clone());
                    }
                }
            }
        }

        if all_type_only {
            continue;
        }

        let cycle = cycle_path(graph, &sorted);
        let location = first_value_edge.expect("a value cycle has a value edge");
        diagnostics.push(registry::create("VF5900", location, &[("cycle", &cycle)]));
    }
}

/// Render a cycle as `a.vf -> b.vf -> a.vf`, members in lexicographic
/// order, first member repeated at the end.
fn cycle_path(graph: &ModuleGraph, sorted_members: &[usize]) -> String {
    let mut names: Vec<String> = sorted_members
        .iter()
        .map(|&node| file_name(graph.path(node)))
        .collect();
    if let Some(first) = names.first().cloned() {
        names.push(first);
    }
    names.join(" -> ")
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

// ── Topological ordering ────────────────────────────────────────────────

/// Kahn's algorithm over the SCC-contracted DAG. Ready components are
/// popped in lexicographic order of their smallest member path; members
/// within a component are emitted lexicographically.
fn topological_order(
    graph: &ModuleGraph,
    sccs: &[Vec<usize>],
    scc_of: &[usize],
) -> Vec<PathBuf> {
    let scc_count = sccs.len();

    // The smallest member path keys each SCC for deterministic pops.
    let keys: Vec<&Path> = sccs
        .iter()
        .map(|members| {
            members
                .iter()
                .map(|&node| graph.path(node))
                .min()
                .expect("SCCs are non-empty")
        })
        .collect();

    // dependents[d] lists SCCs that depend on d; in_degree counts each
    // SCC's distinct dependencies.
    let mut dependents: Vec<FxHashSet<usize>> = vec![FxHashSet::default(); scc_count];
    let mut in_degree = vec![0usize; scc_count];
    for (scc_id, members) in sccs.iter().enumerate() {
        let mut deps: FxHashSet<usize> = FxHashSet::default();
        for &node in members {
            for edge in graph.edges(node) {
                let Some(to) = graph.resolve(&edge.to) else {
                    continue;
                };
                let dep = scc_of[to];
                if dep != scc_id {
                    deps.insert(dep);
                }
            }
        }
        in_degree[scc_id] = deps.len();
        for dep in deps {
            dependents[dep].insert(scc_id);
        }
    }

    // Min-heap on (key, scc_id) via Reverse ordering.
    let mut ready: BinaryHeap<std::cmp::Reverse<(&Path, usize)>> = (0..scc_count)
        .filter(|&id| in_degree[id] == 0)
        .map(|id| std::cmp::Reverse((keys[id], id)))
        .collect();

    let mut order = Vec::with_capacity(graph.node_count());
    while let Some(std::cmp::Reverse((_, scc_id))) = ready.pop() {
        let mut members: Vec<&Path> = sccs[scc_id].iter().map(|&n| graph.path(n)).collect();
        members.sort();
        order.extend(members.into_iter().map(Path::to_path_buf));

        let mut unlocked: Vec<usize> = dependents[scc_id].iter().copied().collect();
        unlocked.sort_unstable();
        for dependent in unlocked {
            in_degree[dependent] -= 1;
            if in_degree[dependent] == 0 {
                ready.push(std::cmp::Reverse((keys[dependent], dependent)));
            }
        }
    }

    order
}
