//! Personalized PageRank over the file reference graph.
//!
//! Computes file importance by power iteration, then distributes each
//! file's rank onto the (file, identifier) pairs its edges name. The
//! teleport distribution is the personalization vector built alongside the
//! graph, and it doubles as the landing distribution for dangling-node
//! mass, so orphan files still receive their share.
//!
//! ```text
//! PR(v) = (1-a) * p[v] + a * sum( PR(u) * w(u,v) / out_weight(u) )
//!                      + a * dangling_mass * p[v]
//! ```
//!
//! Transition probability is proportional to summed edge weight, not edge
//! count: ten references to a symbol pull harder than one.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use petgraph::visit::EdgeRef;

use crate::ranking::graph::TagGraph;
use crate::types::RankedTag;

/// Damping factor: probability of following an edge vs teleporting.
const DAMPING: f64 = 0.85;
/// L1 convergence tolerance.
const TOLERANCE: f64 = 1e-6;
/// Iteration cap; convergence normally arrives far earlier.
const MAX_ITERATIONS: usize = 100;

/// Rank every definition and return them best-first.
///
/// Chat files keep their graph role (they radiate personalization mass)
/// but their own definitions are excluded from the output; the caller
/// already sees those files.
///
/// Ordering: descending rank, ties broken by `(rel_fname, line, name)`
/// ascending, so equal-rank output is deterministic.
pub fn rank_tags(g: &TagGraph, chat_files: &HashSet<String>) -> Vec<RankedTag> {
    let ranks = pagerank(g);
    if ranks.is_empty() {
        return Vec::new();
    }

    // Distribute each file's rank across its outgoing edges by weight,
    // crediting the (definer, identifier) each edge names.
    let mut ranked_definitions: BTreeMap<(Arc<str>, Arc<str>), f64> = BTreeMap::new();

    for u in g.graph.node_indices() {
        let out_weight: f64 = g.graph.edges(u).map(|e| e.weight().weight).sum();
        if out_weight <= 0.0 {
            continue;
        }
        let rank_u = ranks[u.index()];
        for edge in g.graph.edges(u) {
            let data = edge.weight();
            let definer = &g.graph[edge.target()];
            *ranked_definitions
                .entry((Arc::clone(definer), Arc::clone(&data.ident)))
                .or_insert(0.0) += rank_u * data.weight / out_weight;
        }
    }

    // Definitions that collected nothing still get a baseline share of
    // their file's rank, so a well-connected file surfaces even its
    // unreferenced symbols.
    let mut defs_per_file: HashMap<&Arc<str>, usize> = HashMap::new();
    for (fname, _) in g.definitions.keys() {
        *defs_per_file.entry(fname).or_insert(0) += 1;
    }

    for (fname, name) in g.definitions.keys() {
        let key = (Arc::clone(fname), Arc::clone(name));
        if ranked_definitions.contains_key(&key) {
            continue;
        }
        let Some(&node) = g.node_of.get(fname) else {
            continue;
        };
        let file_defs = defs_per_file.get(fname).copied().unwrap_or(0);
        ranked_definitions.insert(key, ranks[node.index()] / (file_defs as f64 + 1.0));
    }

    let mut ranked: Vec<RankedTag> = ranked_definitions
        .into_iter()
        .filter(|((fname, _), _)| !chat_files.contains(fname.as_ref()))
        .filter_map(|((fname, name), rank)| {
            let defs = g.definitions.get(&(Arc::clone(&fname), Arc::clone(&name)))?;
            let line = defs.iter().map(|t| t.line).min()?;
            let rel_fname = Arc::clone(g.rel_of.get(&fname)?);
            Some(RankedTag {
                rank,
                rel_fname,
                fname,
                name,
                line,
            })
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.rank
            .partial_cmp(&a.rank)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.rel_fname.cmp(&b.rel_fname))
            .then_with(|| a.line.cmp(&b.line))
            .then_with(|| a.name.cmp(&b.name))
    });

    ranked
}

/// Power iteration with weighted transitions and personalized teleport.
///
/// Returns per-node rank indexed by `NodeIndex::index()`; empty for an
/// empty graph.
fn pagerank(g: &TagGraph) -> Vec<f64> {
    let n = g.graph.node_count();
    if n == 0 {
        return Vec::new();
    }

    let p = &g.personalization;

    let out_weight: Vec<f64> = g
        .graph
        .node_indices()
        .map(|u| g.graph.edges(u).map(|e| e.weight().weight).sum())
        .collect();

    // Start at the teleport distribution; any positive vector converges to
    // the same fixed point, this one just gets there sooner.
    let mut ranks: Vec<f64> = p.clone();

    for _ in 0..MAX_ITERATIONS {
        let mut next = vec![0.0; n];

        let mut dangling_mass = 0.0;
        for u in g.graph.node_indices() {
            let i = u.index();
            if out_weight[i] <= 0.0 {
                dangling_mass += ranks[i];
                continue;
            }
            let scale = DAMPING * ranks[i] / out_weight[i];
            for edge in g.graph.edges(u) {
                next[edge.target().index()] += scale * edge.weight().weight;
            }
        }

        for (i, rank) in next.iter_mut().enumerate() {
            *rank += (1.0 - DAMPING) * p[i] + DAMPING * dangling_mass * p[i];
        }

        let err: f64 = ranks
            .iter()
            .zip(next.iter())
            .map(|(a, b)| (a - b).abs())
            .sum();
        ranks = next;

        if err < TOLERANCE {
            break;
        }
    }

    ranks
}
