//! Reference graph construction.
//!
//! Aggregates per-file tag streams into a directed, weighted multigraph
//! between files:
//! - Nodes are files (chat-context files and scanned files alike)
//! - One edge per (referrer, definer, identifier): file `u` referencing
//!   identifier `id` defined in file `v` yields `u -> v` tagged with `id`
//! - Edge weight is `mul * sqrt(reference_count)`, where `mul` boosts
//!   identifiers mentioned in the surrounding conversation (x10) and
//!   penalizes underscore-prefixed "private" names (x0.1)
//! - Self-edges are dropped
//!
//! Alongside the graph the builder produces the teleport personalization
//! vector: chat files weigh 100, mentioned files 10, everything else 1,
//! L1-normalized to sum to one.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use petgraph::graph::{DiGraph, NodeIndex};

use crate::types::Tag;

/// One scanned file's identity and extracted tags.
#[derive(Debug, Clone)]
pub struct FileTags {
    /// Absolute path; graph node identity
    pub fname: Arc<str>,
    /// Repo-relative display path, forward-slash normalized
    pub rel_fname: Arc<str>,
    /// Extracted tags (possibly empty; the file is still a node)
    pub tags: Vec<Tag>,
}

/// Edge payload: which identifier produced the edge and at what weight.
#[derive(Debug, Clone)]
pub struct EdgeData {
    pub ident: Arc<str>,
    pub weight: f64,
}

/// The built reference graph plus everything the ranker needs.
pub struct TagGraph {
    /// Directed multigraph; node weight is the absolute path
    pub graph: DiGraph<Arc<str>, EdgeData>,
    /// Absolute path -> node
    pub node_of: HashMap<Arc<str>, NodeIndex>,
    /// Absolute path -> relative display path
    pub rel_of: HashMap<Arc<str>, Arc<str>>,
    /// Normalized teleport distribution, indexed by `NodeIndex::index()`
    pub personalization: Vec<f64>,
    /// (abs path, identifier) -> defining tags, in deterministic key order
    pub definitions: BTreeMap<(Arc<str>, Arc<str>), Vec<Tag>>,
}

/// Mentioned-identifier boost factor.
const MENTIONED_IDENT_MUL: f64 = 10.0;
/// Penalty factor for underscore-prefixed identifiers.
const PRIVATE_IDENT_MUL: f64 = 0.1;

/// Personalization base weights before normalization.
const CHAT_FILE_WEIGHT: f64 = 100.0;
const MENTIONED_FILE_WEIGHT: f64 = 10.0;
const DEFAULT_FILE_WEIGHT: f64 = 1.0;

/// Build the reference graph from per-file tag streams.
///
/// `files` is the full processed set (chat files included) in scan order;
/// `chat_files` holds absolute paths, `mentioned_fnames` relative ones.
pub fn build_graph(
    files: &[FileTags],
    chat_files: &HashSet<String>,
    mentioned_fnames: &HashSet<String>,
    mentioned_idents: &HashSet<String>,
) -> TagGraph {
    // Step 1: index definitions and references.
    // BTree containers keep identifier iteration deterministic, which keeps
    // edge insertion order (and therefore float summation order) stable.
    let mut defines: BTreeMap<Arc<str>, BTreeSet<Arc<str>>> = BTreeMap::new();
    let mut references: BTreeMap<Arc<str>, BTreeMap<Arc<str>, usize>> = BTreeMap::new();
    let mut definitions: BTreeMap<(Arc<str>, Arc<str>), Vec<Tag>> = BTreeMap::new();

    for file in files {
        for tag in &file.tags {
            if tag.is_def() {
                defines
                    .entry(Arc::clone(&tag.name))
                    .or_default()
                    .insert(Arc::clone(&file.fname));
                definitions
                    .entry((Arc::clone(&file.fname), Arc::clone(&tag.name)))
                    .or_default()
                    .push(tag.clone());
            } else {
                *references
                    .entry(Arc::clone(&tag.name))
                    .or_default()
                    .entry(Arc::clone(&file.fname))
                    .or_insert(0) += 1;
            }
        }
    }

    // Nodes: every processed file, in scan order.
    let mut graph: DiGraph<Arc<str>, EdgeData> = DiGraph::new();
    let mut node_of: HashMap<Arc<str>, NodeIndex> = HashMap::new();
    let mut rel_of: HashMap<Arc<str>, Arc<str>> = HashMap::new();

    for file in files {
        if !node_of.contains_key(&file.fname) {
            let idx = graph.add_node(Arc::clone(&file.fname));
            node_of.insert(Arc::clone(&file.fname), idx);
            rel_of.insert(Arc::clone(&file.fname), Arc::clone(&file.rel_fname));
        }
    }

    // Steps 2+3: edges. Identifiers defined but never referenced fall back
    // to self-references so their definitions still collect rank.
    for (name, definers) in &defines {
        let fallback: BTreeMap<Arc<str>, usize>;
        let referrers = match references.get(name) {
            Some(r) => r,
            None => {
                fallback = definers.iter().map(|d| (Arc::clone(d), 1)).collect();
                &fallback
            }
        };

        let mul = if mentioned_idents.contains(name.as_ref()) {
            MENTIONED_IDENT_MUL
        } else if name.starts_with('_') {
            PRIVATE_IDENT_MUL
        } else {
            1.0
        };

        for (referrer, count) in referrers {
            let Some(&ref_node) = node_of.get(referrer) else {
                continue;
            };
            let weight = mul * (*count as f64).sqrt();

            for definer in definers {
                if definer == referrer {
                    continue;
                }
                if let Some(&def_node) = node_of.get(definer) {
                    graph.add_edge(
                        ref_node,
                        def_node,
                        EdgeData {
                            ident: Arc::clone(name),
                            weight,
                        },
                    );
                }
            }
        }
    }

    // Step 4: teleport personalization, L1-normalized.
    let mut personalization = vec![0.0; graph.node_count()];
    for (fname, &idx) in &node_of {
        let rel = rel_of.get(fname).map(|r| r.as_ref()).unwrap_or("");
        let weight = if chat_files.contains(fname.as_ref()) {
            CHAT_FILE_WEIGHT
        } else if mentioned_fnames.contains(rel) {
            MENTIONED_FILE_WEIGHT
        } else {
            DEFAULT_FILE_WEIGHT
        };
        personalization[idx.index()] = weight;
    }
    let total: f64 = personalization.iter().sum();
    if total > 0.0 {
        for w in &mut personalization {
            *w /= total;
        }
    }

    TagGraph {
        graph,
        node_of,
        rel_of,
        personalization,
        definitions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TagKind;
    use petgraph::visit::EdgeRef;

    fn make_tag(rel: &str, name: &str, kind: TagKind) -> Tag {
        Tag {
            rel_fname: rel.into(),
            fname: format!("/repo/{rel}").into(),
            name: name.into(),
            line: 0,
            kind,
        }
    }

    fn file(rel: &str, tags: Vec<Tag>) -> FileTags {
        FileTags {
            fname: format!("/repo/{rel}").into(),
            rel_fname: rel.into(),
            tags,
        }
    }

    fn edge_weight_between(g: &TagGraph, from: &str, to: &str) -> f64 {
        let from_idx = g.node_of[&Arc::<str>::from(format!("/repo/{from}"))];
        let to_idx = g.node_of[&Arc::<str>::from(format!("/repo/{to}"))];
        g.graph
            .edges(from_idx)
            .filter(|e| e.target() == to_idx)
            .map(|e| e.weight().weight)
            .sum()
    }

    #[test]
    fn test_reference_creates_edge() {
        let files = vec![
            file("a.rs", vec![make_tag("a.rs", "foo", TagKind::Def)]),
            file("b.rs", vec![make_tag("b.rs", "foo", TagKind::Ref)]),
        ];
        let g = build_graph(&files, &HashSet::new(), &HashSet::new(), &HashSet::new());

        assert_eq!(g.graph.node_count(), 2);
        assert_eq!(g.graph.edge_count(), 1);
        assert!((edge_weight_between(&g, "b.rs", "a.rs") - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_reference_count_sqrt_weight() {
        let files = vec![
            file("a.rs", vec![make_tag("a.rs", "foo", TagKind::Def)]),
            file(
                "b.rs",
                vec![
                    make_tag("b.rs", "foo", TagKind::Ref),
                    make_tag("b.rs", "foo", TagKind::Ref),
                    make_tag("b.rs", "foo", TagKind::Ref),
                    make_tag("b.rs", "foo", TagKind::Ref),
                ],
            ),
        ];
        let g = build_graph(&files, &HashSet::new(), &HashSet::new(), &HashSet::new());

        assert!((edge_weight_between(&g, "b.rs", "a.rs") - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_self_edges_suppressed() {
        let files = vec![file(
            "a.rs",
            vec![
                make_tag("a.rs", "foo", TagKind::Def),
                make_tag("a.rs", "foo", TagKind::Ref),
            ],
        )];
        let g = build_graph(&files, &HashSet::new(), &HashSet::new(), &HashSet::new());

        assert_eq!(g.graph.edge_count(), 0);
    }

    #[test]
    fn test_unreferenced_definition_self_fallback() {
        // "lonely" is defined in a.rs, referenced nowhere; the fallback
        // makes the definer its own referrer, but the self-edge rule drops
        // it, so the graph stays edge-free while the definition survives in
        // the definitions index.
        let files = vec![
            file("a.rs", vec![make_tag("a.rs", "lonely", TagKind::Def)]),
            file("b.rs", vec![]),
        ];
        let g = build_graph(&files, &HashSet::new(), &HashSet::new(), &HashSet::new());

        assert_eq!(g.graph.edge_count(), 0);
        assert!(g
            .definitions
            .contains_key(&("/repo/a.rs".into(), "lonely".into())));
    }

    #[test]
    fn test_mentioned_identifier_boost() {
        let files = vec![
            file("a.rs", vec![make_tag("a.rs", "foo", TagKind::Def)]),
            file("b.rs", vec![make_tag("b.rs", "foo", TagKind::Ref)]),
        ];
        let mentioned: HashSet<String> = ["foo".to_string()].into();
        let g = build_graph(&files, &HashSet::new(), &HashSet::new(), &mentioned);

        assert!((edge_weight_between(&g, "b.rs", "a.rs") - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_underscore_penalty() {
        let files = vec![
            file("a.rs", vec![make_tag("a.rs", "_internal", TagKind::Def)]),
            file("b.rs", vec![make_tag("b.rs", "_internal", TagKind::Ref)]),
        ];
        let g = build_graph(&files, &HashSet::new(), &HashSet::new(), &HashSet::new());

        assert!((edge_weight_between(&g, "b.rs", "a.rs") - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_mentioned_wins_over_underscore() {
        let files = vec![
            file("a.rs", vec![make_tag("a.rs", "_special", TagKind::Def)]),
            file("b.rs", vec![make_tag("b.rs", "_special", TagKind::Ref)]),
        ];
        let mentioned: HashSet<String> = ["_special".to_string()].into();
        let g = build_graph(&files, &HashSet::new(), &HashSet::new(), &mentioned);

        assert!((edge_weight_between(&g, "b.rs", "a.rs") - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_personalization_weights_and_normalization() {
        let files = vec![
            file("chat.rs", vec![]),
            file("mentioned.rs", vec![]),
            file("plain.rs", vec![]),
        ];
        let chat: HashSet<String> = ["/repo/chat.rs".to_string()].into();
        let mentioned: HashSet<String> = ["mentioned.rs".to_string()].into();
        let g = build_graph(&files, &chat, &mentioned, &HashSet::new());

        let total: f64 = g.personalization.iter().sum();
        assert!((total - 1.0).abs() < 1e-12);

        let p = |rel: &str| {
            let idx = g.node_of[&Arc::<str>::from(format!("/repo/{rel}"))];
            g.personalization[idx.index()]
        };
        assert!((p("chat.rs") / p("plain.rs") - 100.0).abs() < 1e-9);
        assert!((p("mentioned.rs") / p("plain.rs") - 10.0).abs() < 1e-9);
    }
}
