//! Blank node relabeling by iterative signature refinement.
//!
//! Every blank node starts with a signature built from the shapes of the
//! triples it appears in (other blank nodes masked). Each round folds the
//! current signatures of adjacent blank nodes back into each node's
//! signature. Refinement stops once the partition of nodes by signature stops
//! splitting, or at the round cap. Nodes are then labeled `_:b0`, `_:b1`, …
//! in signature order.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use kgen_canonical::{hash_bytes, Cid, DigestAlg};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::term::{Term, Triple};

/// Default cap on refinement rounds.
pub const MAX_ROUNDS: usize = 10;

/// Prefix of canonical blank node labels.
pub const CANONICAL_PREFIX: &str = "b";

/// Result of graph canonicalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalGraph {
    /// Sorted, deduplicated N-Triples lines without trailing newlines.
    pub triples: Vec<String>,
    /// Original blank node label to canonical label (both without `_:`).
    pub blank_node_map: BTreeMap<String, String>,
    /// Refinement rounds executed.
    pub rounds: usize,
    /// True when labeling may depend on input order: the round cap was hit
    /// or some blank nodes remained indistinguishable.
    pub approximate: bool,
}

impl CanonicalGraph {
    /// Serialized form: each line followed by `\n`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for line in &self.triples {
            out.extend_from_slice(line.as_bytes());
            out.push(b'\n');
        }
        out
    }

    /// Content identifier of [`CanonicalGraph::to_bytes`].
    pub fn cid(&self, alg: DigestAlg) -> Cid {
        hash_bytes(&self.to_bytes(), alg)
    }

    /// Serialized form as a string.
    pub fn to_ntriples(&self) -> String {
        let mut out = String::new();
        for line in &self.triples {
            out.push_str(line);
            out.push('\n');
        }
        out
    }
}

/// Configurable graph canonicalizer.
#[derive(Debug, Clone)]
pub struct GraphCanonicalizer {
    max_rounds: usize,
}

impl Default for GraphCanonicalizer {
    fn default() -> Self {
        Self {
            max_rounds: MAX_ROUNDS,
        }
    }
}

impl GraphCanonicalizer {
    /// Canonicalizer with the default round cap.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the round cap.
    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    /// Round cap in effect.
    pub fn max_rounds(&self) -> usize {
        self.max_rounds
    }

    /// Canonicalizes a set of triples.
    pub fn canonicalize(&self, triples: &[Triple]) -> CanonicalGraph {
        let mut seen = HashSet::new();
        let unique: Vec<Triple> = triples
            .iter()
            .map(Triple::normalized)
            .filter(|triple| seen.insert(triple.clone()))
            .collect();
        let triples = unique.as_slice();

        let index = BlankIndex::build(triples);
        let mut signatures = index.initial_signatures(triples);
        let mut classes = distinct(&signatures);
        let mut rounds = 0;
        let mut converged = classes == signatures.len();

        while !converged && rounds < self.max_rounds {
            let next = index.refine(triples, &signatures);
            rounds += 1;
            let next_classes = distinct(&next);
            signatures = next;
            if next_classes == classes || next_classes == signatures.len() {
                converged = true;
            }
            classes = next_classes;
        }

        let tied = classes < signatures.len();
        let approximate = !converged || tied;

        let mut order: Vec<usize> = (0..index.labels.len()).collect();
        order.sort_by(|a, b| signatures[*a].cmp(&signatures[*b]).then(a.cmp(b)));

        let mut canonical = vec![String::new(); index.labels.len()];
        let mut blank_node_map = BTreeMap::new();
        for (position, node) in order.into_iter().enumerate() {
            let label = format!("{}{}", CANONICAL_PREFIX, position);
            blank_node_map.insert(index.labels[node].clone(), label.clone());
            canonical[node] = label;
        }

        let lines: BTreeSet<String> = triples
            .iter()
            .map(|triple| {
                let subject = index.text(&triple.subject, &canonical);
                let object = index.text(&triple.object, &canonical);
                let predicate = Term::iri(triple.predicate.clone()).canonical_text_with("");
                format!("{} {} {} .", subject, predicate, object)
            })
            .collect();

        debug!(
            triples = lines.len(),
            blank_nodes = index.labels.len(),
            rounds,
            approximate,
            "canonicalized graph"
        );

        CanonicalGraph {
            triples: lines.into_iter().collect(),
            blank_node_map,
            rounds,
            approximate,
        }
    }
}

/// Canonicalizes `triples` with the default round cap.
pub fn canonicalize_graph(triples: &[Triple]) -> CanonicalGraph {
    GraphCanonicalizer::default().canonicalize(triples)
}

/// Blank nodes in first-appearance order and the triples touching each.
struct BlankIndex {
    labels: Vec<String>,
    positions: HashMap<String, usize>,
    touching: Vec<Vec<usize>>,
}

impl BlankIndex {
    fn build(triples: &[Triple]) -> Self {
        let mut index = BlankIndex {
            labels: Vec::new(),
            positions: HashMap::new(),
            touching: Vec::new(),
        };
        for (i, triple) in triples.iter().enumerate() {
            let subject = index.intern(&triple.subject);
            let object = index.intern(&triple.object);
            if let Some(s) = subject {
                index.touching[s].push(i);
            }
            if let Some(o) = object.filter(|o| Some(*o) != subject) {
                index.touching[o].push(i);
            }
        }
        index
    }

    fn intern(&mut self, term: &Term) -> Option<usize> {
        let label = term.blank_label()?;
        if let Some(position) = self.positions.get(label) {
            return Some(*position);
        }
        let position = self.labels.len();
        self.labels.push(label.to_string());
        self.positions.insert(label.to_string(), position);
        self.touching.push(Vec::new());
        Some(position)
    }

    fn position(&self, term: &Term) -> Option<usize> {
        term.blank_label()
            .and_then(|label| self.positions.get(label).copied())
    }

    fn text(&self, term: &Term, canonical: &[String]) -> String {
        match self.position(term) {
            Some(node) => term.canonical_text_with(&canonical[node]),
            None => term.canonical_text_with(""),
        }
    }

    /// Shape of `triple` as seen from `node`.
    fn shape(&self, triple: &Triple, node: usize) -> String {
        let mask = |term: &Term| match self.position(term) {
            Some(n) if n == node => "_:self".to_string(),
            Some(_) => "_:other".to_string(),
            None => term.canonical_text_with(""),
        };
        format!(
            "{} {} {}",
            mask(&triple.subject),
            Term::iri(triple.predicate.clone()).canonical_text_with(""),
            mask(&triple.object)
        )
    }

    fn initial_signatures(&self, triples: &[Triple]) -> Vec<String> {
        (0..self.labels.len())
            .map(|node| {
                let mut shapes: Vec<String> = self.touching[node]
                    .iter()
                    .map(|t| self.shape(&triples[*t], node))
                    .collect();
                shapes.sort();
                digest(None, &shapes)
            })
            .collect()
    }

    fn refine(&self, triples: &[Triple], signatures: &[String]) -> Vec<String> {
        (0..self.labels.len())
            .map(|node| {
                let mut edges = Vec::new();
                for t in &self.touching[node] {
                    let triple = &triples[*t];
                    let predicate = &triple.predicate;
                    if let (Some(s), Some(o)) =
                        (self.position(&triple.subject), self.position(&triple.object))
                    {
                        if s == node && o != node {
                            edges.push(format!("out {} {}", predicate, signatures[o]));
                        }
                        if o == node && s != node {
                            edges.push(format!("in {} {}", predicate, signatures[s]));
                        }
                    }
                }
                edges.sort();
                digest(Some(&signatures[node]), &edges)
            })
            .collect()
    }
}

fn digest(previous: Option<&str>, entries: &[String]) -> String {
    let mut hasher = Sha256::new();
    if let Some(previous) = previous {
        hasher.update(previous.as_bytes());
        hasher.update(b"\n");
    }
    for entry in entries {
        hasher.update(entry.as_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}

fn distinct(signatures: &[String]) -> usize {
    signatures.iter().collect::<BTreeSet<_>>().len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ground_graphs_need_no_rounds() {
        let triples = vec![Triple::new(
            Term::iri("http://example.org/a"),
            "http://example.org/p",
            Term::literal("x"),
        )];
        let graph = canonicalize_graph(&triples);
        assert_eq!(graph.rounds, 0);
        assert!(!graph.approximate);
        assert!(graph.blank_node_map.is_empty());
    }

    #[test]
    fn zero_round_cap_on_ambiguous_input_is_approximate() {
        let triples = vec![
            Triple::new(Term::blank("x"), "http://example.org/p", Term::blank("y")),
            Triple::new(Term::blank("y"), "http://example.org/p", Term::blank("z")),
            Triple::new(Term::blank("z"), "http://example.org/p", Term::blank("w")),
        ];
        let graph = GraphCanonicalizer::new()
            .with_max_rounds(0)
            .canonicalize(&triples);
        assert_eq!(graph.rounds, 0);
        assert!(graph.approximate);
    }
}
