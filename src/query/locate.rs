//! Location propagation for nodes without a span of their own
//!
//! Feature structures that are not annotations (concept records, attribute
//! bags, list members) have no text span. They borrow the span of the
//! nearest annotation that reaches them through child or reference edges.

use crate::model::{AnnotationNode, NodeId, Span};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// A span borrowed from a node `distance` hops up the parent graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub span: Span,
    pub distance: usize,
}

/// Breadth-first search from a node toward the nodes that point at it
#[derive(Debug, Clone, Default)]
pub struct LocationPropagator {
    /// child -> nodes that hold it as a child or reference target
    parents: HashMap<NodeId, Vec<NodeId>>,
    spans: HashMap<NodeId, Span>,
}

impl LocationPropagator {
    pub fn new(parents: HashMap<NodeId, Vec<NodeId>>, spans: HashMap<NodeId, Span>) -> Self {
        Self { parents, spans }
    }

    /// Build the parent edges and known spans of one document's nodes
    pub fn from_nodes<'a>(nodes: impl IntoIterator<Item = &'a AnnotationNode>) -> Self {
        let mut parents: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        let mut spans = HashMap::new();

        for node in nodes {
            if let Some(span) = node.primary_span {
                spans.insert(node.id.clone(), span);
            }
            for child in &node.children {
                parents.entry(child.clone()).or_default().push(node.id.clone());
            }
            for target in node.references.values() {
                parents.entry(target.clone()).or_default().push(node.id.clone());
            }
        }

        Self { parents, spans }
    }

    /// Every span reachable from `id`, grouped by hop distance
    ///
    /// Distance 0 holds the node's own span if it has one. Each parent is
    /// visited at most once, at its shortest distance.
    pub fn locations_by_distance(&self, id: &NodeId) -> BTreeMap<usize, BTreeSet<Span>> {
        let mut table: BTreeMap<usize, BTreeSet<Span>> = BTreeMap::new();

        if let Some(span) = self.spans.get(id) {
            table.entry(0).or_default().insert(*span);
        }

        let mut visited: HashSet<&NodeId> = HashSet::new();
        visited.insert(id);
        let mut current_level: Vec<&NodeId> = vec![id];
        let mut distance = 0;

        while !current_level.is_empty() {
            distance += 1;
            let mut next_level = Vec::new();

            for node_id in current_level {
                let Some(parents) = self.parents.get(node_id) else {
                    continue;
                };
                for parent in parents {
                    if !visited.insert(parent) {
                        continue;
                    }
                    if let Some(span) = self.spans.get(parent) {
                        table.entry(distance).or_default().insert(*span);
                    }
                    next_level.push(parent);
                }
            }

            current_level = next_level;
        }

        table
    }

    /// The closest span, with ties at one distance broken by the smallest span
    pub fn locate(&self, id: &NodeId) -> Option<Location> {
        self.locations_by_distance(id)
            .into_iter()
            .find_map(|(distance, spans)| {
                spans
                    .into_iter()
                    .next()
                    .map(|span| Location { span, distance })
            })
    }

    /// Fill `primary_span` on every node that lacks one and can borrow one
    ///
    /// Returns the number of nodes that received a span.
    pub fn assign(&self, nodes: &mut [AnnotationNode]) -> usize {
        let mut assigned = 0;
        for node in nodes.iter_mut().filter(|n| n.primary_span.is_none()) {
            if let Some(location) = self.locate(&node.id) {
                node.primary_span = Some(location.span);
                assigned += 1;
            }
        }
        assigned
    }
}
