//! Annotation node representation

use super::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Identifier of an annotation node within one system
///
/// Serializes as a plain string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A (begin, end) character-offset interval in a source document
///
/// Ordering is lexicographic on (begin, end).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Span {
    pub begin: usize,
    pub end: usize,
}

impl Span {
    pub fn new(begin: usize, end: usize) -> Self {
        Self { begin, end }
    }

    /// Euclidean distance between the (begin, end) points of two spans
    pub fn distance(&self, other: &Span) -> f64 {
        let db = self.begin as f64 - other.begin as f64;
        let de = self.end as f64 - other.end as f64;
        (db * db + de * de).sqrt()
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.begin, self.end)
    }
}

/// Named attribute values of a node
pub type Attributes = HashMap<String, Value>;

/// An attributed node produced by one annotation system for one document
///
/// `types` holds the node's own type followed by its ancestor chain, most
/// specific first. `children` lists member ids for array and list
/// containers; `references` maps reference features to the referenced node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationNode {
    pub id: NodeId,
    pub document_id: String,
    pub types: Vec<String>,
    #[serde(default)]
    pub attributes: Attributes,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeId>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub references: HashMap<String, NodeId>,
    #[serde(default)]
    pub primary_span: Option<Span>,
}

impl AnnotationNode {
    /// Create a node of the given type in a document
    pub fn new(
        id: impl Into<NodeId>,
        document_id: impl Into<String>,
        type_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            document_id: document_id.into(),
            types: vec![type_name.into()],
            attributes: HashMap::new(),
            children: Vec::new(),
            references: HashMap::new(),
            primary_span: None,
        }
    }

    /// Append a supertype to the ancestor chain
    pub fn with_ancestor(mut self, type_name: impl Into<String>) -> Self {
        self.types.push(type_name.into());
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_span(mut self, begin: usize, end: usize) -> Self {
        self.primary_span = Some(Span::new(begin, end));
        self
    }

    pub fn with_child(mut self, child: impl Into<NodeId>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn with_reference(mut self, name: impl Into<String>, target: impl Into<NodeId>) -> Self {
        self.references.insert(name.into(), target.into());
        self
    }

    /// The most specific type name
    pub fn type_name(&self) -> &str {
        self.types.first().map(String::as_str).unwrap_or_default()
    }

    /// Whether the node is of the given type or has it as an ancestor
    pub fn is_a(&self, type_name: &str) -> bool {
        self.types.iter().any(|t| t == type_name)
    }

    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Whether the node is an array/list container
    pub fn is_container(&self) -> bool {
        !self.children.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_a_checks_ancestor_chain() {
        let node = AnnotationNode::new("n1", "doc", "Drug").with_ancestor("Annotation");
        assert_eq!(node.type_name(), "Drug");
        assert!(node.is_a("Drug"));
        assert!(node.is_a("Annotation"));
        assert!(!node.is_a("Disease"));
    }

    #[test]
    fn test_span_distance() {
        let a = Span::new(0, 0);
        let b = Span::new(3, 4);
        assert_eq!(a.distance(&b), 5.0);
        assert_eq!(b.distance(&b), 0.0);
    }

    #[test]
    fn test_span_orders_lexicographically() {
        assert!(Span::new(1, 9) < Span::new(2, 3));
        assert!(Span::new(2, 3) < Span::new(2, 4));
    }

    #[test]
    fn test_node_json_roundtrip_uses_camel_case() {
        let node = AnnotationNode::new("n1", "doc-1", "Token")
            .with_attribute("pos", "NN")
            .with_span(4, 9);
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["documentId"], "doc-1");
        assert_eq!(json["primarySpan"]["begin"], 4);

        let back: AnnotationNode = serde_json::from_value(json).unwrap();
        assert_eq!(back, node);
    }
}
