//! Candidate selection: which nodes of one system are in play

use crate::config::{UnitFilter, UnitOfAnalysis};
use crate::model::{AnnotationNode, Span};

/// Spatial constraint on candidate spans
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanWindow {
    /// Same begin and end
    Exact(Span),
    /// Begin and end each within `distance` of the center's
    Within { center: Span, distance: usize },
}

impl SpanWindow {
    /// Exact window for fuzz 0, widened window otherwise
    pub fn for_fuzz(center: Span, fuzz: usize) -> Self {
        if fuzz == 0 {
            SpanWindow::Exact(center)
        } else {
            SpanWindow::Within {
                center,
                distance: fuzz,
            }
        }
    }

    /// Inclusive bounds on begin offsets
    pub fn begin_bounds(&self) -> (usize, usize) {
        match self {
            SpanWindow::Exact(span) => (span.begin, span.begin),
            SpanWindow::Within { center, distance } => widen(center.begin, *distance),
        }
    }

    /// Inclusive bounds on end offsets
    pub fn end_bounds(&self) -> (usize, usize) {
        match self {
            SpanWindow::Exact(span) => (span.end, span.end),
            SpanWindow::Within { center, distance } => widen(center.end, *distance),
        }
    }

    pub fn contains(&self, span: &Span) -> bool {
        let (begin_lo, begin_hi) = self.begin_bounds();
        let (end_lo, end_hi) = self.end_bounds();
        (begin_lo..=begin_hi).contains(&span.begin) && (end_lo..=end_hi).contains(&span.end)
    }
}

fn widen(offset: usize, distance: usize) -> (usize, usize) {
    (offset.saturating_sub(distance), offset.saturating_add(distance))
}

/// Nodes of one system, type and document, optionally within a span window
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateQuery {
    pub system: String,
    pub type_name: String,
    pub document_id: String,
    pub filters: Vec<UnitFilter>,
    pub window: Option<SpanWindow>,
}

impl CandidateQuery {
    /// All nodes of a unit of analysis within one document
    pub fn for_unit(unit: &UnitOfAnalysis, document_id: impl Into<String>) -> Self {
        Self {
            system: unit.system().to_string(),
            type_name: unit.type_name().to_string(),
            document_id: document_id.into(),
            filters: unit.filters().to_vec(),
            window: None,
        }
    }

    pub fn within(mut self, window: SpanWindow) -> Self {
        self.window = Some(window);
        self
    }

    /// Whether a node of `self.system` belongs to the selection
    ///
    /// A windowed query never selects nodes without a span.
    pub fn matches(&self, node: &AnnotationNode) -> bool {
        if node.document_id != self.document_id || !node.is_a(&self.type_name) {
            return false;
        }
        if let Some(window) = &self.window {
            match &node.primary_span {
                Some(span) if window.contains(span) => {}
                _ => return false,
            }
        }
        self.passes_filters(node)
    }

    /// The attribute filters alone
    pub fn passes_filters(&self, node: &AnnotationNode) -> bool {
        self.filters.iter().all(|f| f.matches(node))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FilterOption;

    #[test]
    fn test_fuzz_zero_is_exact() {
        let window = SpanWindow::for_fuzz(Span::new(100, 110), 0);
        assert!(window.contains(&Span::new(100, 110)));
        assert!(!window.contains(&Span::new(100, 111)));
    }

    #[test]
    fn test_fuzzy_window_bounds_each_offset() {
        let window = SpanWindow::for_fuzz(Span::new(100, 110), 5);
        assert!(window.contains(&Span::new(95, 115)));
        assert!(window.contains(&Span::new(104, 106)));
        assert!(!window.contains(&Span::new(94, 110)));
        assert!(!window.contains(&Span::new(100, 116)));
    }

    #[test]
    fn test_window_saturates_at_zero() {
        let window = SpanWindow::for_fuzz(Span::new(2, 4), 5);
        assert_eq!(window.begin_bounds(), (0, 7));
        assert!(window.contains(&Span::new(0, 0)));
    }

    #[test]
    fn test_query_checks_document_type_window_and_filters() {
        let unit = UnitOfAnalysis::new("sys", "Annotation")
            .with_filter(UnitFilter::new("kind", FilterOption::Equals, "drug"));
        let query = CandidateQuery::for_unit(&unit, "doc-1")
            .within(SpanWindow::Exact(Span::new(0, 5)));

        let hit = AnnotationNode::new("n1", "doc-1", "Drug")
            .with_ancestor("Annotation")
            .with_attribute("kind", "drug")
            .with_span(0, 5);
        assert!(query.matches(&hit));

        let other_doc = AnnotationNode { document_id: "doc-2".into(), ..hit.clone() };
        assert!(!query.matches(&other_doc));

        let moved = hit.clone().with_span(1, 5);
        assert!(!query.matches(&moved));

        let unspanned = AnnotationNode { primary_span: None, ..hit.clone() };
        assert!(!query.matches(&unspanned));

        let filtered = hit.with_attribute("kind", "disease");
        assert!(!query.matches(&filtered));
    }
}
