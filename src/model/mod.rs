//! Core data structures: attribute values, annotation nodes, audit records

mod node;
mod record;
mod value;

pub use node::{AnnotationNode, Attributes, NodeId, Span};
pub use record::{Classification, MatchRecord, RecordKey};
pub use value::Value;
