//! Span queries over annotation nodes
//!
//! Provides candidate selection within a span window, nearest-span search,
//! and location propagation for nodes that carry no span of their own.

mod locate;
mod nearest;
mod select;

pub use locate::{Location, LocationPropagator};
pub use nearest::{proximity_score, NearestQuery, Proximity};
pub use select::{CandidateQuery, SpanWindow};
