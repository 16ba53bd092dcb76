//! Storage backends for annotation nodes and evaluation results
//!
//! Evaluation reads through `AnnotationStore` and writes through
//! `ResultSink` and `StatusSink`. `SqliteStore` is the persistent backend;
//! `MemoryStore` keeps everything in concurrent maps.

mod cursor;
mod memory;
mod sqlite;
mod traits;

pub use cursor::ScopedScan;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{
    AnnotationStore, OpenStore, ResultSink, ScanHandle, StatusSink, StorageError, StorageResult,
};
