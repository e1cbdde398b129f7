//! Core data model for the revision graph.
//!
//! The types here are produced by the parser, annotated by the graph
//! builder, and consumed by the renderers. They own no I/O.

pub mod error;
pub mod revision;
pub mod row;
pub mod segment;

pub use error::{AppError, CommandError, ConfigError};
pub use revision::Revision;
pub use row::{LineFlags, Row, RowLine};
pub use segment::Segment;
