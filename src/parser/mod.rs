//! Streaming parser for the graph-log output.
//!
//! Three stages, each lazy:
//!
//! 1. [`ansi`] — bytes with SGR escapes -> styled [`crate::model::Segment`]s
//! 2. [`lines`] — segments -> per-terminal-line segment groups
//! 3. [`rows`] — lines -> [`crate::model::Row`]s, streamed in batches
//!    under a consumer-paced backpressure protocol
//!
//! Plus [`parents`], which parses the separate `--no-graph` metadata
//! listing (parents, full ids, authors) joined onto rows by change-id.

pub mod ansi;
pub mod lines;
pub mod parents;
pub mod rows;

pub use ansi::decode;
pub use lines::break_lines;
pub use parents::{annotate_rows, mark_affected, parse_revision_meta, RevisionMeta};
pub use rows::{parse_rows, parse_rows_streaming, Control, RowAssembler, RowBatch};
