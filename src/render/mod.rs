//! Row rendering and the virtualized viewport.
//!
//! [`iterator`] turns rows into styled terminal lines; [`viewport`] keeps
//! a scroll window over them and materializes only what the terminal
//! shows; [`overlay`] is the contract through which an active operation
//! injects content around a row.

pub mod iterator;
pub mod overlay;
pub mod viewport;

pub use iterator::{
    GraphRowIterator, LaneTracer, LevelTracer, NoopTracer, RenderSink, RowIterator, RowStyles,
};
pub use overlay::{NoOperation, Operation, OverlayPosition, StaticOverlay};
pub use viewport::{GraphView, RowMarker};
