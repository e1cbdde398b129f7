//! Jujutsu Log Viewer (jjlv)
//!
//! TUI viewer for the `jj` revision graph. Runs `jj log` as a subprocess,
//! reconstructs the revision DAG from its colored ASCII-art output, and
//! renders a virtualized, navigable view of it.
//!
//! Pipeline: escape-sequence decoding ([`parser::ansi`]) -> line grouping
//! ([`parser::lines`]) -> row assembly ([`parser::rows`]) -> DAG
//! construction ([`graph`]) -> per-row rendering ([`render::iterator`]) ->
//! windowed compositing ([`render::viewport`]).

pub mod config;
pub mod exec;
pub mod graph;
pub mod logging;
pub mod model;
pub mod parser;
pub mod render;
pub mod view;
