//! Injected-content contract for multi-step operations.
//!
//! An active operation (rebase target picking, squash, abandon
//! confirmation, ...) can inject plain text around a row without the
//! pipeline re-parsing anything: before the row, after it, in front of the
//! change-id, or in place of the description lines. Content may span
//! multiple newline-delimited lines; the renderer supplies the matching
//! gutter via the extend/chop helpers, so operations never reason about
//! gutter width themselves.

use crate::model::Revision;

/// Where injected content lands relative to a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayPosition {
    /// Extra lines rendered above the row, under the previous row's
    /// extended gutter.
    Before,
    /// Extra lines rendered below the row, under this row's extended
    /// gutter.
    After,
    /// A short marker spliced between the gutter and the change-id on the
    /// revision line.
    BeforeChangeId,
    /// Replacement for the row's description lines; only applies to the
    /// highlighted row.
    OverDescription,
}

/// An in-place overlay for a multi-step operation.
pub trait Operation {
    /// Content for the given row and position, or `None` to inject
    /// nothing.
    fn render(&self, revision: &Revision, position: OverlayPosition) -> Option<String>;

    /// Short operation name for the status line.
    fn name(&self) -> &'static str;
}

/// The idle state: injects nothing anywhere.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOperation;

impl Operation for NoOperation {
    fn render(&self, _revision: &Revision, _position: OverlayPosition) -> Option<String> {
        None
    }

    fn name(&self) -> &'static str {
        "none"
    }
}

/// Fixed text attached to one revision at one position.
///
/// The building block for simple operation prompts ("<< onto >>" markers,
/// inline confirmations) and the workhorse of renderer tests.
#[derive(Debug, Clone)]
pub struct StaticOverlay {
    target: String,
    position: OverlayPosition,
    text: String,
    name: &'static str,
}

impl StaticOverlay {
    /// Attach `text` to the revision with the given change-id.
    pub fn new(target: impl Into<String>, position: OverlayPosition, text: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            position,
            text: text.into(),
            name: "overlay",
        }
    }

    /// Override the status-line name.
    pub fn named(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }
}

impl Operation for StaticOverlay {
    fn render(&self, revision: &Revision, position: OverlayPosition) -> Option<String> {
        (position == self.position && revision.change_id == self.target)
            .then(|| self.text.clone())
    }

    fn name(&self) -> &'static str {
        self.name
    }
}
