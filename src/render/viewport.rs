//! Virtualized viewport over the rendered line stream.
//!
//! [`GraphView`] keeps a scroll window (`start..end` line offsets) over
//! the full rendered output without materializing every row: rows entirely
//! above the window are skipped (their line count tracked so absolute line
//! numbers stay correct), and rendering stops once the output reaches past
//! the window end *and* past the highlighted row. After each pass the
//! window shifts so the highlighted row's line range is inside
//! `[start, end)` — the cursor row is never clipped out.
//!
//! A per-pass marker list maps absolute starting line numbers to row
//! indices for pointer hit-testing. Window state persists across renders
//! of one snapshot; [`GraphView::reset_view`] clears it when the snapshot
//! changes.

use crate::render::iterator::{RenderSink, RowIterator};
use ratatui::text::{Line, Text};

/// Maps an absolute starting line number to a row index. Append-only per
/// render pass; starting lines are strictly increasing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowMarker {
    /// Row index in the arena.
    pub row: usize,
    /// Absolute line number of the row's first rendered line.
    pub start_line: usize,
}

#[derive(Debug, Default)]
struct ViewRange {
    start: usize,
    end: usize,
    last_row: Option<usize>,
}

impl ViewRange {
    fn reset(&mut self) {
        self.start = 0;
        self.end = 0;
        self.last_row = None;
    }
}

/// Windowed renderer for the revision graph.
pub struct GraphView {
    lines: Vec<Line<'static>>,
    markers: Vec<RowMarker>,
    skipped: usize,
    view: ViewRange,
    width: u16,
    height: u16,
}

impl RenderSink for GraphView {
    fn push_line(&mut self, line: Line<'static>) {
        self.lines.push(line);
    }
}

impl GraphView {
    /// Create a view for the given terminal size.
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            lines: Vec::new(),
            markers: Vec::new(),
            skipped: 0,
            view: ViewRange::default(),
            width,
            height,
        }
    }

    /// Terminal width in columns.
    pub fn width(&self) -> u16 {
        self.width
    }

    /// Resize the view; the window end re-clamps to the new height.
    pub fn set_size(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
        if self.view.end < self.view.start + height as usize {
            self.view.end = self.view.start + height as usize;
        }
    }

    /// Forget all window state; call when a new snapshot replaces the
    /// rows.
    pub fn reset_view(&mut self) {
        self.view.reset();
        self.lines.clear();
        self.markers.clear();
        self.skipped = 0;
    }

    /// Index of the last row rendered (or skipped past) in the previous
    /// pass.
    pub fn last_row_index(&self) -> Option<usize> {
        self.view.last_row
    }

    /// The current window as absolute line offsets.
    pub fn view_range(&self) -> (usize, usize) {
        (self.view.start, self.view.end)
    }

    /// Total line count accounted for so far, including skipped lines.
    fn line_count(&self) -> usize {
        self.skipped + self.lines.len()
    }

    /// Render one pass over the iterator and return the visible block.
    ///
    /// The block is exactly `height` lines tall (padded with blanks past
    /// the end of content) and after the pass the highlighted row's line
    /// range intersects the window.
    pub fn render(&mut self, iterator: &mut dyn RowIterator) -> Text<'static> {
        self.lines.clear();
        self.markers.clear();
        self.skipped = 0;

        let height = self.height as usize;
        if self.view.end - self.view.start != height {
            self.view.end = self.view.start + height;
        }

        let mut selected: Option<(usize, usize)> = None;
        let mut last_rendered: Option<usize> = None;
        let mut index = 0usize;
        while iterator.next_row() {
            let selected_start = if iterator.is_highlighted() {
                self.line_count()
            } else {
                let row_lines = iterator.row_height();
                if row_lines + self.line_count() < self.view.start {
                    // Entirely above the window: account for the lines
                    // without rendering them.
                    self.skipped += row_lines;
                    index += 1;
                    continue;
                }
                0
            };
            self.markers.push(RowMarker {
                row: index,
                start_line: self.line_count(),
            });
            iterator.render(self);
            if iterator.is_highlighted() {
                selected = Some((selected_start, self.line_count()));
            }
            if selected.is_some()
                && self.line_count() > height
                && self.line_count() > self.view.end
            {
                last_rendered = Some(index);
                break;
            }
            index += 1;
        }
        self.view.last_row = last_rendered.or_else(|| iterator.len().checked_sub(1));

        if let Some((sel_start, sel_end)) = selected {
            if sel_start <= self.view.start {
                self.view.start = sel_start;
                self.view.end = sel_start + height;
            } else if sel_end > self.view.end {
                self.view.end = sel_end;
                self.view.start = sel_end.saturating_sub(height);
            }
        }

        self.window_text()
    }

    /// Row index at an absolute line number, for pointer hit-testing.
    pub fn find_row_at_line(&self, line: usize) -> Option<usize> {
        if self.markers.is_empty() || line >= self.line_count() {
            return None;
        }
        let after = self.markers.partition_point(|m| m.start_line <= line);
        after.checked_sub(1).map(|i| self.markers[i].row)
    }

    /// Row index at a window-relative line (e.g. a mouse click row).
    pub fn find_row_at_window_line(&self, window_line: u16) -> Option<usize> {
        self.find_row_at_line(self.view.start + window_line as usize)
    }

    fn window_text(&self) -> Text<'static> {
        let mut out: Vec<Line<'static>> = Vec::with_capacity(self.height as usize);
        for abs in self.view.start..self.view.end {
            let line = abs
                .checked_sub(self.skipped)
                .and_then(|local| self.lines.get(local))
                .cloned()
                .unwrap_or_default();
            out.push(line);
        }
        Text::from(out)
    }
}
