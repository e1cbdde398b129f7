//! Per-row rendering.
//!
//! [`GraphRowIterator`] is a single-pass state machine over the row arena:
//! `next_row` advances a cursor starting at -1, `render` emits the current
//! row's terminal lines into a [`RenderSink`]. The virtualized viewport
//! drives it and decides which rows actually render.
//!
//! Per-row order: operation content injected `Before` (under the previous
//! row's extended gutter), the highlightable lines (gutter with lane
//! styling, selection/operation markers before the change-id, search and
//! ace-jump reversal, full-width highlight fill, optional description
//! replacement), then `After` content and the non-highlightable tail
//! (elision connectors) — unless the row is the graph root, which renders
//! neither.

use crate::model::row::{chop_gutter, LineFlags};
use crate::model::{Revision, Row, Segment};
use crate::render::overlay::{NoOperation, Operation, OverlayPosition};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use std::collections::HashSet;
use unicode_width::UnicodeWidthStr;

static NO_OPERATION: NoOperation = NoOperation;

// ===== Sinks and traits =====

/// Receiver for rendered terminal lines.
pub trait RenderSink {
    /// Append one rendered line.
    fn push_line(&mut self, line: Line<'static>);
}

impl RenderSink for Vec<Line<'static>> {
    fn push_line(&mut self, line: Line<'static>) {
        self.push(line);
    }
}

/// Iteration contract the viewport renders through.
pub trait RowIterator {
    /// Advance to the next row; false past the end.
    fn next_row(&mut self) -> bool;
    /// Whether the current row is the cursor row.
    fn is_highlighted(&self) -> bool;
    /// Height of the current row in lines, before injected content.
    fn row_height(&self) -> usize;
    /// Total number of rows.
    fn len(&self) -> usize;
    /// Whether the iterator has no rows at all.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    /// Render the current row into the sink.
    fn render(&mut self, sink: &mut dyn RenderSink);
}

/// Lane membership queries used for dimming rows off the cursor's rail.
pub trait LaneTracer {
    /// Whether the row is on the same lane as the cursor.
    fn is_row_in_lane(&self, row: usize) -> bool;
    /// Whether one gutter segment of a row line is on the cursor's lane.
    fn is_gutter_in_lane(&self, row: usize, line: usize, segment: usize) -> bool;
}

/// Tracer that keeps everything in lane (no dimming).
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTracer;

impl LaneTracer for NoopTracer {
    fn is_row_in_lane(&self, _row: usize) -> bool {
        true
    }

    fn is_gutter_in_lane(&self, _row: usize, _line: usize, _segment: usize) -> bool {
        true
    }
}

/// Tracer backed by the graph's nesting levels: rows sharing the cursor
/// row's level are in lane, everything else dims.
#[derive(Debug, Clone)]
pub struct LevelTracer {
    levels: Vec<usize>,
    cursor_level: usize,
}

impl LevelTracer {
    /// Build a tracer for the given per-row levels and cursor row.
    pub fn new(levels: Vec<usize>, cursor: usize) -> Self {
        let cursor_level = levels.get(cursor).copied().unwrap_or(0);
        Self {
            levels,
            cursor_level,
        }
    }
}

impl LaneTracer for LevelTracer {
    fn is_row_in_lane(&self, row: usize) -> bool {
        self.levels.get(row).copied().unwrap_or(0) == self.cursor_level
    }

    fn is_gutter_in_lane(&self, row: usize, _line: usize, _segment: usize) -> bool {
        self.is_row_in_lane(row)
    }
}

// ===== Styles =====

/// Style set for row rendering.
#[derive(Debug, Clone, Copy)]
pub struct RowStyles {
    /// Base content style.
    pub text: Style,
    /// Style for rows/gutters off the cursor's lane.
    pub dimmed: Style,
    /// Highlight style for the cursor row (background fill).
    pub selected: Style,
    /// Selection checkmark style.
    pub check: Style,
}

impl Default for RowStyles {
    fn default() -> Self {
        Self {
            text: Style::default(),
            dimmed: Style::default().fg(Color::DarkGray).add_modifier(Modifier::DIM),
            selected: Style::default().bg(Color::DarkGray),
            check: Style::default().fg(Color::Green),
        }
    }
}

// ===== GraphRowIterator =====

/// Default row iterator: renders rows with highlight, selection, search
/// and operation overlays.
pub struct GraphRowIterator<'a> {
    rows: &'a [Row],
    current: isize,
    cursor: usize,
    width: u16,
    search: Option<String>,
    ace_prefix: Option<String>,
    selections: HashSet<String>,
    op: &'a dyn Operation,
    styles: RowStyles,
    tracer: Box<dyn LaneTracer>,
}

impl<'a> GraphRowIterator<'a> {
    /// Create an iterator over the row arena with defaults: no search, no
    /// selection, no operation, everything in lane.
    pub fn new(rows: &'a [Row]) -> Self {
        Self {
            rows,
            current: -1,
            cursor: 0,
            width: 80,
            search: None,
            ace_prefix: None,
            selections: HashSet::new(),
            op: &NO_OPERATION,
            styles: RowStyles::default(),
            tracer: Box::new(NoopTracer),
        }
    }

    /// Set the cursor (highlighted) row.
    pub fn with_cursor(mut self, cursor: usize) -> Self {
        self.cursor = cursor;
        self
    }

    /// Set the terminal width used for highlight fills.
    pub fn with_width(mut self, width: u16) -> Self {
        self.width = width;
        self
    }

    /// Set the active search text.
    pub fn with_search(mut self, search: Option<String>) -> Self {
        self.search = search.filter(|s| !s.is_empty());
        self
    }

    /// Set the active ace-jump prefix.
    pub fn with_ace_prefix(mut self, prefix: Option<String>) -> Self {
        self.ace_prefix = prefix.filter(|s| !s.is_empty());
        self
    }

    /// Set the selected change-ids (rendered with a checkmark).
    pub fn with_selections(mut self, selections: HashSet<String>) -> Self {
        self.selections = selections;
        self
    }

    /// Set the active operation overlay.
    pub fn with_operation(mut self, op: &'a dyn Operation) -> Self {
        self.op = op;
        self
    }

    /// Replace the lane tracer.
    pub fn with_tracer(mut self, tracer: Box<dyn LaneTracer>) -> Self {
        self.tracer = tracer;
        self
    }

    fn row(&self) -> &'a Row {
        &self.rows[self.current as usize]
    }

    // ----- span helpers -----

    fn place_line(&self, mut spans: Vec<Span<'static>>, fill: bool) -> Line<'static> {
        if fill {
            let used: usize = spans.iter().map(|s| s.content.as_ref().width()).sum();
            let width = self.width as usize;
            if used < width {
                spans.push(Span::styled(" ".repeat(width - used), self.styles.selected));
            }
        }
        Line::from(spans)
    }

    fn gutter_spans(
        &self,
        spans: &mut Vec<Span<'static>>,
        gutter: &[Segment],
        row: usize,
        line: usize,
    ) {
        for (si, seg) in gutter.iter().enumerate() {
            let style = if self.tracer.is_gutter_in_lane(row, line, si) {
                seg.style.patch(self.styles.text)
            } else {
                seg.style.patch(self.styles.dimmed)
            };
            spans.push(Span::styled(seg.text.clone(), style));
        }
    }

    /// Selection checkmark and operation marker, spliced between the
    /// gutter and the change-id.
    fn decoration_spans(&self, spans: &mut Vec<Span<'static>>, revision: &Revision, highlighted: bool) {
        let marker = self.op.render(revision, OverlayPosition::BeforeChangeId);
        let selected = self.selections.contains(&revision.change_id);
        if marker.is_none() && !selected {
            return;
        }
        let space_style = if highlighted {
            self.styles.selected
        } else {
            self.styles.text
        };
        if let Some(marker) = marker {
            spans.push(Span::styled(marker, space_style));
            spans.push(Span::styled(" ", space_style));
        }
        if selected {
            let mut check = self.styles.check;
            check.bg = if highlighted {
                self.styles.selected.bg
            } else {
                self.styles.text.bg
            };
            spans.push(Span::styled("✓", check));
            spans.push(Span::styled(" ", space_style));
        }
    }

    /// One content segment, with search-match / ace-jump reversal.
    fn content_spans(
        &self,
        spans: &mut Vec<Span<'static>>,
        seg: &Segment,
        revision: &Revision,
        base: Style,
    ) {
        if let Some(query) = self.search.as_deref() {
            if let Some((start, end)) = seg.find_match(query) {
                push_reversed_range(spans, &seg.text, start, end, base);
                return;
            }
        }
        if let Some(idx) = self.ace_jump_index(seg, revision) {
            push_reversed_range(spans, &seg.text, idx, idx + 1, base);
            return;
        }
        spans.push(Span::styled(seg.text.clone(), base));
    }

    /// Rune index to reverse for ace-jump, when this segment is the row's
    /// change-id or commit-id and matches the typed prefix.
    fn ace_jump_index(&self, seg: &Segment, revision: &Revision) -> Option<usize> {
        let prefix = self.ace_prefix.as_deref()?;
        if seg.text != revision.change_id && seg.text != revision.commit_id {
            return None;
        }
        let text = seg.text.to_lowercase();
        if !text.starts_with(&prefix.to_lowercase()) {
            return None;
        }
        let len = seg.text.chars().count();
        let idx = prefix.chars().count();
        // Do not move past the last character.
        Some(idx.min(len.saturating_sub(1)))
    }

    /// Render injected multi-line content under a gutter. `current` is the
    /// gutter for the first line, `extended` repeats under the rest.
    fn write_section(
        &self,
        sink: &mut dyn RenderSink,
        current: &[Segment],
        extended: &[Segment],
        highlight: bool,
        content: &str,
    ) {
        let highlighted = self.is_highlighted();
        let mut gutter = current;
        for text_line in content.split('\n') {
            let mut spans: Vec<Span<'static>> = Vec::new();
            for seg in gutter {
                spans.push(Span::styled(seg.text.clone(), seg.style.patch(self.styles.text)));
            }
            let style = if highlighted && highlight {
                self.styles.selected
            } else {
                self.styles.text
            };
            spans.push(Span::styled(text_line.to_string(), style));
            sink.push_line(self.place_line(spans, highlighted && highlight));
            gutter = extended;
        }
    }
}

fn push_reversed_range(
    spans: &mut Vec<Span<'static>>,
    text: &str,
    start: usize,
    end: usize,
    base: Style,
) {
    let chars: Vec<char> = text.chars().collect();
    let head: String = chars[..start].iter().collect();
    let mid: String = chars[start..end.min(chars.len())].iter().collect();
    let tail: String = chars[end.min(chars.len())..].iter().collect();
    if !head.is_empty() {
        spans.push(Span::styled(head, base));
    }
    spans.push(Span::styled(mid, base.add_modifier(Modifier::REVERSED)));
    if !tail.is_empty() {
        spans.push(Span::styled(tail, base));
    }
}

impl RowIterator for GraphRowIterator<'_> {
    fn next_row(&mut self) -> bool {
        self.current += 1;
        (self.current as usize) < self.rows.len()
    }

    fn is_highlighted(&self) -> bool {
        self.current >= 0 && self.current as usize == self.cursor
    }

    fn row_height(&self) -> usize {
        self.row().height()
    }

    fn len(&self) -> usize {
        self.rows.len()
    }

    fn render(&mut self, sink: &mut dyn RenderSink) {
        let idx = self.current as usize;
        let row = self.row();
        let highlighted = self.is_highlighted();
        let in_lane = self.tracer.is_row_in_lane(idx);

        if let Some(before) = self.op.render(&row.revision, OverlayPosition::Before) {
            // Extends the previous row's gutter downward over the injected
            // lines.
            let gutter = row
                .previous
                .and_then(|p| self.rows.get(p))
                .map(Row::extended_gutter)
                .unwrap_or_default();
            self.write_section(sink, &gutter, &gutter, false, &before);
        }

        let over = if highlighted {
            self.op.render(&row.revision, OverlayPosition::OverDescription)
        } else {
            None
        };
        let mut over_rendered = false;

        let mut li = 0;
        while li < row.lines.len() {
            let line = &row.lines[li];
            if line.flags.contains(LineFlags::ELIDED) {
                break;
            }
            if !line.flags.contains(LineFlags::REVISION) && highlighted && !over_rendered {
                if let Some(content) = over.as_deref() {
                    // Replace the description lines entirely. The first
                    // overlay line reuses this line's gutter, normalized
                    // to the row indent.
                    let current = chop_gutter(&line.gutter, row.indent);
                    let extended = row.extended_gutter();
                    self.write_section(sink, &current, &extended, true, content);
                    over_rendered = true;
                    while li < row.lines.len()
                        && row.lines[li].flags.contains(LineFlags::HIGHLIGHTABLE)
                    {
                        li += 1;
                    }
                    continue;
                }
            }

            let mut spans: Vec<Span<'static>> = Vec::new();
            self.gutter_spans(&mut spans, &line.gutter, idx, li);
            if line.flags.contains(LineFlags::REVISION) {
                self.decoration_spans(&mut spans, &row.revision, highlighted);
            }
            for seg in &line.segments {
                let base = if highlighted {
                    seg.style.patch(self.styles.selected)
                } else if in_lane {
                    seg.style.patch(self.styles.text)
                } else {
                    seg.style.patch(self.styles.dimmed)
                };
                self.content_spans(&mut spans, seg, &row.revision, base);
            }
            if line.flags.contains(LineFlags::REVISION) && row.is_affected {
                let mut style = self.styles.dimmed;
                if highlighted {
                    style.bg = self.styles.selected.bg;
                }
                spans.push(Span::styled(" (affected by last operation)", style));
            }
            let fill = highlighted && line.flags.contains(LineFlags::HIGHLIGHTABLE);
            sink.push_line(self.place_line(spans, fill));
            li += 1;
        }

        if let (Some(content), false) = (over.as_deref(), over_rendered) {
            // Single-line row: the replacement still renders, under the
            // extended gutter.
            let extended = row.extended_gutter();
            self.write_section(sink, &extended, &extended, true, content);
        }

        if row.revision.is_root() {
            return;
        }

        if let Some(after) = self.op.render(&row.revision, OverlayPosition::After) {
            let extended = row.extended_gutter();
            self.write_section(sink, &extended, &extended, false, &after);
        }

        // Non-highlightable tail: elision connectors and anything below
        // them. Rendered plain; never highlighted or searched.
        for (li, line) in row.lines.iter().enumerate() {
            if line.flags.contains(LineFlags::HIGHLIGHTABLE) {
                continue;
            }
            let mut spans: Vec<Span<'static>> = Vec::new();
            self.gutter_spans(&mut spans, &line.gutter, idx, li);
            for seg in &line.segments {
                spans.push(Span::styled(
                    seg.text.clone(),
                    seg.style.patch(self.styles.text),
                ));
            }
            sink.push_line(self.place_line(spans, false));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_rows;
    use crate::render::overlay::StaticOverlay;

    fn sample_rows() -> Vec<Row> {
        parse_rows(
            "@  \x1b[35mxvq\x1b[0m \x1b[34m1a2b3c4d\x1b[0m\n\
             │  fix the parser bug\n\
             ○  \x1b[35mwqp\x1b[0m \x1b[34m5e6f7a8b\x1b[0m\n\
             │  earlier work\n\
             ~  (elided revisions)\n"
                .as_bytes(),
        )
    }

    fn line_text(line: &Line<'_>) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    fn render_all(mut iter: GraphRowIterator<'_>) -> Vec<Line<'static>> {
        let mut sink: Vec<Line<'static>> = Vec::new();
        while iter.next_row() {
            iter.render(&mut sink);
        }
        sink
    }

    #[test]
    fn renders_one_terminal_line_per_row_line() {
        let rows = sample_rows();
        let lines = render_all(GraphRowIterator::new(&rows));
        // 2 lines for row 0, 3 for row 1 (incl. elided connector).
        assert_eq!(lines.len(), 5);
        assert!(line_text(&lines[0]).contains("xvq"));
        assert!(line_text(&lines[0]).contains("1a2b3c4d"));
        assert!(line_text(&lines[4]).contains("elided"));
    }

    #[test]
    fn highlighted_row_fills_to_width() {
        let rows = sample_rows();
        let lines = render_all(GraphRowIterator::new(&rows).with_cursor(0).with_width(40));
        assert_eq!(line_text(&lines[0]).width(), 40);
        assert_eq!(line_text(&lines[1]).width(), 40);
        // Non-highlighted rows are not filled.
        assert!(line_text(&lines[2]).width() < 40);
    }

    #[test]
    fn elided_line_is_not_filled_even_when_row_highlighted() {
        let rows = sample_rows();
        let lines = render_all(GraphRowIterator::new(&rows).with_cursor(1).with_width(40));
        let elided = lines.last().unwrap();
        assert!(line_text(elided).contains("elided"));
        assert!(line_text(elided).width() < 40);
    }

    #[test]
    fn search_match_gets_reversed_span() {
        let rows = sample_rows();
        let lines = render_all(
            GraphRowIterator::new(&rows).with_search(Some("PARSER".to_string())),
        );
        let description = &lines[1];
        let reversed: Vec<_> = description
            .spans
            .iter()
            .filter(|s| s.style.add_modifier.contains(Modifier::REVERSED))
            .collect();
        assert_eq!(reversed.len(), 1);
        assert_eq!(reversed[0].content.as_ref(), "parser");
    }

    #[test]
    fn ace_jump_reverses_prefix_boundary_char() {
        let rows = sample_rows();
        let lines = render_all(
            GraphRowIterator::new(&rows).with_ace_prefix(Some("x".to_string())),
        );
        let revision_line = &lines[0];
        let reversed: Vec<_> = revision_line
            .spans
            .iter()
            .filter(|s| s.style.add_modifier.contains(Modifier::REVERSED))
            .collect();
        assert_eq!(reversed.len(), 1);
        assert_eq!(reversed[0].content.as_ref(), "v", "char after prefix 'x'");
    }

    #[test]
    fn selection_renders_checkmark_before_change_id() {
        let rows = sample_rows();
        let selections: HashSet<String> = ["xvq".to_string()].into();
        let lines = render_all(GraphRowIterator::new(&rows).with_selections(selections));
        let text = line_text(&lines[0]);
        assert!(text.contains('✓'));
        let check_pos = text.find('✓').unwrap();
        let id_pos = text.find("xvq").unwrap();
        assert!(check_pos < id_pos, "checkmark left of change-id");
    }

    #[test]
    fn before_content_extends_previous_row_gutter() {
        let rows = sample_rows();
        let op = StaticOverlay::new("wqp", OverlayPosition::Before, "pick destination");
        let lines = render_all(GraphRowIterator::new(&rows).with_operation(&op));
        // Injected line appears between the two rows.
        assert_eq!(lines.len(), 6);
        let injected = &lines[2];
        let text = line_text(injected);
        assert!(text.contains("pick destination"));
        assert!(text.starts_with('│'), "previous row's gutter extended: {text:?}");
    }

    #[test]
    fn after_content_renders_below_row_except_for_root() {
        let rows = parse_rows(
            "○  \x1b[35mxvq\x1b[0m \x1b[34m1a2b3c4d\x1b[0m\n\
             ◆  \x1b[35mzzzzzzzz\x1b[0m \x1b[34m00000000\x1b[0m\n"
                .as_bytes(),
        );
        let op_mid = StaticOverlay::new("xvq", OverlayPosition::After, "onto here");
        let lines = render_all(GraphRowIterator::new(&rows).with_operation(&op_mid));
        assert_eq!(lines.len(), 3);
        assert!(line_text(&lines[1]).contains("onto here"));

        // The virtual root renders no after-content.
        let op_root = StaticOverlay::new("zzzzzzzz", OverlayPosition::After, "never shown");
        let lines = render_all(GraphRowIterator::new(&rows).with_operation(&op_root));
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn over_description_replaces_description_lines() {
        let rows = sample_rows();
        let op = StaticOverlay::new("xvq", OverlayPosition::OverDescription, "edit me");
        let lines = render_all(
            GraphRowIterator::new(&rows).with_cursor(0).with_operation(&op),
        );
        assert_eq!(lines.len(), 5);
        assert!(line_text(&lines[1]).contains("edit me"));
        assert!(!lines.iter().any(|l| line_text(l).contains("fix the parser bug")));
    }

    #[test]
    fn over_description_ignored_when_row_not_highlighted() {
        let rows = sample_rows();
        let op = StaticOverlay::new("xvq", OverlayPosition::OverDescription, "edit me");
        let lines = render_all(
            GraphRowIterator::new(&rows).with_cursor(1).with_operation(&op),
        );
        assert!(lines.iter().any(|l| line_text(l).contains("fix the parser bug")));
        assert!(!lines.iter().any(|l| line_text(l).contains("edit me")));
    }

    #[test]
    fn multi_line_section_repeats_extended_gutter() {
        let rows = sample_rows();
        let op = StaticOverlay::new("xvq", OverlayPosition::After, "line one\nline two");
        let lines = render_all(GraphRowIterator::new(&rows).with_operation(&op));
        assert_eq!(lines.len(), 7);
        assert!(line_text(&lines[2]).contains("line one"));
        assert!(line_text(&lines[3]).contains("line two"));
        assert!(line_text(&lines[3]).starts_with('│'));
    }

    #[test]
    fn affected_rows_carry_a_note() {
        let mut rows = sample_rows();
        rows[1].is_affected = true;
        let lines = render_all(GraphRowIterator::new(&rows));
        assert!(line_text(&lines[2]).contains("(affected by last operation)"));
    }

    #[test]
    fn level_tracer_dims_rows_off_the_cursor_lane() {
        let rows = sample_rows();
        let tracer = LevelTracer::new(vec![0, 1], 0);
        let lines = render_all(
            GraphRowIterator::new(&rows)
                .with_cursor(0)
                .with_tracer(Box::new(tracer)),
        );
        let off_lane = &lines[2];
        assert!(off_lane
            .spans
            .iter()
            .any(|s| s.style.add_modifier.contains(Modifier::DIM)));
    }

    #[test]
    fn empty_row_list_renders_nothing() {
        let rows: Vec<Row> = Vec::new();
        let lines = render_all(GraphRowIterator::new(&rows));
        assert!(lines.is_empty());
    }

    #[test]
    fn search_and_highlight_compose() {
        let rows = sample_rows();
        let lines = render_all(
            GraphRowIterator::new(&rows)
                .with_cursor(0)
                .with_width(60)
                .with_search(Some("parser".to_string())),
        );
        let description = &lines[1];
        assert!(description
            .spans
            .iter()
            .any(|s| s.style.add_modifier.contains(Modifier::REVERSED)));
        assert_eq!(line_text(description).width(), 60);
    }
}
