//! Rows: the unit of navigation.
//!
//! A [`Row`] represents one revision and owns the terminal lines the
//! revision occupies in the graph output: the revision line itself,
//! description/continuation lines, and possibly a trailing elision
//! connector. Each line is pre-split into gutter (the connector glyph
//! columns) and content segments.

use crate::model::revision::Revision;
use crate::model::segment::Segment;
use std::ops::BitOr;

// ===== LineFlags =====

/// Classification bitset for one line of a row.
///
/// Closed set: `REVISION` (the line carrying the ids), `HIGHLIGHTABLE`
/// (participates in cursor highlighting), `ELIDED` (collapsed-range
/// connector). Combined with `|`; queried with [`LineFlags::contains`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LineFlags(u8);

impl LineFlags {
    /// No classification.
    pub const NONE: LineFlags = LineFlags(0);
    /// The line introduces the revision (carries change-id/commit-id).
    pub const REVISION: LineFlags = LineFlags(1);
    /// The line participates in cursor highlighting.
    pub const HIGHLIGHTABLE: LineFlags = LineFlags(1 << 1);
    /// The line is an elision connector for a collapsed range.
    pub const ELIDED: LineFlags = LineFlags(1 << 2);

    /// Whether every flag in `other` is set in `self`.
    pub const fn contains(self, other: LineFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Copy of `self` with the flags in `other` added.
    pub const fn with(self, other: LineFlags) -> LineFlags {
        LineFlags(self.0 | other.0)
    }

    /// Copy of `self` with the flags in `other` removed.
    pub const fn without(self, other: LineFlags) -> LineFlags {
        LineFlags(self.0 & !other.0)
    }
}

impl BitOr for LineFlags {
    type Output = LineFlags;

    fn bitor(self, rhs: LineFlags) -> LineFlags {
        self.with(rhs)
    }
}

// ===== RowLine =====

/// One terminal line of a row, split into gutter and content segments.
#[derive(Debug, Clone, Default)]
pub struct RowLine {
    /// Connector-glyph segments left of the row's indent.
    pub gutter: Vec<Segment>,
    /// Content segments right of the indent.
    pub segments: Vec<Segment>,
    /// Line classification.
    pub flags: LineFlags,
    /// Index into `segments` of the change-id token, if this line carries
    /// it.
    pub change_id_idx: Option<usize>,
    /// Index into `segments` of the commit-id token, if this line carries
    /// it.
    pub commit_id_idx: Option<usize>,
}

impl RowLine {
    /// Whether the gutter (the first `indent` runes of the original line)
    /// contains the given glyph.
    pub fn gutter_contains(&self, glyph: char) -> bool {
        self.gutter.iter().any(|s| s.text.contains(glyph))
    }
}

// ===== Row =====

/// One revision and the terminal lines it occupies.
///
/// Invariants: the first line always carries [`LineFlags::REVISION`]; at
/// most one line is [`LineFlags::ELIDED`] and it is the last line when
/// present.
#[derive(Debug, Clone)]
pub struct Row {
    /// Identity of the revision this row displays.
    pub revision: Revision,
    /// The terminal lines of the row, in output order.
    pub lines: Vec<RowLine>,
    /// Gutter width in runes.
    pub indent: usize,
    /// Set post-hoc when the last command's output names this revision.
    pub is_affected: bool,
    /// Arena index of the preceding row, used to extend its gutter under
    /// injected content. Non-owning.
    pub previous: Option<usize>,
}

impl Row {
    /// Create an empty row for the given revision identity.
    pub fn new(revision: Revision) -> Self {
        Self {
            revision,
            lines: Vec::new(),
            indent: 0,
            is_affected: false,
            previous: None,
        }
    }

    /// Height of the row in terminal lines.
    pub fn height(&self) -> usize {
        self.lines.len()
    }

    /// Gutter to repeat under this row for injected content, derived from
    /// the last line's gutter with node glyphs collapsed to plain
    /// connectors.
    pub fn extended_gutter(&self) -> Vec<Segment> {
        match self.lines.last() {
            Some(line) => extend_gutter(&line.gutter, self.indent),
            None => Vec::new(),
        }
    }
}

// ===== Gutter helpers =====

/// Truncate or pad a gutter to exactly `width` runes, preserving segment
/// styles. Padding extends the final segment with spaces.
pub fn chop_gutter(gutter: &[Segment], width: usize) -> Vec<Segment> {
    let mut out: Vec<Segment> = Vec::new();
    let mut remaining = width;
    for seg in gutter {
        if remaining == 0 {
            break;
        }
        let text: String = seg.text.chars().take(remaining).collect();
        remaining -= text.chars().count();
        out.push(Segment {
            text,
            style: seg.style,
            lane: seg.lane,
        });
    }
    pad_last(&mut out, remaining);
    out
}

/// Derive the gutter to draw *below* a given gutter line: connector glyphs
/// continue downward, everything else becomes blank. Result is exactly
/// `width` runes.
pub fn extend_gutter(gutter: &[Segment], width: usize) -> Vec<Segment> {
    let mut out: Vec<Segment> = Vec::new();
    let mut remaining = width;
    for seg in gutter {
        if remaining == 0 {
            break;
        }
        let text: String = seg
            .text
            .chars()
            .take(remaining)
            .map(extend_glyph)
            .collect();
        remaining -= text.chars().count();
        out.push(Segment {
            text,
            style: seg.style,
            lane: seg.lane,
        });
    }
    pad_last(&mut out, remaining);
    out
}

/// Map one gutter glyph to its downward continuation.
fn extend_glyph(c: char) -> char {
    match c {
        // curved and square connector styles
        '│' | '╭' | '├' | '┐' | '┤' | '┌' | '╮' | '┬' | '┼' => '│',
        // ascii style
        '|' => '|',
        _ => ' ',
    }
}

fn pad_last(segments: &mut Vec<Segment>, remaining: usize) {
    if remaining == 0 {
        return;
    }
    let pad: String = " ".repeat(remaining);
    match segments.last_mut() {
        Some(last) => last.text.push_str(&pad),
        None => segments.push(Segment::plain(pad)),
    }
}

/// Split a segment run at a rune offset, cutting a straddling segment in
/// two. Returns `(left, right)`.
pub fn split_at_runes(segments: &[Segment], offset: usize) -> (Vec<Segment>, Vec<Segment>) {
    let mut left = Vec::new();
    let mut right = Vec::new();
    let mut remaining = offset;
    for seg in segments {
        if remaining == 0 {
            right.push(seg.clone());
            continue;
        }
        let width = seg.rune_width();
        if width <= remaining {
            remaining -= width;
            left.push(seg.clone());
        } else {
            let head: String = seg.text.chars().take(remaining).collect();
            let tail: String = seg.text.chars().skip(remaining).collect();
            left.push(Segment {
                text: head,
                style: seg.style,
                lane: seg.lane,
            });
            right.push(Segment {
                text: tail,
                style: seg.style,
                lane: seg.lane,
            });
            remaining = 0;
        }
    }
    (left, right)
}
