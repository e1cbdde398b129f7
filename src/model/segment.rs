//! Styled text segments.
//!
//! A [`Segment`] is a run of text sharing one terminal style, the atom
//! produced by the escape-sequence decoder. Segments are immutable once
//! produced; the gutter chop/extend helpers in [`crate::model::row`] build
//! new segments rather than mutating existing ones.

use ratatui::style::Style;

/// A run of text sharing one style, plus an optional lane identifier.
///
/// The lane identifier groups segments that belong to the same vertical
/// rendering track; `0` means "no lane assigned".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// The text of the run. Never contains a newline once the line
    /// splitter has run.
    pub text: String,
    /// Resolved terminal style decoded from the SGR state.
    pub style: Style,
    /// Vertical rendering track, `0` when unassigned.
    pub lane: u64,
}

impl Segment {
    /// Create a styled segment with no lane assigned.
    pub fn new(text: impl Into<String>, style: Style) -> Self {
        Self {
            text: text.into(),
            style,
            lane: 0,
        }
    }

    /// Create an unstyled segment.
    pub fn plain(text: impl Into<String>) -> Self {
        Self::new(text, Style::default())
    }

    /// Width of the segment in Unicode scalar values (runes), not bytes.
    ///
    /// Gutter arithmetic counts multi-byte box-drawing glyphs as one
    /// column, so all indent math goes through this.
    pub fn rune_width(&self) -> usize {
        self.text.chars().count()
    }

    /// Whether the text is a plausible change-id token: non-empty and
    /// alphabetic-only.
    pub fn is_change_id_like(&self) -> bool {
        !self.text.is_empty() && self.text.chars().all(|c| c.is_alphabetic())
    }

    /// Whether the text is a plausible commit-id token: non-empty
    /// lowercase hex.
    pub fn is_commit_id_like(&self) -> bool {
        !self.text.is_empty()
            && self
                .text
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
    }

    /// Find `needle` in the segment text, case-insensitively.
    ///
    /// Returns the matching half-open range in *rune* offsets, suitable
    /// for carving out a reverse-video span. Case folding is per-rune so
    /// offsets in the haystack stay valid.
    pub fn find_match(&self, needle: &str) -> Option<(usize, usize)> {
        if needle.is_empty() {
            return None;
        }
        let hay: Vec<char> = self.text.chars().map(fold_char).collect();
        let pat: Vec<char> = needle.chars().map(fold_char).collect();
        if pat.len() > hay.len() {
            return None;
        }
        (0..=hay.len() - pat.len())
            .find(|&start| hay[start..start + pat.len()] == pat[..])
            .map(|start| (start, start + pat.len()))
    }
}

/// One-to-one lowercase fold. `char::to_lowercase` may expand a rune;
/// offsets into the haystack must survive folding, so expansion falls back
/// to the original rune.
fn fold_char(c: char) -> char {
    let mut it = c.to_lowercase();
    match (it.next(), it.next()) {
        (Some(l), None) => l,
        _ => c,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::style::{Color, Style};

    #[test]
    fn rune_width_counts_scalars_not_bytes() {
        let seg = Segment::plain("│○◆");
        assert_eq!(seg.rune_width(), 3);
        assert!(seg.text.len() > 3, "multi-byte glyphs");
    }

    #[test]
    fn change_id_like_accepts_alphabetic_only() {
        assert!(Segment::plain("xvqsmwpo").is_change_id_like());
        assert!(Segment::plain("XYZ").is_change_id_like());
    }

    #[test]
    fn change_id_like_rejects_mixed_and_empty() {
        assert!(!Segment::plain("").is_change_id_like());
        assert!(!Segment::plain("abc1").is_change_id_like());
        assert!(!Segment::plain("a b").is_change_id_like());
        assert!(!Segment::plain("│").is_change_id_like());
    }

    #[test]
    fn commit_id_like_accepts_lowercase_hex() {
        assert!(Segment::plain("1a2b3c4d").is_commit_id_like());
        assert!(Segment::plain("deadbeef").is_commit_id_like());
        assert!(Segment::plain("0123").is_commit_id_like());
    }

    #[test]
    fn commit_id_like_rejects_uppercase_and_non_hex() {
        assert!(!Segment::plain("").is_commit_id_like());
        assert!(!Segment::plain("DEADBEEF").is_commit_id_like());
        assert!(!Segment::plain("xyz").is_commit_id_like());
        assert!(!Segment::plain("12 34").is_commit_id_like());
    }

    #[test]
    fn find_match_returns_rune_offsets() {
        let seg = Segment::plain("fix the parser bug");
        assert_eq!(seg.find_match("parser"), Some((8, 14)));
    }

    #[test]
    fn find_match_is_case_insensitive() {
        let seg = Segment::plain("Fix The Parser Bug");
        assert_eq!(seg.find_match("parser"), Some((8, 14)));
        assert_eq!(seg.find_match("FIX"), Some((0, 3)));
    }

    #[test]
    fn find_match_none_for_missing_or_empty_needle() {
        let seg = Segment::plain("description");
        assert_eq!(seg.find_match("zzz"), None);
        assert_eq!(seg.find_match(""), None);
    }

    #[test]
    fn find_match_offsets_survive_multibyte_prefix() {
        let seg = Segment::plain("○○ merge");
        assert_eq!(seg.find_match("Merge"), Some((3, 8)));
    }

    #[test]
    fn new_preserves_style() {
        let style = Style::default().fg(Color::Magenta);
        let seg = Segment::new("xvq", style);
        assert_eq!(seg.style, style);
        assert_eq!(seg.lane, 0);
    }
}
