//! Grouping of segments into terminal lines.
//!
//! [`LineBreaker`] wraps a segment iterator and yields one `Vec<Segment>`
//! per terminal line, splitting any segment that contains a newline. The
//! active style is preserved across the split: both halves keep the
//! original segment's style. A trailing accumulator with no terminating
//! newline is still flushed as a final line at end of stream.

use crate::model::Segment;

/// Iterator adapter grouping a segment stream into lines.
pub struct LineBreaker<I> {
    inner: I,
    current: Vec<Segment>,
    pending: Option<Segment>,
    done: bool,
}

/// Group a segment stream into per-terminal-line segment sequences.
pub fn break_lines<I>(segments: I) -> LineBreaker<I>
where
    I: Iterator<Item = Segment>,
{
    LineBreaker {
        inner: segments,
        current: Vec::new(),
        pending: None,
        done: false,
    }
}

impl<I> Iterator for LineBreaker<I>
where
    I: Iterator<Item = Segment>,
{
    type Item = Vec<Segment>;

    fn next(&mut self) -> Option<Vec<Segment>> {
        if self.done {
            return None;
        }
        loop {
            let seg = match self.pending.take().or_else(|| self.inner.next()) {
                Some(seg) => seg,
                None => {
                    self.done = true;
                    if self.current.is_empty() {
                        return None;
                    }
                    return Some(std::mem::take(&mut self.current));
                }
            };
            match seg.text.find('\n') {
                None => self.current.push(seg),
                Some(idx) => {
                    let head = seg.text[..idx].trim_end_matches('\r');
                    let rest = &seg.text[idx + 1..];
                    if !head.is_empty() {
                        self.current.push(Segment {
                            text: head.to_string(),
                            style: seg.style,
                            lane: seg.lane,
                        });
                    }
                    if !rest.is_empty() {
                        self.pending = Some(Segment {
                            text: rest.to_string(),
                            style: seg.style,
                            lane: seg.lane,
                        });
                    }
                    return Some(std::mem::take(&mut self.current));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::style::{Color, Style};

    fn seg(text: &str) -> Segment {
        Segment::plain(text)
    }

    fn line_text(line: &[Segment]) -> String {
        line.iter().map(|s| s.text.as_str()).collect()
    }

    #[test]
    fn splits_single_segment_at_newlines() {
        let lines: Vec<_> = break_lines(vec![seg("a\nb\nc")].into_iter()).collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(line_text(&lines[0]), "a");
        assert_eq!(line_text(&lines[1]), "b");
        assert_eq!(line_text(&lines[2]), "c");
    }

    #[test]
    fn accumulates_segments_until_newline() {
        let input = vec![seg("@  "), seg("xvq"), seg(" 1a2b\n"), seg("next")];
        let lines: Vec<_> = break_lines(input.into_iter()).collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].len(), 3);
        assert_eq!(line_text(&lines[0]), "@  xvq 1a2b");
        assert_eq!(line_text(&lines[1]), "next");
    }

    #[test]
    fn trailing_accumulator_without_newline_is_flushed() {
        let lines: Vec<_> = break_lines(vec![seg("no terminator")].into_iter()).collect();
        assert_eq!(lines.len(), 1);
        assert_eq!(line_text(&lines[0]), "no terminator");
    }

    #[test]
    fn both_halves_keep_the_style() {
        let style = Style::default().fg(Color::Magenta);
        let input = vec![Segment::new("one\ntwo", style)];
        let lines: Vec<_> = break_lines(input.into_iter()).collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0][0].style, style);
        assert_eq!(lines[1][0].style, style);
    }

    #[test]
    fn empty_lines_are_preserved_as_empty_vecs() {
        let lines: Vec<_> = break_lines(vec![seg("a\n\nb\n")].into_iter()).collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(line_text(&lines[1]), "");
    }

    #[test]
    fn crlf_terminators_drop_the_carriage_return() {
        let lines: Vec<_> = break_lines(vec![seg("a\r\nb\r\n")].into_iter()).collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(line_text(&lines[0]), "a");
        assert_eq!(line_text(&lines[1]), "b");
    }

    #[test]
    fn empty_input_yields_no_lines() {
        let lines: Vec<_> = break_lines(std::iter::empty()).collect();
        assert!(lines.is_empty());
    }

    #[test]
    fn newline_at_segment_start_flushes_accumulator() {
        let input = vec![seg("left"), seg("\nright")];
        let lines: Vec<_> = break_lines(input.into_iter()).collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(line_text(&lines[0]), "left");
        assert_eq!(line_text(&lines[1]), "right");
    }
}
