//! Row assembly.
//!
//! Consumes the per-line segment sequences and groups them into [`Row`]s,
//! one per revision. A line opens a new row when it carries a
//! change-id-like token: an alphabetic-only segment that is not the last
//! segment on the line. The commit-id-like token (lowercase hex segment)
//! is captured from the same line when present, or from a later line of
//! the row. Lines that fail the predicate are ordinary continuation lines
//! of the current row; lines seen before any row opens are discarded.
//!
//! The streaming entry point runs the assembler on a producer thread and
//! hands completed rows to the consumer in batches over a bounded channel.
//! The consumer paces the producer with an explicit two-message control
//! protocol ([`Control::More`] / [`Control::Stop`]): the producer blocks
//! between batches until signaled, so a slow consumer never causes
//! unbounded buffering, and a stopped consumer lets the producer exit
//! without draining the underlying stream.

use crate::model::row::{split_at_runes, LineFlags, Row, RowLine};
use crate::model::{Revision, Segment};
use crate::parser::ansi::decode;
use crate::parser::lines::break_lines;
use std::io::Read;
use std::sync::mpsc::{sync_channel, Receiver};
use std::thread;

/// Consumer-to-producer pacing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    /// Send the next batch when one is ready.
    More,
    /// Stop parsing; the producer exits without finishing the stream.
    Stop,
}

/// A batch of completed rows.
#[derive(Debug)]
pub struct RowBatch {
    /// Completed rows, in log order.
    pub rows: Vec<Row>,
    /// Whether the producer expects to send further batches.
    pub has_more: bool,
}

// ===== Revision-line predicate =====

/// Index of the change-id segment, when the line opens a new row.
///
/// A line opens a row when it carries an alphabetic-only segment that is
/// not the last segment on the line. The commit-id usually follows on the
/// same line but may land on a later line of the row (narrow terminals),
/// so its presence is not part of the predicate.
fn probe_revision_line(segments: &[Segment]) -> Option<usize> {
    let change = segments.iter().position(Segment::is_change_id_like)?;
    // A pure gutter continuation line can end in a letter-only segment;
    // require something after the change-id.
    (change != segments.len() - 1).then_some(change)
}

// ===== RowAssembler =====

/// Incremental row assembler. Feed lines with [`RowAssembler::push_line`];
/// each call returns the previously open row when the line opens a new
/// one. Call [`RowAssembler::finish`] to flush the final row.
#[derive(Default)]
pub struct RowAssembler {
    current: Option<Row>,
    next_index: usize,
}

impl RowAssembler {
    /// Create an assembler with no open row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one line of segments. Returns the completed previous row when
    /// this line opens a new one.
    pub fn push_line(&mut self, segments: Vec<Segment>) -> Option<Row> {
        match probe_revision_line(&segments) {
            Some(change_idx) => {
                let finished = self.current.take();
                self.current = Some(self.open_row(segments, change_idx));
                finished
            }
            None => {
                if let Some(row) = self.current.as_mut() {
                    push_continuation_line(row, segments);
                }
                None
            }
        }
    }

    /// Flush the row still open at end of stream.
    pub fn finish(mut self) -> Option<Row> {
        self.current.take()
    }

    fn open_row(&mut self, segments: Vec<Segment>, change_idx: usize) -> Row {
        let indent: usize = segments[..change_idx].iter().map(Segment::rune_width).sum();
        let (gutter, content) = split_at_runes(&segments, indent);

        let change_id_idx = content.iter().position(Segment::is_change_id_like);
        let commit_id_idx = change_id_idx.and_then(|c| {
            content[c + 1..]
                .iter()
                .position(Segment::is_commit_id_like)
                .map(|off| c + 1 + off)
        });

        let change_id = change_id_idx
            .map(|i| content[i].text.clone())
            .unwrap_or_default();
        let commit_id = commit_id_idx
            .map(|i| content[i].text.clone())
            .unwrap_or_default();

        let mut revision = Revision::new(change_id, commit_id, self.next_index);
        revision.is_working_copy = gutter.iter().any(|s| s.text.contains('@'));
        if let (Some(c), Some(k)) = (change_id_idx, commit_id_idx) {
            revision.hidden = content[c..k].iter().any(|s| s.text.trim() == "hidden");
        }

        let mut row = Row::new(revision);
        row.indent = indent;
        row.previous = self.next_index.checked_sub(1);
        row.lines.push(RowLine {
            gutter,
            segments: content,
            flags: LineFlags::REVISION | LineFlags::HIGHLIGHTABLE,
            change_id_idx,
            commit_id_idx,
        });
        self.next_index += 1;
        row
    }
}

/// Classify and append a continuation line to the open row.
fn push_continuation_line(row: &mut Row, segments: Vec<Segment>) {
    let (gutter, content) = split_at_runes(&segments, row.indent);
    let mut line = RowLine {
        gutter,
        segments: content,
        flags: LineFlags::NONE,
        change_id_idx: None,
        commit_id_idx: None,
    };

    if line.gutter_contains('~') {
        // Elision connector; terminates the highlightable region.
        line.flags = LineFlags::ELIDED;
    } else if row.revision.commit_id.is_empty() {
        // The commit-id can land on a later line of the row.
        match line.segments.iter().position(Segment::is_commit_id_like) {
            Some(idx) => {
                row.revision.commit_id = line.segments[idx].text.clone();
                line.commit_id_idx = Some(idx);
                line.flags = LineFlags::REVISION | LineFlags::HIGHLIGHTABLE;
            }
            None => line.flags = inherited_flags(row),
        }
    } else {
        line.flags = inherited_flags(row);
    }
    row.lines.push(line);
}

fn inherited_flags(row: &Row) -> LineFlags {
    row.lines
        .last()
        .map(|l| l.flags)
        .unwrap_or(LineFlags::NONE)
        .without(LineFlags::REVISION)
        .without(LineFlags::ELIDED)
}

// ===== Entry points =====

/// Parse a complete stream into rows, synchronously. Convenience path for
/// tests and one-shot parses.
pub fn parse_rows<R: Read>(reader: R) -> Vec<Row> {
    let mut assembler = RowAssembler::new();
    let mut rows = Vec::new();
    for line in break_lines(decode(reader)) {
        if let Some(done) = assembler.push_line(line) {
            rows.push(done);
        }
    }
    rows.extend(assembler.finish());
    rows
}

/// Parse a stream on a producer thread, yielding rows in batches through a
/// bounded handoff.
///
/// The producer blocks on `control` before every send: [`Control::More`]
/// releases the next batch, [`Control::Stop`] (or dropping the control
/// sender) makes the producer exit immediately without reading the rest of
/// the stream. The returned channel has capacity 1; batch size governs how
/// many rows accumulate between handshakes.
pub fn parse_rows_streaming<R>(
    reader: R,
    control: Receiver<Control>,
    batch_size: usize,
) -> Receiver<RowBatch>
where
    R: Read + Send + 'static,
{
    let (tx, rx) = sync_channel::<RowBatch>(1);
    thread::spawn(move || {
        let mut assembler = RowAssembler::new();
        let mut rows: Vec<Row> = Vec::new();
        for line in break_lines(decode(reader)) {
            if probe_revision_line(&line).is_some() && rows.len() > batch_size {
                match control.recv() {
                    Ok(Control::More) => {
                        let batch = RowBatch {
                            rows: std::mem::take(&mut rows),
                            has_more: true,
                        };
                        if tx.send(batch).is_err() {
                            return;
                        }
                    }
                    Ok(Control::Stop) | Err(_) => return,
                }
            }
            if let Some(done) = assembler.push_line(line) {
                rows.push(done);
            }
        }
        rows.extend(assembler.finish());
        if !rows.is_empty() {
            match control.recv() {
                Ok(Control::More) => {
                    let _ = tx.send(RowBatch {
                        rows,
                        has_more: false,
                    });
                }
                Ok(Control::Stop) | Err(_) => return,
            }
        }
        // Hold until the consumer acknowledges or hangs up, so the final
        // batch is not dropped by a racing exit.
        let _ = control.recv();
    });
    rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::channel;

    /// Two-revision sample with working copy, colors, a description line
    /// and an elided tail. Mirrors the shape of real graph output.
    fn sample_log() -> &'static str {
        "@  \x1b[1m\x1b[35mxvq\x1b[0m \x1b[33malice@example.com\x1b[0m \x1b[34m1a2b3c4d\x1b[0m\n\
         │  fix the parser bug\n\
         ○  \x1b[35mwqp\x1b[0m \x1b[33mbob@example.com\x1b[0m \x1b[34m5e6f7a8b\x1b[0m\n\
         │  earlier work\n\
         ~  (elided revisions)\n"
    }

    fn parse(text: &str) -> Vec<Row> {
        parse_rows(text.as_bytes())
    }

    #[test]
    fn one_row_per_revision_line() {
        let rows = parse(sample_log());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].revision.change_id, "xvq");
        assert_eq!(rows[0].revision.commit_id, "1a2b3c4d");
        assert_eq!(rows[1].revision.change_id, "wqp");
        assert_eq!(rows[1].revision.commit_id, "5e6f7a8b");
    }

    #[test]
    fn indent_is_rune_width_of_gutter() {
        let rows = parse(sample_log());
        assert_eq!(rows[0].indent, 3);
        assert_eq!(rows[1].indent, 3);
    }

    #[test]
    fn working_copy_marker_detected_in_gutter() {
        let rows = parse(sample_log());
        assert!(rows[0].revision.is_working_copy);
        assert!(!rows[1].revision.is_working_copy);
    }

    #[test]
    fn first_line_is_revision_and_highlightable() {
        let rows = parse(sample_log());
        let flags = rows[0].lines[0].flags;
        assert!(flags.contains(LineFlags::REVISION));
        assert!(flags.contains(LineFlags::HIGHLIGHTABLE));
    }

    #[test]
    fn description_line_inherits_highlightable_only() {
        let rows = parse(sample_log());
        let flags = rows[0].lines[1].flags;
        assert!(!flags.contains(LineFlags::REVISION));
        assert!(flags.contains(LineFlags::HIGHLIGHTABLE));
    }

    #[test]
    fn elided_line_is_flagged_and_last() {
        let rows = parse(sample_log());
        let last = rows[1].lines.last().unwrap();
        assert!(last.flags.contains(LineFlags::ELIDED));
        assert!(!last.flags.contains(LineFlags::HIGHLIGHTABLE));
        let elided_count = rows[1]
            .lines
            .iter()
            .filter(|l| l.flags.contains(LineFlags::ELIDED))
            .count();
        assert_eq!(elided_count, 1);
    }

    #[test]
    fn hidden_marker_between_ids_sets_hidden() {
        let log = "○  \x1b[35mxvq\x1b[0m hidden \x1b[34m1a2b3c4d\x1b[0m\n";
        let rows = parse(log);
        assert!(rows[0].revision.hidden);
    }

    #[test]
    fn commit_id_captured_from_later_line() {
        // Narrow-terminal shape: commit id wraps onto the next line.
        let log = "○  \x1b[35mxvq\x1b[0m alice@example.com\n\
                   │  \x1b[34m1a2b3c4d\x1b[0m\n\
                   │  description\n";
        let rows = parse(log);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].revision.commit_id, "1a2b3c4d");
        assert!(rows[0].lines[1].flags.contains(LineFlags::REVISION));
        assert!(rows[0].lines[1].flags.contains(LineFlags::HIGHLIGHTABLE));
    }

    #[test]
    fn change_id_as_last_segment_does_not_open_a_row() {
        // Guards against gutter continuation lines that happen to contain
        // letters.
        let log = "○  \x1b[35mxvq\x1b[0m \x1b[34m1a2b3c4d\x1b[0m\n\
                   trailing\n";
        let rows = parse(log);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].lines.len(), 2);
    }

    #[test]
    fn preamble_lines_before_first_revision_are_dropped() {
        let log = "some banner output\n\
                   ○  \x1b[35mxvq\x1b[0m \x1b[34m1a2b3c4d\x1b[0m\n";
        let rows = parse(log);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].lines.len(), 1);
    }

    #[test]
    fn previous_links_form_a_chain() {
        let rows = parse(sample_log());
        assert_eq!(rows[0].previous, None);
        assert_eq!(rows[1].previous, Some(0));
        assert_eq!(rows[0].revision.index, 0);
        assert_eq!(rows[1].revision.index, 1);
    }

    #[test]
    fn empty_input_yields_no_rows() {
        assert!(parse("").is_empty());
    }

    #[test]
    fn row_count_matches_revision_predicate_count() {
        let text = sample_log();
        let lines: Vec<Vec<Segment>> =
            break_lines(decode(text.as_bytes())).collect();
        let predicate_count = lines
            .iter()
            .filter(|l| probe_revision_line(l).is_some())
            .count();
        assert_eq!(parse(text).len(), predicate_count);
    }

    // ===== streaming =====

    #[test]
    fn streaming_delivers_all_rows_with_final_batch_marked() {
        let (ctrl_tx, ctrl_rx) = channel();
        let batches = parse_rows_streaming(sample_log().as_bytes(), ctrl_rx, 64);

        let mut rows = Vec::new();
        loop {
            ctrl_tx.send(Control::More).unwrap();
            let batch = match batches.recv() {
                Ok(b) => b,
                Err(_) => break,
            };
            let done = !batch.has_more;
            rows.extend(batch.rows);
            if done {
                break;
            }
        }
        drop(ctrl_tx);
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn streaming_batches_respect_batch_size() {
        let mut log = String::new();
        for i in 0..10 {
            log.push_str(&format!(
                "○  \x1b[35mrev{}\x1b[0m \x1b[34m{:08x}\x1b[0m\n",
                ('a'..='j').nth(i).unwrap(),
                0x1a2b0000u32 + i as u32,
            ));
        }
        // "reva" is alphabetic+digits? 'rev' + letter only -> alphabetic.
        let (ctrl_tx, ctrl_rx) = channel();
        let batches = parse_rows_streaming(std::io::Cursor::new(log.into_bytes()), ctrl_rx, 3);
        let mut total = 0;
        let mut batch_count = 0;
        loop {
            ctrl_tx.send(Control::More).unwrap();
            let batch = match batches.recv() {
                Ok(b) => b,
                Err(_) => break,
            };
            assert!(!batch.rows.is_empty());
            total += batch.rows.len();
            batch_count += 1;
            if !batch.has_more {
                break;
            }
        }
        drop(ctrl_tx);
        assert_eq!(total, 10);
        assert!(batch_count > 1, "should take several batches");
    }

    #[test]
    fn streaming_stop_ends_producer_early() {
        let mut log = String::new();
        for i in 0..100 {
            log.push_str(&format!(
                "○  \x1b[35mzz\x1b[0m \x1b[34m{:08x}\x1b[0m\n│  filler\n",
                i
            ));
        }
        let (ctrl_tx, ctrl_rx) = channel();
        let batches = parse_rows_streaming(std::io::Cursor::new(log.into_bytes()), ctrl_rx, 5);
        ctrl_tx.send(Control::More).unwrap();
        let first = batches.recv().unwrap();
        assert!(first.has_more);
        ctrl_tx.send(Control::Stop).unwrap();
        // Producer exits without sending everything.
        assert!(batches.recv().is_err());
    }

    #[test]
    fn streaming_empty_input_closes_channel_without_batches() {
        let (ctrl_tx, ctrl_rx) = channel();
        let batches = parse_rows_streaming(std::io::Cursor::new(Vec::new()), ctrl_rx, 8);
        ctrl_tx.send(Control::More).unwrap();
        assert!(batches.recv().is_err(), "no batch for empty input");
    }

    #[test]
    fn streaming_dropped_control_sender_ends_producer() {
        let mut log = String::new();
        for i in 0..50 {
            log.push_str(&format!("○  \x1b[35mqq\x1b[0m \x1b[34m{:08x}\x1b[0m\n", i));
        }
        let (ctrl_tx, ctrl_rx) = channel::<Control>();
        let batches = parse_rows_streaming(std::io::Cursor::new(log.into_bytes()), ctrl_rx, 5);
        drop(ctrl_tx);
        assert!(batches.recv().is_err());
    }
}
