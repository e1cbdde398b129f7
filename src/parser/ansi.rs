//! SGR escape-sequence decoder.
//!
//! Turns a raw byte stream (the colored output of `jj log`) into a lazy
//! sequence of styled [`Segment`]s. The stream is consumed incrementally:
//! reads happen in chunks, incomplete UTF-8 sequences and escape prefixes
//! are carried across chunk boundaries, and the active SGR style persists
//! until the next escape changes it.
//!
//! Failure modes, by contract: malformed or unterminated escape sequences
//! degrade to literal text; invalid UTF-8 decodes to U+FFFD; a read error
//! on the underlying stream ends the sequence early without panicking —
//! the owner detects the failure via the subprocess exit status.

use crate::model::Segment;
use ratatui::style::{Color, Modifier, Style};
use std::io::Read;

const ESC: u8 = 0x1b;
const READ_CHUNK: usize = 8 * 1024;

/// Decode a byte stream into a lazy sequence of styled segments.
pub fn decode<R: Read>(reader: R) -> SegmentStream<R> {
    SegmentStream {
        reader,
        buf: Vec::new(),
        style: Style::default(),
        eof: false,
    }
}

/// Lazy segment iterator over a byte stream. Not restartable.
pub struct SegmentStream<R: Read> {
    reader: R,
    buf: Vec<u8>,
    style: Style,
    eof: bool,
}

enum Scan {
    Segment(Segment),
    NeedMore,
}

enum Escape {
    /// A complete CSI sequence of the given byte length; SGR sequences
    /// have already been applied to the style.
    Consumed(usize),
    /// The buffer ends inside the sequence.
    Incomplete,
    /// Not a CSI sequence (or a malformed one): drop the ESC byte and let
    /// the rest render literally.
    NotCsi,
}

impl<R: Read> Iterator for SegmentStream<R> {
    type Item = Segment;

    fn next(&mut self) -> Option<Segment> {
        loop {
            match self.scan() {
                Scan::Segment(seg) => return Some(seg),
                Scan::NeedMore if self.eof => {
                    // Whatever is left is an unterminated escape or an
                    // incomplete UTF-8 tail: emit it literally.
                    if self.buf.is_empty() {
                        return None;
                    }
                    let text = String::from_utf8_lossy(&self.buf).into_owned();
                    self.buf.clear();
                    return Some(Segment::new(text, self.style));
                }
                Scan::NeedMore => self.fill(),
            }
        }
    }
}

impl<R: Read> SegmentStream<R> {
    fn fill(&mut self) {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            match self.reader.read(&mut chunk) {
                Ok(0) => {
                    self.eof = true;
                    return;
                }
                Ok(n) => {
                    self.buf.extend_from_slice(&chunk[..n]);
                    return;
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    tracing::warn!(error = %e, "log stream read failed; ending decode early");
                    self.eof = true;
                    return;
                }
            }
        }
    }

    fn scan(&mut self) -> Scan {
        loop {
            if self.buf.is_empty() {
                return Scan::NeedMore;
            }
            if self.buf[0] == ESC {
                match self.parse_escape() {
                    Escape::Consumed(n) => {
                        self.buf.drain(..n);
                        continue;
                    }
                    Escape::Incomplete => return Scan::NeedMore,
                    Escape::NotCsi => {
                        self.buf.drain(..1);
                        continue;
                    }
                }
            }
            // Text run up to the next escape.
            let end = self
                .buf
                .iter()
                .position(|&b| b == ESC)
                .unwrap_or(self.buf.len());
            let take = if end == self.buf.len() && !self.eof {
                // Hold back an incomplete trailing UTF-8 sequence; the
                // rest of it may arrive with the next read.
                complete_utf8_prefix(&self.buf[..end])
            } else {
                end
            };
            if take == 0 {
                return Scan::NeedMore;
            }
            let bytes: Vec<u8> = self.buf.drain(..take).collect();
            let text = String::from_utf8_lossy(&bytes).into_owned();
            return Scan::Segment(Segment::new(text, self.style));
        }
    }

    /// Parse an escape sequence at the front of the buffer.
    fn parse_escape(&mut self) -> Escape {
        if self.buf.len() < 2 {
            return Escape::Incomplete;
        }
        if self.buf[1] != b'[' {
            return Escape::NotCsi;
        }
        let mut i = 2;
        while i < self.buf.len() && (0x20..=0x3f).contains(&self.buf[i]) {
            i += 1;
        }
        if i == self.buf.len() {
            return Escape::Incomplete;
        }
        let fin = self.buf[i];
        if !(0x40..=0x7e).contains(&fin) {
            return Escape::NotCsi;
        }
        if fin == b'm' {
            let params = parse_params(&self.buf[2..i]);
            self.style = apply_sgr(self.style, &params);
        }
        // Non-SGR CSI sequences are consumed and dropped.
        Escape::Consumed(i + 1)
    }
}

/// Length of the longest prefix of `bytes` that does not end in the middle
/// of a UTF-8 sequence.
fn complete_utf8_prefix(bytes: &[u8]) -> usize {
    let len = bytes.len();
    // A sequence start lies within the last 4 bytes if one is pending.
    for back in 1..=4.min(len) {
        let b = bytes[len - back];
        if b < 0x80 {
            return len; // ASCII tail; nothing pending
        }
        if b >= 0xc0 {
            let expected = match b {
                0xc0..=0xdf => 2,
                0xe0..=0xef => 3,
                _ => 4,
            };
            return if back < expected { len - back } else { len };
        }
        // continuation byte: keep looking for the start
    }
    len
}

fn parse_params(raw: &[u8]) -> Vec<u16> {
    if raw.is_empty() {
        return vec![0];
    }
    raw.split(|&b| b == b';')
        .map(|tok| {
            if tok.is_empty() {
                0
            } else {
                std::str::from_utf8(tok)
                    .ok()
                    .and_then(|s| s.parse::<u16>().ok())
                    .unwrap_or(0)
            }
        })
        .collect()
}

/// Apply one SGR parameter list to a style. Unknown parameters are
/// ignored.
fn apply_sgr(mut style: Style, params: &[u16]) -> Style {
    let mut i = 0;
    while i < params.len() {
        match params[i] {
            0 => style = Style::default(),
            1 => style = style.add_modifier(Modifier::BOLD),
            2 => style = style.add_modifier(Modifier::DIM),
            3 => style = style.add_modifier(Modifier::ITALIC),
            4 => style = style.add_modifier(Modifier::UNDERLINED),
            7 => style = style.add_modifier(Modifier::REVERSED),
            9 => style = style.add_modifier(Modifier::CROSSED_OUT),
            22 => style = style.remove_modifier(Modifier::BOLD | Modifier::DIM),
            23 => style = style.remove_modifier(Modifier::ITALIC),
            24 => style = style.remove_modifier(Modifier::UNDERLINED),
            27 => style = style.remove_modifier(Modifier::REVERSED),
            29 => style = style.remove_modifier(Modifier::CROSSED_OUT),
            30..=37 => style.fg = Some(basic_color(params[i] - 30)),
            38 => {
                let (color, consumed) = extended_color(&params[i + 1..]);
                if let Some(c) = color {
                    style.fg = Some(c);
                }
                i += consumed;
            }
            39 => style.fg = None,
            40..=47 => style.bg = Some(basic_color(params[i] - 40)),
            48 => {
                let (color, consumed) = extended_color(&params[i + 1..]);
                if let Some(c) = color {
                    style.bg = Some(c);
                }
                i += consumed;
            }
            49 => style.bg = None,
            90..=97 => style.fg = Some(bright_color(params[i] - 90)),
            100..=107 => style.bg = Some(bright_color(params[i] - 100)),
            _ => {}
        }
        i += 1;
    }
    style
}

fn basic_color(n: u16) -> Color {
    match n {
        0 => Color::Black,
        1 => Color::Red,
        2 => Color::Green,
        3 => Color::Yellow,
        4 => Color::Blue,
        5 => Color::Magenta,
        6 => Color::Cyan,
        _ => Color::Gray,
    }
}

fn bright_color(n: u16) -> Color {
    match n {
        0 => Color::DarkGray,
        1 => Color::LightRed,
        2 => Color::LightGreen,
        3 => Color::LightYellow,
        4 => Color::LightBlue,
        5 => Color::LightMagenta,
        6 => Color::LightCyan,
        _ => Color::White,
    }
}

/// Decode a `38;...`/`48;...` extended color tail. Returns the color (if
/// well-formed) and the number of parameters consumed beyond the
/// introducer.
fn extended_color(rest: &[u16]) -> (Option<Color>, usize) {
    match rest.first() {
        Some(5) if rest.len() >= 2 => (Some(Color::Indexed(rest[1] as u8)), 2),
        Some(2) if rest.len() >= 4 => (
            Some(Color::Rgb(rest[1] as u8, rest[2] as u8, rest[3] as u8)),
            4,
        ),
        Some(_) => (None, 1),
        None => (None, 0),
    }
}
