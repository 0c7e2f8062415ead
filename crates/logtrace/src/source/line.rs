//! Line assembly — turns the raw byte stream of a log file into lines.

use crate::parser::TAB_WIDTH;

/// A finished line handed back by [`LineAssembler::feed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEvent {
    /// Terminated by a newline (newline and trailing CR stripped)
    Complete(String),
    /// Cut on reaching the size limit without a newline
    Overflow(String),
}

impl LineEvent {
    pub fn into_text(self) -> String {
        match self {
            LineEvent::Complete(s) | LineEvent::Overflow(s) => s,
        }
    }
}

/// Accumulates bytes across reads until a newline completes a line.
///
/// A partial line survives between `feed` calls, so a line written in two
/// halves across two polls comes out once, whole.
#[derive(Debug)]
pub struct LineAssembler {
    pending: Vec<u8>,
    max_len: usize,
    discarding: bool,
    /// A line was just cut; a newline right after it ends nothing
    cut: bool,
}

impl LineAssembler {
    pub fn new(max_len: usize) -> Self {
        Self {
            pending: Vec::new(),
            max_len: max_len.max(1),
            discarding: false,
            cut: false,
        }
    }

    /// Drop everything up to and including the next newline.
    ///
    /// Used after seeking into the middle of a file so the first record
    /// starts on a line boundary.
    pub fn discard_until_newline(&mut self) {
        self.pending.clear();
        self.discarding = true;
        self.cut = false;
    }

    pub fn is_discarding(&self) -> bool {
        self.discarding
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Forget any partial line and discard state
    pub fn reset(&mut self) {
        self.pending.clear();
        self.discarding = false;
        self.cut = false;
    }

    pub fn feed(&mut self, bytes: &[u8], out: &mut Vec<LineEvent>) {
        for &byte in bytes {
            if self.discarding {
                if byte == b'\n' {
                    self.discarding = false;
                }
                continue;
            }

            match byte {
                b'\n' if self.cut => self.cut = false,
                b'\n' => out.push(LineEvent::Complete(self.take())),
                b'\t' => {
                    for _ in 0..TAB_WIDTH {
                        self.push(b' ', out);
                    }
                }
                _ => self.push(byte, out),
            }
        }
    }

    /// Append one byte, cutting the line once it holds `max_len` bytes.
    fn push(&mut self, byte: u8, out: &mut Vec<LineEvent>) {
        self.cut = false;
        self.pending.push(byte);
        if self.pending.len() >= self.max_len {
            out.push(LineEvent::Overflow(self.take()));
            self.cut = true;
        }
    }

    /// The pending partial line, if any
    pub fn flush(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            None
        } else {
            Some(self.take())
        }
    }

    fn take(&mut self) -> String {
        if self.pending.last() == Some(&b'\r') {
            self.pending.pop();
        }
        let line = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(asm: &mut LineAssembler, bytes: &[u8]) -> Vec<LineEvent> {
        let mut out = Vec::new();
        asm.feed(bytes, &mut out);
        out
    }

    #[test]
    fn test_complete_lines() {
        let mut asm = LineAssembler::new(1024);
        let out = feed(&mut asm, b"one\ntwo\n");
        assert_eq!(
            out,
            vec![
                LineEvent::Complete("one".into()),
                LineEvent::Complete("two".into()),
            ]
        );
        assert!(!asm.has_pending());
    }

    #[test]
    fn test_partial_line_survives_between_feeds() {
        let mut asm = LineAssembler::new(1024);
        assert!(feed(&mut asm, b"1001 10:00").is_empty());
        assert_eq!(asm.pending_len(), 10);

        let out = feed(&mut asm, b":00.000 hi\n");
        assert_eq!(out, vec![LineEvent::Complete("1001 10:00:00.000 hi".into())]);
    }

    #[test]
    fn test_tab_becomes_four_spaces() {
        let mut asm = LineAssembler::new(1024);
        let out = feed(&mut asm, b"a\tb\n");
        assert_eq!(out, vec![LineEvent::Complete("a    b".into())]);
    }

    #[test]
    fn test_crlf_is_stripped() {
        let mut asm = LineAssembler::new(1024);
        let out = feed(&mut asm, b"windows\r\n");
        assert_eq!(out, vec![LineEvent::Complete("windows".into())]);
    }

    #[test]
    fn test_empty_line() {
        let mut asm = LineAssembler::new(1024);
        let out = feed(&mut asm, b"\n");
        assert_eq!(out, vec![LineEvent::Complete(String::new())]);
    }

    #[test]
    fn test_discard_until_newline() {
        let mut asm = LineAssembler::new(1024);
        asm.discard_until_newline();
        let out = feed(&mut asm, b"tail of a cut line\nfirst\n");
        assert_eq!(out, vec![LineEvent::Complete("first".into())]);
        assert!(!asm.is_discarding());
    }

    #[test]
    fn test_overflow_cuts_line() {
        let mut asm = LineAssembler::new(4);
        let out = feed(&mut asm, b"abcdef\n");
        assert_eq!(
            out,
            vec![
                LineEvent::Overflow("abcd".into()),
                LineEvent::Complete("ef".into()),
            ]
        );
    }

    #[test]
    fn test_newline_after_cut_adds_no_empty_line() {
        let mut asm = LineAssembler::new(4);
        let out = feed(&mut asm, b"abcd\nnext\n");
        assert_eq!(
            out,
            vec![
                LineEvent::Overflow("abcd".into()),
                LineEvent::Overflow("next".into()),
            ]
        );

        let mut asm = LineAssembler::new(5);
        let mut out = feed(&mut asm, b"abcde");
        out.extend(feed(&mut asm, b"\nxy\n"));
        assert_eq!(
            out,
            vec![
                LineEvent::Overflow("abcde".into()),
                LineEvent::Complete("xy".into()),
            ]
        );
    }

    #[test]
    fn test_tab_never_exceeds_limit() {
        let mut asm = LineAssembler::new(4);
        let out = feed(&mut asm, b"ab\tc\n");
        assert_eq!(
            out,
            vec![
                LineEvent::Overflow("ab  ".into()),
                LineEvent::Complete("  c".into()),
            ]
        );
    }

    #[test]
    fn test_flush_returns_partial_once() {
        let mut asm = LineAssembler::new(1024);
        feed(&mut asm, b"no newline");
        assert_eq!(asm.flush(), Some("no newline".to_string()));
        assert_eq!(asm.flush(), None);
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let mut asm = LineAssembler::new(1024);
        let out = feed(&mut asm, b"bad \xFF byte\n");
        assert_eq!(out.len(), 1);
        assert!(out[0].clone().into_text().starts_with("bad "));
    }
}
