//! Read position of one remote file.

use chrono::{DateTime, Utc};

use crate::parsing::Delimiter;
use crate::remote::FileInfo;

/// What a fresh stat says about a target compared to its cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// Everything was consumed and size and mtime are unchanged.
    Unchanged,
    /// The file shrank, or was rewritten in place with the same size; the
    /// cursor was reset to the start.
    Reset,
    /// There are bytes past the cursor.
    Grown,
}

/// Per-target state kept between ticks.
///
/// # Fields Overview
///
/// - `offset`: bytes consumed so far (complete lines only)
/// - `lines`: lines consumed so far, for file-relative line numbers
/// - `size` / `mod_time`: metadata of the last stat
/// - `delimiter`: detected on first read and reused afterwards
/// - `watermark`: newest event timestamp delivered from this target
/// - `held_tail`: size and mtime seen when an unterminated tail was held back
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TargetCursor {
    pub offset: u64,
    pub lines: usize,
    pub size: u64,
    pub mod_time: Option<DateTime<Utc>>,
    pub delimiter: Option<Delimiter>,
    pub watermark: Option<DateTime<Utc>>,
    held_tail: Option<(u64, Option<DateTime<Utc>>)>,
}

impl TargetCursor {
    /// A cursor for a target seen for the first time. `floor` is the source
    /// watermark events must not be older than.
    pub fn starting_at(floor: Option<DateTime<Utc>>) -> Self {
        Self {
            watermark: floor,
            ..Self::default()
        }
    }

    pub fn observe(&mut self, info: &FileInfo) -> Observation {
        if info.size < self.offset
            || (info.size == self.offset && self.offset > 0 && info.mod_time != self.mod_time)
        {
            self.offset = 0;
            self.lines = 0;
            self.delimiter = None;
            self.held_tail = None;
            return Observation::Reset;
        }
        if info.size == self.offset && info.mod_time == self.mod_time {
            return Observation::Unchanged;
        }
        Observation::Grown
    }

    /// True when a tail was held back and the file has not changed since.
    pub fn is_settled(&self, info: &FileInfo) -> bool {
        self.held_tail == Some((info.size, info.mod_time))
    }

    /// Records the consumption of `chunk` read at the current offset.
    pub fn advance(&mut self, chunk: &Chunk<'_>, info: &FileInfo) {
        self.offset += chunk.bytes.len() as u64;
        self.lines += chunk.lines;
        self.size = info.size;
        self.mod_time = info.mod_time;
        self.held_tail = if chunk.held > 0 {
            Some((info.size, info.mod_time))
        } else {
            None
        };
    }

    pub fn raise_watermark(&mut self, ts: DateTime<Utc>) {
        if self.watermark.map(|w| ts > w).unwrap_or(true) {
            self.watermark = Some(ts);
        }
    }
}

/// The consumable part of a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk<'a> {
    pub bytes: &'a [u8],
    pub lines: usize,
    /// Bytes of unterminated tail left for a later tick.
    pub held: usize,
}

/// Splits `bytes` into complete lines and an unterminated tail. A settled
/// tail is consumed as a final line.
pub fn complete_lines(bytes: &[u8], settled: bool) -> Chunk<'_> {
    let end = match bytes.iter().rposition(|b| *b == b'\n') {
        Some(_) if settled => bytes.len(),
        Some(last) => last + 1,
        None if settled => bytes.len(),
        None => 0,
    };
    let consumed = &bytes[..end];
    let mut lines = consumed.iter().filter(|b| **b == b'\n').count();
    if consumed.last().map(|b| *b != b'\n').unwrap_or(false) {
        lines += 1;
    }
    Chunk {
        bytes: consumed,
        lines,
        held: bytes.len() - end,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn info(size: u64, secs: u32) -> FileInfo {
        FileInfo::file(size, Some(Utc.with_ymd_and_hms(2025, 5, 9, 0, 0, secs).unwrap()))
    }

    #[test]
    fn complete_lines_holds_back_the_tail() {
        let c = complete_lines(b"a,b,c\nd,e", false);
        assert_eq!(c.bytes, b"a,b,c\n");
        assert_eq!(c.lines, 1);
        assert_eq!(c.held, 3);

        let settled = complete_lines(b"a,b,c\nd,e", true);
        assert_eq!(settled.bytes.len(), 9);
        assert_eq!(settled.lines, 2);
        assert_eq!(settled.held, 0);

        let none = complete_lines(b"partial", false);
        assert_eq!((none.bytes.len(), none.lines, none.held), (0, 0, 7));
        assert_eq!(complete_lines(b"", false).lines, 0);
    }

    #[test]
    fn cursor_lifecycle() {
        let mut cursor = TargetCursor::default();
        assert_eq!(cursor.observe(&info(9, 1)), Observation::Grown);

        let bytes = b"a,b,c\nd,e";
        let chunk = complete_lines(bytes, cursor.is_settled(&info(9, 1)));
        cursor.advance(&chunk, &info(9, 1));
        assert_eq!((cursor.offset, cursor.lines), (6, 1));

        // Same stat: the held tail is settled now.
        assert_eq!(cursor.observe(&info(9, 1)), Observation::Grown);
        assert!(cursor.is_settled(&info(9, 1)));
        let tail = complete_lines(&bytes[6..], true);
        cursor.advance(&tail, &info(9, 1));
        assert_eq!((cursor.offset, cursor.lines), (9, 2));

        assert_eq!(cursor.observe(&info(9, 1)), Observation::Unchanged);
        assert_eq!(cursor.observe(&info(4, 2)), Observation::Reset);
        assert_eq!((cursor.offset, cursor.lines), (0, 0));
    }

    #[test]
    fn same_size_rewrite_resets() {
        let mut cursor = TargetCursor::default();
        let chunk = complete_lines(b"a,b,c\n", false);
        cursor.advance(&chunk, &info(6, 1));
        assert_eq!(cursor.observe(&info(6, 1)), Observation::Unchanged);
        assert_eq!(cursor.observe(&info(6, 5)), Observation::Reset);
    }

    #[test]
    fn watermark_only_rises() {
        let mut cursor = TargetCursor::starting_at(None);
        let t1 = Utc.with_ymd_and_hms(2025, 5, 9, 1, 0, 0).unwrap();
        let t0 = Utc.with_ymd_and_hms(2025, 5, 9, 0, 0, 0).unwrap();
        cursor.raise_watermark(t1);
        cursor.raise_watermark(t0);
        assert_eq!(cursor.watermark, Some(t1));
    }
}
