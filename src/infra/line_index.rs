//! Newline index with LF/CRLF-robust line/byte mapping.
//!
//! Goals
//! - Single pass over bytes to record '\n' positions.
//! - 1-based external line numbers.
//! - O(1) line→byte start, and line spans that keep their terminators so a
//!   slice of lines concatenates back into the original bytes.
//!
//! Notes
//! - An empty buffer has 0 lines.
//! - A trailing '\n' terminates the last line; it does not open a new one.
//! - For ranges, end is exclusive (Rust slicing convention).

#[derive(Debug, Clone)]
pub struct NewlineIndex {
    /// Byte positions of every '\n' in the buffer.
    nl_positions: Vec<usize>,
    /// Total byte length of the buffer.
    len: usize,
}

impl NewlineIndex {
    /// Build an index recording positions of '\n'.
    pub fn build(bytes: &[u8]) -> Self {
        let mut nl_positions = Vec::with_capacity(bytes.len() / 48);
        let mut i = 0usize;

        // Single pass; record every '\n' offset.
        while let Some(pos) = memchr::memchr(b'\n', &bytes[i..]) {
            let abs = i + pos;
            nl_positions.push(abs);
            i = abs + 1;
        }

        Self {
            nl_positions,
            len: bytes.len(),
        }
    }

    /// Total number of logical lines.
    /// Empty buffer => 0; otherwise one per '\n', plus an unterminated tail.
    pub fn line_count(&self) -> usize {
        if self.len == 0 {
            return 0;
        }
        let terminated = self.nl_positions.len();
        match self.nl_positions.last() {
            Some(&last) if last + 1 == self.len => terminated,
            _ => terminated + 1,
        }
    }

    /// Start byte (inclusive) of a 1-based line.
    /// Returns None if line is out of range.
    pub fn start_byte_of_line(&self, line1: usize) -> Option<usize> {
        if line1 == 0 || line1 > self.line_count() {
            return None;
        }
        if line1 == 1 {
            return Some(0);
        }
        // For line L>1, start is one past the previous '\n'.
        self.nl_positions
            .get(line1 - 2)
            .map(|&prev_nl| prev_nl + 1)
    }

    /// End byte (exclusive) of a 1-based line, including its terminator.
    pub fn end_byte_of_line_inclusive(&self, line1: usize) -> Option<usize> {
        if line1 == 0 || line1 > self.line_count() {
            return None;
        }
        Some(
            self.nl_positions
                .get(line1 - 1)
                .map_or(self.len, |&nl| nl + 1),
        )
    }

    /// Byte range (start..end) covering an inclusive 1-based line span,
    /// terminators included. The end line is clamped to the line count.
    pub fn byte_range_for_lines(&self, start_line1: usize, end_line1: usize) -> Option<(usize, usize)> {
        if start_line1 == 0 || start_line1 > end_line1 {
            return None;
        }
        let end = end_line1.min(self.line_count());
        let s = self.start_byte_of_line(start_line1)?;
        let e = self.end_byte_of_line_inclusive(end)?;
        (s <= e).then_some((s, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_terminated_and_unterminated_lines() {
        assert_eq!(NewlineIndex::build(b"").line_count(), 0);
        assert_eq!(NewlineIndex::build(b"a").line_count(), 1);
        assert_eq!(NewlineIndex::build(b"a\n").line_count(), 1);
        assert_eq!(NewlineIndex::build(b"a\nb").line_count(), 2);
        assert_eq!(NewlineIndex::build(b"a\r\nb\r\n").line_count(), 2);
        assert_eq!(NewlineIndex::build(b"\n\n").line_count(), 2);
    }

    #[test]
    fn ranges_keep_terminators() {
        let text = "one\r\ntwo\nthree";
        let idx = NewlineIndex::build(text.as_bytes());

        let (s, e) = idx.byte_range_for_lines(1, 2).unwrap();
        assert_eq!(&text[s..e], "one\r\ntwo\n");

        let (s, e) = idx.byte_range_for_lines(3, 9).unwrap();
        assert_eq!(&text[s..e], "three");

        assert!(idx.byte_range_for_lines(4, 5).is_none());
        assert!(idx.byte_range_for_lines(0, 1).is_none());
    }
}
