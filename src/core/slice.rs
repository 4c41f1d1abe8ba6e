//! Line-window slicing with first-line policy.

use crate::infra::line_index::NewlineIndex;

/// What happens to line 1 regardless of the window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FirstLine {
    /// Line 1 appears only if the window covers it
    #[default]
    Window,
    /// `-m`: prepend line 1 when the window excludes it
    Keep,
    /// `-M`: never emit line 1
    Drop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SliceOptions {
    /// 1-based first line of the window
    pub start: usize,
    /// Window length; `None` is unbounded
    pub max: Option<usize>,
    pub first_line: FirstLine,
}

impl Default for SliceOptions {
    fn default() -> Self {
        Self {
            start: 1,
            max: None,
            first_line: FirstLine::Window,
        }
    }
}

impl SliceOptions {
    pub fn is_identity(&self) -> bool {
        self.start <= 1 && self.max.is_none() && self.first_line != FirstLine::Drop
    }
}

/// Cut `text` down to the configured window. Terminators are preserved.
pub fn slice(text: &str, opts: &SliceOptions) -> String {
    if opts.is_identity() {
        return text.to_string();
    }

    let index = NewlineIndex::build(text.as_bytes());
    let total = index.line_count();
    let start = opts.start.max(1);

    let end = match opts.max {
        Some(0) => 0,
        Some(max) => start.saturating_add(max - 1).min(total),
        None => total,
    };

    let mut out = String::new();

    // Line 1 policy first, then the window
    let window_has_first = start == 1 && end >= 1;
    if opts.first_line == FirstLine::Keep
        && !window_has_first
        && let Some((s, e)) = index.byte_range_for_lines(1, 1)
    {
        out.push_str(&text[s..e]);
        // An unterminated first line still needs to end before the window
        if !out.ends_with('\n') && start <= end {
            out.push('\n');
        }
    }

    let from = if opts.first_line == FirstLine::Drop { start.max(2) } else { start };
    if from <= end
        && let Some((s, e)) = index.byte_range_for_lines(from, end)
    {
        out.push_str(&text[s..e]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered(n: usize) -> String {
        (1..=n).map(|i| format!("line{i}\n")).collect()
    }

    fn opts(start: usize, max: Option<usize>, first_line: FirstLine) -> SliceOptions {
        SliceOptions { start, max, first_line }
    }

    #[test]
    fn window_selects_inclusive_range() {
        let text = numbered(10);
        let out = slice(&text, &opts(5, Some(3), FirstLine::Window));
        assert_eq!(out, "line5\nline6\nline7\n");
    }

    #[test]
    fn start_past_eof_is_empty() {
        let text = numbered(10);
        assert_eq!(slice(&text, &opts(20, None, FirstLine::Window)), "");
    }

    #[test]
    fn keep_first_line_prepends_once() {
        let text = numbered(10);
        assert_eq!(
            slice(&text, &opts(5, Some(2), FirstLine::Keep)),
            "line1\nline5\nline6\n"
        );
        // Already inside the window: not duplicated
        assert_eq!(slice(&text, &opts(1, Some(2), FirstLine::Keep)), "line1\nline2\n");
    }

    #[test]
    fn drop_first_line_removes_it() {
        let text = numbered(4);
        assert_eq!(slice(&text, &opts(1, None, FirstLine::Drop)), "line2\nline3\nline4\n");
        assert_eq!(slice(&text, &opts(1, Some(2), FirstLine::Drop)), "line2\n");
    }

    #[test]
    fn crlf_and_unterminated_tail_survive() {
        let text = "a\r\nb\r\nc";
        assert_eq!(slice(text, &opts(2, None, FirstLine::Window)), "b\r\nc");
        assert_eq!(slice(text, &opts(3, Some(5), FirstLine::Keep)), "a\r\nc");
    }

    #[test]
    fn zero_max_keeps_only_policy_line() {
        let text = numbered(3);
        assert_eq!(slice(&text, &opts(2, Some(0), FirstLine::Window)), "");
        assert_eq!(slice(&text, &opts(2, Some(0), FirstLine::Keep)), "line1\n");
    }
}
