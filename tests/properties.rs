// Property tests for line slicing and preserve-interval arithmetic.

use foldup::core::cleanup::{CleanupOptions, clean, lang};
use foldup::core::{FirstLine, IntervalSet, SliceOptions, slice::slice};
use proptest::prelude::*;

fn numbered(n: usize, crlf: bool) -> String
{
    let eol = if crlf { "\r\n" } else { "\n" };
    (1..=n)
        .map(|i| format!("l{i}{eol}"))
        .collect()
}

/// Realistic line shapes; arbitrary byte soup is not valid source
const RUST_LINES: &[&str] = &[
    "use std::fmt;",
    "use std::{",
    "    io,",
    "};",
    "",
    "// note",
    "/// doc",
    "fn a() { 1 } // tail",
    "let s = \"// not a comment\";",
    "/* block */ let x = 1;",
    "/* open",
    "still comment */",
    "fn b<'a>(x: &'a str) -> char { 'x' }",
    "    body();",
];

proptest! {
    #[test]
    fn window_selects_exactly_the_requested_lines(
        n in 0usize..40,
        start in 1usize..50,
        max in proptest::option::of(0usize..50),
        crlf in any::<bool>(),
    )
    {
        let text = numbered(n, crlf);
        let opts = SliceOptions { start, max, first_line: FirstLine::Window };
        let out = slice(&text, &opts);

        let end = match max
        {
            Some(m) => (start + m).saturating_sub(1).min(n),
            None => n,
        };
        let expected: String = if start <= end
        {
            (start..=end).map(|i| format!("l{i}{}", if crlf { "\r\n" } else { "\n" })).collect()
        }
        else
        {
            String::new()
        };
        prop_assert_eq!(out, expected);
    }

    #[test]
    fn keep_first_line_never_duplicates_it(
        n in 1usize..30,
        start in 1usize..35,
        max in 0usize..10,
    )
    {
        let text = numbered(n, false);
        let opts = SliceOptions { start, max: Some(max), first_line: FirstLine::Keep };
        let out = slice(&text, &opts);

        prop_assert!(out.matches("l1\n").count() <= 1);
        prop_assert!(out.starts_with("l1\n"));
    }

    #[test]
    fn drop_first_line_always_removes_it(n in 1usize..30, start in 1usize..5)
    {
        let text = numbered(n, false);
        let opts = SliceOptions { start, max: None, first_line: FirstLine::Drop };
        let out = slice(&text, &opts);

        prop_assert!(!out.starts_with("l1\n"));
    }

    #[test]
    fn intervals_are_sorted_disjoint_and_cover_inputs(
        raw in proptest::collection::vec((0usize..200, 0usize..30), 0..20)
    )
    {
        let ranges: Vec<(usize, usize)> = raw.iter().map(|&(s, len)| (s, s + len)).collect();
        let set = IntervalSet::from_ranges(ranges.clone());

        for pair in set.ranges().windows(2)
        {
            prop_assert!(pair[0].1 < pair[1].0);
        }
        for &(s, e) in &ranges
        {
            if s < e
            {
                prop_assert!(set.intersects(s, e));
            }
        }
    }

    #[test]
    fn shifting_tracks_an_insertion_before_every_range(
        raw in proptest::collection::vec((10usize..200, 1usize..30), 1..10),
        grow in 0usize..40,
    )
    {
        let ranges: Vec<(usize, usize)> = raw.iter().map(|&(s, len)| (s, s + len)).collect();
        let mut set = IntervalSet::from_ranges(ranges);
        let before: Vec<(usize, usize)> = set.ranges().to_vec();

        // Replace bytes [0, 5) with `grow` bytes
        set.shift(&[(0, 5, grow)]);

        for (old, new) in before.iter().zip(set.ranges())
        {
            prop_assert_eq!(new.0 + 5, old.0 + grow);
            prop_assert_eq!(new.1 - new.0, old.1 - old.0);
        }
    }

    #[test]
    fn rust_clean_up_is_idempotent(lines in proptest::collection::vec(prop::sample::select(RUST_LINES), 0..16))
    {
        let text = lines.join("\n");
        let language = lang::detect(std::path::Path::new("x.rs"));
        let opts = CleanupOptions { comments: true, doc_comments: false, imports: true, exports: false, blank_lines: true };

        let once = clean(&text, language, &opts);
        let twice = clean(&once, language, &opts);
        prop_assert_eq!(once, twice);
    }
}
