//! Masked substitution: ordered replace/delete specs that never touch text
//! covered by a preserve pattern.
//!
//! Spec syntax is sed-like: `/PATTERN/REPLACEMENT/FLAGS`. The first character
//! is the delimiter; `\/` escapes it. `/PATTERN/` and `/PATTERN//` delete.
//! Flags: `g` (all matches), `i`, `m`, `s` (regex modes).

use regex::{Regex, RegexBuilder};
use tracing::debug;

use crate::error::FoldError;
use crate::infra::diag::Diagnostics;

/// Sorted, coalesced, half-open byte intervals.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntervalSet {
    ranges: Vec<(usize, usize)>,
}

impl IntervalSet {
    /// Build from arbitrary ranges; empty ranges are ignored.
    pub fn from_ranges(mut ranges: Vec<(usize, usize)>) -> Self {
        ranges.retain(|(s, e)| s < e);
        ranges.sort_unstable();

        let mut merged: Vec<(usize, usize)> = Vec::with_capacity(ranges.len());
        for (s, e) in ranges {
            match merged.last_mut() {
                // Touching ranges coalesce too
                Some(last) if s <= last.1 => last.1 = last.1.max(e),
                _ => merged.push((s, e)),
            }
        }
        Self { ranges: merged }
    }

    pub fn ranges(&self) -> &[(usize, usize)] {
        &self.ranges
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// True when `[start, end)` overlaps a protected range. An empty span
    /// intersects only when it lies strictly inside one.
    pub fn intersects(&self, start: usize, end: usize) -> bool {
        // First range that ends after `start`
        let idx = self.ranges.partition_point(|&(_, e)| e <= start);
        let Some(&(s, e)) = self.ranges.get(idx) else {
            return false;
        };

        if start == end {
            s < start && start < e
        } else {
            s < end
        }
    }

    /// Move every range past the given non-overlapping edits.
    /// Each edit is `(old_start, old_end, new_len)`, ascending.
    pub fn shift(&mut self, edits: &[(usize, usize, usize)]) {
        if edits.is_empty() {
            return;
        }

        for range in &mut self.ranges {
            let delta: isize = edits
                .iter()
                .take_while(|&&(_, old_end, _)| old_end <= range.0)
                .map(|&(s, e, n)| n as isize - (e - s) as isize)
                .sum();

            range.0 = range.0.saturating_add_signed(delta);
            range.1 = range.1.saturating_add_signed(delta);
        }
    }
}

/// One compiled replace/delete spec.
#[derive(Debug, Clone)]
pub struct Substitution {
    pub spec: String,
    pattern: Regex,
    replacement: String,
    global: bool,
}

/// One compiled preserve spec.
#[derive(Debug, Clone)]
pub struct Preserve {
    pub spec: String,
    pattern: Regex,
}

fn pattern_error(spec: &str, reason: impl Into<String>) -> FoldError {
    FoldError::Pattern {
        spec: spec.to_string(),
        reason: reason.into(),
    }
}

/// Split a delimited spec into its parts, unescaping the delimiter.
fn split_spec(spec: &str) -> Result<Vec<String>, FoldError> {
    let mut chars = spec.chars();
    let delim = chars
        .next()
        .ok_or_else(|| pattern_error(spec, "empty spec"))?;
    if delim.is_alphanumeric() || delim.is_whitespace() || delim == '\\' {
        return Err(pattern_error(spec, format!("invalid delimiter {delim:?}")));
    }

    let mut parts = Vec::new();
    let mut current = String::new();
    let mut closed = false;

    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(n) if n == delim => current.push(n),
                Some(n) => {
                    current.push('\\');
                    current.push(n);
                }
                None => current.push('\\'),
            }
        } else if c == delim {
            parts.push(std::mem::take(&mut current));
            closed = true;
        } else {
            current.push(c);
        }
    }

    if !closed {
        return Err(pattern_error(spec, format!("missing closing {delim}")));
    }
    parts.push(current);
    Ok(parts)
}

struct Flags {
    global: bool,
    case_insensitive: bool,
    multi_line: bool,
    dot_all: bool,
}

fn parse_flags(spec: &str, raw: &str) -> Result<Flags, FoldError> {
    let mut flags = Flags {
        global: false,
        case_insensitive: false,
        multi_line: false,
        dot_all: false,
    };
    for c in raw.chars() {
        match c {
            'g' => flags.global = true,
            'i' => flags.case_insensitive = true,
            'm' => flags.multi_line = true,
            's' => flags.dot_all = true,
            other => return Err(pattern_error(spec, format!("unknown flag {other:?}"))),
        }
    }
    Ok(flags)
}

fn build_regex(spec: &str, pattern: &str, flags: &Flags) -> Result<Regex, FoldError> {
    if pattern.is_empty() {
        return Err(pattern_error(spec, "empty pattern"));
    }
    RegexBuilder::new(pattern)
        .case_insensitive(flags.case_insensitive)
        .multi_line(flags.multi_line)
        .dot_matches_new_line(flags.dot_all)
        .build()
        .map_err(|e| pattern_error(spec, e.to_string()))
}

/// Rewrite sed-style `\1` back-references into `${1}`.
fn normalize_replacement(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.peek() {
                Some(d) if d.is_ascii_digit() => {
                    out.push_str("${");
                    out.push(*d);
                    out.push('}');
                    chars.next();
                }
                Some('\\') => {
                    out.push('\\');
                    chars.next();
                }
                _ => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

impl Substitution {
    pub fn parse(spec: &str) -> Result<Self, FoldError> {
        let parts = split_spec(spec)?;
        let (pattern, replacement, flags) = match parts.as_slice() {
            [p, r] => (p, r.as_str(), ""),
            [p, r, f] => (p, r.as_str(), f.as_str()),
            _ => return Err(pattern_error(spec, "expected /PATTERN/REPLACEMENT/FLAGS")),
        };

        let flags = parse_flags(spec, flags)?;
        Ok(Self {
            spec: spec.to_string(),
            pattern: build_regex(spec, pattern, &flags)?,
            replacement: normalize_replacement(replacement),
            global: flags.global,
        })
    }

    /// Apply to `text`, skipping matches that touch `mask`. A match that only
    /// partly overlaps a protected range is skipped as a whole. Returns the new
    /// text and the edits made, for shifting the mask.
    fn apply(&self, text: &str, mask: &IntervalSet) -> (String, Vec<(usize, usize, usize)>) {
        let mut out = String::with_capacity(text.len());
        let mut edits = Vec::new();
        let mut last = 0;

        for caps in self.pattern.captures_iter(text) {
            let Some(m) = caps.get(0) else { continue };
            if mask.intersects(m.start(), m.end()) {
                continue;
            }

            let mut rep = String::new();
            caps.expand(&self.replacement, &mut rep);

            out.push_str(&text[last..m.start()]);
            out.push_str(&rep);
            last = m.end();
            edits.push((m.start(), m.end(), rep.len()));

            if !self.global {
                break;
            }
        }

        out.push_str(&text[last..]);
        (out, edits)
    }
}

impl Preserve {
    /// `/PATTERN/`, `/PATTERN/FLAGS` or `/PATTERN//FLAGS`.
    pub fn parse(spec: &str) -> Result<Self, FoldError> {
        let parts = split_spec(spec)?;
        let (pattern, flags) = match parts.as_slice() {
            [p, f] => (p, f.as_str()),
            [p, r, f] if r.is_empty() => (p, f.as_str()),
            _ => return Err(pattern_error(spec, "expected /PATTERN/FLAGS")),
        };

        let flags = parse_flags(spec, flags)?;
        Ok(Self {
            spec: spec.to_string(),
            pattern: build_regex(spec, pattern, &flags)?,
        })
    }
}

/// Every replace and preserve spec of one context, compiled once.
#[derive(Debug, Clone, Default)]
pub struct SubstitutionPlan {
    replaces: Vec<Substitution>,
    preserves: Vec<Preserve>,
}

impl SubstitutionPlan {
    /// Compile the specs; malformed ones are reported once and skipped.
    pub fn compile(replace: &[String], preserve: &[String], diag: &Diagnostics) -> Self {
        let replaces = replace
            .iter()
            .filter_map(|s| Substitution::parse(s).map_err(|e| diag.report(&e)).ok())
            .collect();
        let preserves = preserve
            .iter()
            .filter_map(|s| Preserve::parse(s).map_err(|e| diag.report(&e)).ok())
            .collect();

        Self { replaces, preserves }
    }

    pub fn is_empty(&self) -> bool {
        self.replaces.is_empty()
    }

    /// Union of preserve matches in `text`.
    pub fn mask(&self, text: &str) -> IntervalSet {
        let ranges = self
            .preserves
            .iter()
            .flat_map(|p| p.pattern.find_iter(text).map(|m| (m.start(), m.end())))
            .collect();
        IntervalSet::from_ranges(ranges)
    }

    /// Run every replace spec in order. Preserved text is never rewritten.
    pub fn apply(&self, text: &str) -> String {
        if self.is_empty() {
            return text.to_string();
        }

        let mut mask = self.mask(text);
        let mut current = text.to_string();

        for sub in &self.replaces {
            let (next, edits) = sub.apply(&current, &mask);
            if !edits.is_empty() {
                debug!(spec = %sub.spec, edits = edits.len(), "substitution applied");
            }
            mask.shift(&edits);
            current = next;
        }
        current
    }
}
