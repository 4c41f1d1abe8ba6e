//! Lexical clean-up: comments, doc comments, imports, exports, blank lines.
//!
//! Order is fixed: comments, then imports, then exports, then blank lines.
//! A line that held only stripped content disappears entirely (terminator
//! included); a line that kept code loses its trailing whitespace. Running the
//! same options over already-cleaned text changes nothing.

pub mod lang;

use lang::{Language, RuleKind};
use regex::Regex;

/// Which clean-up rules run for a file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupOptions
{
    /// `-c`: line, inline and block comments (doc comments stay)
    pub comments: bool,
    /// `-C`: doc comments and docstrings as well
    pub doc_comments: bool,
    /// `-i`
    pub imports: bool,
    /// `-I`
    pub exports: bool,
    /// `-b`
    pub blank_lines: bool,
}

impl CleanupOptions
{
    pub fn is_noop(&self) -> bool
    {
        !(self.comments || self.doc_comments || self.imports || self.exports || self.blank_lines)
    }
}

/// One source line split from its terminator.
#[derive(Debug)]
struct Line<'a>
{
    body: String,
    eol: &'a str,
    /// Something was removed from this line
    stripped: bool,
}

fn split_lines(text: &str) -> Vec<Line<'_>>
{
    text.split_inclusive('\n')
        .map(|raw| {
            let (body, eol) = if let Some(b) = raw.strip_suffix("\r\n")
            {
                (b, &raw[b.len()..])
            }
            else if let Some(b) = raw.strip_suffix('\n')
            {
                (b, &raw[b.len()..])
            }
            else
            {
                (raw, "")
            };
            Line { body: body.to_string(), eol, stripped: false }
        })
        .collect()
}

/// Apply `opts` to `text`. Files without a known language pass through.
pub fn clean(
    text: &str,
    lang: Option<&'static Language>,
    opts: &CleanupOptions,
) -> String
{
    let Some(lang) = lang
    else
    {
        return text.to_string();
    };
    if opts.is_noop()
    {
        return text.to_string();
    }

    let mut lines = split_lines(text);

    if opts.comments || opts.doc_comments
    {
        strip_comments(&mut lines, lang, opts.doc_comments);
    }
    if opts.imports
    {
        strip_statements(&mut lines, &lang.rules().imports);
    }
    if opts.exports
    {
        strip_statements(&mut lines, &lang.rules().exports);
    }

    let mut out = String::with_capacity(text.len());
    for line in &lines
    {
        let blank = line
            .body
            .trim()
            .is_empty();

        // Lines made of stripped content vanish; blank lines only under -b
        if blank && (line.stripped || opts.blank_lines)
        {
            continue;
        }

        if line.stripped
        {
            out.push_str(
                line.body
                    .trim_end(),
            );
        }
        else
        {
            out.push_str(&line.body);
        }
        out.push_str(line.eol);
    }
    out
}

/// Scanner state carried across lines.
#[derive(Debug)]
enum State
{
    Code,
    Str
    {
        close: String,
        escapes: bool,
        multiline: bool,
        drop: bool,
    },
    Block
    {
        open: &'static str,
        close: &'static str,
        nested: bool,
        depth: usize,
        drop: bool,
    },
}

impl State
{
    fn drops(&self) -> bool
    {
        match self
        {
            State::Code => false,
            State::Str { drop, .. } | State::Block { drop, .. } => *drop,
        }
    }
}

fn strip_comments(
    lines: &mut [Line<'_>],
    lang: &Language,
    strip_docs: bool,
)
{
    let mut state = State::Code;

    for (n, line) in lines
        .iter_mut()
        .enumerate()
    {
        // Shebang survives every option
        if n == 0
            && line
                .body
                .starts_with("#!")
        {
            continue;
        }

        let src = std::mem::take(&mut line.body);
        let mut out = String::with_capacity(src.len());
        let mut removed = state.drops();
        let mut i = 0;

        while i < src.len()
        {
            let rest = &src[i..];

            match &mut state
            {
                State::Str { close, escapes, drop, .. } =>
                {
                    let (len, closed) = scan_string(rest, close, *escapes);
                    if *drop
                    {
                        removed = true;
                    }
                    else
                    {
                        out.push_str(&rest[..len]);
                    }
                    i += len;
                    if closed
                    {
                        state = State::Code;
                    }
                }
                State::Block { open, close, nested, depth, drop } =>
                {
                    let (len, closed) = scan_block(rest, open, close, *nested, depth);
                    if *drop
                    {
                        removed = true;
                    }
                    else
                    {
                        out.push_str(&rest[..len]);
                    }
                    i += len;
                    if closed
                    {
                        state = State::Code;
                    }
                }
                State::Code =>
                {
                    let prev = src[..i]
                        .chars()
                        .next_back();

                    match scan_code(rest, prev, lang, out.trim().is_empty(), strip_docs)
                    {
                        Token::Plain(len) =>
                        {
                            out.push_str(&rest[..len]);
                            i += len;
                        }
                        Token::LineComment { strip } =>
                        {
                            if strip
                            {
                                removed = true;
                            }
                            else
                            {
                                out.push_str(rest);
                            }
                            i = src.len();
                        }
                        Token::Enter { opener, next } =>
                        {
                            if next.drops()
                            {
                                removed = true;
                            }
                            else
                            {
                                out.push_str(&rest[..opener]);
                            }
                            i += opener;
                            state = next;
                        }
                    }
                }
            }
        }

        // Single-line literals cannot outlive their line
        if matches!(state, State::Str { multiline: false, .. })
        {
            state = State::Code;
        }

        if removed
        {
            line.stripped = true;
        }
        line.body = out;
    }
}

/// Outcome of scanning code at one position.
enum Token
{
    /// Ordinary code of this many bytes
    Plain(usize),
    /// The rest of the line is a comment
    LineComment
    {
        strip: bool
    },
    /// A literal or block comment opens with `opener` bytes
    Enter
    {
        opener: usize, next: State
    },
}

fn is_ident(c: char) -> bool
{
    c.is_alphanumeric() || c == '_'
}

fn scan_code(
    rest: &str,
    prev: Option<char>,
    lang: &Language,
    at_statement_start: bool,
    strip_docs: bool,
) -> Token
{
    // Rust raw strings: r"..", r#".."#, br".."
    if lang.raw_strings
        && rest.starts_with('r')
        && prev.is_none_or(|p| !is_ident(p) || p == 'b')
    {
        let hashes = rest[1..]
            .bytes()
            .take_while(|&b| b == b'#')
            .count();
        if rest[1 + hashes..].starts_with('"')
        {
            let close = format!("\"{}", "#".repeat(hashes));
            return Token::Enter {
                opener: hashes + 2,
                next: State::Str { close, escapes: false, multiline: true, drop: false },
            };
        }
    }

    for &(open, close) in lang.block_comments
    {
        if rest.starts_with(open)
        {
            let is_doc = lang
                .doc_block_opens
                .iter()
                .any(|d| rest.starts_with(d))
                && !rest[open.len()..].starts_with(close);
            let drop = !is_doc || strip_docs;

            return Token::Enter {
                opener: open.len(),
                next: State::Block { open, close, nested: lang.nested_blocks, depth: 1, drop },
            };
        }
    }

    if lang
        .doc_line_comments
        .iter()
        .any(|d| rest.starts_with(d))
    {
        return Token::LineComment { strip: strip_docs };
    }

    let comment_allowed = !lang.comment_needs_space || prev.is_none_or(char::is_whitespace);
    if comment_allowed
        && lang
            .line_comments
            .iter()
            .any(|c| rest.starts_with(c))
    {
        return Token::LineComment { strip: true };
    }

    if lang.rust_chars && rest.starts_with('\'')
    {
        // A char literal is copied whole; otherwise it is a lifetime tick
        return Token::Plain(rust_char_len(rest).unwrap_or(1));
    }

    for quote in lang.quotes
    {
        if rest.starts_with(quote.delim)
        {
            let docstring = lang.docstrings && quote.delim.len() == 3 && at_statement_start;
            return Token::Enter {
                opener: quote.delim.len(),
                next: State::Str {
                    close: quote
                        .delim
                        .to_string(),
                    escapes: quote.escapes,
                    multiline: quote.multiline,
                    drop: docstring && strip_docs,
                },
            };
        }
    }

    Token::Plain(
        rest.chars()
            .next()
            .map_or(rest.len(), char::len_utf8),
    )
}

/// Length of a Rust char literal at the start of `rest`, if it is one.
fn rust_char_len(rest: &str) -> Option<usize>
{
    let mut chars = rest
        .char_indices()
        .skip(1);
    let (_, c) = chars.next()?;

    if c == '\\'
    {
        // Escaped char: scan to the closing tick
        for (j, c) in chars.skip(1)
        {
            if c == '\''
            {
                return Some(j + 1);
            }
            if j > 12
            {
                break;
            }
        }
        return None;
    }

    match chars.next()
    {
        Some((j, '\'')) => Some(j + 1),
        _ => None,
    }
}

/// Consume a string body up to and including `close`.
fn scan_string(
    rest: &str,
    close: &str,
    escapes: bool,
) -> (usize, bool)
{
    let mut iter = rest.char_indices();
    while let Some((j, c)) = iter.next()
    {
        if escapes && c == '\\'
        {
            iter.next();
            continue;
        }
        if rest[j..].starts_with(close)
        {
            return (j + close.len(), true);
        }
    }
    (rest.len(), false)
}

/// Consume a block comment body, tracking nesting depth.
fn scan_block(
    rest: &str,
    open: &str,
    close: &str,
    nested: bool,
    depth: &mut usize,
) -> (usize, bool)
{
    let mut j = 0;
    while j < rest.len()
    {
        let tail = &rest[j..];
        if nested && tail.starts_with(open)
        {
            *depth += 1;
            j += open.len();
        }
        else if tail.starts_with(close)
        {
            *depth = depth.saturating_sub(1);
            j += close.len();
            if *depth == 0
            {
                return (j, true);
            }
        }
        else
        {
            j += tail
                .chars()
                .next()
                .map_or(1, char::len_utf8);
        }
    }
    (rest.len(), false)
}

/// Remove lines matching import/export rules. Statement rules also consume
/// continuation lines until brackets balance and no `\` continuation remains.
fn strip_statements(
    lines: &mut [Line<'_>],
    rules: &[(Regex, RuleKind)],
)
{
    if rules.is_empty()
    {
        return;
    }

    let mut idx = 0;
    while idx < lines.len()
    {
        let hit = rules
            .iter()
            .find_map(|(re, kind)| {
                re.find(&lines[idx].body)
                    .map(|m| (m.start(), m.end(), *kind))
            });

        match hit
        {
            Some((start, end, RuleKind::Keyword)) =>
            {
                let line = &mut lines[idx];
                let indent_len = line.body[start..end].len()
                    - line.body[start..end]
                        .trim_start()
                        .len();
                let indent = line.body[start..start + indent_len].to_string();
                line.body = format!("{indent}{}", &line.body[end..]);
                line.stripped = true;
                idx += 1;
            }
            Some((_, _, RuleKind::Statement)) =>
            {
                let mut balance: i64 = 0;
                loop
                {
                    let line = &mut lines[idx];
                    balance += bracket_delta(&line.body);
                    let continued = line
                        .body
                        .trim_end()
                        .ends_with('\\');

                    line.body.clear();
                    line.stripped = true;
                    idx += 1;

                    if (balance <= 0 && !continued) || idx >= lines.len()
                    {
                        break;
                    }
                }
            }
            None => idx += 1,
        }
    }
}

fn bracket_delta(s: &str) -> i64
{
    s.chars()
        .map(|c| match c
        {
            '(' | '[' | '{' => 1,
            ')' | ']' | '}' => -1,
            _ => 0,
        })
        .sum()
}
