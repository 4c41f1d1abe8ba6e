//! Directive file grammar.
//!
//! ```text
//! # full-line comment            // also a comment
//! -c -h -s .rs                   flags for the file's own context
//! src/                           bare line: same as `-a src/`
//! [api]                          opens a named child context
//! -a api/ -o api.md  # trailing comments need leading whitespace
//! ```
//!
//! Flag lines use shell-like quoting (`'..'`, `".."`). Outside quotes a
//! backslash only escapes whitespace, quotes and itself, so regex escapes
//! such as `\d` or `\/` reach `-y` untouched.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;

use crate::cli::{ContextFlags, DirectiveArgs};
use crate::core::context::options::{NONE_SENTINEL, parse_count};
use crate::error::DirectiveSyntaxError;

/// A `[name]` block.
#[derive(Debug, Clone)]
pub struct Section
{
    pub name: String,
    /// 1-based line of the `[name]` header
    pub line: usize,
    pub flags: ContextFlags,
}

/// A parsed directive file: the anonymous preamble plus named sections.
#[derive(Debug, Clone)]
pub struct DirectiveFile
{
    pub path: PathBuf,
    pub preamble: ContextFlags,
    pub sections: Vec<Section>,
}

/// Read and parse a directive file.
pub fn parse_file(path: &Path) -> Result<DirectiveFile>
{
    let src = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read directive file {}", path.display()))?;
    Ok(parse_str(path, &src)?)
}

/// Valid context name: `[A-Za-z_][A-Za-z0-9_-]*`
pub fn is_valid_name(name: &str) -> bool
{
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Block under construction
struct Pending
{
    name: Option<String>,
    line: usize,
    tokens: Vec<String>,
}

/// Parse directive source text. `path` is only used for error reporting.
pub fn parse_str(
    path: &Path,
    src: &str,
) -> Result<DirectiveFile, DirectiveSyntaxError>
{
    let err = |line: usize, message: String| DirectiveSyntaxError::at(path, src, line, message);

    let mut blocks = vec![Pending { name: None, line: 0, tokens: Vec::new() }];

    for (idx, raw) in src
        .lines()
        .enumerate()
    {
        let n = idx + 1;
        let line = strip_comment(raw)
            .map_err(|m| err(n, m))?
            .trim();

        if line.is_empty()
        {
            continue;
        }

        if let Some(rest) = line.strip_prefix('[')
        {
            let name = rest
                .strip_suffix(']')
                .ok_or_else(|| err(n, "unterminated context header, expected `[name]`".into()))?;

            if !is_valid_name(name)
            {
                return Err(err(n, format!("invalid context name {name:?}")));
            }
            if blocks
                .iter()
                .any(|b| b.name.as_deref() == Some(name))
            {
                return Err(err(n, format!("duplicate context name {name:?}")));
            }

            blocks.push(Pending { name: Some(name.to_string()), line: n, tokens: Vec::new() });
            continue;
        }

        let tokens = if line.starts_with('-')
        {
            let tokens = tokenize(line).map_err(|m| err(n, m))?;
            validate_line(&tokens).map_err(|m| err(n, m))?;
            tokens
        }
        else
        {
            // Bare line: implicit include
            vec!["-a".to_string(), line.to_string()]
        };

        if let Some(block) = blocks.last_mut()
        {
            block
                .tokens
                .extend(tokens);
        }
    }

    let mut preamble = ContextFlags::default();
    let mut sections = Vec::new();

    for block in blocks
    {
        let flags = DirectiveArgs::try_parse_from(&block.tokens)
            .map_err(|e| err(block.line.max(1), clap_message(&e)))?
            .flags;

        match block.name
        {
            None => preamble = flags,
            Some(name) => sections.push(Section { name, line: block.line, flags }),
        }
    }

    Ok(DirectiveFile { path: path.to_path_buf(), preamble, sections })
}

/// First line of a clap error, without the `error: ` prefix
fn clap_message(e: &clap::Error) -> String
{
    let rendered = e.to_string();
    let first = rendered
        .lines()
        .next()
        .unwrap_or("invalid flags");
    first
        .strip_prefix("error: ")
        .unwrap_or(first)
        .to_string()
}

/// Parse one flag line on its own, so errors carry its line number.
fn validate_line(tokens: &[String]) -> Result<(), String>
{
    let flags = DirectiveArgs::try_parse_from(tokens)
        .map_err(|e| clap_message(&e))?
        .flags;

    // Literal numbers can be checked now; `$VAR` values wait for expansion
    let checks = [
        ("-N", flags.start_line.as_deref(), 1),
        ("-n", flags.max_lines.as_deref(), 0),
        ("-d", flags.crawl_depth.as_deref(), 0),
    ];
    for (flag, value, min) in checks
    {
        if let Some(v) = value
            && v != NONE_SENTINEL
            && !v.contains('$')
        {
            parse_count(v, min).map_err(|reason| format!("invalid value {v:?} for {flag}: {reason}"))?;
        }
    }
    Ok(())
}

/// Remove a full-line or trailing comment. Comment tokens inside quotes and
/// tokens not preceded by whitespace (`https://`) are not comments.
fn strip_comment(line: &str) -> Result<&str, String>
{
    let trimmed = line.trim_start();
    if trimmed.starts_with('#') || trimmed.starts_with("//")
    {
        return Ok("");
    }

    let mut quote: Option<char> = None;
    let mut prev_ws = false;
    let mut escaped = false;

    for (i, c) in line.char_indices()
    {
        if escaped
        {
            escaped = false;
            prev_ws = false;
            continue;
        }
        match quote
        {
            Some(q) =>
            {
                if c == '\\' && q == '"'
                {
                    escaped = true;
                }
                else if c == q
                {
                    quote = None;
                }
            }
            None =>
            {
                if prev_ws && (c == '#' || line[i..].starts_with("//"))
                {
                    return Ok(&line[..i]);
                }
                match c
                {
                    '\'' | '"' => quote = Some(c),
                    '\\' => escaped = true,
                    _ =>
                    {}
                }
            }
        }
        prev_ws = c.is_whitespace();
    }

    // Only flag lines are tokenized; an open quote there is an error later
    if quote.is_some() && trimmed.starts_with('-')
    {
        return Err("unterminated quote".to_string());
    }
    Ok(line)
}

/// Split a flag line into words with shell-like quoting.
pub fn tokenize(line: &str) -> Result<Vec<String>, String>
{
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut chars = line
        .chars()
        .peekable();

    while let Some(c) = chars.next()
    {
        match c
        {
            c if c.is_whitespace() =>
            {
                if in_token
                {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            '\'' =>
            {
                in_token = true;
                loop
                {
                    match chars.next()
                    {
                        Some('\'') => break,
                        Some(ch) => current.push(ch),
                        None => return Err("unterminated quote".to_string()),
                    }
                }
            }
            '"' =>
            {
                in_token = true;
                loop
                {
                    match chars.next()
                    {
                        Some('"') => break,
                        Some('\\') => match chars.peek()
                        {
                            Some(&n @ ('"' | '\\')) =>
                            {
                                current.push(n);
                                chars.next();
                            }
                            _ => current.push('\\'),
                        },
                        Some(ch) => current.push(ch),
                        None => return Err("unterminated quote".to_string()),
                    }
                }
            }
            '\\' =>
            {
                in_token = true;
                match chars.peek()
                {
                    Some(&n) if n.is_whitespace() || matches!(n, '\'' | '"' | '\\') =>
                    {
                        current.push(n);
                        chars.next();
                    }
                    _ => current.push('\\'),
                }
            }
            other =>
            {
                in_token = true;
                current.push(other);
            }
        }
    }

    if in_token
    {
        tokens.push(current);
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests
{
    use super::*;

    fn parse(src: &str) -> Result<DirectiveFile, DirectiveSyntaxError>
    {
        parse_str(Path::new("ctx.fup"), src)
    }

    #[test]
    fn preamble_sections_and_bare_includes()
    {
        let src = "\
# project context
-c -h
src/
[api]   # the public surface
-a api/ -o api.md
docs/readme.md
[tests]
-s .rs
";
        let file = parse(src).unwrap();

        assert!(file.preamble.strip_comments && file.preamble.header);
        assert_eq!(file.preamble.include, vec!["src/"]);

        let names: Vec<_> = file
            .sections
            .iter()
            .map(|s| (s.name.as_str(), s.line))
            .collect();
        assert_eq!(names, vec![("api", 4), ("tests", 7)]);
        assert_eq!(file.sections[0].flags.include, vec!["api/", "docs/readme.md"]);
        assert_eq!(file.sections[0].flags.output.as_deref(), Some("api.md"));
    }

    #[test]
    fn quoting_and_regex_escapes()
    {
        let toks = tokenize(r#"-y '/a b/c/' -Y "/x\"y/" -y /\d+\/x/N/g -a my\ file"#).unwrap();
        assert_eq!(toks, vec!["-y", "/a b/c/", "-Y", "/x\"y/", "-y", r"/\d+\/x/N/g", "-a", "my file"]);
    }

    #[test]
    fn urls_are_not_comments()
    {
        let file = parse("https://example.com/docs // trailing\n-f https://x.test/a#frag\n").unwrap();
        assert_eq!(file.preamble.include, vec!["https://example.com/docs"]);
        assert_eq!(file.preamble.urls, vec!["https://x.test/a#frag"]);
    }

    #[test]
    fn syntax_errors_carry_line_numbers()
    {
        let cases = [
            ("-c\n[bad name]\n", 2, "invalid context name"),
            ("[a]\n[a]\n", 2, "duplicate context name"),
            ("-c\n\n--no-such-flag\n", 3, "unexpected argument"),
            ("-a 'open\n", 1, "unterminated quote"),
            ("[x\n", 1, "unterminated context header"),
            ("-n ten\n", 1, "invalid value"),
        ];

        for (src, line, needle) in cases
        {
            let err = parse(src).unwrap_err();
            assert_eq!(err.line, line, "{src:?}");
            assert!(err.message.contains(needle), "{src:?}: {}", err.message);
        }
    }

    #[test]
    fn variable_numbers_are_checked_later()
    {
        let file = parse("-n $LIMIT\n").unwrap();
        assert_eq!(file.preamble.max_lines.as_deref(), Some("$LIMIT"));
    }
}
