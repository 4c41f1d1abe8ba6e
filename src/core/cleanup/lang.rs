//! Static language table for lexical clean-up.
//!
//! Each entry lists the tokens the scanner needs (comment delimiters, quote
//! set, import/export patterns). Adding a language is a table entry, never a
//! new branch in the scanner.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

/// String literal delimiter.
#[derive(Debug, Clone, Copy)]
pub struct Quote {
    pub delim: &'static str,
    /// Literal may continue past the end of its line
    pub multiline: bool,
    /// Backslash escapes the next character
    pub escapes: bool,
}

const fn q(delim: &'static str, multiline: bool, escapes: bool) -> Quote {
    Quote { delim, multiline, escapes }
}

/// How a matching import/export line is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    /// Drop the whole statement, following brackets and `\` continuations
    Statement,
    /// Drop only the matched leading keyword; the declaration stays
    Keyword,
}

#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub pattern: &'static str,
    pub kind: RuleKind,
}

const fn stmt(pattern: &'static str) -> Rule {
    Rule { pattern, kind: RuleKind::Statement }
}

const fn keyword(pattern: &'static str) -> Rule {
    Rule { pattern, kind: RuleKind::Keyword }
}

#[derive(Debug)]
pub struct Language {
    /// Fence label
    pub name: &'static str,
    pub extensions: &'static [&'static str],
    /// Exact file names (Makefile, Dockerfile, ...)
    pub file_names: &'static [&'static str],
    pub line_comments: &'static [&'static str],
    /// Line comment prefixes that document code (kept under `-c`)
    pub doc_line_comments: &'static [&'static str],
    pub block_comments: &'static [(&'static str, &'static str)],
    /// Block comment openers that document code (kept under `-c`)
    pub doc_block_opens: &'static [&'static str],
    pub nested_blocks: bool,
    /// Longest delimiters first
    pub quotes: &'static [Quote],
    /// `'a'` is a char literal but `'a` is a lifetime
    pub rust_chars: bool,
    /// `r"..."`, `r#"..."#`
    pub raw_strings: bool,
    /// Statement-level triple-quoted strings are docstrings
    pub docstrings: bool,
    /// Line comment token must start the line or follow whitespace
    pub comment_needs_space: bool,
    pub imports: &'static [Rule],
    pub exports: &'static [Rule],
}

const C_QUOTES: &[Quote] = &[q("\"", false, true), q("'", false, true)];
const JS_QUOTES: &[Quote] = &[q("`", true, true), q("\"", false, true), q("'", false, true)];
const PY_QUOTES: &[Quote] = &[
    q("\"\"\"", true, true),
    q("'''", true, true),
    q("\"", false, true),
    q("'", false, true),
];
const SH_QUOTES: &[Quote] = &[q("\"", true, true), q("'", true, false)];
const C_BLOCK: &[(&str, &str)] = &[("/*", "*/")];

const JS_IMPORTS: &[Rule] = &[
    stmt(r#"^\s*import\s*[\w*{"'`(]"#),
    stmt(r"^\s*(?:const|let|var)\s+[\w{}\s,:]+=\s*require\s*\("),
];
const JS_EXPORTS: &[Rule] = &[
    stmt(r"^\s*export\s*[{*=]"),
    stmt(r"^\s*module\.exports\s*="),
    stmt(r"^\s*exports\.\w+\s*="),
    keyword(r"^\s*export\s+(?:default\s+)?"),
];

pub static LANGUAGES: &[Language] = &[
    Language {
        name: "rust",
        extensions: &["rs"],
        file_names: &[],
        line_comments: &["//"],
        doc_line_comments: &["///", "//!"],
        block_comments: C_BLOCK,
        doc_block_opens: &["/**", "/*!"],
        nested_blocks: true,
        quotes: &[q("\"", true, true)],
        rust_chars: true,
        raw_strings: true,
        docstrings: false,
        comment_needs_space: false,
        imports: &[stmt(r"^\s*use\s"), stmt(r"^\s*extern\s+crate\s")],
        exports: &[stmt(r"^\s*pub(?:\([^)]*\))?\s+use\s")],
    },
    Language {
        name: "python",
        extensions: &["py", "pyi", "pyw"],
        file_names: &[],
        line_comments: &["#"],
        doc_line_comments: &[],
        block_comments: &[],
        doc_block_opens: &[],
        nested_blocks: false,
        quotes: PY_QUOTES,
        rust_chars: false,
        raw_strings: false,
        docstrings: true,
        comment_needs_space: false,
        imports: &[stmt(r"^\s*import\s"), stmt(r"^\s*from\s+\S+\s+import\s")],
        exports: &[stmt(r"^\s*__all__\s*(?:\+?=|:)")],
    },
    Language {
        name: "javascript",
        extensions: &["js", "mjs", "cjs", "jsx"],
        file_names: &[],
        line_comments: &["//"],
        doc_line_comments: &[],
        block_comments: C_BLOCK,
        doc_block_opens: &["/**"],
        nested_blocks: false,
        quotes: JS_QUOTES,
        rust_chars: false,
        raw_strings: false,
        docstrings: false,
        comment_needs_space: false,
        imports: JS_IMPORTS,
        exports: JS_EXPORTS,
    },
    Language {
        name: "typescript",
        extensions: &["ts", "tsx", "mts", "cts"],
        file_names: &[],
        line_comments: &["//"],
        doc_line_comments: &["///"],
        block_comments: C_BLOCK,
        doc_block_opens: &["/**"],
        nested_blocks: false,
        quotes: JS_QUOTES,
        rust_chars: false,
        raw_strings: false,
        docstrings: false,
        comment_needs_space: false,
        imports: JS_IMPORTS,
        exports: JS_EXPORTS,
    },
    Language {
        name: "go",
        extensions: &["go"],
        file_names: &[],
        line_comments: &["//"],
        doc_line_comments: &[],
        block_comments: C_BLOCK,
        doc_block_opens: &[],
        nested_blocks: false,
        quotes: &[q("`", true, false), q("\"", false, true), q("'", false, true)],
        rust_chars: false,
        raw_strings: false,
        docstrings: false,
        comment_needs_space: false,
        imports: &[stmt(r"^\s*import\s")],
        exports: &[],
    },
    Language {
        name: "c",
        extensions: &["c", "h"],
        file_names: &[],
        line_comments: &["//"],
        doc_line_comments: &["///"],
        block_comments: C_BLOCK,
        doc_block_opens: &["/**", "/*!"],
        nested_blocks: false,
        quotes: C_QUOTES,
        rust_chars: false,
        raw_strings: false,
        docstrings: false,
        comment_needs_space: false,
        imports: &[stmt(r"^\s*#\s*include\b")],
        exports: &[],
    },
    Language {
        name: "cpp",
        extensions: &["cpp", "cc", "cxx", "hpp", "hh", "hxx"],
        file_names: &[],
        line_comments: &["//"],
        doc_line_comments: &["///", "//!"],
        block_comments: C_BLOCK,
        doc_block_opens: &["/**", "/*!"],
        nested_blocks: false,
        quotes: C_QUOTES,
        rust_chars: false,
        raw_strings: false,
        docstrings: false,
        comment_needs_space: false,
        imports: &[stmt(r"^\s*#\s*include\b"), stmt(r"^\s*(?:export\s+)?import\s")],
        exports: &[keyword(r"^\s*export\s+")],
    },
    Language {
        name: "java",
        extensions: &["java"],
        file_names: &[],
        line_comments: &["//"],
        doc_line_comments: &[],
        block_comments: C_BLOCK,
        doc_block_opens: &["/**"],
        nested_blocks: false,
        quotes: &[q("\"\"\"", true, true), q("\"", false, true), q("'", false, true)],
        rust_chars: false,
        raw_strings: false,
        docstrings: false,
        comment_needs_space: false,
        imports: &[stmt(r"^\s*import\s")],
        exports: &[],
    },
    Language {
        name: "kotlin",
        extensions: &["kt", "kts"],
        file_names: &[],
        line_comments: &["//"],
        doc_line_comments: &[],
        block_comments: C_BLOCK,
        doc_block_opens: &["/**"],
        nested_blocks: true,
        quotes: &[q("\"\"\"", true, false), q("\"", false, true), q("'", false, true)],
        rust_chars: false,
        raw_strings: false,
        docstrings: false,
        comment_needs_space: false,
        imports: &[stmt(r"^\s*import\s")],
        exports: &[],
    },
    Language {
        name: "csharp",
        extensions: &["cs"],
        file_names: &[],
        line_comments: &["//"],
        doc_line_comments: &["///"],
        block_comments: C_BLOCK,
        doc_block_opens: &["/**"],
        nested_blocks: false,
        quotes: C_QUOTES,
        rust_chars: false,
        raw_strings: false,
        docstrings: false,
        comment_needs_space: false,
        imports: &[stmt(r"^\s*using\s+[\w.]+\s*;"), stmt(r"^\s*using\s+static\s")],
        exports: &[],
    },
    Language {
        name: "swift",
        extensions: &["swift"],
        file_names: &[],
        line_comments: &["//"],
        doc_line_comments: &["///"],
        block_comments: C_BLOCK,
        doc_block_opens: &["/**"],
        nested_blocks: true,
        quotes: &[q("\"\"\"", true, true), q("\"", false, true)],
        rust_chars: false,
        raw_strings: false,
        docstrings: false,
        comment_needs_space: false,
        imports: &[stmt(r"^\s*(?:@\w+\s+)?import\s")],
        exports: &[],
    },
    Language {
        name: "ruby",
        extensions: &["rb", "rake", "gemspec"],
        file_names: &["Gemfile", "Rakefile"],
        line_comments: &["#"],
        doc_line_comments: &[],
        block_comments: &[("=begin", "=end")],
        doc_block_opens: &[],
        nested_blocks: false,
        quotes: C_QUOTES,
        rust_chars: false,
        raw_strings: false,
        docstrings: false,
        comment_needs_space: false,
        imports: &[stmt(r"^\s*require(?:_relative)?[\s(]")],
        exports: &[],
    },
    Language {
        name: "bash",
        extensions: &["sh", "bash", "zsh"],
        file_names: &[".bashrc", ".zshrc", ".profile"],
        line_comments: &["#"],
        doc_line_comments: &[],
        block_comments: &[],
        doc_block_opens: &[],
        nested_blocks: false,
        quotes: SH_QUOTES,
        rust_chars: false,
        raw_strings: false,
        docstrings: false,
        comment_needs_space: true,
        imports: &[stmt(r"^\s*(?:source|\.)\s+\S")],
        exports: &[keyword(r"^\s*export\s+")],
    },
    Language {
        name: "makefile",
        extensions: &["mk"],
        file_names: &["Makefile", "makefile", "GNUmakefile"],
        line_comments: &["#"],
        doc_line_comments: &[],
        block_comments: &[],
        doc_block_opens: &[],
        nested_blocks: false,
        quotes: &[],
        rust_chars: false,
        raw_strings: false,
        docstrings: false,
        comment_needs_space: false,
        imports: &[stmt(r"^\s*-?include\s")],
        exports: &[stmt(r"^\s*export\s")],
    },
    Language {
        name: "dockerfile",
        extensions: &["dockerfile"],
        file_names: &["Dockerfile", "Containerfile"],
        line_comments: &["#"],
        doc_line_comments: &[],
        block_comments: &[],
        doc_block_opens: &[],
        nested_blocks: false,
        quotes: SH_QUOTES,
        rust_chars: false,
        raw_strings: false,
        docstrings: false,
        comment_needs_space: false,
        imports: &[],
        exports: &[],
    },
    Language {
        name: "yaml",
        extensions: &["yml", "yaml"],
        file_names: &[],
        line_comments: &["#"],
        doc_line_comments: &[],
        block_comments: &[],
        doc_block_opens: &[],
        nested_blocks: false,
        quotes: &[q("\"", false, true), q("'", false, false)],
        rust_chars: false,
        raw_strings: false,
        docstrings: false,
        comment_needs_space: true,
        imports: &[],
        exports: &[],
    },
    Language {
        name: "toml",
        extensions: &["toml"],
        file_names: &[],
        line_comments: &["#"],
        doc_line_comments: &[],
        block_comments: &[],
        doc_block_opens: &[],
        nested_blocks: false,
        quotes: &[
            q("\"\"\"", true, true),
            q("'''", true, false),
            q("\"", false, true),
            q("'", false, false),
        ],
        rust_chars: false,
        raw_strings: false,
        docstrings: false,
        comment_needs_space: false,
        imports: &[],
        exports: &[],
    },
    Language {
        name: "sql",
        extensions: &["sql"],
        file_names: &[],
        line_comments: &["--"],
        doc_line_comments: &[],
        block_comments: C_BLOCK,
        doc_block_opens: &[],
        nested_blocks: false,
        quotes: &[q("'", true, false), q("\"", true, false)],
        rust_chars: false,
        raw_strings: false,
        docstrings: false,
        comment_needs_space: false,
        imports: &[],
        exports: &[],
    },
    Language {
        name: "lua",
        extensions: &["lua"],
        file_names: &[],
        line_comments: &["--"],
        doc_line_comments: &["---"],
        block_comments: &[("--[[", "]]")],
        doc_block_opens: &[],
        nested_blocks: false,
        quotes: &[q("[[", true, false), q("\"", false, true), q("'", false, true)],
        rust_chars: false,
        raw_strings: false,
        docstrings: false,
        comment_needs_space: false,
        imports: &[stmt(r"^\s*(?:local\s+\w+\s*=\s*)?require\s*[\s(]")],
        exports: &[],
    },
    Language {
        name: "html",
        extensions: &["html", "htm", "xhtml", "xml", "svg", "vue"],
        file_names: &[],
        line_comments: &[],
        doc_line_comments: &[],
        block_comments: &[("<!--", "-->")],
        doc_block_opens: &[],
        nested_blocks: false,
        quotes: &[],
        rust_chars: false,
        raw_strings: false,
        docstrings: false,
        comment_needs_space: false,
        imports: &[],
        exports: &[],
    },
    Language {
        name: "css",
        extensions: &["css", "scss", "less"],
        file_names: &[],
        line_comments: &[],
        doc_line_comments: &[],
        block_comments: C_BLOCK,
        doc_block_opens: &[],
        nested_blocks: false,
        quotes: C_QUOTES,
        rust_chars: false,
        raw_strings: false,
        docstrings: false,
        comment_needs_space: false,
        imports: &[stmt(r"^\s*@(?:import|use|forward)\s")],
        exports: &[],
    },
    Language {
        name: "markdown",
        extensions: &["md", "markdown"],
        file_names: &[],
        line_comments: &[],
        doc_line_comments: &[],
        block_comments: &[("<!--", "-->")],
        doc_block_opens: &[],
        nested_blocks: false,
        quotes: &[],
        rust_chars: false,
        raw_strings: false,
        docstrings: false,
        comment_needs_space: false,
        imports: &[],
        exports: &[],
    },
];

/// Import/export regexes compiled once, parallel to [`LANGUAGES`].
pub struct CompiledRules {
    pub imports: Vec<(Regex, RuleKind)>,
    pub exports: Vec<(Regex, RuleKind)>,
}

static COMPILED: LazyLock<Vec<CompiledRules>> = LazyLock::new(|| {
    // Table patterns are fixed; one that does not compile is dropped
    let compile = |rules: &[Rule]| {
        rules
            .iter()
            .filter_map(|r| Regex::new(r.pattern).ok().map(|re| (re, r.kind)))
            .collect()
    };

    LANGUAGES
        .iter()
        .map(|lang| CompiledRules {
            imports: compile(lang.imports),
            exports: compile(lang.exports),
        })
        .collect()
});

impl Language {
    /// Compiled import/export rules for this entry
    pub fn rules(&'static self) -> &'static CompiledRules {
        let idx = LANGUAGES
            .iter()
            .position(|l| std::ptr::eq(l, self))
            .unwrap_or(0);
        &COMPILED[idx]
    }
}

/// Resolve the language for a file name or path: exact file name first, then
/// the lowercase extension.
pub fn detect(path: &Path) -> Option<&'static Language> {
    let file_name = path.file_name()?.to_str()?;

    if let Some(lang) = LANGUAGES.iter().find(|l| l.file_names.contains(&file_name)) {
        return Some(lang);
    }

    let ext = path.extension()?.to_str()?.to_lowercase();
    LANGUAGES
        .iter()
        .find(|l| l.extensions.contains(&ext.as_str()))
}

/// Fence label for a path: the language name, else the raw extension.
pub fn fence_label(path: &Path) -> String {
    match detect(path) {
        Some(lang) => lang.name.to_string(),
        None => path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default(),
    }
}
