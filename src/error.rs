//! Error taxonomy and exit-code mapping.
//!
//! Fatal kinds abort the run through `anyhow` propagation; recoverable kinds
//! (fetch, pattern, missing adapter) are reported once through
//! [`crate::infra::diag::Diagnostics`] and the offending input is skipped.

use std::path::PathBuf;

use miette::{Diagnostic, SourceSpan};

/// Exit status for a clean run
pub const EXIT_OK: u8 = 0;

/// Exit status for fatal errors and collaborator failures
pub const EXIT_FAILURE: u8 = 1;

/// Exit status after a user interrupt (128 + SIGINT)
pub const EXIT_INTERRUPTED: u8 = 130;

/// Malformed directive grammar, labeled with the offending source line.
#[derive(Debug, Diagnostic, thiserror::Error)]
#[error("{}:{line}: {message}", file.display())]
#[diagnostic(code(foldup::directive))]
pub struct DirectiveSyntaxError
{
    pub file: PathBuf,
    pub line: usize,
    pub message: String,

    #[source_code]
    pub src: String,

    #[label("{message}")]
    pub span: SourceSpan,
}

impl DirectiveSyntaxError
{
    /// Build an error pointing at 1-based `line` of `src`.
    pub fn at(
        file: impl Into<PathBuf>,
        src: &str,
        line: usize,
        message: impl Into<String>,
    ) -> Self
    {
        // Locate the byte span of the line for the label
        let start: usize = src
            .split_inclusive('\n')
            .take(line.saturating_sub(1))
            .map(str::len)
            .sum();
        let len = src[start..]
            .find('\n')
            .unwrap_or(src.len() - start);

        Self {
            file: file.into(),
            line,
            message: message.into(),
            src: src.to_string(),
            span: (start, len).into(),
        }
    }
}

/// Domain errors raised by the engine.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FoldError
{
    /// Directive nesting too deep or self-including
    #[error("directive recursion at {}: {reason}", path.display())]
    Recursion
    {
        path: PathBuf, reason: String
    },

    /// A flag value that cannot be interpreted
    #[error("invalid value {value:?} for {flag} in {context}: {reason}")]
    InvalidFlag
    {
        context: String,
        flag: &'static str,
        value: String,
        reason: String,
    },

    /// Every candidate file was removed by the active filters
    #[error("all {candidates} candidate files of {context} were excluded by filters ({summary})")]
    FilterExhaustion
    {
        context: String,
        candidates: usize,
        summary: String,
    },

    /// Network or clone failure for one input
    #[error("fetch failed for {target}: {reason}")]
    Fetch
    {
        target: String, reason: String
    },

    /// Invalid substitution, preserve or glob pattern
    #[error("invalid pattern {spec:?}: {reason}")]
    Pattern
    {
        spec: String, reason: String
    },

    /// Input whose format adapter is not part of this build
    #[error("no {kind} adapter available, skipping {path}")]
    DependencyMissing
    {
        path: String, kind: &'static str
    },

    /// External AI collaborator failure
    #[error("AI collaborator failed for {context}: {reason}")]
    Collaborator
    {
        context: String, reason: String
    },

    /// User interrupt (SIGINT)
    #[error("interrupted")]
    Interrupted,
}

impl FoldError
{
    /// Process exit status for this error
    pub fn exit_code(&self) -> u8
    {
        match self
        {
            FoldError::Interrupted => EXIT_INTERRUPTED,
            _ => EXIT_FAILURE,
        }
    }
}

/// Map any propagated error to a process exit status.
pub fn exit_code(err: &anyhow::Error) -> u8
{
    // Look through the context chain for a domain error
    err.chain()
        .find_map(|e| e.downcast_ref::<FoldError>())
        .map(FoldError::exit_code)
        .unwrap_or(EXIT_FAILURE)
}
