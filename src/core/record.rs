//! Uniform file record shared by every content source.

use std::path::{Path, PathBuf};

use crate::core::cleanup::lang::{self, Language};
use crate::infra::diag::Diagnostics;

/// Where a record came from; also the origin ordering within a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Origin {
    Local,
    Url,
    Git,
}

#[derive(Debug, Clone)]
pub struct FileRecord {
    /// Run-wide identity: canonical path, normalized URL or `git:` ref
    pub identity: String,
    pub origin: Origin,
    /// Label shown in headers and list mode
    pub display: String,
    /// File name used for language detection
    pub name_hint: PathBuf,
    pub bytes: Vec<u8>,
    pub language: Option<&'static Language>,
    /// Processed text, rewritten in place by each stage
    pub text: String,
    pub line_count: usize,
}

impl FileRecord {
    /// Decode `bytes` as UTF-8, lossily (with a warning) when invalid.
    pub fn new(
        identity: String,
        origin: Origin,
        display: String,
        name_hint: PathBuf,
        bytes: Vec<u8>,
        diag: &Diagnostics,
    ) -> Self {
        let text = match std::str::from_utf8(&bytes) {
            Ok(s) => s.to_string(),
            Err(_) => {
                diag.warn_once(
                    format!("lossy:{identity}"),
                    format_args!("{display}: not valid UTF-8, decoding lossily"),
                );
                String::from_utf8_lossy(&bytes).into_owned()
            }
        };

        let language = lang::detect(&name_hint);
        let line_count = count_lines(&text);

        Self {
            identity,
            origin,
            display,
            name_hint,
            bytes,
            language,
            text,
            line_count,
        }
    }

    /// Fence label: detected language, else the raw extension.
    pub fn fence_label(&self) -> String {
        lang::fence_label(Path::new(&self.name_hint))
    }

    /// Replace the processed text and refresh the line count.
    pub fn set_text(&mut self, text: String) {
        self.line_count = count_lines(&text);
        self.text = text;
    }
}

fn count_lines(text: &str) -> usize {
    crate::infra::line_index::NewlineIndex::build(text.as_bytes()).line_count()
}
