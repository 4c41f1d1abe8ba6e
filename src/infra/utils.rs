//! Filepath: src/infra/utils.rs
//! Utility helpers organized by small, focused structs.
//! All functions are associated fns to keep call sites
//! ergonomic, testable, and discoverable.

use std::path::{Component, Path, PathBuf};

/// Lexical path helpers (no filesystem access)
pub struct PathUtils;

impl PathUtils
{
    /// Resolve `p` against `base` unless it is already absolute, then
    /// normalize `.` and `..` components lexically
    pub fn absolutize(
        base: &Path,
        p: &Path,
    ) -> PathBuf
    {
        if p.is_absolute()
        {
            Self::normalize(p)
        }
        else
        {
            Self::normalize(&base.join(p))
        }
    }

    /// Drop `.` components and fold `..` into its parent
    pub fn normalize(p: &Path) -> PathBuf
    {
        let mut out = PathBuf::new();

        for comp in p.components()
        {
            match comp
            {
                Component::CurDir =>
                {}
                Component::ParentDir =>
                {
                    // `..` above the root stays at the root
                    let at_parent = matches!(
                        out.components()
                            .next_back(),
                        Some(Component::ParentDir)
                    );
                    if at_parent || (!out.pop() && !out.has_root())
                    {
                        out.push(comp);
                    }
                }
                other => out.push(other),
            }
        }

        // Keep "." rather than an empty path
        if out
            .as_os_str()
            .is_empty()
        {
            out.push(".");
        }
        out
    }

    /// `p` relative to `base` when it lives below it, else `p` unchanged
    pub fn display_relative(
        p: &Path,
        base: &Path,
    ) -> String
    {
        let shown = p
            .strip_prefix(base)
            .unwrap_or(p);

        // Forward slashes keep output identical across platforms
        shown
            .to_string_lossy()
            .replace('\\', "/")
    }

    /// True when `s` contains glob metacharacters
    pub fn has_glob_meta(s: &str) -> bool
    {
        s.contains(['*', '?', '['])
    }

    /// True for entries whose name starts with a dot (".", ".." excluded)
    pub fn is_hidden_name(name: &str) -> bool
    {
        name.starts_with('.') && name != "." && name != ".."
    }
}

/// File suffix helpers for `-s`/`-S`
pub struct SuffixUtils;

impl SuffixUtils
{
    /// Canonical form: lowercase with a leading dot (`RS` -> `.rs`)
    pub fn normalize(raw: &str) -> String
    {
        let lower = raw
            .trim()
            .to_lowercase();

        if lower.starts_with('.')
        {
            lower
        }
        else
        {
            format!(".{lower}")
        }
    }

    /// Case-insensitive suffix test against normalized suffixes
    pub fn matches_any(
        name: &str,
        suffixes: &[String],
    ) -> bool
    {
        let lower = name.to_lowercase();
        suffixes
            .iter()
            .any(|s| lower.ends_with(s.as_str()))
    }
}
