//! Effective option sets and the merge rules that build them.
//!
//! Four merge kinds:
//! - scalar: the child's value replaces the inherited one (`none` clears it)
//! - list: the child appends in order (`none` clears what was accumulated)
//! - sticky boolean: stays on once enabled by an ancestor; a negation turns
//!   it off in the declaring context only, descendants see it enabled again
//! - non-inherited: visible only in the declaring context

use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::cli::ContextFlags;
use crate::core::cleanup::CleanupOptions;
use crate::core::slice::{FirstLine, SliceOptions};
use crate::error::FoldError;
use crate::infra::diag::Diagnostics;
use crate::infra::utils::{PathUtils, SuffixUtils};

/// Sentinel cancelling inheritance
pub const NONE_SENTINEL: &str = "none";

/// `-u` given without a language
pub const WRAP_AUTO: &str = "auto";

/// One include entry, resolved when declared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Include
{
    Path(PathBuf),
    Url(String),
}

/// One exclude entry, resolved when declared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exclude
{
    /// Component-wise path prefix
    Path(PathBuf),
    /// Glob matched against the path relative to `base`
    Glob
    {
        base: PathBuf, pattern: String
    },
    /// URL prefix
    Url(String),
}

/// Sticky switches, inherited once enabled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sticky
{
    pub strip_comments: bool,
    pub strip_doc_comments: bool,
    pub strip_imports: bool,
    pub strip_exports: bool,
    pub strip_blank: bool,
    pub header: bool,
    pub absolute_paths: bool,
    pub cross_domain: bool,
}

/// Effective options of one context.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Options
{
    // --- scalars ---
    pub workdir: PathBuf,
    /// Explicit workspace; falls back to the workdir
    pub workspace: Option<PathBuf>,
    pub template: Option<PathBuf>,
    pub start_line: Option<usize>,
    pub max_lines: Option<usize>,
    pub first_line: FirstLine,
    pub wrap: Option<String>,
    pub crawl_depth: Option<usize>,
    pub ai_model: Option<String>,
    pub ai_system_prompt: Option<PathBuf>,
    pub ai_seeds: Option<PathBuf>,

    // --- lists ---
    pub includes: Vec<Include>,
    pub excludes: Vec<Exclude>,
    pub suffixes: Vec<String>,
    pub exclude_suffixes: Vec<String>,
    pub replace: Vec<String>,
    pub preserve: Vec<String>,
    pub urls: Vec<String>,
    pub crawl: Vec<String>,
    pub git: Vec<String>,
    pub git_exclude: Vec<String>,

    /// Effective switches of this context
    pub sticky: Sticky,
    /// Switches enabled here or by an ancestor; negations never clear these
    pub enabled: Sticky,

    // --- non-inherited ---
    pub output: Option<PathBuf>,
    pub stdout: bool,
    pub ai: bool,
    pub list: bool,
    pub directives: Vec<PathBuf>,
}

impl Options
{
    /// Options of a context with no ancestors
    pub fn root(workdir: PathBuf) -> Self
    {
        Self { workdir, ..Default::default() }
    }

    pub fn workspace(&self) -> &Path
    {
        self.workspace
            .as_deref()
            .unwrap_or(&self.workdir)
    }

    pub fn cleanup(&self) -> CleanupOptions
    {
        let s = &self.sticky;
        CleanupOptions {
            // -C implies -c
            comments: s.strip_comments || s.strip_doc_comments,
            doc_comments: s.strip_doc_comments,
            imports: s.strip_imports,
            exports: s.strip_exports,
            blank_lines: s.strip_blank,
        }
    }

    pub fn slice(&self) -> SliceOptions
    {
        SliceOptions {
            start: self
                .start_line
                .unwrap_or(1),
            max: self.max_lines,
            first_line: self.first_line,
        }
    }

    /// True when the context declares any content source
    pub fn has_sources(&self) -> bool
    {
        !(self
            .includes
            .is_empty()
            && self
                .urls
                .is_empty()
            && self
                .crawl
                .is_empty()
            && self
                .git
                .is_empty())
    }

    /// One-line description of the active filters, for exhaustion errors
    pub fn filter_summary(&self) -> String
    {
        let mut parts = Vec::new();

        if !self
            .excludes
            .is_empty()
        {
            let shown: Vec<String> = self
                .excludes
                .iter()
                .map(|e| match e
                {
                    Exclude::Path(p) => p
                        .display()
                        .to_string(),
                    Exclude::Glob { pattern, .. } => pattern.clone(),
                    Exclude::Url(u) => u.clone(),
                })
                .collect();
            parts.push(format!("-A {}", shown.join(", ")));
        }
        if !self
            .suffixes
            .is_empty()
        {
            parts.push(format!("-s {}", self.suffixes.join(", ")));
        }
        if !self
            .exclude_suffixes
            .is_empty()
        {
            parts.push(format!("-S {}", self.exclude_suffixes.join(", ")));
        }

        if parts.is_empty()
        {
            "no filters".to_string()
        }
        else
        {
            parts.join("; ")
        }
    }
}

/// Variables visible while resolving one context.
#[derive(Debug, Default)]
pub struct Variables
{
    /// `-E` values, visible to every context resolved later
    pub globals: IndexMap<String, String>,
}

impl Variables
{
    /// Expand `$NAME` / `${NAME}`: locals, then globals, then the process
    /// environment. Unknown names stay verbatim.
    pub fn expand(
        &self,
        locals: &IndexMap<String, String>,
        value: &str,
    ) -> String
    {
        if !value.contains('$')
        {
            return value.to_string();
        }

        shellexpand::env_with_context_no_errors(value, |name: &str| {
            locals
                .get(name)
                .or_else(|| {
                    self.globals
                        .get(name)
                })
                .cloned()
                .or_else(|| std::env::var(name).ok())
        })
        .into_owned()
    }
}

/// Per-resolution inputs besides the flags themselves.
pub struct MergeCtx<'a>
{
    /// Context label for diagnostics
    pub label: &'a str,
    /// Process working directory; target of `-w none`
    pub base_dir: &'a Path,
    pub diag: &'a Diagnostics,
}

/// Result of resolving one context.
#[derive(Debug, Clone)]
pub struct Resolved
{
    pub options: Options,
    /// Globals at resolution time overlaid with the context's locals
    pub vars: IndexMap<String, String>,
}

fn invalid(
    ctx: &MergeCtx<'_>,
    flag: &'static str,
    value: &str,
    reason: impl Into<String>,
) -> FoldError
{
    FoldError::InvalidFlag {
        context: ctx
            .label
            .to_string(),
        flag,
        value: value.to_string(),
        reason: reason.into(),
    }
}

fn parse_assignment(
    ctx: &MergeCtx<'_>,
    flag: &'static str,
    raw: &str,
) -> Result<(String, String), FoldError>
{
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| invalid(ctx, flag, raw, "expected NAME=VALUE"))?;

    let valid = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid
    {
        return Err(invalid(ctx, flag, raw, "invalid variable name"));
    }
    Ok((name.to_string(), value.to_string()))
}

/// Parse a count flag. `min` is the smallest accepted value.
pub fn parse_count(
    raw: &str,
    min: usize,
) -> Result<usize, String>
{
    let n: usize = raw
        .trim()
        .parse()
        .map_err(|_| "expected a non-negative integer".to_string())?;
    if n < min
    {
        return Err(format!("must be at least {min}"));
    }
    Ok(n)
}

/// Scalar merge: inherit, clear on `none`, or parse the expanded value.
fn merge_scalar<T>(
    inherited: Option<T>,
    raw: Option<&str>,
    mut parse: impl FnMut(&str) -> Result<T, FoldError>,
) -> Result<Option<T>, FoldError>
{
    match raw
    {
        None => Ok(inherited),
        Some(v) if v == NONE_SENTINEL => Ok(None),
        Some(v) => parse(v).map(Some),
    }
}

/// List merge: append in order; `none` clears everything accumulated so far.
fn merge_list<T: Clone>(
    inherited: &[T],
    raw: &[String],
    mut map: impl FnMut(&str) -> T,
) -> Vec<T>
{
    let mut out = inherited.to_vec();
    for v in raw
    {
        if v == NONE_SENTINEL
        {
            out.clear();
        }
        else
        {
            out.push(map(v.as_str()));
        }
    }
    out
}

fn is_url(s: &str) -> bool
{
    let lower = s.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Sticky merge for one positive/negative flag pair.
/// Returns the effective value and the enabled bit handed to descendants.
fn merge_sticky(
    ctx: &MergeCtx<'_>,
    enabled: bool,
    positive: bool,
    negative: bool,
    negation_name: &str,
) -> (bool, bool)
{
    let enabled = enabled || positive;
    if negative
    {
        if !enabled
        {
            ctx.diag
                .warn_once(
                    format!("negation:{}:{negation_name}", ctx.label),
                    format_args!(
                        "{}: {negation_name} has nothing to negate (no enabling flag in scope), ignored",
                        ctx.label
                    ),
                );
        }
        return (false, enabled);
    }
    (enabled, enabled)
}

/// Merge `flags` onto `parent` (or onto a fresh root), registering the
/// context's `-E` globals into `vars` on the way.
pub fn resolve(
    parent: Option<&Options>,
    flags: &ContextFlags,
    vars: &mut Variables,
    ctx: &MergeCtx<'_>,
) -> Result<Resolved, FoldError>
{
    let root = Options::root(
        ctx.base_dir
            .to_path_buf(),
    );
    let parent = parent.unwrap_or(&root);

    // Globals first so the same context already sees them
    let no_locals = IndexMap::new();
    for raw in &flags.globals
    {
        let expanded = vars.expand(&no_locals, raw);
        let (name, value) = parse_assignment(ctx, "-E", &expanded)?;
        vars.globals
            .insert(name, value);
    }

    let mut locals = IndexMap::new();
    for raw in &flags.locals
    {
        let expanded = vars.expand(&locals, raw);
        let (name, value) = parse_assignment(ctx, "-e", &expanded)?;
        locals.insert(name, value);
    }

    let expand = |v: &str| vars.expand(&locals, v);

    // --- workdir / workspace ---
    let workdir = match merge_scalar(Some(parent.workdir.clone()), flags.workdir.as_deref(), |v| {
        let v = expand(v);
        let dir = PathUtils::absolutize(&parent.workdir, Path::new(&v));
        if !dir.is_dir()
        {
            return Err(invalid(ctx, "-w", &v, "not a directory"));
        }
        Ok(dunce::canonicalize(&dir).unwrap_or(dir))
    })?
    {
        Some(dir) => dir,
        None => ctx
            .base_dir
            .to_path_buf(),
    };

    let workspace = merge_scalar(parent.workspace.clone(), flags.workspace.as_deref(), |v| {
        Ok(PathUtils::absolutize(&workdir, Path::new(&expand(v))))
    })?;
    let ws: PathBuf = workspace
        .clone()
        .unwrap_or_else(|| workdir.clone());
    let in_workspace = |v: &str| PathUtils::absolutize(&ws, Path::new(&expand(v)));

    // --- scalars ---
    let template =
        merge_scalar(parent.template.clone(), flags.template.as_deref(), |v| Ok(in_workspace(v)))?;

    let count = |flag: &'static str, min: usize| {
        move |v: &str| {
            let v = expand(v);
            parse_count(&v, min).map_err(|reason| invalid(ctx, flag, &v, reason))
        }
    };
    let start_line = merge_scalar(parent.start_line, flags.start_line.as_deref(), count("-N", 1))?;
    let max_lines = merge_scalar(parent.max_lines, flags.max_lines.as_deref(), count("-n", 0))?;
    let crawl_depth =
        merge_scalar(parent.crawl_depth, flags.crawl_depth.as_deref(), count("-d", 0))?;

    let wrap = merge_scalar(parent.wrap.clone(), flags.wrap.as_deref(), |v| Ok(expand(v)))?;
    let ai_model =
        merge_scalar(parent.ai_model.clone(), flags.ai_model.as_deref(), |v| Ok(expand(v)))?;
    let ai_system_prompt = merge_scalar(
        parent
            .ai_system_prompt
            .clone(),
        flags
            .ai_system_prompt
            .as_deref(),
        |v| Ok(in_workspace(v)),
    )?;
    let ai_seeds =
        merge_scalar(parent.ai_seeds.clone(), flags.ai_seeds.as_deref(), |v| Ok(in_workspace(v)))?;

    // -M beats -m; neither keeps the inherited policy
    let first_line = if flags.drop_first_line
    {
        FirstLine::Drop
    }
    else if flags.keep_first_line
    {
        FirstLine::Keep
    }
    else
    {
        parent.first_line
    };

    // --- lists ---
    let includes = merge_list(&parent.includes, &flags.include, |v| {
        let v = expand(v);
        if is_url(&v)
        {
            Include::Url(v)
        }
        else
        {
            Include::Path(PathUtils::absolutize(&workdir, Path::new(&v)))
        }
    });
    let excludes = merge_list(&parent.excludes, &flags.exclude, |v| {
        let v = expand(v);
        if is_url(&v)
        {
            Exclude::Url(v)
        }
        else if PathUtils::has_glob_meta(&v)
        {
            Exclude::Glob { base: workdir.clone(), pattern: v }
        }
        else
        {
            Exclude::Path(PathUtils::absolutize(&workdir, Path::new(&v)))
        }
    });
    let suffixes =
        merge_list(&parent.suffixes, &flags.suffixes, |v| SuffixUtils::normalize(&expand(v)));
    let exclude_suffixes = merge_list(&parent.exclude_suffixes, &flags.exclude_suffixes, |v| {
        SuffixUtils::normalize(&expand(v))
    });
    let replace = merge_list(&parent.replace, &flags.replace, &expand);
    let preserve = merge_list(&parent.preserve, &flags.preserve, &expand);
    let urls = merge_list(&parent.urls, &flags.urls, &expand);
    let crawl = merge_list(&parent.crawl, &flags.crawl, &expand);
    let git = merge_list(&parent.git, &flags.git, &expand);
    let git_exclude = merge_list(&parent.git_exclude, &flags.git_exclude, &expand);

    // --- sticky ---
    let p = parent.enabled;
    // -C implies -c; --keep-comments keeps doc comments too
    let comments = merge_sticky(
        ctx,
        p.strip_comments,
        flags.strip_comments || flags.strip_doc_comments,
        flags.keep_comments,
        "--keep-comments",
    );
    let doc_comments = merge_sticky(
        ctx,
        p.strip_doc_comments,
        flags.strip_doc_comments,
        flags.keep_doc_comments || (flags.keep_comments && p.strip_doc_comments),
        "--keep-doc-comments",
    );
    let imports = merge_sticky(ctx, p.strip_imports, flags.strip_imports, flags.keep_imports, "--keep-imports");
    let exports = merge_sticky(ctx, p.strip_exports, flags.strip_exports, flags.keep_exports, "--keep-exports");
    let blank = merge_sticky(ctx, p.strip_blank, flags.strip_blank, flags.keep_blank, "-B");
    let header = merge_sticky(ctx, p.header, flags.header, flags.no_header, "-H");
    let absolute = merge_sticky(ctx, p.absolute_paths, flags.absolute_paths, flags.relative_paths, "-r");
    let cross = merge_sticky(ctx, p.cross_domain, flags.cross_domain, flags.same_domain, "--same-domain");

    let sticky = Sticky {
        strip_comments: comments.0,
        strip_doc_comments: doc_comments.0,
        strip_imports: imports.0,
        strip_exports: exports.0,
        strip_blank: blank.0,
        header: header.0,
        absolute_paths: absolute.0,
        cross_domain: cross.0,
    };
    let enabled = Sticky {
        strip_comments: comments.1,
        strip_doc_comments: doc_comments.1,
        strip_imports: imports.1,
        strip_exports: exports.1,
        strip_blank: blank.1,
        header: header.1,
        absolute_paths: absolute.1,
        cross_domain: cross.1,
    };

    // --- non-inherited ---
    let output = match flags
        .output
        .as_deref()
    {
        None => None,
        Some(v) if v == NONE_SENTINEL => None,
        Some(v) => Some(in_workspace(v)),
    };
    let directives = flags
        .directives
        .iter()
        .map(|v| PathUtils::absolutize(&workdir, Path::new(&expand(v))))
        .collect();

    let options = Options {
        workdir,
        workspace,
        template,
        start_line,
        max_lines,
        first_line,
        wrap,
        crawl_depth,
        ai_model,
        ai_system_prompt,
        ai_seeds,
        includes,
        excludes,
        suffixes,
        exclude_suffixes,
        replace,
        preserve,
        urls,
        crawl,
        git,
        git_exclude,
        sticky,
        enabled,
        output,
        stdout: flags.stdout,
        ai: flags.ai,
        list: flags.list,
        directives,
    };

    let mut snapshot = vars
        .globals
        .clone();
    snapshot.extend(locals);

    Ok(Resolved { options, vars: snapshot })
}

#[cfg(test)]
mod tests
{
    use clap::Parser;
    use tempfile::TempDir;

    use super::*;
    use crate::cli::DirectiveArgs;

    fn flags(args: &[&str]) -> ContextFlags
    {
        DirectiveArgs::try_parse_from(
            args.iter()
                .copied(),
        )
        .unwrap()
            .flags
    }

    struct Fixture
    {
        dir: TempDir,
        diag: Diagnostics,
        vars: Variables,
    }

    impl Fixture
    {
        fn new() -> Self
        {
            Self { dir: TempDir::new().unwrap(), diag: Diagnostics::new(), vars: Variables::default() }
        }

        fn base(&self) -> PathBuf
        {
            dunce::canonicalize(
                self.dir
                    .path(),
            )
            .unwrap()
        }

        fn resolve(
            &mut self,
            parent: Option<&Options>,
            args: &[&str],
        ) -> Result<Resolved, FoldError>
        {
            let base = self.base();
            let ctx = MergeCtx { label: "test", base_dir: &base, diag: &self.diag };
            resolve(parent, &flags(args), &mut self.vars, &ctx)
        }
    }

    #[test]
    fn sticky_inherits_and_negation_is_local()
    {
        let mut fx = Fixture::new();
        let parent = fx
            .resolve(None, &["-c", "-h"])
            .unwrap()
            .options;

        let child = fx
            .resolve(Some(&parent), &[])
            .unwrap()
            .options;
        let negated = fx
            .resolve(Some(&parent), &["--keep-comments"])
            .unwrap()
            .options;
        let sibling = fx
            .resolve(Some(&parent), &["-i"])
            .unwrap()
            .options;

        assert!(child.sticky.strip_comments);
        assert!(!negated.sticky.strip_comments);
        assert!(negated.sticky.header);
        assert!(sibling.sticky.strip_comments);
        assert!(sibling.sticky.strip_imports);
    }

    #[test]
    fn negation_does_not_reach_grandchildren()
    {
        let mut fx = Fixture::new();
        let root = fx
            .resolve(None, &["-c"])
            .unwrap()
            .options;
        let child = fx
            .resolve(Some(&root), &["--keep-comments"])
            .unwrap()
            .options;
        let grandchild = fx
            .resolve(Some(&child), &[])
            .unwrap()
            .options;

        assert!(root.sticky.strip_comments);
        assert!(!child.sticky.strip_comments);
        assert!(grandchild.sticky.strip_comments);
        // The ancestor enabled it, so the negation is not an orphan
        assert_eq!(fx.diag.count(), 0);
    }

    #[test]
    fn orphan_negation_warns_once_and_is_noop()
    {
        let mut fx = Fixture::new();
        let opts = fx
            .resolve(None, &["-H"])
            .unwrap()
            .options;

        assert!(!opts.sticky.header);
        assert_eq!(fx.diag.count(), 1);
    }

    #[test]
    fn lists_append_in_order_and_none_clears()
    {
        let mut fx = Fixture::new();
        let base = fx.base();
        let parent = fx
            .resolve(None, &["-a", "a", "-a", "b"])
            .unwrap()
            .options;

        let child = fx
            .resolve(Some(&parent), &["-a", "c"])
            .unwrap()
            .options;
        assert_eq!(
            child.includes,
            vec![
                Include::Path(base.join("a")),
                Include::Path(base.join("b")),
                Include::Path(base.join("c"))
            ]
        );

        let cleared = fx
            .resolve(Some(&parent), &["-a", "none", "-a", "d"])
            .unwrap()
            .options;
        assert_eq!(cleared.includes, vec![Include::Path(base.join("d"))]);
    }

    #[test]
    fn scalars_override_and_none_cancels()
    {
        let mut fx = Fixture::new();
        let parent = fx
            .resolve(None, &["-n", "10", "-N", "3", "-m"])
            .unwrap()
            .options;

        let child = fx
            .resolve(Some(&parent), &["-n", "none", "-M"])
            .unwrap()
            .options;

        assert_eq!(child.max_lines, None);
        assert_eq!(child.start_line, Some(3));
        assert_eq!(child.first_line, FirstLine::Drop);
        assert_eq!(parent.first_line, FirstLine::Keep);
    }

    #[test]
    fn non_inherited_flags_stay_put()
    {
        let mut fx = Fixture::new();
        let parent = fx
            .resolve(None, &["-o", "out.txt", "-O", "-l", "--ai"])
            .unwrap()
            .options;
        let child = fx
            .resolve(Some(&parent), &[])
            .unwrap()
            .options;

        assert!(parent.output.is_some() && parent.stdout && parent.list && parent.ai);
        assert!(child.output.is_none() && !child.stdout && !child.list && !child.ai);
    }

    #[test]
    fn variables_expand_locals_then_globals()
    {
        let mut fx = Fixture::new();
        let parent = fx
            .resolve(None, &["-E", "DIR=src", "-e", "DIR=lib", "-a", "$DIR"])
            .unwrap();
        let child = fx
            .resolve(Some(&parent.options), &["-a", "${DIR}/x", "-a", "$UNKNOWN_FOLDUP_VAR"])
            .unwrap();

        let base = fx.base();
        assert_eq!(parent.options.includes, vec![Include::Path(base.join("lib"))]);
        assert_eq!(
            child.options.includes[1..],
            [
                Include::Path(base.join("src/x")),
                Include::Path(base.join("$UNKNOWN_FOLDUP_VAR"))
            ]
        );
        assert_eq!(child.vars.get("DIR").map(String::as_str), Some("src"));
        assert_eq!(parent.vars.get("DIR").map(String::as_str), Some("lib"));
    }

    #[test]
    fn bad_values_are_invalid_flags()
    {
        let mut fx = Fixture::new();

        let err = fx
            .resolve(None, &["-n", "ten"])
            .unwrap_err();
        assert!(matches!(err, FoldError::InvalidFlag { flag: "-n", .. }));

        let err = fx
            .resolve(None, &["-N", "0"])
            .unwrap_err();
        assert!(matches!(err, FoldError::InvalidFlag { flag: "-N", .. }));

        let err = fx
            .resolve(None, &["-w", "does/not/exist"])
            .unwrap_err();
        assert!(matches!(err, FoldError::InvalidFlag { flag: "-w", .. }));
    }

    #[test]
    fn paths_resolve_against_declaring_workdir()
    {
        let mut fx = Fixture::new();
        let base = fx.base();
        std::fs::create_dir(base.join("sub")).unwrap();

        let parent = fx
            .resolve(None, &["-a", "top.rs", "-A", "**/gen/**", "-s", "RS"])
            .unwrap()
            .options;
        let child = fx
            .resolve(Some(&parent), &["-w", "sub", "-a", "inner.rs", "-o", "out/x.md"])
            .unwrap()
            .options;

        assert_eq!(child.workdir, base.join("sub"));
        assert_eq!(
            child.includes,
            vec![Include::Path(base.join("top.rs")), Include::Path(base.join("sub/inner.rs"))]
        );
        assert_eq!(child.excludes, vec![Exclude::Glob { base: base.clone(), pattern: "**/gen/**".into() }]);
        assert_eq!(child.suffixes, vec![".rs"]);
        assert_eq!(child.output, Some(base.join("sub/out/x.md")));
    }
}
