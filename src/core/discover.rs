//! Discovery & filtering: turn a context's effective sources into an ordered,
//! de-duplicated list of file records.
//!
//! Order is local includes (declaration order, sorted within a directory),
//! then single URLs, then crawl results, then git files.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use globset::{Glob, GlobMatcher};
use tracing::{debug, instrument};

use crate::core::context::options::{Exclude, Include, Options};
use crate::core::record::{FileRecord, Origin};
use crate::error::FoldError;
use crate::fetch::crawl::{self, CrawlPolicy};
use crate::fetch::git::{self, GitSpec};
use crate::fetch::{Fetched, Fetcher, normalize_url};
use crate::infra::config::WalkConfig;
use crate::infra::diag::Diagnostics;
use crate::infra::io::{looks_binary, read_file_smart};
use crate::infra::utils::{PathUtils, SuffixUtils};
use crate::infra::walk::FileWalker;

/// Inputs whose format adapters are not part of this build
const UNSUPPORTED: &[(&str, &str)] = &[
    ("pdf", "PDF"),
    ("xlsx", "spreadsheet"),
    ("xls", "spreadsheet"),
    ("docx", "document"),
    ("odt", "document"),
    ("pptx", "presentation"),
];

/// Run-wide collaborators of discovery.
pub struct Sources<'a>
{
    pub fetcher: &'a Fetcher,
    pub diag: &'a Diagnostics,
    pub cache_dir: &'a Path,
    /// Declared outputs of the whole run; never ingested
    pub reserved: &'a [PathBuf],
    pub walk: &'a WalkConfig,
    /// Used when a context has no `-d`
    pub default_crawl_depth: usize,
    pub workers: usize,
    pub quiet: bool,
}

/// Compiled user filters of one context
struct Filters<'a>
{
    opts: &'a Options,
    globs: Vec<(PathBuf, GlobMatcher)>,
}

impl<'a> Filters<'a>
{
    fn new(
        opts: &'a Options,
        diag: &Diagnostics,
    ) -> Self
    {
        let globs = opts
            .excludes
            .iter()
            .filter_map(|e| match e
            {
                Exclude::Glob { base, pattern } => match Glob::new(pattern)
                {
                    Ok(g) => Some((base.clone(), g.compile_matcher())),
                    Err(err) =>
                    {
                        diag.report(&FoldError::Pattern { spec: pattern.clone(), reason: err.to_string() });
                        None
                    }
                },
                _ => None,
            })
            .collect();

        Self { opts, globs }
    }

    fn suffix_ok(
        &self,
        name: &str,
    ) -> bool
    {
        let allowed = self
            .opts
            .suffixes
            .is_empty()
            || SuffixUtils::matches_any(name, &self.opts.suffixes);
        allowed && !SuffixUtils::matches_any(name, &self.opts.exclude_suffixes)
    }

    fn keeps_path(
        &self,
        path: &Path,
    ) -> bool
    {
        let by_prefix = self
            .opts
            .excludes
            .iter()
            .any(|e| matches!(e, Exclude::Path(prefix) if path.starts_with(prefix)));
        if by_prefix
        {
            return false;
        }

        let by_glob = self
            .globs
            .iter()
            .any(|(base, m)| m.is_match(PathUtils::display_relative(path, base)));
        if by_glob
        {
            return false;
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();
        self.suffix_ok(&name)
    }

    fn url_excluded(
        &self,
        url: &str,
    ) -> bool
    {
        self.opts
            .excludes
            .iter()
            .any(|e| matches!(e, Exclude::Url(prefix) if url.starts_with(prefix.as_str())))
    }
}

/// Candidate bookkeeping for exhaustion detection
#[derive(Default)]
struct Tally
{
    candidates: usize,
    filtered: usize,
}

/// Discover, filter and read every record of a context.
#[instrument(level = "debug", skip_all, fields(context = label))]
pub fn discover(
    opts: &Options,
    label: &str,
    src: &Sources<'_>,
) -> Result<Vec<FileRecord>, FoldError>
{
    let filters = Filters::new(opts, src.diag);
    let mut tally = Tally::default();
    let mut seen: HashSet<String> = HashSet::new();
    let mut records = Vec::new();

    // --- local ---
    let walker = FileWalker::new()
        .with_gitignore(
            src.walk
                .respect_gitignore,
        )
        .with_follow_symlinks(
            src.walk
                .follow_symlinks,
        );
    let cache_canon = dunce::canonicalize(src.cache_dir).unwrap_or_else(|_| src.cache_dir.to_path_buf());
    let reserved: Vec<PathBuf> = src
        .reserved
        .iter()
        .map(|p| dunce::canonicalize(p).unwrap_or_else(|_| p.clone()))
        .collect();

    for include in &opts.includes
    {
        let Include::Path(root) = include
        else
        {
            continue;
        };

        if !root.exists()
        {
            src.diag
                .warn_once(
                    format!("missing:{}", root.display()),
                    format_args!("{label}: include path not found: {}", root.display()),
                );
            continue;
        }

        let files = if root.is_dir()
        {
            let (files, errors) = walker.walk_files(root);
            for e in errors
            {
                src.diag
                    .warn_once(format!("walk:{e}"), format_args!("{label}: {e}"));
            }
            files
        }
        else
        {
            vec![root.clone()]
        };

        for path in files
        {
            let canon = dunce::canonicalize(&path).unwrap_or_else(|_| path.clone());
            if canon.starts_with(&cache_canon) || reserved.contains(&canon)
            {
                continue;
            }

            tally.candidates += 1;
            if !filters.keeps_path(&path)
            {
                tally.filtered += 1;
                debug!(file = %path.display(), "filtered");
                continue;
            }

            let identity = canon
                .to_string_lossy()
                .into_owned();
            if !seen.insert(identity.clone())
            {
                continue;
            }

            let display = if opts
                .sticky
                .absolute_paths
            {
                identity.replace('\\', "/")
            }
            else
            {
                PathUtils::display_relative(&path, &opts.workdir)
            };

            records.extend(read_local(&path, identity, Origin::Local, display, src.diag));
        }
    }

    // --- single URLs ---
    let single: Vec<&String> = opts
        .includes
        .iter()
        .filter_map(|i| match i
        {
            Include::Url(u) => Some(u),
            Include::Path(_) => None,
        })
        .chain(
            opts.urls
                .iter(),
        )
        .collect();

    for raw in single
    {
        let url = match normalize_url(raw)
        {
            Ok(u) => u,
            Err(e) =>
            {
                src.diag
                    .report(&e);
                continue;
            }
        };

        tally.candidates += 1;
        if filters.url_excluded(url.as_str())
        {
            tally.filtered += 1;
            continue;
        }

        let page = match src
            .fetcher
            .fetch(&url)
        {
            Ok(p) => p,
            Err(FoldError::Interrupted) => return Err(FoldError::Interrupted),
            Err(e) =>
            {
                src.diag
                    .report(&e);
                continue;
            }
        };

        if !filters.suffix_ok(&page.name.to_string_lossy())
        {
            tally.filtered += 1;
            continue;
        }
        if seen.insert(url.to_string())
        {
            records.extend(url_record(&page, src.diag));
        }
    }

    // --- crawl ---
    if !opts
        .crawl
        .is_empty()
    {
        let seeds: Vec<_> = opts
            .crawl
            .iter()
            .filter_map(|raw| match normalize_url(raw)
            {
                Ok(u) => Some(u),
                Err(e) =>
                {
                    src.diag
                        .report(&e);
                    None
                }
            })
            .collect();

        let policy = CrawlPolicy {
            depth: opts
                .crawl_depth
                .unwrap_or(src.default_crawl_depth),
            cross_domain: opts
                .sticky
                .cross_domain,
            excludes: &opts.excludes,
            exclude_suffixes: &opts.exclude_suffixes,
            suffixes: &opts.suffixes,
            workers: src.workers,
            quiet: src.quiet,
        };

        for page in crawl::crawl(src.fetcher, &seeds, &policy, src.diag)?
        {
            if seen.insert(page.url.to_string())
            {
                records.extend(url_record(&page, src.diag));
            }
        }
    }

    // --- git ---
    for raw in &opts.git
    {
        let result = GitSpec::parse(raw).and_then(|spec| {
            git::ingest(
                &spec,
                src.cache_dir,
                &opts.git_exclude,
                src.fetcher
                    .cancel_flag(),
            )
        });

        let files = match result
        {
            Ok(files) => files,
            Err(FoldError::Interrupted) => return Err(FoldError::Interrupted),
            Err(e) =>
            {
                src.diag
                    .report(&e);
                continue;
            }
        };

        for file in files
        {
            tally.candidates += 1;
            let name = file
                .path
                .file_name()
                .map(|n| n.to_string_lossy())
                .unwrap_or_default();
            if !filters.suffix_ok(&name)
            {
                tally.filtered += 1;
                continue;
            }
            if seen.insert(file.identity.clone())
            {
                records.extend(read_local(&file.path, file.identity, Origin::Git, file.display, src.diag));
            }
        }
    }

    if tally.candidates > 0 && tally.filtered == tally.candidates
    {
        return Err(FoldError::FilterExhaustion {
            context: label.to_string(),
            candidates: tally.candidates,
            summary: opts.filter_summary(),
        });
    }

    debug!(records = records.len(), candidates = tally.candidates, "discovered");
    Ok(records)
}

/// Adapter kind when `name` has an unsupported document extension
fn unsupported_kind(name: &Path) -> Option<&'static str>
{
    let ext = name
        .extension()?
        .to_str()?
        .to_ascii_lowercase();
    UNSUPPORTED
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, kind)| *kind)
}

/// Shared drop rules for every origin: unsupported formats and binaries
fn admit(
    name: &Path,
    identity: &str,
    display: &str,
    bytes: &[u8],
    diag: &Diagnostics,
) -> bool
{
    if let Some(kind) = unsupported_kind(name)
    {
        diag.report(&FoldError::DependencyMissing { path: display.to_string(), kind });
        return false;
    }
    if looks_binary(bytes)
    {
        diag.warn_once(format!("binary:{identity}"), format_args!("skipping binary file {display}"));
        return false;
    }
    true
}

fn read_local(
    path: &Path,
    identity: String,
    origin: Origin,
    display: String,
    diag: &Diagnostics,
) -> Option<FileRecord>
{
    if let Some(kind) = unsupported_kind(path)
    {
        diag.report(&FoldError::DependencyMissing { path: display, kind });
        return None;
    }

    let bytes = match read_file_smart(path)
    {
        Ok(content) => content
            .as_ref()
            .to_vec(),
        Err(e) =>
        {
            diag.warn_once(format!("read:{identity}"), format_args!("{display}: {e:#}"));
            return None;
        }
    };

    if !admit(path, &identity, &display, &bytes, diag)
    {
        return None;
    }

    let name_hint = path
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| path.to_path_buf());
    Some(FileRecord::new(identity, origin, display, name_hint, bytes, diag))
}

fn url_record(
    page: &Arc<Fetched>,
    diag: &Diagnostics,
) -> Option<FileRecord>
{
    let identity = page
        .url
        .to_string();
    if !admit(&page.name, &identity, &identity, &page.body, diag)
    {
        return None;
    }

    Some(FileRecord::new(
        identity.clone(),
        Origin::Url,
        identity,
        page.name
            .clone(),
        page.body
            .as_ref()
            .clone(),
        diag,
    ))
}
