//! Shallow git ingestion for `-g URL[^BRANCH][/SUBPATH]`.
//!
//! Repositories are cloned once into `<cache>/git/<xxh64>` (staged in a temp
//! dir and renamed into place) and reused by later runs.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use globset::{Glob, GlobSetBuilder};
use tracing::{debug, info, instrument};
use xxhash_rust::xxh64::Xxh64;

use crate::error::FoldError;
use crate::infra::signal::CancelFlag;
use crate::infra::utils::PathUtils;
use crate::infra::walk::FileWalker;

/// Parsed `-g` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitSpec {
    pub repo: String,
    pub branch: Option<String>,
    /// Directory inside the repository; empty for the whole tree
    pub subpath: String,
}

impl GitSpec {
    /// Split `URL[^BRANCH][/SUBPATH]`.
    ///
    /// With `^` the repository is everything before it. Otherwise the
    /// repository ends at a `.git` segment or, for http(s) URLs, after the
    /// first two path segments (`host/owner/name`).
    pub fn parse(raw: &str) -> Result<Self, FoldError> {
        let raw = raw.trim();
        let bad = |reason: &str| FoldError::Fetch {
            target: raw.to_string(),
            reason: reason.to_string(),
        };

        if raw.is_empty() {
            return Err(bad("empty git reference"));
        }

        if let Some((repo, rest)) = raw.split_once('^') {
            let (branch, subpath) = rest.split_once('/').unwrap_or((rest, ""));
            if repo.is_empty() || branch.is_empty() {
                return Err(bad("expected URL^BRANCH[/SUBPATH]"));
            }
            return Ok(Self {
                repo: repo.to_string(),
                branch: Some(branch.to_string()),
                subpath: clean_subpath(subpath),
            });
        }

        if let Some(idx) = raw.find(".git/") {
            let (repo, rest) = raw.split_at(idx + 4);
            return Ok(Self {
                repo: repo.to_string(),
                branch: None,
                subpath: clean_subpath(rest),
            });
        }

        if let Some(after) = raw
            .strip_prefix("https://")
            .or_else(|| raw.strip_prefix("http://"))
        {
            let scheme_len = raw.len() - after.len();
            // host, owner, name
            let mut cut = None;
            let mut seen = 0;
            for (i, c) in after.char_indices() {
                if c == '/' {
                    seen += 1;
                    if seen == 3 {
                        cut = Some(scheme_len + i);
                        break;
                    }
                }
            }
            if let Some(cut) = cut {
                return Ok(Self {
                    repo: raw[..cut].to_string(),
                    branch: None,
                    subpath: clean_subpath(&raw[cut..]),
                });
            }
        }

        Ok(Self {
            repo: raw.to_string(),
            branch: None,
            subpath: String::new(),
        })
    }

    /// Short repository name used in display paths
    pub fn repo_name(&self) -> &str {
        let trimmed = self.repo.trim_end_matches('/');
        let last = trimmed.rsplit(['/', ':']).next().unwrap_or(trimmed);
        last.strip_suffix(".git").unwrap_or(last)
    }

    fn cache_key(&self) -> String {
        let mut hasher = Xxh64::new(0);
        hasher.update(self.repo.as_bytes());
        hasher.update(b"^");
        hasher.update(self.branch.as_deref().unwrap_or("").as_bytes());
        format!("{:016x}", hasher.digest())
    }
}

fn clean_subpath(s: &str) -> String {
    s.trim_matches('/').to_string()
}

/// One file of a cloned repository.
#[derive(Debug, Clone)]
pub struct GitFile {
    /// `git:<repo>[^branch]/<rel>`
    pub identity: String,
    /// `<repo-name>/<rel>`
    pub display: String,
    pub path: PathBuf,
}

/// Clone (or reuse) `spec` under `cache_dir` and list its files below the
/// subpath, minus `-G` excludes. Excludes with glob metacharacters match the
/// repository-relative path; others are path prefixes.
#[instrument(level = "debug", skip(cache_dir, excludes, cancel), fields(repo = %spec.repo))]
pub fn ingest(
    spec: &GitSpec,
    cache_dir: &Path,
    excludes: &[String],
    cancel: &CancelFlag,
) -> Result<Vec<GitFile>, FoldError> {
    cancel.check()?;
    let checkout = ensure_clone(spec, cache_dir)?;
    cancel.check()?;

    let root = if spec.subpath.is_empty() {
        checkout.clone()
    } else {
        checkout.join(&spec.subpath)
    };
    if !root.exists() {
        return Err(FoldError::Fetch {
            target: spec.repo.clone(),
            reason: format!("subpath {:?} not found", spec.subpath),
        });
    }

    let (globs, prefixes): (Vec<&String>, Vec<&String>) =
        excludes.iter().partition(|e| PathUtils::has_glob_meta(e));

    let mut builder = GlobSetBuilder::new();
    for g in globs {
        let glob = Glob::new(g).map_err(|e| FoldError::Pattern {
            spec: g.clone(),
            reason: e.to_string(),
        })?;
        builder.add(glob);
    }
    let globset = builder.build().map_err(|e| FoldError::Pattern {
        spec: excludes.join(" "),
        reason: e.to_string(),
    })?;

    let walker = FileWalker::new();

    let files = if root.is_file() {
        vec![root.clone()]
    } else {
        walker.walk_files(&root).0
    };

    let branch_tag = spec
        .branch
        .as_deref()
        .map(|b| format!("^{b}"))
        .unwrap_or_default();

    let mut out = Vec::new();
    for path in files {
        let rel = PathUtils::display_relative(&path, &checkout);
        let excluded = globset.is_match(&rel)
            || prefixes.iter().any(|p| {
                let p = p.trim_matches('/');
                rel == p || rel.starts_with(&format!("{p}/"))
            });
        if excluded {
            debug!(file = %rel, "excluded by -G");
            continue;
        }

        out.push(GitFile {
            identity: format!("git:{}{}/{}", spec.repo, branch_tag, rel),
            display: format!("{}/{}", spec.repo_name(), rel),
            path,
        });
    }

    Ok(out)
}

/// Path of the checkout, cloning it first when absent
fn ensure_clone(spec: &GitSpec, cache_dir: &Path) -> Result<PathBuf, FoldError> {
    let fail = |reason: String| FoldError::Fetch {
        target: spec.repo.clone(),
        reason,
    };

    let parent = cache_dir.join("git");
    let dest = parent.join(spec.cache_key());
    if dest.join(".git").exists() {
        debug!(dest = %dest.display(), "reusing cached clone");
        return Ok(dest);
    }

    std::fs::create_dir_all(&parent)
        .map_err(|e| fail(format!("cannot create {}: {e}", parent.display())))?;

    let staging = tempfile::Builder::new()
        .prefix(".clone-")
        .tempdir_in(&parent)
        .map_err(|e| fail(format!("cannot create staging dir: {e}")))?;
    let target = staging.path().join("repo");

    let mut cmd = Command::new("git");
    cmd.args(["clone", "--quiet", "--depth", "1", "--single-branch"]);
    if let Some(branch) = &spec.branch {
        cmd.arg("--branch").arg(branch);
    }
    cmd.arg(&spec.repo)
        .arg(&target)
        .env("GIT_TERMINAL_PROMPT", "0")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped());

    info!(repo = %spec.repo, "cloning");
    let output = cmd
        .output()
        .map_err(|e| fail(format!("git executable not available: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let last = stderr
            .lines()
            .rev()
            .find(|l| !l.trim().is_empty())
            .unwrap_or("git clone failed");
        return Err(fail(last.trim().to_string()));
    }

    if let Err(e) = std::fs::rename(&target, &dest) {
        // Another run may have won the race
        if !dest.join(".git").exists() {
            return Err(fail(format!("cannot move clone into cache: {e}")));
        }
    }

    Ok(dest)
}
