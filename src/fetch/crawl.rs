//! Bounded breadth-first crawl.
//!
//! Each depth is fetched concurrently on a bounded rayon pool; link
//! extraction and every visited-set transition then happen on the calling
//! thread in frontier order, so the result never depends on fetch timing.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use tracing::{debug, instrument};
use url::Url;

use crate::core::context::options::Exclude;
use crate::error::FoldError;
use crate::fetch::links::extract_links;
use crate::fetch::{Fetched, Fetcher, infer_name};
use crate::infra::diag::Diagnostics;
use crate::infra::utils::SuffixUtils;

/// Normalized URLs already scheduled during one crawl.
#[derive(Debug, Default)]
pub struct VisitedSet
{
    seen: HashSet<String>,
}

impl VisitedSet
{
    /// True when `url` was not seen before (and is now).
    pub fn try_insert(
        &mut self,
        url: &Url,
    ) -> bool
    {
        self.seen
            .insert(url.to_string())
    }

    pub fn len(&self) -> usize
    {
        self.seen
            .len()
    }

    pub fn is_empty(&self) -> bool
    {
        self.seen
            .is_empty()
    }
}

/// Traversal limits and filters for one crawl.
#[derive(Debug, Clone, Copy)]
pub struct CrawlPolicy<'a>
{
    /// Link hops from the seeds; 0 fetches the seeds only
    pub depth: usize,
    pub cross_domain: bool,
    pub excludes: &'a [Exclude],
    pub exclude_suffixes: &'a [String],
    /// Allow-list for retained pages; empty keeps everything
    pub suffixes: &'a [String],
    pub workers: usize,
    pub quiet: bool,
}

impl CrawlPolicy<'_>
{
    /// Enqueue filter for a discovered link
    fn admits(
        &self,
        link: &Url,
        seed: &Url,
    ) -> bool
    {
        if !self.cross_domain && link.origin() != seed.origin()
        {
            return false;
        }

        let excluded = self
            .excludes
            .iter()
            .any(|e| matches!(e, Exclude::Url(prefix) if link.as_str().starts_with(prefix.as_str())));
        if excluded
        {
            return false;
        }

        let name = infer_name(link, None);
        !SuffixUtils::matches_any(&name.to_string_lossy(), self.exclude_suffixes)
    }

    /// Record filter for a fetched page
    fn retains(
        &self,
        page: &Fetched,
    ) -> bool
    {
        self.suffixes
            .is_empty()
            || SuffixUtils::matches_any(
                &page
                    .name
                    .to_string_lossy(),
                self.suffixes,
            )
    }
}

/// Crawl from `seeds` and return the retained pages in BFS order.
///
/// Fetch failures are reported once and skipped; only an interrupt aborts.
#[instrument(level = "debug", skip_all, fields(seeds = seeds.len(), depth = policy.depth))]
pub fn crawl(
    fetcher: &Fetcher,
    seeds: &[Url],
    policy: &CrawlPolicy<'_>,
    diag: &Diagnostics,
) -> Result<Vec<Arc<Fetched>>, FoldError>
{
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(
            policy
                .workers
                .max(1),
        )
        .build()
        .map_err(|e| FoldError::Fetch { target: "crawl".into(), reason: format!("thread pool: {e}") })?;

    let pb = if policy.quiet
    {
        ProgressBar::hidden()
    }
    else
    {
        let pb = ProgressBar::new_spinner();
        let style = ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {pos} pages {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        pb.set_style(style);
        pb.enable_steady_tick(Duration::from_millis(120));
        pb
    };

    let mut visited = VisitedSet::default();
    let mut frontier: Vec<(Url, Url)> = Vec::new();
    for seed in seeds
    {
        if visited.try_insert(seed)
        {
            frontier.push((seed.clone(), seed.clone()));
        }
    }

    let mut pages = Vec::new();

    for depth in 0..=policy.depth
    {
        if frontier.is_empty()
        {
            break;
        }
        fetcher
            .cancel_flag()
            .check()?;

        pb.set_message(format!("depth {depth}, {} queued", frontier.len()));

        let results: Vec<Result<Arc<Fetched>, FoldError>> = pool.install(|| {
            frontier
                .par_iter()
                .map(|(url, _)| fetcher.fetch(url))
                .collect()
        });

        let mut next = Vec::new();
        for ((url, seed), result) in frontier
            .iter()
            .zip(results)
        {
            let page = match result
            {
                Ok(page) => page,
                Err(FoldError::Interrupted) =>
                {
                    pb.finish_and_clear();
                    return Err(FoldError::Interrupted);
                }
                Err(e) =>
                {
                    diag.report(&e);
                    continue;
                }
            };
            pb.inc(1);

            if depth < policy.depth && page.is_html()
            {
                let html = String::from_utf8_lossy(&page.body);
                for link in extract_links(&html, &page.final_url)
                {
                    if policy.admits(&link, seed) && visited.try_insert(&link)
                    {
                        next.push((link, seed.clone()));
                    }
                }
            }

            if policy.retains(&page)
            {
                pages.push(page);
            }
            else
            {
                debug!(url = %url, "page traversed but not retained");
            }
        }

        frontier = next;
    }

    pb.finish_and_clear();
    debug!(visited = visited.len(), retained = pages.len(), "crawl finished");
    Ok(pages)
}
