//! Remote content: single URL fetches, bounded crawls and shallow git clones.
//!
//! Every URL goes through one [`Fetcher`], which caches bodies by normalized
//! URL in memory for the run and on disk under `<cache>/urls/`.

pub mod crawl;
pub mod git;
pub mod http;
pub mod links;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use moka::sync::Cache;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use url::Url;
use xxhash_rust::xxh64::xxh64;

use crate::error::FoldError;
use crate::infra::signal::CancelFlag;

/// Raw HTTP result.
#[derive(Debug, Clone)]
pub struct Response
{
    /// URL after redirects
    pub final_url: Url,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

/// Network seam. Production uses [`http::HttpTransport`].
pub trait Transport: Send + Sync
{
    /// GET `url`, following redirects. Implementations stop reading the
    /// body once `cancel` is set.
    ///
    /// # Errors
    ///
    /// Returns [`FoldError::Fetch`] on network failure or non-success status,
    /// [`FoldError::Interrupted`] when cancelled mid-transfer.
    fn get(
        &self,
        url: &Url,
        cancel: &CancelFlag,
    ) -> Result<Response, FoldError>;
}

/// A fetched document.
#[derive(Debug, Clone)]
pub struct Fetched
{
    /// Normalized requested URL (the identity)
    pub url: Url,
    pub final_url: Url,
    pub content_type: Option<String>,
    /// File name inferred from the URL path or content type
    pub name: PathBuf,
    pub body: Arc<Vec<u8>>,
}

impl Fetched
{
    pub fn is_html(&self) -> bool
    {
        is_html(self.content_type.as_deref(), &self.name)
    }
}

/// Parse and normalize a URL: http(s) only, fragment dropped.
pub fn normalize_url(raw: &str) -> Result<Url, FoldError>
{
    let mut url = Url::parse(raw.trim()).map_err(|e| FoldError::Fetch {
        target: raw.to_string(),
        reason: format!("invalid URL: {e}"),
    })?;

    if !matches!(url.scheme(), "http" | "https")
    {
        return Err(FoldError::Fetch {
            target: raw.to_string(),
            reason: format!("unsupported scheme {:?}", url.scheme()),
        });
    }

    url.set_fragment(None);
    Ok(url)
}

/// Extension for a MIME type, used when the URL path has none
fn extension_for(content_type: Option<&str>) -> &'static str
{
    let mime = content_type
        .and_then(|ct| {
            ct.split(';')
                .next()
        })
        .map(|m| {
            m.trim()
                .to_ascii_lowercase()
        })
        .unwrap_or_default();

    match mime.as_str()
    {
        "text/html" | "application/xhtml+xml" => "html",
        "text/markdown" | "text/x-markdown" => "md",
        "application/json" => "json",
        "application/xml" | "text/xml" => "xml",
        "text/css" => "css",
        "text/javascript" | "application/javascript" => "js",
        "application/pdf" => "pdf",
        "text/csv" => "csv",
        _ => "txt",
    }
}

/// Infer a file name: last path segment if it has an extension, else the
/// segment (or `index`) plus an extension derived from the content type.
pub fn infer_name(
    url: &Url,
    content_type: Option<&str>,
) -> PathBuf
{
    let segment = url
        .path_segments()
        .and_then(|mut segs| segs.rfind(|s| !s.is_empty()))
        .unwrap_or("index");

    let candidate = Path::new(segment);
    if candidate
        .extension()
        .is_some()
    {
        return candidate.to_path_buf();
    }

    PathBuf::from(format!("{segment}.{}", extension_for(content_type)))
}

/// HTML by content type, or by file name when the server sent none.
pub fn is_html(
    content_type: Option<&str>,
    name: &Path,
) -> bool
{
    match content_type
    {
        Some(ct) =>
        {
            let ct = ct.to_ascii_lowercase();
            ct.contains("text/html") || ct.contains("application/xhtml")
        }
        None => name
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| matches!(e.to_ascii_lowercase().as_str(), "html" | "htm" | "xhtml")),
    }
}

/// Sidecar written next to a cached body
#[derive(Debug, Serialize, Deserialize)]
struct CacheMeta
{
    url: String,
    final_url: String,
    content_type: Option<String>,
}

/// Caching front for a [`Transport`].
pub struct Fetcher
{
    transport: Arc<dyn Transport>,
    memory: Cache<String, Arc<Fetched>>,
    /// `<cache>/urls`, or `None` to skip the disk layer
    disk: Option<PathBuf>,
    cancel: CancelFlag,
    /// Requests that reached the transport
    network: AtomicUsize,
}

impl Fetcher
{
    pub fn new(
        transport: Arc<dyn Transport>,
        cache_dir: Option<&Path>,
        cancel: CancelFlag,
    ) -> Self
    {
        Self {
            transport,
            memory: Cache::new(10_000),
            disk: cache_dir.map(|d| d.join("urls")),
            cancel,
            network: AtomicUsize::new(0),
        }
    }

    /// Number of transport requests made so far
    pub fn network_fetches(&self) -> usize
    {
        self.network
            .load(Ordering::SeqCst)
    }

    pub fn cancel_flag(&self) -> &CancelFlag
    {
        &self.cancel
    }

    /// Fetch a normalized URL, at most once per run.
    #[instrument(level = "debug", skip(self), fields(url = %url))]
    pub fn fetch(
        &self,
        url: &Url,
    ) -> Result<Arc<Fetched>, FoldError>
    {
        self.cancel
            .check()?;

        self.memory
            .try_get_with(url.to_string(), || self.load(url))
            .map_err(|e: Arc<FoldError>| (*e).clone())
    }

    fn load(
        &self,
        url: &Url,
    ) -> Result<Arc<Fetched>, FoldError>
    {
        if let Some(hit) = self.read_disk(url)
        {
            debug!("disk cache hit");
            return Ok(Arc::new(hit));
        }

        self.network
            .fetch_add(1, Ordering::SeqCst);
        let resp = self
            .transport
            .get(url, &self.cancel)?;

        // A cancel that arrived mid-request abandons the result
        self.cancel
            .check()?;

        let fetched = Fetched {
            url: url.clone(),
            name: infer_name(&resp.final_url, resp.content_type.as_deref()),
            final_url: resp.final_url,
            content_type: resp.content_type,
            body: Arc::new(resp.body),
        };
        self.write_disk(&fetched);
        Ok(Arc::new(fetched))
    }

    fn disk_paths(
        &self,
        url: &Url,
    ) -> Option<(PathBuf, PathBuf)>
    {
        let dir = self
            .disk
            .as_ref()?;
        let key = format!("{:016x}", xxh64(url.as_str().as_bytes(), 0));
        Some((dir.join(format!("{key}.body")), dir.join(format!("{key}.json"))))
    }

    fn read_disk(
        &self,
        url: &Url,
    ) -> Option<Fetched>
    {
        let (body_path, meta_path) = self.disk_paths(url)?;

        let meta: CacheMeta = serde_json::from_slice(&std::fs::read(meta_path).ok()?).ok()?;
        // Guard against hash collisions
        if meta.url != url.as_str()
        {
            return None;
        }
        let body = std::fs::read(body_path).ok()?;
        let final_url = Url::parse(&meta.final_url).ok()?;

        Some(Fetched {
            url: url.clone(),
            name: infer_name(&final_url, meta.content_type.as_deref()),
            final_url,
            content_type: meta.content_type,
            body: Arc::new(body),
        })
    }

    /// Best effort; the cache is disposable
    fn write_disk(
        &self,
        fetched: &Fetched,
    )
    {
        let Some((body_path, meta_path)) = self.disk_paths(&fetched.url)
        else
        {
            return;
        };

        let meta = CacheMeta {
            url: fetched
                .url
                .to_string(),
            final_url: fetched
                .final_url
                .to_string(),
            content_type: fetched
                .content_type
                .clone(),
        };

        let result = (|| -> std::io::Result<()> {
            if let Some(dir) = body_path.parent()
            {
                std::fs::create_dir_all(dir)?;
            }
            std::fs::write(&body_path, fetched.body.as_slice())?;
            std::fs::write(&meta_path, serde_json::to_vec(&meta)?)?;
            Ok(())
        })();

        if let Err(e) = result
        {
            debug!(error = %e, "could not write URL cache entry");
        }
    }
}

#[cfg(test)]
pub(crate) mod testing
{
    //! In-memory transport for tests.

    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    pub struct FakeTransport
    {
        pages: HashMap<String, (String, String)>,
        pub hits: Mutex<Vec<String>>,
    }

    impl FakeTransport
    {
        pub fn page(
            mut self,
            url: &str,
            content_type: &str,
            body: &str,
        ) -> Self
        {
            self.pages
                .insert(url.to_string(), (content_type.to_string(), body.to_string()));
            self
        }
    }

    impl Transport for FakeTransport
    {
        fn get(
            &self,
            url: &Url,
            _cancel: &CancelFlag,
        ) -> Result<Response, FoldError>
        {
            if let Ok(mut hits) = self
                .hits
                .lock()
            {
                hits.push(url.to_string());
            }

            match self
                .pages
                .get(url.as_str())
            {
                Some((ct, body)) => Ok(Response {
                    final_url: url.clone(),
                    content_type: Some(ct.clone()),
                    body: body
                        .as_bytes()
                        .to_vec(),
                }),
                None => Err(FoldError::Fetch { target: url.to_string(), reason: "404 Not Found".into() }),
            }
        }
    }
}
