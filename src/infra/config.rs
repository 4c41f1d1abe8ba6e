use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::cli::{AppContext, InitArgs};

/// Config file names probed in the working directory, first match wins
pub const CONFIG_FILES: [&str; 4] = ["foldup.toml", ".foldup.toml", "foldup.yaml", "foldup.json"];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config
{
    /// Disposable cache root for URL bodies and shallow clones
    pub cache_dir: PathBuf,

    /// Directory expansion settings
    pub walk: WalkConfig,

    /// HTTP client settings shared by fetch, crawl and the AI gateway
    pub http: HttpConfig,

    /// Crawler defaults
    pub crawl: CrawlConfig,

    /// AI collaborator gateway
    pub ai: AiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkConfig
{
    pub respect_gitignore: bool,
    pub follow_symlinks: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig
{
    pub timeout_secs: u64,
    pub user_agent: String,
    pub max_body_bytes: u64,
    /// Concurrent fetches per crawl depth
    pub workers: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig
{
    /// Link hops followed when `-d` is not given
    pub default_depth: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig
{
    /// OpenAI-compatible chat completions endpoint
    pub endpoint: String,
    pub model: String,
    /// Environment variable holding the API key; unset disables the gateway
    pub api_key_env: String,
    pub timeout_secs: u64,
}

impl Default for Config
{
    fn default() -> Self
    {
        Self {
            cache_dir: PathBuf::from(".foldup-cache"),
            walk: WalkConfig::default(),
            http: HttpConfig::default(),
            crawl: CrawlConfig::default(),
            ai: AiConfig::default(),
        }
    }
}

impl Default for WalkConfig
{
    fn default() -> Self
    {
        Self { respect_gitignore: false, follow_symlinks: false }
    }
}

impl Default for HttpConfig
{
    fn default() -> Self
    {
        Self {
            timeout_secs: 30,
            user_agent: concat!("foldup/", env!("CARGO_PKG_VERSION")).to_string(),
            max_body_bytes: 16 * 1024 * 1024,
            workers: 8,
        }
    }
}

impl Default for CrawlConfig
{
    fn default() -> Self
    {
        Self { default_depth: 2 }
    }
}

impl Default for AiConfig
{
    fn default() -> Self
    {
        Self {
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_secs: 120,
        }
    }
}

/// Load layered configuration from `dir`: defaults, then the first config
/// file found, then `FOLDUP_*` environment variables (`__` separates
/// sections, e.g. `FOLDUP_HTTP__TIMEOUT_SECS=5`).
pub fn load_config_from(dir: &Path) -> Result<Config>
{
    let mut builder = config::Config::builder();

    for name in &CONFIG_FILES
    {
        let path = dir.join(name);
        if path.exists()
        {
            builder = builder.add_source(config::File::from(path));
            break;
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("FOLDUP")
            .prefix_separator("_")
            .separator("__"),
    );

    let cfg = builder
        .build()
        .context("Failed to load configuration")?;
    let parsed: Config = cfg
        .try_deserialize()
        .context("Failed to parse configuration")?;

    Ok(parsed)
}

/// Load configuration from the current directory
pub fn load_config() -> Result<Config>
{
    load_config_from(Path::new("."))
}

pub fn init(
    args: InitArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let config_path = args
        .path
        .join("foldup.toml");

    if config_path.exists() && !args.force
    {
        anyhow::bail!(
            "Config file already exists at {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    let config = Config::default();
    let toml_string =
        toml::to_string_pretty(&config).context("Failed to serialize default config")?;

    if ctx.dry_run
    {
        if !ctx.quiet
        {
            eprintln!("Would write config file to {}", config_path.display());
        }
        return Ok(());
    }

    std::fs::write(&config_path, toml_string).context("Failed to write config file")?;

    if !ctx.quiet
    {
        eprintln!("Created config file at {}", config_path.display());
    }
    Ok(())
}
