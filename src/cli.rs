use clap::error::ErrorKind;
use clap::{ArgAction, Args, CommandFactory, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Shared application context for global flags
#[derive(Clone, Debug, Default)]
pub struct AppContext {
    pub quiet: bool,    // global --quiet
    pub no_color: bool, // global --no-color
    pub dry_run: bool,  // global --dry-run
    pub verbose: bool,  // global --verbose
}

#[derive(Parser)]
#[command(name = "fup")]
#[command(
    about = "Fold local files, URLs and git repositories into one deterministic text artifact"
)]
#[command(version, long_about = None)]
#[command(disable_help_flag = true)]
#[command(args_override_self = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Flags of the root context
    #[command(flatten)]
    pub flags: ContextFlags,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Only report errors on stderr
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Log pipeline decisions on stderr
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Resolve everything but write no output files
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Print help
    #[arg(long, action = ArgAction::Help, global = true)]
    pub help: Option<bool>,
}

impl Cli {
    /// Root context flags make no sense next to a subcommand; global flags
    /// (`--quiet`, `--no-color`, ...) are fine anywhere.
    pub fn validate(&self) -> Result<(), clap::Error> {
        if self.command.is_some() && self.flags != ContextFlags::default() {
            return Err(Cli::command().error(
                ErrorKind::ArgumentConflict,
                "context flags cannot be combined with a subcommand",
            ));
        }
        Ok(())
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a foldup.toml config file
    Init(InitArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Parser for one directive-file block: the same flags as the command line,
/// without a binary name, help or version.
#[derive(Parser, Debug)]
#[command(no_binary_name = true, disable_help_flag = true, disable_version_flag = true)]
#[command(args_override_self = true)]
pub struct DirectiveArgs {
    #[command(flatten)]
    pub flags: ContextFlags,
}

/// Flags declared by one context. Values stay raw strings here: variable
/// expansion, the `none` sentinel and path resolution happen during merge.
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextFlags {
    // --- Structure ---
    /// Expand a directive file into child contexts
    #[arg(short = 'x', long = "directives", value_name = "FILE")]
    pub directives: Vec<String>,

    /// Working directory for relative include paths
    #[arg(short = 'w', long, value_name = "DIR")]
    pub workdir: Option<String>,

    /// Workspace for templates, outputs and AI files
    #[arg(short = 'W', long, value_name = "DIR")]
    pub workspace: Option<String>,

    // --- Discovery ---
    /// Include a file, directory or URL
    #[arg(short = 'a', long = "add-path", value_name = "PATH")]
    pub include: Vec<String>,

    /// Exclude a path prefix, glob or URL prefix
    #[arg(short = 'A', long = "exclude-path", value_name = "PATH")]
    pub exclude: Vec<String>,

    /// Only keep files with this suffix (repeatable)
    #[arg(short = 's', long = "suffix", value_name = "SUF")]
    pub suffixes: Vec<String>,

    /// Drop files with this suffix (repeatable)
    #[arg(short = 'S', long = "exclude-suffix", value_name = "SUF")]
    pub exclude_suffixes: Vec<String>,

    // --- Remote sources ---
    /// Fetch a single URL
    #[arg(short = 'f', long = "url", value_name = "URL")]
    pub urls: Vec<String>,

    /// Crawl breadth-first from this seed URL
    #[arg(short = 'F', long = "crawl", value_name = "URL")]
    pub crawl: Vec<String>,

    /// Maximum link hops from a crawl seed (0 = seeds only)
    #[arg(short = 'd', long = "crawl-depth", value_name = "N")]
    pub crawl_depth: Option<String>,

    /// Follow links to other origins while crawling
    #[arg(long)]
    pub cross_domain: bool,

    /// Stay on each seed's origin (negates --cross-domain)
    #[arg(long)]
    pub same_domain: bool,

    /// Ingest a git repository: URL[^BRANCH][/SUBPATH]
    #[arg(short = 'g', long = "git", value_name = "SPEC")]
    pub git: Vec<String>,

    /// Exclude a path (or glob) inside ingested git repositories
    #[arg(short = 'G', long = "git-exclude", value_name = "PATH")]
    pub git_exclude: Vec<String>,

    // --- Clean-up ---
    /// Strip comments (doc comments and docstrings kept)
    #[arg(short = 'c', long)]
    pub strip_comments: bool,

    /// Keep comments (negates -c)
    #[arg(long)]
    pub keep_comments: bool,

    /// Strip doc comments and docstrings too
    #[arg(short = 'C', long)]
    pub strip_doc_comments: bool,

    /// Keep doc comments (negates -C)
    #[arg(long)]
    pub keep_doc_comments: bool,

    /// Strip import statements
    #[arg(short = 'i', long)]
    pub strip_imports: bool,

    /// Keep import statements (negates -i)
    #[arg(long)]
    pub keep_imports: bool,

    /// Strip export statements and keywords
    #[arg(short = 'I', long)]
    pub strip_exports: bool,

    /// Keep export statements (negates -I)
    #[arg(long)]
    pub keep_exports: bool,

    /// Strip blank lines
    #[arg(short = 'b', long)]
    pub strip_blank: bool,

    /// Keep blank lines (negates -b)
    #[arg(short = 'B', long)]
    pub keep_blank: bool,

    // --- Substitution ---
    /// Replace or delete: /PATTERN/[REPLACEMENT]/[gims]
    #[arg(short = 'y', long = "replace", value_name = "SPEC", allow_hyphen_values = true)]
    pub replace: Vec<String>,

    /// Protect matches of /PATTERN/[gims] from every replacement
    #[arg(short = 'Y', long = "preserve", value_name = "SPEC", allow_hyphen_values = true)]
    pub preserve: Vec<String>,

    // --- Slicing ---
    /// First line of the window (1-based)
    #[arg(short = 'N', long = "start-line", value_name = "LINE")]
    pub start_line: Option<String>,

    /// Maximum number of lines in the window
    #[arg(short = 'n', long = "total-lines", value_name = "NUM")]
    pub max_lines: Option<String>,

    /// Always keep line 1, even outside the window
    #[arg(short = 'm', long)]
    pub keep_first_line: bool,

    /// Always drop line 1
    #[arg(short = 'M', long)]
    pub drop_first_line: bool,

    // --- Assembly ---
    /// Print a banner before each file (once per file per run)
    #[arg(short = 'h', long)]
    pub header: bool,

    /// No banners (negates -h)
    #[arg(short = 'H', long)]
    pub no_header: bool,

    /// Show absolute paths in banners and listings
    #[arg(short = 'R', long)]
    pub absolute_paths: bool,

    /// Show workdir-relative paths (negates -R)
    #[arg(short = 'r', long)]
    pub relative_paths: bool,

    /// Wrap each file in a fenced block; LANG defaults to the detected language
    #[arg(short = 'u', long = "wrap", value_name = "LANG", num_args = 0..=1, default_missing_value = "auto")]
    pub wrap: Option<String>,

    /// List file paths instead of contents
    #[arg(short = 'l', long)]
    pub list: bool,

    /// Render the context through this template
    #[arg(short = 't', long, value_name = "FILE")]
    pub template: Option<String>,

    /// Write this context's output to FILE
    #[arg(short = 'o', long, value_name = "FILE")]
    pub output: Option<String>,

    /// Also write this context's output to stdout
    #[arg(short = 'O', long)]
    pub stdout: bool,

    // --- Variables ---
    /// Define a variable for this context only: NAME=VALUE
    #[arg(short = 'e', long = "env", value_name = "NAME=VALUE")]
    pub locals: Vec<String>,

    /// Define a variable for every later context: NAME=VALUE
    #[arg(short = 'E', long = "global-env", value_name = "NAME=VALUE")]
    pub globals: Vec<String>,

    // --- AI collaborator ---
    /// Send the rendered output to the AI collaborator
    #[arg(long)]
    pub ai: bool,

    /// Model name for the AI collaborator
    #[arg(long, value_name = "MODEL")]
    pub ai_model: Option<String>,

    /// System prompt file for the AI collaborator
    #[arg(long, value_name = "FILE")]
    pub ai_system_prompt: Option<String>,

    /// JSONL file of {role, content} seed messages
    #[arg(long, value_name = "FILE")]
    pub ai_seeds: Option<String>,
}

#[derive(Parser)]
pub struct InitArgs {
    /// Directory to initialize config in
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Overwrite existing config file
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

#[derive(Parser)]
pub struct CompletionsArgs {
    /// Target shell
    #[arg(value_enum)]
    pub shell: Shell,

    /// Output directory; if omitted and --stdout not set, prints error
    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    /// Print completion script to stdout instead of a file
    #[arg(long)]
    pub stdout: bool,
}
