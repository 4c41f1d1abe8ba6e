//! **foldup** - Deterministic folding of local files, URLs and git repositories
//! into one reproducible text artifact.
//!
//! Directive files describe a tree of contexts whose flags inherit from their
//! parents; each context runs its files through clean-up, substitution and
//! slicing, then templates and writes the result.

/// Command-line interface with clap integration
pub mod cli;

/// Shell completion generation
pub mod completion;

/// Error taxonomy and exit codes
pub mod error;

/// AI collaborator trait and chat-completions gateway
pub mod ai;

/// Core pipeline - contexts, discovery, transformation and assembly
pub mod core {
    /// Context tree: directive grammar, option merging, resolution
    pub mod context {
        /// Directive file parser
        pub mod directive;

        /// Effective option sets and inheritance rules
        pub mod options;
        pub use options::{Options, Variables};

        /// Arena tree and resolver with recursion guard
        pub mod tree;
        pub use tree::{ContextNode, ContextTree, MAX_DIRECTIVE_DEPTH, Resolver};
    }

    /// Uniform file record
    pub mod record;
    pub use record::{FileRecord, Origin};

    /// Source discovery and filtering
    pub mod discover;

    /// Lexical comment/import/export/blank-line stripping
    pub mod cleanup;

    /// Masked regex substitution
    pub mod substitute;
    pub use substitute::{IntervalSet, SubstitutionPlan};

    /// Line-window slicing
    pub mod slice;
    pub use slice::{FirstLine, SliceOptions};

    /// Named-context alias store
    pub mod registry;
    pub use registry::{AliasEntry, AliasRegistry};

    /// `{placeholder}` rendering
    pub mod template;

    /// Headers, fences and list mode
    pub mod assemble;

    /// Two-phase run driver
    pub mod engine;
    pub use engine::{Engine, RunOutcome};
}

/// Remote content - URL fetcher, crawler, shallow git clones
pub mod fetch;

/// Infrastructure - Configuration, I/O, logging and utilities
pub mod infra {
    /// Layered configuration with TOML support
    pub mod config;
    pub use config::{Config, init as config_init, load_config};

    /// De-duplicated warning sink
    pub mod diag;
    pub use diag::Diagnostics;

    /// Memory-mapped file I/O for large files (>1MB threshold)
    pub mod io;
    pub use io::{FileContent, read_file_smart};

    /// CRLF/LF-robust line indexing for O(1) line→byte mapping
    pub mod line_index;
    pub use line_index::NewlineIndex;

    /// Tracing subscriber setup
    pub mod logging;

    /// SIGINT-driven cancellation
    pub mod signal;
    pub use signal::CancelFlag;

    /// Deterministic directory walking
    pub mod walk;
    pub use walk::FileWalker;

    /// Utility functions and helpers for common operations
    pub mod utils;
}

// Strategic re-exports for clean CLI interface
pub use cli::{AppContext, Cli, Commands, ContextFlags};
pub use core::{Engine, RunOutcome};
pub use error::{DirectiveSyntaxError, FoldError};
pub use infra::{Config, load_config};
