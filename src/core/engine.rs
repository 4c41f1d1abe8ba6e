//! Run driver.
//!
//! Resolves the context tree, then walks it with an explicit Enter/Exit
//! stack. Entering a context discovers and processes its files and
//! assembles its own body; leaving it (after every child has left) folds in
//! the children without a destination, renders the template, consults the
//! collaborator, registers the alias and writes the result.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use rayon::prelude::*;
use tracing::{debug, error, info, instrument};

use crate::ai::{ChatRequest, Collaborator, DisabledCollaborator, OpenAiCollaborator, load_seeds};
use crate::cli::{AppContext, ContextFlags};
use crate::core::assemble::{self, HeaderLedger, Layout};
use crate::core::cleanup;
use crate::core::context::tree::{ContextNode, ContextTree, Resolver};
use crate::core::discover::{self, Sources};
use crate::core::registry::{AliasEntry, AliasRegistry};
use crate::core::slice;
use crate::core::substitute::SubstitutionPlan;
use crate::core::template::{self, Scope};
use crate::error::FoldError;
use crate::fetch::http::HttpTransport;
use crate::fetch::{Fetcher, Transport};
use crate::infra::config::Config;
use crate::infra::diag::Diagnostics;
use crate::infra::io::write_output;
use crate::infra::signal::CancelFlag;
use crate::infra::utils::PathUtils;

/// What a finished run produced.
#[derive(Debug, Default)]
pub struct RunOutcome
{
    /// Primary output for stdout
    pub stdout: String,
    /// Files written (or, under `--dry-run`, that would have been)
    pub written: Vec<PathBuf>,
    /// Collaborator failures; the run still completed
    pub failures: Vec<FoldError>,
}

impl RunOutcome
{
    pub fn is_success(&self) -> bool
    {
        self.failures
            .is_empty()
    }
}

/// Shared state threaded through one run.
struct RunState
{
    registry: AliasRegistry,
    ledger: HeaderLedger,
    /// Every own body assembled so far, in visit order
    dump: String,
    /// Own body per node, filled on enter
    bodies: Vec<String>,
    /// Final variant per node, filled on exit
    finals: Vec<String>,
    /// Identities a node's raw output already carries: its own records plus,
    /// when it folds into its parent, everything the parent chain assembled
    emitted: Vec<HashSet<String>>,
    outcome: RunOutcome,
}

enum Visit
{
    Enter(usize),
    Exit(usize),
}

/// Configured run driver.
pub struct Engine
{
    base_dir: PathBuf,
    config: Config,
    app: AppContext,
    transport: Arc<dyn Transport>,
    collaborator: Arc<dyn Collaborator>,
    cancel: CancelFlag,
    diag: Diagnostics,
}

impl Engine
{
    /// Engine with the production HTTP transport and AI gateway.
    pub fn new(
        base_dir: PathBuf,
        config: Config,
        app: AppContext,
    ) -> Result<Self>
    {
        let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(&config.http)?);
        let collaborator: Arc<dyn Collaborator> =
            match OpenAiCollaborator::from_config(&config.ai, &config.http)?
            {
                Some(gateway) => Arc::new(gateway),
                None => Arc::new(DisabledCollaborator),
            };

        Ok(Self {
            base_dir,
            config,
            app,
            transport,
            collaborator,
            cancel: CancelFlag::new(),
            diag: Diagnostics::new(),
        })
    }

    /// Replace the network transport
    pub fn with_transport(
        mut self,
        transport: Arc<dyn Transport>,
    ) -> Self
    {
        self.transport = transport;
        self
    }

    /// Replace the AI collaborator
    pub fn with_collaborator(
        mut self,
        collaborator: Arc<dyn Collaborator>,
    ) -> Self
    {
        self.collaborator = collaborator;
        self
    }

    /// Share a cancellation flag (e.g. the one wired to SIGINT)
    pub fn with_cancel(
        mut self,
        cancel: CancelFlag,
    ) -> Self
    {
        self.cancel = cancel;
        self
    }

    pub fn diagnostics(&self) -> &Diagnostics
    {
        &self.diag
    }

    /// Execute one run rooted at `root_flags`.
    #[instrument(level = "debug", skip_all)]
    pub fn run(
        &self,
        root_flags: ContextFlags,
    ) -> Result<RunOutcome>
    {
        let tree = Resolver::new(
            self.base_dir
                .clone(),
            &self.diag,
        )
        .resolve(root_flags)?;
        debug!(contexts = tree.len(), "context tree resolved");

        let root_ws = tree
            .node(ContextTree::ROOT)
            .options
            .workspace()
            .to_path_buf();
        let cache_dir = PathUtils::absolutize(&root_ws, &self.config.cache_dir);
        let fetcher = Fetcher::new(self.transport.clone(), Some(&cache_dir), self.cancel.clone());
        let reserved = tree.outputs();

        let sources = Sources {
            fetcher: &fetcher,
            diag: &self.diag,
            cache_dir: &cache_dir,
            reserved: &reserved,
            walk: &self
                .config
                .walk,
            default_crawl_depth: self
                .config
                .crawl
                .default_depth,
            workers: self
                .config
                .http
                .workers,
            quiet: self
                .app
                .quiet,
        };

        let mut state = RunState {
            registry: AliasRegistry::new(),
            ledger: HeaderLedger::new(),
            dump: String::new(),
            bodies: vec![String::new(); tree.len()],
            finals: vec![String::new(); tree.len()],
            emitted: vec![HashSet::new(); tree.len()],
            outcome: RunOutcome::default(),
        };

        let mut stack = vec![Visit::Enter(ContextTree::ROOT)];
        while let Some(visit) = stack.pop()
        {
            self.cancel
                .check()?;

            match visit
            {
                Visit::Enter(idx) =>
                {
                    let body = self.own_body(&tree, idx, &sources, &mut state)?;
                    state
                        .dump
                        .push_str(&body);
                    state.bodies[idx] = body;

                    stack.push(Visit::Exit(idx));
                    stack.extend(
                        tree.node(idx)
                            .children
                            .iter()
                            .rev()
                            .map(|&c| Visit::Enter(c)),
                    );
                }
                Visit::Exit(idx) => self.finish(&tree, idx, &mut state)?,
            }
        }

        debug!(
            fetches = fetcher.network_fetches(),
            warnings = self
                .diag
                .count(),
            "run finished"
        );
        Ok(state.outcome)
    }

    /// Discover, process and assemble a context's own files.
    fn own_body(
        &self,
        tree: &ContextTree,
        idx: usize,
        sources: &Sources<'_>,
        state: &mut RunState,
    ) -> Result<String>
    {
        let node = tree.node(idx);
        let opts = &node.options;
        let mut records = discover::discover(opts, &node.label, sources)
            .with_context(|| format!("Failed to collect files for {}", node.label))?;

        // A child folded into its parent skips files the parent chain already
        // carries; inherited includes would otherwise appear twice
        let mut emitted = match node.parent
        {
            Some(parent) if feeds_parent(opts) => state.emitted[parent].clone(),
            _ => HashSet::new(),
        };
        records.retain(|rec| !emitted.contains(&rec.identity));
        emitted.extend(
            records
                .iter()
                .map(|rec| {
                    rec.identity
                        .clone()
                }),
        );
        state.emitted[idx] = emitted;

        let plan = SubstitutionPlan::compile(&opts.replace, &opts.preserve, &self.diag);
        let clean_opts = opts.cleanup();
        let slice_opts = opts.slice();

        records
            .par_iter_mut()
            .try_for_each(|rec| -> Result<(), FoldError> {
                self.cancel
                    .check()?;

                let mut text = cleanup::clean(&rec.text, rec.language, &clean_opts);
                text = plan.apply(&text);
                if !slice_opts.is_identity()
                {
                    text = slice::slice(&text, &slice_opts);
                }
                rec.set_text(text);
                Ok(())
            })?;

        debug!(context = %node.label, files = records.len(), "context processed");
        Ok(assemble::assemble(&records, Layout::of(opts), &mut state.ledger))
    }

    /// Post-order half: render, consult the collaborator, register, write.
    fn finish(
        &self,
        tree: &ContextTree,
        idx: usize,
        state: &mut RunState,
    ) -> Result<()>
    {
        let node = tree.node(idx);
        let opts = &node.options;

        let mut raw = std::mem::take(&mut state.bodies[idx]);
        for &child in &node.children
        {
            if feeds_parent(
                &tree
                    .node(child)
                    .options,
            )
            {
                raw.push_str(&state.finals[child]);
            }
        }

        let templated = match &opts.template
        {
            Some(path) => self.render(node, path, &raw, state)?,
            None => raw.clone(),
        };

        let ai = if opts.ai
        {
            match self.consult(node, &templated)
            {
                Ok(reply) => Some(reply),
                Err(e) =>
                {
                    error!("{e}");
                    state
                        .outcome
                        .failures
                        .push(e);
                    None
                }
            }
        }
        else
        {
            None
        };

        let entry = AliasEntry { raw, templated, ai };
        let final_text = entry
            .final_text()
            .to_string();

        if let Some(name) = &node.name
        {
            state
                .registry
                .register(name, entry)
                .map_err(anyhow::Error::msg)?;
        }

        if let Some(path) = &opts.output
        {
            self.write(path, &final_text)?;
            state
                .outcome
                .written
                .push(path.clone());
        }
        if opts.stdout || (idx == ContextTree::ROOT && opts.output.is_none())
        {
            state
                .outcome
                .stdout
                .push_str(&final_text);
        }

        state.finals[idx] = final_text;
        Ok(())
    }

    fn render(
        &self,
        node: &ContextNode,
        path: &Path,
        raw: &str,
        state: &RunState,
    ) -> Result<String>
    {
        let src = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read template {} for {}", path.display(), node.label))?;

        let scope = Scope {
            vars: &node.vars,
            registry: &state.registry,
            dump: &state.dump,
            own: node
                .name
                .as_deref()
                .map(|n| (n, raw)),
        };

        Ok(template::render(&src, &scope, |key| {
            self.diag
                .warn_once(
                    format!("placeholder:{}:{key}", node.label),
                    format_args!("{}: unresolved placeholder {{{key}}} left as is", node.label),
                );
        }))
    }

    fn consult(
        &self,
        node: &ContextNode,
        text: &str,
    ) -> Result<String, FoldError>
    {
        let opts = &node.options;
        let fail = |reason: String| FoldError::Collaborator { context: node.label.clone(), reason };

        let system_prompt = match &opts.ai_system_prompt
        {
            Some(p) => Some(
                std::fs::read_to_string(p)
                    .map_err(|e| fail(format!("cannot read system prompt {}: {e}", p.display())))?,
            ),
            None => None,
        };
        let seeds = match &opts.ai_seeds
        {
            Some(p) => load_seeds(p).map_err(|e| fail(format!("{e:#}")))?,
            None => Vec::new(),
        };

        let request = ChatRequest {
            context: node
                .label
                .clone(),
            model: opts
                .ai_model
                .clone(),
            system_prompt,
            seeds,
            text: text.to_string(),
        };

        self.collaborator
            .complete(&request)
    }

    fn write(
        &self,
        path: &Path,
        content: &str,
    ) -> Result<()>
    {
        if self
            .app
            .dry_run
        {
            info!(path = %path.display(), bytes = content.len(), "dry run, not writing");
            self.status(&format!("Would write {} bytes to {}", content.len(), path.display()), false);
            return Ok(());
        }

        write_output(path, content)?;
        info!(path = %path.display(), bytes = content.len(), "wrote output");
        self.status(&format!("Wrote {} bytes to {}", content.len(), path.display()), true);
        Ok(())
    }

    /// Human status line on stderr
    fn status(
        &self,
        msg: &str,
        done: bool,
    )
    {
        if self
            .app
            .quiet
        {
            return;
        }

        match (
            done,
            self.app
                .no_color,
        )
        {
            (true, false) => eprintln!("{} {msg}", "✓".green()),
            (true, true) => eprintln!("✓ {msg}"),
            (false, false) => eprintln!("{}", msg.yellow()),
            (false, true) => eprintln!("{msg}"),
        }
    }
}

/// A context without its own destination is folded into its parent
fn feeds_parent(opts: &crate::core::context::Options) -> bool
{
    opts.output
        .is_none()
        && !opts.stdout
}

#[cfg(test)]
mod tests
{
    use std::fs;

    use clap::Parser;
    use tempfile::TempDir;

    use super::*;
    use crate::cli::DirectiveArgs;
    use crate::fetch::testing::FakeTransport;

    struct FailingCollaborator;

    impl Collaborator for FailingCollaborator
    {
        fn complete(
            &self,
            request: &ChatRequest,
        ) -> Result<String, FoldError>
        {
            Err(FoldError::Collaborator { context: request.context.clone(), reason: "offline".into() })
        }
    }

    struct EchoCollaborator;

    impl Collaborator for EchoCollaborator
    {
        fn complete(
            &self,
            request: &ChatRequest,
        ) -> Result<String, FoldError>
        {
            Ok(format!("AI[{}]", request.text.trim()))
        }
    }

    fn engine(dir: &Path) -> Engine
    {
        let app = AppContext { quiet: true, ..Default::default() };
        Engine::new(dir.to_path_buf(), Config::default(), app)
            .unwrap()
            .with_transport(Arc::new(FakeTransport::default()))
            .with_collaborator(Arc::new(DisabledCollaborator))
    }

    fn flags(args: &[&str]) -> ContextFlags
    {
        DirectiveArgs::try_parse_from(args.iter().copied())
            .unwrap()
            .flags
    }

    fn workspace() -> (TempDir, PathBuf)
    {
        let tmp = TempDir::new().unwrap();
        let root = dunce::canonicalize(tmp.path()).unwrap();
        (tmp, root)
    }

    #[test]
    fn unnamed_children_feed_parent_and_named_outputs_do_not()
    {
        let (_tmp, root) = workspace();
        fs::write(root.join("a.txt"), "A\n").unwrap();
        fs::write(root.join("b.txt"), "B\n").unwrap();
        fs::write(root.join("c.txt"), "C\n").unwrap();
        fs::write(root.join("ctx.fup"), "a.txt\n[inline]\n-a b.txt\n[side]\n-a c.txt -o side.md\n").unwrap();

        let outcome = engine(&root)
            .run(flags(&["-x", "ctx.fup"]))
            .unwrap();

        assert_eq!(outcome.stdout, "A\nB\n");
        assert_eq!(fs::read_to_string(root.join("side.md")).unwrap(), "C\n");
        assert_eq!(outcome.written, vec![root.join("side.md")]);
    }

    #[test]
    fn folded_child_does_not_repeat_inherited_files()
    {
        let (_tmp, root) = workspace();
        fs::write(root.join("a.txt"), "A\n").unwrap();
        fs::write(root.join("b.txt"), "B\n").unwrap();
        fs::write(root.join("c.txt"), "C\n").unwrap();
        fs::write(root.join("ctx.fup"), "a.txt\n[inline]\n-a b.txt -x inner.fup\n").unwrap();
        fs::write(root.join("inner.fup"), "c.txt\n").unwrap();

        let outcome = engine(&root)
            .run(flags(&["-x", "ctx.fup"]))
            .unwrap();

        // inner.fup inherits a.txt and b.txt through two levels
        assert_eq!(outcome.stdout, "A\nB\nC\n");
    }

    #[test]
    fn child_with_destination_keeps_inherited_files()
    {
        let (_tmp, root) = workspace();
        fs::write(root.join("a.txt"), "A\n").unwrap();
        fs::write(root.join("b.txt"), "B\n").unwrap();
        fs::write(root.join("ctx.fup"), "a.txt\n[side]\n-a b.txt -o side.md\n").unwrap();

        let outcome = engine(&root)
            .run(flags(&["-x", "ctx.fup"]))
            .unwrap();

        assert_eq!(outcome.stdout, "A\n");
        assert_eq!(fs::read_to_string(root.join("side.md")).unwrap(), "A\nB\n");
    }

    #[test]
    fn templates_see_children_aliases_and_own_raw()
    {
        let (_tmp, root) = workspace();
        fs::write(root.join("a.txt"), "alpha\n").unwrap();
        fs::write(root.join("b.txt"), "beta\n").unwrap();
        fs::write(root.join("page.tpl"), "# {title}\n{api.raw}--\n{missing}\n").unwrap();
        fs::write(root.join("ctx.fup"), "-E title=Guide -t page.tpl\n[api]\n-a a.txt -o api.md\n").unwrap();

        let outcome = engine(&root)
            .run(flags(&["-x", "ctx.fup"]))
            .unwrap();

        assert_eq!(outcome.stdout, "# Guide\nalpha\n--\n{missing}\n");
    }

    #[test]
    fn collaborator_failure_keeps_templated_output()
    {
        let (_tmp, root) = workspace();
        fs::write(root.join("a.txt"), "alpha\n").unwrap();

        let outcome = engine(&root)
            .with_collaborator(Arc::new(FailingCollaborator))
            .run(flags(&["-a", "a.txt", "--ai", "-o", "out.md"]))
            .unwrap();

        assert!(!outcome.is_success());
        assert_eq!(fs::read_to_string(root.join("out.md")).unwrap(), "alpha\n");
    }

    #[test]
    fn ai_reply_becomes_final_variant()
    {
        let (_tmp, root) = workspace();
        fs::write(root.join("a.txt"), "alpha\n").unwrap();
        fs::write(root.join("ctx.fup"), "[sum]\n-a a.txt --ai\n").unwrap();

        let outcome = engine(&root)
            .with_collaborator(Arc::new(EchoCollaborator))
            .run(flags(&["-x", "ctx.fup"]))
            .unwrap();

        assert!(outcome.is_success());
        assert_eq!(outcome.stdout, "AI[alpha]");
    }

    #[test]
    fn cancelled_run_is_interrupted()
    {
        let (_tmp, root) = workspace();
        fs::write(root.join("a.txt"), "alpha\n").unwrap();

        let cancel = CancelFlag::new();
        cancel.cancel();
        let err = engine(&root)
            .with_cancel(cancel)
            .run(flags(&["-a", "a.txt"]))
            .unwrap_err();

        assert_eq!(crate::error::exit_code(&err), crate::error::EXIT_INTERRUPTED);
    }

    #[test]
    fn dry_run_writes_nothing()
    {
        let (_tmp, root) = workspace();
        fs::write(root.join("a.txt"), "alpha\n").unwrap();

        let app = AppContext { quiet: true, dry_run: true, ..Default::default() };
        let outcome = Engine::new(root.clone(), Config::default(), app)
            .unwrap()
            .run(flags(&["-a", "a.txt", "-o", "out.md"]))
            .unwrap();

        assert_eq!(outcome.written, vec![root.join("out.md")]);
        assert!(!root.join("out.md").exists());
    }
}
