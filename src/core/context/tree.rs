//! Context tree construction.
//!
//! Resolution is pre-order over an explicit stack: a node is merged onto its
//! already-resolved parent, then its `-x` directive files are parsed into
//! child nodes and pushed. Global variables therefore flow to every node
//! resolved later, and nesting depth is checked without recursion.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indexmap::IndexMap;
use tracing::debug;

use crate::cli::ContextFlags;
use crate::core::context::directive;
use crate::core::context::options::{self, Include, MergeCtx, Options, Variables};
use crate::error::{DirectiveSyntaxError, FoldError};
use crate::infra::diag::Diagnostics;

/// Deepest allowed chain of nested directive files
pub const MAX_DIRECTIVE_DEPTH: usize = 16;

#[derive(Debug, Clone)]
pub struct ContextNode
{
    /// `[name]` of a named section; `None` for the root and file nodes
    pub name: Option<String>,
    /// Human label for diagnostics
    pub label: String,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    /// Directive file this node stands for (file nodes only)
    pub file: Option<PathBuf>,
    /// Declared flag delta
    pub flags: ContextFlags,
    /// Effective options, filled during resolution
    pub options: Options,
    /// Variables visible to this node's template
    pub vars: IndexMap<String, String>,
}

impl ContextNode
{
    fn new(
        name: Option<String>,
        label: String,
        parent: Option<usize>,
        file: Option<PathBuf>,
        flags: ContextFlags,
    ) -> Self
    {
        Self {
            name,
            label,
            parent,
            children: Vec::new(),
            file,
            flags,
            options: Options::default(),
            vars: IndexMap::new(),
        }
    }
}

/// Arena of resolved contexts; index 0 is the root.
#[derive(Debug, Clone)]
pub struct ContextTree
{
    nodes: Vec<ContextNode>,
}

impl ContextTree
{
    pub const ROOT: usize = 0;

    pub fn node(
        &self,
        idx: usize,
    ) -> &ContextNode
    {
        &self.nodes[idx]
    }

    pub fn len(&self) -> usize
    {
        self.nodes
            .len()
    }

    pub fn is_empty(&self) -> bool
    {
        self.nodes
            .is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ContextNode>
    {
        self.nodes
            .iter()
    }

    /// Every declared `-o` destination in the run
    pub fn outputs(&self) -> Vec<PathBuf>
    {
        self.nodes
            .iter()
            .filter_map(|n| {
                n.options
                    .output
                    .clone()
            })
            .collect()
    }

    /// Node indices in pre-order (root first, siblings in declaration order)
    pub fn preorder(&self) -> Vec<usize>
    {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![Self::ROOT];

        while let Some(idx) = stack.pop()
        {
            out.push(idx);
            stack.extend(
                self.nodes[idx]
                    .children
                    .iter()
                    .rev(),
            );
        }
        out
    }
}

/// Builds a [`ContextTree`] from the root flags.
pub struct Resolver<'a>
{
    base_dir: PathBuf,
    diag: &'a Diagnostics,
    vars: Variables,
    names: HashSet<String>,
}

impl<'a> Resolver<'a>
{
    pub fn new(
        base_dir: PathBuf,
        diag: &'a Diagnostics,
    ) -> Self
    {
        Self { base_dir, diag, vars: Variables::default(), names: HashSet::new() }
    }

    pub fn resolve(
        mut self,
        root_flags: ContextFlags,
    ) -> Result<ContextTree>
    {
        let mut nodes = vec![ContextNode::new(None, "root".to_string(), None, None, root_flags)];
        let mut stack = vec![ContextTree::ROOT];

        while let Some(idx) = stack.pop()
        {
            self.resolve_node(&mut nodes, idx)?;

            let expanded = self.expand_directives(&mut nodes, idx)?;

            // -x files come first, then sections declared in this file
            let existing = std::mem::take(&mut nodes[idx].children);
            nodes[idx].children = expanded
                .into_iter()
                .chain(existing)
                .collect();

            stack.extend(
                nodes[idx]
                    .children
                    .iter()
                    .rev(),
            );
        }

        Ok(ContextTree { nodes })
    }

    fn resolve_node(
        &mut self,
        nodes: &mut [ContextNode],
        idx: usize,
    ) -> Result<()>
    {
        let parent = nodes[idx]
            .parent
            .map(|p| {
                nodes[p]
                    .options
                    .clone()
            });

        let ctx = MergeCtx { label: &nodes[idx].label, base_dir: &self.base_dir, diag: self.diag };
        let resolved = options::resolve(parent.as_ref(), &nodes[idx].flags, &mut self.vars, &ctx)
            .with_context(|| format!("Failed to resolve context {}", nodes[idx].label))?;

        let mut opts = resolved.options;

        // A bare invocation folds the working directory
        if idx == ContextTree::ROOT && !opts.has_sources() && opts.directives.is_empty()
        {
            opts.includes
                .push(Include::Path(
                    opts.workdir
                        .clone(),
                ));
        }

        debug!(context = %nodes[idx].label, includes = opts.includes.len(), "context resolved");

        nodes[idx].options = opts;
        nodes[idx].vars = resolved.vars;
        Ok(())
    }

    /// Directive files on the chain from the root to `idx`
    fn active_chain(
        nodes: &[ContextNode],
        mut idx: usize,
    ) -> Vec<PathBuf>
    {
        let mut chain = Vec::new();
        loop
        {
            if let Some(f) = &nodes[idx].file
            {
                chain.push(f.clone());
            }
            match nodes[idx].parent
            {
                Some(p) => idx = p,
                None => break,
            }
        }
        chain
    }

    fn expand_directives(
        &mut self,
        nodes: &mut Vec<ContextNode>,
        idx: usize,
    ) -> Result<Vec<usize>>
    {
        let mut added = Vec::new();
        let paths = nodes[idx]
            .options
            .directives
            .clone();

        for path in paths
        {
            let canonical = dunce::canonicalize(&path)
                .with_context(|| format!("Directive file not found: {}", path.display()))?;

            let chain = Self::active_chain(nodes, idx);
            if chain.contains(&canonical)
            {
                return Err(FoldError::Recursion {
                    path: canonical,
                    reason: "directive file includes itself".to_string(),
                }
                .into());
            }
            if chain.len() >= MAX_DIRECTIVE_DEPTH
            {
                return Err(FoldError::Recursion {
                    path: canonical,
                    reason: format!("nesting deeper than {MAX_DIRECTIVE_DEPTH} directive files"),
                }
                .into());
            }

            let src = std::fs::read_to_string(&canonical)
                .with_context(|| format!("Failed to read directive file {}", canonical.display()))?;
            let parsed = directive::parse_str(&canonical, &src)?;

            let file_idx = nodes.len();
            nodes.push(ContextNode::new(
                None,
                display_file(&canonical, &self.base_dir),
                Some(idx),
                Some(canonical.clone()),
                parsed.preamble,
            ));

            for section in parsed.sections
            {
                // Names are unique across the whole run
                if !self
                    .names
                    .insert(section.name.clone())
                {
                    return Err(DirectiveSyntaxError::at(
                        &canonical,
                        &src,
                        section.line,
                        format!("duplicate context name {:?}", section.name),
                    )
                    .into());
                }

                let section_idx = nodes.len();
                nodes.push(ContextNode::new(
                    Some(section.name.clone()),
                    format!("[{}]", section.name),
                    Some(file_idx),
                    None,
                    section.flags,
                ));
                nodes[file_idx]
                    .children
                    .push(section_idx);
            }

            debug!(file = %canonical.display(), sections = nodes[file_idx].children.len(), "directive file expanded");
            added.push(file_idx);
        }

        Ok(added)
    }
}

fn display_file(
    path: &Path,
    base: &Path,
) -> String
{
    crate::infra::utils::PathUtils::display_relative(path, base)
}

#[cfg(test)]
mod tests
{
    use std::fs;

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

    fn base(tmp: &TempDir) -> PathBuf
    {
        dunce::canonicalize(tmp.path()).unwrap()
    }

    #[test]
    fn sections_inherit_from_file_and_root()
    {
        let tmp = TempDir::new().unwrap();
        let base = base(&tmp);
        fs::write(base.join("ctx.fup"), "-c\n[one]\n-a a.rs\n[two]\n--keep-comments\n-a b.rs\n").unwrap();

        let diag = Diagnostics::new();
        let tree = Resolver::new(base.clone(), &diag)
            .resolve(flags(&["-h", "-x", "ctx.fup"]))
            .unwrap();

        let labels: Vec<_> = tree
            .preorder()
            .into_iter()
            .map(|i| {
                tree.node(i)
                    .label
                    .clone()
            })
            .collect();
        assert_eq!(labels, vec!["root", "ctx.fup", "[one]", "[two]"]);

        let one = tree.node(2);
        let two = tree.node(3);
        assert!(one.options.sticky.header && one.options.sticky.strip_comments);
        assert!(two.options.sticky.header && !two.options.sticky.strip_comments);
        assert_eq!(one.options.includes, vec![Include::Path(base.join("a.rs"))]);
    }

    #[test]
    fn globals_flow_to_later_contexts()
    {
        let tmp = TempDir::new().unwrap();
        let base = base(&tmp);
        fs::write(base.join("ctx.fup"), "[a]\n-E WHO=alpha\n[b]\n-e ME=$WHO\n").unwrap();

        let diag = Diagnostics::new();
        let tree = Resolver::new(base, &diag)
            .resolve(flags(&["-x", "ctx.fup"]))
            .unwrap();

        let b = tree
            .iter()
            .find(|n| n.name.as_deref() == Some("b"))
            .unwrap();
        assert_eq!(b.vars.get("ME").map(String::as_str), Some("alpha"));
    }

    #[test]
    fn self_inclusion_is_recursion()
    {
        let tmp = TempDir::new().unwrap();
        let base = base(&tmp);
        fs::write(base.join("a.fup"), "-x b.fup\n").unwrap();
        fs::write(base.join("b.fup"), "[inner]\n-x a.fup\n").unwrap();

        let diag = Diagnostics::new();
        let err = Resolver::new(base, &diag)
            .resolve(flags(&["-x", "a.fup"]))
            .unwrap_err();

        assert!(matches!(err.downcast_ref::<FoldError>(), Some(FoldError::Recursion { .. })));
    }

    #[test]
    fn depth_guard_stops_deep_chains()
    {
        let tmp = TempDir::new().unwrap();
        let base = base(&tmp);
        for i in 0..=MAX_DIRECTIVE_DEPTH
        {
            fs::write(base.join(format!("d{i}.fup")), format!("-x d{}.fup\n", i + 1)).unwrap();
        }

        let diag = Diagnostics::new();
        let err = Resolver::new(base, &diag)
            .resolve(flags(&["-x", "d0.fup"]))
            .unwrap_err();

        match err.downcast_ref::<FoldError>()
        {
            Some(FoldError::Recursion { reason, .. }) => assert!(reason.contains("nesting deeper")),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn duplicate_names_across_files_are_syntax_errors()
    {
        let tmp = TempDir::new().unwrap();
        let base = base(&tmp);
        fs::write(base.join("a.fup"), "[docs]\n-a a\n").unwrap();
        fs::write(base.join("b.fup"), "\n[docs]\n-a b\n").unwrap();

        let diag = Diagnostics::new();
        let err = Resolver::new(base, &diag)
            .resolve(flags(&["-x", "a.fup", "-x", "b.fup"]))
            .unwrap_err();

        let syntax = err
            .downcast_ref::<DirectiveSyntaxError>()
            .unwrap();
        assert_eq!(syntax.line, 2);
    }

    #[test]
    fn bare_root_includes_workdir()
    {
        let tmp = TempDir::new().unwrap();
        let base = base(&tmp);

        let diag = Diagnostics::new();
        let tree = Resolver::new(base.clone(), &diag)
            .resolve(ContextFlags::default())
            .unwrap();

        assert_eq!(tree.node(ContextTree::ROOT).options.includes, vec![Include::Path(base)]);
    }
}
