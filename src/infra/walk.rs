//! Filepath: src/infra/walk.rs
//! Directory expansion for include rules and git checkouts.
//! - Hidden (dot) entries skipped unless the caller opts in
//! - Optional ignore-file awareness (repository-local files only)
//! - Sorted output, so an include rule always expands the same way
//!
//! Backed by ripgrep's `ignore` crate. The user's global gitignore is never
//! consulted: two machines with the same inputs must expand the same include
//! rule to the same file list.

use std::path::{Path, PathBuf};

use ignore::WalkBuilder;

/// Expands a directory into a sorted list of regular files.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileWalker
{
    /// Include hidden (dot) files; default false
    include_hidden: bool,

    /// Honour .gitignore/.ignore files inside the walked tree; default false
    respect_gitignore: bool,

    /// Follow symbolic links; default false
    follow_symlinks: bool,
}

impl FileWalker
{
    pub fn new() -> Self
    {
        Self::default()
    }

    /// (Optional) Include or exclude hidden files (dotfiles).
    pub fn with_include_hidden(
        mut self,
        include_hidden: bool,
    ) -> Self
    {
        self.include_hidden = include_hidden;
        self
    }

    /// (Optional) Honour ignore files found inside the walked tree.
    pub fn with_gitignore(
        mut self,
        respect: bool,
    ) -> Self
    {
        self.respect_gitignore = respect;
        self
    }

    /// (Optional) Follow or skip symbolic links (default false).
    pub fn with_follow_symlinks(
        mut self,
        follow: bool,
    ) -> Self
    {
        self.follow_symlinks = follow;
        self
    }

    fn build_walk(
        &self,
        root: &Path,
    ) -> WalkBuilder
    {
        let mut b = WalkBuilder::new(root);

        // WalkBuilder::hidden(true) skips dotfiles; the root itself is
        // never filtered, so `-a .github` still works
        b.hidden(!self.include_hidden);

        b.ignore(self.respect_gitignore);
        b.git_ignore(self.respect_gitignore);
        b.git_exclude(self.respect_gitignore);
        b.git_global(false);
        b.parents(self.respect_gitignore);
        // .gitignore must apply outside a git repository too
        b.require_git(false);

        b.follow_links(self.follow_symlinks);
        b.sort_by_file_name(|a, b| a.cmp(b));
        b
    }

    /// Traverse files under `root`.
    /// Returns a **sorted** list of file paths, plus the entries that could
    /// not be read.
    pub fn walk_files<P: AsRef<Path>>(
        &self,
        root: P,
    ) -> (Vec<PathBuf>, Vec<String>)
    {
        let mut errors = Vec::new();
        let mut out: Vec<PathBuf> = Vec::new();

        for res in self
            .build_walk(root.as_ref())
            .build()
        {
            match res
            {
                Ok(entry) =>
                {
                    if entry
                        .file_type()
                        .is_some_and(|ft| ft.is_file())
                    {
                        out.push(entry.into_path());
                    }
                }
                Err(e) => errors.push(e.to_string()),
            }
        }

        // Full-path order: files of a directory before deeper ones only
        // when their names sort first
        out.sort();

        (out, errors)
    }
}

#[cfg(test)]
mod tests
{
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    fn write_file(
        root: &Path,
        rel: &str,
    )
    {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, rel).unwrap();
    }

    fn relative(
        root: &Path,
        files: Vec<PathBuf>,
    ) -> Vec<String>
    {
        files
            .iter()
            .map(|p| {
                p.strip_prefix(root)
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect()
    }

    #[test]
    fn expansion_is_sorted_by_path()
    {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        for rel in ["b.rs", "a/z.rs", "README.md"]
        {
            write_file(root, rel);
        }

        let (files, errors) = FileWalker::new().walk_files(root);

        assert!(errors.is_empty());
        assert_eq!(relative(root, files), vec!["README.md", "a/z.rs", "b.rs"]);
    }

    #[test]
    fn dot_entries_need_opt_in()
    {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        for rel in [".env", ".git/config", "visible.txt"]
        {
            write_file(root, rel);
        }

        let (files, _) = FileWalker::new().walk_files(root);
        assert_eq!(relative(root, files), vec!["visible.txt"]);

        let (files, _) = FileWalker::new()
            .with_include_hidden(true)
            .walk_files(root);
        assert!(relative(root, files).contains(&".env".to_string()));
    }

    #[test]
    fn ignore_files_are_opt_in()
    {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::write(root.join(".gitignore"), "skip.txt\n").unwrap();
        write_file(root, "skip.txt");
        write_file(root, "keep.txt");

        let (files, _) = FileWalker::new().walk_files(root);
        assert_eq!(files.len(), 2);

        let (files, _) = FileWalker::new()
            .with_gitignore(true)
            .walk_files(root);
        assert_eq!(relative(root, files), vec!["keep.txt"]);
    }
}
