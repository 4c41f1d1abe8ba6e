//! Shared test utilities for integration tests
//!
//! Provides common fixture creation and helper functions
//! used across multiple test files.

#![allow(dead_code)]

use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use assert_fs::prelude::*;

/// A `fup` invocation rooted at `dir`, isolated from the caller's
/// environment (log filter, API keys, config overrides).
pub fn fup(dir: &Path) -> Command
{
    let mut cmd = Command::cargo_bin("fup").expect("bin");
    cmd.current_dir(dir)
        .env_remove("FOLDUP_LOG")
        .env_remove("OPENAI_API_KEY")
        .arg("--no-color");
    cmd
}

/// Small mixed-language project used by most CLI tests.
pub fn make_project() -> assert_fs::TempDir
{
    // Initialize the temporary project root
    let tmp = assert_fs::TempDir::new().expect("tempdir");

    tmp.child("src/lib.rs")
        .write_str(
            "use std::fmt;\n\
             \n\
             // helper comment\n\
             /// Documented.\n\
             pub fn alpha() -> u32 { 1 } // trailing\n",
        )
        .expect("write lib.rs");

    tmp.child("src/util.py")
        .write_str(
            "import os\n\
             \n\
             def beta():\n    \
                 \"\"\"Doc.\"\"\"\n    \
                 return 2  # two\n",
        )
        .expect("write util.py");

    tmp.child("docs/guide.md")
        .write_str("# Guide\nline 2\nline 3\nline 4\nline 5\nline 6\nline 7\nline 8\n")
        .expect("write guide.md");

    tmp.child("notes.txt")
        .write_str("secret_token and secret\n")
        .expect("write notes.txt");

    tmp
}

/// stdout of a successful run
pub fn stdout_of(cmd: &mut Command) -> String
{
    let out = cmd
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    String::from_utf8(out).expect("utf8 stdout")
}
