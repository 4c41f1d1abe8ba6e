// End-to-end runs of the `fup` binary against on-disk fixtures.
// assert_cmd spawns the compiled binary, assert_fs builds hermetic
// project trees and predicates keeps stdout/stderr checks concise.

mod util;

use assert_cmd::prelude::*;
use assert_fs::prelude::*;
use predicates::prelude::*;

use util::{fup, make_project, stdout_of};

#[test]
fn identical_inputs_give_identical_output()
{
    let tmp = make_project();

    let first = stdout_of(fup(tmp.path()).args(["-h", "-c", "-a", "src", "-a", "docs"]));
    let second = stdout_of(fup(tmp.path()).args(["-h", "-c", "-a", "src", "-a", "docs"]));

    assert_eq!(first, second);
    assert!(first.starts_with("===== src/lib.rs =====\n"));
    assert!(first.contains("===== docs/guide.md ====="));
}

#[test]
fn bare_invocation_folds_working_directory()
{
    let tmp = make_project();

    let out = stdout_of(&mut fup(tmp.path()));

    // Include order is lexicographic within the directory
    let docs = out.find("# Guide").expect("guide");
    let notes = out.find("secret_token").expect("notes");
    let lib = out.find("pub fn alpha").expect("lib");
    assert!(docs < notes && notes < lib);
}

#[test]
fn sticky_flags_inherit_and_negation_stays_local()
{
    let tmp = make_project();
    tmp.child("ctx.fup")
        .write_str(
            "-c\n\
             [kept]\n\
             -a src/lib.rs -o kept.md\n\
             [raw]\n\
             --keep-comments\n\
             -a src/lib.rs -o raw.md\n\
             [again]\n\
             -a src/lib.rs -o again.md\n",
        )
        .unwrap();

    fup(tmp.path())
        .args(["--quiet", "-x", "ctx.fup"])
        .assert()
        .success();

    tmp.child("kept.md")
        .assert(predicate::str::contains("helper comment").not());
    tmp.child("kept.md")
        .assert(predicate::str::contains("/// Documented."));
    tmp.child("raw.md")
        .assert(predicate::str::contains("// helper comment"));
    // The sibling after the negation still strips
    tmp.child("again.md")
        .assert(predicate::str::contains("helper comment").not());
}

#[test]
fn list_flags_accumulate_in_order_and_none_clears()
{
    let tmp = make_project();
    tmp.child("ctx.fup")
        .write_str(
            "-a notes.txt\n\
             [more]\n\
             -a docs/guide.md -l -o more.txt\n\
             [reset]\n\
             -a none -a src/util.py -l -o reset.txt\n",
        )
        .unwrap();

    fup(tmp.path())
        .args(["--quiet", "-x", "ctx.fup"])
        .assert()
        .success();

    tmp.child("more.txt")
        .assert("notes.txt\ndocs/guide.md\n");
    tmp.child("reset.txt")
        .assert("src/util.py\n");
}

#[test]
fn preserve_wins_over_replace()
{
    let tmp = make_project();

    let out = stdout_of(fup(tmp.path()).args(["-a", "notes.txt", "-Y", "/secret_token/", "-y", "/secret/REDACTED/g"]));

    assert_eq!(out, "secret_token and REDACTED\n");
}

#[test]
fn slicing_windows_and_first_line()
{
    let tmp = make_project();

    let window = stdout_of(fup(tmp.path()).args(["-a", "docs/guide.md", "-N", "5", "-n", "3"]));
    assert_eq!(window, "line 5\nline 6\nline 7\n");

    let keep = stdout_of(fup(tmp.path()).args(["-a", "docs/guide.md", "-N", "5", "-n", "2", "-m"]));
    assert_eq!(keep, "# Guide\nline 5\nline 6\n");

    let past_end = stdout_of(fup(tmp.path()).args(["-a", "docs/guide.md", "-N", "20"]));
    assert_eq!(past_end, "");
}

#[test]
fn headers_are_emitted_once_across_siblings()
{
    let tmp = make_project();
    tmp.child("ctx.fup")
        .write_str(
            "-h\n\
             [one]\n\
             -a notes.txt\n\
             [two]\n\
             -a notes.txt\n",
        )
        .unwrap();

    let out = stdout_of(fup(tmp.path()).args(["-x", "ctx.fup"]));

    assert_eq!(out.matches("===== notes.txt =====").count(), 1);
    assert_eq!(out.matches("secret_token").count(), 2);
}

#[test]
fn fenced_output_uses_detected_language()
{
    let tmp = make_project();

    let out = stdout_of(fup(tmp.path()).args(["-a", "src/util.py", "-u"]));
    assert!(out.starts_with("```python\nimport os\n"));
    assert!(out.ends_with("```\n"));

    let out = stdout_of(fup(tmp.path()).args(["-a", "src/util.py", "-u", "text"]));
    assert!(out.starts_with("```text\n"));
}

#[test]
fn templates_reference_named_contexts()
{
    let tmp = make_project();
    tmp.child("report.tpl")
        .write_str("Report for {project}\n--- notes ---\n{notes}--- end ---\n{unknown}\n")
        .unwrap();
    tmp.child("ctx.fup")
        .write_str(
            "-E project=demo\n\
             [notes]\n\
             -a notes.txt -o notes.md\n\
             [report]\n\
             -t report.tpl -o report.md\n",
        )
        .unwrap();

    fup(tmp.path())
        .args(["-x", "ctx.fup"])
        .assert()
        .success()
        .stderr(predicate::str::contains("unresolved placeholder {unknown}"));

    tmp.child("report.md")
        .assert("Report for demo\n--- notes ---\nsecret_token and secret\n--- end ---\n{unknown}\n");
}

#[test]
fn stdout_duplication_and_outputs_are_not_reingested()
{
    let tmp = make_project();

    let out = stdout_of(fup(tmp.path()).args(["--quiet", "-a", ".", "-s", "txt", "-o", "out.txt", "-O"]));
    assert_eq!(out, "secret_token and secret\n");
    tmp.child("out.txt")
        .assert("secret_token and secret\n");

    // A second run must not fold its own previous output
    let again = stdout_of(fup(tmp.path()).args(["--quiet", "-a", ".", "-s", "txt", "-o", "out.txt", "-O"]));
    assert_eq!(again, out);
}

#[test]
fn dry_run_writes_nothing()
{
    let tmp = make_project();

    fup(tmp.path())
        .args(["--dry-run", "-a", "notes.txt", "-o", "out.md"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Would write"));

    tmp.child("out.md")
        .assert(predicate::path::missing());
}

#[test]
fn directive_syntax_error_exits_one_with_location()
{
    let tmp = make_project();
    tmp.child("bad.fup")
        .write_str("-c\n[ok]\n-a src\n[not valid]\n")
        .unwrap();

    fup(tmp.path())
        .args(["-x", "bad.fup"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("invalid context name"))
        .stderr(predicate::str::contains("bad.fup"));
}

#[test]
fn self_including_directive_is_fatal()
{
    let tmp = make_project();
    tmp.child("loop.fup")
        .write_str("-x loop.fup\n")
        .unwrap();

    fup(tmp.path())
        .args(["-x", "loop.fup"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("recursion"));
}

#[test]
fn exhausted_filters_fail_the_run()
{
    let tmp = make_project();

    fup(tmp.path())
        .args(["-a", "src", "-s", ".java"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("excluded by filters"));
}

#[test]
fn missing_includes_warn_but_succeed()
{
    let tmp = make_project();

    let assert = fup(tmp.path())
        .args(["-a", "notes.txt", "-a", "nope.rs"])
        .assert()
        .success()
        .stderr(predicate::str::contains("include path not found"));

    assert_eq!(String::from_utf8_lossy(&assert.get_output().stdout), "secret_token and secret\n");
}

#[test]
fn ai_without_key_uses_disabled_stub()
{
    let tmp = make_project();

    let out = stdout_of(fup(tmp.path()).args(["--quiet", "-a", "notes.txt", "--ai"]));
    assert_eq!(out, foldup::ai::AI_DISABLED_REPLY);
}

#[test]
fn init_and_completions_subcommands()
{
    let tmp = assert_fs::TempDir::new().unwrap();

    fup(tmp.path())
        .args(["init", "."])
        .assert()
        .success();
    tmp.child("foldup.toml")
        .assert(predicate::str::contains("cache_dir"));

    fup(tmp.path())
        .args(["init", "."])
        .assert()
        .failure();

    fup(tmp.path())
        .args(["-c", "init", "--force"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("cannot be combined with a subcommand"));

    fup(tmp.path())
        .args(["completions", "bash", "--stdout"])
        .assert()
        .success()
        .stdout(predicate::str::contains("fup"));
}
