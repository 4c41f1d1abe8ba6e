//! Output assembly: headers, fences and list mode.

use std::collections::HashSet;

use crate::core::context::options::{Options, WRAP_AUTO};
use crate::core::record::FileRecord;

/// Identities whose header was already emitted in this run.
#[derive(Debug, Default)]
pub struct HeaderLedger {
    seen: HashSet<String>,
}

impl HeaderLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// True the first time `identity` is offered
    pub fn first_sighting(&mut self, identity: &str) -> bool {
        self.seen.insert(identity.to_string())
    }
}

/// Presentation switches of one context.
#[derive(Debug, Clone, Copy, Default)]
pub struct Layout<'a> {
    pub header: bool,
    /// Fence label; [`WRAP_AUTO`] picks the detected language per file
    pub wrap: Option<&'a str>,
    pub list: bool,
}

impl<'a> Layout<'a> {
    pub fn of(opts: &'a Options) -> Self {
        Self {
            header: opts.sticky.header,
            wrap: opts.wrap.as_deref(),
            list: opts.list,
        }
    }
}

/// Banner placed above a file's body
pub fn banner(display: &str) -> String {
    format!("===== {display} =====")
}

/// Concatenate processed records in order.
pub fn assemble(records: &[FileRecord], layout: Layout<'_>, ledger: &mut HeaderLedger) -> String {
    let mut out = String::new();

    if layout.list {
        for rec in records {
            out.push_str(&rec.display);
            out.push('\n');
        }
        return out;
    }

    for rec in records {
        if layout.header && ledger.first_sighting(&rec.identity) {
            out.push_str(&banner(&rec.display));
            out.push('\n');
        }

        match layout.wrap {
            Some(label) => {
                let label = if label == WRAP_AUTO {
                    rec.fence_label()
                } else {
                    label.to_string()
                };
                out.push_str("```");
                out.push_str(&label);
                out.push('\n');
                push_terminated(&mut out, &rec.text);
                out.push_str("```\n");
            }
            None => push_terminated(&mut out, &rec.text),
        }
    }

    out
}

/// Append `text`, adding a final newline when it lacks one
fn push_terminated(out: &mut String, text: &str) {
    out.push_str(text);
    if !text.is_empty() && !text.ends_with('\n') {
        out.push('\n');
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::core::record::Origin;
    use crate::infra::diag::Diagnostics;

    fn rec(name: &str, body: &str) -> FileRecord {
        FileRecord::new(
            format!("/w/{name}"),
            Origin::Local,
            name.to_string(),
            PathBuf::from(name),
            body.as_bytes().to_vec(),
            &Diagnostics::new(),
        )
    }

    #[test]
    fn headers_once_per_run() {
        let mut ledger = HeaderLedger::new();
        let layout = Layout {
            header: true,
            ..Default::default()
        };
        let records = [rec("a.rs", "fn a() {}"), rec("b.rs", "fn b() {}\n")];

        let first = assemble(&records, layout, &mut ledger);
        assert_eq!(
            first,
            "===== a.rs =====\nfn a() {}\n===== b.rs =====\nfn b() {}\n"
        );

        // A sibling including the same file gets the body but no banner
        let second = assemble(&records[..1], layout, &mut ledger);
        assert_eq!(second, "fn a() {}\n");
    }

    #[test]
    fn fences_use_detected_or_explicit_label() {
        let mut ledger = HeaderLedger::new();
        let records = [rec("main.py", "print(1)\n"), rec("notes.xyz", "n\n")];

        let auto = assemble(
            &records,
            Layout {
                wrap: Some(WRAP_AUTO),
                ..Default::default()
            },
            &mut ledger,
        );
        assert_eq!(auto, "```python\nprint(1)\n```\n```xyz\nn\n```\n");

        let fixed = assemble(
            &records[..1],
            Layout {
                wrap: Some("text"),
                ..Default::default()
            },
            &mut ledger,
        );
        assert_eq!(fixed, "```text\nprint(1)\n```\n");
    }

    #[test]
    fn list_mode_prints_paths() {
        let mut ledger = HeaderLedger::new();
        let records = [rec("a.rs", "x"), rec("b.rs", "y")];
        let out = assemble(
            &records,
            Layout {
                list: true,
                header: true,
                ..Default::default()
            },
            &mut ledger,
        );
        assert_eq!(out, "a.rs\nb.rs\n");
    }
}
