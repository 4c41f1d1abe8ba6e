//! `{placeholder}` rendering.
//!
//! `{{` and `}}` are literal braces. A placeholder is an identifier with an
//! optional `.raw` / `.templated` / `.ai` suffix; anything else between
//! braces is copied through untouched.

use indexmap::IndexMap;

use crate::core::registry::AliasRegistry;

/// Name of the run-wide dump placeholder
pub const DUMP_KEY: &str = "_dump";

/// Where placeholders are looked up, highest priority first.
pub struct Scope<'a>
{
    /// Locals overlaid on globals
    pub vars: &'a IndexMap<String, String>,
    pub registry: &'a AliasRegistry,
    pub dump: &'a str,
    /// The rendering context's own name and raw text, so a template can
    /// refer to its context before the alias is registered
    pub own: Option<(&'a str, &'a str)>,
}

impl Scope<'_>
{
    pub fn lookup(
        &self,
        key: &str,
    ) -> Option<&str>
    {
        if let Some(v) = self
            .vars
            .get(key)
        {
            return Some(v);
        }

        if let Some((name, raw)) = self.own
            && (key == name || key.strip_prefix(name) == Some(".raw"))
        {
            return Some(raw);
        }

        if let Some(v) = self
            .registry
            .lookup(key)
        {
            return Some(v);
        }

        (key == DUMP_KEY).then_some(self.dump)
    }
}

/// Placeholder grammar: `[A-Za-z_][A-Za-z0-9_-]*` plus optional variant
fn is_placeholder(key: &str) -> bool
{
    let (name, suffix) = match key.split_once('.')
    {
        Some((n, s)) => (n, Some(s)),
        None => (key, None),
    };

    let mut chars = name.chars();
    let name_ok = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');

    name_ok && suffix.is_none_or(|s| matches!(s, "raw" | "templated" | "ai"))
}

/// Render `template`. `on_missing` is called for every placeholder that
/// resolved to nothing; such placeholders are left verbatim.
pub fn render(
    template: &str,
    scope: &Scope<'_>,
    mut on_missing: impl FnMut(&str),
) -> String
{
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(pos) = rest.find(['{', '}'])
    {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];

        if tail.starts_with("{{")
        {
            out.push('{');
            rest = &tail[2..];
            continue;
        }
        if tail.starts_with("}}")
        {
            out.push('}');
            rest = &tail[2..];
            continue;
        }
        if tail.starts_with('}')
        {
            out.push('}');
            rest = &tail[1..];
            continue;
        }

        // `{` opening a candidate placeholder
        match tail[1..].find('}')
        {
            Some(end) if is_placeholder(&tail[1..1 + end]) =>
            {
                let key = &tail[1..1 + end];
                match scope.lookup(key)
                {
                    Some(value) => out.push_str(value),
                    None =>
                    {
                        on_missing(key);
                        out.push_str(&tail[..end + 2]);
                    }
                }
                rest = &tail[end + 2..];
            }
            _ =>
            {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::core::registry::AliasEntry;

    fn registry() -> AliasRegistry
    {
        let mut reg = AliasRegistry::new();
        reg.register(
            "api",
            AliasEntry { raw: "API-RAW".into(), templated: "API-T".into(), ai: None },
        )
        .unwrap();
        reg
    }

    #[test]
    fn priority_variables_then_aliases_then_dump()
    {
        let reg = registry();
        let mut vars = IndexMap::new();
        vars.insert("title".to_string(), "Report".to_string());
        let scope = Scope { vars: &vars, registry: &reg, dump: "ALL", own: None };

        let out = render("# {title}\n{api}|{api.raw}|{_dump}", &scope, |_| {});
        assert_eq!(out, "# Report\nAPI-T|API-RAW|ALL");

        // A variable shadows an alias of the same name
        vars.insert("api".to_string(), "var".to_string());
        let scope = Scope { vars: &vars, registry: &reg, dump: "", own: None };
        assert_eq!(render("{api}", &scope, |_| {}), "var");
    }

    #[test]
    fn escapes_and_non_placeholders_pass_through()
    {
        let reg = AliasRegistry::new();
        let vars = IndexMap::new();
        let scope = Scope { vars: &vars, registry: &reg, dump: "", own: None };

        let out = render("fn x() {{ a }} {not a key} {} }", &scope, |_| {});
        assert_eq!(out, "fn x() { a } {not a key} {} }");
    }

    #[test]
    fn unresolved_placeholders_stay_and_are_reported()
    {
        let reg = AliasRegistry::new();
        let vars = IndexMap::new();
        let scope = Scope { vars: &vars, registry: &reg, dump: "", own: None };

        let mut missing = Vec::new();
        let out = render("{nope} and {gone.ai}", &scope, |k| missing.push(k.to_string()));

        assert_eq!(out, "{nope} and {gone.ai}");
        assert_eq!(missing, vec!["nope", "gone.ai"]);
    }

    #[test]
    fn own_raw_is_visible_while_rendering()
    {
        let reg = AliasRegistry::new();
        let vars = IndexMap::new();
        let scope = Scope { vars: &vars, registry: &reg, dump: "", own: Some(("docs", "BODY")) };

        assert_eq!(render("<{docs}>{docs.raw}", &scope, |_| {}), "<BODY>BODY");
    }
}
