//! Run-wide alias registry for named contexts.

use indexmap::IndexMap;

/// Rendered variants of one named context.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasEntry {
    pub raw: String,
    pub templated: String,
    /// Set only when the collaborator call succeeded
    pub ai: Option<String>,
}

impl AliasEntry {
    /// What `{name}` expands to: the AI reply when present, else the
    /// templated text
    pub fn final_text(&self) -> &str {
        self.ai.as_deref().unwrap_or(&self.templated)
    }

    /// Variant by placeholder suffix (`raw`, `templated`, `ai`)
    pub fn variant(&self, suffix: &str) -> Option<&str> {
        match suffix {
            "raw" => Some(&self.raw),
            "templated" => Some(&self.templated),
            "ai" => self.ai.as_deref(),
            _ => None,
        }
    }
}

/// Append-only, write-once map from context name to its variants.
#[derive(Debug, Default)]
pub struct AliasRegistry {
    entries: IndexMap<String, AliasEntry>,
}

impl AliasRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `name`. A second registration of the same name is refused
    /// and leaves the first entry intact.
    pub fn register(&mut self, name: &str, entry: AliasEntry) -> Result<(), String> {
        if self.entries.contains_key(name) {
            return Err(format!("alias {name:?} is already registered"));
        }
        self.entries.insert(name.to_string(), entry);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&AliasEntry> {
        self.entries.get(name)
    }

    /// Resolve a placeholder key: `name` or `name.variant`.
    pub fn lookup(&self, key: &str) -> Option<&str> {
        match key.split_once('.') {
            Some((name, suffix)) => self.get(name)?.variant(suffix),
            None => self.get(key).map(AliasEntry::final_text),
        }
    }

    /// Registered names in registration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(raw: &str, templated: &str, ai: Option<&str>) -> AliasEntry {
        AliasEntry {
            raw: raw.into(),
            templated: templated.into(),
            ai: ai.map(str::to_string),
        }
    }

    #[test]
    fn variants_and_final_text() {
        let mut reg = AliasRegistry::new();
        reg.register("api", entry("R", "T", None)).unwrap();
        reg.register("docs", entry("r", "t", Some("a"))).unwrap();

        assert_eq!(reg.lookup("api"), Some("T"));
        assert_eq!(reg.lookup("api.raw"), Some("R"));
        assert_eq!(reg.lookup("api.ai"), None);
        assert_eq!(reg.lookup("docs"), Some("a"));
        assert_eq!(reg.lookup("docs.templated"), Some("t"));
        assert_eq!(reg.lookup("docs.bogus"), None);
        assert_eq!(reg.lookup("missing"), None);
    }

    #[test]
    fn names_are_write_once() {
        let mut reg = AliasRegistry::new();
        reg.register("api", entry("first", "first", None)).unwrap();

        assert!(reg.register("api", entry("second", "second", None)).is_err());
        assert_eq!(reg.lookup("api.raw"), Some("first"));
        assert_eq!(reg.names().collect::<Vec<_>>(), vec!["api"]);
    }
}
