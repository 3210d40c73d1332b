//! JSON Schema `$ref` resolution
//!
//! The resolver indexes the root document once (every `$defs`/`definitions` map at
//! any depth, keyed by the definition's `$id` when present, else by its map key)
//! and answers `$ref` lookups synchronously. Remote documents are fetched ahead of
//! compilation by [`RefResolver::prefetch`] and cached by URL.

use serde_json::Value;
use std::collections::{HashMap, HashSet};

use crate::adapters::fetch::SchemaFetcher;
use crate::domain::Diagnostic;

/// Resolution context carrying the root document, definitions and remote documents
#[derive(Debug, Clone, Default)]
pub struct RefResolver {
    root: Value,
    /// `$id` or defs-map key -> definition
    definitions: HashMap<String, Value>,
    /// Absolute URL (without fragment) -> fetched document
    remote: HashMap<String, Value>,
}

impl RefResolver {
    /// Create a resolver with definitions extracted from a schema
    pub fn new(root: Value) -> Self {
        let mut resolver = Self {
            root: Value::Null,
            definitions: HashMap::new(),
            remote: HashMap::new(),
        };
        resolver.index(&root, true);
        resolver.root = root;
        resolver
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    /// Number of indexed definitions
    pub fn definition_count(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_cached(&self, url: &str) -> bool {
        self.remote.contains_key(url)
    }

    /// Register an already-fetched remote document
    pub fn insert_remote(&mut self, url: &str, mut doc: Value) {
        rebase_refs(&mut doc, url);
        self.index(&doc, false);
        self.remote.insert(url.to_string(), doc);
    }

    /// Index definitions below `value`. Remote documents only contribute
    /// `$id`-keyed definitions so their map keys never shadow local names.
    fn index(&mut self, value: &Value, by_name: bool) {
        match value {
            Value::Object(map) => {
                for defs_key in ["$defs", "definitions"] {
                    if let Some(defs) = map.get(defs_key).and_then(Value::as_object) {
                        for (name, def) in defs {
                            let key = match def.get("$id").and_then(Value::as_str) {
                                Some(id) => id,
                                None if by_name => name.as_str(),
                                None => continue,
                            };
                            self.definitions
                                .entry(key.to_string())
                                .or_insert_with(|| def.clone());
                        }
                    }
                }
                for child in map.values() {
                    self.index(child, by_name);
                }
            }
            Value::Array(items) => {
                for child in items {
                    self.index(child, by_name);
                }
            }
            _ => {}
        }
    }

    /// Resolve a `$ref`, following chains of reference-only targets.
    ///
    /// Cycles are detected with a per-call visited set.
    pub fn resolve(&self, reference: &str) -> Result<Value, Diagnostic> {
        let mut visited = HashSet::new();
        let mut current = reference.to_string();

        loop {
            if !visited.insert(current.clone()) {
                return Err(Diagnostic::CircularRef {
                    reference: reference.to_string(),
                });
            }

            let target = self.lookup(&current).ok_or_else(|| Diagnostic::UnresolvableRef {
                reference: current.clone(),
            })?;

            match target.get("$ref").and_then(Value::as_str) {
                Some(next) => current = next.to_string(),
                None => return Ok(target.clone()),
            }
        }
    }

    fn lookup(&self, reference: &str) -> Option<&Value> {
        if let Some(fragment) = reference.strip_prefix('#') {
            return self.lookup_local(fragment);
        }

        if let Some(def) = self.definitions.get(reference) {
            return Some(def);
        }

        let (base, fragment) = match reference.split_once('#') {
            Some((base, fragment)) => (base, fragment),
            None => (reference, ""),
        };
        let doc = self.remote.get(base)?;
        if fragment.is_empty() {
            Some(doc)
        } else {
            doc.pointer(fragment)
        }
    }

    fn lookup_local(&self, fragment: &str) -> Option<&Value> {
        for prefix in ["/$defs/", "/definitions/"] {
            if let Some(name) = fragment.strip_prefix(prefix) {
                let name = unescape_pointer(name);
                if let Some(def) = self.definitions.get(&name) {
                    return Some(def);
                }
            }
        }
        if fragment.is_empty() {
            Some(&self.root)
        } else {
            self.root.pointer(fragment)
        }
    }

    /// Fetch every remote document referenced from the root (and, transitively, from
    /// fetched documents). Each URL is fetched at most once; failures leave the
    /// reference unresolved and are reported as diagnostics.
    pub async fn prefetch(&mut self, fetcher: &dyn SchemaFetcher) -> Vec<Diagnostic> {
        let mut failures = Vec::new();
        let mut pending = self.remote_bases(&self.root);

        while let Some(url) = pending.pop() {
            if self.remote.contains_key(&url) {
                continue;
            }
            match fetcher.fetch(&url).await {
                Ok(doc) => {
                    tracing::debug!("Cached remote schema {}", url);
                    self.insert_remote(&url, doc);
                    if let Some(doc) = self.remote.get(&url) {
                        pending.extend(self.remote_bases(doc));
                    }
                }
                Err(e) => {
                    tracing::warn!("Failed to fetch schema '{}': {}", url, e);
                    failures.push(Diagnostic::FetchFailed {
                        url,
                        reason: e.to_string(),
                    });
                }
            }
        }

        failures
    }

    /// Absolute document URLs referenced from `value` that are not known `$id`s
    fn remote_bases(&self, value: &Value) -> Vec<String> {
        let mut refs = Vec::new();
        collect_refs(value, &mut refs);

        let mut bases: Vec<String> = Vec::new();
        for reference in refs {
            if self.definitions.contains_key(&reference) {
                continue;
            }
            let base = reference.split('#').next().unwrap_or_default();
            if is_remote_url(base) && !bases.iter().any(|b| b == base) {
                bases.push(base.to_string());
            }
        }
        bases
    }
}

/// Whether a reference points at an http(s) document
pub fn is_remote_url(reference: &str) -> bool {
    reqwest::Url::parse(reference)
        .map(|url| matches!(url.scheme(), "http" | "https"))
        .unwrap_or(false)
}

fn collect_refs(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            if let Some(reference) = map.get("$ref").and_then(Value::as_str) {
                out.push(reference.to_string());
            }
            for child in map.values() {
                collect_refs(child, out);
            }
        }
        Value::Array(items) => {
            for child in items {
                collect_refs(child, out);
            }
        }
        _ => {}
    }
}

/// Rewrite local and relative `$ref`s inside a fetched document so they stay
/// meaningful once the document is embedded under its URL.
fn rebase_refs(value: &mut Value, base: &str) {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(reference)) = map.get_mut("$ref") {
                if reference.starts_with('#') {
                    *reference = format!("{}{}", base, reference);
                } else if !is_remote_url(reference) {
                    if let Ok(joined) = reqwest::Url::parse(base).and_then(|b| b.join(reference)) {
                        *reference = joined.to_string();
                    }
                }
            }
            for child in map.values_mut() {
                rebase_refs(child, base);
            }
        }
        Value::Array(items) => {
            for child in items {
                rebase_refs(child, base);
            }
        }
        _ => {}
    }
}

fn unescape_pointer(token: &str) -> String {
    token.replace("~1", "/").replace("~0", "~")
}
