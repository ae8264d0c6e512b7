//! Request-scoped module registry.
//!
//! [`ModuleGraph`] owns every source file loaded for one request, remembers
//! how each `(specifier, referrer)` pair resolved, and records the order in
//! which modules finished processing.

use std::collections::HashMap;
use std::sync::Arc;

use kiln_types::{MediaType, SourceText};

use crate::host::FetchedSource;

/// `(requested, resolution target)`: the name an importer wrote and the
/// name to resolve. They differ when a type directive redirects an import.
pub type ModulePair = (String, String);

/// One module in the graph.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Canonical URL; the graph key.
    pub url: String,
    /// File name the engine sees.
    pub filename: String,
    pub media_type: MediaType,
    pub text: Arc<SourceText>,
    processed: bool,
    imports: Vec<ModulePair>,
}

impl SourceFile {
    pub fn new(
        url: impl Into<String>,
        filename: impl Into<String>,
        media_type: MediaType,
        source: impl Into<String>,
    ) -> Self {
        let filename = filename.into();
        Self {
            url: url.into(),
            text: Arc::new(SourceText::new(filename.clone(), source)),
            filename,
            media_type,
            processed: false,
            imports: Vec::new(),
        }
    }

    pub fn from_fetched(fetched: FetchedSource) -> Self {
        Self::new(
            fetched.url,
            fetched.filename,
            fetched.media_type,
            fetched.source_code,
        )
    }

    pub fn source(&self) -> &str {
        &self.text.text
    }

    /// Whether the file's imports have been discovered.
    pub fn is_processed(&self) -> bool {
        self.processed
    }

    /// Import pairs found when the file was processed.
    pub fn imports(&self) -> &[ModulePair] {
        &self.imports
    }
}

/// All modules loaded for one request.
#[derive(Debug, Default)]
pub struct ModuleGraph {
    files: HashMap<String, SourceFile>,
    /// Alternate names (redirected URLs, engine file names) → canonical URL.
    aliases: HashMap<String, String>,
    /// Referrer (`None` for roots) → requested specifier → canonical URL.
    resolutions: HashMap<Option<String>, HashMap<String, String>>,
    /// Canonical URLs in the order processing completed: dependencies first.
    order: Vec<String>,
}

impl ModuleGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Canonical URL for a URL or alias.
    pub fn canonical<'a>(&'a self, name: &'a str) -> &'a str {
        self.aliases.get(name).map(String::as_str).unwrap_or(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.files.contains_key(self.canonical(name))
    }

    /// Look up a module by URL, redirect source, or file name.
    pub fn get(&self, name: &str) -> Option<&SourceFile> {
        self.files.get(self.canonical(name))
    }

    /// Add a module under `requested_url`.
    ///
    /// When the file reports a different URL (a redirect), the requested URL
    /// becomes an alias. Returns the canonical URL. A module that is already
    /// present is left untouched.
    pub fn insert(&mut self, requested_url: &str, file: SourceFile) -> String {
        let url = file.url.clone();
        if url != requested_url {
            self.aliases.insert(requested_url.to_string(), url.clone());
        }
        if file.filename != url {
            self.aliases
                .entry(file.filename.clone())
                .or_insert_with(|| url.clone());
        }
        self.files.entry(url.clone()).or_insert(file);
        url
    }

    /// Remember that `requested`, imported from `referrer`, resolved to `url`.
    pub fn cache_resolution(&mut self, referrer: Option<&str>, requested: &str, url: &str) {
        self.resolutions
            .entry(referrer.map(str::to_string))
            .or_default()
            .insert(requested.to_string(), url.to_string());
    }

    /// How `specifier`, imported from `referrer`, resolved.
    pub fn resolved_url(&self, specifier: &str, referrer: Option<&str>) -> Option<&str> {
        let referrer = referrer.map(|r| self.canonical(r).to_string());
        self.resolutions
            .get(&referrer)
            .and_then(|m| m.get(specifier))
            .map(String::as_str)
    }

    /// Mark a module as processed and record its imports.
    ///
    /// Returns the imports to expand, or `None` when the module is unknown or
    /// was already processed.
    pub fn start_processing<F>(&mut self, url: &str, discover: F) -> Option<Vec<ModulePair>>
    where
        F: FnOnce(&SourceFile) -> Vec<ModulePair>,
    {
        let url = self.canonical(url).to_string();
        let file = self.files.get_mut(&url)?;
        if file.processed {
            return None;
        }
        let imports = discover(&*file);
        file.processed = true;
        file.imports = imports.clone();
        Some(imports)
    }

    /// Record that a module and everything it imports is loaded.
    pub fn finish_processing(&mut self, url: &str) {
        let url = self.canonical(url).to_string();
        if !self.order.contains(&url) {
            self.order.push(url);
        }
    }

    /// Every processed module, dependencies before dependents.
    pub fn module_names(&self) -> &[String] {
        &self.order
    }

    pub fn files(&self) -> impl Iterator<Item = &SourceFile> {
        self.order.iter().filter_map(|url| self.files.get(url))
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(url: &str) -> SourceFile {
        SourceFile::new(url, url, MediaType::from_path(url), "export {};")
    }

    #[test]
    fn test_insert_is_first_writer_wins() {
        let mut graph = ModuleGraph::new();
        graph.insert("/a.ts", file("/a.ts"));
        let mut other = file("/a.ts");
        other.text = Arc::new(SourceText::new("/a.ts", "changed"));
        graph.insert("/a.ts", other);
        assert_eq!(graph.get("/a.ts").unwrap().source(), "export {};");
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn test_redirect_becomes_alias() {
        let mut graph = ModuleGraph::new();
        let url = graph.insert("https://x.dev/mod.ts", file("https://x.dev/v2/mod.ts"));
        assert_eq!(url, "https://x.dev/v2/mod.ts");
        assert!(graph.contains("https://x.dev/mod.ts"));
        assert_eq!(graph.canonical("https://x.dev/mod.ts"), "https://x.dev/v2/mod.ts");
    }

    #[test]
    fn test_lookup_by_filename() {
        let mut graph = ModuleGraph::new();
        graph.insert(
            "https://x.dev/mod.ts",
            SourceFile::new(
                "https://x.dev/mod.ts",
                "/cache/x.dev/mod.ts",
                MediaType::TypeScript,
                "",
            ),
        );
        assert!(graph.get("/cache/x.dev/mod.ts").is_some());
    }

    #[test]
    fn test_start_processing_once() {
        let mut graph = ModuleGraph::new();
        graph.insert("/a.ts", file("/a.ts"));
        let first = graph.start_processing("/a.ts", |_| vec![("./b.ts".into(), "./b.ts".into())]);
        assert_eq!(first.map(|v| v.len()), Some(1));
        assert!(graph.start_processing("/a.ts", |_| Vec::new()).is_none());
        assert!(graph.get("/a.ts").unwrap().is_processed());
        assert_eq!(graph.get("/a.ts").unwrap().imports().len(), 1);
        assert!(graph.start_processing("/missing.ts", |_| Vec::new()).is_none());
    }

    #[test]
    fn test_resolution_cache() {
        let mut graph = ModuleGraph::new();
        graph.cache_resolution(Some("/a.ts"), "./b.ts", "/b.ts");
        graph.cache_resolution(None, "a", "/a.ts");
        assert_eq!(graph.resolved_url("./b.ts", Some("/a.ts")), Some("/b.ts"));
        assert_eq!(graph.resolved_url("a", None), Some("/a.ts"));
        assert_eq!(graph.resolved_url("./b.ts", Some("/c.ts")), None);
    }

    #[test]
    fn test_finish_order_is_deduplicated() {
        let mut graph = ModuleGraph::new();
        graph.insert("/a.ts", file("/a.ts"));
        graph.insert("/b.ts", file("/b.ts"));
        graph.finish_processing("/b.ts");
        graph.finish_processing("/a.ts");
        graph.finish_processing("/b.ts");
        assert_eq!(graph.module_names(), &["/b.ts".to_string(), "/a.ts".to_string()]);
        let urls: Vec<_> = graph.files().map(|f| f.url.as_str()).collect();
        assert_eq!(urls, vec!["/b.ts", "/a.ts"]);
    }
}
