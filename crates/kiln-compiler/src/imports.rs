//! Module resolution and import graph expansion.
//!
//! Two loaders feed the same walk:
//! - [`process_imports`] resolves and fetches through the host, one batched
//!   round-trip per importer, each completed before its imports are expanded;
//! - [`process_local_imports`] works purely over caller-supplied sources.
//!
//! Modules already in the graph are never fetched or processed again, so a
//! module imported from several places is loaded exactly once.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::OnceLock;

use regex::Regex;

use kiln_types::{MediaType, ResolveError};

use crate::engine::Engine;
use crate::graph::{ModuleGraph, ModulePair, SourceFile};
use crate::host::Host;

// ══════════════════════════════════════════════════════════════════════════════
// Public API
// ══════════════════════════════════════════════════════════════════════════════

/// Resolve names to canonical URLs through the host, without fetching.
pub fn resolve_modules<H: Host + ?Sized>(
    host: &mut H,
    specifiers: &[String],
    referrer: Option<&str>,
) -> Result<Vec<String>, ResolveError> {
    tracing::debug!(?specifiers, ?referrer, "resolving modules");
    let urls = host.resolve_modules(specifiers, referrer)?;
    if urls.len() != specifiers.len() {
        return Err(ResolveError::SourceCountMismatch {
            expected: specifiers.len(),
            actual: urls.len(),
        });
    }
    Ok(urls)
}

/// Load `specifiers` and everything they import from the host.
///
/// Returns the resolved URLs of `specifiers` themselves, deduplicated, in
/// order. The full closure is available from [`ModuleGraph::module_names`].
pub fn process_imports<H, E>(
    graph: &mut ModuleGraph,
    host: &mut H,
    engine: &E,
    specifiers: &[ModulePair],
    referrer: Option<&str>,
    process_js: bool,
) -> Result<Vec<String>, ResolveError>
where
    H: Host + ?Sized,
    E: Engine + ?Sized,
{
    walk(
        graph,
        &mut HostLoader { host },
        engine,
        specifiers,
        referrer,
        process_js,
    )
}

/// Load `specifiers` and everything they import from `sources`.
///
/// Relative specifiers are resolved against their importer. A module that is
/// not in `sources` is [`ResolveError::MissingLocalSource`].
pub fn process_local_imports<E>(
    graph: &mut ModuleGraph,
    engine: &E,
    sources: &BTreeMap<String, String>,
    specifiers: &[ModulePair],
    referrer: Option<&str>,
    process_js: bool,
) -> Result<Vec<String>, ResolveError>
where
    E: Engine + ?Sized,
{
    walk(
        graph,
        &mut LocalLoader { sources },
        engine,
        specifiers,
        referrer,
        process_js,
    )
}

/// Turn root names into `(name, name)` pairs.
pub fn root_pairs<S: AsRef<str>>(names: &[S]) -> Vec<ModulePair> {
    names
        .iter()
        .map(|n| (n.as_ref().to_string(), n.as_ref().to_string()))
        .collect()
}

// ══════════════════════════════════════════════════════════════════════════════
// Loaders
// ══════════════════════════════════════════════════════════════════════════════

/// Resolves a batch of names and makes sure each resolved module is in the
/// graph. Returns one canonical URL per target.
trait ModuleLoader {
    fn load(
        &mut self,
        graph: &mut ModuleGraph,
        targets: &[String],
        referrer: Option<&str>,
    ) -> Result<Vec<String>, ResolveError>;
}

struct HostLoader<'h, H: ?Sized> {
    host: &'h mut H,
}

impl<H: Host + ?Sized> ModuleLoader for HostLoader<'_, H> {
    fn load(
        &mut self,
        graph: &mut ModuleGraph,
        targets: &[String],
        referrer: Option<&str>,
    ) -> Result<Vec<String>, ResolveError> {
        let urls = resolve_modules(&mut *self.host, targets, referrer)?;

        let mut seen = HashSet::new();
        let missing: Vec<String> = urls
            .iter()
            .filter(|url| !graph.contains(url) && seen.insert(url.as_str()))
            .cloned()
            .collect();

        if !missing.is_empty() {
            tracing::debug!(?missing, ?referrer, "fetching source files");
            let fetched = self.host.fetch_source_files(&missing, referrer)?;
            if fetched.len() != missing.len() {
                return Err(ResolveError::SourceCountMismatch {
                    expected: missing.len(),
                    actual: fetched.len(),
                });
            }
            for (url, source) in missing.iter().zip(fetched) {
                graph.insert(url, SourceFile::from_fetched(source));
            }
        }

        Ok(urls
            .iter()
            .map(|url| graph.canonical(url).to_string())
            .collect())
    }
}

struct LocalLoader<'s> {
    sources: &'s BTreeMap<String, String>,
}

impl ModuleLoader for LocalLoader<'_> {
    fn load(
        &mut self,
        graph: &mut ModuleGraph,
        targets: &[String],
        referrer: Option<&str>,
    ) -> Result<Vec<String>, ResolveError> {
        let mut names = Vec::with_capacity(targets.len());
        for target in targets {
            let name = match referrer {
                Some(referrer) => resolve_specifier(target, referrer),
                None => target.clone(),
            };
            if !graph.contains(&name) {
                let source = self
                    .sources
                    .get(&name)
                    .ok_or_else(|| ResolveError::MissingLocalSource(name.clone()))?;
                graph.insert(
                    &name,
                    SourceFile::new(&name, &name, MediaType::from_path(&name), source.as_str()),
                );
            }
            names.push(name);
        }
        Ok(names)
    }
}

fn walk<L, E>(
    graph: &mut ModuleGraph,
    loader: &mut L,
    engine: &E,
    specifiers: &[ModulePair],
    referrer: Option<&str>,
    process_js: bool,
) -> Result<Vec<String>, ResolveError>
where
    L: ModuleLoader,
    E: Engine + ?Sized,
{
    if specifiers.is_empty() {
        return Ok(Vec::new());
    }

    let targets: Vec<String> = specifiers.iter().map(|(_, t)| t.clone()).collect();
    let urls = loader.load(graph, &targets, referrer)?;

    for ((requested, _), url) in specifiers.iter().zip(&urls) {
        graph.cache_resolution(referrer, requested, url);
        if let Some(imports) =
            graph.start_processing(url, |file| discover_imports(engine, file, process_js))
        {
            walk(graph, loader, engine, &imports, Some(url.as_str()), process_js)?;
            graph.finish_processing(url);
        }
    }

    let mut seen = HashSet::new();
    Ok(urls.into_iter().filter(|u| seen.insert(u.clone())).collect())
}

// ══════════════════════════════════════════════════════════════════════════════
// Import discovery
// ══════════════════════════════════════════════════════════════════════════════

fn nocheck_pragma() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"//\s*@ts-nocheck").expect("valid regex"))
}

fn type_directive() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)@kiln-types\s*=\s*["']([^"']+)["']"#).expect("valid regex")
    })
}

fn import_export() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?:import|export)(?:\s+|\s+[\s\S]*?from\s+)?["']([^"']+)["']"#)
            .expect("valid regex")
    })
}

/// Find `// @kiln-types="types.d.ts"` comments and map the specifier of the
/// import or export that follows each one to its types file.
pub fn parse_type_directives(source: &str) -> HashMap<String, String> {
    let mut directives = HashMap::new();
    for caps in type_directive().captures_iter(source) {
        let (Some(whole), Some(types)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let rest = &source[whole.end()..];
        if let Some(specifier) = import_export().captures(rest).and_then(|c| c.get(1)) {
            directives.insert(specifier.as_str().to_string(), types.as_str().to_string());
        }
    }
    directives
}

/// Module references of one file, as `(requested, target)` pairs.
fn discover_imports<E: Engine + ?Sized>(
    engine: &E,
    file: &SourceFile,
    process_js: bool,
) -> Vec<ModulePair> {
    if nocheck_pragma().is_match(file.source()) {
        tracing::debug!(file = %file.filename, "skipping imports of @ts-nocheck file");
        return Vec::new();
    }

    let is_js = file.media_type.is_javascript();
    let pre = engine.pre_process_file(&file.filename, file.source(), is_js);
    let mut pairs = Vec::new();

    let directives = parse_type_directives(file.source());
    if !directives.is_empty() {
        for imported in pre.imported_files {
            let target = directives.get(&imported).cloned().unwrap_or_else(|| imported.clone());
            pairs.push((imported, target));
        }
    } else if process_js || !is_js {
        pairs.extend(pre.imported_files.into_iter().map(|f| (f.clone(), f)));
    }

    pairs.extend(pre.referenced_files.into_iter().map(|f| (f.clone(), f)));
    pairs.extend(
        pre.lib_reference_directives
            .into_iter()
            .filter(|lib| !engine.is_builtin_lib(&lib.to_ascii_lowercase()))
            .map(|f| (f.clone(), f)),
    );
    pairs.extend(pre.type_reference_directives.into_iter().map(|f| (f.clone(), f)));

    tracing::trace!(file = %file.filename, imports = pairs.len(), "discovered imports");
    pairs
}

// ══════════════════════════════════════════════════════════════════════════════
// Local specifier resolution
// ══════════════════════════════════════════════════════════════════════════════

/// Resolve a specifier against its importer for local compilation.
///
/// `./` and `../` are relative to the importer's directory, `/` to its
/// origin (or the file system root). Anything else is returned unchanged.
pub fn resolve_specifier(specifier: &str, referrer: &str) -> String {
    let relative = specifier.starts_with("./") || specifier.starts_with("../");
    let absolute = specifier.starts_with('/');
    if !relative && !absolute {
        return specifier.to_string();
    }

    let (origin, referrer_path) = split_origin(referrer);
    let joined = if absolute {
        specifier.to_string()
    } else {
        let dir = match referrer_path.rfind('/') {
            Some(idx) => &referrer_path[..=idx],
            None => "/",
        };
        format!("{dir}{specifier}")
    };
    format!("{origin}{}", normalize_path(&joined))
}

/// Split `https://host` off `https://host/path`.
fn split_origin(url: &str) -> (&str, &str) {
    match url.find("://") {
        Some(idx) => {
            let after = idx + 3;
            match url[after..].find('/') {
                Some(slash) => url.split_at(after + slash),
                None => (url, "/"),
            }
        }
        None => ("", url),
    }
}

/// Collapse `.` and `..` segments of an absolute path.
fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    format!("/{}", segments.join("/"))
}
