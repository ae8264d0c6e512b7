//! Routing of emitted artifacts.
//!
//! Where an artifact goes depends only on the request kind and the bundle
//! flag; [`WritePolicy`] makes that choice once, and [`ArtifactWriter`]
//! applies it to every `write_file` call the engine makes.

use std::collections::BTreeMap;

use kiln_types::{InvariantViolation, MediaType, RequestKind, RuntimeEmit, WorkerError};

use crate::bundler::build_bundle;
use crate::engine::ArtifactSink;
use crate::graph::ModuleGraph;
use crate::host::Host;

/// What to do with an emitted artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePolicy {
    /// `compile`: hand each artifact to the host cache.
    CacheToHost,
    /// `compile` + bundle: build the bundle, then write it to `outFile` or
    /// print it.
    WriteBundle,
    /// `runtimeCompile`: collect artifacts by file name.
    EmitMap,
    /// `runtimeCompile` + bundle: collect the bundle text.
    EmitBundle,
    /// `runtimeTranspile` never builds a program, so never emits.
    Rejected,
}

impl WritePolicy {
    pub fn for_request(kind: RequestKind, bundle: bool) -> Self {
        match (kind, bundle) {
            (RequestKind::Compile, false) => Self::CacheToHost,
            (RequestKind::Compile, true) => Self::WriteBundle,
            (RequestKind::RuntimeCompile, false) => Self::EmitMap,
            (RequestKind::RuntimeCompile, true) => Self::EmitBundle,
            (RequestKind::RuntimeTranspile, _) => Self::Rejected,
        }
    }
}

/// Request-scoped record of where artifacts go and what was collected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteFileState {
    pub kind: RequestKind,
    pub bundle: bool,
    pub out_file: Option<String>,
    /// Resolved root modules of the request.
    pub root_names: Vec<String>,
    pub sources: Option<BTreeMap<String, String>>,
    /// Values exported by the bundle root, set before emit.
    pub root_exports: Vec<String>,
    /// Whether JavaScript modules are cached too.
    pub check_js: bool,
    emit_map: Option<BTreeMap<String, String>>,
    emit_bundle: Option<String>,
}

impl WriteFileState {
    pub fn new(kind: RequestKind, bundle: bool, root_names: Vec<String>) -> Self {
        let emit_map = match WritePolicy::for_request(kind, bundle) {
            WritePolicy::EmitMap => Some(BTreeMap::new()),
            _ => None,
        };
        Self {
            kind,
            bundle,
            out_file: None,
            root_names,
            sources: None,
            root_exports: Vec::new(),
            check_js: false,
            emit_map,
            emit_bundle: None,
        }
    }

    pub fn with_out_file(mut self, out_file: Option<String>) -> Self {
        self.out_file = out_file;
        self
    }

    pub fn with_sources(mut self, sources: Option<BTreeMap<String, String>>) -> Self {
        self.sources = sources;
        self
    }

    pub fn with_check_js(mut self, check_js: bool) -> Self {
        self.check_js = check_js;
        self
    }

    pub fn policy(&self) -> WritePolicy {
        WritePolicy::for_request(self.kind, self.bundle)
    }

    /// The single bundle root.
    pub fn bundle_root(&self) -> Result<&str, InvariantViolation> {
        match self.root_names.as_slice() {
            [root] => Ok(root),
            roots => Err(InvariantViolation::BundleRootCount { count: roots.len() }),
        }
    }

    pub fn emit_map(&self) -> Option<&BTreeMap<String, String>> {
        self.emit_map.as_ref()
    }

    pub fn emit_bundle(&self) -> Option<&str> {
        self.emit_bundle.as_deref()
    }

    /// The runtime compile output: the bundle when bundling, else the map.
    pub fn into_runtime_emit(self) -> RuntimeEmit {
        if self.bundle {
            RuntimeEmit::Bundle(self.emit_bundle)
        } else {
            RuntimeEmit::Files(self.emit_map.unwrap_or_default())
        }
    }
}

/// The `write_file` operation handed to the engine for one request.
pub struct ArtifactWriter<'a> {
    state: &'a mut WriteFileState,
    host: Option<&'a mut dyn Host>,
    graph: &'a ModuleGraph,
}

impl<'a> ArtifactWriter<'a> {
    pub fn new(state: &'a mut WriteFileState, graph: &'a ModuleGraph) -> Self {
        Self {
            state,
            host: None,
            graph,
        }
    }

    /// Bind the privileged host, needed by the `compile` policies.
    pub fn bind_host(mut self, host: &'a mut dyn Host) -> Self {
        self.host = Some(host);
        self
    }

    /// Route one artifact according to the state's policy.
    pub fn record_artifact(
        &mut self,
        file_name: &str,
        data: &str,
        source_files: &[String],
    ) -> Result<(), WorkerError> {
        let policy = self.state.policy();
        tracing::debug!(file_name, ?policy, bytes = data.len(), "recording artifact");
        match policy {
            WritePolicy::CacheToHost => self.cache_to_host(file_name, data, source_files),
            WritePolicy::WriteBundle => {
                if file_name.ends_with(".map") {
                    tracing::debug!(file_name, "skipping bundle source map");
                    return Ok(());
                }
                let bundle = self.bundle_text(data, source_files)?;
                let out_file = self.state.out_file.clone();
                let host = self.host(file_name)?;
                match out_file {
                    Some(out_file) => {
                        tracing::warn!("Emitting bundle to \"{out_file}\"");
                        host.write_file(&out_file, bundle.as_bytes())?;
                        tracing::warn!("{} emitted.", human_file_size(bundle.len()));
                    }
                    None => host.print(&bundle),
                }
                Ok(())
            }
            WritePolicy::EmitMap => {
                self.state
                    .emit_map
                    .get_or_insert_with(BTreeMap::new)
                    .insert(file_name.to_string(), data.to_string());
                Ok(())
            }
            WritePolicy::EmitBundle => {
                if file_name.ends_with(".map") {
                    tracing::debug!(file_name, "skipping bundle source map");
                    return Ok(());
                }
                let bundle = self.bundle_text(data, source_files)?;
                self.state.emit_bundle = Some(bundle);
                Ok(())
            }
            WritePolicy::Rejected => Err(InvariantViolation::UnexpectedArtifact {
                kind: self.state.kind.to_string(),
                file_name: file_name.to_string(),
            }
            .into()),
        }
    }

    fn host(&mut self, file_name: &str) -> Result<&mut dyn Host, InvariantViolation> {
        match self.host.as_mut() {
            Some(host) => Ok(&mut **host),
            None => Err(InvariantViolation::HostNotBound {
                file_name: file_name.to_string(),
            }),
        }
    }

    fn bundle_text(&self, data: &str, source_files: &[String]) -> Result<String, InvariantViolation> {
        let root = self.state.bundle_root()?;
        Ok(build_bundle(root, data, source_files, &self.state.root_exports))
    }

    fn cache_to_host(
        &mut self,
        file_name: &str,
        data: &str,
        source_files: &[String],
    ) -> Result<(), WorkerError> {
        let [module_id] = source_files else {
            return Err(InvariantViolation::UnexpectedSourceFileCount {
                file_name: file_name.to_string(),
                count: source_files.len(),
            }
            .into());
        };

        if let Some(file) = self.graph.get(module_id) {
            // JSON is loaded by the host directly; JavaScript is only cached
            // when it was type-checked.
            let skip = match file.media_type {
                MediaType::Json => true,
                MediaType::JavaScript => !self.state.check_js,
                _ => false,
            };
            if skip {
                tracing::trace!(file_name, module_id, "not caching");
                return Ok(());
            }
        }

        let extension = if file_name.ends_with(".map") {
            ".map"
        } else if file_name.ends_with(".js") || file_name.ends_with(".json") {
            ".js"
        } else {
            return Err(InvariantViolation::UnsupportedArtifact {
                file_name: file_name.to_string(),
            }
            .into());
        };

        self.host(file_name)?.cache(extension, module_id, data)?;
        Ok(())
    }
}

impl ArtifactSink for ArtifactWriter<'_> {
    fn write_file(
        &mut self,
        file_name: &str,
        data: &str,
        _write_byte_order_mark: bool,
        source_files: &[String],
    ) -> Result<(), WorkerError> {
        self.record_artifact(file_name, data, source_files)
    }
}

fn human_file_size(bytes: usize) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes}{}", UNITS[0])
    } else {
        format!("{size:.2}{}", UNITS[unit])
    }
}
