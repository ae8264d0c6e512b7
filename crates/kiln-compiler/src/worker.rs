//! The request dispatcher.
//!
//! A [`CompilerWorker`] handles exactly one request: every entry point takes
//! `self` by value.

use std::collections::BTreeMap;
use std::fmt;

use kiln_types::{
    CompileRequest, CompileResult, CompilerRequest, CompilerResponse, CompilerTarget,
    ErrorResponse, InvariantViolation, RequestKind, RuntimeCompileRequest, RuntimeCompileResult,
    RuntimeTranspileRequest, RuntimeTranspileResult, TranspileOnlyResult, WorkerError,
};

use crate::compiler_host::{CompilerHost, CompilerSettings};
use crate::diagnostics::{filter_diagnostics, to_wire, to_wire_items};
use crate::engine::Engine;
use crate::graph::ModuleGraph;
use crate::host::Host;
use crate::imports::{process_imports, process_local_imports, resolve_modules, root_pairs};
use crate::options::{
    convert_compiler_options, default_bundler_options, default_compile_options,
    default_runtime_compile_options, default_transpile_options, merge_options, options_to_json,
    ConvertedOptions,
};
use crate::write_file::{ArtifactWriter, WriteFileState};

/// Where a request is in its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Received,
    Configuring,
    ProgramBuilt,
    Skipped,
    Emitted,
    Responded,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Received => "received",
            Phase::Configuring => "configuring",
            Phase::ProgramBuilt => "program built",
            Phase::Skipped => "skipped",
            Phase::Emitted => "emitted",
            Phase::Responded => "responded",
        };
        f.write_str(name)
    }
}

/// One-shot compiler worker.
pub struct CompilerWorker<H: Host, E: Engine> {
    host: H,
    engine: E,
    phase: Phase,
}

impl<H: Host, E: Engine> CompilerWorker<H, E> {
    pub fn new(host: H, engine: E) -> Self {
        Self {
            host,
            engine,
            phase: Phase::Received,
        }
    }

    /// Decode a request, handle it, and encode the reply.
    ///
    /// Request-level failures, including malformed or unknown requests,
    /// become an encoded [`ErrorResponse`]. Only fatal errors are returned as
    /// `Err`.
    pub fn handle_message(self, message: &str) -> Result<String, WorkerError> {
        let outcome = serde_json::from_str::<CompilerRequest>(message)
            .map_err(WorkerError::MalformedRequest)
            .and_then(|request| self.handle(request));

        match outcome {
            Ok(response) => serde_json::to_string(&response).map_err(WorkerError::Serialize),
            Err(err) if err.is_fatal() => Err(err),
            Err(err) => {
                tracing::warn!(error = %err, "request failed");
                render_error(&err)
            }
        }
    }

    /// Handle one request.
    pub fn handle(mut self, request: CompilerRequest) -> Result<CompilerResponse, WorkerError> {
        let kind = request.kind();
        tracing::debug!(%kind, phase = %self.phase, "request received");

        let response = match request {
            CompilerRequest::Compile(req) => self.compile(req).map(CompilerResponse::Compile)?,
            CompilerRequest::RuntimeCompile(req) => {
                self.runtime_compile(req).map(CompilerResponse::RuntimeCompile)?
            }
            CompilerRequest::RuntimeTranspile(req) => {
                self.runtime_transpile(req).map(CompilerResponse::RuntimeTranspile)?
            }
        };

        self.enter(Phase::Responded);
        Ok(response)
    }

    fn enter(&mut self, phase: Phase) {
        tracing::debug!(from = %self.phase, to = %phase, "phase transition");
        self.phase = phase;
    }

    // ══════════════════════════════════════════════════════════════════════════
    // compile
    // ══════════════════════════════════════════════════════════════════════════

    fn compile(&mut self, req: CompileRequest) -> Result<CompileResult, WorkerError> {
        let CompileRequest {
            root_names,
            config_path,
            config,
            bundle,
            out_file,
            target,
        } = req;

        let bundler = bundle.then(default_bundler_options);
        let mut settings = CompilerSettings::new(target, bundle, default_compile_options());
        if let Some(bundler) = &bundler {
            settings.merge_options(&[bundler]);
        }

        let config = config_path
            .as_deref()
            .zip(config.as_deref())
            .filter(|(_, text)| !text.is_empty());
        if let Some((path, text)) = config {
            self.enter(Phase::Configuring);
            let configured = settings.configure(&self.engine, path, text);
            if let Some(ignored) = &configured.ignored_options {
                tracing::warn!(
                    "Unsupported compiler options in \"{path}\"\n  The following options were ignored:\n    {}",
                    ignored.join(", ")
                );
            }
            let diagnostics = filter_diagnostics(configured.diagnostics);
            if !diagnostics.is_empty() {
                self.enter(Phase::Skipped);
                return Ok(CompileResult {
                    emit_skipped: true,
                    diagnostics: to_wire(diagnostics),
                });
            }
        }

        // bundling constraints win over the configuration file
        if let Some(bundler) = &bundler {
            settings.merge_options(&[bundler]);
        }

        let check_js = settings.options().get_bool("checkJs");
        tracing::debug!(options = %options_to_json(settings.options()), "compile options");

        let mut graph = ModuleGraph::new();
        let roots = process_imports(
            &mut graph,
            &mut self.host,
            &self.engine,
            &root_pairs(&root_names),
            None,
            bundle || check_js,
        )?;
        tracing::debug!(?roots, modules = graph.len(), "module graph loaded");

        let mut state = WriteFileState::new(RequestKind::Compile, bundle, roots)
            .with_out_file(out_file)
            .with_check_js(check_js);

        let host = CompilerHost::new(settings, &graph);
        let program = self
            .engine
            .create_program(graph.module_names(), &host);
        self.enter(Phase::ProgramBuilt);

        let diagnostics = filter_diagnostics(self.engine.pre_emit_diagnostics(&program));
        if !diagnostics.is_empty() {
            self.enter(Phase::Skipped);
            return Ok(CompileResult {
                emit_skipped: true,
                diagnostics: to_wire(diagnostics),
            });
        }

        if bundle {
            let root = state.bundle_root()?.to_string();
            state.root_exports = self.engine.root_exports(&program, &root);
            tracing::warn!("Bundling \"{root}\"");
        }

        let emitted = {
            let mut writer = ArtifactWriter::new(&mut state, &graph).bind_host(&mut self.host);
            self.engine.emit(&program, &host, &mut writer)?
        };
        self.enter(if emitted.emit_skipped {
            Phase::Skipped
        } else {
            Phase::Emitted
        });

        Ok(CompileResult {
            emit_skipped: emitted.emit_skipped,
            diagnostics: to_wire(emitted.diagnostics),
        })
    }

    // ══════════════════════════════════════════════════════════════════════════
    // runtimeCompile
    // ══════════════════════════════════════════════════════════════════════════

    fn runtime_compile(
        &mut self,
        req: RuntimeCompileRequest,
    ) -> Result<RuntimeCompileResult, WorkerError> {
        let RuntimeCompileRequest {
            root_name,
            sources,
            bundle,
            options,
        } = req;

        let ConvertedOptions { options, files } = match options.as_deref() {
            Some(text) => convert_compiler_options(text)?,
            None => ConvertedOptions::default(),
        };

        let mut graph = ModuleGraph::new();
        let roots = match &sources {
            Some(sources) => process_local_imports(
                &mut graph,
                &self.engine,
                sources,
                &root_pairs(&[root_name.as_str()]),
                None,
                bundle,
            )?,
            None => {
                let resolved = resolve_modules(&mut self.host, &[root_name.clone()], None)?;
                process_imports(
                    &mut graph,
                    &mut self.host,
                    &self.engine,
                    &root_pairs(&resolved),
                    None,
                    bundle,
                )?
            }
        };
        if !files.is_empty() {
            let types = process_imports(
                &mut graph,
                &mut self.host,
                &self.engine,
                &root_pairs(&files),
                None,
                bundle,
            )?;
            tracing::debug!(?types, "type files loaded");
        }

        let mut settings =
            CompilerSettings::new(CompilerTarget::Runtime, bundle, default_compile_options());
        let runtime_defaults = default_runtime_compile_options();
        let bundler = default_bundler_options();
        let mut fragments = vec![&runtime_defaults, &options];
        if bundle {
            fragments.push(&bundler);
        }
        settings.merge_options(&fragments);
        tracing::debug!(options = %options_to_json(settings.options()), "runtime compile options");

        let mut state =
            WriteFileState::new(RequestKind::RuntimeCompile, bundle, roots).with_sources(sources);

        let host = CompilerHost::new(settings, &graph);
        let program = self
            .engine
            .create_program(graph.module_names(), &host);
        self.enter(Phase::ProgramBuilt);

        if bundle {
            let root = state.bundle_root()?.to_string();
            state.root_exports = self.engine.root_exports(&program, &root);
        }

        let diagnostics = filter_diagnostics(self.engine.pre_emit_diagnostics(&program));

        let emitted = {
            let mut writer = ArtifactWriter::new(&mut state, &graph);
            self.engine.emit(&program, &host, &mut writer)?
        };
        if emitted.emit_skipped {
            return Err(InvariantViolation::RuntimeEmitSkipped { root: root_name }.into());
        }
        self.enter(Phase::Emitted);

        Ok(RuntimeCompileResult(
            to_wire_items(diagnostics),
            state.into_runtime_emit(),
        ))
    }

    // ══════════════════════════════════════════════════════════════════════════
    // runtimeTranspile
    // ══════════════════════════════════════════════════════════════════════════

    fn runtime_transpile(
        &mut self,
        req: RuntimeTranspileRequest,
    ) -> Result<RuntimeTranspileResult, WorkerError> {
        let overrides = match req.options.as_deref() {
            Some(text) => convert_compiler_options(text)?.options,
            None => Default::default(),
        };
        let options = merge_options([&default_transpile_options(), &overrides]);
        tracing::debug!(options = %options_to_json(&options), files = req.sources.len(), "transpiling");

        let mut result = BTreeMap::new();
        for (file_name, source) in &req.sources {
            let output = self.engine.transpile_module(file_name, source, &options);
            result.insert(
                file_name.clone(),
                TranspileOnlyResult {
                    source: output.output_text,
                    map: output.source_map_text,
                },
            );
        }
        self.enter(Phase::Emitted);
        Ok(result)
    }
}

/// Encode a non-fatal failure as an [`ErrorResponse`].
pub fn render_error(err: &WorkerError) -> Result<String, WorkerError> {
    serde_json::to_string(&ErrorResponse::from(err)).map_err(WorkerError::Serialize)
}
