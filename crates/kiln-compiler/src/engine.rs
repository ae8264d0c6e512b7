//! The type-checking/emission engine seam.
//!
//! The worker never analyses code itself. Everything semantic goes through
//! [`Engine`]; everything the engine wants to persist comes back through an
//! [`ArtifactSink`].

use std::sync::Arc;

use kiln_types::{CompilerOptions, SourceText, WorkerError};

use crate::compiler_host::CompilerHost;

// ══════════════════════════════════════════════════════════════════════════════
// Engine diagnostics
// ══════════════════════════════════════════════════════════════════════════════

/// Category as the engine reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineCategory {
    Warning,
    Error,
    Suggestion,
    Message,
}

/// A node in a chained diagnostic message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageChain {
    pub text: String,
    pub category: EngineCategory,
    pub code: u32,
    pub next: Vec<MessageChain>,
}

/// Diagnostic message: plain text or a chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageText {
    Text(String),
    Chain(MessageChain),
}

impl From<&str> for MessageText {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for MessageText {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

/// A raw diagnostic as produced by the engine.
///
/// `start` and `length` are byte offsets into `file`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineDiagnostic {
    pub code: u32,
    pub category: EngineCategory,
    pub message: MessageText,
    pub file: Option<Arc<SourceText>>,
    pub start: Option<u32>,
    pub length: Option<u32>,
    pub related_information: Vec<EngineDiagnostic>,
}

impl EngineDiagnostic {
    /// An error diagnostic with no location.
    pub fn error(code: u32, message: impl Into<MessageText>) -> Self {
        Self {
            code,
            category: EngineCategory::Error,
            message: message.into(),
            file: None,
            start: None,
            length: None,
            related_information: Vec::new(),
        }
    }

    /// Attach a location.
    pub fn at(mut self, file: Arc<SourceText>, start: u32, length: u32) -> Self {
        self.file = Some(file);
        self.start = Some(start);
        self.length = Some(length);
        self
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Engine inputs and outputs
// ══════════════════════════════════════════════════════════════════════════════

/// Module references found by scanning one file without type-checking it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreProcessedFile {
    /// `import`/`export ... from` specifiers, in source order.
    pub imported_files: Vec<String>,
    /// `/// <reference path="..." />`
    pub referenced_files: Vec<String>,
    /// `/// <reference lib="..." />`
    pub lib_reference_directives: Vec<String>,
    /// `/// <reference types="..." />`
    pub type_reference_directives: Vec<String>,
}

/// Result of parsing configuration text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedConfig {
    pub options: CompilerOptions,
    pub diagnostics: Vec<EngineDiagnostic>,
}

/// Result of emitting a program.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmitResult {
    pub emit_skipped: bool,
    pub diagnostics: Vec<EngineDiagnostic>,
}

/// Result of transpiling a single file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranspileOutput {
    pub output_text: String,
    pub source_map_text: Option<String>,
}

// ══════════════════════════════════════════════════════════════════════════════
// Traits
// ══════════════════════════════════════════════════════════════════════════════

/// Receives every artifact the engine wants to persist during emit.
pub trait ArtifactSink {
    /// `source_files` names the modules the artifact was produced from.
    fn write_file(
        &mut self,
        file_name: &str,
        data: &str,
        write_byte_order_mark: bool,
        source_files: &[String],
    ) -> Result<(), WorkerError>;
}

/// The external type-checking/emission engine.
pub trait Engine {
    /// A built program, owned by the current request.
    type Program;

    /// Scan a file for module references.
    ///
    /// `detect_js_imports` asks the engine to also recognise JavaScript
    /// import forms (`require`, dynamic `import()`).
    fn pre_process_file(
        &self,
        file_name: &str,
        source: &str,
        detect_js_imports: bool,
    ) -> PreProcessedFile;

    /// Whether `name` is a built-in library (`"dom"`, `"esnext"`), which is
    /// never fetched from the host.
    fn is_builtin_lib(&self, _name: &str) -> bool {
        false
    }

    /// Parse configuration file text into compiler options.
    fn parse_config(&self, path: &str, text: &str) -> ParsedConfig;

    /// Build a program over `root_names`, reading modules through `host`.
    fn create_program(&mut self, root_names: &[String], host: &CompilerHost<'_>) -> Self::Program;

    /// Syntactic, global and semantic diagnostics of the program.
    fn pre_emit_diagnostics(&self, program: &Self::Program) -> Vec<EngineDiagnostic>;

    /// Names of the values exported by a root module.
    fn root_exports(&self, program: &Self::Program, root_name: &str) -> Vec<String>;

    /// Emit the program, handing every artifact to `sink`.
    ///
    /// Errors from the sink must be propagated unchanged.
    fn emit(
        &mut self,
        program: &Self::Program,
        host: &CompilerHost<'_>,
        sink: &mut dyn ArtifactSink,
    ) -> Result<EmitResult, WorkerError>;

    /// Transpile a single file without type information.
    fn transpile_module(
        &mut self,
        file_name: &str,
        source: &str,
        options: &CompilerOptions,
    ) -> TranspileOutput;
}
