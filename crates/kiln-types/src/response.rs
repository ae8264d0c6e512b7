//! Outbound messages. One request yields exactly one of these.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::diagnostic::{Diagnostic, DiagnosticItem};

/// Response to a `compile` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileResult {
    pub emit_skipped: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<Diagnostic>,
}

/// Emitted output of a runtime compile: the bundle text when bundling,
/// otherwise the emitted files keyed by file name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuntimeEmit {
    Bundle(Option<String>),
    Files(BTreeMap<String, String>),
}

/// Response to a `runtimeCompile` request, a two-element array on the wire:
/// `[diagnosticItems | null, bundleText | emitMap]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeCompileResult(pub Option<Vec<DiagnosticItem>>, pub RuntimeEmit);

impl RuntimeCompileResult {
    pub fn diagnostics(&self) -> Option<&[DiagnosticItem]> {
        self.0.as_deref()
    }

    /// The emit map, when the request was not bundled.
    pub fn emit_map(&self) -> Option<&BTreeMap<String, String>> {
        match &self.1 {
            RuntimeEmit::Files(map) => Some(map),
            RuntimeEmit::Bundle(_) => None,
        }
    }

    /// The bundle text, when the request was bundled.
    pub fn bundle(&self) -> Option<&str> {
        match &self.1 {
            RuntimeEmit::Bundle(text) => text.as_deref(),
            RuntimeEmit::Files(_) => None,
        }
    }
}

/// Output of transpiling one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranspileOnlyResult {
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map: Option<String>,
}

/// Response to a `runtimeTranspile` request, keyed by input file name.
pub type RuntimeTranspileResult = BTreeMap<String, TranspileOnlyResult>;

/// Any worker response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CompilerResponse {
    Compile(CompileResult),
    RuntimeCompile(RuntimeCompileResult),
    RuntimeTranspile(RuntimeTranspileResult),
}
