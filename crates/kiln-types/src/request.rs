//! Inbound messages.
//!
//! ```json
//! { "type": "compile", "rootNames": ["file:///main.ts"], "bundle": false }
//! { "type": "runtimeCompile", "rootName": "/a.ts", "sources": { "/a.ts": "..." } }
//! { "type": "runtimeTranspile", "sources": { "/a.ts": "..." }, "options": "{}" }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Which global environment the compiled code targets.
///
/// Selects the default library the engine type-checks against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompilerTarget {
    #[default]
    Main,
    Worker,
    Runtime,
}

impl CompilerTarget {
    /// File name of the default library for this target.
    pub fn default_lib(self) -> &'static str {
        match self {
            Self::Main => "lib.kiln.window.d.ts",
            Self::Worker => "lib.kiln.worker.d.ts",
            Self::Runtime => "lib.kiln.runtime.d.ts",
        }
    }
}

/// Compile modules fetched from the host, caching or bundling the output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileRequest {
    pub root_names: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<String>,
    #[serde(default)]
    pub bundle: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub out_file: Option<String>,
    #[serde(default)]
    pub target: CompilerTarget,
}

/// Compile caller-driven code and hand the output back in the response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeCompileRequest {
    pub root_name: String,
    /// Local mode: every module comes from here instead of the host.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub bundle: bool,
    /// Serialized JSON object of option overrides.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<String>,
}

/// Transpile each source independently, without type-checking.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeTranspileRequest {
    pub sources: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<String>,
}

/// A request to the compiler worker. Exactly one variant is active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CompilerRequest {
    Compile(CompileRequest),
    RuntimeCompile(RuntimeCompileRequest),
    RuntimeTranspile(RuntimeTranspileRequest),
}

impl CompilerRequest {
    pub fn kind(&self) -> RequestKind {
        match self {
            Self::Compile(_) => RequestKind::Compile,
            Self::RuntimeCompile(_) => RequestKind::RuntimeCompile,
            Self::RuntimeTranspile(_) => RequestKind::RuntimeTranspile,
        }
    }
}

/// Discriminant of [`CompilerRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Compile,
    RuntimeCompile,
    RuntimeTranspile,
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compile => write!(f, "compile"),
            Self::RuntimeCompile => write!(f, "runtimeCompile"),
            Self::RuntimeTranspile => write!(f, "runtimeTranspile"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_compile_request_from_json() {
        let req: CompilerRequest = serde_json::from_str(
            r#"{"type":"compile","rootNames":["file:///main.ts"],"configPath":"/tsconfig.json","config":"{}","bundle":true,"outFile":"/out.js"}"#,
        )
        .unwrap();
        assert_eq!(
            req,
            CompilerRequest::Compile(CompileRequest {
                root_names: vec!["file:///main.ts".into()],
                config_path: Some("/tsconfig.json".into()),
                config: Some("{}".into()),
                bundle: true,
                out_file: Some("/out.js".into()),
                target: CompilerTarget::Main,
            })
        );
        assert_eq!(req.kind(), RequestKind::Compile);
    }

    #[test]
    fn test_runtime_compile_defaults() {
        let req: CompilerRequest =
            serde_json::from_str(r#"{"type":"runtimeCompile","rootName":"/a.ts"}"#).unwrap();
        let CompilerRequest::RuntimeCompile(rc) = req else {
            panic!("expected runtime compile");
        };
        assert_eq!(rc.root_name, "/a.ts");
        assert!(rc.sources.is_none());
        assert!(!rc.bundle);
        assert!(rc.options.is_none());
    }

    #[test]
    fn test_foreign_fields_are_ignored() {
        let req: CompilerRequest = serde_json::from_str(
            r#"{"type":"runtimeTranspile","sources":{"/a.ts":"let a = 1;"},"rootNames":["x"],"bundle":true}"#,
        )
        .unwrap();
        assert_eq!(req.kind(), RequestKind::RuntimeTranspile);
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let err = serde_json::from_str::<CompilerRequest>(r#"{"type":"watch","rootNames":[]}"#);
        assert!(err.is_err());
    }

    #[test]
    fn test_target_default_lib() {
        assert_eq!(CompilerTarget::Main.default_lib(), "lib.kiln.window.d.ts");
        assert_eq!(CompilerTarget::Worker.default_lib(), "lib.kiln.worker.d.ts");
        assert_eq!(CompilerTarget::Runtime.default_lib(), "lib.kiln.runtime.d.ts");
    }

    #[test]
    fn test_request_kind_display() {
        assert_eq!(RequestKind::RuntimeCompile.to_string(), "runtimeCompile");
    }
}
