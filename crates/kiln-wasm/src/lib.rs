//! Kiln WASM introspector.
//!
//! Answers a single request carrying a base64-encoded WebAssembly binary with
//! the distinct module names it imports from and the names it exports:
//!
//! ```json
//! { "importList": ["env"], "exportList": ["main", "memory"] }
//! ```
//!
//! An input that does not decode or does not validate is an error; there is
//! no partial answer.

mod error;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use wasmparser::{Parser, Payload};

pub use error::{WasmError, WasmResult};

/// Imports and exports of one module, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WasmModuleInfo {
    /// Distinct import module names.
    pub import_list: Vec<String>,
    /// Distinct export names.
    pub export_list: Vec<String>,
}

/// Decode, validate and list the imports and exports of a module.
pub fn introspect(base64: &str) -> WasmResult<WasmModuleInfo> {
    let bytes = STANDARD.decode(base64.trim())?;
    wasmparser::validate(&bytes)?;
    tracing::debug!(bytes = bytes.len(), "validated WASM module");

    let mut info = WasmModuleInfo::default();
    for payload in Parser::new(0).parse_all(&bytes) {
        match payload? {
            Payload::ImportSection(reader) => {
                for import in reader {
                    push_unique(&mut info.import_list, import?.module);
                }
            }
            Payload::ExportSection(reader) => {
                for export in reader {
                    push_unique(&mut info.export_list, export?.name);
                }
            }
            _ => {}
        }
    }
    tracing::debug!(
        imports = info.import_list.len(),
        exports = info.export_list.len(),
        "introspected WASM module"
    );
    Ok(info)
}

/// Introspect a module and encode the answer as JSON.
pub fn handle_message(base64: &str) -> WasmResult<String> {
    let info = introspect(base64)?;
    Ok(serde_json::to_string(&info)?)
}

fn push_unique(list: &mut Vec<String>, name: &str) {
    if !list.iter().any(|n| n == name) {
        list.push(name.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `(module)` with no sections.
    const EMPTY_MODULE: &[u8] = &[0x00, 0x61, 0x73, 0x6d, 0x01, 0x00, 0x00, 0x00];

    #[test]
    fn test_empty_module() {
        let info = introspect(&STANDARD.encode(EMPTY_MODULE)).unwrap();
        assert_eq!(info, WasmModuleInfo::default());
    }

    #[test]
    fn test_push_unique_keeps_first_seen_order() {
        let mut list = Vec::new();
        for name in ["b", "a", "b", "c", "a"] {
            push_unique(&mut list, name);
        }
        assert_eq!(list, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_serialized_field_names() {
        let info = WasmModuleInfo {
            import_list: vec!["env".into()],
            export_list: vec!["main".into()],
        };
        assert_eq!(
            serde_json::to_string(&info).unwrap(),
            r#"{"importList":["env"],"exportList":["main"]}"#
        );
    }

    #[test]
    fn test_bad_magic_is_a_compile_error() {
        let err = introspect(&STANDARD.encode(b"not wasm")).unwrap_err();
        assert!(matches!(err, WasmError::Compile(_)));
    }
}
