//! Introspector error types.

use thiserror::Error;

/// Errors that can occur while introspecting a WASM binary.
#[derive(Debug, Error)]
pub enum WasmError {
    /// The input is not valid standard-alphabet base64.
    #[error("invalid base64 input: {0}")]
    Decode(#[from] base64::DecodeError),

    /// The decoded bytes are not a valid WebAssembly module.
    #[error("WASM compilation failed: {0}")]
    Compile(#[from] wasmparser::BinaryReaderError),

    /// The response could not be encoded.
    #[error("failed to serialize response: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Introspector result type alias.
pub type WasmResult<T> = Result<T, WasmError>;
