//! Shared types for the Kiln compiler worker.
//!
//! This crate defines the request and response messages exchanged with the
//! host, the wire form of diagnostics, compiler option sets, source text, and
//! the error types used by every stage of the worker.

mod diagnostic;
mod error;
mod options;
mod request;
mod response;
mod source;

pub use diagnostic::{Diagnostic, DiagnosticCategory, DiagnosticItem, DiagnosticMessageChain};
pub use error::{
    ErrorKind, ErrorResponse, HostError, InvariantViolation, ResolveError, WorkerError,
};
pub use options::CompilerOptions;
pub use request::{
    CompileRequest, CompilerRequest, CompilerTarget, RequestKind, RuntimeCompileRequest,
    RuntimeTranspileRequest,
};
pub use response::{
    CompileResult, CompilerResponse, RuntimeCompileResult, RuntimeEmit, RuntimeTranspileResult,
    TranspileOnlyResult,
};
pub use source::{MediaType, SourceText};

/// Result type used throughout the worker.
pub type Result<T> = std::result::Result<T, WorkerError>;
