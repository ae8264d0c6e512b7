//! Error types shared by every stage of the worker.
//!
//! Engine diagnostics are *not* errors: they are data carried in a normal
//! response. The types here describe conditions that stop a request from
//! producing that response at all.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A failed round-trip to the privileged host.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    /// The host reports that a module does not exist.
    #[error("cannot resolve module \"{specifier}\"{}", referrer_suffix(.referrer))]
    NotFound {
        specifier: String,
        referrer: Option<String>,
    },

    /// Any other host operation failure.
    #[error("host operation `{op}` failed: {message}")]
    Op { op: String, message: String },
}

fn referrer_suffix(referrer: &Option<String>) -> String {
    match referrer {
        Some(r) => format!(" from \"{r}\""),
        None => String::new(),
    }
}

/// Module resolution failures raised by the import graph builder.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// A module could not be found by the host.
    #[error("module not found: \"{specifier}\"")]
    ModuleNotFound { specifier: String },

    /// A local compilation referenced a module that is not in its sources.
    #[error("missing module in sources: \"{0}\"")]
    MissingLocalSource(String),

    /// The host answered a batch with the wrong number of entries.
    #[error("host returned {actual} source files for {expected} specifiers")]
    SourceCountMismatch { expected: usize, actual: usize },

    /// A host round-trip failed for a reason other than a missing module.
    #[error(transparent)]
    Host(HostError),
}

impl From<HostError> for ResolveError {
    fn from(err: HostError) -> Self {
        match err {
            HostError::NotFound { specifier, .. } => Self::ModuleNotFound { specifier },
            other => Self::Host(other),
        }
    }
}

/// A programming invariant was broken. These abort the request: the host
/// must treat them as abnormal termination, not as a response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    /// Bundling supports exactly one resolved root module.
    #[error("bundling requires exactly one root module, found {count}")]
    BundleRootCount { count: usize },

    /// A runtime compile must always emit.
    #[error("unexpected skip of the emit for \"{root}\"")]
    RuntimeEmitSkipped { root: String },

    /// An emitted artifact must come from exactly one source file.
    #[error("artifact \"{file_name}\" was emitted from {count} source files, expected 1")]
    UnexpectedSourceFileCount { file_name: String, count: usize },

    /// The engine asked to persist a file type the host cannot cache.
    #[error("trying to cache unhandled file type \"{file_name}\"")]
    UnsupportedArtifact { file_name: String },

    /// An artifact that needs the host arrived before the host was bound.
    #[error("artifact \"{file_name}\" needs the host, but none is bound")]
    HostNotBound { file_name: String },

    /// A request kind that never emits received an artifact.
    #[error("request kind `{kind}` does not accept emitted artifacts (got \"{file_name}\")")]
    UnexpectedArtifact { kind: String, file_name: String },
}

/// Top-level worker error.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("invariant violated: {0}")]
    Invariant(#[from] InvariantViolation),

    #[error("module resolution failed: {0}")]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Host(#[from] HostError),

    /// Caller-supplied compiler options could not be understood.
    #[error("invalid compiler options: {0}")]
    InvalidOptions(String),

    /// The inbound message is not a request this worker understands.
    #[error("malformed request: {0}")]
    MalformedRequest(#[source] serde_json::Error),

    /// The response could not be encoded.
    #[error("failed to serialize response: {0}")]
    Serialize(#[source] serde_json::Error),
}

impl WorkerError {
    /// Whether this error is a broken invariant rather than a bad request or
    /// an unreachable module.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Invariant(_))
    }

    /// Short machine-readable name for the wire.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Invariant(_) => ErrorKind::Invariant,
            Self::Resolve(_) => ErrorKind::Resolve,
            Self::Host(_) => ErrorKind::Host,
            Self::InvalidOptions(_) => ErrorKind::InvalidOptions,
            Self::MalformedRequest(_) => ErrorKind::MalformedRequest,
            Self::Serialize(_) => ErrorKind::Serialize,
        }
    }
}

/// Error kind as reported in an [`ErrorResponse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    Invariant,
    Resolve,
    Host,
    InvalidOptions,
    MalformedRequest,
    Serialize,
}

/// Explicit reply for a request that cannot be answered normally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&WorkerError> for ErrorResponse {
    fn from(err: &WorkerError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_not_found_becomes_module_not_found() {
        let err: ResolveError = HostError::NotFound {
            specifier: "./missing.ts".into(),
            referrer: Some("file:///main.ts".into()),
        }
        .into();
        assert_eq!(
            err,
            ResolveError::ModuleNotFound {
                specifier: "./missing.ts".into()
            }
        );
    }

    #[test]
    fn test_other_host_errors_stay_wrapped() {
        let err: ResolveError = HostError::Op {
            op: "fetch".into(),
            message: "permission denied".into(),
        }
        .into();
        assert!(matches!(err, ResolveError::Host(HostError::Op { .. })));
    }

    #[test]
    fn test_host_error_display() {
        let err = HostError::NotFound {
            specifier: "./a.ts".into(),
            referrer: Some("/main.ts".into()),
        };
        assert_eq!(
            err.to_string(),
            "cannot resolve module \"./a.ts\" from \"/main.ts\""
        );
        let err = HostError::NotFound {
            specifier: "./a.ts".into(),
            referrer: None,
        };
        assert_eq!(err.to_string(), "cannot resolve module \"./a.ts\"");
    }

    #[test]
    fn test_only_invariants_are_fatal() {
        let fatal: WorkerError = InvariantViolation::BundleRootCount { count: 2 }.into();
        assert!(fatal.is_fatal());
        assert_eq!(
            fatal.to_string(),
            "invariant violated: bundling requires exactly one root module, found 2"
        );

        let soft: WorkerError = ResolveError::MissingLocalSource("/b.ts".into()).into();
        assert!(!soft.is_fatal());
        assert_eq!(soft.kind(), ErrorKind::Resolve);
    }

    #[test]
    fn test_error_response_json() {
        let err = WorkerError::InvalidOptions("expected a JSON object".into());
        let resp = ErrorResponse::from(&err);
        let json = serde_json::to_string(&resp).unwrap();
        assert_eq!(
            json,
            r#"{"kind":"invalidOptions","message":"invalid compiler options: expected a JSON object"}"#
        );
    }
}
