//! Kiln compiler worker: answers exactly one compile request per instance.
//!
//! ```text
//! request → Dispatcher → (configure) → Import Graph → Program → Diagnostics → Emit → Write-File → response
//! ```
//!
//! The type-checking and code-generating engine is external and plugged in
//! through [`Engine`]; everything the worker needs from the process that
//! spawned it goes through [`Host`].

pub mod bundler;
pub mod compiler_host;
pub mod diagnostics;
pub mod engine;
pub mod graph;
pub mod host;
pub mod imports;
pub mod options;
pub mod worker;
pub mod write_file;

use std::sync::Once;

pub use compiler_host::{CompilerHost, CompilerSettings, ConfigureResponse};
pub use engine::{
    ArtifactSink, EmitResult, Engine, EngineCategory, EngineDiagnostic, MessageChain, MessageText,
    ParsedConfig, PreProcessedFile, TranspileOutput,
};
pub use graph::{ModuleGraph, ModulePair, SourceFile};
pub use host::{FetchedSource, Host};
pub use worker::{CompilerWorker, Phase};
pub use write_file::{ArtifactWriter, WriteFileState, WritePolicy};

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for debug output.
///
/// Safe to call multiple times. Enable with `RUST_LOG=kiln_compiler=debug`.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        // Only initialize if RUST_LOG is set
        if std::env::var("RUST_LOG").is_ok() {
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_level(true))
                .with(EnvFilter::from_default_env())
                .init();
        }
    });
}
