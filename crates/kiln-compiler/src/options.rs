//! Compiler option defaults, merging and conversion of caller overrides.

use serde_json::{Map, Value};

use kiln_types::{CompilerOptions, WorkerError};

/// Virtual output directory the engine writes compiled modules under.
pub const OUT_DIR: &str = "$kiln$";

/// Options a configuration file is not allowed to change. They are either
/// controlled by the worker or meaningless in a single-shot compile.
pub const IGNORED_COMPILER_OPTIONS: &[&str] = &[
    "allowSyntheticDefaultImports",
    "baseUrl",
    "build",
    "composite",
    "declaration",
    "declarationDir",
    "declarationMap",
    "diagnostics",
    "downlevelIteration",
    "emitBOM",
    "emitDeclarationOnly",
    "esModuleInterop",
    "extendedDiagnostics",
    "forceConsistentCasingInFileNames",
    "help",
    "importHelpers",
    "incremental",
    "inlineSourceMap",
    "inlineSources",
    "init",
    "isolatedModules",
    "lib",
    "listEmittedFiles",
    "listFiles",
    "mapRoot",
    "maxNodeModuleJsDepth",
    "module",
    "moduleResolution",
    "newLine",
    "noEmit",
    "noEmitHelpers",
    "noEmitOnError",
    "noLib",
    "noResolve",
    "out",
    "outDir",
    "outFile",
    "paths",
    "preserveSymlinks",
    "preserveWatchOutput",
    "pretty",
    "rootDir",
    "rootDirs",
    "showConfig",
    "skipDefaultLibCheck",
    "skipLibCheck",
    "sourceMap",
    "sourceRoot",
    "stripInternal",
    "target",
    "traceResolution",
    "tsBuildInfoFile",
    "types",
    "typeRoots",
    "version",
    "watch",
];

// ══════════════════════════════════════════════════════════════════════════════
// Defaults
// ══════════════════════════════════════════════════════════════════════════════

/// Defaults for a `compile` request.
pub fn default_compile_options() -> CompilerOptions {
    CompilerOptions::new()
        .with("allowJs", false)
        .with("allowNonTsExtensions", true)
        .with("checkJs", false)
        .with("esModuleInterop", true)
        .with("jsx", "react")
        .with("module", "esnext")
        .with("outDir", OUT_DIR)
        .with("resolveJsonModule", true)
        .with("sourceMap", true)
        .with("strict", true)
        .with("removeComments", true)
        .with("target", "esnext")
}

/// Defaults layered on top of the compile defaults for a `runtimeCompile`.
pub fn default_runtime_compile_options() -> CompilerOptions {
    CompilerOptions::new().with("outDir", Value::Null)
}

/// Defaults for a `runtimeTranspile` request.
pub fn default_transpile_options() -> CompilerOptions {
    CompilerOptions::new()
        .with("esModuleInterop", true)
        .with("module", "esnext")
        .with("sourceMap", true)
        .with("removeComments", true)
        .with("target", "esnext")
}

/// Appended last when bundling, so callers cannot override it.
pub fn default_bundler_options() -> CompilerOptions {
    CompilerOptions::new()
        .with("allowJs", true)
        .with("inlineSourceMap", false)
        .with("module", "amd")
        .with("outDir", Value::Null)
        .with("outFile", format!("{OUT_DIR}/bundle.js"))
        .with("sourceMap", false)
}

// ══════════════════════════════════════════════════════════════════════════════
// Merging
// ══════════════════════════════════════════════════════════════════════════════

/// Merge option fragments left to right; later fragments win per key.
pub fn merge_options<'a, I>(fragments: I) -> CompilerOptions
where
    I: IntoIterator<Item = &'a CompilerOptions>,
{
    let mut merged = CompilerOptions::new();
    for fragment in fragments {
        merged.extend_from(fragment);
    }
    merged
}

// ══════════════════════════════════════════════════════════════════════════════
// Caller overrides
// ══════════════════════════════════════════════════════════════════════════════

/// Caller options after conversion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConvertedOptions {
    pub options: CompilerOptions,
    /// Entries of `types`, which become extra root files.
    pub files: Vec<String>,
}

/// Convert a serialized JSON object of caller options into engine options.
///
/// - `target`, `module` and `jsx` are lowercased
/// - each `lib` entry `X` becomes the library file `lib.x.d.ts`
/// - `types` entries are removed and returned as additional root files
pub fn convert_compiler_options(text: &str) -> Result<ConvertedOptions, WorkerError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| WorkerError::InvalidOptions(e.to_string()))?;
    let Value::Object(map) = value else {
        return Err(WorkerError::InvalidOptions(format!(
            "expected a JSON object, found `{text}`"
        )));
    };

    let mut converted = ConvertedOptions::default();
    for (key, value) in map {
        match key.as_str() {
            "target" | "module" | "jsx" => {
                let s = expect_str(&key, &value)?;
                converted.options.insert(key, s.to_ascii_lowercase());
            }
            "lib" => {
                let libs = expect_str_array(&key, &value)?
                    .into_iter()
                    .map(|lib| Value::String(format!("lib.{}.d.ts", lib.to_ascii_lowercase())))
                    .collect::<Vec<_>>();
                converted.options.insert(key, libs);
            }
            "types" => {
                converted.files = expect_str_array(&key, &value)?;
            }
            _ => {
                converted.options.insert(key, value);
            }
        }
    }
    Ok(converted)
}

fn expect_str<'v>(key: &str, value: &'v Value) -> Result<&'v str, WorkerError> {
    value
        .as_str()
        .ok_or_else(|| WorkerError::InvalidOptions(format!("`{key}` must be a string")))
}

fn expect_str_array(key: &str, value: &Value) -> Result<Vec<String>, WorkerError> {
    let invalid = || WorkerError::InvalidOptions(format!("`{key}` must be an array of strings"));
    value
        .as_array()
        .ok_or_else(invalid)?
        .iter()
        .map(|v| v.as_str().map(str::to_string).ok_or_else(invalid))
        .collect()
}

/// Render options as a JSON object, for logging.
pub fn options_to_json(options: &CompilerOptions) -> Value {
    Value::Object(
        options
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect::<Map<_, _>>(),
    )
}
