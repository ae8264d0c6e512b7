//! What the engine sees of the worker while building and emitting a program.

use kiln_types::{CompilerOptions, CompilerTarget};

use crate::engine::{Engine, EngineDiagnostic};
use crate::graph::{ModuleGraph, SourceFile};
use crate::options::{merge_options, IGNORED_COMPILER_OPTIONS};

// ══════════════════════════════════════════════════════════════════════════════
// Settings
// ══════════════════════════════════════════════════════════════════════════════

/// Outcome of applying a configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigureResponse {
    /// Options the file set but the worker does not let it change.
    pub ignored_options: Option<Vec<String>>,
    pub diagnostics: Vec<EngineDiagnostic>,
}

/// Compilation settings, assembled before the module graph is loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct CompilerSettings {
    options: CompilerOptions,
    target: CompilerTarget,
    bundle: bool,
}

impl CompilerSettings {
    pub fn new(target: CompilerTarget, bundle: bool, defaults: CompilerOptions) -> Self {
        Self {
            options: defaults,
            target,
            bundle,
        }
    }

    /// Layer fragments over the current options, left to right.
    pub fn merge_options(&mut self, fragments: &[&CompilerOptions]) {
        let merged = merge_options(fragments.iter().copied());
        self.options.extend_from(&merged);
    }

    /// Parse configuration text through the engine and apply it.
    ///
    /// Options in [`IGNORED_COMPILER_OPTIONS`] are dropped unless they match
    /// the current value. On parse errors nothing is applied.
    pub fn configure<E: Engine + ?Sized>(
        &mut self,
        engine: &E,
        path: &str,
        text: &str,
    ) -> ConfigureResponse {
        tracing::debug!(path, "configuring compiler");
        let parsed = engine.parse_config(path, text);
        if !parsed.diagnostics.is_empty() {
            return ConfigureResponse {
                ignored_options: None,
                diagnostics: parsed.diagnostics,
            };
        }

        let mut options = parsed.options;
        let ignored: Vec<String> = options
            .keys()
            .filter(|key| {
                IGNORED_COMPILER_OPTIONS.contains(key) && self.options.raw(key) != options.raw(key)
            })
            .map(str::to_string)
            .collect();
        for key in &ignored {
            options.remove(key);
        }
        self.options.extend_from(&options);

        ConfigureResponse {
            ignored_options: if ignored.is_empty() { None } else { Some(ignored) },
            diagnostics: Vec::new(),
        }
    }

    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    pub fn target(&self) -> CompilerTarget {
        self.target
    }

    pub fn is_bundle(&self) -> bool {
        self.bundle
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Host
// ══════════════════════════════════════════════════════════════════════════════

/// Read-only view over the settings and the loaded modules of one request.
#[derive(Debug)]
pub struct CompilerHost<'g> {
    settings: CompilerSettings,
    graph: &'g ModuleGraph,
}

impl<'g> CompilerHost<'g> {
    pub fn new(settings: CompilerSettings, graph: &'g ModuleGraph) -> Self {
        Self { settings, graph }
    }

    /// The options the program is built with.
    pub fn compilation_settings(&self) -> &CompilerOptions {
        self.settings.options()
    }

    pub fn default_lib_file_name(&self) -> &'static str {
        self.settings.target().default_lib()
    }

    pub fn is_bundle(&self) -> bool {
        self.settings.is_bundle()
    }

    /// A loaded module, by URL or file name.
    pub fn get_source_file(&self, file_name: &str) -> Option<&'g SourceFile> {
        self.graph.get(file_name)
    }

    pub fn file_exists(&self, file_name: &str) -> bool {
        self.graph.contains(file_name)
    }

    /// File names that `module_names`, imported from `containing_file`,
    /// resolved to during loading. Unknown imports are `None`.
    pub fn resolve_module_names(
        &self,
        module_names: &[String],
        containing_file: &str,
    ) -> Vec<Option<String>> {
        module_names
            .iter()
            .map(|name| {
                let resolved = self
                    .graph
                    .resolved_url(name, Some(containing_file))
                    .or_else(|| self.graph.resolved_url(name, None))?;
                self.graph.get(resolved).map(|f| f.filename.clone())
            })
            .collect()
    }
}
