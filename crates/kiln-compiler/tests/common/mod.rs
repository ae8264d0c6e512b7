//! Scripted engine and in-memory host shared by the integration tests.
//!
//! The fake engine understands just enough of its input to drive the worker:
//! - `import`/`export ... from "x"` lines and `/// <reference path|types|lib="x" />`
//!   comments are module references; `dom` and `esnext` are built-in libs
//! - a `// @error NNNN` comment produces a pre-emit diagnostic with that code
//! - `export const NAME` and `export default` lines are the module's exports
//! - configuration text is JSON; `{"compilerOptions": {...}}` is applied and
//!   `"diagnosticCodes": [NNNN]` reports configuration diagnostics

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::sync::Arc;

use kiln_compiler::bundler::bundle_module_name;
use kiln_compiler::imports::resolve_specifier;
use kiln_compiler::{
    ArtifactSink, CompilerHost, EmitResult, Engine, EngineDiagnostic, FetchedSource, Host,
    ParsedConfig, PreProcessedFile, TranspileOutput,
};
use kiln_types::{CompilerOptions, HostError, MediaType, SourceText, WorkerError};

// ══════════════════════════════════════════════════════════════════════════════
// Engine
// ══════════════════════════════════════════════════════════════════════════════

/// What the fake engine was asked to do.
#[derive(Debug, Default)]
pub struct EngineLog {
    pub programs: Vec<Vec<String>>,
    /// Options and bundle flag each program was built with.
    pub settings: Vec<(CompilerOptions, bool)>,
    pub emits: usize,
    pub transpiled: Vec<String>,
}

#[derive(Debug, Default, Clone)]
pub struct FakeEngine {
    pub log: Rc<RefCell<EngineLog>>,
}

pub struct FakeProgram {
    files: Vec<(String, String, Arc<SourceText>)>,
    options: CompilerOptions,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }
}

fn quoted(line: &str) -> Option<String> {
    let end = line.rfind(['"', '\''])?;
    let start = line[..end].rfind(['"', '\''])?;
    Some(line[start + 1..end].to_string())
}

fn strip_extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(dot) if !name[dot..].contains('/') => &name[..dot],
        _ => name,
    }
}

impl Engine for FakeEngine {
    type Program = FakeProgram;

    fn pre_process_file(&self, _: &str, source: &str, _: bool) -> PreProcessedFile {
        let mut pre = PreProcessedFile::default();
        for line in source.lines().map(str::trim) {
            if line.starts_with("/// <reference path=") {
                pre.referenced_files.extend(quoted(line));
            } else if line.starts_with("/// <reference types=") {
                pre.type_reference_directives.extend(quoted(line));
            } else if line.starts_with("/// <reference lib=") {
                pre.lib_reference_directives.extend(quoted(line));
            } else if (line.starts_with("import") || line.starts_with("export"))
                && (line.contains(" from ") || line.starts_with("import \"") || line.starts_with("import '"))
            {
                pre.imported_files.extend(quoted(line));
            }
        }
        pre
    }

    fn is_builtin_lib(&self, name: &str) -> bool {
        matches!(name, "dom" | "esnext")
    }

    fn parse_config(&self, _: &str, text: &str) -> ParsedConfig {
        match serde_json::from_str::<serde_json::Value>(text) {
            Ok(value) => {
                let options = value
                    .get("compilerOptions")
                    .cloned()
                    .and_then(|v| serde_json::from_value(v).ok())
                    .unwrap_or_default();
                let diagnostics = value
                    .get("diagnosticCodes")
                    .and_then(|v| v.as_array())
                    .into_iter()
                    .flatten()
                    .filter_map(|code| code.as_u64())
                    .map(|code| EngineDiagnostic::error(code as u32, format!("config error {code}")))
                    .collect();
                ParsedConfig {
                    options,
                    diagnostics,
                }
            }
            Err(e) => ParsedConfig {
                options: CompilerOptions::new(),
                diagnostics: vec![EngineDiagnostic::error(1005, e.to_string())],
            },
        }
    }

    fn create_program(&mut self, root_names: &[String], host: &CompilerHost<'_>) -> FakeProgram {
        let mut log = self.log.borrow_mut();
        log.programs.push(root_names.to_vec());
        log.settings
            .push((host.compilation_settings().clone(), host.is_bundle()));
        let files = root_names
            .iter()
            .filter_map(|name| host.get_source_file(name))
            .map(|f| (f.url.clone(), f.filename.clone(), Arc::clone(&f.text)))
            .collect();
        FakeProgram {
            files,
            options: host.compilation_settings().clone(),
        }
    }

    fn pre_emit_diagnostics(&self, program: &FakeProgram) -> Vec<EngineDiagnostic> {
        let mut diagnostics = Vec::new();
        for (_, _, text) in &program.files {
            let mut offset = 0;
            while let Some(idx) = text.text[offset..].find("// @error ") {
                let start = offset + idx;
                let code_start = start + "// @error ".len();
                let code: String = text.text[code_start..]
                    .chars()
                    .take_while(char::is_ascii_digit)
                    .collect();
                if let Ok(code) = code.parse() {
                    diagnostics.push(
                        EngineDiagnostic::error(code, format!("scripted error {code}")).at(
                            Arc::clone(text),
                            start as u32,
                            (code_start - start) as u32,
                        ),
                    );
                }
                offset = code_start;
            }
        }
        diagnostics
    }

    fn root_exports(&self, program: &FakeProgram, root_name: &str) -> Vec<String> {
        let Some((_, _, text)) = program.files.iter().find(|(url, _, _)| url == root_name) else {
            return Vec::new();
        };
        text.text
            .lines()
            .filter_map(|line| {
                let line = line.trim();
                if line.starts_with("export default") {
                    Some("default".to_string())
                } else {
                    line.strip_prefix("export const ")
                        .and_then(|rest| rest.split([' ', '=', ':']).next())
                        .map(str::to_string)
                }
            })
            .collect()
    }

    fn emit(
        &mut self,
        program: &FakeProgram,
        _: &CompilerHost<'_>,
        sink: &mut dyn ArtifactSink,
    ) -> Result<EmitResult, WorkerError> {
        self.log.borrow_mut().emits += 1;
        if program.options.get_bool("noEmit") {
            return Ok(EmitResult {
                emit_skipped: true,
                diagnostics: Vec::new(),
            });
        }

        let urls: Vec<String> = program.files.iter().map(|(url, _, _)| url.clone()).collect();
        if let Some(out_file) = program.options.get_str("outFile") {
            let mut data = String::new();
            for (url, _, text) in &program.files {
                let name = bundle_module_name(url, &urls);
                data.push_str(&format!(
                    "define(\"{name}\", [\"require\", \"exports\"], function (require, exports) {{\n{}\n}});\n",
                    text.text
                ));
            }
            sink.write_file(out_file, &data, false, &urls)?;
            return Ok(EmitResult::default());
        }

        let out_dir = program.options.get_str("outDir");
        let source_map = program.options.get_bool("sourceMap");
        for (url, filename, text) in &program.files {
            let base = strip_extension(filename);
            let js = match out_dir {
                Some(dir) => format!("{dir}{base}.js"),
                None => format!("{base}.js"),
            };
            let sources = [url.clone()];
            sink.write_file(&js, &text.text, false, &sources)?;
            if source_map {
                sink.write_file(&format!("{js}.map"), "{\"version\":3}", false, &sources)?;
            }
        }
        Ok(EmitResult::default())
    }

    fn transpile_module(
        &mut self,
        file_name: &str,
        source: &str,
        options: &CompilerOptions,
    ) -> TranspileOutput {
        self.log.borrow_mut().transpiled.push(file_name.to_string());
        TranspileOutput {
            output_text: format!("{source}\n//# transpiled"),
            source_map_text: options
                .get_bool("sourceMap")
                .then(|| "{\"version\":3}".to_string()),
        }
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Host
// ══════════════════════════════════════════════════════════════════════════════

/// In-memory host that records every round-trip.
#[derive(Debug, Default)]
pub struct RecordingHost {
    /// URL → source text.
    pub modules: BTreeMap<String, String>,
    pub resolve_calls: Vec<(Vec<String>, Option<String>)>,
    pub fetch_calls: Vec<Vec<String>>,
    pub cached: Vec<(String, String, String)>,
    pub written: Vec<(String, String)>,
    pub printed: Vec<String>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_module(mut self, url: &str, source: &str) -> Self {
        self.modules.insert(url.to_string(), source.to_string());
        self
    }

    /// How many times `url` was fetched.
    pub fn fetch_count(&self, url: &str) -> usize {
        self.fetch_calls
            .iter()
            .flatten()
            .filter(|u| u.as_str() == url)
            .count()
    }
}

impl Host for RecordingHost {
    fn resolve_modules(
        &mut self,
        specifiers: &[String],
        referrer: Option<&str>,
    ) -> Result<Vec<String>, HostError> {
        self.resolve_calls
            .push((specifiers.to_vec(), referrer.map(str::to_string)));
        specifiers
            .iter()
            .map(|specifier| {
                let url = match referrer {
                    Some(referrer) if !specifier.contains("://") => {
                        resolve_specifier(specifier, referrer)
                    }
                    _ => specifier.clone(),
                };
                if self.modules.contains_key(&url) {
                    Ok(url)
                } else {
                    Err(HostError::NotFound {
                        specifier: specifier.clone(),
                        referrer: referrer.map(str::to_string),
                    })
                }
            })
            .collect()
    }

    fn fetch_source_files(
        &mut self,
        urls: &[String],
        _: Option<&str>,
    ) -> Result<Vec<FetchedSource>, HostError> {
        self.fetch_calls.push(urls.to_vec());
        urls.iter()
            .map(|url| {
                let source = self.modules.get(url).ok_or_else(|| HostError::NotFound {
                    specifier: url.clone(),
                    referrer: None,
                })?;
                let filename = url.strip_prefix("file://").unwrap_or(url).to_string();
                Ok(FetchedSource {
                    url: url.clone(),
                    media_type: MediaType::from_path(&filename),
                    filename,
                    source_code: source.clone(),
                })
            })
            .collect()
    }

    fn cache(&mut self, extension: &str, module_id: &str, contents: &str) -> Result<(), HostError> {
        self.cached
            .push((extension.to_string(), module_id.to_string(), contents.to_string()));
        Ok(())
    }

    fn write_file(&mut self, path: &str, contents: &[u8]) -> Result<(), HostError> {
        self.written
            .push((path.to_string(), String::from_utf8_lossy(contents).into_owned()));
        Ok(())
    }

    fn print(&mut self, text: &str) {
        self.printed.push(text.to_string());
    }
}
