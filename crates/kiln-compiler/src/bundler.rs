//! Single-file bundle assembly.
//!
//! With `module: "amd"` and an `outFile`, the engine emits every module as a
//! `define("<name>", [...], factory)` call, naming modules by their path
//! relative to the common directory of all inputs, without extension. The
//! bundle wraps that output with a small loader and an epilogue that
//! instantiates the root module and re-exports its values.

/// Loader prepended to every bundle. Registers `define` calls and resolves
/// them on `__instantiate`.
pub const BUNDLE_LOADER: &str = r#"// Kiln bundle loader
let define, __instantiate;
(() => {
  const modules = new Map();
  const resolved = new Map();
  define = (id, deps, factory) => {
    modules.set(id, { deps, factory });
  };
  __instantiate = (id) => {
    if (resolved.has(id)) return resolved.get(id);
    const mod = modules.get(id);
    if (!mod) throw new Error(`Module "${id}" is not part of the bundle.`);
    const exports = {};
    resolved.set(id, exports);
    const args = mod.deps.map((dep) =>
      dep === "require" ? __instantiate : dep === "exports" ? exports : __instantiate(dep)
    );
    mod.factory(...args);
    return exports;
  };
})();"#;

/// Longest directory prefix shared by all paths, ending in `/`.
///
/// A single path yields its own directory. No paths yields `""`.
pub fn common_path<S: AsRef<str>>(paths: &[S]) -> String {
    let Some((first, rest)) = paths.split_first() else {
        return String::new();
    };
    let first = first.as_ref();
    if rest.is_empty() {
        return match first.rfind('/') {
            Some(idx) => first[..=idx].to_string(),
            None => String::new(),
        };
    }

    let parts: Vec<&str> = first.split('/').collect();
    let mut end = parts.len();
    for path in rest {
        let other: Vec<&str> = path.as_ref().split('/').collect();
        end = parts[..end]
            .iter()
            .zip(other.iter())
            .take_while(|(a, b)| a == b)
            .count();
        if end == 0 {
            return String::new();
        }
    }

    let prefix = parts[..end].join("/");
    if prefix.ends_with('/') {
        prefix
    } else {
        format!("{prefix}/")
    }
}

/// Module name the engine gives `root_name` inside a bundle of
/// `source_files`.
pub fn bundle_module_name<S: AsRef<str>>(root_name: &str, source_files: &[S]) -> String {
    let shared = common_path(source_files);
    let relative = root_name.strip_prefix(shared.as_str()).unwrap_or(root_name);
    match relative.rfind('.') {
        Some(dot) if !relative[dot..].contains('/') && dot > 0 => relative[..dot].to_string(),
        _ => relative.to_string(),
    }
}

/// Assemble a bundle from the engine's single-file output.
pub fn build_bundle<S: AsRef<str>>(
    root_name: &str,
    data: &str,
    source_files: &[S],
    root_exports: &[String],
) -> String {
    let name = bundle_module_name(root_name, source_files);
    let mut instantiate = String::new();
    if root_exports.is_empty() {
        instantiate.push_str(&format!("__instantiate(\"{name}\");\n"));
    } else {
        instantiate.push_str(&format!("const __exp = __instantiate(\"{name}\");\n"));
        for export in root_exports {
            if export == "default" {
                instantiate.push_str("export default __exp[\"default\"];\n");
            } else {
                instantiate.push_str(&format!("export const {export} = __exp[\"{export}\"];\n"));
            }
        }
    }
    format!("{BUNDLE_LOADER}\n{data}\n{instantiate}")
}
