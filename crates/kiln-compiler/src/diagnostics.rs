//! Diagnostic filtering and translation to the wire format.
//!
//! Some engine diagnostics are expected artifacts of how the host resolves
//! modules (URL specifiers with extensions, files that are not modules, ...).
//! Those codes are dropped; everything else is translated 1:1, in order.

use kiln_types::{Diagnostic, DiagnosticCategory, DiagnosticItem, DiagnosticMessageChain};

use crate::engine::{EngineCategory, EngineDiagnostic, MessageChain, MessageText};

/// Diagnostic codes never reported by the worker.
pub const IGNORED_DIAGNOSTICS: &[u32] = &[
    // 'for-await-of' only allowed within an async function.
    1103,
    // 'await' expressions only allowed at the top level of a module.
    1375,
    // File is not a module.
    2306,
    // An import path cannot end with a '.ts' extension.
    2691,
    // Cannot find the common subdirectory path for the input files.
    5009,
    // Cannot write file because it would overwrite input file.
    5055,
    // JSON imports with a non-CommonJS module kind.
    5070,
    // Could not find a declaration file for module.
    7016,
];

/// Whether a diagnostic code is in [`IGNORED_DIAGNOSTICS`].
pub fn is_ignored(code: u32) -> bool {
    IGNORED_DIAGNOSTICS.contains(&code)
}

/// Drop ignored diagnostics, keeping the engine's order.
pub fn filter_diagnostics(diagnostics: Vec<EngineDiagnostic>) -> Vec<EngineDiagnostic> {
    diagnostics
        .into_iter()
        .filter(|d| {
            let ignored = is_ignored(d.code);
            if ignored {
                tracing::trace!(code = d.code, "dropping ignored diagnostic");
            }
            !ignored
        })
        .collect()
}

/// Translate engine diagnostics into wire items.
pub fn translate_diagnostics(diagnostics: &[EngineDiagnostic]) -> Vec<DiagnosticItem> {
    diagnostics.iter().map(translate_diagnostic).collect()
}

/// Filter and translate; `None` when nothing is left.
pub fn to_wire(diagnostics: Vec<EngineDiagnostic>) -> Option<Diagnostic> {
    Diagnostic::from_items(translate_diagnostics(&filter_diagnostics(diagnostics)))
}

/// Like [`to_wire`], but as a bare item list.
pub fn to_wire_items(diagnostics: Vec<EngineDiagnostic>) -> Option<Vec<DiagnosticItem>> {
    to_wire(diagnostics).map(|d| d.items)
}

fn translate_category(category: EngineCategory) -> DiagnosticCategory {
    match category {
        EngineCategory::Warning => DiagnosticCategory::Warning,
        EngineCategory::Error => DiagnosticCategory::Error,
        EngineCategory::Suggestion => DiagnosticCategory::Suggestion,
        EngineCategory::Message => DiagnosticCategory::Info,
    }
}

fn translate_chain(chain: &MessageChain) -> DiagnosticMessageChain {
    DiagnosticMessageChain {
        message: chain.text.clone(),
        category: translate_category(chain.category),
        code: chain.code,
        next: if chain.next.is_empty() {
            None
        } else {
            Some(chain.next.iter().map(translate_chain).collect())
        },
    }
}

fn translate_diagnostic(diagnostic: &EngineDiagnostic) -> DiagnosticItem {
    let (message, message_chain) = match &diagnostic.message {
        MessageText::Text(text) => (text.clone(), None),
        MessageText::Chain(chain) => (chain.text.clone(), Some(translate_chain(chain))),
    };

    let mut item = DiagnosticItem::new(
        message,
        translate_category(diagnostic.category),
        diagnostic.code,
    );
    item.message_chain = message_chain;

    if let Some(file) = &diagnostic.file {
        item.script_resource_name = Some(file.name.clone());
        if let Some(start) = diagnostic.start {
            let end = start.saturating_add(diagnostic.length.unwrap_or(0));
            let (line, start_column) = file.location(start as usize);
            let (_, end_column) = file.location(end as usize);
            item.start_position = Some(start);
            item.end_position = Some(end);
            item.line_number = Some(line);
            item.start_column = Some(start_column);
            item.end_column = Some(end_column);
            item.source_line = file.line(line).map(str::to_string);
        }
    }

    if !diagnostic.related_information.is_empty() {
        item.related_information = Some(translate_diagnostics(&diagnostic.related_information));
    }

    item
}
