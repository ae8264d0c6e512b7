//! Wire form of engine diagnostics.
//!
//! This is what crosses the process boundary. Field names are camelCase and
//! every optional field is omitted when unknown, never filled with a guess.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Diagnostic category as reported to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticCategory {
    Log,
    Debug,
    Info,
    Error,
    Warning,
    Suggestion,
}

impl fmt::Display for DiagnosticCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Log => write!(f, "log"),
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Suggestion => write!(f, "suggestion"),
        }
    }
}

/// A chain of nested diagnostic messages ("X is not assignable to Y" →
/// "property p is missing" → ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticMessageChain {
    pub message: String,
    pub category: DiagnosticCategory,
    pub code: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<Vec<DiagnosticMessageChain>>,
}

/// One translated diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticItem {
    /// Human-readable message (head of the chain when there is one).
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_chain: Option<DiagnosticMessageChain>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_information: Option<Vec<DiagnosticItem>>,
    /// The full source line the diagnostic starts on.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_line: Option<String>,
    /// 0-based line number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_number: Option<u32>,
    /// Name of the file the diagnostic points into.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script_resource_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_position: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_position: Option<u32>,
    pub category: DiagnosticCategory,
    /// Engine diagnostic code, e.g. `2322`.
    pub code: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_column: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_column: Option<u32>,
}

impl DiagnosticItem {
    /// A bare item with no location.
    pub fn new(message: impl Into<String>, category: DiagnosticCategory, code: u32) -> Self {
        Self {
            message: message.into(),
            message_chain: None,
            related_information: None,
            source_line: None,
            line_number: None,
            script_resource_name: None,
            start_position: None,
            end_position: None,
            category,
            code,
            start_column: None,
            end_column: None,
        }
    }
}

impl fmt::Display for DiagnosticItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = &self.script_resource_name {
            write!(f, "{name}")?;
            if let (Some(line), Some(col)) = (self.line_number, self.start_column) {
                write!(f, ":{}:{}", line + 1, col + 1)?;
            }
            write!(f, " - ")?;
        }
        write!(f, "{} TS{}: {}", self.category, self.code, self.message)
    }
}

/// A non-empty, ordered collection of diagnostics.
///
/// Responses never carry an empty collection: use [`Diagnostic::from_items`]
/// which returns `None` for zero items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub items: Vec<DiagnosticItem>,
}

impl Diagnostic {
    /// Wrap items, or `None` when there are none.
    pub fn from_items(items: Vec<DiagnosticItem>) -> Option<Self> {
        if items.is_empty() {
            None
        } else {
            Some(Self { items })
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
