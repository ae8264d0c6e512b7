use serde::{Deserialize, Serialize};

/// Kind of a module's content, as the engine needs to know it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    JavaScript,
    Jsx,
    TypeScript,
    Tsx,
    Json,
    Wasm,
    Unknown,
}

impl MediaType {
    /// Infer a media type from a file name or URL.
    pub fn from_path(path: &str) -> Self {
        let path = path.split(['?', '#']).next().unwrap_or(path);
        let ext = match path.rsplit_once('.') {
            Some((_, ext)) if !ext.contains('/') => ext.to_ascii_lowercase(),
            _ => return Self::Unknown,
        };
        match ext.as_str() {
            "ts" | "mts" | "cts" => Self::TypeScript,
            "tsx" => Self::Tsx,
            "js" | "mjs" | "cjs" => Self::JavaScript,
            "jsx" => Self::Jsx,
            "json" => Self::Json,
            "wasm" => Self::Wasm,
            _ => Self::Unknown,
        }
    }

    /// JavaScript flavours, whose imports are only followed on request.
    pub fn is_javascript(self) -> bool {
        matches!(self, Self::JavaScript | Self::Jsx)
    }
}

/// Holds module source text for diagnostic positions.
///
/// Lines and columns are 0-based, and columns count bytes from the start of
/// the line, matching the offsets the engine reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceText {
    pub name: String,
    pub text: String,
    /// Cached line start byte offsets for fast line lookup.
    line_starts: Vec<usize>,
}

impl SourceText {
    /// Create a new source text.
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        let line_starts = std::iter::once(0)
            .chain(text.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self {
            name: name.into(),
            text,
            line_starts,
        }
    }

    /// Map a byte offset to a 0-based `(line, column)` pair.
    ///
    /// Offsets past the end clamp to the end of the text.
    pub fn location(&self, offset: usize) -> (u32, u32) {
        let offset = offset.min(self.text.len());
        let line = match self.line_starts.binary_search(&offset) {
            Ok(exact) => exact,
            Err(next) => next - 1,
        };
        (line as u32, (offset - self.line_starts[line]) as u32)
    }

    /// Extract a source line by 0-based line number.
    ///
    /// Returns `None` if the line number is out of range.
    pub fn line(&self, line: u32) -> Option<&str> {
        let idx = line as usize;
        let start = *self.line_starts.get(idx)?;
        let end = self
            .line_starts
            .get(idx + 1)
            .map(|&s| s.saturating_sub(1)) // strip the \n
            .unwrap_or(self.text.len());
        // Also strip trailing \r for CRLF
        Some(self.text[start..end].trim_end_matches('\r'))
    }
}
