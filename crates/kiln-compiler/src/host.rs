//! The privileged host seam.
//!
//! Every call here is a blocking round-trip to the process that spawned the
//! worker. Calls are made one at a time and each completes before the worker
//! continues.

use serde::{Deserialize, Serialize};

use kiln_types::{HostError, MediaType};

/// A source file as the host delivers it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchedSource {
    /// Canonical module URL.
    pub url: String,
    /// Local file name the engine should see.
    pub filename: String,
    pub media_type: MediaType,
    pub source_code: String,
}

/// The privileged side of the worker boundary.
pub trait Host {
    /// Resolve module specifiers to canonical URLs, without fetching them.
    ///
    /// A module the host knows nothing about is [`HostError::NotFound`].
    fn resolve_modules(
        &mut self,
        specifiers: &[String],
        referrer: Option<&str>,
    ) -> Result<Vec<String>, HostError>;

    /// Fetch source files for canonical URLs, one entry per URL, in order.
    fn fetch_source_files(
        &mut self,
        urls: &[String],
        referrer: Option<&str>,
    ) -> Result<Vec<FetchedSource>, HostError>;

    /// Persist an emitted artifact of `module_id` in the host cache.
    ///
    /// `extension` is `.js` or `.map`.
    fn cache(&mut self, extension: &str, module_id: &str, contents: &str) -> Result<(), HostError>;

    /// Write a file on the host side.
    fn write_file(&mut self, path: &str, contents: &[u8]) -> Result<(), HostError>;

    /// Print text to the host's standard output.
    fn print(&mut self, text: &str) {
        println!("{text}");
    }
}

impl<H: Host + ?Sized> Host for &mut H {
    fn resolve_modules(
        &mut self,
        specifiers: &[String],
        referrer: Option<&str>,
    ) -> Result<Vec<String>, HostError> {
        (**self).resolve_modules(specifiers, referrer)
    }

    fn fetch_source_files(
        &mut self,
        urls: &[String],
        referrer: Option<&str>,
    ) -> Result<Vec<FetchedSource>, HostError> {
        (**self).fetch_source_files(urls, referrer)
    }

    fn cache(&mut self, extension: &str, module_id: &str, contents: &str) -> Result<(), HostError> {
        (**self).cache(extension, module_id, contents)
    }

    fn write_file(&mut self, path: &str, contents: &[u8]) -> Result<(), HostError> {
        (**self).write_file(path, contents)
    }

    fn print(&mut self, text: &str) {
        (**self).print(text)
    }
}
