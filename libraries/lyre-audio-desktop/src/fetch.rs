//! Content fetching for local files and HTTP(S) locators

use crate::error::{AudioError, Result};
use lyre_playback::{ContentFetcher, Locator};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Default timeout for HTTP requests
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Where a locator points
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// Local file
    File(PathBuf),
    /// Remote resource
    Http(Url),
}

impl Source {
    /// Classify a locator
    ///
    /// `http(s)://` and `file://` are parsed as URLs; anything without a
    /// scheme separator is a plain filesystem path.
    pub fn resolve(locator: &Locator) -> Result<Self> {
        let raw = locator.as_str();
        if !raw.contains("://") {
            return Ok(Self::File(PathBuf::from(raw)));
        }

        let url = Url::parse(raw).map_err(|e| AudioError::InvalidLocator(format!("{raw}: {e}")))?;
        match url.scheme() {
            "http" | "https" => Ok(Self::Http(url)),
            "file" => url
                .to_file_path()
                .map(Self::File)
                .map_err(|()| AudioError::InvalidLocator(format!("{raw}: not a local path"))),
            other => Err(AudioError::InvalidLocator(format!(
                "{raw}: unsupported scheme '{other}'"
            ))),
        }
    }
}

/// Fetcher for file paths, `file://` and `http(s)://` locators
///
/// Runs on loader threads, so HTTP uses the blocking client.
pub struct SourceFetcher {
    client: reqwest::blocking::Client,
}

impl SourceFetcher {
    /// Create a fetcher with the default HTTP timeout
    pub fn new() -> Result<Self> {
        Self::with_timeout(HTTP_TIMEOUT)
    }

    /// Create a fetcher with a custom HTTP timeout
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }

    fn read(&self, locator: &Locator) -> Result<Vec<u8>> {
        match Source::resolve(locator)? {
            Source::File(path) => {
                debug!(path = %path.display(), "reading file");
                Ok(std::fs::read(path)?)
            }
            Source::Http(url) => {
                debug!(%url, "downloading");
                let response = self.client.get(url).send()?.error_for_status()?;
                Ok(response.bytes()?.to_vec())
            }
        }
    }
}

impl ContentFetcher for SourceFetcher {
    fn fetch(&self, locator: &Locator) -> lyre_playback::Result<Vec<u8>> {
        self.read(locator).map_err(|e| match e {
            // Keep the locator in IO messages so failures are attributable
            AudioError::Io(io) => lyre_playback::PlaybackError::Fetch(format!("{locator}: {io}")),
            other => other.into(),
        })
    }
}

impl std::fmt::Debug for SourceFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceFetcher").finish_non_exhaustive()
    }
}
