use std::time::Duration;

use reqwest::blocking::Client;

use crate::error::LoadError;

/// Transport used to pull remote audio bytes.
pub trait Fetch: Send + Sync {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, LoadError>;
}

/// Blocking HTTP(S) fetch over reqwest. Runs on the load worker, never on the
/// frame loop. One client per fetcher, so connections are pooled across loads.
pub struct HttpFetcher {
    client: Result<Client, String>,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Self {
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            log::warn!("HTTP client unavailable: {}", e);
            e.to_string()
        });
        Self { client }
    }
}

impl Fetch for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, LoadError> {
        let client = self
            .client
            .as_ref()
            .map_err(|e| LoadError::Unreachable(format!("HTTP client unavailable: {}", e)))?;

        log::info!("Fetching audio from {}", url);
        let response = client
            .get(url)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| LoadError::Unreachable(e.to_string()))?;

        let body = response
            .bytes()
            .map_err(|e| LoadError::Unreachable(format!("failed to read body: {}", e)))?;

        log::info!("Fetched {} bytes", body.len());
        Ok(body.to_vec())
    }
}

/// True for inputs that should go through [`Fetch`] rather than the filesystem.
pub fn is_remote(input: &str) -> bool {
    let lower = input.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Last path segment of a URL, without query or fragment.
pub fn url_file_name(url: &str) -> Option<&str> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let after_scheme = path.split_once("://").map_or(path, |(_, rest)| rest);
    let (_, path_part) = after_scheme.split_once('/')?;
    path_part.rsplit('/').next().filter(|s| !s.is_empty())
}
