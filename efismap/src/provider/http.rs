//! HTTP client abstraction for testability.

use super::ProviderError;

/// Trait for blocking HTTP GET operations.
///
/// The network fallback of [`super::StaticFileProvider`] goes through
/// this seam so tests can inject a mock instead of a live server.
pub trait HttpClient {
    /// Performs a blocking HTTP GET and returns the response body.
    ///
    /// Non-success statuses are errors; implementations must not return
    /// partial bodies.
    fn get(&self, url: &str) -> Result<Vec<u8>, ProviderError>;
}

/// Real HTTP client implementation using reqwest.
pub struct ReqwestClient {
    client: reqwest::blocking::Client,
}

impl ReqwestClient {
    /// Creates a client with the default 30 second timeout.
    pub fn new() -> Result<Self, ProviderError> {
        Self::with_timeout(30)
    }

    /// Creates a client with a custom request timeout.
    pub fn with_timeout(timeout_secs: u64) -> Result<Self, ProviderError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ProviderError::Http(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { client })
    }
}

impl HttpClient for ReqwestClient {
    fn get(&self, url: &str) -> Result<Vec<u8>, ProviderError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| ProviderError::Http(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(ProviderError::Status {
                code: response.status().as_u16(),
                url: url.to_string(),
            });
        }

        response
            .bytes()
            .map(|b| b.to_vec())
            .map_err(|e| ProviderError::Http(format!("failed to read response: {e}")))
    }
}
