//! Retrieval of remote observation images.
//!
//! Fetches happen one at a time and are never retried; a failure is fatal
//! for the candidate being processed.

use crate::error::WildlabelError;

/// Fetches the bytes behind a URL.
pub trait Fetcher {
    fn fetch(&mut self, url: &str) -> Result<Vec<u8>, WildlabelError>;
}

#[cfg(feature = "remote")]
pub use http::HttpFetcher;

#[cfg(feature = "remote")]
mod http {
    use std::time::Duration;

    use super::Fetcher;
    use crate::error::WildlabelError;

    const FETCH_TIMEOUT: Duration = Duration::from_secs(30);
    /// Upper bound on a single image download.
    const MAX_IMAGE_BYTES: u64 = 50 * 1024 * 1024;

    /// Blocking HTTP fetcher backed by `ureq`.
    pub struct HttpFetcher {
        agent: ureq::Agent,
    }

    impl HttpFetcher {
        pub fn new() -> Self {
            let config = ureq::Agent::config_builder()
                .timeout_global(Some(FETCH_TIMEOUT))
                .build();
            Self {
                agent: config.into(),
            }
        }
    }

    impl Default for HttpFetcher {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Fetcher for HttpFetcher {
        fn fetch(&mut self, url: &str) -> Result<Vec<u8>, WildlabelError> {
            let fetch_err = |message: String| WildlabelError::Fetch {
                url: url.to_string(),
                message,
            };

            let mut response = self
                .agent
                .get(url)
                .call()
                .map_err(|source| fetch_err(source.to_string()))?;

            let bytes = response
                .body_mut()
                .with_config()
                .limit(MAX_IMAGE_BYTES)
                .read_to_vec()
                .map_err(|source| fetch_err(source.to_string()))?;

            tracing::debug!(url, bytes = bytes.len(), "fetched image");
            Ok(bytes)
        }
    }
}
