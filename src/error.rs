use thiserror::Error;

/// Errors raised while talking to the scraping service or exporting results.
///
/// A missing listing field is never an error; extraction leaves it as `None`.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// Required configuration is missing or malformed
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The request never got a response (DNS, connect, TLS, timeout)
    #[error("network error while fetching {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The provider answered with a non-success status or a failed envelope
    #[error("service error for {url}: status {status}: {message}")]
    Service {
        url: String,
        status: u16,
        message: String,
    },

    /// The provider's body could not be parsed
    #[error("could not decode response for {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    /// A crawl job did not finish within the polling window
    #[error("timed out waiting for crawl of {url}")]
    Timeout { url: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ScrapeError {
    /// Provider status code, when the failure came from the provider.
    pub fn status(&self) -> Option<u16> {
        match self {
            ScrapeError::Service { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ScrapeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_error_exposes_status() {
        let err = ScrapeError::Service {
            url: "https://example.com".to_string(),
            status: 402,
            message: "Payment required".to_string(),
        };
        assert_eq!(err.status(), Some(402));
        assert!(err.to_string().contains("402"));
        assert!(err.to_string().contains("https://example.com"));
    }

    #[test]
    fn non_service_errors_have_no_status() {
        let err = ScrapeError::Configuration("FIRECRAWL_API_KEY must be set".to_string());
        assert_eq!(err.status(), None);
        let err = ScrapeError::Timeout {
            url: "https://example.com".to_string(),
        };
        assert_eq!(err.status(), None);
    }
}
