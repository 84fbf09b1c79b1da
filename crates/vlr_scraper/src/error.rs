use thiserror::Error;

/// Chyba upstream fetchu. Listing stránka ji propaguje, detail stránka
/// ji jen zaloguje a zápas degraduje na záznam bez VOD.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("upstream HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("upstream request timed out after {secs}s: {url}")]
    Timeout { url: String, secs: u64 },

    #[error("upstream request failed for {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("no scripted response for {0}")]
    Missing(String),
}

impl FetchError {
    pub fn url(&self) -> &str {
        match self {
            FetchError::Status { url, .. }
            | FetchError::Timeout { url, .. }
            | FetchError::Network { url, .. } => url,
            FetchError::Missing(url) => url,
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            FetchError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, FetchError>;
