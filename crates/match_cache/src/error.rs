use thiserror::Error;

/// Chyba backing store. Cache vrstva ji nikdy nepropaguje do requestu,
/// jen zaloguje a pustí producer napřímo.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("cache entry is not valid JSON: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("cache store io: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache store task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("cache store lock poisoned")]
    Poisoned,

    #[error("cache store unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, CacheError>;
