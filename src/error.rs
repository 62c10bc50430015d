use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("HTTP request error: {0}")]
    HttpRequest(#[from] reqwest::Error),
    #[error("HTTP {0}")]
    HttpStatus(u16),
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("URL not found: {0}")]
    NotFound(String),
    #[error("URL already monitored: {0}")]
    AlreadyTracked(String),
    #[error("Error opening browser: {0}")]
    Open(String),
}

impl Error {
    /// True for failures of the network fetch itself (transport or status).
    #[must_use]
    pub fn is_fetch_failure(&self) -> bool {
        matches!(self, Error::HttpRequest(_) | Error::HttpStatus(_))
    }
}
