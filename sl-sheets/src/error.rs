use thiserror::Error;

pub type Result<T> = std::result::Result<T, SheetsError>;

#[derive(Debug, Error)]
pub enum SheetsError {
    #[error("invalid service account key: {0}")]
    InvalidKey(String),

    #[error("token exchange failed: {0}")]
    Auth(String),

    #[error("http error: {0}")]
    Http(String),

    #[error("worksheet not found: {0}")]
    WorksheetNotFound(String),

    #[error("sheets API error: {0}")]
    Api(String),
}

impl From<reqwest::Error> for SheetsError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e.to_string())
    }
}
