use thiserror::Error;

use crate::card::CardId;

#[derive(Error, Debug)]
pub enum DeckError {
    #[error("HTTP error: {0}")]
    Http(Box<reqwest::Error>),

    #[error("unexpected status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("card {0} not found")]
    NotFound(CardId),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid collaborator url: {0}")]
    InvalidUrl(String),
}

impl From<reqwest::Error> for DeckError {
    fn from(error: reqwest::Error) -> Self {
        DeckError::Http(Box::new(error))
    }
}
