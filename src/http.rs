use std::time::Duration;

use log::{debug, info};
use reqwest::{
    blocking::{Client, Response},
    header::USER_AGENT,
    StatusCode, Url,
};
use serde_json::json;

use crate::card::{Card, CardId};
use crate::error::DeckError;
use crate::sync::Persistence;

pub const DEFAULT_API_URL: &str = "http://localhost:4000/api";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const AGENT: &str = concat!("flipdeck/", env!("CARGO_PKG_VERSION"));

/// The word-list REST service: `GET /words` plus one POST per mutation.
#[derive(Debug, Clone)]
pub struct HttpPersistence {
    client: Client,
    base: Url,
}

impl HttpPersistence {
    pub fn new(base_url: &str) -> Result<Self, DeckError> {
        Self::with_timeout(base_url, REQUEST_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, DeckError> {
        let base = Url::parse(base_url)
            .map_err(|e| DeckError::InvalidUrl(format!("{base_url}: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(DeckError::InvalidUrl(base_url.to_string()));
        }
        let client = Client::builder().timeout(timeout).build()?;
        info!("using card collaborator at {base}");
        Ok(Self { client, base })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, DeckError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| DeckError::InvalidUrl(self.base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn post(&self, id: &CardId, action: &str, body: serde_json::Value) -> Result<(), DeckError> {
        let url = self.endpoint(&["words", id.as_str(), action])?;
        debug!("POST {url} {body}");
        let resp = self
            .client
            .post(url)
            .header(USER_AGENT, AGENT)
            .json(&body)
            .send()?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Err(DeckError::NotFound(id.clone()));
        }
        ensure_success(&resp)
    }
}

fn ensure_success(resp: &Response) -> Result<(), DeckError> {
    if !resp.status().is_success() {
        return Err(DeckError::Status {
            status: resp.status().as_u16(),
            url: resp.url().to_string(),
        });
    }
    Ok(())
}

impl Persistence for HttpPersistence {
    fn fetch_cards(&self) -> Result<Vec<Card>, DeckError> {
        let url = self.endpoint(&["words"])?;
        debug!("GET {url}");
        let resp = self.client.get(url).header(USER_AGENT, AGENT).send()?;
        ensure_success(&resp)?;
        let body = resp.bytes()?;
        Ok(serde_json::from_slice(&body)?)
    }

    fn set_learned(&self, id: &CardId, learned: bool) -> Result<(), DeckError> {
        self.post(id, "learn", json!({ "learned": learned }))
    }

    fn set_favourite(&self, id: &CardId, is_favourite: bool) -> Result<(), DeckError> {
        self.post(id, "favorite", json!({ "isFavourite": is_favourite }))
    }

    fn add_time(&self, id: &CardId, seconds: u64) -> Result<(), DeckError> {
        self.post(id, "time", json!({ "seconds": seconds }))
    }
}
