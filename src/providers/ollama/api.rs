use reqwest::{Client, IntoUrl, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::providers::apireq::{self, Url};

const OLLAMA_DEFAULT_ENDPOINT: &str = "http://localhost:11434";

#[derive(Debug, Error)]
pub(super) enum Error {
    #[error("invalid ollama api base: {0}")]
    InvalidApiBase(reqwest::Error),

    #[error("invalid ollama endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),

    #[error("a request to ollama failed: {0}")]
    RequestFailed(#[from] apireq::ReqwestError),

    #[error("failed to query ollama resource: {0}")]
    NotFound(String),

    #[error("request to the ollama api failed: {0}")]
    BadRequest(String),

    #[error("ollama encountered an internal error: {0}")]
    InternalError(String),

    #[error("the ollama API returned an unspecified error: {0}")]
    UnspecifiedError(String),
}

/* === IO === */

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "snake_case")]
pub(super) enum Role {
    Assistant,
    User,
}

// Structures to serialize /api/chat
#[derive(Serialize, Debug)]
pub(super) struct ChatMessage {
    pub role: Role,
    pub content: String,
}

#[derive(Serialize, Debug)]
struct ChatRequest<'m> {
    model: &'m str,
    messages: &'m [ChatMessage],
    stream: bool,
}

// Structures to deseralize /api/chat
#[derive(Deserialize, Debug)]
pub(super) struct ResponseMessage {
    pub role: Role,
    #[serde(default)]
    pub content: String,
}

#[derive(Deserialize, Debug)]
pub(super) struct ChatResponse {
    pub message: ResponseMessage,
    #[serde(default)]
    pub done: bool,
}

// Structures to deseralize /api/tags
#[derive(Debug, Deserialize, Serialize)]
pub(super) struct Tag {
    pub name: String,
    #[serde(default)]
    pub size: Option<u64>,
}

#[derive(Debug, Deserialize, Serialize)]
struct TagsList {
    #[serde(default)]
    models: Vec<Tag>,
}

// Structures for /api/pull
#[derive(Serialize, Debug)]
struct PullRequest<'m> {
    name: &'m str,
    stream: bool,
}

#[derive(Deserialize, Debug)]
pub(super) struct PullStatus {
    pub status: String,
}

// Errors
#[derive(Debug, Deserialize)]
struct ApiError {
    error: String,
}

pub(super) struct OllamaApi {
    api_base: Url,
    client: Client,
}

impl OllamaApi {
    pub(super) fn with_api_base<U: IntoUrl>(api_base: U) -> Result<OllamaApi, Error> {
        Ok(OllamaApi {
            api_base: api_base.into_url().map_err(Error::InvalidApiBase)?,
            client: Client::new(),
        })
    }

    pub(super) fn new() -> OllamaApi {
        OllamaApi {
            api_base: Url::parse(OLLAMA_DEFAULT_ENDPOINT).expect("default endpoint is a valid url"),
            client: Client::new(),
        }
    }

    pub(super) fn api_base(&self) -> &Url {
        &self.api_base
    }

    pub(super) async fn maybe_parse_api_error(res: Response) -> Result<Response, Error> {
        let status = res.status();

        if status.is_success() {
            return Ok(res);
        }

        // Ollama usually answers with {"error": "..."}; proxies in front of it may not
        let body = res.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<ApiError>(&body) {
            Ok(err) => err.error,
            Err(_) => format!("HTTP {}", status.as_u16()),
        };

        match status {
            StatusCode::NOT_FOUND => Err(Error::NotFound(message)),
            code => match code.as_u16() {
                400..=499 => Err(Error::BadRequest(message)),
                500..=599 => Err(Error::InternalError(message)),
                _ => Err(Error::UnspecifiedError(message)),
            },
        }
    }

    pub(super) async fn tags(&self, timeout: Duration) -> Result<Vec<Tag>, Error> {
        let url = self.api_base.join("/api/tags")?;

        let res = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| Error::RequestFailed(e.into()))?;

        let res = Self::maybe_parse_api_error(res).await?;

        let tags: TagsList = res
            .json()
            .await
            .map_err(|e| Error::RequestFailed(e.into()))?;

        Ok(tags.models)
    }

    pub(super) async fn chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        timeout: Duration,
    ) -> Result<ChatResponse, Error> {
        let url = self.api_base.join("/api/chat")?;

        let res = self
            .client
            .post(url)
            .timeout(timeout)
            .json(&ChatRequest {
                model,
                messages,
                stream: false,
            })
            .send()
            .await
            .map_err(|e| Error::RequestFailed(e.into()))?;

        let res = Self::maybe_parse_api_error(res).await?;

        res.json()
            .await
            .map_err(|e| Error::RequestFailed(e.into()))
    }

    pub(super) async fn pull(&self, model: &str, timeout: Duration) -> Result<PullStatus, Error> {
        let url = self.api_base.join("/api/pull")?;

        let res = self
            .client
            .post(url)
            .timeout(timeout)
            .json(&PullRequest {
                name: model,
                stream: false,
            })
            .send()
            .await
            .map_err(|e| Error::RequestFailed(e.into()))?;

        let res = Self::maybe_parse_api_error(res).await?;

        res.json()
            .await
            .map_err(|e| Error::RequestFailed(e.into()))
    }
}
