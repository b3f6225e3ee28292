use reqwest::{Client, IntoUrl, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::providers::apireq::{self, Url};

#[derive(thiserror::Error, Debug)]
pub(super) enum Error {
    /// The API Base is not a URL that can be used in a network request
    #[error("invalid api base")]
    InvalidApiBase(#[source] reqwest::Error),

    /// Endpoint URL is invalid
    #[error("invalid endpoint")]
    InvalidEndpoint(
        #[from]
        #[source]
        url::ParseError,
    ),

    /// Some issue with the request
    #[error("{}", .0)]
    RequestFailed(
        #[from]
        #[source]
        apireq::ReqwestError,
    ),

    /// Your request was malformed or missing some required parameters,
    /// such as a token or an input.
    #[error("{}", .0.message)]
    BadRequest(ApiErrorPayload),

    /// An "Authentication" Error is an umbrella error with three possiblities:
    /// (1) Invalid Authentication
    /// (2) The requesting API key is not correct.
    /// (3) Your account is not part of an organization.
    #[error("{}", .0.message)]
    Authentication(ApiErrorPayload),

    /// You don't have access to the requested resource.
    #[error("{}", .0.message)]
    PermissionDenied(ApiErrorPayload),

    /// Requested resource does not exist.
    #[error("{}", .0.message)]
    NotFound(ApiErrorPayload),

    /// You have hit your assigned rate limit.
    #[error("{}", .0.message)]
    RateLimit(ApiErrorPayload),

    /// OpenAI has an internal issue
    #[error("{}", .0.message)]
    InternalError(ApiErrorPayload),

    /// The engine is currently overloaded, please try again later
    #[error("{}", .0.message)]
    ApiOverloaded(ApiErrorPayload),

    /// Some unknown error was returned by the API
    #[error("{}", .0.message)]
    UnknownStatus(ApiErrorPayload),
}

impl Error {
    fn from_status(status: u16, payload: ApiErrorPayload) -> Error {
        match status {
            400 | 409 | 422 => Error::BadRequest(payload),
            401 => Error::Authentication(payload),
            403 => Error::PermissionDenied(payload),
            404 => Error::NotFound(payload),
            429 => Error::RateLimit(payload),
            500 => Error::InternalError(payload),
            503 => Error::ApiOverloaded(payload),
            _ => Error::UnknownStatus(payload),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub(super) enum Role {
    User,
    Assistant,
}

#[derive(Serialize, Deserialize, Debug)]
pub(super) struct ChatMessage {
    #[serde(default)]
    pub content: String,
    pub role: Role,
}

/* Structures to serialize /chat/completions */

#[derive(Serialize, Debug)]
struct ChatCompletionRequest<'o> {
    model: &'o str,
    messages: &'o [ChatMessage],
    temperature: f64,
    stream: bool,
}

/* Structures to deseralize /chat/completions */

#[derive(Deserialize, Debug)]
pub(super) struct Choice {
    pub message: ChatMessage,
}

#[derive(Deserialize, Debug)]
pub(super) struct ChatCompletion {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

/* API Errors */

#[derive(Deserialize, Debug, Default)]
pub(super) struct ApiErrorPayload {
    message: String,
}

#[derive(Deserialize, Debug)]
struct ApiErrorResponse {
    error: ApiErrorPayload,
}

const DEFAULT_API_BASE: &str = "https://api.openai.com";
const TEMPERATURE: f64 = 0.4;

pub(super) struct OpenAIApi {
    api_base: Url,
    api_key: String,
    client: Client,
}

impl OpenAIApi {
    pub(super) fn new<U: IntoUrl>(api_key: &str, api_base: U) -> Result<OpenAIApi, Error> {
        let api_base = api_base.into_url().map_err(Error::InvalidApiBase)?;

        Ok(OpenAIApi {
            api_base,
            api_key: api_key.to_string(),
            client: Client::new(),
        })
    }

    pub(super) fn with_api_key(api_key: &str) -> Result<OpenAIApi, Error> {
        Self::new(api_key, DEFAULT_API_BASE)
    }

    async fn maybe_parse_api_error(res: Response) -> Result<Response, Error> {
        let status = res.status();

        if status.is_success() {
            return Ok(res);
        }

        let body = res.text().await.unwrap_or_default();

        let payload = match serde_json::from_str::<ApiErrorResponse>(&body) {
            Ok(err) => err.error,
            Err(_) => ApiErrorPayload {
                message: format!("HTTP {}", status.as_u16()),
            },
        };

        Err(Error::from_status(status.as_u16(), payload))
    }

    pub(super) async fn models(&self, timeout: Duration) -> Result<(), Error> {
        let url = self.api_base.join("/v1/models")?;

        let res = self
            .client
            .get(url)
            .bearer_auth(&self.api_key)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| Error::RequestFailed(e.into()))?;

        Self::maybe_parse_api_error(res).await?;

        Ok(())
    }

    pub(super) async fn chat_completion(
        &self,
        model: &str,
        messages: &[ChatMessage],
        timeout: Duration,
    ) -> Result<ChatCompletion, Error> {
        let url = self.api_base.join("/v1/chat/completions")?;

        let res = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .timeout(timeout)
            .json(&ChatCompletionRequest {
                model,
                messages,
                temperature: TEMPERATURE,
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
