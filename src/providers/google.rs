//! Adapter for the Google Gemini `generateContent` API

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::apireq::{self, Url};
use super::{join_text, providers::ProviderKind, Error, ErrorKind, ProviderAdapter};

const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com";

#[derive(Serialize, Deserialize, Debug, Default)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Serialize, Deserialize, Debug, Default)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Serialize, Debug)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Deserialize, Debug)]
struct ResponseCandidate {
    #[serde(default)]
    content: Content,
}

#[derive(Deserialize, Debug)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<ResponseCandidate>,
}

pub(crate) struct GoogleProvider {
    api_base: Url,
    api_key: Option<String>,
    client: Client,
}

impl GoogleProvider {
    pub(crate) fn new(api_key: Option<String>, api_base: Option<String>) -> Result<GoogleProvider, Error> {
        let api_base = api_base.as_deref().unwrap_or(DEFAULT_API_BASE);

        Ok(GoogleProvider {
            api_base: Url::parse(api_base)
                .map_err(|e| Error::from_source(ErrorKind::BadRequest, Box::new(e)))?,
            api_key,
            client: Client::new(),
        })
    }

    /// The key travels as a query parameter
    fn endpoint(&self, path: &str) -> Result<Url, Error> {
        let api_key = self.api_key.as_ref().ok_or_else(|| {
            Error::from_source(ErrorKind::Authentication, "GOOGLE_API_KEY is not set".into())
        })?;

        let mut url = self
            .api_base
            .join(path)
            .map_err(|e| Error::from_source(ErrorKind::BadRequest, Box::new(e)))?;

        url.query_pairs_mut().append_pair("key", api_key);

        Ok(url)
    }
}

#[async_trait]
impl ProviderAdapter for GoogleProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Google
    }

    async fn verify(&self, timeout: Duration) -> Result<(), Error> {
        let res = self
            .client
            .get(self.endpoint("/v1beta/models")?)
            .timeout(timeout)
            .send()
            .await?;

        apireq::check_status(res).await?;

        Ok(())
    }

    async fn invoke(&self, model: &str, prompt: &str, timeout: Duration) -> Result<String, Error> {
        let path = format!("/v1beta/models/{}:generateContent", model);

        let res = self
            .client
            .post(self.endpoint(&path)?)
            .timeout(timeout)
            .json(&GenerateRequest {
                contents: vec![Content {
                    role: Some("user".to_string()),
                    parts: vec![Part {
                        text: prompt.to_string(),
                    }],
                }],
            })
            .send()
            .await?;

        let res = apireq::check_status(res).await?;

        let body: GenerateResponse = res.json().await?;

        let parts = body
            .candidates
            .iter()
            .take(1)
            .flat_map(|c| c.content.parts.iter())
            .map(|p| p.text.as_str());

        Ok(join_text(parts))
    }
}
