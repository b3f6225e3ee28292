//! Adapter for the Anthropic messages API

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::apireq::{self, Url};
use super::{join_text, providers::ProviderKind, Error, ErrorKind, ProviderAdapter};

const DEFAULT_API_BASE: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 700;

#[derive(Serialize, Debug)]
struct Message<'m> {
    role: &'static str,
    content: &'m str,
}

#[derive(Serialize, Debug)]
struct MessagesRequest<'m> {
    model: &'m str,
    max_tokens: u32,
    messages: [Message<'m>; 1],
}

#[derive(Deserialize, Debug)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize, Debug)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

pub(crate) struct AnthropicProvider {
    api_base: Url,
    api_key: Option<String>,
    client: Client,
}

impl AnthropicProvider {
    pub(crate) fn new(api_key: Option<String>, api_base: Option<String>) -> Result<AnthropicProvider, Error> {
        let api_base = api_base.as_deref().unwrap_or(DEFAULT_API_BASE);

        Ok(AnthropicProvider {
            api_base: Url::parse(api_base)
                .map_err(|e| Error::from_source(ErrorKind::BadRequest, Box::new(e)))?,
            api_key,
            client: Client::new(),
        })
    }

    fn authorized(&self, req: RequestBuilder) -> Result<RequestBuilder, Error> {
        let api_key = self.api_key.as_ref().ok_or_else(|| {
            Error::from_source(ErrorKind::Authentication, "ANTHROPIC_API_KEY is not set".into())
        })?;

        Ok(req
            .header("x-api-key", api_key)
            .header("anthropic-version", API_VERSION))
    }

    fn endpoint(&self, path: &str) -> Result<Url, Error> {
        self.api_base
            .join(path)
            .map_err(|e| Error::from_source(ErrorKind::BadRequest, Box::new(e)))
    }
}

#[async_trait]
impl ProviderAdapter for AnthropicProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    async fn verify(&self, timeout: Duration) -> Result<(), Error> {
        let req = self.client.get(self.endpoint("/v1/models")?).timeout(timeout);

        let res = self.authorized(req)?.send().await?;

        apireq::check_status(res).await?;

        Ok(())
    }

    async fn invoke(&self, model: &str, prompt: &str, timeout: Duration) -> Result<String, Error> {
        let req = self
            .client
            .post(self.endpoint("/v1/messages")?)
            .timeout(timeout)
            .json(&MessagesRequest {
                model,
                max_tokens: MAX_TOKENS,
                messages: [Message {
                    role: "user",
                    content: prompt,
                }],
            });

        let res = self.authorized(req)?.send().await?;
        let res = apireq::check_status(res).await?;

        let body: MessagesResponse = res.json().await?;

        Ok(join_text(body.content.iter().filter_map(|b| b.text.as_deref())))
    }
}
