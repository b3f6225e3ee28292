use async_trait::async_trait;
use std::collections::BTreeSet;
use std::time::Duration;

use super::api;
use crate::providers::{providers::ProviderKind, Error, ErrorKind, ProviderAdapter};

impl From<api::Error> for Error {
    fn from(value: api::Error) -> Self {
        let kind = match &value {
            api::Error::InternalError(_) => Some(ErrorKind::InternalError),
            api::Error::InvalidApiBase(_) | api::Error::InvalidEndpoint(_) => {
                Some(ErrorKind::Connection)
            }
            api::Error::NotFound(_) => Some(ErrorKind::NotFound),
            api::Error::BadRequest(_) => Some(ErrorKind::BadRequest),
            api::Error::RequestFailed(_) => None,
            api::Error::UnspecifiedError(_) => Some(ErrorKind::UnspecifiedError),
        };

        match (value, kind) {
            (api::Error::RequestFailed(err), _) => err.into(),
            (value, Some(kind)) => Error::from_source(kind, Box::new(value)),
            (value, None) => Error::from_source(ErrorKind::UnspecifiedError, Box::new(value)),
        }
    }
}

/// Adapter for a local Ollama runtime. Ollama is the only provider that must be
/// confirmed reachable before a request is routed to it.
pub(crate) struct OllamaProvider {
    api: api::OllamaApi,
}

impl OllamaProvider {
    pub(crate) fn with_api_base(api_base: &str) -> Result<OllamaProvider, Error> {
        Ok(OllamaProvider {
            api: api::OllamaApi::with_api_base(api_base)?,
        })
    }

    pub(crate) fn new() -> OllamaProvider {
        OllamaProvider {
            api: api::OllamaApi::new(),
        }
    }

    pub(crate) fn api_base(&self) -> &str {
        self.api.api_base().as_str()
    }

    /// Names of the models pulled into the runtime
    pub(crate) async fn installed_models(&self, timeout: Duration) -> Result<Vec<String>, Error> {
        let tags = self.api.tags(timeout).await?;

        Ok(tags.into_iter().map(|t| t.name).collect())
    }

    /// The subset of `required` that has not been pulled yet, in the given order
    pub(crate) async fn missing_models<'r, I>(
        &self,
        required: I,
        timeout: Duration,
    ) -> Result<Vec<String>, Error>
    where
        I: IntoIterator<Item = &'r str>,
    {
        let installed: BTreeSet<String> = self.installed_models(timeout).await?.into_iter().collect();

        Ok(required
            .into_iter()
            .filter(|model| !installed.contains(*model))
            .map(|model| model.to_string())
            .collect())
    }

    pub(crate) async fn pull(&self, model: &str, timeout: Duration) -> Result<(), Error> {
        let status = self.api.pull(model, timeout).await?;

        tracing::info!(model, status = %status.status, "pulled ollama model");

        Ok(())
    }
}

#[async_trait]
impl ProviderAdapter for OllamaProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Ollama
    }

    fn requires_live_probe(&self) -> bool {
        true
    }

    async fn probe(&self, _model: &str, timeout: Duration) -> Result<(), Error> {
        self.api.tags(timeout).await?;

        Ok(())
    }

    async fn verify(&self, timeout: Duration) -> Result<(), Error> {
        self.api.tags(timeout).await?;

        Ok(())
    }

    async fn invoke(&self, model: &str, prompt: &str, timeout: Duration) -> Result<String, Error> {
        let messages = [api::ChatMessage {
            role: api::Role::User,
            content: prompt.to_string(),
        }];

        let res = self.api.chat(model, &messages, timeout).await?;

        Ok(crate::providers::join_text([res.message.content.as_str()]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(5);

    async fn server_with_tags(body: &str) -> mockito::ServerGuard {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/tags")
            .with_status(200)
            .with_body(body)
            .create_async()
            .await;

        server
    }

    #[tokio::test]
    async fn test_probe_reachable() {
        let server = server_with_tags(r#"{"models":[]}"#).await;

        let ollama = OllamaProvider::with_api_base(&server.url()).unwrap();

        assert!(ollama.probe("qwen", TIMEOUT).await.is_ok());
    }

    #[tokio::test]
    async fn test_probe_refused() {
        // Nothing listens on port 9 of the loopback interface
        let ollama = OllamaProvider::with_api_base("http://127.0.0.1:9").unwrap();

        let err = ollama.probe("qwen", TIMEOUT).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Connection);
    }

    #[tokio::test]
    async fn test_probe_server_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/tags")
            .with_status(500)
            .with_body(r#"{"error":"boom"}"#)
            .create_async()
            .await;

        let ollama = OllamaProvider::with_api_base(&server.url()).unwrap();

        let err = ollama.probe("qwen", TIMEOUT).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InternalError);
    }

    #[tokio::test]
    async fn test_missing_models() {
        let server = server_with_tags(r#"{"models":[{"name":"qwen"},{"name":"llama3"}]}"#).await;

        let ollama = OllamaProvider::with_api_base(&server.url()).unwrap();

        let missing = ollama
            .missing_models(["qwen", "mistral", "gemma:2b"], TIMEOUT)
            .await
            .unwrap();

        assert_eq!(missing, ["mistral", "gemma:2b"]);
    }

    #[tokio::test]
    async fn test_pull() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/pull")
            .match_body(mockito::Matcher::Json(serde_json::json!({
                "name": "qwen",
                "stream": false
            })))
            .with_status(200)
            .with_body(r#"{"status":"success"}"#)
            .create_async()
            .await;

        let ollama = OllamaProvider::with_api_base(&server.url()).unwrap();

        ollama.pull("qwen", TIMEOUT).await.unwrap();

        mock.assert_async().await;
    }
}
