use async_trait::async_trait;
use std::time::Duration;

use crate::providers::{
    join_text, openai::api, providers::ProviderKind, Error, ErrorKind, ProviderAdapter,
};

impl From<api::Error> for Error {
    fn from(value: api::Error) -> Self {
        let kind = match &value {
            api::Error::Authentication(_) | api::Error::PermissionDenied(_) => {
                ErrorKind::Authentication
            }
            api::Error::BadRequest(_)
            | api::Error::InvalidApiBase(_)
            | api::Error::InvalidEndpoint(_) => ErrorKind::BadRequest,
            api::Error::InternalError(_) => ErrorKind::InternalError,
            api::Error::NotFound(_) => ErrorKind::NotFound,
            api::Error::RateLimit(_) => ErrorKind::ExcessUsage,
            api::Error::UnknownStatus(_) => ErrorKind::UnspecifiedError,
            api::Error::ApiOverloaded(_) => ErrorKind::ApiOverloaded,
            api::Error::RequestFailed(_) => ErrorKind::UnspecifiedError,
        };

        match value {
            api::Error::RequestFailed(err) => err.into(),
            value => Error::from_source(kind, Box::new(value)),
        }
    }
}

pub(crate) struct OpenAIProvider {
    api: Option<api::OpenAIApi>,
}

impl OpenAIProvider {
    /// A provider without a key can be constructed; every call then fails with
    /// [`ErrorKind::Authentication`].
    pub(crate) fn new(api_key: Option<String>, api_base: Option<String>) -> Result<OpenAIProvider, Error> {
        let api = match (api_key, api_base) {
            (Some(api_key), Some(api_base)) => Some(api::OpenAIApi::new(&api_key, api_base.as_str())?),
            (Some(api_key), None) => Some(api::OpenAIApi::with_api_key(&api_key)?),
            (None, _) => None,
        };

        Ok(OpenAIProvider { api })
    }

    fn api(&self) -> Result<&api::OpenAIApi, Error> {
        self.api.as_ref().ok_or_else(|| {
            Error::from_source(ErrorKind::Authentication, "OPENAI_API_KEY is not set".into())
        })
    }
}

#[async_trait]
impl ProviderAdapter for OpenAIProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAI
    }

    async fn verify(&self, timeout: Duration) -> Result<(), Error> {
        Ok(self.api()?.models(timeout).await?)
    }

    async fn invoke(&self, model: &str, prompt: &str, timeout: Duration) -> Result<String, Error> {
        let messages = [api::ChatMessage {
            content: prompt.to_string(),
            role: api::Role::User,
        }];

        let completion = self.api()?.chat_completion(model, &messages, timeout).await?;

        Ok(join_text(
            completion
                .choices
                .iter()
                .take(1)
                .map(|c| c.message.content.as_str()),
        ))
    }
}
