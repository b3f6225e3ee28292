//! A utility model with helpers for making and parsing API requests.

mod error;
mod provider;

pub(crate) use error::Error as ReqwestError;
pub(crate) use error::StatusError;
pub(crate) use reqwest::Url;

use reqwest::Response;

/// Passes successful responses through and turns everything else into a
/// [`StatusError`] carrying a prefix of the body.
pub(crate) async fn check_status(res: Response) -> Result<Response, StatusError> {
    let status = res.status();

    if status.is_success() {
        return Ok(res);
    }

    let body = res.text().await.unwrap_or_default();

    Err(StatusError::new(status.as_u16(), &body))
}
