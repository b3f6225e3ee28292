//! Conversions between Reqwest API errors and provider error types

use crate::providers::apireq::{error::ErrorKind as ReqwestErrorKind, ReqwestError, StatusError};
use crate::providers::{Error, ErrorKind};

impl From<ReqwestError> for Error {
    fn from(value: ReqwestError) -> Self {
        let kind: ErrorKind = match &value.kind() {
            ReqwestErrorKind::ConnectFailed => ErrorKind::Connection,
            ReqwestErrorKind::DecodingFailed | ReqwestErrorKind::RedirectPolicyViolated => {
                ErrorKind::UnexpectedResponse
            }
            ReqwestErrorKind::TimedOut => ErrorKind::TimedOut,
            ReqwestErrorKind::UnknownReqwestError => ErrorKind::UnspecifiedError,
        };

        Error::from_source(kind, Box::new(value))
    }
}

impl From<reqwest::Error> for Error {
    fn from(value: reqwest::Error) -> Self {
        ReqwestError::new(value).into()
    }
}

impl From<StatusError> for Error {
    fn from(value: StatusError) -> Self {
        let kind = match value.status {
            400 | 409 | 422 => ErrorKind::BadRequest,
            401 | 403 => ErrorKind::Authentication,
            404 => ErrorKind::NotFound,
            429 => ErrorKind::ExcessUsage,
            503 | 529 => ErrorKind::ApiOverloaded,
            500..=599 => ErrorKind::InternalError,
            _ => ErrorKind::UnspecifiedError,
        };

        Error::from_source(kind, Box::new(value))
    }
}
