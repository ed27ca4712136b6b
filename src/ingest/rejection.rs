use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Terminal per-request failures on the public listener.
///
/// Each variant maps to a 4xx status with a short text body; the bodies are
/// part of the client contract.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IngestRejection {
    #[error("unknown host")]
    UnknownOrigin(String),
    #[error("could not decode request body")]
    Undecodable,
    #[error("no event type")]
    NoEventType,
    #[error("unknown event type")]
    UnknownEventType(String),
    #[error("method not allowed")]
    Method,
    #[error("no contacts configured")]
    NoContacts,
}

impl IngestRejection {
    pub fn status(&self) -> StatusCode {
        match self {
            IngestRejection::UnknownOrigin(_) => StatusCode::NOT_FOUND,
            IngestRejection::Undecodable
            | IngestRejection::NoEventType
            | IngestRejection::UnknownEventType(_)
            | IngestRejection::Method => StatusCode::BAD_REQUEST,
            IngestRejection::NoContacts => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for IngestRejection {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}
