//! Error and response types shared by the HTTP handlers.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use voxline_twiml::{DocumentBuildError, VoiceDocument};

/// Errors returned by the webhook handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// A field the provider should have sent is absent or blank.
    #[error("missing field: {0}")]
    MissingField(&'static str),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("internal server error: {0}")]
    InternalServerError(String),
}

impl From<DocumentBuildError> for ApiError {
    fn from(err: DocumentBuildError) -> Self {
        ApiError::InternalServerError(format!("voice document: {}", err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::MissingField(_) => StatusCode::BAD_REQUEST,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "webhook failed");
        } else {
            tracing::warn!(error = %self, status = status.as_u16(), "webhook rejected");
        }

        let body = Json(serde_json::json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

/// A rendered voice document, served as `text/xml`.
#[derive(Debug, Clone)]
pub struct VoiceXml(pub String);

impl VoiceXml {
    pub fn render(document: &VoiceDocument) -> Result<Self, ApiError> {
        Ok(Self(document.render()?))
    }
}

impl IntoResponse for VoiceXml {
    fn into_response(self) -> Response {
        (
            [(header::CONTENT_TYPE, voxline_twiml::CONTENT_TYPE)],
            self.0,
        )
            .into_response()
    }
}
