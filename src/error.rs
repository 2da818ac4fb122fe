use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    BadRequest(String),
    #[error("No content")]
    NoContent,
    #[error("{0} not installed")]
    ExportUnavailable(&'static str),
    #[error("generation exceeded {0}s time limit")]
    Timeout(u64),
    #[error("generation was cancelled")]
    Cancelled,
    #[error("tokenizer error: {0}")]
    Tokenizer(String),
    #[error("model execution failed: {0}")]
    Inference(String),
    #[error("document export failed: {0}")]
    Export(String),
    #[error("template error: {0}")]
    Template(#[from] minijinja::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("other: {0}")]
    Other(String),
}

impl ServiceError {
    pub fn missing_text() -> Self {
        ServiceError::BadRequest("Missing 'text' field".into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::BadRequest(_)
            | ServiceError::NoContent
            | ServiceError::ExportUnavailable(_) => StatusCode::BAD_REQUEST,
            ServiceError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ServiceError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::Tokenizer(_)
            | ServiceError::Inference(_)
            | ServiceError::Export(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServiceError::Template(_) | ServiceError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServiceError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();

        // The export endpoint answers in plain text.
        if matches!(
            self,
            ServiceError::NoContent | ServiceError::ExportUnavailable(_)
        ) {
            return (status, self.to_string()).into_response();
        }

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let body = serde_json::json!({
            "error": self.to_string(),
        });

        (status, axum::Json(body)).into_response()
    }
}
