use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use myhub_store::StoreError;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Not authenticated")]
    Unauthenticated,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Conversation is closed")]
    ConversationClosed,

    #[error("Too many requests, please try again later")]
    TooManyRequests,

    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    #[error("Upstream request failed: {0}")]
    Upstream(String),

    #[error("Database error: {0}")]
    Store(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<reqwest::Error> for ServerError {
    fn from(e: reqwest::Error) -> Self {
        ServerError::Upstream(e.to_string())
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ServerError::Unauthenticated => (StatusCode::UNAUTHORIZED, self.to_string()),
            ServerError::Forbidden(_) => (StatusCode::FORBIDDEN, self.to_string()),
            ServerError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            ServerError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ServerError::ConversationClosed => (StatusCode::CONFLICT, self.to_string()),
            ServerError::TooManyRequests => (StatusCode::TOO_MANY_REQUESTS, self.to_string()),
            ServerError::NotConfigured(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
            ServerError::Upstream(_) => (StatusCode::BAD_GATEWAY, self.to_string()),
            ServerError::Store(store) => match store {
                StoreError::NotFound => (StatusCode::NOT_FOUND, "Not found".to_string()),
                StoreError::NotOwner => (StatusCode::FORBIDDEN, "Forbidden".to_string()),
                StoreError::Closed => (
                    StatusCode::CONFLICT,
                    ServerError::ConversationClosed.to_string(),
                ),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, internal_message(&self)),
            },
            ServerError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, internal_message(&self))
            }
        };

        let body = serde_json::json!({
            "error": message,
        });

        (status, axum::Json(body)).into_response()
    }
}

/// Unexpected failures carry their detail only in debug builds; production
/// responses get a generic message (the detail still lands in the logs).
fn internal_message(err: &ServerError) -> String {
    tracing::error!(error = %err, "internal server error");
    if cfg!(debug_assertions) {
        err.to_string()
    } else {
        "Internal server error".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_to_client_statuses() {
        let cases = [
            (ServerError::Store(StoreError::NotFound), StatusCode::NOT_FOUND),
            (ServerError::Store(StoreError::NotOwner), StatusCode::FORBIDDEN),
            (ServerError::Store(StoreError::Closed), StatusCode::CONFLICT),
            (ServerError::Unauthenticated, StatusCode::UNAUTHORIZED),
            (ServerError::TooManyRequests, StatusCode::TOO_MANY_REQUESTS),
            (
                ServerError::NotConfigured("SMTP"),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                ServerError::Upstream("timeout".into()),
                StatusCode::BAD_GATEWAY,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }
}
