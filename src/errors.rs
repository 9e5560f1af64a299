use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Failure envelope returned for every error response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Always `false` for error responses
    pub success: bool,
    /// Human-readable error description
    #[schema(example = "Order not found")]
    pub message: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::error::DbErr),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("Cart is empty")]
    EmptyCart,

    #[error("Insufficient stock for product {0}")]
    InsufficientStock(String),

    #[error("{0}")]
    InvalidTransition(String),

    #[error("{0} is not configured. Please add API keys to the environment")]
    GatewayUnavailable(&'static str),

    #[error("Payment verification failed: {0}")]
    VerificationFailed(String),

    #[error("Payment provider timed out")]
    GatewayTimeout,

    #[error("Payment provider error: {0}")]
    ExternalService(String),

    #[error("Authentication required: {0}")]
    Unauthenticated(String),

    #[error("Not authorized")]
    Forbidden,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::Validation(err.to_string())
    }
}

impl ServiceError {
    /// Single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_)
            | Self::EmptyCart
            | Self::InsufficientStock(_)
            | Self::InvalidTransition(_)
            | Self::GatewayUnavailable(_)
            | Self::VerificationFailed(_) => StatusCode::BAD_REQUEST,
            Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ExternalService(_) => StatusCode::BAD_GATEWAY,
            Self::GatewayTimeout => StatusCode::GATEWAY_TIMEOUT,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message suitable for the HTTP response. Internal failures are reported
    /// generically; the detail stays in the server logs.
    pub fn response_message(&self) -> String {
        match self {
            Self::Database(_) | Self::Internal(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        (status, Json(ErrorResponse::new(self.response_message()))).into_response()
    }
}
