use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use log::error;
use serde_json::json;
use sponsor_engine::{db_types::DeliveryLinks, OrderFlowError};
use thiserror::Error;
use wxpay_tools::NotificationError;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("Authentication Error. {0}")]
    AuthenticationError(#[from] AuthError),
    #[error("{0}")]
    ValidationError(String),
    #[error("Too many requests. Please try again later.")]
    TooManyRequests,
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("You have already purchased this work")]
    AlreadyPurchased(DeliveryLinks),
    #[error("{0}")]
    Conflict(String),
    #[error("The payment gateway could not complete the request. {0}")]
    GatewayError(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::ValidationError(_) => StatusCode::BAD_REQUEST,
            Self::AuthenticationError(e) => match e {
                AuthError::MissingCredentials => StatusCode::UNAUTHORIZED,
                AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                AuthError::AdminDisabled => StatusCode::FORBIDDEN,
            },
            Self::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::AlreadyPurchased(_) => StatusCode::CONFLICT,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::GatewayError(_) => StatusCode::BAD_GATEWAY,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut body = json!({ "error": self.to_string() });
        // A repeat purchase is answered with the links the buyer already owns
        if let Self::AlreadyPurchased(links) = self {
            if let Some(url) = &links.figma_url {
                body["figmaUrl"] = json!(url);
            }
            if let Some(url) = &links.delivery_url {
                body["deliveryUrl"] = json!(url);
            }
        }
        HttpResponse::build(self.status_code()).insert_header(ContentType::json()).body(body.to_string())
    }
}

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("No admin bearer token was provided.")]
    MissingCredentials,
    #[error("The admin bearer token is invalid.")]
    InvalidCredentials,
    #[error("Admin access is not enabled on this server.")]
    AdminDisabled,
}

impl From<OrderFlowError> for ServerError {
    fn from(e: OrderFlowError) -> Self {
        match e {
            OrderFlowError::Validation(_) => Self::ValidationError(e.to_string()),
            OrderFlowError::NothingToDeliver => Self::ValidationError(e.to_string()),
            OrderFlowError::RateLimited => Self::TooManyRequests,
            OrderFlowError::WorkNotFound(_) => Self::NoRecordFound(e.to_string()),
            OrderFlowError::OrderNotFound => Self::NoRecordFound(e.to_string()),
            OrderFlowError::AlreadyPurchased(links) => Self::AlreadyPurchased(links),
            OrderFlowError::InvalidTransition { .. } => Self::Conflict(e.to_string()),
            OrderFlowError::RefundFailed(e) => Self::GatewayError(e.to_string()),
            OrderFlowError::AmountMismatch { .. } => Self::Conflict(e.to_string()),
            OrderFlowError::StoreError(e) => {
                error!("💻️ Database error while handling a request. {e}");
                Self::BackendError("Database error".to_string())
            },
        }
    }
}

/// The HTTP status for a rejected payment notification. The body never says more than "FAIL".
pub fn notification_status(e: &NotificationError) -> StatusCode {
    match e {
        NotificationError::MissingHeader(_) => StatusCode::BAD_REQUEST,
        NotificationError::NotConfigured => StatusCode::INTERNAL_SERVER_ERROR,
        NotificationError::UnknownSerial(_) => StatusCode::UNAUTHORIZED,
        NotificationError::StaleTimestamp => StatusCode::UNAUTHORIZED,
        NotificationError::InvalidSignature => StatusCode::UNAUTHORIZED,
        NotificationError::MalformedBody(_) => StatusCode::BAD_REQUEST,
        NotificationError::DecryptionFailed => StatusCode::BAD_REQUEST,
        NotificationError::MalformedPayload(_) => StatusCode::BAD_REQUEST,
    }
}
