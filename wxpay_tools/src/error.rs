use thiserror::Error;

/// Reasons an inbound payment notification is refused. None of these are ever applied to an order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotificationError {
    #[error("Required header {0} is missing")]
    MissingHeader(&'static str),
    #[error("The payment gateway is not configured")]
    NotConfigured,
    #[error("No verification key is registered for serial {0}")]
    UnknownSerial(String),
    #[error("Notification timestamp is invalid or outside the accepted window")]
    StaleTimestamp,
    #[error("Notification signature is invalid")]
    InvalidSignature,
    #[error("Notification body is malformed: {0}")]
    MalformedBody(String),
    #[error("Notification payload could not be decrypted")]
    DecryptionFailed,
    #[error("Decrypted notification payload is malformed: {0}")]
    MalformedPayload(String),
}

#[derive(Debug, Error)]
pub enum WxPayApiError {
    #[error("The payment gateway is not configured")]
    NotConfigured,
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("Invalid REST request: {0}")]
    RestRequestError(String),
    #[error("Invalid REST response: {0}")]
    RestResponseError(String),
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
    #[error("Query failed. Error {status}. {message}")]
    QueryError { status: u16, message: String },
}
