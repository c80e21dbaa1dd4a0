use hyper::StatusCode;
use thiserror::Error;

/// Errors that fail a whole aggregation request
#[derive(Error, Debug)]
pub enum AggregatorError {
    #[error("NASA API key not configured")]
    MissingApiKey,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid coordinate: {0}")]
    InvalidCoordinate(String),

    #[error("Method not allowed: {0}")]
    MethodNotAllowed(String),

    #[error("Request body exceeds {0} bytes")]
    PayloadTooLarge(usize),

    #[error("Failed to read request body: {0}")]
    RequestBodyError(String),

    #[error("Response serialization error: {0}")]
    ResponseSerializationError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AggregatorError {
    /// Status code reported to the caller alongside the failure envelope.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AggregatorError::InvalidRequest(_) | AggregatorError::InvalidCoordinate(_) => {
                StatusCode::BAD_REQUEST
            }
            AggregatorError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            AggregatorError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AggregatorError::MissingApiKey
            | AggregatorError::RequestBodyError(_)
            | AggregatorError::ResponseSerializationError(_)
            | AggregatorError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Errors confined to a single upstream branch.
///
/// These never reach the caller; a failed branch only leaves its key out of
/// the response.
#[derive(Error, Debug)]
pub enum BranchError {
    #[error("Upstream request failed for {0}: {1}")]
    Request(String, String),

    #[error("Upstream {0} returned status {1}")]
    Status(String, StatusCode),

    #[error("Failed to decode response from {0}: {1}")]
    Decode(String, String),

    #[error("Upstream timeout for {0}")]
    Timeout(String),

    #[error("Branch task panicked: {0}")]
    Panicked(String),
}
