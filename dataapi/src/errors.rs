use http::StatusCode;
use serde_json::Value;

pub type Result<T, E = DataApiError> = std::result::Result<T, E>;

/// Errors returned to callers of an API.
#[derive(thiserror::Error, Debug)]
pub enum DataApiError {
    /// The request could not be completed: transport failure, timeout,
    /// unexpected HTTP status or a body that is not JSON.
    #[error("{message}")]
    Request {
        message: String,
        request_id: String,
        status: Option<StatusCode>,
    },

    /// The backend answered but flagged the call as failed.
    #[error("{message}")]
    Result {
        message: String,
        code: Value,
        errors: Option<Value>,
    },

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("response rejected by serializer: {0}")]
    Serializer(String),

    #[error("unknown api action: {0}")]
    UnknownAction(String),

    #[error("missing request parameter `{0}`")]
    MissingParam(String),

    #[error("could not build http client: {0}")]
    Client(String),
}

impl DataApiError {
    /// HTTP status the backend answered with, when there was one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            DataApiError::Request { status, .. } => *status,
            DataApiError::PermissionDenied(_) => Some(StatusCode::FORBIDDEN),
            _ => None,
        }
    }
}

/// Failure inside the send pipeline, before it is surfaced to the caller.
///
/// Every variant except `PermissionDenied` ends up as
/// [`DataApiError::Request`] tagged with the request id.
#[derive(thiserror::Error, Debug)]
pub(crate) enum SendError {
    #[error("{message}")]
    Api {
        message: String,
        status: Option<StatusCode>,
    },
    #[error("{0}")]
    PermissionDenied(String),
    #[error("{0}")]
    Serializer(String),
}

impl SendError {
    pub(crate) fn into_api_error(self, request_id: &str) -> DataApiError {
        match self {
            SendError::Api { message, status } => DataApiError::Request {
                message,
                request_id: request_id.to_string(),
                status,
            },
            SendError::PermissionDenied(message) => DataApiError::PermissionDenied(message),
            SendError::Serializer(message) => DataApiError::Serializer(message),
        }
    }
}
