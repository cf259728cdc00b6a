use dataapi::DataApiError;
use hyper::StatusCode;

pub type Result<T, E = GatewayError> = std::result::Result<T, E>;

#[derive(thiserror::Error, Debug)]
pub enum GatewayError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] crate::config::ValidationError),

    #[error("unknown module: {0}")]
    UnknownModule(String),

    #[error("invalid request body: {0}")]
    InvalidBody(String),

    #[error(transparent)]
    Api(#[from] DataApiError),
}

impl GatewayError {
    /// Status the gateway answers with for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::Io(_) | GatewayError::InvalidConfig(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            GatewayError::UnknownModule(_) => StatusCode::NOT_FOUND,
            GatewayError::InvalidBody(_) => StatusCode::BAD_REQUEST,
            GatewayError::Api(e) => match e {
                DataApiError::PermissionDenied(_) => StatusCode::FORBIDDEN,
                DataApiError::MissingParam(_) => StatusCode::BAD_REQUEST,
                DataApiError::UnknownAction(_) => StatusCode::NOT_FOUND,
                DataApiError::Client(_) => StatusCode::INTERNAL_SERVER_ERROR,
                DataApiError::Request { .. }
                | DataApiError::Result { .. }
                | DataApiError::Serializer(_) => StatusCode::BAD_GATEWAY,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (GatewayError::UnknownModule("x".into()), StatusCode::NOT_FOUND),
            (GatewayError::InvalidBody("x".into()), StatusCode::BAD_REQUEST),
            (
                DataApiError::PermissionDenied("x".into()).into(),
                StatusCode::FORBIDDEN,
            ),
            (
                DataApiError::Request {
                    message: "x".into(),
                    request_id: "r".into(),
                    status: Some(StatusCode::INTERNAL_SERVER_ERROR),
                }
                .into(),
                StatusCode::BAD_GATEWAY,
            ),
        ];
        for (error, status) in cases {
            assert_eq!(error.status(), status, "{error}");
        }
    }
}
