//! Mapping from service failures to HTTP error bodies.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use conductor_core::wire::{ErrorResponse, ErrorType};
use conductor_services::ServiceError;

#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct ApiError {
    pub status: StatusCode,
    pub error_type: ErrorType,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, error_type: ErrorType, message: impl Into<String>) -> Self {
        Self {
            status,
            error_type,
            message: message.into(),
        }
    }

    pub fn invalid_json(err: serde_json::Error) -> Self {
        Self::new(StatusCode::BAD_REQUEST, ErrorType::InvalidJson, err.to_string())
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, ErrorType::InvalidRequest, message)
    }

    pub fn unauthorized() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            ErrorType::Unauthorized,
            "missing or invalid credentials",
        )
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        let (status, error_type) = match &err {
            ServiceError::MissingIdentifier(_) => {
                (StatusCode::BAD_REQUEST, ErrorType::InvalidRequest)
            }
            ServiceError::Validation(_) => (StatusCode::BAD_REQUEST, ErrorType::InvalidLrp),
            ServiceError::DesiredLrpNotFound(_) => {
                (StatusCode::NOT_FOUND, ErrorType::DesiredLrpNotFound)
            }
            ServiceError::Decode { .. } | ServiceError::Encode(_) | ServiceError::Store(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, ErrorType::UnknownError)
            }
        };
        Self::new(status, error_type, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error_type: self.error_type,
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conductor_core::ValidationError;
    use conductor_services::store::StoreError;

    #[test]
    fn service_errors_map_to_status_and_token() {
        let e = ApiError::from(ServiceError::MissingIdentifier("process_guid"));
        assert_eq!(e.status, StatusCode::BAD_REQUEST);
        assert_eq!(e.error_type, ErrorType::InvalidRequest);
        assert_eq!(e.message, "process_guid missing from request");

        let mut v = ValidationError::new();
        v.push("instances", "must not be negative");
        let e = ApiError::from(ServiceError::Validation(v));
        assert_eq!(e.error_type, ErrorType::InvalidLrp);

        let e = ApiError::from(ServiceError::DesiredLrpNotFound("p1".into()));
        assert_eq!(e.status, StatusCode::NOT_FOUND);

        let e = ApiError::from(ServiceError::Store(StoreError::Unavailable("boom".into())));
        assert_eq!(e.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(e.error_type, ErrorType::UnknownError);
        assert_eq!(e.message, "store unavailable: boom");
    }
}
