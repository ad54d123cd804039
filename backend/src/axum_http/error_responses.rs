use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use crates::domain::errors::BookingError;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: u16,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Booking(#[from] BookingError),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Booking(err) => match err {
                BookingError::NotFound { .. } => StatusCode::NOT_FOUND,
                BookingError::Conflict(_)
                | BookingError::InvalidTransition { .. }
                | BookingError::CapacityExceeded(_) => StatusCode::CONFLICT,
                BookingError::PolicyViolation(_) | BookingError::BadRequest(_) => {
                    StatusCode::BAD_REQUEST
                }
                BookingError::Forbidden(_) => StatusCode::FORBIDDEN,
                BookingError::ExternalServiceFailure { .. } => StatusCode::BAD_GATEWAY,
                BookingError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = ?self, "http: internal error");
            // Don't leak internal error detail to client
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let body = Json(ErrorResponse {
            code: status.as_u16(),
            message,
        });

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;
    use uuid::Uuid;

    use super::*;

    async fn render(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn capacity_and_transition_errors_are_conflicts() {
        let (status, body) = render(BookingError::CapacityExceeded("slot full".into()).into()).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], 409);

        let (status, _) = render(
            BookingError::invalid_transition("booking_request", "EXPIRED", "accept").into(),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn domain_statuses_map_one_to_one() {
        let cases = [
            (
                BookingError::not_found("live_session", Uuid::nil()),
                StatusCode::NOT_FOUND,
            ),
            (
                BookingError::PolicyViolation("price floor".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                BookingError::Forbidden("not yours".into()),
                StatusCode::FORBIDDEN,
            ),
            (
                BookingError::external("payment_gateway", "timeout"),
                StatusCode::BAD_GATEWAY,
            ),
        ];

        for (err, expected) in cases {
            let (status, _) = render(err.into()).await;
            assert_eq!(status, expected);
        }
    }

    #[tokio::test]
    async fn internal_details_stay_on_the_server() {
        let err: AppError = BookingError::Internal(anyhow::anyhow!("relation missing")).into();
        let (status, body) = render(err).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Internal server error");
    }
}
