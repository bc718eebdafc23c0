use std::borrow::Cow;

use actix_web::{http::StatusCode, HttpResponse};
use thiserror::Error;

use crate::models::{ApiResponse, InviteRejection};
use crate::status::TransitionError;

const UNIQUE_VIOLATION: &str = "23505";
const DUPLICATE_RECORD: &str = "Duplicate record";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),

    #[error("Invite code has expired")]
    InviteExpired,

    #[error("Invalid or expired invite code")]
    InviteUnavailable,

    #[error("{0}")]
    Forbidden(String),

    #[error("Database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.code() == Some(Cow::Borrowed(UNIQUE_VIOLATION)) => {
                log::debug!("Unique violation: {}", db_err.message());
                StoreError::Conflict(DUPLICATE_RECORD.to_string())
            }
            sqlx::Error::RowNotFound => StoreError::NotFound("Record"),
            _ => StoreError::Database(err),
        }
    }
}

impl From<InviteRejection> for StoreError {
    fn from(rejection: InviteRejection) -> Self {
        match rejection {
            InviteRejection::Expired => StoreError::InviteExpired,
            InviteRejection::NotActive => StoreError::InviteUnavailable,
        }
    }
}

impl StoreError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            StoreError::NotFound(_) | StoreError::InviteUnavailable => StatusCode::NOT_FOUND,
            StoreError::Conflict(_) | StoreError::InvalidTransition(_) => StatusCode::CONFLICT,
            StoreError::InviteExpired => StatusCode::GONE,
            StoreError::Forbidden(_) => StatusCode::FORBIDDEN,
            StoreError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Envelope response for a failed store call; database details are logged, never returned.
    pub fn into_response(self, context: &str) -> HttpResponse {
        let status = self.status_code();
        let message = match &self {
            StoreError::Database(err) => {
                log::error!("{context}: {err:?}");
                context.to_string()
            }
            other => other.to_string(),
        };
        HttpResponse::build(status).json(ApiResponse::<()>::error(message))
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} must be set in environment")]
    Missing(&'static str),

    #[error("invalid value '{value}' for {key}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Error, Debug)]
pub enum GeocodeError {
    #[error("geocoding is not configured")]
    NotConfigured,

    #[error("geocoding request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("geocoding service returned {status}: {body}")]
    Upstream { status: u16, body: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::InvitationStatus;
    use crate::status::StatusFlow;

    #[test]
    fn transition_errors_map_to_conflict() {
        let err: StoreError = InvitationStatus::Declined
            .transition(InvitationStatus::Accepted)
            .unwrap_err()
            .into();
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn expired_invites_are_gone() {
        let err: StoreError = InviteRejection::Expired.into();
        assert_eq!(err.status_code(), StatusCode::GONE);
        let err: StoreError = InviteRejection::NotActive.into();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    const RAW_MESSAGE: &str =
        "duplicate key value violates unique constraint \"event_vendors_event_id_business_id_key\"";

    #[derive(Debug)]
    struct UniqueViolation;

    impl std::fmt::Display for UniqueViolation {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str(RAW_MESSAGE)
        }
    }

    impl std::error::Error for UniqueViolation {}

    impl sqlx::error::DatabaseError for UniqueViolation {
        fn message(&self) -> &str {
            RAW_MESSAGE
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            Some(Cow::Borrowed(UNIQUE_VIOLATION))
        }

        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> sqlx::error::ErrorKind {
            sqlx::error::ErrorKind::UniqueViolation
        }
    }

    #[test]
    fn unique_violations_hide_constraint_names() {
        let err: StoreError = sqlx::Error::Database(Box::new(UniqueViolation)).into();
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(err.to_string(), "Duplicate record");
    }

    #[test]
    fn missing_rows_map_to_not_found() {
        let err: StoreError = sqlx::Error::RowNotFound.into();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }
}
