use actix_web::{
    dev::Payload, http::header, http::StatusCode, web, FromRequest, HttpRequest, HttpResponse,
    ResponseError,
};
use futures_util::future::{ready, Ready};
use thiserror::Error;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::models::ApiResponse;

pub const ACTOR_ID_HEADER: &str = "X-Actor-Id";
pub const ACTOR_NAME_HEADER: &str = "X-Actor-Name";

/// Caller identity as forwarded by the identity provider in front of the service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub id: Uuid,
    pub name: Option<String>,
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Authentication required")]
    Unauthenticated { redirect_to: String },

    #[error("Admin access required")]
    NotAdmin,
}

impl ResponseError for AuthError {
    fn status_code(&self) -> StatusCode {
        match self {
            AuthError::Unauthenticated { .. } => StatusCode::UNAUTHORIZED,
            AuthError::NotAdmin => StatusCode::FORBIDDEN,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut builder = HttpResponse::build(self.status_code());
        if let AuthError::Unauthenticated { redirect_to } = self {
            builder.insert_header((header::LOCATION, redirect_to.as_str()));
        }
        builder.json(ApiResponse::<()>::error(self.to_string()))
    }
}

fn extract_actor(req: &HttpRequest) -> Option<AuthenticatedUser> {
    let id = req
        .headers()
        .get(ACTOR_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| Uuid::parse_str(s.trim()).ok())?;

    let name = req
        .headers()
        .get(ACTOR_NAME_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    Some(AuthenticatedUser { id, name })
}

impl FromRequest for AuthenticatedUser {
    type Error = AuthError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let result = extract_actor(req).ok_or_else(|| {
            let redirect_to = req
                .app_data::<web::Data<AppConfig>>()
                .map(|config| config.auth_page_path.clone())
                .unwrap_or_else(|| AppConfig::default().auth_page_path);
            log::debug!("Rejecting unauthenticated request to {}", req.path());
            AuthError::Unauthenticated { redirect_to }
        });
        ready(result)
    }
}
