use actix_web::{get, web, HttpResponse, Responder, ResponseError};
use validator::ValidationErrors;

use crate::auth::{AuthError, AuthenticatedUser};
use crate::models::{ApiResponse, UserRole};
use crate::store::MarketStore;

pub mod admin;
pub mod businesses;
pub mod events;
pub mod functions;
pub mod geocode;
pub mod products;
pub mod profiles;
pub mod team;
pub mod vendors;

/// Store handle shared by all workers.
pub type StoreData = web::Data<dyn MarketStore>;

/// Registers every route under `/api/v1`.
///
/// Literal segments (`/businesses/search`, `/businesses/mine`) are registered
/// before `/businesses/{business_id}` so they are not parsed as ids.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            // Health
            .service(health_check)
            // Vendors
            .service(vendors::vendor_signup)
            .service(vendors::my_vendor)
            // Businesses
            .service(businesses::create_business)
            .service(businesses::search_businesses)
            .service(businesses::my_businesses)
            .service(businesses::get_business_page)
            .service(businesses::update_business)
            .service(businesses::delete_business)
            .service(businesses::business_access)
            // Team
            .service(team::list_members)
            .service(team::update_member_role)
            .service(team::remove_member)
            .service(team::issue_invite)
            .service(team::redeem_invite)
            // Products
            .service(products::list_products)
            .service(products::create_product)
            .service(products::update_product)
            .service(products::delete_product)
            .service(products::interest_summary)
            .service(products::event_products)
            .service(products::set_event_products)
            .service(products::toggle_interest)
            // Events
            .service(events::list_events)
            .service(events::create_event)
            .service(events::get_event)
            .service(events::list_event_vendors)
            .service(events::invite_vendor)
            .service(events::update_invitation_status)
            .service(events::business_event_invites)
            // Profiles
            .service(profiles::get_my_profile)
            .service(profiles::upsert_my_profile)
            // Admin
            .service(admin::list_vendor_applications)
            .service(admin::set_vendor_status)
            .service(admin::set_user_role)
            // Serverless-style functions
            .service(functions::create_business_function)
            .service(functions::check_business_access)
            // Geocoding
            .service(geocode::search_places),
    );
}

// ============================================================================
// HEALTH CHECK
// ============================================================================

#[get("/health")]
pub async fn health_check(store: StoreData) -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "service": "local-market-service",
        "store": store.backend_tag(),
        "timestamp": chrono::Utc::now()
    }))
}

// ============================================================================
// SHARED RESPONSES
// ============================================================================

pub(crate) fn validation_failed(errors: ValidationErrors) -> HttpResponse {
    HttpResponse::BadRequest().json(ApiResponse::<()>::error(format!(
        "Validation failed: {}",
        errors
    )))
}

pub(crate) fn bad_request(message: &str) -> HttpResponse {
    HttpResponse::BadRequest().json(ApiResponse::<()>::error(message.to_string()))
}

pub(crate) fn not_found(message: &str) -> HttpResponse {
    HttpResponse::NotFound().json(ApiResponse::<()>::error(message.to_string()))
}

pub(crate) fn forbidden(message: &str) -> HttpResponse {
    HttpResponse::Forbidden().json(ApiResponse::<()>::error(message.to_string()))
}

/// Passes only callers whose profile carries the admin role.
pub(crate) async fn require_admin(
    store: &dyn MarketStore,
    user: &AuthenticatedUser,
) -> Result<(), HttpResponse> {
    match store.get_profile(user.id).await {
        Ok(Some(profile)) if profile.role == UserRole::Admin => Ok(()),
        Ok(_) => {
            log::warn!("User {} attempted an admin operation", user.id);
            Err(AuthError::NotAdmin.error_response())
        }
        Err(err) => Err(err.into_response("Failed to check admin role")),
    }
}
