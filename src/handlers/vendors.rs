use actix_web::{get, post, web, HttpResponse, Responder};
use validator::Validate;

use super::{not_found, validation_failed, StoreData};
use crate::auth::AuthenticatedUser;
use crate::config::AppConfig;
use crate::error::StoreError;
use crate::models::{ApiResponse, VendorSignupRequest, VendorStatus, VendorWithLocation};

// ============================================================================
// VENDOR SIGNUP
// ============================================================================

/// Business, vendor and location are written in one transaction.
#[post("/vendors/signup")]
pub async fn vendor_signup(
    store: StoreData,
    config: web::Data<AppConfig>,
    user: AuthenticatedUser,
    payload: web::Json<VendorSignupRequest>,
) -> impl Responder {
    let body = payload.into_inner();
    if let Err(e) = body.validate() {
        return validation_failed(e);
    }

    let initial_status = if config.vendor_auto_approve {
        VendorStatus::Approved
    } else {
        VendorStatus::Pending
    };

    match store
        .register_vendor(body.into_new_signup(user.id, initial_status))
        .await
    {
        Ok(registration) => {
            log::info!(
                "Registered vendor {} with business {} ({})",
                registration.vendor.id,
                registration.business.id,
                registration.vendor.status
            );
            HttpResponse::Created().json(ApiResponse::success(registration))
        }
        Err(StoreError::Conflict(_)) => HttpResponse::Conflict().json(ApiResponse::<()>::error(
            "A vendor profile already exists for this user".into(),
        )),
        Err(err) => err.into_response("Failed to register vendor"),
    }
}

#[get("/vendors/me")]
pub async fn my_vendor(store: StoreData, user: AuthenticatedUser) -> impl Responder {
    let vendor = match store.get_vendor_for_user(user.id).await {
        Ok(Some(vendor)) => vendor,
        Ok(None) => return not_found("No vendor profile for this user"),
        Err(err) => return err.into_response("Failed to fetch vendor"),
    };

    match store.get_vendor_location(vendor.id).await {
        Ok(location) => {
            HttpResponse::Ok().json(ApiResponse::success(VendorWithLocation { vendor, location }))
        }
        Err(err) => err.into_response("Failed to fetch vendor location"),
    }
}
