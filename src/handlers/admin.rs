use actix_web::{get, put, web, HttpResponse, Responder};
use uuid::Uuid;

use super::{require_admin, StoreData};
use crate::auth::AuthenticatedUser;
use crate::models::{ApiResponse, UserRoleRequest, VendorListQuery, VendorStatusRequest};

// ============================================================================
// VENDOR APPLICATIONS
// ============================================================================

#[get("/admin/vendors")]
pub async fn list_vendor_applications(
    store: StoreData,
    user: AuthenticatedUser,
    query: web::Query<VendorListQuery>,
) -> impl Responder {
    if let Err(response) = require_admin(store.get_ref(), &user).await {
        return response;
    }

    match store.list_vendors(query.status).await {
        Ok(vendors) => HttpResponse::Ok().json(ApiResponse::success(vendors)),
        Err(err) => err.into_response("Failed to list vendors"),
    }
}

/// Approve or reject; a reviewed vendor may be reviewed again but never returns to pending.
#[put("/admin/vendors/{vendor_id}/status")]
pub async fn set_vendor_status(
    store: StoreData,
    user: AuthenticatedUser,
    vendor_id: web::Path<Uuid>,
    payload: web::Json<VendorStatusRequest>,
) -> impl Responder {
    if let Err(response) = require_admin(store.get_ref(), &user).await {
        return response;
    }

    let vendor_id = vendor_id.into_inner();
    let status = payload.into_inner().status;
    match store.set_vendor_status(vendor_id, status).await {
        Ok(vendor) => {
            log::info!("Vendor {} set to {} by {}", vendor.id, vendor.status, user.id);
            HttpResponse::Ok().json(ApiResponse::success(vendor))
        }
        Err(err) => err.into_response("Failed to update vendor status"),
    }
}

// ============================================================================
// USER ROLES
// ============================================================================

#[put("/admin/users/{user_id}/role")]
pub async fn set_user_role(
    store: StoreData,
    user: AuthenticatedUser,
    target: web::Path<Uuid>,
    payload: web::Json<UserRoleRequest>,
) -> impl Responder {
    if let Err(response) = require_admin(store.get_ref(), &user).await {
        return response;
    }

    let target = target.into_inner();
    match store.set_profile_role(target, payload.into_inner().role).await {
        Ok(profile) => {
            log::info!("User {} role set to {:?} by {}", target, profile.role, user.id);
            HttpResponse::Ok().json(ApiResponse::success(profile))
        }
        Err(err) => err.into_response("Failed to update user role"),
    }
}
