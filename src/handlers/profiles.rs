use actix_web::{get, put, web, HttpResponse, Responder};
use validator::Validate;

use super::{validation_failed, StoreData};
use crate::auth::AuthenticatedUser;
use crate::models::{ApiResponse, ProfileOverview, ProfileRequest};

#[get("/profiles/me")]
pub async fn get_my_profile(store: StoreData, user: AuthenticatedUser) -> impl Responder {
    let profile = match store.get_profile(user.id).await {
        Ok(profile) => profile,
        Err(err) => return err.into_response("Failed to fetch profile"),
    };

    let vendor = match store.get_vendor_for_user(user.id).await {
        Ok(vendor) => vendor,
        Err(err) => return err.into_response("Failed to fetch vendor"),
    };

    let is_vendor = vendor.is_some() || profile.as_ref().map_or(false, |p| p.is_vendor);
    HttpResponse::Ok().json(ApiResponse::success(ProfileOverview {
        profile,
        vendor,
        is_vendor,
    }))
}

#[put("/profiles/me")]
pub async fn upsert_my_profile(
    store: StoreData,
    user: AuthenticatedUser,
    payload: web::Json<ProfileRequest>,
) -> impl Responder {
    let body = payload.into_inner();
    if let Err(e) = body.validate() {
        return validation_failed(e);
    }

    match store.upsert_profile(body.into_profile(user.id)).await {
        Ok(profile) => HttpResponse::Ok().json(ApiResponse::success(profile)),
        Err(err) => err.into_response("Failed to save profile"),
    }
}
