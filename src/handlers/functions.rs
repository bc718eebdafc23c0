//! RPC-style endpoints kept for clients that call them by name.

use actix_web::{post, web, HttpResponse, Responder};
use validator::Validate;

use super::{validation_failed, StoreData};
use crate::models::{ApiResponse, CheckBusinessAccessRequest, CreateBusinessFunctionRequest};
use crate::services::{access, businesses};

/// Idempotent per creator: a user who already owns a business gets that one back.
#[post("/functions/create_business_function")]
pub async fn create_business_function(
    store: StoreData,
    payload: web::Json<CreateBusinessFunctionRequest>,
) -> impl Responder {
    let body = payload.into_inner();
    if let Err(e) = body.validate() {
        return validation_failed(e);
    }

    match businesses::create_business_if_absent(
        store.get_ref(),
        body.name,
        body.description,
        body.user_id,
    )
    .await
    {
        Ok(created) if created.existing => HttpResponse::Ok().json(ApiResponse::success(created)),
        Ok(created) => HttpResponse::Created().json(ApiResponse::success(created)),
        Err(err) => err.into_response("Failed to create business"),
    }
}

#[post("/functions/check_business_access")]
pub async fn check_business_access(
    store: StoreData,
    payload: web::Json<CheckBusinessAccessRequest>,
) -> impl Responder {
    let body = payload.into_inner();
    match access::check_access(store.get_ref(), body.business_id, body.user_id).await {
        Ok(result) => HttpResponse::Ok().json(ApiResponse::success(result)),
        Err(err) => err.into_response("Failed to check business access"),
    }
}
