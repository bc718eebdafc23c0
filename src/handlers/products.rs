use actix_web::{delete, get, post, put, web, HttpResponse, Responder};
use uuid::Uuid;
use validator::Validate;

use super::{forbidden, not_found, validation_failed, StoreData};
use crate::auth::AuthenticatedUser;
use crate::models::{ApiResponse, EventProductSelection, InvitationStatus, ProductRequest};
use crate::services::{access, interests};

// ============================================================================
// BUSINESS CATALOGUE
// ============================================================================

#[get("/businesses/{business_id}/products")]
pub async fn list_products(store: StoreData, business_id: web::Path<Uuid>) -> impl Responder {
    let business_id = business_id.into_inner();
    match store.get_business(business_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return not_found("Business not found"),
        Err(err) => return err.into_response("Failed to fetch business"),
    }

    match store.list_products_for_business(business_id).await {
        Ok(products) => HttpResponse::Ok().json(ApiResponse::success(products)),
        Err(err) => err.into_response("Failed to list products"),
    }
}

#[post("/businesses/{business_id}/products")]
pub async fn create_product(
    store: StoreData,
    user: AuthenticatedUser,
    business_id: web::Path<Uuid>,
    payload: web::Json<ProductRequest>,
) -> impl Responder {
    let body = payload.into_inner();
    if let Err(e) = body.validate() {
        return validation_failed(e);
    }

    let business_id = business_id.into_inner();
    if let Err(err) = access::require_member(store.get_ref(), business_id, user.id).await {
        return err.into_response("Failed to check business access");
    }

    match store.create_product(body.into_product(business_id)).await {
        Ok(product) => HttpResponse::Created().json(ApiResponse::success(product)),
        Err(err) => err.into_response("Failed to create product"),
    }
}

#[put("/products/{product_id}")]
pub async fn update_product(
    store: StoreData,
    user: AuthenticatedUser,
    product_id: web::Path<Uuid>,
    payload: web::Json<ProductRequest>,
) -> impl Responder {
    let body = payload.into_inner();
    if let Err(e) = body.validate() {
        return validation_failed(e);
    }

    let mut product = match store.get_product(product_id.into_inner()).await {
        Ok(Some(product)) => product,
        Ok(None) => return not_found("Product not found"),
        Err(err) => return err.into_response("Failed to fetch product"),
    };

    if let Err(err) = access::require_member(store.get_ref(), product.business_id, user.id).await {
        return err.into_response("Failed to check business access");
    }

    body.apply_to_existing(&mut product);
    match store.update_product(product).await {
        Ok(updated) => HttpResponse::Ok().json(ApiResponse::success(updated)),
        Err(err) => err.into_response("Failed to update product"),
    }
}

#[delete("/products/{product_id}")]
pub async fn delete_product(
    store: StoreData,
    user: AuthenticatedUser,
    product_id: web::Path<Uuid>,
) -> impl Responder {
    let product = match store.get_product(product_id.into_inner()).await {
        Ok(Some(product)) => product,
        Ok(None) => return not_found("Product not found"),
        Err(err) => return err.into_response("Failed to fetch product"),
    };

    if let Err(err) = access::require_member(store.get_ref(), product.business_id, user.id).await {
        return err.into_response("Failed to check business access");
    }

    match store.delete_product(product.id).await {
        Ok(()) => HttpResponse::NoContent().finish(),
        Err(err) => err.into_response("Failed to delete product"),
    }
}

/// Interest counts for every product the business shows at an event.
#[get("/businesses/{business_id}/interest-summary")]
pub async fn interest_summary(
    store: StoreData,
    user: AuthenticatedUser,
    business_id: web::Path<Uuid>,
) -> impl Responder {
    let business_id = business_id.into_inner();
    if let Err(err) = access::require_member(store.get_ref(), business_id, user.id).await {
        return err.into_response("Failed to check business access");
    }

    match store.interest_summary_for_business(business_id).await {
        Ok(summary) => HttpResponse::Ok().json(ApiResponse::success(summary)),
        Err(err) => err.into_response("Failed to fetch interest summary"),
    }
}

// ============================================================================
// PRODUCTS AT EVENTS
// ============================================================================

#[get("/events/{event_id}/products")]
pub async fn event_products(
    store: StoreData,
    viewer: Option<AuthenticatedUser>,
    event_id: web::Path<Uuid>,
) -> impl Responder {
    let event_id = event_id.into_inner();
    match store.get_event(event_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return not_found("Event not found"),
        Err(err) => return err.into_response("Failed to fetch event"),
    }

    let viewer_id = viewer.map(|v| v.id);
    match interests::event_product_cards(store.get_ref(), event_id, viewer_id).await {
        Ok(cards) => HttpResponse::Ok().json(ApiResponse::success(cards)),
        Err(err) => err.into_response("Failed to fetch event products"),
    }
}

#[derive(serde::Deserialize)]
pub struct EventBusinessPath {
    pub event_id: Uuid,
    pub business_id: Uuid,
}

/// Replaces the products a business shows at an event; the business must have accepted its invitation.
#[put("/events/{event_id}/businesses/{business_id}/products")]
pub async fn set_event_products(
    store: StoreData,
    user: AuthenticatedUser,
    path: web::Path<EventBusinessPath>,
    payload: web::Json<EventProductSelection>,
) -> impl Responder {
    let EventBusinessPath {
        event_id,
        business_id,
    } = path.into_inner();

    if let Err(err) = access::require_member(store.get_ref(), business_id, user.id).await {
        return err.into_response("Failed to check business access");
    }

    match store.get_event_vendor_for_business(event_id, business_id).await {
        Ok(Some(invitation)) if invitation.status == InvitationStatus::Accepted => {}
        Ok(Some(_)) | Ok(None) => {
            return forbidden("Business has not accepted an invitation to this event")
        }
        Err(err) => return err.into_response("Failed to fetch invitation"),
    }

    let selection = payload.into_inner();
    match store
        .set_event_products(event_id, business_id, &selection.product_ids)
        .await
    {
        Ok(stored) => HttpResponse::Ok().json(ApiResponse::success(stored)),
        Err(err) => err.into_response("Failed to update event products"),
    }
}

#[derive(serde::Deserialize)]
pub struct EventProductPath {
    pub event_id: Uuid,
    pub product_id: Uuid,
}

#[post("/events/{event_id}/products/{product_id}/interest")]
pub async fn toggle_interest(
    store: StoreData,
    user: AuthenticatedUser,
    path: web::Path<EventProductPath>,
) -> impl Responder {
    let EventProductPath {
        event_id,
        product_id,
    } = path.into_inner();

    match store.is_product_at_event(event_id, product_id).await {
        Ok(true) => {}
        Ok(false) => return not_found("Product is not shown at this event"),
        Err(err) => return err.into_response("Failed to fetch event product"),
    }

    match store.toggle_interest(product_id, event_id, user.id).await {
        Ok(toggle) => HttpResponse::Ok().json(ApiResponse::success(toggle)),
        Err(err) => err.into_response("Failed to toggle interest"),
    }
}
