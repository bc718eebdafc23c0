use actix_web::{get, post, put, web, HttpResponse, Responder};
use uuid::Uuid;
use validator::Validate;

use super::{bad_request, forbidden, not_found, validation_failed, StoreData};
use crate::auth::AuthenticatedUser;
use crate::models::{
    ApiResponse, CreateEventRequest, EventQuery, InvitationStatusRequest, InviteVendorRequest,
};
use crate::services::access;

// ============================================================================
// EVENTS
// ============================================================================

#[get("/events")]
pub async fn list_events(store: StoreData, query: web::Query<EventQuery>) -> impl Responder {
    let mut query = query.into_inner();
    query.city = query.city.map(|c| c.trim().to_string()).filter(|c| !c.is_empty());
    query.q = query.q.map(|q| q.trim().to_string()).filter(|q| !q.is_empty());

    match store.search_events(&query).await {
        Ok(events) => HttpResponse::Ok().json(ApiResponse::success(events)),
        Err(err) => err.into_response("Failed to search events"),
    }
}

#[post("/events")]
pub async fn create_event(
    store: StoreData,
    user: AuthenticatedUser,
    payload: web::Json<CreateEventRequest>,
) -> impl Responder {
    let body = payload.into_inner();
    if let Err(e) = body.validate() {
        return validation_failed(e);
    }
    if let Err(message) = body.validate_business_rules() {
        return bad_request(&message);
    }

    match store.create_event(body.into_event(user.id)).await {
        Ok(event) => {
            log::info!("Event {} created by {}", event.id, user.id);
            HttpResponse::Created().json(ApiResponse::success(event))
        }
        Err(err) => err.into_response("Failed to create event"),
    }
}

#[get("/events/{event_id}")]
pub async fn get_event(store: StoreData, event_id: web::Path<Uuid>) -> impl Responder {
    match store.get_event(event_id.into_inner()).await {
        Ok(Some(event)) => HttpResponse::Ok().json(ApiResponse::success(event)),
        Ok(None) => not_found("Event not found"),
        Err(err) => err.into_response("Failed to fetch event"),
    }
}

// ============================================================================
// VENDOR INVITATIONS
// ============================================================================

#[get("/events/{event_id}/vendors")]
pub async fn list_event_vendors(store: StoreData, event_id: web::Path<Uuid>) -> impl Responder {
    let event_id = event_id.into_inner();
    match store.get_event(event_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return not_found("Event not found"),
        Err(err) => return err.into_response("Failed to fetch event"),
    }

    match store.list_event_vendors(event_id).await {
        Ok(vendors) => HttpResponse::Ok().json(ApiResponse::success(vendors)),
        Err(err) => err.into_response("Failed to list event vendors"),
    }
}

#[post("/events/{event_id}/vendors")]
pub async fn invite_vendor(
    store: StoreData,
    user: AuthenticatedUser,
    event_id: web::Path<Uuid>,
    payload: web::Json<InviteVendorRequest>,
) -> impl Responder {
    let event = match store.get_event(event_id.into_inner()).await {
        Ok(Some(event)) => event,
        Ok(None) => return not_found("Event not found"),
        Err(err) => return err.into_response("Failed to fetch event"),
    };

    if event.created_by != user.id {
        return forbidden("Only the event organizer can invite vendors");
    }

    let body = payload.into_inner();
    match store.get_business(body.business_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return not_found("Business not found"),
        Err(err) => return err.into_response("Failed to fetch business"),
    }

    match store.invite_vendor(body.into_event_vendor(event.id)).await {
        Ok(invitation) => {
            log::info!(
                "Business {} invited to event {}",
                invitation.business_id,
                invitation.event_id
            );
            HttpResponse::Created().json(ApiResponse::success(invitation))
        }
        Err(err) => err.into_response("Failed to invite vendor"),
    }
}

/// Accept or decline; an invitation can be answered once.
#[put("/event-vendors/{invitation_id}/status")]
pub async fn update_invitation_status(
    store: StoreData,
    user: AuthenticatedUser,
    invitation_id: web::Path<Uuid>,
    payload: web::Json<InvitationStatusRequest>,
) -> impl Responder {
    let invitation = match store.get_event_vendor(invitation_id.into_inner()).await {
        Ok(Some(invitation)) => invitation,
        Ok(None) => return not_found("Invitation not found"),
        Err(err) => return err.into_response("Failed to fetch invitation"),
    };

    if let Err(err) =
        access::require_member(store.get_ref(), invitation.business_id, user.id).await
    {
        return err.into_response("Failed to check business access");
    }

    let status = payload.into_inner().status;
    match store.set_event_vendor_status(invitation.id, status).await {
        Ok(updated) => {
            log::info!(
                "Invitation {} for event {} is now {}",
                updated.id,
                updated.event_id,
                updated.status
            );
            HttpResponse::Ok().json(ApiResponse::success(updated))
        }
        Err(err) => err.into_response("Failed to update invitation"),
    }
}

#[get("/businesses/{business_id}/event-invites")]
pub async fn business_event_invites(
    store: StoreData,
    user: AuthenticatedUser,
    business_id: web::Path<Uuid>,
) -> impl Responder {
    let business_id = business_id.into_inner();
    if let Err(err) = access::require_member(store.get_ref(), business_id, user.id).await {
        return err.into_response("Failed to check business access");
    }

    match store.list_invitations_for_business(business_id).await {
        Ok(invitations) => HttpResponse::Ok().json(ApiResponse::success(invitations)),
        Err(err) => err.into_response("Failed to list event invitations"),
    }
}
