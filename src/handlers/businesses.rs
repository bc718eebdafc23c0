use actix_web::{delete, get, post, put, web, HttpResponse, Responder};
use uuid::Uuid;
use validator::Validate;

use super::{not_found, validation_failed, StoreData};
use crate::auth::AuthenticatedUser;
use crate::models::{
    ApiResponse, BusinessAccess, BusinessPage, BusinessRequest, MemberRole, NewBusiness,
    SearchQuery,
};
use crate::services::access;

const SEARCH_LIMIT: i64 = 5;

#[post("/businesses")]
pub async fn create_business(
    store: StoreData,
    user: AuthenticatedUser,
    payload: web::Json<BusinessRequest>,
) -> impl Responder {
    let body = payload.into_inner();
    if let Err(e) = body.validate() {
        return validation_failed(e);
    }

    let new_business = NewBusiness::new(body.name, body.description, user.id);
    match store.create_business(new_business).await {
        Ok(business) => HttpResponse::Created().json(ApiResponse::success(business)),
        Err(err) => err.into_response("Failed to create business"),
    }
}

/// Name lookup used when joining a team.
#[get("/businesses/search")]
pub async fn search_businesses(
    store: StoreData,
    query: web::Query<SearchQuery>,
) -> impl Responder {
    let query = query.into_inner();
    if let Err(e) = query.validate() {
        return validation_failed(e);
    }

    match store.search_businesses(&query.q, SEARCH_LIMIT).await {
        Ok(businesses) => HttpResponse::Ok().json(ApiResponse::success(businesses)),
        Err(err) => err.into_response("Failed to search businesses"),
    }
}

#[get("/businesses/mine")]
pub async fn my_businesses(store: StoreData, user: AuthenticatedUser) -> impl Responder {
    match store.list_businesses_for_user(user.id).await {
        Ok(businesses) => HttpResponse::Ok().json(ApiResponse::success(businesses)),
        Err(err) => err.into_response("Failed to list businesses"),
    }
}

#[get("/businesses/{business_id}")]
pub async fn get_business_page(
    store: StoreData,
    viewer: Option<AuthenticatedUser>,
    business_id: web::Path<Uuid>,
) -> impl Responder {
    let business = match store.get_business(business_id.into_inner()).await {
        Ok(Some(business)) => business,
        Ok(None) => return not_found("Business not found"),
        Err(err) => return err.into_response("Failed to fetch business"),
    };

    let vendors = match store.list_vendors_for_business(business.id).await {
        Ok(vendors) => vendors,
        Err(err) => return err.into_response("Failed to fetch business vendors"),
    };

    let events = match store.list_events_by_creator(business.created_by).await {
        Ok(events) => events,
        Err(err) => return err.into_response("Failed to fetch business events"),
    };

    let viewer_role = match viewer {
        Some(viewer) => match access::role_in(store.get_ref(), &business, viewer.id).await {
            Ok(role) => role,
            Err(err) => return err.into_response("Failed to check business access"),
        },
        None => None,
    };

    HttpResponse::Ok().json(ApiResponse::success(BusinessPage {
        business,
        vendors,
        events,
        viewer_role,
    }))
}

#[put("/businesses/{business_id}")]
pub async fn update_business(
    store: StoreData,
    user: AuthenticatedUser,
    business_id: web::Path<Uuid>,
    payload: web::Json<BusinessRequest>,
) -> impl Responder {
    let body = payload.into_inner();
    if let Err(e) = body.validate() {
        return validation_failed(e);
    }

    let (mut business, _) =
        match access::require_manager(store.get_ref(), business_id.into_inner(), user.id).await {
            Ok(found) => found,
            Err(err) => return err.into_response("Failed to check business access"),
        };

    business.name = body.name;
    business.description = body.description;

    match store.update_business(business).await {
        Ok(updated) => HttpResponse::Ok().json(ApiResponse::success(updated)),
        Err(err) => err.into_response("Failed to update business"),
    }
}

#[delete("/businesses/{business_id}")]
pub async fn delete_business(
    store: StoreData,
    user: AuthenticatedUser,
    business_id: web::Path<Uuid>,
) -> impl Responder {
    let business_id = business_id.into_inner();
    let is_owner = |role: MemberRole| role == MemberRole::Owner;
    if let Err(err) = access::require_role(store.get_ref(), business_id, user.id, is_owner).await {
        return err.into_response("Failed to check business access");
    }

    match store.delete_business(business_id).await {
        Ok(()) => {
            log::info!("Business {} deleted by {}", business_id, user.id);
            HttpResponse::NoContent().finish()
        }
        Err(err) => err.into_response("Failed to delete business"),
    }
}

#[get("/businesses/{business_id}/access")]
pub async fn business_access(
    store: StoreData,
    user: AuthenticatedUser,
    business_id: web::Path<Uuid>,
) -> impl Responder {
    let business = match store.get_business(business_id.into_inner()).await {
        Ok(Some(business)) => business,
        Ok(None) => return not_found("Business not found"),
        Err(err) => return err.into_response("Failed to fetch business"),
    };

    match access::role_in(store.get_ref(), &business, user.id).await {
        Ok(role) => HttpResponse::Ok().json(ApiResponse::success(BusinessAccess {
            has_access: role.is_some(),
            role,
        })),
        Err(err) => err.into_response("Failed to check business access"),
    }
}
