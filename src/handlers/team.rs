use actix_web::{delete, get, post, put, web, HttpResponse, Responder};
use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use super::{bad_request, not_found, validation_failed, StoreData};
use crate::auth::AuthenticatedUser;
use crate::config::AppConfig;
use crate::models::{
    ApiResponse, BusinessMember, IssueInviteRequest, MemberRole, RedeemInviteRequest,
    UpdateMemberRoleRequest,
};
use crate::services::{access, invites};
use crate::store::MarketStore;

#[derive(serde::Deserialize)]
pub struct MemberPath {
    pub business_id: Uuid,
    pub member_id: Uuid,
}

/// Member row addressed through its business, so ids from another team are not found.
async fn member_of(
    store: &dyn MarketStore,
    path: &MemberPath,
) -> Result<BusinessMember, HttpResponse> {
    match store.get_member(path.member_id).await {
        Ok(Some(member)) if member.business_id == path.business_id => Ok(member),
        Ok(_) => Err(not_found("Member not found")),
        Err(err) => Err(err.into_response("Failed to fetch member")),
    }
}

// ============================================================================
// ROSTER
// ============================================================================

#[get("/businesses/{business_id}/members")]
pub async fn list_members(
    store: StoreData,
    user: AuthenticatedUser,
    business_id: web::Path<Uuid>,
) -> impl Responder {
    let business_id = business_id.into_inner();
    if let Err(err) = access::require_member(store.get_ref(), business_id, user.id).await {
        return err.into_response("Failed to check business access");
    }

    match store.list_members(business_id).await {
        Ok(members) => HttpResponse::Ok().json(ApiResponse::success(members)),
        Err(err) => err.into_response("Failed to list members"),
    }
}

#[put("/businesses/{business_id}/members/{member_id}")]
pub async fn update_member_role(
    store: StoreData,
    user: AuthenticatedUser,
    path: web::Path<MemberPath>,
    payload: web::Json<UpdateMemberRoleRequest>,
) -> impl Responder {
    let role = payload.into_inner().role;
    if role == MemberRole::Owner {
        return bad_request("Ownership cannot be granted");
    }

    if let Err(err) = access::require_manager(store.get_ref(), path.business_id, user.id).await {
        return err.into_response("Failed to check business access");
    }

    let member = match member_of(store.get_ref(), &path).await {
        Ok(member) => member,
        Err(response) => return response,
    };

    match store.update_member_role(member.id, role).await {
        Ok(updated) => {
            log::info!(
                "Member {} of business {} is now {:?}",
                updated.user_id,
                updated.business_id,
                updated.role
            );
            HttpResponse::Ok().json(ApiResponse::success(updated))
        }
        Err(err) => err.into_response("Failed to update member role"),
    }
}

#[delete("/businesses/{business_id}/members/{member_id}")]
pub async fn remove_member(
    store: StoreData,
    user: AuthenticatedUser,
    path: web::Path<MemberPath>,
) -> impl Responder {
    if let Err(err) = access::require_manager(store.get_ref(), path.business_id, user.id).await {
        return err.into_response("Failed to check business access");
    }

    let member = match member_of(store.get_ref(), &path).await {
        Ok(member) => member,
        Err(response) => return response,
    };

    match store.remove_member(member.id).await {
        Ok(()) => HttpResponse::NoContent().finish(),
        Err(err) => err.into_response("Failed to remove member"),
    }
}

// ============================================================================
// INVITE CODES
// ============================================================================

#[post("/businesses/{business_id}/invites")]
pub async fn issue_invite(
    store: StoreData,
    config: web::Data<AppConfig>,
    user: AuthenticatedUser,
    business_id: web::Path<Uuid>,
    payload: web::Json<IssueInviteRequest>,
) -> impl Responder {
    let body = payload.into_inner();
    if let Err(e) = body.validate() {
        return validation_failed(e);
    }

    let business_id = business_id.into_inner();
    if let Err(err) = access::require_manager(store.get_ref(), business_id, user.id).await {
        return err.into_response("Failed to check business access");
    }

    let email = body.email.filter(|e| !e.trim().is_empty());
    match invites::issue_invite(
        store.get_ref(),
        business_id,
        user.id,
        email,
        config.invite_ttl(),
        Utc::now(),
    )
    .await
    {
        Ok(invite) => HttpResponse::Created().json(ApiResponse::success(invite)),
        Err(err) => err.into_response("Failed to issue invite"),
    }
}

#[post("/invites/redeem")]
pub async fn redeem_invite(
    store: StoreData,
    user: AuthenticatedUser,
    payload: web::Json<RedeemInviteRequest>,
) -> impl Responder {
    let body = payload.into_inner();
    if let Err(e) = body.validate() {
        return validation_failed(e);
    }

    match store.redeem_invite(&body.code, user.id, Utc::now()).await {
        Ok(redemption) if redemption.already_member => {
            log::info!(
                "User {} redeemed a code for business {} they already belong to",
                user.id,
                redemption.business_id
            );
            HttpResponse::Ok().json(ApiResponse::success(redemption))
        }
        Ok(redemption) => {
            log::info!(
                "User {} joined business {} with an invite code",
                user.id,
                redemption.business_id
            );
            HttpResponse::Ok().json(ApiResponse::success(redemption))
        }
        Err(err) => err.into_response("Failed to redeem invite"),
    }
}
