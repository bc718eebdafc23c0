use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{Business, BusinessAccess, MemberRole};
use crate::store::{MarketStore, StoreResult};

/// Role of `user_id` in `business`: the creator is always the owner, anyone else needs a member row.
pub async fn role_in(
    store: &dyn MarketStore,
    business: &Business,
    user_id: Uuid,
) -> StoreResult<Option<MemberRole>> {
    if business.created_by == user_id {
        return Ok(Some(MemberRole::Owner));
    }

    let membership = store.get_membership(business.id, user_id).await?;
    Ok(membership.map(|member| member.role))
}

pub async fn business_role(
    store: &dyn MarketStore,
    business_id: Uuid,
    user_id: Uuid,
) -> StoreResult<Option<MemberRole>> {
    match store.get_business(business_id).await? {
        Some(business) => role_in(store, &business, user_id).await,
        None => Ok(None),
    }
}

pub async fn check_access(
    store: &dyn MarketStore,
    business_id: Uuid,
    user_id: Uuid,
) -> StoreResult<BusinessAccess> {
    let role = business_role(store, business_id, user_id).await?;
    Ok(BusinessAccess {
        has_access: role.is_some(),
        role,
    })
}

/// Loads the business and checks the caller holds a role accepted by `allowed`.
pub async fn require_role<F>(
    store: &dyn MarketStore,
    business_id: Uuid,
    user_id: Uuid,
    allowed: F,
) -> StoreResult<(Business, MemberRole)>
where
    F: Fn(MemberRole) -> bool,
{
    let business = store
        .get_business(business_id)
        .await?
        .ok_or(StoreError::NotFound("Business"))?;

    match role_in(store, &business, user_id).await? {
        Some(role) if allowed(role) => Ok((business, role)),
        Some(_) => Err(StoreError::Forbidden(
            "Insufficient role for this business".into(),
        )),
        None => Err(StoreError::Forbidden(
            "Not a member of this business".into(),
        )),
    }
}

pub async fn require_member(
    store: &dyn MarketStore,
    business_id: Uuid,
    user_id: Uuid,
) -> StoreResult<(Business, MemberRole)> {
    require_role(store, business_id, user_id, |_| true).await
}

pub async fn require_manager(
    store: &dyn MarketStore,
    business_id: Uuid,
    user_id: Uuid,
) -> StoreResult<(Business, MemberRole)> {
    require_role(store, business_id, user_id, MemberRole::can_manage).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BusinessMember, NewBusiness};
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn owner_member_and_stranger() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let member = Uuid::new_v4();
        let business = store
            .create_business(NewBusiness::new("Bay Honey".into(), None, owner))
            .await
            .unwrap();
        store
            .add_member(BusinessMember::new(business.id, member, MemberRole::Member))
            .await
            .unwrap();

        let access = check_access(&store, business.id, owner).await.unwrap();
        assert_eq!(access.role, Some(MemberRole::Owner));

        let access = check_access(&store, business.id, member).await.unwrap();
        assert_eq!(access.role, Some(MemberRole::Member));

        let access = check_access(&store, business.id, Uuid::new_v4()).await.unwrap();
        assert_eq!(access, BusinessAccess { has_access: false, role: None });
    }

    #[tokio::test]
    async fn plain_members_cannot_manage() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let member = Uuid::new_v4();
        let business = store
            .create_business(NewBusiness::new("Bay Honey".into(), None, owner))
            .await
            .unwrap();
        store
            .add_member(BusinessMember::new(business.id, member, MemberRole::Member))
            .await
            .unwrap();

        assert!(require_member(&store, business.id, member).await.is_ok());
        let err = require_manager(&store, business.id, member).await.unwrap_err();
        assert!(matches!(err, StoreError::Forbidden(_)));
        assert!(require_manager(&store, business.id, owner).await.is_ok());
    }
}
