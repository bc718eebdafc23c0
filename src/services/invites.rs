use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::BusinessInvite;
use crate::store::{MarketStore, StoreResult};

const MAX_CODE_ATTEMPTS: usize = 3;

/// Returns the business's open team code if one is still valid, otherwise stores a fresh one.
///
/// Codes addressed to an email are always new.
pub async fn issue_invite(
    store: &dyn MarketStore,
    business_id: Uuid,
    created_by: Uuid,
    email: Option<String>,
    ttl: Duration,
    now: DateTime<Utc>,
) -> StoreResult<BusinessInvite> {
    if email.is_none() {
        if let Some(active) = store.find_active_invite(business_id, now).await? {
            return Ok(active);
        }
    }

    let mut attempt = 0;
    loop {
        attempt += 1;
        let invite = BusinessInvite::new(business_id, Some(created_by), email.clone(), ttl, now);
        match store.create_invite(invite).await {
            Ok(stored) => {
                log::info!("Issued invite code for business {}", business_id);
                return Ok(stored);
            }
            // Random codes can collide with an existing one.
            Err(StoreError::Conflict(_)) if attempt < MAX_CODE_ATTEMPTS => {
                log::warn!("Invite code collision for business {}, retrying", business_id);
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewBusiness;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn open_code_is_reused_until_expiry() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let business = store
            .create_business(NewBusiness::new("Bay Honey".into(), None, owner))
            .await
            .unwrap();
        let now = Utc::now();

        let first = issue_invite(&store, business.id, owner, None, Duration::days(7), now)
            .await
            .unwrap();
        let second = issue_invite(&store, business.id, owner, None, Duration::days(7), now)
            .await
            .unwrap();
        assert_eq!(first.code, second.code);
        assert_eq!(first.code.len(), BusinessInvite::CODE_LEN);

        let later = now + Duration::days(8);
        let third = issue_invite(&store, business.id, owner, None, Duration::days(7), later)
            .await
            .unwrap();
        assert_ne!(first.code, third.code);
    }

    #[tokio::test]
    async fn email_invites_get_their_own_code() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let business = store
            .create_business(NewBusiness::new("Bay Honey".into(), None, owner))
            .await
            .unwrap();
        let now = Utc::now();

        let open = issue_invite(&store, business.id, owner, None, Duration::days(7), now)
            .await
            .unwrap();
        let addressed = issue_invite(
            &store,
            business.id,
            owner,
            Some("pat@example.com".into()),
            Duration::days(7),
            now,
        )
        .await
        .unwrap();

        assert_ne!(open.code, addressed.code);
        assert_eq!(addressed.email.as_deref(), Some("pat@example.com"));
        assert_eq!(store.row_counts().await.invites, 2);
    }
}
