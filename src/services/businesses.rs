use uuid::Uuid;

use crate::models::{CreatedBusiness, NewBusiness};
use crate::store::{MarketStore, StoreResult};

/// Creates a business for `user_id` unless they already own one.
pub async fn create_business_if_absent(
    store: &dyn MarketStore,
    name: String,
    description: Option<String>,
    user_id: Uuid,
) -> StoreResult<CreatedBusiness> {
    if let Some(existing) = store.find_business_by_owner(user_id).await? {
        log::debug!("User {} already owns business {}", user_id, existing.id);
        return Ok(CreatedBusiness {
            id: existing.id,
            existing: true,
        });
    }

    let business = store
        .create_business(NewBusiness::new(name, description, user_id))
        .await?;
    log::info!("Created business {} for user {}", business.id, user_id);

    Ok(CreatedBusiness {
        id: business.id,
        existing: false,
    })
}
