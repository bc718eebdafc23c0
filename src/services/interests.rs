use futures_util::future::try_join_all;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::ProductCard;
use crate::store::{MarketStore, StoreResult};

/// Products showcased at an event, each with its interest count and whether `viewer` liked it.
///
/// The per-product lookups run concurrently; the result keeps listing order.
pub async fn event_product_cards(
    store: &dyn MarketStore,
    event_id: Uuid,
    viewer: Option<Uuid>,
) -> StoreResult<Vec<ProductCard>> {
    let listings = store.list_event_products(event_id).await?;

    let cards = listings.into_iter().map(move |listing| async move {
        let product_id = listing.product.id;
        let interest_count = store.count_interests(product_id, event_id).await?;
        let interested = match viewer {
            Some(user_id) => store.has_interest(product_id, event_id, user_id).await?,
            None => false,
        };
        Ok::<_, StoreError>(ProductCard {
            listing,
            interest_count,
            interested,
        })
    });

    try_join_all(cards).await
}
