//! Persistence seam between the HTTP layer and storage.
//!
//! [`MarketStore`] is implemented by [`PgStore`] (Postgres through `sqlx`) and
//! [`MemoryStore`] (in-process tables). Both give the same guarantees for the
//! multi-row operations: vendor signup, invite redemption, product selection
//! and interest toggling each happen as one unit.

mod memory;
mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{
    Business, BusinessInvite, BusinessMember, Event, EventProduct, EventProductListing, EventQuery,
    EventVendor, EventVendorListing, InterestToggle, InvitationStatus, InviteRedemption,
    MemberRole, NewBusiness, NewVendorSignup, Product, ProductInterestSummary, Profile,
    ReceivedInvitation, UserRole, Vendor, VendorLocation, VendorRegistration, VendorStatus,
};

pub use memory::{MemoryStore, RowCounts};
pub use postgres::{create_database_if_missing, PgStore};

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait MarketStore: Send + Sync {
    fn backend_tag(&self) -> &'static str;

    // Businesses
    async fn create_business(&self, business: NewBusiness) -> StoreResult<Business>;
    async fn get_business(&self, business_id: Uuid) -> StoreResult<Option<Business>>;
    async fn find_business_by_owner(&self, user_id: Uuid) -> StoreResult<Option<Business>>;
    async fn search_businesses(&self, name: &str, limit: i64) -> StoreResult<Vec<Business>>;
    async fn list_businesses_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Business>>;
    async fn update_business(&self, business: Business) -> StoreResult<Business>;
    async fn delete_business(&self, business_id: Uuid) -> StoreResult<()>;

    // Team
    async fn add_member(&self, member: BusinessMember) -> StoreResult<BusinessMember>;
    async fn get_member(&self, member_id: Uuid) -> StoreResult<Option<BusinessMember>>;
    async fn get_membership(
        &self,
        business_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<Option<BusinessMember>>;
    async fn list_members(&self, business_id: Uuid) -> StoreResult<Vec<BusinessMember>>;
    async fn update_member_role(&self, member_id: Uuid, role: MemberRole) -> StoreResult<BusinessMember>;
    async fn remove_member(&self, member_id: Uuid) -> StoreResult<()>;

    // Invite codes
    async fn create_invite(&self, invite: BusinessInvite) -> StoreResult<BusinessInvite>;
    async fn find_active_invite(
        &self,
        business_id: Uuid,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<BusinessInvite>>;
    /// Joins `user_id` to the invite's business and links (or creates) their vendor record.
    async fn redeem_invite(
        &self,
        code: &str,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> StoreResult<InviteRedemption>;

    // Vendors
    async fn register_vendor(&self, signup: NewVendorSignup) -> StoreResult<VendorRegistration>;
    async fn get_vendor(&self, vendor_id: Uuid) -> StoreResult<Option<Vendor>>;
    async fn get_vendor_for_user(&self, user_id: Uuid) -> StoreResult<Option<Vendor>>;
    async fn get_vendor_location(&self, vendor_id: Uuid) -> StoreResult<Option<VendorLocation>>;
    async fn list_vendors(&self, status: Option<VendorStatus>) -> StoreResult<Vec<Vendor>>;
    async fn list_vendors_for_business(&self, business_id: Uuid) -> StoreResult<Vec<Vendor>>;
    async fn set_vendor_status(&self, vendor_id: Uuid, status: VendorStatus) -> StoreResult<Vendor>;

    // Profiles
    async fn get_profile(&self, user_id: Uuid) -> StoreResult<Option<Profile>>;
    /// Inserts or renames; role and vendor flag of an existing profile are kept.
    async fn upsert_profile(&self, profile: Profile) -> StoreResult<Profile>;
    async fn set_profile_role(&self, user_id: Uuid, role: UserRole) -> StoreResult<Profile>;

    // Events
    async fn create_event(&self, event: Event) -> StoreResult<Event>;
    async fn get_event(&self, event_id: Uuid) -> StoreResult<Option<Event>>;
    async fn search_events(&self, query: &EventQuery) -> StoreResult<Vec<Event>>;
    async fn list_events_by_creator(&self, user_id: Uuid) -> StoreResult<Vec<Event>>;

    // Event invitations
    async fn invite_vendor(&self, invitation: EventVendor) -> StoreResult<EventVendor>;
    async fn get_event_vendor(&self, invitation_id: Uuid) -> StoreResult<Option<EventVendor>>;
    async fn get_event_vendor_for_business(
        &self,
        event_id: Uuid,
        business_id: Uuid,
    ) -> StoreResult<Option<EventVendor>>;
    async fn list_event_vendors(&self, event_id: Uuid) -> StoreResult<Vec<EventVendorListing>>;
    async fn list_invitations_for_business(
        &self,
        business_id: Uuid,
    ) -> StoreResult<Vec<ReceivedInvitation>>;
    async fn set_event_vendor_status(
        &self,
        invitation_id: Uuid,
        status: InvitationStatus,
    ) -> StoreResult<EventVendor>;

    // Products
    async fn create_product(&self, product: Product) -> StoreResult<Product>;
    async fn get_product(&self, product_id: Uuid) -> StoreResult<Option<Product>>;
    async fn list_products_for_business(&self, business_id: Uuid) -> StoreResult<Vec<Product>>;
    async fn update_product(&self, product: Product) -> StoreResult<Product>;
    async fn delete_product(&self, product_id: Uuid) -> StoreResult<()>;

    // Products showcased at events
    /// Replaces the business's selection for the event with `product_ids`.
    async fn set_event_products(
        &self,
        event_id: Uuid,
        business_id: Uuid,
        product_ids: &[Uuid],
    ) -> StoreResult<Vec<EventProduct>>;
    async fn list_event_products(&self, event_id: Uuid) -> StoreResult<Vec<EventProductListing>>;
    async fn is_product_at_event(&self, event_id: Uuid, product_id: Uuid) -> StoreResult<bool>;

    // Interest
    async fn toggle_interest(
        &self,
        product_id: Uuid,
        event_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<InterestToggle>;
    async fn count_interests(&self, product_id: Uuid, event_id: Uuid) -> StoreResult<i64>;
    async fn has_interest(&self, product_id: Uuid, event_id: Uuid, user_id: Uuid) -> StoreResult<bool>;
    async fn interest_summary_for_business(
        &self,
        business_id: Uuid,
    ) -> StoreResult<Vec<ProductInterestSummary>>;
}

/// `ILIKE` pattern matching `needle` anywhere, with wildcards in the input escaped.
pub(crate) fn contains_pattern(needle: &str) -> String {
    let escaped = needle
        .trim()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

/// Vendor record created for someone joining a team without signing up first.
pub(crate) fn team_vendor(user_id: Uuid, business: &Business, now: DateTime<Utc>) -> Vendor {
    Vendor {
        id: user_id,
        user_id,
        business_id: Some(business.id),
        business_name: business.name.clone(),
        business_category: "other".into(),
        description: None,
        website: None,
        instagram: None,
        status: VendorStatus::Approved,
        created_at: now,
        updated_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(contains_pattern(" honey "), "%honey%");
        assert_eq!(contains_pattern("50%_off"), "%50\\%\\_off%");
    }
}
