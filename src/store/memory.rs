use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{team_vendor, MarketStore, StoreResult};
use crate::error::StoreError;
use crate::models::{
    Business, BusinessInvite, BusinessMember, BusinessSummary, Event, EventProduct,
    EventProductListing, EventQuery, EventVendor, EventVendorListing, InterestToggle,
    InvitationStatus, InviteRedemption, InviteRejection, InviteStatus, MemberRole, NewBusiness,
    NewVendorSignup, Product, ProductInterest, ProductInterestSummary, Profile,
    ReceivedInvitation, UserRole, Vendor, VendorLocation, VendorRegistration, VendorStatus,
    VendorSummary,
};
use crate::status::StatusFlow;

/// Number of rows per table, used to assert that failed writes left nothing behind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RowCounts {
    pub businesses: usize,
    pub vendors: usize,
    pub vendor_locations: usize,
    pub members: usize,
    pub invites: usize,
    pub profiles: usize,
    pub events: usize,
    pub event_vendors: usize,
    pub products: usize,
    pub event_products: usize,
    pub interests: usize,
}

#[derive(Default)]
struct MemoryState {
    businesses: Vec<Business>,
    vendors: Vec<Vendor>,
    vendor_locations: Vec<VendorLocation>,
    members: Vec<BusinessMember>,
    invites: Vec<BusinessInvite>,
    profiles: Vec<Profile>,
    events: Vec<Event>,
    event_vendors: Vec<EventVendor>,
    products: Vec<Product>,
    event_products: Vec<EventProduct>,
    interests: Vec<ProductInterest>,
}

impl MemoryState {
    fn business(&self, business_id: Uuid) -> Option<&Business> {
        self.businesses.iter().find(|b| b.id == business_id)
    }

    fn membership(&self, business_id: Uuid, user_id: Uuid) -> Option<&BusinessMember> {
        self.members
            .iter()
            .find(|m| m.business_id == business_id && m.user_id == user_id)
    }

    fn interest_count(&self, product_id: Uuid, event_id: Uuid) -> i64 {
        self.interests
            .iter()
            .filter(|i| i.product_id == product_id && i.event_id == event_id)
            .count() as i64
    }

    fn mark_vendor(&mut self, user_id: Uuid) {
        if let Some(profile) = self.profiles.iter_mut().find(|p| p.id == user_id) {
            profile.is_vendor = true;
        }
    }

    fn has_vendor(&self, user_id: Uuid) -> bool {
        self.vendors.iter().any(|v| v.user_id == user_id)
    }
}

/// In-process store with the same uniqueness rules and cascades as the Postgres schema.
///
/// Every operation holds the single state lock for its whole duration, so
/// multi-row writes are all-or-nothing.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn row_counts(&self) -> RowCounts {
        let state = self.state.lock().await;
        RowCounts {
            businesses: state.businesses.len(),
            vendors: state.vendors.len(),
            vendor_locations: state.vendor_locations.len(),
            members: state.members.len(),
            invites: state.invites.len(),
            profiles: state.profiles.len(),
            events: state.events.len(),
            event_vendors: state.event_vendors.len(),
            products: state.products.len(),
            event_products: state.event_products.len(),
            interests: state.interests.len(),
        }
    }

    /// Overwrites an invite's expiry, for exercising expiry paths.
    pub async fn set_invite_expiry(&self, code: &str, expires_at: DateTime<Utc>) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        let invite = state
            .invites
            .iter_mut()
            .find(|i| i.code == code)
            .ok_or(StoreError::NotFound("Invite"))?;
        invite.expires_at = expires_at;
        Ok(())
    }
}

#[async_trait]
impl MarketStore for MemoryStore {
    fn backend_tag(&self) -> &'static str {
        "memory"
    }

    // Businesses

    async fn create_business(&self, business: NewBusiness) -> StoreResult<Business> {
        let record = business.into_business();
        self.state.lock().await.businesses.push(record.clone());
        Ok(record)
    }

    async fn get_business(&self, business_id: Uuid) -> StoreResult<Option<Business>> {
        Ok(self.state.lock().await.business(business_id).cloned())
    }

    async fn find_business_by_owner(&self, user_id: Uuid) -> StoreResult<Option<Business>> {
        let state = self.state.lock().await;
        Ok(state
            .businesses
            .iter()
            .filter(|b| b.created_by == user_id)
            .min_by_key(|b| b.created_at)
            .cloned())
    }

    async fn search_businesses(&self, name: &str, limit: i64) -> StoreResult<Vec<Business>> {
        let needle = name.trim().to_lowercase();
        let state = self.state.lock().await;
        let mut found: Vec<Business> = state
            .businesses
            .iter()
            .filter(|b| b.name.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.name.cmp(&b.name));
        found.truncate(limit.max(0) as usize);
        Ok(found)
    }

    async fn list_businesses_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Business>> {
        let state = self.state.lock().await;
        let mut found: Vec<Business> = state
            .businesses
            .iter()
            .filter(|b| b.created_by == user_id || state.membership(b.id, user_id).is_some())
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn update_business(&self, business: Business) -> StoreResult<Business> {
        let mut state = self.state.lock().await;
        let existing = state
            .businesses
            .iter_mut()
            .find(|b| b.id == business.id)
            .ok_or(StoreError::NotFound("Business"))?;
        existing.name = business.name;
        existing.description = business.description;
        Ok(existing.clone())
    }

    async fn delete_business(&self, business_id: Uuid) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        let before = state.businesses.len();
        state.businesses.retain(|b| b.id != business_id);
        if state.businesses.len() == before {
            return Err(StoreError::NotFound("Business"));
        }

        let product_ids: Vec<Uuid> = state
            .products
            .iter()
            .filter(|p| p.business_id == business_id)
            .map(|p| p.id)
            .collect();

        state.members.retain(|m| m.business_id != business_id);
        state.invites.retain(|i| i.business_id != business_id);
        state.event_vendors.retain(|ev| ev.business_id != business_id);
        state.products.retain(|p| p.business_id != business_id);
        state
            .event_products
            .retain(|ep| ep.business_id != business_id && !product_ids.contains(&ep.product_id));
        state
            .interests
            .retain(|i| !product_ids.contains(&i.product_id));
        for vendor in state
            .vendors
            .iter_mut()
            .filter(|v| v.business_id == Some(business_id))
        {
            vendor.business_id = None;
        }

        Ok(())
    }

    // Team

    async fn add_member(&self, member: BusinessMember) -> StoreResult<BusinessMember> {
        let mut state = self.state.lock().await;
        if state.membership(member.business_id, member.user_id).is_some() {
            return Err(StoreError::Conflict("User is already a member of this business".into()));
        }
        state.members.push(member.clone());
        Ok(member)
    }

    async fn get_member(&self, member_id: Uuid) -> StoreResult<Option<BusinessMember>> {
        let state = self.state.lock().await;
        Ok(state.members.iter().find(|m| m.id == member_id).cloned())
    }

    async fn get_membership(
        &self,
        business_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<Option<BusinessMember>> {
        Ok(self.state.lock().await.membership(business_id, user_id).cloned())
    }

    async fn list_members(&self, business_id: Uuid) -> StoreResult<Vec<BusinessMember>> {
        let state = self.state.lock().await;
        let mut members: Vec<BusinessMember> = state
            .members
            .iter()
            .filter(|m| m.business_id == business_id)
            .cloned()
            .collect();
        members.sort_by_key(|m| m.created_at);
        Ok(members)
    }

    async fn update_member_role(&self, member_id: Uuid, role: MemberRole) -> StoreResult<BusinessMember> {
        let mut state = self.state.lock().await;
        let member = state
            .members
            .iter_mut()
            .find(|m| m.id == member_id)
            .ok_or(StoreError::NotFound("Member"))?;
        member.role = role;
        Ok(member.clone())
    }

    async fn remove_member(&self, member_id: Uuid) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        let before = state.members.len();
        state.members.retain(|m| m.id != member_id);
        if state.members.len() == before {
            return Err(StoreError::NotFound("Member"));
        }
        Ok(())
    }

    // Invite codes

    async fn create_invite(&self, invite: BusinessInvite) -> StoreResult<BusinessInvite> {
        let mut state = self.state.lock().await;
        if state.invites.iter().any(|i| i.code == invite.code) {
            return Err(StoreError::Conflict("Invite code already in use".into()));
        }
        state.invites.push(invite.clone());
        Ok(invite)
    }

    async fn find_active_invite(
        &self,
        business_id: Uuid,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<BusinessInvite>> {
        let state = self.state.lock().await;
        Ok(state
            .invites
            .iter()
            .filter(|i| {
                i.business_id == business_id
                    && i.status == InviteStatus::Active
                    && i.email.is_none()
                    && !i.is_expired(now)
            })
            .max_by_key(|i| i.created_at)
            .cloned())
    }

    async fn redeem_invite(
        &self,
        code: &str,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> StoreResult<InviteRedemption> {
        let code = code.trim().to_uppercase();
        let mut state = self.state.lock().await;

        let invite_idx = state
            .invites
            .iter()
            .position(|i| i.code == code)
            .ok_or(StoreError::InviteUnavailable)?;

        let invite = state.invites[invite_idx].clone();
        if let Err(rejection) = invite.check_redeemable(now) {
            if rejection == InviteRejection::Expired {
                state.invites[invite_idx].status = InviteStatus::Expired;
            }
            return Err(rejection.into());
        }

        let business = state
            .business(invite.business_id)
            .cloned()
            .ok_or(StoreError::NotFound("Business"))?;

        let existing_member = state.membership(business.id, user_id).cloned();
        if existing_member.is_some() || business.created_by == user_id {
            let vendor = state.vendors.iter().find(|v| v.id == user_id).cloned();
            return Ok(InviteRedemption {
                business_id: business.id,
                member: existing_member,
                vendor,
                already_member: true,
            });
        }

        let member = BusinessMember::new(business.id, user_id, MemberRole::Member);
        state.members.push(member.clone());

        let vendor = match state.vendors.iter_mut().find(|v| v.id == user_id) {
            Some(vendor) => {
                vendor.business_id = Some(business.id);
                vendor.status = VendorStatus::Approved;
                vendor.updated_at = now;
                vendor.clone()
            }
            None => {
                let vendor = team_vendor(user_id, &business, now);
                state.vendors.push(vendor.clone());
                vendor
            }
        };

        if invite.is_single_use() {
            state.invites[invite_idx].status = InviteStatus::Used;
        }
        state.mark_vendor(user_id);

        Ok(InviteRedemption {
            business_id: business.id,
            member: Some(member),
            vendor: Some(vendor),
            already_member: false,
        })
    }

    // Vendors

    async fn register_vendor(&self, signup: NewVendorSignup) -> StoreResult<VendorRegistration> {
        let NewVendorSignup {
            business,
            vendor,
            location,
        } = signup;

        let mut state = self.state.lock().await;

        // All checks run before the first push so a rejected signup writes nothing.
        if state.vendors.iter().any(|v| v.id == vendor.id) {
            return Err(StoreError::Conflict("Vendor already registered for this user".into()));
        }
        if state
            .vendor_locations
            .iter()
            .any(|l| l.vendor_id == location.vendor_id)
        {
            return Err(StoreError::Conflict("Vendor location already exists".into()));
        }

        let business = business.into_business();
        state.businesses.push(business.clone());
        state.vendors.push(vendor.clone());
        state.vendor_locations.push(location.clone());
        state.mark_vendor(vendor.user_id);

        Ok(VendorRegistration {
            business,
            vendor,
            location,
        })
    }

    async fn get_vendor(&self, vendor_id: Uuid) -> StoreResult<Option<Vendor>> {
        let state = self.state.lock().await;
        Ok(state.vendors.iter().find(|v| v.id == vendor_id).cloned())
    }

    async fn get_vendor_for_user(&self, user_id: Uuid) -> StoreResult<Option<Vendor>> {
        let state = self.state.lock().await;
        Ok(state
            .vendors
            .iter()
            .filter(|v| v.user_id == user_id)
            .min_by_key(|v| v.created_at)
            .cloned())
    }

    async fn get_vendor_location(&self, vendor_id: Uuid) -> StoreResult<Option<VendorLocation>> {
        let state = self.state.lock().await;
        Ok(state
            .vendor_locations
            .iter()
            .find(|l| l.vendor_id == vendor_id)
            .cloned())
    }

    async fn list_vendors(&self, status: Option<VendorStatus>) -> StoreResult<Vec<Vendor>> {
        let state = self.state.lock().await;
        let mut vendors: Vec<Vendor> = state
            .vendors
            .iter()
            .filter(|v| status.map_or(true, |s| v.status == s))
            .cloned()
            .collect();
        vendors.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(vendors)
    }

    async fn list_vendors_for_business(&self, business_id: Uuid) -> StoreResult<Vec<Vendor>> {
        let state = self.state.lock().await;
        let mut vendors: Vec<Vendor> = state
            .vendors
            .iter()
            .filter(|v| v.business_id == Some(business_id))
            .cloned()
            .collect();
        vendors.sort_by_key(|v| v.created_at);
        Ok(vendors)
    }

    async fn set_vendor_status(&self, vendor_id: Uuid, status: VendorStatus) -> StoreResult<Vendor> {
        let mut state = self.state.lock().await;
        let vendor = state
            .vendors
            .iter_mut()
            .find(|v| v.id == vendor_id)
            .ok_or(StoreError::NotFound("Vendor"))?;
        vendor.status = vendor.status.transition(status)?;
        vendor.updated_at = Utc::now();
        Ok(vendor.clone())
    }

    // Profiles

    async fn get_profile(&self, user_id: Uuid) -> StoreResult<Option<Profile>> {
        let state = self.state.lock().await;
        Ok(state.profiles.iter().find(|p| p.id == user_id).cloned())
    }

    async fn upsert_profile(&self, profile: Profile) -> StoreResult<Profile> {
        let mut state = self.state.lock().await;
        if let Some(existing) = state.profiles.iter_mut().find(|p| p.id == profile.id) {
            existing.first_name = profile.first_name;
            existing.last_name = profile.last_name;
            return Ok(existing.clone());
        }

        let record = Profile {
            is_vendor: state.has_vendor(profile.id),
            ..profile
        };
        state.profiles.push(record.clone());
        Ok(record)
    }

    async fn set_profile_role(&self, user_id: Uuid, role: UserRole) -> StoreResult<Profile> {
        let mut state = self.state.lock().await;
        if let Some(existing) = state.profiles.iter_mut().find(|p| p.id == user_id) {
            existing.role = role;
            return Ok(existing.clone());
        }

        let record = Profile {
            id: user_id,
            first_name: None,
            last_name: None,
            role,
            is_vendor: state.has_vendor(user_id),
            created_at: Utc::now(),
        };
        state.profiles.push(record.clone());
        Ok(record)
    }

    // Events

    async fn create_event(&self, event: Event) -> StoreResult<Event> {
        self.state.lock().await.events.push(event.clone());
        Ok(event)
    }

    async fn get_event(&self, event_id: Uuid) -> StoreResult<Option<Event>> {
        let state = self.state.lock().await;
        Ok(state.events.iter().find(|e| e.id == event_id).cloned())
    }

    async fn search_events(&self, query: &EventQuery) -> StoreResult<Vec<Event>> {
        let state = self.state.lock().await;
        let mut events: Vec<Event> = state
            .events
            .iter()
            .filter(|e| query.matches(e))
            .cloned()
            .collect();
        events.sort_by_key(|e| (e.date, e.start_time));
        Ok(events)
    }

    async fn list_events_by_creator(&self, user_id: Uuid) -> StoreResult<Vec<Event>> {
        let state = self.state.lock().await;
        let mut events: Vec<Event> = state
            .events
            .iter()
            .filter(|e| e.created_by == user_id)
            .cloned()
            .collect();
        events.sort_by_key(|e| (e.date, e.start_time));
        Ok(events)
    }

    // Event invitations

    async fn invite_vendor(&self, invitation: EventVendor) -> StoreResult<EventVendor> {
        let mut state = self.state.lock().await;
        if state
            .event_vendors
            .iter()
            .any(|ev| ev.event_id == invitation.event_id && ev.business_id == invitation.business_id)
        {
            return Err(StoreError::Conflict("Business already invited to this event".into()));
        }
        state.event_vendors.push(invitation.clone());
        Ok(invitation)
    }

    async fn get_event_vendor(&self, invitation_id: Uuid) -> StoreResult<Option<EventVendor>> {
        let state = self.state.lock().await;
        Ok(state
            .event_vendors
            .iter()
            .find(|ev| ev.id == invitation_id)
            .cloned())
    }

    async fn get_event_vendor_for_business(
        &self,
        event_id: Uuid,
        business_id: Uuid,
    ) -> StoreResult<Option<EventVendor>> {
        let state = self.state.lock().await;
        Ok(state
            .event_vendors
            .iter()
            .find(|ev| ev.event_id == event_id && ev.business_id == business_id)
            .cloned())
    }

    async fn list_event_vendors(&self, event_id: Uuid) -> StoreResult<Vec<EventVendorListing>> {
        let state = self.state.lock().await;
        let mut invitations: Vec<&EventVendor> = state
            .event_vendors
            .iter()
            .filter(|ev| ev.event_id == event_id)
            .collect();
        invitations.sort_by_key(|ev| ev.created_at);

        let listings = invitations
            .into_iter()
            .filter_map(|ev| {
                let business = state.business(ev.business_id)?;
                let vendor = state
                    .vendors
                    .iter()
                    .filter(|v| v.business_id == Some(business.id))
                    .min_by_key(|v| v.created_at)
                    .map(|v| VendorSummary {
                        business_category: v.business_category.clone(),
                        instagram: v.instagram.clone(),
                        website: v.website.clone(),
                    });
                Some(EventVendorListing {
                    id: ev.id,
                    status: ev.status,
                    business: BusinessSummary::from(business),
                    vendor,
                })
            })
            .collect();

        Ok(listings)
    }

    async fn list_invitations_for_business(
        &self,
        business_id: Uuid,
    ) -> StoreResult<Vec<ReceivedInvitation>> {
        let state = self.state.lock().await;
        let events: HashMap<Uuid, &Event> = state.events.iter().map(|e| (e.id, e)).collect();

        let mut invitations: Vec<&EventVendor> = state
            .event_vendors
            .iter()
            .filter(|ev| ev.business_id == business_id)
            .collect();
        invitations.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(invitations
            .into_iter()
            .filter_map(|ev| {
                let event = events.get(&ev.event_id)?;
                Some(ReceivedInvitation {
                    id: ev.id,
                    status: ev.status,
                    business_id: ev.business_id,
                    event: (*event).clone(),
                })
            })
            .collect())
    }

    async fn set_event_vendor_status(
        &self,
        invitation_id: Uuid,
        status: InvitationStatus,
    ) -> StoreResult<EventVendor> {
        let mut state = self.state.lock().await;
        let invitation = state
            .event_vendors
            .iter_mut()
            .find(|ev| ev.id == invitation_id)
            .ok_or(StoreError::NotFound("Invitation"))?;
        invitation.status = invitation.status.transition(status)?;
        Ok(invitation.clone())
    }

    // Products

    async fn create_product(&self, product: Product) -> StoreResult<Product> {
        self.state.lock().await.products.push(product.clone());
        Ok(product)
    }

    async fn get_product(&self, product_id: Uuid) -> StoreResult<Option<Product>> {
        let state = self.state.lock().await;
        Ok(state.products.iter().find(|p| p.id == product_id).cloned())
    }

    async fn list_products_for_business(&self, business_id: Uuid) -> StoreResult<Vec<Product>> {
        let state = self.state.lock().await;
        let mut products: Vec<Product> = state
            .products
            .iter()
            .filter(|p| p.business_id == business_id)
            .cloned()
            .collect();
        products.sort_by_key(|p| p.created_at);
        Ok(products)
    }

    async fn update_product(&self, product: Product) -> StoreResult<Product> {
        let mut state = self.state.lock().await;
        let existing = state
            .products
            .iter_mut()
            .find(|p| p.id == product.id)
            .ok_or(StoreError::NotFound("Product"))?;
        existing.name = product.name;
        existing.description = product.description;
        existing.price = product.price;
        existing.image_url = product.image_url;
        Ok(existing.clone())
    }

    async fn delete_product(&self, product_id: Uuid) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        let before = state.products.len();
        state.products.retain(|p| p.id != product_id);
        if state.products.len() == before {
            return Err(StoreError::NotFound("Product"));
        }
        state.event_products.retain(|ep| ep.product_id != product_id);
        state.interests.retain(|i| i.product_id != product_id);
        Ok(())
    }

    // Event products

    async fn set_event_products(
        &self,
        event_id: Uuid,
        business_id: Uuid,
        product_ids: &[Uuid],
    ) -> StoreResult<Vec<EventProduct>> {
        let mut product_ids = product_ids.to_vec();
        product_ids.sort_unstable();
        product_ids.dedup();

        let mut state = self.state.lock().await;
        let owned = product_ids.iter().all(|id| {
            state
                .products
                .iter()
                .any(|p| p.id == *id && p.business_id == business_id)
        });
        if !owned {
            return Err(StoreError::Forbidden(
                "Products must belong to the business".into(),
            ));
        }

        state
            .event_products
            .retain(|ep| !(ep.event_id == event_id && ep.business_id == business_id));

        let now = Utc::now();
        let stored: Vec<EventProduct> = product_ids
            .into_iter()
            .map(|product_id| EventProduct {
                id: Uuid::new_v4(),
                event_id,
                product_id,
                business_id,
                created_at: now,
            })
            .collect();
        state.event_products.extend(stored.iter().cloned());

        Ok(stored)
    }

    async fn list_event_products(&self, event_id: Uuid) -> StoreResult<Vec<EventProductListing>> {
        let state = self.state.lock().await;
        let mut rows: Vec<(DateTime<Utc>, EventProductListing)> = state
            .event_products
            .iter()
            .filter(|ep| ep.event_id == event_id)
            .filter_map(|ep| {
                let product = state.products.iter().find(|p| p.id == ep.product_id)?;
                let business = state.business(ep.business_id)?;
                Some((
                    ep.created_at,
                    EventProductListing {
                        product: product.clone(),
                        business_name: business.name.clone(),
                    },
                ))
            })
            .collect();
        rows.sort_by(|(a_at, a), (b_at, b)| {
            a_at.cmp(b_at).then_with(|| a.product.name.cmp(&b.product.name))
        });

        Ok(rows.into_iter().map(|(_, listing)| listing).collect())
    }

    async fn is_product_at_event(&self, event_id: Uuid, product_id: Uuid) -> StoreResult<bool> {
        let state = self.state.lock().await;
        Ok(state
            .event_products
            .iter()
            .any(|ep| ep.event_id == event_id && ep.product_id == product_id))
    }

    // Interest

    async fn toggle_interest(
        &self,
        product_id: Uuid,
        event_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<InterestToggle> {
        let mut state = self.state.lock().await;
        let existing = state.interests.iter().position(|i| {
            i.product_id == product_id && i.event_id == event_id && i.user_id == user_id
        });

        let interested = match existing {
            Some(idx) => {
                state.interests.remove(idx);
                false
            }
            None => {
                state.interests.push(ProductInterest {
                    id: Uuid::new_v4(),
                    product_id,
                    event_id,
                    user_id,
                    created_at: Utc::now(),
                });
                true
            }
        };

        Ok(InterestToggle {
            interested,
            interest_count: state.interest_count(product_id, event_id),
        })
    }

    async fn count_interests(&self, product_id: Uuid, event_id: Uuid) -> StoreResult<i64> {
        Ok(self.state.lock().await.interest_count(product_id, event_id))
    }

    async fn has_interest(&self, product_id: Uuid, event_id: Uuid, user_id: Uuid) -> StoreResult<bool> {
        let state = self.state.lock().await;
        Ok(state.interests.iter().any(|i| {
            i.product_id == product_id && i.event_id == event_id && i.user_id == user_id
        }))
    }

    async fn interest_summary_for_business(
        &self,
        business_id: Uuid,
    ) -> StoreResult<Vec<ProductInterestSummary>> {
        let state = self.state.lock().await;
        let mut rows: Vec<(chrono::NaiveDate, ProductInterestSummary)> = state
            .event_products
            .iter()
            .filter(|ep| ep.business_id == business_id)
            .filter_map(|ep| {
                let product = state.products.iter().find(|p| p.id == ep.product_id)?;
                let event = state.events.iter().find(|e| e.id == ep.event_id)?;
                Some((
                    event.date,
                    ProductInterestSummary {
                        product_id: product.id,
                        product_name: product.name.clone(),
                        event_id: event.id,
                        event_name: event.name.clone(),
                        interest_count: state.interest_count(product.id, event.id),
                    },
                ))
            })
            .collect();
        rows.sort_by(|(a_date, a), (b_date, b)| {
            a_date
                .cmp(b_date)
                .then_with(|| a.product_name.cmp(&b.product_name))
        });

        Ok(rows.into_iter().map(|(_, summary)| summary).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{generate_invite_code, VendorSignupRequest};
    use chrono::Duration;

    fn signup_for(user_id: Uuid) -> NewVendorSignup {
        VendorSignupRequest {
            business_name: "Bay Honey".into(),
            business_category: "food-drink".into(),
            description: "Raw honey from Oakland hives".into(),
            website: None,
            instagram: None,
            address: "12 Grand Ave".into(),
            city: "Oakland".into(),
            zip_code: "94612".into(),
            terms_accepted: true,
        }
        .into_new_signup(user_id, VendorStatus::Pending)
    }

    fn product(business_id: Uuid, name: &str) -> Product {
        Product {
            id: Uuid::new_v4(),
            business_id,
            name: name.into(),
            description: None,
            price: Some(8.5),
            image_url: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn second_signup_writes_nothing() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();

        store.register_vendor(signup_for(user)).await.unwrap();
        let after_first = store.row_counts().await;
        assert_eq!(after_first.businesses, 1);
        assert_eq!(after_first.vendors, 1);
        assert_eq!(after_first.vendor_locations, 1);

        let err = store.register_vendor(signup_for(user)).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert_eq!(store.row_counts().await, after_first);
    }

    #[tokio::test]
    async fn toggling_twice_restores_count() {
        let store = MemoryStore::new();
        let (product_id, event_id) = (Uuid::new_v4(), Uuid::new_v4());
        let shopper = Uuid::new_v4();
        let other = Uuid::new_v4();

        store.toggle_interest(product_id, event_id, other).await.unwrap();
        let on = store.toggle_interest(product_id, event_id, shopper).await.unwrap();
        assert_eq!(on, InterestToggle { interested: true, interest_count: 2 });

        let off = store.toggle_interest(product_id, event_id, shopper).await.unwrap();
        assert_eq!(off, InterestToggle { interested: false, interest_count: 1 });
        assert!(!store.has_interest(product_id, event_id, shopper).await.unwrap());
    }

    #[tokio::test]
    async fn expired_code_is_marked_and_rejected() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let business = store
            .create_business(NewBusiness::new("Bay Honey".into(), None, owner))
            .await
            .unwrap();
        let past = Utc::now() - Duration::days(8);
        let invite = store
            .create_invite(BusinessInvite::new(business.id, Some(owner), None, Duration::days(7), past))
            .await
            .unwrap();

        let err = store
            .redeem_invite(&invite.code, Uuid::new_v4(), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InviteExpired));
        assert_eq!(store.row_counts().await.members, 0);
        assert!(store
            .find_active_invite(business.id, Utc::now())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn redeeming_links_vendor_and_spends_email_codes() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let joiner = Uuid::new_v4();
        let business = store
            .create_business(NewBusiness::new("Bay Honey".into(), None, owner))
            .await
            .unwrap();
        let invite = store
            .create_invite(BusinessInvite::new(
                business.id,
                Some(owner),
                Some("joiner@example.com".into()),
                Duration::days(7),
                Utc::now(),
            ))
            .await
            .unwrap();

        let redemption = store
            .redeem_invite(&invite.code.to_lowercase(), joiner, Utc::now())
            .await
            .unwrap();
        assert!(!redemption.already_member);
        assert_eq!(redemption.member.unwrap().role, MemberRole::Member);
        let vendor = redemption.vendor.unwrap();
        assert_eq!(vendor.business_id, Some(business.id));
        assert_eq!(vendor.status, VendorStatus::Approved);
        assert_eq!(vendor.business_category, "other");

        let again = store.redeem_invite(&invite.code, joiner, Utc::now()).await;
        assert!(matches!(again, Err(StoreError::InviteUnavailable)));
    }

    #[tokio::test]
    async fn redeeming_own_team_code_changes_nothing() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let joiner = Uuid::new_v4();
        let registration = store.register_vendor(signup_for(owner)).await.unwrap();
        let business_id = registration.business.id;
        store
            .set_vendor_status(owner, VendorStatus::Rejected)
            .await
            .unwrap();
        let invite = store
            .create_invite(BusinessInvite::new(
                business_id,
                Some(owner),
                None,
                Duration::days(7),
                Utc::now(),
            ))
            .await
            .unwrap();

        let redemption = store
            .redeem_invite(&invite.code, owner, Utc::now())
            .await
            .unwrap();
        assert!(redemption.already_member);
        assert!(redemption.member.is_none());
        assert_eq!(redemption.vendor.unwrap().status, VendorStatus::Rejected);
        assert_eq!(store.row_counts().await.members, 0);

        let first = store
            .redeem_invite(&invite.code, joiner, Utc::now())
            .await
            .unwrap();
        assert!(!first.already_member);
        let second = store
            .redeem_invite(&invite.code, joiner, Utc::now())
            .await
            .unwrap();
        assert!(second.already_member);
        assert_eq!(second.member.map(|m| m.id), first.member.map(|m| m.id));
        assert_eq!(store.row_counts().await.members, 1);
    }

    #[tokio::test]
    async fn unknown_code_is_unavailable() {
        let store = MemoryStore::new();
        let err = store
            .redeem_invite(&generate_invite_code(), Uuid::new_v4(), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InviteUnavailable));
    }

    #[tokio::test]
    async fn event_products_must_belong_to_business() {
        let store = MemoryStore::new();
        let ours = Uuid::new_v4();
        let theirs = Uuid::new_v4();
        let event_id = Uuid::new_v4();
        let honey = store.create_product(product(ours, "Honey")).await.unwrap();
        let jam = store.create_product(product(theirs, "Jam")).await.unwrap();

        let err = store
            .set_event_products(event_id, ours, &[honey.id, jam.id])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Forbidden(_)));

        let stored = store
            .set_event_products(event_id, ours, &[honey.id, honey.id])
            .await
            .unwrap();
        assert_eq!(stored.len(), 1);
        assert!(store.is_product_at_event(event_id, honey.id).await.unwrap());

        store.set_event_products(event_id, ours, &[]).await.unwrap();
        assert!(!store.is_product_at_event(event_id, honey.id).await.unwrap());
    }

    #[tokio::test]
    async fn deleting_business_cascades() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        let registration = store.register_vendor(signup_for(user)).await.unwrap();
        let business_id = registration.business.id;
        let honey = store.create_product(product(business_id, "Honey")).await.unwrap();
        let event_id = Uuid::new_v4();
        store
            .set_event_products(event_id, business_id, &[honey.id])
            .await
            .unwrap();
        store
            .toggle_interest(honey.id, event_id, Uuid::new_v4())
            .await
            .unwrap();

        store.delete_business(business_id).await.unwrap();

        let counts = store.row_counts().await;
        assert_eq!(counts.businesses, 0);
        assert_eq!(counts.products, 0);
        assert_eq!(counts.event_products, 0);
        assert_eq!(counts.interests, 0);
        assert_eq!(counts.vendors, 1);
        let vendor = store.get_vendor(user).await.unwrap().unwrap();
        assert_eq!(vendor.business_id, None);
    }

    #[tokio::test]
    async fn vendor_review_follows_status_rules() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        store.register_vendor(signup_for(user)).await.unwrap();

        store.set_vendor_status(user, VendorStatus::Rejected).await.unwrap();
        let approved = store.set_vendor_status(user, VendorStatus::Approved).await.unwrap();
        assert_eq!(approved.status, VendorStatus::Approved);

        let err = store
            .set_vendor_status(user, VendorStatus::Pending)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidTransition(_)));
    }

    #[tokio::test]
    async fn profile_upsert_keeps_role() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        store.set_profile_role(user, UserRole::Admin).await.unwrap();

        let renamed = store
            .upsert_profile(Profile {
                id: user,
                first_name: Some("Rosa".into()),
                last_name: None,
                role: UserRole::User,
                is_vendor: false,
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        assert_eq!(renamed.role, UserRole::Admin);
        assert_eq!(renamed.first_name.as_deref(), Some("Rosa"));
    }
}
