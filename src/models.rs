use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

pub use crate::status::{InvitationStatus, InviteStatus, MemberRole, UserRole, VendorStatus};

// ============================================================================
// BUSINESSES
// ============================================================================

/// Business owned by its creator; further members live in `business_members`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct Business {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBusiness {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

impl NewBusiness {
    pub fn new(name: String, description: Option<String>, created_by: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            description,
            created_by,
            created_at: Utc::now(),
        }
    }

    pub fn into_business(self) -> Business {
        Business {
            id: self.id,
            name: self.name,
            description: self.description,
            created_by: self.created_by,
            created_at: self.created_at,
        }
    }
}

/// Team roster entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct BusinessMember {
    pub id: Uuid,
    pub business_id: Uuid,
    pub user_id: Uuid,
    pub role: MemberRole,
    pub created_at: DateTime<Utc>,
}

impl BusinessMember {
    pub fn new(business_id: Uuid, user_id: Uuid, role: MemberRole) -> Self {
        Self {
            id: Uuid::new_v4(),
            business_id,
            user_id,
            role,
            created_at: Utc::now(),
        }
    }
}

/// Time-limited code that grants team membership
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct BusinessInvite {
    pub id: Uuid,
    pub business_id: Uuid,
    pub code: String,
    pub email: Option<String>,
    pub status: InviteStatus,
    pub created_by: Option<Uuid>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Why an invite code cannot be redeemed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InviteRejection {
    Expired,
    NotActive,
}

impl BusinessInvite {
    pub const CODE_LEN: usize = 8;

    pub fn new(
        business_id: Uuid,
        created_by: Option<Uuid>,
        email: Option<String>,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            business_id,
            code: generate_invite_code(),
            email,
            status: InviteStatus::Active,
            created_by,
            expires_at: now + ttl,
            created_at: now,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn check_redeemable(&self, now: DateTime<Utc>) -> Result<(), InviteRejection> {
        match self.status {
            InviteStatus::Active if self.is_expired(now) => Err(InviteRejection::Expired),
            InviteStatus::Active => Ok(()),
            InviteStatus::Expired => Err(InviteRejection::Expired),
            InviteStatus::Used => Err(InviteRejection::NotActive),
        }
    }

    /// Codes addressed to one email are spent on first use; open team codes stay active until expiry.
    pub fn is_single_use(&self) -> bool {
        self.email.is_some()
    }
}

/// Eight upper-case hex characters taken from a fresh v4 UUID.
pub fn generate_invite_code() -> String {
    Uuid::new_v4().simple().to_string()[..BusinessInvite::CODE_LEN].to_uppercase()
}

// ============================================================================
// VENDORS
// ============================================================================

/// Vendor profile linked to a business
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct Vendor {
    pub id: Uuid,
    pub user_id: Uuid,
    pub business_id: Option<Uuid>,
    pub business_name: String,
    pub business_category: String,
    pub description: Option<String>,
    pub website: Option<String>,
    pub instagram: Option<String>,
    pub status: VendorStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct VendorLocation {
    pub id: Uuid,
    pub vendor_id: Uuid,
    pub address: String,
    pub city: String,
    pub zip_code: String,
    pub created_at: DateTime<Utc>,
}

/// The three rows written by a vendor signup, inserted together or not at all
#[derive(Debug, Clone)]
pub struct NewVendorSignup {
    pub business: NewBusiness,
    pub vendor: Vendor,
    pub location: VendorLocation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendorRegistration {
    pub business: Business,
    pub vendor: Vendor,
    pub location: VendorLocation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendorWithLocation {
    pub vendor: Vendor,
    pub location: Option<VendorLocation>,
}

// ============================================================================
// PROFILES
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct Profile {
    pub id: Uuid,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: UserRole,
    pub is_vendor: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileOverview {
    pub profile: Option<Profile>,
    pub vendor: Option<Vendor>,
    pub is_vendor: bool,
}

// ============================================================================
// EVENTS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct Event {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub location: String,
    pub address: String,
    pub city: String,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub image_url: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Filters for the public event listing
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventQuery {
    pub city: Option<String>,
    pub q: Option<String>,
    pub from: Option<NaiveDate>,
}

impl EventQuery {
    /// Case-insensitive substring test used by the in-memory store; Postgres uses ILIKE.
    pub fn matches(&self, event: &Event) -> bool {
        if let Some(city) = self.city.as_deref() {
            if event.city != city {
                return false;
            }
        }
        if let Some(from) = self.from {
            if event.date < from {
                return false;
            }
        }
        if let Some(text) = self.q.as_deref().map(|q| q.trim().to_lowercase()) {
            let in_name = event.name.to_lowercase().contains(&text);
            let in_description = event
                .description
                .as_deref()
                .map(|d| d.to_lowercase().contains(&text))
                .unwrap_or(false);
            if !in_name && !in_description {
                return false;
            }
        }
        true
    }
}

/// Invitation of a business to an event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct EventVendor {
    pub id: Uuid,
    pub event_id: Uuid,
    pub business_id: Uuid,
    pub status: InvitationStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BusinessSummary {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
}

impl From<&Business> for BusinessSummary {
    fn from(business: &Business) -> Self {
        Self {
            id: business.id,
            name: business.name.clone(),
            description: business.description.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VendorSummary {
    pub business_category: String,
    pub instagram: Option<String>,
    pub website: Option<String>,
}

/// Row of an event's vendor list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventVendorListing {
    pub id: Uuid,
    pub status: InvitationStatus,
    pub business: BusinessSummary,
    pub vendor: Option<VendorSummary>,
}

/// Invitation as seen by the invited business
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceivedInvitation {
    pub id: Uuid,
    pub status: InvitationStatus,
    pub business_id: Uuid,
    pub event: Event,
}

// ============================================================================
// PRODUCTS AND INTEREST
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct Product {
    pub id: Uuid,
    pub business_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct EventProduct {
    pub id: Uuid,
    pub event_id: Uuid,
    pub product_id: Uuid,
    pub business_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventProductListing {
    pub product: Product,
    pub business_name: String,
}

/// Product at an event as rendered for a shopper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductCard {
    #[serde(flatten)]
    pub listing: EventProductListing,
    pub interest_count: i64,
    pub interested: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct ProductInterest {
    pub id: Uuid,
    pub product_id: Uuid,
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct InterestToggle {
    pub interested: bool,
    pub interest_count: i64,
}

/// Vendor dashboard line: how many shoppers liked a product at one event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct ProductInterestSummary {
    pub product_id: Uuid,
    pub product_name: String,
    pub event_id: Uuid,
    pub event_name: String,
    pub interest_count: i64,
}

// ============================================================================
// COMPOSITE RESPONSE TYPES
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessPage {
    pub business: Business,
    pub vendors: Vec<Vendor>,
    pub events: Vec<Event>,
    pub viewer_role: Option<MemberRole>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BusinessAccess {
    pub has_access: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<MemberRole>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreatedBusiness {
    pub id: Uuid,
    pub existing: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InviteRedemption {
    pub business_id: Uuid,
    /// `None` when the redeemer owns the business.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub member: Option<BusinessMember>,
    /// Left untouched for callers who were already on the team.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor: Option<Vendor>,
    pub already_member: bool,
}

// ============================================================================
// REQUEST/RESPONSE DTOs
// ============================================================================

/// API response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: Utc::now(),
        }
    }
}

fn must_be_true(value: &bool) -> Result<(), ValidationError> {
    if *value {
        Ok(())
    } else {
        Err(ValidationError::new("terms_not_accepted"))
    }
}

/// Vendor signup form
#[derive(Debug, Deserialize, Validate)]
pub struct VendorSignupRequest {
    #[validate(length(min = 2, max = 120))]
    pub business_name: String,
    #[validate(length(min = 2, max = 60))]
    pub business_category: String,
    #[validate(length(min = 10, max = 2000))]
    pub description: String,
    #[validate(url)]
    pub website: Option<String>,
    #[validate(length(max = 60))]
    pub instagram: Option<String>,
    #[validate(length(min = 5, max = 200))]
    pub address: String,
    #[validate(length(min = 2, max = 120))]
    pub city: String,
    #[validate(length(min = 5, max = 12))]
    pub zip_code: String,
    #[validate(custom(function = "must_be_true"))]
    pub terms_accepted: bool,
}

impl VendorSignupRequest {
    /// The vendor id is the caller's user id, one vendor record per user.
    pub fn into_new_signup(self, user_id: Uuid, initial_status: VendorStatus) -> NewVendorSignup {
        let now = Utc::now();
        let business = NewBusiness {
            id: Uuid::new_v4(),
            name: self.business_name.clone(),
            description: Some(self.description.clone()),
            created_by: user_id,
            created_at: now,
        };
        let vendor = Vendor {
            id: user_id,
            user_id,
            business_id: Some(business.id),
            business_name: self.business_name,
            business_category: self.business_category,
            description: Some(self.description),
            website: self.website.filter(|s| !s.trim().is_empty()),
            instagram: self.instagram.filter(|s| !s.trim().is_empty()),
            status: initial_status,
            created_at: now,
            updated_at: now,
        };
        let location = VendorLocation {
            id: Uuid::new_v4(),
            vendor_id: vendor.id,
            address: self.address,
            city: self.city,
            zip_code: self.zip_code,
            created_at: now,
        };
        NewVendorSignup {
            business,
            vendor,
            location,
        }
    }
}

/// Create or edit a business
#[derive(Debug, Deserialize, Validate)]
pub struct BusinessRequest {
    #[validate(length(min = 2, max = 120))]
    pub name: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
}

/// Body of the `create_business_function` endpoint
#[derive(Debug, Deserialize, Validate)]
pub struct CreateBusinessFunctionRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    pub description: Option<String>,
    pub user_id: Uuid,
}

/// Body of the `check_business_access` endpoint
#[derive(Debug, Deserialize)]
pub struct CheckBusinessAccessRequest {
    pub user_id: Uuid,
    pub business_id: Uuid,
}

#[derive(Debug, Deserialize, Validate)]
pub struct IssueInviteRequest {
    #[validate(email)]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RedeemInviteRequest {
    #[validate(length(min = 6, max = 32))]
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateMemberRoleRequest {
    pub role: MemberRole,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SearchQuery {
    #[validate(length(min = 3, max = 120))]
    pub q: String,
}

/// Create event form
#[derive(Debug, Deserialize, Validate)]
pub struct CreateEventRequest {
    #[validate(length(min = 2, max = 160))]
    pub name: String,
    #[validate(length(min = 10, max = 4000))]
    pub description: String,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    #[validate(length(min = 3, max = 160))]
    pub location: String,
    #[validate(length(min = 5, max = 200))]
    pub address: String,
    #[validate(length(min = 2, max = 120))]
    pub city: String,
    #[validate(range(min = -90.0, max = 90.0))]
    pub lat: Option<f64>,
    #[validate(range(min = -180.0, max = 180.0))]
    pub lng: Option<f64>,
    #[validate(url)]
    pub image_url: Option<String>,
}

impl CreateEventRequest {
    pub fn validate_business_rules(&self) -> Result<(), String> {
        if self.end_time <= self.start_time {
            return Err("Event must end after it starts".into());
        }
        if self.lat.is_some() != self.lng.is_some() {
            return Err("Latitude and longitude must be given together".into());
        }
        Ok(())
    }

    pub fn into_event(self, created_by: Uuid) -> Event {
        Event {
            id: Uuid::new_v4(),
            name: self.name,
            description: Some(self.description),
            date: self.date,
            start_time: self.start_time,
            end_time: self.end_time,
            location: self.location,
            address: self.address,
            city: self.city,
            lat: self.lat,
            lng: self.lng,
            image_url: self.image_url,
            created_by,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct InviteVendorRequest {
    pub business_id: Uuid,
}

impl InviteVendorRequest {
    pub fn into_event_vendor(self, event_id: Uuid) -> EventVendor {
        EventVendor {
            id: Uuid::new_v4(),
            event_id,
            business_id: self.business_id,
            status: InvitationStatus::Invited,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct InvitationStatusRequest {
    pub status: InvitationStatus,
}

#[derive(Debug, Deserialize)]
pub struct VendorStatusRequest {
    pub status: VendorStatus,
}

#[derive(Debug, Deserialize)]
pub struct VendorListQuery {
    pub status: Option<VendorStatus>,
}

#[derive(Debug, Deserialize)]
pub struct UserRoleRequest {
    pub role: UserRole,
}

/// Create or edit a product
#[derive(Debug, Deserialize, Validate)]
pub struct ProductRequest {
    #[validate(length(min = 2, max = 160))]
    pub name: String,
    #[validate(length(max = 4000))]
    pub description: Option<String>,
    #[validate(range(min = 0.0))]
    pub price: Option<f64>,
    #[validate(url)]
    pub image_url: Option<String>,
}

impl ProductRequest {
    pub fn into_product(self, business_id: Uuid) -> Product {
        Product {
            id: Uuid::new_v4(),
            business_id,
            name: self.name,
            description: self.description,
            price: self.price,
            image_url: self.image_url,
            created_at: Utc::now(),
        }
    }

    pub fn apply_to_existing(self, existing: &mut Product) {
        existing.name = self.name;
        existing.description = self.description;
        existing.price = self.price;
        existing.image_url = self.image_url;
    }
}

#[derive(Debug, Deserialize)]
pub struct EventProductSelection {
    pub product_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ProfileRequest {
    #[validate(length(max = 80))]
    pub first_name: Option<String>,
    #[validate(length(max = 80))]
    pub last_name: Option<String>,
}

impl ProfileRequest {
    pub fn into_profile(self, user_id: Uuid) -> Profile {
        Profile {
            id: user_id,
            first_name: self.first_name,
            last_name: self.last_name,
            role: UserRole::User,
            is_vendor: false,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invite(status: InviteStatus, expires_in: Duration) -> BusinessInvite {
        let now = Utc::now();
        BusinessInvite {
            status,
            expires_at: now + expires_in,
            ..BusinessInvite::new(Uuid::new_v4(), None, None, Duration::days(7), now)
        }
    }

    #[test]
    fn invite_codes_are_eight_uppercase_chars() {
        let code = generate_invite_code();
        assert_eq!(code.len(), BusinessInvite::CODE_LEN);
        assert!(code.chars().all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
        assert_ne!(code, generate_invite_code());
    }

    #[test]
    fn expired_invite_is_not_redeemable() {
        let stale = invite(InviteStatus::Active, Duration::hours(-1));
        assert_eq!(
            stale.check_redeemable(Utc::now()),
            Err(InviteRejection::Expired)
        );
    }

    #[test]
    fn active_invite_is_redeemable_until_expiry() {
        let fresh = invite(InviteStatus::Active, Duration::days(1));
        assert_eq!(fresh.check_redeemable(Utc::now()), Ok(()));
        assert_eq!(
            fresh.check_redeemable(fresh.expires_at),
            Err(InviteRejection::Expired)
        );
    }

    #[test]
    fn used_invite_is_not_redeemable() {
        let used = invite(InviteStatus::Used, Duration::days(1));
        assert_eq!(
            used.check_redeemable(Utc::now()),
            Err(InviteRejection::NotActive)
        );
    }

    fn signup_request() -> VendorSignupRequest {
        VendorSignupRequest {
            business_name: "Bay Honey".into(),
            business_category: "food-drink".into(),
            description: "Raw honey from Oakland hives".into(),
            website: Some("".into()),
            instagram: Some("@bayhoney".into()),
            address: "12 Grand Ave".into(),
            city: "Oakland".into(),
            zip_code: "94612".into(),
            terms_accepted: true,
        }
    }

    #[test]
    fn signup_links_vendor_to_business_and_user() {
        let user = Uuid::new_v4();
        let signup = signup_request().into_new_signup(user, VendorStatus::Approved);
        assert_eq!(signup.vendor.id, user);
        assert_eq!(signup.vendor.business_id, Some(signup.business.id));
        assert_eq!(signup.location.vendor_id, user);
        assert_eq!(signup.business.created_by, user);
        assert_eq!(signup.vendor.website, None);
    }

    #[test]
    fn signup_requires_accepted_terms() {
        let mut request = signup_request();
        request.website = None;
        assert!(request.validate().is_ok());
        request.terms_accepted = false;
        assert!(request.validate().is_err());
    }

    #[test]
    fn event_must_end_after_start() {
        let request = CreateEventRequest {
            name: "Night Market".into(),
            description: "Street food and crafts".into(),
            date: NaiveDate::from_ymd_opt(2026, 11, 7).unwrap(),
            start_time: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            location: "Jack London Square".into(),
            address: "472 Water St".into(),
            city: "Oakland".into(),
            lat: Some(37.79),
            lng: None,
            image_url: None,
        };
        assert!(request.validate_business_rules().is_err());
    }

    #[test]
    fn event_query_filters_city_exactly() {
        let event = CreateEventRequest {
            name: "Night Market".into(),
            description: "Street food and crafts".into(),
            date: NaiveDate::from_ymd_opt(2026, 11, 7).unwrap(),
            start_time: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(22, 0, 0).unwrap(),
            location: "Jack London Square".into(),
            address: "472 Water St".into(),
            city: "Oakland".into(),
            lat: None,
            lng: None,
            image_url: None,
        }
        .into_event(Uuid::new_v4());

        let oakland = EventQuery {
            city: Some("Oakland".into()),
            ..Default::default()
        };
        let lower = EventQuery {
            city: Some("oakland".into()),
            ..Default::default()
        };
        let text = EventQuery {
            q: Some("CRAFTS".into()),
            ..Default::default()
        };
        let padded = EventQuery {
            q: Some("  night ".into()),
            ..Default::default()
        };
        assert!(oakland.matches(&event));
        assert!(!lower.matches(&event));
        assert!(text.matches(&event));
        assert!(padded.matches(&event));
    }
}
