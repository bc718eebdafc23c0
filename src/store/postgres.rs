use std::{borrow::Cow, collections::HashMap, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    postgres::{PgConnectOptions, PgPoolOptions},
    Connection, Executor, FromRow, PgPool, Row,
};
use uuid::Uuid;

use super::{contains_pattern, team_vendor, MarketStore, StoreResult};
use crate::error::StoreError;
use crate::models::{
    Business, BusinessInvite, BusinessMember, BusinessSummary, Event, EventProduct,
    EventProductListing, EventQuery, EventVendor, EventVendorListing, InterestToggle,
    InvitationStatus, InviteRedemption, InviteRejection, InviteStatus, MemberRole, NewBusiness,
    NewVendorSignup, Product, ProductInterestSummary, Profile, ReceivedInvitation, UserRole,
    Vendor, VendorLocation, VendorRegistration, VendorStatus, VendorSummary,
};
use crate::status::StatusFlow;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let options = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(1)
            .acquire_timeout(Duration::from_secs(5))
            .idle_timeout(Some(Duration::from_secs(600)))
            .test_before_acquire(true);

        let pool = match options.clone().connect(database_url).await {
            Ok(pool) => pool,
            Err(sqlx::Error::Database(db_err)) if db_err.code() == Some(Cow::Borrowed("3D000")) => {
                log::info!("Database missing, attempting to create it");
                create_database_if_missing(database_url).await?;
                options.connect(database_url).await?
            }
            Err(err) => return Err(err),
        };

        sqlx::migrate!("./migrations").run(&pool).await?;
        log::info!("Database connection established and migrations applied");

        Ok(Self { pool })
    }

    async fn fetch_events_by_ids(&self, event_ids: &[Uuid]) -> Result<Vec<Event>, sqlx::Error> {
        if event_ids.is_empty() {
            return Ok(Vec::new());
        }

        sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = ANY($1)")
            .bind(event_ids)
            .fetch_all(&self.pool)
            .await
    }
}

#[async_trait]
impl MarketStore for PgStore {
    fn backend_tag(&self) -> &'static str {
        "postgres"
    }

    // ========================================================================
    // BUSINESSES
    // ========================================================================

    async fn create_business(&self, business: NewBusiness) -> StoreResult<Business> {
        let record = sqlx::query_as::<_, Business>(
            r#"
            INSERT INTO businesses (id, name, description, created_by, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, name, description, created_by, created_at
            "#,
        )
        .bind(business.id)
        .bind(business.name)
        .bind(business.description)
        .bind(business.created_by)
        .bind(business.created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(record)
    }

    async fn get_business(&self, business_id: Uuid) -> StoreResult<Option<Business>> {
        let record = sqlx::query_as::<_, Business>(
            r#"
            SELECT id, name, description, created_by, created_at
            FROM businesses
            WHERE id = $1
            "#,
        )
        .bind(business_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn find_business_by_owner(&self, user_id: Uuid) -> StoreResult<Option<Business>> {
        let record = sqlx::query_as::<_, Business>(
            r#"
            SELECT id, name, description, created_by, created_at
            FROM businesses
            WHERE created_by = $1
            ORDER BY created_at ASC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn search_businesses(&self, name: &str, limit: i64) -> StoreResult<Vec<Business>> {
        let records = sqlx::query_as::<_, Business>(
            r#"
            SELECT id, name, description, created_by, created_at
            FROM businesses
            WHERE name ILIKE $1
            ORDER BY name ASC
            LIMIT $2
            "#,
        )
        .bind(contains_pattern(name))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn list_businesses_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Business>> {
        let records = sqlx::query_as::<_, Business>(
            r#"
            SELECT b.id, b.name, b.description, b.created_by, b.created_at
            FROM businesses b
            LEFT JOIN business_members m
                ON m.business_id = b.id AND m.user_id = $1
            WHERE b.created_by = $1 OR m.id IS NOT NULL
            ORDER BY b.created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn update_business(&self, business: Business) -> StoreResult<Business> {
        let record = sqlx::query_as::<_, Business>(
            r#"
            UPDATE businesses
            SET name = $2, description = $3
            WHERE id = $1
            RETURNING id, name, description, created_by, created_at
            "#,
        )
        .bind(business.id)
        .bind(business.name)
        .bind(business.description)
        .fetch_optional(&self.pool)
        .await?;

        record.ok_or(StoreError::NotFound("Business"))
    }

    async fn delete_business(&self, business_id: Uuid) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM businesses WHERE id = $1")
            .bind(business_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("Business"));
        }

        Ok(())
    }

    // ========================================================================
    // TEAM
    // ========================================================================

    async fn add_member(&self, member: BusinessMember) -> StoreResult<BusinessMember> {
        let record = sqlx::query_as::<_, BusinessMember>(
            r#"
            INSERT INTO business_members (id, business_id, user_id, role, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(member.id)
        .bind(member.business_id)
        .bind(member.user_id)
        .bind(member.role)
        .bind(member.created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(record)
    }

    async fn get_member(&self, member_id: Uuid) -> StoreResult<Option<BusinessMember>> {
        let record =
            sqlx::query_as::<_, BusinessMember>("SELECT * FROM business_members WHERE id = $1")
                .bind(member_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(record)
    }

    async fn get_membership(
        &self,
        business_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<Option<BusinessMember>> {
        let record = sqlx::query_as::<_, BusinessMember>(
            "SELECT * FROM business_members WHERE business_id = $1 AND user_id = $2",
        )
        .bind(business_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn list_members(&self, business_id: Uuid) -> StoreResult<Vec<BusinessMember>> {
        let records = sqlx::query_as::<_, BusinessMember>(
            r#"
            SELECT * FROM business_members
            WHERE business_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(business_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn update_member_role(&self, member_id: Uuid, role: MemberRole) -> StoreResult<BusinessMember> {
        let record = sqlx::query_as::<_, BusinessMember>(
            "UPDATE business_members SET role = $2 WHERE id = $1 RETURNING *",
        )
        .bind(member_id)
        .bind(role)
        .fetch_optional(&self.pool)
        .await?;

        record.ok_or(StoreError::NotFound("Member"))
    }

    async fn remove_member(&self, member_id: Uuid) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM business_members WHERE id = $1")
            .bind(member_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("Member"));
        }

        Ok(())
    }

    // ========================================================================
    // INVITE CODES
    // ========================================================================

    async fn create_invite(&self, invite: BusinessInvite) -> StoreResult<BusinessInvite> {
        let record = sqlx::query_as::<_, BusinessInvite>(
            r#"
            INSERT INTO business_invites (
                id, business_id, code, email, status, created_by, expires_at, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(invite.id)
        .bind(invite.business_id)
        .bind(invite.code)
        .bind(invite.email)
        .bind(invite.status)
        .bind(invite.created_by)
        .bind(invite.expires_at)
        .bind(invite.created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(record)
    }

    async fn find_active_invite(
        &self,
        business_id: Uuid,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<BusinessInvite>> {
        let record = sqlx::query_as::<_, BusinessInvite>(
            r#"
            SELECT * FROM business_invites
            WHERE business_id = $1
              AND status = 'active'
              AND email IS NULL
              AND expires_at > $2
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(business_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn redeem_invite(
        &self,
        code: &str,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> StoreResult<InviteRedemption> {
        let mut tx = self.pool.begin().await?;

        let invite = sqlx::query_as::<_, BusinessInvite>(
            "SELECT * FROM business_invites WHERE code = $1 FOR UPDATE",
        )
        .bind(code.trim().to_uppercase())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StoreError::InviteUnavailable)?;

        if let Err(rejection) = invite.check_redeemable(now) {
            if rejection == InviteRejection::Expired && invite.status == InviteStatus::Active {
                sqlx::query("UPDATE business_invites SET status = 'expired' WHERE id = $1")
                    .bind(invite.id)
                    .execute(&mut *tx)
                    .await?;
                tx.commit().await?;
            }
            return Err(rejection.into());
        }

        let business = sqlx::query_as::<_, Business>(
            "SELECT id, name, description, created_by, created_at FROM businesses WHERE id = $1",
        )
        .bind(invite.business_id)
        .fetch_one(&mut *tx)
        .await?;

        let existing_member = sqlx::query_as::<_, BusinessMember>(
            "SELECT * FROM business_members WHERE business_id = $1 AND user_id = $2",
        )
        .bind(business.id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        if existing_member.is_some() || business.created_by == user_id {
            let vendor = sqlx::query_as::<_, Vendor>("SELECT * FROM vendors WHERE id = $1")
                .bind(user_id)
                .fetch_optional(&mut *tx)
                .await?;
            tx.rollback().await?;
            return Ok(InviteRedemption {
                business_id: business.id,
                member: existing_member,
                vendor,
                already_member: true,
            });
        }

        let member = BusinessMember::new(business.id, user_id, MemberRole::Member);
        let member = sqlx::query_as::<_, BusinessMember>(
            r#"
            INSERT INTO business_members (id, business_id, user_id, role, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(member.id)
        .bind(member.business_id)
        .bind(member.user_id)
        .bind(member.role)
        .bind(member.created_at)
        .fetch_one(&mut *tx)
        .await?;

        let relinked = sqlx::query_as::<_, Vendor>(
            r#"
            UPDATE vendors
            SET business_id = $2, status = 'approved', updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(business.id)
        .fetch_optional(&mut *tx)
        .await?;

        let vendor = match relinked {
            Some(vendor) => vendor,
            None => {
                let vendor = team_vendor(user_id, &business, now);
                sqlx::query_as::<_, Vendor>(
                    r#"
                    INSERT INTO vendors (
                        id, user_id, business_id, business_name, business_category,
                        description, website, instagram, status, created_at, updated_at
                    )
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                    RETURNING *
                    "#,
                )
                .bind(vendor.id)
                .bind(vendor.user_id)
                .bind(vendor.business_id)
                .bind(vendor.business_name)
                .bind(vendor.business_category)
                .bind(vendor.description)
                .bind(vendor.website)
                .bind(vendor.instagram)
                .bind(vendor.status)
                .bind(vendor.created_at)
                .bind(vendor.updated_at)
                .fetch_one(&mut *tx)
                .await?
            }
        };

        if invite.is_single_use() {
            sqlx::query("UPDATE business_invites SET status = 'used' WHERE id = $1")
                .bind(invite.id)
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query("UPDATE profiles SET is_vendor = TRUE WHERE id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(InviteRedemption {
            business_id: business.id,
            member: Some(member),
            vendor: Some(vendor),
            already_member: false,
        })
    }

    // ========================================================================
    // VENDORS
    // ========================================================================

    async fn register_vendor(&self, signup: NewVendorSignup) -> StoreResult<VendorRegistration> {
        let NewVendorSignup {
            business,
            vendor,
            location,
        } = signup;

        let mut tx = self.pool.begin().await?;

        let business = sqlx::query_as::<_, Business>(
            r#"
            INSERT INTO businesses (id, name, description, created_by, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, name, description, created_by, created_at
            "#,
        )
        .bind(business.id)
        .bind(business.name)
        .bind(business.description)
        .bind(business.created_by)
        .bind(business.created_at)
        .fetch_one(&mut *tx)
        .await?;

        let vendor = sqlx::query_as::<_, Vendor>(
            r#"
            INSERT INTO vendors (
                id, user_id, business_id, business_name, business_category,
                description, website, instagram, status, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(vendor.id)
        .bind(vendor.user_id)
        .bind(vendor.business_id)
        .bind(vendor.business_name)
        .bind(vendor.business_category)
        .bind(vendor.description)
        .bind(vendor.website)
        .bind(vendor.instagram)
        .bind(vendor.status)
        .bind(vendor.created_at)
        .bind(vendor.updated_at)
        .fetch_one(&mut *tx)
        .await?;

        let location = sqlx::query_as::<_, VendorLocation>(
            r#"
            INSERT INTO vendor_locations (id, vendor_id, address, city, zip_code, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(location.id)
        .bind(location.vendor_id)
        .bind(location.address)
        .bind(location.city)
        .bind(location.zip_code)
        .bind(location.created_at)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE profiles SET is_vendor = TRUE WHERE id = $1")
            .bind(vendor.user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(VendorRegistration {
            business,
            vendor,
            location,
        })
    }

    async fn get_vendor(&self, vendor_id: Uuid) -> StoreResult<Option<Vendor>> {
        let record = sqlx::query_as::<_, Vendor>("SELECT * FROM vendors WHERE id = $1")
            .bind(vendor_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(record)
    }

    async fn get_vendor_for_user(&self, user_id: Uuid) -> StoreResult<Option<Vendor>> {
        let record = sqlx::query_as::<_, Vendor>(
            r#"
            SELECT * FROM vendors
            WHERE user_id = $1
            ORDER BY created_at ASC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn get_vendor_location(&self, vendor_id: Uuid) -> StoreResult<Option<VendorLocation>> {
        let record =
            sqlx::query_as::<_, VendorLocation>("SELECT * FROM vendor_locations WHERE vendor_id = $1")
                .bind(vendor_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(record)
    }

    async fn list_vendors(&self, status: Option<VendorStatus>) -> StoreResult<Vec<Vendor>> {
        let records = sqlx::query_as::<_, Vendor>(
            r#"
            SELECT * FROM vendors
            WHERE ($1::vendor_status IS NULL OR status = $1)
            ORDER BY created_at DESC
            "#,
        )
        .bind(status)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn list_vendors_for_business(&self, business_id: Uuid) -> StoreResult<Vec<Vendor>> {
        let records = sqlx::query_as::<_, Vendor>(
            r#"
            SELECT * FROM vendors
            WHERE business_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(business_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn set_vendor_status(&self, vendor_id: Uuid, status: VendorStatus) -> StoreResult<Vendor> {
        let current = self
            .get_vendor(vendor_id)
            .await?
            .ok_or(StoreError::NotFound("Vendor"))?;
        current.status.transition(status)?;

        // Conditioned on the status we validated against, so a concurrent review cannot be overwritten.
        let updated = sqlx::query_as::<_, Vendor>(
            r#"
            UPDATE vendors
            SET status = $2, updated_at = NOW()
            WHERE id = $1 AND status = $3
            RETURNING *
            "#,
        )
        .bind(vendor_id)
        .bind(status)
        .bind(current.status)
        .fetch_optional(&self.pool)
        .await?;

        updated.ok_or_else(|| StoreError::Conflict("Vendor status changed concurrently".into()))
    }

    // ========================================================================
    // PROFILES
    // ========================================================================

    async fn get_profile(&self, user_id: Uuid) -> StoreResult<Option<Profile>> {
        let record = sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(record)
    }

    async fn upsert_profile(&self, profile: Profile) -> StoreResult<Profile> {
        let record = sqlx::query_as::<_, Profile>(
            r#"
            INSERT INTO profiles (id, first_name, last_name, role, is_vendor, created_at)
            VALUES (
                $1, $2, $3, $4,
                EXISTS (SELECT 1 FROM vendors WHERE user_id = $1),
                $5
            )
            ON CONFLICT (id) DO UPDATE
            SET first_name = EXCLUDED.first_name,
                last_name = EXCLUDED.last_name
            RETURNING *
            "#,
        )
        .bind(profile.id)
        .bind(profile.first_name)
        .bind(profile.last_name)
        .bind(profile.role)
        .bind(profile.created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(record)
    }

    async fn set_profile_role(&self, user_id: Uuid, role: UserRole) -> StoreResult<Profile> {
        let record = sqlx::query_as::<_, Profile>(
            r#"
            INSERT INTO profiles (id, role, is_vendor)
            VALUES ($1, $2, EXISTS (SELECT 1 FROM vendors WHERE user_id = $1))
            ON CONFLICT (id) DO UPDATE SET role = EXCLUDED.role
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(role)
        .fetch_one(&self.pool)
        .await?;

        Ok(record)
    }

    // ========================================================================
    // EVENTS
    // ========================================================================

    async fn create_event(&self, event: Event) -> StoreResult<Event> {
        let record = sqlx::query_as::<_, Event>(
            r#"
            INSERT INTO events (
                id, name, description, date, start_time, end_time, location,
                address, city, lat, lng, image_url, created_by, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING *
            "#,
        )
        .bind(event.id)
        .bind(event.name)
        .bind(event.description)
        .bind(event.date)
        .bind(event.start_time)
        .bind(event.end_time)
        .bind(event.location)
        .bind(event.address)
        .bind(event.city)
        .bind(event.lat)
        .bind(event.lng)
        .bind(event.image_url)
        .bind(event.created_by)
        .bind(event.created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(record)
    }

    async fn get_event(&self, event_id: Uuid) -> StoreResult<Option<Event>> {
        let record = sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = $1")
            .bind(event_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(record)
    }

    async fn search_events(&self, query: &EventQuery) -> StoreResult<Vec<Event>> {
        let text = query.q.as_deref().map(contains_pattern);
        let records = sqlx::query_as::<_, Event>(
            r#"
            SELECT * FROM events
            WHERE ($1::text IS NULL OR city = $1)
              AND ($2::text IS NULL OR name ILIKE $2 OR description ILIKE $2)
              AND ($3::date IS NULL OR date >= $3)
            ORDER BY date ASC, start_time ASC
            "#,
        )
        .bind(query.city.as_deref())
        .bind(text)
        .bind(query.from)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn list_events_by_creator(&self, user_id: Uuid) -> StoreResult<Vec<Event>> {
        let records = sqlx::query_as::<_, Event>(
            r#"
            SELECT * FROM events
            WHERE created_by = $1
            ORDER BY date ASC, start_time ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    // ========================================================================
    // EVENT INVITATIONS
    // ========================================================================

    async fn invite_vendor(&self, invitation: EventVendor) -> StoreResult<EventVendor> {
        let record = sqlx::query_as::<_, EventVendor>(
            r#"
            INSERT INTO event_vendors (id, event_id, business_id, status, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(invitation.id)
        .bind(invitation.event_id)
        .bind(invitation.business_id)
        .bind(invitation.status)
        .bind(invitation.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| match StoreError::from(err) {
            StoreError::Conflict(_) => {
                StoreError::Conflict("Business already invited to this event".into())
            }
            other => other,
        })?;

        Ok(record)
    }

    async fn get_event_vendor(&self, invitation_id: Uuid) -> StoreResult<Option<EventVendor>> {
        let record = sqlx::query_as::<_, EventVendor>("SELECT * FROM event_vendors WHERE id = $1")
            .bind(invitation_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(record)
    }

    async fn get_event_vendor_for_business(
        &self,
        event_id: Uuid,
        business_id: Uuid,
    ) -> StoreResult<Option<EventVendor>> {
        let record = sqlx::query_as::<_, EventVendor>(
            "SELECT * FROM event_vendors WHERE event_id = $1 AND business_id = $2",
        )
        .bind(event_id)
        .bind(business_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn list_event_vendors(&self, event_id: Uuid) -> StoreResult<Vec<EventVendorListing>> {
        let rows = sqlx::query(
            r#"
            SELECT ev.id,
                   ev.status,
                   b.id AS business_id,
                   b.name AS business_name,
                   b.description AS business_description,
                   v.business_category,
                   v.instagram,
                   v.website
            FROM event_vendors ev
            INNER JOIN businesses b ON b.id = ev.business_id
            LEFT JOIN LATERAL (
                SELECT business_category, instagram, website
                FROM vendors
                WHERE vendors.business_id = b.id
                ORDER BY created_at ASC
                LIMIT 1
            ) v ON TRUE
            WHERE ev.event_id = $1
            ORDER BY ev.created_at ASC
            "#,
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;

        let mut listings = Vec::with_capacity(rows.len());
        for row in rows {
            let category: Option<String> = row.try_get("business_category")?;
            let vendor = match category {
                Some(business_category) => Some(VendorSummary {
                    business_category,
                    instagram: row.try_get("instagram")?,
                    website: row.try_get("website")?,
                }),
                None => None,
            };

            listings.push(EventVendorListing {
                id: row.try_get("id")?,
                status: row.try_get("status")?,
                business: BusinessSummary {
                    id: row.try_get("business_id")?,
                    name: row.try_get("business_name")?,
                    description: row.try_get("business_description")?,
                },
                vendor,
            });
        }

        Ok(listings)
    }

    async fn list_invitations_for_business(
        &self,
        business_id: Uuid,
    ) -> StoreResult<Vec<ReceivedInvitation>> {
        let invitations = sqlx::query_as::<_, EventVendor>(
            r#"
            SELECT * FROM event_vendors
            WHERE business_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(business_id)
        .fetch_all(&self.pool)
        .await?;

        let event_ids: Vec<Uuid> = invitations.iter().map(|inv| inv.event_id).collect();
        let mut events: HashMap<Uuid, Event> = self
            .fetch_events_by_ids(&event_ids)
            .await?
            .into_iter()
            .map(|event| (event.id, event))
            .collect();

        let received = invitations
            .into_iter()
            .filter_map(|invitation| {
                let event = events.remove(&invitation.event_id)?;
                Some(ReceivedInvitation {
                    id: invitation.id,
                    status: invitation.status,
                    business_id: invitation.business_id,
                    event,
                })
            })
            .collect();

        Ok(received)
    }

    async fn set_event_vendor_status(
        &self,
        invitation_id: Uuid,
        status: InvitationStatus,
    ) -> StoreResult<EventVendor> {
        let current = self
            .get_event_vendor(invitation_id)
            .await?
            .ok_or(StoreError::NotFound("Invitation"))?;
        current.status.transition(status)?;

        let updated = sqlx::query_as::<_, EventVendor>(
            r#"
            UPDATE event_vendors
            SET status = $2
            WHERE id = $1 AND status = $3
            RETURNING *
            "#,
        )
        .bind(invitation_id)
        .bind(status)
        .bind(current.status)
        .fetch_optional(&self.pool)
        .await?;

        updated.ok_or_else(|| StoreError::Conflict("Invitation already answered".into()))
    }

    // ========================================================================
    // PRODUCTS
    // ========================================================================

    async fn create_product(&self, product: Product) -> StoreResult<Product> {
        let record = sqlx::query_as::<_, Product>(
            r#"
            INSERT INTO products (id, business_id, name, description, price, image_url, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(product.id)
        .bind(product.business_id)
        .bind(product.name)
        .bind(product.description)
        .bind(product.price)
        .bind(product.image_url)
        .bind(product.created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(record)
    }

    async fn get_product(&self, product_id: Uuid) -> StoreResult<Option<Product>> {
        let record = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1")
            .bind(product_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(record)
    }

    async fn list_products_for_business(&self, business_id: Uuid) -> StoreResult<Vec<Product>> {
        let records = sqlx::query_as::<_, Product>(
            r#"
            SELECT * FROM products
            WHERE business_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(business_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn update_product(&self, product: Product) -> StoreResult<Product> {
        let record = sqlx::query_as::<_, Product>(
            r#"
            UPDATE products
            SET name = $2, description = $3, price = $4, image_url = $5
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(product.id)
        .bind(product.name)
        .bind(product.description)
        .bind(product.price)
        .bind(product.image_url)
        .fetch_optional(&self.pool)
        .await?;

        record.ok_or(StoreError::NotFound("Product"))
    }

    async fn delete_product(&self, product_id: Uuid) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(product_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("Product"));
        }

        Ok(())
    }

    // ========================================================================
    // EVENT PRODUCTS
    // ========================================================================

    async fn set_event_products(
        &self,
        event_id: Uuid,
        business_id: Uuid,
        product_ids: &[Uuid],
    ) -> StoreResult<Vec<EventProduct>> {
        let mut product_ids = product_ids.to_vec();
        product_ids.sort_unstable();
        product_ids.dedup();

        let mut tx = self.pool.begin().await?;

        let owned: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM products WHERE id = ANY($1) AND business_id = $2",
        )
        .bind(&product_ids)
        .bind(business_id)
        .fetch_one(&mut *tx)
        .await?;

        if owned != product_ids.len() as i64 {
            return Err(StoreError::Forbidden(
                "Products must belong to the business".into(),
            ));
        }

        sqlx::query("DELETE FROM event_products WHERE event_id = $1 AND business_id = $2")
            .bind(event_id)
            .bind(business_id)
            .execute(&mut *tx)
            .await?;

        let mut stored = Vec::with_capacity(product_ids.len());
        for product_id in product_ids {
            let record = sqlx::query_as::<_, EventProduct>(
                r#"
                INSERT INTO event_products (id, event_id, product_id, business_id, created_at)
                VALUES ($1, $2, $3, $4, NOW())
                RETURNING *
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(event_id)
            .bind(product_id)
            .bind(business_id)
            .fetch_one(&mut *tx)
            .await?;
            stored.push(record);
        }

        tx.commit().await?;

        Ok(stored)
    }

    async fn list_event_products(&self, event_id: Uuid) -> StoreResult<Vec<EventProductListing>> {
        let rows = sqlx::query(
            r#"
            SELECT p.*, b.name AS business_name
            FROM event_products ep
            INNER JOIN products p ON p.id = ep.product_id
            INNER JOIN businesses b ON b.id = ep.business_id
            WHERE ep.event_id = $1
            ORDER BY ep.created_at ASC, p.name ASC
            "#,
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;

        let mut listings = Vec::with_capacity(rows.len());
        for row in rows {
            listings.push(EventProductListing {
                product: Product::from_row(&row)?,
                business_name: row.try_get("business_name")?,
            });
        }

        Ok(listings)
    }

    async fn is_product_at_event(&self, event_id: Uuid, product_id: Uuid) -> StoreResult<bool> {
        let found: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM event_products WHERE event_id = $1 AND product_id = $2)",
        )
        .bind(event_id)
        .bind(product_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(found)
    }

    // ========================================================================
    // INTEREST
    // ========================================================================

    async fn toggle_interest(
        &self,
        product_id: Uuid,
        event_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<InterestToggle> {
        let mut tx = self.pool.begin().await?;

        let removed: Option<Uuid> = sqlx::query_scalar(
            r#"
            DELETE FROM product_interests
            WHERE product_id = $1 AND event_id = $2 AND user_id = $3
            RETURNING id
            "#,
        )
        .bind(product_id)
        .bind(event_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        if removed.is_none() {
            // A concurrent click may have inserted first; the unique key keeps one row.
            sqlx::query(
                r#"
                INSERT INTO product_interests (id, product_id, event_id, user_id, created_at)
                VALUES ($1, $2, $3, $4, NOW())
                ON CONFLICT (product_id, event_id, user_id) DO NOTHING
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(product_id)
            .bind(event_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        }

        let interest_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM product_interests WHERE product_id = $1 AND event_id = $2",
        )
        .bind(product_id)
        .bind(event_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(InterestToggle {
            interested: removed.is_none(),
            interest_count,
        })
    }

    async fn count_interests(&self, product_id: Uuid, event_id: Uuid) -> StoreResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM product_interests WHERE product_id = $1 AND event_id = $2",
        )
        .bind(product_id)
        .bind(event_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn has_interest(&self, product_id: Uuid, event_id: Uuid, user_id: Uuid) -> StoreResult<bool> {
        let found: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM product_interests
                WHERE product_id = $1 AND event_id = $2 AND user_id = $3
            )
            "#,
        )
        .bind(product_id)
        .bind(event_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(found)
    }

    async fn interest_summary_for_business(
        &self,
        business_id: Uuid,
    ) -> StoreResult<Vec<ProductInterestSummary>> {
        let records = sqlx::query_as::<_, ProductInterestSummary>(
            r#"
            SELECT ep.product_id,
                   p.name AS product_name,
                   ep.event_id,
                   e.name AS event_name,
                   COUNT(pi.id) AS interest_count
            FROM event_products ep
            INNER JOIN products p ON p.id = ep.product_id
            INNER JOIN events e ON e.id = ep.event_id
            LEFT JOIN product_interests pi
                ON pi.product_id = ep.product_id AND pi.event_id = ep.event_id
            WHERE ep.business_id = $1
            GROUP BY ep.product_id, p.name, ep.event_id, e.name, e.date
            ORDER BY e.date ASC, p.name ASC
            "#,
        )
        .bind(business_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }
}

/// Creates the database named in `database_url` through the `postgres` maintenance database.
pub async fn create_database_if_missing(database_url: &str) -> Result<(), sqlx::Error> {
    let options: PgConnectOptions = database_url.parse()?;
    let database_name = options
        .get_database()
        .map(|name| name.to_string())
        .unwrap_or_else(|| "postgres".to_string());

    if database_name.eq_ignore_ascii_case("postgres") {
        return Ok(());
    }

    let maintenance_options = options.clone().database("postgres");
    let mut connection = sqlx::postgres::PgConnection::connect_with(&maintenance_options).await?;

    let escaped_name = database_name.replace('"', "\"\"");
    let create_stmt = format!("CREATE DATABASE \"{}\"", escaped_name);

    match connection.execute(create_stmt.as_str()).await {
        Ok(_) => {
            log::info!("Created database '{}'", database_name);
            Ok(())
        }
        Err(sqlx::Error::Database(db_err)) if db_err.code() == Some(Cow::Borrowed("42P04")) => {
            log::info!("Database '{}' already exists", database_name);
            Ok(())
        }
        Err(err) => Err(err),
    }
}
