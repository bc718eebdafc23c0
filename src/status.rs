use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Rejected status change, reported with both ends of the attempted move.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot move status from '{from}' to '{to}'")]
pub struct TransitionError {
    pub from: String,
    pub to: String,
}

/// A status column with an explicit set of allowed moves.
pub trait StatusFlow: Copy + PartialEq + fmt::Display {
    fn allows(self, next: Self) -> bool;

    fn transition(self, next: Self) -> Result<Self, TransitionError> {
        if self.allows(next) {
            Ok(next)
        } else {
            Err(TransitionError {
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }
}

// ============================================================================
// VENDOR APPLICATION STATUS
// ============================================================================

/// Vendor application status (Postgres enum `vendor_status`)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(type_name = "vendor_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum VendorStatus {
    Pending,
    Approved,
    Rejected,
}

impl VendorStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            VendorStatus::Pending => "pending",
            VendorStatus::Approved => "approved",
            VendorStatus::Rejected => "rejected",
        }
    }
}

impl StatusFlow for VendorStatus {
    /// Admins may revisit a decision, but an application never returns to pending.
    fn allows(self, next: Self) -> bool {
        use VendorStatus::*;
        matches!(
            (self, next),
            (Pending, Approved) | (Pending, Rejected) | (Rejected, Approved) | (Approved, Rejected)
        )
    }
}

impl fmt::Display for VendorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// EVENT INVITATION STATUS
// ============================================================================

/// Answer of a business to an event invitation (Postgres enum `event_vendor_status`).
///
/// `confirmed` is read as `accepted` so older clients keep working; only
/// `accepted` is ever written or returned.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(type_name = "event_vendor_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum InvitationStatus {
    Invited,
    #[serde(alias = "confirmed")]
    Accepted,
    Declined,
}

impl InvitationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            InvitationStatus::Invited => "invited",
            InvitationStatus::Accepted => "accepted",
            InvitationStatus::Declined => "declined",
        }
    }
}

impl StatusFlow for InvitationStatus {
    fn allows(self, next: Self) -> bool {
        use InvitationStatus::*;
        matches!((self, next), (Invited, Accepted) | (Invited, Declined))
    }
}

impl fmt::Display for InvitationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// BUSINESS INVITE CODES AND ROLES
// ============================================================================

/// Business invite code status (Postgres enum `business_invite_status`)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(type_name = "business_invite_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum InviteStatus {
    Active,
    Used,
    Expired,
}

/// Team role inside a business (Postgres enum `business_member_role`)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(type_name = "business_member_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MemberRole {
    Member,
    Admin,
    Owner,
}

impl MemberRole {
    /// Owners and admins run the team, invite codes and business details.
    pub fn can_manage(self) -> bool {
        matches!(self, MemberRole::Admin | MemberRole::Owner)
    }
}

/// Platform-wide role stored on the profile (Postgres enum `user_role`)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Admin,
    User,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vendor_review_can_be_revisited() {
        let rejected = VendorStatus::Pending
            .transition(VendorStatus::Rejected)
            .unwrap();
        let approved = rejected.transition(VendorStatus::Approved).unwrap();
        assert_eq!(approved, VendorStatus::Approved);
        assert!(approved.allows(VendorStatus::Rejected));
    }

    #[test]
    fn vendor_never_returns_to_pending() {
        for from in [VendorStatus::Approved, VendorStatus::Rejected, VendorStatus::Pending] {
            let err = from.transition(VendorStatus::Pending).unwrap_err();
            assert_eq!(err.to, "pending");
        }
    }

    #[test]
    fn vendor_same_state_update_is_rejected() {
        assert!(!VendorStatus::Approved.allows(VendorStatus::Approved));
    }

    #[test]
    fn invitation_answers_are_final() {
        let accepted = InvitationStatus::Invited
            .transition(InvitationStatus::Accepted)
            .unwrap();
        let err = accepted.transition(InvitationStatus::Accepted).unwrap_err();
        assert_eq!(err.to_string(), "cannot move status from 'accepted' to 'accepted'");
        assert!(accepted.transition(InvitationStatus::Declined).is_err());
        assert!(InvitationStatus::Declined
            .transition(InvitationStatus::Accepted)
            .is_err());
    }

    #[test]
    fn confirmed_reads_as_accepted() {
        let status: InvitationStatus = serde_json::from_str("\"confirmed\"").unwrap();
        assert_eq!(status, InvitationStatus::Accepted);
        assert_eq!(serde_json::to_string(&status).unwrap(), "\"accepted\"");
    }

    #[test]
    fn only_admins_and_owners_manage() {
        assert!(MemberRole::Owner.can_manage());
        assert!(MemberRole::Admin.can_manage());
        assert!(!MemberRole::Member.can_manage());
    }
}
