//! Operations that span several store calls.

pub mod access;
pub mod businesses;
pub mod interests;
pub mod invites;
