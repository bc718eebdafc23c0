//! Local marketplace backend: vendors, their businesses and products, the
//! events they attend, and shopper interest in what they bring.

pub mod auth;
pub mod clients;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod services;
pub mod status;
pub mod store;
