//! Push campaign domain types and pure lifecycle logic.
//!
//! Nothing in this crate touches the database or the network. The `db`
//! crate persists these types; the `api` crate orchestrates them.

pub mod app_config;
pub mod audience;
pub mod content;
pub mod demo;
pub mod error;
pub mod filter;
pub mod lifecycle;
pub mod listing;
pub mod platform;
pub mod result;
pub mod state;
pub mod test_send;
pub mod trigger;
pub mod types;
