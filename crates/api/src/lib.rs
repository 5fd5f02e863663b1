//! Beacon push campaign API server library.
//!
//! Exposes config, state, error handling, the campaign service and the
//! routes so integration tests and the binary entrypoint share them.

pub mod campaign;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod router;
pub mod routes;
pub mod state;
