//! Request handlers.
//!
//! Handlers extract the calling member, state and body, then delegate to the
//! campaign service in [`crate::campaign`].

pub mod push;
