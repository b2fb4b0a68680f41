//! ironman-dashboard library target.
//!
//! Exposes the router, state and views for integration tests.
//! The binary `main.rs` depends on this library target.

pub mod api_types;
pub mod routes;
pub mod state;
pub mod views;
