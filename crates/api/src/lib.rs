//! mediarelay API server library.
//!
//! Exposes the building blocks (config, state, error handling, routes,
//! WebSocket infrastructure, event forwarding) so integration tests and
//! the binary entrypoint can both access them.

pub mod config;
pub mod error;
pub mod forwarder;
pub mod handlers;
pub mod response;
pub mod router;
pub mod routes;
pub mod state;
pub mod ws;
