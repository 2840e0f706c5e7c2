//! Library crate for puzzle-arena-back: the try lifecycle, cooldown gate and
//! spectator broadcast, exposed for binaries and integration tests.

/// Runtime configuration.
pub mod config;
/// Persistence layer.
pub mod dao;
/// Wire types.
pub mod dto;
/// Error taxonomy and HTTP mapping.
pub mod error;
/// HTTP routes.
pub mod routes;
/// Business logic.
pub mod services;
/// Shared application state.
pub mod state;
