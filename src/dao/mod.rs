/// Try storage backends behind a common trait.
pub mod arena_store;
/// Directory model definitions (competitions, users, groups).
pub mod models;
/// Backend-agnostic storage errors.
pub mod storage;
