//! # haven_core
//!
//! Core domain logic for Haven: credential and one-time-code handling,
//! session-token lifecycle, the cache-aside data-access layer, and the
//! repository traits shared by `haven_api` and `haven_server`.

pub mod auth;
pub mod cache;
pub mod events;
pub mod ids;
pub mod migrate;
pub mod models;
pub mod store;
