//! Services orchestrating `haven_core` flows for the HTTP layer.

pub mod auth;
pub mod cookies;
pub mod mail;
