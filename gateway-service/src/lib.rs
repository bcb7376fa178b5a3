//! Streaming AI chat gateway.
//!
//! Accepts chat requests over HTTP, relays the selected provider's token
//! stream back to the caller as server-sent events, and meters usage
//! against a prepaid credit balance.
pub mod config;
pub mod handlers;
pub mod models;
pub mod services;
pub mod startup;
