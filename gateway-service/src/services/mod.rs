pub mod broadcast;
pub mod metrics;
pub mod providers;
pub mod relay;
pub mod store;
pub mod tokens;
