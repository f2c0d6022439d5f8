pub mod config;
pub mod error;
pub mod identity;
pub mod notifications;
pub mod portal;
pub mod telemetry;
