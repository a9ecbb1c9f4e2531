//! HTTP route handlers

pub mod alerts;
pub mod detect;
pub mod emotions;
pub mod health;
pub mod metrics;
pub mod settings;
pub mod stats;
