//! HTTP handlers for the share service.

pub mod analysis;
pub mod fortune;
pub mod health;
pub mod share;
