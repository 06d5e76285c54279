//! HTTP handlers for the admin directory and tenant-scoped entities.

pub mod admin;
pub mod tenant_data;
