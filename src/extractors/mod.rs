//! Request extractors.

pub mod admin;
pub mod tenant;
pub use admin::AdminGuard;
pub use tenant::Tenant;
