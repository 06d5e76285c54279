//! Route tables.

pub mod admin;
pub mod common;
pub mod tenant;
pub use admin::admin_routes;
pub use common::common_routes;
pub use tenant::tenant_routes;
