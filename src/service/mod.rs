//! Tenant-scoped data access and the business services built on it.

mod friends;
mod provisioning;
mod scoped;
mod users;
mod validation;
pub use friends::{Friend, FriendsService};
pub use provisioning::{ProvisionRequest, Provisioned, TenantProvisioner};
pub use scoped::{Fields, TenantEntity, TenantScopedStore};
pub use users::{User, UsersService};
pub use validation::{FieldKind, FieldRule, Format, RequestValidator, Rules};
