mod common;

use common::{fields, harness};
use serde_json::json;
use std::sync::Arc;
use tenant_router::service::ProvisionRequest;
use tenant_router::tenant::NewTenant;
use tenant_router::{AppError, TenantProvisioner};

fn request(database_id: &str, owner: serde_json::Value) -> ProvisionRequest {
    ProvisionRequest {
        tenant: NewTenant {
            name: "Acme".into(),
            slug: None,
            external_id: None,
            status: None,
            database_id: database_id.into(),
        },
        owner: fields(owner),
    }
}

#[tokio::test]
async fn test_provision_creates_tenant_and_owner() {
    let h = harness().await;
    let db = h.add_database("acme").await;
    let provisioner = TenantProvisioner::new(h.directory.clone(), Arc::clone(&h.cache));

    let done = provisioner
        .provision(request(
            &db.id,
            json!({"email": "owner@acme.test", "name": "Owner", "password": "s3cret-pass"}),
        ))
        .await
        .unwrap();
    assert_eq!(done.tenant.slug, "acme");
    assert_eq!(done.owner.tenant_id, done.tenant.id);
    assert!(done.owner.check_password("s3cret-pass"));
    assert_eq!(h.cache.cached_tenants(), vec![done.tenant.id.clone()]);
}

#[tokio::test]
async fn test_failed_owner_rolls_back_tenant() {
    let h = harness().await;
    let db = h.add_database("acme").await;
    let provisioner = TenantProvisioner::new(h.directory.clone(), Arc::clone(&h.cache));

    let err = provisioner
        .provision(request(&db.id, json!({"email": "not-an-email", "name": "Owner", "password": "s3cret-pass"})))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)), "got {:?}", err);
    assert!(h.directory.find_by_slug("acme").await.unwrap().is_none());
    assert!(h.cache.cached_tenants().is_empty());

    provisioner
        .provision(request(
            &db.id,
            json!({"email": "owner@acme.test", "name": "Owner", "password": "s3cret-pass"}),
        ))
        .await
        .unwrap();
}
