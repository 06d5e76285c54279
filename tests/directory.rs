mod common;

use common::harness;
use tenant_router::tenant::{NewDatabaseConfig, NewTenant, TenantStatus, TenantUpdate};
use tenant_router::{AppError, DatabaseType};

fn new_tenant(name: &str, slug: Option<&str>, database_id: &str) -> NewTenant {
    NewTenant {
        name: name.into(),
        slug: slug.map(String::from),
        external_id: None,
        status: None,
        database_id: database_id.into(),
    }
}

#[tokio::test]
async fn test_create_and_lookup() {
    let h = harness().await;
    let db = h.add_database("acme").await;
    let created = h
        .directory
        .create(NewTenant {
            external_id: Some("crm-42".into()),
            ..new_tenant("Acme", Some("acme"), &db.id)
        })
        .await
        .unwrap();
    assert_eq!(created.status, TenantStatus::Active);
    assert_eq!(created.external_id.as_deref(), Some("crm-42"));

    let by_slug = h.directory.find_by_slug("acme").await.unwrap().unwrap();
    let by_id = h.directory.find_by_id(&created.id).await.unwrap().unwrap();
    assert_eq!(by_slug, created);
    assert_eq!(by_id, created);
    assert!(h.directory.find_by_slug("nope").await.unwrap().is_none());
    assert!(h.directory.find_by_id("nope").await.unwrap().is_none());
}

#[tokio::test]
async fn test_duplicate_slug_conflicts_until_soft_deleted() {
    let h = harness().await;
    let db = h.add_database("shared").await;
    let first = h.directory.create(new_tenant("Acme", Some("acme"), &db.id)).await.unwrap();

    let err = h
        .directory
        .create(new_tenant("Acme Again", Some("acme"), &db.id))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)), "got {:?}", err);

    h.directory.soft_delete(&first.id).await.unwrap();
    assert!(h.directory.find_by_id(&first.id).await.unwrap().is_none());
    assert!(h.directory.list_tenants().await.unwrap().is_empty());

    let second = h.directory.create(new_tenant("Acme Again", Some("acme"), &db.id)).await.unwrap();
    assert_ne!(second.id, first.id);
    assert!(matches!(
        h.directory.soft_delete(&first.id).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_invalid_slug_and_missing_database_rejected() {
    let h = harness().await;
    let db = h.add_database("acme").await;
    let too_long = "a".repeat(51);
    for bad in ["Acme", "acme_corp", "-acme", too_long.as_str()] {
        let err = h.directory.create(new_tenant("Acme", Some(bad), &db.id)).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)), "{} gave {:?}", bad, err);
    }
    let err = h
        .directory
        .create(new_tenant("Acme", None, "no-such-db"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn test_update_missing_tenant_is_not_found() {
    let h = harness().await;
    let err = h
        .directory
        .update("ghost", TenantUpdate::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_update_changes_only_given_fields() {
    let h = harness().await;
    let db = h.add_database("acme").await;
    let tenant = h.add_tenant("Acme", &db.id).await;

    let updated = h
        .directory
        .update(
            &tenant.id,
            TenantUpdate {
                name: Some("Acme Industries".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.name, "Acme Industries");
    assert_eq!(updated.slug, tenant.slug);
    assert_eq!(updated.database_id, db.id);
}

#[tokio::test]
async fn test_database_config_rules() {
    let h = harness().await;
    let err = h
        .directory
        .create_database(NewDatabaseConfig {
            name: "mismatch".into(),
            db_type: DatabaseType::Postgres,
            url: "sqlite://x.sqlite".into(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let db = h.add_database("acme").await;
    assert!(matches!(
        h.directory
            .create_database(NewDatabaseConfig {
                name: "acme".into(),
                db_type: DatabaseType::Sqlite,
                url: "sqlite://other.sqlite".into(),
            })
            .await,
        Err(AppError::Conflict(_))
    ));

    let tenant = h.add_tenant("Acme", &db.id).await;
    assert!(matches!(
        h.directory.delete_database(&db.id).await,
        Err(AppError::Conflict(_))
    ));
    h.directory.soft_delete(&tenant.id).await.unwrap();
    h.directory.delete_database(&db.id).await.unwrap();
    assert!(matches!(
        h.directory.delete_database(&db.id).await,
        Err(AppError::NotFound(_))
    ));
    assert!(h.directory.find_database(&db.id).await.unwrap().is_none());
    assert!(h.directory.list_databases().await.unwrap().is_empty());
}
