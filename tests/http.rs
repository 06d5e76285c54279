mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use common::{admin_token, harness, tenant_token};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tenant_router::app;
use tower::ServiceExt;

async fn send(router: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let res = router.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn admin(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, format!("Bearer {}", admin_token()))
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn tenant_on_own_database(router: &Router, name: &str) -> String {
    let (status, db) = send(
        router,
        admin(
            "POST",
            "/admin/databases",
            json!({"name": name, "type": "sqlite", "url": format!("sqlite://{}.sqlite", name)}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", db);
    let (status, tenant) = send(
        router,
        admin(
            "POST",
            "/admin/tenants",
            json!({"name": name, "databaseId": db["data"]["id"]}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", tenant);
    tenant["data"]["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health_and_ready() {
    let h = harness().await;
    let router = app(h.state());
    let (status, body) = send(&router, Request::get("/health").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = send(&router, Request::get("/ready").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["database"], "ok");
}

#[tokio::test]
async fn test_admin_routes_require_admin_token() {
    let h = harness().await;
    let router = app(h.state());

    let (status, body) = send(&router, Request::get("/admin/tenants").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "unauthorized");

    let req = Request::get("/admin/tenants")
        .header(header::AUTHORIZATION, format!("Bearer {}", tenant_token(None)))
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(&router, req).await.0, StatusCode::UNAUTHORIZED);

    let (status, body) = send(&router, admin("GET", "/admin/tenants", Value::Null)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["count"], 0);
}

#[tokio::test]
async fn test_friends_are_isolated_per_tenant_over_http() {
    let h = harness().await;
    let router = app(h.state());
    let acme = tenant_on_own_database(&router, "acme").await;
    let globex = tenant_on_own_database(&router, "globex").await;

    let create = Request::post("/friends")
        .header(header::CONTENT_TYPE, "application/json")
        .header("X-Tenant-ID", &acme)
        .body(Body::from(
            json!({"name": "Wile", "phoneNumber": "555-0100", "tenantId": globex}).to_string(),
        ))
        .unwrap();
    let (status, created) = send(&router, create).await;
    assert_eq!(status, StatusCode::CREATED, "{}", created);
    assert_eq!(created["data"]["tenantId"], acme.as_str());
    assert_eq!(created["data"]["phoneNumber"], "555-0100");
    let friend_id = created["data"]["id"].as_str().unwrap().to_string();

    let as_globex = Request::get(format!("/friends/{}", friend_id))
        .header(header::AUTHORIZATION, format!("Bearer {}", tenant_token(Some(&globex))))
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&router, as_globex).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");

    let slug_list = Request::get("/friends?tenant_slug=acme").body(Body::empty()).unwrap();
    let (status, body) = send(&router, slug_list).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["count"], 1);
    assert_eq!(body["data"][0]["id"], friend_id.as_str());
}

#[tokio::test]
async fn test_unresolved_tenant_is_unauthorized() {
    let h = harness().await;
    let router = app(h.state());
    let (status, body) = send(&router, Request::get("/friends").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "unauthorized");

    let bad_token = Request::get("/users")
        .header(header::AUTHORIZATION, "Bearer garbage")
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(&router, bad_token).await.0, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_provision_then_list_users() {
    let h = harness().await;
    let router = app(h.state());
    let (_, db) = send(
        &router,
        admin(
            "POST",
            "/admin/databases",
            json!({"name": "acme", "type": "sqlite", "url": "sqlite://acme.sqlite"}),
        ),
    )
    .await;

    let (status, done) = send(
        &router,
        admin(
            "POST",
            "/admin/tenants/provision",
            json!({
                "name": "Acme",
                "databaseId": db["data"]["id"],
                "owner": {"email": "owner@acme.test", "name": "Owner", "password": "s3cret-pass"}
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", done);
    let tenant_id = done["data"]["tenant"]["id"].as_str().unwrap().to_string();
    assert!(done["data"]["owner"].get("passwordHash").is_none());

    let list = Request::get("/users")
        .header("X-Tenant-ID", &tenant_id)
        .body(Body::empty())
        .unwrap();
    let (status, users) = send(&router, list).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(users["data"][0]["email"], "owner@acme.test");

    let (status, cached) = send(&router, admin("GET", "/admin/cache", Value::Null)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cached["data"][0]["tenantId"], tenant_id.as_str());
    assert_eq!(cached["data"][0]["engine"], "sqlite");
    assert!(cached["data"][0]["openedAt"].is_string());
}

#[tokio::test]
async fn test_moving_tenant_routes_next_request_to_new_database() {
    let h = harness().await;
    let router = app(h.state());
    let acme = tenant_on_own_database(&router, "acme").await;
    let (status, target) = send(
        &router,
        admin(
            "POST",
            "/admin/databases",
            json!({"name": "acme-new", "type": "sqlite", "url": "sqlite://acme-new.sqlite"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", target);
    let target_id = target["data"]["id"].as_str().unwrap().to_string();

    let create = Request::post("/friends")
        .header(header::CONTENT_TYPE, "application/json")
        .header("X-Tenant-ID", &acme)
        .body(Body::from(json!({"name": "Wile"}).to_string()))
        .unwrap();
    assert_eq!(send(&router, create).await.0, StatusCode::CREATED);

    let (status, moved) = send(
        &router,
        admin("PATCH", &format!("/admin/tenants/{}", acme), json!({"databaseId": target_id})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", moved);
    let (_, cached) = send(&router, admin("GET", "/admin/cache", Value::Null)).await;
    assert_eq!(cached["meta"]["count"], 0);

    let req = Request::get("/friends").header("X-Tenant-ID", &acme).body(Body::empty()).unwrap();
    let (status, body) = send(&router, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["count"], 0);

    let (_, cached) = send(&router, admin("GET", "/admin/cache", Value::Null)).await;
    assert_eq!(cached["data"][0]["tenantId"], acme.as_str());
    assert_eq!(cached["data"][0]["databaseId"], target_id.as_str());
}

#[tokio::test]
async fn test_deleting_tenant_evicts_and_blocks_requests() {
    let h = harness().await;
    let router = app(h.state());
    let acme = tenant_on_own_database(&router, "acme").await;

    let req = Request::get("/friends").header("X-Tenant-ID", &acme).body(Body::empty()).unwrap();
    assert_eq!(send(&router, req).await.0, StatusCode::OK);

    let (status, _) = send(&router, admin("DELETE", &format!("/admin/tenants/{}", acme), Value::Null)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, cached) = send(&router, admin("GET", "/admin/cache", Value::Null)).await;
    assert_eq!(cached["meta"]["count"], 0);

    let req = Request::get("/friends").header("X-Tenant-ID", &acme).body(Body::empty()).unwrap();
    assert_eq!(send(&router, req).await.0, StatusCode::UNAUTHORIZED);
}
