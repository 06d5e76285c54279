//! Tenant-scoped entity routes.

use crate::handlers::tenant_data::{
    create_friend, create_user, delete_friend, delete_user, list_friends, list_users, read_friend,
    read_user, update_friend, update_user,
};
use crate::state::AppState;
use axum::{routing::get, Router};

pub fn tenant_routes(state: AppState) -> Router {
    Router::new()
        .route("/friends", get(list_friends).post(create_friend))
        .route(
            "/friends/:id",
            get(read_friend).patch(update_friend).delete(delete_friend),
        )
        .route("/users", get(list_users).post(create_user))
        .route(
            "/users/:id",
            get(read_user).patch(update_user).delete(delete_user),
        )
        .with_state(state)
}
