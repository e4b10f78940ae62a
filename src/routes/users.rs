use axum::{
    Router,
    routing::{delete, get, post, put},
};
use std::sync::Arc;

use super::guarded;
use crate::{AppState, auth::AuthorizationRegistry, handlers};

/// User Router Module
///
/// Account management. Listing, creating and deleting accounts is reserved
/// to admins; a user may read and update their own account.
pub fn user_routes(registry: &Arc<AuthorizationRegistry>) -> Router<AppState> {
    Router::new()
        // GET /me
        // The acting user resolved from the bearer authkey, associations loaded.
        .route("/me", guarded(get(handlers::get_me), registry, "readProfile"))
        .route(
            "/users",
            guarded(get(handlers::list_users), registry, "listUsers").merge(guarded(
                post(handlers::create_user),
                registry,
                "createUser",
            )),
        )
        .route(
            "/users/{user}",
            guarded(get(handlers::get_user), registry, "readUser")
                .merge(guarded(put(handlers::update_user), registry, "updateUser"))
                .merge(guarded(delete(handlers::delete_user), registry, "deleteUser")),
        )
}
