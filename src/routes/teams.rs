use axum::{
    Router,
    routing::{delete, get, post},
};
use std::sync::Arc;

use super::guarded;
use crate::{AppState, auth::AuthorizationRegistry, handlers};

/// Team Router Module
///
/// Team administration is reserved to admins; members may read their team.
pub fn team_routes(registry: &Arc<AuthorizationRegistry>) -> Router<AppState> {
    Router::new()
        .route(
            "/teams",
            guarded(get(handlers::list_teams), registry, "listTeams").merge(guarded(
                post(handlers::create_team),
                registry,
                "createTeam",
            )),
        )
        .route(
            "/teams/{team}",
            guarded(get(handlers::get_team), registry, "readTeam").merge(guarded(
                delete(handlers::delete_team),
                registry,
                "deleteTeam",
            )),
        )
        // POST/DELETE /teams/{team}/users/{user}
        // Adds or removes a membership row.
        .route(
            "/teams/{team}/users/{user}",
            guarded(post(handlers::add_team_user), registry, "manageTeamUsers").merge(guarded(
                delete(handlers::remove_team_user),
                registry,
                "manageTeamUsers",
            )),
        )
}
