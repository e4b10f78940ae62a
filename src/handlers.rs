use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use futures::future::join_all;
use serde_json::Value;

use crate::{
    AppState,
    auth::{AccessError, AuthUser},
    error::{ApiError, ModelError},
    helper,
    models::{
        Collection, Deleted, Entity, Team, User,
        requests::{
            CollectionMember, CreateCollectionRequest, CreateMemberRequest, CreateTeamRequest,
            CreateUserRequest, Credentials, UpdateCollectionRequest, UpdateUserRequest,
        },
    },
    storage,
};

type JsonResult = Result<Json<Value>, ApiError>;
type CreatedResult = Result<(StatusCode, Json<Value>), ApiError>;

fn shallow<E: Entity>(entities: &[E]) -> Json<Value> {
    Json(Value::Array(
        entities.iter().map(|e| e.to_json_object(false)).collect(),
    ))
}

// --- Profile ---

/// get_me
///
/// The acting user with every association loaded.
#[utoipa::path(
    get,
    path = "/me",
    responses(
        (status = 200, description = "Acting user, complete view"),
        (status = 401, description = "Missing or unknown authkey")
    )
)]
pub async fn get_me(AuthUser(mut user): AuthUser, State(state): State<AppState>) -> JsonResult {
    user.load_associations(state.store.as_ref()).await?;
    Ok(Json(user.to_json_object(true)))
}

// --- Users ---

#[utoipa::path(
    get,
    path = "/users",
    responses((status = 200, description = "Every user, shallow view"))
)]
pub async fn list_users(State(state): State<AppState>) -> JsonResult {
    let users = User::all(state.store.as_ref()).await?;
    Ok(shallow(&users))
}

/// create_user
///
/// Registers an account with generated hashid and authkey. The authkey is
/// part of this response and never rendered again.
#[utoipa::path(
    post,
    path = "/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "Created", body = Credentials),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn create_user(
    State(state): State<AppState>,
    Json(payload): Json<CreateUserRequest>,
) -> CreatedResult {
    if payload.username.trim().is_empty() || payload.email.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "username and email are required".to_string(),
        ));
    }

    let authkey = helper::generate_authkey();
    let mut user = User::new(
        helper::generate_hashid(),
        payload.username,
        payload.email,
        authkey.clone(),
    );
    user.is_admin = payload.is_admin;
    user.create(state.store.as_ref()).await?;
    tracing::info!(user = user.hashid(), "user created");

    let credentials = serde_json::to_value(Credentials {
        id: user.hashid().to_string(),
        authkey,
    })
    .map_err(|source| ModelError::Malformed {
        entity: "Credentials",
        source,
    })?;

    let body = match (user.to_json_object(false), credentials) {
        (Value::Object(view), Value::Object(credentials)) => {
            Value::Object(helper::merge(&view, &credentials))
        }
        (view, _) => view,
    };
    Ok((StatusCode::CREATED, Json(body)))
}

#[utoipa::path(
    get,
    path = "/users/{user}",
    params(("user" = String, Path, description = "User hashid")),
    responses(
        (status = 200, description = "User, complete view"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_user(State(state): State<AppState>, Path(hashid): Path<String>) -> JsonResult {
    let store = state.store.as_ref();
    let mut user = User::find_one_by_hashid(store, &hashid).await?;
    user.load_associations(store).await?;
    Ok(Json(user.to_json_object(true)))
}

/// update_user
///
/// Partial update. Only admins may change the admin flag.
#[utoipa::path(
    put,
    path = "/users/{user}",
    params(("user" = String, Path, description = "User hashid")),
    request_body = UpdateUserRequest,
    responses((status = 200, description = "Updated user"))
)]
pub async fn update_user(
    AuthUser(acting): AuthUser,
    State(state): State<AppState>,
    Path(hashid): Path<String>,
    Json(payload): Json<UpdateUserRequest>,
) -> JsonResult {
    let store = state.store.as_ref();
    let mut user = User::find_one_by_hashid(store, &hashid).await?;

    if let Some(username) = payload.username {
        user.username = username;
    }
    if let Some(email) = payload.email {
        user.email = email;
    }
    if let Some(is_admin) = payload.is_admin {
        if !acting.is_admin {
            return Err(AccessError::Denied {
                action: "updateUser".to_string(),
                reasons: vec!["Admin rights required".to_string()],
            }
            .into());
        }
        user.is_admin = is_admin;
    }

    user.update(store).await?;
    Ok(Json(user.to_json_object(false)))
}

#[utoipa::path(
    delete,
    path = "/users/{user}",
    params(("user" = String, Path, description = "User hashid")),
    responses((status = 200, description = "Deleted", body = Deleted))
)]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(hashid): Path<String>,
) -> Result<Json<Deleted>, ApiError> {
    let store = state.store.as_ref();
    let mut user = User::find_one_by_hashid(store, &hashid).await?;
    let deleted = user.delete(store).await?;
    tracing::info!(user = %deleted.id, "user deleted");
    Ok(Json(deleted))
}

// --- Teams ---

#[utoipa::path(
    get,
    path = "/teams",
    responses((status = 200, description = "Every team, shallow view"))
)]
pub async fn list_teams(State(state): State<AppState>) -> JsonResult {
    let teams = Team::all(state.store.as_ref()).await?;
    Ok(shallow(&teams))
}

#[utoipa::path(
    post,
    path = "/teams",
    request_body = CreateTeamRequest,
    responses((status = 201, description = "Created team"))
)]
pub async fn create_team(
    State(state): State<AppState>,
    Json(payload): Json<CreateTeamRequest>,
) -> CreatedResult {
    if payload.name.trim().is_empty() {
        return Err(ApiError::BadRequest("name is required".to_string()));
    }
    let mut team = Team::new(helper::generate_hashid(), payload.name);
    team.create(state.store.as_ref()).await?;
    Ok((StatusCode::CREATED, Json(team.to_json_object(false))))
}

#[utoipa::path(
    get,
    path = "/teams/{team}",
    params(("team" = String, Path, description = "Team hashid")),
    responses((status = 200, description = "Team, complete view"))
)]
pub async fn get_team(State(state): State<AppState>, Path(hashid): Path<String>) -> JsonResult {
    let store = state.store.as_ref();
    let mut team = Team::find_one_by_hashid(store, &hashid).await?;
    team.load_associations(store).await?;
    Ok(Json(team.to_json_object(true)))
}

#[utoipa::path(
    delete,
    path = "/teams/{team}",
    params(("team" = String, Path, description = "Team hashid")),
    responses((status = 200, description = "Deleted", body = Deleted))
)]
pub async fn delete_team(
    State(state): State<AppState>,
    Path(hashid): Path<String>,
) -> Result<Json<Deleted>, ApiError> {
    let store = state.store.as_ref();
    let mut team = Team::find_one_by_hashid(store, &hashid).await?;
    Ok(Json(team.delete(store).await?))
}

#[utoipa::path(
    post,
    path = "/teams/{team}/users/{user}",
    params(
        ("team" = String, Path, description = "Team hashid"),
        ("user" = String, Path, description = "User hashid")
    ),
    responses((status = 200, description = "Team with its users"))
)]
pub async fn add_team_user(
    State(state): State<AppState>,
    Path((team, user)): Path<(String, String)>,
) -> JsonResult {
    let store = state.store.as_ref();
    let mut team = Team::find_one_by_hashid(store, &team).await?;
    let user = User::find_one_by_hashid(store, &user).await?;

    team.load_users(store).await?;
    team.add_user(store, &user).await?;
    Ok(Json(team.to_json_object(true)))
}

#[utoipa::path(
    delete,
    path = "/teams/{team}/users/{user}",
    params(
        ("team" = String, Path, description = "Team hashid"),
        ("user" = String, Path, description = "User hashid")
    ),
    responses((status = 200, description = "Team with its users"))
)]
pub async fn remove_team_user(
    State(state): State<AppState>,
    Path((team, user)): Path<(String, String)>,
) -> JsonResult {
    let store = state.store.as_ref();
    let mut team = Team::find_one_by_hashid(store, &team).await?;
    let user = User::find_one_by_hashid(store, &user).await?;

    team.load_users(store).await?;
    team.remove_user(store, &user).await?;
    Ok(Json(team.to_json_object(true)))
}

// --- Collections (generic over the three kinds) ---

/// list_collections
///
/// Admins see every collection of the kind; other users see the ones they
/// own directly or through a team.
pub async fn list_collections<C: Collection>(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> JsonResult {
    let store = state.store.as_ref();
    let mut collections = C::all(store).await?;
    if user.is_admin {
        return Ok(shallow(&collections));
    }

    let owned = join_all(
        collections
            .iter_mut()
            .map(|collection| collection.is_owned_by(store, &user)),
    )
    .await;

    let mut visible = Vec::new();
    for (collection, owned) in collections.into_iter().zip(owned) {
        if owned? {
            visible.push(collection);
        }
    }
    Ok(shallow(&visible))
}

/// create_collection
///
/// Creates the row and its directory. With a `team` in the payload the team
/// owns the collection and the creator must belong to it; otherwise the
/// creator owns it. A collection whose owner cannot be linked is removed
/// again.
pub async fn create_collection<C: Collection>(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateCollectionRequest>,
) -> CreatedResult {
    if payload.name.trim().is_empty() {
        return Err(ApiError::BadRequest("name is required".to_string()));
    }
    let store = state.store.as_ref();

    let team = match &payload.team {
        Some(hashid) => {
            let mut team = Team::find_one_by_hashid(store, hashid).await?;
            team.load_users(store).await?;
            if !user.is_admin && !team.has_member(&user)? {
                return Err(AccessError::Denied {
                    action: format!("create{}", C::NAME),
                    reasons: vec![format!("Not a member of team {hashid}")],
                }
                .into());
            }
            Some(team)
        }
        None => None,
    };

    let mut collection = C::named(helper::generate_hashid(), payload.name, payload.description);
    storage::create_collection_backed(store, state.storage.as_ref(), &mut collection).await?;

    let linked = match &team {
        Some(team) => collection.set_team(store, Some(team)).await,
        None => collection.set_user(store, Some(&user)).await,
    };
    if let Err(error) = linked {
        tracing::error!(%error, collection = collection.hashid(), "owner link failed");
        if let Err(rollback) =
            storage::delete_collection_staged(store, state.storage.as_ref(), &mut collection).await
        {
            tracing::error!(error = %rollback, "ownerless collection left behind");
        }
        return Err(error.into());
    }
    tracing::info!(kind = C::NAME, collection = collection.hashid(), "collection created");
    Ok((StatusCode::CREATED, Json(collection.to_json_object(true))))
}

pub async fn get_collection<C: Collection>(
    State(state): State<AppState>,
    Path(hashid): Path<String>,
) -> JsonResult {
    let store = state.store.as_ref();
    let mut collection = C::find_one_by_hashid(store, &hashid).await?;
    collection.load_associations(store).await?;
    Ok(Json(collection.to_json_object(true)))
}

pub async fn update_collection<C: Collection>(
    State(state): State<AppState>,
    Path(hashid): Path<String>,
    Json(payload): Json<UpdateCollectionRequest>,
) -> JsonResult {
    let store = state.store.as_ref();
    let mut collection = C::find_one_by_hashid(store, &hashid).await?;
    collection.set_details(payload.name, payload.description);
    collection.update(store).await?;
    Ok(Json(collection.to_json_object(false)))
}

/// delete_collection
///
/// Cascades to the members and removes the directory once the database
/// agreed.
pub async fn delete_collection<C: Collection>(
    State(state): State<AppState>,
    Path(hashid): Path<String>,
) -> Result<Json<Deleted>, ApiError> {
    let store = state.store.as_ref();
    let mut collection = C::find_one_by_hashid(store, &hashid).await?;
    let deleted =
        storage::delete_collection_staged(store, state.storage.as_ref(), &mut collection).await?;
    tracing::info!(kind = C::NAME, collection = %deleted.id, "collection deleted");
    Ok(Json(deleted))
}

/// add_collection_member
///
/// Creates a member from the payload and links it. If linking fails the new
/// member row is deleted again.
pub async fn add_collection_member<C>(
    State(state): State<AppState>,
    Path(hashid): Path<String>,
    Json(payload): Json<CreateMemberRequest>,
) -> CreatedResult
where
    C: Collection,
    C::Member: CollectionMember,
{
    let store = state.store.as_ref();
    let mut collection = C::find_one_by_hashid(store, &hashid).await?;

    let mut member = C::Member::from_request(helper::generate_hashid(), payload)
        .map_err(ApiError::BadRequest)?;
    member.create(store).await?;

    if let Err(error) = collection.add_member(store, &member).await {
        if let Err(rollback) = member.delete(store).await {
            tracing::error!(error = %rollback, "orphaned member left behind");
        }
        return Err(error.into());
    }
    Ok((StatusCode::CREATED, Json(member.to_json_object(false))))
}

/// remove_collection_member
///
/// Unlinks the member, deletes it and removes its file.
pub async fn remove_collection_member<C>(
    State(state): State<AppState>,
    Path((hashid, member)): Path<(String, String)>,
) -> Result<Json<Deleted>, ApiError>
where
    C: Collection,
    C::Member: CollectionMember,
{
    let store = state.store.as_ref();
    let mut collection = C::find_one_by_hashid(store, &hashid).await?;
    let mut member = C::Member::find_one_by_hashid(store, &member).await?;

    collection.load_members(store).await?;
    collection.remove_member(store, &member).await?;

    let file = member.stored_file();
    let deleted = member.delete(store).await?;
    if let Some(file) = file {
        state
            .storage
            .remove_file(C::DIRECTORY, collection.hashid(), &file)
            .await?;
    }
    Ok(Json(deleted))
}
