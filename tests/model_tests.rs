use axum::http::StatusCode;
use media_cms::{
    error::{ModelError, StoreError},
    models::{
        Collection, Entity, ImageObject, ImagesCollection, News, NewsCollection, Team, User,
        Video, VideosCollection,
    },
    store::{InMemoryRecordStore, StoreOp},
};
use serde_json::json;

// --- Helpers ---

async fn persisted_user(store: &InMemoryRecordStore, hashid: &str, email: &str) -> User {
    let mut user = User::new(hashid, "alice", email, format!("key-{hashid}"));
    user.create(store).await.unwrap();
    user
}

async fn assert_create_rejected_once_persisted<E: Entity>(mut entity: E) {
    let store = InMemoryRecordStore::new();
    entity.create(&store).await.unwrap();
    let calls = store.total_calls();

    let result = entity.create(&store).await;

    assert!(
        matches!(result, Err(ModelError::AlreadyExists { .. })),
        "{} created twice",
        E::NAME
    );
    assert_eq!(store.total_calls(), calls, "{} contacted the store", E::NAME);
}

async fn assert_unpersisted_writes_rejected<E: Entity>(mut entity: E) {
    let store = InMemoryRecordStore::new();

    assert!(matches!(
        entity.update(&store).await,
        Err(ModelError::NotPersisted { .. })
    ));
    assert!(matches!(
        entity.delete(&store).await,
        Err(ModelError::NotPersisted { .. })
    ));
    assert_eq!(store.total_calls(), 0, "{} contacted the store", E::NAME);
}

// --- CRUD preconditions ---

#[tokio::test]
async fn test_create_with_identifier_fails_for_every_entity() {
    assert_create_rejected_once_persisted(User::new("u1", "alice", "a@x.com", "k1")).await;
    assert_create_rejected_once_persisted(Team::new("t1", "crew")).await;
    assert_create_rejected_once_persisted(ImagesCollection::new("c1", "Trip", "d")).await;
    assert_create_rejected_once_persisted(VideosCollection::new("c2", "Clips", "")).await;
    assert_create_rejected_once_persisted(NewsCollection::new("c3", "Feed", "")).await;
    assert_create_rejected_once_persisted(ImageObject::new("i1", "beach", "image/png", "png")).await;
    assert_create_rejected_once_persisted(Video::new("v1", "clip", "video/mp4", "mp4")).await;
    assert_create_rejected_once_persisted(News::new("n1", "Hello", "World")).await;
}

#[tokio::test]
async fn test_update_and_delete_without_identifier_fail_for_every_entity() {
    assert_unpersisted_writes_rejected(User::new("u1", "alice", "a@x.com", "k1")).await;
    assert_unpersisted_writes_rejected(Team::new("t1", "crew")).await;
    assert_unpersisted_writes_rejected(ImagesCollection::new("c1", "Trip", "d")).await;
    assert_unpersisted_writes_rejected(VideosCollection::new("c2", "Clips", "")).await;
    assert_unpersisted_writes_rejected(NewsCollection::new("c3", "Feed", "")).await;
    assert_unpersisted_writes_rejected(ImageObject::new("i1", "beach", "image/png", "png")).await;
    assert_unpersisted_writes_rejected(Video::new("v1", "clip", "video/mp4", "mp4")).await;
    assert_unpersisted_writes_rejected(News::new("n1", "Hello", "World")).await;
}

#[tokio::test]
async fn test_create_assigns_identifier_and_timestamps() {
    let store = InMemoryRecordStore::new();
    let user = persisted_user(&store, "u1", "a@x.com").await;

    assert!(user.id().is_some());
    assert!(user.record().created_at.is_some());
    assert!(user.record().updated_at.is_some());
    assert_eq!(store.calls(StoreOp::Create), 1);
}

#[tokio::test]
async fn test_read_update_and_find_by_unique_keys() {
    let store = InMemoryRecordStore::new();
    let mut user = persisted_user(&store, "u1", "a@x.com").await;

    user.username = "alice2".to_string();
    user.update(&store).await.unwrap();

    let id = user.id().unwrap();
    let read = User::read(&store, id).await.unwrap();
    assert_eq!(read.username, "alice2");

    let by_email = User::find_one_by_email(&store, "a@x.com").await.unwrap();
    let by_key = User::find_one_by_authkey(&store, "key-u1").await.unwrap();
    let by_hashid = User::find_one_by_hashid(&store, "u1").await.unwrap();
    assert_eq!(by_email.id(), Some(id));
    assert_eq!(by_key.id(), Some(id));
    assert_eq!(by_hashid.id(), Some(id));
}

#[tokio::test]
async fn test_missing_rows_are_not_found() {
    let store = InMemoryRecordStore::new();

    let error = User::find_one_by_hashid(&store, "nobody").await.unwrap_err();
    assert!(matches!(error, ModelError::NotFound { entity: "User", .. }));
    assert_eq!(error.status(), StatusCode::NOT_FOUND);

    let error = Team::read(&store, 42).await.unwrap_err();
    assert!(matches!(error, ModelError::NotFound { .. }));
}

#[tokio::test]
async fn test_lookup_on_non_unique_column_is_refused() {
    let store = InMemoryRecordStore::new();
    persisted_user(&store, "u1", "a@x.com").await;

    let error = User::find_one_by(&store, "username", json!("alice"))
        .await
        .unwrap_err();

    assert!(matches!(
        error,
        ModelError::Store(StoreError::UnknownColumn { .. })
    ));
}

#[tokio::test]
async fn test_duplicate_email_is_a_conflict() {
    let store = InMemoryRecordStore::new();
    persisted_user(&store, "u1", "a@x.com").await;

    let mut twin = User::new("u2", "eve", "a@x.com", "k2");
    let error = twin.create(&store).await.unwrap_err();

    assert!(matches!(
        error,
        ModelError::Store(StoreError::Duplicate { .. })
    ));
    assert_eq!(error.status(), StatusCode::CONFLICT);
    assert!(twin.id().is_none());
}

#[tokio::test]
async fn test_delete_clears_hashid_only_for_owning_types() {
    let store = InMemoryRecordStore::new();

    let mut user = persisted_user(&store, "u1", "a@x.com").await;
    let deleted = user.delete(&store).await.unwrap();
    assert_eq!(deleted.id, "u1");
    assert!(user.id().is_none());
    assert_eq!(user.hashid(), "");

    let mut image = ImageObject::new("i1", "beach", "image/png", "png");
    image.create(&store).await.unwrap();
    image.delete(&store).await.unwrap();
    assert!(image.id().is_none());
    assert_eq!(image.hashid(), "i1");

    assert!(User::find_one_by_hashid(&store, "u1").await.is_err());
}

// --- Serialization ---

#[test]
fn test_row_round_trip_reproduces_scalar_attributes() {
    let row = json!({
        "id": 7,
        "hashid": "u1",
        "username": "alice",
        "email": "a@x.com",
        "authkey": "k1",
        "is_admin": true,
        "created_at": "2024-01-01T00:00:00Z",
        "updated_at": "2024-01-02T00:00:00Z"
    });

    let user = User::from_json_object(row.as_object().unwrap().clone()).unwrap();

    assert_eq!(user.id(), Some(7));
    assert_eq!(
        user.to_json_object(false),
        json!({
            "id": "u1",
            "username": "alice",
            "email": "a@x.com",
            "is_admin": true,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-02T00:00:00Z"
        })
    );
}

#[test]
fn test_round_trip_ignores_foreign_keys() {
    let row = json!({
        "id": 3,
        "hashid": "i1",
        "name": "beach",
        "description": "",
        "mimetype": "image/png",
        "extension": "png",
        "collection_id": 9,
        "created_at": null,
        "updated_at": null
    });

    let image = ImageObject::from_json_object(row.as_object().unwrap().clone()).unwrap();
    let view = image.to_json_object(false);

    assert_eq!(view["id"], "i1");
    assert_eq!(view["mimetype"], "image/png");
    assert!(view.get("collection_id").is_none());
    assert_eq!(image.file_name(), "i1.png");
}

#[test]
fn test_malformed_row_is_reported() {
    let row = json!({ "id": "not-a-number", "hashid": "u1" });
    let error = User::from_json_object(row.as_object().unwrap().clone()).unwrap_err();
    assert!(matches!(error, ModelError::Malformed { entity: "User", .. }));
}

#[test]
fn test_complete_view_omits_unloaded_relations() {
    let user = User::new("u1", "alice", "a@x.com", "k1");
    let view = user.to_json_object(true);

    assert!(view.get("teams").is_none());
    assert!(view.get("authkey").is_none());
}

// --- Lazy associations ---

#[tokio::test]
async fn test_reading_unloaded_relation_is_an_error() {
    let store = InMemoryRecordStore::new();
    let user = persisted_user(&store, "u1", "a@x.com").await;

    assert!(matches!(user.teams(), Err(ModelError::NotLoaded("teams"))));
}

#[tokio::test]
async fn test_second_load_is_a_no_op() {
    let store = InMemoryRecordStore::new();
    let mut user = persisted_user(&store, "u1", "a@x.com").await;

    user.load_teams(&store).await.unwrap();
    user.load_teams(&store).await.unwrap();

    assert_eq!(store.calls(StoreOp::GetRelated), 1);
    assert!(user.teams().unwrap().is_empty());
}

#[tokio::test]
async fn test_load_associations_fills_every_relation() {
    let store = InMemoryRecordStore::new();
    let mut user = persisted_user(&store, "u1", "a@x.com").await;

    user.load_associations(&store).await.unwrap();

    assert!(user.teams().is_ok());
    assert!(user.images_collections().is_ok());
    assert!(user.videos_collections().is_ok());
    assert!(user.news_collections().is_ok());

    let view = user.to_json_object(true);
    assert_eq!(view["teams"], json!([]));
    assert_eq!(view["imagesCollections"], json!([]));
}

#[tokio::test]
async fn test_load_associations_reports_first_failure_and_can_be_retried() {
    let store = InMemoryRecordStore::new();
    let mut user = persisted_user(&store, "u1", "a@x.com").await;

    store.fail_next(StoreOp::GetRelated);
    let error = user.load_associations(&store).await.unwrap_err();
    assert!(matches!(error, ModelError::Store(StoreError::Backend(_))));
    assert_eq!(error.status(), StatusCode::INTERNAL_SERVER_ERROR);

    user.load_associations(&store).await.unwrap();
    assert!(user.teams().is_ok());
    assert!(user.news_collections().is_ok());
}

#[tokio::test]
async fn test_unpersisted_entity_cannot_load() {
    let store = InMemoryRecordStore::new();
    let mut user = User::new("u1", "alice", "a@x.com", "k1");

    assert!(matches!(
        user.load_teams(&store).await,
        Err(ModelError::NotPersisted { .. })
    ));
    assert_eq!(store.total_calls(), 0);
}

// --- Users & Teams ---

#[tokio::test]
async fn test_team_membership_is_visible_from_both_sides() {
    let store = InMemoryRecordStore::new();
    let mut user = persisted_user(&store, "u1", "a@x.com").await;
    let mut team = Team::new("t1", "crew");
    team.create(&store).await.unwrap();

    team.load_users(&store).await.unwrap();
    team.add_user(&store, &user).await.unwrap();
    team.add_user(&store, &user).await.unwrap();

    assert_eq!(team.users().unwrap().len(), 1);
    assert!(team.has_member(&user).unwrap());

    user.load_teams(&store).await.unwrap();
    assert_eq!(user.teams().unwrap()[0].hashid(), "t1");

    team.remove_user(&store, &user).await.unwrap();
    assert!(!team.has_member(&user).unwrap());

    let mut fresh = User::find_one_by_hashid(&store, "u1").await.unwrap();
    fresh.load_teams(&store).await.unwrap();
    assert!(fresh.teams().unwrap().is_empty());
}

#[tokio::test]
async fn test_membership_check_requires_loaded_users() {
    let store = InMemoryRecordStore::new();
    let user = persisted_user(&store, "u1", "a@x.com").await;
    let mut team = Team::new("t1", "crew");
    team.create(&store).await.unwrap();

    assert!(matches!(
        team.has_member(&user),
        Err(ModelError::NotLoaded("users"))
    ));
}

#[tokio::test]
async fn test_deleting_owner_releases_its_collections() {
    let store = InMemoryRecordStore::new();
    let mut user = persisted_user(&store, "u1", "a@x.com").await;
    let mut collection = ImagesCollection::new("c1", "Trip", "d");
    collection.create(&store).await.unwrap();
    user.add_images_collection(&store, &collection).await.unwrap();

    user.delete(&store).await.unwrap();

    let mut collection = ImagesCollection::find_one_by_hashid(&store, "c1")
        .await
        .unwrap();
    collection.load_user(&store).await.unwrap();
    assert!(collection.user().unwrap().is_none());
}
