use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use media_cms::{
    AppConfig, AppState, InMemoryRecordStore, LocalMediaStorage, create_router,
    auth::default_registry,
    models::{Entity, Team, User},
    storage::StorageState,
    store::StoreOp,
};
use serde_json::{Value, json};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tower::util::ServiceExt;

// --- Harness ---

struct TestApp {
    router: Router,
    store: Arc<InMemoryRecordStore>,
    uploads: TempDir,
}

/// Seeds `root` (admin, key "k0"), `alice` ("k1") and `bob` ("k2").
async fn test_app() -> TestApp {
    let store = Arc::new(InMemoryRecordStore::new());
    for (hashid, name, key, is_admin) in [
        ("u0", "root", "k0", true),
        ("u1", "alice", "k1", false),
        ("u2", "bob", "k2", false),
    ] {
        let mut user = User::new(hashid, name, format!("{name}@x.com"), key);
        user.is_admin = is_admin;
        user.create(store.as_ref()).await.unwrap();
    }

    let uploads = tempfile::tempdir().unwrap();
    let media = LocalMediaStorage::new(uploads.path().join("media"), uploads.path().join("trash"));
    media.ensure_layout().await.unwrap();

    let state = AppState {
        store: store.clone(),
        storage: Arc::new(media) as StorageState,
        config: AppConfig::default(),
        registry: Arc::new(default_registry(store.clone())),
    };

    TestApp {
        router: create_router(state),
        store,
        uploads,
    }
}

impl TestApp {
    async fn send(
        &self,
        method: Method,
        uri: &str,
        authkey: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(key) = authkey {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {key}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    async fn get(&self, uri: &str, authkey: &str) -> (StatusCode, Value) {
        self.send(Method::GET, uri, Some(authkey), None).await
    }

    async fn post(&self, uri: &str, authkey: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, Some(authkey), Some(body)).await
    }

    async fn delete(&self, uri: &str, authkey: &str) -> (StatusCode, Value) {
        self.send(Method::DELETE, uri, Some(authkey), None).await
    }

    /// Creates an images collection as `authkey` and returns its hashid.
    async fn images_collection(&self, authkey: &str, body: Value) -> String {
        let (status, created) = self.post("/images", authkey, body).await;
        assert_eq!(status, StatusCode::CREATED, "{created}");
        created["id"].as_str().unwrap().to_string()
    }
}

// --- Public & profile ---

#[tokio::test]
async fn test_health_check() {
    let app = test_app().await;
    let (status, _) = app.send(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_me_requires_a_known_authkey() {
    let app = test_app().await;

    let (status, body) = app.send(Method::GET, "/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].as_str().unwrap().contains("Unauthorized"));

    let (status, _) = app.get("/me", "wrong").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, me) = app.get("/me", "k1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["id"], "u1");
    assert_eq!(me["teams"], json!([]));
    assert!(me.get("authkey").is_none());
}

// --- Users ---

#[tokio::test]
async fn test_only_admins_manage_users() {
    let app = test_app().await;

    let (status, body) = app.get("/users", "k1").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].as_str().unwrap().contains("Admin rights required"));

    let (status, users) = app.get("/users", "k0").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(users.as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_created_user_can_authenticate_with_returned_key() {
    let app = test_app().await;

    let (status, created) = app
        .post(
            "/users",
            "k0",
            json!({ "username": "carol", "email": "carol@x.com" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["is_admin"], false);
    let authkey = created["authkey"].as_str().unwrap().to_string();
    let hashid = created["id"].as_str().unwrap().to_string();

    let (status, me) = app.get("/me", &authkey).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["id"], hashid.as_str());

    let (status, _) = app
        .post(
            "/users",
            "k0",
            json!({ "username": "twin", "email": "carol@x.com" }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_users_read_and_update_only_themselves() {
    let app = test_app().await;

    let (status, _) = app.get("/users/u1", "k1").await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.get("/users/u2", "k1").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, updated) = app
        .send(
            Method::PUT,
            "/users/u1",
            Some("k1"),
            Some(json!({ "username": "alicia" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["username"], "alicia");

    let (status, _) = app
        .send(
            Method::PUT,
            "/users/u1",
            Some("k1"),
            Some(json!({ "is_admin": true })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let alice = User::find_one_by_hashid(app.store.as_ref(), "u1").await.unwrap();
    assert!(!alice.is_admin);
}

#[tokio::test]
async fn test_unknown_user_is_not_found_for_admins() {
    let app = test_app().await;
    let (status, _) = app.get("/users/nobody", "k0").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// --- Teams ---

#[tokio::test]
async fn test_team_membership_grants_team_access() {
    let app = test_app().await;

    let (status, team) = app.post("/teams", "k0", json!({ "name": "crew" })).await;
    assert_eq!(status, StatusCode::CREATED);
    let team_id = team["id"].as_str().unwrap().to_string();

    let (status, _) = app.get(&format!("/teams/{team_id}"), "k2").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, team) = app
        .send(
            Method::POST,
            &format!("/teams/{team_id}/users/u2"),
            Some("k0"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(team["users"][0]["id"], "u2");

    let (status, team) = app.get(&format!("/teams/{team_id}"), "k2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(team["name"], "crew");

    let (status, _) = app.post("/teams", "k2", json!({ "name": "rogue" })).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// --- Collections ---

#[tokio::test]
async fn test_collection_lifecycle() {
    let app = test_app().await;
    let id = app
        .images_collection("k1", json!({ "name": "Trip", "description": "d" }))
        .await;
    let dir = app.uploads.path().join("media/images").join(&id);
    assert!(dir.is_dir());

    let (status, collection) = app.get(&format!("/images/{id}"), "k1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(collection["user"]["id"], "u1");
    assert_eq!(collection["images"], json!([]));
    assert_eq!(collection["cover"], Value::Null);

    let (status, _) = app.get(&format!("/images/{id}"), "k2").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app.get(&format!("/images/{id}"), "k0").await;
    assert_eq!(status, StatusCode::OK);

    let (status, image) = app
        .post(
            &format!("/images/{id}/members"),
            "k1",
            json!({ "name": "beach", "mimetype": "image/jpeg", "extension": "jpg" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let image_id = image["id"].as_str().unwrap().to_string();

    let (_, collection) = app.get(&format!("/images/{id}"), "k1").await;
    assert_eq!(collection["cover"]["id"], image_id.as_str());
    assert_eq!(collection["images"].as_array().unwrap().len(), 1);

    let (status, updated) = app
        .send(
            Method::PUT,
            &format!("/images/{id}"),
            Some("k1"),
            Some(json!({ "name": "Holiday" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["name"], "Holiday");
    assert_eq!(updated["description"], "d");

    let (status, deleted) = app.delete(&format!("/images/{id}"), "k1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deleted["id"], id.as_str());
    assert!(!dir.exists());

    let (status, _) = app.get(&format!("/images/{id}"), "k0").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_member_payload_is_validated() {
    let app = test_app().await;
    let id = app.images_collection("k1", json!({ "name": "Trip" })).await;

    let (status, body) = app
        .post(
            &format!("/images/{id}/members"),
            "k1",
            json!({ "name": "beach", "mimetype": "image/jpeg" }),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("'extension' is required"));
}

#[tokio::test]
async fn test_removing_a_member_deletes_its_file() {
    let app = test_app().await;
    let id = app.images_collection("k1", json!({ "name": "Trip" })).await;
    let (_, image) = app
        .post(
            &format!("/images/{id}/members"),
            "k1",
            json!({ "mimetype": "image/png", "extension": "png" }),
        )
        .await;
    let image_id = image["id"].as_str().unwrap().to_string();
    let file = app
        .uploads
        .path()
        .join("media/images")
        .join(&id)
        .join(format!("{image_id}.png"));
    tokio::fs::write(&file, b"png").await.unwrap();

    let (status, _) = app
        .delete(&format!("/images/{id}/members/{image_id}"), "k1")
        .await;

    assert_eq!(status, StatusCode::OK);
    assert!(!file.exists());
    let (_, collection) = app.get(&format!("/images/{id}"), "k1").await;
    assert_eq!(collection["images"], json!([]));
    assert_eq!(collection["cover"], Value::Null);
}

#[tokio::test]
async fn test_news_members_need_a_title() {
    let app = test_app().await;
    let (status, feed) = app.post("/news", "k1", json!({ "name": "Feed" })).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = feed["id"].as_str().unwrap();

    let (status, _) = app
        .post(&format!("/news/{id}/members"), "k1", json!({ "content": "x" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, item) = app
        .post(
            &format!("/news/{id}/members"),
            "k1",
            json!({ "title": "Launch", "content": "Today", "begin": "2025-01-01" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(item["begin"], "2025-01-01");
}

#[tokio::test]
async fn test_listing_shows_owned_collections_only() {
    let app = test_app().await;
    let alice_id = app.images_collection("k1", json!({ "name": "Mine" })).await;
    app.images_collection("k2", json!({ "name": "Theirs" })).await;

    let (status, listed) = app.get("/images", "k1").await;
    assert_eq!(status, StatusCode::OK);
    let listed = listed.as_array().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["id"], alice_id.as_str());

    let (_, all) = app.get("/images", "k0").await;
    assert_eq!(all.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_team_collections_require_membership_to_create() {
    let app = test_app().await;
    let mut team = Team::new("t1", "crew");
    team.create(app.store.as_ref()).await.unwrap();
    let bob = User::find_one_by_hashid(app.store.as_ref(), "u2").await.unwrap();
    team.add_user(app.store.as_ref(), &bob).await.unwrap();

    let (status, _) = app
        .post("/videos", "k1", json!({ "name": "Clips", "team": "t1" }))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, created) = app
        .post("/videos", "k2", json!({ "name": "Clips", "team": "t1" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["team"]["id"], "t1");
}

#[tokio::test]
async fn test_collection_without_owner_is_rolled_back() {
    let app = test_app().await;

    app.store.fail_next(StoreOp::SetRelated);
    let (status, _) = app.post("/images", "k1", json!({ "name": "Lost" })).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let (_, all) = app.get("/images", "k0").await;
    assert!(all.as_array().unwrap().is_empty());

    let dirs = std::fs::read_dir(app.uploads.path().join("media/images"))
        .map(|entries| entries.count())
        .unwrap_or(0);
    assert_eq!(dirs, 0);
}

// --- Live server ---

#[tokio::test]
async fn test_served_over_tcp() {
    let app = test_app().await;
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let address = format!("http://{}", listener.local_addr().unwrap());

    let router = app.router.clone();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    let client = reqwest::Client::new();
    let response = client
        .get(format!("{address}/me"))
        .bearer_auth("k1")
        .send()
        .await
        .expect("req fail");

    assert!(response.status().is_success());
    assert!(response.headers().contains_key("x-request-id"));
    let me: Value = response.json().await.unwrap();
    assert_eq!(me["username"], "alice");
}
