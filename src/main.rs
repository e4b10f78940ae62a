use media_cms::{
    AppState,
    auth::default_registry,
    config::{AppConfig, Env, StoreKind},
    create_router, helper,
    models::{Entity, User},
    storage::{LocalMediaStorage, StorageState},
    store::{InMemoryRecordStore, PostgresRecordStore, RecordStore, StoreState},
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Loads configuration, sets up logging, opens the record store and the media
/// tree, then serves the router.
#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "media_cms=debug,tower_http=info,axum=trace".into());

    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    let store: StoreState = match config.store {
        StoreKind::Postgres => {
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(&config.db_url)
                .await
                .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");

            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .expect("FATAL: Failed to run database migrations.");

            Arc::new(PostgresRecordStore::new(pool))
        }
        StoreKind::Memory => {
            tracing::warn!("Using the in-memory record store; nothing survives a restart.");
            Arc::new(InMemoryRecordStore::new())
        }
    };

    let media = LocalMediaStorage::new(&config.uploads_dir, &config.trash_dir);
    media
        .ensure_layout()
        .await
        .expect("FATAL: Failed to prepare the uploads directory.");
    let storage = Arc::new(media) as StorageState;

    bootstrap_admin(store.as_ref()).await;

    let registry = Arc::new(default_registry(store.clone()));
    let bind_addr = config.bind_addr.clone();

    let app_state = AppState {
        store,
        storage,
        config,
        registry,
    };

    let app = create_router(app_state);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .expect("FATAL: Failed to bind the HTTP listener.");

    tracing::info!("Listening on {}", bind_addr);
    tracing::info!("API Documentation (Swagger UI) available at /swagger-ui");

    axum::serve(listener, app)
        .await
        .expect("FATAL: HTTP server stopped unexpectedly.");
}

/// bootstrap_admin
///
/// On an empty store, creates a first admin account so that users and teams
/// can be managed at all. Its authkey is logged once.
async fn bootstrap_admin(store: &dyn RecordStore) {
    match User::all(store).await {
        Ok(users) if users.is_empty() => {}
        Ok(_) => return,
        Err(e) => {
            tracing::error!(error = %e, "could not inspect users for bootstrap");
            return;
        }
    }

    let authkey = helper::generate_authkey();
    let mut admin = User::new(
        helper::generate_hashid(),
        "admin",
        "admin@localhost",
        authkey.clone(),
    );
    admin.is_admin = true;

    match admin.create(store).await {
        Ok(()) => tracing::warn!(
            user = admin.hashid(),
            authkey = %authkey,
            "bootstrap admin created; store this authkey now"
        ),
        Err(e) => tracing::error!(error = %e, "bootstrap admin could not be created"),
    }
}
