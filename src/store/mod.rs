use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::error::StoreError;

pub mod memory;
pub mod postgres;
pub mod relations;

pub use memory::{InMemoryRecordStore, StoreOp};
pub use postgres::PostgresRecordStore;
pub use relations::{Link, Relation};

/// A stored row, shaped as the JSON object the database hands back.
pub type Row = Map<String, Value>;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Table
///
/// Every table the domain model persists to, together with the static column
/// allow-lists the store adapters build their statements from. Identifiers are
/// never taken from request input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Users,
    Teams,
    ImagesCollections,
    ImageObjects,
    VideosCollections,
    Videos,
    NewsCollections,
    News,
}

impl Table {
    pub const fn name(self) -> &'static str {
        match self {
            Table::Users => "users",
            Table::Teams => "teams",
            Table::ImagesCollections => "images_collections",
            Table::ImageObjects => "image_objects",
            Table::VideosCollections => "videos_collections",
            Table::Videos => "videos",
            Table::NewsCollections => "news_collections",
            Table::News => "news",
        }
    }

    /// Columns an entity writes through `create` and `update_attributes`.
    /// Identifier, timestamps and foreign keys are excluded.
    pub const fn columns(self) -> &'static [&'static str] {
        match self {
            Table::Users => &["hashid", "username", "email", "authkey", "is_admin"],
            Table::Teams => &["hashid", "name"],
            Table::ImagesCollections => &["hashid", "name", "description", "autogenerate"],
            Table::ImageObjects | Table::Videos => {
                &["hashid", "name", "description", "mimetype", "extension"]
            }
            Table::VideosCollections | Table::NewsCollections => {
                &["hashid", "name", "description"]
            }
            Table::News => &["hashid", "title", "content", "begin", "end"],
        }
    }

    /// Columns `find_one` accepts as a lookup key.
    pub const fn unique_keys(self) -> &'static [&'static str] {
        match self {
            Table::Users => &["hashid", "email", "authkey"],
            _ => &["hashid"],
        }
    }

    /// Drops every key that is not a writable column, rejecting none: the
    /// entity layer owns the shape, the store only guards identifiers.
    pub fn writable(self, attrs: &Row) -> Row {
        attrs
            .iter()
            .filter(|(key, _)| self.columns().contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    pub fn check_unique_key(self, column: &str) -> StoreResult<()> {
        if self.unique_keys().contains(&column) {
            Ok(())
        } else {
            Err(StoreError::UnknownColumn {
                table: self.name(),
                column: column.to_string(),
            })
        }
    }
}

/// RecordStore
///
/// The persistence contract consumed by the domain model: plain CRUD keyed by
/// table plus relation accessors keyed by `Relation` metadata.
///
/// **Send + Sync + async_trait** keep `Arc<dyn RecordStore>` usable from
/// axum handlers and middleware.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Inserts a row and returns it with the store-assigned `id` and timestamps.
    async fn create(&self, table: Table, attrs: Row) -> StoreResult<Row>;

    async fn find_by_id(&self, table: Table, id: i64) -> StoreResult<Option<Row>>;

    /// Looks a row up by one of the table's unique keys.
    async fn find_one(&self, table: Table, column: &str, value: &Value)
    -> StoreResult<Option<Row>>;

    async fn all(&self, table: Table) -> StoreResult<Vec<Row>>;

    /// Writes `attrs` to the row and refreshes its `updated_at`.
    async fn update_attributes(&self, table: Table, id: i64, attrs: Row) -> StoreResult<Row>;

    async fn destroy(&self, table: Table, id: i64) -> StoreResult<()>;

    /// Rows on the far side of `relation` for the owner row `owner_id`.
    /// Belongs-to relations yield at most one row.
    async fn get_related(&self, relation: &Relation, owner_id: i64) -> StoreResult<Vec<Row>>;

    /// Points a belongs-to relation at `target_id`, or clears it.
    async fn set_related(
        &self,
        relation: &Relation,
        owner_id: i64,
        target_id: Option<i64>,
    ) -> StoreResult<()>;

    /// Links `target_id` into a has-many or many-to-many relation.
    async fn add_related(&self, relation: &Relation, owner_id: i64, target_id: i64)
    -> StoreResult<()>;

    /// Unlinks `target_id` from a has-many or many-to-many relation.
    async fn remove_related(
        &self,
        relation: &Relation,
        owner_id: i64,
        target_id: i64,
    ) -> StoreResult<()>;
}

/// StoreState
///
/// The concrete type used to share the record store across the application state.
pub type StoreState = Arc<dyn RecordStore>;
