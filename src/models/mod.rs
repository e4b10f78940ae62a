//! Domain entities, their lazy associations and the collection lifecycle.
//!
//! Every entity composes a `Record` header (internal id, hashid, timestamps)
//! and implements `Entity`, which provides the create/read/update/delete
//! protocol against a `RecordStore`. Relations are held in `Lazy` /
//! `LazyMany` slots that refuse to be read before they are loaded.

use async_trait::async_trait;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Value, json};

use crate::error::{ModelError, ModelResult};
use crate::store::{RecordStore, Relation, Row, Table};

pub mod collection;
pub mod image_object;
pub mod images_collection;
pub mod news;
pub mod news_collection;
pub mod requests;
pub mod team;
pub mod user;
pub mod video;
pub mod videos_collection;

pub use collection::Collection;
pub use image_object::ImageObject;
pub use images_collection::ImagesCollection;
pub use news::News;
pub use news_collection::NewsCollection;
pub use team::Team;
pub use user::User;
pub use video::Video;
pub use videos_collection::VideosCollection;

/// Record
///
/// The identity header shared by every entity. `id` is the store's internal
/// key and never leaves the server; `hashid` is the external identifier used
/// by clients.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub hashid: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl Record {
    pub fn new(hashid: impl Into<String>) -> Self {
        Self {
            hashid: hashid.into(),
            ..Self::default()
        }
    }

    /// Adopts the identifier and timestamps from a freshly written row.
    fn adopt(&mut self, row: &Row) {
        if let Some(id) = row.get("id").and_then(Value::as_i64) {
            self.id = Some(id);
        }
        if let Some(created_at) = row.get("created_at").and_then(Value::as_str) {
            self.created_at = Some(created_at.to_string());
        }
        if let Some(updated_at) = row.get("updated_at").and_then(Value::as_str) {
            self.updated_at = Some(updated_at.to_string());
        }
    }
}

/// Deleted
///
/// Returned by `Entity::delete`: the external identifier of the removed row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Deleted {
    pub id: String,
}

/// Lazy
///
/// A to-one association slot. The cached value and its loaded flag only ever
/// change together through `set`, and `get` refuses to answer until then.
#[derive(Debug, Clone)]
pub struct Lazy<T> {
    value: Option<Box<T>>,
    loaded: bool,
}

impl<T> Default for Lazy<T> {
    fn default() -> Self {
        Self {
            value: None,
            loaded: false,
        }
    }
}

impl<T> Lazy<T> {
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn get(&self, relation: &'static str) -> ModelResult<Option<&T>> {
        if self.loaded {
            Ok(self.value.as_deref())
        } else {
            Err(ModelError::NotLoaded(relation))
        }
    }

    pub fn set(&mut self, value: Option<T>) {
        self.value = value.map(Box::new);
        self.loaded = true;
    }

    /// The loaded value, or `None` when unloaded or empty.
    pub fn loaded_value(&self) -> Option<&T> {
        if self.loaded { self.value.as_deref() } else { None }
    }

    pub(crate) fn loaded_value_mut(&mut self) -> Option<&mut T> {
        if self.loaded { self.value.as_deref_mut() } else { None }
    }
}

impl<T: Entity> Lazy<T> {
    /// Loads the slot once; later calls are no-op successes.
    pub async fn load(
        &mut self,
        store: &dyn RecordStore,
        relation: &'static Relation,
        owner_id: i64,
    ) -> ModelResult<()> {
        if self.loaded {
            return Ok(());
        }
        let related = fetch_one::<T>(store, relation, owner_id).await?;
        self.set(related);
        Ok(())
    }

    /// The slot rendered for a complete JSON view, when loaded.
    pub fn json(&self) -> Option<Value> {
        self.loaded
            .then(|| self.value.as_ref().map_or(Value::Null, |v| v.to_json_object(false)))
    }
}

/// LazyMany
///
/// A to-many association slot with the same loaded-flag discipline as `Lazy`.
#[derive(Debug, Clone)]
pub struct LazyMany<T> {
    items: Vec<T>,
    loaded: bool,
}

impl<T> Default for LazyMany<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            loaded: false,
        }
    }
}

impl<T> LazyMany<T> {
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn get(&self, relation: &'static str) -> ModelResult<&[T]> {
        if self.loaded {
            Ok(&self.items)
        } else {
            Err(ModelError::NotLoaded(relation))
        }
    }

    pub fn set(&mut self, items: Vec<T>) {
        self.items = items;
        self.loaded = true;
    }

    pub(crate) fn items_mut(&mut self) -> &mut Vec<T> {
        &mut self.items
    }
}

impl<T: Entity> LazyMany<T> {
    /// Loads the slot once; later calls are no-op successes. Every row must
    /// reconstruct for the relation to count as loaded.
    pub async fn load(
        &mut self,
        store: &dyn RecordStore,
        relation: &'static Relation,
        owner_id: i64,
    ) -> ModelResult<()> {
        if self.loaded {
            return Ok(());
        }
        let related = fetch_many::<T>(store, relation, owner_id).await?;
        self.set(related);
        Ok(())
    }

    /// Links `target` through the store and tracks it when the slot is loaded.
    pub async fn link(
        &mut self,
        store: &dyn RecordStore,
        relation: &'static Relation,
        owner_id: i64,
        target: &T,
    ) -> ModelResult<()> {
        let target_id = target.require_id()?;
        store.add_related(relation, owner_id, target_id).await?;
        if self.loaded && !self.items.iter().any(|item| item.id() == Some(target_id)) {
            self.items.push(target.clone());
        }
        Ok(())
    }

    /// Unlinks `target` through the store and forgets it when tracked.
    pub async fn unlink(
        &mut self,
        store: &dyn RecordStore,
        relation: &'static Relation,
        owner_id: i64,
        target: &T,
    ) -> ModelResult<()> {
        let target_id = target.require_id()?;
        store.remove_related(relation, owner_id, target_id).await?;
        self.items.retain(|item| item.id() != Some(target_id));
        Ok(())
    }

    pub fn position(&self, id: i64) -> Option<usize> {
        self.items.iter().position(|item| item.id() == Some(id))
    }

    pub fn json(&self) -> Option<Value> {
        self.loaded.then(|| {
            Value::Array(
                self.items
                    .iter()
                    .map(|item| item.to_json_object(false))
                    .collect(),
            )
        })
    }
}

/// Entity
///
/// The contract every persisted domain object implements. Concrete types
/// provide their table, their `Record` header, their stored attributes and
/// their JSON view; the CRUD protocol itself is provided here.
#[async_trait]
pub trait Entity: Clone + Send + Sync + DeserializeOwned + 'static {
    const TABLE: Table;
    /// Human-readable name used in error messages.
    const NAME: &'static str;
    /// Whether `delete` also forgets the hashid (collection-owning types).
    const CLEARS_HASHID: bool = false;

    fn record(&self) -> &Record;
    fn record_mut(&mut self) -> &mut Record;

    /// Stored attributes, excluding the identifier and timestamps.
    fn attributes(&self) -> Row;

    /// Shallow public view; `complete` adds relations that are already loaded.
    fn to_json_object(&self, complete: bool) -> Value;

    fn id(&self) -> Option<i64> {
        self.record().id
    }

    fn hashid(&self) -> &str {
        &self.record().hashid
    }

    fn require_id(&self) -> ModelResult<i64> {
        self.id().ok_or(ModelError::NotPersisted { entity: Self::NAME })
    }

    /// Pure reconstruction from a row; no I/O.
    fn from_json_object(row: Row) -> ModelResult<Self> {
        serde_json::from_value(Value::Object(row)).map_err(|source| ModelError::Malformed {
            entity: Self::NAME,
            source,
        })
    }

    /// Removes whatever must go before this row does. No-op by default.
    async fn delete_dependents(&mut self, _store: &dyn RecordStore) -> ModelResult<()> {
        Ok(())
    }

    async fn create(&mut self, store: &dyn RecordStore) -> ModelResult<()> {
        if let Some(id) = self.id() {
            return Err(ModelError::AlreadyExists {
                entity: Self::NAME,
                id,
            });
        }
        let row = store.create(Self::TABLE, self.attributes()).await?;
        self.record_mut().adopt(&row);
        self.require_id()?;
        Ok(())
    }

    async fn read(store: &dyn RecordStore, id: i64) -> ModelResult<Self> {
        match store.find_by_id(Self::TABLE, id).await? {
            Some(row) => Self::from_json_object(row),
            None => Err(ModelError::NotFound {
                entity: Self::NAME,
                key: "id".to_string(),
                value: id.to_string(),
            }),
        }
    }

    async fn find_one_by(store: &dyn RecordStore, column: &str, value: Value) -> ModelResult<Self> {
        match store.find_one(Self::TABLE, column, &value).await? {
            Some(row) => Self::from_json_object(row),
            None => Err(ModelError::NotFound {
                entity: Self::NAME,
                key: column.to_string(),
                value: value.as_str().map_or_else(|| value.to_string(), str::to_string),
            }),
        }
    }

    async fn find_one_by_hashid(store: &dyn RecordStore, hashid: &str) -> ModelResult<Self> {
        Self::find_one_by(store, "hashid", json!(hashid)).await
    }

    async fn update(&mut self, store: &dyn RecordStore) -> ModelResult<()> {
        let id = self.require_id()?;
        let row = store
            .update_attributes(Self::TABLE, id, self.attributes())
            .await?;
        self.record_mut().adopt(&row);
        Ok(())
    }

    async fn delete(&mut self, store: &dyn RecordStore) -> ModelResult<Deleted> {
        let id = self.require_id()?;
        self.delete_dependents(store).await?;
        store.destroy(Self::TABLE, id).await?;

        let deleted = Deleted {
            id: self.hashid().to_string(),
        };
        let record = self.record_mut();
        record.id = None;
        if Self::CLEARS_HASHID {
            record.hashid.clear();
        }
        Ok(deleted)
    }

    async fn all(store: &dyn RecordStore) -> ModelResult<Vec<Self>> {
        store
            .all(Self::TABLE)
            .await?
            .into_iter()
            .map(Self::from_json_object)
            .collect()
    }
}

/// Writes the `Record` header fields shared by every JSON view.
pub(crate) fn base_json(record: &Record) -> serde_json::Map<String, Value> {
    let mut object = serde_json::Map::new();
    object.insert("id".to_string(), json!(record.hashid));
    object.insert("created_at".to_string(), json!(record.created_at));
    object.insert("updated_at".to_string(), json!(record.updated_at));
    object
}

/// Inserts every loaded relation into a JSON view.
pub(crate) fn with_relations(
    mut object: serde_json::Map<String, Value>,
    relations: impl IntoIterator<Item = (&'static str, Option<Value>)>,
) -> Value {
    for (name, value) in relations {
        if let Some(value) = value {
            object.insert(name.to_string(), value);
        }
    }
    Value::Object(object)
}

pub(crate) async fn fetch_one<T: Entity>(
    store: &dyn RecordStore,
    relation: &Relation,
    owner_id: i64,
) -> ModelResult<Option<T>> {
    store
        .get_related(relation, owner_id)
        .await?
        .into_iter()
        .next()
        .map(T::from_json_object)
        .transpose()
}

pub(crate) async fn fetch_many<T: Entity>(
    store: &dyn RecordStore,
    relation: &Relation,
    owner_id: i64,
) -> ModelResult<Vec<T>> {
    store
        .get_related(relation, owner_id)
        .await?
        .into_iter()
        .map(T::from_json_object)
        .collect()
}
