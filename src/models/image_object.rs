use serde::Deserialize;
use serde_json::{Value, json};

use super::{Entity, ImagesCollection, Lazy, Record, base_json, with_relations};
use crate::error::ModelResult;
use crate::store::{RecordStore, Row, Table, relations};

/// ImageObject
///
/// A single image belonging to an `ImagesCollection`. The file itself lives
/// on disk as `<collection hashid>/<hashid>.<extension>`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImageObject {
    #[serde(flatten)]
    record: Record,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub mimetype: String,
    #[serde(default)]
    pub extension: String,

    #[serde(skip)]
    collection: Lazy<ImagesCollection>,
}

impl ImageObject {
    pub fn new(
        hashid: impl Into<String>,
        name: impl Into<String>,
        mimetype: impl Into<String>,
        extension: impl Into<String>,
    ) -> Self {
        Self {
            record: Record::new(hashid),
            name: name.into(),
            mimetype: mimetype.into(),
            extension: extension.into(),
            ..Self::default()
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}.{}", self.hashid(), self.extension)
    }

    pub fn collection(&self) -> ModelResult<Option<&ImagesCollection>> {
        self.collection.get(relations::IMAGE_OBJECT_COLLECTION.name)
    }

    pub async fn load_collection(&mut self, store: &dyn RecordStore) -> ModelResult<()> {
        let id = self.require_id()?;
        self.collection
            .load(store, &relations::IMAGE_OBJECT_COLLECTION, id)
            .await
    }

    pub async fn load_associations(&mut self, store: &dyn RecordStore) -> ModelResult<()> {
        self.load_collection(store).await
    }
}

impl Entity for ImageObject {
    const TABLE: Table = Table::ImageObjects;
    const NAME: &'static str = "ImageObject";

    fn record(&self) -> &Record {
        &self.record
    }

    fn record_mut(&mut self) -> &mut Record {
        &mut self.record
    }

    fn attributes(&self) -> Row {
        let mut row = Row::new();
        row.insert("hashid".to_string(), json!(self.record.hashid));
        row.insert("name".to_string(), json!(self.name));
        row.insert("description".to_string(), json!(self.description));
        row.insert("mimetype".to_string(), json!(self.mimetype));
        row.insert("extension".to_string(), json!(self.extension));
        row
    }

    fn to_json_object(&self, complete: bool) -> Value {
        let mut object = base_json(&self.record);
        object.insert("name".to_string(), json!(self.name));
        object.insert("description".to_string(), json!(self.description));
        object.insert("mimetype".to_string(), json!(self.mimetype));
        object.insert("extension".to_string(), json!(self.extension));

        if !complete {
            return Value::Object(object);
        }
        with_relations(object, [("collection", self.collection.json())])
    }
}
