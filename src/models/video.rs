use serde::Deserialize;
use serde_json::{Value, json};

use super::{Entity, Lazy, Record, VideosCollection, base_json, with_relations};
use crate::error::ModelResult;
use crate::store::{RecordStore, Row, Table, relations};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Video {
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
    collection: Lazy<VideosCollection>,
}

impl Video {
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

    pub fn collection(&self) -> ModelResult<Option<&VideosCollection>> {
        self.collection.get(relations::VIDEO_COLLECTION.name)
    }

    pub async fn load_collection(&mut self, store: &dyn RecordStore) -> ModelResult<()> {
        let id = self.require_id()?;
        self.collection
            .load(store, &relations::VIDEO_COLLECTION, id)
            .await
    }

    pub async fn load_associations(&mut self, store: &dyn RecordStore) -> ModelResult<()> {
        self.load_collection(store).await
    }
}

impl Entity for Video {
    const TABLE: Table = Table::Videos;
    const NAME: &'static str = "Video";

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
