use serde::Deserialize;
use serde_json::{Value, json};

use super::{Entity, Lazy, NewsCollection, Record, base_json, with_relations};
use crate::error::ModelResult;
use crate::store::{RecordStore, Row, Table, relations};

/// News
///
/// A news item. `begin` and `end` bound its validity window; they are kept as
/// the strings clients sent and are never parsed here.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct News {
    #[serde(flatten)]
    record: Record,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub begin: Option<String>,
    #[serde(default)]
    pub end: Option<String>,

    #[serde(skip)]
    collection: Lazy<NewsCollection>,
}

impl News {
    pub fn new(
        hashid: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            record: Record::new(hashid),
            title: title.into(),
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn collection(&self) -> ModelResult<Option<&NewsCollection>> {
        self.collection.get(relations::NEWS_ITEM_COLLECTION.name)
    }

    pub async fn load_collection(&mut self, store: &dyn RecordStore) -> ModelResult<()> {
        let id = self.require_id()?;
        self.collection
            .load(store, &relations::NEWS_ITEM_COLLECTION, id)
            .await
    }

    pub async fn load_associations(&mut self, store: &dyn RecordStore) -> ModelResult<()> {
        self.load_collection(store).await
    }
}

impl Entity for News {
    const TABLE: Table = Table::News;
    const NAME: &'static str = "News";

    fn record(&self) -> &Record {
        &self.record
    }

    fn record_mut(&mut self) -> &mut Record {
        &mut self.record
    }

    fn attributes(&self) -> Row {
        let mut row = Row::new();
        row.insert("hashid".to_string(), json!(self.record.hashid));
        row.insert("title".to_string(), json!(self.title));
        row.insert("content".to_string(), json!(self.content));
        row.insert("begin".to_string(), json!(self.begin));
        row.insert("end".to_string(), json!(self.end));
        row
    }

    fn to_json_object(&self, complete: bool) -> Value {
        let mut object = base_json(&self.record);
        object.insert("title".to_string(), json!(self.title));
        object.insert("content".to_string(), json!(self.content));
        object.insert("begin".to_string(), json!(self.begin));
        object.insert("end".to_string(), json!(self.end));

        if !complete {
            return Value::Object(object);
        }
        with_relations(object, [("collection", self.collection.json())])
    }
}
