use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use super::{Link, RecordStore, Relation, Row, StoreResult, Table, relations};
use crate::error::StoreError;

/// Every `RecordStore` operation, used to count calls and to inject failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Create,
    FindById,
    FindOne,
    All,
    Update,
    Destroy,
    GetRelated,
    SetRelated,
    AddRelated,
    RemoveRelated,
}

#[derive(Default)]
struct Inner {
    next_id: i64,
    tables: HashMap<Table, BTreeMap<i64, Row>>,
    joins: HashMap<&'static str, Vec<Row>>,
    calls: HashMap<StoreOp, usize>,
    failures: HashMap<StoreOp, usize>,
}

/// InMemoryRecordStore
///
/// A `RecordStore` kept entirely in process memory. Used by the test suites and
/// by local runs without a database (`STORE=memory`). It mirrors the Postgres
/// schema closely enough for the domain layer: unique keys are enforced and
/// deleting a row nulls the foreign keys that pointed at it.
///
/// Two test hooks are exposed: `calls` counts invocations per operation and
/// `fail_next` makes the next invocation(s) of an operation fail.
#[derive(Default)]
pub struct InMemoryRecordStore {
    inner: Mutex<Inner>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of times `op` has been invoked so far.
    pub fn calls(&self, op: StoreOp) -> usize {
        self.lock().calls.get(&op).copied().unwrap_or(0)
    }

    /// Total number of store invocations across every operation.
    pub fn total_calls(&self) -> usize {
        self.lock().calls.values().sum()
    }

    /// Makes the next invocation of `op` fail with a backend error.
    pub fn fail_next(&self, op: StoreOp) {
        self.fail_times(op, 1);
    }

    /// Makes the next `times` invocations of `op` fail with a backend error.
    pub fn fail_times(&self, op: StoreOp, times: usize) {
        *self.lock().failures.entry(op).or_insert(0) += times;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned lock only means another test thread panicked mid-call;
        // the maps themselves are still consistent.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Records the call and consumes an injected failure, if any.
    fn enter(&self, op: StoreOp) -> StoreResult<std::sync::MutexGuard<'_, Inner>> {
        let mut inner = self.lock();
        *inner.calls.entry(op).or_insert(0) += 1;

        if let Some(remaining) = inner.failures.get_mut(&op) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(StoreError::Backend(format!("injected {:?} failure", op)));
            }
        }
        Ok(inner)
    }
}

fn now() -> Value {
    Value::String(chrono::Utc::now().to_rfc3339())
}

fn row_id(row: &Row, key: &str) -> Option<i64> {
    row.get(key).and_then(Value::as_i64)
}

impl Inner {
    fn table(&mut self, table: Table) -> &mut BTreeMap<i64, Row> {
        self.tables.entry(table).or_default()
    }

    fn check_unique(&mut self, table: Table, attrs: &Row, except: Option<i64>) -> StoreResult<()> {
        let rows = self.table(table);
        for key in table.unique_keys() {
            let Some(value) = attrs.get(*key) else {
                continue;
            };
            let clash = rows
                .iter()
                .any(|(id, row)| Some(*id) != except && row.get(*key) == Some(value));
            if clash {
                return Err(StoreError::Duplicate {
                    table: table.name(),
                    key: key.to_string(),
                });
            }
        }
        Ok(())
    }

    fn row_mut(&mut self, table: Table, id: i64) -> StoreResult<&mut Row> {
        self.table(table).get_mut(&id).ok_or(StoreError::MissingRow {
            table: table.name(),
            id,
        })
    }

    /// Emulates `ON DELETE SET NULL` / `ON DELETE CASCADE` for join rows.
    fn release_references(&mut self, table: Table, id: i64) {
        for relation in relations::ALL {
            match relation.link {
                Link::BelongsTo { foreign_key } if relation.target == table => {
                    for row in self.table(relation.owner).values_mut() {
                        if row_id(row, foreign_key) == Some(id) {
                            row.insert(foreign_key.to_string(), Value::Null);
                        }
                    }
                }
                Link::ManyToMany {
                    join_table,
                    owner_key,
                    ..
                } if relation.owner == table => {
                    if let Some(rows) = self.joins.get_mut(join_table) {
                        rows.retain(|row| row_id(row, owner_key) != Some(id));
                    }
                }
                _ => {}
            }
        }
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn create(&self, table: Table, attrs: Row) -> StoreResult<Row> {
        let mut inner = self.enter(StoreOp::Create)?;
        let mut row = table.writable(&attrs);
        inner.check_unique(table, &row, None)?;

        inner.next_id += 1;
        let id = inner.next_id;
        row.insert("id".to_string(), json!(id));
        row.insert("created_at".to_string(), now());
        row.insert("updated_at".to_string(), now());

        inner.table(table).insert(id, row.clone());
        Ok(row)
    }

    async fn find_by_id(&self, table: Table, id: i64) -> StoreResult<Option<Row>> {
        let mut inner = self.enter(StoreOp::FindById)?;
        Ok(inner.table(table).get(&id).cloned())
    }

    async fn find_one(
        &self,
        table: Table,
        column: &str,
        value: &Value,
    ) -> StoreResult<Option<Row>> {
        let mut inner = self.enter(StoreOp::FindOne)?;
        table.check_unique_key(column)?;
        Ok(inner
            .table(table)
            .values()
            .find(|row| row.get(column) == Some(value))
            .cloned())
    }

    async fn all(&self, table: Table) -> StoreResult<Vec<Row>> {
        let mut inner = self.enter(StoreOp::All)?;
        Ok(inner.table(table).values().cloned().collect())
    }

    async fn update_attributes(&self, table: Table, id: i64, attrs: Row) -> StoreResult<Row> {
        let mut inner = self.enter(StoreOp::Update)?;
        let attrs = table.writable(&attrs);
        inner.check_unique(table, &attrs, Some(id))?;

        let row = inner.row_mut(table, id)?;
        row.extend(attrs);
        row.insert("updated_at".to_string(), now());
        Ok(row.clone())
    }

    async fn destroy(&self, table: Table, id: i64) -> StoreResult<()> {
        let mut inner = self.enter(StoreOp::Destroy)?;
        inner.table(table).remove(&id).ok_or(StoreError::MissingRow {
            table: table.name(),
            id,
        })?;
        inner.release_references(table, id);
        Ok(())
    }

    async fn get_related(&self, relation: &Relation, owner_id: i64) -> StoreResult<Vec<Row>> {
        let mut inner = self.enter(StoreOp::GetRelated)?;

        match relation.link {
            Link::BelongsTo { foreign_key } => {
                let owner = inner.row_mut(relation.owner, owner_id)?;
                let Some(target_id) = row_id(owner, foreign_key) else {
                    return Ok(vec![]);
                };
                Ok(inner
                    .table(relation.target)
                    .get(&target_id)
                    .cloned()
                    .into_iter()
                    .collect())
            }
            Link::HasMany { foreign_key } => Ok(inner
                .table(relation.target)
                .values()
                .filter(|row| row_id(row, foreign_key) == Some(owner_id))
                .cloned()
                .collect()),
            Link::ManyToMany {
                join_table,
                owner_key,
                target_key,
            } => {
                let mut target_ids: Vec<i64> = inner
                    .joins
                    .get(join_table)
                    .map(|rows| {
                        rows.iter()
                            .filter(|row| row_id(row, owner_key) == Some(owner_id))
                            .filter_map(|row| row_id(row, target_key))
                            .collect()
                    })
                    .unwrap_or_default();
                target_ids.sort_unstable();

                let targets = inner.table(relation.target);
                Ok(target_ids
                    .iter()
                    .filter_map(|id| targets.get(id).cloned())
                    .collect())
            }
        }
    }

    async fn set_related(
        &self,
        relation: &Relation,
        owner_id: i64,
        target_id: Option<i64>,
    ) -> StoreResult<()> {
        let mut inner = self.enter(StoreOp::SetRelated)?;
        let Link::BelongsTo { foreign_key } = relation.link else {
            return Err(StoreError::Unsupported(relation.name));
        };

        if let Some(target_id) = target_id {
            inner.row_mut(relation.target, target_id)?;
        }
        let owner = inner.row_mut(relation.owner, owner_id)?;
        owner.insert(foreign_key.to_string(), json!(target_id));
        owner.insert("updated_at".to_string(), now());
        Ok(())
    }

    async fn add_related(
        &self,
        relation: &Relation,
        owner_id: i64,
        target_id: i64,
    ) -> StoreResult<()> {
        let mut inner = self.enter(StoreOp::AddRelated)?;

        match relation.link {
            Link::BelongsTo { .. } => Err(StoreError::Unsupported(relation.name)),
            Link::HasMany { foreign_key } => {
                inner.row_mut(relation.owner, owner_id)?;
                let target = inner.row_mut(relation.target, target_id)?;
                target.insert(foreign_key.to_string(), json!(owner_id));
                Ok(())
            }
            Link::ManyToMany {
                join_table,
                owner_key,
                target_key,
            } => {
                inner.row_mut(relation.owner, owner_id)?;
                inner.row_mut(relation.target, target_id)?;

                let rows = inner.joins.entry(join_table).or_default();
                let exists = rows.iter().any(|row| {
                    row_id(row, owner_key) == Some(owner_id)
                        && row_id(row, target_key) == Some(target_id)
                });
                if !exists {
                    let mut row = Row::new();
                    row.insert(owner_key.to_string(), json!(owner_id));
                    row.insert(target_key.to_string(), json!(target_id));
                    rows.push(row);
                }
                Ok(())
            }
        }
    }

    async fn remove_related(
        &self,
        relation: &Relation,
        owner_id: i64,
        target_id: i64,
    ) -> StoreResult<()> {
        let mut inner = self.enter(StoreOp::RemoveRelated)?;

        match relation.link {
            Link::BelongsTo { .. } => Err(StoreError::Unsupported(relation.name)),
            Link::HasMany { foreign_key } => {
                let target = inner.row_mut(relation.target, target_id)?;
                if row_id(target, foreign_key) == Some(owner_id) {
                    target.insert(foreign_key.to_string(), Value::Null);
                }
                Ok(())
            }
            Link::ManyToMany {
                join_table,
                owner_key,
                target_key,
            } => {
                if let Some(rows) = inner.joins.get_mut(join_table) {
                    rows.retain(|row| {
                        !(row_id(row, owner_key) == Some(owner_id)
                            && row_id(row, target_key) == Some(target_id))
                    });
                }
                Ok(())
            }
        }
    }
}
