//! Typed access to a single table.
//!
//! `R` is the row type read back from the store. Every row carries `doc_id`
//! (the record key), `created_at` and `updated_at` besides the columns
//! declared in the collection schema.

use std::marker::PhantomData;

use anyhow::{anyhow, Context};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::client::Database;
use crate::clock;
use crate::error::StoreResult;
use crate::record::RecordKey;
use crate::schema::CollectionSchema;

/// Largest `LIMIT`/`START` operand bound into queries; the engine rejects
/// operands past `u32::MAX`.
pub const MAX_WINDOW: u64 = i32::MAX as u64;

/// Page window applied to [`Collection::find`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub offset: u64,
    pub limit: u64,
}

impl Window {
    /// Whether the window starts past any row the store can return.
    pub fn is_beyond_store(&self) -> bool {
        self.offset > MAX_WINDOW
    }
}

#[derive(Debug, Clone)]
enum Clause {
    /// Case-insensitive substring match against any of the columns.
    ContainsAny {
        columns: Vec<&'static str>,
        needle: String,
    },
    Equals {
        column: &'static str,
        value: String,
    },
}

/// Conjunction of clauses used by `find` and `count_documents`.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    clauses: Vec<Clause>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Match rows where any of `columns` contains `needle`, ignoring case.
    /// `None` or an empty needle adds nothing.
    pub fn contains_any(mut self, columns: &[&'static str], needle: Option<&str>) -> Self {
        if let Some(needle) = needle.filter(|n| !n.is_empty()) {
            self.clauses.push(Clause::ContainsAny {
                columns: columns.to_vec(),
                needle: needle.to_lowercase(),
            });
        }
        self
    }

    /// Match rows where `column` equals `value`. `None` adds nothing.
    pub fn equals(mut self, column: &'static str, value: Option<&str>) -> Self {
        if let Some(value) = value {
            self.clauses.push(Clause::Equals {
                column,
                value: value.to_string(),
            });
        }
        self
    }

    /// Render as a `WHERE` clause plus its parameters.
    fn render(&self) -> (String, Vec<(String, String)>) {
        let mut params = Vec::new();
        let mut parts = Vec::new();

        for clause in &self.clauses {
            let name = format!("p{}", params.len());
            match clause {
                Clause::ContainsAny { columns, needle } => {
                    let alternatives: Vec<String> = columns
                        .iter()
                        .map(|column| format!("string::lowercase({column}) CONTAINS ${name}"))
                        .collect();
                    parts.push(format!("({})", alternatives.join(" OR ")));
                    params.push((name, needle.clone()));
                }
                Clause::Equals { column, value } => {
                    parts.push(format!("{column} = ${name}"));
                    params.push((name, value.clone()));
                }
            }
        }

        if parts.is_empty() {
            (String::new(), params)
        } else {
            (format!(" WHERE {}", parts.join(" AND ")), params)
        }
    }
}

#[derive(Deserialize)]
struct CountRow {
    total: u64,
}

/// Handle on one table of the document store.
pub struct Collection<R> {
    db: Database,
    schema: &'static CollectionSchema,
    _row: PhantomData<fn() -> R>,
}

impl<R> Clone for Collection<R> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            schema: self.schema,
            _row: PhantomData,
        }
    }
}

impl<R> Collection<R>
where
    R: DeserializeOwned + Send + Sync + 'static,
{
    pub fn new(db: Database, schema: &'static CollectionSchema) -> Self {
        Self {
            db,
            schema,
            _row: PhantomData,
        }
    }

    pub fn schema(&self) -> &'static CollectionSchema {
        self.schema
    }

    /// Insert a new document and return the stored row.
    pub async fn create<D: Serialize>(&self, doc: &D) -> StoreResult<R> {
        let mut content = to_object(doc)?;
        self.schema.validate_insert(&content)?;

        let now = clock::now_iso8601();
        content.insert("created_at".to_string(), Value::String(now.clone()));
        content.insert("updated_at".to_string(), Value::String(now));

        let key = RecordKey::generate();
        let sql = format!(
            "CREATE type::thing($table, $key) CONTENT $content RETURN NONE; \
             SELECT {} FROM type::thing($table, $key);",
            self.projection()
        );

        let mut response = self
            .db
            .client()
            .query(sql)
            .bind(("table", self.schema.table))
            .bind(("key", key.clone().into_string()))
            .bind(("content", Value::Object(content)))
            .await
            .and_then(|response| response.check())
            .map_err(|err| self.schema.translate(err))?;

        let rows: Vec<R> = response
            .take(1)
            .context("failed to decode created document")?;
        rows.into_iter()
            .next()
            .ok_or_else(|| anyhow!("document {key} vanished after insert").into())
    }

    /// Rows matching `filter`, in store (record key) order, optionally windowed.
    /// An offset beyond [`MAX_WINDOW`] yields no rows; a larger limit is
    /// capped to it.
    pub async fn find(&self, filter: &Filter, window: Option<Window>) -> StoreResult<Vec<R>> {
        if window.is_some_and(|w| w.is_beyond_store()) {
            return Ok(Vec::new());
        }
        let (condition, params) = filter.render();
        let paging = if window.is_some() {
            " LIMIT $limit START $start"
        } else {
            ""
        };
        let sql = format!(
            "SELECT {} FROM {}{condition} ORDER BY doc_id ASC{paging}",
            self.projection(),
            self.schema.table
        );

        let mut query = self.db.client().query(sql);
        for param in params {
            query = query.bind(param);
        }
        if let Some(window) = window {
            query = query
                .bind(("limit", window.limit.min(MAX_WINDOW) as i64))
                .bind(("start", window.offset as i64));
        }

        let mut response = query
            .await
            .and_then(|response| response.check())
            .map_err(|err| self.schema.translate(err))?;
        let rows: Vec<R> = response
            .take(0)
            .context("failed to decode documents")?;
        Ok(rows)
    }

    pub async fn find_by_id(&self, id: &str) -> StoreResult<Option<R>> {
        let key = RecordKey::parse(id)?;
        let sql = format!("SELECT {} FROM type::thing($table, $key)", self.projection());

        let mut response = self
            .db
            .client()
            .query(sql)
            .bind(("table", self.schema.table))
            .bind(("key", key.into_string()))
            .await
            .and_then(|response| response.check())
            .map_err(|err| self.schema.translate(err))?;
        let rows: Vec<R> = response.take(0).context("failed to decode document")?;
        Ok(rows.into_iter().next())
    }

    /// Rows whose key is in `ids`, in key order. Unknown ids are skipped.
    pub async fn find_by_ids(&self, ids: &[String]) -> StoreResult<Vec<R>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let keys = ids
            .iter()
            .map(|id| RecordKey::parse(id).map(RecordKey::into_string))
            .collect::<StoreResult<Vec<_>>>()?;
        let sql = format!(
            "SELECT {} FROM {} WHERE record::id(id) IN $keys ORDER BY doc_id ASC",
            self.projection(),
            self.schema.table
        );

        let mut response = self
            .db
            .client()
            .query(sql)
            .bind(("keys", keys))
            .await
            .and_then(|response| response.check())
            .map_err(|err| self.schema.translate(err))?;
        let rows: Vec<R> = response.take(0).context("failed to decode documents")?;
        Ok(rows)
    }

    /// Merge the non-null fields of `patch` into the document and return the
    /// updated row, or `None` when no document has this id.
    pub async fn find_by_id_and_update<P: Serialize>(
        &self,
        id: &str,
        patch: &P,
    ) -> StoreResult<Option<R>> {
        let key = RecordKey::parse(id)?;
        let mut changes = to_object(patch)?;
        self.schema.validate_patch(&changes)?;
        changes.insert(
            "updated_at".to_string(),
            Value::String(clock::now_iso8601()),
        );

        let sql = format!(
            "UPDATE {table} MERGE $changes WHERE id = type::thing($table, $key) RETURN NONE; \
             SELECT {projection} FROM type::thing($table, $key);",
            table = self.schema.table,
            projection = self.projection()
        );

        let mut response = self
            .db
            .client()
            .query(sql)
            .bind(("table", self.schema.table))
            .bind(("key", key.into_string()))
            .bind(("changes", Value::Object(changes)))
            .await
            .and_then(|response| response.check())
            .map_err(|err| self.schema.translate(err))?;
        let rows: Vec<R> = response
            .take(1)
            .context("failed to decode updated document")?;
        Ok(rows.into_iter().next())
    }

    /// Delete the document and return it as it was, or `None` when no
    /// document has this id.
    pub async fn find_by_id_and_delete(&self, id: &str) -> StoreResult<Option<R>> {
        let key = RecordKey::parse(id)?;
        let sql = format!(
            "SELECT {} FROM type::thing($table, $key); \
             DELETE type::thing($table, $key) RETURN NONE;",
            self.projection()
        );

        let mut response = self
            .db
            .client()
            .query(sql)
            .bind(("table", self.schema.table))
            .bind(("key", key.into_string()))
            .await
            .and_then(|response| response.check())
            .map_err(|err| self.schema.translate(err))?;
        let rows: Vec<R> = response
            .take(0)
            .context("failed to decode deleted document")?;
        Ok(rows.into_iter().next())
    }

    pub async fn count_documents(&self, filter: &Filter) -> StoreResult<u64> {
        let (condition, params) = filter.render();
        let sql = format!(
            "SELECT count() AS total FROM {}{condition} GROUP ALL",
            self.schema.table
        );

        let mut query = self.db.client().query(sql);
        for param in params {
            query = query.bind(param);
        }
        let mut response = query
            .await
            .and_then(|response| response.check())
            .map_err(|err| self.schema.translate(err))?;
        let rows: Vec<CountRow> = response.take(0).context("failed to decode count")?;
        Ok(rows.first().map(|row| row.total).unwrap_or(0))
    }

    fn projection(&self) -> String {
        let mut columns = vec![
            "record::id(id) AS doc_id".to_string(),
            "created_at".to_string(),
            "updated_at".to_string(),
        ];
        columns.extend(self.schema.fields.iter().map(|rule| rule.column.to_string()));
        columns.join(", ")
    }
}

/// Serialize `value` to a JSON object without null members.
fn to_object<T: Serialize>(value: &T) -> StoreResult<Map<String, Value>> {
    match serde_json::to_value(value)? {
        Value::Object(mut map) => {
            map.retain(|_, member| !member.is_null());
            Ok(map)
        }
        other => Err(anyhow!("expected a document object, got {other}").into()),
    }
}
