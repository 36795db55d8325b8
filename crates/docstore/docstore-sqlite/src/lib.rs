//! # SQLite Document Store
//!
//! SQLite-based implementation of the [`DocumentStore`] trait.
//!
//! Documents are stored as JSON text in a single table, tagged with their
//! collection name. Indexes become SQLite expression indexes over
//! `(collection, json_extract(body, '$.<field>'), ...)`, so unique indexes are
//! enforced by SQLite itself, per collection.
//!
//! Equality on top-level scalar fields, `And`/`Or` over such clauses, sorting
//! on a top-level field, skip/limit, counting and group-by-key pipelines run
//! in SQL. Clauses SQLite cannot express (regular expressions, dotted paths
//! that may fan out over arrays) are evaluated per document with the shared
//! matcher from `docstore-core`, after SQL has narrowed the rows.
//!
//! Every statement runs on its own (autocommit). Writes take the database
//! lock directly and wait up to the busy timeout for other writers.
//!
//! ## Database Schema
//!
//! ```sql
//! CREATE TABLE documents (
//!     seq INTEGER PRIMARY KEY AUTOINCREMENT,
//!     collection TEXT NOT NULL,
//!     body TEXT NOT NULL
//! );
//! ```

use async_trait::async_trait;
use docstore_core::{
    apply_find, run_pipeline, Document, DocumentStore, Filter, FindOptions, IndexModel,
    InsertedId, Matcher, Result, SortOrder, SortSpec, Stage, StoreError,
};
use futures::TryStreamExt;
use serde_json::Value;
use sqlx::query::Query;
use sqlx::sqlite::{
    SqliteArguments, SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow,
};
use sqlx::{Row, Sqlite, SqlitePool};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

/// How long a write waits for another connection's write to finish.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

type SqliteQuery<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;

/// Maps a driver error, singling out unique-constraint violations.
fn db_err(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return StoreError::DuplicateKey(db.message().to_string());
        }
    }
    StoreError::Database(e.to_string())
}

fn is_identifier(s: &str, allow_dots: bool) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || (allow_dots && c == '.'))
}

fn json_path(field: &str) -> Result<String> {
    if !is_identifier(field, true) {
        return Err(StoreError::InvalidQuery(format!("bad field name: {}", field)));
    }
    Ok(format!("json_extract(body, '$.{}')", field))
}

/// JSON text of a top-level field; `'null'` when the field is missing.
fn group_key(field: &str) -> String {
    format!("COALESCE(body -> '$.{}', 'null')", field)
}

fn sql_limit(limit: Option<usize>) -> i64 {
    limit.map_or(-1, |l| i64::try_from(l).unwrap_or(i64::MAX))
}

fn sql_offset(skip: usize) -> i64 {
    i64::try_from(skip).unwrap_or(i64::MAX)
}

fn direction(order: SortOrder) -> &'static str {
    match order {
        SortOrder::Ascending => "ASC",
        SortOrder::Descending => "DESC",
    }
}

fn decode_body(row: &SqliteRow) -> Result<Document> {
    let body: String = row.try_get("body").map_err(db_err)?;
    Ok(serde_json::from_str(&body)?)
}

/// A value that can be compared in SQL against `json_extract` output.
#[derive(Clone, Copy)]
enum SqlScalar<'a> {
    Text(&'a str),
    Int(i64),
    Real(f64),
}

fn sql_scalar(value: &Value) -> Option<SqlScalar<'_>> {
    match value {
        Value::String(s) => Some(SqlScalar::Text(s)),
        Value::Number(n) => n
            .as_i64()
            .map(SqlScalar::Int)
            .or_else(|| n.as_f64().map(SqlScalar::Real)),
        _ => None,
    }
}

/// SQL condition for `filter`, or `None` if some part of it needs the matcher.
///
/// Top-level fields are compared as stored scalars.
fn to_sql(filter: &Filter) -> Result<Option<(String, Vec<SqlScalar<'_>>)>> {
    let (filters, joiner, empty) = match filter {
        Filter::All => return Ok(Some(("1".to_string(), Vec::new()))),
        Filter::Eq { field, value } if is_identifier(field, false) => {
            return Ok(match sql_scalar(value) {
                Some(scalar) => Some((format!("{} = ?", json_path(field)?), vec![scalar])),
                None => None,
            });
        }
        Filter::Eq { .. } | Filter::Regex { .. } => return Ok(None),
        Filter::And(filters) => (filters, " AND ", "1"),
        Filter::Or(filters) => (filters, " OR ", "0"),
    };

    let mut parts = Vec::with_capacity(filters.len());
    let mut params = Vec::new();
    for filter in filters {
        match to_sql(filter)? {
            Some((sql, p)) => {
                parts.push(sql);
                params.extend(p);
            }
            None => return Ok(None),
        }
    }
    if parts.is_empty() {
        return Ok(Some((empty.to_string(), params)));
    }
    Ok(Some((format!("({})", parts.join(joiner)), params)))
}

/// Rows of one collection selected by a filter: the `WHERE` clause SQLite
/// evaluates, and the remaining clauses checked per document.
struct Selection<'f> {
    clause: String,
    params: Vec<SqlScalar<'f>>,
    residual: Option<Matcher>,
}

impl<'f> Selection<'f> {
    fn new(filter: &'f Filter) -> Result<Self> {
        let mut clauses = vec!["collection = ?".to_string()];
        let mut params = Vec::new();
        let mut rest = Vec::new();

        for conjunct in filter.conjuncts() {
            match to_sql(conjunct)? {
                Some((sql, p)) => {
                    clauses.push(sql);
                    params.extend(p);
                }
                None => rest.push(conjunct.clone()),
            }
        }

        let residual = if rest.is_empty() {
            None
        } else {
            Some(Filter::and(rest).compile()?)
        };
        Ok(Self {
            clause: clauses.join(" AND "),
            params,
            residual,
        })
    }

    fn is_exact(&self) -> bool {
        self.residual.is_none()
    }

    fn matches(&self, doc: &Document) -> bool {
        self.residual.as_ref().map_or(true, |m| m.matches(doc))
    }

    /// Prepares `sql` with the collection and filter parameters bound, in
    /// that order. Callers bind anything after the `WHERE` clause.
    fn bind<'q>(&'q self, sql: &'q str, collection: &'q str) -> SqliteQuery<'q> {
        let mut query = sqlx::query(sql).bind(collection);
        for param in &self.params {
            query = match *param {
                SqlScalar::Text(s) => query.bind(s),
                SqlScalar::Int(i) => query.bind(i),
                SqlScalar::Real(f) => query.bind(f),
            };
        }
        query
    }
}

/// Group pipelines that run as a single `GROUP BY` statement.
enum GroupQuery<'p> {
    /// `Group` then `Count`.
    Count { key: &'p str, into: &'p str },
    /// `Group`, `Sort` on `_id`, then an optional `Skip` and `Limit`.
    Keys {
        key: &'p str,
        order: SortOrder,
        skip: usize,
        limit: Option<usize>,
    },
}

impl<'p> GroupQuery<'p> {
    fn parse(stages: &'p [Stage]) -> Option<Self> {
        let (key, rest) = match stages.split_first()? {
            (Stage::Group { key }, rest) if is_identifier(key, false) => (key.as_str(), rest),
            _ => return None,
        };

        match rest {
            [Stage::Count { into }] => Some(GroupQuery::Count { key, into }),
            [Stage::Sort(spec), tail @ ..] if spec.field == "_id" => {
                let (skip, tail) = match tail {
                    [Stage::Skip(n), tail @ ..] => (*n, tail),
                    tail => (0, tail),
                };
                let limit = match tail {
                    [] => None,
                    [Stage::Limit(n)] => Some(*n),
                    _ => return None,
                };
                Some(GroupQuery::Keys {
                    key,
                    order: spec.order,
                    skip,
                    limit,
                })
            }
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct SqliteDocumentStore {
    pool: SqlitePool,
}

impl SqliteDocumentStore {
    /// Opens (creating if missing) the database at `database_url`.
    ///
    /// Accepts either a plain file path or a `sqlite:` URL.
    pub async fn new(database_url: &str) -> Result<Self> {
        info!("Initializing SQLite document store: {}", database_url);

        let options = if database_url.starts_with("sqlite:") {
            SqliteConnectOptions::from_str(database_url).map_err(db_err)?
        } else {
            SqliteConnectOptions::new().filename(database_url)
        };
        let options = options
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePool::connect_with(options).await.map_err(db_err)?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// Private in-memory database on a single long-lived connection.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:").map_err(db_err)?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(db_err)?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// Returns the underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                collection TEXT NOT NULL,
                body TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection, seq);
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    /// `(seq, document)` pairs matching the selection, in insertion order.
    async fn fetch_matching(
        &self,
        selection: &Selection<'_>,
        collection: &str,
    ) -> Result<Vec<(i64, Document)>> {
        let sql = format!(
            "SELECT seq, body FROM documents WHERE {} ORDER BY seq",
            selection.clause
        );
        let rows = selection
            .bind(&sql, collection)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            let seq: i64 = row.try_get("seq").map_err(db_err)?;
            let doc = decode_body(row)?;
            if selection.matches(&doc) {
                out.push((seq, doc));
            }
        }
        Ok(out)
    }

    async fn run_group(
        &self,
        selection: &Selection<'_>,
        collection: &str,
        query: GroupQuery<'_>,
    ) -> Result<Vec<Document>> {
        match query {
            GroupQuery::Count { key, into } => {
                let sql = format!(
                    "SELECT COUNT(*) AS n FROM (SELECT {} AS g FROM documents WHERE {} GROUP BY g)",
                    group_key(key),
                    selection.clause
                );
                let row = selection
                    .bind(&sql, collection)
                    .fetch_one(&self.pool)
                    .await
                    .map_err(db_err)?;
                let n: i64 = row.try_get("n").map_err(db_err)?;
                if n == 0 {
                    return Ok(Vec::new());
                }
                let mut out = serde_json::Map::new();
                out.insert(into.to_string(), Value::from(n));
                Ok(vec![Value::Object(out)])
            }
            GroupQuery::Keys {
                key,
                order,
                skip,
                limit,
            } => {
                let sql = format!(
                    "SELECT {} AS g FROM documents WHERE {} GROUP BY g \
                     ORDER BY json_extract(g, '$') {} LIMIT ? OFFSET ?",
                    group_key(key),
                    selection.clause,
                    direction(order)
                );
                let rows = selection
                    .bind(&sql, collection)
                    .bind(sql_limit(limit))
                    .bind(sql_offset(skip))
                    .fetch_all(&self.pool)
                    .await
                    .map_err(db_err)?;

                let mut groups = Vec::with_capacity(rows.len());
                for row in &rows {
                    let g: String = row.try_get("g").map_err(db_err)?;
                    let id: Value = serde_json::from_str(&g)?;
                    let mut out = serde_json::Map::new();
                    out.insert("_id".to_string(), id);
                    groups.push(Value::Object(out));
                }
                Ok(groups)
            }
        }
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn create_index(&self, collection: &str, index: IndexModel) -> Result<String> {
        let name = index.name();
        if !is_identifier(collection, false) {
            return Err(StoreError::InvalidQuery(format!(
                "bad collection name: {}",
                collection
            )));
        }
        if index.keys.is_empty() {
            return Err(StoreError::InvalidQuery("index has no keys".to_string()));
        }

        let mut columns = vec!["collection".to_string()];
        for key in &index.keys {
            columns.push(format!("{} {}", json_path(&key.field)?, direction(key.order)));
        }

        let sql_name = format!("idx_{}_{}", collection, name.replace('-', "d").replace('.', "_"));
        let sql = format!(
            "CREATE {unique}INDEX IF NOT EXISTS {sql_name} ON documents({columns})",
            unique = if index.unique { "UNIQUE " } else { "" },
            columns = columns.join(", "),
        );

        sqlx::query(&sql).execute(&self.pool).await.map_err(db_err)?;
        debug!("Created index {} on {}", sql_name, collection);
        Ok(name)
    }

    async fn insert_one(&self, collection: &str, document: Document) -> Result<InsertedId> {
        if !document.is_object() {
            return Err(StoreError::InvalidQuery(
                "document must be a JSON object".to_string(),
            ));
        }
        let body = serde_json::to_string(&document)?;

        let result = sqlx::query("INSERT INTO documents (collection, body) VALUES (?, ?)")
            .bind(collection)
            .bind(&body)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(result.last_insert_rowid())
    }

    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        options: FindOptions,
    ) -> Result<Vec<Document>> {
        let selection = Selection::new(filter)?;
        if options.limit == Some(0) {
            return Ok(Vec::new());
        }

        // Sorting on a dotted path follows array fan-out, which only the
        // shared evaluator does.
        let sql_sort: Option<&SortSpec> = match &options.sort {
            Some(spec) if !is_identifier(&spec.field, false) => {
                let docs = self
                    .fetch_matching(&selection, collection)
                    .await?
                    .into_iter()
                    .map(|(_, d)| d)
                    .collect();
                return Ok(apply_find(docs, &Filter::All.compile()?, &options));
            }
            sort => sort.as_ref(),
        };

        let order_by = match sql_sort {
            Some(spec) => format!("{} {}, seq", json_path(&spec.field)?, direction(spec.order)),
            None => "seq".to_string(),
        };
        let mut sql = format!(
            "SELECT body FROM documents WHERE {} ORDER BY {}",
            selection.clause, order_by
        );

        if selection.is_exact() {
            sql.push_str(" LIMIT ? OFFSET ?");
            let rows = selection
                .bind(&sql, collection)
                .bind(sql_limit(options.limit))
                .bind(sql_offset(options.skip))
                .fetch_all(&self.pool)
                .await
                .map_err(db_err)?;
            return rows.iter().map(decode_body).collect();
        }

        // Page through the ordered rows, stopping once the page is full.
        let mut rows = selection.bind(&sql, collection).fetch(&self.pool);
        let mut page = Vec::new();
        let mut skipped = 0;
        while let Some(row) = rows.try_next().await.map_err(db_err)? {
            let doc = decode_body(&row)?;
            if !selection.matches(&doc) {
                continue;
            }
            if skipped < options.skip {
                skipped += 1;
                continue;
            }
            page.push(doc);
            if options.limit.is_some_and(|limit| page.len() >= limit) {
                break;
            }
        }
        Ok(page)
    }

    async fn find_one(&self, collection: &str, filter: &Filter) -> Result<Option<Document>> {
        let found = self
            .find(collection, filter, FindOptions::new().limit(1))
            .await?;
        Ok(found.into_iter().next())
    }

    async fn count_documents(&self, collection: &str, filter: &Filter) -> Result<u64> {
        let selection = Selection::new(filter)?;
        if !selection.is_exact() {
            let matched = self.fetch_matching(&selection, collection).await?;
            return Ok(matched.len() as u64);
        }

        let sql = format!(
            "SELECT COUNT(*) AS n FROM documents WHERE {}",
            selection.clause
        );
        let row = selection
            .bind(&sql, collection)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        let n: i64 = row.try_get("n").map_err(db_err)?;
        Ok(n as u64)
    }

    async fn delete_one(&self, collection: &str, filter: &Filter) -> Result<u64> {
        let selection = Selection::new(filter)?;

        let result = if selection.is_exact() {
            let sql = format!(
                "DELETE FROM documents WHERE seq = \
                 (SELECT seq FROM documents WHERE {} ORDER BY seq LIMIT 1)",
                selection.clause
            );
            selection.bind(&sql, collection).execute(&self.pool).await
        } else {
            let matched = self.fetch_matching(&selection, collection).await?;
            let Some((seq, _)) = matched.first() else {
                return Ok(0);
            };
            sqlx::query("DELETE FROM documents WHERE seq = ?")
                .bind(*seq)
                .execute(&self.pool)
                .await
        };

        Ok(result.map_err(db_err)?.rows_affected())
    }

    async fn delete_many(&self, collection: &str, filter: &Filter) -> Result<u64> {
        let selection = Selection::new(filter)?;

        let result = if selection.is_exact() {
            let sql = format!("DELETE FROM documents WHERE {}", selection.clause);
            selection.bind(&sql, collection).execute(&self.pool).await
        } else {
            let seqs: Vec<i64> = self
                .fetch_matching(&selection, collection)
                .await?
                .into_iter()
                .map(|(seq, _)| seq)
                .collect();
            if seqs.is_empty() {
                return Ok(0);
            }
            sqlx::query("DELETE FROM documents WHERE seq IN (SELECT value FROM json_each(?))")
                .bind(serde_json::to_string(&seqs)?)
                .execute(&self.pool)
                .await
        };

        Ok(result.map_err(db_err)?.rows_affected())
    }

    async fn aggregate(&self, collection: &str, pipeline: &[Stage]) -> Result<Vec<Document>> {
        // A leading $match narrows the scan like a find would.
        let (first, rest) = match pipeline.split_first() {
            Some((Stage::Match(filter), rest)) => (filter.clone(), rest),
            _ => (Filter::All, pipeline),
        };
        let selection = Selection::new(&first)?;

        if selection.is_exact() {
            if let Some(query) = GroupQuery::parse(rest) {
                return self.run_group(&selection, collection, query).await;
            }
        }

        let docs = self
            .fetch_matching(&selection, collection)
            .await?
            .into_iter()
            .map(|(_, d)| d)
            .collect();
        run_pipeline(docs, rest)
    }
}
