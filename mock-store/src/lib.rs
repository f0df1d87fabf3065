//! In-memory row store speaking the PostgREST table dialect.
//!
//! Serves `/rest/v1/{table}` for a fixed set of tables. Ids come from a
//! per-table identity counter starting at 1.

pub mod query;

use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::{net::TcpListener, sync::RwLock};
use tracing::debug;

use query::Selection;

pub const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Row {
    pub id: i64,
    pub title: String,
    pub done: bool,
}

/// Insert payload. An `id` in the body is ignored; the identity column wins.
#[derive(Deserialize)]
pub struct NewRow {
    pub title: String,
    #[serde(default)]
    pub done: bool,
}

/// Update payload. Only the fields present are applied.
#[derive(Deserialize)]
pub struct RowPatch {
    pub title: Option<String>,
    pub done: Option<bool>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct Table {
    next_id: i64,
    rows: BTreeMap<i64, Row>,
}

impl Table {
    fn insert(&mut self, new: NewRow) -> Row {
        self.next_id += 1;
        let row = Row {
            id: self.next_id,
            title: new.title,
            done: new.done,
        };
        self.rows.insert(row.id, row.clone());
        row
    }

    fn select(&self, selection: &Selection) -> Vec<Row> {
        let mut rows: Vec<Row> = self
            .rows
            .values()
            .filter(|row| selection.matches(row))
            .cloned()
            .collect();
        rows.sort_by(|a, b| selection.order.compare(a, b));
        rows
    }
}

/// Tables to serve and the API key to require, if any.
#[derive(Clone, Debug)]
pub struct StoreSettings {
    pub tables: Vec<String>,
    pub api_key: Option<String>,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            tables: vec!["todos".to_string()],
            api_key: None,
        }
    }
}

impl StoreSettings {
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_tables<I, S>(mut self, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tables = tables.into_iter().map(Into::into).collect();
        self
    }
}

pub struct AppState {
    tables: RwLock<HashMap<String, Table>>,
    api_key: Option<String>,
}

pub type Db = Arc<AppState>;

/// Error response with a PostgREST-shaped body.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                code: code.to_string(),
                message: message.into(),
            },
        }
    }

    fn bad_request(message: String) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "PGRST100", message)
    }

    fn no_table(table: &str) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            "42P01",
            format!("relation \"public.{table}\" does not exist"),
        )
    }

    fn not_single(rows: usize) -> Self {
        Self::new(
            StatusCode::NOT_ACCEPTABLE,
            "PGRST116",
            format!("JSON object requested, multiple (or no) rows returned ({rows} rows)"),
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

type ApiResult = Result<Response, ApiError>;

pub fn app() -> Router {
    app_with(StoreSettings::default())
}

pub fn app_with(settings: StoreSettings) -> Router {
    let tables = settings
        .tables
        .into_iter()
        .map(|name| (name, Table::default()))
        .collect();
    let db: Db = Arc::new(AppState {
        tables: RwLock::new(tables),
        api_key: settings.api_key,
    });
    Router::new()
        .route(
            "/rest/v1/{table}",
            get(select_rows)
                .post(insert_rows)
                .patch(update_rows)
                .delete(delete_rows),
        )
        .with_state(db)
}

pub async fn run(listener: TcpListener, settings: StoreSettings) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with(settings)).await
}

fn authorize(db: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let Some(expected) = &db.api_key else {
        return Ok(());
    };
    let given = headers.get("apikey").and_then(|v| v.to_str().ok());
    if given == Some(expected.as_str()) {
        Ok(())
    } else {
        Err(ApiError::new(
            StatusCode::UNAUTHORIZED,
            "PGRST301",
            "invalid or missing API key",
        ))
    }
}

fn wants_single(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains(SINGLE_OBJECT))
}

fn wants_representation(headers: &HeaderMap) -> bool {
    headers
        .get("prefer")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("return=representation"))
}

/// Rows as a JSON array, or as one object when the client asked for one.
fn rows_response(status: StatusCode, rows: Vec<Row>, single: bool) -> ApiResult {
    if !single {
        return Ok((status, Json(rows)).into_response());
    }
    match <[Row; 1]>::try_from(rows) {
        Ok([row]) => Ok((status, Json(row)).into_response()),
        Err(rows) => Err(ApiError::not_single(rows.len())),
    }
}

async fn select_rows(
    State(db): State<Db>,
    Path(table): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
    headers: HeaderMap,
) -> ApiResult {
    authorize(&db, &headers)?;
    let selection = Selection::parse(&params).map_err(ApiError::bad_request)?;

    let tables = db.tables.read().await;
    let rows = tables
        .get(&table)
        .ok_or_else(|| ApiError::no_table(&table))?
        .select(&selection);
    debug!(table = %table, rows = rows.len(), "select");
    rows_response(StatusCode::OK, rows, wants_single(&headers))
}

async fn insert_rows(
    State(db): State<Db>,
    Path(table): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> ApiResult {
    authorize(&db, &headers)?;
    let values = match body {
        Value::Array(values) => values,
        value @ Value::Object(_) => vec![value],
        _ => return Err(ApiError::bad_request("body must be an object or an array".to_string())),
    };
    let new_rows = values
        .into_iter()
        .map(serde_json::from_value::<NewRow>)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, "PGRST102", e.to_string()))?;

    let single = wants_single(&headers);
    if single && new_rows.len() != 1 {
        return Err(ApiError::not_single(new_rows.len()));
    }

    let mut tables = db.tables.write().await;
    let target = tables
        .get_mut(&table)
        .ok_or_else(|| ApiError::no_table(&table))?;
    let inserted: Vec<Row> = new_rows.into_iter().map(|new| target.insert(new)).collect();
    debug!(table = %table, rows = inserted.len(), "insert");

    if wants_representation(&headers) {
        rows_response(StatusCode::CREATED, inserted, single)
    } else {
        Ok(StatusCode::CREATED.into_response())
    }
}

async fn update_rows(
    State(db): State<Db>,
    Path(table): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
    headers: HeaderMap,
    Json(patch): Json<RowPatch>,
) -> ApiResult {
    authorize(&db, &headers)?;
    let selection = Selection::parse(&params).map_err(ApiError::bad_request)?;

    let mut tables = db.tables.write().await;
    let target = tables
        .get_mut(&table)
        .ok_or_else(|| ApiError::no_table(&table))?;
    let mut updated = 0;
    for row in target.rows.values_mut().filter(|row| selection.matches(row)) {
        if let Some(title) = &patch.title {
            row.title = title.clone();
        }
        if let Some(done) = patch.done {
            row.done = done;
        }
        updated += 1;
    }
    debug!(table = %table, rows = updated, "update");
    Ok(StatusCode::NO_CONTENT.into_response())
}

async fn delete_rows(
    State(db): State<Db>,
    Path(table): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
    headers: HeaderMap,
) -> ApiResult {
    authorize(&db, &headers)?;
    let selection = Selection::parse(&params).map_err(ApiError::bad_request)?;

    let mut tables = db.tables.write().await;
    let target = tables
        .get_mut(&table)
        .ok_or_else(|| ApiError::no_table(&table))?;
    let before = target.rows.len();
    target.rows.retain(|_, row| !selection.matches(row));
    debug!(table = %table, rows = before - target.rows.len(), "delete");
    Ok(StatusCode::NO_CONTENT.into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_serializes_to_json() {
        let row = Row {
            id: 1,
            title: "Buy milk".to_string(),
            done: false,
        };
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json, serde_json::json!({"id": 1, "title": "Buy milk", "done": false}));
    }

    #[test]
    fn new_row_defaults_done_and_ignores_id() {
        let input: NewRow = serde_json::from_str(r#"{"id":99,"title":"Walk dog"}"#).unwrap();
        assert_eq!(input.title, "Walk dog");
        assert!(!input.done);
    }

    #[test]
    fn new_row_rejects_missing_title() {
        let result: Result<NewRow, _> = serde_json::from_str(r#"{"done":true}"#);
        assert!(result.is_err());
    }

    #[test]
    fn patch_fields_are_optional() {
        let patch: RowPatch = serde_json::from_str(r#"{"id":1,"done":true}"#).unwrap();
        assert!(patch.title.is_none());
        assert_eq!(patch.done, Some(true));
    }

    #[test]
    fn table_assigns_sequential_ids() {
        let mut table = Table::default();
        let a = table.insert(NewRow {
            title: "a".to_string(),
            done: false,
        });
        let b = table.insert(NewRow {
            title: "b".to_string(),
            done: true,
        });
        assert_eq!((a.id, b.id), (1, 2));
        let rows = table.select(&Selection::default());
        assert_eq!(rows, vec![a, b]);
    }

    #[test]
    fn single_row_response_requires_exactly_one() {
        assert!(rows_response(StatusCode::OK, Vec::new(), true).is_err());
        assert!(rows_response(StatusCode::OK, Vec::new(), false).is_ok());
    }
}
