//! Stateless request builder and response parser for the row-store dialect.
//!
//! # Design
//! `StoreClient` holds the base URL, the table and the optional API key, and
//! carries no mutable state between calls. Each store operation is split into
//! a `build_*` method that produces an `HttpRequest` and a `parse_*` method
//! that consumes an `HttpResponse`. The caller executes the round trip, which
//! keeps this module deterministic and free of I/O.
//!
//! Queries follow the PostgREST conventions: `select=*`, `order=id.asc`,
//! `<column>=<op>.<value>` filters, and `Prefer`/`Accept` headers to request
//! the canonical row back from an insert.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::de::DeserializeOwned;

use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::types::{Item, Order};

/// Characters left as-is in path segments and query values.
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

const JSON: &str = "application/json";
const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";
const RETURN_REPRESENTATION: &str = "return=representation";

/// Synchronous, stateless client for one table of the row store.
#[derive(Debug, Clone)]
pub struct StoreClient {
    base_url: String,
    table: String,
    api_key: Option<String>,
}

impl StoreClient {
    pub fn new(base_url: &str, table: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            table: table.to_string(),
            api_key: None,
        }
    }

    pub fn with_api_key(mut self, key: &str) -> Self {
        self.api_key = Some(key.to_string());
        self
    }

    pub fn from_config(config: &StoreConfig) -> Self {
        let client = Self::new(&config.base_url, &config.table);
        match &config.api_key {
            Some(key) => client.with_api_key(key),
            None => client,
        }
    }

    pub fn build_list(&self, order: Order) -> HttpRequest {
        self.request(
            HttpMethod::Get,
            format!("select=*&order={}", order.as_query()),
            Vec::new(),
            None,
        )
    }

    /// Rows whose title contains `term`, ignoring case.
    pub fn build_filter(&self, term: &str, order: Order) -> HttpRequest {
        let pattern = encode(&ilike_pattern(term));
        self.request(
            HttpMethod::Get,
            format!("select=*&title=ilike.{pattern}&order={}", order.as_query()),
            Vec::new(),
            None,
        )
    }

    /// Insert `item` and ask for the single canonical row back.
    pub fn build_insert(&self, item: &Item) -> Result<HttpRequest, StoreError> {
        let body = serde_json::to_string(item).map_err(|e| StoreError::Encode(e.to_string()))?;
        Ok(self.request(
            HttpMethod::Post,
            "select=*".to_string(),
            vec![
                header("content-type", JSON),
                header("prefer", RETURN_REPRESENTATION),
                header("accept", SINGLE_OBJECT),
            ],
            Some(body),
        ))
    }

    /// Overwrite the row with `id` using the fields of `item`.
    pub fn build_update(&self, id: i64, item: &Item) -> Result<HttpRequest, StoreError> {
        let body = serde_json::to_string(item).map_err(|e| StoreError::Encode(e.to_string()))?;
        Ok(self.request(
            HttpMethod::Patch,
            format!("id=eq.{id}"),
            vec![header("content-type", JSON)],
            Some(body),
        ))
    }

    pub fn build_delete(&self, id: i64) -> HttpRequest {
        self.request(HttpMethod::Delete, format!("id=eq.{id}"), Vec::new(), None)
    }

    pub fn parse_list(&self, response: HttpResponse) -> Result<Vec<Item>, StoreError> {
        check_status(&response, 200)?;
        decode(&response.body)
    }

    pub fn parse_filter(&self, response: HttpResponse) -> Result<Vec<Item>, StoreError> {
        self.parse_list(response)
    }

    pub fn parse_insert(&self, response: HttpResponse) -> Result<Item, StoreError> {
        check_status(&response, 201)?;
        decode(&response.body)
    }

    pub fn parse_update(&self, response: HttpResponse) -> Result<(), StoreError> {
        check_status(&response, 204)
    }

    pub fn parse_delete(&self, response: HttpResponse) -> Result<(), StoreError> {
        check_status(&response, 204)
    }

    fn request(
        &self,
        method: HttpMethod,
        query: String,
        extra_headers: Vec<(String, String)>,
        body: Option<String>,
    ) -> HttpRequest {
        let mut headers = Vec::with_capacity(extra_headers.len() + 2);
        if let Some(key) = &self.api_key {
            headers.push(header("apikey", key));
            headers.push(header("authorization", &format!("Bearer {key}")));
        }
        headers.extend(extra_headers);

        HttpRequest {
            method,
            path: format!("{}/rest/v1/{}?{query}", self.base_url, encode(&self.table)),
            headers,
            body,
        }
    }
}

/// Case-insensitive substring pattern for `ilike`.
///
/// `\`, `%`, `_` and `*` in `term` are escaped so they match literally.
pub fn ilike_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_' | '*') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

fn encode(value: &str) -> String {
    utf8_percent_encode(value, QUERY_VALUE).to_string()
}

fn header(name: &str, value: &str) -> (String, String) {
    (name.to_string(), value.to_string())
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<T, StoreError> {
    serde_json::from_str(body).map_err(|e| StoreError::Decode(e.to_string()))
}

/// Map non-success status codes to the appropriate `StoreError` variant.
fn check_status(response: &HttpResponse, expected: u16) -> Result<(), StoreError> {
    match response.status {
        s if s == expected => Ok(()),
        401 | 403 => Err(StoreError::Unauthorized(response.body.clone())),
        404 => Err(StoreError::NotFound),
        406 => Err(StoreError::NotSingleRow(response.body.clone())),
        status => Err(StoreError::Http {
            status,
            body: response.body.clone(),
        }),
    }
}
