//! The remote store contract and its HTTP implementation.
//!
//! # Design
//! `RemoteStore` is what the coordinator talks to: five table operations,
//! already bound to one table. `HttpStore` implements it by pairing a
//! `StoreClient` builder and parser around a single `Transport` round trip,
//! so the only I/O in the whole path lives in the host's transport.

use async_trait::async_trait;
use tracing::debug;

use crate::client::StoreClient;
use crate::error::StoreError;
use crate::http::{HttpRequest, HttpResponse};
use crate::types::{Item, Order};

/// Operations against one table of the row store.
#[async_trait]
pub trait RemoteStore: Send + Sync + 'static {
    async fn list(&self, order: Order) -> Result<Vec<Item>, StoreError>;

    /// Insert `item` and return the canonical row, id assigned.
    async fn insert(&self, item: &Item) -> Result<Item, StoreError>;

    async fn delete(&self, id: i64) -> Result<(), StoreError>;

    async fn update(&self, id: i64, item: &Item) -> Result<(), StoreError>;

    /// Rows whose title contains `term` case-insensitively.
    async fn filter(&self, term: &str, order: Order) -> Result<Vec<Item>, StoreError>;
}

/// Executes an `HttpRequest` and hands back the response as data.
///
/// Non-2xx statuses are responses, not errors; only a failure to obtain a
/// response at all is `StoreError::Transport`.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, StoreError>;
}

/// `RemoteStore` over HTTP.
pub struct HttpStore<T> {
    client: StoreClient,
    transport: T,
}

impl<T: Transport> HttpStore<T> {
    pub fn new(client: StoreClient, transport: T) -> Self {
        Self { client, transport }
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, StoreError> {
        debug!(method = request.method.as_str(), path = %request.path, "store request");
        let response = self.transport.execute(request).await?;
        debug!(status = response.status, "store response");
        Ok(response)
    }
}

#[async_trait]
impl<T: Transport> RemoteStore for HttpStore<T> {
    async fn list(&self, order: Order) -> Result<Vec<Item>, StoreError> {
        let response = self.send(self.client.build_list(order)).await?;
        self.client.parse_list(response)
    }

    async fn insert(&self, item: &Item) -> Result<Item, StoreError> {
        let request = self.client.build_insert(item)?;
        let response = self.send(request).await?;
        self.client.parse_insert(response)
    }

    async fn delete(&self, id: i64) -> Result<(), StoreError> {
        let response = self.send(self.client.build_delete(id)).await?;
        self.client.parse_delete(response)
    }

    async fn update(&self, id: i64, item: &Item) -> Result<(), StoreError> {
        let request = self.client.build_update(id, item)?;
        let response = self.send(request).await?;
        self.client.parse_update(response)
    }

    async fn filter(&self, term: &str, order: Order) -> Result<Vec<Item>, StoreError> {
        let response = self.send(self.client.build_filter(term, order)).await?;
        self.client.parse_filter(response)
    }
}
