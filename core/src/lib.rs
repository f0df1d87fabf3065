//! Client core for a to-do list backed by a hosted row store.
//!
//! # Overview
//! `StoreClient` builds `HttpRequest` values and parses `HttpResponse` values
//! for the PostgREST-style table API without touching the network
//! (host-does-IO pattern). `HttpStore` pairs it with a host-provided
//! `Transport` to implement `RemoteStore`, and `ListCoordinator` keeps the
//! in-memory list a display layer renders.
//!
//! # Design
//! - `StoreClient` is stateless: base URL, table, optional API key.
//! - Each store operation is split into `build_*` and `parse_*`, so the I/O
//!   boundary is explicit and testable with plain data.
//! - `ListCoordinator` is a single-writer task; commands apply in submission
//!   order and state is published through a `watch` channel.
//! - DTOs are defined independently from the mock-store crate; integration
//!   tests catch schema drift.

pub mod client;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod http;
pub mod store;
pub mod types;

pub use client::{ilike_pattern, StoreClient};
pub use config::StoreConfig;
pub use coordinator::{ListCoordinator, ListView, Reply};
pub use error::{ConfigError, StoreError};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use store::{HttpStore, RemoteStore, Transport};
pub use types::{Item, Order};
