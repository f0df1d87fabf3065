//! Domain types for the to-do table.
//!
//! # Design
//! `Item` is both the local model and the wire row. The store owns identity:
//! a locally created item has no `id` and the field is left out of the JSON
//! body, so the store's identity column assigns one on insert.

use serde::{Deserialize, Serialize};

/// A single row of the to-do table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Item {
    /// Store-assigned identifier. `None` until the row has been inserted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub title: String,
    #[serde(default)]
    pub done: bool,
}

impl Item {
    /// A new, not yet persisted item.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: None,
            title: title.into(),
            done: false,
        }
    }
}

/// Row ordering by `id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Order {
    #[default]
    IdAscending,
    IdDescending,
}

impl Order {
    /// Value of the `order` query parameter.
    pub fn as_query(self) -> &'static str {
        match self {
            Order::IdAscending => "id.asc",
            Order::IdDescending => "id.desc",
        }
    }
}
