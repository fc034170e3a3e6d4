//! Pluggable async key/value persistence for session credentials.
//!
//! # Design
//! - Backends implement three raw primitives (`read`, `write`, `delete`); the
//!   credential semantics live in provided methods so every backend agrees on them.
//! - An empty value is never stored: `set_item` with `""` deletes the key.
//! - Absent keys and the literal `"undefined"` both read back as `""`.
//! - Keys are namespaced by callers (`{client_id}-accessToken`), not here.
#![forbid(unsafe_code)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls
)]
#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
#[cfg(not(target_arch = "wasm32"))]
pub mod file;
#[cfg(target_arch = "wasm32")]
pub mod local;
pub mod memory;

use async_trait::async_trait;

pub use error::{StoreError, StoreResult};
#[cfg(not(target_arch = "wasm32"))]
pub use file::FileStore;
#[cfg(target_arch = "wasm32")]
pub use local::LocalStorageStore;
pub use memory::MemoryStore;

/// Stored value some hosts produce when `undefined` leaks into storage.
const UNDEFINED_LITERAL: &str = "undefined";

/// Separator used when persisting value lists.
const LIST_SEPARATOR: &str = ",";

/// Async key/value persistence consumed by the session managers.
#[async_trait]
pub trait Store: Send + Sync {
    /// Read the raw value stored under `key`, `None` when absent.
    async fn read(&self, key: &str) -> StoreResult<Option<String>>;

    /// Write `value` under `key`, replacing any previous value.
    async fn write(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Delete `key`; deleting a missing key succeeds.
    async fn delete(&self, key: &str) -> StoreResult<()>;

    /// Persist `value`, deleting the key instead when `value` is empty.
    async fn set_item(&self, key: &str, value: &str) -> StoreResult<()> {
        if value.is_empty() {
            self.delete(key).await
        } else {
            self.write(key, value).await
        }
    }

    /// Read `key`, yielding an empty string when nothing usable is stored.
    async fn get_item(&self, key: &str) -> StoreResult<String> {
        Ok(normalize(self.read(key).await?))
    }

    /// Remove `key` from the backend.
    async fn remove_item(&self, key: &str) -> StoreResult<()> {
        self.delete(key).await
    }
}

/// List helpers layered on top of any [`Store`].
#[async_trait]
pub trait StoreExt: Store {
    /// Persist `values` as a comma-joined list; an empty list deletes the key.
    async fn set_items(&self, key: &str, values: &[String]) -> StoreResult<()> {
        self.set_item(key, &values.join(LIST_SEPARATOR)).await
    }

    /// Read a list previously written with [`StoreExt::set_items`].
    async fn get_items(&self, key: &str) -> StoreResult<Vec<String>> {
        let raw = self.get_item(key).await?;
        Ok(raw
            .split(LIST_SEPARATOR)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect())
    }
}

impl<S: Store + ?Sized> StoreExt for S {}

fn normalize(value: Option<String>) -> String {
    match value {
        Some(text) if text != UNDEFINED_LITERAL => text,
        _ => String::new(),
    }
}
