//! Browser `localStorage` backend.

use async_trait::async_trait;
use gloo::storage::{LocalStorage, Storage};

use crate::{Store, StoreError, StoreResult};

/// Store backed by the page's `window.localStorage`.
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalStorageStore;

impl LocalStorageStore {
    /// Construct a handle to the page's local storage.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

fn backend_error(operation: &'static str, err: &wasm_bindgen::JsValue) -> StoreError {
    StoreError::Backend {
        operation,
        message: format!("{err:?}"),
    }
}

#[async_trait]
impl Store for LocalStorageStore {
    async fn read(&self, key: &str) -> StoreResult<Option<String>> {
        LocalStorage::raw()
            .get_item(key)
            .map_err(|err| backend_error("local_storage.read", &err))
    }

    async fn write(&self, key: &str, value: &str) -> StoreResult<()> {
        LocalStorage::raw()
            .set_item(key, value)
            .map_err(|err| backend_error("local_storage.write", &err))
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        LocalStorage::raw()
            .remove_item(key)
            .map_err(|err| backend_error("local_storage.delete", &err))
    }
}
