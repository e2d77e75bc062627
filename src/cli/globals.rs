use crate::otp::{FileStore, StorageKeys};
use std::path::PathBuf;

/// Arguments shared by every subcommand: where the session lives and how its
/// keys are named.
#[derive(Debug, Clone)]
pub struct GlobalArgs {
    pub store_path: PathBuf,
    pub key_prefix: Option<String>,
}

impl GlobalArgs {
    #[must_use]
    pub fn new(store_path: Option<PathBuf>) -> Self {
        Self {
            store_path: store_path.unwrap_or_else(FileStore::default_path),
            key_prefix: None,
        }
    }

    pub fn set_key_prefix(&mut self, prefix: String) {
        let prefix = prefix.trim();
        self.key_prefix = (!prefix.is_empty()).then(|| prefix.to_string());
    }

    #[must_use]
    pub fn store(&self) -> FileStore {
        FileStore::new(self.store_path.clone())
    }

    #[must_use]
    pub fn keys(&self) -> StorageKeys {
        self.key_prefix
            .as_deref()
            .map_or_else(StorageKeys::default, StorageKeys::with_prefix)
    }
}
