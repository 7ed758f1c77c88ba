use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, trace, warn};

use crate::backend::Backend;
use crate::error::CacheError;

const ENTRY_SUFFIX: &str = ".json";

/// Durable key/value cache, one `<key>.json` file per entry.
///
/// Every entry is loaded into memory by [`CacheStore::open`]. The in-memory mirror holds the
/// exact bytes last persisted for each key; [`CacheStore::put`] only touches the backend when
/// the new serialization differs from them.
pub struct CacheStore {
    backend: Arc<dyn Backend>,
    entries: BTreeMap<String, Vec<u8>>,
}

impl CacheStore {
    /// Load every entry from the backend.
    ///
    /// An unreadable or malformed entry fails the whole open: the cache is the only record of
    /// what has already been fetched, and silently dropping an entry would trigger full
    /// refreshes that the rate budget may not absorb.
    pub async fn open(backend: Arc<dyn Backend>) -> Result<Self, CacheError> {
        let mut entries = BTreeMap::new();

        for name in backend.list().await? {
            let Some(key) = name.strip_suffix(ENTRY_SUFFIX) else {
                continue;
            };
            if !is_valid_key(key) {
                warn!(file = %name, "ignoring file with unexpected name in cache directory");
                continue;
            }

            let data = backend
                .read(&name)
                .await
                .map_err(|source| CacheError::Unreadable {
                    key: key.to_string(),
                    source: source.into(),
                })?;
            serde_json::from_slice::<serde_json::Value>(&data).map_err(|source| {
                CacheError::Corrupt {
                    key: key.to_string(),
                    source,
                }
            })?;
            entries.insert(key.to_string(), data);
        }

        info!(entries = entries.len(), "cache loaded");
        Ok(Self { backend, entries })
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheError> {
        let Some(data) = self.entries.get(key) else {
            return Ok(None);
        };
        serde_json::from_slice(data)
            .map(Some)
            .map_err(|source| CacheError::Decode {
                key: key.to_string(),
                source,
            })
    }

    /// Persist `value` under `key`. Returns `false` when the serialized bytes are identical to
    /// what is already stored, in which case nothing is written.
    pub async fn put<T: Serialize + ?Sized>(
        &mut self,
        key: &str,
        value: &T,
    ) -> Result<bool, CacheError> {
        if !is_valid_key(key) {
            return Err(CacheError::InvalidKey(key.to_string()));
        }

        let data = serde_json::to_vec_pretty(value).map_err(|source| CacheError::Encode {
            key: key.to_string(),
            source,
        })?;
        if self.entries.get(key) == Some(&data) {
            trace!(key, "cache entry unchanged, skipping write");
            return Ok(false);
        }

        self.backend
            .write(&format!("{key}{ENTRY_SUFFIX}"), &data)
            .await?;
        debug!(key, bytes = data.len(), "cache entry written");
        self.entries.insert(key.to_string(), data);
        Ok(true)
    }

    /// Return the stored value, or persist and return `init()` when the key is absent.
    pub async fn get_or_initialize<T, F>(&mut self, key: &str, init: F) -> Result<T, CacheError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> T,
    {
        if let Some(value) = self.get(key)? {
            return Ok(value);
        }
        let value = init();
        self.put(key, &value).await?;
        Ok(value)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Keys double as file names.
pub fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && !key.starts_with('.')
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}
