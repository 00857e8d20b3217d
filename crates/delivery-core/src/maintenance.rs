//! Whole-store maintenance: wipe, size report, export and import

use delivery_store::KvStore;
use delivery_util::{DeliveryError, Result};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::keys;

/// Prefixes of the per-user collections
const SCOPED_PREFIXES: &[&str] = &[
    keys::CART,
    keys::USER_COUPONS,
    keys::LOCATIONS,
    keys::CURRENT_LOCATION,
];

/// Whether `key` names a collection this application writes
pub fn is_known_key(key: &str) -> bool {
    keys::FIXED_KEYS.contains(&key)
        || key == keys::LOCATIONS
        || key == keys::CURRENT_LOCATION
        || SCOPED_PREFIXES.iter().any(|prefix| {
            key.strip_prefix(prefix)
                .and_then(|rest| rest.strip_prefix('_'))
                .is_some_and(|user| !user.is_empty())
        })
}

pub struct Maintenance {
    store: Arc<dyn KvStore>,
}

impl Maintenance {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    fn managed_keys(&self) -> Result<Vec<String>> {
        Ok(self
            .store
            .keys()?
            .into_iter()
            .filter(|k| keys::is_managed(k))
            .collect())
    }

    /// Remove every collection; returns how many keys were removed
    pub fn clear_all(&self) -> Result<usize> {
        let keys = self.managed_keys()?;
        self.store.remove_many(&keys)?;
        info!(count = keys.len(), "All data cleared");
        Ok(keys.len())
    }

    /// Stored size in bytes per key
    pub fn storage_info(&self) -> Result<BTreeMap<String, usize>> {
        let mut info = BTreeMap::new();
        for key in self.managed_keys()? {
            let size = self.store.get(&key)?.map(|v| v.len()).unwrap_or(0);
            info.insert(key, size);
        }
        Ok(info)
    }

    /// Every collection as one pretty-printed JSON object keyed by storage key
    pub fn export_all(&self) -> Result<String> {
        let mut export = Map::new();
        for key in self.managed_keys()? {
            if let Some(raw) = self.store.get(&key)? {
                let value: Value = serde_json::from_str(&raw)
                    .map_err(|e| DeliveryError::store(format!("{key}: {e}")))?;
                export.insert(key, value);
            }
        }
        serde_json::to_string_pretty(&Value::Object(export))
            .map_err(|e| DeliveryError::internal(e.to_string()))
    }

    /// Write the collections of an export. Unknown keys are skipped.
    /// Returns how many keys were written.
    pub fn import(&self, json: &str) -> Result<usize> {
        let data: Map<String, Value> = serde_json::from_str(json)
            .map_err(|e| DeliveryError::validation(format!("import is not a JSON object: {e}")))?;

        let mut written = 0;
        for (key, value) in data {
            if !is_known_key(&key) {
                warn!(key = %key, "Skipping unknown key on import");
                continue;
            }
            let raw = serde_json::to_string(&value)
                .map_err(|e| DeliveryError::internal(e.to_string()))?;
            self.store.set(&key, &raw)?;
            written += 1;
        }
        info!(written, "Data imported");
        Ok(written)
    }
}
