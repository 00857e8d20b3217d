//! Store trait definitions

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::{StoreError, StoreResult};

/// Mutation callback for [`KvStore::update`]: receives the current raw
/// value and returns the value to store (`None` removes the key).
pub type UpdateFn<'a> = dyn FnMut(Option<String>) -> StoreResult<Option<String>> + 'a;

/// Main store trait: string keys to JSON strings
pub trait KvStore: Send + Sync {
    /// Read the raw value under a key
    fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Overwrite the value under a key
    fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Remove a key; removing an absent key is not an error
    fn remove(&self, key: &str) -> StoreResult<()>;

    /// Remove several keys at once
    fn remove_many(&self, keys: &[String]) -> StoreResult<()> {
        for key in keys {
            self.remove(key)?;
        }
        Ok(())
    }

    /// All keys currently stored, sorted
    fn keys(&self) -> StoreResult<Vec<String>>;

    /// Read-modify-write under the store lock.
    ///
    /// No other mutation of any key can interleave between the read and the
    /// write. Returning an error from `f` leaves the stored value unchanged.
    fn update(&self, key: &str, f: &mut UpdateFn<'_>) -> StoreResult<()>;

    /// Check if store is healthy
    fn is_healthy(&self) -> bool;
}

/// Typed JSON access on top of any [`KvStore`]
pub trait JsonStoreExt: KvStore {
    /// Decode the value under `key`, `None` if absent
    fn load<T: DeserializeOwned>(&self, key: &str) -> StoreResult<Option<T>> {
        match self.get(key)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Decode the value under `key`, the type's default if absent
    fn load_or_default<T: DeserializeOwned + Default>(&self, key: &str) -> StoreResult<T> {
        Ok(self.load(key)?.unwrap_or_default())
    }

    /// Encode and overwrite the value under `key`
    fn save<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> StoreResult<()> {
        let raw = serde_json::to_string(value)?;
        self.set(key, &raw)
    }

    /// Atomically decode, mutate and re-encode the value under `key`.
    ///
    /// An error returned by `f` is handed back unchanged and nothing is
    /// written.
    fn modify<T, R, E, F>(&self, key: &str, f: F) -> Result<R, E>
    where
        T: DeserializeOwned + Serialize + Default,
        E: From<StoreError>,
        F: FnOnce(&mut T) -> Result<R, E>,
    {
        let mut f = Some(f);
        let mut outcome: Option<Result<R, E>> = None;

        let result = self.update(key, &mut |current| {
            let mut value: T = match current {
                Some(raw) => serde_json::from_str(&raw)?,
                None => T::default(),
            };
            let f = f.take().ok_or(StoreError::Aborted)?;
            match f(&mut value) {
                Ok(r) => {
                    outcome = Some(Ok(r));
                    Ok(Some(serde_json::to_string(&value)?))
                }
                Err(e) => {
                    outcome = Some(Err(e));
                    Err(StoreError::Aborted)
                }
            }
        });

        match (result, outcome) {
            (_, Some(Err(e))) => Err(e),
            (Err(e), _) => Err(e.into()),
            (Ok(()), Some(Ok(r))) => Ok(r),
            (Ok(()), None) => Err(StoreError::Aborted.into()),
        }
    }
}

impl<S: KvStore + ?Sized> JsonStoreExt for S {}
