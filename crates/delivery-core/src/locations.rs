//! Saved delivery addresses, per user
//!
//! An address is identified by its coordinate pair: saving a second
//! address at the same point replaces the first.

use delivery_api::Location;
use delivery_store::{JsonStoreExt, KvStore};
use delivery_util::{DeliveryError, Result, UserId};
use std::sync::Arc;
use tracing::{debug, info};

use crate::keys;

pub struct LocationStore {
    store: Arc<dyn KvStore>,
}

impl LocationStore {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    fn list_key(user_id: &UserId) -> String {
        keys::user_scoped(keys::LOCATIONS, user_id)
    }

    fn current_key(user_id: &UserId) -> String {
        keys::user_scoped(keys::CURRENT_LOCATION, user_id)
    }

    /// Insert, or replace the address at the same coordinates
    pub fn save(&self, location: Location) -> Result<()> {
        let key = Self::list_key(&location.user_id);
        self.store.modify(&key, |all: &mut Vec<Location>| {
            match all
                .iter_mut()
                .find(|l| l.same_point(location.latitude, location.longitude))
            {
                Some(existing) => *existing = location,
                None => all.push(location),
            }
            Ok::<_, DeliveryError>(())
        })?;
        debug!(key = %key, "Location saved");
        Ok(())
    }

    pub fn save_current(&self, location: &Location) -> Result<()> {
        Ok(self
            .store
            .save(&Self::current_key(&location.user_id), location)?)
    }

    pub fn current(&self, user_id: &UserId) -> Result<Option<Location>> {
        Ok(self.store.load(&Self::current_key(user_id))?)
    }

    /// Saved addresses in insertion order
    pub fn list(&self, user_id: &UserId) -> Result<Vec<Location>> {
        Ok(self.store.load_or_default(&Self::list_key(user_id))?)
    }

    /// Most recently added address
    pub fn last(&self, user_id: &UserId) -> Result<Option<Location>> {
        Ok(self.list(user_id)?.pop())
    }

    pub fn remove(&self, user_id: &UserId, latitude: f64, longitude: f64) -> Result<()> {
        self.store
            .modify(&Self::list_key(user_id), |all: &mut Vec<Location>| {
                all.retain(|l| !l.same_point(latitude, longitude));
                Ok::<_, DeliveryError>(())
            })
    }

    /// Add the address unless one at the same coordinates exists already.
    /// Returns whether it was added.
    pub fn save_to_favorites(&self, location: Location) -> Result<bool> {
        let key = Self::list_key(&location.user_id);
        self.store.modify(&key, |all: &mut Vec<Location>| {
            if all
                .iter()
                .any(|l| l.same_point(location.latitude, location.longitude))
            {
                return Ok::<_, DeliveryError>(false);
            }
            all.push(location);
            Ok(true)
        })
    }

    pub fn clear_user_locations(&self, user_id: &UserId) -> Result<()> {
        self.store
            .remove_many(&[Self::list_key(user_id), Self::current_key(user_id)])?;
        info!(user_id = %user_id, "User locations cleared");
        Ok(())
    }

    /// Move the legacy un-scoped blobs under the user's keys, rewriting the
    /// owner of each record. Existing user-scoped data is overwritten.
    pub fn migrate_to_user_specific(&self, user_id: &UserId) -> Result<()> {
        if let Some(mut legacy) = self.store.load::<Vec<Location>>(keys::LOCATIONS)? {
            for location in &mut legacy {
                location.user_id = user_id.clone();
            }
            self.store.save(&Self::list_key(user_id), &legacy)?;
            self.store.remove(keys::LOCATIONS)?;
            info!(user_id = %user_id, count = legacy.len(), "Legacy locations migrated");
        }

        if let Some(mut legacy) = self.store.load::<Location>(keys::CURRENT_LOCATION)? {
            legacy.user_id = user_id.clone();
            self.store.save(&Self::current_key(user_id), &legacy)?;
            self.store.remove(keys::CURRENT_LOCATION)?;
            info!(user_id = %user_id, "Legacy current location migrated");
        }
        Ok(())
    }
}
