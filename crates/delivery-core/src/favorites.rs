//! Favorite products, grouped per user in one collection

use delivery_api::{FavoriteItem, MenuItem, UserFavorites};
use delivery_store::{JsonStoreExt, KvStore};
use delivery_util::{DeliveryError, ProductId, Result, UserId};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::keys;

pub struct Favorites {
    store: Arc<dyn KvStore>,
    max_items: usize,
}

impl Favorites {
    pub fn new(store: Arc<dyn KvStore>, max_items: usize) -> Self {
        Self { store, max_items }
    }

    fn modify_user<R>(&self, user_id: &UserId, f: impl FnOnce(&mut Vec<FavoriteItem>) -> R) -> Result<R> {
        self.store
            .modify(keys::FAVORITES, |all: &mut Vec<UserFavorites>| {
                let entry = match all.iter().position(|f| &f.user_id == user_id) {
                    Some(i) => &mut all[i],
                    None => {
                        all.push(UserFavorites {
                            user_id: user_id.clone(),
                            items: Vec::new(),
                        });
                        let last = all.len() - 1;
                        &mut all[last]
                    }
                };
                Ok::<_, DeliveryError>(f(&mut entry.items))
            })
    }

    /// Newest first
    pub fn list(&self, user_id: &UserId) -> Result<Vec<FavoriteItem>> {
        let all: Vec<UserFavorites> = self.store.load_or_default(keys::FAVORITES)?;
        Ok(all
            .into_iter()
            .find(|f| &f.user_id == user_id)
            .map(|f| f.items)
            .unwrap_or_default())
    }

    pub fn is_favorite(&self, user_id: &UserId, product_id: &ProductId) -> Result<bool> {
        Ok(self
            .list(user_id)?
            .iter()
            .any(|f| &f.product_id == product_id))
    }

    /// Returns false when the product was already a favorite
    pub fn add(&self, user_id: &UserId, item: &MenuItem) -> Result<bool> {
        let max_items = self.max_items;
        let added = self.modify_user(user_id, |items| {
            if items.iter().any(|f| f.product_id == item.id) {
                return false;
            }
            items.insert(
                0,
                FavoriteItem {
                    id: Uuid::new_v4().to_string(),
                    product_id: item.id.clone(),
                    name: item.name.clone(),
                    price: item.price,
                    image: item.image.clone(),
                    rating: item.rating,
                    review_count: item.review_count,
                    user_id: user_id.clone(),
                    favorited_at: delivery_util::now(),
                },
            );
            items.truncate(max_items);
            true
        })?;

        debug!(user_id = %user_id, product_id = %item.id, added, "Favorite add");
        Ok(added)
    }

    /// Returns whether anything was removed
    pub fn remove(&self, user_id: &UserId, product_id: &ProductId) -> Result<bool> {
        self.modify_user(user_id, |items| {
            let before = items.len();
            items.retain(|f| &f.product_id != product_id);
            items.len() != before
        })
    }

    /// Flip the favorite state; returns the new state
    pub fn toggle(&self, user_id: &UserId, item: &MenuItem) -> Result<bool> {
        if self.remove(user_id, &item.id)? {
            return Ok(false);
        }
        self.add(user_id, item)
    }

    pub fn clear(&self, user_id: &UserId) -> Result<()> {
        self.modify_user(user_id, Vec::clear)
    }
}
