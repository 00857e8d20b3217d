//! Recent search terms, per user

use delivery_api::{RecentSearch, UserRecentSearches};
use delivery_store::{JsonStoreExt, KvStore};
use delivery_util::{DeliveryError, Result, UserId};
use std::sync::Arc;
use uuid::Uuid;

use crate::keys;

pub struct RecentSearches {
    store: Arc<dyn KvStore>,
    max_items: usize,
}

impl RecentSearches {
    pub fn new(store: Arc<dyn KvStore>, max_items: usize) -> Self {
        Self { store, max_items }
    }

    fn modify_user<R>(
        &self,
        user_id: &UserId,
        f: impl FnOnce(&mut Vec<RecentSearch>) -> R,
    ) -> Result<R> {
        self.store
            .modify(keys::RECENT_SEARCHES, |all: &mut Vec<UserRecentSearches>| {
                let index = match all.iter().position(|s| &s.user_id == user_id) {
                    Some(i) => i,
                    None => {
                        all.push(UserRecentSearches {
                            user_id: user_id.clone(),
                            searches: Vec::new(),
                        });
                        all.len() - 1
                    }
                };
                Ok::<_, DeliveryError>(f(&mut all[index].searches))
            })
    }

    /// Newest first
    pub fn list(&self, user_id: &UserId) -> Result<Vec<RecentSearch>> {
        let all: Vec<UserRecentSearches> = self.store.load_or_default(keys::RECENT_SEARCHES)?;
        Ok(all
            .into_iter()
            .find(|s| &s.user_id == user_id)
            .map(|s| s.searches)
            .unwrap_or_default())
    }

    /// Record a search. Blank terms are ignored; repeating a term (in any
    /// case) moves it to the front.
    pub fn add(&self, user_id: &UserId, term: &str) -> Result<Option<RecentSearch>> {
        let term = term.trim();
        if term.is_empty() {
            return Ok(None);
        }

        let search = RecentSearch {
            id: Uuid::new_v4().to_string(),
            term: term.to_string(),
            user_id: user_id.clone(),
            searched_at: delivery_util::now(),
        };
        let max_items = self.max_items;
        self.modify_user(user_id, |searches| {
            let lowered = term.to_lowercase();
            searches.retain(|s| s.term.to_lowercase() != lowered);
            searches.insert(0, search.clone());
            searches.truncate(max_items);
        })?;
        Ok(Some(search))
    }

    /// Returns whether anything was removed
    pub fn remove(&self, user_id: &UserId, search_id: &str) -> Result<bool> {
        self.modify_user(user_id, |searches| {
            let before = searches.len();
            searches.retain(|s| s.id != search_id);
            searches.len() != before
        })
    }

    pub fn clear(&self, user_id: &UserId) -> Result<()> {
        self.modify_user(user_id, Vec::clear)
    }
}
