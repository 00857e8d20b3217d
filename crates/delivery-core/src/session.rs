//! The single logged-in session

use delivery_api::{UserProfile, UserSession};
use delivery_store::{JsonStoreExt, KvStore};
use delivery_util::{Result, epoch_millis};
use std::sync::Arc;
use tracing::info;

use crate::{UserStore, keys};

pub struct SessionStore {
    store: Arc<dyn KvStore>,
}

impl SessionStore {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Verify credentials and persist a new session. `None` when the
    /// credentials do not match any user.
    pub fn login(
        &self,
        identifier: &str,
        password: &str,
        remember_user: bool,
    ) -> Result<Option<UserSession>> {
        let users = UserStore::new(self.store.clone());
        let Some(user) = users.validate_credentials(identifier, password)? else {
            return Ok(None);
        };

        let session = Self::session_for(user, remember_user);
        self.save(&session)?;
        info!(user_id = %session.user.id, remember_user, "User logged in");
        Ok(Some(session))
    }

    fn session_for(user: UserProfile, remember_user: bool) -> UserSession {
        let login_date = delivery_util::now();
        UserSession {
            token: format!("token_{}_{}", user.id, epoch_millis(&login_date)),
            user,
            login_date,
            remember_user,
        }
    }

    pub fn save(&self, session: &UserSession) -> Result<()> {
        Ok(self.store.save(keys::CURRENT_SESSION, session)?)
    }

    pub fn current(&self) -> Result<Option<UserSession>> {
        Ok(self.store.load(keys::CURRENT_SESSION)?)
    }

    pub fn logout(&self) -> Result<()> {
        self.store.remove(keys::CURRENT_SESSION)?;
        info!("Session cleared");
        Ok(())
    }

    pub fn is_logged_in(&self) -> Result<bool> {
        Ok(self.current()?.is_some())
    }
}
