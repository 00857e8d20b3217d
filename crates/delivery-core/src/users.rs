//! User accounts

use delivery_api::{Location, NewUser, ProfileUpdate, SavedCard, User, UserProfile, UserSession};
use delivery_store::{JsonStoreExt, KvStore};
use delivery_util::{DeliveryError, Result, UserId};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::{keys, password};

pub struct UserStore {
    store: Arc<dyn KvStore>,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn normalize_phone(phone: &str) -> String {
    phone.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// `local@domain.tld` with no whitespace
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain
            .split_once('.')
            .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty() && !tld.ends_with('.'))
}

fn check_unique(users: &[User], except: Option<&UserId>, email: &str, phone: &str) -> Result<()> {
    let others = || users.iter().filter(|u| Some(&u.id) != except);
    if others().any(|u| u.email == email) {
        return Err(DeliveryError::EmailTaken);
    }
    if !phone.is_empty() && others().any(|u| normalize_phone(&u.phone) == phone) {
        return Err(DeliveryError::PhoneTaken);
    }
    Ok(())
}

impl UserStore {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    fn load_all(&self) -> Result<Vec<User>> {
        Ok(self.store.load_or_default(keys::USERS)?)
    }

    /// Register a new user. Email and phone must not belong to anyone else.
    pub fn create(&self, new: NewUser) -> Result<UserProfile> {
        let name = new.name.trim().to_string();
        let email = normalize_email(&new.email);
        let phone = normalize_phone(&new.phone);

        if name.is_empty() {
            return Err(DeliveryError::validation("name is required"));
        }
        if !is_valid_email(&email) {
            return Err(DeliveryError::validation("invalid email address"));
        }
        if phone.is_empty() {
            return Err(DeliveryError::validation("phone is required"));
        }
        password::check_strength(&new.password)?;

        let password_hash = password::hash(&new.password)?;
        let user = User {
            id: UserId::generate(),
            name,
            email,
            phone,
            created_at: delivery_util::now(),
            password_hash,
            img: new.img,
            chosen_location: None,
            chosen_card: None,
        };

        let profile = self.store.modify(keys::USERS, |users: &mut Vec<User>| {
            check_unique(users, None, &user.email, &user.phone)?;
            users.push(user.clone());
            Ok::<_, DeliveryError>(user.profile())
        })?;

        info!(user_id = %profile.id, "User created");
        Ok(profile)
    }

    pub fn all(&self) -> Result<Vec<UserProfile>> {
        Ok(self.load_all()?.iter().map(User::profile).collect())
    }

    pub fn get(&self, id: &UserId) -> Result<UserProfile> {
        self.load_all()?
            .iter()
            .find(|u| &u.id == id)
            .map(User::profile)
            .ok_or_else(|| DeliveryError::not_found(format!("user {id}")))
    }

    pub fn find_by_email(&self, email: &str) -> Result<Option<UserProfile>> {
        let email = normalize_email(email);
        Ok(self
            .load_all()?
            .iter()
            .find(|u| u.email == email)
            .map(User::profile))
    }

    pub fn find_by_phone(&self, phone: &str) -> Result<Option<UserProfile>> {
        let phone = normalize_phone(phone);
        if phone.is_empty() {
            return Ok(None);
        }
        Ok(self
            .load_all()?
            .iter()
            .find(|u| normalize_phone(&u.phone) == phone)
            .map(User::profile))
    }

    pub fn find_by_email_or_phone(&self, identifier: &str) -> Result<Option<UserProfile>> {
        match self.find_by_email(identifier)? {
            Some(user) => Ok(Some(user)),
            None => self.find_by_phone(identifier),
        }
    }

    fn find_record(&self, identifier: &str) -> Result<Option<User>> {
        let email = normalize_email(identifier);
        let phone = normalize_phone(identifier);
        let users = self.load_all()?;
        let by_email = users.iter().find(|u| u.email == email);
        let by_phone = || {
            users
                .iter()
                .find(|u| !phone.is_empty() && normalize_phone(&u.phone) == phone)
        };
        Ok(by_email.or_else(by_phone).cloned())
    }

    /// The matching profile if the password verifies, `None` otherwise
    pub fn validate_credentials(
        &self,
        identifier: &str,
        password: &str,
    ) -> Result<Option<UserProfile>> {
        let Some(user) = self.find_record(identifier)? else {
            debug!("No user for login identifier");
            return Ok(None);
        };
        if password::verify(password, &user.password_hash) {
            Ok(Some(user.profile()))
        } else {
            warn!(user_id = %user.id, "Password mismatch");
            Ok(None)
        }
    }

    fn modify_user<R>(
        &self,
        id: &UserId,
        f: impl FnOnce(&mut User, &[User]) -> Result<R>,
    ) -> Result<R> {
        self.store.modify(keys::USERS, |users: &mut Vec<User>| {
            let snapshot = users.clone();
            let user = users
                .iter_mut()
                .find(|u| &u.id == id)
                .ok_or_else(|| DeliveryError::not_found(format!("user {id}")))?;
            f(user, &snapshot)
        })
    }

    pub fn update_profile(&self, id: &UserId, update: ProfileUpdate) -> Result<UserProfile> {
        let email = update.email.as_deref().map(normalize_email);
        if let Some(email) = &email
            && !is_valid_email(email)
        {
            return Err(DeliveryError::validation("invalid email address"));
        }
        let phone = update.phone.as_deref().map(normalize_phone);
        if phone.as_deref() == Some("") {
            return Err(DeliveryError::validation("phone is required"));
        }

        let profile = self.modify_user(id, |user, all| {
            let next_email = email.clone().unwrap_or_else(|| user.email.clone());
            let next_phone = phone.clone().unwrap_or_else(|| normalize_phone(&user.phone));
            check_unique(all, Some(id), &next_email, &next_phone)?;

            if let Some(name) = update.name {
                let name = name.trim().to_string();
                if name.is_empty() {
                    return Err(DeliveryError::validation("name is required"));
                }
                user.name = name;
            }
            user.email = next_email;
            user.phone = next_phone;
            if update.img.is_some() {
                user.img = update.img;
            }
            Ok(user.profile())
        })?;

        self.refresh_session(&profile)?;
        info!(user_id = %id, "Profile updated");
        Ok(profile)
    }

    /// Keep the logged-in session's copy of this user current. No session,
    /// or a session of another user, is left as it is.
    fn refresh_session(&self, profile: &UserProfile) -> Result<()> {
        self.store.update(keys::CURRENT_SESSION, &mut |current| {
            let Some(raw) = current else {
                return Ok(None);
            };
            let mut session: UserSession = serde_json::from_str(&raw)?;
            if session.user.id != profile.id {
                return Ok(Some(raw));
            }
            session.user = profile.clone();
            Ok(Some(serde_json::to_string(&session)?))
        })?;
        Ok(())
    }

    /// Replace the password after checking the current one
    pub fn change_password(&self, id: &UserId, current: &str, new: &str) -> Result<()> {
        password::check_strength(new)?;
        if current == new {
            return Err(DeliveryError::validation(
                "new password must differ from the current one",
            ));
        }
        let new_hash = password::hash(new)?;

        self.modify_user(id, |user, _| {
            if !password::verify(current, &user.password_hash) {
                return Err(DeliveryError::InvalidCredentials);
            }
            user.password_hash = new_hash;
            Ok(())
        })?;

        info!(user_id = %id, "Password changed");
        Ok(())
    }

    pub fn set_chosen_location(&self, id: &UserId, location: Option<Location>) -> Result<()> {
        let profile = self.modify_user(id, |user, _| {
            user.chosen_location = location;
            Ok(user.profile())
        })?;
        self.refresh_session(&profile)
    }

    pub fn set_chosen_card(&self, id: &UserId, card: Option<SavedCard>) -> Result<()> {
        let profile = self.modify_user(id, |user, _| {
            user.chosen_card = card;
            Ok(user.profile())
        })?;
        self.refresh_session(&profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use delivery_store::MemoryStore;

    fn store() -> UserStore {
        UserStore::new(Arc::new(MemoryStore::new()))
    }

    fn new_user(email: &str, phone: &str) -> NewUser {
        NewUser {
            name: "Ana".into(),
            email: email.into(),
            phone: phone.into(),
            password: "Secret123".into(),
            img: None,
        }
    }

    #[test]
    fn create_and_find() {
        let users = store();
        let created = users
            .create(new_user("Ana@Example.com", "(11) 98888-7777"))
            .unwrap();
        assert_eq!(created.email, "ana@example.com");
        assert_eq!(created.phone, "11988887777");

        assert_eq!(users.find_by_email("ANA@example.com").unwrap(), Some(created.clone()));
        assert_eq!(users.find_by_phone("11 98888 7777").unwrap(), Some(created.clone()));
        assert_eq!(users.find_by_email_or_phone("11988887777").unwrap(), Some(created));
        assert!(users.find_by_email("other@example.com").unwrap().is_none());
    }

    #[test]
    fn duplicate_email_or_phone_rejected() {
        let users = store();
        users.create(new_user("a@example.com", "111")).unwrap();

        let err = users.create(new_user("a@example.com", "222")).unwrap_err();
        assert!(matches!(err, DeliveryError::EmailTaken));

        let err = users.create(new_user("b@example.com", "111")).unwrap_err();
        assert!(matches!(err, DeliveryError::PhoneTaken));

        assert_eq!(users.all().unwrap().len(), 1);
    }

    #[test]
    fn invalid_input_rejected() {
        let users = store();
        assert!(users.create(new_user("not-an-email", "1")).is_err());
        assert!(users.create(new_user("a@b", "1")).is_err());

        let mut weak = new_user("a@example.com", "1");
        weak.password = "weak".into();
        assert!(matches!(
            users.create(weak),
            Err(DeliveryError::ValidationError(_))
        ));
    }

    #[test]
    fn credentials() {
        let users = store();
        let user = users.create(new_user("a@example.com", "111")).unwrap();

        assert_eq!(
            users.validate_credentials("a@example.com", "Secret123").unwrap(),
            Some(user.clone())
        );
        assert_eq!(users.validate_credentials("111", "Secret123").unwrap(), Some(user));
        assert!(users.validate_credentials("a@example.com", "wrong").unwrap().is_none());
        assert!(users.validate_credentials("nobody@example.com", "x").unwrap().is_none());
    }

    #[test]
    fn password_is_never_stored_in_plaintext() {
        let backing = Arc::new(MemoryStore::new());
        let users = UserStore::new(backing.clone());
        users.create(new_user("a@example.com", "111")).unwrap();

        let raw = backing.get(keys::USERS).unwrap().unwrap();
        assert!(!raw.contains("Secret123"));
        assert!(raw.contains("$argon2id$"));
    }

    #[test]
    fn change_password_flow() {
        let users = store();
        let user = users.create(new_user("a@example.com", "111")).unwrap();

        assert!(matches!(
            users.change_password(&user.id, "Wrong1234", "Another123"),
            Err(DeliveryError::InvalidCredentials)
        ));
        assert!(users.change_password(&user.id, "Secret123", "Secret123").is_err());
        assert!(users.change_password(&user.id, "Secret123", "short").is_err());

        users
            .change_password(&user.id, "Secret123", "Another123")
            .unwrap();
        assert!(users.validate_credentials("111", "Another123").unwrap().is_some());
        assert!(users.validate_credentials("111", "Secret123").unwrap().is_none());
    }

    #[test]
    fn update_profile_keeps_uniqueness() {
        let users = store();
        let a = users.create(new_user("a@example.com", "111")).unwrap();
        users.create(new_user("b@example.com", "222")).unwrap();

        let err = users
            .update_profile(
                &a.id,
                ProfileUpdate {
                    email: Some("b@example.com".into()),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, DeliveryError::EmailTaken));

        let updated = users
            .update_profile(
                &a.id,
                ProfileUpdate {
                    name: Some("Ana Maria".into()),
                    phone: Some("333".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.name, "Ana Maria");
        assert_eq!(updated.phone, "333");
        assert_eq!(updated.email, "a@example.com");
    }

    #[test]
    fn unknown_user_is_not_found() {
        let users = store();
        let err = users
            .set_chosen_location(&UserId::new("ghost"), None)
            .unwrap_err();
        assert!(matches!(err, DeliveryError::NotFound(_)));
    }
}
