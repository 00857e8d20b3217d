//! Saved payment cards
//!
//! Every mutation leaves exactly one default card per user that owns any
//! card. Card numbers are masked before they reach the store; the CVV is
//! only validated, never kept.

use chrono::{DateTime, Datelike, Local};
use delivery_api::{CardBrand, CardUpdate, NewCard, SavedCard, mask_card_number};
use delivery_store::{JsonStoreExt, KvStore};
use delivery_util::{CardId, DeliveryError, Result, UserId};
use std::sync::Arc;
use tracing::{debug, info};

use crate::keys;

pub struct CardStore {
    store: Arc<dyn KvStore>,
}

/// Digits of a card number, ignoring spaces and dashes
fn card_digits(number: &str) -> Result<String> {
    let digits: String = number
        .chars()
        .filter(|c| !matches!(c, ' ' | '-'))
        .collect();
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(DeliveryError::validation("card number must contain only digits"));
    }
    if !(13..=16).contains(&digits.len()) {
        return Err(DeliveryError::validation("card number must have 13 to 16 digits"));
    }
    Ok(digits)
}

/// `MM/YY`, valid through the end of that month
fn check_expiry(expiry: &str, now: DateTime<Local>) -> Result<()> {
    let invalid = || DeliveryError::validation("expiry must be MM/YY");
    let (mm, yy) = expiry.trim().split_once('/').ok_or_else(invalid)?;
    if mm.len() != 2 || yy.len() != 2 {
        return Err(invalid());
    }
    let month: u32 = mm.parse().map_err(|_| invalid())?;
    let year: i32 = yy.parse().map_err(|_| invalid())?;
    if !(1..=12).contains(&month) {
        return Err(invalid());
    }

    if (2000 + year, month) < (now.year(), now.month()) {
        return Err(DeliveryError::validation("card is expired"));
    }
    Ok(())
}

fn check_cvv(cvv: &str) -> Result<()> {
    let cvv = cvv.trim();
    if !(3..=4).contains(&cvv.len()) || !cvv.chars().all(|c| c.is_ascii_digit()) {
        return Err(DeliveryError::validation("CVV must have 3 or 4 digits"));
    }
    Ok(())
}

/// Make `preferred` (or the current default, or the first card) the only
/// default among the user's cards
fn normalize_defaults(cards: &mut [SavedCard], user_id: &UserId, preferred: Option<&CardId>) {
    let target = preferred.cloned().or_else(|| {
        let mut owned = cards.iter().filter(|c| &c.user_id == user_id);
        owned
            .clone()
            .find(|c| c.is_default)
            .or_else(|| owned.next())
            .map(|c| c.id.clone())
    });

    for card in cards.iter_mut().filter(|c| &c.user_id == user_id) {
        card.is_default = Some(&card.id) == target.as_ref();
    }
}

fn not_found(card_id: &CardId) -> DeliveryError {
    DeliveryError::not_found(format!("card {card_id} for this user"))
}

impl CardStore {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    fn all(&self) -> Result<Vec<SavedCard>> {
        Ok(self.store.load_or_default(keys::CARDS)?)
    }

    /// Validate and store a new card. The first card of a user is always
    /// the default.
    pub fn save(&self, user_id: &UserId, card: NewCard) -> Result<SavedCard> {
        let holder = card.holder.trim().to_uppercase();
        if holder.is_empty() {
            return Err(DeliveryError::validation("card holder is required"));
        }
        let digits = card_digits(&card.number)?;
        check_cvv(&card.cvv)?;
        check_expiry(&card.expiry, delivery_util::now())?;

        let brand = CardBrand::detect(&digits);
        let saved = SavedCard {
            id: CardId::generate(),
            number: mask_card_number(&digits),
            last_four: digits[digits.len() - 4..].to_string(),
            holder,
            brand,
            is_default: card.is_default,
            token: None,
            user_id: user_id.clone(),
        };

        let saved = self.store.modify(keys::CARDS, |cards: &mut Vec<SavedCard>| {
            cards.push(saved.clone());
            let preferred = saved.is_default.then_some(&saved.id);
            normalize_defaults(cards, user_id, preferred);
            cards
                .iter()
                .find(|c| c.id == saved.id)
                .cloned()
                .ok_or_else(|| not_found(&saved.id))
        })?;

        info!(user_id = %user_id, card_id = %saved.id, brand = brand.as_str(), "Card saved");
        Ok(saved)
    }

    pub fn for_user(&self, user_id: &UserId) -> Result<Vec<SavedCard>> {
        Ok(self
            .all()?
            .into_iter()
            .filter(|c| &c.user_id == user_id)
            .collect())
    }

    pub fn default_for_user(&self, user_id: &UserId) -> Result<Option<SavedCard>> {
        Ok(self.for_user(user_id)?.into_iter().find(|c| c.is_default))
    }

    /// A card, only if it belongs to the user
    pub fn get(&self, card_id: &CardId, user_id: &UserId) -> Result<Option<SavedCard>> {
        Ok(self
            .all()?
            .into_iter()
            .find(|c| &c.id == card_id && &c.user_id == user_id))
    }

    pub fn set_default(&self, card_id: &CardId, user_id: &UserId) -> Result<()> {
        self.store.modify(keys::CARDS, |cards: &mut Vec<SavedCard>| {
            if !cards.iter().any(|c| &c.id == card_id && &c.user_id == user_id) {
                return Err(not_found(card_id));
            }
            normalize_defaults(cards, user_id, Some(card_id));
            Ok(())
        })?;
        debug!(user_id = %user_id, card_id = %card_id, "Default card set");
        Ok(())
    }

    /// Edit holder, token or default flag. Clearing the default flag hands
    /// it to another card; a user's only card stays default.
    pub fn update(&self, card_id: &CardId, user_id: &UserId, update: CardUpdate) -> Result<SavedCard> {
        self.store.modify(keys::CARDS, |cards: &mut Vec<SavedCard>| {
            let card = cards
                .iter_mut()
                .find(|c| &c.id == card_id && &c.user_id == user_id)
                .ok_or_else(|| not_found(card_id))?;

            if let Some(holder) = update.holder {
                let holder = holder.trim().to_uppercase();
                if holder.is_empty() {
                    return Err(DeliveryError::validation("card holder is required"));
                }
                card.holder = holder;
            }
            if update.token.is_some() {
                card.token = update.token;
            }

            match update.is_default {
                Some(true) => normalize_defaults(cards, user_id, Some(card_id)),
                Some(false) => {
                    card.is_default = false;
                    let other = cards
                        .iter()
                        .find(|c| &c.user_id == user_id && &c.id != card_id)
                        .map(|c| c.id.clone());
                    normalize_defaults(cards, user_id, Some(other.as_ref().unwrap_or(card_id)));
                }
                None => normalize_defaults(cards, user_id, None),
            }

            cards
                .iter()
                .find(|c| &c.id == card_id)
                .cloned()
                .ok_or_else(|| not_found(card_id))
        })
    }

    /// Remove a card. If it was the default, the user's first remaining
    /// card takes over.
    pub fn remove(&self, card_id: &CardId, user_id: &UserId) -> Result<()> {
        self.store.modify(keys::CARDS, |cards: &mut Vec<SavedCard>| {
            let before = cards.len();
            cards.retain(|c| !(&c.id == card_id && &c.user_id == user_id));
            if cards.len() == before {
                return Err(not_found(card_id));
            }
            normalize_defaults(cards, user_id, None);
            Ok(())
        })?;
        info!(user_id = %user_id, card_id = %card_id, "Card removed");
        Ok(())
    }

    /// Returns the number of cards removed
    pub fn delete_all_for_user(&self, user_id: &UserId) -> Result<usize> {
        let removed = self.store.modify(keys::CARDS, |cards: &mut Vec<SavedCard>| {
            let before = cards.len();
            cards.retain(|c| &c.user_id != user_id);
            Ok::<_, DeliveryError>(before - cards.len())
        })?;
        info!(user_id = %user_id, removed, "User cards deleted");
        Ok(removed)
    }
}
