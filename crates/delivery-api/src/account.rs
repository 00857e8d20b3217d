//! Accounts, sessions, saved cards and addresses

use chrono::{DateTime, Local};
use delivery_util::{CardId, UserId};
use serde::{Deserialize, Serialize};

/// Stored user record
///
/// `password_hash` is an Argon2id PHC string. Lookups hand out
/// [`UserProfile`] instead so the hash never leaves the store layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub created_at: DateTime<Local>,
    pub password_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub img: Option<String>,
    /// Last address picked during checkout
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chosen_location: Option<Location>,
    /// Last card picked during checkout
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chosen_card: Option<SavedCard>,
}

impl User {
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
            created_at: self.created_at,
            img: self.img.clone(),
            chosen_location: self.chosen_location.clone(),
            chosen_card: self.chosen_card.clone(),
        }
    }
}

/// User as seen outside the store: everything but the credential
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub created_at: DateTime<Local>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub img: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chosen_location: Option<Location>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chosen_card: Option<SavedCard>,
}

/// Registration input
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub password: String,
    pub img: Option<String>,
}

/// Editable profile fields; `None` leaves the field untouched
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub img: Option<String>,
}

/// The single logged-in session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSession {
    pub user: UserProfile,
    pub token: String,
    pub login_date: DateTime<Local>,
    pub remember_user: bool,
}

/// Card network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardBrand {
    Visa,
    Mastercard,
    Elo,
    Amex,
}

/// BIN prefixes issued to Elo. Several overlap the Visa range, so they are
/// checked first.
const ELO_PREFIXES: &[&str] = &[
    "4011", "4312", "4389", "4514", "5041", "5066", "5090", "6277", "6362", "6363", "6504",
    "6505", "6516",
];

impl CardBrand {
    /// Detect the brand from a digits-only card number
    pub fn detect(number: &str) -> Self {
        if ELO_PREFIXES.iter().any(|p| number.starts_with(p)) {
            return CardBrand::Elo;
        }
        if number.starts_with('4') {
            return CardBrand::Visa;
        }
        if number.starts_with("34") || number.starts_with("37") {
            return CardBrand::Amex;
        }
        // 51-55 and 22-27 are Mastercard; unknown ranges are treated the same
        CardBrand::Mastercard
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CardBrand::Visa => "visa",
            CardBrand::Mastercard => "mastercard",
            CardBrand::Elo => "elo",
            CardBrand::Amex => "amex",
        }
    }
}

/// Stored payment card. Only the masked number is persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedCard {
    pub id: CardId,
    pub number: String,
    pub last_four: String,
    pub holder: String,
    pub brand: CardBrand,
    pub is_default: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub user_id: UserId,
}

/// Card entry form input
#[derive(Debug, Clone)]
pub struct NewCard {
    /// Card number; spaces are ignored
    pub number: String,
    pub holder: String,
    pub cvv: String,
    /// `MM/YY`
    pub expiry: String,
    pub is_default: bool,
}

/// Editable card fields
#[derive(Debug, Clone, Default)]
pub struct CardUpdate {
    pub holder: Option<String>,
    pub is_default: Option<bool>,
    pub token: Option<String>,
}

/// Mask a digits-only card number down to its last four digits
pub fn mask_card_number(digits: &str) -> String {
    let start = digits.len().saturating_sub(4);
    format!("**** **** **** {}", &digits[start..])
}

/// Saved delivery address
///
/// Identity is the coordinate pair; two addresses at the same point are
/// the same record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    #[serde(default)]
    pub complement: String,
    #[serde(default)]
    pub reference: String,
    pub user_id: UserId,
}

impl Location {
    pub fn same_point(&self, latitude: f64, longitude: f64) -> bool {
        self.latitude == latitude && self.longitude == longitude
    }
}
