//! Remote data sources for the delivery client
//!
//! - [`MealClient`]: the public meal catalog (TheMealDB)
//! - [`GeocoderChain`]: coordinate to address lookup with fallbacks

mod geocoding;
mod meals;

#[cfg(test)]
mod stub;

pub use geocoding::*;
pub use meals::*;

use delivery_util::DeliveryError;
use thiserror::Error;

/// Errors talking to a remote API
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Decode error: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for CatalogError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            CatalogError::Decode(e.to_string())
        } else {
            CatalogError::Http(e.to_string())
        }
    }
}

impl From<CatalogError> for DeliveryError {
    fn from(e: CatalogError) -> Self {
        DeliveryError::Internal(e.to_string())
    }
}

pub type CatalogResult<T> = Result<T, CatalogError>;

/// Fail on non-2xx and decode the JSON body otherwise
pub(crate) async fn check_response_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> CatalogResult<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(CatalogError::Status {
            status: status.as_u16(),
            body,
        });
    }

    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| CatalogError::Decode(e.to_string()))
}
