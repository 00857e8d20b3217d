//! Reverse geocoding: coordinates to a postal address
//!
//! Each provider is a [`ReverseGeocoder`] tier. [`GeocoderChain`] asks the
//! tiers in order and settles for placeholders when none answers, so a
//! lookup always yields an address the user can then edit.

use async_trait::async_trait;
use delivery_api::Location;
use delivery_config::GeocodingSettings;
use delivery_util::UserId;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::{CatalogError, CatalogResult, check_response_json};

pub const ADDRESS_PLACEHOLDER: &str = "Address not found";
pub const CITY_PLACEHOLDER: &str = "City not found";
pub const STATE_PLACEHOLDER: &str = "State not found";
pub const ZIP_PLACEHOLDER: &str = "00000-000";

/// Address fields as reported by one provider; any of them may be missing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressParts {
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
}

impl AddressParts {
    pub fn is_empty(&self) -> bool {
        self.street.is_none() && self.city.is_none() && self.state.is_none() && self.zip_code.is_none()
    }
}

/// Address with every field filled in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeocodedAddress {
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
}

impl GeocodedAddress {
    pub fn from_parts(parts: AddressParts) -> Self {
        Self {
            address: parts.street.unwrap_or_else(|| ADDRESS_PLACEHOLDER.to_string()),
            city: parts.city.unwrap_or_else(|| CITY_PLACEHOLDER.to_string()),
            state: parts.state.unwrap_or_else(|| STATE_PLACEHOLDER.to_string()),
            zip_code: parts.zip_code.unwrap_or_else(|| ZIP_PLACEHOLDER.to_string()),
        }
    }

    pub fn placeholder() -> Self {
        Self::from_parts(AddressParts::default())
    }

    /// Turn the lookup into a location record for `user_id`
    pub fn into_location(self, latitude: f64, longitude: f64, user_id: UserId) -> Location {
        Location {
            latitude,
            longitude,
            address: self.address,
            city: self.city,
            state: self.state,
            zip_code: self.zip_code,
            complement: String::new(),
            reference: String::new(),
            user_id,
        }
    }
}

/// One reverse-geocoding provider
#[async_trait]
pub trait ReverseGeocoder: Send + Sync {
    /// Provider name for logs
    fn name(&self) -> &str;

    async fn reverse(&self, latitude: f64, longitude: f64) -> CatalogResult<AddressParts>;
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// `"<road> <number>"`, or `None` when both are missing
fn street_line(road: Option<String>, number: Option<String>) -> Option<String> {
    let line = format!(
        "{} {}",
        road.unwrap_or_default(),
        number.unwrap_or_default()
    );
    non_blank(Some(line))
}

#[derive(Debug, Deserialize)]
struct PostmonResponse {
    address: Option<String>,
    city: Option<String>,
    state: Option<String>,
    zipcode: Option<String>,
}

impl From<PostmonResponse> for AddressParts {
    fn from(r: PostmonResponse) -> Self {
        Self {
            street: non_blank(r.address),
            city: non_blank(r.city),
            state: non_blank(r.state),
            zip_code: non_blank(r.zipcode),
        }
    }
}

/// Postmon: `GET {base}/{lat}/{lon}`
#[derive(Debug, Clone)]
pub struct PostmonGeocoder {
    http: reqwest::Client,
    base_url: String,
}

impl PostmonGeocoder {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ReverseGeocoder for PostmonGeocoder {
    fn name(&self) -> &str {
        "postmon"
    }

    async fn reverse(&self, latitude: f64, longitude: f64) -> CatalogResult<AddressParts> {
        let url = format!("{}/{}/{}", self.base_url, latitude, longitude);
        let response = self.http.get(&url).send().await?;
        let body: PostmonResponse = check_response_json(response).await?;
        Ok(body.into())
    }
}

#[derive(Debug, Default, Deserialize)]
struct NominatimAddress {
    road: Option<String>,
    house_number: Option<String>,
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    state: Option<String>,
    postcode: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NominatimResponse {
    #[serde(default)]
    address: NominatimAddress,
}

impl From<NominatimResponse> for AddressParts {
    fn from(r: NominatimResponse) -> Self {
        let a = r.address;
        Self {
            street: street_line(a.road, a.house_number),
            city: non_blank(a.city)
                .or_else(|| non_blank(a.town))
                .or_else(|| non_blank(a.village)),
            state: non_blank(a.state),
            zip_code: non_blank(a.postcode),
        }
    }
}

/// OpenStreetMap Nominatim reverse endpoint
///
/// Nominatim rejects requests without an identifying User-Agent.
#[derive(Debug, Clone)]
pub struct NominatimGeocoder {
    http: reqwest::Client,
    base_url: String,
    accept_language: String,
}

impl NominatimGeocoder {
    pub fn new(
        base_url: impl Into<String>,
        accept_language: impl Into<String>,
        user_agent: &str,
    ) -> CatalogResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| CatalogError::Http(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.into(),
            accept_language: accept_language.into(),
        })
    }
}

#[async_trait]
impl ReverseGeocoder for NominatimGeocoder {
    fn name(&self) -> &str {
        "nominatim"
    }

    async fn reverse(&self, latitude: f64, longitude: f64) -> CatalogResult<AddressParts> {
        let lat = latitude.to_string();
        let lon = longitude.to_string();
        let response = self
            .http
            .get(&self.base_url)
            .query(&[
                ("format", "json"),
                ("lat", lat.as_str()),
                ("lon", lon.as_str()),
                ("accept-language", self.accept_language.as_str()),
            ])
            .send()
            .await?;
        let body: NominatimResponse = check_response_json(response).await?;
        Ok(body.into())
    }
}

/// Ordered fallback over geocoding tiers
#[derive(Clone, Default)]
pub struct GeocoderChain {
    tiers: Vec<Arc<dyn ReverseGeocoder>>,
}

impl GeocoderChain {
    pub fn new(tiers: Vec<Arc<dyn ReverseGeocoder>>) -> Self {
        Self { tiers }
    }

    /// Postmon then Nominatim, as configured
    pub fn from_settings(settings: &GeocodingSettings) -> CatalogResult<Self> {
        let tiers: Vec<Arc<dyn ReverseGeocoder>> = vec![
            Arc::new(PostmonGeocoder::new(settings.postmon_url.clone())),
            Arc::new(NominatimGeocoder::new(
                settings.nominatim_url.clone(),
                settings.accept_language.clone(),
                &settings.user_agent,
            )?),
        ];
        Ok(Self::new(tiers))
    }

    /// Put a host-supplied geocoder (the device's own) ahead of the HTTP tiers
    pub fn with_device(mut self, device: Arc<dyn ReverseGeocoder>) -> Self {
        self.tiers.insert(0, device);
        self
    }

    pub fn tier_names(&self) -> Vec<&str> {
        self.tiers.iter().map(|t| t.name()).collect()
    }

    /// First tier that answers with at least one field wins; missing
    /// fields become placeholders. Never fails.
    pub async fn reverse(&self, latitude: f64, longitude: f64) -> GeocodedAddress {
        for tier in &self.tiers {
            match tier.reverse(latitude, longitude).await {
                Ok(parts) if !parts.is_empty() => {
                    debug!(tier = tier.name(), latitude, longitude, "Reverse geocoded");
                    return GeocodedAddress::from_parts(parts);
                }
                Ok(_) => {
                    debug!(tier = tier.name(), "Geocoder returned no address");
                }
                Err(e) => {
                    warn!(tier = tier.name(), error = %e, "Geocoder failed, trying next");
                }
            }
        }

        warn!(latitude, longitude, "No geocoder resolved the address");
        GeocodedAddress::placeholder()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stub::StubServer;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixed {
        name: &'static str,
        result: Option<AddressParts>,
        calls: AtomicUsize,
    }

    impl Fixed {
        fn ok(name: &'static str, parts: AddressParts) -> Arc<Self> {
            Arc::new(Self {
                name,
                result: Some(parts),
                calls: AtomicUsize::new(0),
            })
        }

        fn failing(name: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                result: None,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl ReverseGeocoder for Fixed {
        fn name(&self) -> &str {
            self.name
        }

        async fn reverse(&self, _: f64, _: f64) -> CatalogResult<AddressParts> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result
                .clone()
                .ok_or_else(|| CatalogError::Http("connection refused".into()))
        }
    }

    fn city_only(city: &str) -> AddressParts {
        AddressParts {
            city: Some(city.into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn first_success_wins_and_gaps_are_filled() {
        let first = Fixed::failing("a");
        let second = Fixed::ok("b", city_only("Campinas"));
        let third = Fixed::ok("c", city_only("Santos"));
        let tiers: Vec<Arc<dyn ReverseGeocoder>> = vec![first.clone(), second, third.clone()];
        let chain = GeocoderChain::new(tiers);

        let address = chain.reverse(-22.9, -47.06).await;
        assert_eq!(address.city, "Campinas");
        assert_eq!(address.address, ADDRESS_PLACEHOLDER);
        assert_eq!(address.state, STATE_PLACEHOLDER);
        assert_eq!(address.zip_code, ZIP_PLACEHOLDER);

        assert_eq!(first.calls.load(Ordering::SeqCst), 1);
        assert_eq!(third.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_answer_falls_through() {
        let device = Fixed::ok("device", AddressParts::default());
        let http = Fixed::ok("http", city_only("Recife"));
        let chain = GeocoderChain::new(vec![http as Arc<dyn ReverseGeocoder>]).with_device(device.clone());

        assert_eq!(chain.tier_names(), vec!["device", "http"]);
        assert_eq!(chain.reverse(0.0, 0.0).await.city, "Recife");
        assert_eq!(device.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn all_failing_yields_placeholders() {
        let tiers: Vec<Arc<dyn ReverseGeocoder>> = vec![Fixed::failing("a"), Fixed::failing("b")];
        let chain = GeocoderChain::new(tiers);
        assert_eq!(chain.reverse(1.0, 2.0).await, GeocodedAddress::placeholder());
        assert_eq!(GeocoderChain::default().reverse(1.0, 2.0).await.zip_code, ZIP_PLACEHOLDER);
    }

    #[tokio::test]
    async fn postmon_parses_flat_body() {
        let server = StubServer::start(vec![(
            200,
            r#"{"address":"Avenida Paulista","city":"São Paulo","state":"SP","zipcode":"01310-100"}"#,
        )])
        .await;
        let geocoder = PostmonGeocoder::new(server.url());

        let parts = geocoder.reverse(-23.56, -46.65).await.unwrap();
        assert_eq!(parts.street.as_deref(), Some("Avenida Paulista"));
        assert_eq!(parts.zip_code.as_deref(), Some("01310-100"));
        assert!(server.requests()[0].starts_with("GET /-23.56/-46.65 "));
    }

    #[tokio::test]
    async fn nominatim_falls_back_to_town_and_joins_street() {
        let server = StubServer::start(vec![(
            200,
            r#"{"address":{"road":"Rua das Flores","house_number":"42","town":"Paraty","state":"Rio de Janeiro"}}"#,
        )])
        .await;
        let geocoder = NominatimGeocoder::new(server.url(), "pt-BR", "delivery-test/0.1").unwrap();

        let parts = geocoder.reverse(-23.2, -44.7).await.unwrap();
        assert_eq!(parts.street.as_deref(), Some("Rua das Flores 42"));
        assert_eq!(parts.city.as_deref(), Some("Paraty"));
        assert!(parts.zip_code.is_none());

        let head = &server.requests()[0];
        assert!(head.contains("format=json"));
        assert!(head.contains("accept-language=pt-BR"));
        assert!(head.to_lowercase().contains("user-agent: delivery-test/0.1"));
    }

    #[tokio::test]
    async fn http_error_moves_to_next_tier() {
        let postmon = StubServer::start(vec![(404, "not found")]).await;
        let nominatim = StubServer::start(vec![(
            200,
            r#"{"address":{"road":"Rua A","village":"Vila","postcode":"12345-000"}}"#,
        )])
        .await;

        let tiers: Vec<Arc<dyn ReverseGeocoder>> = vec![
            Arc::new(PostmonGeocoder::new(postmon.url())),
            Arc::new(NominatimGeocoder::new(nominatim.url(), "pt-BR", "t").unwrap()),
        ];
        let chain = GeocoderChain::new(tiers);

        let address = chain.reverse(-10.0, -40.0).await;
        assert_eq!(address.address, "Rua A");
        assert_eq!(address.city, "Vila");
        assert_eq!(address.zip_code, "12345-000");

        let location = address.into_location(-10.0, -40.0, UserId::new("u1"));
        assert_eq!(location.state, STATE_PLACEHOLDER);
        assert_eq!(location.user_id, UserId::new("u1"));
    }
}
