//! Wire types for the vehicle catalog GraphQL API
//!
//! Every field is optional or defaulted except record identifiers: the API
//! omits sub-structures freely, and a missing optional block must never fail
//! deserialization of the record around it.

use serde::Deserialize;

// ============================================================================
// Response envelope
// ============================================================================

/// Top-level GraphQL response envelope.
#[derive(Debug, Deserialize)]
pub struct GraphqlResponse {
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    #[serde(default)]
    pub errors: Option<Vec<GraphqlError>>,
}

#[derive(Debug, Deserialize)]
pub struct GraphqlError {
    pub message: String,
}

// ============================================================================
// Pagination / ID collection
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMetadata {
    #[serde(default)]
    pub current_page: u32,
    pub total_items: u64,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub page_size: u32,
}

/// `data` payload of the total-count query.
#[derive(Debug, Deserialize)]
pub struct TotalCountData {
    pub listings: MetadataEnvelope,
}

#[derive(Debug, Deserialize)]
pub struct MetadataEnvelope {
    pub metadata: PageMetadata,
}

/// `data` payload of the lightweight ids-per-page query.
#[derive(Debug, Deserialize)]
pub struct IdsPageData {
    pub search: SearchEnvelope,
}

#[derive(Debug, Deserialize)]
pub struct SearchEnvelope {
    pub listings: ListingsPage,
}

#[derive(Debug, Deserialize)]
pub struct ListingsPage {
    #[serde(default)]
    pub listings: Vec<ListingSummary>,
    pub metadata: PageMetadata,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListingSummary {
    pub id: String,
    #[serde(default)]
    pub details: Option<SummaryDetails>,
}

impl ListingSummary {
    /// Remote change timestamp, when the summary carries one.
    pub fn changed_hint(&self) -> Option<String> {
        self.details
            .as_ref()
            .and_then(|d| d.publication.as_ref())
            .and_then(|p| p.changed_timestamp.clone())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SummaryDetails {
    #[serde(default)]
    pub publication: Option<Publication>,
}

/// `data` payload of the single-listing query. `listing` is null when the
/// requested identifier does not exist remotely.
#[derive(Debug, Deserialize)]
pub struct SingleListingData {
    #[serde(default)]
    pub listing: Option<serde_json::Value>,
}

// ============================================================================
// Full listing detail (consumed by the record mapper)
// ============================================================================

/// A `{ raw, formatted }` value pair as served by the API.
///
/// `raw` arrives as either a JSON number or a string depending on the field,
/// so it is kept loose and narrowed through the accessors.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawFormatted {
    #[serde(default)]
    pub raw: Option<serde_json::Value>,
    #[serde(default)]
    pub formatted: Option<String>,
}

impl RawFormatted {
    /// Raw value rendered as a plain string, if present.
    pub fn raw_string(&self) -> Option<String> {
        match self.raw.as_ref()? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn raw_f64(&self) -> Option<f64> {
        match self.raw.as_ref()? {
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn raw_u64(&self) -> Option<u64> {
        self.raw_f64().map(|v| v.max(0.0) as u64)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ListingDetail {
    pub id: String,
    pub details: ListingDetails,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListingDetails {
    pub description: Option<String>,
    pub vehicle: Option<Vehicle>,
    pub prices: Option<Prices>,
    pub media: Option<MediaBlock>,
    pub location: Option<Location>,
    pub ad_product: Option<AdProduct>,
    pub publication: Option<Publication>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Vehicle {
    pub body_type: Option<RawFormatted>,
    pub legal_categories: Vec<RawFormatted>,
    pub classification: Option<Classification>,
    pub condition: Option<Condition>,
    pub engine: Option<Engine>,
    pub fuels: Option<Fuels>,
    pub identifier: Option<VehicleIdentifier>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Classification {
    pub make: Option<RawFormatted>,
    pub model: Option<RawFormatted>,
    pub model_year: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Condition {
    pub mileage_in_km: Option<RawFormatted>,
    pub first_registration_date: Option<RawFormatted>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Engine {
    pub power: Option<Power>,
    #[serde(rename = "engineDisplacementInCCM")]
    pub engine_displacement_in_ccm: Option<RawFormatted>,
    pub transmission_type: Option<RawFormatted>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Power {
    pub hp: Option<RawFormatted>,
    pub kw: Option<RawFormatted>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Fuels {
    pub fuel_category: Option<RawFormatted>,
    pub primary: Option<PrimaryFuel>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PrimaryFuel {
    pub consumption: Option<Consumption>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Consumption {
    pub combined: Option<RawFormatted>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VehicleIdentifier {
    pub vin: Option<String>,
    pub license_plate: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Prices {
    pub public: Option<PriceBlock>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PriceBlock {
    #[serde(rename = "amountInEUR")]
    pub amount_in_eur: Option<RawFormatted>,
    #[serde(rename = "netAmountInEUR")]
    pub net_amount_in_eur: Option<RawFormatted>,
    pub vat_rate: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MediaBlock {
    pub images: Vec<ListingImage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ListingImage {
    pub formats: Option<ImageFormats>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ImageFormats {
    pub webp: Option<FormatSizes>,
    pub jpg: Option<FormatSizes>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FormatSizes {
    #[serde(rename = "size640x480")]
    pub size_640x480: Option<String>,
    #[serde(rename = "size800x600")]
    pub size_800x600: Option<String>,
    #[serde(rename = "size1280x960")]
    pub size_1280x960: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Location {
    pub country_code: Option<String>,
    pub zip: Option<String>,
    pub city: Option<String>,
    pub street: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AdProduct {
    pub title: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Publication {
    pub changed_timestamp: Option<String>,
    pub created_timestamp: Option<String>,
}
