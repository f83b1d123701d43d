//! # Vehicle Record Mapper
//!
//! Maps a raw catalog listing into the neutral [`CanonicalRecord`] the sync
//! engine persists. Field extraction is tolerant: any optional block the API
//! omits is simply absent from the output. Incomplete location data is
//! skipped with a warning rather than failing the record.

use bridge_traits::{
    error::{BridgeError, Result},
    CanonicalRecord, MediaCandidate, MediaFormatUrls, RecordMapper, TaxonomyAssignment,
    VolatilityField,
};
use std::collections::BTreeMap;
use tracing::warn;

use crate::types::{FormatSizes, ListingDetail};

/// The fixed field subset compared for change detection, with the labels
/// used in item change logs.
const VOLATILITY_FIELDS: &[VolatilityField] = &[
    VolatilityField {
        name: "title",
        label: "Title",
    },
    VolatilityField {
        name: "price",
        label: "Price",
    },
    VolatilityField {
        name: "mileage",
        label: "Mileage",
    },
    VolatilityField {
        name: "engine-power",
        label: "Engine Power",
    },
    VolatilityField {
        name: "fuel-consumption",
        label: "Fuel Consumption",
    },
    VolatilityField {
        name: "changed-at",
        label: "Last Updated",
    },
];

/// Maps vehicle catalog listings to canonical records.
#[derive(Debug, Default)]
pub struct VehicleMapper;

impl VehicleMapper {
    pub fn new() -> Self {
        Self
    }

    fn build_title(listing: &ListingDetail) -> String {
        if let Some(title) = listing
            .details
            .ad_product
            .as_ref()
            .and_then(|ad| ad.title.as_deref())
        {
            if !title.trim().is_empty() {
                return title.trim().to_string();
            }
        }

        let classification = listing
            .details
            .vehicle
            .as_ref()
            .and_then(|v| v.classification.as_ref());

        let make = classification
            .and_then(|c| c.make.as_ref())
            .and_then(|m| m.formatted.clone())
            .unwrap_or_default();
        let model = classification
            .and_then(|c| c.model.as_ref())
            .and_then(|m| m.formatted.clone())
            .unwrap_or_default();
        let year = classification
            .and_then(|c| c.model_year)
            .map(|y| y.to_string())
            .unwrap_or_default();

        format!("{} {} {}", make, model, year).trim().to_string()
    }

    fn media_candidates(listing: &ListingDetail) -> Vec<MediaCandidate> {
        let Some(media) = listing.details.media.as_ref() else {
            return Vec::new();
        };

        media
            .images
            .iter()
            .map(|image| {
                let formats = image.formats.clone().unwrap_or_default();
                MediaCandidate {
                    webp: convert_sizes(formats.webp),
                    jpg: convert_sizes(formats.jpg),
                }
            })
            .collect()
    }
}

fn convert_sizes(sizes: Option<FormatSizes>) -> MediaFormatUrls {
    let sizes = sizes.unwrap_or_default();
    MediaFormatUrls {
        size_640x480: sizes.size_640x480,
        size_800x600: sizes.size_800x600,
        size_1280x960: sizes.size_1280x960,
    }
}

fn insert_if<V: ToString>(fields: &mut BTreeMap<String, String>, name: &str, value: Option<V>) {
    if let Some(value) = value {
        let rendered = value.to_string();
        if !rendered.is_empty() {
            fields.insert(name.to_string(), rendered);
        }
    }
}

impl RecordMapper for VehicleMapper {
    fn map(&self, raw: &serde_json::Value) -> Result<CanonicalRecord> {
        let listing: ListingDetail = serde_json::from_value(raw.clone())
            .map_err(|e| BridgeError::OperationFailed(format!("unmappable listing record: {}", e)))?;

        if listing.id.is_empty() {
            return Err(BridgeError::OperationFailed(
                "listing record is missing its identifier".to_string(),
            ));
        }

        let details = &listing.details;
        let vehicle = details.vehicle.as_ref();

        let mut fields = BTreeMap::new();
        let mut taxonomies = Vec::new();

        let classification = vehicle.and_then(|v| v.classification.as_ref());
        insert_if(
            &mut fields,
            "make",
            classification
                .and_then(|c| c.make.as_ref())
                .and_then(|m| m.raw_string()),
        );
        insert_if(
            &mut fields,
            "model",
            classification
                .and_then(|c| c.model.as_ref())
                .and_then(|m| m.raw_string()),
        );
        insert_if(
            &mut fields,
            "model-year",
            classification.and_then(|c| c.model_year),
        );

        let condition = vehicle.and_then(|v| v.condition.as_ref());
        insert_if(
            &mut fields,
            "mileage",
            condition
                .and_then(|c| c.mileage_in_km.as_ref())
                .and_then(|m| m.raw_u64()),
        );
        insert_if(
            &mut fields,
            "first-registered",
            condition
                .and_then(|c| c.first_registration_date.as_ref())
                .and_then(|d| d.raw_string()),
        );

        let engine = vehicle.and_then(|v| v.engine.as_ref());
        insert_if(
            &mut fields,
            "engine-displacement",
            engine
                .and_then(|e| e.engine_displacement_in_ccm.as_ref())
                .and_then(|d| d.raw_u64()),
        );
        insert_if(
            &mut fields,
            "engine-power",
            engine
                .and_then(|e| e.power.as_ref())
                .and_then(|p| p.hp.as_ref())
                .and_then(|hp| hp.raw_u64()),
        );
        insert_if(
            &mut fields,
            "transmission",
            engine
                .and_then(|e| e.transmission_type.as_ref())
                .and_then(|t| t.raw_string()),
        );

        let fuels = vehicle.and_then(|v| v.fuels.as_ref());
        insert_if(
            &mut fields,
            "fuel",
            fuels
                .and_then(|f| f.fuel_category.as_ref())
                .and_then(|c| c.raw_string()),
        );
        insert_if(
            &mut fields,
            "fuel-consumption",
            fuels
                .and_then(|f| f.primary.as_ref())
                .and_then(|p| p.consumption.as_ref())
                .and_then(|c| c.combined.as_ref())
                .and_then(|v| v.raw_string()),
        );

        insert_if(
            &mut fields,
            "vin",
            vehicle
                .and_then(|v| v.identifier.as_ref())
                .and_then(|i| i.vin.clone()),
        );

        let price = details.prices.as_ref().and_then(|p| p.public.as_ref());
        insert_if(
            &mut fields,
            "price",
            price
                .and_then(|p| p.amount_in_eur.as_ref())
                .and_then(|a| a.raw_f64()),
        );
        insert_if(
            &mut fields,
            "net-price",
            price
                .and_then(|p| p.net_amount_in_eur.as_ref())
                .and_then(|a| a.raw_f64()),
        );
        insert_if(&mut fields, "vat-rate", price.and_then(|p| p.vat_rate));

        // Location fields are all-or-nothing: a partial address is useless
        // downstream, so an incomplete block is skipped with a warning and
        // the record still succeeds.
        if let Some(location) = details.location.as_ref() {
            match (
                location.country_code.as_deref(),
                location.zip.as_deref(),
                location.city.as_deref(),
            ) {
                (Some(country), Some(zip), Some(city)) => {
                    fields.insert("location-country".to_string(), country.to_string());
                    fields.insert("location-zip".to_string(), zip.to_string());
                    fields.insert("location-city".to_string(), city.to_string());
                    insert_if(&mut fields, "location-street", location.street.clone());
                }
                _ => warn!(
                    listing_id = %listing.id,
                    "Incomplete location data; skipping location fields"
                ),
            }
        }

        if let Some(publication) = details.publication.as_ref() {
            insert_if(&mut fields, "changed-at", publication.changed_timestamp.clone());
            insert_if(&mut fields, "created-at", publication.created_timestamp.clone());
        }

        if let Some(make) = fields.get("make") {
            taxonomies.push(TaxonomyAssignment {
                taxonomy: "make".to_string(),
                term: make.clone(),
            });
        }
        if let Some(body) = vehicle
            .and_then(|v| v.body_type.as_ref())
            .and_then(|b| b.raw_string())
        {
            fields.insert("body-type".to_string(), body.clone());
            taxonomies.push(TaxonomyAssignment {
                taxonomy: "body-type".to_string(),
                term: body,
            });
        }
        if let Some(fuel) = fields.get("fuel") {
            taxonomies.push(TaxonomyAssignment {
                taxonomy: "fuel".to_string(),
                term: fuel.clone(),
            });
        }
        if let Some(condition) = vehicle
            .and_then(|v| v.legal_categories.first())
            .and_then(|c| c.raw_string())
        {
            fields.insert("condition".to_string(), condition.clone());
            taxonomies.push(TaxonomyAssignment {
                taxonomy: "condition".to_string(),
                term: condition,
            });
        }

        Ok(CanonicalRecord {
            external_id: listing.id.clone(),
            title: Self::build_title(&listing),
            body: details.description.clone().unwrap_or_default(),
            fields,
            taxonomies,
            media: Self::media_candidates(&listing),
        })
    }

    fn volatility_fields(&self) -> &[VolatilityField] {
        VOLATILITY_FIELDS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_listing() -> serde_json::Value {
        json!({
            "id": "guid-001",
            "details": {
                "description": "Well maintained, one owner.",
                "vehicle": {
                    "bodyType": { "raw": "estate", "formatted": "Estate" },
                    "legalCategories": [ { "raw": "used", "formatted": "Used" } ],
                    "classification": {
                        "make": { "raw": "volvo", "formatted": "Volvo" },
                        "model": { "raw": "v60", "formatted": "V60" },
                        "modelYear": 2021
                    },
                    "condition": {
                        "mileageInKm": { "raw": 48000, "formatted": "48,000 km" }
                    },
                    "engine": {
                        "power": { "hp": { "raw": 197 }, "kw": { "raw": 145 } },
                        "engineDisplacementInCCM": { "raw": 1969 },
                        "transmissionType": { "raw": "automatic" }
                    },
                    "fuels": {
                        "fuelCategory": { "raw": "diesel" },
                        "primary": { "consumption": { "combined": { "raw": "4.5" } } }
                    },
                    "identifier": { "vin": "YV1ZW25TDM1234567" }
                },
                "prices": {
                    "public": {
                        "amountInEUR": { "raw": 28900.0 },
                        "netAmountInEUR": { "raw": 24285.71 },
                        "vatRate": 19.0
                    }
                },
                "media": {
                    "images": [
                        { "formats": {
                            "webp": { "size1280x960": "https://img/1.webp" },
                            "jpg": { "size1280x960": "https://img/1.jpg" }
                        } }
                    ]
                },
                "location": {
                    "countryCode": "DE", "zip": "10115", "city": "Berlin", "street": "Invalidenstr. 1"
                },
                "adProduct": { "title": "Volvo V60 D4 Momentum" },
                "publication": {
                    "changedTimestamp": "2024-05-01T10:00:00Z",
                    "createdTimestamp": "2024-01-15T08:30:00Z"
                }
            }
        })
    }

    #[test]
    fn test_maps_complete_listing() {
        let mapper = VehicleMapper::new();
        let record = mapper.map(&sample_listing()).unwrap();

        assert_eq!(record.external_id, "guid-001");
        assert_eq!(record.title, "Volvo V60 D4 Momentum");
        assert_eq!(record.fields.get("price").map(String::as_str), Some("28900"));
        assert_eq!(record.fields.get("mileage").map(String::as_str), Some("48000"));
        assert_eq!(
            record.fields.get("engine-power").map(String::as_str),
            Some("197")
        );
        assert_eq!(record.fields.get("location-city").map(String::as_str), Some("Berlin"));
        assert_eq!(record.media.len(), 1);
        assert_eq!(
            record.media[0].webp.size_1280x960.as_deref(),
            Some("https://img/1.webp")
        );

        let taxonomies: Vec<_> = record
            .taxonomies
            .iter()
            .map(|t| t.taxonomy.as_str())
            .collect();
        assert_eq!(taxonomies, vec!["make", "body-type", "fuel", "condition"]);
    }

    #[test]
    fn test_title_falls_back_to_classification() {
        let mut raw = sample_listing();
        raw["details"]["adProduct"] = json!({});

        let record = VehicleMapper::new().map(&raw).unwrap();
        assert_eq!(record.title, "Volvo V60 2021");
    }

    #[test]
    fn test_incomplete_location_skipped() {
        let mut raw = sample_listing();
        raw["details"]["location"] = json!({ "countryCode": "DE", "city": "Berlin" });

        let record = VehicleMapper::new().map(&raw).unwrap();
        assert!(!record.fields.contains_key("location-city"));
        assert!(!record.fields.contains_key("location-country"));
        // The record as a whole still maps.
        assert_eq!(record.external_id, "guid-001");
    }

    #[test]
    fn test_missing_identifier_rejected() {
        let raw = json!({ "id": "", "details": {} });
        assert!(VehicleMapper::new().map(&raw).is_err());
    }

    #[test]
    fn test_volatility_fields_cover_change_detection_set() {
        let mapper = VehicleMapper::new();
        let names: Vec<_> = mapper.volatility_fields().iter().map(|f| f.name).collect();
        assert_eq!(
            names,
            vec![
                "title",
                "price",
                "mileage",
                "engine-power",
                "fuel-consumption",
                "changed-at"
            ]
        );
    }
}
