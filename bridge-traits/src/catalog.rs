//! Canonical Catalog Record Model
//!
//! The neutral shape a remote catalog record is mapped into before it
//! touches the content repository. Concrete catalog crates implement
//! [`RecordMapper`] for their wire format; the sync engine only ever sees
//! [`CanonicalRecord`]s.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::Result;

/// A taxonomy term to assign to the mapped record (e.g. make, body type).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxonomyAssignment {
    pub taxonomy: String,
    pub term: String,
}

/// URLs for one image format at the resolutions the catalog serves.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaFormatUrls {
    pub size_640x480: Option<String>,
    pub size_800x600: Option<String>,
    pub size_1280x960: Option<String>,
}

/// One candidate image with its per-format variants, in gallery order.
///
/// Which single URL gets fetched is decided later by the media queue's
/// format preference ladder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaCandidate {
    pub webp: MediaFormatUrls,
    pub jpg: MediaFormatUrls,
}

/// Mapper output: a remote record reduced to what the content repository
/// stores. Transient; produced per fetch and never persisted as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    /// Stable identifier assigned by the remote catalog.
    pub external_id: String,
    pub title: String,
    pub body: String,
    /// Flat name→value field map (price, mileage, ...).
    pub fields: BTreeMap<String, String>,
    pub taxonomies: Vec<TaxonomyAssignment>,
    /// Candidate images in gallery order.
    pub media: Vec<MediaCandidate>,
}

/// One member of the fixed field subset compared for change detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolatilityField {
    /// Field-map key (`title` refers to the record title).
    pub name: &'static str,
    /// Human label used in change logs.
    pub label: &'static str,
}

/// Maps a raw remote record into a [`CanonicalRecord`].
///
/// Implementations own the catalog-specific field extraction and declare
/// which fields participate in change detection.
pub trait RecordMapper: Send + Sync {
    /// Map one raw record. Missing optional sub-structures must not fail the
    /// record; required identity fields missing is an error.
    fn map(&self, raw: &serde_json::Value) -> Result<CanonicalRecord>;

    /// The fixed field subset whose old/new values produce a change-set.
    fn volatility_fields(&self) -> &[VolatilityField];
}
