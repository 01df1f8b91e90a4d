//! Data model and report type definitions
//!
//! Defines the data structures shared across the crate:
//! - **Input types**: the bundle/event shapes delivered by the external
//!   loader layer (camelCase JSON).
//! - **Report types**: the derived facet/series records handed to the
//!   external rendering layer.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Extractor Constants
// ============================================================================

/// Error source emitted when an input field loses focus; UI noise, not a
/// real page error.
pub const ERROR_SOURCE_FOCUS_LOSS: &str = "focus-loss";

/// Error source emitted when the error object carried no usable origin.
pub const ERROR_SOURCE_UNDEFINED: &str = "undefined error";

/// Substring marking errors raised by the vendor form-enhancer script.
pub const ERROR_SOURCE_ENHANCER_NOISE: &str = "enhancer";

/// Substring marking resource URLs that were redacted at collection time.
pub const REDACTION_MARKER: &str = "redacted";

/// Delimiter for missing-resource detail records. Chosen to never collide
/// with URL syntax.
pub const RESOURCE_DETAIL_DELIMITER: &str = "|||";

/// Vendor-specific form container id prefix used by selector matching.
pub const GUIDE_CONTAINER_MARKER: &str = "#guideContainer-";

/// Number of buckets produced by the equal-width histogram mode.
pub const EQUAL_WIDTH_BUCKETS: usize = 5;

// ============================================================================
// Input Types (from the bundle loader)
// ============================================================================

/// Categorical tag identifying what kind of event occurred.
///
/// Closed enumeration of the checkpoints the extractors dispatch on;
/// anything else collapses into `Other`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Checkpoint {
    Error,
    Click,
    Fill,
    Enter,
    Viewblock,
    Loadresource,
    Missingresource,
    #[serde(other)]
    Other,
}

/// One timestamped action within a bundle.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Event {
    /// Kind of event
    pub checkpoint: Checkpoint,
    /// Checkpoint-dependent origin (error origin, resource URL, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Checkpoint-dependent target (selector, status, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Milliseconds from page load to this event. Events are conceptually
    /// ordered by this field but arrive unsorted.
    #[serde(rename = "timeDelta", default)]
    pub time_delta: f64,
}

/// One recorded page-view session.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Bundle {
    /// Unique identifier
    pub id: String,
    /// Page host
    #[serde(default)]
    pub host: String,
    /// Page URL
    #[serde(default)]
    pub url: String,
    /// Session timestamp (ISO 8601)
    #[serde(default)]
    pub time: String,
    /// Timestamp truncated to the hour, UTC (ISO 8601)
    #[serde(rename = "timeSlot", default)]
    pub time_slot: String,
    /// Sampling extrapolation factor: how many real sessions this sampled
    /// bundle stands for. Always >= 1.
    #[serde(default = "default_weight")]
    pub weight: f64,
    /// Raw user-agent string
    #[serde(rename = "userAgent", default)]
    pub user_agent: String,
    /// Event timeline (not guaranteed sorted)
    #[serde(default)]
    pub events: Vec<Event>,
}

fn default_weight() -> f64 {
    1.0
}

/// One hour-grouped chunk of bundles as delivered by the loader layer.
#[derive(Clone, Debug, Deserialize)]
pub struct BundleGroup {
    /// Calendar date of the chunk (YYYY-MM-DD)
    pub date: String,
    /// Hour of day, when the chunk is hourly rather than daily
    #[serde(default)]
    pub hour: Option<u32>,
    /// Bundles recorded in this chunk
    #[serde(rename = "rumBundles", default)]
    pub rum_bundles: Vec<Bundle>,
}

// ============================================================================
// Selector Index Types (external form-metadata payload)
// ============================================================================

/// One form field's selector spelling and human label.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SelectorRow {
    /// Human label, may be empty
    #[serde(default)]
    pub label: String,
    /// DOM selector as recorded by the extraction job
    pub selector: String,
    /// Row kind ("label", "widget", ...)
    #[serde(default)]
    pub kind: String,
}

/// Selector-metadata payload for one page URL.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SelectorPayload {
    /// False when the extraction job failed for this URL
    #[serde(default)]
    pub ok: bool,
    /// Known form fields
    #[serde(default)]
    pub rows: Vec<SelectorRow>,
}

// ============================================================================
// Report Types (to the rendering layer)
// ============================================================================

/// Fixed percentile readouts materialized for export.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Percentiles {
    /// 50th percentile (median)
    pub p50: f64,
    /// 75th percentile
    pub p75: f64,
    /// 90th percentile
    pub p90: f64,
    /// 95th percentile
    pub p95: f64,
    /// 99th percentile
    pub p99: f64,
}

/// Aggregate readout of one series within one facet group (or of the whole
/// collection, for totals).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SeriesStats {
    /// Number of contributing values (unweighted)
    pub count: u64,
    /// Weighted sum of values
    pub sum: f64,
    /// Weighted mean (0 when no values contributed)
    pub mean: f64,
    /// Smallest contributing value (0 when empty)
    pub min: f64,
    /// Largest contributing value (0 when empty)
    pub max: f64,
    /// Weighted nearest-rank percentiles
    pub percentiles: Percentiles,
}

/// One facet group record: a derived key with its aggregate statistics.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FacetRecord {
    /// Group key
    pub value: String,
    /// Number of contributing bundles (unweighted)
    pub count: u64,
    /// Sum of contributing bundles' weights -- the extrapolated total used
    /// for all displayed percentages
    pub weight: f64,
    /// Per-series aggregates
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metrics: BTreeMap<String, SeriesStats>,
}

/// One histogram bucket.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HistogramBucket {
    /// Inclusive lower bound
    pub min: f64,
    /// Upper bound; `f64::INFINITY` for the open tail bucket
    pub max: f64,
    /// Display label ("0-10", "10+", ...)
    pub label: String,
    /// Number of contributing values (unweighted)
    pub count: u64,
    /// Sum of contributing weights
    #[serde(rename = "weightedCount")]
    pub weighted_count: f64,
    /// Share of the total weighted count, 0..100
    pub percentage: f64,
}

/// One attributed form field in the click report.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClickRow {
    /// Human label of the field
    pub label: String,
    /// Canonical selector of the field
    pub selector: String,
    /// Row kind of the canonical selector row
    pub kind: String,
    /// Weighted click count attributed to the field
    pub clicks: f64,
}

/// Click-attribution result for one page URL.
///
/// `available == false` means no selector index was loaded for the URL (or
/// the extraction job reported failure); the rendering layer shows a
/// "selector map unavailable" state instead of an empty table.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClickReport {
    /// Whether a selector index was available for the URL
    pub available: bool,
    /// Attributed fields, clicks descending
    #[serde(default)]
    pub rows: Vec<ClickRow>,
}

impl ClickReport {
    /// Report for a URL with no usable selector index.
    pub fn unavailable() -> Self {
        Self {
            available: false,
            rows: Vec::new(),
        }
    }

    /// Report with attributed rows.
    pub fn ready(rows: Vec<ClickRow>) -> Self {
        Self {
            available: true,
            rows,
        }
    }
}

/// Full derived report for one filtered bundle collection.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DashboardReport {
    /// ISO 8601 timestamp when the report was computed
    pub timestamp: String,
    /// Number of bundles scanned (unweighted)
    #[serde(rename = "totalBundles")]
    pub total_bundles: u64,
    /// Extrapolated page views (sum of weights)
    #[serde(rename = "totalPageViews")]
    pub total_page_views: f64,
    /// Per-series aggregates across the whole collection
    pub totals: BTreeMap<String, SeriesStats>,
    /// Equal-width value distribution per non-empty series
    pub histograms: BTreeMap<String, Vec<HistogramBucket>>,
    /// Facet records per facet name, in display order
    pub facets: BTreeMap<String, Vec<FacetRecord>>,
    /// Click attribution, when a selector index was supplied
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clicks: Option<ClickReport>,
}
