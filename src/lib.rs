//! rum-facets
//!
//! Re-aggregation and faceting engine for sampled web-telemetry bundles:
//! filters session bundles across device/source dimensions, groups them by
//! derived keys, and computes the weighted sums, means, nearest-rank
//! percentiles, histograms and click attributions the dashboards render.
//!
//! The crate owns no network or rendering concerns; it consumes fully
//! materialized bundle collections and produces derived records.

pub mod collector;
pub mod exporter;
pub mod extract;
pub mod filter;
pub mod loader;
pub mod matcher;
pub mod stats;
pub mod types;

pub use collector::{standard_collector, Aggregate, FacetCollector, FacetGroup, FacetPolicy, FacetSort};
pub use exporter::{CsvExporter, ExporterType, JsonExporter, ReportExporter};
pub use filter::{filter_bundles, BundleFilter};
pub use matcher::{selector_variants, SelectorMatcher};
pub use stats::{
    histogram_equal_width, histogram_with_thresholds, weighted_percentile, DataPoint,
    SeriesSummary,
};
pub use types::*;
