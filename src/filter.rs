//! Cross-dimensional bundle filtering
//!
//! The dashboard's top-level filter bar: selected values within a dimension
//! are OR'd, dimensions are AND'd. Filtering always produces a fresh subset
//! of the raw collection; downstream aggregation re-scans it from scratch,
//! trading repeated work for never-stale results.

use crate::extract;
use crate::types::Bundle;
use log::debug;

/// Selected filter values per dimension. An empty selection means the
/// dimension is not filtered at all, not that nothing passes.
#[derive(Clone, Debug, Default)]
pub struct BundleFilter {
    /// Device-type labels from the device taxonomy
    pub device_types: Vec<String>,
    /// Normalized enter-source URLs
    pub sources: Vec<String>,
}

impl BundleFilter {
    pub fn is_empty(&self) -> bool {
        self.device_types.is_empty() && self.sources.is_empty()
    }
}

fn matches_device(bundle: &Bundle, selected: &[String]) -> bool {
    if selected.is_empty() {
        return true;
    }
    let device = extract::device_type(&bundle.user_agent);
    selected.iter().any(|s| s == device)
}

fn matches_source(bundle: &Bundle, selected: &[String]) -> bool {
    if selected.is_empty() {
        return true;
    }
    let sources = extract::enter_sources(bundle);
    selected
        .iter()
        .map(|s| extract::normalize_page_url(s))
        .any(|wanted| sources.iter().any(|have| *have == wanted))
}

/// Apply the filter to a raw bundle collection.
pub fn filter_bundles(bundles: &[Bundle], filter: &BundleFilter) -> Vec<Bundle> {
    if filter.is_empty() {
        return bundles.to_vec();
    }

    let kept: Vec<Bundle> = bundles
        .iter()
        .filter(|b| matches_device(b, &filter.device_types) && matches_source(b, &filter.sources))
        .cloned()
        .collect();

    debug!("filter kept {} of {} bundles", kept.len(), bundles.len());
    kept
}
