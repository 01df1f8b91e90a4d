//! Bundle aggregation engine
//!
//! Groups bundles by registered key functions and accumulates weighted
//! statistics per group. Every aggregation is a full scan of the supplied
//! collection: nothing is updated incrementally, so repeated runs over the
//! same input always produce identical output and no stale state survives a
//! filter change.

use crate::extract;
use crate::stats::{histogram_equal_width, SeriesSummary};
use crate::types::{Bundle, DashboardReport, FacetRecord, SeriesStats};
use log::debug;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

/// How a facet treats bundles whose key function produced no keys.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FacetPolicy {
    /// Key function fires only for qualifying bundles; others are skipped.
    WhenPresent,
    /// Key function is expected to derive a key for every bundle (hour,
    /// device type). Groups of such facets carry every registered series,
    /// empty summaries included, so zero-activity groups still render.
    Every,
}

/// Whether a series weights each value by its bundle's sampling weight or
/// counts it once.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeriesKind {
    Weighted,
    Raw,
}

struct FacetDef {
    name: String,
    policy: FacetPolicy,
    keys: Box<dyn Fn(&Bundle) -> Vec<String>>,
}

struct SeriesDef {
    name: String,
    kind: SeriesKind,
    value: Box<dyn Fn(&Bundle) -> Option<f64>>,
}

/// One facet group: a derived key with its accumulated statistics.
#[derive(Clone, Debug, Default)]
pub struct FacetGroup {
    /// Group key
    pub value: String,
    /// Contributing bundles, unweighted
    pub count: u64,
    /// Sum of contributing bundles' weights
    pub weight: f64,
    /// Per-series accumulated values
    pub metrics: HashMap<String, SeriesSummary>,
}

/// Sort order for facet group listings. Groups have no inherent order;
/// callers choose. Hour keys are `YYYY-MM-DDTHH:00:00` strings, so
/// `ValueAsc` is chronological for them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FacetSort {
    /// Weight descending, ties by value ascending
    WeightDesc,
    /// Value ascending
    ValueAsc,
}

/// Result of one full aggregation pass.
#[derive(Debug, Default)]
pub struct Aggregate {
    facets: HashMap<String, HashMap<String, FacetGroup>>,
    totals: HashMap<String, SeriesSummary>,
    total_count: u64,
    total_weight: f64,
}

impl Aggregate {
    /// Number of bundles scanned (unweighted).
    pub fn total_count(&self) -> u64 {
        self.total_count
    }

    /// Extrapolated total (sum of weights).
    pub fn total_weight(&self) -> f64 {
        self.total_weight
    }

    /// Per-series aggregate across the whole collection.
    pub fn totals(&self) -> &HashMap<String, SeriesSummary> {
        &self.totals
    }

    /// Groups of one facet, unordered.
    pub fn facet(&self, name: &str) -> Option<&HashMap<String, FacetGroup>> {
        self.facets.get(name)
    }

    /// Groups of one facet in an explicit order.
    pub fn facet_sorted(&self, name: &str, sort: FacetSort) -> Vec<&FacetGroup> {
        let mut groups: Vec<&FacetGroup> = match self.facets.get(name) {
            Some(groups) => groups.values().collect(),
            None => return Vec::new(),
        };
        match sort {
            FacetSort::WeightDesc => groups.sort_by(|a, b| {
                b.weight
                    .partial_cmp(&a.weight)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| a.value.cmp(&b.value))
            }),
            FacetSort::ValueAsc => groups.sort_by(|a, b| a.value.cmp(&b.value)),
        }
        groups
    }

    /// Materialize the serializable report handed to the rendering layer.
    /// Time-shaped facets are listed chronologically, everything else by
    /// weight descending.
    pub fn to_report(&self) -> DashboardReport {
        let mut facets = BTreeMap::new();
        for name in self.facets.keys() {
            let sort = if name == "hour" || name == "deviceType" {
                FacetSort::ValueAsc
            } else {
                FacetSort::WeightDesc
            };
            let records: Vec<FacetRecord> = self
                .facet_sorted(name, sort)
                .into_iter()
                .map(|group| FacetRecord {
                    value: group.value.clone(),
                    count: group.count,
                    weight: group.weight,
                    metrics: group
                        .metrics
                        .iter()
                        .map(|(series, summary)| (series.clone(), summary.to_stats()))
                        .collect(),
                })
                .collect();
            facets.insert(name.clone(), records);
        }

        let totals: BTreeMap<String, SeriesStats> = self
            .totals
            .iter()
            .map(|(series, summary)| (series.clone(), summary.to_stats()))
            .collect();

        let histograms: BTreeMap<String, Vec<crate::types::HistogramBucket>> = self
            .totals
            .iter()
            .filter(|(_, summary)| !summary.is_empty())
            .map(|(series, summary)| {
                (series.clone(), histogram_equal_width(summary.points()))
            })
            .collect();

        DashboardReport {
            timestamp: chrono::Utc::now().to_rfc3339(),
            total_bundles: self.total_count,
            total_page_views: self.total_weight,
            totals,
            histograms,
            facets,
            clicks: None,
        }
    }
}

/// Aggregation engine: registered facets (multi-valued key functions) and
/// named series (per-bundle numeric derivations), applied to a bundle
/// collection in one pass.
#[derive(Default)]
pub struct FacetCollector {
    facets: Vec<FacetDef>,
    series: Vec<SeriesDef>,
}

impl FacetCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a facet. The key function may return several keys; the
    /// bundle then contributes to every one of them (multi-valued facets
    /// such as error sources).
    pub fn add_facet<F>(&mut self, name: &str, policy: FacetPolicy, keys: F) -> &mut Self
    where
        F: Fn(&Bundle) -> Vec<String> + 'static,
    {
        self.facets.push(FacetDef {
            name: name.to_string(),
            policy,
            keys: Box::new(keys),
        });
        self
    }

    /// Register a weighted series: each bundle contributes `weight` copies
    /// of the derived value.
    pub fn add_series<F>(&mut self, name: &str, value: F) -> &mut Self
    where
        F: Fn(&Bundle) -> Option<f64> + 'static,
    {
        self.add_series_kind(name, SeriesKind::Weighted, value)
    }

    /// Register an unweighted series for raw diagnostics.
    pub fn add_raw_series<F>(&mut self, name: &str, value: F) -> &mut Self
    where
        F: Fn(&Bundle) -> Option<f64> + 'static,
    {
        self.add_series_kind(name, SeriesKind::Raw, value)
    }

    fn add_series_kind<F>(&mut self, name: &str, kind: SeriesKind, value: F) -> &mut Self
    where
        F: Fn(&Bundle) -> Option<f64> + 'static,
    {
        self.series.push(SeriesDef {
            name: name.to_string(),
            kind,
            value: Box::new(value),
        });
        self
    }

    /// Run one full aggregation pass over the collection.
    ///
    /// Bundles whose series function returns `None` still count toward the
    /// groups their key functions fired for, but add nothing to that
    /// series' value list -- absent measurements never enter percentile or
    /// mean inputs as zeros.
    pub fn aggregate(&self, bundles: &[Bundle]) -> Aggregate {
        let mut result = Aggregate::default();
        for series in &self.series {
            result.totals.insert(series.name.clone(), SeriesSummary::new());
        }

        for bundle in bundles {
            result.total_count += 1;
            result.total_weight += bundle.weight;

            // Derive each series once per bundle, reused across facets.
            let values: Vec<Option<f64>> =
                self.series.iter().map(|s| (s.value)(bundle)).collect();

            for (series, value) in self.series.iter().zip(&values) {
                if let Some(v) = value {
                    let weight = match series.kind {
                        SeriesKind::Weighted => bundle.weight,
                        SeriesKind::Raw => 1.0,
                    };
                    if let Some(summary) = result.totals.get_mut(&series.name) {
                        summary.push(*v, weight);
                    }
                }
            }

            for facet in &self.facets {
                let keys = (facet.keys)(bundle);
                if keys.is_empty() {
                    if facet.policy == FacetPolicy::Every {
                        debug!(
                            "bundle {} produced no key for total facet {}",
                            bundle.id, facet.name
                        );
                    }
                    continue;
                }

                let groups = result.facets.entry(facet.name.clone()).or_default();
                for key in keys {
                    let group = groups.entry(key.clone()).or_insert_with(|| {
                        let mut metrics = HashMap::new();
                        if facet.policy == FacetPolicy::Every {
                            for series in &self.series {
                                metrics.insert(series.name.clone(), SeriesSummary::new());
                            }
                        }
                        FacetGroup {
                            value: key.clone(),
                            metrics,
                            ..FacetGroup::default()
                        }
                    });
                    group.count += 1;
                    group.weight += bundle.weight;

                    for (series, value) in self.series.iter().zip(&values) {
                        if let Some(v) = value {
                            let weight = match series.kind {
                                SeriesKind::Weighted => bundle.weight,
                                SeriesKind::Raw => 1.0,
                            };
                            group
                                .metrics
                                .entry(series.name.clone())
                                .or_default()
                                .push(*v, weight);
                        }
                    }
                }
            }
        }

        // Registered facets keep their group maps even when no bundle
        // fired, so chart code can iterate them unconditionally.
        for facet in &self.facets {
            result.facets.entry(facet.name.clone()).or_default();
        }

        result
    }
}

/// The facet/series catalog every dashboard chart derives from.
///
/// `form_threshold_ms` caps the form-visibility latency series; slower
/// outliers are rejected from the series entirely.
pub fn standard_collector(form_threshold_ms: Option<f64>) -> FacetCollector {
    let mut collector = FacetCollector::new();

    collector
        .add_facet("hour", FacetPolicy::Every, |b| {
            extract::hour_key(b).into_iter().collect()
        })
        .add_facet("deviceType", FacetPolicy::Every, |b| {
            vec![extract::device_type(&b.user_agent).to_string()]
        })
        .add_facet("errorSource", FacetPolicy::WhenPresent, extract::error_sources)
        .add_facet("errorTarget", FacetPolicy::WhenPresent, extract::error_targets)
        .add_facet("errorDetails", FacetPolicy::WhenPresent, extract::error_details)
        .add_facet(
            "missingResource",
            FacetPolicy::WhenPresent,
            extract::missing_resources,
        )
        .add_facet(
            "missingResourceDetails",
            FacetPolicy::WhenPresent,
            extract::missing_resource_details,
        )
        .add_facet("enterSource", FacetPolicy::WhenPresent, extract::enter_sources);

    collector
        .add_series("pageViews", |_| Some(1.0))
        .add_series("errorCount", |b| Some(extract::error_count(b) as f64))
        .add_series("formBlockLoadTime", move |b| {
            extract::form_block_load_time(b, form_threshold_ms)
        });

    collector
}
