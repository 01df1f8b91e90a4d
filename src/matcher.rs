//! Selector-variant click attribution
//!
//! Click events carry free-text selector strings that rarely match the
//! spellings recorded in the form-metadata index for the same logical
//! field: one side may carry a `form#...` prefix, a leading `#`, or a
//! `___widget`/`___label` suffix the other side lacks. Both sides are
//! therefore expanded into a set of candidate variants and matched through
//! a reverse index; the first variant hit attributes the click's bundle
//! weight to the canonical field. Unmatched clicks are expected and dropped
//! silently.

use crate::extract::normalize_page_url;
use crate::types::{Bundle, Checkpoint, ClickReport, ClickRow, SelectorPayload, SelectorRow,
    GUIDE_CONTAINER_MARKER};
use log::debug;
use std::cmp::Ordering;
use std::collections::HashMap;

/// Strip a `form#... ` prefix, keeping the field part of the selector.
fn strip_form_prefix(selector: &str) -> Option<String> {
    if !selector.starts_with("form#") {
        return None;
    }
    selector
        .find(' ')
        .map(|idx| selector[idx + 1..].trim_start().to_string())
}

/// Strip a `___widget` / `___label` suffix variant.
fn strip_suffix(selector: &str) -> Option<String> {
    for suffix in ["___widget", "___label"] {
        if let Some(stripped) = selector.strip_suffix(suffix) {
            return Some(stripped.to_string());
        }
    }
    None
}

/// Generate the candidate key variants of one selector spelling: the raw
/// string, the `form#...`-prefix-stripped form, the vendor
/// `#guideContainer-*` tail, and each of those with the leading `#` and the
/// widget/label suffix removed.
pub fn selector_variants(raw: &str) -> Vec<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    let mut seeds = vec![trimmed.to_string()];
    if let Some(stripped) = strip_form_prefix(trimmed) {
        seeds.push(stripped);
    }
    if let Some(idx) = trimmed.find(GUIDE_CONTAINER_MARKER) {
        seeds.push(trimmed[idx..].to_string());
    }

    let mut variants: Vec<String> = Vec::new();
    let mut push = |value: String| {
        if !value.is_empty() && !variants.contains(&value) {
            variants.push(value);
        }
    };

    for seed in seeds {
        let mut forms = vec![seed.clone()];
        if let Some(stripped) = strip_suffix(&seed) {
            forms.push(stripped);
        }
        for form in forms {
            push(form.clone());
            if let Some(bare) = form.strip_prefix('#') {
                push(bare.to_string());
            }
        }
    }

    variants
}

/// True when `candidate` is a better canonical row than `current` for a
/// shared variant: labeled rows beat unlabeled ones, and among labeled rows
/// `kind == "label"` wins.
fn prefer_row(candidate: &SelectorRow, current: &SelectorRow) -> bool {
    let candidate_labeled = !candidate.label.is_empty();
    let current_labeled = !current.label.is_empty();
    if candidate_labeled != current_labeled {
        return candidate_labeled;
    }
    candidate_labeled && candidate.kind == "label" && current.kind != "label"
}

/// Reverse index from every known variant to its canonical row.
fn build_variant_index(rows: &[SelectorRow]) -> HashMap<String, usize> {
    let mut index: HashMap<String, usize> = HashMap::new();
    for (i, row) in rows.iter().enumerate() {
        for variant in selector_variants(&row.selector) {
            let existing = index.get(&variant).copied();
            match existing {
                Some(current) if !prefer_row(row, &rows[current]) => {}
                _ => {
                    index.insert(variant, i);
                }
            }
        }
    }
    index
}

/// Click attribution matcher owning an explicit selector-index cache keyed
/// by normalized page URL. The cache lives and dies with the matcher
/// instance; `invalidate`/`clear` are the only eviction paths.
#[derive(Default)]
pub struct SelectorMatcher {
    cache: HashMap<String, SelectorPayload>,
}

impl SelectorMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache the selector payload for a page URL. The payload is fetched
    /// once per URL by the caller; re-inserting replaces the old entry.
    pub fn insert(&mut self, url: &str, payload: SelectorPayload) {
        self.cache.insert(normalize_page_url(url), payload);
    }

    /// Drop the cached payload for one URL.
    pub fn invalidate(&mut self, url: &str) {
        self.cache.remove(&normalize_page_url(url));
    }

    /// Drop all cached payloads.
    pub fn clear(&mut self) {
        self.cache.clear();
    }

    /// Attribute click events to known form fields of one page.
    ///
    /// Returns the unavailable report when no selector index is cached for
    /// the URL or the extraction job reported failure -- the rendering
    /// layer must be able to tell that apart from zero clicks.
    pub fn attribute_clicks(&self, url: &str, bundles: &[Bundle]) -> ClickReport {
        let payload = match self.cache.get(&normalize_page_url(url)) {
            Some(payload) if payload.ok => payload,
            _ => return ClickReport::unavailable(),
        };

        let index = build_variant_index(&payload.rows);
        let mut clicks: HashMap<usize, f64> = HashMap::new();

        for bundle in bundles {
            for event in bundle
                .events
                .iter()
                .filter(|e| e.checkpoint == Checkpoint::Click)
            {
                let raw = event
                    .target
                    .as_deref()
                    .filter(|t| !t.is_empty())
                    .or(event.source.as_deref());
                let Some(raw) = raw else { continue };

                let matched = selector_variants(raw)
                    .into_iter()
                    .find_map(|variant| index.get(&variant).copied());
                match matched {
                    Some(row) => *clicks.entry(row).or_default() += bundle.weight,
                    None => debug!("no selector match for click target {}", raw),
                }
            }
        }

        let mut rows: Vec<ClickRow> = clicks
            .into_iter()
            .map(|(i, weight)| {
                let row = &payload.rows[i];
                ClickRow {
                    label: row.label.clone(),
                    selector: row.selector.clone(),
                    kind: row.kind.clone(),
                    clicks: weight,
                }
            })
            .collect();

        rows.sort_by(|a, b| {
            b.clicks
                .partial_cmp(&a.clicks)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.label.cmp(&b.label))
        });

        ClickReport::ready(rows)
    }
}
