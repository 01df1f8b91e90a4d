//! Input loading
//!
//! Reads bundle collections and selector-index payloads from JSON files.
//! The network layer that originally produced these files is a separate
//! concern; by the time this crate runs, inputs are fully materialized.

use crate::types::{Bundle, BundleGroup, SelectorPayload};
use anyhow::{Context, Result};
use log::info;
use serde::Deserialize;
use std::path::Path;

/// The bundle collection shapes the loader layer delivers: a flat bundle
/// array, hour-grouped chunks, or a single wrapper object.
#[derive(Deserialize)]
#[serde(untagged)]
enum BundleSource {
    Flat(Vec<Bundle>),
    Grouped(Vec<BundleGroup>),
    Wrapped {
        #[serde(rename = "rumBundles")]
        rum_bundles: Vec<Bundle>,
    },
}

/// Load a bundle collection from a JSON file, flattening grouped shapes.
/// Weights below 1 are floored to 1.
pub fn load_bundles(path: &Path) -> Result<Vec<Bundle>> {
    let data = std::fs::read(path)
        .with_context(|| format!("Failed to read bundle file: {:?}", path))?;
    let source: BundleSource = serde_json::from_slice(&data)
        .with_context(|| format!("Failed to parse bundle file: {:?}", path))?;

    let mut bundles = match source {
        BundleSource::Flat(bundles) => bundles,
        BundleSource::Wrapped { rum_bundles } => rum_bundles,
        BundleSource::Grouped(groups) => groups
            .into_iter()
            .flat_map(|group| group.rum_bundles)
            .collect(),
    };

    for bundle in &mut bundles {
        if bundle.weight < 1.0 {
            bundle.weight = 1.0;
        }
    }

    info!("Loaded {} bundles from {:?}", bundles.len(), path);
    Ok(bundles)
}

/// Load a selector-index payload for one page URL.
pub fn load_selector_payload(path: &Path) -> Result<SelectorPayload> {
    let data = std::fs::read(path)
        .with_context(|| format!("Failed to read selector index: {:?}", path))?;
    let payload: SelectorPayload = serde_json::from_slice(&data)
        .with_context(|| format!("Failed to parse selector index: {:?}", path))?;

    info!(
        "Loaded selector index from {:?} (ok={}, {} rows)",
        path,
        payload.ok,
        payload.rows.len()
    );
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(name: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("rum-facets-test-{}", name));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_load_flat_array() {
        let path = write_temp(
            "flat.json",
            r#"[{ "id": "a", "weight": 10 }, { "id": "b" }]"#,
        );
        let bundles = load_bundles(&path).unwrap();
        assert_eq!(bundles.len(), 2);
        assert_eq!(bundles[0].weight, 10.0);
        assert_eq!(bundles[1].weight, 1.0);
    }

    #[test]
    fn test_load_grouped_chunks() {
        let path = write_temp(
            "grouped.json",
            r#"[
                { "date": "2024-05-06", "hour": 5, "rumBundles": [{ "id": "a" }] },
                { "date": "2024-05-06", "rumBundles": [{ "id": "b" }, { "id": "c" }] }
            ]"#,
        );
        let bundles = load_bundles(&path).unwrap();
        assert_eq!(bundles.len(), 3);
    }

    #[test]
    fn test_load_wrapped_object() {
        let path = write_temp("wrapped.json", r#"{ "rumBundles": [{ "id": "a" }] }"#);
        let bundles = load_bundles(&path).unwrap();
        assert_eq!(bundles.len(), 1);
    }

    #[test]
    fn test_load_selector_payload() {
        let path = write_temp(
            "selectors.json",
            r##"{ "ok": true, "rows": [{ "label": "Name", "selector": "#guideContainer-1", "kind": "label" }] }"##,
        );
        let payload = load_selector_payload(&path).unwrap();
        assert!(payload.ok);
        assert_eq!(payload.rows.len(), 1);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let path = write_temp("broken.json", "{ not json");
        assert!(load_bundles(&path).is_err());
    }
}
