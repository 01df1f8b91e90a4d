//! Metric extractors
//!
//! Pure per-bundle derivation rules: each function maps one bundle to zero
//! or more values or group keys. A bundle that lacks the fields a rule
//! needs is simply excluded from that rule's output; it never aborts the
//! scan or affects other rules.

use crate::types::{
    Bundle, Checkpoint, Event, ERROR_SOURCE_ENHANCER_NOISE, ERROR_SOURCE_FOCUS_LOSS,
    ERROR_SOURCE_UNDEFINED, REDACTION_MARKER, RESOURCE_DETAIL_DELIMITER,
};
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use std::cmp::Ordering;
use url::Url;

// ============================================================================
// Device Classification
// ============================================================================

/// Classify a raw user-agent string into the fixed device taxonomy.
///
/// Substring checks are ordered: Android wins over the generic mobile
/// marker, and any mobile marker wins over the desktop platforms (an iPad
/// UA can carry both "Macintosh" and "Mobile").
pub fn device_type(user_agent: &str) -> &'static str {
    let ua = user_agent.to_ascii_lowercase();

    if ua.contains("android") {
        return "Mobile: Android";
    }
    if ua.contains("iphone") || ua.contains("ipad") || ua.contains("ipod") {
        return "Mobile: iOS";
    }
    if ua.contains("mobile") {
        if ua.contains("macintosh") || ua.contains("mac os") {
            return "Mobile: iOS";
        }
        return "Mobile: Others";
    }
    if ua.contains("windows") {
        return "Desktop: Windows";
    }
    if ua.contains("macintosh") || ua.contains("mac os") {
        return "Desktop: macOS";
    }
    if ua.contains("linux") || ua.contains("x11") {
        return "Desktop: Linux";
    }
    if ua.contains("mozilla") || ua.contains("applewebkit") {
        return "Desktop: Others";
    }
    "Other"
}

// ============================================================================
// Error Events
// ============================================================================

fn error_source<'a>(event: &'a Event) -> &'a str {
    event.source.as_deref().unwrap_or("")
}

fn is_enhancer_noise(source: &str) -> bool {
    source.contains(ERROR_SOURCE_ENHANCER_NOISE)
}

/// Extrapolatable error count for one bundle.
///
/// Counts error events whose source is not `focus-loss` and not enhancer
/// noise, then adds one more when an `undefined error` event is present.
/// That event is already counted by the base pass, so such bundles count it
/// twice. Historical dashboard totals depend on exactly this double count,
/// so it is kept rather than fixed.
pub fn error_count(bundle: &Bundle) -> u64 {
    let filtered = bundle
        .events
        .iter()
        .filter(|e| e.checkpoint == Checkpoint::Error)
        .filter(|e| {
            let source = error_source(e);
            source != ERROR_SOURCE_FOCUS_LOSS && !is_enhancer_noise(source)
        })
        .count() as u64;

    let has_undefined = bundle
        .events
        .iter()
        .any(|e| e.checkpoint == Checkpoint::Error && error_source(e) == ERROR_SOURCE_UNDEFINED);

    filtered + u64::from(has_undefined)
}

/// Error events that feed the source/target/details facets. Unlike
/// [`error_count`], `undefined error` is a legitimate facet value here;
/// only focus-loss and enhancer noise are dropped.
fn facet_errors(bundle: &Bundle) -> impl Iterator<Item = &Event> {
    bundle
        .events
        .iter()
        .filter(|e| e.checkpoint == Checkpoint::Error)
        .filter(|e| {
            let source = error_source(e);
            source != ERROR_SOURCE_FOCUS_LOSS && !is_enhancer_noise(source)
        })
}

fn push_distinct(values: &mut Vec<String>, value: String) {
    if !value.is_empty() && !values.contains(&value) {
        values.push(value);
    }
}

/// Distinct error sources within one bundle.
pub fn error_sources(bundle: &Bundle) -> Vec<String> {
    let mut values = Vec::new();
    for event in facet_errors(bundle) {
        push_distinct(&mut values, error_source(event).to_string());
    }
    values
}

/// Distinct error targets within one bundle.
pub fn error_targets(bundle: &Bundle) -> Vec<String> {
    let mut values = Vec::new();
    for event in facet_errors(bundle) {
        push_distinct(
            &mut values,
            event.target.as_deref().unwrap_or("").to_string(),
        );
    }
    values
}

/// Distinct `"source | target"` pairs within one bundle.
pub fn error_details(bundle: &Bundle) -> Vec<String> {
    let mut values = Vec::new();
    for event in facet_errors(bundle) {
        let source = error_source(event);
        let target = event.target.as_deref().unwrap_or("");
        if source.is_empty() && target.is_empty() {
            continue;
        }
        push_distinct(&mut values, format!("{} | {}", source, target));
    }
    values
}

// ============================================================================
// Missing Resources
// ============================================================================

fn missing_resource_events(bundle: &Bundle) -> impl Iterator<Item = &Event> {
    bundle
        .events
        .iter()
        .filter(|e| e.checkpoint == Checkpoint::Missingresource)
        .filter(|e| {
            let source = error_source(e);
            !source.is_empty() && !source.contains(REDACTION_MARKER)
        })
}

/// Distinct missing-resource identities (source URLs) within one bundle.
pub fn missing_resources(bundle: &Bundle) -> Vec<String> {
    let mut values = Vec::new();
    for event in missing_resource_events(bundle) {
        push_distinct(&mut values, error_source(event).to_string());
    }
    values
}

/// Distinct missing-resource detail records, source joined with the
/// HTTP-status-like target. The delimiter never occurs in URLs.
pub fn missing_resource_details(bundle: &Bundle) -> Vec<String> {
    let mut values = Vec::new();
    for event in missing_resource_events(bundle) {
        let target = event.target.as_deref().unwrap_or("");
        push_distinct(
            &mut values,
            format!(
                "{}{}{}",
                error_source(event),
                RESOURCE_DETAIL_DELIMITER,
                target
            ),
        );
    }
    values
}

// ============================================================================
// Form Timing
// ============================================================================

fn is_form_block(source: &str) -> bool {
    source.to_ascii_lowercase().contains("form")
}

/// Seconds from page load to the first form block becoming visible.
///
/// Events are sorted by `timeDelta` before searching since bundles arrive
/// unsorted. Returns `None` when no form `viewblock` event exists, when its
/// `timeDelta` is not positive, or when a threshold (ms) is supplied and
/// exceeded -- those bundles must not bias the latency percentiles with a
/// zero.
pub fn form_block_load_time(bundle: &Bundle, threshold_ms: Option<f64>) -> Option<f64> {
    let mut events: Vec<&Event> = bundle.events.iter().collect();
    events.sort_by(|a, b| {
        a.time_delta
            .partial_cmp(&b.time_delta)
            .unwrap_or(Ordering::Equal)
    });

    let first = events.into_iter().find(|e| {
        e.checkpoint == Checkpoint::Viewblock && e.source.as_deref().is_some_and(is_form_block)
    })?;

    if first.time_delta <= 0.0 {
        return None;
    }
    if let Some(threshold) = threshold_ms {
        if first.time_delta > threshold {
            return None;
        }
    }
    Some(first.time_delta / 1000.0)
}

// ============================================================================
// Traffic Sources
// ============================================================================

/// Normalize a URL-or-string traffic source to `origin + pathname`,
/// stripping query, fragment and any trailing slash, so query-string
/// variants of the same page group together.
pub fn normalize_page_url(raw: &str) -> String {
    let trimmed = raw.trim();
    match Url::parse(trimmed) {
        Ok(parsed) if parsed.has_host() => {
            let joined = format!("{}{}", parsed.origin().ascii_serialization(), parsed.path());
            joined.trim_end_matches('/').to_string()
        }
        _ => trimmed.trim_end_matches('/').to_string(),
    }
}

/// Distinct normalized `enter` sources within one bundle.
pub fn enter_sources(bundle: &Bundle) -> Vec<String> {
    let mut values = Vec::new();
    for event in bundle
        .events
        .iter()
        .filter(|e| e.checkpoint == Checkpoint::Enter)
    {
        if let Some(source) = event.source.as_deref() {
            push_distinct(&mut values, normalize_page_url(source));
        }
    }
    values
}

// ============================================================================
// Time Bucketing
// ============================================================================

fn parse_utc(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    // Some feeds omit the zone designator; those timestamps are UTC.
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Local-timezone hour bucket for one bundle, `YYYY-MM-DDTHH:00:00`.
///
/// This is a real timezone conversion of the UTC time slot, so DST
/// transitions shift buckets the way the viewer's wall clock does.
/// Unparseable timestamps exclude the bundle from the hour facet.
pub fn hour_key(bundle: &Bundle) -> Option<String> {
    let raw = if bundle.time_slot.is_empty() {
        bundle.time.as_str()
    } else {
        bundle.time_slot.as_str()
    };
    let utc = parse_utc(raw)?;
    Some(
        utc.with_timezone(&Local)
            .format("%Y-%m-%dT%H:00:00")
            .to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(checkpoint: Checkpoint, source: Option<&str>, target: Option<&str>) -> Event {
        Event {
            checkpoint,
            source: source.map(str::to_string),
            target: target.map(str::to_string),
            time_delta: 0.0,
        }
    }

    fn bundle_with_events(events: Vec<Event>) -> Bundle {
        Bundle {
            id: "b1".to_string(),
            host: "example.com".to_string(),
            url: "https://example.com/".to_string(),
            time: "2024-05-06T05:04:00Z".to_string(),
            time_slot: "2024-05-06T05:00:00Z".to_string(),
            weight: 10.0,
            user_agent: String::new(),
            events,
        }
    }

    #[test]
    fn test_device_type_ordering() {
        assert_eq!(
            device_type("Mozilla/5.0 (Linux; Android 14) Mobile"),
            "Mobile: Android"
        );
        // Mobile must win over Macintosh (iPad-style UA)
        assert_eq!(
            device_type("Mozilla/5.0 (Macintosh; Intel Mac OS X) Mobile/15E148"),
            "Mobile: iOS"
        );
        assert_eq!(
            device_type("Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7)"),
            "Desktop: macOS"
        );
        assert_eq!(
            device_type("Mozilla/5.0 (Windows NT 10.0; Win64; x64)"),
            "Desktop: Windows"
        );
        assert_eq!(device_type("Mozilla/5.0 (X11; Ubuntu)"), "Desktop: Linux");
        assert_eq!(device_type("curl/8.0"), "Other");
    }

    #[test]
    fn test_error_count_exclusions() {
        let bundle = bundle_with_events(vec![
            event(Checkpoint::Error, Some("script.js:10"), None),
            event(Checkpoint::Error, Some("focus-loss"), None),
            event(Checkpoint::Error, Some("form-enhancer.js"), None),
            event(Checkpoint::Click, Some("script.js:99"), None),
        ]);
        assert_eq!(error_count(&bundle), 1);
    }

    #[test]
    fn test_error_count_undefined_double_count() {
        // Sole 'undefined error' event: counted by the base pass and again
        // by the presence check. Observed total is 2, kept for parity.
        let bundle = bundle_with_events(vec![event(
            Checkpoint::Error,
            Some("undefined error"),
            None,
        )]);
        assert_eq!(error_count(&bundle), 2);
    }

    #[test]
    fn test_error_sources_keep_undefined_and_dedupe() {
        let bundle = bundle_with_events(vec![
            event(Checkpoint::Error, Some("undefined error"), None),
            event(Checkpoint::Error, Some("script.js:10"), Some("a")),
            event(Checkpoint::Error, Some("script.js:10"), Some("b")),
            event(Checkpoint::Error, Some("focus-loss"), None),
        ]);
        assert_eq!(error_sources(&bundle), vec!["undefined error", "script.js:10"]);
    }

    #[test]
    fn test_error_details_join() {
        let bundle = bundle_with_events(vec![event(
            Checkpoint::Error,
            Some("script.js:10"),
            Some("div.hero"),
        )]);
        assert_eq!(error_details(&bundle), vec!["script.js:10 | div.hero"]);
    }

    #[test]
    fn test_missing_resources_skip_redacted() {
        let bundle = bundle_with_events(vec![
            event(
                Checkpoint::Missingresource,
                Some("https://example.com/a.png"),
                Some("404"),
            ),
            event(Checkpoint::Missingresource, Some("<redacted>"), Some("404")),
        ]);
        assert_eq!(missing_resources(&bundle), vec!["https://example.com/a.png"]);
        assert_eq!(
            missing_resource_details(&bundle),
            vec!["https://example.com/a.png|||404"]
        );
    }

    #[test]
    fn test_form_block_load_time_uses_first_by_time_delta() {
        let mut bundle = bundle_with_events(vec![
            event(Checkpoint::Viewblock, Some(".form"), None),
            event(Checkpoint::Viewblock, Some(".form"), None),
        ]);
        // unsorted on purpose: the later event appears first
        bundle.events[0].time_delta = 4000.0;
        bundle.events[1].time_delta = 1500.0;

        assert_eq!(form_block_load_time(&bundle, None), Some(1.5));
    }

    #[test]
    fn test_form_block_load_time_rejections() {
        let none = bundle_with_events(vec![event(Checkpoint::Viewblock, Some(".hero"), None)]);
        assert_eq!(form_block_load_time(&none, None), None);

        let mut zero = bundle_with_events(vec![event(Checkpoint::Viewblock, Some(".form"), None)]);
        zero.events[0].time_delta = 0.0;
        assert_eq!(form_block_load_time(&zero, None), None);

        let mut slow = bundle_with_events(vec![event(Checkpoint::Viewblock, Some(".form"), None)]);
        slow.events[0].time_delta = 9000.0;
        assert_eq!(form_block_load_time(&slow, Some(5000.0)), None);
        assert_eq!(form_block_load_time(&slow, Some(10000.0)), Some(9.0));
    }

    #[test]
    fn test_normalize_page_url() {
        assert_eq!(
            normalize_page_url("https://example.com/forms/contact?utm=x#top"),
            "https://example.com/forms/contact"
        );
        assert_eq!(
            normalize_page_url("https://example.com/"),
            "https://example.com"
        );
        // non-URL sources pass through trimmed
        assert_eq!(normalize_page_url("(direct)"), "(direct)");
    }

    #[test]
    fn test_enter_sources_grouped_across_query_variants() {
        let bundle = bundle_with_events(vec![
            event(Checkpoint::Enter, Some("https://example.com/a?x=1"), None),
            event(Checkpoint::Enter, Some("https://example.com/a?x=2"), None),
        ]);
        assert_eq!(enter_sources(&bundle), vec!["https://example.com/a"]);
    }

    #[test]
    fn test_hour_key_shape() {
        let bundle = bundle_with_events(Vec::new());
        let key = hour_key(&bundle).unwrap();
        // local-zone conversion, truncated to the hour
        assert!(key.ends_with(":00:00"), "unexpected key {}", key);
        assert_eq!(key.len(), "2024-05-06T05:00:00".len());
    }

    #[test]
    fn test_hour_key_unparseable_is_none() {
        let mut bundle = bundle_with_events(Vec::new());
        bundle.time_slot = "not a timestamp".to_string();
        bundle.time = String::new();
        assert_eq!(hour_key(&bundle), None);
    }
}
