//! rum-facets CLI
//!
//! Loads a bundle collection from a JSON file, applies the cross-dimension
//! filters, runs the standard facet/series catalog, optionally attributes
//! clicks against a selector index, and exports the derived report.
//!
//! ## Usage
//!
//! ```bash
//! # Aggregate a bundle dump into a pretty JSON report
//! rum-facets --input bundles.json --output report.json --pretty
//!
//! # Only Android traffic entering from one referrer
//! rum-facets --input bundles.json \
//!     --device-type "Mobile: Android" --source https://ref.example/landing
//!
//! # Attach click attribution for one form page
//! rum-facets --input bundles.json \
//!     --selector-index selectors.json --page-url https://example.com/form
//! ```

use anyhow::Result;
use clap::Parser;
use log::info;
use rum_facets::{
    exporter::{CsvExporter, ExporterType, JsonExporter, ReportExporter},
    filter::{filter_bundles, BundleFilter},
    loader,
    matcher::SelectorMatcher,
    standard_collector,
    types::DashboardReport,
    FacetSort,
};
use std::path::PathBuf;

/// Facet aggregation over sampled web-telemetry bundles
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Bundle collection JSON file
    #[clap(short, long)]
    input: PathBuf,

    /// Output file for the derived report
    #[clap(short, long, default_value = "facet-report.json")]
    output: PathBuf,

    /// Output format (json, csv)
    #[clap(short, long, default_value = "json")]
    format: String,

    /// Pretty-print JSON output
    #[clap(long)]
    pretty: bool,

    /// Device-type filter, repeatable (values OR together)
    #[clap(long = "device-type")]
    device_types: Vec<String>,

    /// Enter-source filter, repeatable (values OR together)
    #[clap(long = "source")]
    sources: Vec<String>,

    /// Reject form-visibility latencies above this threshold (milliseconds)
    #[clap(long)]
    form_threshold: Option<f64>,

    /// Selector index JSON file for click attribution
    #[clap(long)]
    selector_index: Option<PathBuf>,

    /// Page URL the selector index belongs to
    #[clap(long)]
    page_url: Option<String>,

    /// Verbose logging
    #[clap(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::Builder::from_default_env()
        .filter_level(if args.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .init();

    let export_format = match args.format.to_lowercase().as_str() {
        "json" => ExporterType::Json,
        "csv" => ExporterType::Csv,
        _ => anyhow::bail!("Unsupported format: {}. Use json or csv", args.format),
    };

    if args.selector_index.is_some() != args.page_url.is_some() {
        anyhow::bail!("--selector-index and --page-url must be supplied together");
    }

    let bundles = loader::load_bundles(&args.input)?;

    let filter = BundleFilter {
        device_types: args.device_types.clone(),
        sources: args.sources.clone(),
    };
    let filtered = if filter.is_empty() {
        bundles
    } else {
        let kept = filter_bundles(&bundles, &filter);
        info!("Filter kept {} of {} bundles", kept.len(), bundles.len());
        kept
    };

    info!("Aggregating {} bundles...", filtered.len());
    let collector = standard_collector(args.form_threshold);
    let aggregate = collector.aggregate(&filtered);
    let mut report = aggregate.to_report();

    if let (Some(index_path), Some(page_url)) = (&args.selector_index, &args.page_url) {
        let payload = loader::load_selector_payload(index_path)?;
        let mut matcher = SelectorMatcher::new();
        matcher.insert(page_url, payload);
        report.clicks = Some(matcher.attribute_clicks(page_url, &filtered));
    }

    match export_format {
        ExporterType::Json => {
            JsonExporter::new(args.output.clone(), args.pretty).export(&report)?;
        }
        ExporterType::Csv => {
            CsvExporter::new(args.output.clone()).export(&report)?;
        }
    }
    info!("Report written to {:?}", args.output);

    print_summary(&report, &aggregate);

    Ok(())
}

fn print_summary(report: &DashboardReport, aggregate: &rum_facets::Aggregate) {
    info!("");
    info!("============================================");
    info!("             Summary Report");
    info!("============================================");
    info!("");
    info!("  Bundles scanned:  {}", report.total_bundles);
    info!("  Page views:       {:.0}", report.total_page_views);
    info!("");

    if let Some(errors) = report.totals.get("errorCount") {
        info!("  Errors (extrapolated sum): {:.0}", errors.sum);
    }
    if let Some(latency) = report.totals.get("formBlockLoadTime") {
        info!("  Form block load time (s):");
        info!("    p50: {:>8.2}", latency.percentiles.p50);
        info!("    p75: {:>8.2}", latency.percentiles.p75);
        info!("    p90: {:>8.2}", latency.percentiles.p90);
        info!("    p95: {:>8.2}", latency.percentiles.p95);
        info!("    p99: {:>8.2}", latency.percentiles.p99);
    }
    info!("");

    info!("  Top error sources:");
    for group in aggregate
        .facet_sorted("errorSource", FacetSort::WeightDesc)
        .iter()
        .take(5)
    {
        info!("    {:>10.0}  {}", group.weight, group.value);
    }

    if let Some(clicks) = &report.clicks {
        info!("");
        if clicks.available {
            info!("  Top clicked fields:");
            for row in clicks.rows.iter().take(5) {
                info!("    {:>10.0}  {}", row.clicks, row.label);
            }
        } else {
            info!("  Click attribution: selector map unavailable");
        }
    }
    info!("");
    info!("============================================");
}
