//! Report exporters
//!
//! Writes the derived report for consumption by the rendering layer (JSON)
//! or for quick inspection in a spreadsheet (CSV facet rows).

use crate::types::DashboardReport;
use anyhow::{Context, Result};
use std::{fs::File, io::Write, path::PathBuf};

/// Trait for report exporters
pub trait ReportExporter {
    fn export(&self, report: &DashboardReport) -> Result<()>;
}

/// Export format type
#[derive(Debug, Clone, Copy)]
pub enum ExporterType {
    Json,
    Csv,
}

/// JSON exporter
pub struct JsonExporter {
    output_path: PathBuf,
    pretty: bool,
}

impl JsonExporter {
    pub fn new(output_path: PathBuf, pretty: bool) -> Self {
        Self {
            output_path,
            pretty,
        }
    }
}

impl ReportExporter for JsonExporter {
    fn export(&self, report: &DashboardReport) -> Result<()> {
        let json = if self.pretty {
            serde_json::to_string_pretty(report)?
        } else {
            serde_json::to_string(report)?
        };

        let mut file = File::create(&self.output_path)
            .with_context(|| format!("Failed to create output file: {:?}", self.output_path))?;
        file.write_all(json.as_bytes())
            .with_context(|| format!("Failed to write to output file: {:?}", self.output_path))?;

        Ok(())
    }
}

/// CSV exporter for facet rows
pub struct CsvExporter {
    output_path: PathBuf,
}

impl CsvExporter {
    pub fn new(output_path: PathBuf) -> Self {
        Self { output_path }
    }

    fn to_csv(report: &DashboardReport) -> String {
        let mut output = String::new();
        output.push_str("facet,value,count,weight\n");

        for (facet, records) in &report.facets {
            for record in records {
                output.push_str(&format!(
                    "{},{},{},{}\n",
                    escape_field(facet),
                    escape_field(&record.value),
                    record.count,
                    record.weight
                ));
            }
        }

        if let Some(clicks) = &report.clicks {
            for row in &clicks.rows {
                output.push_str(&format!(
                    "clicks,{},,{}\n",
                    escape_field(&row.label),
                    row.clicks
                ));
            }
        }

        output
    }
}

fn escape_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

impl ReportExporter for CsvExporter {
    fn export(&self, report: &DashboardReport) -> Result<()> {
        let csv = Self::to_csv(report);

        let mut file = File::create(&self.output_path)
            .with_context(|| format!("Failed to create output file: {:?}", self.output_path))?;
        file.write_all(csv.as_bytes())
            .with_context(|| format!("Failed to write to output file: {:?}", self.output_path))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ClickReport, ClickRow, FacetRecord};
    use std::collections::BTreeMap;

    fn test_report() -> DashboardReport {
        let mut facets = BTreeMap::new();
        facets.insert(
            "errorSource".to_string(),
            vec![FacetRecord {
                value: "script.js, line 10".to_string(),
                count: 2,
                weight: 15.0,
                metrics: BTreeMap::new(),
            }],
        );
        DashboardReport {
            timestamp: "2025-01-01T00:00:00Z".to_string(),
            total_bundles: 2,
            total_page_views: 15.0,
            totals: BTreeMap::new(),
            histograms: BTreeMap::new(),
            facets,
            clicks: Some(ClickReport::ready(vec![ClickRow {
                label: "First name".to_string(),
                selector: "#guideContainer-1".to_string(),
                kind: "label".to_string(),
                clicks: 10.0,
            }])),
        }
    }

    #[test]
    fn test_csv_format() {
        let csv = CsvExporter::to_csv(&test_report());
        assert!(csv.starts_with("facet,value,count,weight\n"));
        // comma-carrying value is quoted
        assert!(csv.contains("errorSource,\"script.js, line 10\",2,15\n"));
        assert!(csv.contains("clicks,First name,,10\n"));
    }

    #[test]
    fn test_json_round_trip() {
        let report = test_report();
        let json = serde_json::to_string(&report).unwrap();
        let back: DashboardReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back.total_bundles, 2);
        assert_eq!(back.facets["errorSource"][0].weight, 15.0);
        assert!(back.clicks.unwrap().available);
    }
}
