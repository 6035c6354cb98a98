//! Output rendering for lookup results
//!
//! - CIDR (default): one block per line, IPv4 only unless IPv6 is requested
//! - JSON: one object per line
//! - CSV: pipe-separated values, header from [`CSV_HEADER`]

use super::types::ResultRecord;
use crate::lens::cidr::CidrBlock;
use crate::lens::utils::OutputFormat;
use anyhow::Result;
use chrono::Local;
use serde::{Deserialize, Serialize};
use tracing::warn;

pub const CSV_HEADER: &str = "timestamp|input|as_number|as_name|as_country|as_range";

/// A record prepared for JSON/CSV output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappedResult {
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub timestamp: String,
    pub input: String,
    pub as_number: String,
    pub as_name: String,
    pub as_country: String,
    pub as_range: Vec<String>,
}

impl MappedResult {
    pub fn from_record(record: &ResultRecord) -> Self {
        let as_range = match record.cidrs() {
            Ok(blocks) => blocks.iter().map(|b| b.to_string()).collect(),
            Err(e) => {
                warn!("{} (AS{}): {}", record.source_input, record.asn_number, e);
                vec![]
            }
        };

        Self {
            timestamp: Local::now().to_string(),
            input: attach_prefix(&record.source_input),
            as_number: attach_prefix(&record.asn_number.to_string()),
            as_name: record.organization_name.clone(),
            as_country: record.country.clone(),
            as_range,
        }
    }

    /// Pipe-separated row matching [`CSV_HEADER`]
    pub fn to_psv(&self) -> String {
        [
            self.timestamp.as_str(),
            self.input.as_str(),
            self.as_number.as_str(),
            self.as_name.as_str(),
            self.as_country.as_str(),
            self.as_range.join(",").as_str(),
        ]
        .iter()
        .map(|f| escape_psv_field(f))
        .collect::<Vec<_>>()
        .join("|")
    }
}

/// Prefix purely numeric values with `AS`
pub fn attach_prefix(value: &str) -> String {
    if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
        format!("AS{}", value)
    } else {
        value.to_string()
    }
}

fn escape_psv_field(field: &str) -> String {
    if field.contains(['|', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// All CIDR blocks of a batch; invalid ranges are logged and skipped
pub fn batch_cidrs(records: &[ResultRecord]) -> Vec<CidrBlock> {
    let mut blocks = vec![];
    for record in records {
        match record.cidrs() {
            Ok(b) => blocks.extend(b),
            Err(e) => warn!("{} (AS{}): {}", record.source_input, record.asn_number, e),
        }
    }
    blocks
}

/// Drop IPv6 blocks unless they are wanted
pub fn filter_ipv6(blocks: Vec<CidrBlock>, include_ipv6: bool) -> Vec<CidrBlock> {
    if include_ipv6 {
        return blocks;
    }
    blocks
        .into_iter()
        .filter(|b| matches!(b, CidrBlock::V4(_)))
        .collect()
}

/// Render a batch of records into output lines
pub fn format_records(
    records: &[ResultRecord],
    format: OutputFormat,
    include_ipv6: bool,
) -> Result<Vec<String>> {
    match format {
        OutputFormat::Cidr => Ok(filter_ipv6(batch_cidrs(records), include_ipv6)
            .iter()
            .map(|b| b.to_string())
            .collect()),
        OutputFormat::Json => records
            .iter()
            .map(|r| Ok(serde_json::to_string(&MappedResult::from_record(r))?))
            .collect(),
        OutputFormat::Csv => Ok(records
            .iter()
            .map(|r| MappedResult::from_record(r).to_psv())
            .collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<ResultRecord> {
        vec![
            ResultRecord::new(
                "45.239.52.0".parse().unwrap(),
                "45.239.55.255".parse().unwrap(),
                268353,
                "BR",
                "PPLINKNET SERVICOS DE COMUNICACAO LTDA - ME",
            )
            .with_source("PPLINKNET"),
            ResultRecord::new(
                "2804:4fd8::".parse().unwrap(),
                "2804:4fd8:ffff:ffff:ffff:ffff:ffff:ffff".parse().unwrap(),
                268353,
                "BR",
                "PPLINKNET SERVICOS DE COMUNICACAO LTDA - ME",
            )
            .with_source("PPLINKNET"),
        ]
    }

    #[test]
    fn test_attach_prefix() {
        assert_eq!(attach_prefix("14421"), "AS14421");
        assert_eq!(attach_prefix("AS14421"), "AS14421");
        assert_eq!(attach_prefix("google.com"), "google.com");
        assert_eq!(attach_prefix(""), "");
    }

    #[test]
    fn test_format_cidr() {
        let lines = format_records(&sample(), OutputFormat::Cidr, false).unwrap();
        assert_eq!(lines, vec!["45.239.52.0/22"]);

        let lines = format_records(&sample(), OutputFormat::Cidr, true).unwrap();
        assert_eq!(lines, vec!["45.239.52.0/22", "2804:4fd8::/32"]);
    }

    #[test]
    fn test_format_json() {
        let lines = format_records(&sample(), OutputFormat::Json, false).unwrap();
        assert_eq!(lines.len(), 2);

        let parsed: MappedResult = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(parsed.input, "PPLINKNET");
        assert_eq!(parsed.as_number, "AS268353");
        assert_eq!(parsed.as_country, "BR");
        assert_eq!(parsed.as_range, vec!["45.239.52.0/22"]);
        assert!(!parsed.timestamp.is_empty());
    }

    #[test]
    fn test_format_csv() {
        let lines = format_records(&sample(), OutputFormat::Csv, false).unwrap();
        let fields: Vec<&str> = lines[1].split('|').collect();
        assert_eq!(fields.len(), 6);
        assert_eq!(fields[1], "PPLINKNET");
        assert_eq!(fields[2], "AS268353");
        assert_eq!(fields[5], "2804:4fd8::/32");
        assert_eq!(CSV_HEADER.split('|').count(), 6);
    }

    #[test]
    fn test_psv_escaping() {
        let result = MappedResult {
            timestamp: String::new(),
            input: "14421".to_string(),
            as_number: "AS14421".to_string(),
            as_name: "A|B \"C\"".to_string(),
            as_country: "US".to_string(),
            as_range: vec!["1.0.0.0/24".to_string(), "2.0.0.0/24".to_string()],
        };
        assert_eq!(
            result.to_psv(),
            "|14421|AS14421|\"A|B \"\"C\"\"\"|US|1.0.0.0/24,2.0.0.0/24"
        );
    }

    #[test]
    fn test_invalid_range_yields_empty() {
        let record = ResultRecord::new(
            "10.0.0.9".parse().unwrap(),
            "10.0.0.1".parse().unwrap(),
            64500,
            "US",
            "EXAMPLE",
        );
        assert!(batch_cidrs(std::slice::from_ref(&record)).is_empty());
        assert!(MappedResult::from_record(&record).as_range.is_empty());
    }
}
