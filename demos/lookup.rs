//! Lookup Example
//!
//! Maps a few targets to the CIDR ranges of their autonomous systems.
//! Needs an API key in `~/.asnmap/credentials.toml` or `ASNMAP_API_KEY`.
//!
//! # Running
//!
//! ```bash
//! cargo run --example lookup -- AS14421 1.1.1.1 example.com
//! ```

use asnmap::{AsnmapConfig, LookupLens};

fn main() -> anyhow::Result<()> {
    let config = AsnmapConfig::new(&None)?;
    let lens = LookupLens::new(&config)?;

    let mut targets: Vec<String> = std::env::args().skip(1).collect();
    if targets.is_empty() {
        targets = vec!["AS14421".to_string(), "1.1.1.1".to_string()];
    }

    for target in &targets {
        let records = lens.lookup(target)?;
        println!("{} ({} record(s))", target, records.len());

        for record in &records {
            println!(
                "  AS{} {} [{}]",
                record.asn_number, record.organization_name, record.country
            );
            for cidr in record.cidrs()? {
                println!("    {}", cidr);
            }
        }
    }

    Ok(())
}
