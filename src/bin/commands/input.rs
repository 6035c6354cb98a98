use anyhow::{anyhow, Result};
use asnmap::lens::lookup::LookupInput;
use asnmap::lens::query::{classify_with_hint, InputKind};
use asnmap::lens::utils::{expand_values, read_entries};
use clap::Args;
use std::io::IsTerminal;

/// Input selection; the four kinds are mutually exclusive
#[derive(Args, Debug, Default)]
pub struct InputArgs {
    /// ASN to look up, e.g. AS14421 (comma-separated or file)
    #[clap(short = 'a', long, conflicts_with_all = ["ip", "domain", "org"])]
    pub asn: Vec<String>,

    /// IP address to look up (comma-separated or file)
    #[clap(short = 'i', long, conflicts_with_all = ["asn", "domain", "org"])]
    pub ip: Vec<String>,

    /// Domain to look up (comma-separated or file)
    #[clap(short = 'd', long, conflicts_with_all = ["asn", "ip", "org"])]
    pub domain: Vec<String>,

    /// Organization name to look up (comma-separated or file)
    #[clap(long, conflicts_with_all = ["asn", "ip", "domain"])]
    pub org: Vec<String>,

    /// Targets to look up, of any kind (comma-separated or file)
    #[clap(short = 'f', long)]
    pub file: Vec<String>,
}

impl InputArgs {
    /// Collect inputs from flags, files and piped stdin
    ///
    /// Flag values are checked against their kind here so a bad value fails
    /// before any request is made.
    pub fn collect(&self) -> Result<Vec<LookupInput>> {
        let mut inputs = vec![];
        for (values, kind) in [
            (&self.asn, InputKind::Asn),
            (&self.ip, InputKind::Ip),
            (&self.domain, InputKind::Domain),
            (&self.org, InputKind::Org),
            (&self.file, InputKind::Auto),
        ] {
            for raw in expand_values(values)? {
                if kind != InputKind::Auto {
                    classify_with_hint(&raw, kind)?;
                }
                inputs.push(LookupInput::new(&raw, kind));
            }
        }

        let stdin = std::io::stdin();
        if !stdin.is_terminal() {
            let entries = read_entries(stdin.lock())
                .map_err(|e| anyhow!("Unable to read input from stdin: {}", e))?;
            inputs.extend(entries.iter().map(|raw| LookupInput::auto(raw)));
        }

        Ok(inputs)
    }
}
