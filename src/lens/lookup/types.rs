use crate::lens::cidr::{reduce, CidrBlock, InvalidRangeError};
use serde::{Deserialize, Deserializer, Serialize};
use std::net::IpAddr;

// =============================================================================
// Result Records
// =============================================================================

/// One announced address range owned by one ASN, as returned by the lookup service
///
/// Equality (and hashing) only consider the ASN and the case-folded
/// organization name, see [`ResultRecord::dedup_key`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultRecord {
    /// First address of the range (inclusive)
    #[serde(
        rename = "first_ip",
        default,
        deserialize_with = "deserialize_opt_ip",
        skip_serializing_if = "Option::is_none"
    )]
    pub first_address: Option<IpAddr>,
    /// Last address of the range (inclusive)
    #[serde(
        rename = "last_ip",
        default,
        deserialize_with = "deserialize_opt_ip",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_address: Option<IpAddr>,
    /// Input string that produced this record, filled in at dispatch
    #[serde(skip)]
    pub source_input: String,
    /// Autonomous System Number
    #[serde(rename = "asn", default)]
    pub asn_number: u32,
    /// ISO country code
    #[serde(default)]
    pub country: String,
    /// Organization name
    #[serde(rename = "org", default)]
    pub organization_name: String,
}

impl ResultRecord {
    pub fn new(
        first_address: IpAddr,
        last_address: IpAddr,
        asn_number: u32,
        country: &str,
        organization_name: &str,
    ) -> Self {
        Self {
            first_address: Some(first_address),
            last_address: Some(last_address),
            source_input: String::new(),
            asn_number,
            country: country.to_string(),
            organization_name: organization_name.to_string(),
        }
    }

    /// Set the source input, consuming the record
    pub fn with_source(mut self, source: &str) -> Self {
        self.source_input = source.to_string();
        self
    }

    /// Key used to collapse equivalent records
    pub fn dedup_key(&self) -> DedupKey {
        dedup_key(self)
    }

    /// Reduce the record's address range to CIDR blocks
    ///
    /// Records without both bounds cover no addresses and reduce to nothing.
    pub fn cidrs(&self) -> Result<Vec<CidrBlock>, InvalidRangeError> {
        match (self.first_address, self.last_address) {
            (Some(first), Some(last)) => reduce(first, last),
            _ => Ok(vec![]),
        }
    }
}

impl PartialEq for ResultRecord {
    fn eq(&self, other: &Self) -> bool {
        self.dedup_key() == other.dedup_key()
    }
}

impl Eq for ResultRecord {}

impl std::hash::Hash for ResultRecord {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.dedup_key().hash(state);
    }
}

/// `(asn, lowercased organization name)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DedupKey {
    pub asn: u32,
    pub org: String,
}

/// Build the dedup key of a record
pub fn dedup_key(record: &ResultRecord) -> DedupKey {
    DedupKey {
        asn: record.asn_number,
        org: record.organization_name.to_lowercase(),
    }
}

/// The service omits or blanks addresses it has no value for
fn deserialize_opt_ip<'de, D>(deserializer: D) -> Result<Option<IpAddr>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

/// All records produced for one input
#[derive(Debug, Clone, Serialize)]
pub struct ResultBatch {
    /// The input string as supplied
    pub input: String,
    /// Query kind the input was classified as
    pub kind: &'static str,
    pub records: Vec<ResultRecord>,
}

impl ResultBatch {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }
}
