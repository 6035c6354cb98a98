//! Input classification
//!
//! Turns a raw user-supplied string into a typed [`Query`]. Classification
//! never fails: anything that is not recognised as an IP address, an ASN or a
//! domain name becomes an organization search.
//!
//! Detection rules, first match wins:
//! - Valid IPv4 or IPv6 literal -> [`Query::Ip`]
//! - `AS` prefix (case-insensitive) followed only by digits -> [`Query::Asn`]
//! - Digits only -> [`Query::AsnId`]
//! - Two or more dot-separated `[a-z0-9-]` labels, optional trailing dot -> [`Query::Domain`]
//! - Everything else -> [`Query::Org`]
//!
//! An empty (or whitespace-only) input is the only thing classified as
//! [`Query::Unknown`].

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::sync::LazyLock;
use thiserror::Error;

static DOMAIN_REGEX: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^(?i)[a-z0-9-]+(\.[a-z0-9-]+)+\.?$").ok());

// =============================================================================
// Types
// =============================================================================

/// A classified lookup query
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Query {
    /// `AS`-prefixed autonomous system number, prefix stripped
    Asn(u32),
    /// Bare numeric ASN id, kept as given
    AsnId(String),
    /// IPv4 or IPv6 address literal
    Ip(IpAddr),
    /// Organization name search
    Org(String),
    /// Host name that has to be resolved before lookup
    Domain(String),
    /// Input that cannot be looked up at all
    Unknown(String),
}

impl Query {
    /// Short name of the query kind
    pub fn kind(&self) -> &'static str {
        match self {
            Query::Asn(_) => "asn",
            Query::AsnId(_) => "asn-id",
            Query::Ip(_) => "ip",
            Query::Org(_) => "org",
            Query::Domain(_) => "domain",
            Query::Unknown(_) => "unknown",
        }
    }

    /// True for queries answered by a single remote request
    pub fn is_direct(&self) -> bool {
        matches!(
            self,
            Query::Asn(_) | Query::AsnId(_) | Query::Ip(_) | Query::Org(_)
        )
    }
}

impl std::fmt::Display for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Query::Asn(asn) => write!(f, "AS{}", asn),
            Query::AsnId(id) => write!(f, "{}", id),
            Query::Ip(ip) => write!(f, "{}", ip),
            Query::Org(org) => write!(f, "{}", org),
            Query::Domain(domain) => write!(f, "{}", domain),
            Query::Unknown(raw) => write!(f, "{}", raw),
        }
    }
}

/// Where an input came from, which narrows how it may be classified
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputKind {
    /// File, stdin or library input: use the generic rules
    #[default]
    Auto,
    /// Given with `--asn`
    Asn,
    /// Given with `--ip`
    Ip,
    /// Given with `--domain`
    Domain,
    /// Given with `--org`
    Org,
}

impl std::fmt::Display for InputKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InputKind::Auto => write!(f, "auto"),
            InputKind::Asn => write!(f, "asn"),
            InputKind::Ip => write!(f, "ip"),
            InputKind::Domain => write!(f, "domain"),
            InputKind::Org => write!(f, "org"),
        }
    }
}

/// An input that does not fit the kind it was given as
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind} input '{input}': {reason}")]
pub struct InvalidInputError {
    pub input: String,
    pub kind: InputKind,
    pub reason: &'static str,
}

// =============================================================================
// Classification
// =============================================================================

/// Classify a raw input string using the generic rules
pub fn classify(raw: &str) -> Query {
    if raw.trim().is_empty() {
        return Query::Unknown(raw.to_string());
    }

    if let Ok(ip) = raw.parse::<IpAddr>() {
        return Query::Ip(ip);
    }

    if let Some(asn) = parse_prefixed_asn(raw) {
        return Query::Asn(asn);
    }

    if is_numeric(raw) {
        return Query::AsnId(raw.to_string());
    }

    if is_domain(raw) {
        return Query::Domain(raw.to_string());
    }

    Query::Org(raw.to_string())
}

/// Classify a raw input given the flag it was supplied with
///
/// `InputKind::Org` always yields an organization search, so purely numeric
/// organization names can still be looked up.
pub fn classify_with_hint(raw: &str, kind: InputKind) -> Result<Query, InvalidInputError> {
    let invalid = |reason| InvalidInputError {
        input: raw.to_string(),
        kind,
        reason,
    };

    match kind {
        InputKind::Auto => Ok(classify(raw)),
        InputKind::Asn => parse_prefixed_asn(raw)
            .map(Query::Asn)
            .ok_or_else(|| invalid("it should start with prefix 'AS', example: AS14421")),
        InputKind::Ip => raw
            .parse::<IpAddr>()
            .map(Query::Ip)
            .map_err(|_| invalid("not an IPv4 or IPv6 address")),
        InputKind::Domain => {
            if raw.parse::<IpAddr>().is_err() && is_domain(raw) {
                Ok(Query::Domain(raw.to_string()))
            } else {
                Err(invalid("not a domain name"))
            }
        }
        InputKind::Org => {
            if raw.trim().is_empty() {
                Err(invalid("empty organization name"))
            } else {
                Ok(Query::Org(raw.to_string()))
            }
        }
    }
}

/// Parse `AS<digits>` (case-insensitive). `AS-CHOOPA` and a bare `AS` are not ASNs.
pub fn parse_prefixed_asn(raw: &str) -> Option<u32> {
    let prefix = raw.get(..2)?;
    if !prefix.eq_ignore_ascii_case("as") {
        return None;
    }
    let rest = &raw[2..];
    if !is_numeric(rest) {
        return None;
    }
    rest.parse::<u32>().ok()
}

fn is_numeric(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Check a string against the domain name grammar
pub fn is_domain(raw: &str) -> bool {
    DOMAIN_REGEX
        .as_ref()
        .map(|re| re.is_match(raw))
        .unwrap_or(false)
}
