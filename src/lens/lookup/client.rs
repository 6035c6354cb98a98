//! Remote lookup service client
//!
//! Issues `GET {server}/api/v1/asnmap?{asn|ip|org}=<value>` with the API key
//! in the `X-PDCP-Key` header, and decodes the JSON array response into
//! [`ResultRecord`]s.

use super::error::LookupError;
use super::types::ResultRecord;
use crate::config::AsnmapConfig;
use anyhow::{anyhow, Result};
use std::io::{BufRead, BufReader};
use std::net::{IpAddr, TcpStream, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};
use ureq::http::Uri;

pub const DEFAULT_SERVER_URL: &str = "https://asn.projectdiscovery.io/";
const API_PATH: &str = "api/v1/asnmap";
const API_KEY_HEADER: &str = "X-PDCP-Key";
const PROXY_DIAL_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_BODY_SIZE: u64 = 64 * 1024 * 1024;

// =============================================================================
// Backend seam
// =============================================================================

/// One remote request parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryParam {
    Asn(String),
    Ip(IpAddr),
    Org(String),
}

impl QueryParam {
    pub fn name(&self) -> &'static str {
        match self {
            QueryParam::Asn(_) => "asn",
            QueryParam::Ip(_) => "ip",
            QueryParam::Org(_) => "org",
        }
    }

    pub fn value(&self) -> String {
        match self {
            QueryParam::Asn(v) | QueryParam::Org(v) => v.clone(),
            QueryParam::Ip(ip) => ip.to_string(),
        }
    }
}

impl std::fmt::Display for QueryParam {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.name(), self.value())
    }
}

/// Anything that can answer a single lookup request
pub trait LookupBackend: Send + Sync {
    fn lookup(&self, param: &QueryParam) -> Result<Vec<ResultRecord>, LookupError>;
}

// =============================================================================
// HTTP client
// =============================================================================

/// HTTP client for the lookup service
pub struct AsnmapClient {
    agent: ureq::Agent,
    url: String,
    api_key: Option<String>,
}

impl AsnmapClient {
    /// Build a client from configuration, selecting a working proxy if any are configured
    pub fn new(config: &AsnmapConfig) -> Result<Self> {
        let url = build_api_url(&config.server_url)?;

        let proxy = if config.proxy.is_empty() {
            None
        } else {
            let selected = select_proxy(&config.proxy)?;
            info!("using proxy {}", selected);
            Some(selected)
        };

        let mut builder = ureq::Agent::config_builder()
            .timeout_global(Some(config.timeout()))
            .http_status_as_error(false);
        if let Some(p) = &proxy {
            let p = ureq::Proxy::new(p).map_err(|e| anyhow!("invalid proxy {}: {}", p, e))?;
            builder = builder.proxy(Some(p));
        }
        let agent = ureq::Agent::new_with_config(builder.build());

        Ok(Self {
            agent,
            url,
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
        })
    }

    /// Full endpoint URL
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }
}

impl LookupBackend for AsnmapClient {
    fn lookup(&self, param: &QueryParam) -> Result<Vec<ResultRecord>, LookupError> {
        let api_key = self.api_key.as_deref().ok_or(LookupError::Unauthorized)?;

        debug!("requesting {}?{}", self.url, param);
        let mut response = self
            .agent
            .get(&self.url)
            .query(param.name(), param.value())
            .header(API_KEY_HEADER, api_key)
            .call()?;

        let status = response.status().as_u16();
        let body = response
            .body_mut()
            .with_config()
            .limit(MAX_BODY_SIZE)
            .read_to_string();

        if !(200..300).contains(&status) {
            return Err(LookupError::from_status(status, body.unwrap_or_default()));
        }

        parse_response(&body?)
    }
}

/// Decode a response body; an empty body or `null` means no records
pub fn parse_response(body: &str) -> Result<Vec<ResultRecord>, LookupError> {
    let trimmed = body.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(vec![]);
    }
    serde_json::from_str(trimmed).map_err(|e| LookupError::Decode(e.to_string()))
}

/// Replace the path of the configured server URL with the API path
pub fn build_api_url(server_url: &str) -> Result<String> {
    let uri: Uri = server_url
        .trim()
        .parse()
        .map_err(|e| anyhow!("invalid server url '{}': {}", server_url, e))?;

    let scheme = uri
        .scheme_str()
        .map(|s| s.to_ascii_lowercase())
        .unwrap_or_default();
    if scheme != "http" && scheme != "https" {
        return Err(anyhow!("host should start with http or https: {}", server_url));
    }

    let authority = uri
        .authority()
        .ok_or_else(|| anyhow!("server url has no host: {}", server_url))?;

    Ok(format!("{}://{}/{}", scheme, authority, API_PATH))
}

// =============================================================================
// Proxy selection
// =============================================================================

/// Pick the first reachable proxy
///
/// Each entry is either a proxy URL or a path to a file holding one proxy URL
/// per line.
pub fn select_proxy(entries: &[String]) -> Result<String, LookupError> {
    for entry in entries {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }

        let candidates = if Path::new(entry).is_file() {
            read_lines(entry).map_err(|e| {
                LookupError::InvalidProxy(format!("could not read proxy file '{}': {}", entry, e))
            })?
        } else {
            vec![entry.to_string()]
        };

        for candidate in candidates {
            match check_proxy(&candidate) {
                Ok(()) => return Ok(candidate),
                Err(e) => debug!("skipping proxy {}: {}", candidate, e),
            }
        }
    }
    Err(LookupError::InvalidProxy("no valid proxy found".to_string()))
}

fn read_lines(path: &str) -> std::io::Result<Vec<String>> {
    let file = std::fs::File::open(path)?;
    let mut lines = vec![];
    for line in BufReader::new(file).lines() {
        let line = line?;
        let line = line.trim();
        if !line.is_empty() {
            lines.push(line.to_string());
        }
    }
    Ok(lines)
}

/// Validate the scheme and try to connect to the proxy's host and port
fn check_proxy(proxy: &str) -> Result<(), LookupError> {
    let (host, port) = proxy_endpoint(proxy)?;

    let addrs = (host.as_str(), port)
        .to_socket_addrs()
        .map_err(|e| LookupError::InvalidProxy(format!("{}: {}", proxy, e)))?;

    for addr in addrs {
        if TcpStream::connect_timeout(&addr, PROXY_DIAL_TIMEOUT).is_ok() {
            return Ok(());
        }
    }
    Err(LookupError::InvalidProxy(format!("{}: unreachable", proxy)))
}

/// Host and port of a proxy URL, with the scheme's default port when omitted
pub fn proxy_endpoint(proxy: &str) -> Result<(String, u16), LookupError> {
    let invalid = |reason: &str| LookupError::InvalidProxy(format!("{}: {}", proxy, reason));

    let uri: Uri = proxy.parse().map_err(|_| invalid("not a URL"))?;
    let default_port = match uri.scheme_str() {
        Some("http") => 80,
        Some("https") => 443,
        Some("socks5") => 1080,
        Some(other) => return Err(invalid(&format!("invalid proxy scheme: {}", other))),
        None => return Err(invalid("missing scheme")),
    };
    let host = uri.host().ok_or_else(|| invalid("missing host"))?;
    let host = host.trim_start_matches('[').trim_end_matches(']').to_string();

    Ok((host, uri.port_u16().unwrap_or(default_port)))
}
