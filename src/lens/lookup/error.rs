use thiserror::Error;

/// Errors raised while looking up an input
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    /// Credential missing or rejected (HTTP 401)
    #[error("unauthorized: missing or invalid api key (get a free api key from https://cloud.projectdiscovery.io/?ref=api_key)")]
    Unauthorized,
    /// The service rejected the request (HTTP 400); carries the response body
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Transport failure or any other non-2xx status
    #[error("network error: {0}")]
    Network(String),
    /// DNS resolution failed
    #[error("could not resolve '{host}': {reason}")]
    Resolution { host: String, reason: String },
    /// Response body was not the expected JSON
    #[error("could not decode response: {0}")]
    Decode(String),
    /// The input cannot be turned into a request
    #[error("unknown input type: '{0}'")]
    UnknownInput(String),
    #[error("invalid proxy: {0}")]
    InvalidProxy(String),
}

impl LookupError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, LookupError::Unauthorized)
    }

    /// Map a non-success HTTP status to an error
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 => LookupError::Unauthorized,
            400 => LookupError::BadRequest(body),
            _ => LookupError::Network(format!("unexpected status code {}", status)),
        }
    }
}

impl From<ureq::Error> for LookupError {
    fn from(e: ureq::Error) -> Self {
        match e {
            ureq::Error::StatusCode(401) => LookupError::Unauthorized,
            ureq::Error::StatusCode(code) => LookupError::from_status(code, String::new()),
            other => LookupError::Network(other.to_string()),
        }
    }
}
