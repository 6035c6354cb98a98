//! Query dispatch
//!
//! Direct queries (ASN, ASN id, IP, organization) are answered by one remote
//! request. Domains are resolved first and every resolved address is looked
//! up on its own; the per-address results are merged through a [`DedupSet`]
//! scoped to that one domain.
//!
//! A failed request for one resolved address is logged and skipped, so a
//! single bad address does not sink the whole domain. An unauthorized
//! response is the exception: it is returned, since every sibling request
//! would fail the same way.

use super::client::{LookupBackend, QueryParam};
use super::dedup::DedupSet;
use super::error::LookupError;
use super::resolver::HostResolver;
use super::types::ResultRecord;
use crate::lens::query::Query;
use rayon::prelude::*;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{debug, warn};

/// Routes classified queries to the lookup backend
#[derive(Clone)]
pub struct Dispatcher {
    backend: Arc<dyn LookupBackend>,
    resolver: Arc<dyn HostResolver>,
}

impl Dispatcher {
    pub fn new(backend: Arc<dyn LookupBackend>, resolver: Arc<dyn HostResolver>) -> Self {
        Self { backend, resolver }
    }

    /// Dispatch one query
    ///
    /// `source` is the raw input string and ends up as every returned
    /// record's `source_input`.
    pub fn dispatch(&self, source: &str, query: &Query) -> Result<Vec<ResultRecord>, LookupError> {
        let param = match query {
            Query::Asn(asn) => QueryParam::Asn(asn.to_string()),
            Query::AsnId(id) => QueryParam::Asn(id.clone()),
            Query::Ip(ip) => QueryParam::Ip(*ip),
            Query::Org(org) => QueryParam::Org(org.clone()),
            Query::Domain(domain) => return self.dispatch_domain(source, domain),
            Query::Unknown(raw) => return Err(LookupError::UnknownInput(raw.clone())),
        };

        let records = self.backend.lookup(&param)?;
        Ok(records
            .into_iter()
            .map(|r| r.with_source(source))
            .collect())
    }

    fn dispatch_domain(&self, source: &str, domain: &str) -> Result<Vec<ResultRecord>, LookupError> {
        let addrs = match self.resolver.resolve(domain) {
            Ok(addrs) => addrs,
            Err(e) => {
                debug!("{}", e);
                return Ok(vec![]);
            }
        };

        if addrs.is_empty() {
            debug!("no addresses found for {}", domain);
            return Ok(vec![]);
        }
        debug!("{} resolved to {} address(es)", domain, addrs.len());

        let responses: Vec<(IpAddr, Result<Vec<ResultRecord>, LookupError>)> = addrs
            .par_iter()
            .map(|ip| (*ip, self.backend.lookup(&QueryParam::Ip(*ip))))
            .collect();

        let mut merged = DedupSet::new();
        for (ip, response) in responses {
            match response {
                Ok(records) => merged.extend(records.into_iter().map(|r| r.with_source(source))),
                Err(LookupError::Unauthorized) => return Err(LookupError::Unauthorized),
                Err(e) => warn!("lookup for {} ({}) failed, skipping: {}", ip, domain, e),
            }
        }

        if merged.dropped() > 0 {
            debug!("dropped {} duplicate record(s) for {}", merged.dropped(), domain);
        }
        Ok(merged.into_records())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Backend answering from a fixed table, recording every request
    #[derive(Default)]
    pub(crate) struct FakeBackend {
        pub responses: HashMap<String, Result<Vec<ResultRecord>, LookupError>>,
        pub requests: Mutex<Vec<String>>,
    }

    impl FakeBackend {
        pub fn with(mut self, param: &str, records: Vec<ResultRecord>) -> Self {
            self.responses.insert(param.to_string(), Ok(records));
            self
        }

        pub fn failing(mut self, param: &str, error: LookupError) -> Self {
            self.responses.insert(param.to_string(), Err(error));
            self
        }

        pub fn request_count(&self) -> usize {
            self.requests.lock().map(|r| r.len()).unwrap_or(0)
        }
    }

    impl LookupBackend for FakeBackend {
        fn lookup(&self, param: &QueryParam) -> Result<Vec<ResultRecord>, LookupError> {
            let key = param.to_string();
            self.requests.lock().unwrap().push(key.clone());
            self.responses.get(&key).cloned().unwrap_or_else(|| Ok(vec![]))
        }
    }

    #[derive(Default)]
    pub(crate) struct FakeResolver {
        pub hosts: HashMap<String, Result<Vec<IpAddr>, LookupError>>,
    }

    impl FakeResolver {
        pub fn with(mut self, host: &str, addrs: &[&str]) -> Self {
            let addrs = addrs.iter().map(|a| a.parse().unwrap()).collect();
            self.hosts.insert(host.to_string(), Ok(addrs));
            self
        }

        pub fn failing(mut self, host: &str) -> Self {
            self.hosts.insert(
                host.to_string(),
                Err(LookupError::Resolution {
                    host: host.to_string(),
                    reason: "SERVFAIL".to_string(),
                }),
            );
            self
        }
    }

    impl HostResolver for FakeResolver {
        fn resolve(&self, host: &str) -> Result<Vec<IpAddr>, LookupError> {
            self.hosts.get(host).cloned().unwrap_or_else(|| Ok(vec![]))
        }
    }

    pub(crate) fn record(asn: u32, org: &str, first: &str, last: &str) -> ResultRecord {
        ResultRecord::new(first.parse().unwrap(), last.parse().unwrap(), asn, "US", org)
    }

    fn build(backend: FakeBackend, resolver: FakeResolver) -> (Dispatcher, Arc<FakeBackend>) {
        let backend = Arc::new(backend);
        (
            Dispatcher::new(backend.clone(), Arc::new(resolver)),
            backend,
        )
    }

    #[test]
    fn test_dispatch_asn() {
        let backend = FakeBackend::default().with(
            "asn=14421",
            vec![record(14421, "THERAVANCE", "216.101.17.0", "216.101.17.255")],
        );
        let (dispatcher, backend) = build(backend, FakeResolver::default());

        let records = dispatcher.dispatch("AS14421", &Query::Asn(14421)).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].source_input, "AS14421");
        assert_eq!(backend.requests.lock().unwrap()[0], "asn=14421");

        let records = dispatcher
            .dispatch("14421", &Query::AsnId("14421".to_string()))
            .unwrap();
        assert_eq!(records[0].source_input, "14421");
    }

    #[test]
    fn test_dispatch_ip_and_org_params() {
        let (dispatcher, backend) = build(FakeBackend::default(), FakeResolver::default());
        dispatcher
            .dispatch("104.16.99.52", &Query::Ip("104.16.99.52".parse().unwrap()))
            .unwrap();
        dispatcher
            .dispatch("PPLINKNET", &Query::Org("PPLINKNET".to_string()))
            .unwrap();
        let requests = backend.requests.lock().unwrap().clone();
        assert_eq!(requests, vec!["ip=104.16.99.52", "org=PPLINKNET"]);
    }

    #[test]
    fn test_dispatch_direct_error_propagates() {
        let backend = FakeBackend::default()
            .failing("org=BROKEN", LookupError::BadRequest("bad org".to_string()));
        let (dispatcher, _) = build(backend, FakeResolver::default());
        let err = dispatcher
            .dispatch("BROKEN", &Query::Org("BROKEN".to_string()))
            .unwrap_err();
        assert_eq!(err, LookupError::BadRequest("bad org".to_string()));
    }

    #[test]
    fn test_dispatch_unknown() {
        let (dispatcher, backend) = build(FakeBackend::default(), FakeResolver::default());
        let err = dispatcher
            .dispatch("", &Query::Unknown(String::new()))
            .unwrap_err();
        assert!(matches!(err, LookupError::UnknownInput(_)));
        assert_eq!(backend.request_count(), 0);
    }

    #[test]
    fn test_domain_fan_out_dedups() {
        let backend = FakeBackend::default()
            .with("ip=142.250.183.110", vec![record(15169, "GOOGLE", "142.250.0.0", "142.251.255.255")])
            .with("ip=172.217.0.46", vec![record(15169, "Google", "172.217.0.0", "172.217.255.255")]);
        let resolver =
            FakeResolver::default().with("google.com", &["142.250.183.110", "172.217.0.46"]);
        let (dispatcher, backend) = build(backend, resolver);

        let records = dispatcher
            .dispatch("google.com", &Query::Domain("google.com".to_string()))
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].asn_number, 15169);
        assert_eq!(records[0].source_input, "google.com");
        assert_eq!(backend.request_count(), 2);
    }

    #[test]
    fn test_domain_fan_out_keeps_distinct_orgs() {
        let backend = FakeBackend::default()
            .with("ip=1.1.1.1", vec![record(13335, "CLOUDFLARENET", "1.1.1.0", "1.1.1.255")])
            .with("ip=8.8.8.8", vec![record(15169, "GOOGLE", "8.8.8.0", "8.8.8.255")]);
        let resolver = FakeResolver::default().with("mixed.example.com", &["1.1.1.1", "8.8.8.8"]);
        let (dispatcher, _) = build(backend, resolver);

        let records = dispatcher
            .dispatch("mixed.example.com", &Query::Domain("mixed.example.com".to_string()))
            .unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.source_input == "mixed.example.com"));
    }

    #[test]
    fn test_domain_continues_past_failed_ip() {
        let backend = FakeBackend::default()
            .failing("ip=10.0.0.1", LookupError::Network("connection reset".to_string()))
            .with("ip=10.0.0.2", vec![record(64500, "EXAMPLE", "10.0.0.0", "10.0.0.255")]);
        let resolver = FakeResolver::default().with("example.com", &["10.0.0.1", "10.0.0.2"]);
        let (dispatcher, _) = build(backend, resolver);

        let records = dispatcher
            .dispatch("example.com", &Query::Domain("example.com".to_string()))
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].asn_number, 64500);
    }

    #[test]
    fn test_domain_unauthorized_propagates() {
        let backend = FakeBackend::default().failing("ip=10.0.0.1", LookupError::Unauthorized);
        let resolver = FakeResolver::default().with("example.com", &["10.0.0.1"]);
        let (dispatcher, _) = build(backend, resolver);

        let err = dispatcher
            .dispatch("example.com", &Query::Domain("example.com".to_string()))
            .unwrap_err();
        assert!(err.is_unauthorized());
    }

    #[test]
    fn test_unresolved_domain_is_empty() {
        let resolver = FakeResolver::default()
            .with("vacant.example.com", &[])
            .failing("broken.example.com");
        let (dispatcher, backend) = build(FakeBackend::default(), resolver);

        for domain in ["vacant.example.com", "broken.example.com", "missing.example.com"] {
            let records = dispatcher
                .dispatch(domain, &Query::Domain(domain.to_string()))
                .unwrap();
            assert!(records.is_empty());
        }
        assert_eq!(backend.request_count(), 0);
    }

    #[test]
    fn test_dispatch_idempotent() {
        let backend = FakeBackend::default().with(
            "ip=104.16.99.52",
            vec![record(13335, "CLOUDFLARENET", "104.16.0.0", "104.21.127.255")],
        );
        let (dispatcher, _) = build(backend, FakeResolver::default());
        let query = Query::Ip("104.16.99.52".parse().unwrap());

        let first = dispatcher.dispatch("104.16.99.52", &query).unwrap();
        let second = dispatcher.dispatch("104.16.99.52", &query).unwrap();
        assert_eq!(first, second);
        assert_eq!(first[0].first_address, second[0].first_address);
        assert_eq!(first[0].last_address, second[0].last_address);
    }
}
