//! ASN lookup lens
//!
//! Maps ASNs, IP addresses, domains and organization names to the address
//! ranges announced by the owning autonomous systems.
//!
//! # Example
//!
//! ```rust,ignore
//! use asnmap::config::AsnmapConfig;
//! use asnmap::lens::lookup::{LookupInput, LookupLens};
//!
//! let config = AsnmapConfig::new(&None)?;
//! let lens = LookupLens::new(&config)?;
//!
//! let summary = lens.run(vec![LookupInput::auto("AS14421")], |batch| {
//!     for record in &batch.records {
//!         println!("{:?}", record.cidrs()?);
//!     }
//!     Ok(())
//! })?;
//! println!("{} record(s)", summary.records);
//! ```

mod client;
mod dedup;
mod dispatch;
mod error;
mod format;
mod pipeline;
mod resolver;
mod types;

pub use client::{
    build_api_url, parse_response, select_proxy, AsnmapClient, LookupBackend, QueryParam,
    DEFAULT_SERVER_URL,
};
pub use dedup::{is_duplicate, DedupSet};
pub use dispatch::Dispatcher;
pub use error::LookupError;
pub use format::{attach_prefix, batch_cidrs, filter_ipv6, format_records, MappedResult, CSV_HEADER};
pub use pipeline::{
    CancelHandle, LookupInput, Pipeline, PipelineError, PipelineSummary, DEFAULT_CONCURRENCY,
};
pub use resolver::{DnsResolver, HostResolver};
pub use types::{dedup_key, DedupKey, ResultBatch, ResultRecord};

use crate::config::AsnmapConfig;
use crate::lens::query::classify;
use anyhow::Result;
use std::sync::Arc;
use tracing::debug;

// =============================================================================
// Lens
// =============================================================================

/// ASN lookup lens
///
/// Owns the remote client, the DNS resolver and the worker pool. A lens can
/// be reused after a failed run.
pub struct LookupLens {
    dispatcher: Dispatcher,
    pipeline: Pipeline,
}

impl LookupLens {
    /// Build a lens from configuration
    pub fn new(config: &AsnmapConfig) -> Result<Self> {
        let client = AsnmapClient::new(config)?;
        debug!("lookup endpoint: {}", client.url());
        let resolver = DnsResolver::new(&config.resolvers)?;
        if !resolver.nameservers().is_empty() {
            debug!("using resolvers: {:?}", resolver.nameservers());
        }
        Self::with_backends(Arc::new(client), Arc::new(resolver), config.concurrency)
    }

    /// Build a lens around custom backends
    pub fn with_backends(
        backend: Arc<dyn LookupBackend>,
        resolver: Arc<dyn HostResolver>,
        concurrency: usize,
    ) -> Result<Self> {
        let dispatcher = Dispatcher::new(backend, resolver);
        let pipeline = Pipeline::new(dispatcher.clone(), concurrency)?;
        Ok(Self {
            dispatcher,
            pipeline,
        })
    }

    /// Handle that stops a running [`LookupLens::run`]
    pub fn cancel_handle(&self) -> CancelHandle {
        self.pipeline.cancel_handle()
    }

    /// Look up all inputs concurrently, handing each finished batch to `on_batch`
    pub fn run<F>(
        &self,
        inputs: Vec<LookupInput>,
        on_batch: F,
    ) -> Result<PipelineSummary, PipelineError>
    where
        F: FnMut(ResultBatch) -> anyhow::Result<()>,
    {
        self.pipeline.run(inputs, on_batch)
    }

    /// Look up a single input on the calling thread
    pub fn lookup(&self, raw: &str) -> Result<Vec<ResultRecord>, LookupError> {
        let raw = raw.trim();
        self.dispatcher.dispatch(raw, &classify(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::dispatch::tests::{record, FakeBackend, FakeResolver};
    use super::*;

    #[test]
    fn test_lens_lookup() {
        let backend = FakeBackend::default().with(
            "ip=104.16.99.52",
            vec![record(13335, "CLOUDFLARENET", "104.16.0.0", "104.21.127.255")],
        );
        let lens =
            LookupLens::with_backends(Arc::new(backend), Arc::new(FakeResolver::default()), 2)
                .unwrap();

        let records = lens.lookup(" 104.16.99.52 ").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].source_input, "104.16.99.52");
        assert_eq!(records[0].cidrs().unwrap().len(), 3);

        assert!(matches!(lens.lookup(""), Err(LookupError::UnknownInput(_))));
    }

    #[test]
    fn test_lens_run() {
        let backend = FakeBackend::default()
            .with("asn=14421", vec![record(14421, "THERAVANCE", "216.101.17.0", "216.101.17.255")]);
        let lens =
            LookupLens::with_backends(Arc::new(backend), Arc::new(FakeResolver::default()), 2)
                .unwrap();

        let mut lines = vec![];
        let summary = lens
            .run(vec![LookupInput::auto("AS14421")], |batch| {
                lines.extend(format_records(
                    &batch.records,
                    crate::lens::utils::OutputFormat::Cidr,
                    false,
                )?);
                Ok(())
            })
            .unwrap();
        assert_eq!(summary.records, 1);
        assert_eq!(lines, vec!["216.101.17.0/24"]);
    }
}
