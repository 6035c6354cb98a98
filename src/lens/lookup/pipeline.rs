//! Concurrent lookup pipeline
//!
//! Inputs are de-duplicated by their literal string, classified, and
//! dispatched on a bounded rayon pool. Each worker sends its finished batch
//! over a channel; the calling thread is the single consumer and receives
//! batches in completion order.
//!
//! A dispatch error for a direct query (ASN, IP, organization) stops the
//! run: workers stop picking up new inputs and no further batches are handed
//! to the consumer. The stop flag is scoped to one run, so the pipeline can
//! be reused afterwards.
//!
//! Cancelling through a [`CancelHandle`] only stops new lookups; batches
//! that are already finished are still delivered.

use super::dispatch::Dispatcher;
use super::error::LookupError;
use super::types::ResultBatch;
use crate::lens::query::{classify_with_hint, InputKind, InvalidInputError, Query};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use thiserror::Error;
use tracing::{debug, info};

/// Default number of concurrent lookups
pub const DEFAULT_CONCURRENCY: usize = 16;

// =============================================================================
// Types
// =============================================================================

/// A raw input together with where it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupInput {
    pub raw: String,
    pub kind: InputKind,
}

impl LookupInput {
    pub fn new(raw: &str, kind: InputKind) -> Self {
        Self {
            raw: raw.to_string(),
            kind,
        }
    }

    pub fn auto(raw: &str) -> Self {
        Self::new(raw, InputKind::Auto)
    }
}

/// Errors that end a pipeline run
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{input}: {source}")]
    Lookup { input: String, source: LookupError },
    #[error(transparent)]
    InvalidInput(#[from] InvalidInputError),
    #[error("failed to handle results: {0}")]
    Consumer(anyhow::Error),
    #[error("failed to build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
    #[error("worker thread panicked")]
    WorkerPanicked,
}

impl PipelineError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            PipelineError::Lookup {
                source: LookupError::Unauthorized,
                ..
            }
        )
    }
}

/// Counters for one finished run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineSummary {
    /// Distinct inputs submitted
    pub inputs: usize,
    /// Batches handed to the consumer
    pub batches: usize,
    /// Records handed to the consumer
    pub records: usize,
    /// Batches without any record
    pub empty: usize,
    /// Run was stopped through its [`CancelHandle`]
    pub interrupted: bool,
}

/// Shared flag used to stop a running pipeline
///
/// Only the caller sets it; once cancelled, later runs start interrupted.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Message sent from workers to the collector
enum WorkerMessage {
    Batch(ResultBatch),
    Failed { input: String, error: LookupError },
}

// =============================================================================
// Pipeline
// =============================================================================

/// Runs lookups for a batch of inputs on a bounded worker pool
pub struct Pipeline {
    dispatcher: Arc<Dispatcher>,
    pool: Arc<rayon::ThreadPool>,
    cancel: CancelHandle,
}

impl Pipeline {
    pub fn new(dispatcher: Dispatcher, concurrency: usize) -> Result<Self, PipelineError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(concurrency.max(1))
            .thread_name(|i| format!("asnmap-worker-{}", i))
            .build()?;
        Ok(Self {
            dispatcher: Arc::new(dispatcher),
            pool: Arc::new(pool),
            cancel: CancelHandle::new(),
        })
    }

    /// Handle that stops this pipeline when cancelled
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Classify and dispatch all inputs, handing each finished batch to `on_batch`
    ///
    /// Inputs are trimmed; empty and repeated inputs are skipped. Inputs that
    /// do not fit their [`InputKind`] fail the run before anything is sent.
    pub fn run<F>(&self, inputs: Vec<LookupInput>, mut on_batch: F) -> Result<PipelineSummary, PipelineError>
    where
        F: FnMut(ResultBatch) -> anyhow::Result<()>,
    {
        let queries = prepare_queries(inputs)?;
        let mut summary = PipelineSummary {
            inputs: queries.len(),
            ..Default::default()
        };
        info!("looking up {} input(s)", queries.len());

        let (sender, receiver): (Sender<WorkerMessage>, Receiver<WorkerMessage>) = channel();

        // the consumer stays on this thread; workers run on the pool
        let dispatcher = Arc::clone(&self.dispatcher);
        let pool = Arc::clone(&self.pool);
        let cancel = self.cancel.clone();
        // fail-fast flag for this run only
        let stop = Arc::new(AtomicBool::new(false));
        let worker_stop = Arc::clone(&stop);
        let producer = thread::spawn(move || {
            pool.install(|| {
                queries.into_par_iter().for_each_with(sender, |s, (raw, query)| {
                    if cancel.is_cancelled() || worker_stop.load(Ordering::SeqCst) {
                        return;
                    }
                    let msg = match dispatcher.dispatch(&raw, &query) {
                        Ok(records) => WorkerMessage::Batch(ResultBatch {
                            input: raw,
                            kind: query.kind(),
                            records,
                        }),
                        Err(error) => WorkerMessage::Failed { input: raw, error },
                    };
                    if s.send(msg).is_err() {
                        // collector is gone
                        worker_stop.store(true, Ordering::SeqCst);
                    }
                });
            });
        });

        let mut failure: Option<PipelineError> = None;
        for msg in receiver {
            if failure.is_some() {
                // drain so workers can finish
                continue;
            }
            match msg {
                WorkerMessage::Batch(batch) => {
                    if batch.is_empty() {
                        debug!("no records found for {}", batch.input);
                        summary.empty += 1;
                    }
                    summary.batches += 1;
                    summary.records += batch.len();
                    if let Err(e) = on_batch(batch) {
                        stop.store(true, Ordering::SeqCst);
                        failure = Some(PipelineError::Consumer(e));
                    }
                }
                WorkerMessage::Failed { input, error } => {
                    stop.store(true, Ordering::SeqCst);
                    failure = Some(PipelineError::Lookup {
                        input,
                        source: error,
                    });
                }
            }
        }

        if producer.join().is_err() {
            return Err(PipelineError::WorkerPanicked);
        }
        if let Some(e) = failure {
            return Err(e);
        }

        summary.interrupted = self.cancel.is_cancelled();
        info!(
            "finished {} input(s): {} record(s), {} empty",
            summary.batches, summary.records, summary.empty
        );
        Ok(summary)
    }
}

/// Trim, drop empty and repeated inputs, then classify
fn prepare_queries(inputs: Vec<LookupInput>) -> Result<Vec<(String, Query)>, PipelineError> {
    let mut seen = HashSet::new();
    let mut queries = vec![];
    for input in inputs {
        let raw = input.raw.trim();
        if raw.is_empty() || !seen.insert(raw.to_string()) {
            continue;
        }
        let query = classify_with_hint(raw, input.kind)?;
        queries.push((raw.to_string(), query));
    }
    Ok(queries)
}
