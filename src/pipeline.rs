//! The resolution pipeline.
//!
//! Titles are dispatched to at most `workers` concurrent tasks. Each task
//! takes a rate-limit token, resolves its title, formats the chosen hit and
//! hands back `(index, outcome)`. Results land in a slot per input position,
//! so output order always matches input order no matter which task finishes
//! first. Every `batch_size` successful resolutions a snapshot of the filled
//! slots is queued to a single checkpoint writer, which keeps checkpoints in
//! order on disk without holding up dispatch.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::backend::SearchBackend;
use crate::client::CrossrefClient;
use crate::config::Config;
use crate::error::Result;
use crate::rate_limit::RateLimiter;
use crate::resolver::Resolver;
use crate::ris::{format_candidate, RisRecord};
use crate::writer::{ResultSink, WriteOutcome};

/// Why a title produced no record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The search returned zero hits.
    NoHits,
    /// A hit was chosen but could not be formatted.
    Unformattable,
}

/// Result of processing one title.
#[derive(Debug, Clone, PartialEq)]
pub enum TitleOutcome {
    Resolved(RisRecord),
    Skipped(SkipReason),
    /// Resolution failed; the message is the final error.
    Failed(String),
}

/// Lifecycle of a title within a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TitleStatus {
    Pending,
    Dispatched,
    Resolved,
    Skipped(SkipReason),
    Failed(String),
}

impl TitleStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending | Self::Dispatched)
    }
}

/// A title that did not produce a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unresolved {
    pub index: usize,
    pub title: String,
    pub status: TitleStatus,
}

/// What happened during a run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub total: usize,
    pub resolved: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Titles never finished because the run was interrupted.
    pub abandoned: usize,
    pub interrupted: bool,
    pub checkpoints: usize,
    /// Records in input order.
    pub records: Vec<RisRecord>,
    /// Titles without a record, in input order.
    pub unresolved: Vec<Unresolved>,
    pub written: WriteOutcome,
}

/// Fans titles out to resolution tasks and collects their records.
pub struct Pipeline {
    resolver: Resolver,
    limiter: RateLimiter,
    workers: usize,
    batch_size: usize,
}

impl Pipeline {
    /// Build a pipeline over any search backend.
    ///
    /// Fails if `config` does not pass [`Config::validate`].
    pub fn new(config: &Config, backend: Arc<dyn SearchBackend>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            resolver: Resolver::new(backend, config),
            limiter: RateLimiter::new(config.rate_per_second, config.burst),
            workers: config.workers,
            batch_size: config.batch_size,
        })
    }

    /// Build a pipeline that queries the Crossref API.
    pub fn crossref(config: &Config) -> Result<Self> {
        config.validate()?;
        let client = CrossrefClient::new(config)?;
        Self::new(config, Arc::new(client))
    }

    /// Resolve every title, checkpointing along the way and flushing at the end.
    ///
    /// Cancelling `cancel` stops dispatch, abandons in-flight tasks and
    /// flushes whatever has completed.
    pub async fn run(
        &self,
        titles: &[String],
        sink: Arc<dyn ResultSink>,
        cancel: CancellationToken,
    ) -> RunSummary {
        let total = titles.len();
        let mut slots: Vec<Option<RisRecord>> = vec![None; total];
        let mut statuses: Vec<TitleStatus> = vec![TitleStatus::Pending; total];
        let mut queue = titles.iter().cloned().enumerate();
        let mut tasks: JoinSet<(usize, TitleOutcome)> = JoinSet::new();
        let mut successes = 0usize;
        let mut checkpoints = 0usize;

        let (checkpoint_tx, checkpoint_rx) = mpsc::unbounded_channel::<Vec<RisRecord>>();
        let checkpoint_writer = tokio::spawn(checkpoint_loop(checkpoint_rx, sink.clone()));

        info!(total, workers = self.workers, "starting run");

        loop {
            while tasks.len() < self.workers && !cancel.is_cancelled() {
                let Some((index, title)) = queue.next() else {
                    break;
                };
                statuses[index] = TitleStatus::Dispatched;
                tasks.spawn(process_title(
                    self.resolver.clone(),
                    self.limiter.clone(),
                    index,
                    total,
                    title,
                ));
            }

            if tasks.is_empty() {
                break;
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    warn!(in_flight = tasks.len(), "interrupted, abandoning in-flight titles");
                    tasks.abort_all();
                    break;
                }
                joined = tasks.join_next() => {
                    let Some(joined) = joined else { break };
                    let (index, outcome) = match joined {
                        Ok(done) => done,
                        Err(e) => {
                            error!(error = %e, "resolution task died");
                            continue;
                        }
                    };
                    match outcome {
                        TitleOutcome::Resolved(record) => {
                            slots[index] = Some(record);
                            statuses[index] = TitleStatus::Resolved;
                            successes += 1;
                            if successes % self.batch_size == 0 {
                                let snapshot: Vec<RisRecord> =
                                    slots.iter().flatten().cloned().collect();
                                info!(saved = snapshot.len(), "writing checkpoint");
                                if checkpoint_tx.send(snapshot).is_ok() {
                                    checkpoints += 1;
                                }
                            }
                        }
                        TitleOutcome::Skipped(reason) => {
                            statuses[index] = TitleStatus::Skipped(reason);
                        }
                        TitleOutcome::Failed(message) => {
                            statuses[index] = TitleStatus::Failed(message);
                        }
                    }
                }
            }
        }

        let interrupted =
            cancel.is_cancelled() && statuses.iter().any(|s| !s.is_terminal());
        if !interrupted {
            // Tasks that died without reporting.
            for status in statuses.iter_mut().filter(|s| !s.is_terminal()) {
                *status = TitleStatus::Failed("resolution task did not complete".into());
            }
        }

        drop(checkpoint_tx);
        if let Err(e) = checkpoint_writer.await {
            error!(error = %e, "checkpoint writer died");
        }

        let records: Vec<RisRecord> = slots.into_iter().flatten().collect();
        let written = {
            let records = records.clone();
            tokio::task::spawn_blocking(move || sink.finish(&records))
                .await
                .unwrap_or_else(|e| {
                    error!(error = %e, "final write panicked");
                    WriteOutcome::Failed
                })
        };

        let mut summary = RunSummary {
            total,
            resolved: 0,
            skipped: 0,
            failed: 0,
            abandoned: 0,
            interrupted,
            checkpoints,
            records,
            unresolved: Vec::new(),
            written,
        };
        for (index, (title, status)) in titles.iter().zip(statuses).enumerate() {
            match &status {
                TitleStatus::Resolved => {
                    summary.resolved += 1;
                    continue;
                }
                TitleStatus::Skipped(_) => summary.skipped += 1,
                TitleStatus::Failed(_) => summary.failed += 1,
                TitleStatus::Pending | TitleStatus::Dispatched => summary.abandoned += 1,
            }
            summary.unresolved.push(Unresolved {
                index,
                title: title.clone(),
                status,
            });
        }

        info!(
            resolved = summary.resolved,
            skipped = summary.skipped,
            failed = summary.failed,
            abandoned = summary.abandoned,
            "run finished"
        );
        summary
    }
}

/// Resolve and format one title.
async fn process_title(
    resolver: Resolver,
    limiter: RateLimiter,
    index: usize,
    total: usize,
    title: String,
) -> (usize, TitleOutcome) {
    limiter.acquire().await;
    info!(n = index + 1, total, title = %title, "resolving");

    let outcome = match resolver.resolve(&title).await {
        Ok(Some(candidate)) => match format_candidate(&candidate, resolver.patterns()) {
            Some(record) => {
                debug!(n = index + 1, doi = candidate.doi().unwrap_or("-"), "resolved");
                TitleOutcome::Resolved(record)
            }
            None => TitleOutcome::Skipped(SkipReason::Unformattable),
        },
        Ok(None) => TitleOutcome::Skipped(SkipReason::NoHits),
        Err(e) => {
            error!(n = index + 1, title = %title, error = %e, "resolution failed");
            TitleOutcome::Failed(e.to_string())
        }
    };
    (index, outcome)
}

/// Apply queued checkpoint snapshots one at a time, in order.
async fn checkpoint_loop(mut rx: mpsc::UnboundedReceiver<Vec<RisRecord>>, sink: Arc<dyn ResultSink>) {
    while let Some(snapshot) = rx.recv().await {
        let sink = sink.clone();
        if let Err(e) = tokio::task::spawn_blocking(move || sink.checkpoint(&snapshot)).await {
            error!(error = %e, "checkpoint write panicked");
        }
    }
}
