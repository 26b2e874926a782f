//! Batch reconciliation of a playlist's lines.
//!
//! Lines are resolved in input order. With `workers > 0` they are resolved in
//! windows on a rayon pool and merged back by line index, so the report is
//! identical to a sequential run. An abort (bad credentials, or too many
//! provider failures in a row) stops between lines and hands back the
//! partial report for flushing.

use indicatif::ProgressBar;
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{ReconcileConfig, LINES_PER_WORKER};
use crate::models::{RejectReason, ReconciliationReport, ResolutionResult};
use crate::progress::{create_progress_bar, log_progress};
use crate::provider::{SearchError, SearchProvider};
use crate::query::parse;
use crate::resolver::MatchResolver;

/// Lines between progress log entries in log-only mode
const LOG_INTERVAL: u64 = 25;

/// A batch stopped early. `partial` holds everything resolved before the stop.
#[derive(Debug, Error)]
#[error("reconciliation of '{playlist}' aborted: {cause}")]
pub struct Aborted {
    pub playlist: String,
    pub partial: ReconciliationReport,
    #[source]
    pub cause: SearchError,
}

/// Running state for one playlist.
struct Tally {
    report: ReconciliationReport,
    consecutive_failures: usize,
    max_consecutive_failures: usize,
}

/// What to do after recording a line.
enum Step {
    Continue,
    /// Stop; `consumed` says whether the current line made it into the report
    Abort { cause: SearchError, consumed: bool },
}

impl Tally {
    fn record(&mut self, line: &str, outcome: Result<ResolutionResult, SearchError>) -> Step {
        let result = match outcome {
            Ok(result) => result,
            Err(cause) => {
                return Step::Abort {
                    cause,
                    consumed: false,
                }
            }
        };

        debug!(
            line,
            accepted = result.is_accepted(),
            confidence = result.confidence(),
            "line resolved"
        );

        let failure = match &result {
            ResolutionResult::Rejected {
                reason: RejectReason::ProviderError(e),
                ..
            } => Some(e.clone()),
            _ => None,
        };
        self.report.push(line, result);

        match failure {
            Some(last) => {
                self.consecutive_failures += 1;
                if self.max_consecutive_failures > 0
                    && self.consecutive_failures >= self.max_consecutive_failures
                {
                    return Step::Abort {
                        cause: SearchError::RepeatedFailures {
                            count: self.consecutive_failures,
                            last,
                        },
                        consumed: true,
                    };
                }
            }
            None => self.consecutive_failures = 0,
        }
        Step::Continue
    }
}

pub struct Reconciler<P> {
    resolver: MatchResolver<P>,
    max_consecutive_failures: usize,
    pool: Option<rayon::ThreadPool>,
}

impl<P: SearchProvider> Reconciler<P> {
    /// Takes the failure limit and worker count from `config`. The resolver
    /// already carries its page size; the threshold is passed per call.
    pub fn new(resolver: MatchResolver<P>, config: ReconcileConfig) -> Self {
        let pool = if config.workers > 0 {
            match rayon::ThreadPoolBuilder::new()
                .num_threads(config.workers)
                .thread_name(|i| format!("reconcile-{}", i))
                .build()
            {
                Ok(pool) => Some(pool),
                Err(e) => {
                    warn!(error = %e, "failed to build worker pool, resolving sequentially");
                    None
                }
            }
        } else {
            None
        };

        Self {
            resolver,
            max_consecutive_failures: config.max_consecutive_failures,
            pool,
        }
    }

    fn resolve_line(&self, line: &str, threshold: f64) -> Result<ResolutionResult, SearchError> {
        self.resolver.resolve(&parse(line), threshold)
    }

    /// Resolve every line of a playlist.
    ///
    /// Returns the full report, or [`Aborted`] with the partial report when a
    /// fatal provider error stops the batch. Lines after the stop point are
    /// listed in `partial.skipped`.
    pub fn reconcile(
        &self,
        playlist: &str,
        lines: &[String],
        threshold: f64,
    ) -> Result<ReconciliationReport, Aborted> {
        let start = Instant::now();
        let pb = create_progress_bar(lines.len() as u64, playlist);

        let mut tally = Tally {
            report: ReconciliationReport::new(playlist, lines.len()),
            consecutive_failures: 0,
            max_consecutive_failures: self.max_consecutive_failures,
        };

        let stopped = match &self.pool {
            Some(pool) => self.run_windows(pool, playlist, lines, threshold, &mut tally, &pb),
            None => self.run_sequential(playlist, lines, threshold, &mut tally, &pb),
        };

        let mut report = tally.report;
        report.stats.elapsed_seconds = start.elapsed().as_secs_f64();

        match stopped {
            None => {
                pb.finish_and_clear();
                info!(
                    playlist,
                    accepted = report.accepted.len(),
                    rejected = report.rejected.len(),
                    "playlist reconciled"
                );
                Ok(report)
            }
            Some((resume_at, cause)) => {
                pb.abandon();
                report.skipped = lines[resume_at..].to_vec();
                report.stats.skipped = report.skipped.len();
                warn!(
                    playlist,
                    processed = report.processed(),
                    skipped = report.skipped.len(),
                    error = %cause,
                    "reconciliation aborted"
                );
                Err(Aborted {
                    playlist: playlist.to_string(),
                    partial: report,
                    cause,
                })
            }
        }
    }

    /// Returns the index of the first unprocessed line and the cause, if stopped.
    fn run_sequential(
        &self,
        playlist: &str,
        lines: &[String],
        threshold: f64,
        tally: &mut Tally,
        pb: &ProgressBar,
    ) -> Option<(usize, SearchError)> {
        let total = lines.len() as u64;
        for (i, line) in lines.iter().enumerate() {
            let outcome = self.resolve_line(line, threshold);
            pb.inc(1);
            log_progress(playlist, i as u64 + 1, total, LOG_INTERVAL);

            if let Step::Abort { cause, consumed } = tally.record(line, outcome) {
                return Some((if consumed { i + 1 } else { i }, cause));
            }
        }
        None
    }

    fn run_windows(
        &self,
        pool: &rayon::ThreadPool,
        playlist: &str,
        lines: &[String],
        threshold: f64,
        tally: &mut Tally,
        pb: &ProgressBar,
    ) -> Option<(usize, SearchError)> {
        let window = pool.current_num_threads().max(1) * LINES_PER_WORKER;
        let total = lines.len() as u64;
        let fatal_seen = AtomicBool::new(false);

        for (w, chunk) in lines.chunks(window).enumerate() {
            let base = w * window;
            // `None` marks a line left unsearched after a fatal error in the window
            let mut outcomes: Vec<Option<Result<ResolutionResult, SearchError>>> =
                pool.install(|| {
                    chunk
                        .par_iter()
                        .map(|line| {
                            if fatal_seen.load(Ordering::Acquire) {
                                return None;
                            }
                            let outcome = self.resolve_line(line, threshold);
                            if outcome.is_err() {
                                fatal_seen.store(true, Ordering::Release);
                            }
                            pb.inc(1);
                            Some(outcome)
                        })
                        .collect()
                });

            let fatal_at = outcomes.iter().position(|o| matches!(o, Some(Err(_))));
            let mut fatal = fatal_at
                .and_then(|i| outcomes[i].take())
                .and_then(Result::err);

            for (offset, (line, outcome)) in chunk.iter().zip(outcomes).enumerate() {
                let index = base + offset;
                let Some(outcome) = outcome else {
                    match fatal.take() {
                        Some(cause) => return Some((index, cause)),
                        None => continue,
                    }
                };
                log_progress(playlist, index as u64 + 1, total, LOG_INTERVAL);
                if let Step::Abort { cause, consumed } = tally.record(line, outcome) {
                    return Some((if consumed { index + 1 } else { index }, cause));
                }
            }
        }
        None
    }
}
