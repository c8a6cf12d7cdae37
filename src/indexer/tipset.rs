// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::sync::Arc;
use std::time::Instant;

use anyhow::Context as _;
use chrono::{DateTime, Utc};
use futures::FutureExt as _;
use futures::future::{BoxFuture, Shared};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, instrument, trace};

use super::{IndexError, Severity};
use crate::blocks::Tipset;
use crate::chain::{ActorStateChanges, ChainSource};
use crate::model::{ProcessingReport, Record};
use crate::tasks::{ActorContext, ActorProcessor, Extraction, Processor, TaskSpec};
use crate::utils::format_elapsed;

/// Outcome of one task for one tipset.
#[derive(Debug, Clone)]
pub struct TaskResult {
    pub task: String,
    pub records: Vec<Record>,
    pub report: ProcessingReport,
}

impl TaskResult {
    pub fn is_success(&self) -> bool {
        self.report.is_success()
    }
}

/// Receiving ends of an indexing run. `results` closes once every task has
/// reported or the run was aborted; `fatal` carries at most one error that
/// invalidates the whole tipset.
pub struct ResultStream {
    pub results: mpsc::Receiver<TaskResult>,
    pub fatal: mpsc::Receiver<anyhow::Error>,
}

type SharedChanges = Shared<BoxFuture<'static, Result<Arc<ActorStateChanges>, Arc<anyhow::Error>>>>;

/// Runs a fixed set of tasks against a tipset and the tipset it executed.
pub struct TipSetIndexer {
    chain: Arc<dyn ChainSource>,
    name: String,
    tasks: Vec<TaskSpec>,
}

impl TipSetIndexer {
    pub fn new(chain: Arc<dyn ChainSource>, name: impl Into<String>, tasks: Vec<TaskSpec>) -> Self {
        Self {
            chain,
            name: name.into(),
            tasks,
        }
    }

    /// Reporter name stamped into every report.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tasks(&self) -> &[TaskSpec] {
        &self.tasks
    }

    pub fn chain(&self) -> &Arc<dyn ChainSource> {
        &self.chain
    }

    /// Starts every task for `current` and returns their result stream.
    /// Genesis has nothing to diff against and yields a stream that is
    /// already closed. Canceling `cancel` stops tasks that have not reported
    /// yet; they produce no result.
    #[instrument(skip_all, fields(height = current.epoch()))]
    pub async fn index(
        &self,
        current: &Tipset,
        cancel: CancellationToken,
    ) -> anyhow::Result<ResultStream> {
        let (results_tx, results) = mpsc::channel(self.tasks.len().max(1));
        let (fatal_tx, fatal) = mpsc::channel(1);
        if current.epoch() == 0 {
            debug!("no parent state to diff against");
            return Ok(ResultStream { results, fatal });
        }
        let executed = self
            .chain
            .tipset(current.parents())
            .await
            .with_context(|| format!("loading parent of tipset at {}", current.epoch()))?;

        let run = Run {
            chain: self.chain.clone(),
            reporter: self.name.clone(),
            current: current.clone(),
            executed,
            cancel,
        };
        tokio::spawn(run.drive(self.tasks.clone(), results_tx, fatal_tx));
        Ok(ResultStream { results, fatal })
    }
}

/// Everything a single indexing run shares between its tasks.
#[derive(Clone)]
struct Run {
    chain: Arc<dyn ChainSource>,
    reporter: String,
    current: Tipset,
    executed: Tipset,
    cancel: CancellationToken,
}

struct Completed {
    task: String,
    started_at: DateTime<Utc>,
    elapsed: std::time::Duration,
    outcome: anyhow::Result<Extraction>,
}

impl Run {
    async fn drive(
        self,
        tasks: Vec<TaskSpec>,
        results: mpsc::Sender<TaskResult>,
        fatal: mpsc::Sender<anyhow::Error>,
    ) {
        let changes = tasks
            .iter()
            .any(|t| t.processor.is_actor())
            .then(|| self.actor_changes());

        let mut set = JoinSet::new();
        for spec in tasks {
            let run = self.clone();
            let changes = changes.clone();
            set.spawn(async move {
                let started_at = Utc::now();
                let start = Instant::now();
                let outcome = tokio::select! {
                    biased;
                    _ = run.cancel.cancelled() => Err(IndexError::Canceled.into()),
                    outcome = run.process(&spec, changes) => outcome,
                };
                Completed {
                    task: spec.name,
                    started_at,
                    elapsed: start.elapsed(),
                    outcome,
                }
            });
        }

        while let Some(joined) = set.join_next().await {
            let done = match joined {
                Ok(done) => done,
                Err(e) => {
                    self.abort(&fatal, anyhow::anyhow!("extraction task failed: {e}"));
                    break;
                }
            };
            let result = match done.outcome {
                Ok(extraction) => {
                    let report = ProcessingReport::ok(
                        &self.current,
                        &self.reporter,
                        &done.task,
                        done.started_at,
                        extraction.info,
                    );
                    TaskResult {
                        task: done.task,
                        records: extraction.records,
                        report,
                    }
                }
                Err(e) => match IndexError::classify(&e) {
                    Severity::Canceled => {
                        trace!(task = %done.task, "task canceled");
                        continue;
                    }
                    Severity::Tipset => {
                        self.abort(&fatal, e.context(format!("task {}", done.task)));
                        break;
                    }
                    Severity::Task => {
                        error!(task = %done.task, "task failed: {e:#}");
                        let report = ProcessingReport::error(
                            &self.current,
                            &self.reporter,
                            &done.task,
                            done.started_at,
                            &e,
                        );
                        TaskResult {
                            task: done.task,
                            records: vec![],
                            report,
                        }
                    }
                },
            };
            debug!(
                task = %result.task,
                height = self.current.epoch(),
                status = %result.report.status,
                records = result.records.len(),
                elapsed = %format_elapsed(done.elapsed),
                "task done"
            );
            if results.send(result).await.is_err() {
                trace!("result receiver dropped");
                break;
            }
        }
        set.abort_all();
    }

    fn abort(&self, fatal: &mpsc::Sender<anyhow::Error>, err: anyhow::Error) {
        error!(height = self.current.epoch(), "aborting tipset: {err:#}");
        // only the first fatal error is kept
        let _ = fatal.try_send(err);
        self.cancel.cancel();
    }

    /// The state-tree diff shared by every actor task of this run.
    fn actor_changes(&self) -> SharedChanges {
        let run = self.clone();
        async move {
            let start = Instant::now();
            let changes = run
                .chain
                .actor_state_changes(&run.current, &run.executed)
                .await
                .map_err(Arc::new)?;
            debug!(
                changes = changes.len(),
                elapsed = %format_elapsed(start.elapsed()),
                "actor state changes loaded"
            );
            Ok::<_, Arc<anyhow::Error>>(Arc::new(changes))
        }
        .boxed()
        .shared()
    }

    async fn process(
        &self,
        spec: &TaskSpec,
        changes: Option<SharedChanges>,
    ) -> anyhow::Result<Extraction> {
        match &spec.processor {
            Processor::Report(p) => p.process_report(&self.current).await,
            Processor::TipSet(p) => p.process_tipset(self.chain.as_ref(), &self.current).await,
            Processor::TipSets(p) => {
                p.process_tipsets(self.chain.as_ref(), &self.current, &self.executed)
                    .await
            }
            Processor::Actor(p) => {
                let changes = match changes {
                    Some(changes) => changes.await,
                    None => self.actor_changes().await,
                }
                .map_err(|e| anyhow::anyhow!("loading actor state changes: {e:#}"))?;
                self.process_actors(p.clone(), changes).await
            }
        }
    }

    async fn process_actors(
        &self,
        processor: Arc<dyn ActorProcessor>,
        changes: Arc<ActorStateChanges>,
    ) -> anyhow::Result<Extraction> {
        let run = self.clone();
        let joined = tokio::task::spawn_blocking(move || -> anyhow::Result<Extraction> {
            let ctx = ActorContext {
                loader: run.chain.state_loader(),
                current: &run.current,
                executed: &run.executed,
            };
            let mut records = Vec::new();
            for change in changes.iter() {
                if run.cancel.is_cancelled() {
                    return Err(IndexError::Canceled.into());
                }
                let Some(actor) = change.actor() else {
                    continue;
                };
                if !processor.accepts(&actor.code) {
                    continue;
                }
                let extracted = processor
                    .process_actor(&ctx, change)
                    .with_context(|| format!("actor {}", change.address))?;
                records.extend(extracted);
            }
            Ok(Extraction::new(records))
        })
        .await;
        match joined {
            Ok(out) => out,
            // surfaces as a failed task in the join set
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => Err(anyhow::anyhow!("actor worker failed: {e}")),
        }
    }
}
