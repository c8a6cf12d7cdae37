// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Extractors: each named task turns one tipset pair into records.
//!
//! Tasks come in four shapes, distinguished by what they need:
//! [`ReportProcessor`] (the current tipset alone, no chain access),
//! [`TipSetProcessor`] (the current tipset), [`TipSetsProcessor`] (the
//! current tipset and the one it executed) and [`ActorProcessor`] (one
//! changed actor at a time, sharing a single state-tree diff).

mod actor;
mod messages;
mod miner;
mod tipset;

pub use actor::{ActorTask, IdAddressesTask};
pub use messages::MessagesTask;
pub use miner::{
    MinerDeadlineTask, MinerInfoTask, MinerPreCommitTask, MinerSectorEventTask, MinerSectorTask,
};
pub use tipset::{BlocksTask, TipSetReportTask};

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use cid::Cid;
use serde::{Deserialize, Serialize};

use crate::actors::StateLoader;
use crate::blocks::Tipset;
use crate::chain::ChainSource;
use crate::model::Record;
use crate::state_tree::ActorChange;

/// Records produced by a task, plus an optional note that turns its report
/// status from `OK` into `INFO`.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Extraction {
    pub records: Vec<Record>,
    pub info: Option<String>,
}

impl Extraction {
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            records,
            info: None,
        }
    }

    pub fn with_info(mut self, info: impl Into<String>) -> Self {
        self.info = Some(info.into());
        self
    }
}

impl From<Vec<Record>> for Extraction {
    fn from(records: Vec<Record>) -> Self {
        Self::new(records)
    }
}

#[async_trait]
pub trait ReportProcessor: Send + Sync {
    async fn process_report(&self, current: &Tipset) -> anyhow::Result<Extraction>;
}

#[async_trait]
pub trait TipSetProcessor: Send + Sync {
    async fn process_tipset(
        &self,
        chain: &dyn ChainSource,
        current: &Tipset,
    ) -> anyhow::Result<Extraction>;
}

#[async_trait]
pub trait TipSetsProcessor: Send + Sync {
    async fn process_tipsets(
        &self,
        chain: &dyn ChainSource,
        current: &Tipset,
        executed: &Tipset,
    ) -> anyhow::Result<Extraction>;
}

/// What an actor extractor sees besides the change itself.
pub struct ActorContext<'a> {
    pub loader: &'a StateLoader,
    pub current: &'a Tipset,
    pub executed: &'a Tipset,
}

impl ActorContext<'_> {
    pub fn height(&self) -> crate::shim::clock::ChainEpoch {
        self.current.epoch()
    }

    pub fn state_root(&self) -> String {
        self.current.parent_state().to_string()
    }
}

/// Extracts records from one changed actor. Runs on the blocking pool, so
/// implementations may decode synchronously.
pub trait ActorProcessor: Send + Sync {
    /// Whether actors with this code are handled. Others are skipped.
    fn accepts(&self, code: &Cid) -> bool;

    fn process_actor(
        &self,
        ctx: &ActorContext<'_>,
        change: &ActorChange,
    ) -> anyhow::Result<Vec<Record>>;
}

#[derive(Clone)]
pub enum Processor {
    Report(Arc<dyn ReportProcessor>),
    TipSet(Arc<dyn TipSetProcessor>),
    TipSets(Arc<dyn TipSetsProcessor>),
    Actor(Arc<dyn ActorProcessor>),
}

impl Processor {
    pub fn is_actor(&self) -> bool {
        matches!(self, Self::Actor(_))
    }
}

impl fmt::Debug for Processor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Report(_) => "Report",
            Self::TipSet(_) => "TipSet",
            Self::TipSets(_) => "TipSets",
            Self::Actor(_) => "Actor",
        })
    }
}

/// The built-in tasks, by configuration name.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Task {
    TipsetReport,
    Blocks,
    Messages,
    Actor,
    IdAddresses,
    MinerInfo,
    MinerPreCommit,
    MinerSector,
    MinerSectorEvent,
    MinerDeadline,
}

impl Task {
    pub fn processor(self) -> Processor {
        match self {
            Self::TipsetReport => Processor::Report(Arc::new(TipSetReportTask)),
            Self::Blocks => Processor::TipSet(Arc::new(BlocksTask)),
            Self::Messages => Processor::TipSets(Arc::new(MessagesTask)),
            Self::Actor => Processor::Actor(Arc::new(ActorTask)),
            Self::IdAddresses => Processor::Actor(Arc::new(IdAddressesTask)),
            Self::MinerInfo => Processor::Actor(Arc::new(MinerInfoTask)),
            Self::MinerPreCommit => Processor::Actor(Arc::new(MinerPreCommitTask)),
            Self::MinerSector => Processor::Actor(Arc::new(MinerSectorTask)),
            Self::MinerSectorEvent => Processor::Actor(Arc::new(MinerSectorEventTask)),
            Self::MinerDeadline => Processor::Actor(Arc::new(MinerDeadlineTask)),
        }
    }
}

/// A task as scheduled by the indexer: the name stamped into its reports and
/// the extractor that runs it.
#[derive(Clone, Debug)]
pub struct TaskSpec {
    pub name: String,
    pub processor: Processor,
}

impl TaskSpec {
    pub fn new(name: impl Into<String>, processor: Processor) -> Self {
        Self {
            name: name.into(),
            processor,
        }
    }
}

impl From<Task> for TaskSpec {
    fn from(task: Task) -> Self {
        Self::new(task.to_string(), task.processor())
    }
}

/// Resolves configured task names. Unknown names are an error.
pub fn resolve<S: AsRef<str>>(names: &[S]) -> anyhow::Result<Vec<TaskSpec>> {
    let mut specs: Vec<TaskSpec> = Vec::with_capacity(names.len());
    for name in names {
        let name = name.as_ref();
        let task: Task = name
            .parse()
            .map_err(|_| anyhow::anyhow!("unknown task {name:?}"))?;
        anyhow::ensure!(
            specs.iter().all(|s| s.name != name),
            "task {name:?} listed twice"
        );
        specs.push(task.into());
    }
    Ok(specs)
}
