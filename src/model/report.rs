// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{ProcessingReport, ToValue, Value};
use crate::blocks::Tipset;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    strum::Display,
    strum::EnumString,
    strum::IntoStaticStr,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum ReportStatus {
    Ok,
    Info,
    Skip,
    Error,
}

impl ToValue for ReportStatus {
    fn to_value(&self) -> Value {
        Value::Text(self.to_string())
    }
}

/// Why a task produced no result for a tipset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum SkipReason {
    #[strum(serialize = "no parent state at genesis")]
    Genesis,
    #[strum(serialize = "indexer shutdown")]
    Shutdown,
    #[strum(serialize = "indexer timeout")]
    Timeout,
    #[strum(serialize = "task did not report")]
    Unreported,
}

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
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum SectorEventKind {
    PreCommitAdded,
    PreCommitExpired,
    CommitCapacityAdded,
    SectorAdded,
    SectorExtended,
    SectorSnapped,
    SectorFaulted,
    SectorRecovering,
    SectorRecovered,
    SectorExpired,
    SectorTerminated,
}

impl ToValue for SectorEventKind {
    fn to_value(&self) -> Value {
        Value::Text(self.to_string())
    }
}

impl ProcessingReport {
    fn with_status(
        ts: &Tipset,
        reporter: &str,
        task: &str,
        started_at: DateTime<Utc>,
        status: ReportStatus,
    ) -> Self {
        let completed_at = Utc::now().max(started_at);
        Self {
            height: ts.epoch(),
            state_root: ts.parent_state().to_string(),
            reporter: reporter.to_owned(),
            task: task.to_owned(),
            started_at,
            completed_at,
            status,
            status_information: None,
            errors_detected: None,
        }
    }

    /// `OK` without further information, or `INFO` carrying `info`.
    pub fn ok(
        ts: &Tipset,
        reporter: &str,
        task: &str,
        started_at: DateTime<Utc>,
        info: Option<String>,
    ) -> Self {
        match info.filter(|i| !i.is_empty()) {
            None => Self::with_status(ts, reporter, task, started_at, ReportStatus::Ok),
            Some(info) => Self {
                status_information: Some(info),
                ..Self::with_status(ts, reporter, task, started_at, ReportStatus::Info)
            },
        }
    }

    pub fn error(
        ts: &Tipset,
        reporter: &str,
        task: &str,
        started_at: DateTime<Utc>,
        error: &anyhow::Error,
    ) -> Self {
        Self {
            errors_detected: Some(format!("{error:#}")),
            ..Self::with_status(ts, reporter, task, started_at, ReportStatus::Error)
        }
    }

    pub fn skip(
        ts: &Tipset,
        reporter: &str,
        task: &str,
        started_at: DateTime<Utc>,
        reason: SkipReason,
    ) -> Self {
        Self {
            status_information: Some(reason.to_string()),
            ..Self::with_status(ts, reporter, task, started_at, ReportStatus::Skip)
        }
    }

    /// Whether records reported alongside this report may be persisted.
    pub fn is_success(&self) -> bool {
        matches!(self.status, ReportStatus::Ok | ReportStatus::Info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryDB;
    use crate::test_utils;

    #[test]
    fn status_follows_info_and_errors() {
        let db = MemoryDB::default();
        let root = test_utils::StateTreeBuilder::new(5).flush(&db);
        let ts = test_utils::linear_chain(&db, 3, &[root]).remove(0);
        let now = Utc::now();

        let ok = ProcessingReport::ok(&ts, "visor", "blocks", now, None);
        assert_eq!(ok.status, ReportStatus::Ok);
        assert!(ok.completed_at >= ok.started_at);
        assert_eq!(ok.height, 3);
        assert_eq!(ok.state_root, root.to_string());
        assert_eq!(
            ProcessingReport::ok(&ts, "visor", "blocks", now, Some(String::new())).status,
            ReportStatus::Ok
        );

        let info = ProcessingReport::ok(&ts, "visor", "blocks", now, Some("no miners".into()));
        assert_eq!(info.status, ReportStatus::Info);
        assert!(info.is_success());

        let err = ProcessingReport::error(&ts, "visor", "blocks", now, &anyhow::anyhow!("boom"));
        assert_eq!(err.status, ReportStatus::Error);
        assert_eq!(err.errors_detected.as_deref(), Some("boom"));
        assert!(!err.is_success());

        let skip = ProcessingReport::skip(&ts, "visor", "blocks", now, SkipReason::Shutdown);
        assert_eq!(skip.status.to_string(), "SKIP");
        assert_eq!(skip.status_information.as_deref(), Some("indexer shutdown"));
        assert!(skip.errors_detected.is_none());
    }

    #[test]
    fn event_kind_names() {
        assert_eq!(
            SectorEventKind::CommitCapacityAdded.to_string(),
            "COMMIT_CAPACITY_ADDED"
        );
        assert_eq!(
            "PRE_COMMIT_EXPIRED".parse::<SectorEventKind>().unwrap(),
            SectorEventKind::PreCommitExpired
        );
    }
}
