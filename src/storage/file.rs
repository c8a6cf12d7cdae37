// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt as _;
use tracing::{debug, trace};

use super::Storage;
use crate::model::{Record, Value};
use crate::shim::clock::ChainEpoch;

pub const DEFAULT_FILE_PATTERN: &str = "{table}.csv";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
pub enum FileFormat {
    #[default]
    #[serde(rename = "CSV")]
    #[strum(serialize = "CSV")]
    Csv,
    /// One JSON object per line.
    #[serde(rename = "JSON")]
    #[strum(serialize = "JSON")]
    Json,
}

/// Writes each height's batch into its own directory, one file per table,
/// and appends single records to one file per table under the root.
///
/// A batch is staged in a hidden directory and renamed into place once
/// every file is written, so a height directory always holds one complete
/// export. Exporting a height again replaces its directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
    format: FileFormat,
    omit_header: bool,
    file_pattern: String,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>, format: FileFormat) -> Self {
        Self {
            dir: dir.into(),
            format,
            omit_header: false,
            file_pattern: DEFAULT_FILE_PATTERN.into(),
        }
    }

    pub fn with_omit_header(mut self, omit_header: bool) -> Self {
        self.omit_header = omit_header;
        self
    }

    /// `{table}` in the pattern is replaced by the table name.
    pub fn with_file_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.file_pattern = pattern.into();
        self
    }

    fn file_name(&self, table: &str) -> String {
        self.file_pattern.replace("{table}", table)
    }

    pub fn height_dir(&self, height: ChainEpoch) -> PathBuf {
        self.dir.join(height.to_string())
    }

    /// File holding the rows of `table` exported for `height`.
    pub fn path(&self, height: ChainEpoch, table: &str) -> PathBuf {
        self.height_dir(height).join(self.file_name(table))
    }

    /// File single records of `table` are appended to.
    pub fn model_path(&self, table: &str) -> PathBuf {
        self.dir.join(self.file_name(table))
    }

    fn staging_dir(&self, height: ChainEpoch) -> PathBuf {
        self.dir.join(format!(".staging-{height}"))
    }

    fn retired_dir(&self, height: ChainEpoch) -> PathBuf {
        self.dir.join(format!(".retired-{height}"))
    }

    fn render(&self, records: &[&Record]) -> anyhow::Result<String> {
        let mut out = String::new();
        for record in records {
            match self.format {
                FileFormat::Csv => {
                    let fields: Vec<String> = record.values().iter().map(csv_value).collect();
                    writeln!(out, "{}", fields.join(","))?;
                }
                FileFormat::Json => writeln!(out, "{}", serde_json::to_string(record)?)?,
            }
        }
        Ok(out)
    }

    fn header(&self, record: &Record) -> Option<String> {
        match self.format {
            FileFormat::Csv if !self.omit_header => Some(format!(
                "{}\n",
                record
                    .columns()
                    .iter()
                    .map(|c| csv_field(c))
                    .collect::<Vec<_>>()
                    .join(",")
            )),
            _ => None,
        }
    }

    async fn append(&self, path: &Path, header: Option<String>, body: &str) -> anyhow::Result<()> {
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .with_context(|| format!("opening {}", path.display()))?;
        let empty = file.metadata().await?.len() == 0;
        if let Some(header) = header.filter(|_| empty) {
            file.write_all(header.as_bytes()).await?;
        }
        file.write_all(body.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    async fn write_new(path: &Path, header: Option<String>, body: &str) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::File::create(path)
            .await
            .with_context(|| format!("creating {}", path.display()))?;
        if let Some(header) = header {
            file.write_all(header.as_bytes()).await?;
        }
        file.write_all(body.as_bytes()).await?;
        file.sync_all().await?;
        Ok(())
    }
}

async fn remove_dir_if_exists(path: &Path) -> anyhow::Result<()> {
    match tokio::fs::remove_dir_all(path).await {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => {
            Err(e).with_context(|| format!("removing {}", path.display()))
        }
        _ => Ok(()),
    }
}

fn csv_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        other => csv_field(&other.to_string()),
    }
}

/// Quotes a field when it contains a separator, a quote or a line break.
fn csv_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_owned()
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn persist_batch(&self, height: ChainEpoch, records: &[Record]) -> anyhow::Result<()> {
        let mut tables: BTreeMap<&'static str, Vec<&Record>> = BTreeMap::new();
        for record in records {
            tables.entry(record.table()).or_default().push(record);
        }
        // render everything before touching any file
        let mut rendered = Vec::with_capacity(tables.len());
        for (table, rows) in &tables {
            rendered.push((*table, self.header(rows[0]), self.render(rows)?));
        }

        let staging = self.staging_dir(height);
        let retired = self.retired_dir(height);
        remove_dir_if_exists(&staging).await?;
        remove_dir_if_exists(&retired).await?;
        tokio::fs::create_dir_all(&staging)
            .await
            .with_context(|| format!("creating {}", staging.display()))?;
        for (table, header, body) in rendered {
            trace!(height, table, "staging rows");
            Self::write_new(&staging.join(self.file_name(table)), header, &body).await?;
        }

        let target = self.height_dir(height);
        if tokio::fs::try_exists(&target).await? {
            debug!(height, "replacing previous export");
            tokio::fs::rename(&target, &retired).await?;
        }
        tokio::fs::rename(&staging, &target)
            .await
            .with_context(|| format!("publishing {}", target.display()))?;
        remove_dir_if_exists(&retired).await
    }

    async fn persist_model(&self, record: &Record) -> anyhow::Result<()> {
        let body = self.render(&[record])?;
        tokio::fs::create_dir_all(&self.dir).await?;
        self.append(&self.model_path(record.table()), self.header(record), &body)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BlockParent, TipSetReport};
    use pretty_assertions::assert_eq;

    fn report(miners: &str) -> Record {
        TipSetReport {
            height: 12,
            tipset: "{bafy1,bafy2}".into(),
            parent_state_root: "bafyroot".into(),
            block_count: 2,
            miners: miners.into(),
            min_timestamp: 1_600_000_360,
            parent_weight: "120".into(),
        }
        .into()
    }

    fn parent(height: ChainEpoch) -> Record {
        BlockParent {
            height,
            block: "b".into(),
            parent: "p".into(),
        }
        .into()
    }

    #[tokio::test]
    async fn batches_land_in_their_height_directory() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path(), FileFormat::Csv);
        storage
            .persist_batch(12, &[report("f01000"), parent(12)])
            .await
            .unwrap();
        storage.persist_batch(13, &[parent(13)]).await.unwrap();

        let reports = std::fs::read_to_string(storage.path(12, "tipset_reports")).unwrap();
        assert_eq!(
            reports,
            "height,tipset,parent_state_root,block_count,miners,min_timestamp,parent_weight\n\
             12,\"{bafy1,bafy2}\",bafyroot,2,f01000,1600000360,120\n"
        );
        assert_eq!(storage.path(12, "block_parents"), dir.path().join("12/block_parents.csv"));
        let parents = std::fs::read_to_string(storage.path(13, "block_parents")).unwrap();
        assert_eq!(parents, "height,block,parent\n13,b,p\n");
        assert!(!storage.path(13, "tipset_reports").exists());
    }

    #[tokio::test]
    async fn reexporting_a_height_replaces_it() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path(), FileFormat::Csv).with_omit_header(true);
        let batch = [report("f01000"), parent(12)];
        storage.persist_batch(12, &batch).await.unwrap();
        storage.persist_batch(12, &batch).await.unwrap();
        let once = std::fs::read_to_string(storage.path(12, "tipset_reports")).unwrap();
        assert_eq!(once.lines().count(), 1);

        // a smaller re-export drops tables it no longer has rows for
        storage.persist_batch(12, &[report("f01001")]).await.unwrap();
        let replaced = std::fs::read_to_string(storage.path(12, "tipset_reports")).unwrap();
        assert!(replaced.contains("f01001") && !replaced.contains("f01000"));
        assert!(!storage.path(12, "block_parents").exists());

        let mut entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        entries.sort();
        assert_eq!(entries, ["12"]);
    }

    #[tokio::test]
    async fn failed_batch_keeps_the_previous_export() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path(), FileFormat::Csv);
        storage.persist_batch(12, &[report("f01000")]).await.unwrap();
        let before = std::fs::read_to_string(storage.path(12, "tipset_reports")).unwrap();

        // a file name the OS refuses fails the batch while staging
        let broken =
            FileStorage::new(dir.path(), FileFormat::Csv).with_file_pattern("{table}\0");
        assert!(
            broken
                .persist_batch(12, &[report("f01001"), parent(12)])
                .await
                .is_err()
        );
        let after = std::fs::read_to_string(storage.path(12, "tipset_reports")).unwrap();
        assert_eq!(after, before);
        assert!(!dir.path().join("12/block_parents.csv").exists());

        // leftovers of the failed attempt are cleared by the next export
        storage.persist_batch(12, &[parent(12)]).await.unwrap();
        assert!(!dir.path().join(".staging-12").exists());
        assert!(storage.path(12, "block_parents").exists());
    }

    #[tokio::test]
    async fn pattern_and_header_options() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("out"), FileFormat::Csv)
            .with_omit_header(true)
            .with_file_pattern("indexer-{table}.txt");
        storage
            .persist_model(&report("f01000,f01001"))
            .await
            .unwrap();
        let written =
            std::fs::read_to_string(dir.path().join("out/indexer-tipset_reports.txt")).unwrap();
        assert_eq!(
            written,
            "12,\"{bafy1,bafy2}\",bafyroot,2,\"f01000,f01001\",1600000360,120\n"
        );
    }

    #[tokio::test]
    async fn json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path(), FileFormat::Json)
            .with_file_pattern("{table}.jsonl");
        storage.persist_batch(12, &[report("f01000")]).await.unwrap();
        let written = std::fs::read_to_string(dir.path().join("12/tipset_reports.jsonl")).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(written.trim()).unwrap();
        assert_eq!(parsed["block_count"], 2);
        assert_eq!(parsed["miners"], "f01000");
    }

    #[test]
    fn quoting() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("a\"b"), "\"a\"\"b\"");
        assert_eq!(csv_value(&Value::Null), "");
    }
}
