// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use cid::Cid;
use fvm_ipld_blockstore::Blockstore;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator as _;

use crate::actors::builtin::{self, ActorVersion};
use crate::chain::ChainSource;
use crate::indexer::{Manager, TipSetIndexer};
use crate::storage::{FileFormat, FileStorage, MemoryStorage, Storage};
use crate::tasks::{self, Task, TaskSpec};
use crate::utils::logger::LogFormat;

fn default_file_pattern() -> String {
    crate::storage::DEFAULT_FILE_PATTERN.into()
}

fn default_pool_size() -> u32 {
    20
}

fn default_schema() -> String {
    "public".into()
}

/// Where records go.
#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone, Default)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    #[default]
    Memory,
    File {
        #[serde(default)]
        format: FileFormat,
        path: PathBuf,
        #[serde(default)]
        omit_header: bool,
        #[serde(default = "default_file_pattern")]
        file_pattern: String,
    },
    /// Accepted for compatibility with existing configuration files; this
    /// crate has no Postgres sink.
    Postgres {
        /// Name of the environment variable holding the connection URL.
        url_env: String,
        #[serde(default = "default_pool_size")]
        pool_size: u32,
        #[serde(default = "default_schema")]
        schema: String,
        #[serde(default)]
        allow_upsert: bool,
    },
}

impl StorageConfig {
    pub fn build(&self) -> anyhow::Result<Arc<dyn Storage>> {
        match self {
            Self::Memory => Ok(Arc::new(MemoryStorage::default())),
            Self::File {
                format,
                path,
                omit_header,
                file_pattern,
            } => {
                anyhow::ensure!(
                    file_pattern.contains("{table}"),
                    "file pattern {file_pattern:?} must contain {{table}}"
                );
                Ok(Arc::new(
                    FileStorage::new(path, *format)
                        .with_omit_header(*omit_header)
                        .with_file_pattern(file_pattern),
                ))
            }
            Self::Postgres { url_env, .. } => {
                anyhow::bail!("postgres storage ({url_env}) is not supported by this build")
            }
        }
    }
}

/// An actor bundle to register besides [`builtin::KNOWN_BUNDLES`]. Its
/// manifest must be in the chain store.
#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
pub struct BundleConfig {
    pub manifest: String,
    /// Actors version, 8 or later.
    pub version: u64,
}

impl BundleConfig {
    pub fn resolve(&self) -> anyhow::Result<(Cid, ActorVersion)> {
        let manifest = self
            .manifest
            .parse()
            .with_context(|| format!("invalid manifest CID {:?}", self.manifest))?;
        let version = ActorVersion::from_number(self.version)
            .filter(|v| !v.has_identity_codes())
            .with_context(|| format!("actors version {} has no bundles", self.version))?;
        Ok((manifest, version))
    }
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
#[serde(default)]
pub struct Config {
    /// Reporter name stamped into processing reports.
    pub name: String,
    /// Time budget per tipset, e.g. `"30s"`. Zero disables the deadline.
    pub window: String,
    pub tasks: Vec<String>,
    pub log_format: LogFormat,
    pub storage: StorageConfig,
    pub bundles: Vec<BundleConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: "indexer".into(),
            window: "0s".into(),
            tasks: Task::iter().map(|t| t.to_string()).collect(),
            log_format: LogFormat::default(),
            storage: StorageConfig::default(),
            bundles: vec![],
        }
    }
}

impl Config {
    pub fn from_toml(s: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_toml(&s).with_context(|| format!("parsing config {}", path.display()))
    }

    /// `None` when no deadline applies.
    pub fn window(&self) -> anyhow::Result<Option<Duration>> {
        let window = humantime::parse_duration(&self.window)
            .with_context(|| format!("invalid window {:?}", self.window))?;
        Ok((!window.is_zero()).then_some(window))
    }

    pub fn task_specs(&self) -> anyhow::Result<Vec<TaskSpec>> {
        tasks::resolve(&self.tasks)
    }

    /// Checks everything that would otherwise fail at startup.
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(!self.name.is_empty(), "reporter name must not be empty");
        self.window()?;
        self.task_specs()?;
        self.storage.build()?;
        for bundle in &self.bundles {
            bundle.resolve()?;
        }
        Ok(())
    }

    /// Registers the actor code CIDs of every known and configured bundle
    /// found in `store`.
    pub fn register_bundles(&self, store: &impl Blockstore) -> anyhow::Result<()> {
        let known = builtin::register_known_bundles(store)?;
        for bundle in &self.bundles {
            let (manifest, version) = bundle.resolve()?;
            builtin::register_manifest(store, &manifest, version)?;
        }
        tracing::info!(
            known,
            configured = self.bundles.len(),
            "registered actor bundles"
        );
        Ok(())
    }

    /// Builds a manager over `chain` from this configuration.
    pub fn manager(&self, chain: Arc<dyn ChainSource>) -> anyhow::Result<Manager> {
        self.register_bundles(chain.store())?;
        let indexer = TipSetIndexer::new(chain, self.name.clone(), self.task_specs()?);
        Ok(Manager::new(indexer, self.storage.build()?, self.window()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actors::builtin::BuiltinActor;
    use crate::db::MemoryDB;
    use crate::test_utils;
    use crate::utils::cid::CidCborExt as _;
    use pretty_assertions::assert_eq;

    #[test]
    fn full_config() {
        let config = Config::from_toml(
            r#"
            name = "visor"
            window = "30s"
            tasks = ["blocks", "miner_sector_event"]
            log_format = "json"

            [storage]
            type = "file"
            format = "CSV"
            path = "/var/lib/indexer"
            omit_header = true
            "#,
        )
        .unwrap();
        assert_eq!(config.name, "visor");
        assert_eq!(config.window().unwrap(), Some(Duration::from_secs(30)));
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(
            config.storage,
            StorageConfig::File {
                format: FileFormat::Csv,
                path: "/var/lib/indexer".into(),
                omit_header: true,
                file_pattern: "{table}.csv".into(),
            }
        );
        config.validate().unwrap();
        let names: Vec<_> = config
            .task_specs()
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, ["blocks", "miner_sector_event"]);
    }

    #[test]
    fn defaults_run_every_task_in_memory() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.window().unwrap(), None);
        assert_eq!(config.task_specs().unwrap().len(), Task::iter().count());
        config.validate().unwrap();
    }

    #[test]
    fn round_trip() {
        let config = Config {
            storage: StorageConfig::Postgres {
                url_env: "INDEXER_DB".into(),
                pool_size: 4,
                schema: "visor".into(),
                allow_upsert: true,
            },
            ..Default::default()
        };
        let s = toml::to_string(&config).unwrap();
        assert_eq!(Config::from_toml(&s).unwrap(), config);
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let unknown = Config {
            tasks: vec!["blocks".into(), "miner_gossip".into()],
            ..Default::default()
        };
        assert!(unknown.validate().is_err());

        let window = Config {
            window: "soon".into(),
            ..Default::default()
        };
        assert!(window.validate().is_err());

        let postgres = Config::from_toml(
            r#"
            [storage]
            type = "postgres"
            url_env = "INDEXER_DB"
            "#,
        )
        .unwrap();
        assert!(matches!(
            postgres.storage,
            StorageConfig::Postgres { pool_size: 20, .. }
        ));
        assert!(postgres.validate().is_err());

        let pattern = StorageConfig::File {
            format: FileFormat::Csv,
            path: "out".into(),
            omit_header: false,
            file_pattern: "records.csv".into(),
        };
        assert!(pattern.build().is_err());
    }

    #[test]
    fn configured_bundles_are_registered() {
        let db = MemoryDB::default();
        let manifest = test_utils::put_manifest(&db, ActorVersion::V8);
        let config = Config::from_toml(&format!(
            r#"
            [[bundles]]
            manifest = "{manifest}"
            version = 8
            "#
        ))
        .unwrap();
        config.validate().unwrap();
        config.register_bundles(&db).unwrap();
        let miner = test_utils::raw_code("bundle/V8/storageminer");
        assert_eq!(
            builtin::resolve(&miner),
            Some((BuiltinActor::Miner, ActorVersion::V8))
        );

        let missing = Config {
            bundles: vec![BundleConfig {
                manifest: Cid::from_cbor_blake2b256(&"absent").unwrap().to_string(),
                version: 9,
            }],
            ..Default::default()
        };
        missing.validate().unwrap();
        assert!(missing.register_bundles(&db).is_err());

        for (manifest, version) in [(manifest.to_string(), 7), ("bafy".to_string(), 9)] {
            let bad = BundleConfig { manifest, version };
            assert!(bad.resolve().is_err(), "{bad:?}");
        }
    }

    #[test]
    fn loads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("indexer.toml");
        std::fs::write(&path, "name = \"disk\"\nwindow = \"150ms\"\n").unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.name, "disk");
        assert_eq!(config.window().unwrap(), Some(Duration::from_millis(150)));
        assert!(Config::load(dir.path().join("missing.toml")).is_err());
    }
}
