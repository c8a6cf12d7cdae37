// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use tracing_subscriber::{EnvFilter, Registry, prelude::*};

/// Output format of the console layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Installs the global subscriber for an embedding binary. The library itself
/// never calls this.
pub fn setup_logger(format: LogFormat) {
    let layer: Box<dyn tracing_subscriber::layer::Layer<Registry> + Send + Sync> = match format {
        LogFormat::Text => Box::new(
            tracing_subscriber::fmt::Layer::new()
                .with_writer(std::io::stderr)
                .with_filter(get_env_filter(default_env_filter())),
        ),
        LogFormat::Json => Box::new(
            tracing_subscriber::fmt::Layer::new()
                .json()
                .with_writer(std::io::stderr)
                .with_filter(get_env_filter(default_env_filter())),
        ),
    };
    // A second call (e.g. from tests) keeps the first subscriber.
    let _ = tracing_subscriber::registry().with(layer).try_init();
}

/// Returns an [`EnvFilter`] according to the `RUST_LOG` environment variable,
/// or the given default.
///
/// [`tracing_subscriber::filter::Builder`] only allows a single default
/// directive, whereas we want to provide several.
fn get_env_filter(def: EnvFilter) -> EnvFilter {
    use std::env::{
        self,
        VarError::{NotPresent, NotUnicode},
    };
    match env::var(EnvFilter::DEFAULT_ENV) {
        Ok(s) => EnvFilter::new(s),
        Err(NotPresent) => def,
        Err(NotUnicode(_)) => EnvFilter::default(),
    }
}

fn default_env_filter() -> EnvFilter {
    let default_directives = [
        "info",
        "forest_indexer::ipld=warn",
        "forest_indexer::indexer=info",
        "forest_indexer::tasks=info",
    ];
    EnvFilter::try_new(default_directives.join(",")).unwrap_or_default()
}

#[test]
fn test_default_env_filter() {
    let _did_not_panic = default_env_filter();
}
