// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Per-tipset orchestration: [`TipSetIndexer`] runs tasks concurrently,
//! [`Manager`] bounds them in time and persists their output, [`Walker`]
//! drives the manager along the chain.

mod error;
mod manager;
mod tipset;
mod walker;

pub use error::{IndexError, Severity};
pub use manager::Manager;
pub use tipset::{ResultStream, TaskResult, TipSetIndexer};
pub use walker::{WalkSummary, Walker};
