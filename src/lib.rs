// Copyright 2019-2025 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

#![recursion_limit = "256"]

pub mod actors;
pub mod blocks;
pub mod chain;
pub mod config;
pub mod db;
pub mod indexer;
pub mod ipld;
pub mod message;
pub mod model;
pub mod shim;
pub mod state_tree;
pub mod storage;
pub mod tasks;
#[cfg(test)]
pub(crate) mod test_utils;
pub mod utils;
