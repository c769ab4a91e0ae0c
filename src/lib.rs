// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Rule-set snapshot synchronization for sing-box.
//!
//! Geoset refreshes local snapshots of upstream rule-set repositories, e.g.,
//! sing-geosite and sing-geoip, and generates the `route.rule_set`
//! configuration that references every binary rule-set file found in them.

pub mod config;
pub mod fetch;
pub mod output;
pub mod path;
pub mod ruleset;
pub mod sync;

pub use config::{CategoryDefinition, SyncDefinition, SyncSettings};
pub use fetch::{Git2Fetcher, GitBinaryFetcher, SnapshotFetcher};
pub use ruleset::{
    serialize, DirectoryLister, FsLister, RuleSetConfig, RuleSetConfigBuilder, RuleSetEntry,
    SourceCategory,
};
pub use sync::{SyncReport, Synchronizer};
