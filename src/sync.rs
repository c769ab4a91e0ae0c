// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Rule-set synchronization.
//!
//! A __sync__ is one full run of geoset: every category listed in the sync
//! definition has its snapshot refreshed, then every category directory is
//! scanned, and the resulting rule-set configuration is written to the output
//! file.
//!
//! All steps are performed in order, one after the other. The first failure
//! aborts the run. The output file is only written once the whole rule-set
//! configuration has been built in memory, so a failed run never leaves a
//! partial output file behind.

use crate::{
    config::SyncDefinition,
    fetch::{Git2Fetcher, SnapshotFetcher},
    output::write_config,
    ruleset::{serialize, DirectoryLister, FsLister, RuleSetConfigBuilder},
};

use std::path::PathBuf;
use tracing::{info, instrument, warn};

/// Synchronize rule-set snapshots with generated configuration.
#[derive(Debug)]
pub struct Synchronizer<F = Git2Fetcher, L = FsLister>
where
    F: SnapshotFetcher,
    L: DirectoryLister,
{
    definition: SyncDefinition,
    fetcher: F,
    builder: RuleSetConfigBuilder<L>,
}

impl<F> Synchronizer<F, FsLister>
where
    F: SnapshotFetcher,
{
    /// Construct new synchronizer that scans the file system.
    ///
    /// # Errors
    ///
    /// - Return [`SyncError::Config`] if configured paths cannot be made
    ///   absolute.
    pub fn new(definition: SyncDefinition, fetcher: F) -> Result<Self> {
        Self::with_lister(definition, fetcher, FsLister)
    }
}

impl<F, L> Synchronizer<F, L>
where
    F: SnapshotFetcher,
    L: DirectoryLister,
{
    /// Construct new synchronizer with custom directory lister.
    ///
    /// Output path and category directories of the sync definition are made
    /// absolute against the current working directory.
    ///
    /// # Errors
    ///
    /// - Return [`SyncError::Config`] if configured paths cannot be made
    ///   absolute.
    pub fn with_lister(mut definition: SyncDefinition, fetcher: F, lister: L) -> Result<Self> {
        // INVARIANT: Emitted rule-set paths are always absolute.
        definition.absolutize_paths()?;

        Ok(Self {
            definition,
            fetcher,
            builder: RuleSetConfigBuilder::with_lister(lister),
        })
    }

    /// Sync definition in use.
    pub fn definition(&self) -> &SyncDefinition {
        &self.definition
    }

    /// Refresh snapshot of every category in configured order.
    ///
    /// # Errors
    ///
    /// - Return [`SyncError::Fetch`] on first snapshot that fails to refresh.
    #[instrument(skip(self), level = "debug")]
    pub fn refresh(&self) -> Result<()> {
        for category in &self.definition.categories {
            self.fetcher.refresh(
                category.url.as_str(),
                self.definition.branch_for(category),
                &category.directory,
            )?;
        }

        Ok(())
    }

    /// Scan category directories, and render rule-set configuration.
    ///
    /// Nothing is written to the output file.
    ///
    /// # Errors
    ///
    /// - Return [`SyncError::Build`] if any category cannot be scanned, or
    ///   configuration cannot be serialized.
    pub fn render(&self) -> Result<(String, usize)> {
        for (first, second) in self.definition.overlapping_categories() {
            warn!(
                "categories {:?} and {:?} both scan {:?}, files may be counted twice",
                first.prefix,
                second.prefix,
                first.directory.display()
            );
        }

        let config = self.builder.build(&self.definition.source_categories())?;
        let contents = serialize(&config)?;

        Ok((contents, config.entries().len()))
    }

    /// Scan category directories, and write rule-set configuration to output.
    ///
    /// # Errors
    ///
    /// - Return [`SyncError::Build`] if any category cannot be scanned, or
    ///   configuration cannot be serialized.
    /// - Return [`SyncError::Output`] if output file cannot be written.
    #[instrument(skip(self), level = "debug")]
    pub fn generate(&self) -> Result<SyncReport> {
        let (contents, entries) = self.render()?;
        let output = self.definition.settings.output.clone();
        write_config(&output, contents)?;
        info!(
            "the rule set configuration is successfully generated in {:?} ({entries} entries)",
            output.display()
        );

        Ok(SyncReport { output, entries })
    }

    /// Refresh every snapshot, then write rule-set configuration.
    ///
    /// # Errors
    ///
    /// - Return [`SyncError::Fetch`] if any snapshot fails to refresh.
    /// - Return [`SyncError::Build`] if any category cannot be scanned.
    /// - Return [`SyncError::Output`] if output file cannot be written.
    pub fn run(&self) -> Result<SyncReport> {
        self.refresh()?;
        self.generate()
    }
}

/// Outcome of successful rule-set configuration generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    /// Path output was written to.
    pub output: PathBuf,

    /// Number of rule-set entries written.
    pub entries: usize,
}

/// Synchronization error types.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Sync definition cannot be resolved.
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    /// Snapshot cannot be refreshed.
    #[error(transparent)]
    Fetch(#[from] crate::fetch::FetchError),

    /// Rule-set configuration cannot be built.
    #[error(transparent)]
    Build(#[from] crate::ruleset::BuildError),

    /// Output file cannot be written.
    #[error(transparent)]
    Output(#[from] crate::output::OutputError),
}

/// Friendly result alias :3
pub type Result<T, E = SyncError> = std::result::Result<T, E>;
