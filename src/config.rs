// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout of the __sync definition__ file that geoset uses to
//! know which upstream rule-set repositories to fetch, where to put them, and
//! where to write the generated rule-set configuration.
//!
//! # General Layout
//!
//! A sync definition is composed of two basic parts: settings and categories.
//! The settings section defines where the generated configuration is written,
//! and how snapshots are fetched. Each category pairs a rule-set file name
//! prefix with the directory its snapshot is fetched into, along with the URL
//! of the remote to fetch from. Categories are processed in the order they
//! are listed.

use crate::{path::absolutize, ruleset::SourceCategory};

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    fs::read_to_string,
    path::{Path, PathBuf},
    str::FromStr,
};

/// Default branch that upstream repositories publish rule-set files on.
pub const DEFAULT_BRANCH: &str = "rule-set";

/// Sync definition layout.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct SyncDefinition {
    /// Settings for the whole run.
    pub settings: SyncSettings,

    /// Ordered listing of rule-set categories.
    #[serde(rename = "category", default)]
    pub categories: Vec<CategoryDefinition>,
}

impl SyncDefinition {
    /// Load sync definition from file.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::Read`] if file cannot be read.
    /// - Return [`ConfigError::Deserialize`] if file contents are malformed.
    /// - Return [`ConfigError::ShellExpansion`] if path expansion fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        read_to_string(path.as_ref())
            .map_err(|err| ConfigError::Read {
                source: err,
                path: path.as_ref().into(),
            })?
            .parse()
    }

    /// Make output path and every category directory absolute.
    ///
    /// Relative paths are resolved against the current working directory.
    /// Paths that are already absolute are left as they are.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::Absolutize`] if current working directory
    ///   cannot be determined.
    pub fn absolutize_paths(&mut self) -> Result<()> {
        self.settings.output = absolutize(&self.settings.output)?;
        for category in self.categories.iter_mut() {
            category.directory = absolutize(&category.directory)?;
        }

        Ok(())
    }

    /// Listing of source categories to scan in configured order.
    pub fn source_categories(&self) -> Vec<SourceCategory> {
        self.categories
            .iter()
            .map(|category| SourceCategory::new(&category.prefix, &category.directory))
            .collect()
    }

    /// Determine branch to fetch for target category.
    pub fn branch_for<'a>(&'a self, category: &'a CategoryDefinition) -> &'a str {
        category
            .branch
            .as_deref()
            .unwrap_or(self.settings.branch.as_str())
    }

    /// List pairs of categories that scan the same directory.
    ///
    /// Such categories may count the same rule-set file more than once.
    pub fn overlapping_categories(&self) -> Vec<(&CategoryDefinition, &CategoryDefinition)> {
        let mut overlaps = Vec::new();
        for (index, first) in self.categories.iter().enumerate() {
            for second in &self.categories[index + 1..] {
                if first.directory == second.directory {
                    overlaps.push((first, second));
                }
            }
        }

        overlaps
    }
}

impl Default for SyncDefinition {
    fn default() -> Self {
        Self {
            settings: SyncSettings::default(),
            categories: vec![
                CategoryDefinition {
                    prefix: "geosite-".into(),
                    directory: "/etc/sing-box/sing-geosite".into(),
                    url: "https://github.com/SagerNet/sing-geosite.git".into(),
                    branch: None,
                },
                CategoryDefinition {
                    prefix: "geoip-".into(),
                    directory: "/etc/sing-box/sing-geoip".into(),
                    url: "https://github.com/SagerNet/sing-geoip.git".into(),
                    branch: None,
                },
            ],
        }
    }
}

impl FromStr for SyncDefinition {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut definition: SyncDefinition =
            toml::de::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Perform shell expansion on every path field.
        definition.settings.output = expand_path(&definition.settings.output)?;
        for category in definition.categories.iter_mut() {
            category.directory = expand_path(&category.directory)?;
        }

        Ok(definition)
    }
}

impl Display for SyncDefinition {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

/// Sync settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct SyncSettings {
    /// Path to write generated rule-set configuration to.
    pub output: PathBuf,

    /// Branch to fetch when a category does not name one.
    #[serde(default = "default_branch")]
    pub branch: String,

    /// Only fetch the latest commit of each snapshot.
    #[serde(default)]
    pub shallow: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            output: "/etc/sing-box/rule_set.json".into(),
            branch: default_branch(),
            shallow: false,
        }
    }
}

/// Rule-set category listing.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct CategoryDefinition {
    /// File name prefix of rule-set files in this category.
    pub prefix: String,

    /// Directory to fetch snapshot into and scan.
    pub directory: PathBuf,

    /// Remote URL to fetch snapshot from.
    pub url: String,

    /// Branch override for this category.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
}

fn default_branch() -> String {
    DEFAULT_BRANCH.into()
}

fn expand_path(path: &Path) -> Result<PathBuf> {
    Ok(shellexpand::full(path.to_string_lossy().as_ref())
        .map_err(ConfigError::ShellExpansion)?
        .into_owned()
        .into())
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read sync definition file.
    #[error("failed to read sync definition at {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),

    /// Failed to make configured path absolute.
    #[error(transparent)]
    Absolutize(#[from] crate::path::PathError),
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;
