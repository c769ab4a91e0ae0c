// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Rule-set configuration synthesis.
//!
//! Upstream rule-set repositories publish pre-compiled binary rule-set files
//! following a simple naming convention: `<prefix><name>.srs`. The prefix
//! identifies the __category__ of the rule-set, e.g., "geosite-" for
//! site-based rules, or "geoip-" for IP-based rules.
//!
//! Given an ordered listing of categories, the [`RuleSetConfigBuilder`] scans
//! the top-level of each category's directory, and produces a
//! [`RuleSetConfig`] that references every rule-set file it found. The
//! resulting document can be serialized into the `route.rule_set` section
//! that a routing engine like sing-box understands.
//!
//! # Ordering
//!
//! Entries are emitted per category in the order that the directory listing
//! yields them, and categories are processed in the order they were given.
//! Nothing is sorted or deduplicated. Thus, two categories that point to the
//! same directory with the same prefix will count the same file twice.

use serde::{Deserialize, Serialize};
use std::{
    ffi::OsString,
    fs::read_dir,
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tracing::{debug, instrument};

/// File extension of compiled binary rule-set files.
pub const RULE_SET_SUFFIX: &str = ".srs";

/// Category of rule-set files to scan for.
///
/// Pairs a file name prefix with the directory that holds rule-set files of
/// that category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceCategory {
    /// File name prefix every rule-set file of this category starts with.
    pub name_prefix: String,

    /// Directory containing rule-set files of this category.
    pub directory: PathBuf,
}

impl SourceCategory {
    /// Construct new source category.
    pub fn new(name_prefix: impl Into<String>, directory: impl Into<PathBuf>) -> Self {
        Self {
            name_prefix: name_prefix.into(),
            directory: directory.into(),
        }
    }

    /// Derive rule-set tag from file name.
    ///
    /// Returns `None` if the file name does not belong to this category. The
    /// prefix is retained in the tag, only the ".srs" suffix is stripped.
    pub fn tag_for(&self, file_name: &str) -> Option<String> {
        if !file_name.starts_with(self.name_prefix.as_str()) {
            return None;
        }

        file_name.strip_suffix(RULE_SET_SUFFIX).map(ToString::to_string)
    }
}

/// Root rule-set configuration document.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSetConfig {
    pub route: RouteSection,
}

impl RuleSetConfig {
    /// Listing of all rule-set entries in scan order.
    pub fn entries(&self) -> &[RuleSetEntry] {
        self.route.rule_set.as_slice()
    }
}

/// Route section of rule-set configuration.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteSection {
    pub rule_set: Vec<RuleSetEntry>,
}

/// Reference to a single rule-set file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSetEntry {
    /// Unique identifier of the rule-set.
    pub tag: String,

    /// Where the rule-set is loaded from.
    #[serde(rename = "type")]
    pub kind: RuleSetKind,

    /// Encoding of the rule-set file.
    pub format: RuleSetFormat,

    /// Path to the rule-set file.
    pub path: PathBuf,
}

impl RuleSetEntry {
    /// Construct new local binary rule-set entry.
    pub fn local_binary(tag: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            tag: tag.into(),
            kind: RuleSetKind::Local,
            format: RuleSetFormat::Binary,
            path: path.into(),
        }
    }
}

/// Source kind of a rule-set.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleSetKind {
    #[default]
    Local,
}

/// File format of a rule-set.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleSetFormat {
    #[default]
    Binary,
}

/// List entries of a directory.
///
/// Layer of indirection between the builder and the file system, so the
/// builder can scan something other than a real directory.
pub trait DirectoryLister {
    /// List names of direct entries in directory.
    ///
    /// Names must be yielded in enumeration order. No recursion.
    fn list(&self, directory: &Path) -> std::io::Result<Vec<OsString>>;
}

/// Directory lister backed by the file system.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsLister;

impl DirectoryLister for FsLister {
    fn list(&self, directory: &Path) -> std::io::Result<Vec<OsString>> {
        read_dir(directory)?
            .map(|entry| entry.map(|entry| entry.file_name()))
            .collect()
    }
}

/// Build rule-set configuration from source categories.
#[derive(Debug, Default, Clone)]
pub struct RuleSetConfigBuilder<L = FsLister>
where
    L: DirectoryLister,
{
    lister: L,
}

impl RuleSetConfigBuilder<FsLister> {
    /// Construct new builder that scans the file system.
    pub fn new() -> Self {
        Self::default()
    }
}

impl<L> RuleSetConfigBuilder<L>
where
    L: DirectoryLister,
{
    /// Construct new builder with custom directory lister.
    pub fn with_lister(lister: L) -> Self {
        Self { lister }
    }

    /// Build rule-set configuration from ordered listing of categories.
    ///
    /// Scans each category's directory in the given order. Files that do not
    /// start with the category prefix, or that do not end with ".srs", are
    /// skipped. An empty listing of categories yields an empty rule-set.
    ///
    /// # Errors
    ///
    /// - Return [`BuildError::DirectoryNotFound`] if a category directory
    ///   does not exist.
    /// - Return [`BuildError::DirectoryUnreadable`] if a category directory
    ///   cannot be listed for any other reason.
    #[instrument(skip(self, categories), level = "debug")]
    pub fn build<'a>(
        &self,
        categories: impl IntoIterator<Item = &'a SourceCategory>,
    ) -> Result<RuleSetConfig> {
        let mut config = RuleSetConfig::default();

        for category in categories {
            let names = self
                .lister
                .list(&category.directory)
                .map_err(|err| BuildError::from_listing(category, err))?;

            let before = config.route.rule_set.len();
            for name in names {
                // INVARIANT: Names that are not valid UTF-8 can never match a prefix.
                let Some(name) = name.to_str() else {
                    continue;
                };

                if let Some(tag) = category.tag_for(name) {
                    config
                        .route
                        .rule_set
                        .push(RuleSetEntry::local_binary(tag, category.directory.join(name)));
                }
            }

            debug!(
                "found {} rule-set files with prefix {:?} in {:?}",
                config.route.rule_set.len() - before,
                category.name_prefix,
                category.directory.display()
            );
        }

        Ok(config)
    }
}

/// Serialize rule-set configuration as pretty-printed JSON.
///
/// Uses two-space indentation with keys in declaration order, i.e., "tag",
/// "type", "format", then "path" for each entry. No trailing newline.
///
/// # Errors
///
/// - Return [`BuildError::Serialize`] if an entry path is not valid UTF-8.
pub fn serialize(config: &RuleSetConfig) -> Result<String> {
    Ok(serde_json::to_string_pretty(config)?)
}

/// Rule-set configuration build error types.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// Category directory does not exist.
    #[error("directory {:?} of category {prefix:?} not found", directory.display())]
    DirectoryNotFound { prefix: String, directory: PathBuf },

    /// Category directory exists, but cannot be listed.
    #[error("directory {:?} of category {prefix:?} cannot be read", directory.display())]
    DirectoryUnreadable {
        #[source]
        source: std::io::Error,
        prefix: String,
        directory: PathBuf,
    },

    /// Configuration cannot be serialized into JSON.
    #[error(transparent)]
    Serialize(#[from] serde_json::Error),
}

impl BuildError {
    fn from_listing(category: &SourceCategory, err: std::io::Error) -> Self {
        match err.kind() {
            ErrorKind::NotFound => Self::DirectoryNotFound {
                prefix: category.name_prefix.clone(),
                directory: category.directory.clone(),
            },
            _ => Self::DirectoryUnreadable {
                source: err,
                prefix: category.name_prefix.clone(),
                directory: category.directory.clone(),
            },
        }
    }
}

/// Friendly result alias :3
pub type Result<T, E = BuildError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;
    use std::{collections::HashMap, fs::{create_dir_all, write}};

    /// Directory lister over a fixed in-memory listing.
    #[derive(Debug, Default)]
    struct MemoryLister {
        dirs: HashMap<PathBuf, Result<Vec<&'static str>, ErrorKind>>,
    }

    impl MemoryLister {
        fn with_dir(mut self, path: &str, names: &[&'static str]) -> Self {
            self.dirs.insert(PathBuf::from(path), Ok(names.to_vec()));
            self
        }

        fn with_failure(mut self, path: &str, kind: ErrorKind) -> Self {
            self.dirs.insert(PathBuf::from(path), Err(kind));
            self
        }
    }

    impl DirectoryLister for MemoryLister {
        fn list(&self, directory: &Path) -> std::io::Result<Vec<OsString>> {
            match self.dirs.get(directory) {
                Some(Ok(names)) => Ok(names.iter().map(OsString::from).collect()),
                Some(Err(kind)) => Err(std::io::Error::from(*kind)),
                None => Err(std::io::Error::from(ErrorKind::NotFound)),
            }
        }
    }

    fn tags(config: &RuleSetConfig) -> Vec<&str> {
        config.entries().iter().map(|entry| entry.tag.as_str()).collect()
    }

    // Bare std assert_eq only, test_case expands to an unqualified assert_eq!.
    mod tag_derivation {
        use super::super::SourceCategory;
        use simple_test_case::test_case;

        #[test_case("geosite-category-ads.srs", Some("geosite-category-ads"); "strip suffix keep prefix")]
        #[test_case("geosite-.srs", Some("geosite-"); "bare prefix")]
        #[test_case("geosite-cn.srs.srs", Some("geosite-cn.srs"); "only trailing suffix")]
        #[test_case("geosite-cn.json", None; "wrong suffix")]
        #[test_case("other-x.srs", None; "wrong prefix")]
        #[test_case("readme.md", None; "unrelated file")]
        #[test_case("Geosite-cn.srs", None; "case sensitive prefix")]
        #[test]
        fn source_category_tag_for(file_name: &str, expect: Option<&str>) {
            let category = SourceCategory::new("geosite-", "/rules/site");
            assert_eq!(category.tag_for(file_name).as_deref(), expect);
        }
    }

    #[test]
    fn build_skips_non_matching_files() -> anyhow::Result<()> {
        let lister = MemoryLister::default().with_dir(
            "/rules/site",
            &[
                "geosite-cn.srs",
                "readme.md",
                "geosite-google.srs",
                "other-x.srs",
                "geosite-private.json",
                "geosite-category-ads.srs",
                "LICENSE",
            ],
        );
        let categories = [SourceCategory::new("geosite-", "/rules/site")];
        let result = RuleSetConfigBuilder::with_lister(lister).build(&categories)?;

        assert_eq!(
            tags(&result),
            vec!["geosite-cn", "geosite-google", "geosite-category-ads"]
        );
        assert_eq!(
            result.entries()[0],
            RuleSetEntry::local_binary("geosite-cn", "/rules/site/geosite-cn.srs")
        );

        Ok(())
    }

    #[test]
    fn build_merges_categories_in_given_order() -> anyhow::Result<()> {
        let lister = MemoryLister::default()
            .with_dir("/rules/site", &["geosite-b.srs", "geosite-a.srs"])
            .with_dir("/rules/ip", &["geoip-cn.srs"]);
        let categories = [
            SourceCategory::new("geosite-", "/rules/site"),
            SourceCategory::new("geoip-", "/rules/ip"),
        ];
        let result = RuleSetConfigBuilder::with_lister(lister).build(&categories)?;

        // Scan order is kept, not sorted.
        let expect = vec![
            RuleSetEntry::local_binary("geosite-b", "/rules/site/geosite-b.srs"),
            RuleSetEntry::local_binary("geosite-a", "/rules/site/geosite-a.srs"),
            RuleSetEntry::local_binary("geoip-cn", "/rules/ip/geoip-cn.srs"),
        ];
        assert_eq!(result.entries(), expect.as_slice());

        Ok(())
    }

    #[test]
    fn build_empty_inputs() -> anyhow::Result<()> {
        let lister = MemoryLister::default().with_dir("/rules/site", &[]);
        let builder = RuleSetConfigBuilder::with_lister(lister);

        let result = builder.build(&[] as &[SourceCategory])?;
        assert!(result.entries().is_empty());

        let result = builder.build(&[SourceCategory::new("geosite-", "/rules/site")])?;
        assert!(result.entries().is_empty());

        Ok(())
    }

    #[test]
    fn build_double_counts_overlapping_categories() -> anyhow::Result<()> {
        let lister = MemoryLister::default().with_dir("/rules/site", &["geosite-cn.srs"]);
        let categories = [
            SourceCategory::new("geosite-", "/rules/site"),
            SourceCategory::new("geosite-", "/rules/site"),
        ];
        let result = RuleSetConfigBuilder::with_lister(lister).build(&categories)?;
        assert_eq!(tags(&result), vec!["geosite-cn", "geosite-cn"]);

        Ok(())
    }

    #[test]
    fn build_missing_directory() {
        let lister = MemoryLister::default().with_dir("/rules/site", &["geosite-cn.srs"]);
        let categories = [
            SourceCategory::new("geosite-", "/rules/site"),
            SourceCategory::new("geoip-", "/rules/ip"),
        ];
        let result = RuleSetConfigBuilder::with_lister(lister).build(&categories);

        assert!(matches!(
            result,
            Err(BuildError::DirectoryNotFound { ref prefix, ref directory })
                if prefix == "geoip-" && directory == Path::new("/rules/ip")
        ));
    }

    #[test]
    fn build_unreadable_directory() {
        let lister =
            MemoryLister::default().with_failure("/rules/site", ErrorKind::PermissionDenied);
        let categories = [SourceCategory::new("geosite-", "/rules/site")];
        let result = RuleSetConfigBuilder::with_lister(lister).build(&categories);

        assert!(matches!(
            result,
            Err(BuildError::DirectoryUnreadable { ref source, .. })
                if source.kind() == ErrorKind::PermissionDenied
        ));
    }

    #[test]
    fn serialize_rule_set_config() -> anyhow::Result<()> {
        let lister = MemoryLister::default()
            .with_dir("/etc/sing-box/sing-geosite", &["geosite-cn.srs"])
            .with_dir("/etc/sing-box/sing-geoip", &["geoip-cn.srs"]);
        let categories = [
            SourceCategory::new("geosite-", "/etc/sing-box/sing-geosite"),
            SourceCategory::new("geoip-", "/etc/sing-box/sing-geoip"),
        ];
        let result = serialize(&RuleSetConfigBuilder::with_lister(lister).build(&categories)?)?;
        let expect = indoc! {r#"
            {
              "route": {
                "rule_set": [
                  {
                    "tag": "geosite-cn",
                    "type": "local",
                    "format": "binary",
                    "path": "/etc/sing-box/sing-geosite/geosite-cn.srs"
                  },
                  {
                    "tag": "geoip-cn",
                    "type": "local",
                    "format": "binary",
                    "path": "/etc/sing-box/sing-geoip/geoip-cn.srs"
                  }
                ]
              }
            }"#};
        assert_eq!(result, expect);

        Ok(())
    }

    #[test]
    fn serialize_empty_rule_set_config() -> anyhow::Result<()> {
        let result = serialize(&RuleSetConfig::default())?;
        let expect = indoc! {r#"
            {
              "route": {
                "rule_set": []
              }
            }"#};
        assert_eq!(result, expect);

        Ok(())
    }

    #[test]
    fn serialize_is_idempotent() -> anyhow::Result<()> {
        let lister = MemoryLister::default()
            .with_dir("/rules/site", &["geosite-b.srs", "geosite-a.srs", "notes.txt"]);
        let categories = [SourceCategory::new("geosite-", "/rules/site")];
        let builder = RuleSetConfigBuilder::with_lister(lister);

        let first = serialize(&builder.build(&categories)?)?;
        let second = serialize(&builder.build(&categories)?)?;
        assert_eq!(first, second);

        Ok(())
    }

    #[sealed_test]
    fn fs_lister_scans_real_directory() -> anyhow::Result<()> {
        create_dir_all("site/nested")?;
        write("site/geosite-cn.srs", b"\x00")?;
        write("site/geosite-google.srs", b"\x00")?;
        write("site/readme.md", "rules")?;
        write("site/nested/geosite-deep.srs", b"\x00")?;

        let categories = [SourceCategory::new("geosite-", "site")];
        let result = RuleSetConfigBuilder::new().build(&categories)?;

        // Enumeration order is platform dependent.
        let mut result = tags(&result);
        result.sort();
        assert_eq!(result, vec!["geosite-cn", "geosite-google"]);

        Ok(())
    }

    #[sealed_test]
    fn fs_lister_missing_directory() {
        let categories = [SourceCategory::new("geoip-", "missing")];
        let result = RuleSetConfigBuilder::new().build(&categories);
        assert!(matches!(result, Err(BuildError::DirectoryNotFound { .. })));
    }
}
