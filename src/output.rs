// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Output file handling.
//!
//! The generated rule-set configuration is written in one shot. Contents go
//! into a temporary sibling file first, which is then renamed over the
//! target. Thus, the target is either left untouched, or fully replaced.

use std::{
    ffi::OsString,
    fs::{create_dir_all, remove_file, rename, write},
    path::{Path, PathBuf},
};
use tracing::{debug, instrument};

/// Write contents to output file all-or-nothing.
///
/// Creates missing parent directories of the output file.
///
/// # Errors
///
/// - Return [`OutputError::Write`] if output file cannot be written. Any
///   temporary file is removed, and an existing output file is left intact.
///
/// # Notes
///
/// - The rename replaces an existing output file instead of writing into it.
///   Its permissions and ownership are not carried over. The new file gets
///   the defaults of a freshly created file for the current process.
#[instrument(skip(path, contents), level = "debug")]
pub fn write_config(path: impl AsRef<Path>, contents: impl AsRef<[u8]>) -> Result<()> {
    let path = path.as_ref();
    let staging = staging_path(path);
    let wrap = |err: std::io::Error| OutputError::Write {
        source: err,
        path: path.into(),
    };

    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        create_dir_all(parent).map_err(wrap)?;
    }

    debug!("stage output at {:?}", staging.display());
    if let Err(err) = write(&staging, contents.as_ref()).and_then(|_| rename(&staging, path)) {
        let _ = remove_file(&staging);
        return Err(wrap(err));
    }

    Ok(())
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| OsString::from("rule_set"));
    name.push(".tmp");
    path.with_file_name(name)
}

/// Output error types.
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// Output file cannot be written.
    #[error("failed to write output to {:?}", path.display())]
    Write {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = OutputError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;
    use std::fs::read_to_string;

    #[test]
    fn staging_path_is_sibling() {
        assert_eq!(
            staging_path(Path::new("/etc/sing-box/rule_set.json")),
            PathBuf::from("/etc/sing-box/rule_set.json.tmp")
        );
    }

    #[sealed_test]
    fn write_config_replaces_output() -> anyhow::Result<()> {
        write_config("out/rule_set.json", "{}")?;
        assert_eq!(read_to_string("out/rule_set.json")?, "{}");

        write_config("out/rule_set.json", "{\"route\":{}}")?;
        assert_eq!(read_to_string("out/rule_set.json")?, "{\"route\":{}}");
        assert!(!Path::new("out/rule_set.json.tmp").exists());

        Ok(())
    }

    #[cfg(unix)]
    #[sealed_test]
    fn write_config_does_not_keep_existing_permissions() -> anyhow::Result<()> {
        use std::{
            fs::{metadata, set_permissions, Permissions},
            os::unix::fs::PermissionsExt,
        };

        write("rule_set.json", "{}")?;
        set_permissions("rule_set.json", Permissions::from_mode(0o755))?;

        write_config("rule_set.json", "{\"route\":{}}")?;
        let mode = metadata("rule_set.json")?.permissions().mode();
        assert_eq!(mode & 0o111, 0);
        assert_eq!(read_to_string("rule_set.json")?, "{\"route\":{}}");

        Ok(())
    }

    #[sealed_test]
    fn write_config_into_directory_fails() -> anyhow::Result<()> {
        create_dir_all("out/rule_set.json/occupied")?;

        let result = write_config("out/rule_set.json", "{}");
        assert!(matches!(result, Err(OutputError::Write { .. })));
        assert!(!Path::new("out/rule_set.json.tmp").exists());
        assert!(Path::new("out/rule_set.json/occupied").is_dir());

        Ok(())
    }
}
