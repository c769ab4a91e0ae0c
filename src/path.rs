// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine relevent path information for external files that need to be
//! interacted with, or managed in some way.

use std::path::{Path, PathBuf};

/// Determine absolute path to user's home directory.
///
/// Does not check if the path returned actually exists.
///
/// # Errors
///
/// - Return [`PathError::NoWayHome`] if home directory path cannot be
///   determined.
pub fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().ok_or(PathError::NoWayHome)
}

/// Determine default absolute path to sync definition file.
///
/// Uses XDG Base Directory path `$XDG_CONFIG_HOME/geoset/geoset.toml` as the
/// default absolute path for the sync definition. Falls back to
/// `$HOME/.config` if the configuration directory cannot be determined. Does
/// not check if the path returned actually exists.
///
/// # Errors
///
/// - Return [`PathError::NoWayHome`] if home directory path cannot be
///   determined.
///
/// # See Also
///
/// - [XDG Base Directory](https://wiki.archlinux.org/title/XDG_Base_Directory)
pub fn default_config_path() -> Result<PathBuf> {
    let config_dir = match dirs::config_dir() {
        Some(path) => path,
        None => home_dir()?.join(".config"),
    };

    Ok(config_dir.join("geoset").join("geoset.toml"))
}

/// Make path absolute relative to current working directory.
///
/// Does not resolve symlinks, and does not check if the path exists.
///
/// # Errors
///
/// - Return [`PathError::Absolutize`] if current working directory cannot be
///   determined.
pub fn absolutize(path: impl AsRef<Path>) -> Result<PathBuf> {
    std::path::absolute(path.as_ref()).map_err(|err| PathError::Absolutize {
        source: err,
        path: path.as_ref().into(),
    })
}

/// Path resolution error types.
#[derive(Debug, thiserror::Error)]
pub enum PathError {
    /// No way to determine user's home directory.
    ///
    /// # See Also
    ///
    /// - [`dirs::home_dir`](https://docs.rs/dirs/latest/dirs/fn.home_dir.html)
    #[error("cannot determine absolute path to user's home directory")]
    NoWayHome,

    /// Path cannot be made absolute.
    #[error("cannot determine absolute path of {:?}", path.display())]
    Absolutize {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = PathError> = std::result::Result<T, E>;
