// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Snapshot fetching.
//!
//! Upstream rule-set repositories publish their compiled rule-set files on a
//! dedicated branch. A __snapshot fetch__ retrieves the current state of that
//! branch into a local directory, so its files can be scanned later.
//!
//! Every fetch starts from a clean slate: the target directory is removed
//! first if it exists, and then the snapshot is fetched into it. Nothing from
//! a previous run survives a refresh.
//!
//! Two fetchers are provided. [`Git2Fetcher`] clones through libgit2 with a
//! progress bar, and prompts for credentials if the remote asks for them.
//! [`GitBinaryFetcher`] hands the clone off to the Git binary found in the
//! user's `$PATH`.

use auth_git2::{GitAuthenticator, Prompter};
use git2::{build::RepoBuilder, Config, FetchOptions, RemoteCallbacks};
use indicatif::{ProgressBar, ProgressStyle};
use inquire::{Password, Text};
use std::{
    ffi::{OsStr, OsString},
    fs::{create_dir_all, remove_dir_all},
    path::Path,
    process::Command,
    time,
};
use tracing::{debug, info, instrument};

/// Fetch snapshots of remote repositories into local directories.
pub trait SnapshotFetcher {
    /// Make sure that target directory can be fetched into.
    ///
    /// Removes directory if it exists, and creates any missing parent
    /// directories.
    ///
    /// # Errors
    ///
    /// - Return [`FetchError::Clean`] if directory cannot be removed, or its
    ///   parent cannot be created.
    fn ensure_clean(&self, directory: &Path) -> Result<()> {
        clean_directory(directory)
    }

    /// Fetch current state of target branch from remote into directory.
    fn fetch(&self, url: &str, branch: &str, directory: &Path) -> Result<()>;

    /// Clean directory, then fetch snapshot into it.
    fn refresh(&self, url: &str, branch: &str, directory: &Path) -> Result<()> {
        self.ensure_clean(directory)?;
        self.fetch(url, branch, directory)
    }
}

/// Snapshot fetching through libgit2.
#[derive(Debug, Default, Clone)]
pub struct Git2Fetcher {
    shallow: bool,
    quiet: bool,
}

impl Git2Fetcher {
    /// Construct new libgit2 fetcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Only fetch latest commit of target branch.
    pub fn shallow(mut self, shallow: bool) -> Self {
        self.shallow = shallow;
        self
    }

    /// Hide progress bar.
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    fn progress_bar(&self) -> ProgressBar {
        if self.quiet {
            ProgressBar::hidden()
        } else {
            ProgressBar::new(0)
        }
    }
}

impl SnapshotFetcher for Git2Fetcher {
    /// Clone target branch through libgit2.
    ///
    /// The progress of the clone is displayed through a progress bar. If any
    /// credentials are required for the clone to continue, then the user will
    /// be prompted for that information accordingly. The progress bar will be
    /// blocked for user input.
    ///
    /// # Errors
    ///
    /// - Return [`FetchError::Git2`] if libgit2 operations fail.
    /// - Return [`FetchError::ProgressTemplate`] if progress bar cannot be
    ///   styled.
    #[instrument(skip(self), level = "debug")]
    fn fetch(&self, url: &str, branch: &str, directory: &Path) -> Result<()> {
        info!("fetch {url} ({branch}) into {:?}", directory.display());
        let bar = self.progress_bar();
        let style = ProgressStyle::with_template(
            "{elapsed_precise:.green}  {msg:<50}  [{wide_bar:.yellow/blue}]",
        )?
        .progress_chars("-Cco.");
        bar.set_style(style);
        bar.set_message(url.to_string());
        bar.enable_steady_tick(time::Duration::from_millis(100));

        let prompter = IndicatifPrompter::new(bar);
        let authenticator = GitAuthenticator::default().set_prompter(prompter.clone());
        let config = Config::open_default()?;

        let mut throttle = time::Instant::now();
        let mut rc = RemoteCallbacks::new();
        rc.credentials(authenticator.credentials(&config));
        rc.transfer_progress(|progress| {
            let stats = progress.to_owned();
            let bar_size = stats.total_objects() as u64;
            let bar_pos = stats.received_objects() as u64;
            if throttle.elapsed() > time::Duration::from_millis(10) {
                throttle = time::Instant::now();
                prompter.bar.set_length(bar_size);
                prompter.bar.set_position(bar_pos);
            }
            true
        });

        let mut fo = FetchOptions::new();
        fo.remote_callbacks(rc);
        if self.shallow {
            fo.depth(1);
        }

        let result = RepoBuilder::new()
            .branch(branch)
            .fetch_options(fo)
            .clone(url, directory);
        prompter.bar.finish_and_clear();
        let repository = result?;
        debug!("fetched snapshot at {:?}", repository.path().display());

        Ok(())
    }
}

/// Snapshot fetching through Git binary.
///
/// Runs `git clone` as an external process.
#[derive(Debug, Clone)]
pub struct GitBinaryFetcher {
    program: OsString,
    shallow: bool,
}

impl GitBinaryFetcher {
    /// Construct new fetcher that calls "git" from `$PATH`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different Git binary.
    pub fn program(mut self, program: impl Into<OsString>) -> Self {
        self.program = program.into();
        self
    }

    /// Only fetch latest commit of target branch.
    pub fn shallow(mut self, shallow: bool) -> Self {
        self.shallow = shallow;
        self
    }

    fn clone_args(&self, url: &str, branch: &str, directory: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["clone".into(), "-b".into(), branch.into()];
        if self.shallow {
            args.push("--depth".into());
            args.push("1".into());
        }
        args.push(url.into());
        args.push(directory.as_os_str().to_owned());

        args
    }
}

impl Default for GitBinaryFetcher {
    fn default() -> Self {
        Self {
            program: "git".into(),
            shallow: false,
        }
    }
}

impl SnapshotFetcher for GitBinaryFetcher {
    /// Clone target branch through Git binary.
    ///
    /// # Errors
    ///
    /// - Return [`FetchError::Syscall`] if Git binary cannot be called, or
    ///   exits with failure.
    #[instrument(skip(self), level = "debug")]
    fn fetch(&self, url: &str, branch: &str, directory: &Path) -> Result<()> {
        info!("git cloning {url} ...");
        let output = syscall_non_interactive(&self.program, self.clone_args(url, branch, directory))?;
        if !output.is_empty() {
            debug!("{output}");
        }

        Ok(())
    }
}

/// Git2 authentication prompter for progress bar.
#[derive(Debug, Clone)]
pub struct IndicatifPrompter {
    pub(crate) bar: ProgressBar,
}

impl IndicatifPrompter {
    /// Construct new progress bar authenticator.
    pub fn new(bar: ProgressBar) -> Self {
        Self { bar }
    }
}

impl Prompter for IndicatifPrompter {
    #[instrument(skip(self, url, _config), level = "debug")]
    fn prompt_username_password(
        &mut self,
        url: &str,
        _config: &git2::Config,
    ) -> Option<(String, String)> {
        info!("authentication required at {url}");
        self.bar.suspend(|| -> Option<(String, String)> {
            let username = Text::new("username").prompt().ok()?;
            let password = Password::new("password")
                .without_confirmation()
                .prompt()
                .ok()?;
            Some((username, password))
        })
    }

    #[instrument(skip(self, username, url, _config), level = "debug")]
    fn prompt_password(
        &mut self,
        username: &str,
        url: &str,
        _config: &git2::Config,
    ) -> Option<String> {
        info!("authentication required at {url} for user {username}");
        self.bar.suspend(|| -> Option<String> {
            Password::new("password")
                .without_confirmation()
                .prompt()
                .ok()
        })
    }

    #[instrument(skip(self, ssh_key_path, _config), level = "debug")]
    fn prompt_ssh_key_passphrase(
        &mut self,
        ssh_key_path: &Path,
        _config: &git2::Config,
    ) -> Option<String> {
        info!(
            "authentication required with ssh key at {}",
            ssh_key_path.display()
        );
        self.bar.suspend(|| -> Option<String> {
            Password::new("passphrase")
                .without_confirmation()
                .prompt()
                .ok()
        })
    }
}

fn clean_directory(directory: &Path) -> Result<()> {
    if directory.exists() {
        debug!("remove {:?}", directory.display());
        remove_dir_all(directory).map_err(|err| FetchError::Clean {
            source: err,
            directory: directory.into(),
        })?;
    }

    if let Some(parent) = directory.parent().filter(|path| !path.as_os_str().is_empty()) {
        create_dir_all(parent).map_err(|err| FetchError::Clean {
            source: err,
            directory: directory.into(),
        })?;
    }

    Ok(())
}

fn syscall_non_interactive(
    cmd: impl AsRef<OsStr>,
    args: impl IntoIterator<Item = impl AsRef<OsStr>>,
) -> Result<String> {
    let output = Command::new(cmd.as_ref()).args(args).output()?;
    let stdout = String::from_utf8_lossy(output.stdout.as_slice()).into_owned();
    let stderr = String::from_utf8_lossy(output.stderr.as_slice()).into_owned();
    let mut message = String::new();

    if !stdout.is_empty() {
        message.push_str(format!("stdout: {stdout}").as_str());
    }

    if !stderr.is_empty() {
        message.push_str(format!("stderr: {stderr}").as_str());
    }

    // INVARIANT: Chomp trailing newlines.
    let message = message
        .strip_suffix("\r\n")
        .or(message.strip_suffix('\n'))
        .map(ToString::to_string)
        .unwrap_or(message);

    if !output.status.success() {
        return Err(FetchError::Syscall(std::io::Error::other(format!(
            "command {:?} failed:\n{message}",
            cmd.as_ref()
        ))));
    }

    Ok(message)
}

/// Snapshot fetch error types.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Target directory cannot be cleaned for fetching.
    #[error("failed to clean {:?} for fetching", directory.display())]
    Clean {
        #[source]
        source: std::io::Error,
        directory: std::path::PathBuf,
    },

    /// Operations from libgit2 fail.
    #[error(transparent)]
    Git2(#[from] git2::Error),

    /// External Git binary fails.
    #[error(transparent)]
    Syscall(#[from] std::io::Error),

    /// Style template cannot be set for progress bars.
    #[error(transparent)]
    ProgressTemplate(#[from] indicatif::style::TemplateError),
}

/// Friendly result alias :3
pub type Result<T, E = FetchError> = std::result::Result<T, E>;
