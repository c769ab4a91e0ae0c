// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use geoset::{
    config::SyncDefinition,
    fetch::{Git2Fetcher, GitBinaryFetcher},
    output::write_config,
    path::default_config_path,
    sync::Synchronizer,
};

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::{path::PathBuf, process::exit};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "geoset [options] <geoset-command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    /// Path to sync definition file.
    #[arg(short, long, global = true, value_name = "path")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    fn run(self) -> Result<()> {
        let config_path = match self.config {
            Some(path) => path,
            None => default_config_path()?,
        };

        match self.command {
            Command::Init(opts) => run_init(config_path, opts),
            Command::Sync(opts) => run_sync(config_path, opts),
            Command::Generate(opts) => run_generate(config_path, opts),
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Write default sync definition file.
    #[command(override_usage = "geoset init [options]")]
    Init(InitOptions),

    /// Refresh rule-set snapshots, then generate rule-set configuration.
    #[command(override_usage = "geoset sync [options]")]
    Sync(SyncOptions),

    /// Generate rule-set configuration from existing snapshots.
    #[command(override_usage = "geoset generate [options]")]
    Generate(GenerateOptions),
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct InitOptions {
    /// Overwrite existing sync definition file.
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct SyncOptions {
    /// Write rule-set configuration to this path instead.
    #[arg(short, long, value_name = "path")]
    pub output: Option<PathBuf>,

    /// Fetch snapshots through Git binary instead of libgit2.
    #[arg(short, long)]
    pub git_binary: bool,

    /// Only fetch latest commit of each snapshot.
    #[arg(short, long)]
    pub shallow: bool,

    /// Hide fetch progress.
    #[arg(short, long)]
    pub quiet: bool,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct GenerateOptions {
    /// Write rule-set configuration to this path instead.
    #[arg(short, long, value_name = "path", group = "target")]
    pub output: Option<PathBuf>,

    /// Print rule-set configuration to stdout instead of writing it.
    #[arg(long, group = "target")]
    pub stdout: bool,
}

fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .without_time();
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = run() {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

fn run() -> Result<()> {
    Cli::parse().run()
}

fn run_init(config_path: PathBuf, opts: InitOptions) -> Result<()> {
    if config_path.exists() && !opts.force {
        bail!(
            "sync definition {:?} already exists, use --force to overwrite",
            config_path.display()
        );
    }

    write_config(&config_path, SyncDefinition::default().to_string())?;
    info!("wrote sync definition to {:?}", config_path.display());

    Ok(())
}

fn run_sync(config_path: PathBuf, opts: SyncOptions) -> Result<()> {
    let mut definition = load_definition(config_path, opts.output)?;
    definition.settings.shallow |= opts.shallow;

    if opts.git_binary {
        let fetcher = GitBinaryFetcher::new().shallow(definition.settings.shallow);
        Synchronizer::new(definition, fetcher)?.run()?;
    } else {
        let fetcher = Git2Fetcher::new()
            .shallow(definition.settings.shallow)
            .quiet(opts.quiet);
        Synchronizer::new(definition, fetcher)?.run()?;
    }

    Ok(())
}

fn run_generate(config_path: PathBuf, opts: GenerateOptions) -> Result<()> {
    let definition = load_definition(config_path, opts.output)?;

    // INVARIANT: Generation never fetches, so any fetcher will do.
    let sync = Synchronizer::new(definition, Git2Fetcher::new())?;
    if opts.stdout {
        let (contents, _) = sync.render()?;
        println!("{contents}");
    } else {
        sync.generate()?;
    }

    Ok(())
}

fn load_definition(config_path: PathBuf, output: Option<PathBuf>) -> Result<SyncDefinition> {
    let mut definition = if config_path.exists() {
        SyncDefinition::load(&config_path)?
    } else {
        info!(
            "no sync definition at {:?}, using defaults",
            config_path.display()
        );
        SyncDefinition::default()
    };

    if let Some(output) = output {
        definition.settings.output = output;
    }

    Ok(definition)
}
