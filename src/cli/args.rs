//! CLI argument definitions.
//!
//! This module defines all CLI arguments using clap's derive macros.
//! The main entry point is the [`Cli`] struct.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Voxenv - speech-recognition runtime bootstrap.
#[derive(Debug, Parser)]
#[command(name = "voxenv")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to settings file (overrides <config_dir>/voxenv/config.yml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Override a setting (key=value, repeatable)
    #[arg(long = "set", value_name = "KEY=VALUE", global = true)]
    pub overrides: Vec<String>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Also append log lines to this file
    #[arg(long, value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Make the runtime ready (default if no command specified)
    Ensure(EnsureArgs),

    /// Discard remembered results and bootstrap again
    Rebootstrap(EnsureArgs),

    /// Show persisted runtime state
    Status(StatusArgs),

    /// Remove install marker, health cache and failure cache
    ClearCache,

    /// Show resolved settings and their sources
    Config(ConfigArgs),
}

/// Arguments for the `ensure` and `rebootstrap` commands.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct EnsureArgs {
    /// Output the result as JSON
    #[arg(long)]
    pub json: bool,

    /// Do not print status transitions
    #[arg(short, long)]
    pub quiet: bool,
}

/// Arguments for the `status` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct StatusArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `config` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct ConfigArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}
