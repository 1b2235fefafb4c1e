//! CLI module - command-line interface definitions and handlers
//!
//! Uses clap v4 with derive macros for argument parsing.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

pub mod commands;

/// Bundle Hub - resolve and package AI prompt bundles
#[derive(Parser, Debug)]
#[command(name = "bh")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List bundles discovered from a source
    List(SourceArgs),
    /// Health-check a source and report problems
    Validate(SourceArgs),
    /// Download one bundle's archive to disk
    Download(DownloadArgs),
}

/// Exactly one backend must be selected.
#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    /// GitHub repository with bundle releases (owner/repo)
    #[arg(long, value_name = "OWNER/REPO")]
    pub github: Option<String>,

    /// GitLab project with bundle releases (group/project)
    #[arg(long, value_name = "GROUP/PROJECT")]
    pub gitlab: Option<String>,

    /// GitHub repository of *.collection.yml files (owner/repo)
    #[arg(long, value_name = "OWNER/REPO")]
    pub collection: Option<String>,

    /// Local directory of packaged bundles
    #[arg(long, value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// Local directory of SKILL.md skill folders
    #[arg(long, value_name = "DIR")]
    pub skills: Option<PathBuf>,

    /// Branch for collection repositories
    #[arg(long, default_value = "main")]
    pub branch: String,

    /// Explicit API token (otherwise the session and CLI helpers are tried)
    #[arg(long, env = "BH_TOKEN", hide_env_values = true)]
    pub token: Option<String>,
}

#[derive(Args, Debug)]
pub struct DownloadArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Id of the bundle to download
    pub bundle: String,

    /// Output path (default: <bundle-id>.zip)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}
