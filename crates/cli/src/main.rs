//! `kiln` - inspect build caches and push files to a device file system.

mod cmd;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::cmd::{cmd_depfile, cmd_hash, cmd_push};

#[derive(Parser)]
#[command(name = "kiln")]
#[command(author, version, about = "Incremental build and device sync tools", long_about = None)]
struct Cli {
  /// Enable debug logging
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Print the inputs and outputs listed in a depfile
  Depfile {
    path: PathBuf,

    /// Print as JSON
    #[arg(long)]
    json: bool,
  },

  /// Hash files against a build directory's cache and report changes
  Hash {
    /// Build directory holding the file cache
    #[arg(long)]
    build_dir: PathBuf,

    /// Compare modification times instead of contents
    #[arg(long)]
    timestamp: bool,

    /// Print as JSON
    #[arg(long)]
    json: bool,

    #[arg(required = true)]
    files: Vec<PathBuf>,
  },

  /// Upload a directory tree to a running device file system
  Push {
    /// Base URI of the device file system
    #[arg(long)]
    uri: String,

    /// Name of the device file system
    #[arg(long)]
    fs_name: String,

    /// Directory to upload
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Print as JSON
    #[arg(long)]
    json: bool,
  },
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  let filter = if cli.verbose {
    EnvFilter::new("debug")
  } else {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
  };
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  match cli.command {
    Commands::Depfile { path, json } => cmd_depfile(&path, json),
    Commands::Hash {
      build_dir,
      timestamp,
      json,
      files,
    } => cmd_hash(&build_dir, &files, timestamp, json),
    Commands::Push {
      uri,
      fs_name,
      root,
      json,
    } => cmd_push(&uri, &fs_name, &root, json),
  }
}
