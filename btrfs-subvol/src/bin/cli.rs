// SPDX-License-Identifier: GPL-3.0-only

//! CLI wrapper around the btrfs-subvol library for manual operations

use anyhow::Result;
use btrfs_subvol::{ApiKind, Btrfs, BtrfsConfig};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// BTRFS subvolume operations over the kernel control channel
#[derive(Parser)]
#[command(name = "btrfs-subvol")]
#[command(about = "CLI tool for BTRFS subvolume operations", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Backend API to use (ioctl or cli), overriding the configuration
    #[arg(long, global = true)]
    api: Option<ApiKind>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new subvolume
    Create {
        /// Path of the subvolume to create
        destination: PathBuf,
        /// Quota group to add the subvolume to
        #[arg(short = 'i', long = "qgroup")]
        qgroups: Vec<String>,
    },
    /// Create a snapshot of a subvolume
    Snapshot {
        /// Source subvolume path
        source: PathBuf,
        /// Directory receiving the snapshot
        destination: PathBuf,
        /// Snapshot name, defaults to the source's name
        #[arg(long)]
        name: Option<String>,
        /// Make the snapshot read-only
        #[arg(short = 'r', long)]
        readonly: bool,
        /// Quota group to add the snapshot to
        #[arg(short = 'i', long = "qgroup")]
        qgroups: Vec<String>,
    },
    /// Delete a subvolume
    Delete {
        /// Path to the subvolume to delete
        destination: PathBuf,
        /// Delete nested subvolumes first
        #[arg(long)]
        recursive: bool,
    },
    /// List file extents written since a generation
    FindNew {
        /// Subvolume to scan
        destination: PathBuf,
        /// Report extents with a generation at or above this one
        last_gen: u64,
    },
    /// List subvolumes below the one containing a path
    List {
        /// Any path inside the subvolume to list from
        path: PathBuf,
        /// Filter on generation: N, +N or -N
        #[arg(short = 'G', long, allow_hyphen_values = true)]
        generation: Option<String>,
        /// Filter on origin generation: N, +N or -N
        #[arg(short = 'C', long, allow_hyphen_values = true)]
        origin_generation: Option<String>,
        /// Sort keys, e.g. "-gen,+path"
        #[arg(long, allow_hyphen_values = true)]
        sort: Option<String>,
    },
}

fn main() -> Result<()> {
    // Initialize tracing to stderr
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => BtrfsConfig::load(path)?,
        None => BtrfsConfig::default(),
    };
    if let Some(api) = cli.api {
        config.api = api;
    }
    tracing::debug!("Using {} backend", config.api);
    let btrfs = Btrfs::new(&config);

    match cli.command {
        Commands::Create {
            destination,
            qgroups,
        } => {
            btrfs
                .subvolume()
                .create()
                .quota_groups(qgroups)
                .destination(destination)
                .execute()?;
            println!("{{\"success\": true}}");
        }
        Commands::Snapshot {
            source,
            destination,
            name,
            readonly,
            qgroups,
        } => {
            let mut snapshot = btrfs
                .subvolume()
                .snapshot()
                .quota_groups(qgroups)
                .read_only(readonly)
                .source(source)
                .destination(destination);
            if let Some(name) = name {
                snapshot = snapshot.name(name);
            }
            snapshot.execute()?;
            println!("{{\"success\": true}}");
        }
        Commands::Delete {
            destination,
            recursive,
        } => {
            btrfs
                .subvolume()
                .delete()
                .destination(destination)
                .recursive(recursive)
                .execute()?;
            println!("{{\"success\": true}}");
        }
        Commands::FindNew {
            destination,
            last_gen,
        } => {
            let report = btrfs
                .subvolume()
                .find_new()
                .destination(destination)
                .last_gen(last_gen)
                .execute()?;
            let json = serde_json::to_string(&report)?;
            println!("{}", json);
        }
        Commands::List {
            path,
            generation,
            origin_generation,
            sort,
        } => {
            let mut list = btrfs.subvolume().list().path(path);
            if let Some(filter) = generation {
                list = list.filter_generation(filter);
            }
            if let Some(filter) = origin_generation {
                list = list.filter_origin_generation(filter);
            }
            if let Some(order) = sort {
                list = list.sort(order);
            }
            let subvolumes = list.execute()?;
            let json = serde_json::to_string(&subvolumes)?;
            println!("{}", json);
        }
    }

    Ok(())
}
