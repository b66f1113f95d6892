//! CLI argument parsing for aftx.

use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "aftx")]
#[command(version)]
#[command(about = "📱 aftx - Android Flash Tool XT")]
#[command(long_about = "📱 aftx - Android Flash Tool XT\n\n\
    Discover an attached handset, fetch and unpack a firmware bundle, classify its\n\
    images by partition and flash them one by one, stopping at the first failure.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file (default: $AFTX_CONFIG, then ./aftx.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Append logs to this file instead of stderr
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
#[group(required = true, multiple = false)]
pub struct BundleSource {
    /// Firmware bundle to download and extract
    #[arg(long)]
    pub url: Option<String>,

    /// Directory that already holds the extracted images
    #[arg(long)]
    pub dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// 🔍 List attached devices in ADB and fastboot mode
    Devices,

    /// ℹ️  Read device properties over ADB and write the details file
    Info {
        /// Device serial (default: first online ADB device)
        #[arg(long)]
        serial: Option<String>,
    },

    /// 📥 Download and extract a firmware bundle
    Download {
        #[arg(long)]
        url: String,

        /// Expected SHA-256 of the archive
        #[arg(long)]
        sha256: Option<String>,
    },

    /// 🗂️  Show how each image in a directory would be flashed
    Plan {
        #[arg(long)]
        dir: PathBuf,
    },

    /// ⚡ Flash every classified image in a directory
    Flash {
        #[arg(long)]
        dir: PathBuf,

        /// Fastboot serial (default: first fastboot device)
        #[arg(long)]
        serial: Option<String>,

        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// 🚀 Discover, acquire and flash in one go
    Provision {
        #[command(flatten)]
        source: BundleSource,

        /// Expected SHA-256 of the archive (with --url)
        #[arg(long, conflicts_with = "dir")]
        sha256: Option<String>,

        #[arg(long)]
        serial: Option<String>,

        #[arg(long)]
        yes: bool,
    },

    /// 🧪 Check that adb and fastboot are available
    Preflight,
}
