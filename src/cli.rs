//! CLI argument parsing and command definitions

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

/// Cache eWeLink devices and find them on the local network
#[derive(Debug, Parser)]
#[command(
    name = "ewz",
    author,
    version,
    about = "Cache eWeLink devices and find them on the local network",
    propagate_version = true,
    after_help = "Use 'ewz <command> --help' for more information about a command."
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,
    #[command(subcommand)]
    pub command: Command,
}

/// Global options available to all commands
#[derive(Debug, Clone, Args)]
pub struct GlobalOpts {
    /// Output format (json, yaml, table, auto)
    #[arg(
        short = 'o',
        long = "output",
        value_enum,
        global = true,
        conflicts_with = "json"
    )]
    pub output_format: Option<OutputFormat>,

    /// Output as JSON (shorthand for -o json)
    #[arg(long, global = true)]
    pub json: bool,

    /// eWeLink cloud region (us, eu, as, cn)
    #[arg(short = 'r', long, env = "EWELINK_REGION", global = true)]
    pub region: Option<String>,

    /// eWeLink account email
    #[arg(short = 'e', long, env = "EWELINK_EMAIL", global = true)]
    pub email: Option<String>,

    /// eWeLink account password
    #[arg(long, env = "EWELINK_PASSWORD", global = true, hide_env_values = true)]
    pub password: Option<String>,

    /// Request timeout in seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Override config file path
    #[arg(long, value_name = "PATH", env = "EWZ_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Reduce output to only errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Increase logging verbosity (stackable: -v, -vv, -vvv)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Enable debug logging (equivalent to -vv)
    #[arg(long, global = true)]
    pub debug: bool,

    /// Enable trace logging
    #[arg(long, global = true)]
    pub trace: bool,

    /// Disable colored output
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,

    /// Hide table headers
    #[arg(long, global = true)]
    pub no_headers: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[non_exhaustive]
pub enum OutputFormat {
    Json,
    Yaml,
    Table,
    Auto,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Snapshot and inspect the cloud device list
    Devices {
        #[command(subcommand)]
        command: DevicesCommand,
    },

    /// Snapshot and inspect the local ARP table
    Arp {
        #[command(subcommand)]
        command: ArpCommand,
    },

    /// Find the LAN address of cached devices
    Lookup {
        /// Device ID or name (all devices when omitted)
        device: Option<String>,

        /// Device cache file
        #[arg(long, value_name = "FILE")]
        devices: Option<PathBuf>,

        /// ARP table file
        #[arg(long, value_name = "FILE")]
        arp: Option<PathBuf>,
    },

    /// Inspect the cache files
    Cache {
        #[command(subcommand)]
        command: CacheCommand,
    },

    /// Inspect and manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Subcommand)]
pub enum DevicesCommand {
    /// Fetch all devices from the cloud and write them to a cache file
    Save {
        /// Destination file (defaults to zeroconf.devices_cache)
        file: Option<PathBuf>,
    },

    /// List cached devices with optional filter
    List {
        /// Filter by device ID or name (fuzzy match)
        filter: Option<String>,

        /// Device cache file
        #[arg(long, value_name = "FILE")]
        file: Option<PathBuf>,
    },
}

#[derive(Debug, Subcommand)]
pub enum ArpCommand {
    /// Read the ARP table for a network range and write it to a file
    Save {
        /// Address, CIDR or range to scan (e.g. 192.168.1.0/24, 192.168.1.10-50)
        #[arg(long)]
        ip: String,

        /// Destination file (defaults to zeroconf.arp_table)
        file: Option<PathBuf>,

        /// Send a datagram to every host in the range first so the table is populated
        #[arg(long)]
        probe: bool,
    },

    /// Show a saved ARP table
    Show {
        /// ARP table file (defaults to zeroconf.arp_table)
        file: Option<PathBuf>,
    },

    /// Normalize MAC addresses of IP=MAC pairs
    FixMac {
        /// Entries as IP=MAC
        #[arg(value_name = "IP=MAC", conflicts_with = "data")]
        entries: Vec<String>,

        /// JSON array of {ip, mac} objects (inline, @file, or - for stdin)
        #[arg(long = "data", value_name = "JSON")]
        data: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
pub enum CacheCommand {
    /// Show entry counts, size and age of both cache files
    Status {
        /// Device cache file
        #[arg(long, value_name = "FILE")]
        devices: Option<PathBuf>,

        /// ARP table file
        #[arg(long, value_name = "FILE")]
        arp: Option<PathBuf>,
    },
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show effective configuration
    Show,

    /// Print config file path
    Path,

    /// Get a specific configuration value
    Get {
        /// Configuration key (dot-separated path)
        key: Option<String>,
    },

    /// Reset configuration to defaults
    Reset,
}
