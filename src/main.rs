//! ewz - Cache eWeLink devices and find them on the local network
//!
//! Snapshots the cloud device list and the local ARP table to JSON files so
//! devices can be addressed over the LAN without another cloud round trip.

mod api;
mod cli;
mod commands;
mod config;
mod error;
mod output;
mod zeroconf;

use std::io::{self, Write};
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;

use crate::cli::{Cli, Command};
use crate::config::RuntimeContext;

fn main() -> ExitCode {
    match try_main() {
        Ok(code) => code,
        Err(err) => {
            let _ = writeln!(io::stderr(), "Error: {err:#}");
            ExitCode::from(1)
        }
    }
}

fn try_main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let ctx = RuntimeContext::new(&cli.global)?;
    ctx.init_logging()?;

    log::debug!("Config loaded from: {:?}", ctx.config_path());

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(run_command(&ctx, cli.command))
}

async fn run_command(ctx: &RuntimeContext, command: Command) -> Result<ExitCode> {
    match command {
        Command::Devices { command } => commands::devices::run(ctx, command).await,
        Command::Arp { command } => commands::arp::run(ctx, command).await,
        Command::Lookup {
            device,
            devices,
            arp,
        } => commands::lookup::run(ctx, device.as_deref(), devices.as_deref(), arp.as_deref()).await,
        Command::Cache { command } => commands::cache::run(ctx, command).await,
        Command::Config { command } => commands::config::run(ctx, command),
        Command::Completions { shell } => commands::completions::run(shell),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_arp_save() {
        let cli = Cli::parse_from(["ewz", "arp", "save", "--ip", "192.168.1.0/24", "--probe"]);
        match cli.command {
            Command::Arp {
                command: cli::ArpCommand::Save { ip, file, probe },
            } => {
                assert_eq!(ip, "192.168.1.0/24");
                assert!(file.is_none());
                assert!(probe);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
