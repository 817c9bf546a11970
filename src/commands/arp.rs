//! ARP table commands

use std::path::Path;
use std::process::ExitCode;

use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use tabled::Tabled;

use crate::cli::ArpCommand;
use crate::config::RuntimeContext;
use crate::output::{output_for_format, parse_json_input, print_load_failure, print_output, print_result, print_table};
use crate::zeroconf::{self, fix_mac_addresses, ArpEntry, Zeroconf};

pub async fn run(ctx: &RuntimeContext, command: ArpCommand) -> Result<ExitCode> {
    match command {
        ArpCommand::Save { ip, file, probe } => save(ctx, &ip, file.as_deref(), probe).await,
        ArpCommand::Show { file } => show(ctx, file.as_deref()).await,
        ArpCommand::FixMac { entries, data } => fix_mac(ctx, &entries, data.as_deref()),
    }
}

#[derive(Debug, Serialize, Tabled)]
struct ArpRow {
    #[tabled(rename = "IP")]
    ip: String,
    #[tabled(rename = "MAC")]
    mac: String,
}

async fn save(ctx: &RuntimeContext, ip: &str, file: Option<&Path>, probe: bool) -> Result<ExitCode> {
    let file = ctx.arp_table(file)?;
    let mut discovery = Zeroconf::new(ctx.arp_source()?);
    if let Some(settings) = ctx.probe(probe) {
        discovery = discovery.with_probe(settings);
    }

    let result = discovery.save_arp_table(ip, &file).await;
    print_result(ctx, &result)
}

async fn show(ctx: &RuntimeContext, file: Option<&Path>) -> Result<ExitCode> {
    let file = ctx.arp_table(file)?;
    let table = match zeroconf::load_arp_table(&file).await {
        Ok(table) => table,
        Err(err) => return print_load_failure(ctx, &err, "arp save"),
    };

    output_for_format(ctx, &table, || {
        if table.is_empty() {
            println!("ARP table {} is empty", file.display());
            return Ok(());
        }
        let rows: Vec<ArpRow> = table
            .iter()
            .map(|entry| ArpRow {
                ip: entry.ip.clone(),
                mac: entry.mac.clone(),
            })
            .collect();
        print_table(ctx, &rows)
    })?;

    Ok(ExitCode::SUCCESS)
}

fn fix_mac(ctx: &RuntimeContext, pairs: &[String], data: Option<&str>) -> Result<ExitCode> {
    let entries = match data {
        Some(input) => {
            let value = parse_json_input(input)?;
            serde_json::from_value::<Vec<ArpEntry>>(value)
                .context("expected a JSON array of {ip, mac} objects")?
        }
        None if pairs.is_empty() => {
            return Err(anyhow!("Provide IP=MAC entries or --data"));
        }
        None => parse_pairs(pairs)?,
    };

    print_output(ctx, &fix_mac_addresses(&entries))?;
    Ok(ExitCode::SUCCESS)
}

fn parse_pairs(pairs: &[String]) -> Result<Vec<ArpEntry>> {
    pairs
        .iter()
        .map(|pair| {
            let (ip, mac) = pair
                .split_once('=')
                .ok_or_else(|| anyhow!("Invalid entry: {pair}. Expected IP=MAC"))?;
            Ok(ArpEntry::new(ip.trim(), mac.trim()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pairs() {
        let pairs = vec![
            "127.0.0.1=01:02-03-0a-0b-0c".to_string(),
            "10.0.0.2 = AA-BB-CC-DD-EE-FF".to_string(),
        ];
        let entries = parse_pairs(&pairs).unwrap();
        assert_eq!(entries[0], ArpEntry::new("127.0.0.1", "01:02-03-0a-0b-0c"));
        assert_eq!(entries[1].ip, "10.0.0.2");

        let fixed = fix_mac_addresses(&entries);
        assert_eq!(fixed[0].mac, "01:02:03:0a:0b:0c");
        assert_eq!(fixed[1].mac, "aa:bb:cc:dd:ee:ff");
    }

    #[test]
    fn test_parse_pairs_rejects_missing_separator() {
        let err = parse_pairs(&["127.0.0.1".to_string()]).unwrap_err();
        assert!(err.to_string().contains("Expected IP=MAC"));
    }
}
