//! Lookup command: join the device cache with the ARP table

use std::path::Path;
use std::process::ExitCode;

use anyhow::Result;
use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use serde::Serialize;
use tabled::Tabled;

use crate::config::RuntimeContext;
use crate::output::{output_for_format, print_load_failure, print_result, print_table};
use crate::zeroconf::network::ResolvedDevice;
use crate::zeroconf::LocalNetwork;

#[derive(Debug, Serialize)]
struct DeviceAddress {
    deviceid: String,
    ip: String,
}

#[derive(Debug, Tabled)]
struct LookupRow {
    #[tabled(rename = "DEVICE ID")]
    id: String,
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "MAC")]
    mac: String,
    #[tabled(rename = "IP")]
    ip: String,
}

impl From<&ResolvedDevice> for LookupRow {
    fn from(device: &ResolvedDevice) -> Self {
        Self {
            id: device.deviceid.clone(),
            name: device.name.clone(),
            mac: device.mac.clone().unwrap_or_else(|| "-".to_string()),
            ip: device.ip.clone().unwrap_or_else(|| "-".to_string()),
        }
    }
}

pub async fn run(
    ctx: &RuntimeContext,
    device: Option<&str>,
    devices_file: Option<&Path>,
    arp_file: Option<&Path>,
) -> Result<ExitCode> {
    let devices_file = ctx.devices_cache(devices_file)?;
    let arp_file = ctx.arp_table(arp_file)?;

    let network = match LocalNetwork::from_cache_files(&devices_file, &arp_file).await {
        Ok(network) => network,
        Err(err) => {
            let command = if devices_file.exists() {
                "arp save"
            } else {
                "devices save"
            };
            return print_load_failure(ctx, &err, command);
        }
    };

    if let Some(query) = device {
        let device_id = resolve_device_id(&network, query);
        let result = network.device_ip(&device_id).map(|ip| DeviceAddress {
            deviceid: device_id.clone(),
            ip: ip.to_string(),
        });
        return print_result(ctx, &result);
    }

    let resolved = network.resolve();
    output_for_format(ctx, &resolved, || {
        if resolved.is_empty() {
            println!("No devices cached in {}", devices_file.display());
            return Ok(());
        }
        let rows: Vec<LookupRow> = resolved.iter().map(LookupRow::from).collect();
        print_table(ctx, &rows)
    })?;

    Ok(ExitCode::SUCCESS)
}

/// Exact device ID first, then the best fuzzy match on the device name
fn resolve_device_id(network: &LocalNetwork, query: &str) -> String {
    if network.device(query).is_some() {
        return query.to_string();
    }

    let matcher = SkimMatcherV2::default();
    network
        .devices()
        .iter()
        .filter_map(|d| matcher.fuzzy_match(d.name(), query).map(|score| (score, d)))
        .max_by_key(|(score, _)| *score)
        .map(|(_, d)| d.deviceid.clone())
        .unwrap_or_else(|| query.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zeroconf::ArpEntry;

    fn network() -> LocalNetwork {
        let devices = serde_json::from_value(serde_json::json!([
            {"deviceid": "1000aa01", "name": "Kitchen Plug", "params": {"staMac": "d8:f1:5b:00:00:01"}},
            {"deviceid": "1000bb02", "name": "Porch Light", "params": {"staMac": "d8:f1:5b:00:00:02"}}
        ]))
        .unwrap();
        LocalNetwork::new(
            devices,
            vec![ArpEntry::new("192.168.1.50", "d8:f1:5b:00:00:02")],
        )
    }

    #[test]
    fn test_resolve_device_id() {
        let net = network();
        assert_eq!(resolve_device_id(&net, "1000aa01"), "1000aa01");
        assert_eq!(resolve_device_id(&net, "porch"), "1000bb02");
        assert_eq!(resolve_device_id(&net, "garage"), "garage");
    }

    #[test]
    fn test_lookup_row() {
        let rows: Vec<LookupRow> = network().resolve().iter().map(LookupRow::from).collect();
        assert_eq!(rows[0].ip, "-");
        assert_eq!(rows[1].ip, "192.168.1.50");
    }
}
