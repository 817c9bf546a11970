//! Device cache commands
//!
//! `save` snapshots the cloud device list; `list` reads the snapshot back
//! without touching the network.

use std::path::Path;
use std::process::ExitCode;

use anyhow::Result;
use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use serde::Serialize;
use tabled::Tabled;

use crate::api::{CloudClient, Device};
use crate::cli::DevicesCommand;
use crate::config::RuntimeContext;
use crate::output::{self, output_for_format, print_load_failure, print_result, print_table};
use crate::zeroconf::{self, normalize_mac};

pub async fn run(ctx: &RuntimeContext, command: DevicesCommand) -> Result<ExitCode> {
    match command {
        DevicesCommand::Save { file } => save(ctx, file.as_deref()).await,
        DevicesCommand::List { filter, file } => list(ctx, filter.as_deref(), file.as_deref()).await,
    }
}

#[derive(Debug, Clone, Serialize, Tabled)]
struct DeviceRow {
    #[tabled(rename = "DEVICE ID")]
    id: String,
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "ONLINE")]
    online: String,
    #[tabled(rename = "MODEL")]
    model: String,
    #[tabled(rename = "MAC")]
    mac: String,
}

impl From<&Device> for DeviceRow {
    fn from(device: &Device) -> Self {
        Self {
            id: output::truncate(&device.deviceid, 20),
            name: match device.name() {
                "" => "-".to_string(),
                name => name.to_string(),
            },
            online: if device.online() { "yes" } else { "no" }.to_string(),
            model: device
                .attributes
                .get("productModel")
                .and_then(|v| v.as_str())
                .unwrap_or("-")
                .to_string(),
            mac: device
                .sta_mac()
                .map(normalize_mac)
                .unwrap_or_else(|| "-".to_string()),
        }
    }
}

async fn save(ctx: &RuntimeContext, file: Option<&Path>) -> Result<ExitCode> {
    let file = ctx.devices_cache(file)?;
    let client = CloudClient::new(ctx.cloud_settings()?)?;

    let result = zeroconf::save_devices_cache(&client, &file).await;
    print_result(ctx, &result)
}

async fn list(ctx: &RuntimeContext, filter: Option<&str>, file: Option<&Path>) -> Result<ExitCode> {
    let file = ctx.devices_cache(file)?;
    let devices = match zeroconf::load_cached_devices(&file).await {
        Ok(devices) => devices,
        Err(err) => return print_load_failure(ctx, &err, "devices save"),
    };

    let filtered = filter_devices(&devices, filter);

    output_for_format(ctx, &filtered, || {
        if filtered.is_empty() {
            if filter.is_some() {
                println!("No cached devices match filter");
            } else {
                println!("No devices cached in {}", file.display());
            }
            return Ok(());
        }
        let rows: Vec<DeviceRow> = filtered.iter().map(|d| DeviceRow::from(*d)).collect();
        print_table(ctx, &rows)
    })?;

    Ok(ExitCode::SUCCESS)
}

fn filter_devices<'a>(devices: &'a [Device], filter: Option<&str>) -> Vec<&'a Device> {
    let Some(filter) = filter else {
        return devices.iter().collect();
    };

    let matcher = SkimMatcherV2::default();
    devices
        .iter()
        .filter(|d| {
            matcher.fuzzy_match(&d.deviceid, filter).is_some()
                || matcher.fuzzy_match(d.name(), filter).is_some()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn devices() -> Vec<Device> {
        serde_json::from_value(serde_json::json!([
            {"deviceid": "1000aa01", "name": "Kitchen Plug", "online": true,
             "params": {"staMac": "D8-F1-5B-00-00-01"}, "productModel": "S26"},
            {"deviceid": "1000bb02", "name": "Porch Light", "params": {}}
        ]))
        .unwrap()
    }

    #[test]
    fn test_filter_devices_by_name() {
        let devices = devices();
        let matched = filter_devices(&devices, Some("kitch"));
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].deviceid, "1000aa01");

        assert_eq!(filter_devices(&devices, None).len(), 2);
        assert!(filter_devices(&devices, Some("zzzz")).is_empty());
    }

    #[test]
    fn test_device_row() {
        let devices = devices();
        let row = DeviceRow::from(&devices[0]);
        assert_eq!(row.mac, "d8:f1:5b:00:00:01");
        assert_eq!(row.model, "S26");
        assert_eq!(row.online, "yes");

        let row = DeviceRow::from(&devices[1]);
        assert_eq!(row.mac, "-");
        assert_eq!(row.online, "no");
    }
}
