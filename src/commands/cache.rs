//! Cache status command

use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Result;
use serde::Serialize;
use tabled::Tabled;

use crate::cli::CacheCommand;
use crate::config::RuntimeContext;
use crate::output::{output_for_format, print_table};
use crate::zeroconf::{cache_file_status, CacheFileStatus};

pub async fn run(ctx: &RuntimeContext, command: CacheCommand) -> Result<ExitCode> {
    match command {
        CacheCommand::Status { devices, arp } => status(ctx, devices.as_deref(), arp.as_deref()).await,
    }
}

#[derive(Debug, Serialize)]
struct CacheStatus {
    devices: CacheFileStatus,
    arp_table: CacheFileStatus,
}

#[derive(Tabled)]
struct CacheRow {
    #[tabled(rename = "Type")]
    cache_type: &'static str,
    #[tabled(rename = "Entries")]
    entries: String,
    #[tabled(rename = "Size")]
    size: String,
    #[tabled(rename = "Age")]
    age: String,
    #[tabled(rename = "Status")]
    status: String,
}

impl CacheRow {
    fn new(cache_type: &'static str, file: &CacheFileStatus) -> Self {
        if !file.exists {
            return Self {
                cache_type,
                entries: "-".to_string(),
                size: "-".to_string(),
                age: "-".to_string(),
                status: "not cached".to_string(),
            };
        }

        Self {
            cache_type,
            entries: file
                .entries
                .map(|n| n.to_string())
                .unwrap_or_else(|| "?".to_string()),
            size: format_bytes(file.size_bytes),
            age: file
                .age_secs
                .map(format_age)
                .unwrap_or_else(|| "-".to_string()),
            status: match &file.error {
                Some(_) => "unreadable".to_string(),
                None => "ok".to_string(),
            },
        }
    }
}

async fn status(ctx: &RuntimeContext, devices: Option<&Path>, arp: Option<&Path>) -> Result<ExitCode> {
    let status = CacheStatus {
        devices: cache_file_status(&ctx.devices_cache(devices)?).await,
        arp_table: cache_file_status(&ctx.arp_table(arp)?).await,
    };

    output_for_format(ctx, &status, || {
        println!("Devices: {}", status.devices.path.display());
        println!("ARP table: {}", status.arp_table.path.display());
        println!();

        let rows = vec![
            CacheRow::new("Devices", &status.devices),
            CacheRow::new("ARP table", &status.arp_table),
        ];
        print_table(ctx, &rows)?;

        for file in [&status.devices, &status.arp_table] {
            if let (true, Some(error)) = (file.exists, &file.error) {
                log::warn!("{error}");
            }
        }
        Ok(())
    })?;

    Ok(ExitCode::SUCCESS)
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

/// Age rounded to its largest unit, e.g. "3h" rather than "3h 12m 5s"
fn format_age(secs: u64) -> String {
    let rounded = match secs {
        0..=59 => secs,
        60..=3599 => secs / 60 * 60,
        3600..=86_399 => secs / 3600 * 3600,
        _ => secs / 86_400 * 86_400,
    };
    humantime::format_duration(Duration::from_secs(rounded)).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
    }

    #[test]
    fn test_format_age() {
        assert_eq!(format_age(0), "0s");
        assert_eq!(format_age(42), "42s");
        assert_eq!(format_age(125), "2m");
        assert_eq!(format_age(3 * 3600 + 720), "3h");
        assert_eq!(format_age(2 * 86_400 + 10), "2days");
    }

    #[test]
    fn test_cache_row_missing_file() {
        let file = CacheFileStatus {
            path: PathBuf::from("missing.json"),
            exists: false,
            entries: None,
            size_bytes: 0,
            age_secs: None,
            error: Some("ENOENT".to_string()),
        };
        let row = CacheRow::new("Devices", &file);
        assert_eq!(row.status, "not cached");
        assert_eq!(row.entries, "-");
    }

    #[test]
    fn test_cache_row_corrupt_file() {
        let file = CacheFileStatus {
            path: PathBuf::from("arp.json"),
            exists: true,
            entries: None,
            size_bytes: 10,
            age_secs: Some(5),
            error: Some("invalid JSON".to_string()),
        };
        let row = CacheRow::new("ARP table", &file);
        assert_eq!(row.status, "unreadable");
        assert_eq!(row.entries, "?");
        assert_eq!(row.age, "5s");
    }
}
