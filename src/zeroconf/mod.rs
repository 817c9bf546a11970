//! Local discovery and cache persistence
//!
//! Two JSON caches live here:
//! - the device cache, a snapshot of the cloud device list
//! - the ARP table, the IP/MAC pairs visible on the local segment
//!
//! Saves overwrite the target file wholesale. Loads either return the full
//! sequence or fail as a whole.

pub mod arp;
pub mod network;
pub mod range;

use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::net::UdpSocket;

use crate::api::{Device, DeviceSource};
use crate::error::ZeroconfError;

pub use arp::{fix_mac_addresses, normalize_mac, ArpEntry, ArpSource, SystemArp};
pub use network::LocalNetwork;
pub use range::ScanRange;

/// Probes go to the discard port; only the ARP resolution matters
const PROBE_PORT: u16 = 9;

/// Success result object
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Saved {
    pub status: &'static str,
    pub file: String,
}

impl Saved {
    fn ok(file: &Path) -> Self {
        Self {
            status: "ok",
            file: file.display().to_string(),
        }
    }
}

/// Settings for populating the neighbour table before reading it
#[derive(Debug, Clone, Copy)]
pub struct ProbeSettings {
    pub max_hosts: usize,
    pub settle: Duration,
}

/// Snapshot the cloud device list to `file`
pub async fn save_devices_cache<S: DeviceSource>(
    source: &S,
    file: &Path,
) -> Result<Saved, ZeroconfError> {
    let devices = source.get_devices().await?;
    write_json(file, &devices).await?;

    log::info!("Saved {} devices to {}", devices.len(), file.display());
    Ok(Saved::ok(file))
}

/// Load a device cache written by [`save_devices_cache`]
pub async fn load_cached_devices(file: &Path) -> Result<Vec<Device>, ZeroconfError> {
    read_json(file).await
}

/// Load an ARP table written by [`Zeroconf::save_arp_table`]
pub async fn load_arp_table(file: &Path) -> Result<Vec<ArpEntry>, ZeroconfError> {
    read_json(file).await
}

/// ARP-based local discovery
pub struct Zeroconf<A> {
    source: A,
    probe: Option<ProbeSettings>,
}

impl<A: ArpSource> Zeroconf<A> {
    pub fn new(source: A) -> Self {
        Self {
            source,
            probe: None,
        }
    }

    pub fn with_probe(mut self, probe: ProbeSettings) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Neighbour table entries inside the `ip` range, MACs normalized.
    /// A range with no known neighbours is reported as empty.
    pub async fn arp_table(&self, ip: &str) -> Result<Vec<ArpEntry>, ZeroconfError> {
        let range = ScanRange::parse(ip)?;
        log::debug!(
            "scanning {} - {} ({} hosts)",
            range.first(),
            range.last(),
            range.len()
        );

        if let Some(probe) = self.probe {
            probe_range(&range, probe).await;
        }

        let entries: Vec<ArpEntry> = self
            .source
            .read_table()
            .await?
            .into_iter()
            .filter(|entry| {
                entry
                    .ip
                    .parse::<Ipv4Addr>()
                    .map(|ip| range.contains(ip))
                    .unwrap_or(false)
            })
            .collect();

        if entries.is_empty() {
            log::debug!("no neighbours answered in {ip}");
            return Err(ZeroconfError::EmptyRange);
        }

        Ok(fix_mac_addresses(&entries))
    }

    /// Query the neighbour table for `ip` and write it to `file`
    pub async fn save_arp_table(&self, ip: &str, file: &Path) -> Result<Saved, ZeroconfError> {
        let table = self.arp_table(ip).await?;
        write_json(file, &table).await?;

        log::info!("Saved {} arp entries to {}", table.len(), file.display());
        Ok(Saved::ok(file))
    }
}

/// Nudge every host in the range so the kernel resolves its MAC
async fn probe_range(range: &ScanRange, probe: ProbeSettings) {
    let socket = match UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await {
        Ok(socket) => socket,
        Err(err) => {
            log::warn!("skipping probe, cannot bind udp socket: {err}");
            return;
        }
    };

    if range.len() > probe.max_hosts as u64 {
        log::warn!(
            "probing only the first {} of {} hosts",
            probe.max_hosts,
            range.len()
        );
    }

    let socket = &socket;
    let sends = range.hosts().take(probe.max_hosts).map(|host| async move {
        if let Err(err) = socket.send_to(&[0], (host, PROBE_PORT)).await {
            log::debug!("probe to {host} failed: {err}");
        }
    });
    futures_util::future::join_all(sends).await;

    tokio::time::sleep(probe.settle).await;
}

async fn write_json<T: Serialize + ?Sized>(file: &Path, value: &T) -> Result<(), ZeroconfError> {
    let content = serde_json::to_string_pretty(value)
        .map_err(|err| ZeroconfError::Parse(format!("encoding {}: {err}", file.display())))?;

    log::debug!("writing {}", file.display());
    tokio::fs::write(file, content)
        .await
        .map_err(|err| ZeroconfError::filesystem("open", file, &err))
}

async fn read_json<T: DeserializeOwned>(file: &Path) -> Result<T, ZeroconfError> {
    log::debug!("reading {}", file.display());
    let content = tokio::fs::read_to_string(file)
        .await
        .map_err(|err| ZeroconfError::filesystem("open", file, &err))?;

    serde_json::from_str(&content).map_err(|err| {
        ZeroconfError::Parse(format!("invalid JSON in '{}': {err}", file.display()))
    })
}

/// State of one cache file on disk
#[derive(Debug, Clone, Serialize)]
pub struct CacheFileStatus {
    pub path: PathBuf,
    pub exists: bool,
    pub entries: Option<usize>,
    pub size_bytes: u64,
    pub age_secs: Option<u64>,
    pub error: Option<String>,
}

/// Inspect a cache file without failing on missing or corrupt content
pub async fn cache_file_status(path: &Path) -> CacheFileStatus {
    let mut status = CacheFileStatus {
        path: path.to_path_buf(),
        exists: false,
        entries: None,
        size_bytes: 0,
        age_secs: None,
        error: None,
    };

    let metadata = match tokio::fs::metadata(path).await {
        Ok(metadata) => metadata,
        Err(err) => {
            status.error = Some(ZeroconfError::filesystem("stat", path, &err).to_string());
            return status;
        }
    };

    status.exists = true;
    status.size_bytes = metadata.len();
    status.age_secs = metadata
        .modified()
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .map(|age| age.as_secs());

    match read_json::<Vec<serde_json::Value>>(path).await {
        Ok(items) => status.entries = Some(items.len()),
        Err(err) => status.error = Some(err.to_string()),
    }

    status
}
