//! Cross-reference of the device cache against the ARP table

use std::path::Path;

use serde::Serialize;

use crate::api::Device;
use crate::error::ZeroconfError;

use super::arp::{normalize_mac, ArpEntry};
use super::{load_arp_table, load_cached_devices};

/// Cached devices joined with the local neighbour table
#[derive(Debug, Clone, Default)]
pub struct LocalNetwork {
    devices: Vec<Device>,
    arp_table: Vec<ArpEntry>,
}

/// Where a cached device sits on the local network
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedDevice {
    pub deviceid: String,
    pub name: String,
    pub mac: Option<String>,
    pub ip: Option<String>,
}

impl LocalNetwork {
    pub fn new(devices: Vec<Device>, arp_table: Vec<ArpEntry>) -> Self {
        Self { devices, arp_table }
    }

    pub async fn from_cache_files(devices: &Path, arp_table: &Path) -> Result<Self, ZeroconfError> {
        let devices = load_cached_devices(devices).await?;
        let arp_table = load_arp_table(arp_table).await?;
        Ok(Self::new(devices, arp_table))
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    pub fn device(&self, device_id: &str) -> Option<&Device> {
        self.devices.iter().find(|d| d.deviceid == device_id)
    }

    /// LAN address of a cached device, matched through its station MAC
    pub fn device_ip(&self, device_id: &str) -> Result<&str, ZeroconfError> {
        let device = self
            .device(device_id)
            .ok_or_else(|| ZeroconfError::Lookup(format!("device {device_id} is not cached")))?;
        let mac = device.sta_mac().ok_or_else(|| {
            ZeroconfError::Lookup(format!("device {device_id} does not report a MAC address"))
        })?;

        self.ip_for_mac(mac).ok_or_else(|| {
            ZeroconfError::Lookup(format!(
                "device {device_id} ({}) is not in the arp table",
                normalize_mac(mac)
            ))
        })
    }

    /// One row per cached device, in cache order
    pub fn resolve(&self) -> Vec<ResolvedDevice> {
        self.devices
            .iter()
            .map(|device| {
                let mac = device.sta_mac().map(normalize_mac);
                let ip = mac
                    .as_deref()
                    .and_then(|mac| self.ip_for_mac(mac))
                    .map(str::to_string);
                ResolvedDevice {
                    deviceid: device.deviceid.clone(),
                    name: device.name().to_string(),
                    mac,
                    ip,
                }
            })
            .collect()
    }

    fn ip_for_mac(&self, mac: &str) -> Option<&str> {
        let mac = normalize_mac(mac);
        self.arp_table
            .iter()
            .find(|entry| normalize_mac(&entry.mac) == mac)
            .map(|entry| entry.ip.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(id: &str, params: serde_json::Value) -> Device {
        serde_json::from_value(serde_json::json!({
            "deviceid": id,
            "name": format!("Device {id}"),
            "params": params,
        }))
        .unwrap()
    }

    fn network() -> LocalNetwork {
        LocalNetwork::new(
            vec![
                device("a1", serde_json::json!({"staMac": "D8:F1:5B:00:00:01"})),
                device("b2", serde_json::json!({"staMac": "d8-f1-5b-00-00-02"})),
                device("c3", serde_json::json!({})),
            ],
            vec![
                ArpEntry::new("192.168.1.31", "d8:f1:5b:00:00:01"),
                ArpEntry::new("192.168.1.40", "aa:aa:aa:aa:aa:aa"),
            ],
        )
    }

    #[test]
    fn test_device_ip_matches_case_and_separator_insensitively() {
        assert_eq!(network().device_ip("a1").unwrap(), "192.168.1.31");
    }

    #[test]
    fn test_device_ip_failures() {
        let net = network();
        assert!(matches!(net.device_ip("zz"), Err(ZeroconfError::Lookup(_))));
        assert!(net
            .device_ip("b2")
            .unwrap_err()
            .to_string()
            .contains("d8:f1:5b:00:00:02"));
        assert!(net
            .device_ip("c3")
            .unwrap_err()
            .to_string()
            .contains("does not report"));
    }

    #[test]
    fn test_resolve_keeps_cache_order() {
        let rows = network().resolve();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].ip.as_deref(), Some("192.168.1.31"));
        assert_eq!(rows[1].mac.as_deref(), Some("d8:f1:5b:00:00:02"));
        assert_eq!(rows[1].ip, None);
        assert_eq!(rows[2].deviceid, "c3");
        assert_eq!(rows[2].mac, None);
    }

    #[tokio::test]
    async fn test_from_cache_files_missing_arp_table() {
        let dir = tempfile::tempdir().unwrap();
        let devices = dir.path().join("devices-cache.json");
        std::fs::write(&devices, "[]").unwrap();

        let err = LocalNetwork::from_cache_files(&devices, &dir.path().join("arp.json"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
