//! ARP table reading and MAC normalization

use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ZeroconfError;

/// One IP/MAC pair from the neighbour table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArpEntry {
    pub ip: String,
    pub mac: String,
}

impl ArpEntry {
    pub fn new(ip: impl Into<String>, mac: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            mac: mac.into(),
        }
    }
}

/// Normalize a MAC address to lowercase, `:`-separated octets.
///
/// Six well-formed octets are zero-padded (`0:1b:..` becomes `00:1b:..`).
/// Anything else keeps its octets as-is but still gets `:` separators.
pub fn normalize_mac(mac: &str) -> String {
    let octets: Vec<&str> = mac.trim().split([':', '-']).collect();
    let well_formed = octets.len() == 6
        && octets
            .iter()
            .all(|o| (1..=2).contains(&o.len()) && o.chars().all(|c| c.is_ascii_hexdigit()));

    if well_formed {
        octets
            .iter()
            .map(|o| format!("{:0>2}", o.to_ascii_lowercase()))
            .collect::<Vec<_>>()
            .join(":")
    } else {
        octets.join(":").to_ascii_lowercase()
    }
}

/// Return a copy of `entries` with every MAC normalized, order preserved
pub fn fix_mac_addresses(entries: &[ArpEntry]) -> Vec<ArpEntry> {
    entries
        .iter()
        .map(|entry| ArpEntry {
            ip: entry.ip.clone(),
            mac: normalize_mac(&entry.mac),
        })
        .collect()
}

/// Source of raw neighbour table entries
pub trait ArpSource {
    async fn read_table(&self) -> Result<Vec<ArpEntry>, ZeroconfError>;
}

/// Reads the host's ARP table: `/proc/net/arp` where it exists, otherwise
/// the output of the `arp` utility.
#[derive(Debug, Clone)]
pub struct SystemArp {
    proc_path: PathBuf,
    command: String,
}

impl SystemArp {
    pub fn new(proc_path: impl Into<PathBuf>, command: impl Into<String>) -> Self {
        Self {
            proc_path: proc_path.into(),
            command: command.into(),
        }
    }

    async fn read_command(&self) -> Result<Vec<ArpEntry>, ZeroconfError> {
        let args: &[&str] = if cfg!(windows) { &["-a"] } else { &["-an"] };
        log::debug!("running {} {}", self.command, args.join(" "));

        let output = tokio::process::Command::new(&self.command)
            .args(args)
            .output()
            .await
            .map_err(|err| ZeroconfError::Arp(format!("running {}: {err}", self.command)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ZeroconfError::Arp(format!(
                "{} exited with {}: {}",
                self.command,
                output.status,
                stderr.trim()
            )));
        }

        Ok(parse_arp_output(&String::from_utf8_lossy(&output.stdout)))
    }
}

impl Default for SystemArp {
    fn default() -> Self {
        Self::new("/proc/net/arp", "arp")
    }
}

impl ArpSource for SystemArp {
    async fn read_table(&self) -> Result<Vec<ArpEntry>, ZeroconfError> {
        if is_file(&self.proc_path).await {
            log::debug!("reading neighbour table from {}", self.proc_path.display());
            let content = tokio::fs::read_to_string(&self.proc_path)
                .await
                .map_err(|err| ZeroconfError::filesystem("open", &self.proc_path, &err))?;
            return Ok(parse_proc_arp(&content));
        }

        self.read_command().await
    }
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|meta| meta.is_file())
        .unwrap_or(false)
}

/// Parse the Linux `/proc/net/arp` format, skipping incomplete entries
pub fn parse_proc_arp(content: &str) -> Vec<ArpEntry> {
    let mut entries = Vec::new();

    for line in content.lines().skip(1) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 6 {
            if !line.trim().is_empty() {
                log::warn!("skipping malformed arp line: {line}");
            }
            continue;
        }

        let (ip, flags, mac) = (fields[0], fields[2], fields[3]);
        if flags == "0x0" || ip.parse::<Ipv4Addr>().is_err() {
            continue;
        }
        if let Some(entry) = complete_entry(ip, mac) {
            entries.push(entry);
        }
    }

    entries
}

/// Parse `arp -an` (BSD, macOS, net-tools) and `arp -a` (Windows) output
pub fn parse_arp_output(content: &str) -> Vec<ArpEntry> {
    static BSD: OnceLock<Regex> = OnceLock::new();
    static WINDOWS: OnceLock<Regex> = OnceLock::new();

    let bsd = BSD.get_or_init(|| {
        Regex::new(r"\((\d{1,3}(?:\.\d{1,3}){3})\) at ([0-9A-Fa-f]{1,2}(?:[:-][0-9A-Fa-f]{1,2}){5})")
            .expect("valid bsd arp pattern")
    });
    let windows = WINDOWS.get_or_init(|| {
        Regex::new(r"^\s*(\d{1,3}(?:\.\d{1,3}){3})\s+([0-9A-Fa-f]{2}(?:-[0-9A-Fa-f]{2}){5})\s")
            .expect("valid windows arp pattern")
    });

    content
        .lines()
        .filter_map(|line| bsd.captures(line).or_else(|| windows.captures(line)))
        .filter(|caps| caps[1].parse::<Ipv4Addr>().is_ok())
        .filter_map(|caps| complete_entry(&caps[1], &caps[2]))
        .collect()
}

fn complete_entry(ip: &str, mac: &str) -> Option<ArpEntry> {
    let mac = normalize_mac(mac);
    if mac == "00:00:00:00:00:00" || mac == "ff:ff:ff:ff:ff:ff" {
        return None;
    }
    Some(ArpEntry::new(ip, mac))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fix_mac_with_mixed_separators() {
        let fixed = fix_mac_addresses(&[ArpEntry::new("127.0.0.1", "01:02-03-0a-0b-0c")]);
        assert_eq!(fixed, vec![ArpEntry::new("127.0.0.1", "01:02:03:0a:0b:0c")]);
    }

    #[test]
    fn test_fix_mac_is_idempotent_and_preserves_order() {
        let entries = vec![
            ArpEntry::new("10.0.0.2", "AA-BB-CC-DD-EE-FF"),
            ArpEntry::new("10.0.0.1", "0:1b:2c:3d:4e:5f"),
            ArpEntry::new("10.0.0.3", "11:22:33:44:55:66"),
        ];

        let once = fix_mac_addresses(&entries);
        let twice = fix_mac_addresses(&once);

        assert_eq!(once, twice);
        assert_eq!(once[0], ArpEntry::new("10.0.0.2", "aa:bb:cc:dd:ee:ff"));
        assert_eq!(once[1], ArpEntry::new("10.0.0.1", "00:1b:2c:3d:4e:5f"));
        assert_eq!(once[2].ip, "10.0.0.3");
    }

    #[test]
    fn test_normalize_malformed_mac_only_swaps_separators() {
        assert_eq!(normalize_mac("01-02-03"), "01:02:03");
        assert_eq!(normalize_mac("AB-CD-EF-01-02-03-04"), "ab:cd:ef:01:02:03:04");
        assert!(!normalize_mac("(incomplete)").contains('-'));
    }

    #[test]
    fn test_parse_proc_arp() {
        let content = "IP address       HW type     Flags       HW address            Mask     Device
192.168.1.1      0x1         0x2         aa:bb:cc:dd:ee:ff     *        eth0
192.168.1.3      0x1         0x0         00:00:00:00:00:00     *        eth0
incomplete line
192.168.1.10     0x1         0x2         AA:11:22:33:44:55     *        wlan0
";

        let entries = parse_proc_arp(content);
        assert_eq!(
            entries,
            vec![
                ArpEntry::new("192.168.1.1", "aa:bb:cc:dd:ee:ff"),
                ArpEntry::new("192.168.1.10", "aa:11:22:33:44:55"),
            ]
        );
    }

    #[test]
    fn test_parse_bsd_arp_output() {
        let content = "? (192.168.1.1) at 0:1b:2c:3d:4e:5f on en0 ifscope [ethernet]
? (192.168.1.7) at (incomplete) on en0 ifscope [ethernet]
? (192.168.1.255) at ff:ff:ff:ff:ff:ff on en0 ifscope [ethernet]
router (192.168.1.2) at a4:5e:60:e1:2:3 [ether] on wlan0
";

        let entries = parse_arp_output(content);
        assert_eq!(
            entries,
            vec![
                ArpEntry::new("192.168.1.1", "00:1b:2c:3d:4e:5f"),
                ArpEntry::new("192.168.1.2", "a4:5e:60:e1:02:03"),
            ]
        );
    }

    #[test]
    fn test_parse_windows_arp_output() {
        let content = "
Interface: 192.168.1.100 --- 0xb
  Internet Address      Physical Address      Type
  192.168.1.1           00-1b-2c-3d-4e-5f     dynamic
  192.168.1.255         ff-ff-ff-ff-ff-ff     static
  224.0.0.22            01-00-5e-00-00-16     static
";

        let entries = parse_arp_output(content);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], ArpEntry::new("192.168.1.1", "00:1b:2c:3d:4e:5f"));
        assert_eq!(entries[1].mac, "01:00:5e:00:00:16");
    }

    #[tokio::test]
    async fn test_system_arp_reads_proc_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("arp");
        std::fs::write(
            &path,
            "IP address       HW type     Flags       HW address            Mask     Device
10.0.0.8         0x1         0x2         de-ad-be-ef-00-01     *        eth0
",
        )
        .unwrap();

        let source = SystemArp::new(&path, "arp");
        let entries = source.read_table().await.unwrap();
        assert_eq!(entries, vec![ArpEntry::new("10.0.0.8", "de:ad:be:ef:00:01")]);
    }

    #[tokio::test]
    async fn test_system_arp_missing_command() {
        let source = SystemArp::new("/nonexistent/proc/net/arp", "/nonexistent/bin/arp");
        let err = source.read_table().await.unwrap_err();
        assert!(matches!(err, ZeroconfError::Arp(_)));
    }
}
