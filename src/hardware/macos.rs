use std::process::Command;

use crate::errors::{AuthError, AuthResult};
use crate::hardware::{normalize_mac, Candidate};

/// Enumerate hardware network ports on macOS.
///
/// Uses `networksetup -listallhardwareports`, which only reports real
/// hardware ports (Wi-Fi, Ethernet, Thunderbolt bridges), so no extra
/// virtual-device filtering is needed. The BSD device name (`en0`, `en1`,
/// ...) is used as the candidate name.
pub fn physical_interfaces() -> AuthResult<Vec<Candidate>> {
    let output = Command::new("networksetup")
        .args(["-listallhardwareports"])
        .output()
        .map_err(|e| AuthError::Identity(format!("failed to run networksetup: {e}")))?;

    let text = String::from_utf8_lossy(&output.stdout);
    Ok(parse_hardware_ports(&text))
}

/// Parse `networksetup -listallhardwareports` output.
///
/// The output is a sequence of blocks:
///
/// ```text
/// Hardware Port: Wi-Fi
/// Device: en0
/// Ethernet Address: aa:bb:cc:dd:ee:ff
/// ```
fn parse_hardware_ports(output: &str) -> Vec<Candidate> {
    let mut candidates = Vec::new();
    let mut device: Option<String> = None;

    for line in output.lines() {
        let line = line.trim();
        if let Some(value) = line.strip_prefix("Device:") {
            device = Some(value.trim().to_string());
        } else if let Some(value) = line.strip_prefix("Ethernet Address:") {
            if let (Some(name), Some(mac)) = (device.take(), normalize_mac(value)) {
                candidates.push(Candidate { name, mac });
            }
        } else if line.starts_with("Hardware Port:") {
            device = None;
        }
    }

    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_networksetup_blocks() {
        let output = "\
Hardware Port: Wi-Fi
Device: en0
Ethernet Address: aa:bb:cc:dd:ee:01

Hardware Port: Thunderbolt Ethernet
Device: en1
Ethernet Address: aa:bb:cc:dd:ee:02

Hardware Port: Thunderbolt Bridge
Device: bridge0
Ethernet Address: N/A
";

        let candidates = parse_hardware_ports(output);
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].name, "en0");
        assert_eq!(candidates[0].mac, "AA:BB:CC:DD:EE:01");
        assert_eq!(candidates[1].name, "en1");
    }

    #[test]
    fn empty_output_yields_no_candidates() {
        assert!(parse_hardware_ports("").is_empty());
    }
}
