use std::process::Command;

use crate::errors::{AuthError, AuthResult};
use crate::hardware::{normalize_mac, Candidate};

/// Enumerate network adapters on Windows.
///
/// Uses `getmac /fo csv /v /nh`, which reports one CSV row per adapter:
/// connection name, adapter description, physical address, transport name.
/// Adapters without a usable physical address (reported as `N/A`) are
/// dropped. The connection name is used as the candidate name.
pub fn physical_interfaces() -> AuthResult<Vec<Candidate>> {
    let output = Command::new("getmac")
        .args(["/fo", "csv", "/v", "/nh"])
        .output()
        .map_err(|e| AuthError::Identity(format!("failed to run getmac: {e}")))?;

    let text = String::from_utf8_lossy(&output.stdout);
    Ok(parse_getmac_csv(&text))
}

/// Parse `getmac /fo csv /v /nh` output.
///
/// Rows look like:
///
/// ```text
/// "Ethernet","Intel(R) Ethernet","AA-BB-CC-DD-EE-FF","\Device\Tcpip_{...}"
/// ```
fn parse_getmac_csv(output: &str) -> Vec<Candidate> {
    let mut candidates = Vec::new();

    for line in output.lines() {
        let fields: Vec<String> = line
            .split("\",\"")
            .map(|f| f.trim().trim_matches('"').to_string())
            .collect();

        if fields.len() < 3 {
            continue;
        }

        let name = fields[0].clone();
        if name.is_empty() {
            continue;
        }

        if let Some(mac) = normalize_mac(&fields[2]) {
            candidates.push(Candidate { name, mac });
        }
    }

    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_getmac_rows() {
        let output = "\
\"Ethernet\",\"Intel(R) Ethernet Connection\",\"AA-BB-CC-DD-EE-01\",\"\\Device\\Tcpip_{11111111}\"
\"Wi-Fi\",\"Wireless Adapter\",\"AA-BB-CC-DD-EE-02\",\"\\Device\\Tcpip_{22222222}\"
\"Bluetooth\",\"Bluetooth Device\",\"N/A\",\"Media disconnected\"
";

        let candidates = parse_getmac_csv(output);
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].name, "Ethernet");
        assert_eq!(candidates[0].mac, "AA:BB:CC:DD:EE:01");
        assert_eq!(candidates[1].name, "Wi-Fi");
    }

    #[test]
    fn short_rows_are_skipped() {
        assert!(parse_getmac_csv("\"Ethernet\"\n\n").is_empty());
    }
}
