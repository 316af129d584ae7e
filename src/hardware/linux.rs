use std::fs;
use std::path::Path;

use crate::errors::{AuthError, AuthResult};
use crate::hardware::{normalize_mac, Candidate};

const NET_CLASS_DIR: &str = "/sys/class/net";

/// Enumerate physical network interfaces from sysfs.
///
/// An interface counts as physical when its sysfs entry carries a `device`
/// link; bridges, veth pairs, bonds, and other virtual devices do not.
/// Loopback is skipped by name.
pub fn physical_interfaces() -> AuthResult<Vec<Candidate>> {
    interfaces_from_dir(Path::new(NET_CLASS_DIR))
}

fn interfaces_from_dir(dir: &Path) -> AuthResult<Vec<Candidate>> {
    let entries = fs::read_dir(dir)
        .map_err(|e| AuthError::Identity(format!("cannot read {}: {e}", dir.display())))?;

    let mut candidates = Vec::new();
    for entry in entries {
        let entry =
            entry.map_err(|e| AuthError::Identity(format!("cannot read sysfs entry: {e}")))?;
        let name = entry.file_name().to_string_lossy().into_owned();

        if name == "lo" {
            continue;
        }
        if !dir.join(&name).join("device").exists() {
            continue;
        }

        // Interfaces can disappear between the readdir and the address read.
        let raw = match fs::read_to_string(dir.join(&name).join("address")) {
            Ok(contents) => contents,
            Err(_) => continue,
        };

        if let Some(mac) = normalize_mac(&raw) {
            candidates.push(Candidate { name, mac });
        }
    }

    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn fake_iface(root: &Path, name: &str, address: Option<&str>, physical: bool) {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        if let Some(addr) = address {
            fs::write(dir.join("address"), format!("{addr}\n")).unwrap();
        }
        if physical {
            fs::create_dir_all(dir.join("device")).unwrap();
        }
    }

    #[test]
    fn sysfs_enumeration_skips_loopback_and_virtual() {
        let root = std::env::temp_dir().join(format!("crs-sysfs-{}", std::process::id()));
        let _ = fs::remove_dir_all(&root);

        fake_iface(&root, "lo", Some("00:00:00:00:00:00"), false);
        fake_iface(&root, "veth0", Some("aa:aa:aa:aa:aa:10"), false);
        fake_iface(&root, "enp3s0", Some("aa:bb:cc:dd:ee:ff"), true);
        fake_iface(&root, "wlp2s0", None, true);

        let mut found = interfaces_from_dir(&root).unwrap();
        found.sort_by(|a, b| a.name.cmp(&b.name));

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "enp3s0");
        assert_eq!(found[0].mac, "AA:BB:CC:DD:EE:FF");

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn missing_directory_is_a_probe_error() {
        let result = interfaces_from_dir(Path::new("/nonexistent/crs-net-class"));
        assert!(matches!(result, Err(AuthError::Identity(_))));
    }
}
