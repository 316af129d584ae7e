//! Device identity resolution.
//!
//! The enrollment key for the CRS handshake is the hardware address of one
//! physical network interface, rendered as colon-delimited uppercase hex
//! (`AA:BB:CC:DD:EE:FF`). The interface is chosen deterministically so the
//! same machine enrolls under the same identifier on every run:
//!
//! 1. enumerate the platform's network interfaces,
//! 2. drop loopback, virtual devices (where the platform lets us tell them
//!    apart), and anything with a zero or unparseable hardware address,
//! 3. sort the survivors by interface name and take the first.
//!
//! If two survivors share a name the ordering is a tie and resolution fails
//! with [`AuthError::AmbiguousInterface`] instead of picking one arbitrarily.
//! On Windows, macOS, and Linux the enumeration uses different platform
//! facilities; see the per-OS submodules.

use std::fmt;

use crate::errors::{AuthError, AuthResult};

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "macos")]
mod macos;
#[cfg(target_os = "windows")]
mod windows;

#[cfg(target_os = "linux")]
use linux as platform;
#[cfg(target_os = "macos")]
use macos as platform;
#[cfg(target_os = "windows")]
use windows as platform;

/// Stable device identifier used as the enrollment key.
///
/// Opaque to the rest of the crate: created once, never parsed, never
/// persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceId(String);

impl DeviceId {
    /// Wrap a pre-resolved identifier.
    ///
    /// Most callers should go through [`resolve_device_id`]; this exists for
    /// hosts that derive the identity elsewhere.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A network interface reported by the platform probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Candidate {
    /// Interface name, the sort key for deterministic selection.
    pub name: String,
    /// Hardware address, already normalized by [`normalize_mac`].
    pub mac: String,
}

/// Resolve the device identifier for this machine.
///
/// Fails with [`AuthError::NoInterface`] when no physical interface with a
/// non-zero hardware address exists, and [`AuthError::AmbiguousInterface`]
/// when the selection rule cannot break a tie.
pub fn resolve_device_id() -> AuthResult<DeviceId> {
    let candidates = platform::physical_interfaces()?;
    select_candidate(candidates).map(|c| DeviceId(c.mac))
}

/// Apply the deterministic selection rule to a candidate list.
fn select_candidate(mut candidates: Vec<Candidate>) -> AuthResult<Candidate> {
    candidates.retain(|c| !is_zero_mac(&c.mac));

    if candidates.is_empty() {
        return Err(AuthError::NoInterface);
    }

    candidates.sort_by(|a, b| a.name.cmp(&b.name));

    // A duplicated name means the sort order between the two is meaningless.
    if candidates.len() > 1 && candidates[0].name == candidates[1].name {
        return Err(AuthError::AmbiguousInterface(candidates[0].name.clone()));
    }

    Ok(candidates.remove(0))
}

/// Normalize a raw hardware address into colon-delimited uppercase hex.
///
/// Accepts colon-, hyphen-, or un-delimited six-octet forms. Returns `None`
/// for anything else.
pub(crate) fn normalize_mac(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| *c != ':' && *c != '-')
        .collect();

    if cleaned.len() != 12 || !cleaned.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }

    let upper = cleaned.to_ascii_uppercase();
    let octets: Vec<&str> = (0..6).map(|i| &upper[i * 2..i * 2 + 2]).collect();
    Some(octets.join(":"))
}

fn is_zero_mac(mac: &str) -> bool {
    mac.chars().all(|c| c == '0' || c == ':')
}
