use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Placeholder replaced by the profile token in upstream URI templates
pub const PROFILE_PLACEHOLDER: &str = "{profile}";

/// Percent-encode everything outside the URI unreserved set
pub fn percent_encode(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for b in raw.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => out.push(b as char),
            _ => out.push_str(&format!("%{:02X}", b)),
        }
    }
    out
}

/// Static identity reported by GetDeviceInformation, GetScopes and WS-Discovery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceIdentity {
    pub name: String,
    pub location: String,
    pub manufacturer: String,
    pub model: String,
    pub firmware_version: String,
    pub serial_number: String,
    pub hardware_id: String,
    pub hostname: String,
    /// WS-Addressing endpoint reference; derived from hostname and serial when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint_uuid: Option<String>,
}

impl DeviceIdentity {
    /// Endpoint UUID (without the `urn:uuid:` prefix). Unless configured, it is
    /// a name-based UUID so the same device keeps it across restarts.
    pub fn endpoint_reference(&self) -> String {
        match &self.endpoint_uuid {
            Some(uuid) => uuid.clone(),
            None => {
                let name = format!("onvif-emulator:{}:{}", self.hostname, self.serial_number);
                Uuid::new_v5(&Uuid::NAMESPACE_URL, name.as_bytes()).to_string()
            }
        }
    }
}

impl Default for DeviceIdentity {
    fn default() -> Self {
        Self {
            name: "onvif-emulator".to_string(),
            location: "unknown".to_string(),
            manufacturer: "RTSP-Proxy".to_string(),
            model: "Virtual-Camera".to_string(),
            firmware_version: env!("CARGO_PKG_VERSION").to_string(),
            serial_number: "00000000".to_string(),
            hardware_id: "Emulator".to_string(),
            hostname: "onvif-emulator".to_string(),
            endpoint_uuid: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: SocketAddr,
    /// Host used in advertised XAddrs; detected from the default route when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advertised_host: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 8080)),
            advertised_host: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 3702,
        }
    }
}

/// Network settings reported by the Device service getters. Nothing is applied
/// to the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Interface token and name
    pub interface: String,
    pub hw_address: String,
    pub mtu: u32,
    pub prefix_length: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway: Option<Ipv4Addr>,
    pub dns: Vec<IpAddr>,
    /// NTP servers, addresses or DNS names
    pub ntp: Vec<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            interface: "eth0".to_string(),
            hw_address: "02:00:00:00:00:01".to_string(),
            mtu: 1500,
            prefix_length: 24,
            gateway: None,
            dns: vec![
                IpAddr::V4(Ipv4Addr::new(4, 4, 4, 4)),
                IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8)),
            ],
            ntp: vec!["pool.ntp.org".to_string()],
        }
    }
}

/// Where the real media lives. `{profile}` is substituted with the
/// percent-encoded profile token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub stream_uri: String,
    pub snapshot_uri: String,
}

impl UpstreamConfig {
    pub fn stream_uri_for(&self, profile_token: &str) -> String {
        self.stream_uri.replace(PROFILE_PLACEHOLDER, &percent_encode(profile_token))
    }

    pub fn snapshot_uri_for(&self, profile_token: &str) -> String {
        self.snapshot_uri.replace(PROFILE_PLACEHOLDER, &percent_encode(profile_token))
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            stream_uri: "rtsp://127.0.0.1:8554/{profile}".to_string(),
            snapshot_uri: "http://127.0.0.1:8080/snapshot/{profile}".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_substitutes_profile() {
        let upstream = UpstreamConfig {
            stream_uri: "rtsp://10.0.0.5:8554/{profile}/live".to_string(),
            snapshot_uri: "http://10.0.0.5/snap?p={profile}".to_string(),
        };
        assert_eq!(upstream.stream_uri_for("main"), "rtsp://10.0.0.5:8554/main/live");
        assert_eq!(upstream.snapshot_uri_for("sub"), "http://10.0.0.5/snap?p=sub");
    }

    #[test]
    fn test_upstream_encodes_profile_token() {
        let upstream = UpstreamConfig::default();
        assert_eq!(
            upstream.stream_uri_for("side cam/1"),
            "rtsp://127.0.0.1:8554/side%20cam%2F1"
        );
        assert_eq!(
            upstream.snapshot_uri_for("a?b&c"),
            "http://127.0.0.1:8080/snapshot/a%3Fb%26c"
        );
    }

    #[test]
    fn test_endpoint_reference_is_stable() {
        let first = DeviceIdentity::default();
        let second = DeviceIdentity::default();
        assert_eq!(first.endpoint_reference(), second.endpoint_reference());
        assert!(uuid::Uuid::parse_str(&first.endpoint_reference()).is_ok());

        let other = DeviceIdentity {
            serial_number: "12345678".to_string(),
            ..DeviceIdentity::default()
        };
        assert_ne!(other.endpoint_reference(), first.endpoint_reference());

        let pinned = DeviceIdentity {
            endpoint_uuid: Some("6f1a1c4e-0000-4000-8000-000000000001".to_string()),
            ..DeviceIdentity::default()
        };
        assert_eq!(pinned.endpoint_reference(), "6f1a1c4e-0000-4000-8000-000000000001");
    }

    #[test]
    fn test_upstream_without_placeholder_is_static() {
        let upstream = UpstreamConfig {
            stream_uri: "rtsp://cam/stream".to_string(),
            snapshot_uri: "http://cam/snap.jpg".to_string(),
        };
        assert_eq!(upstream.stream_uri_for("anything"), "rtsp://cam/stream");
    }
}
