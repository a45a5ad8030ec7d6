//! WS-Discovery responder
//!
//! Answers multicast `Probe` messages with a unicast `ProbeMatches`
//! pointing at the device service. Reads only the static identity.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use config_manager::DeviceIdentity;
use quick_xml::events::Event;
use quick_xml::Reader;
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

use crate::device::scopes;
use crate::templates;

pub const MULTICAST_ADDR: Ipv4Addr = Ipv4Addr::new(239, 255, 255, 250);

/// Runtime discovery mode, shared by the Device service and the responder.
/// The responder stays bound while NonDiscoverable but ignores probes.
#[derive(Debug, Clone)]
pub struct DiscoveryMode(Arc<AtomicBool>);

impl DiscoveryMode {
    pub fn new(discoverable: bool) -> Self {
        Self(Arc::new(AtomicBool::new(discoverable)))
    }

    pub fn is_discoverable(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn set_discoverable(&self, discoverable: bool) {
        self.0.store(discoverable, Ordering::Relaxed);
    }
}

/// Fields of an incoming Probe the reply depends on
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Probe {
    pub message_id: String,
    pub types: Vec<String>,
}

impl Probe {
    /// Empty Types matches every device
    pub fn matches_device(&self) -> bool {
        self.types.is_empty()
            || self.types.iter().any(|t| {
                let local = t.rsplit(':').next().unwrap_or(t);
                local == "NetworkVideoTransmitter" || local == "Device"
            })
    }
}

/// Extract the Probe from a datagram. Anything else yields `None`.
pub fn parse_probe(xml: &str) -> Option<Probe> {
    let mut reader = Reader::from_str(xml);
    let mut current = String::new();
    let mut probe = Probe::default();
    let mut is_probe = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                current = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if current == "Probe" {
                    is_probe = true;
                }
            }
            Ok(Event::Text(t)) => {
                let text = t.unescape().ok()?;
                let text = text.trim();
                match current.as_str() {
                    "MessageID" => probe.message_id = text.to_string(),
                    "Types" if is_probe => {
                        probe.types = text.split_whitespace().map(str::to_string).collect();
                    }
                    _ => {}
                }
            }
            Ok(Event::End(_)) => current.clear(),
            Ok(Event::Eof) => break,
            Err(_) => return None,
            _ => {}
        }
    }

    is_probe.then_some(probe)
}

/// Build the ProbeMatches reply for a datagram, if it is a Probe for us
pub fn probe_reply(datagram: &str, identity: &DeviceIdentity, device_xaddr: &str) -> Option<String> {
    let probe = parse_probe(datagram)?;
    if !probe.matches_device() {
        return None;
    }
    Some(templates::probe_matches(
        &uuid::Uuid::new_v4().to_string(),
        &probe.message_id,
        &identity.endpoint_reference(),
        &scopes(identity),
        device_xaddr,
    ))
}

/// Listen for probes until the socket fails
pub async fn run_discovery(
    port: u16,
    identity: DeviceIdentity,
    device_xaddr: String,
    mode: DiscoveryMode,
) -> anyhow::Result<()> {
    let socket = UdpSocket::bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port))).await?;
    socket.join_multicast_v4(MULTICAST_ADDR, Ipv4Addr::UNSPECIFIED)?;
    info!("WS-Discovery listening on {}:{}", MULTICAST_ADDR, port);

    let mut buf = vec![0u8; 65_535];
    loop {
        let (len, peer) = socket.recv_from(&mut buf).await?;
        if !mode.is_discoverable() {
            continue;
        }
        let datagram = String::from_utf8_lossy(&buf[..len]);

        let Some(reply) = probe_reply(&datagram, &identity, &device_xaddr) else {
            continue;
        };
        debug!(%peer, "Answering probe");
        if let Err(e) = socket.send_to(reply.as_bytes(), peer).await {
            warn!(%peer, error = %e, "Failed to send ProbeMatches");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROBE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<s:Envelope xmlns:s="http://www.w3.org/2003/05/soap-envelope"
            xmlns:a="http://schemas.xmlsoap.org/ws/2004/08/addressing"
            xmlns:d="http://schemas.xmlsoap.org/ws/2005/04/discovery"
            xmlns:dn="http://www.onvif.org/ver10/network/wsdl">
  <s:Header>
    <a:Action>http://schemas.xmlsoap.org/ws/2005/04/discovery/Probe</a:Action>
    <a:MessageID>uuid:0a6dc791-2be6-4991-9af1-454778a1917a</a:MessageID>
    <a:To>urn:schemas-xmlsoap-org:ws:2005:04:discovery</a:To>
  </s:Header>
  <s:Body>
    <d:Probe><d:Types>dn:NetworkVideoTransmitter</d:Types></d:Probe>
  </s:Body>
</s:Envelope>"#;

    fn identity() -> DeviceIdentity {
        DeviceIdentity {
            endpoint_uuid: Some("6f1a1c4e-0000-4000-8000-000000000001".to_string()),
            ..DeviceIdentity::default()
        }
    }

    #[test]
    fn test_parse_probe() {
        let probe = parse_probe(PROBE).unwrap();
        assert_eq!(probe.message_id, "uuid:0a6dc791-2be6-4991-9af1-454778a1917a");
        assert_eq!(probe.types, ["dn:NetworkVideoTransmitter"]);
        assert!(probe.matches_device());
    }

    #[test]
    fn test_reply_relates_to_probe() {
        let reply = probe_reply(PROBE, &identity(), "http://10.0.0.5:8080/onvif/device_service").unwrap();
        assert!(reply.contains("<wsa:RelatesTo>uuid:0a6dc791-2be6-4991-9af1-454778a1917a</wsa:RelatesTo>"));
        assert!(reply.contains("<wsa:Address>urn:uuid:6f1a1c4e-0000-4000-8000-000000000001</wsa:Address>"));
        assert!(reply.contains("<d:XAddrs>http://10.0.0.5:8080/onvif/device_service</d:XAddrs>"));
        assert!(reply.contains("onvif://www.onvif.org/Profile/Streaming"));
    }

    #[test]
    fn test_default_identity_address_is_stable() {
        let xaddr = "http://10.0.0.5:8080/onvif/device_service";
        let first = probe_reply(PROBE, &DeviceIdentity::default(), xaddr).unwrap();
        let second = probe_reply(PROBE, &DeviceIdentity::default(), xaddr).unwrap();
        let address = format!(
            "<wsa:Address>urn:uuid:{}</wsa:Address>",
            DeviceIdentity::default().endpoint_reference()
        );
        assert!(first.contains(&address));
        assert!(second.contains(&address));
    }

    #[test]
    fn test_discovery_mode_is_shared() {
        let mode = DiscoveryMode::new(true);
        let handle = mode.clone();
        handle.set_discoverable(false);
        assert!(!mode.is_discoverable());
    }

    #[test]
    fn test_other_types_and_messages_ignored() {
        let printer = PROBE.replace("dn:NetworkVideoTransmitter", "p:Printer");
        assert!(probe_reply(&printer, &identity(), "x").is_none());

        let empty_types = PROBE.replace("<d:Types>dn:NetworkVideoTransmitter</d:Types>", "");
        assert!(probe_reply(&empty_types, &identity(), "x").is_some());

        let hello = PROBE.replace("d:Probe>", "d:Hello>");
        assert!(parse_probe(&hello).is_none());
        assert!(parse_probe("garbage <<").is_none());
    }
}
