//! Device service (tds)
//!
//! Reports the static device identity, network settings and where the
//! other services live. Nothing here touches the configuration store; the
//! discovery mode is the only runtime state.

use std::net::Ipv4Addr;

use chrono::Utc;
use config_manager::{percent_encode, DeviceIdentity, NetworkConfig};
use tracing::info;

use crate::args::Args;
use crate::discovery::DiscoveryMode;
use crate::error::OnvifError;
use crate::registry::{Method, OnvifService, Service};
use crate::templates;

const PREFIX: &str = "tds";

pub struct DeviceService {
    identity: DeviceIdentity,
    network: NetworkConfig,
    discovery: DiscoveryMode,
    /// `http://host:port`, no trailing slash
    base_url: String,
}

fn respond(element: &str, inner: &str) -> Result<String, OnvifError> {
    Ok(templates::response(PREFIX, element, inner))
}

/// ONVIF scope URIs advertised for the device. Scope items are URIs, so
/// values are percent-encoded.
pub fn scopes(identity: &DeviceIdentity) -> Vec<String> {
    vec![
        "onvif://www.onvif.org/type/video_encoder".to_string(),
        "onvif://www.onvif.org/type/ptz".to_string(),
        "onvif://www.onvif.org/Profile/Streaming".to_string(),
        format!("onvif://www.onvif.org/name/{}", percent_encode(&identity.name)),
        format!("onvif://www.onvif.org/location/{}", percent_encode(&identity.location)),
        format!("onvif://www.onvif.org/hardware/{}", percent_encode(&identity.model)),
    ]
}

/// Host and port of a `scheme://host[:port]` base URL
fn host_and_port(base_url: &str) -> (&str, u16) {
    let authority = base_url.split_once("://").map_or(base_url, |(_, rest)| rest);
    let (host, port) = match authority.rsplit_once(':') {
        Some((host, port)) if !port.contains(']') => (host, port.parse().unwrap_or(80)),
        _ => (authority, 80),
    };
    (host.trim_start_matches('[').trim_end_matches(']'), port)
}

impl DeviceService {
    pub fn new(
        identity: DeviceIdentity,
        network: NetworkConfig,
        discovery: DiscoveryMode,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            identity,
            network,
            discovery,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn xaddr(&self, service: Service) -> String {
        format!("{}/onvif/{}", self.base_url, service.endpoint())
    }

    fn get_device_information(&self, _args: &Args) -> Result<String, OnvifError> {
        respond(
            "GetDeviceInformation",
            &templates::device_information(&self.identity),
        )
    }

    fn get_system_date_and_time(&self, _args: &Args) -> Result<String, OnvifError> {
        respond(
            "GetSystemDateAndTime",
            &templates::system_date_and_time(Utc::now()),
        )
    }

    fn get_scopes(&self, _args: &Args) -> Result<String, OnvifError> {
        respond("GetScopes", &templates::scopes(&scopes(&self.identity)))
    }

    fn get_capabilities(&self, args: &Args) -> Result<String, OnvifError> {
        let mut wanted: Vec<Service> = Vec::new();
        for category in args.children().filter(|c| c.name() == "Category") {
            match category.text() {
                "All" | "" => wanted.extend(Service::ALL),
                "Device" => wanted.push(Service::Device),
                "Media" => wanted.push(Service::Media),
                "PTZ" => wanted.push(Service::Ptz),
                other => {
                    return Err(OnvifError::invalid_arg(
                        "Category",
                        format!("capability category '{}' is not supported", other),
                    ))
                }
            }
        }
        if wanted.is_empty() {
            wanted.extend(Service::ALL);
        }

        let xaddr = |service: Service| wanted.contains(&service).then(|| self.xaddr(service));
        let device = xaddr(Service::Device);
        let media = xaddr(Service::Media);
        let ptz = xaddr(Service::Ptz);
        respond(
            "GetCapabilities",
            &templates::capabilities(device.as_deref(), media.as_deref(), ptz.as_deref()),
        )
    }

    fn get_services(&self, args: &Args) -> Result<String, OnvifError> {
        let include = args.parse::<bool>("IncludeCapability")?.unwrap_or(false);
        let body: String = Service::ALL
            .into_iter()
            .map(|service| {
                let caps = include.then(|| match service {
                    Service::Device => templates::device_service_capabilities(self.discovery.is_discoverable()),
                    Service::Media => templates::media_service_capabilities().to_string(),
                    Service::Ptz => templates::ptz_service_capabilities().to_string(),
                });
                templates::service_entry(service.namespace(), &self.xaddr(service), caps.as_deref())
            })
            .collect();
        respond("GetServices", &body)
    }

    fn get_service_capabilities(&self, _args: &Args) -> Result<String, OnvifError> {
        respond(
            "GetServiceCapabilities",
            &templates::device_service_capabilities(self.discovery.is_discoverable()),
        )
    }

    fn get_hostname(&self, _args: &Args) -> Result<String, OnvifError> {
        respond("GetHostname", &templates::hostname(&self.identity.hostname))
    }

    fn get_discovery_mode(&self, _args: &Args) -> Result<String, OnvifError> {
        respond(
            "GetDiscoveryMode",
            &templates::discovery_mode(self.discovery.is_discoverable()),
        )
    }

    fn set_discovery_mode(&self, args: &Args) -> Result<String, OnvifError> {
        let discoverable = match args.required("DiscoveryMode")? {
            "Discoverable" => true,
            "NonDiscoverable" => false,
            other => {
                return Err(OnvifError::invalid_arg(
                    "DiscoveryMode",
                    format!("unknown discovery mode '{}'", other),
                ))
            }
        };
        self.discovery.set_discoverable(discoverable);
        info!(discoverable, "Discovery mode changed");
        respond("SetDiscoveryMode", "")
    }

    fn get_network_interfaces(&self, _args: &Args) -> Result<String, OnvifError> {
        let (host, _) = host_and_port(&self.base_url);
        respond(
            "GetNetworkInterfaces",
            &templates::network_interface(&self.network, host.parse::<Ipv4Addr>().ok()),
        )
    }

    fn get_dns(&self, _args: &Args) -> Result<String, OnvifError> {
        respond("GetDNS", &templates::dns(&self.network))
    }

    fn get_ntp(&self, _args: &Args) -> Result<String, OnvifError> {
        respond("GetNTP", &templates::ntp(&self.network))
    }

    fn get_network_default_gateway(&self, _args: &Args) -> Result<String, OnvifError> {
        respond(
            "GetNetworkDefaultGateway",
            &templates::network_gateway(self.network.gateway),
        )
    }

    fn get_network_protocols(&self, _args: &Args) -> Result<String, OnvifError> {
        let (_, port) = host_and_port(&self.base_url);
        respond("GetNetworkProtocols", &templates::network_protocols(port))
    }

    fn get_zero_configuration(&self, _args: &Args) -> Result<String, OnvifError> {
        respond(
            "GetZeroConfiguration",
            &templates::zero_configuration(&self.network.interface),
        )
    }

    /// No accounts exist
    fn get_users(&self, _args: &Args) -> Result<String, OnvifError> {
        respond("GetUsers", "")
    }

    fn get_relay_outputs(&self, _args: &Args) -> Result<String, OnvifError> {
        respond("GetRelayOutputs", "")
    }

    /// TLS is not offered, so there are no certificates
    fn get_certificates(&self, _args: &Args) -> Result<String, OnvifError> {
        respond("GetCertificates", "")
    }

    fn get_certificates_status(&self, _args: &Args) -> Result<String, OnvifError> {
        respond("GetCertificatesStatus", "")
    }

    fn set_system_factory_default(&self, args: &Args) -> Result<String, OnvifError> {
        let kind = args.value("FactoryDefault").unwrap_or("Soft");
        info!(kind, "SetSystemFactoryDefault requested; configuration is left as loaded");
        respond(
            "SetSystemFactoryDefault",
            "<tds:RebootNeeded>true</tds:RebootNeeded>",
        )
    }

    fn system_reboot(&self, _args: &Args) -> Result<String, OnvifError> {
        info!("SystemReboot requested; emulator keeps running");
        respond("SystemReboot", "<tds:Message>Rebooting</tds:Message>")
    }
}

impl OnvifService for DeviceService {
    const SERVICE: Service = Service::Device;

    fn methods() -> Vec<(&'static str, Method<Self>)> {
        vec![
            ("getDeviceInformation", Self::get_device_information),
            ("getSystemDateAndTime", Self::get_system_date_and_time),
            ("getScopes", Self::get_scopes),
            ("getCapabilities", Self::get_capabilities),
            ("getServices", Self::get_services),
            ("getServiceCapabilities", Self::get_service_capabilities),
            ("getHostname", Self::get_hostname),
            ("getDiscoveryMode", Self::get_discovery_mode),
            ("setDiscoveryMode", Self::set_discovery_mode),
            ("getNetworkInterfaces", Self::get_network_interfaces),
            ("getDNS", Self::get_dns),
            ("getNTP", Self::get_ntp),
            ("getNetworkDefaultGateway", Self::get_network_default_gateway),
            ("getNetworkProtocols", Self::get_network_protocols),
            ("getZeroConfiguration", Self::get_zero_configuration),
            ("getUsers", Self::get_users),
            ("getRelayOutputs", Self::get_relay_outputs),
            ("getCertificates", Self::get_certificates),
            ("getCertificatesStatus", Self::get_certificates_status),
            ("setSystemFactoryDefault", Self::set_system_factory_default),
            ("systemReboot", Self::system_reboot),
        ]
    }
}
