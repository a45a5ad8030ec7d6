//! ONVIF Server Library
//!
//! Emulates an ONVIF Profile S camera in front of an existing RTSP source.
//! Device, Media and PTZ requests are routed through a typed method
//! registry onto a shared configuration store; media URIs point at the
//! upstream stream.

mod args;
mod device;
mod discovery;
mod dispatcher;
mod error;
mod media;
mod model;
mod pipeline;
mod ptz;
mod registry;
mod server;
mod soap;
mod store;
mod templates;

use std::net::IpAddr;
use std::sync::Arc;

use config_manager::{EmulatorConfig, HttpConfig};
use tracing::debug;

pub use args::Args;
pub use device::{scopes, DeviceService};
pub use discovery::{
    parse_probe, probe_reply, run_discovery, DiscoveryMode, Probe, MULTICAST_ADDR,
};
pub use dispatcher::Dispatcher;
pub use error::{ConfigurationError, ConflictKind, Fault, FaultCode, OnvifError, SoapError};
pub use media::MediaService;
pub use model::{ConfigKind, Counted, EntityKind, Profile, ProfileBindings, ProfileView};
pub use pipeline::{MediaPipeline, UpstreamPipeline};
pub use ptz::PtzService;
pub use registry::{Handler, Method, OnvifService, Service, ServiceRegistry};
pub use server::{router, run_onvif_server};
pub use soap::{envelope, fault_envelope, parse_request, ReplyContext, SoapRequest, SoapVersion};
pub use store::{ConfigurationStore, SharedStore};

/// Register the Device, Media and PTZ services over one store. The Device
/// service flips `discovery` on SetDiscoveryMode.
pub fn build_dispatcher(
    config: &EmulatorConfig,
    store: SharedStore,
    discovery: DiscoveryMode,
    base_url: &str,
) -> Result<Dispatcher, ConfigurationError> {
    let mut registry = ServiceRegistry::new();

    registry.register_service(Arc::new(DeviceService::new(
        config.device.clone(),
        config.network.clone(),
        discovery,
        base_url,
    )))?;
    registry.register_service(Arc::new(MediaService::new(
        store.clone(),
        Arc::new(UpstreamPipeline::new(config.upstream.clone())),
    )))?;
    registry.register_service(Arc::new(PtzService::new(store)))?;

    debug!("Registered {} ONVIF methods", registry.len());
    Ok(Dispatcher::new(registry))
}

/// Base URL clients should use to reach the server, `http://host:port`
pub fn advertised_base_url(http: &HttpConfig) -> String {
    let port = http.bind.port();
    let host = match &http.advertised_host {
        Some(host) => host.clone(),
        None if !http.bind.ip().is_unspecified() => http.bind.ip().to_string(),
        None => get_local_ip().unwrap_or_else(|| "127.0.0.1".to_string()),
    };
    match host.parse::<IpAddr>() {
        Ok(IpAddr::V6(v6)) => format!("http://[{}]:{}", v6, port),
        _ => format!("http://{}:{}", host, port),
    }
}

/// Get the local IP address (for ONVIF XAddrs)
pub fn get_local_ip() -> Option<String> {
    let socket = std::net::UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    let addr = socket.local_addr().ok()?;
    Some(addr.ip().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;

    #[test]
    fn test_dispatcher_covers_all_services() {
        let config = EmulatorConfig::default();
        let store = SharedStore::new(ConfigurationStore::from_config(&config).unwrap());
        let dispatcher =
            build_dispatcher(&config, store, DiscoveryMode::new(true), "http://127.0.0.1:8080")
                .unwrap();

        let registry = dispatcher.registry();
        assert!(registry.methods(Service::Device).contains(&"getCapabilities"));
        assert!(registry.methods(Service::Media).contains(&"getStreamUri"));
        assert!(registry.methods(Service::Ptz).contains(&"getNodes"));
        assert!(registry.methods(Service::Device).contains(&"getNetworkInterfaces"));
        assert_eq!(registry.methods(Service::Device).len(), 21);
        assert_eq!(registry.methods(Service::Ptz).len(), 8);
    }

    #[test]
    fn test_media_and_ptz_share_store() {
        let config = EmulatorConfig::default();
        let store = SharedStore::new(ConfigurationStore::from_config(&config).unwrap());
        let dispatcher = build_dispatcher(
            &config,
            store.clone(),
            DiscoveryMode::new(true),
            "http://127.0.0.1:8080",
        ).unwrap();

        dispatcher
            .dispatch(
                Service::Media,
                "createProfile",
                &Args::new("CreateProfile")
                    .with_value("Name", "Side")
                    .with_value("Token", "side"),
            )
            .unwrap();
        let err = dispatcher
            .dispatch(
                Service::Ptz,
                "getStatus",
                &Args::new("GetStatus").with_value("ProfileToken", "side"),
            )
            .unwrap_err();
        assert!(matches!(err, OnvifError::Conflict { .. }));
        assert!(store.read(|s| s.profile("side").is_ok()));
    }

    #[test]
    fn test_advertised_base_url() {
        let explicit = HttpConfig {
            bind: SocketAddr::from(([0, 0, 0, 0], 8080)),
            advertised_host: Some("cam.local".to_string()),
        };
        assert_eq!(advertised_base_url(&explicit), "http://cam.local:8080");

        let bound = HttpConfig {
            bind: SocketAddr::from(([192, 168, 1, 20], 9000)),
            advertised_host: None,
        };
        assert_eq!(advertised_base_url(&bound), "http://192.168.1.20:9000");

        let v6 = HttpConfig {
            bind: "[::1]:8080".parse().unwrap(),
            advertised_host: None,
        };
        assert_eq!(advertised_base_url(&v6), "http://[::1]:8080");
    }
}
