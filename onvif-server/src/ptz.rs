//! PTZ service (tptz)
//!
//! Read-only view of the static PTZ nodes and configurations. The head
//! never moves, so no presets exist. Movement and preset requests are not
//! registered and fall through to ActionNotSupported.

use chrono::Utc;

use crate::args::Args;
use crate::error::{ConflictKind, OnvifError};
use crate::model::{ConfigKind, EntityKind};
use crate::registry::{Method, OnvifService, Service};
use crate::store::SharedStore;
use crate::templates;

const PREFIX: &str = "tptz";
const MAX_TIMEOUT_SECS: u64 = 60;

pub struct PtzService {
    store: SharedStore,
}

fn respond(element: &str, inner: &str) -> Result<String, OnvifError> {
    Ok(templates::response(PREFIX, element, inner))
}

impl PtzService {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    fn get_nodes(&self, _args: &Args) -> Result<String, OnvifError> {
        let nodes: Vec<_> = self.store.read(|s| s.ptz_nodes().cloned().collect());
        let body: String = nodes.iter().map(templates::ptz_node).collect();
        respond("GetNodes", &body)
    }

    fn get_node(&self, args: &Args) -> Result<String, OnvifError> {
        let token = args.required("NodeToken")?;
        let node = self.store.read(|s| s.ptz_node(token).cloned())?;
        respond("GetNode", &templates::ptz_node(&node))
    }

    fn get_configurations(&self, _args: &Args) -> Result<String, OnvifError> {
        let configs = self.store.read(|s| s.ptz_configurations());
        let body: String = configs
            .iter()
            .map(|c| templates::ptz_configuration("tptz:PTZConfiguration", c))
            .collect();
        respond("GetConfigurations", &body)
    }

    fn get_configuration(&self, args: &Args) -> Result<String, OnvifError> {
        let token = args.required("PTZConfigurationToken")?;
        let config = self.store.read(|s| s.ptz_configuration(token))?;
        respond(
            "GetConfiguration",
            &templates::ptz_configuration("tptz:PTZConfiguration", &config),
        )
    }

    fn get_configuration_options(&self, args: &Args) -> Result<String, OnvifError> {
        let token = args.required("ConfigurationToken")?;
        let max_timeout = self.store.read(|s| {
            let config = s.ptz_configuration(token)?;
            s.ptz_node(&config.config.node_token)?;
            Ok::<_, OnvifError>(config.config.default_timeout_secs.max(MAX_TIMEOUT_SECS))
        })?;
        respond(
            "GetConfigurationOptions",
            &templates::ptz_configuration_options(max_timeout),
        )
    }

    /// The profile must exist and carry a PTZ configuration
    fn require_ptz(&self, profile_token: &str) -> Result<(), OnvifError> {
        self.store.read(|s| {
            let profile = s.profile(profile_token)?;
            match profile.bindings.get(ConfigKind::Ptz) {
                Some(_) => Ok(()),
                None => Err(OnvifError::conflict(
                    ConflictKind::IncompleteConfiguration,
                    format!("profile '{}' has no {}", profile_token, EntityKind::PtzConfiguration),
                )),
            }
        })
    }

    fn get_status(&self, args: &Args) -> Result<String, OnvifError> {
        self.require_ptz(args.required("ProfileToken")?)?;
        respond("GetStatus", &templates::ptz_status(Utc::now()))
    }

    fn get_presets(&self, args: &Args) -> Result<String, OnvifError> {
        self.require_ptz(args.required("ProfileToken")?)?;
        respond("GetPresets", "")
    }

    fn get_service_capabilities(&self, _args: &Args) -> Result<String, OnvifError> {
        respond("GetServiceCapabilities", templates::ptz_service_capabilities())
    }
}

impl OnvifService for PtzService {
    const SERVICE: Service = Service::Ptz;

    fn methods() -> Vec<(&'static str, Method<Self>)> {
        vec![
            ("getNodes", Self::get_nodes),
            ("getNode", Self::get_node),
            ("getConfigurations", Self::get_configurations),
            ("getConfiguration", Self::get_configuration),
            ("getConfigurationOptions", Self::get_configuration_options),
            ("getStatus", Self::get_status),
            ("getPresets", Self::get_presets),
            ("getServiceCapabilities", Self::get_service_capabilities),
        ]
    }
}
