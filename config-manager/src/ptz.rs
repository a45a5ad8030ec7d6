use serde::{Deserialize, Serialize};

/// A PTZ node. Static for the lifetime of the process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PtzNode {
    pub token: String,
    pub name: String,
    pub home_supported: bool,
    pub max_presets: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PtzSpeed {
    pub pan: f32,
    pub tilt: f32,
    pub zoom: f32,
}

/// Default speed and space settings referencing a PTZ node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PtzConfiguration {
    pub token: String,
    pub name: String,
    pub node_token: String,
    pub default_speed: PtzSpeed,
    pub default_timeout_secs: u64,
}
