//! Configuration for the ONVIF camera emulator
//!
//! Describes the emulated device: identity, upstream media URIs, physical
//! sources, encoder capabilities, PTZ heads and the media profiles seeded
//! at startup. Stored as TOML under the XDG config directory.

mod config;
mod device;
mod error;
mod media;
mod paths;
mod ptz;

pub use config::EmulatorConfig;
pub use device::{
    percent_encode, DeviceIdentity, DiscoveryConfig, HttpConfig, NetworkConfig, UpstreamConfig,
    PROFILE_PLACEHOLDER,
};
pub use error::ConfigError;
pub use media::{
    AudioEncoderConfiguration, AudioEncoderOptions, AudioEncoding, AudioSource,
    AudioSourceConfiguration, Bounds, FloatRange, H264Profile, IntRange, MetadataConfiguration,
    OptionViolation, ProfileConfig, RateControl, Resolution, VideoEncoderConfiguration,
    VideoEncoderOptions, VideoEncoding, VideoSource, VideoSourceConfiguration,
};
pub use paths::{config_dir, emulator_config_path, ensure_config_dir};
pub use ptz::{PtzConfiguration, PtzNode, PtzSpeed};
