use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::device::{DeviceIdentity, DiscoveryConfig, HttpConfig, NetworkConfig, UpstreamConfig};
use crate::error::ConfigError;
use crate::media::{
    AudioEncoderConfiguration, AudioEncoderOptions, AudioEncoding, AudioSource,
    AudioSourceConfiguration, Bounds, H264Profile, MetadataConfiguration, ProfileConfig,
    RateControl, Resolution, VideoEncoderConfiguration, VideoEncoderOptions, VideoEncoding,
    VideoSource, VideoSourceConfiguration,
};
use crate::paths;
use crate::ptz::{PtzConfiguration, PtzNode, PtzSpeed};

/// Complete description of the emulated camera
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmulatorConfig {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub device: DeviceIdentity,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub video_encoder_options: VideoEncoderOptions,
    #[serde(default)]
    pub audio_encoder_options: AudioEncoderOptions,
    #[serde(default)]
    pub video_sources: Vec<VideoSource>,
    #[serde(default)]
    pub audio_sources: Vec<AudioSource>,
    #[serde(default)]
    pub video_source_configurations: Vec<VideoSourceConfiguration>,
    #[serde(default)]
    pub audio_source_configurations: Vec<AudioSourceConfiguration>,
    #[serde(default)]
    pub video_encoders: Vec<VideoEncoderConfiguration>,
    #[serde(default)]
    pub audio_encoders: Vec<AudioEncoderConfiguration>,
    #[serde(default)]
    pub metadata_configurations: Vec<MetadataConfiguration>,
    #[serde(default)]
    pub ptz_nodes: Vec<PtzNode>,
    #[serde(default)]
    pub ptz_configurations: Vec<PtzConfiguration>,
    #[serde(default)]
    pub profiles: Vec<ProfileConfig>,
}

impl EmulatorConfig {
    /// Check if config exists at default location
    pub fn exists() -> bool {
        paths::emulator_config_path()
            .map(|p| p.exists())
            .unwrap_or(false)
    }

    /// Get default config path
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        paths::emulator_config_path()
    }

    /// Load config from default XDG location
    pub fn load() -> Result<Self, ConfigError> {
        let path = paths::emulator_config_path()?;
        Self::load_from(&path)
    }

    /// Load config from specific path and validate it
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to default XDG location
    pub fn save(&self) -> Result<(), ConfigError> {
        paths::ensure_config_dir()?;
        let path = paths::emulator_config_path()?;
        self.save_to(&path)
    }

    /// Save config to specific path
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Structural consistency: unique tokens, resolvable references,
    /// encoders within options, encoders bound to at most one profile,
    /// fixed profiles complete.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let video_sources = unique_tokens("video source", self.video_sources.iter().map(|s| &s.token))?;
        let audio_sources = unique_tokens("audio source", self.audio_sources.iter().map(|s| &s.token))?;
        let vscs = unique_tokens(
            "video source configuration",
            self.video_source_configurations.iter().map(|c| &c.token),
        )?;
        let ascs = unique_tokens(
            "audio source configuration",
            self.audio_source_configurations.iter().map(|c| &c.token),
        )?;
        let vencs = unique_tokens("video encoder", self.video_encoders.iter().map(|c| &c.token))?;
        let aencs = unique_tokens("audio encoder", self.audio_encoders.iter().map(|c| &c.token))?;
        let metas = unique_tokens(
            "metadata configuration",
            self.metadata_configurations.iter().map(|c| &c.token),
        )?;
        let nodes = unique_tokens("PTZ node", self.ptz_nodes.iter().map(|n| &n.token))?;
        let ptzs = unique_tokens("PTZ configuration", self.ptz_configurations.iter().map(|c| &c.token))?;
        unique_tokens("profile", self.profiles.iter().map(|p| &p.token))?;

        for vsc in &self.video_source_configurations {
            require(&video_sources, &vsc.source_token, &vsc.token, "video source")?;
        }
        for asc in &self.audio_source_configurations {
            require(&audio_sources, &asc.source_token, &asc.token, "audio source")?;
        }
        for ptz in &self.ptz_configurations {
            require(&nodes, &ptz.node_token, &ptz.token, "PTZ node")?;
        }

        for enc in &self.video_encoders {
            self.video_encoder_options
                .check(enc)
                .map_err(|v| ConfigError::Invalid(format!("video encoder '{}': {}", enc.token, v)))?;
        }
        for enc in &self.audio_encoders {
            self.audio_encoder_options
                .check(enc)
                .map_err(|v| ConfigError::Invalid(format!("audio encoder '{}': {}", enc.token, v)))?;
        }

        let mut bound_encoders: HashSet<(&str, &str)> = HashSet::new();
        for profile in &self.profiles {
            let owner = format!("profile '{}'", profile.token);
            let refs = [
                (&profile.video_source, &vscs, "video source configuration"),
                (&profile.audio_source, &ascs, "audio source configuration"),
                (&profile.video_encoder, &vencs, "video encoder"),
                (&profile.audio_encoder, &aencs, "audio encoder"),
                (&profile.ptz, &ptzs, "PTZ configuration"),
                (&profile.metadata, &metas, "metadata configuration"),
            ];
            for (token, known, kind) in refs {
                if let Some(token) = token {
                    require(known, token, &owner, kind)?;
                }
            }

            for (token, kind) in [
                (&profile.video_encoder, "video encoder"),
                (&profile.audio_encoder, "audio encoder"),
            ] {
                if let Some(token) = token {
                    if !bound_encoders.insert((kind, token.as_str())) {
                        return Err(ConfigError::Invalid(format!(
                            "{} '{}' is bound to more than one profile",
                            kind, token
                        )));
                    }
                }
            }

            if profile.fixed && (profile.video_source.is_none() || profile.video_encoder.is_none()) {
                return Err(ConfigError::Invalid(format!(
                    "fixed profile '{}' needs a video source configuration and a video encoder",
                    profile.token
                )));
            }
        }

        Ok(())
    }
}

fn unique_tokens<'a>(
    kind: &'static str,
    tokens: impl Iterator<Item = &'a String>,
) -> Result<HashSet<&'a str>, ConfigError> {
    let mut seen = HashSet::new();
    for token in tokens {
        if token.is_empty() {
            return Err(ConfigError::Invalid(format!("empty {} token", kind)));
        }
        if !seen.insert(token.as_str()) {
            return Err(ConfigError::DuplicateToken {
                kind,
                token: token.clone(),
            });
        }
    }
    Ok(seen)
}

fn require(
    known: &HashSet<&str>,
    token: &str,
    owner: &str,
    kind: &'static str,
) -> Result<(), ConfigError> {
    if known.contains(token) {
        Ok(())
    } else {
        Err(ConfigError::DanglingReference {
            owner: owner.to_string(),
            kind,
            token: token.to_string(),
        })
    }
}

impl Default for EmulatorConfig {
    /// A 1080p H264 camera with audio and a PTZ head, exposing one fixed
    /// `main` profile and a spare 720p encoder for client-created profiles.
    fn default() -> Self {
        Self {
            http: HttpConfig::default(),
            discovery: DiscoveryConfig::default(),
            device: DeviceIdentity::default(),
            network: NetworkConfig::default(),
            upstream: UpstreamConfig::default(),
            video_encoder_options: VideoEncoderOptions::default(),
            audio_encoder_options: AudioEncoderOptions::default(),
            video_sources: vec![VideoSource {
                token: "vidsrc0".to_string(),
                framerate: 30.0,
                resolution: Resolution::new(1920, 1080),
            }],
            audio_sources: vec![AudioSource {
                token: "audsrc0".to_string(),
                channels: 1,
            }],
            video_source_configurations: vec![VideoSourceConfiguration {
                token: "vscfg0".to_string(),
                name: "vscfg0".to_string(),
                source_token: "vidsrc0".to_string(),
                bounds: Bounds {
                    x: 0,
                    y: 0,
                    width: 1920,
                    height: 1080,
                },
            }],
            audio_source_configurations: vec![AudioSourceConfiguration {
                token: "ascfg0".to_string(),
                name: "ascfg0".to_string(),
                source_token: "audsrc0".to_string(),
            }],
            video_encoders: vec![
                VideoEncoderConfiguration {
                    token: "main".to_string(),
                    name: "Main stream encoder".to_string(),
                    encoding: VideoEncoding::H264,
                    resolution: Resolution::new(1920, 1080),
                    quality: 8.0,
                    rate_control: RateControl {
                        frame_rate_limit: 25,
                        encoding_interval: 1,
                        bitrate_limit: 4096,
                    },
                    gov_length: 30,
                    h264_profile: H264Profile::High,
                    session_timeout_secs: 60,
                },
                VideoEncoderConfiguration {
                    token: "sub".to_string(),
                    name: "Sub stream encoder".to_string(),
                    encoding: VideoEncoding::H264,
                    resolution: Resolution::new(1280, 720),
                    quality: 5.0,
                    rate_control: RateControl {
                        frame_rate_limit: 15,
                        encoding_interval: 1,
                        bitrate_limit: 1024,
                    },
                    gov_length: 30,
                    h264_profile: H264Profile::Main,
                    session_timeout_secs: 60,
                },
            ],
            audio_encoders: vec![AudioEncoderConfiguration {
                token: "aenc0".to_string(),
                name: "G711 encoder".to_string(),
                encoding: AudioEncoding::G711,
                bitrate: 64,
                sample_rate: 8,
                session_timeout_secs: 60,
            }],
            metadata_configurations: vec![MetadataConfiguration {
                token: "meta0".to_string(),
                name: "Metadata".to_string(),
                analytics: false,
                session_timeout_secs: 60,
            }],
            ptz_nodes: vec![PtzNode {
                token: "default".to_string(),
                name: "default".to_string(),
                home_supported: true,
                max_presets: 16,
            }],
            ptz_configurations: vec![PtzConfiguration {
                token: "default".to_string(),
                name: "default".to_string(),
                node_token: "default".to_string(),
                default_speed: PtzSpeed {
                    pan: 1.0,
                    tilt: 1.0,
                    zoom: 1.0,
                },
                default_timeout_secs: 10,
            }],
            profiles: vec![ProfileConfig {
                token: "main".to_string(),
                name: "main".to_string(),
                fixed: true,
                video_source: Some("vscfg0".to_string()),
                audio_source: Some("ascfg0".to_string()),
                video_encoder: Some("main".to_string()),
                audio_encoder: Some("aenc0".to_string()),
                ptz: Some("default".to_string()),
                metadata: None,
            }],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_is_valid() {
        EmulatorConfig::default().validate().unwrap();
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("emulator.toml");

        let config = EmulatorConfig::default();
        config.save_to(&path).unwrap();

        let loaded = EmulatorConfig::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        let result = EmulatorConfig::load_from(&dir.path().join("nope.toml"));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_minimal_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("emulator.toml");
        std::fs::write(
            &path,
            r#"
[upstream]
stream_uri = "rtsp://10.10.10.70:8554/test"
snapshot_uri = "http://10.10.10.10:54321/snapshot"
"#,
        )
        .unwrap();

        let loaded = EmulatorConfig::load_from(&path).unwrap();
        assert_eq!(loaded.upstream.stream_uri, "rtsp://10.10.10.70:8554/test");
        assert!(loaded.profiles.is_empty());
        assert_eq!(loaded.http.bind.port(), 8080);
    }

    #[test]
    fn test_partial_tables_keep_field_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("emulator.toml");
        std::fs::write(
            &path,
            "[device]\nname = \"Front Door\"\n\n[http]\nadvertised_host = \"cam.local\"\n\n[network]\nntp = []\n",
        )
        .unwrap();

        let loaded = EmulatorConfig::load_from(&path).unwrap();
        assert_eq!(loaded.device.name, "Front Door");
        assert_eq!(loaded.device.manufacturer, DeviceIdentity::default().manufacturer);
        assert_eq!(loaded.http.bind.port(), 8080);
        assert_eq!(loaded.http.advertised_host.as_deref(), Some("cam.local"));
        assert!(loaded.network.ntp.is_empty());
        assert_eq!(loaded.network.interface, "eth0");
    }

    #[test]
    fn test_device_table_with_only_name() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("emulator.toml");
        std::fs::write(&path, "[device]\nname = \"Front Door\"\n").unwrap();

        let loaded = EmulatorConfig::load_from(&path).unwrap();
        assert_eq!(loaded.device.name, "Front Door");
        assert_eq!(loaded.device.serial_number, "00000000");
        assert_eq!(
            loaded.device.endpoint_reference(),
            DeviceIdentity::default().endpoint_reference()
        );
    }

    #[test]
    fn test_duplicate_token_rejected() {
        let mut config = EmulatorConfig::default();
        let dup = config.video_encoders[0].clone();
        config.video_encoders.push(dup);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DuplicateToken { kind: "video encoder", .. })
        ));
    }

    #[test]
    fn test_dangling_profile_reference_rejected() {
        let mut config = EmulatorConfig::default();
        config.profiles[0].ptz = Some("missing".to_string());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DanglingReference { kind: "PTZ configuration", .. })
        ));
    }

    #[test]
    fn test_encoder_outside_options_rejected() {
        let mut config = EmulatorConfig::default();
        config.video_encoders[0].quality = 150.0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_shared_encoder_rejected() {
        let mut config = EmulatorConfig::default();
        let mut second = config.profiles[0].clone();
        second.token = "second".to_string();
        second.fixed = false;
        second.audio_encoder = None;
        config.profiles.push(second);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_incomplete_fixed_profile_rejected() {
        let mut config = EmulatorConfig::default();
        config.profiles[0].video_encoder = None;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
