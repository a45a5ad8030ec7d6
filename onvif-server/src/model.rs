//! Runtime model of the configuration graph

use std::fmt;

pub use config_manager::{
    AudioEncoderConfiguration, AudioEncoderOptions, AudioEncoding, AudioSource,
    AudioSourceConfiguration, Bounds, H264Profile, MetadataConfiguration, PtzConfiguration,
    PtzNode, PtzSpeed, RateControl, Resolution, VideoEncoderConfiguration, VideoEncoderOptions,
    VideoEncoding, VideoSource, VideoSourceConfiguration,
};

/// Every kind of object the store hands out a token for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Profile,
    VideoSource,
    AudioSource,
    VideoSourceConfiguration,
    AudioSourceConfiguration,
    VideoEncoderConfiguration,
    AudioEncoderConfiguration,
    MetadataConfiguration,
    PtzConfiguration,
    PtzNode,
}

impl EntityKind {
    /// Second-level fault subcode for an unknown token of this kind
    pub fn fault_detail(&self) -> &'static str {
        match self {
            EntityKind::Profile => "ter:NoProfile",
            EntityKind::VideoSource | EntityKind::AudioSource => "ter:NoSource",
            EntityKind::PtzNode => "ter:NoEntity",
            _ => "ter:NoConfig",
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Profile => "Profile",
            EntityKind::VideoSource => "VideoSource",
            EntityKind::AudioSource => "AudioSource",
            EntityKind::VideoSourceConfiguration => "VideoSourceConfiguration",
            EntityKind::AudioSourceConfiguration => "AudioSourceConfiguration",
            EntityKind::VideoEncoderConfiguration => "VideoEncoderConfiguration",
            EntityKind::AudioEncoderConfiguration => "AudioEncoderConfiguration",
            EntityKind::MetadataConfiguration => "MetadataConfiguration",
            EntityKind::PtzConfiguration => "PTZConfiguration",
            EntityKind::PtzNode => "PTZNode",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration slots of a media profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKind {
    VideoSource,
    AudioSource,
    VideoEncoder,
    AudioEncoder,
    Ptz,
    Metadata,
}

impl ConfigKind {
    pub const ALL: [ConfigKind; 6] = [
        ConfigKind::VideoSource,
        ConfigKind::AudioSource,
        ConfigKind::VideoEncoder,
        ConfigKind::AudioEncoder,
        ConfigKind::Ptz,
        ConfigKind::Metadata,
    ];

    pub fn entity(&self) -> EntityKind {
        match self {
            ConfigKind::VideoSource => EntityKind::VideoSourceConfiguration,
            ConfigKind::AudioSource => EntityKind::AudioSourceConfiguration,
            ConfigKind::VideoEncoder => EntityKind::VideoEncoderConfiguration,
            ConfigKind::AudioEncoder => EntityKind::AudioEncoderConfiguration,
            ConfigKind::Ptz => EntityKind::PtzConfiguration,
            ConfigKind::Metadata => EntityKind::MetadataConfiguration,
        }
    }

    /// Slots a fixed profile must always have bound
    pub fn is_mandatory(&self) -> bool {
        matches!(self, ConfigKind::VideoSource | ConfigKind::VideoEncoder)
    }

    /// Encoder configurations belong to at most one profile at a time
    pub fn is_exclusive(&self) -> bool {
        matches!(self, ConfigKind::VideoEncoder | ConfigKind::AudioEncoder)
    }
}

impl fmt::Display for ConfigKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.entity(), f)
    }
}

/// Token references held by a profile, one per slot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileBindings {
    video_source: Option<String>,
    audio_source: Option<String>,
    video_encoder: Option<String>,
    audio_encoder: Option<String>,
    ptz: Option<String>,
    metadata: Option<String>,
}

impl ProfileBindings {
    pub fn get(&self, kind: ConfigKind) -> Option<&str> {
        self.slot(kind).as_deref()
    }

    pub(crate) fn set(&mut self, kind: ConfigKind, token: Option<String>) {
        *self.slot_mut(kind) = token;
    }

    fn slot(&self, kind: ConfigKind) -> &Option<String> {
        match kind {
            ConfigKind::VideoSource => &self.video_source,
            ConfigKind::AudioSource => &self.audio_source,
            ConfigKind::VideoEncoder => &self.video_encoder,
            ConfigKind::AudioEncoder => &self.audio_encoder,
            ConfigKind::Ptz => &self.ptz,
            ConfigKind::Metadata => &self.metadata,
        }
    }

    fn slot_mut(&mut self, kind: ConfigKind) -> &mut Option<String> {
        match kind {
            ConfigKind::VideoSource => &mut self.video_source,
            ConfigKind::AudioSource => &mut self.audio_source,
            ConfigKind::VideoEncoder => &mut self.video_encoder,
            ConfigKind::AudioEncoder => &mut self.audio_encoder,
            ConfigKind::Ptz => &mut self.ptz,
            ConfigKind::Metadata => &mut self.metadata,
        }
    }
}

/// A media profile. Configurations are held by token, never by value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub token: String,
    pub name: String,
    pub fixed: bool,
    pub bindings: ProfileBindings,
}

impl Profile {
    pub fn references(&self, kind: ConfigKind, token: &str) -> bool {
        self.bindings.get(kind) == Some(token)
    }
}

/// A configuration snapshot together with its derived use count
#[derive(Debug, Clone, PartialEq)]
pub struct Counted<T> {
    pub config: T,
    pub use_count: usize,
}

/// A profile with every bound configuration resolved, cloned out of the store
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileView {
    pub token: String,
    pub name: String,
    pub fixed: bool,
    pub video_source: Option<Counted<VideoSourceConfiguration>>,
    pub audio_source: Option<Counted<AudioSourceConfiguration>>,
    pub video_encoder: Option<Counted<VideoEncoderConfiguration>>,
    pub audio_encoder: Option<Counted<AudioEncoderConfiguration>>,
    pub ptz: Option<Counted<PtzConfiguration>>,
    pub metadata: Option<Counted<MetadataConfiguration>>,
}

/// Partial update for SetVideoEncoderConfiguration. Unset fields keep their value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoEncoderUpdate {
    pub name: Option<String>,
    pub encoding: Option<VideoEncoding>,
    pub resolution: Option<Resolution>,
    pub quality: Option<f32>,
    pub frame_rate_limit: Option<u32>,
    pub encoding_interval: Option<u32>,
    pub bitrate_limit: Option<u32>,
    pub gov_length: Option<u32>,
    pub h264_profile: Option<H264Profile>,
    pub session_timeout_secs: Option<u64>,
}

impl VideoEncoderUpdate {
    pub fn apply_to(&self, config: &mut VideoEncoderConfiguration) {
        if let Some(name) = &self.name {
            config.name = name.clone();
        }
        if let Some(encoding) = self.encoding {
            config.encoding = encoding;
        }
        if let Some(resolution) = self.resolution {
            config.resolution = resolution;
        }
        if let Some(quality) = self.quality {
            config.quality = quality;
        }
        if let Some(v) = self.frame_rate_limit {
            config.rate_control.frame_rate_limit = v;
        }
        if let Some(v) = self.encoding_interval {
            config.rate_control.encoding_interval = v;
        }
        if let Some(v) = self.bitrate_limit {
            config.rate_control.bitrate_limit = v;
        }
        if let Some(v) = self.gov_length {
            config.gov_length = v;
        }
        if let Some(profile) = self.h264_profile {
            config.h264_profile = profile;
        }
        if let Some(v) = self.session_timeout_secs {
            config.session_timeout_secs = v;
        }
    }
}

/// Partial update for SetAudioEncoderConfiguration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AudioEncoderUpdate {
    pub name: Option<String>,
    pub encoding: Option<AudioEncoding>,
    pub bitrate: Option<u32>,
    pub sample_rate: Option<u32>,
    pub session_timeout_secs: Option<u64>,
}

impl AudioEncoderUpdate {
    pub fn apply_to(&self, config: &mut AudioEncoderConfiguration) {
        if let Some(name) = &self.name {
            config.name = name.clone();
        }
        if let Some(encoding) = self.encoding {
            config.encoding = encoding;
        }
        if let Some(v) = self.bitrate {
            config.bitrate = v;
        }
        if let Some(v) = self.sample_rate {
            config.sample_rate = v;
        }
        if let Some(v) = self.session_timeout_secs {
            config.session_timeout_secs = v;
        }
    }
}

pub trait Tokened {
    fn token(&self) -> &str;
}

macro_rules! impl_tokened {
    ($($ty:ty),* $(,)?) => {
        $(impl Tokened for $ty {
            fn token(&self) -> &str {
                &self.token
            }
        })*
    };
}

impl_tokened!(
    Profile,
    VideoSource,
    AudioSource,
    VideoSourceConfiguration,
    AudioSourceConfiguration,
    VideoEncoderConfiguration,
    AudioEncoderConfiguration,
    MetadataConfiguration,
    PtzConfiguration,
    PtzNode,
);

/// Insertion-ordered rows keyed by token
#[derive(Debug, Clone)]
pub struct Table<T> {
    rows: Vec<T>,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self { rows: Vec::new() }
    }
}

impl<T: Tokened> Table<T> {
    pub fn get(&self, token: &str) -> Option<&T> {
        self.rows.iter().find(|r| r.token() == token)
    }

    pub fn get_mut(&mut self, token: &str) -> Option<&mut T> {
        self.rows.iter_mut().find(|r| r.token() == token)
    }

    pub fn contains(&self, token: &str) -> bool {
        self.get(token).is_some()
    }

    /// Caller guarantees the token is not already present
    pub fn push(&mut self, row: T) {
        self.rows.push(row);
    }

    pub fn remove(&mut self, token: &str) -> Option<T> {
        let idx = self.rows.iter().position(|r| r.token() == token)?;
        Some(self.rows.remove(idx))
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.rows.iter()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
