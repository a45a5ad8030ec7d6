//! Media entities of the emulated device
//!
//! These are both the on-disk description of the camera and the values the
//! configuration store holds at runtime.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Inclusive integer range as advertised in ONVIF options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntRange {
    pub min: u32,
    pub max: u32,
}

impl IntRange {
    pub const fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: u32) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Inclusive float range as advertised in ONVIF options
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FloatRange {
    pub min: f32,
    pub max: f32,
}

impl FloatRange {
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f32) -> bool {
        value >= self.min && value <= self.max
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VideoEncoding {
    Jpeg,
    Mpeg4,
    H264,
}

impl VideoEncoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoEncoding::Jpeg => "JPEG",
            VideoEncoding::Mpeg4 => "MPEG4",
            VideoEncoding::H264 => "H264",
        }
    }

    /// Whether the encoding is GOV based (carries a GovLength)
    pub fn has_gov(&self) -> bool {
        !matches!(self, VideoEncoding::Jpeg)
    }
}

impl fmt::Display for VideoEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VideoEncoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "JPEG" => Ok(VideoEncoding::Jpeg),
            "MPEG4" => Ok(VideoEncoding::Mpeg4),
            "H264" => Ok(VideoEncoding::H264),
            other => Err(format!("unknown video encoding '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum H264Profile {
    Baseline,
    Main,
    Extended,
    High,
}

impl H264Profile {
    pub fn as_str(&self) -> &'static str {
        match self {
            H264Profile::Baseline => "Baseline",
            H264Profile::Main => "Main",
            H264Profile::Extended => "Extended",
            H264Profile::High => "High",
        }
    }
}

impl fmt::Display for H264Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for H264Profile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Baseline" => Ok(H264Profile::Baseline),
            "Main" => Ok(H264Profile::Main),
            "Extended" => Ok(H264Profile::Extended),
            "High" => Ok(H264Profile::High),
            other => Err(format!("unknown H264 profile '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AudioEncoding {
    G711,
    G726,
    Aac,
}

impl AudioEncoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioEncoding::G711 => "G711",
            AudioEncoding::G726 => "G726",
            AudioEncoding::Aac => "AAC",
        }
    }
}

impl fmt::Display for AudioEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AudioEncoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "G711" => Ok(AudioEncoding::G711),
            "G726" => Ok(AudioEncoding::G726),
            "AAC" => Ok(AudioEncoding::Aac),
            other => Err(format!("unknown audio encoding '{}'", other)),
        }
    }
}

/// Physical video input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoSource {
    pub token: String,
    pub framerate: f32,
    pub resolution: Resolution,
}

/// Physical audio input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioSource {
    pub token: String,
    pub channels: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoSourceConfiguration {
    pub token: String,
    pub name: String,
    pub source_token: String,
    pub bounds: Bounds,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioSourceConfiguration {
    pub token: String,
    pub name: String,
    pub source_token: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateControl {
    pub frame_rate_limit: u32,
    pub encoding_interval: u32,
    /// kbit/s
    pub bitrate_limit: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoEncoderConfiguration {
    pub token: String,
    pub name: String,
    pub encoding: VideoEncoding,
    pub resolution: Resolution,
    pub quality: f32,
    pub rate_control: RateControl,
    pub gov_length: u32,
    pub h264_profile: H264Profile,
    pub session_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioEncoderConfiguration {
    pub token: String,
    pub name: String,
    pub encoding: AudioEncoding,
    /// kbit/s
    pub bitrate: u32,
    /// kHz
    pub sample_rate: u32,
    pub session_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataConfiguration {
    pub token: String,
    pub name: String,
    pub analytics: bool,
    pub session_timeout_secs: u64,
}

/// A configuration value that falls outside the advertised options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionViolation {
    pub field: &'static str,
    pub reason: String,
}

impl fmt::Display for OptionViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

/// Capability ranges for video encoder configurations.
///
/// The same value is advertised by GetVideoEncoderConfigurationOptions and
/// enforced by SetVideoEncoderConfiguration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoEncoderOptions {
    pub quality: FloatRange,
    pub resolutions: Vec<Resolution>,
    pub frame_rate: IntRange,
    pub encoding_interval: IntRange,
    pub gov_length: IntRange,
    pub bitrate: IntRange,
    pub encodings: Vec<VideoEncoding>,
    pub h264_profiles: Vec<H264Profile>,
}

impl VideoEncoderOptions {
    /// Check every field, returning the first one out of range.
    ///
    /// Order: encoding, resolution, quality, frame rate, encoding interval,
    /// bitrate, GOV length, H264 profile.
    pub fn check(&self, config: &VideoEncoderConfiguration) -> Result<(), OptionViolation> {
        if !self.encodings.contains(&config.encoding) {
            return Err(OptionViolation {
                field: "Encoding",
                reason: format!("{} is not supported", config.encoding),
            });
        }
        if !self.resolutions.contains(&config.resolution) {
            return Err(OptionViolation {
                field: "Resolution",
                reason: format!("{} is not an available resolution", config.resolution),
            });
        }
        if !config.quality.is_finite() || !self.quality.contains(config.quality) {
            return Err(OptionViolation {
                field: "Quality",
                reason: format!(
                    "{} outside [{}, {}]",
                    config.quality, self.quality.min, self.quality.max
                ),
            });
        }
        check_int("FrameRateLimit", config.rate_control.frame_rate_limit, self.frame_rate)?;
        check_int(
            "EncodingInterval",
            config.rate_control.encoding_interval,
            self.encoding_interval,
        )?;
        check_int("BitrateLimit", config.rate_control.bitrate_limit, self.bitrate)?;
        if config.encoding.has_gov() {
            check_int("GovLength", config.gov_length, self.gov_length)?;
        }
        if config.encoding == VideoEncoding::H264 && !self.h264_profiles.contains(&config.h264_profile)
        {
            return Err(OptionViolation {
                field: "H264Profile",
                reason: format!("{} is not supported", config.h264_profile),
            });
        }
        Ok(())
    }
}

fn check_int(field: &'static str, value: u32, range: IntRange) -> Result<(), OptionViolation> {
    if range.contains(value) {
        Ok(())
    } else {
        Err(OptionViolation {
            field,
            reason: format!("{} outside [{}, {}]", value, range.min, range.max),
        })
    }
}

impl Default for VideoEncoderOptions {
    fn default() -> Self {
        Self {
            quality: FloatRange::new(1.0, 100.0),
            resolutions: vec![
                Resolution::new(1920, 1080),
                Resolution::new(1280, 720),
                Resolution::new(720, 576),
            ],
            frame_rate: IntRange::new(5, 30),
            encoding_interval: IntRange::new(1, 1),
            gov_length: IntRange::new(1, 60),
            bitrate: IntRange::new(64, 16384),
            encodings: vec![VideoEncoding::Jpeg, VideoEncoding::H264],
            h264_profiles: vec![H264Profile::Main, H264Profile::High],
        }
    }
}

/// Capability lists for audio encoder configurations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioEncoderOptions {
    pub encodings: Vec<AudioEncoding>,
    /// kbit/s
    pub bitrates: Vec<u32>,
    /// kHz
    pub sample_rates: Vec<u32>,
}

impl AudioEncoderOptions {
    /// Check every field, returning the first one outside the lists.
    pub fn check(&self, config: &AudioEncoderConfiguration) -> Result<(), OptionViolation> {
        if !self.encodings.contains(&config.encoding) {
            return Err(OptionViolation {
                field: "Encoding",
                reason: format!("{} is not supported", config.encoding),
            });
        }
        if !self.bitrates.contains(&config.bitrate) {
            return Err(OptionViolation {
                field: "Bitrate",
                reason: format!("{} not in {:?}", config.bitrate, self.bitrates),
            });
        }
        if !self.sample_rates.contains(&config.sample_rate) {
            return Err(OptionViolation {
                field: "SampleRate",
                reason: format!("{} not in {:?}", config.sample_rate, self.sample_rates),
            });
        }
        Ok(())
    }
}

impl Default for AudioEncoderOptions {
    fn default() -> Self {
        Self {
            encodings: vec![AudioEncoding::G711, AudioEncoding::Aac],
            bitrates: vec![64, 128],
            sample_rates: vec![8, 16, 44],
        }
    }
}

/// A media profile as seeded from the config file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileConfig {
    pub token: String,
    pub name: String,
    #[serde(default)]
    pub fixed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_encoder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_encoder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ptz: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h264_1080p() -> VideoEncoderConfiguration {
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
        }
    }

    #[test]
    fn test_default_options_accept_default_encoder() {
        assert!(VideoEncoderOptions::default().check(&h264_1080p()).is_ok());
    }

    #[test]
    fn test_quality_out_of_range() {
        let mut config = h264_1080p();
        config.quality = 150.0;
        let err = VideoEncoderOptions::default().check(&config).unwrap_err();
        assert_eq!(err.field, "Quality");
    }

    #[test]
    fn test_nan_quality_rejected() {
        let mut config = h264_1080p();
        config.quality = f32::NAN;
        let err = VideoEncoderOptions::default().check(&config).unwrap_err();
        assert_eq!(err.field, "Quality");
    }

    #[test]
    fn test_first_violation_wins() {
        let mut config = h264_1080p();
        config.resolution = Resolution::new(640, 480);
        config.quality = 0.0;
        config.gov_length = 500;
        let err = VideoEncoderOptions::default().check(&config).unwrap_err();
        assert_eq!(err.field, "Resolution");
    }

    #[test]
    fn test_gov_ignored_for_jpeg() {
        let mut config = h264_1080p();
        config.encoding = VideoEncoding::Jpeg;
        config.gov_length = 0;
        assert!(VideoEncoderOptions::default().check(&config).is_ok());
    }

    #[test]
    fn test_unsupported_h264_profile() {
        let mut config = h264_1080p();
        config.h264_profile = H264Profile::Baseline;
        let err = VideoEncoderOptions::default().check(&config).unwrap_err();
        assert_eq!(err.field, "H264Profile");
    }

    #[test]
    fn test_audio_sample_rate_not_listed() {
        let config = AudioEncoderConfiguration {
            token: "aenc0".to_string(),
            name: "G711".to_string(),
            encoding: AudioEncoding::G711,
            bitrate: 64,
            sample_rate: 48,
            session_timeout_secs: 60,
        };
        let err = AudioEncoderOptions::default().check(&config).unwrap_err();
        assert_eq!(err.field, "SampleRate");
    }

    #[test]
    fn test_encoding_names() {
        assert_eq!("MPEG4".parse::<VideoEncoding>(), Ok(VideoEncoding::Mpeg4));
        assert_eq!(VideoEncoding::H264.to_string(), "H264");
        assert_eq!("AAC".parse::<AudioEncoding>(), Ok(AudioEncoding::Aac));
        assert!("h265".parse::<VideoEncoding>().is_err());
    }
}
