//! Media service (trt)
//!
//! Thin translators between parsed request arguments and store calls.
//! Snapshots are cloned out under the store lock and rendered after it is
//! released.

use std::sync::Arc;

use crate::args::Args;
use crate::error::{ConflictKind, OnvifError};
use crate::model::{
    AudioEncoderConfiguration, AudioEncoderUpdate, ConfigKind, RateControl, Resolution,
    VideoEncoderConfiguration, VideoEncoderOptions, VideoEncoderUpdate,
};
use crate::pipeline::MediaPipeline;
use crate::registry::{Method, OnvifService, Service};
use crate::store::SharedStore;
use crate::templates;

const PREFIX: &str = "trt";
const DEFAULT_SESSION_TIMEOUT_SECS: u64 = 60;

pub struct MediaService {
    store: SharedStore,
    pipeline: Arc<dyn MediaPipeline>,
}

fn respond(element: &str, inner: &str) -> Result<String, OnvifError> {
    Ok(templates::response(PREFIX, element, inner))
}

/// Generates the Add/Remove handler pair for one profile slot
macro_rules! binding_handlers {
    ($($add:ident, $remove:ident => $kind:expr, $add_el:literal, $remove_el:literal;)*) => {
        $(
            fn $add(&self, args: &Args) -> Result<String, OnvifError> {
                self.add_configuration($kind, args)?;
                respond($add_el, "")
            }

            fn $remove(&self, args: &Args) -> Result<String, OnvifError> {
                self.remove_configuration($kind, args)?;
                respond($remove_el, "")
            }
        )*
    };
}

impl MediaService {
    pub fn new(store: SharedStore, pipeline: Arc<dyn MediaPipeline>) -> Self {
        Self { store, pipeline }
    }

    // ----- profiles -----

    fn get_profiles(&self, _args: &Args) -> Result<String, OnvifError> {
        let views = self.store.read(|s| s.profile_views());
        let body: String = views
            .iter()
            .map(|v| templates::profile("trt:Profiles", v))
            .collect();
        respond("GetProfiles", &body)
    }

    fn get_profile(&self, args: &Args) -> Result<String, OnvifError> {
        let token = args.required("ProfileToken")?;
        let view = self.store.read(|s| s.profile_view(token))?;
        respond("GetProfile", &templates::profile("trt:Profile", &view))
    }

    fn create_profile(&self, args: &Args) -> Result<String, OnvifError> {
        let name = args.required("Name")?;
        let token = args.value("Token").filter(|t| !t.is_empty());
        let view = self.store.write(|s| {
            let profile = s.create_profile(name, token)?;
            s.profile_view(&profile.token)
        })?;
        respond("CreateProfile", &templates::profile("trt:Profile", &view))
    }

    fn delete_profile(&self, args: &Args) -> Result<String, OnvifError> {
        let token = args.required("ProfileToken")?;
        self.store.write(|s| s.delete_profile(token))?;
        respond("DeleteProfile", "")
    }

    fn add_configuration(&self, kind: ConfigKind, args: &Args) -> Result<(), OnvifError> {
        let profile = args.required("ProfileToken")?;
        let config = args.required("ConfigurationToken")?;
        self.store
            .write(|s| s.add_configuration_to_profile(profile, kind, config))
    }

    fn remove_configuration(&self, kind: ConfigKind, args: &Args) -> Result<(), OnvifError> {
        let profile = args.required("ProfileToken")?;
        self.store
            .write(|s| s.remove_configuration_from_profile(profile, kind))
    }

    binding_handlers! {
        add_video_source_configuration, remove_video_source_configuration =>
            ConfigKind::VideoSource, "AddVideoSourceConfiguration", "RemoveVideoSourceConfiguration";
        add_audio_source_configuration, remove_audio_source_configuration =>
            ConfigKind::AudioSource, "AddAudioSourceConfiguration", "RemoveAudioSourceConfiguration";
        add_video_encoder_configuration, remove_video_encoder_configuration =>
            ConfigKind::VideoEncoder, "AddVideoEncoderConfiguration", "RemoveVideoEncoderConfiguration";
        add_audio_encoder_configuration, remove_audio_encoder_configuration =>
            ConfigKind::AudioEncoder, "AddAudioEncoderConfiguration", "RemoveAudioEncoderConfiguration";
        add_ptz_configuration, remove_ptz_configuration =>
            ConfigKind::Ptz, "AddPTZConfiguration", "RemovePTZConfiguration";
        add_metadata_configuration, remove_metadata_configuration =>
            ConfigKind::Metadata, "AddMetadataConfiguration", "RemoveMetadataConfiguration";
    }

    // ----- sources -----

    fn get_video_sources(&self, _args: &Args) -> Result<String, OnvifError> {
        let sources: Vec<_> = self.store.read(|s| s.video_sources().cloned().collect());
        let body: String = sources.iter().map(templates::video_source).collect();
        respond("GetVideoSources", &body)
    }

    fn get_audio_sources(&self, _args: &Args) -> Result<String, OnvifError> {
        let sources: Vec<_> = self.store.read(|s| s.audio_sources().cloned().collect());
        let body: String = sources.iter().map(templates::audio_source).collect();
        respond("GetAudioSources", &body)
    }

    // ----- configurations -----

    fn get_video_source_configurations(&self, _args: &Args) -> Result<String, OnvifError> {
        let configs = self.store.read(|s| s.video_source_configurations());
        let body: String = configs
            .iter()
            .map(|c| templates::video_source_configuration("trt:Configurations", c))
            .collect();
        respond("GetVideoSourceConfigurations", &body)
    }

    fn get_video_source_configuration(&self, args: &Args) -> Result<String, OnvifError> {
        let token = args.required("ConfigurationToken")?;
        let config = self.store.read(|s| s.video_source_configuration(token))?;
        respond(
            "GetVideoSourceConfiguration",
            &templates::video_source_configuration("trt:Configuration", &config),
        )
    }

    fn get_audio_source_configurations(&self, _args: &Args) -> Result<String, OnvifError> {
        let configs = self.store.read(|s| s.audio_source_configurations());
        let body: String = configs
            .iter()
            .map(|c| templates::audio_source_configuration("trt:Configurations", c))
            .collect();
        respond("GetAudioSourceConfigurations", &body)
    }

    fn get_audio_source_configuration(&self, args: &Args) -> Result<String, OnvifError> {
        let token = args.required("ConfigurationToken")?;
        let config = self.store.read(|s| s.audio_source_configuration(token))?;
        respond(
            "GetAudioSourceConfiguration",
            &templates::audio_source_configuration("trt:Configuration", &config),
        )
    }

    fn get_video_encoder_configurations(&self, _args: &Args) -> Result<String, OnvifError> {
        let configs = self.store.read(|s| s.video_encoder_configurations());
        let body: String = configs
            .iter()
            .map(|c| templates::video_encoder_configuration("trt:Configurations", c))
            .collect();
        respond("GetVideoEncoderConfigurations", &body)
    }

    fn get_video_encoder_configuration(&self, args: &Args) -> Result<String, OnvifError> {
        let token = args.required("ConfigurationToken")?;
        let config = self.store.read(|s| s.video_encoder_configuration(token))?;
        respond(
            "GetVideoEncoderConfiguration",
            &templates::video_encoder_configuration("trt:Configuration", &config),
        )
    }

    fn get_audio_encoder_configurations(&self, _args: &Args) -> Result<String, OnvifError> {
        let configs = self.store.read(|s| s.audio_encoder_configurations());
        let body: String = configs
            .iter()
            .map(|c| templates::audio_encoder_configuration("trt:Configurations", c))
            .collect();
        respond("GetAudioEncoderConfigurations", &body)
    }

    fn get_audio_encoder_configuration(&self, args: &Args) -> Result<String, OnvifError> {
        let token = args.required("ConfigurationToken")?;
        let config = self.store.read(|s| s.audio_encoder_configuration(token))?;
        respond(
            "GetAudioEncoderConfiguration",
            &templates::audio_encoder_configuration("trt:Configuration", &config),
        )
    }

    fn get_metadata_configurations(&self, _args: &Args) -> Result<String, OnvifError> {
        let configs = self.store.read(|s| s.metadata_configurations());
        let body: String = configs
            .iter()
            .map(|c| templates::metadata_configuration("trt:Configurations", c))
            .collect();
        respond("GetMetadataConfigurations", &body)
    }

    /// Optional ConfigurationToken/ProfileToken must name existing objects
    fn check_option_scope(&self, kind: ConfigKind, args: &Args) -> Result<(), OnvifError> {
        let config = args.value("ConfigurationToken").filter(|t| !t.is_empty());
        let profile = args.value("ProfileToken").filter(|t| !t.is_empty());
        self.store.read(|s| {
            if let Some(token) = config {
                if !s.contains_config(kind, token) {
                    return Err(OnvifError::not_found(kind.entity(), token));
                }
            }
            if let Some(token) = profile {
                s.profile(token)?;
            }
            Ok(())
        })
    }

    fn get_video_encoder_configuration_options(&self, args: &Args) -> Result<String, OnvifError> {
        self.check_option_scope(ConfigKind::VideoEncoder, args)?;
        let options = self.store.read(|s| s.video_encoder_options().clone());
        respond(
            "GetVideoEncoderConfigurationOptions",
            &templates::video_encoder_options(&options),
        )
    }

    fn get_audio_encoder_configuration_options(&self, args: &Args) -> Result<String, OnvifError> {
        self.check_option_scope(ConfigKind::AudioEncoder, args)?;
        let options = self.store.read(|s| s.audio_encoder_options().clone());
        respond(
            "GetAudioEncoderConfigurationOptions",
            &templates::audio_encoder_options(&options),
        )
    }

    fn set_video_encoder_configuration(&self, args: &Args) -> Result<String, OnvifError> {
        let (token, config) = configuration_element(args)?;
        let token = token.ok_or_else(|| OnvifError::invalid_arg("token", "missing configuration token"))?;
        let update = video_encoder_update(config)?;
        self.store
            .write(|s| s.set_video_encoder_configuration(token, &update))?;
        respond("SetVideoEncoderConfiguration", "")
    }

    fn set_audio_encoder_configuration(&self, args: &Args) -> Result<String, OnvifError> {
        let (token, config) = configuration_element(args)?;
        let token = token.ok_or_else(|| OnvifError::invalid_arg("token", "missing configuration token"))?;
        let update = audio_encoder_update(config)?;
        self.store
            .write(|s| s.set_audio_encoder_configuration(token, &update))?;
        respond("SetAudioEncoderConfiguration", "")
    }

    fn create_video_encoder_configuration(&self, args: &Args) -> Result<String, OnvifError> {
        let (token, config) = configuration_element(args)?;
        let update = video_encoder_update(config)?;
        let created = self.store.write(|s| {
            let mut candidate = baseline_video_encoder(s.video_encoder_options())?;
            update.apply_to(&mut candidate);
            let token = s.create_video_encoder_configuration(token, candidate)?;
            s.video_encoder_configuration(&token)
        })?;
        respond(
            "CreateVideoEncoderConfiguration",
            &templates::video_encoder_configuration("trt:Configuration", &created),
        )
    }

    fn create_audio_encoder_configuration(&self, args: &Args) -> Result<String, OnvifError> {
        let (token, config) = configuration_element(args)?;
        let update = audio_encoder_update(config)?;
        let created = self.store.write(|s| {
            let opts = s.audio_encoder_options();
            let mut candidate = AudioEncoderConfiguration {
                token: String::new(),
                name: "Audio".to_string(),
                encoding: first(&opts.encodings, "Encoding")?,
                bitrate: first(&opts.bitrates, "Bitrate")?,
                sample_rate: first(&opts.sample_rates, "SampleRate")?,
                session_timeout_secs: DEFAULT_SESSION_TIMEOUT_SECS,
            };
            update.apply_to(&mut candidate);
            let token = s.create_audio_encoder_configuration(token, candidate)?;
            s.audio_encoder_configuration(&token)
        })?;
        respond(
            "CreateAudioEncoderConfiguration",
            &templates::audio_encoder_configuration("trt:Configuration", &created),
        )
    }

    fn delete_video_encoder_configuration(&self, args: &Args) -> Result<String, OnvifError> {
        let token = args.required("ConfigurationToken")?;
        self.store
            .write(|s| s.delete_configuration(ConfigKind::VideoEncoder, token))?;
        respond("DeleteVideoEncoderConfiguration", "")
    }

    fn delete_audio_encoder_configuration(&self, args: &Args) -> Result<String, OnvifError> {
        let token = args.required("ConfigurationToken")?;
        self.store
            .write(|s| s.delete_configuration(ConfigKind::AudioEncoder, token))?;
        respond("DeleteAudioEncoderConfiguration", "")
    }

    // ----- URIs -----

    /// Profile must exist and carry a video source
    fn streamable_profile<'a>(&self, args: &'a Args) -> Result<&'a str, OnvifError> {
        let token = args.required("ProfileToken")?;
        self.store.read(|s| {
            let profile = s.profile(token)?;
            if profile.bindings.get(ConfigKind::VideoSource).is_none() {
                return Err(OnvifError::conflict(
                    ConflictKind::IncompleteConfiguration,
                    format!("profile '{}' has no video source configuration", token),
                ));
            }
            Ok(())
        })?;
        Ok(token)
    }

    fn get_stream_uri(&self, args: &Args) -> Result<String, OnvifError> {
        match args.value("StreamSetup/Stream").unwrap_or("RTP-Unicast") {
            "RTP-Unicast" => {}
            "RTP-Multicast" => {
                return Err(OnvifError::invalid_arg("Stream", "multicast streaming is not supported"))
            }
            other => {
                return Err(OnvifError::invalid_arg(
                    "Stream",
                    format!("unknown stream type '{}'", other),
                ))
            }
        }
        match args.value("StreamSetup/Transport/Protocol").unwrap_or("RTSP") {
            "UDP" | "TCP" | "RTSP" | "HTTP" => {}
            other => {
                return Err(OnvifError::invalid_arg(
                    "Protocol",
                    format!("unknown transport protocol '{}'", other),
                ))
            }
        }

        let token = self.streamable_profile(args)?;
        let uri = self.pipeline.stream_uri(token);
        respond("GetStreamUri", &templates::media_uri(&uri))
    }

    fn get_snapshot_uri(&self, args: &Args) -> Result<String, OnvifError> {
        let token = self.streamable_profile(args)?;
        let uri = self.pipeline.snapshot_uri(token);
        respond("GetSnapshotUri", &templates::media_uri(&uri))
    }

    fn get_service_capabilities(&self, _args: &Args) -> Result<String, OnvifError> {
        respond("GetServiceCapabilities", templates::media_service_capabilities())
    }
}

impl OnvifService for MediaService {
    const SERVICE: Service = Service::Media;

    fn methods() -> Vec<(&'static str, Method<Self>)> {
        vec![
            ("getProfiles", Self::get_profiles),
            ("getProfile", Self::get_profile),
            ("createProfile", Self::create_profile),
            ("deleteProfile", Self::delete_profile),
            ("addVideoSourceConfiguration", Self::add_video_source_configuration),
            ("removeVideoSourceConfiguration", Self::remove_video_source_configuration),
            ("addAudioSourceConfiguration", Self::add_audio_source_configuration),
            ("removeAudioSourceConfiguration", Self::remove_audio_source_configuration),
            ("addVideoEncoderConfiguration", Self::add_video_encoder_configuration),
            ("removeVideoEncoderConfiguration", Self::remove_video_encoder_configuration),
            ("addAudioEncoderConfiguration", Self::add_audio_encoder_configuration),
            ("removeAudioEncoderConfiguration", Self::remove_audio_encoder_configuration),
            ("addPTZConfiguration", Self::add_ptz_configuration),
            ("removePTZConfiguration", Self::remove_ptz_configuration),
            ("addMetadataConfiguration", Self::add_metadata_configuration),
            ("removeMetadataConfiguration", Self::remove_metadata_configuration),
            ("getVideoSources", Self::get_video_sources),
            ("getAudioSources", Self::get_audio_sources),
            ("getVideoSourceConfigurations", Self::get_video_source_configurations),
            ("getVideoSourceConfiguration", Self::get_video_source_configuration),
            ("getAudioSourceConfigurations", Self::get_audio_source_configurations),
            ("getAudioSourceConfiguration", Self::get_audio_source_configuration),
            ("getVideoEncoderConfigurations", Self::get_video_encoder_configurations),
            ("getVideoEncoderConfiguration", Self::get_video_encoder_configuration),
            ("getAudioEncoderConfigurations", Self::get_audio_encoder_configurations),
            ("getAudioEncoderConfiguration", Self::get_audio_encoder_configuration),
            ("getMetadataConfigurations", Self::get_metadata_configurations),
            ("getVideoEncoderConfigurationOptions", Self::get_video_encoder_configuration_options),
            ("getAudioEncoderConfigurationOptions", Self::get_audio_encoder_configuration_options),
            ("setVideoEncoderConfiguration", Self::set_video_encoder_configuration),
            ("setAudioEncoderConfiguration", Self::set_audio_encoder_configuration),
            ("createVideoEncoderConfiguration", Self::create_video_encoder_configuration),
            ("createAudioEncoderConfiguration", Self::create_audio_encoder_configuration),
            ("deleteVideoEncoderConfiguration", Self::delete_video_encoder_configuration),
            ("deleteAudioEncoderConfiguration", Self::delete_audio_encoder_configuration),
            ("getStreamUri", Self::get_stream_uri),
            ("getSnapshotUri", Self::get_snapshot_uri),
            ("getServiceCapabilities", Self::get_service_capabilities),
        ]
    }
}

/// The `Configuration` element and its `token` attribute
fn configuration_element(args: &Args) -> Result<(Option<&str>, &Args), OnvifError> {
    let config = args
        .child("Configuration")
        .ok_or_else(|| OnvifError::invalid_arg("Configuration", "missing Configuration element"))?;
    let token = config.attr("token").filter(|t| !t.is_empty());
    Ok((token, config))
}

fn video_encoder_update(cfg: &Args) -> Result<VideoEncoderUpdate, OnvifError> {
    let resolution = match cfg.child("Resolution") {
        Some(r) => Some(Resolution::new(
            r.parse_required("Width")?,
            r.parse_required("Height")?,
        )),
        None => None,
    };
    let gov_length = match cfg.child("H264").or_else(|| cfg.child("MPEG4")) {
        Some(block) => block.parse("GovLength")?,
        None => None,
    };
    Ok(VideoEncoderUpdate {
        name: cfg.value("Name").filter(|n| !n.is_empty()).map(str::to_string),
        encoding: cfg.parse("Encoding")?,
        resolution,
        quality: cfg.parse("Quality")?,
        frame_rate_limit: cfg.parse("RateControl/FrameRateLimit")?,
        encoding_interval: cfg.parse("RateControl/EncodingInterval")?,
        bitrate_limit: cfg.parse("RateControl/BitrateLimit")?,
        gov_length,
        h264_profile: cfg.parse("H264/H264Profile")?,
        session_timeout_secs: cfg.duration_secs("SessionTimeout")?,
    })
}

fn audio_encoder_update(cfg: &Args) -> Result<AudioEncoderUpdate, OnvifError> {
    Ok(AudioEncoderUpdate {
        name: cfg.value("Name").filter(|n| !n.is_empty()).map(str::to_string),
        encoding: cfg.parse("Encoding")?,
        bitrate: cfg.parse("Bitrate")?,
        sample_rate: cfg.parse("SampleRate")?,
        session_timeout_secs: cfg.duration_secs("SessionTimeout")?,
    })
}

fn first<T: Copy>(items: &[T], field: &str) -> Result<T, OnvifError> {
    items
        .first()
        .copied()
        .ok_or_else(|| OnvifError::invalid_arg(field, "no supported values advertised"))
}

/// Starting point for a created encoder: the best settings the options allow
fn baseline_video_encoder(opts: &VideoEncoderOptions) -> Result<VideoEncoderConfiguration, OnvifError> {
    Ok(VideoEncoderConfiguration {
        token: String::new(),
        name: "Video".to_string(),
        encoding: first(&opts.encodings, "Encoding")?,
        resolution: first(&opts.resolutions, "Resolution")?,
        quality: opts.quality.max,
        rate_control: RateControl {
            frame_rate_limit: opts.frame_rate.max,
            encoding_interval: opts.encoding_interval.min,
            bitrate_limit: opts.bitrate.max,
        },
        gov_length: opts.gov_length.max,
        h264_profile: first(&opts.h264_profiles, "H264Profile")?,
        session_timeout_secs: DEFAULT_SESSION_TIMEOUT_SECS,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::Dispatcher;
    use crate::pipeline::UpstreamPipeline;
    use crate::registry::ServiceRegistry;
    use crate::store::ConfigurationStore;
    use config_manager::{EmulatorConfig, UpstreamConfig};

    fn setup(store: ConfigurationStore) -> (Dispatcher, SharedStore) {
        let shared = SharedStore::new(store);
        let pipeline = Arc::new(UpstreamPipeline::new(UpstreamConfig::default()));
        let mut registry = ServiceRegistry::new();
        registry
            .register_service(Arc::new(MediaService::new(shared.clone(), pipeline)))
            .unwrap();
        (Dispatcher::new(registry), shared)
    }

    fn seeded() -> (Dispatcher, SharedStore) {
        setup(ConfigurationStore::from_config(&EmulatorConfig::default()).unwrap())
    }

    fn call(d: &Dispatcher, method: &str, args: Args) -> Result<String, OnvifError> {
        d.dispatch(Service::Media, method, &args)
    }

    fn set_quality(token: &str, quality: &str) -> Args {
        Args::new("SetVideoEncoderConfiguration")
            .with_child(
                Args::new("Configuration")
                    .with_attr("token", token)
                    .with_value("Quality", quality),
            )
            .with_value("ForcePersistence", "true")
    }

    #[test]
    fn test_create_then_list_single_profile() {
        let (d, _) = setup(ConfigurationStore::default());
        let created = call(&d, "createProfile", Args::new("CreateProfile").with_value("Name", "main")).unwrap();
        assert!(created.starts_with("<trt:CreateProfileResponse><trt:Profile token=\""));

        let listed = call(&d, "getProfiles", Args::new("GetProfiles")).unwrap();
        assert_eq!(listed.matches("<trt:Profiles ").count(), 1);
        assert!(listed.contains("<tt:Name>main</tt:Name>"));
        assert!(listed.contains(r#"fixed="false""#));
    }

    #[test]
    fn test_get_unknown_profile_is_not_found() {
        let (d, _) = seeded();
        let err = call(&d, "getProfile", Args::new("GetProfile").with_value("ProfileToken", "nope")).unwrap_err();
        let fault = err.fault();
        assert_eq!(fault.subcode, "ter:InvalidArgVal");
        assert_eq!(fault.detail, Some("ter:NoProfile"));
    }

    #[test]
    fn test_get_profile_is_token_correct() {
        let (d, shared) = seeded();
        shared.write(|s| s.create_profile("Second", Some("second"))).unwrap();
        let body = call(&d, "getProfile", Args::new("GetProfile").with_value("ProfileToken", "second")).unwrap();
        assert!(body.contains(r#"<trt:Profile token="second" fixed="false">"#));
        assert!(body.contains("<tt:Name>Second</tt:Name>"));
    }

    #[test]
    fn test_out_of_range_quality_leaves_profile_unchanged() {
        let (d, _) = seeded();
        let get = || call(&d, "getProfile", Args::new("GetProfile").with_value("ProfileToken", "main")).unwrap();
        let before = get();

        let err = call(&d, "setVideoEncoderConfiguration", set_quality("main", "150")).unwrap_err();
        assert!(matches!(err, OnvifError::InvalidArgs { ref field, .. } if field == "Quality"));

        assert_eq!(get(), before);
        assert!(before.contains("<tt:Quality>8</tt:Quality>"));
    }

    #[test]
    fn test_set_then_options_stay_consistent() {
        let (d, shared) = seeded();
        call(&d, "setVideoEncoderConfiguration", set_quality("main", "100")).unwrap();
        let max = shared.read(|s| s.video_encoder_options().quality.max);
        let quality = shared.read(|s| s.video_encoder_configuration("main").unwrap().config.quality);
        assert_eq!(quality, max);

        let options = call(
            &d,
            "getVideoEncoderConfigurationOptions",
            Args::new("GetVideoEncoderConfigurationOptions").with_value("ConfigurationToken", "main"),
        )
        .unwrap();
        assert!(options.contains("<tt:Max>100</tt:Max>"));
    }

    #[test]
    fn test_set_full_configuration() {
        let (d, shared) = seeded();
        let args = Args::new("SetVideoEncoderConfiguration").with_child(
            Args::new("Configuration")
                .with_attr("token", "sub")
                .with_value("Name", "Sub")
                .with_value("Encoding", "H264")
                .with_child(Args::new("Resolution").with_value("Width", "720").with_value("Height", "576"))
                .with_value("Quality", "30")
                .with_child(
                    Args::new("RateControl")
                        .with_value("FrameRateLimit", "10")
                        .with_value("EncodingInterval", "1")
                        .with_value("BitrateLimit", "512"),
                )
                .with_child(Args::new("H264").with_value("GovLength", "20").with_value("H264Profile", "High"))
                .with_value("SessionTimeout", "PT2M"),
        );
        call(&d, "setVideoEncoderConfiguration", args).unwrap();

        let cfg = shared.read(|s| s.video_encoder_configuration("sub").unwrap().config);
        assert_eq!(cfg.resolution, Resolution::new(720, 576));
        assert_eq!(cfg.gov_length, 20);
        assert_eq!(cfg.session_timeout_secs, 120);
        assert_eq!(cfg.rate_control.bitrate_limit, 512);
    }

    #[test]
    fn test_set_unknown_token_is_not_found() {
        let (d, _) = seeded();
        let err = call(&d, "setVideoEncoderConfiguration", set_quality("ghost", "10")).unwrap_err();
        assert!(matches!(err, OnvifError::NotFound { .. }));
    }

    #[test]
    fn test_stream_uri_requires_video_source() {
        let (d, shared) = seeded();
        shared.write(|s| s.create_profile("Empty", Some("empty"))).unwrap();

        let request = |token: &str| {
            Args::new("GetStreamUri")
                .with_child(Args::new("StreamSetup").with_value("Stream", "RTP-Unicast"))
                .with_value("ProfileToken", token)
        };

        let body = call(&d, "getStreamUri", request("main")).unwrap();
        assert!(body.contains("<tt:Uri>rtsp://127.0.0.1:8554/main</tt:Uri>"));

        let err = call(&d, "getStreamUri", request("empty")).unwrap_err();
        assert!(matches!(
            err,
            OnvifError::Conflict { kind: ConflictKind::IncompleteConfiguration, .. }
        ));
    }

    #[test]
    fn test_multicast_rejected() {
        let (d, _) = seeded();
        let args = Args::new("GetStreamUri")
            .with_child(Args::new("StreamSetup").with_value("Stream", "RTP-Multicast"))
            .with_value("ProfileToken", "main");
        assert!(matches!(
            call(&d, "getStreamUri", args),
            Err(OnvifError::InvalidArgs { .. })
        ));
    }

    #[test]
    fn test_snapshot_uri() {
        let (d, _) = seeded();
        let body = call(&d, "getSnapshotUri", Args::new("GetSnapshotUri").with_value("ProfileToken", "main")).unwrap();
        assert!(body.contains("http://127.0.0.1:8080/snapshot/main"));
    }

    #[test]
    fn test_add_and_remove_round_trip_use_count() {
        let (d, shared) = seeded();
        shared.write(|s| s.create_profile("Extra", Some("extra"))).unwrap();

        let add = Args::new("AddVideoEncoderConfiguration")
            .with_value("ProfileToken", "extra")
            .with_value("ConfigurationToken", "sub");
        assert_eq!(
            call(&d, "addVideoEncoderConfiguration", add).unwrap(),
            "<trt:AddVideoEncoderConfigurationResponse/>"
        );
        let listed = call(&d, "getVideoEncoderConfigurations", Args::new("GetVideoEncoderConfigurations")).unwrap();
        assert_eq!(listed.matches("<tt:UseCount>1</tt:UseCount>").count(), 2);

        let remove = Args::new("RemoveVideoEncoderConfiguration").with_value("ProfileToken", "extra");
        call(&d, "removeVideoEncoderConfiguration", remove).unwrap();
        assert_eq!(shared.read(|s| s.use_count(ConfigKind::VideoEncoder, "sub")), 0);
    }

    #[test]
    fn test_delete_fixed_profile_conflicts() {
        let (d, _) = seeded();
        let err = call(&d, "deleteProfile", Args::new("DeleteProfile").with_value("ProfileToken", "main")).unwrap_err();
        assert_eq!(err.fault().detail, Some("ter:DeletionOfFixedProfile"));
    }

    #[test]
    fn test_create_and_delete_encoder_configuration() {
        let (d, shared) = seeded();
        let create = Args::new("CreateVideoEncoderConfiguration").with_child(
            Args::new("Configuration")
                .with_attr("token", "third")
                .with_value("Quality", "40"),
        );
        let body = call(&d, "createVideoEncoderConfiguration", create).unwrap();
        assert!(body.contains(r#"<trt:Configuration token="third">"#));
        assert_eq!(shared.read(|s| s.video_encoder_configuration("third").unwrap().config.quality), 40.0);

        let delete = || {
            Args::new("DeleteVideoEncoderConfiguration").with_value("ConfigurationToken", "third")
        };
        call(&d, "deleteVideoEncoderConfiguration", delete()).unwrap();
        assert!(matches!(
            call(&d, "deleteVideoEncoderConfiguration", delete()),
            Err(OnvifError::NotFound { .. })
        ));

        let in_use = Args::new("DeleteVideoEncoderConfiguration").with_value("ConfigurationToken", "main");
        assert!(matches!(
            call(&d, "deleteVideoEncoderConfiguration", in_use),
            Err(OnvifError::Conflict { kind: ConflictKind::InUse, .. })
        ));
    }

    #[test]
    fn test_options_with_unknown_configuration() {
        let (d, _) = seeded();
        let args = Args::new("GetAudioEncoderConfigurationOptions").with_value("ConfigurationToken", "ghost");
        assert!(matches!(
            call(&d, "getAudioEncoderConfigurationOptions", args),
            Err(OnvifError::NotFound { .. })
        ));
    }
}
