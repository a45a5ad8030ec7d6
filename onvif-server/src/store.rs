//! Configuration store
//!
//! Holds the configuration graph ONVIF clients read and write: physical
//! sources, source/encoder/metadata/PTZ configurations and media profiles.
//! Profiles reference configurations by token; use counts are derived from
//! those references on every read so they can never drift.
//!
//! Every mutating operation validates first and commits last. A failed call
//! leaves the store exactly as it was.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use config_manager::EmulatorConfig;

use crate::error::{ConfigurationError, ConflictKind, OnvifError};
use crate::model::{
    AudioEncoderConfiguration, AudioEncoderOptions, AudioEncoderUpdate, AudioSource,
    AudioSourceConfiguration, ConfigKind, Counted, EntityKind, MetadataConfiguration, Profile,
    ProfileBindings, ProfileView, PtzConfiguration, PtzNode, Table, Tokened,
    VideoEncoderConfiguration, VideoEncoderOptions, VideoEncoderUpdate, VideoSource,
    VideoSourceConfiguration,
};

#[derive(Debug, Clone)]
pub struct ConfigurationStore {
    video_sources: Table<VideoSource>,
    audio_sources: Table<AudioSource>,
    video_source_configs: Table<VideoSourceConfiguration>,
    audio_source_configs: Table<AudioSourceConfiguration>,
    video_encoders: Table<VideoEncoderConfiguration>,
    audio_encoders: Table<AudioEncoderConfiguration>,
    metadata_configs: Table<MetadataConfiguration>,
    ptz_nodes: Table<PtzNode>,
    ptz_configs: Table<PtzConfiguration>,
    profiles: Table<Profile>,
    video_encoder_options: VideoEncoderOptions,
    audio_encoder_options: AudioEncoderOptions,
    /// Every token ever seeded or allocated, per kind. Never shrinks.
    issued: HashSet<(EntityKind, String)>,
    next_id: u64,
}

impl Default for ConfigurationStore {
    fn default() -> Self {
        Self::new(VideoEncoderOptions::default(), AudioEncoderOptions::default())
    }
}

impl ConfigurationStore {
    /// Create an empty store advertising the given encoder options
    pub fn new(
        video_encoder_options: VideoEncoderOptions,
        audio_encoder_options: AudioEncoderOptions,
    ) -> Self {
        Self {
            video_sources: Table::default(),
            audio_sources: Table::default(),
            video_source_configs: Table::default(),
            audio_source_configs: Table::default(),
            video_encoders: Table::default(),
            audio_encoders: Table::default(),
            metadata_configs: Table::default(),
            ptz_nodes: Table::default(),
            ptz_configs: Table::default(),
            profiles: Table::default(),
            video_encoder_options,
            audio_encoder_options,
            issued: HashSet::new(),
            next_id: 0,
        }
    }

    /// Seed a store from the device description.
    ///
    /// Profiles are built through the same add operations clients use, so a
    /// seed that would violate a store invariant is rejected here.
    pub fn from_config(config: &EmulatorConfig) -> Result<Self, ConfigurationError> {
        config.validate()?;

        let mut store = Self::new(
            config.video_encoder_options.clone(),
            config.audio_encoder_options.clone(),
        );

        for src in &config.video_sources {
            store.seed_static(EntityKind::VideoSource, src.clone())?;
        }
        for src in &config.audio_sources {
            store.seed_static(EntityKind::AudioSource, src.clone())?;
        }
        for cfg in &config.video_source_configurations {
            store.seed_static(EntityKind::VideoSourceConfiguration, cfg.clone())?;
        }
        for cfg in &config.audio_source_configurations {
            store.seed_static(EntityKind::AudioSourceConfiguration, cfg.clone())?;
        }
        for cfg in &config.metadata_configurations {
            store.seed_static(EntityKind::MetadataConfiguration, cfg.clone())?;
        }
        for node in &config.ptz_nodes {
            store.seed_static(EntityKind::PtzNode, node.clone())?;
        }
        for cfg in &config.ptz_configurations {
            store.seed_static(EntityKind::PtzConfiguration, cfg.clone())?;
        }
        for enc in &config.video_encoders {
            store
                .create_video_encoder_configuration(Some(&enc.token), enc.clone())
                .map_err(seed_error)?;
        }
        for enc in &config.audio_encoders {
            store
                .create_audio_encoder_configuration(Some(&enc.token), enc.clone())
                .map_err(seed_error)?;
        }

        for seed in &config.profiles {
            let profile = store
                .create_profile(&seed.name, Some(&seed.token))
                .map_err(seed_error)?;
            let bindings = [
                (ConfigKind::VideoSource, &seed.video_source),
                (ConfigKind::AudioSource, &seed.audio_source),
                (ConfigKind::VideoEncoder, &seed.video_encoder),
                (ConfigKind::AudioEncoder, &seed.audio_encoder),
                (ConfigKind::Ptz, &seed.ptz),
                (ConfigKind::Metadata, &seed.metadata),
            ];
            for (kind, token) in bindings {
                if let Some(token) = token {
                    store
                        .add_configuration_to_profile(&profile.token, kind, token)
                        .map_err(seed_error)?;
                }
            }
            if seed.fixed {
                store.mark_fixed(&profile.token).map_err(seed_error)?;
            }
        }

        Ok(store)
    }

    fn seed_static<T>(&mut self, kind: EntityKind, row: T) -> Result<(), ConfigurationError>
    where
        T: Tokened,
        Self: TableFor<T>,
    {
        if !self.issued.insert((kind, row.token().to_string())) {
            return Err(ConfigurationError::InvalidSeed(format!(
                "duplicate {} token '{}'",
                kind,
                row.token()
            )));
        }
        self.table_mut().push(row);
        Ok(())
    }

    fn mark_fixed(&mut self, token: &str) -> Result<(), OnvifError> {
        let profile = self.profile(token)?;
        for kind in ConfigKind::ALL {
            if kind.is_mandatory() && profile.bindings.get(kind).is_none() {
                return Err(OnvifError::conflict(
                    ConflictKind::IncompleteConfiguration,
                    format!("fixed profile '{}' has no {}", token, kind),
                ));
            }
        }
        if let Some(profile) = self.profiles.get_mut(token) {
            profile.fixed = true;
        }
        Ok(())
    }

    // ----- token ledger -----

    fn is_issued(&self, kind: EntityKind, token: &str) -> bool {
        self.issued.contains(&(kind, token.to_string()))
    }

    /// Resolve the token for a new object without touching the ledger
    fn choose_token(&self, kind: EntityKind, requested: Option<&str>) -> Result<Option<String>, OnvifError> {
        match requested {
            None => Ok(None),
            Some(token) if token.trim().is_empty() => {
                Err(OnvifError::invalid_arg("Token", "token must not be empty"))
            }
            Some(token) if self.is_issued(kind, token) => {
                if kind == EntityKind::Profile {
                    Err(OnvifError::conflict(
                        ConflictKind::ProfileExists,
                        format!("profile token '{}' already in use", token),
                    ))
                } else {
                    Err(OnvifError::invalid_arg(
                        "Token",
                        format!("{} token '{}' already in use", kind, token),
                    ))
                }
            }
            Some(token) => Ok(Some(token.to_string())),
        }
    }

    /// Record a token as issued. Generates a fresh one when none was chosen.
    fn issue(&mut self, kind: EntityKind, chosen: Option<String>) -> String {
        let token = match chosen {
            Some(token) => token,
            None => loop {
                self.next_id += 1;
                let candidate = format!("{}_{}", token_prefix(kind), self.next_id);
                if !self.is_issued(kind, &candidate) {
                    break candidate;
                }
            },
        };
        self.issued.insert((kind, token.clone()));
        token
    }

    // ----- profiles -----

    /// All profiles in insertion order
    pub fn profiles(&self) -> impl Iterator<Item = &Profile> {
        self.profiles.iter()
    }

    pub fn profile(&self, token: &str) -> Result<&Profile, OnvifError> {
        self.profiles
            .get(token)
            .ok_or_else(|| OnvifError::not_found(EntityKind::Profile, token))
    }

    /// Drill-down snapshot of one profile
    pub fn profile_view(&self, token: &str) -> Result<ProfileView, OnvifError> {
        let profile = self.profile(token)?;
        Ok(self.view_of(profile))
    }

    /// Drill-down snapshots of all profiles in insertion order
    pub fn profile_views(&self) -> Vec<ProfileView> {
        self.profiles.iter().map(|p| self.view_of(p)).collect()
    }

    fn view_of(&self, profile: &Profile) -> ProfileView {
        let b = &profile.bindings;
        ProfileView {
            token: profile.token.clone(),
            name: profile.name.clone(),
            fixed: profile.fixed,
            video_source: self.resolve(ConfigKind::VideoSource, b, &self.video_source_configs),
            audio_source: self.resolve(ConfigKind::AudioSource, b, &self.audio_source_configs),
            video_encoder: self.resolve(ConfigKind::VideoEncoder, b, &self.video_encoders),
            audio_encoder: self.resolve(ConfigKind::AudioEncoder, b, &self.audio_encoders),
            ptz: self.resolve(ConfigKind::Ptz, b, &self.ptz_configs),
            metadata: self.resolve(ConfigKind::Metadata, b, &self.metadata_configs),
        }
    }

    fn resolve<T: Tokened + Clone>(
        &self,
        kind: ConfigKind,
        bindings: &ProfileBindings,
        table: &Table<T>,
    ) -> Option<Counted<T>> {
        let row = table.get(bindings.get(kind)?)?;
        Some(self.counted(kind, row))
    }

    fn counted<T: Tokened + Clone>(&self, kind: ConfigKind, row: &T) -> Counted<T> {
        Counted {
            use_count: self.use_count(kind, row.token()),
            config: row.clone(),
        }
    }

    /// Allocate a new empty, non-fixed profile
    pub fn create_profile(&mut self, name: &str, token: Option<&str>) -> Result<Profile, OnvifError> {
        if name.trim().is_empty() {
            return Err(OnvifError::invalid_arg("Name", "profile name must not be empty"));
        }
        let chosen = self.choose_token(EntityKind::Profile, token)?;
        let token = self.issue(EntityKind::Profile, chosen);
        let profile = Profile {
            token,
            name: name.to_string(),
            fixed: false,
            bindings: ProfileBindings::default(),
        };
        self.profiles.push(profile.clone());
        Ok(profile)
    }

    pub fn delete_profile(&mut self, token: &str) -> Result<(), OnvifError> {
        if self.profile(token)?.fixed {
            return Err(OnvifError::conflict(
                ConflictKind::DeletionOfFixedProfile,
                format!("profile '{}' is fixed", token),
            ));
        }
        self.profiles.remove(token);
        Ok(())
    }

    /// Bind a configuration to a profile slot.
    ///
    /// Re-binding the token already in the slot is a no-op.
    pub fn add_configuration_to_profile(
        &mut self,
        profile_token: &str,
        kind: ConfigKind,
        config_token: &str,
    ) -> Result<(), OnvifError> {
        let profile = self.profile(profile_token)?;

        if !self.contains_config(kind, config_token) {
            return Err(OnvifError::invalid_arg(
                "ConfigurationToken",
                format!("no {} with token '{}'", kind, config_token),
            ));
        }

        let current = profile.bindings.get(kind);
        if current == Some(config_token) {
            return Ok(());
        }
        if profile.fixed && current.is_some() {
            return Err(OnvifError::conflict(
                ConflictKind::FixedProfile,
                format!(
                    "profile '{}' is fixed; its {} cannot be replaced",
                    profile_token, kind
                ),
            ));
        }
        if kind.is_exclusive() {
            if let Some(owner) = self
                .profiles
                .iter()
                .find(|p| p.token != profile_token && p.references(kind, config_token))
            {
                return Err(OnvifError::conflict(
                    ConflictKind::InUse,
                    format!(
                        "{} '{}' is already used by profile '{}'",
                        kind, config_token, owner.token
                    ),
                ));
            }
        }

        if let Some(profile) = self.profiles.get_mut(profile_token) {
            profile.bindings.set(kind, Some(config_token.to_string()));
        }
        Ok(())
    }

    /// Clear a profile slot. Clearing an empty slot is a no-op.
    pub fn remove_configuration_from_profile(
        &mut self,
        profile_token: &str,
        kind: ConfigKind,
    ) -> Result<(), OnvifError> {
        let profile = self.profile(profile_token)?;
        if profile.fixed && kind.is_mandatory() {
            return Err(OnvifError::conflict(
                ConflictKind::FixedProfile,
                format!(
                    "profile '{}' is fixed and requires a {}",
                    profile_token, kind
                ),
            ));
        }
        if let Some(profile) = self.profiles.get_mut(profile_token) {
            profile.bindings.set(kind, None);
        }
        Ok(())
    }

    // ----- configurations -----

    /// Number of profiles currently referencing the configuration
    pub fn use_count(&self, kind: ConfigKind, token: &str) -> usize {
        self.profiles
            .iter()
            .filter(|p| p.references(kind, token))
            .count()
    }

    pub fn contains_config(&self, kind: ConfigKind, token: &str) -> bool {
        match kind {
            ConfigKind::VideoSource => self.video_source_configs.contains(token),
            ConfigKind::AudioSource => self.audio_source_configs.contains(token),
            ConfigKind::VideoEncoder => self.video_encoders.contains(token),
            ConfigKind::AudioEncoder => self.audio_encoders.contains(token),
            ConfigKind::Ptz => self.ptz_configs.contains(token),
            ConfigKind::Metadata => self.metadata_configs.contains(token),
        }
    }

    /// Delete an unused configuration. Its token is never issued again.
    pub fn delete_configuration(&mut self, kind: ConfigKind, token: &str) -> Result<(), OnvifError> {
        if !self.contains_config(kind, token) {
            return Err(OnvifError::not_found(kind.entity(), token));
        }
        if kind == ConfigKind::Ptz {
            return Err(OnvifError::conflict(
                ConflictKind::StaticConfiguration,
                format!("{} '{}' is static", kind, token),
            ));
        }
        let use_count = self.use_count(kind, token);
        if use_count > 0 {
            return Err(OnvifError::conflict(
                ConflictKind::InUse,
                format!("{} '{}' is used by {} profile(s)", kind, token, use_count),
            ));
        }
        let removed = match kind {
            ConfigKind::VideoSource => self.video_source_configs.remove(token).is_some(),
            ConfigKind::AudioSource => self.audio_source_configs.remove(token).is_some(),
            ConfigKind::VideoEncoder => self.video_encoders.remove(token).is_some(),
            ConfigKind::AudioEncoder => self.audio_encoders.remove(token).is_some(),
            ConfigKind::Metadata => self.metadata_configs.remove(token).is_some(),
            ConfigKind::Ptz => false,
        };
        debug_assert!(removed);
        Ok(())
    }

    pub fn video_encoder_options(&self) -> &VideoEncoderOptions {
        &self.video_encoder_options
    }

    pub fn audio_encoder_options(&self) -> &AudioEncoderOptions {
        &self.audio_encoder_options
    }

    /// Add a video encoder configuration. The `token` field of `config` is
    /// replaced by the requested or allocated token.
    pub fn create_video_encoder_configuration(
        &mut self,
        token: Option<&str>,
        mut config: VideoEncoderConfiguration,
    ) -> Result<String, OnvifError> {
        let kind = EntityKind::VideoEncoderConfiguration;
        self.video_encoder_options
            .check(&config)
            .map_err(|v| OnvifError::invalid_arg(v.field, v.reason))?;
        let chosen = self.choose_token(kind, token)?;
        config.token = self.issue(kind, chosen);
        let token = config.token.clone();
        self.video_encoders.push(config);
        Ok(token)
    }

    pub fn create_audio_encoder_configuration(
        &mut self,
        token: Option<&str>,
        mut config: AudioEncoderConfiguration,
    ) -> Result<String, OnvifError> {
        let kind = EntityKind::AudioEncoderConfiguration;
        self.audio_encoder_options
            .check(&config)
            .map_err(|v| OnvifError::invalid_arg(v.field, v.reason))?;
        let chosen = self.choose_token(kind, token)?;
        config.token = self.issue(kind, chosen);
        let token = config.token.clone();
        self.audio_encoders.push(config);
        Ok(token)
    }

    /// Apply a partial update, validated as a whole against the options.
    /// Returns the committed configuration.
    pub fn set_video_encoder_configuration(
        &mut self,
        token: &str,
        update: &VideoEncoderUpdate,
    ) -> Result<VideoEncoderConfiguration, OnvifError> {
        let mut candidate = self
            .video_encoders
            .get(token)
            .cloned()
            .ok_or_else(|| OnvifError::not_found(EntityKind::VideoEncoderConfiguration, token))?;
        update.apply_to(&mut candidate);
        self.video_encoder_options
            .check(&candidate)
            .map_err(|v| OnvifError::invalid_arg(v.field, v.reason))?;

        if let Some(slot) = self.video_encoders.get_mut(token) {
            *slot = candidate.clone();
        }
        Ok(candidate)
    }

    pub fn set_audio_encoder_configuration(
        &mut self,
        token: &str,
        update: &AudioEncoderUpdate,
    ) -> Result<AudioEncoderConfiguration, OnvifError> {
        let mut candidate = self
            .audio_encoders
            .get(token)
            .cloned()
            .ok_or_else(|| OnvifError::not_found(EntityKind::AudioEncoderConfiguration, token))?;
        update.apply_to(&mut candidate);
        self.audio_encoder_options
            .check(&candidate)
            .map_err(|v| OnvifError::invalid_arg(v.field, v.reason))?;

        if let Some(slot) = self.audio_encoders.get_mut(token) {
            *slot = candidate.clone();
        }
        Ok(candidate)
    }

    // ----- read accessors -----

    pub fn video_sources(&self) -> impl Iterator<Item = &VideoSource> {
        self.video_sources.iter()
    }

    pub fn audio_sources(&self) -> impl Iterator<Item = &AudioSource> {
        self.audio_sources.iter()
    }

    pub fn video_source(&self, token: &str) -> Result<&VideoSource, OnvifError> {
        lookup(&self.video_sources, EntityKind::VideoSource, token)
    }

    pub fn video_source_configurations(&self) -> Vec<Counted<VideoSourceConfiguration>> {
        self.all_counted(ConfigKind::VideoSource, &self.video_source_configs)
    }

    pub fn video_source_configuration(
        &self,
        token: &str,
    ) -> Result<Counted<VideoSourceConfiguration>, OnvifError> {
        self.one_counted(ConfigKind::VideoSource, &self.video_source_configs, token)
    }

    pub fn audio_source_configurations(&self) -> Vec<Counted<AudioSourceConfiguration>> {
        self.all_counted(ConfigKind::AudioSource, &self.audio_source_configs)
    }

    pub fn audio_source_configuration(
        &self,
        token: &str,
    ) -> Result<Counted<AudioSourceConfiguration>, OnvifError> {
        self.one_counted(ConfigKind::AudioSource, &self.audio_source_configs, token)
    }

    pub fn video_encoder_configurations(&self) -> Vec<Counted<VideoEncoderConfiguration>> {
        self.all_counted(ConfigKind::VideoEncoder, &self.video_encoders)
    }

    pub fn video_encoder_configuration(
        &self,
        token: &str,
    ) -> Result<Counted<VideoEncoderConfiguration>, OnvifError> {
        self.one_counted(ConfigKind::VideoEncoder, &self.video_encoders, token)
    }

    pub fn audio_encoder_configurations(&self) -> Vec<Counted<AudioEncoderConfiguration>> {
        self.all_counted(ConfigKind::AudioEncoder, &self.audio_encoders)
    }

    pub fn audio_encoder_configuration(
        &self,
        token: &str,
    ) -> Result<Counted<AudioEncoderConfiguration>, OnvifError> {
        self.one_counted(ConfigKind::AudioEncoder, &self.audio_encoders, token)
    }

    pub fn metadata_configurations(&self) -> Vec<Counted<MetadataConfiguration>> {
        self.all_counted(ConfigKind::Metadata, &self.metadata_configs)
    }

    pub fn ptz_configurations(&self) -> Vec<Counted<PtzConfiguration>> {
        self.all_counted(ConfigKind::Ptz, &self.ptz_configs)
    }

    pub fn ptz_configuration(&self, token: &str) -> Result<Counted<PtzConfiguration>, OnvifError> {
        self.one_counted(ConfigKind::Ptz, &self.ptz_configs, token)
    }

    pub fn ptz_nodes(&self) -> impl Iterator<Item = &PtzNode> {
        self.ptz_nodes.iter()
    }

    pub fn ptz_node(&self, token: &str) -> Result<&PtzNode, OnvifError> {
        lookup(&self.ptz_nodes, EntityKind::PtzNode, token)
    }

    fn all_counted<T: Tokened + Clone>(&self, kind: ConfigKind, table: &Table<T>) -> Vec<Counted<T>> {
        table.iter().map(|row| self.counted(kind, row)).collect()
    }

    fn one_counted<T: Tokened + Clone>(
        &self,
        kind: ConfigKind,
        table: &Table<T>,
        token: &str,
    ) -> Result<Counted<T>, OnvifError> {
        let row = lookup(table, kind.entity(), token)?;
        Ok(self.counted(kind, row))
    }
}

fn lookup<'a, T: Tokened>(table: &'a Table<T>, kind: EntityKind, token: &str) -> Result<&'a T, OnvifError> {
    table.get(token).ok_or_else(|| OnvifError::not_found(kind, token))
}

fn token_prefix(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Profile => "profile",
        EntityKind::VideoSource => "vidsrc",
        EntityKind::AudioSource => "audsrc",
        EntityKind::VideoSourceConfiguration => "vscfg",
        EntityKind::AudioSourceConfiguration => "ascfg",
        EntityKind::VideoEncoderConfiguration => "venc",
        EntityKind::AudioEncoderConfiguration => "aenc",
        EntityKind::MetadataConfiguration => "meta",
        EntityKind::PtzConfiguration => "ptzcfg",
        EntityKind::PtzNode => "ptznode",
    }
}

fn seed_error(e: OnvifError) -> ConfigurationError {
    ConfigurationError::InvalidSeed(e.to_string())
}

/// Static dispatch from a row type to the table holding it
trait TableFor<T> {
    fn table_mut(&mut self) -> &mut Table<T>;
}

macro_rules! table_for {
    ($($ty:ty => $field:ident),* $(,)?) => {
        $(impl TableFor<$ty> for ConfigurationStore {
            fn table_mut(&mut self) -> &mut Table<$ty> {
                &mut self.$field
            }
        })*
    };
}

table_for!(
    VideoSource => video_sources,
    AudioSource => audio_sources,
    VideoSourceConfiguration => video_source_configs,
    AudioSourceConfiguration => audio_source_configs,
    MetadataConfiguration => metadata_configs,
    PtzNode => ptz_nodes,
    PtzConfiguration => ptz_configs,
);

/// The single lock every read and write of the store goes through.
///
/// Cloning is cheap; all clones share one store.
#[derive(Debug, Clone)]
pub struct SharedStore {
    inner: Arc<Mutex<ConfigurationStore>>,
}

impl SharedStore {
    pub fn new(store: ConfigurationStore) -> Self {
        Self {
            inner: Arc::new(Mutex::new(store)),
        }
    }

    /// Run `f` with shared access. Keep `f` free of I/O.
    pub fn read<R>(&self, f: impl FnOnce(&ConfigurationStore) -> R) -> R {
        f(&self.lock())
    }

    /// Run `f` with exclusive access. Keep `f` free of I/O.
    pub fn write<R>(&self, f: impl FnOnce(&mut ConfigurationStore) -> R) -> R {
        f(&mut self.lock())
    }

    // Mutations validate before committing, so the value behind a poisoned
    // lock is still consistent.
    fn lock(&self) -> MutexGuard<'_, ConfigurationStore> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RateControl, Resolution, VideoEncoding, H264Profile};

    fn seeded() -> ConfigurationStore {
        ConfigurationStore::from_config(&EmulatorConfig::default()).unwrap()
    }

    fn encoder(quality: f32) -> VideoEncoderConfiguration {
        VideoEncoderConfiguration {
            token: String::new(),
            name: "extra".to_string(),
            encoding: VideoEncoding::H264,
            resolution: Resolution::new(720, 576),
            quality,
            rate_control: RateControl {
                frame_rate_limit: 10,
                encoding_interval: 1,
                bitrate_limit: 512,
            },
            gov_length: 10,
            h264_profile: H264Profile::Main,
            session_timeout_secs: 60,
        }
    }

    fn assert_use_counts_consistent(store: &ConfigurationStore) {
        for kind in ConfigKind::ALL {
            let tokens: Vec<String> = match kind {
                ConfigKind::VideoSource => store.video_source_configurations().into_iter().map(|c| c.config.token).collect(),
                ConfigKind::AudioSource => store.audio_source_configurations().into_iter().map(|c| c.config.token).collect(),
                ConfigKind::VideoEncoder => store.video_encoder_configurations().into_iter().map(|c| c.config.token).collect(),
                ConfigKind::AudioEncoder => store.audio_encoder_configurations().into_iter().map(|c| c.config.token).collect(),
                ConfigKind::Ptz => store.ptz_configurations().into_iter().map(|c| c.config.token).collect(),
                ConfigKind::Metadata => store.metadata_configurations().into_iter().map(|c| c.config.token).collect(),
            };
            for token in tokens {
                let expected = store
                    .profiles()
                    .filter(|p| p.bindings.get(kind) == Some(token.as_str()))
                    .count();
                assert_eq!(store.use_count(kind, &token), expected, "{} {}", kind, token);
            }
        }
    }

    #[test]
    fn test_create_profile_on_empty_store() {
        let mut store = ConfigurationStore::default();
        let created = store.create_profile("main", None).unwrap();

        let profiles: Vec<_> = store.profiles().collect();
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].name, "main");
        assert!(!profiles[0].token.is_empty());
        assert_eq!(profiles[0].token, created.token);
        assert!(!profiles[0].fixed);
    }

    #[test]
    fn test_profiles_keep_insertion_order() {
        let mut store = ConfigurationStore::default();
        for name in ["c", "a", "b"] {
            store.create_profile(name, None).unwrap();
        }
        let names: Vec<_> = store.profiles().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["c", "a", "b"]);
    }

    #[test]
    fn test_create_profile_rejects_empty_name() {
        let mut store = ConfigurationStore::default();
        assert!(matches!(
            store.create_profile("  ", None),
            Err(OnvifError::InvalidArgs { .. })
        ));
        assert_eq!(store.profiles().count(), 0);
    }

    #[test]
    fn test_create_profile_with_existing_token() {
        let mut store = seeded();
        let err = store.create_profile("again", Some("main")).unwrap_err();
        assert!(matches!(
            err,
            OnvifError::Conflict { kind: ConflictKind::ProfileExists, .. }
        ));
    }

    #[test]
    fn test_get_unknown_profile() {
        let store = seeded();
        assert!(matches!(
            store.profile("missing"),
            Err(OnvifError::NotFound { kind: EntityKind::Profile, .. })
        ));
    }

    #[test]
    fn test_every_binding_resolves_in_drill_down() {
        let mut store = seeded();
        let p = store.create_profile("extra", None).unwrap();
        store.add_configuration_to_profile(&p.token, ConfigKind::VideoSource, "vscfg0").unwrap();
        store.add_configuration_to_profile(&p.token, ConfigKind::VideoEncoder, "sub").unwrap();
        store.add_configuration_to_profile(&p.token, ConfigKind::Metadata, "meta0").unwrap();

        for profile in store.profiles() {
            let view = store.profile_view(&profile.token).unwrap();
            let b = &profile.bindings;
            assert_eq!(view.video_source.is_some(), b.get(ConfigKind::VideoSource).is_some());
            assert_eq!(view.audio_source.is_some(), b.get(ConfigKind::AudioSource).is_some());
            assert_eq!(view.video_encoder.is_some(), b.get(ConfigKind::VideoEncoder).is_some());
            assert_eq!(view.audio_encoder.is_some(), b.get(ConfigKind::AudioEncoder).is_some());
            assert_eq!(view.ptz.is_some(), b.get(ConfigKind::Ptz).is_some());
            assert_eq!(view.metadata.is_some(), b.get(ConfigKind::Metadata).is_some());
        }

        let view = store.profile_view(&p.token).unwrap();
        assert_eq!(view.video_source.unwrap().use_count, 2);
        assert_eq!(view.video_encoder.unwrap().use_count, 1);
    }

    #[test]
    fn test_add_unknown_configuration_is_invalid_args() {
        let mut store = seeded();
        let p = store.create_profile("extra", None).unwrap();
        let err = store
            .add_configuration_to_profile(&p.token, ConfigKind::VideoEncoder, "vscfg0")
            .unwrap_err();
        assert!(matches!(err, OnvifError::InvalidArgs { .. }));
        assert_eq!(store.profile(&p.token).unwrap().bindings, ProfileBindings::default());
    }

    #[test]
    fn test_add_to_unknown_profile_is_not_found() {
        let mut store = seeded();
        let err = store
            .add_configuration_to_profile("missing", ConfigKind::VideoSource, "vscfg0")
            .unwrap_err();
        assert!(matches!(err, OnvifError::NotFound { .. }));
    }

    #[test]
    fn test_encoder_cannot_be_shared() {
        let mut store = seeded();
        let p = store.create_profile("extra", None).unwrap();
        let err = store
            .add_configuration_to_profile(&p.token, ConfigKind::VideoEncoder, "main")
            .unwrap_err();
        assert!(matches!(err, OnvifError::Conflict { kind: ConflictKind::InUse, .. }));
        assert_eq!(store.use_count(ConfigKind::VideoEncoder, "main"), 1);
    }

    #[test]
    fn test_source_configuration_can_be_shared() {
        let mut store = seeded();
        let p = store.create_profile("extra", None).unwrap();
        store.add_configuration_to_profile(&p.token, ConfigKind::VideoSource, "vscfg0").unwrap();
        assert_eq!(store.use_count(ConfigKind::VideoSource, "vscfg0"), 2);
    }

    #[test]
    fn test_fixed_profile_rejects_replacement_but_allows_rebind_of_same_token() {
        let mut store = seeded();
        store.add_configuration_to_profile("main", ConfigKind::VideoEncoder, "main").unwrap();
        let err = store
            .add_configuration_to_profile("main", ConfigKind::VideoEncoder, "sub")
            .unwrap_err();
        assert!(matches!(err, OnvifError::Conflict { kind: ConflictKind::FixedProfile, .. }));
        assert_eq!(store.profile("main").unwrap().bindings.get(ConfigKind::VideoEncoder), Some("main"));
    }

    #[test]
    fn test_fixed_profile_mandatory_removal_conflicts() {
        let mut store = seeded();
        for kind in [ConfigKind::VideoSource, ConfigKind::VideoEncoder] {
            let err = store.remove_configuration_from_profile("main", kind).unwrap_err();
            assert!(matches!(err, OnvifError::Conflict { .. }));
        }
        store.remove_configuration_from_profile("main", ConfigKind::AudioEncoder).unwrap();
        assert_eq!(store.use_count(ConfigKind::AudioEncoder, "aenc0"), 0);
    }

    #[test]
    fn test_non_fixed_profile_may_drop_mandatory() {
        let mut store = seeded();
        let p = store.create_profile("extra", None).unwrap();
        store.add_configuration_to_profile(&p.token, ConfigKind::VideoEncoder, "sub").unwrap();
        store.remove_configuration_from_profile(&p.token, ConfigKind::VideoEncoder).unwrap();
        assert_eq!(store.use_count(ConfigKind::VideoEncoder, "sub"), 0);
        // removing again is a no-op
        store.remove_configuration_from_profile(&p.token, ConfigKind::VideoEncoder).unwrap();
    }

    #[test]
    fn test_use_count_tracks_add_remove_sequence() {
        let mut store = seeded();
        let kinds = [
            (ConfigKind::VideoSource, "vscfg0"),
            (ConfigKind::AudioSource, "ascfg0"),
            (ConfigKind::VideoEncoder, "sub"),
            (ConfigKind::Metadata, "meta0"),
            (ConfigKind::Ptz, "default"),
        ];
        let mut tokens = Vec::new();
        for i in 0..4 {
            tokens.push(store.create_profile(&format!("p{}", i), None).unwrap().token);
        }

        // Deterministic pseudo-random walk over add/remove/delete operations.
        let mut seed: u64 = 0x2545_F491_4F6C_DD1D;
        for _ in 0..200 {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            let profile = &tokens[(seed % tokens.len() as u64) as usize];
            let (kind, config) = kinds[((seed >> 8) % kinds.len() as u64) as usize];
            let result = match (seed >> 16) % 3 {
                0 => store.add_configuration_to_profile(profile, kind, config),
                1 => store.remove_configuration_from_profile(profile, kind),
                _ => store.remove_configuration_from_profile(profile, kind).and_then(|_| {
                    store.add_configuration_to_profile(profile, kind, config)
                }),
            };
            // exclusive encoder conflicts are expected; nothing else may fail
            if let Err(e) = result {
                assert!(matches!(e, OnvifError::Conflict { kind: ConflictKind::InUse, .. }));
            }
            assert_use_counts_consistent(&store);
        }
    }

    #[test]
    fn test_set_quality_out_of_range_leaves_config_unchanged() {
        let mut store = seeded();
        let max = store.video_encoder_options().quality.max;
        let before = store.profile_view("main").unwrap().video_encoder.unwrap().config;

        let update = VideoEncoderUpdate {
            quality: Some(max + 50.0),
            ..Default::default()
        };
        for _ in 0..2 {
            let err = store.set_video_encoder_configuration("main", &update).unwrap_err();
            assert!(matches!(err, OnvifError::InvalidArgs { ref field, .. } if field == "Quality"));
        }

        let after = store.profile_view("main").unwrap().video_encoder.unwrap().config;
        assert_eq!(before, after);
    }

    #[test]
    fn test_set_rejects_whole_update_on_single_bad_field() {
        let mut store = seeded();
        let update = VideoEncoderUpdate {
            quality: Some(50.0),
            resolution: Some(Resolution::new(1280, 720)),
            gov_length: Some(1000),
            ..Default::default()
        };
        let err = store.set_video_encoder_configuration("main", &update).unwrap_err();
        assert!(matches!(err, OnvifError::InvalidArgs { ref field, .. } if field == "GovLength"));
        let current = store.video_encoder_configuration("main").unwrap().config;
        assert_eq!(current.quality, 8.0);
        assert_eq!(current.resolution, Resolution::new(1920, 1080));
    }

    #[test]
    fn test_set_within_range_updates_in_place() {
        let mut store = seeded();
        let update = VideoEncoderUpdate {
            quality: Some(70.0),
            resolution: Some(Resolution::new(1280, 720)),
            ..Default::default()
        };
        let committed = store.set_video_encoder_configuration("main", &update).unwrap();
        assert_eq!(committed.quality, 70.0);
        assert_eq!(store.use_count(ConfigKind::VideoEncoder, "main"), 1);
        let view = store.profile_view("main").unwrap();
        assert_eq!(view.video_encoder.unwrap().config.resolution, Resolution::new(1280, 720));
    }

    #[test]
    fn test_set_unknown_encoder_is_not_found() {
        let mut store = seeded();
        let err = store
            .set_video_encoder_configuration("missing", &VideoEncoderUpdate::default())
            .unwrap_err();
        assert!(matches!(err, OnvifError::NotFound { .. }));
    }

    #[test]
    fn test_set_audio_encoder_validates_sample_rate() {
        let mut store = seeded();
        let update = AudioEncoderUpdate {
            sample_rate: Some(48),
            ..Default::default()
        };
        let err = store.set_audio_encoder_configuration("aenc0", &update).unwrap_err();
        assert!(matches!(err, OnvifError::InvalidArgs { ref field, .. } if field == "SampleRate"));
        assert_eq!(store.audio_encoder_configuration("aenc0").unwrap().config.sample_rate, 8);
    }

    #[test]
    fn test_delete_in_use_configuration_conflicts() {
        let mut store = seeded();
        let err = store.delete_configuration(ConfigKind::VideoEncoder, "main").unwrap_err();
        assert!(matches!(err, OnvifError::Conflict { kind: ConflictKind::InUse, .. }));
        assert!(store.video_encoder_configuration("main").is_ok());
    }

    #[test]
    fn test_delete_unused_configuration_invalidates_token() {
        let mut store = seeded();
        assert_eq!(store.use_count(ConfigKind::VideoEncoder, "sub"), 0);
        store.delete_configuration(ConfigKind::VideoEncoder, "sub").unwrap();

        assert!(matches!(
            store.video_encoder_configuration("sub"),
            Err(OnvifError::NotFound { .. })
        ));
        let p = store.create_profile("x", None).unwrap();
        assert!(matches!(
            store.add_configuration_to_profile(&p.token, ConfigKind::VideoEncoder, "sub"),
            Err(OnvifError::InvalidArgs { .. })
        ));
        assert!(matches!(
            store.delete_configuration(ConfigKind::VideoEncoder, "sub"),
            Err(OnvifError::NotFound { .. })
        ));
    }

    #[test]
    fn test_deleted_token_is_never_reissued() {
        let mut store = seeded();
        store.delete_configuration(ConfigKind::VideoEncoder, "sub").unwrap();
        assert!(store
            .create_video_encoder_configuration(Some("sub"), encoder(10.0))
            .is_err());

        let first = store.create_profile("a", None).unwrap().token;
        store.delete_profile(&first).unwrap();
        let second = store.create_profile("b", None).unwrap().token;
        assert_ne!(first, second);
        assert!(store.create_profile("c", Some(&first)).is_err());
    }

    #[test]
    fn test_ptz_configuration_is_static() {
        let mut store = seeded();
        store.remove_configuration_from_profile("main", ConfigKind::Ptz).unwrap();
        let err = store.delete_configuration(ConfigKind::Ptz, "default").unwrap_err();
        assert!(matches!(
            err,
            OnvifError::Conflict { kind: ConflictKind::StaticConfiguration, .. }
        ));
    }

    #[test]
    fn test_fixed_profile_cannot_be_deleted() {
        let mut store = seeded();
        let err = store.delete_profile("main").unwrap_err();
        assert!(matches!(
            err,
            OnvifError::Conflict { kind: ConflictKind::DeletionOfFixedProfile, .. }
        ));
        assert!(store.profile("main").is_ok());
    }

    #[test]
    fn test_deleting_profile_releases_references() {
        let mut store = seeded();
        let p = store.create_profile("extra", None).unwrap();
        store.add_configuration_to_profile(&p.token, ConfigKind::VideoEncoder, "sub").unwrap();
        assert_eq!(store.use_count(ConfigKind::VideoEncoder, "sub"), 1);
        store.delete_profile(&p.token).unwrap();
        assert_eq!(store.use_count(ConfigKind::VideoEncoder, "sub"), 0);
        store.delete_configuration(ConfigKind::VideoEncoder, "sub").unwrap();
    }

    #[test]
    fn test_create_encoder_outside_options_rejected() {
        let mut store = seeded();
        let before = store.video_encoder_configurations().len();
        assert!(matches!(
            store.create_video_encoder_configuration(None, encoder(500.0)),
            Err(OnvifError::InvalidArgs { .. })
        ));
        assert_eq!(store.video_encoder_configurations().len(), before);

        let token = store.create_video_encoder_configuration(None, encoder(10.0)).unwrap();
        assert_eq!(store.video_encoder_configuration(&token).unwrap().config.token, token);
    }

    #[test]
    fn test_seeded_store_matches_config() {
        let store = seeded();
        let main = store.profile("main").unwrap();
        assert!(main.fixed);
        assert_eq!(main.bindings.get(ConfigKind::VideoSource), Some("vscfg0"));
        assert_eq!(store.video_sources().count(), 1);
        assert_eq!(store.ptz_nodes().count(), 1);
        assert_eq!(store.use_count(ConfigKind::Ptz, "default"), 1);
    }

    #[test]
    fn test_invalid_seed_is_configuration_error() {
        let mut config = EmulatorConfig::default();
        config.profiles[0].video_encoder = Some("missing".to_string());
        assert!(ConfigurationStore::from_config(&config).is_err());
    }

    #[test]
    fn test_shared_store_serializes_writers() {
        let shared = SharedStore::new(ConfigurationStore::default());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let shared = shared.clone();
                std::thread::spawn(move || {
                    for j in 0..25 {
                        shared
                            .write(|s| s.create_profile(&format!("p{}-{}", i, j), None))
                            .unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let tokens: HashSet<String> = shared.read(|s| s.profiles().map(|p| p.token.clone()).collect());
        assert_eq!(tokens.len(), 200);
    }

    #[test]
    fn test_panic_inside_write_leaves_store_usable() {
        let shared = SharedStore::new(seeded());
        let before = shared.read(|s| {
            (
                s.use_count(ConfigKind::VideoEncoder, "main"),
                s.use_count(ConfigKind::Ptz, "default"),
                s.profiles().count(),
            )
        });

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            shared.write(|s| {
                // rejected before commit, then the writer dies holding the lock
                assert!(s
                    .add_configuration_to_profile("main", ConfigKind::VideoEncoder, "sub")
                    .is_err());
                panic!("writer died");
            })
        }));
        assert!(result.is_err());
        assert!(shared.inner.is_poisoned());

        let after = shared.read(|s| {
            (
                s.use_count(ConfigKind::VideoEncoder, "main"),
                s.use_count(ConfigKind::Ptz, "default"),
                s.profiles().count(),
            )
        });
        assert_eq!(after, before);

        shared.write(|s| s.create_profile("After", Some("after"))).unwrap();
        shared
            .write(|s| s.add_configuration_to_profile("after", ConfigKind::VideoEncoder, "sub"))
            .unwrap();
        assert_eq!(shared.read(|s| s.use_count(ConfigKind::VideoEncoder, "sub")), 1);
    }
}

