//! Media URI provider
//!
//! The emulator does not touch media itself. GetStreamUri/GetSnapshotUri
//! ask a pipeline where the real stream for a profile lives.

use config_manager::UpstreamConfig;

pub trait MediaPipeline: Send + Sync {
    fn stream_uri(&self, profile_token: &str) -> String;

    fn snapshot_uri(&self, profile_token: &str) -> String;
}

/// Pipeline backed by the configured upstream URI templates
#[derive(Debug, Clone)]
pub struct UpstreamPipeline {
    upstream: UpstreamConfig,
}

impl UpstreamPipeline {
    pub fn new(upstream: UpstreamConfig) -> Self {
        Self { upstream }
    }
}

impl MediaPipeline for UpstreamPipeline {
    fn stream_uri(&self, profile_token: &str) -> String {
        self.upstream.stream_uri_for(profile_token)
    }

    fn snapshot_uri(&self, profile_token: &str) -> String {
        self.upstream.snapshot_uri_for(profile_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_substitutes_profile_token() {
        let pipeline = UpstreamPipeline::new(UpstreamConfig {
            stream_uri: "rtsp://cam.local:554/live/{profile}".to_string(),
            snapshot_uri: "http://cam.local/snap?p={profile}".to_string(),
        });
        assert_eq!(pipeline.stream_uri("main"), "rtsp://cam.local:554/live/main");
        assert_eq!(pipeline.snapshot_uri("sub"), "http://cam.local/snap?p=sub");
    }
}
