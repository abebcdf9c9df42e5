use serde::{Deserialize, Serialize};

use crate::capture::frame::{encode_frame, ImageFrame};
use crate::config::model::{AppConfig, ConfigEnum};
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageQuality {
    Low,    // 1280px long edge, q50
    Medium, // 1920px long edge, q75
    High,   // 2560px long edge, q90
}

impl ImageQuality {
    pub fn jpeg_quality(&self) -> u8 {
        match self {
            ImageQuality::Low => 50,
            ImageQuality::Medium => 75,
            ImageQuality::High => 90,
        }
    }

    pub fn max_edge(&self) -> u32 {
        match self {
            ImageQuality::Low => 1280,
            ImageQuality::Medium => 1920,
            ImageQuality::High => 2560,
        }
    }
}

impl ConfigEnum for ImageQuality {
    const ALLOWED: &'static [&'static str] = &["low", "medium", "high"];

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "low" => Some(ImageQuality::Low),
            "medium" => Some(ImageQuality::Medium),
            "high" => Some(ImageQuality::High),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AudioMode {
    SpeakerOnly,
    MicrophoneOnly,
    Both,
}

impl AudioMode {
    pub fn captures_speaker(&self) -> bool {
        matches!(self, AudioMode::SpeakerOnly | AudioMode::Both)
    }

    pub fn captures_microphone(&self) -> bool {
        matches!(self, AudioMode::MicrophoneOnly | AudioMode::Both)
    }
}

impl ConfigEnum for AudioMode {
    const ALLOWED: &'static [&'static str] = &["speaker-only", "microphone-only", "both"];

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "speaker-only" => Some(AudioMode::SpeakerOnly),
            "microphone-only" => Some(AudioMode::MicrophoneOnly),
            "both" => Some(AudioMode::Both),
            _ => None,
        }
    }
}

/// Seconds between automatic screen captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CaptureInterval(u32);

impl CaptureInterval {
    pub const ALLOWED: [u32; 5] = [3, 5, 10, 15, 30];

    pub fn new(seconds: u32) -> Option<Self> {
        Self::ALLOWED.contains(&seconds).then_some(CaptureInterval(seconds))
    }

    pub fn seconds(&self) -> u32 {
        self.0
    }

    pub fn as_duration(&self) -> std::time::Duration {
        std::time::Duration::from_secs(u64::from(self.0))
    }
}

impl Default for CaptureInterval {
    fn default() -> Self {
        CaptureInterval(5)
    }
}

/// What the capture side should record, derived from the saved settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturePlan {
    pub speaker: bool,
    pub microphone: bool,
    pub interval_ms: u64,
    pub quality: ImageQuality,
}

impl CapturePlan {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            speaker: config.audio_mode.captures_speaker(),
            microphone: config.audio_mode.captures_microphone(),
            interval_ms: config.capture_interval.as_duration().as_millis() as u64,
            quality: config.image_quality,
        }
    }

    /// Encodes a raw RGBA screen grab at the configured quality.
    pub fn encode(&self, width: u32, height: u32, rgba: Vec<u8>) -> Result<ImageFrame> {
        encode_frame(width, height, rgba, self.quality)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_interval_only_accepts_listed_values() {
        assert_eq!(CaptureInterval::new(10).map(|i| i.seconds()), Some(10));
        assert!(CaptureInterval::new(7).is_none());
        assert_eq!(CaptureInterval::default().as_duration().as_secs(), 5);
    }

    #[test]
    fn audio_mode_sources() {
        assert!(AudioMode::Both.captures_speaker());
        assert!(AudioMode::Both.captures_microphone());
        assert!(!AudioMode::SpeakerOnly.captures_microphone());
    }

    #[test]
    fn plan_follows_saved_settings() {
        let config = AppConfig::from_value(serde_json::json!({
            "audioMode": "microphone-only",
            "captureInterval": 10,
            "imageQuality": "low"
        }))
        .unwrap();
        let plan = CapturePlan::from_config(&config);
        assert!(!plan.speaker);
        assert!(plan.microphone);
        assert_eq!(plan.interval_ms, 10_000);

        let frame = plan.encode(2000, 4, vec![0u8; 2000 * 4 * 4]).unwrap();
        assert_eq!(frame.width, 1280);
        assert_eq!(frame.mime_type, "image/jpeg");
    }
}
