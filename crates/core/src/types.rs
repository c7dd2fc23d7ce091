use serde::{Deserialize, Serialize};

use crate::interval::Interval;

/// One element of the ranked search answer. `video_id` is the identifier as
/// the source reported it, not its canonical form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedEntry {
    pub video_id: String,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    Visual,
    Speech,
    Audio,
}

impl Modality {
    pub fn name(&self) -> &'static str {
        match self {
            Modality::Visual => "visual",
            Modality::Speech => "speech",
            Modality::Audio => "audio",
        }
    }

    /// Field holding the caption text in caption server responses.
    pub fn caption_field(&self) -> &'static str {
        match self {
            Modality::Visual => "video_caption_en",
            Modality::Speech => "stt_caption",
            Modality::Audio => "audio_caption",
        }
    }
}

/// Caption produced by one modality for one interval.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptionResult {
    pub id: String,
    pub interval: Interval,
    pub caption: Option<String>,
}

impl CaptionResult {
    /// Placeholder for a scene a modality's service failed or skipped.
    pub fn missing(id: impl Into<String>, interval: Interval) -> Self {
        Self {
            id: id.into(),
            interval,
            caption: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Segment {
    #[serde(rename = "video_id")]
    pub id: String,
    #[serde(rename = "timestamps")]
    pub interval: Interval,
    /// First caller window this segment overlapped, when windows were given.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window: Option<Interval>,
    #[serde(rename = "video_caption", skip_serializing_if = "Option::is_none")]
    pub visual_caption: Option<String>,
    #[serde(rename = "stt_caption", skip_serializing_if = "Option::is_none")]
    pub speech_caption: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_caption: Option<String>,
    #[serde(
        rename = "video_caption_translated",
        skip_serializing_if = "Option::is_none"
    )]
    pub visual_caption_translated: Option<String>,
    #[serde(
        rename = "stt_caption_translated",
        skip_serializing_if = "Option::is_none"
    )]
    pub speech_caption_translated: Option<String>,
}

impl Segment {
    pub fn has_caption(&self) -> bool {
        self.visual_caption.is_some() || self.speech_caption.is_some() || self.audio_caption.is_some()
    }
}

/// Result of processing one video.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedVideo {
    pub video_id: String,
    pub video_path: String,
    pub segments: Vec<Segment>,
}
