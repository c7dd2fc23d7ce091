use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    clients::http::{HttpClient, endpoint_url},
    error::{Result, ScenesearchError},
    interval::Interval,
    normalize::identifier_text,
    types::{CaptionResult, Modality},
};

#[async_trait]
pub trait Captioner: Send + Sync {
    fn modality(&self) -> Modality;

    /// Caption each interval of `video_path`, one result per interval in
    /// request order.
    async fn caption(&self, video_path: &str, intervals: &[Interval]) -> Result<Vec<CaptionResult>>;
}

#[derive(Serialize)]
struct TimestampRequest {
    start_time: f64,
    end_time: f64,
}

#[derive(Serialize)]
struct CaptionRequest<'a> {
    video_path: &'a str,
    timestamps: Vec<TimestampRequest>,
}

#[derive(Deserialize)]
struct CaptionResponse {
    #[serde(default)]
    segments: Vec<Map<String, Value>>,
}

/// Caption server for one modality, reached through `POST /entire_video`.
pub struct HttpCaptioner {
    modality: Modality,
    http: HttpClient,
    url: String,
}

impl HttpCaptioner {
    pub fn new(modality: Modality, http: HttpClient, base_url: &str) -> Self {
        Self {
            modality,
            http,
            url: endpoint_url(base_url, "/entire_video"),
        }
    }

    fn service(&self) -> String {
        format!("{}_captioner", self.modality.name())
    }

    fn parse_segment(
        &self,
        index: usize,
        segment: &Map<String, Value>,
        requested: Option<&Interval>,
        video_stem: &str,
    ) -> Result<CaptionResult> {
        let id = segment
            .get("video_id")
            .and_then(identifier_text)
            .unwrap_or_else(|| format!("{video_stem}_{index}"));

        let interval = match segment.get("timestamps") {
            Some(value) => Interval::deserialize(value).map_err(|e| {
                ScenesearchError::InvalidResponse {
                    service: self.service(),
                    reason: format!("segment {index}: {e}"),
                }
            })?,
            None => *requested.ok_or_else(|| ScenesearchError::InvalidResponse {
                service: self.service(),
                reason: format!("segment {index} has no timestamps"),
            })?,
        };

        let caption = segment
            .get(self.modality.caption_field())
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(str::to_string);

        if caption.is_none() {
            tracing::warn!(
                modality = self.modality.name(),
                segment = %id,
                "caption missing or empty"
            );
        }

        Ok(CaptionResult {
            id,
            interval,
            caption,
        })
    }
}

#[async_trait]
impl Captioner for HttpCaptioner {
    fn modality(&self) -> Modality {
        self.modality
    }

    async fn caption(&self, video_path: &str, intervals: &[Interval]) -> Result<Vec<CaptionResult>> {
        let request = CaptionRequest {
            video_path,
            timestamps: intervals
                .iter()
                .map(|interval| TimestampRequest {
                    start_time: interval.start(),
                    end_time: interval.end(),
                })
                .collect(),
        };

        let response: CaptionResponse = self
            .http
            .post_json(&self.service(), &self.url, &request)
            .await?;

        let stem = video_stem(video_path);
        response
            .segments
            .iter()
            .enumerate()
            .map(|(index, segment)| self.parse_segment(index, segment, intervals.get(index), &stem))
            .collect()
    }
}

/// File name of `video_path` without its extension.
pub fn video_stem(video_path: &str) -> String {
    Path::new(video_path)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| video_path.to_string())
}
