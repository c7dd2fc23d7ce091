use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::{
    clients::http::{HttpClient, endpoint_url},
    error::{Result, ScenesearchError},
    interval::Interval,
};

#[async_trait]
pub trait SceneDetector: Send + Sync {
    /// Scene boundaries of the whole video, in playback order.
    async fn detect(&self, video_path: &str) -> Result<Vec<Interval>>;
}

#[derive(Deserialize)]
struct DetectResponse {
    #[serde(default)]
    scenes: Vec<(f64, f64)>,
}

pub struct HttpSceneDetector {
    http: HttpClient,
    url: String,
}

impl HttpSceneDetector {
    pub fn new(http: HttpClient, base_url: &str) -> Self {
        Self {
            http,
            url: endpoint_url(base_url, "/detect"),
        }
    }
}

#[async_trait]
impl SceneDetector for HttpSceneDetector {
    async fn detect(&self, video_path: &str) -> Result<Vec<Interval>> {
        let response: DetectResponse = self
            .http
            .post_json("scene_detector", &self.url, &json!({ "video_path": video_path }))
            .await?;

        response
            .scenes
            .into_iter()
            .map(|(start, end)| {
                Interval::new(start, end).map_err(|e| ScenesearchError::InvalidResponse {
                    service: "scene_detector".to_string(),
                    reason: e.to_string(),
                })
            })
            .collect()
    }
}
