use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use futures::stream::{self, StreamExt};
use serde::Deserialize;

use crate::{
    assemble::assemble,
    clients::{
        Captioner, Collection, IndexDocument, SceneDetector, Translator, VectorIndex, video_stem,
    },
    error::{Result, ScenesearchError},
    interval::{Interval, OverlapMode, filter_overlapping, first_overlapping_window},
    types::{CaptionResult, ProcessedVideo, Segment},
};

/// Segments translated at the same time.
const TRANSLATE_CONCURRENCY: usize = 8;

/// A request to caption one video, optionally restricted to time windows.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ProcessRequest {
    pub video_id: Option<String>,
    pub video_path: Option<String>,
    #[serde(alias = "windows")]
    pub timestamps: Vec<Interval>,
    pub translate: bool,
}

/// The three caption services, one per modality.
pub struct Captioners {
    pub visual: Arc<dyn Captioner>,
    pub speech: Arc<dyn Captioner>,
    pub audio: Arc<dyn Captioner>,
}

pub struct ProcessPipeline {
    detector: Arc<dyn SceneDetector>,
    captioners: Captioners,
    translator: Option<Arc<dyn Translator>>,
    indexer: Option<Arc<dyn VectorIndex>>,
    clips_dir: PathBuf,
}

impl ProcessPipeline {
    pub fn new(
        detector: Arc<dyn SceneDetector>,
        captioners: Captioners,
        clips_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            detector,
            captioners,
            translator: None,
            indexer: None,
            clips_dir: clips_dir.into(),
        }
    }

    pub fn with_translator(mut self, translator: Arc<dyn Translator>) -> Self {
        self.translator = Some(translator);
        self
    }

    /// Push processed captions back into the vector index.
    pub fn with_indexer(mut self, indexer: Arc<dyn VectorIndex>) -> Self {
        self.indexer = Some(indexer);
        self
    }

    pub async fn process(&self, request: &ProcessRequest) -> Result<ProcessedVideo> {
        let (video_id, video_path) = self.resolve_video(request)?;
        let windows = &request.timestamps;

        tracing::info!(%video_id, %video_path, windows = windows.len(), "processing video");

        let detected = self.detector.detect(&video_path).await?;
        let intervals = if windows.is_empty() {
            detected
        } else {
            filter_overlapping(&detected, windows, OverlapMode::WindowExpansion)
        };
        if intervals.is_empty() {
            return Err(ScenesearchError::NoScenesInRange);
        }
        tracing::debug!(count = intervals.len(), "dispatching captioning");

        let (visual, speech, audio) = tokio::join!(
            self.captioners.visual.caption(&video_path, &intervals),
            self.captioners.speech.caption(&video_path, &intervals),
            self.captioners.audio.caption(&video_path, &intervals),
        );
        let visual = visual?;
        let speech = or_missing(self.captioners.speech.as_ref(), speech, &video_id, &intervals);
        let audio = or_missing(self.captioners.audio.as_ref(), audio, &video_id, &intervals);

        let mut segments = assemble(visual, speech, audio)?;

        if !windows.is_empty() {
            segments = keep_in_windows(segments, windows);
        }

        segments.retain(|segment| {
            if !segment.has_caption() {
                tracing::warn!(segment = %segment.id, "dropping segment without any caption");
            }
            segment.has_caption()
        });

        if request.translate {
            match &self.translator {
                Some(translator) => translate_segments(translator.as_ref(), &mut segments).await,
                None => tracing::warn!("translation requested but no translator is configured"),
            }
        }

        if let Some(indexer) = &self.indexer {
            index_segments(indexer.as_ref(), &video_id, &video_path, &segments).await;
        }

        tracing::info!(%video_id, segments = segments.len(), "video processed");

        Ok(ProcessedVideo {
            video_id,
            video_path,
            segments,
        })
    }

    fn resolve_video(&self, request: &ProcessRequest) -> Result<(String, String)> {
        let video_id = request.video_id.as_deref().map(str::trim).filter(|s| !s.is_empty());
        let video_path = request.video_path.as_deref().map(str::trim).filter(|s| !s.is_empty());

        match (video_id, video_path) {
            (id, Some(path)) => Ok((
                id.map(str::to_string).unwrap_or_else(|| video_stem(path)),
                path.to_string(),
            )),
            (Some(id), None) => Ok((id.to_string(), clip_path(&self.clips_dir, id))),
            (None, None) => Err(ScenesearchError::invalid_request(
                "either video_id or video_path is required",
            )),
        }
    }
}

fn clip_path(clips_dir: &Path, video_id: &str) -> String {
    clips_dir
        .join(format!("{video_id}.mp4"))
        .to_string_lossy()
        .into_owned()
}

/// Line an optional modality's results up with `intervals`. A failed call,
/// or any interval the service skipped, gets a caption-less placeholder.
fn or_missing(
    captioner: &dyn Captioner,
    outcome: Result<Vec<CaptionResult>>,
    video_id: &str,
    intervals: &[Interval],
) -> Vec<CaptionResult> {
    let modality = captioner.modality().name();
    let mut results: Vec<Option<CaptionResult>> = match outcome {
        Ok(results) => results.into_iter().map(Some).collect(),
        Err(e) => {
            tracing::warn!(modality, error = %e, "captioning failed, continuing without it");
            Vec::new()
        }
    };
    let failed = results.is_empty();

    intervals
        .iter()
        .enumerate()
        .map(|(i, interval)| {
            let found = results
                .iter_mut()
                .find(|r| r.as_ref().is_some_and(|r| r.interval.same_bounds(interval)))
                .and_then(Option::take);
            found.unwrap_or_else(|| {
                if !failed {
                    tracing::warn!(
                        modality,
                        start = interval.start(),
                        end = interval.end(),
                        "no caption returned for scene"
                    );
                }
                CaptionResult::missing(format!("{video_id}_{i}"), *interval)
            })
        })
        .collect()
}

/// Keep each segment at most once, tagged with the first window it overlaps.
fn keep_in_windows(segments: Vec<Segment>, windows: &[Interval]) -> Vec<Segment> {
    segments
        .into_iter()
        .filter_map(|mut segment| {
            let window = first_overlapping_window(&segment.interval, windows)?;
            segment.window = Some(window);
            Some(segment)
        })
        .collect()
}

async fn translate_segments(translator: &dyn Translator, segments: &mut [Segment]) {
    stream::iter(segments.iter_mut())
        .for_each_concurrent(TRANSLATE_CONCURRENCY, |segment| async move {
            if let Some(caption) = &segment.visual_caption {
                segment.visual_caption_translated =
                    translate_or_skip(translator, &segment.id, caption).await;
            }
            if let Some(caption) = &segment.speech_caption {
                segment.speech_caption_translated =
                    translate_or_skip(translator, &segment.id, caption).await;
            }
        })
        .await;
}

async fn translate_or_skip(translator: &dyn Translator, segment_id: &str, text: &str) -> Option<String> {
    match translator.translate(text).await {
        Ok(translated) => Some(translated),
        Err(e) => {
            tracing::warn!(segment = %segment_id, error = %e, "translation failed");
            None
        }
    }
}

/// Documents for `collection`, numbered `<video_id>_<n>` in output order.
pub fn index_documents(
    collection: Collection,
    video_id: &str,
    video_path: &str,
    segments: &[Segment],
) -> Vec<IndexDocument> {
    segments
        .iter()
        .filter_map(|segment| {
            let caption = match collection {
                Collection::Visual => segment.visual_caption.as_ref(),
                Collection::Speech => segment.speech_caption.as_ref(),
            };
            caption.map(|caption| (segment, caption))
        })
        .enumerate()
        .map(|(n, (segment, caption))| IndexDocument {
            video_id: format!("{video_id}_{n}"),
            interval: segment.interval,
            caption: caption.clone(),
            video_path: video_path.to_string(),
        })
        .collect()
}

async fn index_segments(indexer: &dyn VectorIndex, video_id: &str, video_path: &str, segments: &[Segment]) {
    for collection in [Collection::Visual, Collection::Speech] {
        let documents = index_documents(collection, video_id, video_path, segments);
        if let Err(e) = indexer.add(collection, &documents).await {
            tracing::warn!(
                collection = collection.source_name(),
                error = %e,
                "failed to index processed segments"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn iv(start: f64, end: f64) -> Interval {
        Interval::new(start, end).expect("valid interval")
    }

    fn segment(id: &str, interval: Interval, visual: Option<&str>, speech: Option<&str>) -> Segment {
        Segment {
            id: id.to_string(),
            interval,
            window: None,
            visual_caption: visual.map(str::to_string),
            speech_caption: speech.map(str::to_string),
            audio_caption: None,
            visual_caption_translated: None,
            speech_caption_translated: None,
        }
    }

    #[test]
    fn request_accepts_windows_alias_and_defaults() {
        let request: ProcessRequest = serde_json::from_value(json!({
            "video_id": "abc",
            "windows": [{"start": 1.0, "end": 2.0}]
        }))
        .expect("valid request");

        assert_eq!(request.timestamps, vec![iv(1.0, 2.0)]);
        assert!(!request.translate);
        assert_eq!(request.video_path, None);
    }

    #[test]
    fn request_rejects_inverted_windows() {
        let parsed = serde_json::from_value::<ProcessRequest>(json!({
            "video_id": "abc",
            "timestamps": [{"start": 5.0, "end": 1.0}]
        }));
        assert!(parsed.is_err());
    }

    #[test]
    fn segments_are_tagged_with_their_first_window() {
        let windows = [iv(0.0, 5.0), iv(4.0, 10.0)];
        let kept = keep_in_windows(
            vec![
                segment("a_0", iv(3.0, 6.0), Some("x"), None),
                segment("a_1", iv(20.0, 30.0), Some("y"), None),
            ],
            &windows,
        );

        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].window, Some(iv(0.0, 5.0)));
    }

    #[test]
    fn index_documents_are_numbered_per_collection() {
        let segments = vec![
            segment("s_0", iv(0.0, 1.0), Some("first"), None),
            segment("s_1", iv(1.0, 2.0), None, Some("hello")),
            segment("s_2", iv(2.0, 3.0), Some("second"), Some("bye")),
        ];

        let visual = index_documents(Collection::Visual, "movie", "/m.mp4", &segments);
        let speech = index_documents(Collection::Speech, "movie", "/m.mp4", &segments);

        let ids = |docs: &[IndexDocument]| docs.iter().map(|d| d.video_id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(&visual), vec!["movie_0", "movie_1"]);
        assert_eq!(visual[1].caption, "second");
        assert_eq!(ids(&speech), vec!["movie_0", "movie_1"]);
        assert_eq!(speech[0].interval, iv(1.0, 2.0));
    }

    #[test]
    fn skipped_and_shifted_optional_results_are_realigned() {
        struct Speech;

        #[async_trait::async_trait]
        impl Captioner for Speech {
            fn modality(&self) -> crate::types::Modality {
                crate::types::Modality::Speech
            }

            async fn caption(&self, _: &str, _: &[Interval]) -> Result<Vec<CaptionResult>> {
                Ok(Vec::new())
            }
        }

        let intervals = [iv(0.0, 4.0), iv(4.0, 8.0), iv(8.0, 12.0)];
        let returned = vec![
            CaptionResult {
                id: "clip_1".into(),
                interval: iv(4.0, 8.0),
                caption: Some("second".into()),
            },
            CaptionResult {
                id: "clip_x".into(),
                interval: iv(20.0, 30.0),
                caption: Some("stray".into()),
            },
        ];

        let aligned = or_missing(&Speech, Ok(returned), "movie", &intervals);

        let captions: Vec<_> = aligned.iter().map(|r| r.caption.as_deref()).collect();
        assert_eq!(captions, vec![None, Some("second"), None]);
        assert_eq!(aligned[0].id, "movie_0");
        assert_eq!(aligned[2].interval, iv(8.0, 12.0));
    }

    #[test]
    fn video_id_resolves_through_clips_dir() {
        assert_eq!(
            clip_path(Path::new("/data/movie_clips"), "abc"),
            "/data/movie_clips/abc.mp4"
        );
    }
}
