use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde_json::{Value, json};

use crate::{
    clients::http::{HttpClient, endpoint_url},
    error::Result,
    interval::Interval,
    normalize::RawResultSet,
};

/// The two collections the vector index keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    /// Visual captions.
    Visual,
    /// Speech transcripts.
    Speech,
}

impl Collection {
    pub fn source_name(&self) -> &'static str {
        match self {
            Collection::Visual => "visual",
            Collection::Speech => "speech",
        }
    }

    fn query_path(&self) -> &'static str {
        match self {
            Collection::Visual => "/query",
            Collection::Speech => "/query_audio",
        }
    }

    fn add_path(&self) -> &'static str {
        match self {
            Collection::Visual => "/add_json",
            Collection::Speech => "/add_json_audio",
        }
    }

    /// Caption field stored with each document.
    pub fn caption_field(&self) -> &'static str {
        match self {
            Collection::Visual => "video_caption_eng",
            Collection::Speech => "stt_caption_eng",
        }
    }
}

/// One captioned segment pushed into a collection.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexDocument {
    pub video_id: String,
    pub interval: Interval,
    pub caption: String,
    pub video_path: String,
}

impl IndexDocument {
    pub fn to_json(&self, collection: Collection) -> Value {
        let mut segment = json!({
            "timestamps": {
                "start": self.interval.start(),
                "end": self.interval.end(),
            },
            "video_id": self.video_id,
        });
        segment[collection.caption_field()] = Value::String(self.caption.clone());

        json!({
            "segments": segment,
            "video_path": self.video_path,
        })
    }
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Similarity lookup. Always answers in the batched shape.
    async fn query(&self, collection: Collection, text: &str) -> Result<RawResultSet>;

    async fn add(&self, collection: Collection, documents: &[IndexDocument]) -> Result<()>;
}

pub struct HttpVectorIndex {
    http: HttpClient,
    base_url: String,
}

impl HttpVectorIndex {
    pub fn new(http: HttpClient, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl VectorIndex for HttpVectorIndex {
    async fn query(&self, collection: Collection, text: &str) -> Result<RawResultSet> {
        let url = endpoint_url(&self.base_url, collection.query_path());
        let body: Value = self
            .http
            .post_json("vector_index", &url, &json!({ "input_text": text }))
            .await?;
        Ok(RawResultSet::batched_from_value(collection.source_name(), body)?)
    }

    async fn add(&self, collection: Collection, documents: &[IndexDocument]) -> Result<()> {
        if documents.is_empty() {
            return Ok(());
        }

        let url = endpoint_url(&self.base_url, collection.add_path());
        let payload = serde_json::to_string(
            &documents
                .iter()
                .map(|doc| doc.to_json(collection))
                .collect::<Vec<_>>(),
        )?;

        // Multipart forms are consumed on send, so each attempt builds its own.
        self.http
            .send("vector_index", || {
                let part = Part::text(payload.clone()).file_name("segments.json");
                self.http
                    .client()
                    .post(&url)
                    .multipart(Form::new().part("file", part))
            })
            .await?;

        tracing::debug!(
            collection = collection.source_name(),
            count = documents.len(),
            "indexed documents"
        );
        Ok(())
    }
}
