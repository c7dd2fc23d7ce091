use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use serde_json::{Value, json};

use crate::{
    clients::http::{HttpClient, endpoint_url},
    error::{Result, ScenesearchError},
    normalize::identifier_text,
};

/// Structured reading of a free-text query.
///
/// The analyzer is an LLM behind a prompt, so the payload is read loosely:
/// both the `*_field` and `*_keywords` spellings are accepted, a field may be
/// a string or a list, and the importance scores may be numbers or lists.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct QueryAnalysis {
    #[serde(alias = "video_keywords", deserialize_with = "string_or_list")]
    pub video_field: Vec<String>,
    #[serde(alias = "stt_keywords", deserialize_with = "string_or_list")]
    pub stt_field: Vec<String>,
    #[serde(alias = "unique_keywords", deserialize_with = "string_or_list")]
    pub unique_field: Vec<String>,

    // Importance scores are parsed but do not influence ranking.
    #[serde(alias = "video_keywords_importance")]
    pub video_field_importance: Option<Value>,
    #[serde(alias = "stt_keywords_importance")]
    pub stt_field_importance: Option<Value>,
    #[serde(alias = "unique_keywords_importance")]
    pub unique_field_importance: Option<Value>,
}

impl QueryAnalysis {
    pub fn is_empty(&self) -> bool {
        self.video_field.is_empty() && self.stt_field.is_empty() && self.unique_field.is_empty()
    }

    /// Text for the visual collection, or `None` when there is none.
    pub fn video_text(&self) -> Option<String> {
        join_non_empty(&self.video_field)
    }

    /// Text for the speech collection: every stt phrase joined by spaces.
    pub fn speech_text(&self) -> Option<String> {
        join_non_empty(&self.stt_field)
    }

    pub fn unique_keywords(&self) -> &[String] {
        &self.unique_field
    }
}

fn join_non_empty(parts: &[String]) -> Option<String> {
    let joined = parts.join(" ");
    let trimmed = joined.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Accept `"text"`, `["a", "b"]` or `null`. Blank items are dropped.
fn string_or_list<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let items = match value {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        other => vec![other],
    };

    Ok(items
        .iter()
        .filter_map(identifier_text)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect())
}

#[async_trait]
pub trait QueryAnalyzer: Send + Sync {
    async fn analyze(&self, text: &str) -> Result<QueryAnalysis>;
}

pub struct HttpQueryAnalyzer {
    http: HttpClient,
    url: String,
}

impl HttpQueryAnalyzer {
    pub fn new(http: HttpClient, base_url: &str) -> Self {
        Self {
            http,
            url: endpoint_url(base_url, "/analyze_query"),
        }
    }
}

#[async_trait]
impl QueryAnalyzer for HttpQueryAnalyzer {
    async fn analyze(&self, text: &str) -> Result<QueryAnalysis> {
        let mut body: Value = self
            .http
            .post_json("query_analyzer", &self.url, &json!({ "query_text": text }))
            .await?;

        let result = match body.get_mut("result").map(Value::take) {
            Some(Value::Object(map)) => Value::Object(map),
            // Some analyzer builds return the JSON object as a string.
            Some(Value::String(raw)) => serde_json::from_str(&raw)?,
            Some(Value::Null) | None => Value::Object(Default::default()),
            Some(other) => {
                return Err(ScenesearchError::InvalidResponse {
                    service: "query_analyzer".to_string(),
                    reason: format!("`result` is not an object: {other}"),
                });
            }
        };

        Ok(serde_json::from_value(result)?)
    }
}
