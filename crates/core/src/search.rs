use std::sync::Arc;

use crate::{
    clients::{Collection, QueryAnalysis, QueryAnalyzer, VectorIndex},
    error::{Result, ScenesearchError},
    metadata::MetadataStore,
    normalize::{NormalizedSource, RawResultSet, normalize},
    ranking::rank,
    types::RankedEntry,
};

/// What each source is asked. `None` skips the source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchPlan {
    pub visual: Option<String>,
    pub speech: Option<String>,
    pub keywords: Vec<String>,
}

impl SearchPlan {
    /// Query both vector collections with the raw text and skip metadata.
    pub fn raw_text(text: &str) -> Self {
        Self {
            visual: Some(text.to_string()),
            speech: Some(text.to_string()),
            keywords: Vec::new(),
        }
    }

    pub fn from_analysis(analysis: &QueryAnalysis) -> Self {
        Self {
            visual: analysis.video_text(),
            speech: analysis.speech_text(),
            keywords: analysis.unique_keywords().to_vec(),
        }
    }
}

pub struct SearchEngine {
    vector_index: Arc<dyn VectorIndex>,
    metadata: Option<Arc<dyn MetadataStore>>,
    analyzer: Arc<dyn QueryAnalyzer>,
}

impl SearchEngine {
    pub fn new(
        vector_index: Arc<dyn VectorIndex>,
        metadata: Option<Arc<dyn MetadataStore>>,
        analyzer: Arc<dyn QueryAnalyzer>,
    ) -> Self {
        Self {
            vector_index,
            metadata,
            analyzer,
        }
    }

    /// Answer a free-text query with a ranked list of segments and movies.
    pub async fn search(&self, text: &str) -> Result<Vec<RankedEntry>> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ScenesearchError::invalid_request("search text must not be blank"));
        }

        let plan = self.plan(text).await;
        tracing::info!(
            visual = plan.visual.is_some(),
            speech = plan.speech.is_some(),
            keywords = plan.keywords.len(),
            "searching"
        );

        let (visual, speech, meta) = tokio::join!(
            self.query_collection(Collection::Visual, plan.visual.as_deref()),
            self.query_collection(Collection::Speech, plan.speech.as_deref()),
            self.query_metadata(&plan.keywords),
        );

        let results = rank(&visual, &speech, &meta);
        tracing::info!(count = results.len(), "search complete");
        Ok(results)
    }

    async fn plan(&self, text: &str) -> SearchPlan {
        match self.analyzer.analyze(text).await {
            Ok(analysis) if !analysis.is_empty() => SearchPlan::from_analysis(&analysis),
            Ok(_) => {
                tracing::info!("query analysis is empty, searching with raw text");
                SearchPlan::raw_text(text)
            }
            Err(e) => {
                tracing::warn!(error = %e, "query analysis failed, searching with raw text");
                SearchPlan::raw_text(text)
            }
        }
    }

    async fn query_collection(&self, collection: Collection, text: Option<&str>) -> NormalizedSource {
        let Some(text) = text else {
            return NormalizedSource::default();
        };
        let source = collection.source_name();
        let raw = self.vector_index.query(collection, text).await;
        normalize_or_empty(source, raw)
    }

    async fn query_metadata(&self, keywords: &[String]) -> NormalizedSource {
        if keywords.is_empty() {
            return NormalizedSource::default();
        }
        let Some(store) = &self.metadata else {
            tracing::debug!("no metadata store configured");
            return NormalizedSource::default();
        };
        normalize_or_empty("metadata", store.search(keywords).await)
    }
}

/// A failed or malformed source counts as an empty one.
fn normalize_or_empty(source: &'static str, raw: Result<RawResultSet>) -> NormalizedSource {
    let raw = match raw {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!(source, error = %e, "search source failed");
            return NormalizedSource::default();
        }
    };

    match normalize(source, raw) {
        Ok(normalized) => normalized,
        Err(e) => {
            tracing::warn!(source, error = %e, "malformed search source payload");
            NormalizedSource::default()
        }
    }
}
