use std::sync::Arc;

use crate::{
    clients::{
        DeeplTranslator, HttpCaptioner, HttpClient, HttpQueryAnalyzer, HttpSceneDetector,
        HttpVectorIndex, Translator, VectorIndex,
    },
    config::EngineConfig,
    error::Result,
    metadata::{MetadataStore, open_store},
    process::{Captioners, ProcessPipeline},
    search::SearchEngine,
    types::Modality,
};

/// The search engine and processing pipeline wired to the configured
/// collaborators.
pub struct Services {
    pub search: SearchEngine,
    pub process: ProcessPipeline,
}

impl Services {
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        let http = HttpClient::new(config.http.clone())?;
        let endpoints = &config.endpoints;

        let vector_index: Arc<dyn VectorIndex> =
            Arc::new(HttpVectorIndex::new(http.clone(), endpoints.vector_index.clone()));

        let metadata: Option<Arc<dyn MetadataStore>> = match &config.metadata_db {
            Some(path) => {
                let store: Arc<dyn MetadataStore> = Arc::new(open_store(path)?);
                Some(store)
            }
            None => {
                tracing::info!("metadata_db not set, metadata source disabled");
                None
            }
        };

        let search = SearchEngine::new(
            vector_index.clone(),
            metadata,
            Arc::new(HttpQueryAnalyzer::new(http.clone(), &endpoints.query_analyzer)),
        );

        let captioners = Captioners {
            visual: Arc::new(HttpCaptioner::new(
                Modality::Visual,
                http.clone(),
                &endpoints.visual_captioner,
            )),
            speech: Arc::new(HttpCaptioner::new(
                Modality::Speech,
                http.clone(),
                &endpoints.speech_captioner,
            )),
            audio: Arc::new(HttpCaptioner::new(
                Modality::Audio,
                http.clone(),
                &endpoints.audio_captioner,
            )),
        };

        let mut process = ProcessPipeline::new(
            Arc::new(HttpSceneDetector::new(http.clone(), &endpoints.scene_detector)),
            captioners,
            config.clips_dir.clone(),
        );

        match EngineConfig::translator_api_key() {
            Ok(key) => {
                let translator: Arc<dyn Translator> = Arc::new(DeeplTranslator::new(
                    http.clone(),
                    endpoints.translator.clone(),
                    key,
                    config.translation.clone(),
                ));
                process = process.with_translator(translator);
            }
            Err(e) => tracing::warn!("{e}; translation disabled"),
        }

        if config.index_processed_segments {
            process = process.with_indexer(vector_index);
        }

        Ok(Self { search, process })
    }
}
