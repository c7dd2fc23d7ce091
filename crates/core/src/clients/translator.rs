use async_trait::async_trait;
use serde::Deserialize;

use crate::{
    clients::http::HttpClient,
    config::TranslationConfig,
    error::{Result, ScenesearchError},
};

#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str) -> Result<String>;
}

#[derive(Deserialize)]
struct TranslateResponse {
    #[serde(default)]
    translations: Vec<Translation>,
}

#[derive(Deserialize)]
struct Translation {
    text: String,
}

/// DeepL-compatible `/v2/translate` client.
pub struct DeeplTranslator {
    http: HttpClient,
    url: String,
    api_key: String,
    languages: TranslationConfig,
}

impl DeeplTranslator {
    pub fn new(
        http: HttpClient,
        url: impl Into<String>,
        api_key: impl Into<String>,
        languages: TranslationConfig,
    ) -> Self {
        Self {
            http,
            url: url.into(),
            api_key: api_key.into(),
            languages,
        }
    }
}

#[async_trait]
impl Translator for DeeplTranslator {
    async fn translate(&self, text: &str) -> Result<String> {
        let form = [
            ("text", text),
            ("source_lang", self.languages.source_lang.as_str()),
            ("target_lang", self.languages.target_lang.as_str()),
        ];
        let auth = format!("DeepL-Auth-Key {}", self.api_key);

        let response: TranslateResponse = self
            .http
            .send("translator", || {
                self.http
                    .client()
                    .post(&self.url)
                    .header(reqwest::header::AUTHORIZATION, &auth)
                    .form(&form)
            })
            .await?
            .json()
            .await?;

        response
            .translations
            .into_iter()
            .next()
            .map(|t| t.text)
            .ok_or_else(|| ScenesearchError::InvalidResponse {
                service: "translator".to_string(),
                reason: "no translations returned".to_string(),
            })
    }
}
