use reqwest::{RequestBuilder, Response};
use serde::{Serialize, de::DeserializeOwned};

use crate::{
    config::HttpPolicy,
    error::{Result, ScenesearchError},
};

/// Largest upstream error body kept in an error message.
const MAX_ERROR_BODY: usize = 512;

/// `reqwest::Client` with the configured timeout and a bounded retry
/// budget for transient failures.
#[derive(Clone, Debug)]
pub struct HttpClient {
    inner: reqwest::Client,
    policy: HttpPolicy,
}

impl HttpClient {
    pub fn new(policy: HttpPolicy) -> Result<Self> {
        let inner = reqwest::Client::builder()
            .timeout(policy.timeout())
            .build()?;
        Ok(Self { inner, policy })
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.inner
    }

    /// POST a JSON body and decode a JSON response.
    pub async fn post_json<B, R>(&self, service: &str, url: &str, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self
            .send(service, || self.inner.post(url).json(body))
            .await?;
        Ok(response.json::<R>().await?)
    }

    /// Send the request built by `build`, rebuilding it for each attempt.
    ///
    /// Connection errors, timeouts and 5xx responses are retried up to
    /// `max_retries` times. Any other non-success status fails at once.
    pub async fn send<F>(&self, service: &str, build: F) -> Result<Response>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut attempt: u32 = 0;

        loop {
            let outcome = build().send().await;

            let retryable = match &outcome {
                Ok(response) => response.status().is_server_error(),
                Err(e) => e.is_timeout() || e.is_connect(),
            };

            if retryable && attempt < self.policy.max_retries {
                attempt += 1;
                let delay = self.policy.backoff(attempt);
                match &outcome {
                    Ok(response) => tracing::warn!(
                        service,
                        status = response.status().as_u16(),
                        attempt,
                        ?delay,
                        "upstream error, retrying"
                    ),
                    Err(e) => tracing::warn!(
                        service,
                        error = %e,
                        attempt,
                        ?delay,
                        "request failed, retrying"
                    ),
                }
                tokio::time::sleep(delay).await;
                continue;
            }

            let response = outcome?;
            let status = response.status();
            if status.is_success() {
                return Ok(response);
            }

            let mut body = response.text().await.unwrap_or_default();
            if body.len() > MAX_ERROR_BODY {
                let cut = (0..=MAX_ERROR_BODY)
                    .rev()
                    .find(|&i| body.is_char_boundary(i))
                    .unwrap_or(0);
                body.truncate(cut);
            }
            return Err(ScenesearchError::UpstreamStatus {
                service: service.to_string(),
                status: status.as_u16(),
                body,
            });
        }
    }
}

/// Join a base URL and a path without doubling slashes.
pub fn endpoint_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
