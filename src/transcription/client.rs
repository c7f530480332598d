use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::LOCATION;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use super::error::SubmitError;
use super::types::{TranscriptionDefinition, TranscriptionProperties};
use super::TranscriptionService;

const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";
const API_PATH: &str = "speechtotext/v3.0/";

/// Client for the batch transcription REST API (v3.0).
#[derive(Clone)]
pub struct SpeechBatchClient {
    http: Client,
    endpoint: Url,
    key: SecretString,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireDefinition<'a> {
    display_name: &'a str,
    description: &'a str,
    locale: &'a str,
    content_urls: &'a [Url],
    properties: TranscriptionProperties,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<WireEntityReference>,
}

#[derive(Serialize)]
struct WireEntityReference {
    #[serde(rename = "self")]
    self_url: String,
}

#[derive(Deserialize)]
struct WireCreated {
    #[serde(rename = "self")]
    self_url: Option<String>,
}

impl SpeechBatchClient {
    /// `endpoint` is the resource endpoint, e.g.
    /// `https://westeurope.api.cognitive.microsoft.com/`. A trailing `/` is
    /// added when missing.
    pub fn new(endpoint: &Url, key: SecretString, timeout: Duration) -> Result<Self, SubmitError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SubmitError::InvalidRequest(format!("http client: {e}")))?;

        Ok(Self {
            http,
            endpoint: normalize_endpoint(endpoint),
            key,
        })
    }

    fn api_url(&self, relative: &str) -> Result<Url, SubmitError> {
        self.endpoint
            .join(API_PATH)
            .and_then(|base| base.join(relative))
            .map_err(|e| SubmitError::InvalidRequest(format!("bad endpoint URL: {e}")))
    }

    /// Reference URL of a custom model on this endpoint.
    pub fn model_url(&self, model: Uuid) -> Result<Url, SubmitError> {
        self.api_url(&format!("models/{model}"))
    }
}

#[async_trait]
impl TranscriptionService for SpeechBatchClient {
    async fn submit(&self, definition: &TranscriptionDefinition) -> Result<Url, SubmitError> {
        let model = definition
            .model
            .map(|id| self.model_url(id))
            .transpose()?
            .map(|url| WireEntityReference {
                self_url: url.to_string(),
            });

        let body = WireDefinition {
            display_name: &definition.display_name,
            description: &definition.description,
            locale: &definition.locale,
            content_urls: &definition.content_urls,
            properties: definition.properties,
            model,
        };

        tracing::debug!(
            job = %definition.display_name,
            files = definition.content_urls.len(),
            "posting transcription job"
        );

        let response = self
            .http
            .post(self.api_url("transcriptions")?)
            .header(SUBSCRIPTION_KEY_HEADER, self.key.expose_secret())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SubmitError::Status {
                status: status.as_u16(),
                message,
            });
        }

        if let Some(location) = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
        {
            return Url::parse(location)
                .map_err(|e| SubmitError::MalformedResponse(format!("location '{location}': {e}")));
        }

        let created: WireCreated = response.json().await?;
        let self_url = created
            .self_url
            .ok_or_else(|| SubmitError::MalformedResponse("no job location in response".into()))?;
        Url::parse(&self_url)
            .map_err(|e| SubmitError::MalformedResponse(format!("location '{self_url}': {e}")))
    }
}

fn normalize_endpoint(endpoint: &Url) -> Url {
    let mut url = endpoint.clone();
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
