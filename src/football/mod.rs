//! HTTP client for the upstream football data API.
//!
//! Every endpoint shares one response envelope, `{results, errors, response}`.
//! The API reports request-level problems inside `errors` while still
//! answering 200, so a non-empty `errors` field is a failure regardless of
//! HTTP status. Responses are returned as opaque JSON; the caching layer
//! decides how long they live.

pub mod errors;
pub mod json;
pub mod models;

use std::collections::BTreeMap;
use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use crate::config::Config;
pub use errors::FootballApiError;

/// Header carrying the API key on every upstream request.
const API_KEY_HEADER: &str = "x-apisports-key";

pub struct FootballApi {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl FootballApi {
    /// Build the client from configuration. A missing API key is not fatal
    /// here — the service can boot without one — but every fetch will fail
    /// with [`FootballApiError::MissingApiKey`] until it is provided.
    pub fn from_config(config: &Config) -> Result<Self, anyhow::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.upstream_timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            base_url: config.football_api_base_url.trim_end_matches('/').to_owned(),
            api_key: config.football_api_key.clone(),
        })
    }

    /// Perform a GET against an upstream endpoint and return the full
    /// response envelope as opaque JSON.
    pub async fn get(
        &self,
        endpoint: &str,
        params: &BTreeMap<String, String>,
    ) -> Result<Value, FootballApiError> {
        let api_key = self.api_key.as_deref().ok_or(FootballApiError::MissingApiKey)?;
        let url = format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'));

        debug!(endpoint, params = ?params, "fetching from upstream");

        let response = self
            .client
            .get(&url)
            .header(API_KEY_HEADER, api_key)
            .query(params)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(FootballApiError::Upstream {
                status: status.as_u16(),
                message: truncate(&body, 200),
            });
        }

        let payload: Value = json::decode_with_path(&body).map_err(FootballApiError::Decode)?;

        if let Some(message) = envelope_error(&payload) {
            return Err(FootballApiError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        Ok(payload)
    }
}

/// Extract a message from a non-empty `errors` envelope field.
///
/// The upstream serializes "no errors" as an empty array, and actual errors
/// as either an object of `{field: message}` pairs or an array of strings.
fn envelope_error(payload: &Value) -> Option<String> {
    match payload.get("errors")? {
        Value::Array(items) if !items.is_empty() => Some(
            items
                .iter()
                .map(value_message)
                .collect::<Vec<_>>()
                .join("; "),
        ),
        Value::Object(map) if !map.is_empty() => Some(
            map.iter()
                .map(|(field, message)| format!("{field}: {}", value_message(message)))
                .collect::<Vec<_>>()
                .join("; "),
        ),
        _ => None,
    }
}

fn value_message(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn truncate(body: &str, max: usize) -> String {
    let mut end = max.min(body.len());
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    body[..end].to_owned()
}
