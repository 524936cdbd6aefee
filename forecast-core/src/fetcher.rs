use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use serde_json::Value;
use std::{error::Error as _, fmt::Debug};
use tracing::{debug, info, warn};

use crate::{
    error::FetchError,
    error_reason::parse_invalid_parameter,
    model::{ForecastRequest, ForecastResponse},
};

pub const DEFAULT_BASE_URL: &str = "https://api.open-meteo.com/v1/forecast";

/// Something that can turn a [`ForecastRequest`] into a raw forecast document.
#[async_trait]
pub trait ForecastSource: Send + Sync + Debug {
    async fn fetch(&self, request: &ForecastRequest) -> Result<ForecastResponse, FetchError>;
}

/// Open-Meteo style HTTP forecast endpoint.
#[derive(Debug, Clone)]
pub struct ForecastFetcher {
    base_url: Url,
    http: Client,
}

impl ForecastFetcher {
    pub fn new(base_url: Url) -> Self {
        Self { base_url, http: Client::new() }
    }

    pub fn from_base_url(base_url: &str) -> anyhow::Result<Self> {
        let url = Url::parse(base_url)
            .with_context(|| format!("Invalid forecast API base URL: {base_url}"))?;
        Ok(Self::new(url))
    }

    /// Full request URL, query string included.
    pub fn endpoint(&self, request: &ForecastRequest) -> Url {
        let mut url = self.base_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("latitude", &request.latitude.to_string())
                .append_pair("longitude", &request.longitude.to_string())
                .append_pair("hourly", &request.hourly.join(","))
                .append_pair("models", &request.models)
                .append_pair("timeformat", "unixtime");

            // form encoding turns the '/' in timezone names into %2F
            for (key, value) in &request.extras {
                query.append_pair(key, &value.to_string());
            }
        }
        url
    }
}

#[async_trait]
impl ForecastSource for ForecastFetcher {
    async fn fetch(&self, request: &ForecastRequest) -> Result<ForecastResponse, FetchError> {
        let url = self.endpoint(request);
        info!(%url, timeout = ?request.timeout, "requesting forecast");

        let res = self
            .http
            .get(url)
            .timeout(request.timeout)
            .send()
            .await
            .map_err(|e| transport_error(&e, request))?;

        let status = res.status();
        let body = res.text().await.map_err(|e| transport_error(&e, request))?;

        if !status.is_success() {
            let err = classify_error_body(status, &body);
            warn!(%status, error = %err, "forecast request rejected");
            return Err(err);
        }

        let value: Value = serde_json::from_str(&body).map_err(|e| {
            FetchError::network(format!("malformed response body: {e}"))
        })?;

        debug!(bytes = body.len(), "forecast received");
        ForecastResponse::from_value(value)
            .ok_or_else(|| FetchError::network("response body is not a JSON object"))
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    reason: Option<String>,
}

/// Maps a non-success status and its body onto the fetch error taxonomy.
fn classify_error_body(status: StatusCode, body: &str) -> FetchError {
    let parsed: ApiErrorBody = match serde_json::from_str(body) {
        Ok(parsed) => parsed,
        Err(_) => {
            return FetchError::network(format!("HTTP {status}: {}", truncate_body(body)));
        }
    };

    match parsed.reason {
        Some(reason) => match parse_invalid_parameter(&reason) {
            Some(bad) => FetchError::InvalidParameter {
                parameter: bad.value,
                query_key: bad.query_key,
            },
            None => FetchError::Api { reason },
        },
        None => FetchError::Api { reason: format!("HTTP {status}") },
    }
}

fn transport_error(err: &reqwest::Error, request: &ForecastRequest) -> FetchError {
    if err.is_timeout() {
        return FetchError::network(format!("request timed out after {:?}", request.timeout));
    }

    let mut detail = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        detail.push_str(": ");
        detail.push_str(&cause.to_string());
        source = cause.source();
    }
    FetchError::network(detail)
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
