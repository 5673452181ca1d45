//! HTTP plumbing shared by the provider adapters.

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{ConfigError, ProviderError};

use super::ProviderKind;

/// `custom` key that redirects any adapter to another base URL.
pub const BASE_URL_KEY: &str = "base_url";

/// Build a client owned by one provider instance.
///
/// Static headers (auth, version, attribution) are baked in here so that
/// malformed values fail at construction time instead of inside the retry loop.
pub fn build_client(
    timeout: Duration,
    headers: &[(&'static str, String)],
) -> Result<reqwest::Client, ConfigError> {
    let mut map = HeaderMap::new();
    map.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    for (name, value) in headers {
        let mut header_value =
            HeaderValue::from_str(value).map_err(|_| ConfigError::InvalidHeader {
                name: (*name).to_string(),
            })?;
        if name.eq_ignore_ascii_case("authorization") || name.eq_ignore_ascii_case("x-api-key") {
            header_value.set_sensitive(true);
        }
        map.insert(HeaderName::from_static(name), header_value);
    }

    reqwest::Client::builder()
        .timeout(timeout)
        .default_headers(map)
        .build()
        .map_err(ConfigError::HttpClient)
}

/// Endpoint URL: `base_url` override joined with `path`, or the vendor default.
pub fn endpoint(custom: &BTreeMap<String, String>, default_base: &str, path: &str) -> String {
    let base = custom
        .get(BASE_URL_KEY)
        .map(String::as_str)
        .filter(|b| !b.is_empty())
        .unwrap_or(default_base);
    format!("{}{}", base.trim_end_matches('/'), path)
}

/// POST `body` as JSON and return the status and raw response body.
pub async fn post_json<B: Serialize + ?Sized>(
    client: &reqwest::Client,
    provider: ProviderKind,
    url: &str,
    body: &B,
) -> Result<(reqwest::StatusCode, String), ProviderError> {
    let response = client
        .post(url)
        .json(body)
        .send()
        .await
        .map_err(|source| ProviderError::Network { provider, source })?;

    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|source| ProviderError::Network { provider, source })?;

    Ok((status, text))
}

/// Decode a successful response body.
pub fn parse_body<T: DeserializeOwned>(
    provider: ProviderKind,
    body: &str,
) -> Result<T, ProviderError> {
    serde_json::from_str(body).map_err(|source| ProviderError::InvalidResponse { provider, source })
}

/// Message and code pulled out of a vendor error envelope.
pub struct ErrorDetail {
    pub message: String,
    pub code: Option<String>,
}

/// Turn a non-success response into a [`ProviderError`].
///
/// `extract` parses the vendor's envelope; when it yields nothing usable the
/// raw status and body are surfaced instead.
pub fn status_error(
    provider: ProviderKind,
    status: reqwest::StatusCode,
    body: String,
    extract: impl FnOnce(&str) -> Option<ErrorDetail>,
) -> ProviderError {
    match extract(&body).filter(|detail| !detail.message.trim().is_empty()) {
        Some(detail) => ProviderError::Api {
            provider,
            status: status.as_u16(),
            message: detail.message,
            code: detail.code,
        },
        None => ProviderError::Status {
            provider,
            status: status.as_u16(),
            body,
        },
    }
}
