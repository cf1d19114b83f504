use std::time::Duration;

use reqwest::redirect::Policy;
use serde_json::Value;

use super::{required_str, Store, StoreFactory};
use crate::decoder::DecoderRegistry;
use crate::document::Document;
use crate::error::{ConfigError, StoreError};

const DEFAULT_PORT: i64 = 80;
const DEFAULT_TIMEOUT_MILLIS: i64 = 3000;
const MAX_REDIRECTS: usize = 10;

/// Fetches a configuration payload with an HTTP `GET`.
///
/// Options: `host` (required), `port` (80), `path` (`/`), `ssl` (false),
/// `timeout` in milliseconds (3000), `followRedirects` (false) and a
/// `headers` object.
///
/// Unlike a plain body fetch, a response whose status is not 2xx fails the
/// fetch with [`StoreError::HttpStatus`] instead of having its body decoded,
/// so an error page never reaches a decoder as configuration.
pub struct HttpStore {
    client: reqwest::Client,
    url: String,
    headers: Vec<(String, String)>,
}

#[async_trait::async_trait]
impl Store for HttpStore {
    async fn fetch(&self) -> Result<Vec<u8>, StoreError> {
        let mut request = self.client.get(&self.url);
        for (name, value) in &self.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await.map_err(|e| StoreError::Http {
            url: self.url.clone(),
            source: e,
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::HttpStatus {
                url: self.url.clone(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|e| StoreError::Http {
            url: self.url.clone(),
            source: e,
        })?;
        Ok(body.to_vec())
    }
}

pub struct HttpStoreFactory;

impl HttpStoreFactory {
    fn invalid(option: &str, reason: impl Into<String>) -> ConfigError {
        ConfigError::InvalidOption {
            store: "http".to_string(),
            option: option.to_string(),
            reason: reason.into(),
        }
    }
}

impl StoreFactory for HttpStoreFactory {
    fn name(&self) -> &str {
        "http"
    }

    fn create(
        &self,
        options: &Document,
        _decoders: &DecoderRegistry,
    ) -> Result<Box<dyn Store>, ConfigError> {
        let host = required_str(options, "http", "host")?;
        let port = options.get_i64("port").unwrap_or(DEFAULT_PORT);
        if !(1..=65535).contains(&port) {
            return Err(Self::invalid("port", format!("{} is out of range", port)));
        }
        let path = options.get_str("path").unwrap_or("/");
        let ssl = options.get_bool("ssl").unwrap_or(false);
        let timeout = options.get_i64("timeout").unwrap_or(DEFAULT_TIMEOUT_MILLIS);
        if timeout <= 0 {
            return Err(Self::invalid("timeout", "must be a positive number of milliseconds"));
        }
        let follow_redirects = options.get_bool("followRedirects").unwrap_or(false);

        let headers = match options.get("headers") {
            None => Vec::new(),
            Some(Value::Object(map)) => map
                .iter()
                .map(|(name, value)| {
                    let value = match value {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    (name.clone(), value)
                })
                .collect(),
            Some(_) => return Err(Self::invalid("headers", "expected an object")),
        };

        let scheme = if ssl { "https" } else { "http" };
        let separator = if path.starts_with('/') { "" } else { "/" };
        let url = format!("{}://{}:{}{}{}", scheme, host, port, separator, path);

        let policy = if follow_redirects {
            Policy::limited(MAX_REDIRECTS)
        } else {
            Policy::none()
        };
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout as u64))
            .redirect(policy)
            .build()
            .map_err(|e| Self::invalid("ssl", e.to_string()))?;

        Ok(Box::new(HttpStore {
            client,
            url,
            headers,
        }))
    }
}
