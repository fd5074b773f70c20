use std::sync::Mutex;
use std::time::Duration;

use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{FailureKind, FetchError, FetchMetadata, FetchOutput, ResponseHeaders};

/// Limits applied to a single resource fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    pub connect_timeout: Duration,
    /// Longest wait for any single read from the connection.
    pub read_timeout: Duration,
    /// Upper bound for the whole exchange.
    pub request_timeout: Duration,
    pub redirect_limit: usize,
    pub max_bytes: u64,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_millis(3_000),
            read_timeout: Duration::from_millis(2_000),
            request_timeout: Duration::from_secs(30),
            redirect_limit: 5,
            max_bytes: 20 * 1024 * 1024,
        }
    }
}

/// Blocking fetch of one resource: response headers plus body bytes.
pub trait Transport: Send + Sync {
    fn fetch(&self, url: &Url, settings: &FetchSettings) -> Result<FetchOutput, FetchError>;
}

/// [`Transport`] backed by `reqwest`, driven on a private current-thread runtime.
///
/// The client is built once and reused while callers pass the same settings.
/// `fetch` blocks the calling thread, so it must not be called from inside an async
/// task.
#[derive(Debug)]
pub struct ReqwestTransport {
    runtime: tokio::runtime::Runtime,
    client: Mutex<Option<(FetchSettings, reqwest::Client)>>,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, FetchError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|err| FetchError::new(FailureKind::Network, err.to_string()))?;
        Ok(Self {
            runtime,
            client: Mutex::new(None),
        })
    }

    /// Client for `settings`, rebuilt only when the settings differ from the cached ones.
    fn client_for(&self, settings: &FetchSettings) -> Result<reqwest::Client, FetchError> {
        let mut cached = self
            .client
            .lock()
            .map_err(|_| FetchError::new(FailureKind::Network, "client cache poisoned"))?;
        if let Some((cached_settings, client)) = cached.as_ref() {
            if cached_settings == settings {
                return Ok(client.clone());
            }
        }
        let client = Self::build_client(settings)?;
        *cached = Some((settings.clone(), client.clone()));
        Ok(client)
    }

    fn build_client(settings: &FetchSettings) -> Result<reqwest::Client, FetchError> {
        // Redirects are followed in `fetch_async` so each fetch counts its own hops.
        reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .read_timeout(settings.read_timeout)
            .timeout(settings.request_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|err| FetchError::new(FailureKind::Network, err.to_string()))
    }

    async fn fetch_async(
        &self,
        url: &Url,
        settings: &FetchSettings,
    ) -> Result<FetchOutput, FetchError> {
        check_scheme(url)?;
        let client = self.client_for(settings)?;

        let mut current = url.clone();
        let mut redirect_count = 0;
        let response = loop {
            let response = client
                .get(current.as_str())
                .send()
                .await
                .map_err(map_reqwest_error)?;
            let location = response
                .headers()
                .get(reqwest::header::LOCATION)
                .and_then(|value| value.to_str().ok())
                .map(str::to_owned);
            let Some(location) = location.filter(|_| response.status().is_redirection()) else {
                break response;
            };
            if redirect_count >= settings.redirect_limit {
                return Err(FetchError::new(
                    FailureKind::RedirectLimitExceeded,
                    format!("more than {} redirects", settings.redirect_limit),
                ));
            }
            current = current.join(&location).map_err(|err| {
                FetchError::new(FailureKind::InvalidUrl, format!("{location}: {err}"))
            })?;
            check_scheme(&current)?;
            redirect_count += 1;
        };

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }

        if let Some(content_len) = response.content_length() {
            if content_len > settings.max_bytes {
                return Err(FetchError::new(
                    FailureKind::TooLarge {
                        max_bytes: settings.max_bytes,
                        actual: Some(content_len),
                    },
                    "response too large",
                ));
            }
        }

        let final_url = response.url().to_string();
        let headers: ResponseHeaders = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            let next_len = bytes.len() as u64 + chunk.len() as u64;
            if next_len > settings.max_bytes {
                return Err(FetchError::new(
                    FailureKind::TooLarge {
                        max_bytes: settings.max_bytes,
                        actual: Some(next_len),
                    },
                    "response too large",
                ));
            }
            bytes.extend_from_slice(&chunk);
        }

        let metadata = FetchMetadata {
            original_url: url.to_string(),
            final_url,
            redirect_count,
            headers,
        };

        Ok(FetchOutput { bytes, metadata })
    }
}

impl Transport for ReqwestTransport {
    fn fetch(&self, url: &Url, settings: &FetchSettings) -> Result<FetchOutput, FetchError> {
        self.runtime.block_on(self.fetch_async(url, settings))
    }
}

fn check_scheme(url: &Url) -> Result<(), FetchError> {
    if matches!(url.scheme(), "http" | "https") {
        return Ok(());
    }
    Err(FetchError::new(
        FailureKind::InvalidUrl,
        format!("unsupported scheme {}", url.scheme()),
    ))
}

fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        return FetchError::new(FailureKind::Timeout, err.to_string());
    }
    FetchError::new(FailureKind::Network, err.to_string())
}
