use crate::config::AppConfig;
use crate::sdmx::{decode_compact_data, DataStructure, DecodeError, SdmxSeries};
use crate::series_key::SeriesKey;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "http://dataservices.imf.org/REST/SDMX_JSON.svc/";

/// Dataset identifier of the Primary Commodity Price System.
pub const DATASET: &str = "PCPS";

/// Configuration for the IMF SDMX client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Service root, ending in a slash
    pub base_url: String,
    /// Request timeout in seconds (default: 30)
    pub timeout_seconds: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_seconds: 30,
        }
    }
}

impl From<&AppConfig> for ClientConfig {
    fn from(config: &AppConfig) -> Self {
        ClientConfig {
            base_url: config.base_url.clone(),
            timeout_seconds: config.timeout_seconds,
        }
    }
}

/// Errors from talking to the remote source.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to build HTTP client: {0}")]
    ClientCreation(#[source] reqwest::Error),
    #[error("network error requesting {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },
    #[error("failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: DecodeError,
    },
}

/// Remote provider of the dataset structure and per-series data.
#[allow(async_fn_in_trait)]
pub trait SdmxSource {
    /// Fetches and decodes the dataset's code lists.
    async fn data_structure(&self) -> Result<DataStructure, SourceError>;

    /// Fetches and decodes every series matching `key`.
    async fn compact_data(&self, key: &SeriesKey) -> Result<Vec<SdmxSeries>, SourceError>;
}

/// HTTP client for the IMF SDMX-JSON service.
///
/// Requests are issued one at a time; pacing between them is the caller's
/// responsibility.
#[derive(Debug, Clone)]
pub struct ImfClient {
    client: Client,
    config: ClientConfig,
}

impl ImfClient {
    /// Creates a client with the default endpoint and timeout.
    pub fn new() -> Result<Self, SourceError> {
        Self::with_config(ClientConfig::default())
    }

    /// Creates a client with a custom configuration.
    ///
    /// # Arguments
    /// * `config` - Base URL and request timeout
    ///
    /// # Returns
    /// Returns an error only if the underlying HTTP client cannot be built.
    pub fn with_config(config: ClientConfig) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(SourceError::ClientCreation)?;
        Ok(ImfClient { client, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Full URL of a service path such as `DataStructure/PCPS`.
    pub fn endpoint(&self, path: &str) -> String {
        if self.config.base_url.ends_with('/') {
            format!("{}{}", self.config.base_url, path)
        } else {
            format!("{}/{}", self.config.base_url, path)
        }
    }

    pub fn structure_url(&self) -> String {
        self.endpoint(&format!("DataStructure/{DATASET}"))
    }

    pub fn compact_data_url(&self, key: &SeriesKey) -> String {
        self.endpoint(&format!("CompactData/{DATASET}/{}", key.as_string()))
    }

    /// Issues a GET and returns the body of a successful response.
    async fn get_text(&self, url: &str) -> Result<String, SourceError> {
        tracing::debug!(url, "GET");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| SourceError::Network {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(|source| SourceError::Network {
            url: url.to_string(),
            source,
        })
    }
}

impl SdmxSource for ImfClient {
    async fn data_structure(&self) -> Result<DataStructure, SourceError> {
        let url = self.structure_url();
        let body = self.get_text(&url).await?;
        DataStructure::from_json(&body).map_err(|source| SourceError::Decode { url, source })
    }

    async fn compact_data(&self, key: &SeriesKey) -> Result<Vec<SdmxSeries>, SourceError> {
        let url = self.compact_data_url(key);
        let body = self.get_text(&url).await?;
        decode_compact_data(&body).map_err(|source| SourceError::Decode { url, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series_key::Frequency;

    #[test]
    fn test_client_with_config() {
        let client = ImfClient::with_config(ClientConfig {
            base_url: "http://localhost:9/sdmx".to_string(),
            timeout_seconds: 5,
        })
        .unwrap();
        assert_eq!(client.config().timeout_seconds, 5);
        assert_eq!(client.structure_url(), "http://localhost:9/sdmx/DataStructure/PCPS");
    }

    #[test]
    fn test_compact_data_url_uses_dotted_key() {
        let client = ImfClient::new().unwrap();
        let key = SeriesKey::new(Frequency::Monthly, "W00", "PGOLD", "USD").unwrap();
        assert_eq!(
            client.compact_data_url(&key),
            "http://dataservices.imf.org/REST/SDMX_JSON.svc/CompactData/PCPS/M.W00.PGOLD.USD"
        );
    }

    #[tokio::test]
    async fn test_unreachable_host_is_network_error() {
        let client = ImfClient::with_config(ClientConfig {
            base_url: "http://127.0.0.1:9/".to_string(),
            timeout_seconds: 2,
        })
        .unwrap();
        match client.data_structure().await {
            Err(SourceError::Network { url, .. }) => assert!(url.ends_with("DataStructure/PCPS")),
            other => panic!("expected network error, got {other:?}"),
        }
    }

    #[test]
    fn test_status_error_display() {
        let error = SourceError::Status {
            url: "http://x/DataStructure/PCPS".to_string(),
            status: 503,
        };
        assert_eq!(error.to_string(), "HTTP 503 from http://x/DataStructure/PCPS");
    }
}
