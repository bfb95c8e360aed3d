//! A small async client for the Frost observation API.

use crate::frost::download::TimeRange;
use crate::frost::error::FrostApiError;
use crate::types::station::StationDescriptor;
use log::{debug, warn};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

pub const DEFAULT_SERVER: &str = "frost.met.no";

/// Every Frost response wraps its payload in a `data` array.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<Vec<T>>,
}

/// One entry of `observations/availableTimeSeries`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableTimeSeries {
    pub source_id: Option<String>,
    pub valid_from: String,
    pub valid_to: Option<String>,
    pub element_id: String,
    pub time_offset: Option<String>,
    pub time_resolution: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FrostClient {
    client: Client,
    base_url: String,
    key: String,
}

impl FrostClient {
    /// `server` is either a host name (queried over HTTPS) or a full base URL.
    pub fn new(server: &str, key: impl Into<String>) -> Self {
        let server = server.trim_end_matches('/');
        let base_url = if server.starts_with("http://") || server.starts_with("https://") {
            server.to_string()
        } else {
            format!("https://{}", server)
        };
        FrostClient {
            client: Client::new(),
            base_url,
            key: key.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, service: &str) -> String {
        format!("{}/{}/v0.jsonld", self.base_url, service)
    }

    async fn query<T: DeserializeOwned>(
        &self,
        service: &str,
        params: &[(&str, String)],
    ) -> Result<Vec<T>, FrostApiError> {
        let url = self.endpoint(service);
        debug!("GET {} {:?}", url, params);
        let response = self
            .client
            .get(&url)
            .basic_auth(&self.key, Some(""))
            .query(params)
            .send()
            .await
            .map_err(|e| FrostApiError::NetworkRequest(url.clone(), e))?;
        let response = match response.error_for_status() {
            Ok(resp) => resp,
            Err(e) => {
                return match e.status() {
                    Some(status) => Err(FrostApiError::HttpStatus {
                        url,
                        status,
                        source: e,
                    }),
                    None => Err(FrostApiError::NetworkRequest(url, e)),
                };
            }
        };
        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| FrostApiError::Decode(url, e))?;
        Ok(envelope.data.unwrap_or_default())
    }

    /// Like [`Self::query`], but treats 404 as an empty result and retries each
    /// distinct failing status once.
    async fn query_with_retry<T: DeserializeOwned>(
        &self,
        service: &str,
        params: &[(&str, String)],
    ) -> Result<Vec<T>, FrostApiError> {
        let mut retried: Vec<StatusCode> = Vec::new();
        loop {
            match self.query(service, params).await {
                Err(FrostApiError::HttpStatus { status, .. }) if status == StatusCode::NOT_FOUND => {
                    debug!("No data for {} {:?}", service, params);
                    return Ok(Vec::new());
                }
                Err(FrostApiError::HttpStatus { status, .. }) if !retried.contains(&status) => {
                    warn!("Got {} from server, retrying", status);
                    retried.push(status);
                }
                other => return other,
            }
        }
    }

    /// Raw observation timesteps for `station`, exactly as returned by the server.
    pub async fn get_observations(
        &self,
        station: &str,
        elements: &[String],
        period: &TimeRange,
    ) -> Result<Vec<Value>, FrostApiError> {
        let params = [
            ("sources", station.to_string()),
            ("elements", elements.join(",")),
            ("referencetime", period.to_query()),
        ];
        self.query_with_retry("observations", &params).await
    }

    pub async fn get_available_time_series(
        &self,
        station: &str,
        elements: &[String],
        range: &TimeRange,
    ) -> Result<Vec<AvailableTimeSeries>, FrostApiError> {
        let params = [
            ("sources", station.to_string()),
            ("elements", elements.join(",")),
            ("referencetime", range.to_query()),
        ];
        self.query_with_retry("observations/availableTimeSeries", &params)
            .await
    }

    /// The source descriptor of a single station.
    ///
    /// # Errors
    ///
    /// [`FrostApiError::NoData`] when the server knows no such station.
    pub async fn get_source(&self, station: &str) -> Result<StationDescriptor, FrostApiError> {
        let params = [("ids", station.to_string())];
        self.query::<StationDescriptor>("sources", &params)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| FrostApiError::NoData(format!("{} ids={}", self.endpoint("sources"), station)))
    }

    /// The full element catalog.
    pub async fn get_elements(&self) -> Result<Vec<Value>, FrostApiError> {
        self.query("elements", &[]).await
    }
}
