//! Cluster manager REST client.
//!
//! Configuration is via environment variables:
//! - `FEEDMETA_CM_HOST` - Cluster manager host (required)
//! - `FEEDMETA_CM_PORT` - Port (default: `7180`)
//! - `FEEDMETA_CM_USERNAME` / `FEEDMETA_CM_PASSWORD` - Basic auth credentials

use std::future::Future;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{ResourceBuilder, StatusError};

/// Default cluster manager port.
pub const DEFAULT_PORT: u16 = 7180;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection settings for the cluster manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterManagerConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

impl ClusterManagerConfig {
    /// Read configuration from environment variables.
    pub fn from_env() -> Result<Self, StatusError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`, keyed by environment variable name.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, StatusError> {
        let non_blank = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let host = non_blank("FEEDMETA_CM_HOST")
            .ok_or_else(|| StatusError::InvalidConfig("FEEDMETA_CM_HOST is not set".into()))?;
        let port = match non_blank("FEEDMETA_CM_PORT") {
            Some(port) => port.trim().parse().map_err(|_| {
                StatusError::InvalidConfig(format!("Invalid FEEDMETA_CM_PORT: {}", port))
            })?,
            None => DEFAULT_PORT,
        };

        Ok(Self {
            host,
            port,
            username: lookup("FEEDMETA_CM_USERNAME").unwrap_or_default(),
            password: lookup("FEEDMETA_CM_PASSWORD").unwrap_or_default(),
        })
    }

    fn base_url(&self) -> String {
        if self.host.starts_with("http://") || self.host.starts_with("https://") {
            format!("{}:{}", self.host.trim_end_matches('/'), self.port)
        } else {
            format!("http://{}:{}", self.host, self.port)
        }
    }
}

/// Builds a [`ClusterManagerResource`] by probing the API version.
#[derive(Debug, Clone)]
pub struct ClusterManagerBuilder {
    config: ClusterManagerConfig,
}

impl ClusterManagerBuilder {
    pub fn new(config: ClusterManagerConfig) -> Self {
        tracing::info!(host = %config.host, user = %config.username, "Created cluster manager client");
        Self { config }
    }
}

impl ResourceBuilder for ClusterManagerBuilder {
    type Resource = ClusterManagerResource;

    fn build(&self) -> impl Future<Output = Result<ClusterManagerResource, StatusError>> + Send {
        async move {
            let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
            let base_url = self.config.base_url();

            let response = client
                .get(format!("{}/api/version", base_url))
                .basic_auth(&self.config.username, Some(&self.config.password))
                .send()
                .await?;
            let version = check_status(response).await?.text().await?;
            let version = version.trim().trim_matches('"').to_string();
            if version.is_empty() {
                return Err(StatusError::Unexpected("empty API version".into()));
            }

            tracing::debug!(%version, "Cluster manager API version");
            Ok(ClusterManagerResource {
                client,
                api_url: format!("{}/api/{}", base_url, version),
                username: self.config.username.clone(),
                password: self.config.password.clone(),
                version,
            })
        }
    }
}

/// Wrapper for the cluster manager's list responses.
#[derive(Debug, Clone, Deserialize)]
struct ItemList<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cluster {
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

/// A service on a cluster and its reported health.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceHealth {
    pub name: String,
    #[serde(rename = "type", default)]
    pub service_type: Option<String>,
    #[serde(default)]
    pub service_state: Option<String>,
    #[serde(default)]
    pub health_summary: Option<String>,
}

/// An authenticated handle to a versioned cluster manager API.
#[derive(Debug, Clone)]
pub struct ClusterManagerResource {
    client: Client,
    api_url: String,
    username: String,
    password: String,
    version: String,
}

impl ClusterManagerResource {
    pub fn version(&self) -> &str {
        &self.version
    }

    pub async fn clusters(&self) -> Result<Vec<Cluster>, StatusError> {
        let list: ItemList<Cluster> = self.get_json("/clusters").await?;
        Ok(list.items)
    }

    pub async fn services(&self, cluster: &str) -> Result<Vec<ServiceHealth>, StatusError> {
        let list: ItemList<ServiceHealth> = self
            .get_json(&format!("/clusters/{}/services", cluster))
            .await?;
        Ok(list.items)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, StatusError> {
        let response = self
            .client
            .get(format!("{}{}", self.api_url, path))
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await?;
        Ok(check_status(response).await?.json().await?)
    }
}

/// Pass successful responses through; turn anything else into an error.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, StatusError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(StatusError::InvalidConfig(
            format!("cluster manager rejected credentials ({})", status),
        )),
        _ => Err(StatusError::Unexpected(format!("{}: {}", status, body))),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_port_defaults_when_unset_or_blank() {
        let config =
            ClusterManagerConfig::from_lookup(lookup(&[("FEEDMETA_CM_HOST", "cm.local")])).unwrap();
        assert_eq!(config.port, DEFAULT_PORT);

        let config = ClusterManagerConfig::from_lookup(lookup(&[
            ("FEEDMETA_CM_HOST", "cm.local"),
            ("FEEDMETA_CM_PORT", " "),
        ]))
        .unwrap();
        assert_eq!(config.port, 7180);
    }

    #[test]
    fn test_missing_host_is_invalid() {
        let err = ClusterManagerConfig::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, StatusError::InvalidConfig(_)));
    }

    #[test]
    fn test_bad_port_is_invalid() {
        let err = ClusterManagerConfig::from_lookup(lookup(&[
            ("FEEDMETA_CM_HOST", "cm.local"),
            ("FEEDMETA_CM_PORT", "seventy"),
        ]))
        .unwrap_err();
        assert!(matches!(err, StatusError::InvalidConfig(_)));
    }

    #[test]
    fn test_base_url_keeps_explicit_scheme() {
        let mut config = ClusterManagerConfig::from_lookup(lookup(&[
            ("FEEDMETA_CM_HOST", "cm.local"),
            ("FEEDMETA_CM_PORT", "8080"),
        ]))
        .unwrap();
        assert_eq!(config.base_url(), "http://cm.local:8080");

        config.host = "https://cm.local/".into();
        assert_eq!(config.base_url(), "https://cm.local:8080");
    }

    #[test]
    fn test_service_list_deserializes() {
        let body = r#"{"items":[{"name":"hdfs","type":"HDFS","serviceState":"STARTED","healthSummary":"GOOD"}]}"#;
        let list: ItemList<ServiceHealth> = serde_json::from_str(body).unwrap();
        assert_eq!(list.items.len(), 1);
        assert_eq!(list.items[0].service_type.as_deref(), Some("HDFS"));
        assert_eq!(list.items[0].health_summary.as_deref(), Some("GOOD"));
    }
}
