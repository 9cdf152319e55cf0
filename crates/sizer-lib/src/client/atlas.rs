//! HTTP implementation of `ResourceClient` with digest authentication

use super::{Fetch, ResourceClient, SampleSpan};
use crate::error::ClientError;
use crate::models::{Disk, Measurement, MeasurementsResponse, Page, Process, Project};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, WWW_AUTHENTICATE};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Longest response body kept in an error message
const MAX_ERROR_BODY: usize = 512;

/// API key pair used for digest authentication
#[derive(Clone)]
pub struct Credentials {
    pub public_key: String,
    pub private_key: String,
}

impl Credentials {
    pub fn new(public_key: impl Into<String>, private_key: impl Into<String>) -> Self {
        Self {
            public_key: public_key.into(),
            private_key: private_key.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("public_key", &self.public_key)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// Endpoint configuration for the HTTP client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the v1 API
    pub base_url: String,
    /// Base URL of the v2 API (disk endpoints)
    pub v2_base_url: String,
    /// Versioned media type required by the v2 API
    pub v2_media_type: String,
    /// Per-request timeout
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://cloud.mongodb.com/api/atlas/v1.0".to_string(),
            v2_base_url: "https://cloud.mongodb.com/api/atlas/v2".to_string(),
            v2_media_type: "application/vnd.atlas.2025-11-02+json".to_string(),
            request_timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum ApiVersion {
    V1,
    V2,
}

/// Digest-authenticated client for the management API
pub struct AtlasClient {
    client: Client,
    base_url: Url,
    v2_base_url: Url,
    v2_media_type: String,
    credentials: Credentials,
}

impl AtlasClient {
    /// Create a new API client
    pub fn new(credentials: Credentials, config: ClientConfig) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(ClientError::Build)?;

        Ok(Self {
            client,
            base_url: directory_url(&config.base_url)?,
            v2_base_url: directory_url(&config.v2_base_url)?,
            v2_media_type: config.v2_media_type,
            credentials,
        })
    }

    fn url(&self, api: ApiVersion, path: &str, query: &[(&str, &str)]) -> Result<Url, ClientError> {
        let base = match api {
            ApiVersion::V1 => &self.base_url,
            ApiVersion::V2 => &self.v2_base_url,
        };
        let mut url = base.join(path)?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    fn accept(&self, api: ApiVersion) -> &str {
        match api {
            ApiVersion::V1 => "application/json",
            ApiVersion::V2 => &self.v2_media_type,
        }
    }

    /// GET `path` and decode the JSON body
    async fn get_json<T: DeserializeOwned>(
        &self,
        api: ApiVersion,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ClientError> {
        let url = self.url(api, path, query)?;
        let endpoint = url.path().to_string();
        debug!(endpoint = %endpoint, "GET");

        let response = self.send_authenticated(url, self.accept(api)).await?;

        let status = response.status();
        let body = response.text().await.map_err(|source| ClientError::Transport {
            endpoint: endpoint.clone(),
            source,
        })?;

        if !status.is_success() {
            return Err(ClientError::Status {
                status,
                endpoint,
                body: truncate(&body),
            });
        }

        serde_json::from_str(&body).map_err(|source| ClientError::Decode { endpoint, source })
    }

    /// Send a GET, answering a digest challenge once if the server issues one
    async fn send_authenticated(&self, url: Url, accept: &str) -> Result<Response, ClientError> {
        let response = self.send(url.clone(), accept, None).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        let challenge = response
            .headers()
            .get(WWW_AUTHENTICATE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let Some(challenge) = challenge else {
            return Ok(response);
        };

        let authorization = self.answer_challenge(&url, &challenge)?;
        self.send(url, accept, Some(authorization)).await
    }

    fn answer_challenge(&self, url: &Url, challenge: &str) -> Result<String, ClientError> {
        let digest_error = |e: digest_auth::Error| ClientError::DigestAuth {
            endpoint: url.path().to_string(),
            reason: e.to_string(),
        };

        let uri = request_uri(url);
        let mut prompt = digest_auth::parse(challenge).map_err(digest_error)?;
        let context = digest_auth::AuthContext::new(
            self.credentials.public_key.as_str(),
            self.credentials.private_key.as_str(),
            uri.as_str(),
        );
        let answer = prompt.respond(&context).map_err(digest_error)?;
        Ok(answer.to_header_string())
    }

    async fn send(
        &self,
        url: Url,
        accept: &str,
        authorization: Option<String>,
    ) -> Result<Response, ClientError> {
        let endpoint = url.path().to_string();
        let mut request = self.client.get(url).header(ACCEPT, accept);
        if let Some(authorization) = authorization {
            request = request.header(AUTHORIZATION, authorization);
        }
        request
            .send()
            .await
            .map_err(|source| ClientError::Transport { endpoint, source })
    }
}

/// Base URL with a trailing slash so relative joins keep its path
fn directory_url(raw: &str) -> Result<Url, ClientError> {
    let mut raw = raw.trim().to_string();
    if !raw.ends_with('/') {
        raw.push('/');
    }
    Ok(Url::parse(&raw)?)
}

/// Path and query, as used in the digest `uri` parameter
fn request_uri(url: &Url) -> String {
    match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    }
}

fn truncate(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY {
        return body.to_string();
    }
    let mut end = MAX_ERROR_BODY;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

#[async_trait]
impl ResourceClient for AtlasClient {
    async fn list_projects(&self, org_id: &str) -> Result<Vec<Project>, ClientError> {
        let page: Page<Project> = self
            .get_json(ApiVersion::V1, &format!("orgs/{}/groups", org_id), &[])
            .await?;
        Ok(page.results)
    }

    async fn get_project(&self, project_id: &str) -> Result<Project, ClientError> {
        self.get_json(ApiVersion::V1, &format!("groups/{}", project_id), &[])
            .await
    }

    async fn list_clusters(&self, project_id: &str) -> Result<Vec<Value>, ClientError> {
        let page: Page<Value> = self
            .get_json(ApiVersion::V1, &format!("groups/{}/clusters", project_id), &[])
            .await?;
        Ok(page.results)
    }

    async fn list_processes(&self, project_id: &str) -> Fetch<Vec<Process>> {
        let result = self
            .get_json::<Page<Process>>(
                ApiVersion::V1,
                &format!("groups/{}/processes", project_id),
                &[],
            )
            .await
            .map(|page| page.results);
        Fetch::from_result(result)
    }

    async fn get_process_measurements(
        &self,
        project_id: &str,
        process_id: &str,
        measurement_type: &str,
        span: &SampleSpan,
    ) -> Fetch<Vec<Measurement>> {
        let result = self
            .get_json::<MeasurementsResponse>(
                ApiVersion::V1,
                &format!("groups/{}/processes/{}/measurements", project_id, process_id),
                &[
                    ("granularity", span.granularity.as_str()),
                    ("period", span.period.as_str()),
                    ("measurementType", measurement_type),
                ],
            )
            .await
            .map(|r| r.measurements);
        Fetch::from_result(result)
    }

    async fn list_disks(&self, project_id: &str, process_id: &str) -> Fetch<Vec<Disk>> {
        let result = self
            .get_json::<Page<Disk>>(
                ApiVersion::V2,
                &format!("groups/{}/processes/{}/disks", project_id, process_id),
                &[],
            )
            .await
            .map(|page| page.results);
        Fetch::from_result(result)
    }

    async fn get_disk_measurements(
        &self,
        project_id: &str,
        process_id: &str,
        partition_name: &str,
        metric_types: &[&str],
        span: &SampleSpan,
    ) -> Fetch<Vec<Measurement>> {
        let metric_types = metric_types.join(",");
        let result = self
            .get_json::<MeasurementsResponse>(
                ApiVersion::V2,
                &format!(
                    "groups/{}/processes/{}/disks/{}/measurements",
                    project_id, process_id, partition_name
                ),
                &[
                    ("granularity", span.granularity.as_str()),
                    ("period", span.period.as_str()),
                    ("measurementTypes", metric_types.as_str()),
                ],
            )
            .await
            .map(|r| r.measurements);
        Fetch::from_result(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_url_keeps_base_path() {
        let base = directory_url("https://cloud.mongodb.com/api/atlas/v1.0").unwrap();
        let url = base.join("groups/p1/clusters").unwrap();
        assert_eq!(url.as_str(), "https://cloud.mongodb.com/api/atlas/v1.0/groups/p1/clusters");
    }

    #[test]
    fn test_request_uri_includes_query() {
        let url = Url::parse("https://host/api/x?granularity=PT1M&period=P2D").unwrap();
        assert_eq!(request_uri(&url), "/api/x?granularity=PT1M&period=P2D");
    }

    #[test]
    fn test_truncate_long_body() {
        let body = "x".repeat(MAX_ERROR_BODY + 10);
        let truncated = truncate(&body);
        assert!(truncated.ends_with("..."));
        assert_eq!(truncated.len(), MAX_ERROR_BODY + 3);
    }

    #[test]
    fn test_credentials_debug_redacts_private_key() {
        let creds = Credentials::new("public", "secret");
        let debug = format!("{:?}", creds);
        assert!(debug.contains("public"));
        assert!(!debug.contains("secret"));
    }
}
