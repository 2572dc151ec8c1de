//! reqwest-backed inventory API client
//!
//! Every call is a JSON `POST {endpoint}/v1/{resource}/describe`. The response
//! carries `items` and an optional `nextToken` for pagination.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::{CloudError, Filter, InventoryApi, Page};
use crate::error::{Error, Result};
use crate::record::{ResolvedRecord, ResourceKind};

/// Connection settings for [`HttpInventoryClient`]
#[derive(Clone, Debug)]
pub struct InventoryClientConfig {
    pub endpoint: String,
    pub region: String,
    pub page_size: u32,
    pub request_timeout: Duration,
}

impl Default for InventoryClientConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8081".to_string(),
            region: "us-east-1".to_string(),
            page_size: 100,
            request_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DescribeRequest<'a> {
    region: &'a str,
    #[serde(skip_serializing_if = "is_empty_slice")]
    filters: &'a [Filter],
    #[serde(skip_serializing_if = "is_empty_slice")]
    ids: &'a [String],
    max_results: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    next_token: Option<&'a str>,
}

fn is_empty_slice<T>(slice: &&[T]) -> bool {
    slice.is_empty()
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DescribeResponse {
    #[serde(default)]
    items: Vec<ResolvedRecord>,
    #[serde(default)]
    next_token: Option<String>,
}

/// Inventory client speaking JSON over HTTP
#[derive(Clone)]
pub struct HttpInventoryClient {
    client: Client,
    config: InventoryClientConfig,
}

impl HttpInventoryClient {
    pub fn new(config: InventoryClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(Error::HttpError)?;
        Ok(Self { client, config })
    }

    fn url(&self, kind: ResourceKind) -> String {
        let resource = match kind {
            ResourceKind::Subnet => "subnets",
            ResourceKind::SecurityGroup => "security-groups",
        };
        format!(
            "{}/v1/{}/describe",
            self.config.endpoint.trim_end_matches('/'),
            resource
        )
    }

    #[instrument(skip(self, filters, ids), fields(kind = %kind))]
    async fn describe(
        &self,
        kind: ResourceKind,
        filters: &[Filter],
        ids: &[String],
        next_token: Option<&str>,
    ) -> std::result::Result<Page, CloudError> {
        let request = DescribeRequest {
            region: &self.config.region,
            filters,
            ids,
            max_results: self.config.page_size,
            next_token,
        };

        let response = self
            .client
            .post(self.url(kind))
            .json(&request)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, body));
        }

        let body: DescribeResponse = response
            .json()
            .await
            .map_err(|e| CloudError::Malformed(e.to_string()))?;

        debug!(
            "Fetched {} {} record(s), more pages: {}",
            body.items.len(),
            kind,
            body.next_token.is_some()
        );

        Ok(Page {
            records: body.items,
            next_token: body.next_token,
        })
    }
}

#[async_trait]
impl InventoryApi for HttpInventoryClient {
    async fn describe_subnets(
        &self,
        filters: &[Filter],
        next_token: Option<&str>,
    ) -> std::result::Result<Page, CloudError> {
        self.describe(ResourceKind::Subnet, filters, &[], next_token)
            .await
    }

    async fn describe_security_groups(
        &self,
        filters: &[Filter],
        next_token: Option<&str>,
    ) -> std::result::Result<Page, CloudError> {
        self.describe(ResourceKind::SecurityGroup, filters, &[], next_token)
            .await
    }

    async fn describe_by_id(
        &self,
        kind: ResourceKind,
        ids: &[String],
    ) -> std::result::Result<Vec<ResolvedRecord>, CloudError> {
        let mut records = Vec::new();
        let mut token: Option<String> = None;
        let mut seen = HashSet::new();
        loop {
            let page = self.describe(kind, &[], ids, token.as_deref()).await?;
            records.extend(page.records);
            match page.next_token {
                Some(next) if seen.insert(next.clone()) => token = Some(next),
                Some(next) => {
                    return Err(CloudError::Malformed(format!(
                        "inventory API repeated continuation token {}",
                        next
                    )))
                }
                None => return Ok(records),
            }
        }
    }
}

fn transport_error(err: reqwest::Error) -> CloudError {
    if err.is_timeout() {
        CloudError::Timeout
    } else {
        CloudError::Transport(err.to_string())
    }
}

/// Map a non-success HTTP status onto the retriable/permanent taxonomy
fn classify_status(status: StatusCode, body: String) -> CloudError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => CloudError::Throttled(body),
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => CloudError::Timeout,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => CloudError::Unauthorized(body),
        s if s.is_server_error() => CloudError::Unavailable {
            status: s.as_u16(),
            message: body,
        },
        _ => CloudError::InvalidRequest(format!("status {}: {}", status.as_u16(), body)),
    }
}
