//! Seams to the external collaborators: the badge catalog service and the
//! outbound side of the chat-protocol client. The router only ever sees the
//! traits.

use std::fmt::Debug;

use async_trait::async_trait;
use url::Url;

use crate::error::{WidgetError, WidgetResult};
use crate::models::CatalogResponse;

/// Remote badge catalog service.
#[async_trait]
pub trait BadgeProvider: Send + Sync {
    async fn global_badges(&self) -> WidgetResult<CatalogResponse>;
    async fn channel_badges(&self, broadcaster_id: &str) -> WidgetResult<CatalogResponse>;
}

/// Outbound message send on the chat-protocol client. Failures are logged
/// and swallowed by the router; sends are never retried.
#[async_trait]
pub trait ChatSink: Debug + Send + Sync {
    async fn send(&self, channel: &str, text: &str) -> WidgetResult<()>;
}

/// Sink for deployments with no outbound credentials: logs and succeeds.
#[derive(Debug, Default)]
pub struct NullSink;

#[async_trait]
impl ChatSink for NullSink {
    async fn send(&self, channel: &str, text: &str) -> WidgetResult<()> {
        tracing::debug!(channel, text, "outbound send dropped (null sink)");
        Ok(())
    }
}

/// Badge catalog client for the Helix endpoints.
#[derive(Debug, Clone)]
pub struct HelixBadgeProvider {
    client: reqwest::Client,
    base: Url,
    client_id: String,
    token: String,
}

impl HelixBadgeProvider {
    pub fn new(base: Url, client_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base,
            client_id: client_id.into(),
            token: token.into(),
        }
    }

    async fn fetch(&self, path: &str, query: &[(&str, &str)]) -> WidgetResult<CatalogResponse> {
        let url = self
            .base
            .join(path)
            .map_err(|err| WidgetError::CatalogFetch(err.to_string()))?;
        let response = self
            .client
            .get(url)
            .query(query)
            .header("Client-Id", &self.client_id)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|err| WidgetError::CatalogFetch(err.to_string()))?
            .error_for_status()
            .map_err(|err| WidgetError::CatalogFetch(err.to_string()))?;
        response
            .json::<CatalogResponse>()
            .await
            .map_err(|err| WidgetError::CatalogFetch(err.to_string()))
    }
}

#[async_trait]
impl BadgeProvider for HelixBadgeProvider {
    async fn global_badges(&self) -> WidgetResult<CatalogResponse> {
        self.fetch("chat/badges/global", &[]).await
    }

    async fn channel_badges(&self, broadcaster_id: &str) -> WidgetResult<CatalogResponse> {
        self.fetch("chat/badges", &[("broadcaster_id", broadcaster_id)])
            .await
    }
}
