//! XRPC HTTP client implementing the event store.
//!
//! Talks to an AT-protocol style service over plain XRPC endpoints with a
//! bearer access token.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use notifeed_common::{AppError, AppResult, EventStoreConfig};
use notifeed_core::{Cursor, EventStore, NotificationPage, Post};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use crate::error::XrpcError;
use crate::wire::{GetPostsOutput, ListNotificationsOutput, UpdateSeenInput};

const LIST_NOTIFICATIONS: &str = "app.bsky.notification.listNotifications";
const GET_POSTS: &str = "app.bsky.feed.getPosts";
const UPDATE_SEEN: &str = "app.bsky.notification.updateSeen";

/// XRPC-backed [`EventStore`].
#[derive(Clone)]
pub struct XrpcEventStore {
    client: Client,
    base_url: Url,
    access_token: Option<String>,
    page_limit: u32,
    user_agent: String,
}

impl XrpcEventStore {
    /// Create a new client from configuration.
    pub fn new(config: &EventStoreConfig) -> Result<Self, XrpcError> {
        let mut base_url = Url::parse(&config.service_url)
            .map_err(|e| XrpcError::InvalidUrl(format!("{}: {e}", config.service_url)))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        let user_agent = format!("notifeed/{}", env!("CARGO_PKG_VERSION"));

        Ok(Self {
            client,
            base_url,
            access_token: config.access_token.clone(),
            page_limit: config.page_limit,
            user_agent,
        })
    }

    /// URL of an XRPC method.
    fn endpoint(&self, nsid: &str) -> Result<Url, XrpcError> {
        self.base_url
            .join(&format!("xrpc/{nsid}"))
            .map_err(|e| XrpcError::InvalidUrl(e.to_string()))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request
            .header("User-Agent", &self.user_agent)
            .header("Accept", "application/json");
        match &self.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Fail on anything but a success status.
    async fn check_status(nsid: &str, response: Response) -> Result<Response, XrpcError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::UNAUTHORIZED {
            warn!(method = %nsid, "XRPC call rejected: unauthorized");
            return Err(XrpcError::Unauthorized);
        }

        let body = response.text().await.unwrap_or_default();
        warn!(method = %nsid, status = %status, body = %body, "XRPC call failed");
        Err(XrpcError::RequestFailed {
            status: status.as_u16(),
            body,
        })
    }

    async fn query<T: DeserializeOwned>(
        &self,
        nsid: &str,
        params: &[(&str, String)],
    ) -> Result<T, XrpcError> {
        let url = self.endpoint(nsid)?;
        debug!(method = %nsid, "XRPC query");

        let response = self
            .authorize(self.client.get(url).query(params))
            .send()
            .await?;
        let response = Self::check_status(nsid, response).await?;
        let bytes = response.bytes().await?;

        serde_json::from_slice(&bytes).map_err(|e| XrpcError::Decode(format!("{nsid}: {e}")))
    }

    async fn procedure<B: serde::Serialize + Sync>(
        &self,
        nsid: &str,
        body: &B,
    ) -> Result<(), XrpcError> {
        let url = self.endpoint(nsid)?;
        debug!(method = %nsid, "XRPC procedure");

        let response = self
            .authorize(self.client.post(url).json(body))
            .send()
            .await?;
        Self::check_status(nsid, response).await?;
        Ok(())
    }
}

#[async_trait]
impl EventStore for XrpcEventStore {
    async fn fetch_notifications(&self, cursor: Option<&Cursor>) -> AppResult<NotificationPage> {
        let mut params = vec![("limit", self.page_limit.to_string())];
        if let Some(cursor) = cursor {
            params.push(("cursor", cursor.as_str().to_string()));
        }

        let output: ListNotificationsOutput = self.query(LIST_NOTIFICATIONS, &params).await?;

        Ok(NotificationPage {
            events: output.notifications.into_iter().map(Into::into).collect(),
            next_cursor: output.cursor.filter(|c| !c.is_empty()).map(Cursor::new),
        })
    }

    async fn resolve_post(&self, uri: &str) -> AppResult<Post> {
        let output: GetPostsOutput = self
            .query(GET_POSTS, &[("uris", uri.to_string())])
            .await?;

        output
            .posts
            .into_iter()
            .find(|post| post.uri == uri)
            .map(Into::into)
            .ok_or_else(|| AppError::NotFound(uri.to_string()))
    }

    async fn mark_seen(&self, through: DateTime<Utc>) -> AppResult<()> {
        self.procedure(UPDATE_SEEN, &UpdateSeenInput { seen_at: through })
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(service_url: &str) -> EventStoreConfig {
        EventStoreConfig {
            service_url: service_url.to_string(),
            access_token: Some("token".to_string()),
            timeout_secs: 5,
            page_limit: 25,
        }
    }

    #[test]
    fn test_endpoint_joins_under_base_path() {
        let store = XrpcEventStore::new(&config("https://pds.example.com")).unwrap();
        assert_eq!(
            store.endpoint(LIST_NOTIFICATIONS).unwrap().as_str(),
            "https://pds.example.com/xrpc/app.bsky.notification.listNotifications"
        );

        let store = XrpcEventStore::new(&config("https://example.com/proxy")).unwrap();
        assert_eq!(
            store.endpoint(GET_POSTS).unwrap().as_str(),
            "https://example.com/proxy/xrpc/app.bsky.feed.getPosts"
        );
    }

    #[test]
    fn test_invalid_service_url() {
        let result = XrpcEventStore::new(&config("not a url"));
        assert!(matches!(result, Err(XrpcError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_unreachable_service_is_transport_error() {
        // Nothing listens on the discard port
        let store = XrpcEventStore::new(&config("http://127.0.0.1:9")).unwrap();
        let err = store.fetch_notifications(None).await.unwrap_err();
        assert!(err.is_transport());
    }
}
