//! Slack Web API client.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

use super::{ChatApi, ChatError, ChatMember};

/// Default Slack Web API base URL.
pub const DEFAULT_BASE_URL: &str = "https://slack.com/api";

/// Page size for `users.list`.
const USERS_PAGE_LIMIT: u32 = 200;

/// Upper bound on `users.list` pages, in case the cursor never runs dry.
const MAX_PAGES: usize = 500;

/// Client for the Slack Web API, authenticated with a bot token.
pub struct SlackClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsersPage {
    #[serde(default)]
    members: Vec<ChatMember>,
    #[serde(default)]
    response_metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Deserialize)]
struct ResponseMetadata {
    #[serde(default)]
    next_cursor: Option<String>,
}

impl SlackClient {
    /// Create a client. A missing token is allowed; calls then fail with
    /// [`ChatError::MissingToken`].
    pub fn new(
        base_url: impl Into<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ChatError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.trim().is_empty()),
        })
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{}", self.base_url, method)
    }

    fn token(&self) -> Result<&str, ChatError> {
        self.token.as_deref().ok_or(ChatError::MissingToken)
    }

    async fn get(&self, method: &str, query: &[(&str, String)]) -> Result<Value, ChatError> {
        let mut url = self.method_url(method);
        for (i, (key, value)) in query.iter().enumerate() {
            url.push(if i == 0 { '?' } else { '&' });
            url.push_str(key);
            url.push('=');
            url.push_str(&urlencoding::encode(value));
        }

        debug!("Slack GET {}", method);
        let body: Value = self
            .client
            .get(&url)
            .bearer_auth(self.token()?)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        check_ok(method, body)
    }

    async fn post(&self, method: &str, payload: &Value) -> Result<Value, ChatError> {
        debug!("Slack POST {}", method);
        let body: Value = self
            .client
            .post(self.method_url(method))
            .bearer_auth(self.token()?)
            .json(payload)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        check_ok(method, body)
    }
}

/// Turn an `ok: false` body into an error.
fn check_ok(method: &str, body: Value) -> Result<Value, ChatError> {
    if body.get("ok").and_then(Value::as_bool) == Some(true) {
        return Ok(body);
    }
    let error = body
        .get("error")
        .and_then(Value::as_str)
        .unwrap_or("unknown_error")
        .to_string();
    Err(ChatError::Api {
        method: method.to_string(),
        error,
    })
}

/// Members of one page plus the cursor for the next, if any.
fn parse_users_page(body: Value) -> Result<(Vec<ChatMember>, Option<String>), ChatError> {
    let page: UsersPage = serde_json::from_value(body).map_err(|e| ChatError::Api {
        method: "users.list".to_string(),
        error: format!("unexpected response shape: {}", e),
    })?;
    let next = page
        .response_metadata
        .and_then(|m| m.next_cursor)
        .filter(|c| !c.is_empty());
    Ok((page.members, next))
}

/// Build the `chat.postMessage` payload. Empty block lists are omitted.
fn message_payload(channel: &str, text: &str, blocks: Option<Value>) -> Value {
    let mut payload = json!({ "channel": channel, "text": text });
    let blocks = blocks.filter(|b| match b {
        Value::Null => false,
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        _ => true,
    });
    if let Some(blocks) = blocks {
        payload["blocks"] = blocks;
    }
    payload
}

#[async_trait]
impl ChatApi for SlackClient {
    async fn post_message(
        &self,
        channel: &str,
        text: &str,
        blocks: Option<Value>,
    ) -> Result<Value, ChatError> {
        self.post("chat.postMessage", &message_payload(channel, text, blocks))
            .await
    }

    async fn list_members(&self) -> Result<Vec<ChatMember>, ChatError> {
        let mut members = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_PAGES {
            let mut query = vec![("limit", USERS_PAGE_LIMIT.to_string())];
            if let Some(c) = cursor.take() {
                query.push(("cursor", c));
            }

            let (page, next) = parse_users_page(self.get("users.list", &query).await?)?;
            members.extend(page);

            match next {
                Some(next) => cursor = Some(next),
                None => return Ok(members),
            }
        }

        warn!(
            "users.list still paging after {} pages, returning {} members",
            MAX_PAGES,
            members.len()
        );
        Ok(members)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_ok() {
        assert!(check_ok("auth.test", json!({"ok": true})).is_ok());

        let err = check_ok("chat.postMessage", json!({"ok": false, "error": "channel_not_found"}))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Chat API method chat.postMessage failed: channel_not_found"
        );

        let err = check_ok("users.list", json!({})).unwrap_err();
        assert!(err.to_string().contains("unknown_error"));
    }

    #[test]
    fn test_parse_users_page_with_cursor() {
        let (members, next) = parse_users_page(json!({
            "ok": true,
            "members": [{"id": "U1"}, {"id": "U2"}],
            "response_metadata": {"next_cursor": "dXNlcjpVMDYxTkZUVDI="}
        }))
        .unwrap();
        assert_eq!(members.len(), 2);
        assert_eq!(next.as_deref(), Some("dXNlcjpVMDYxTkZUVDI="));
    }

    #[test]
    fn test_parse_users_last_page() {
        let (members, next) = parse_users_page(json!({
            "ok": true,
            "members": [],
            "response_metadata": {"next_cursor": ""}
        }))
        .unwrap();
        assert!(members.is_empty());
        assert!(next.is_none());

        let (_, next) = parse_users_page(json!({"ok": true})).unwrap();
        assert!(next.is_none());
    }

    #[test]
    fn test_message_payload_drops_empty_blocks() {
        assert_eq!(
            message_payload("C1", "hi", Some(json!([]))),
            json!({"channel": "C1", "text": "hi"})
        );
        assert_eq!(
            message_payload("C1", "hi", None),
            json!({"channel": "C1", "text": "hi"})
        );
        let blocks = json!([{"type": "section", "text": {"type": "mrkdwn", "text": "*hi*"}}]);
        assert_eq!(message_payload("C1", "hi", Some(blocks.clone()))["blocks"], blocks);
    }

    #[tokio::test]
    async fn test_missing_token_fails_without_request() {
        let client = SlackClient::new("http://127.0.0.1:9/api/", None, Duration::from_secs(1)).unwrap();
        assert!(!client.has_token());
        assert_eq!(client.method_url("users.list"), "http://127.0.0.1:9/api/users.list");

        let err = client.list_members().await.unwrap_err();
        assert!(matches!(err, ChatError::MissingToken));
    }
}
