use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{json, Value};
use tracing::info;

use crate::config::Config;
use randcaps_channels::message_stream::{Credential, MessageStream, SyncBatch};
use randcaps_channels::sync_parse::parse_sync_response;
use randcaps_core::error::RandCapsError;
use randcaps_core::text::preview;

/// Extra time allowed on top of the server-side long-poll timeout.
const SYNC_HTTP_GRACE: Duration = Duration::from_secs(30);

/// Minimal client-server API client: password login, `/sync`, and
/// `m.room.message` sends.
pub struct MatrixClient {
    homeserver_url: String,
    user_id: String,
    device_name: String,
    access_token: String,
    allowed_room_ids: Vec<String>,
    http_client: reqwest::Client,
}

impl MatrixClient {
    pub fn new(homeserver_url: &str, user_id: &str, device_name: &str) -> Self {
        Self {
            homeserver_url: homeserver_url.trim_end_matches('/').to_string(),
            user_id: user_id.trim().to_string(),
            device_name: device_name.to_string(),
            access_token: String::new(),
            allowed_room_ids: Vec::new(),
            http_client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let mut client = Self::new(&config.homeserver_url, &config.user_id, &config.device_name);
        client.allowed_room_ids = config.allowed_room_ids.clone();
        client
    }

    fn should_process_room(&self, room_id: &str) -> bool {
        self.allowed_room_ids.is_empty() || self.allowed_room_ids.iter().any(|v| v == room_id)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/_matrix/client/v3/{path}", self.homeserver_url)
    }

    fn send_url(&self, room_id: &str, txn_id: &str) -> String {
        self.endpoint(&format!(
            "rooms/{}/send/m.room.message/{txn_id}",
            urlencoding::encode(room_id)
        ))
    }

    async fn login(&self, user_id: &str, password: &str) -> Result<String, RandCapsError> {
        let localpart = login_localpart(user_id);
        info!("Logging in as {localpart} on {}", self.homeserver_url);

        let response = self
            .http_client
            .post(self.endpoint("login"))
            .json(&login_body(&localpart, password, &self.device_name))
            .send()
            .await
            .map_err(|e| RandCapsError::Authentication(format!("login request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RandCapsError::Authentication(format!(
                "login rejected: HTTP {status} {}",
                preview(&body, 300)
            )));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| RandCapsError::Authentication(format!("login response parse failed: {e}")))?;

        payload
            .get("access_token")
            .and_then(|v| v.as_str())
            .filter(|v| !v.is_empty())
            .map(ToOwned::to_owned)
            .ok_or_else(|| RandCapsError::Authentication("login response missing access_token".into()))
    }
}

/// `@name:server` logs in as `name`; anything else is used verbatim.
pub fn login_localpart(user_id: &str) -> String {
    let user = user_id.trim();
    if let Some(rest) = user.strip_prefix('@') {
        if rest.contains(':') {
            return rest.split(':').next().unwrap_or(rest).to_string();
        }
    }
    user.to_string()
}

fn login_body(localpart: &str, password: &str, device_name: &str) -> Value {
    json!({
        "type": "m.login.password",
        "identifier": { "type": "m.id.user", "user": localpart },
        "password": password,
        "initial_device_display_name": device_name,
    })
}

fn is_auth_status(status: StatusCode) -> bool {
    status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN
}

#[async_trait]
impl MessageStream for MatrixClient {
    fn user_id(&self) -> &str {
        &self.user_id
    }

    async fn authenticate(&mut self, credential: &Credential) -> Result<(), RandCapsError> {
        self.access_token = match credential {
            Credential::AccessToken(token) => token.trim().to_string(),
            Credential::Password { user_id, password } => self.login(user_id, password).await?,
        };
        Ok(())
    }

    async fn sync(&self, since: Option<&str>, timeout_ms: u64) -> Result<SyncBatch, RandCapsError> {
        let mut request = self
            .http_client
            .get(self.endpoint("sync"))
            .bearer_auth(&self.access_token)
            .timeout(Duration::from_millis(timeout_ms) + SYNC_HTTP_GRACE)
            .query(&[("timeout", timeout_ms)]);

        if let Some(since_token) = since {
            request = request.query(&[("since", since_token)]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| RandCapsError::Sync(format!("/sync request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = format!("HTTP {status} {}", preview(&body, 300));
            if is_auth_status(status) {
                return Err(RandCapsError::Authentication(format!("/sync rejected: {detail}")));
            }
            return Err(RandCapsError::Sync(format!("/sync failed: {detail}")));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| RandCapsError::Sync(format!("/sync response parse failed: {e}")))?;

        let mut batch = parse_sync_response(&payload)?;
        batch.events.retain(|e| self.should_process_room(&e.room_id));
        Ok(batch)
    }

    async fn send_text(&self, room_id: &str, body: &str) -> Result<(), RandCapsError> {
        let txn_id = uuid::Uuid::new_v4().to_string();
        let content = json!({
            "msgtype": "m.text",
            "body": body,
        });

        let response = self
            .http_client
            .put(self.send_url(room_id, &txn_id))
            .bearer_auth(&self.access_token)
            .json(&content)
            .send()
            .await
            .map_err(|e| RandCapsError::PublishFailed(format!("send request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RandCapsError::PublishFailed(format!(
                "send failed: HTTP {status} {}",
                preview(&body, 300)
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_localpart() {
        assert_eq!(login_localpart("@computer:cclub.cs.wmich.edu"), "computer");
        assert_eq!(login_localpart("  @bot:example.org "), "bot");
        assert_eq!(login_localpart("computer"), "computer");
        assert_eq!(login_localpart("@nocolon"), "@nocolon");
    }

    #[test]
    fn test_login_body_shape() {
        let body = login_body("computer", "pw", "randcaps-bot");
        assert_eq!(body["type"], "m.login.password");
        assert_eq!(body["identifier"]["type"], "m.id.user");
        assert_eq!(body["identifier"]["user"], "computer");
        assert_eq!(body["password"], "pw");
        assert_eq!(body["initial_device_display_name"], "randcaps-bot");
    }

    #[test]
    fn test_urls_trim_and_encode() {
        let client = MatrixClient::new("https://hs.example.org/", "@bot:example.org", "dev");
        assert_eq!(
            client.endpoint("sync"),
            "https://hs.example.org/_matrix/client/v3/sync"
        );
        assert_eq!(
            client.send_url("!abc:example.org", "txn1"),
            "https://hs.example.org/_matrix/client/v3/rooms/%21abc%3Aexample.org/send/m.room.message/txn1"
        );
    }

    #[test]
    fn test_room_allow_list() {
        let mut client = MatrixClient::new("https://hs", "@bot:hs", "dev");
        assert!(client.should_process_room("!any:hs"));
        client.allowed_room_ids = vec!["!only:hs".into()];
        assert!(client.should_process_room("!only:hs"));
        assert!(!client.should_process_room("!other:hs"));
    }

    #[test]
    fn test_auth_statuses() {
        assert!(is_auth_status(StatusCode::UNAUTHORIZED));
        assert!(is_auth_status(StatusCode::FORBIDDEN));
        assert!(!is_auth_status(StatusCode::BAD_GATEWAY));
        assert!(!is_auth_status(StatusCode::TOO_MANY_REQUESTS));
    }

    #[tokio::test]
    async fn test_token_credential_skips_exchange() {
        let mut client = MatrixClient::new("http://127.0.0.1:9", "@bot:hs", "dev");
        client
            .authenticate(&Credential::AccessToken(" syt_token ".into()))
            .await
            .unwrap();
        assert_eq!(client.access_token, "syt_token");
        assert_eq!(client.user_id(), "@bot:hs");
    }
}
