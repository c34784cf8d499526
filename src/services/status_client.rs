use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::NotificationId;
use crate::notify::Notifier;
use crate::render::Artifact;

#[derive(Debug, Serialize)]
struct CreateStatusRequest<'a> {
    status: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    media_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    in_reply_to_id: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct IdResponse {
    id: RemoteId,
}

/// Ids come back as strings from some servers and as numbers from others.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RemoteId {
    Text(String),
    Number(u64),
}

impl RemoteId {
    fn into_string(self) -> String {
        match self {
            RemoteId::Text(s) => s,
            RemoteId::Number(n) => n.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Account {
    username: String,
    #[serde(default)]
    display_name: Option<String>,
}

/// Client for a status-posting HTTP API (media upload plus statuses).
pub struct StatusClient {
    client: Client,
    api_base: Url,
    access_token: String,
}

impl StatusClient {
    pub fn new(api_base: &str, access_token: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("rss-diff/1.0")
            .build()?;

        Ok(Self {
            client,
            api_base: normalize_base(api_base)?,
            access_token,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.api_base.join(path)?)
    }

    /// Name of the account the token belongs to.
    pub async fn verify_credentials(&self) -> Result<String> {
        let response = self
            .client
            .get(self.endpoint("accounts/verify_credentials")?)
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            return Err(AppError::Notify(format!("credential check failed ({}): {}", status, error_text)));
        }

        let account: Account = response.json().await?;
        Ok(account
            .display_name
            .filter(|name| !name.is_empty())
            .unwrap_or(account.username))
    }

    async fn upload_media(&self, path: &Path) -> Result<String> {
        let bytes = tokio::fs::read(path).await?;

        let response = self
            .client
            .post(self.endpoint("media")?)
            .bearer_auth(&self.access_token)
            .header(CONTENT_TYPE, media_type(path))
            .body(bytes)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(AppError::Notify(format!("media upload failed: {}", error_text)));
        }

        let media: IdResponse = response.json().await?;
        let id = media.id.into_string();
        tracing::info!("Media ready with id {}", id);
        Ok(id)
    }

    async fn post_status(
        &self,
        text: &str,
        media_ids: Vec<String>,
        in_reply_to: Option<&NotificationId>,
    ) -> Result<NotificationId> {
        let request = CreateStatusRequest {
            status: text,
            media_ids,
            in_reply_to_id: in_reply_to.map(|id| id.as_str()),
        };

        let response = self
            .client
            .post(self.endpoint("statuses")?)
            .bearer_auth(&self.access_token)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(AppError::Notify(format!("API error: {}", error_text)));
        }

        let status: IdResponse = response.json().await?;
        Ok(NotificationId::new(status.id.into_string()))
    }
}

#[async_trait]
impl Notifier for StatusClient {
    async fn post_root(&self, text: &str) -> Result<NotificationId> {
        self.post_status(text, Vec::new(), None).await
    }

    async fn post_reply(
        &self,
        text: &str,
        artifact: &Artifact,
        in_reply_to: &NotificationId,
    ) -> Result<NotificationId> {
        let media_id = self.upload_media(&artifact.path).await?;
        self.post_status(text, vec![media_id], Some(in_reply_to)).await
    }
}

/// Ensure the base URL ends in a slash so `join` appends instead of replacing.
fn normalize_base(api_base: &str) -> Result<Url> {
    let mut base = api_base.trim().to_string();
    if !base.ends_with('/') {
        base.push('/');
    }
    Ok(Url::parse(&base)?)
}

fn media_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("html") | Some("htm") => "text/html; charset=utf-8",
        _ => "application/octet-stream",
    }
}
