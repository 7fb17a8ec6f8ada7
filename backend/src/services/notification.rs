//! Manager notifications
//!
//! Every notification is stored in-app for each manager and owner of the
//! organization. When a LINE Messaging token is configured the same text is
//! pushed to members that linked a LINE account. Delivery is best effort and
//! always runs after the ledger transaction has committed.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::config::NotificationConfig;
use crate::error::AppResult;

/// Notification category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    SaleRecorded,
    SaleAdjusted,
    CycleEnded,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::SaleRecorded => "sale_recorded",
            NotificationKind::SaleAdjusted => "sale_adjusted",
            NotificationKind::CycleEnded => "cycle_ended",
        }
    }
}

/// A message for the managers of one organization
#[derive(Debug, Clone)]
pub struct ManagerNotice {
    pub organization_id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    /// Path inside the web app, joined to the configured base URL
    pub link: Option<String>,
}

#[derive(Debug, FromRow)]
struct RecipientRow {
    user_id: Uuid,
    line_user_id: Option<String>,
}

/// LINE Messaging API client
#[derive(Clone)]
pub struct LineMessagingClient {
    channel_access_token: String,
    http_client: reqwest::Client,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum LineMessage {
    Text { text: String },
}

#[derive(Debug, Serialize)]
struct LinePushRequest {
    to: String,
    messages: Vec<LineMessage>,
}

impl LineMessagingClient {
    pub fn new(channel_access_token: String) -> Self {
        Self {
            channel_access_token,
            http_client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &NotificationConfig) -> Option<Self> {
        config
            .line_messaging_token
            .as_ref()
            .filter(|token| !token.is_empty())
            .map(|token| Self::new(token.clone()))
    }

    /// Send a text push message to a LINE user
    pub async fn push_text(&self, line_user_id: &str, text: String) -> Result<(), String> {
        let request = LinePushRequest {
            to: line_user_id.to_string(),
            messages: vec![LineMessage::Text { text }],
        };

        let response = self
            .http_client
            .post("https://api.line.me/v2/bot/message/push")
            .bearer_auth(&self.channel_access_token)
            .json(&request)
            .send()
            .await
            .map_err(|e| format!("Failed to send LINE message: {}", e))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(format!("LINE push rejected with status {}", response.status()))
        }
    }
}

/// Notification service
#[derive(Clone)]
pub struct NotificationService {
    db: PgPool,
    line_client: Option<LineMessagingClient>,
    app_base_url: String,
}

impl NotificationService {
    pub fn new(db: PgPool, config: &NotificationConfig) -> Self {
        Self {
            db,
            line_client: LineMessagingClient::from_config(config),
            app_base_url: config.app_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Store the notice for every manager and owner of the organization and
    /// push it to those with a linked LINE account. Returns the number of
    /// in-app notifications written.
    pub async fn send_to_org_managers(&self, notice: &ManagerNotice) -> AppResult<usize> {
        let recipients = sqlx::query_as::<_, RecipientRow>(
            r#"
            SELECT user_id, line_user_id
            FROM organization_members
            WHERE organization_id = $1 AND role IN ('manager', 'owner')
            "#,
        )
        .bind(notice.organization_id)
        .fetch_all(&self.db)
        .await?;

        let link = notice
            .link
            .as_ref()
            .map(|path| format!("{}{}", self.app_base_url, path));

        for recipient in &recipients {
            sqlx::query(
                r#"
                INSERT INTO notifications (organization_id, user_id, kind, title, message, link)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(notice.organization_id)
            .bind(recipient.user_id)
            .bind(notice.kind.as_str())
            .bind(&notice.title)
            .bind(&notice.message)
            .bind(&link)
            .execute(&self.db)
            .await?;

            if let (Some(client), Some(line_user_id)) = (&self.line_client, &recipient.line_user_id) {
                let text = match &link {
                    Some(link) => format!("{}\n\n{}\n{}", notice.title, notice.message, link),
                    None => format!("{}\n\n{}", notice.title, notice.message),
                };
                if let Err(e) = client.push_text(line_user_id, text).await {
                    tracing::warn!(user_id = %recipient.user_id, error = %e, "LINE push failed");
                }
            }
        }

        Ok(recipients.len())
    }

    /// Deliver in the background; failures are logged and never reach the
    /// caller
    pub fn spawn(self, notice: ManagerNotice) {
        tokio::spawn(async move {
            match self.send_to_org_managers(&notice).await {
                Ok(count) => {
                    tracing::debug!(kind = notice.kind.as_str(), recipients = count, "notification sent")
                }
                Err(e) => {
                    tracing::warn!(kind = notice.kind.as_str(), error = %e, "notification failed")
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_client_requires_token() {
        let mut config = NotificationConfig {
            line_messaging_token: None,
            app_base_url: "http://localhost".to_string(),
        };
        assert!(LineMessagingClient::from_config(&config).is_none());
        config.line_messaging_token = Some(String::new());
        assert!(LineMessagingClient::from_config(&config).is_none());
        config.line_messaging_token = Some("token".to_string());
        assert!(LineMessagingClient::from_config(&config).is_some());
    }

    #[test]
    fn test_push_body_shape() {
        let request = LinePushRequest {
            to: "U123".to_string(),
            messages: vec![LineMessage::Text {
                text: "hello".to_string(),
            }],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["messages"][0]["type"], "text");
        assert_eq!(json["messages"][0]["text"], "hello");
    }
}
