use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

use crate::api::error;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeNotification {
    pub recipient: Uuid,
    #[serde(rename = "type")]
    pub notification_type: String,
    pub title: String,
    pub body: String,
    pub param: HashMap<String, Value>,
    pub data: HashMap<String, String>,
}

#[async_trait::async_trait]
pub trait NotificationDispatch: Send + Sync {
    async fn send_realtime_notification(
        &self,
        notification: RealtimeNotification,
    ) -> Result<(), error::SystemError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NotificationRequest<'a> {
    channel: &'static str,
    content_type: &'static str,
    #[serde(flatten)]
    notification: &'a RealtimeNotification,
}

/// Notification service client: `POST {base_url}/internal/notifications/realtime`
#[derive(Clone)]
pub struct HttpNotificationClient {
    client: Client,
    base_url: String,
}

impl HttpNotificationClient {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self { client, base_url: base_url.into() }
    }
}

#[async_trait::async_trait]
impl NotificationDispatch for HttpNotificationClient {
    async fn send_realtime_notification(
        &self,
        notification: RealtimeNotification,
    ) -> Result<(), error::SystemError> {
        let url = format!("{}/internal/notifications/realtime", self.base_url);
        let request = NotificationRequest {
            channel: "WEBSOCKET",
            content_type: "text/plain",
            notification: &notification,
        };

        let response = self.client.post(&url).json(&request).send().await?;

        if !response.status().is_success() {
            return Err(error::SystemError::dependent_service(format!(
                "Notification service returned {} for recipient {}",
                response.status(),
                notification.recipient
            )));
        }

        tracing::debug!(
            "Notification {} sent to {}",
            notification.notification_type,
            notification.recipient
        );
        Ok(())
    }
}
