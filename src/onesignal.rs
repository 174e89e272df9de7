use std::env;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use log::{debug, info};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tokio::sync::watch;

use crate::gateway::{GatewayError, PushVendor};
use crate::util::{self, VAR_APP_ID, VAR_REST_API_KEY, VAR_SAFARI_WEB_ID};

pub const NOTIFICATIONS_URL: &str = "https://onesignal.com/api/v1/notifications";
pub const PLAYERS_URL: &str = "https://onesignal.com/api/v1/players";

/// Placeholder shipped in .env templates; treated the same as a missing value.
pub const CREDENTIAL_PLACEHOLDER: &str = "your_app_id_here";

pub const NOTIFICATION_HEADING: &str = "Camino Medio";
pub const ANDROID_CHANNEL_ID: &str = "mindfulness-alerts";

/// OneSignal device_type for Chrome web push.
const WEB_PUSH_DEVICE_TYPE: u8 = 5;

#[derive(Debug, Error)]
pub enum OneSignalError {
    #[error("http transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("OneSignal rejected the request: {0}")]
    Rejected(String),
}

#[derive(Debug, Clone)]
pub struct OneSignalCredentials {
    pub app_id: String,
    pub rest_api_key: String,
    pub safari_web_id: Option<String>,
}

impl OneSignalCredentials {
    /// Read credentials from the environment. Returns `None` when they are
    /// missing or still the template placeholder, so callers can disable push
    /// delivery instead of failing.
    pub fn from_env() -> Option<Self> {
        let app_id = env::var(VAR_APP_ID).ok()?;
        let rest_api_key = env::var(VAR_REST_API_KEY).ok()?;
        if !is_usable(&app_id, &rest_api_key) {
            return None;
        }
        Some(Self {
            app_id,
            rest_api_key,
            safari_web_id: env::var(VAR_SAFARI_WEB_ID).ok().filter(|id| !id.is_empty()),
        })
    }
}

fn is_usable(app_id: &str, rest_api_key: &str) -> bool {
    !app_id.is_empty() && app_id != CREDENTIAL_PLACEHOLDER && !rest_api_key.is_empty()
}

#[derive(Debug, Deserialize)]
pub struct NotificationReceipt {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub recipients: u32,
}

#[derive(Debug, Deserialize)]
struct PlayerReceipt {
    id: String,
}

/// Thin client over the OneSignal REST API.
pub struct OneSignalClient {
    credentials: OneSignalCredentials,
    http: reqwest::Client,
    opted_in: AtomicBool,
    ready_tx: watch::Sender<bool>,
}

impl OneSignalClient {
    pub fn new(credentials: OneSignalCredentials) -> Self {
        // The REST transport has no async handshake; it is ready as soon as
        // the credentials were validated.
        let (ready_tx, _) = watch::channel(true);
        Self {
            credentials,
            http: reqwest::Client::new(),
            opted_in: AtomicBool::new(false),
            ready_tx,
        }
    }

    pub fn app_id(&self) -> &str {
        &self.credentials.app_id
    }

    pub fn safari_web_id(&self) -> Option<&str> {
        self.credentials.safari_web_id.as_deref()
    }

    /// Create one notification addressed to the given player ids.
    pub async fn send_notification(
        &self,
        player_ids: &[String],
        message: &str,
    ) -> Result<NotificationReceipt, OneSignalError> {
        let body = json!({
            "app_id": self.credentials.app_id,
            "include_player_ids": player_ids,
            "headings": { "en": NOTIFICATION_HEADING, "es": NOTIFICATION_HEADING },
            "contents": { "en": message, "es": message },
            "data": {
                "type": "mindfulness-alert",
                "timestamp": util::now_ms(),
            },
            "large_icon": "https://www.caminomedio.org/assets/img/logocompleto.png",
            "small_icon": "https://www.caminomedio.org/assets/img/logopeque.png",
            "android_sound": "notification",
            "ios_sound": "notification.wav",
            "android_channel_id": ANDROID_CHANNEL_ID,
            "existing_android_channel_id": ANDROID_CHANNEL_ID,
            "priority": 6,
            "ttl": 3600,
        });

        let response = self
            .http
            .post(NOTIFICATIONS_URL)
            .header("authorization", format!("Basic {}", self.credentials.rest_api_key))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(OneSignalError::Rejected(format!("{status}: {detail}")));
        }

        let receipt: NotificationReceipt = response.json().await?;
        debug!(
            "notification accepted: id={} recipients={}",
            receipt.id, receipt.recipients
        );
        Ok(receipt)
    }

    /// Register a web-push device with the vendor and return its player id.
    pub async fn register_device(&self) -> Result<String, OneSignalError> {
        let body = json!({
            "app_id": self.credentials.app_id,
            "device_type": WEB_PUSH_DEVICE_TYPE,
        });

        let response = self
            .http
            .post(PLAYERS_URL)
            .header("authorization", format!("Basic {}", self.credentials.rest_api_key))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(OneSignalError::Rejected(format!("{status}: {detail}")));
        }

        let receipt: PlayerReceipt = response.json().await?;
        info!("registered device ...{}", util::short_id(&receipt.id));
        Ok(receipt.id)
    }
}

#[async_trait]
impl PushVendor for OneSignalClient {
    fn ready(&self) -> watch::Receiver<bool> {
        self.ready_tx.subscribe()
    }

    fn opted_in(&self) -> bool {
        self.opted_in.load(Ordering::SeqCst)
    }

    async fn request_permission(&self) -> Result<String, GatewayError> {
        let player_id = self
            .register_device()
            .await
            .map_err(|err| GatewayError::Vendor(err.to_string()))?;
        self.opted_in.store(true, Ordering::SeqCst);
        Ok(player_id)
    }

    async fn opt_out(&self) -> Result<(), GatewayError> {
        self.opted_in.store(false, Ordering::SeqCst);
        debug!("push subscription opted out");
        Ok(())
    }

    async fn push(&self, subscription_id: &str, message: &str) -> Result<(), GatewayError> {
        self.send_notification(&[subscription_id.to_string()], message)
            .await
            .map(|_| ())
            .map_err(|err| GatewayError::Vendor(err.to_string()))
    }
}
