use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use log::{debug, info, warn};
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::Duration;

use crate::config::AlertConfig;
use crate::models::{CancelRequest, ScheduleRequest};
use crate::util;

/// How long dependents wait for the vendor to finish initializing.
pub const READY_TIMEOUT: Duration = Duration::from_secs(15);

pub const TEST_MESSAGE: &str = "🧘 Momento de Atención Plena - Toma una pausa consciente";

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("push vendor not ready after {0:?}")]
    ReadyTimeout(Duration),
    #[error("push vendor initialization failed")]
    VendorUnavailable,
    #[error("no active push subscription")]
    NotSubscribed,
    #[error("vendor request failed: {0}")]
    Vendor(String),
    #[error("relay request failed: {0}")]
    Relay(String),
}

/// Seam over the push vendor SDK. Readiness is a watch channel the vendor
/// resolves once when its initialization completes.
#[async_trait]
pub trait PushVendor: Send + Sync {
    fn ready(&self) -> watch::Receiver<bool>;

    fn opted_in(&self) -> bool;

    /// Request push permission; returns the subscription id on success.
    async fn request_permission(&self) -> Result<String, GatewayError>;

    async fn opt_out(&self) -> Result<(), GatewayError>;

    async fn push(&self, subscription_id: &str, message: &str) -> Result<(), GatewayError>;
}

/// Facade over the push vendor plus the optional server-side backup relay.
///
/// The vendor's opted-in flag is the single source of truth for subscription
/// state; `AlertConfig.push_notifications_enabled` only mirrors it.
pub struct SubscriptionGateway {
    vendor: Arc<dyn PushVendor>,
    http: reqwest::Client,
    relay_url: Option<String>,
    subscription_id: RwLock<Option<String>>,
    backup_active: AtomicBool,
}

impl SubscriptionGateway {
    pub fn new(vendor: Arc<dyn PushVendor>, relay_url: Option<String>) -> Self {
        Self {
            vendor,
            http: reqwest::Client::new(),
            relay_url,
            subscription_id: RwLock::new(None),
            backup_active: AtomicBool::new(false),
        }
    }

    pub fn is_ready(&self) -> bool {
        *self.vendor.ready().borrow()
    }

    pub fn opted_in(&self) -> bool {
        self.vendor.opted_in()
    }

    pub fn subscription_id(&self) -> Option<String> {
        self.subscription_id.read().unwrap().clone()
    }

    /// Wait for the vendor to report readiness, bounded by `timeout`.
    pub async fn await_ready(&self, timeout: Duration) -> Result<(), GatewayError> {
        let mut ready = self.vendor.ready();
        if *ready.borrow() {
            return Ok(());
        }
        let result = match tokio::time::timeout(timeout, ready.wait_for(|ready| *ready)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(_)) => Err(GatewayError::VendorUnavailable),
            Err(_) => Err(GatewayError::ReadyTimeout(timeout)),
        };
        result
    }

    /// Request push permission from the vendor and cache the subscription id.
    pub async fn subscribe(&self) -> Result<String, GatewayError> {
        self.await_ready(READY_TIMEOUT).await?;
        let subscription_id = self.vendor.request_permission().await?;
        info!("push subscription active ...{}", util::short_id(&subscription_id));
        *self.subscription_id.write().unwrap() = Some(subscription_id.clone());
        Ok(subscription_id)
    }

    /// Best-effort opt-out; vendor failures are logged, never surfaced.
    pub async fn unsubscribe(&self) {
        if let Err(err) = self.vendor.opt_out().await {
            warn!("push opt-out failed: {err}");
        }
        *self.subscription_id.write().unwrap() = None;
    }

    /// Deliver one push through the vendor. Callers fall back to a local
    /// notification when this fails.
    pub async fn send_push(&self, message: &str) -> Result<(), GatewayError> {
        if !self.is_ready() {
            return Err(GatewayError::VendorUnavailable);
        }
        if !self.vendor.opted_in() {
            return Err(GatewayError::NotSubscribed);
        }
        let subscription_id = self
            .subscription_id()
            .ok_or(GatewayError::NotSubscribed)?;
        self.vendor.push(&subscription_id, message).await
    }

    pub async fn send_test(&self) -> Result<(), GatewayError> {
        self.send_push(TEST_MESSAGE).await
    }

    /// Ask the relay to run a server-side backup schedule for this
    /// subscription. Skipped silently when no relay is configured.
    pub async fn schedule_backup(&self, config: &AlertConfig) -> Result<(), GatewayError> {
        let Some(base_url) = &self.relay_url else {
            debug!("no relay configured, skipping server-side backup");
            return Ok(());
        };
        let user_id = self
            .subscription_id()
            .ok_or(GatewayError::NotSubscribed)?;
        let request = ScheduleRequest {
            user_id,
            interval_minutes: config.push_backup_interval_minutes as u64,
            total_duration: Some(config.server_backup_duration_minutes()),
            start_time: Some(util::now_ms()),
        };

        let response = self
            .http
            .post(format!("{base_url}/api/schedule-mindfulness-alerts"))
            .json(&request)
            .send()
            .await
            .map_err(|err| GatewayError::Relay(err.to_string()))?;
        if !response.status().is_success() {
            return Err(GatewayError::Relay(format!(
                "relay returned {}",
                response.status()
            )));
        }
        self.backup_active.store(true, Ordering::SeqCst);
        info!(
            "server-side backup scheduled every {} minutes",
            config.push_backup_interval_minutes
        );
        Ok(())
    }

    /// Cancel the server-side backup if one was scheduled.
    pub async fn cancel_backup(&self) -> Result<(), GatewayError> {
        if !self.backup_active.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        let Some(base_url) = &self.relay_url else {
            return Ok(());
        };
        let user_id = self
            .subscription_id()
            .ok_or(GatewayError::NotSubscribed)?;

        let response = self
            .http
            .post(format!("{base_url}/api/cancel-mindfulness-alerts"))
            .json(&CancelRequest { user_id })
            .send()
            .await
            .map_err(|err| GatewayError::Relay(err.to_string()))?;
        if !response.status().is_success() {
            return Err(GatewayError::Relay(format!(
                "relay returned {}",
                response.status()
            )));
        }
        debug!("server-side backup canceled");
        Ok(())
    }
}
