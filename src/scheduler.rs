use std::sync::{Arc, Mutex};

use log::{debug, info, warn};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::{Duration, Instant};

use crate::config::{AlertConfig, AutoStopThreshold};
use crate::dispatcher::{AlertKind, DeliveryDispatcher};
use crate::gateway::SubscriptionGateway;
use crate::store::AlertStore;

/// Delay before the demonstration alert fired on start.
pub const DEMONSTRATION_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("alert interval must be at least one second")]
    InvalidInterval,
}

#[derive(Default)]
struct SchedulerInner {
    active: bool,
    session_start: Option<Instant>,
    cancel: Option<mpsc::Sender<bool>>,
}

/// Owns the single repeating alert timer.
///
/// Starting replaces any prior timer, so at most one alert loop runs per
/// scheduler instance. The timer is a re-armed single shot: each fire invokes
/// the dispatcher and schedules the next one.
pub struct AlertScheduler {
    dispatcher: Arc<DeliveryDispatcher>,
    gateway: Arc<SubscriptionGateway>,
    store: Arc<AlertStore>,
    inner: Arc<Mutex<SchedulerInner>>,
}

impl AlertScheduler {
    pub fn new(
        dispatcher: Arc<DeliveryDispatcher>,
        gateway: Arc<SubscriptionGateway>,
        store: Arc<AlertStore>,
    ) -> Self {
        Self {
            dispatcher,
            gateway,
            store,
            inner: Arc::new(Mutex::new(SchedulerInner::default())),
        }
    }

    pub fn is_active(&self) -> bool {
        self.inner.lock().unwrap().active
    }

    pub fn session_elapsed(&self) -> Option<Duration> {
        self.inner
            .lock()
            .unwrap()
            .session_start
            .map(|start| start.elapsed())
    }

    /// Arm the alert loop from the stored config. Replaces a running loop.
    pub async fn start(&self) -> Result<(), SchedulerError> {
        let config = self.store.config();
        if config.interval_seconds == 0 {
            return Err(SchedulerError::InvalidInterval);
        }

        self.stop().await;

        let (cancel_tx, cancel_rx) = mpsc::channel(1);
        let session_start = Instant::now();
        {
            let mut inner = self.inner.lock().unwrap();
            inner.active = true;
            inner.session_start = Some(session_start);
            inner.cancel = Some(cancel_tx);
        }

        if let Err(err) = self.store.update_config(|stored| stored.was_active = true) {
            warn!("failed to persist session state: {err}");
        }

        // The vendor's opted-in flag decides whether the server-side backup
        // runs; the config field only mirrors the user's checkbox.
        if config.push_notifications_enabled && self.gateway.opted_in() {
            if let Err(err) = self.gateway.schedule_backup(&config).await {
                warn!("failed to schedule server-side backup: {err}");
            }
        }

        info!("alerts armed every {}s", config.interval_seconds);
        tokio::spawn(run_alert_loop(
            config,
            self.dispatcher.clone(),
            self.gateway.clone(),
            self.store.clone(),
            self.inner.clone(),
            cancel_rx,
            session_start,
        ));
        Ok(())
    }

    /// Cancel the pending timer. Silent no-op when already stopped.
    pub async fn stop(&self) {
        let cancel = {
            let mut inner = self.inner.lock().unwrap();
            if !inner.active {
                inner.cancel.take();
                None
            } else {
                inner.active = false;
                inner.cancel.take()
            }
        };
        let Some(cancel) = cancel else { return };
        cancel.send(true).await.ok();

        if let Err(err) = self.store.update_config(|stored| stored.was_active = false) {
            warn!("failed to persist session state: {err}");
        }
        if let Err(err) = self.gateway.cancel_backup().await {
            warn!("failed to cancel server-side backup: {err}");
        }
        info!("alerts stopped");
    }

    /// Stop-then-start; interval changes while active go through here.
    pub async fn restart(&self) -> Result<(), SchedulerError> {
        self.stop().await;
        self.start().await
    }

    /// Re-arm the loop when the persisted config says the last session was
    /// still active. Returns whether a session was restored.
    pub async fn restore(&self) -> Result<bool, SchedulerError> {
        if !self.store.config().was_active {
            return Ok(false);
        }
        debug!("restoring previously active session");
        self.start().await?;
        Ok(true)
    }
}

async fn run_alert_loop(
    config: AlertConfig,
    dispatcher: Arc<DeliveryDispatcher>,
    gateway: Arc<SubscriptionGateway>,
    store: Arc<AlertStore>,
    inner: Arc<Mutex<SchedulerInner>>,
    mut cancel: mpsc::Receiver<bool>,
    session_start: Instant,
) {
    // Demonstration delivery shortly after activation; never counted.
    tokio::select! {
        _ = tokio::time::sleep(DEMONSTRATION_DELAY) => {
            dispatcher.dispatch(AlertKind::Demonstration).await;
        }
        _ = cancel.recv() => {
            debug!("alert loop canceled before demonstration");
            return;
        }
    }
    if auto_stop_reached(&config, &store, session_start) {
        finish(&gateway, &store, &inner).await;
        return;
    }

    let interval = config.interval();
    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = cancel.recv() => {
                debug!("alert loop canceled");
                return;
            }
        }

        dispatcher.dispatch(AlertKind::Counted).await;

        if auto_stop_reached(&config, &store, session_start) {
            info!("auto-stop threshold reached, stopping alerts");
            finish(&gateway, &store, &inner).await;
            return;
        }
    }
}

fn auto_stop_reached(config: &AlertConfig, store: &AlertStore, session_start: Instant) -> bool {
    if !config.auto_stop_enabled {
        return false;
    }
    match config.auto_stop_threshold() {
        AutoStopThreshold::Alerts(count) => store.stats().alerts_today >= count,
        AutoStopThreshold::Minutes(minutes) => {
            session_start.elapsed() >= Duration::from_secs(minutes as u64 * 60)
        }
    }
}

async fn finish(
    gateway: &SubscriptionGateway,
    store: &AlertStore,
    inner: &Mutex<SchedulerInner>,
) {
    {
        let mut inner = inner.lock().unwrap();
        inner.active = false;
        inner.cancel = None;
    }
    if let Err(err) = store.update_config(|stored| stored.was_active = false) {
        warn!("failed to persist session state: {err}");
    }
    if let Err(err) = gateway.cancel_backup().await {
        warn!("failed to cancel server-side backup: {err}");
    }
}
