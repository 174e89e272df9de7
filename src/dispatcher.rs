use std::sync::Arc;

use async_trait::async_trait;
use log::warn;
use rand::seq::SliceRandom;
use thiserror::Error;
use tokio::time::Duration;

use crate::config::{AlertConfig, SoundType};
use crate::gateway::SubscriptionGateway;
use crate::store::AlertStore;

/// Retries after the initial playback attempt before degrading.
pub const AUDIO_RETRY_LIMIT: u32 = 3;
pub const AUDIO_RETRY_BACKOFF: Duration = Duration::from_millis(250);

/// short-pause-long-pause-short
pub const VIBRATION_PATTERN: [u32; 5] = [200, 100, 400, 100, 200];
pub const EMERGENCY_VIBRATION_PATTERN: [u32; 7] = [400, 100, 400, 100, 400, 100, 400];
pub const NOTIFICATION_VIBRATION_PATTERN: [u32; 3] = [200, 100, 200];

pub const NOTIFICATION_TITLE: &str = "Momento de Mindfulness";
pub const NOTIFICATION_TAG: &str = "mindfulness-alert";
pub const NOTIFICATION_AUTO_CLOSE: Duration = Duration::from_secs(5);
pub const DEFAULT_NOTIFICATION_BODY: &str = "Toma un momento para respirar conscientemente";

pub const MINDFULNESS_MESSAGES: [&str; 8] = [
    "🧘‍♀️ Momento de respirar conscientemente",
    "🌸 Pausa y observa el momento presente",
    "🍃 Toma tres respiraciones profundas",
    "💫 Conecta contigo mismo/a",
    "🌊 Fluye con la tranquilidad del ahora",
    "🕯️ Enciende la luz de tu atención",
    "🦋 Suelta y permite que la paz llegue",
    "🌅 Abraza este momento de serenidad",
];

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("audio playback rejected: {0}")]
    Playback(String),
    #[error("channel unavailable: {0}")]
    Unavailable(String),
}

/// Signals read from the page at dispatch time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageState {
    pub visible: bool,
    pub focused: bool,
    pub mobile: bool,
}

/// Supplies the current page state; implemented by the embedding front-end.
pub trait Presence: Send + Sync {
    fn snapshot(&self) -> PageState;
}

#[async_trait]
pub trait AudioChannel: Send + Sync {
    async fn play(&self, sound: SoundType, volume: u8) -> Result<(), DeliveryError>;
}

pub trait VibrationChannel: Send + Sync {
    fn vibrate(&self, pattern: &[u32]);
}

pub trait NotificationChannel: Send + Sync {
    fn show(&self, notification: &LocalNotification);
}

pub trait VisualChannel: Send + Sync {
    fn flash(&self, intensity: FlashIntensity);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashIntensity {
    Pulse,
    Intense,
}

/// A notification shown directly by the page, as opposed to one delivered
/// through the push vendor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalNotification {
    pub title: String,
    pub body: String,
    pub tag: String,
    pub silent: bool,
    pub require_interaction: bool,
    pub vibration: Vec<u32>,
    pub auto_close: Duration,
}

/// Whether a dispatch counts toward statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    Counted,
    /// The immediate alert fired on start; never counted.
    Demonstration,
}

/// The delivery channels a dispatcher drives.
pub struct DeliveryChannels {
    pub audio: Arc<dyn AudioChannel>,
    pub vibration: Arc<dyn VibrationChannel>,
    pub notifications: Arc<dyn NotificationChannel>,
    pub visual: Arc<dyn VisualChannel>,
}

/// Selects delivery channels per alert from page visibility, window focus,
/// and subscription state, with fallback on failure.
pub struct DeliveryDispatcher {
    channels: DeliveryChannels,
    presence: Arc<dyn Presence>,
    gateway: Arc<SubscriptionGateway>,
    store: Arc<AlertStore>,
}

impl DeliveryDispatcher {
    pub fn new(
        channels: DeliveryChannels,
        presence: Arc<dyn Presence>,
        gateway: Arc<SubscriptionGateway>,
        store: Arc<AlertStore>,
    ) -> Self {
        Self {
            channels,
            presence,
            gateway,
            store,
        }
    }

    pub async fn dispatch(&self, kind: AlertKind) {
        let config = self.store.config();
        let page = self.presence.snapshot();
        let subscribed = self.gateway.opted_in();

        match (page.visible, page.focused) {
            (true, true) => {
                self.play_with_retry(&config).await;
                if config.vibration_enabled {
                    self.channels.vibration.vibrate(&VIBRATION_PATTERN);
                }
                self.channels.visual.flash(FlashIntensity::Pulse);
            }
            (true, false) => {
                self.play_with_retry(&config).await;
                if config.vibration_enabled && page.mobile {
                    self.channels
                        .vibration
                        .vibrate(&EMERGENCY_VIBRATION_PATTERN);
                }
                self.channels
                    .notifications
                    .show(&self.local_notification(&config, true));
            }
            (false, _) if subscribed => {
                // The page may still be audible in a background tab.
                self.play_with_retry(&config).await;
                if config.vibration_enabled {
                    self.channels
                        .vibration
                        .vibrate(&EMERGENCY_VIBRATION_PATTERN);
                }
                if let Err(err) = self.gateway.send_push(pick_message()).await {
                    warn!("push delivery failed, local backup only: {err}");
                }
                // Trailing backup in case the push never arrives.
                self.channels
                    .notifications
                    .show(&self.local_notification(&config, true));
            }
            (false, _) => {
                self.channels
                    .notifications
                    .show(&self.local_notification(&config, false));
            }
        }

        if kind == AlertKind::Counted {
            if let Err(err) = self.store.record_alert() {
                warn!("failed to persist alert counters: {err}");
            }
        }
    }

    /// Play the alert sound, retrying on rejection, then degrade to an
    /// emergency vibration and an intense flash. Never fatal.
    async fn play_with_retry(&self, config: &AlertConfig) -> bool {
        for attempt in 0..=AUDIO_RETRY_LIMIT {
            match self
                .channels
                .audio
                .play(config.sound_type, config.volume)
                .await
            {
                Ok(()) => return true,
                Err(err) => {
                    warn!(
                        "audio playback failed (attempt {}/{}): {err}",
                        attempt + 1,
                        AUDIO_RETRY_LIMIT + 1
                    );
                    if attempt < AUDIO_RETRY_LIMIT {
                        tokio::time::sleep(AUDIO_RETRY_BACKOFF).await;
                    }
                }
            }
        }
        self.channels
            .vibration
            .vibrate(&EMERGENCY_VIBRATION_PATTERN);
        self.channels.visual.flash(FlashIntensity::Intense);
        false
    }

    fn local_notification(&self, config: &AlertConfig, silent: bool) -> LocalNotification {
        LocalNotification {
            title: NOTIFICATION_TITLE.to_string(),
            body: DEFAULT_NOTIFICATION_BODY.to_string(),
            tag: NOTIFICATION_TAG.to_string(),
            silent,
            require_interaction: false,
            vibration: if config.vibration_enabled {
                NOTIFICATION_VIBRATION_PATTERN.to_vec()
            } else {
                Vec::new()
            },
            auto_close: NOTIFICATION_AUTO_CLOSE,
        }
    }
}

pub fn pick_message() -> &'static str {
    MINDFULNESS_MESSAGES
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(DEFAULT_NOTIFICATION_BODY)
}

#[cfg(test)]
mod tests {
    use super::{
        AlertKind, AudioChannel, DeliveryChannels, DeliveryDispatcher, DeliveryError,
        FlashIntensity, LocalNotification, NotificationChannel, PageState, Presence,
        VibrationChannel, VisualChannel, AUDIO_RETRY_LIMIT, EMERGENCY_VIBRATION_PATTERN,
    };
    use crate::config::SoundType;
    use crate::gateway::{GatewayError, PushVendor, SubscriptionGateway};
    use crate::store::AlertStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::sync::watch;

    #[derive(Default)]
    struct Recorder {
        plays: AtomicU32,
        audio_fails: AtomicBool,
        vibrations: Mutex<Vec<Vec<u32>>>,
        notifications: Mutex<Vec<LocalNotification>>,
        flashes: Mutex<Vec<FlashIntensity>>,
    }

    #[async_trait]
    impl AudioChannel for Recorder {
        async fn play(&self, _sound: SoundType, _volume: u8) -> Result<(), DeliveryError> {
            self.plays.fetch_add(1, Ordering::SeqCst);
            if self.audio_fails.load(Ordering::SeqCst) {
                Err(DeliveryError::Playback("NotAllowedError".to_string()))
            } else {
                Ok(())
            }
        }
    }

    impl VibrationChannel for Recorder {
        fn vibrate(&self, pattern: &[u32]) {
            self.vibrations.lock().unwrap().push(pattern.to_vec());
        }
    }

    impl NotificationChannel for Recorder {
        fn show(&self, notification: &LocalNotification) {
            self.notifications.lock().unwrap().push(notification.clone());
        }
    }

    impl VisualChannel for Recorder {
        fn flash(&self, intensity: FlashIntensity) {
            self.flashes.lock().unwrap().push(intensity);
        }
    }

    struct FixedPresence(PageState);

    impl Presence for FixedPresence {
        fn snapshot(&self) -> PageState {
            self.0
        }
    }

    struct FakeVendor {
        ready_tx: watch::Sender<bool>,
        opted: AtomicBool,
        pushes: Mutex<Vec<String>>,
    }

    impl FakeVendor {
        fn new(opted: bool) -> Self {
            let (ready_tx, _) = watch::channel(true);
            Self {
                ready_tx,
                opted: AtomicBool::new(opted),
                pushes: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl PushVendor for FakeVendor {
        fn ready(&self) -> watch::Receiver<bool> {
            self.ready_tx.subscribe()
        }

        fn opted_in(&self) -> bool {
            self.opted.load(Ordering::SeqCst)
        }

        async fn request_permission(&self) -> Result<String, GatewayError> {
            self.opted.store(true, Ordering::SeqCst);
            Ok("player-abc".to_string())
        }

        async fn opt_out(&self) -> Result<(), GatewayError> {
            self.opted.store(false, Ordering::SeqCst);
            Ok(())
        }

        async fn push(&self, _subscription_id: &str, message: &str) -> Result<(), GatewayError> {
            self.pushes.lock().unwrap().push(message.to_string());
            Ok(())
        }
    }

    struct Harness {
        recorder: Arc<Recorder>,
        vendor: Arc<FakeVendor>,
        dispatcher: DeliveryDispatcher,
        store: Arc<AlertStore>,
        _dir: tempfile::TempDir,
    }

    async fn harness(page: PageState, subscribed: bool) -> Harness {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Arc::new(AlertStore::open(dir.path()).expect("open store"));
        let recorder = Arc::new(Recorder::default());
        let vendor = Arc::new(FakeVendor::new(false));
        let gateway = Arc::new(SubscriptionGateway::new(vendor.clone(), None));
        if subscribed {
            gateway.subscribe().await.expect("subscribe");
        }
        let channels = DeliveryChannels {
            audio: recorder.clone(),
            vibration: recorder.clone(),
            notifications: recorder.clone(),
            visual: recorder.clone(),
        };
        let dispatcher = DeliveryDispatcher::new(
            channels,
            Arc::new(FixedPresence(page)),
            gateway,
            store.clone(),
        );
        Harness {
            recorder,
            vendor,
            dispatcher,
            store,
            _dir: dir,
        }
    }

    fn page(visible: bool, focused: bool) -> PageState {
        PageState {
            visible,
            focused,
            mobile: false,
        }
    }

    #[tokio::test]
    async fn visible_focused_plays_audio_and_vibrates_without_push() {
        let h = harness(page(true, true), true).await;
        h.dispatcher.dispatch(AlertKind::Counted).await;

        assert_eq!(h.recorder.plays.load(Ordering::SeqCst), 1);
        assert_eq!(h.recorder.vibrations.lock().unwrap().len(), 1);
        assert_eq!(
            h.recorder.flashes.lock().unwrap().as_slice(),
            &[FlashIntensity::Pulse]
        );
        assert!(h.vendor.pushes.lock().unwrap().is_empty());
        assert!(h.recorder.notifications.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn visible_unfocused_adds_notification_backup() {
        let h = harness(page(true, false), false).await;
        h.dispatcher.dispatch(AlertKind::Counted).await;

        assert_eq!(h.recorder.plays.load(Ordering::SeqCst), 1);
        let notifications = h.recorder.notifications.lock().unwrap();
        assert_eq!(notifications.len(), 1);
        assert!(notifications[0].silent);
        // Emergency vibration is mobile-only in this row.
        assert!(h.recorder.vibrations.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn hidden_subscribed_sends_push_with_local_backup() {
        let h = harness(page(false, false), true).await;
        h.dispatcher.dispatch(AlertKind::Counted).await;

        assert_eq!(h.vendor.pushes.lock().unwrap().len(), 1);
        // Not relying solely on audio: a trailing local backup is shown.
        let notifications = h.recorder.notifications.lock().unwrap();
        assert_eq!(notifications.len(), 1);
        assert!(notifications[0].silent);
        assert_eq!(h.recorder.plays.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn hidden_unsubscribed_shows_sounded_notification_only() {
        let h = harness(page(false, false), false).await;
        h.dispatcher.dispatch(AlertKind::Counted).await;

        assert!(h.vendor.pushes.lock().unwrap().is_empty());
        assert_eq!(h.recorder.plays.load(Ordering::SeqCst), 0);
        let notifications = h.recorder.notifications.lock().unwrap();
        assert_eq!(notifications.len(), 1);
        assert!(!notifications[0].silent);
    }

    #[tokio::test(start_paused = true)]
    async fn audio_failure_retries_then_degrades() {
        let h = harness(page(true, true), false).await;
        h.recorder.audio_fails.store(true, Ordering::SeqCst);
        h.dispatcher.dispatch(AlertKind::Counted).await;

        assert_eq!(
            h.recorder.plays.load(Ordering::SeqCst),
            AUDIO_RETRY_LIMIT + 1
        );
        let vibrations = h.recorder.vibrations.lock().unwrap();
        assert!(vibrations
            .iter()
            .any(|pattern| pattern.as_slice() == &EMERGENCY_VIBRATION_PATTERN[..]));
        assert!(h
            .recorder
            .flashes
            .lock()
            .unwrap()
            .contains(&FlashIntensity::Intense));
    }

    #[tokio::test]
    async fn counted_alerts_increment_stats_exactly_once() {
        let h = harness(page(true, true), false).await;
        h.dispatcher.dispatch(AlertKind::Counted).await;
        h.dispatcher.dispatch(AlertKind::Counted).await;

        let stats = h.store.stats();
        assert_eq!(stats.alerts_today, 2);
        assert_eq!(stats.total_alerts, 2);
    }

    #[tokio::test]
    async fn demonstration_alerts_are_never_counted() {
        let h = harness(page(true, true), false).await;
        h.dispatcher.dispatch(AlertKind::Demonstration).await;

        let stats = h.store.stats();
        assert_eq!(stats.alerts_today, 0);
        assert_eq!(stats.total_alerts, 0);
        // The demonstration still delivers.
        assert_eq!(h.recorder.plays.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn vibration_respects_config_toggle() {
        let h = harness(page(true, true), false).await;
        h.store
            .update_config(|config| config.vibration_enabled = false)
            .expect("update config");
        h.dispatcher.dispatch(AlertKind::Counted).await;

        assert!(h.recorder.vibrations.lock().unwrap().is_empty());
    }
}
