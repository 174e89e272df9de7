use serde::{Deserialize, Serialize};
use tokio::time::Duration;

pub const DEFAULT_INTERVAL_SECONDS: u32 = 300;
pub const DEFAULT_VOLUME: u8 = 70;
pub const DEFAULT_AUTO_STOP_DURATION: u32 = 10;
pub const DEFAULT_PUSH_BACKUP_INTERVAL_MINUTES: u32 = 5;

/// Fallback server-side session length in minutes when auto-stop is off.
pub const DEFAULT_SESSION_DURATION_MINUTES: u32 = 480;

/// Auto-stop durations up to this value count alerts; larger values are minutes.
pub const AUTO_STOP_COUNT_LIMIT: u32 = 60;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SoundType {
    #[default]
    Bell1,
    Bell2,
    Bowl,
    Chime,
}

impl SoundType {
    /// File stem of the bundled audio asset for this sound.
    pub fn asset_name(&self) -> &'static str {
        match self {
            SoundType::Bell1 => "bell1",
            SoundType::Bell2 => "bell2",
            SoundType::Bowl => "bowl",
            SoundType::Chime => "chime",
        }
    }
}

/// How an auto-stop duration value is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoStopThreshold {
    /// Stop once this many alerts were counted today.
    Alerts(u32),
    /// Stop once this many minutes of session time elapsed.
    Minutes(u32),
}

/// User preferences, persisted as a JSON blob and merged over defaults on load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AlertConfig {
    pub interval_seconds: u32,
    pub sound_type: SoundType,
    pub volume: u8,
    pub vibration_enabled: bool,
    pub push_notifications_enabled: bool,
    pub push_backup_interval_minutes: u32,
    pub auto_stop_enabled: bool,
    pub auto_stop_duration: u32,
    pub was_active: bool,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            interval_seconds: DEFAULT_INTERVAL_SECONDS,
            sound_type: SoundType::default(),
            volume: DEFAULT_VOLUME,
            vibration_enabled: true,
            push_notifications_enabled: false,
            push_backup_interval_minutes: DEFAULT_PUSH_BACKUP_INTERVAL_MINUTES,
            auto_stop_enabled: false,
            auto_stop_duration: DEFAULT_AUTO_STOP_DURATION,
            was_active: false,
        }
    }
}

impl AlertConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds as u64)
    }

    pub fn auto_stop_threshold(&self) -> AutoStopThreshold {
        if self.auto_stop_duration <= AUTO_STOP_COUNT_LIMIT {
            AutoStopThreshold::Alerts(self.auto_stop_duration)
        } else {
            AutoStopThreshold::Minutes(self.auto_stop_duration)
        }
    }

    /// Total duration advertised to the server-side backup: the auto-stop
    /// duration when enabled, otherwise an 8-hour default.
    pub fn server_backup_duration_minutes(&self) -> u64 {
        if self.auto_stop_enabled {
            self.auto_stop_duration as u64
        } else {
            DEFAULT_SESSION_DURATION_MINUTES as u64
        }
    }
}
