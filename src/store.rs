use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use chrono::Local;
use log::warn;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::config::AlertConfig;
use crate::stats::AlertStats;

/// Fixed blob names, kept from the browser-storage keys they replace.
pub const CONFIG_STORE_KEY: &str = "mindfulness-alerts-config";
pub const STATS_STORE_KEY: &str = "mindfulness-alerts-stats";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// File-backed store for the config and stats blobs.
///
/// Reads that fail to parse fall back to defaults; every mutation is persisted
/// immediately. Stats are normalized against the current day on open.
#[derive(Debug)]
pub struct AlertStore {
    config_path: PathBuf,
    stats_path: PathBuf,
    config: RwLock<AlertConfig>,
    stats: RwLock<AlertStats>,
}

impl AlertStore {
    pub fn open(base_dir: impl Into<PathBuf>) -> StoreResult<Self> {
        let base_dir = base_dir.into();
        fs::create_dir_all(&base_dir)?;
        let config_path = base_dir.join(format!("{CONFIG_STORE_KEY}.json"));
        let stats_path = base_dir.join(format!("{STATS_STORE_KEY}.json"));

        let config: AlertConfig = read_blob(&config_path);
        let mut stats: AlertStats = read_blob(&stats_path);
        if stats.normalize(Local::now().date_naive()) {
            write_blob(&stats_path, &stats)?;
        }

        Ok(Self {
            config_path,
            stats_path,
            config: RwLock::new(config),
            stats: RwLock::new(stats),
        })
    }

    pub fn config(&self) -> AlertConfig {
        self.config.read().unwrap().clone()
    }

    /// Apply a mutation to the config and persist the result.
    pub fn update_config<F>(&self, apply: F) -> StoreResult<AlertConfig>
    where
        F: FnOnce(&mut AlertConfig),
    {
        let mut config = self.config.write().unwrap();
        apply(&mut config);
        write_blob(&self.config_path, &*config)?;
        Ok(config.clone())
    }

    pub fn stats(&self) -> AlertStats {
        let mut stats = self.stats.write().unwrap();
        if stats.normalize(Local::now().date_naive()) {
            if let Err(err) = write_blob(&self.stats_path, &*stats) {
                warn!("failed to persist stats rollover: {err}");
            }
        }
        stats.clone()
    }

    /// Count one delivered alert and persist the counters.
    pub fn record_alert(&self) -> StoreResult<AlertStats> {
        let mut stats = self.stats.write().unwrap();
        stats.record(Local::now().date_naive());
        write_blob(&self.stats_path, &*stats)?;
        Ok(stats.clone())
    }

    pub fn reset_stats(&self) -> StoreResult<AlertStats> {
        let mut stats = self.stats.write().unwrap();
        *stats = AlertStats::for_day(Local::now().date_naive());
        write_blob(&self.stats_path, &*stats)?;
        Ok(stats.clone())
    }
}

fn read_blob<T: DeserializeOwned + Default>(path: &Path) -> T {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(_) => return T::default(),
    };
    match serde_json::from_str(&contents) {
        Ok(value) => value,
        Err(err) => {
            warn!("unreadable blob at {}, using defaults: {err}", path.display());
            T::default()
        }
    }
}

fn write_blob<T: Serialize>(path: &Path, value: &T) -> StoreResult<()> {
    let contents = serde_json::to_string_pretty(value)?;
    fs::write(path, contents)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{AlertStore, CONFIG_STORE_KEY, STATS_STORE_KEY};
    use crate::config::{AlertConfig, SoundType};
    use crate::stats::AlertStats;
    use chrono::{Duration, Local};
    use std::fs;

    #[test]
    fn empty_dir_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = AlertStore::open(dir.path()).expect("open store");
        assert_eq!(store.config(), AlertConfig::default());
        assert_eq!(store.stats().alerts_today, 0);
        assert_eq!(store.stats().total_alerts, 0);
    }

    #[test]
    fn corrupted_config_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(
            dir.path().join(format!("{CONFIG_STORE_KEY}.json")),
            "{not json",
        )
        .expect("write garbage");

        let store = AlertStore::open(dir.path()).expect("open store");
        assert_eq!(store.config(), AlertConfig::default());
    }

    #[test]
    fn config_survives_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        {
            let store = AlertStore::open(dir.path()).expect("open store");
            store
                .update_config(|config| {
                    config.interval_seconds = 45;
                    config.sound_type = SoundType::Chime;
                    config.volume = 25;
                })
                .expect("update config");
        }

        let store = AlertStore::open(dir.path()).expect("reopen store");
        let config = store.config();
        assert_eq!(config.interval_seconds, 45);
        assert_eq!(config.sound_type, SoundType::Chime);
        assert_eq!(config.volume, 25);
    }

    #[test]
    fn stale_stats_roll_over_on_open() {
        let dir = tempfile::tempdir().expect("tempdir");
        let yesterday = Local::now().date_naive() - Duration::days(1);
        let stale = AlertStats {
            alerts_today: 9,
            total_alerts: 100,
            last_reset_date: yesterday,
        };
        fs::write(
            dir.path().join(format!("{STATS_STORE_KEY}.json")),
            serde_json::to_string(&stale).expect("serialize"),
        )
        .expect("write stats");

        let store = AlertStore::open(dir.path()).expect("open store");
        let stats = store.stats();
        assert_eq!(stats.alerts_today, 0);
        assert_eq!(stats.total_alerts, 100);
        assert_eq!(stats.last_reset_date, Local::now().date_naive());
    }

    #[test]
    fn record_alert_persists_counters() {
        let dir = tempfile::tempdir().expect("tempdir");
        {
            let store = AlertStore::open(dir.path()).expect("open store");
            store.record_alert().expect("record");
            store.record_alert().expect("record");
        }

        let store = AlertStore::open(dir.path()).expect("reopen store");
        assert_eq!(store.stats().alerts_today, 2);
        assert_eq!(store.stats().total_alerts, 2);
    }

    #[test]
    fn reset_stats_zeroes_everything() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = AlertStore::open(dir.path()).expect("open store");
        store.record_alert().expect("record");
        store.reset_stats().expect("reset");
        assert_eq!(store.stats().alerts_today, 0);
        assert_eq!(store.stats().total_alerts, 0);
    }
}
