use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Delivery counters, persisted as a JSON blob after every recorded alert.
///
/// `alerts_today` is only meaningful relative to `last_reset_date`; callers
/// normalize against the current day before reading or writing it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AlertStats {
    pub alerts_today: u32,
    pub total_alerts: u64,
    pub last_reset_date: NaiveDate,
}

impl AlertStats {
    pub fn for_day(today: NaiveDate) -> Self {
        Self {
            alerts_today: 0,
            total_alerts: 0,
            last_reset_date: today,
        }
    }

    /// Zero the daily counter when the calendar day changed since the last
    /// reset. Returns whether a reset happened.
    pub fn normalize(&mut self, today: NaiveDate) -> bool {
        if self.last_reset_date == today {
            return false;
        }
        self.alerts_today = 0;
        self.last_reset_date = today;
        true
    }

    pub fn record(&mut self, today: NaiveDate) {
        self.normalize(today);
        self.alerts_today = self.alerts_today.saturating_add(1);
        self.total_alerts = self.total_alerts.saturating_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::AlertStats;
    use chrono::NaiveDate;

    fn day(year: i32, month: u32, dayn: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, dayn).expect("valid date")
    }

    #[test]
    fn resets_exactly_once_per_day_boundary() {
        let mut stats = AlertStats {
            alerts_today: 7,
            total_alerts: 42,
            last_reset_date: day(2024, 3, 1),
        };

        assert!(stats.normalize(day(2024, 3, 2)));
        assert_eq!(stats.alerts_today, 0);
        assert_eq!(stats.total_alerts, 42);

        // Same day again: no further reset.
        assert!(!stats.normalize(day(2024, 3, 2)));
        stats.alerts_today = 3;
        assert!(!stats.normalize(day(2024, 3, 2)));
        assert_eq!(stats.alerts_today, 3);
    }

    #[test]
    fn record_counts_both_totals() {
        let mut stats = AlertStats::for_day(day(2024, 3, 1));
        stats.record(day(2024, 3, 1));
        stats.record(day(2024, 3, 1));
        assert_eq!(stats.alerts_today, 2);
        assert_eq!(stats.total_alerts, 2);
    }

    #[test]
    fn record_across_boundary_resets_daily_counter() {
        let mut stats = AlertStats::for_day(day(2024, 3, 1));
        stats.record(day(2024, 3, 1));
        stats.record(day(2024, 3, 2));
        assert_eq!(stats.alerts_today, 1);
        assert_eq!(stats.total_alerts, 2);
        assert_eq!(stats.last_reset_date, day(2024, 3, 2));
    }
}
