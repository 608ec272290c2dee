//! Application configuration constants
//!
//! Centralized configuration for the reminder engine.

use log::warn;
use std::path::PathBuf;
use std::time::Duration;

/// Seconds between scheduler ticks
pub const TICK_INTERVAL_SECS: u64 = 30;

/// Offset used by the tray "quick reminder" action
pub const QUICK_REMINDER_MINUTES: i64 = 5;

/// Snooze durations offered on an alert
pub const SNOOZE_CHOICES_MINUTES: [i64; 4] = [5, 10, 15, 30];

/// Longest accepted snooze (one day)
pub const MAX_SNOOZE_MINUTES: i64 = 24 * 60;

/// Directory under the per-user data dir
pub const APP_DIR_NAME: &str = "ReminderApp";

/// Current-format state document
pub const STATE_FILE_NAME: &str = "reminders.json";

/// Document written by older versions of the app
pub const LEGACY_FILE_NAME: &str = "reminder_app_data.json";

/// Copy of the legacy document kept after migration
pub const LEGACY_BACKUP_FILE_NAME: &str = "reminders_backup_v1.json";

/// Environment overrides read by [`EngineConfig::from_env`]
pub const DATA_DIR_ENV: &str = "REMINDER_DATA_DIR";
pub const TICK_SECS_ENV: &str = "REMINDER_TICK_SECS";

/// Runtime configuration for one engine instance.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub data_dir: PathBuf,
    pub tick_interval: Duration,
    /// Document from older versions, imported when no state exists yet
    pub legacy_path: Option<PathBuf>,
}

impl EngineConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            tick_interval: Duration::from_secs(TICK_INTERVAL_SECS),
            legacy_path: None,
        }
    }

    pub fn with_legacy_path(mut self, legacy_path: impl Into<PathBuf>) -> Self {
        self.legacy_path = Some(legacy_path.into());
        self
    }

    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    /// Defaults, overridden by `REMINDER_DATA_DIR` / `REMINDER_TICK_SECS`.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(dir) = std::env::var_os(DATA_DIR_ENV) {
            config.data_dir = PathBuf::from(dir);
        }

        if let Ok(raw) = std::env::var(TICK_SECS_ENV) {
            match parse_tick_secs(&raw) {
                Some(secs) => config.tick_interval = Duration::from_secs(secs),
                None => warn!(
                    "Ignoring {}={:?}, using {}s",
                    TICK_SECS_ENV, raw, TICK_INTERVAL_SECS
                ),
            }
        }

        config
    }

    pub fn state_path(&self) -> PathBuf {
        self.data_dir.join(STATE_FILE_NAME)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(std::env::temp_dir)
            .join(APP_DIR_NAME);
        let mut config = Self::new(data_dir);
        config.legacy_path = dirs::home_dir().map(|home| home.join(LEGACY_FILE_NAME));
        config
    }
}

fn parse_tick_secs(raw: &str) -> Option<u64> {
    raw.trim().parse::<u64>().ok().filter(|secs| *secs >= 1)
}
