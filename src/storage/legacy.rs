use crate::reminder::{Priority, Reminder, ReminderStatus};
use crate::state::AppState;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use log::{info, warn};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

/// Reminder as written by older app versions: date and time kept apart.
#[derive(Debug, Clone, Deserialize)]
pub struct LegacyReminder {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub date: String,
    pub time: String,
    #[serde(default)]
    pub priority: String,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub voice_note: Option<String>,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct LegacyStore {
    #[serde(default)]
    pub reminders: Vec<LegacyReminder>,
    #[serde(default)]
    pub alarms: Vec<serde_json::Value>,
}

/// Migrate a legacy reminder to the new format
pub fn migrate_legacy_reminder(legacy: LegacyReminder) -> Option<Reminder> {
    let due_at = parse_legacy_due(&legacy.date, &legacy.time)?;
    let status = if legacy.active {
        ReminderStatus::Pending
    } else {
        ReminderStatus::Triggered
    };

    Some(Reminder {
        id: legacy.id,
        title: legacy.title,
        description: legacy.description,
        due_at,
        priority: Priority::parse(&legacy.priority),
        status,
        sound: legacy.voice_note,
        snoozed_from: None,
    })
}

fn parse_legacy_due(date: &str, time: &str) -> Option<NaiveDateTime> {
    let date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d").ok()?;
    let time = NaiveTime::parse_from_str(time.trim(), "%H:%M").ok()?;
    Some(date.and_time(time))
}

/// Old documents are objects with no `settings` or `next_id` key, and their alarms never
/// carry the current `time_of_day` / `repeat_rule` fields. A document that
/// fails that test is a damaged current-format one, not a migration source.
fn looks_legacy(value: &serde_json::Value) -> bool {
    let Some(doc) = value.as_object() else {
        return false;
    };
    if doc.contains_key("settings") || doc.contains_key("next_id") {
        return false;
    }
    let current_alarm = doc
        .get("alarms")
        .and_then(|alarms| alarms.as_array())
        .map(|alarms| {
            alarms.iter().any(|alarm| {
                alarm.get("time_of_day").is_some() || alarm.get("repeat_rule").is_some()
            })
        })
        .unwrap_or(false);
    let current_reminder = doc
        .get("reminders")
        .and_then(|reminders| reminders.as_array())
        .map(|reminders| reminders.iter().any(|r| r.get("due_at").is_some()))
        .unwrap_or(false);
    !current_alarm && !current_reminder
}

/// Try to parse content as legacy format and migrate if needed
pub fn try_migrate_legacy_data(content: &str, backup_path: Option<&PathBuf>) -> Option<AppState> {
    // Current-format documents are never migrated
    if serde_json::from_str::<AppState>(content).is_ok() {
        return None;
    }

    let value = serde_json::from_str::<serde_json::Value>(content).ok()?;
    if !looks_legacy(&value) {
        return None;
    }
    let legacy_store = serde_json::from_value::<LegacyStore>(value).ok()?;

    info!("Detected legacy data format, migrating...");

    // Create backup if path provided
    if let Some(backup) = backup_path {
        if let Err(e) = fs::write(backup, content) {
            warn!("Failed to create backup: {}", e);
        } else {
            info!("Created backup at {:?}", backup);
        }
    }

    let total = legacy_store.reminders.len();
    let reminders: Vec<Reminder> = legacy_store
        .reminders
        .into_iter()
        .filter_map(migrate_legacy_reminder)
        .collect();

    if reminders.len() < total {
        warn!(
            "Skipped {} legacy reminders with unreadable date/time",
            total - reminders.len()
        );
    }
    if !legacy_store.alarms.is_empty() {
        warn!(
            "Dropped {} legacy alarms (no known schema)",
            legacy_store.alarms.len()
        );
    }

    info!("Migrated {} reminders", reminders.len());

    Some(AppState {
        reminders,
        ..AppState::default()
    })
}
