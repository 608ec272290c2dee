use crate::alarm::Alarm;
use crate::reminder::Reminder;
use serde::{Deserialize, Serialize};

/// Points at a reminder or an alarm, e.g. the source of a snooze.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum ItemRef {
    Reminder(i64),
    Alarm(i64),
}

/// Window and alert preferences, owned by the state document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    #[serde(default)]
    pub always_on_top: bool,
    #[serde(default = "default_true")]
    pub window_visible: bool,
    #[serde(default = "default_true")]
    pub fullscreen_alerts: bool,
    #[serde(default)]
    pub custom_tone: Option<String>,
}

fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            always_on_top: false,
            window_visible: true,
            fullscreen_alerts: true,
            custom_tone: None,
        }
    }
}

/// Root aggregate persisted as one document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AppState {
    #[serde(default)]
    pub reminders: Vec<Reminder>,
    #[serde(default)]
    pub alarms: Vec<Alarm>,
    #[serde(default)]
    pub settings: Settings,
    /// Lowest id never handed out; deleted ids are not reused.
    #[serde(default)]
    pub next_id: i64,
}

impl AppState {
    /// Hand out a fresh id, shared between reminders and alarms so an
    /// [`ItemRef`] stays unambiguous.
    ///
    /// Documents written before the counter existed start above the largest
    /// id present.
    pub fn allocate_id(&mut self) -> i64 {
        let max_reminder = self.reminders.iter().map(|r| r.id).max().unwrap_or(0);
        let max_alarm = self.alarms.iter().map(|a| a.id).max().unwrap_or(0);
        let id = self.next_id.max(max_reminder.max(max_alarm) + 1);
        self.next_id = id + 1;
        id
    }

    pub fn reminder(&self, id: i64) -> Option<&Reminder> {
        self.reminders.iter().find(|r| r.id == id)
    }

    pub fn reminder_mut(&mut self, id: i64) -> Option<&mut Reminder> {
        self.reminders.iter_mut().find(|r| r.id == id)
    }

    pub fn alarm(&self, id: i64) -> Option<&Alarm> {
        self.alarms.iter().find(|a| a.id == id)
    }

    pub fn alarm_mut(&mut self, id: i64) -> Option<&mut Alarm> {
        self.alarms.iter_mut().find(|a| a.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarm::{AlarmDraft, RepeatRule, TimeOfDay};
    use crate::reminder::ReminderDraft;
    use chrono::NaiveDate;

    #[test]
    fn test_allocate_id_spans_both_collections() {
        let now = NaiveDate::from_ymd_opt(2024, 3, 4)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        let mut state = AppState::default();
        assert_eq!(state.allocate_id(), 1);

        let mut reminder = Reminder::new(ReminderDraft::new("a", now));
        reminder.id = 3;
        state.reminders.push(reminder);

        let mut alarm = Alarm::new(
            AlarmDraft::new("b", TimeOfDay::new(7, 0).unwrap(), RepeatRule::Daily),
            now,
        );
        alarm.id = 9;
        state.alarms.push(alarm);

        assert_eq!(state.allocate_id(), 10);
        assert_eq!(state.allocate_id(), 11);
    }

    #[test]
    fn test_deleted_ids_are_not_reused() {
        let now = NaiveDate::from_ymd_opt(2024, 3, 4)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        let mut state = AppState::default();
        let mut reminder = Reminder::new(ReminderDraft::new("a", now));
        reminder.id = state.allocate_id();
        state.reminders.push(reminder);
        state.reminders.clear();

        assert_eq!(state.allocate_id(), 2);
    }

    #[test]
    fn test_counter_survives_serialization() {
        let mut state = AppState::default();
        state.allocate_id();
        state.allocate_id();
        let json = serde_json::to_string(&state).unwrap();
        let mut loaded: AppState = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded.allocate_id(), 3);
    }

    #[test]
    fn test_missing_settings_fields_use_defaults() {
        let state: AppState = serde_json::from_str(r#"{"reminders":[],"alarms":[]}"#).unwrap();
        assert_eq!(state.settings, Settings::default());
        assert!(state.settings.window_visible);
        assert!(state.settings.fullscreen_alerts);
    }

    #[test]
    fn test_item_ref_serialization() {
        let json = serde_json::to_string(&ItemRef::Alarm(4)).unwrap();
        assert_eq!(json, r#"{"kind":"alarm","id":4}"#);
    }
}
