use crate::config::QUICK_REMINDER_MINUTES;
use crate::error::{AppError, AppResult};
use crate::state::ItemRef;
use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    Urgent,
}

impl Priority {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "urgent" => Priority::Urgent,
            "low" => Priority::Low,
            _ => Priority::Normal,
        }
    }
}

/// Only ever moves forward: pending -> triggered -> dismissed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReminderStatus {
    #[default]
    Pending,
    Triggered,
    Dismissed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Reminder {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub due_at: NaiveDateTime,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub status: ReminderStatus,
    #[serde(default)]
    pub sound: Option<String>,
    #[serde(default)]
    pub snoozed_from: Option<ItemRef>,
}

/// User-editable fields of a reminder.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReminderDraft {
    pub title: String,
    pub description: String,
    pub due_at: NaiveDateTime,
    pub priority: Priority,
    pub sound: Option<String>,
}

impl ReminderDraft {
    pub fn new(title: impl Into<String>, due_at: NaiveDateTime) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            due_at,
            priority: Priority::Normal,
            sound: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn sound(mut self, sound: impl Into<String>) -> Self {
        self.sound = Some(sound.into());
        self
    }

    /// The tray "quick reminder": due a few minutes from `now`.
    pub fn quick(title: impl Into<String>, now: NaiveDateTime) -> Self {
        Self::new(title, now + Duration::minutes(QUICK_REMINDER_MINUTES))
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.title.trim().is_empty() {
            return Err(AppError::invalid_schedule("reminder title is empty"));
        }
        Ok(())
    }
}

impl Reminder {
    pub fn new(draft: ReminderDraft) -> Self {
        Self {
            id: 0, // Will be set by storage
            title: draft.title.trim().to_string(),
            description: draft.description,
            due_at: draft.due_at,
            priority: draft.priority,
            status: ReminderStatus::Pending,
            sound: draft.sound,
            snoozed_from: None,
        }
    }

    /// Replace the user-editable fields, keeping id and status.
    pub fn apply(&mut self, draft: ReminderDraft) {
        self.title = draft.title.trim().to_string();
        self.description = draft.description;
        self.due_at = draft.due_at;
        self.priority = draft.priority;
        self.sound = draft.sound;
    }

    pub fn is_due(&self, now: NaiveDateTime) -> bool {
        self.status == ReminderStatus::Pending && self.due_at <= now
    }

    /// Advance the status; backwards moves are ignored. Returns whether it changed.
    pub fn advance(&mut self, to: ReminderStatus) -> bool {
        if to > self.status {
            self.status = to;
            true
        } else {
            false
        }
    }
}
