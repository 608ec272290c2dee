use crate::reminder::Priority;
use crate::state::ItemRef;
use chrono::NaiveDateTime;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::sync::mpsc::Sender;

/// Payload handed to the notification sink when an item becomes due.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FireEvent {
    Reminder {
        id: i64,
        title: String,
        description: String,
        priority: Priority,
        sound: Option<String>,
        fullscreen: bool,
    },
    Alarm {
        id: i64,
        label: String,
        occurrence: NaiveDateTime,
        sound: Option<String>,
        fullscreen: bool,
    },
}

impl FireEvent {
    pub fn item(&self) -> ItemRef {
        match self {
            FireEvent::Reminder { id, .. } => ItemRef::Reminder(*id),
            FireEvent::Alarm { id, .. } => ItemRef::Alarm(*id),
        }
    }

    pub fn headline(&self) -> String {
        match self {
            FireEvent::Reminder { title, .. } => format!("REMINDER: {}", title),
            FireEvent::Alarm { label, .. } => format!("ALARM: {}", label),
        }
    }
}

/// Receives fire events. Implementations must return promptly; the engine
/// never waits for an event to be displayed.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, event: FireEvent);
}

impl<F> NotificationSink for F
where
    F: Fn(FireEvent) + Send + Sync,
{
    fn notify(&self, event: FireEvent) {
        self(event)
    }
}

/// Forwards events to a receiver owned by the UI thread.
pub struct ChannelSink {
    tx: Sender<FireEvent>,
}

impl ChannelSink {
    pub fn new(tx: Sender<FireEvent>) -> Self {
        Self { tx }
    }
}

impl NotificationSink for ChannelSink {
    fn notify(&self, event: FireEvent) {
        if self.tx.send(event).is_err() {
            debug!("Notification receiver dropped, event discarded");
        }
    }
}

/// Writes events to the log; used by the headless binary.
#[derive(Debug, Default)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn notify(&self, event: FireEvent) {
        match &event {
            FireEvent::Reminder { description, .. } if !description.is_empty() => {
                info!("{} ({})", event.headline(), description)
            }
            _ => info!("{}", event.headline()),
        }
    }
}
