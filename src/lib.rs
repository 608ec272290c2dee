pub mod alarm;
pub mod clock;
pub mod config;
pub mod error;
pub mod notify;
pub mod occurrence;
pub mod reminder;
pub mod scheduler;
pub mod state;
pub mod storage;

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::NaiveDateTime;
use log::warn;

pub use alarm::{Alarm, AlarmDraft, Meridiem, RepeatRule, TimeOfDay};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::EngineConfig;
pub use error::{AppError, AppResult};
pub use notify::{ChannelSink, FireEvent, LogSink, NotificationSink};
pub use reminder::{Priority, Reminder, ReminderDraft, ReminderStatus};
pub use scheduler::SchedulerHandle;
pub use state::{AppState, ItemRef, Settings};
pub use storage::Storage;

struct Shared {
    storage: Mutex<Storage>,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn NotificationSink>,
}

/// Handle shared by the scheduler thread and the interface layer.
///
/// Every operation takes the same storage lock, so a tick's
/// check/mark/persist sequence never interleaves with an edit.
#[derive(Clone)]
pub struct ReminderApp {
    shared: Arc<Shared>,
}

impl ReminderApp {
    /// `sink` is called on the scheduler thread, outside the storage lock,
    /// once per fired item. It must return promptly: a sink that blocks
    /// delays the next tick. Hand slow work to another thread, as
    /// [`ChannelSink`] does.
    pub fn new(storage: Storage, clock: Arc<dyn Clock>, sink: Arc<dyn NotificationSink>) -> Self {
        Self {
            shared: Arc::new(Shared {
                storage: Mutex::new(storage),
                clock,
                sink,
            }),
        }
    }

    /// Load (or recover) the state document and use the host clock.
    pub fn open(config: &EngineConfig, sink: Arc<dyn NotificationSink>) -> Self {
        Self::new(Storage::open(config), Arc::new(SystemClock), sink)
    }

    /// Lock storage, recovering from poison if needed
    fn lock_storage(&self) -> MutexGuard<'_, Storage> {
        self.shared.storage.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn now(&self) -> NaiveDateTime {
        self.shared.clock.now()
    }

    // ============ Scheduler ============

    /// Run one tick now and hand the fired events to the sink.
    ///
    /// Events are dispatched after the lock is released.
    pub fn tick(&self) -> Vec<FireEvent> {
        let now = self.now();
        let report = {
            let mut storage = self.lock_storage();
            scheduler::tick(&mut storage, now)
        };

        if let Some(e) = &report.persist_error {
            warn!("Tick could not persist, will retry: {}", e);
        }
        for event in &report.events {
            self.shared.sink.notify(event.clone());
        }
        report.events
    }

    /// Start background polling; the first tick runs immediately.
    pub fn start(&self, interval: Duration) -> SchedulerHandle {
        scheduler::spawn(self.clone(), interval)
    }

    /// Write the full state unconditionally.
    pub fn save(&self) -> AppResult<()> {
        self.lock_storage().save()
    }

    // ============ Queries ============

    pub fn reminders(&self) -> Vec<Reminder> {
        self.lock_storage().reminders()
    }

    pub fn pending_reminders(&self) -> Vec<Reminder> {
        self.lock_storage().pending_reminders()
    }

    pub fn alarms(&self) -> Vec<Alarm> {
        self.lock_storage().alarms()
    }

    pub fn upcoming_alarms(&self) -> Vec<(Alarm, NaiveDateTime)> {
        let now = self.now();
        self.lock_storage().upcoming_alarms(now)
    }

    pub fn settings(&self) -> Settings {
        self.lock_storage().settings()
    }

    pub fn snapshot(&self) -> AppState {
        self.lock_storage().state().clone()
    }

    // ============ Interface-layer mutations ============

    pub fn add_reminder(&self, draft: ReminderDraft) -> AppResult<i64> {
        self.lock_storage().add_reminder(draft)
    }

    /// Tray "quick reminder".
    pub fn quick_reminder(&self, title: &str) -> AppResult<i64> {
        let draft = ReminderDraft::quick(title, self.now());
        self.add_reminder(draft)
    }

    pub fn edit_reminder(&self, id: i64, draft: ReminderDraft) -> AppResult<()> {
        self.lock_storage().edit_reminder(id, draft)
    }

    pub fn delete_reminder(&self, id: i64) -> AppResult<()> {
        self.lock_storage().delete_reminder(id)
    }

    pub fn dismiss_reminder(&self, id: i64) -> AppResult<()> {
        self.lock_storage().dismiss_reminder(id)
    }

    pub fn snooze(&self, item: ItemRef, minutes: i64) -> AppResult<i64> {
        let now = self.now();
        self.lock_storage().snooze(item, minutes, now)
    }

    pub fn add_alarm(&self, draft: AlarmDraft) -> AppResult<i64> {
        let now = self.now();
        self.lock_storage().add_alarm(draft, now)
    }

    pub fn edit_alarm(&self, id: i64, draft: AlarmDraft) -> AppResult<()> {
        let now = self.now();
        self.lock_storage().edit_alarm(id, draft, now)
    }

    pub fn delete_alarm(&self, id: i64) -> AppResult<()> {
        self.lock_storage().delete_alarm(id)
    }

    pub fn toggle_alarm_enabled(&self, id: i64) -> AppResult<bool> {
        let now = self.now();
        self.lock_storage().toggle_alarm_enabled(id, now)
    }

    pub fn update_settings(&self, settings: Settings) -> AppResult<()> {
        self.lock_storage().update_settings(settings)
    }
}
