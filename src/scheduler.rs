//! Polling engine: decides what is due, fires it once, persists the result.

use crate::alarm::{Alarm, RepeatRule};
use crate::error::{AppError, AppResult};
use crate::notify::FireEvent;
use crate::occurrence::latest_occurrence;
use crate::reminder::ReminderStatus;
use crate::state::AppState;
use crate::storage::Storage;
use crate::ReminderApp;
use chrono::NaiveDateTime;
use log::{debug, error, info, warn};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Outcome of one tick.
#[derive(Debug, Default)]
pub struct TickReport {
    pub events: Vec<FireEvent>,
    /// Set when the tick had something to write and the write failed.
    pub persist_error: Option<AppError>,
}

/// Mark everything due at `now` as fired and return the events, in state order.
///
/// Ids are collected first and looked up again before mutating, so an entry
/// that disappears in between is skipped.
pub fn evaluate(state: &mut AppState, now: NaiveDateTime) -> Vec<FireEvent> {
    let due_reminders: Vec<i64> = state
        .reminders
        .iter()
        .filter(|r| r.is_due(now))
        .map(|r| r.id)
        .collect();
    let due_alarms: Vec<(i64, NaiveDateTime)> = state
        .alarms
        .iter()
        .filter_map(|a| due_occurrence(a, now).map(|occurrence| (a.id, occurrence)))
        .collect();

    let mut events: Vec<FireEvent> = due_reminders
        .into_iter()
        .filter_map(|id| fire_reminder(state, id))
        .collect();
    events.extend(
        due_alarms
            .into_iter()
            .filter_map(|(id, occurrence)| fire_alarm(state, id, occurrence)),
    );
    events
}

/// Mark one reminder triggered. `None` if it is gone or already past pending.
fn fire_reminder(state: &mut AppState, id: i64) -> Option<FireEvent> {
    let fullscreen = state.settings.fullscreen_alerts;
    let tone = state.settings.custom_tone.clone();
    let reminder = state.reminder_mut(id)?;
    if !reminder.advance(ReminderStatus::Triggered) {
        return None;
    }
    Some(FireEvent::Reminder {
        id,
        title: reminder.title.clone(),
        description: reminder.description.clone(),
        priority: reminder.priority,
        sound: reminder.sound.clone().or(tone),
        fullscreen,
    })
}

/// Record one alarm occurrence. `None` if the alarm is gone.
fn fire_alarm(state: &mut AppState, id: i64, occurrence: NaiveDateTime) -> Option<FireEvent> {
    let fullscreen = state.settings.fullscreen_alerts;
    let tone = state.settings.custom_tone.clone();
    let alarm = state.alarm_mut(id)?;
    alarm.last_triggered_at = Some(occurrence);
    if alarm.repeat_rule == RepeatRule::Once {
        alarm.enabled = false;
    }
    Some(FireEvent::Alarm {
        id,
        label: alarm.label.clone(),
        occurrence,
        sound: alarm.sound.clone().or(tone),
        fullscreen,
    })
}

/// The occurrence an enabled alarm should fire for at `now`, if any.
pub fn due_occurrence(alarm: &Alarm, now: NaiveDateTime) -> Option<NaiveDateTime> {
    if !alarm.enabled {
        return None;
    }
    let latest = latest_occurrence(alarm, now)?;
    match alarm.last_triggered_at {
        Some(last) if latest <= last => None,
        _ => Some(latest),
    }
}

/// One full tick against the store. Idle ticks only write when an earlier
/// write is still outstanding.
pub fn tick(storage: &mut Storage, now: NaiveDateTime) -> TickReport {
    let events = evaluate(storage.state_mut(), now);
    if !events.is_empty() {
        debug!("Tick at {} fired {} item(s)", now, events.len());
        storage.mark_dirty();
    }
    TickReport {
        events,
        persist_error: storage.flush().err(),
    }
}

/// Running scheduler thread. Dropping the handle also stops the loop.
pub struct SchedulerHandle {
    stop_tx: Sender<()>,
    thread: JoinHandle<AppResult<()>>,
}

impl SchedulerHandle {
    /// Stop ticking and wait for the final persist.
    pub fn shutdown(self) -> AppResult<()> {
        let _ = self.stop_tx.send(());
        match self.thread.join() {
            Ok(result) => result,
            Err(_) => {
                error!("Scheduler thread panicked");
                Ok(())
            }
        }
    }
}

/// Start the polling thread. The first tick runs immediately to catch up on
/// anything that came due while the process was not running.
pub fn spawn(app: ReminderApp, interval: Duration) -> SchedulerHandle {
    let (stop_tx, stop_rx) = mpsc::channel::<()>();

    let thread = thread::spawn(move || {
        info!("Scheduler started, ticking every {}s", interval.as_secs_f32());
        let caught_up = app.tick();
        if !caught_up.is_empty() {
            info!("Catch-up tick fired {} item(s)", caught_up.len());
        }

        loop {
            match stop_rx.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => {
                    app.tick();
                }
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        info!("Scheduler stopping, writing final state");
        let result = app.save();
        if let Err(e) = &result {
            warn!("Final persist failed: {}", e);
        }
        result
    });

    SchedulerHandle { stop_tx, thread }
}
