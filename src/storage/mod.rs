mod legacy;
mod local;

use crate::alarm::{Alarm, AlarmDraft};
use crate::config::{EngineConfig, MAX_SNOOZE_MINUTES};
use crate::error::{AppError, AppResult};
use crate::occurrence::next_occurrence;
use crate::reminder::{Reminder, ReminderDraft, ReminderStatus};
use crate::state::{AppState, ItemRef, Settings};
use chrono::{Duration, NaiveDateTime};
use log::{error, info, warn};
use std::path::{Path, PathBuf};

/// In-memory state plus the document it is persisted to.
///
/// Memory is authoritative: a failed write leaves the store dirty and the
/// next [`Storage::flush`] retries it.
pub struct Storage {
    data: AppState,
    data_dir: PathBuf,
    dirty: bool,
}

impl Storage {
    /// Open the store, recovering from anything unreadable. Never fails.
    pub fn open(config: &EngineConfig) -> Self {
        let data = load_or_recover(&config.data_dir, config.legacy_path.as_deref());
        info!(
            "Loaded {} reminders, {} alarms from {}",
            data.reminders.len(),
            data.alarms.len(),
            config.data_dir.display()
        );
        Self {
            data,
            data_dir: config.data_dir.clone(),
            dirty: false,
        }
    }

    /// Wrap an existing state without touching disk.
    pub fn with_state(data_dir: impl Into<PathBuf>, data: AppState) -> Self {
        Self {
            data,
            data_dir: data_dir.into(),
            dirty: false,
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn state(&self) -> &AppState {
        &self.data
    }

    /// Mutable access for the scheduler; callers mark the store dirty.
    pub(crate) fn state_mut(&mut self) -> &mut AppState {
        &mut self.data
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Write the whole document. On failure the store stays dirty.
    pub fn save(&mut self) -> AppResult<()> {
        match local::save_local(&self.data_dir, &self.data) {
            Ok(()) => {
                self.dirty = false;
                Ok(())
            }
            Err(e) => {
                self.dirty = true;
                error!("Failed to save state: {}", e);
                Err(e)
            }
        }
    }

    /// Save only if something changed since the last successful write.
    pub fn flush(&mut self) -> AppResult<()> {
        if self.dirty {
            self.save()
        } else {
            Ok(())
        }
    }

    fn commit(&mut self) -> AppResult<()> {
        self.mark_dirty();
        self.save()
    }

    // ============ Queries ============

    pub fn reminders(&self) -> Vec<Reminder> {
        self.data.reminders.clone()
    }

    pub fn alarms(&self) -> Vec<Alarm> {
        self.data.alarms.clone()
    }

    pub fn settings(&self) -> Settings {
        self.data.settings.clone()
    }

    pub fn pending_reminders(&self) -> Vec<Reminder> {
        let mut reminders: Vec<Reminder> = self
            .data
            .reminders
            .iter()
            .filter(|r| r.status == ReminderStatus::Pending)
            .cloned()
            .collect();
        reminders.sort_by_key(|r| r.due_at);
        reminders
    }

    /// Enabled alarms with their next occurrence, soonest first.
    pub fn upcoming_alarms(&self, now: NaiveDateTime) -> Vec<(Alarm, NaiveDateTime)> {
        let mut upcoming: Vec<(Alarm, NaiveDateTime)> = self
            .data
            .alarms
            .iter()
            .filter(|a| a.enabled)
            .filter_map(|a| next_occurrence(a, now).map(|next| (a.clone(), next)))
            .collect();
        upcoming.sort_by_key(|(_, next)| *next);
        upcoming
    }

    // ============ Reminders ============

    pub fn add_reminder(&mut self, draft: ReminderDraft) -> AppResult<i64> {
        draft.validate()?;
        let mut reminder = Reminder::new(draft);
        reminder.id = self.data.allocate_id();
        let id = reminder.id;
        self.data.reminders.push(reminder);
        self.commit()?;
        Ok(id)
    }

    pub fn edit_reminder(&mut self, id: i64, draft: ReminderDraft) -> AppResult<()> {
        draft.validate()?;
        let reminder = self
            .data
            .reminder_mut(id)
            .ok_or_else(|| AppError::not_found(format!("reminder {}", id)))?;
        reminder.apply(draft);
        self.commit()
    }

    /// Deleting an id that is already gone is not an error.
    pub fn delete_reminder(&mut self, id: i64) -> AppResult<()> {
        let before = self.data.reminders.len();
        self.data.reminders.retain(|r| r.id != id);
        if self.data.reminders.len() == before {
            return Ok(());
        }
        self.commit()
    }

    pub fn dismiss_reminder(&mut self, id: i64) -> AppResult<()> {
        let reminder = self
            .data
            .reminder_mut(id)
            .ok_or_else(|| AppError::not_found(format!("reminder {}", id)))?;
        if !reminder.advance(ReminderStatus::Dismissed) {
            return Ok(());
        }
        self.commit()
    }

    /// Re-alert `minutes` from now as a fresh one-shot reminder.
    ///
    /// A snoozed reminder is dismissed; a snoozed alarm is left as it is.
    pub fn snooze(&mut self, item: ItemRef, minutes: i64, now: NaiveDateTime) -> AppResult<i64> {
        if !(1..=MAX_SNOOZE_MINUTES).contains(&minutes) {
            return Err(AppError::invalid_schedule(format!(
                "snooze of {} minutes",
                minutes
            )));
        }
        let due_at = now + Duration::minutes(minutes);

        let draft = match item {
            ItemRef::Reminder(id) => {
                let source = self
                    .data
                    .reminder_mut(id)
                    .ok_or_else(|| AppError::not_found(format!("reminder {}", id)))?;
                source.advance(ReminderStatus::Dismissed);
                ReminderDraft {
                    title: source.title.clone(),
                    description: source.description.clone(),
                    due_at,
                    priority: source.priority,
                    sound: source.sound.clone(),
                }
            }
            ItemRef::Alarm(id) => {
                let source = self
                    .data
                    .alarm(id)
                    .ok_or_else(|| AppError::not_found(format!("alarm {}", id)))?;
                let mut draft = ReminderDraft::new(source.label.clone(), due_at);
                draft.sound = source.sound.clone();
                draft
            }
        };

        let mut reminder = Reminder::new(draft);
        reminder.id = self.data.allocate_id();
        reminder.snoozed_from = Some(item);
        let id = reminder.id;
        self.data.reminders.push(reminder);
        info!("Snoozed {:?} for {} minutes as reminder {}", item, minutes, id);
        self.commit()?;
        Ok(id)
    }

    // ============ Alarms ============

    pub fn add_alarm(&mut self, draft: AlarmDraft, now: NaiveDateTime) -> AppResult<i64> {
        draft.validate()?;
        let mut alarm = Alarm::new(draft, now);
        alarm.id = self.data.allocate_id();
        let id = alarm.id;
        self.data.alarms.push(alarm);
        self.commit()?;
        Ok(id)
    }

    pub fn edit_alarm(&mut self, id: i64, draft: AlarmDraft, now: NaiveDateTime) -> AppResult<()> {
        draft.validate()?;
        let alarm = self
            .data
            .alarm_mut(id)
            .ok_or_else(|| AppError::not_found(format!("alarm {}", id)))?;
        alarm.apply(draft, now);
        self.commit()
    }

    pub fn delete_alarm(&mut self, id: i64) -> AppResult<()> {
        let before = self.data.alarms.len();
        self.data.alarms.retain(|a| a.id != id);
        if self.data.alarms.len() == before {
            return Ok(());
        }
        self.commit()
    }

    /// Flip `enabled`; returns the new value.
    pub fn toggle_alarm_enabled(&mut self, id: i64, now: NaiveDateTime) -> AppResult<bool> {
        let alarm = self
            .data
            .alarm_mut(id)
            .ok_or_else(|| AppError::not_found(format!("alarm {}", id)))?;
        let enabled = !alarm.enabled;
        alarm.set_enabled(enabled, now);
        self.commit()?;
        Ok(enabled)
    }

    // ============ Settings ============

    pub fn update_settings(&mut self, settings: Settings) -> AppResult<()> {
        if self.data.settings == settings {
            return Ok(());
        }
        self.data.settings = settings;
        self.commit()
    }
}

/// Load policy: unreadable documents are quarantined and replaced by an empty
/// state; a missing document may be seeded from the legacy file.
fn load_or_recover(data_dir: &Path, legacy_path: Option<&Path>) -> AppState {
    match local::load_local(data_dir) {
        Ok(Some(state)) => state,
        Ok(None) => legacy_path
            .filter(|path| path.exists())
            .and_then(|path| local::import_legacy_file(data_dir, path))
            .unwrap_or_default(),
        Err(e) => {
            error!("{}; starting with empty state", e);
            match local::quarantine(data_dir) {
                Ok(backup) => warn!("Unreadable state preserved at {}", backup.display()),
                Err(qe) => warn!("Could not preserve unreadable state: {}", qe),
            }
            AppState::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarm::{RepeatRule, TimeOfDay};
    use crate::config::{LEGACY_BACKUP_FILE_NAME, STATE_FILE_NAME};
    use crate::reminder::Priority;
    use chrono::NaiveDate;
    use std::fs;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 4)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn create_test_storage() -> (tempfile::TempDir, Storage) {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::with_state(dir.path(), AppState::default());
        (dir, storage)
    }

    fn daily(label: &str) -> AlarmDraft {
        AlarmDraft::new(label, TimeOfDay::new(7, 0).unwrap(), RepeatRule::Daily)
    }

    #[test]
    fn test_add_reminder_assigns_ids_and_persists() {
        let (dir, mut storage) = create_test_storage();
        let a = storage.add_reminder(ReminderDraft::new("a", at(9, 0))).unwrap();
        let b = storage.add_alarm(daily("b"), at(8, 0)).unwrap();
        assert_eq!((a, b), (1, 2));
        assert!(!storage.is_dirty());

        let reopened = Storage::open(&EngineConfig::new(dir.path()));
        assert_eq!(reopened.state(), storage.state());
    }

    #[test]
    fn test_deleted_id_not_handed_out_again() {
        let (dir, mut storage) = create_test_storage();
        let first = storage.add_reminder(ReminderDraft::new("a", at(9, 0))).unwrap();
        storage.delete_reminder(first).unwrap();
        let second = storage.add_reminder(ReminderDraft::new("b", at(9, 0))).unwrap();
        assert_ne!(first, second);

        storage.delete_reminder(second).unwrap();
        let mut reopened = Storage::open(&EngineConfig::new(dir.path()));
        let third = reopened.add_alarm(daily("c"), at(8, 0)).unwrap();
        assert!(third > second);
    }

    #[test]
    fn test_invalid_alarm_never_stored() {
        let (_dir, mut storage) = create_test_storage();
        let draft = AlarmDraft::new(
            "never",
            TimeOfDay::new(7, 0).unwrap(),
            RepeatRule::Custom { days: vec![] },
        );
        assert!(matches!(
            storage.add_alarm(draft, at(8, 0)),
            Err(AppError::InvalidSchedule(_))
        ));
        assert!(storage.alarms().is_empty());
    }

    #[test]
    fn test_missing_ids() {
        let (_dir, mut storage) = create_test_storage();
        assert!(storage.delete_reminder(42).is_ok());
        assert!(storage.delete_alarm(42).is_ok());
        assert!(matches!(storage.dismiss_reminder(42), Err(AppError::NotFound(_))));
        assert!(matches!(
            storage.toggle_alarm_enabled(42, at(8, 0)),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn test_edit_reminder_keeps_id_and_status() {
        let (dir, mut storage) = create_test_storage();
        let id = storage.add_reminder(ReminderDraft::new("call", at(9, 0))).unwrap();
        storage.dismiss_reminder(id).unwrap();

        let draft = ReminderDraft::new("call back", at(11, 0)).priority(Priority::Urgent);
        storage.edit_reminder(id, draft).unwrap();

        let edited = storage.state().reminder(id).unwrap();
        assert_eq!(edited.title, "call back");
        assert_eq!(edited.due_at, at(11, 0));
        assert_eq!(edited.priority, Priority::Urgent);
        assert_eq!(edited.status, ReminderStatus::Dismissed);

        let reopened = Storage::open(&EngineConfig::new(dir.path()));
        assert_eq!(reopened.state().reminder(id).unwrap().title, "call back");
    }

    #[test]
    fn test_edit_reminder_rejections() {
        let (_dir, mut storage) = create_test_storage();
        let id = storage.add_reminder(ReminderDraft::new("call", at(9, 0))).unwrap();

        assert!(matches!(
            storage.edit_reminder(id + 100, ReminderDraft::new("x", at(9, 0))),
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            storage.edit_reminder(id, ReminderDraft::new("  ", at(10, 0))),
            Err(AppError::InvalidSchedule(_))
        ));
        let unchanged = storage.state().reminder(id).unwrap();
        assert_eq!(unchanged.title, "call");
        assert_eq!(unchanged.due_at, at(9, 0));
    }

    #[test]
    fn test_edit_alarm_rejections() {
        let (_dir, mut storage) = create_test_storage();
        let id = storage.add_alarm(daily("wake"), at(6, 0)).unwrap();

        assert!(matches!(
            storage.edit_alarm(id + 100, daily("x"), at(6, 0)),
            Err(AppError::NotFound(_))
        ));
        let empty = AlarmDraft::new(
            "wake",
            TimeOfDay::new(8, 0).unwrap(),
            RepeatRule::Custom { days: vec![] },
        );
        assert!(matches!(
            storage.edit_alarm(id, empty, at(6, 0)),
            Err(AppError::InvalidSchedule(_))
        ));
        let unchanged = storage.state().alarm(id).unwrap();
        assert_eq!(unchanged.repeat_rule, RepeatRule::Daily);
        assert_eq!(unchanged.time_of_day, TimeOfDay::new(7, 0).unwrap());
    }

    #[test]
    fn test_edit_alarm_keeps_id_and_rearms() {
        let (_dir, mut storage) = create_test_storage();
        let id = storage.add_alarm(daily("wake"), at(6, 0)).unwrap();
        let draft = AlarmDraft::new("wake", TimeOfDay::new(8, 0).unwrap(), RepeatRule::Weekdays);
        storage.edit_alarm(id, draft, at(9, 0)).unwrap();

        let edited = storage.state().alarm(id).unwrap();
        assert_eq!(edited.id, id);
        assert_eq!(edited.repeat_rule, RepeatRule::Weekdays);
        assert_eq!(edited.armed_at, Some(at(9, 0)));
    }

    #[test]
    fn test_dismiss_is_terminal() {
        let (_dir, mut storage) = create_test_storage();
        let id = storage.add_reminder(ReminderDraft::new("a", at(9, 0))).unwrap();
        storage.dismiss_reminder(id).unwrap();
        storage.dismiss_reminder(id).unwrap();
        assert_eq!(storage.state().reminder(id).unwrap().status, ReminderStatus::Dismissed);
        assert!(storage.pending_reminders().is_empty());
    }

    #[test]
    fn test_toggle_rearms() {
        let (_dir, mut storage) = create_test_storage();
        let id = storage.add_alarm(daily("wake"), at(6, 0)).unwrap();
        assert!(!storage.toggle_alarm_enabled(id, at(6, 30)).unwrap());
        assert!(storage.toggle_alarm_enabled(id, at(9, 0)).unwrap());
        assert_eq!(storage.state().alarm(id).unwrap().armed_at, Some(at(9, 0)));
    }

    #[test]
    fn test_snooze_reminder_dismisses_source() {
        let (_dir, mut storage) = create_test_storage();
        let id = storage.add_reminder(ReminderDraft::new("tea", at(9, 0))).unwrap();
        let snoozed = storage.snooze(ItemRef::Reminder(id), 10, at(9, 1)).unwrap();

        let source = storage.state().reminder(id).unwrap();
        assert_eq!(source.status, ReminderStatus::Dismissed);
        let copy = storage.state().reminder(snoozed).unwrap();
        assert_eq!(copy.title, "tea");
        assert_eq!(copy.due_at, at(9, 11));
        assert_eq!(copy.snoozed_from, Some(ItemRef::Reminder(id)));
    }

    #[test]
    fn test_snooze_alarm_keeps_alarm() {
        let (_dir, mut storage) = create_test_storage();
        let id = storage.add_alarm(daily("wake"), at(6, 0)).unwrap();
        let snoozed = storage.snooze(ItemRef::Alarm(id), 5, at(7, 0)).unwrap();
        assert!(storage.state().alarm(id).unwrap().enabled);
        assert_eq!(storage.state().reminder(snoozed).unwrap().title, "wake");
        assert!(storage.snooze(ItemRef::Alarm(id), 0, at(7, 0)).is_err());
    }

    #[test]
    fn test_upcoming_alarms_sorted() {
        let (_dir, mut storage) = create_test_storage();
        let late = AlarmDraft::new("late", TimeOfDay::new(22, 0).unwrap(), RepeatRule::Daily);
        let early = AlarmDraft::new("early", TimeOfDay::new(10, 0).unwrap(), RepeatRule::Daily);
        storage.add_alarm(late, at(8, 0)).unwrap();
        let off = storage.add_alarm(early.clone(), at(8, 0)).unwrap();
        storage.add_alarm(early, at(8, 0)).unwrap();
        storage.toggle_alarm_enabled(off, at(8, 0)).unwrap();

        let upcoming = storage.upcoming_alarms(at(9, 0));
        assert_eq!(upcoming.len(), 2);
        assert_eq!(upcoming[0].1, at(10, 0));
        assert_eq!(upcoming[1].0.label, "late");
    }

    #[test]
    fn test_corrupt_file_recovered_and_preserved() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(STATE_FILE_NAME), "{{{{").unwrap();

        let storage = Storage::open(&EngineConfig::new(dir.path()));
        assert_eq!(storage.state(), &AppState::default());

        let preserved: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains("corrupt"))
            .collect();
        assert_eq!(preserved.len(), 1);
        assert_eq!(fs::read_to_string(preserved[0].path()).unwrap(), "{{{{");
    }

    #[test]
    fn test_damaged_alarm_document_quarantined_not_wiped() {
        let dir = tempfile::tempdir().unwrap();
        let damaged = r#"{"reminders":[],"alarms":[{"id":1,"label":"Wake","time_of_day":"25:00",
            "repeat_rule":{"kind":"daily"},"enabled":true}],"settings":{"always_on_top":true}}"#;
        fs::write(dir.path().join(STATE_FILE_NAME), damaged).unwrap();

        let storage = Storage::open(&EngineConfig::new(dir.path()));
        assert_eq!(storage.state(), &AppState::default());

        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        let preserved: Vec<&String> = names.iter().filter(|n| n.contains("corrupt")).collect();
        assert_eq!(preserved.len(), 1);
        assert_eq!(
            fs::read_to_string(dir.path().join(preserved[0])).unwrap(),
            damaged
        );
        assert!(!names.iter().any(|n| n == LEGACY_BACKUP_FILE_NAME));
    }

    #[test]
    fn test_failed_save_keeps_memory_and_dirty() {
        let dir = tempfile::tempdir().unwrap();
        // A plain file where the data directory should be
        let blocker = dir.path().join("blocked");
        fs::write(&blocker, "").unwrap();
        let mut storage = Storage::with_state(&blocker, AppState::default());

        let err = storage.add_reminder(ReminderDraft::new("a", at(9, 0))).unwrap_err();
        assert!(err.is_warning());
        assert_eq!(storage.reminders().len(), 1);
        assert!(storage.is_dirty());
    }

    #[test]
    fn test_legacy_file_imported_when_no_state() {
        let dir = tempfile::tempdir().unwrap();
        let legacy = dir.path().join("old.json");
        let content = r#"{"reminders":[{"id":5,"title":"Old",
            "date":"2024-03-04","time":"10:00","active":true}],"alarms":[]}"#;
        fs::write(&legacy, content).unwrap();
        let data_dir = dir.path().join("data");

        let config = EngineConfig::new(&data_dir).with_legacy_path(&legacy);
        let storage = Storage::open(&config);
        assert_eq!(storage.reminders().len(), 1);
        assert!(data_dir.join(STATE_FILE_NAME).exists());
    }
}
