use crate::error::{AppError, AppResult};
use chrono::{NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Meridiem {
    AM,
    PM,
}

/// Wall-clock time of an alarm, stored resolved to 24-hour form ("07:05").
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay {
    hour: u32,
    minute: u32,
}

impl TimeOfDay {
    pub fn new(hour: u32, minute: u32) -> AppResult<Self> {
        if hour > 23 {
            return Err(AppError::invalid_schedule(format!("hour {} out of range", hour)));
        }
        if minute > 59 {
            return Err(AppError::invalid_schedule(format!("minute {} out of range", minute)));
        }
        Ok(Self { hour, minute })
    }

    /// Resolve a 12-hour picker value: 12 AM is midnight, 12 PM is noon.
    pub fn from_12h(hour: u32, minute: u32, meridiem: Meridiem) -> AppResult<Self> {
        if !(1..=12).contains(&hour) {
            return Err(AppError::invalid_schedule(format!(
                "12-hour value {} out of range",
                hour
            )));
        }
        let hour = match (meridiem, hour) {
            (Meridiem::AM, 12) => 0,
            (Meridiem::AM, h) => h,
            (Meridiem::PM, 12) => 12,
            (Meridiem::PM, h) => h + 12,
        };
        Self::new(hour, minute)
    }

    pub fn hour(&self) -> u32 {
        self.hour
    }

    pub fn minute(&self) -> u32 {
        self.minute
    }

    pub fn to_12h(&self) -> (u32, u32, Meridiem) {
        let meridiem = if self.hour < 12 { Meridiem::AM } else { Meridiem::PM };
        let hour = match self.hour % 12 {
            0 => 12,
            h => h,
        };
        (hour, self.minute, meridiem)
    }

    pub fn as_naive_time(&self) -> NaiveTime {
        // Fields are range-checked at construction
        NaiveTime::from_hms_opt(self.hour, self.minute, 0).unwrap_or(NaiveTime::MIN)
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (hour, minute, meridiem) = self.to_12h();
        write!(f, "{}:{:02} {:?}", hour, minute, meridiem)
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let (h, m) = value
            .split_once(':')
            .ok_or_else(|| AppError::invalid_schedule(format!("bad time {:?}", value)))?;
        let hour = h
            .trim()
            .parse()
            .map_err(|_| AppError::invalid_schedule(format!("bad hour in {:?}", value)))?;
        let minute = m
            .trim()
            .parse()
            .map_err(|_| AppError::invalid_schedule(format!("bad minute in {:?}", value)))?;
        Self::new(hour, minute)
    }
}

impl From<TimeOfDay> for String {
    fn from(time: TimeOfDay) -> Self {
        format!("{:02}:{:02}", time.hour, time.minute)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RepeatRule {
    Once,
    Daily,
    Weekdays,
    Weekends,
    Custom { days: Vec<Weekday> },
}

impl RepeatRule {
    pub fn allows(&self, day: Weekday) -> bool {
        match self {
            RepeatRule::Once | RepeatRule::Daily => true,
            RepeatRule::Weekdays => !matches!(day, Weekday::Sat | Weekday::Sun),
            RepeatRule::Weekends => matches!(day, Weekday::Sat | Weekday::Sun),
            RepeatRule::Custom { days } => days.contains(&day),
        }
    }

    /// True when no weekday can ever match.
    pub fn is_empty(&self) -> bool {
        matches!(self, RepeatRule::Custom { days } if days.is_empty())
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.is_empty() {
            return Err(AppError::invalid_schedule("custom weekday set is empty"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Alarm {
    pub id: i64,
    pub label: String,
    pub time_of_day: TimeOfDay,
    pub repeat_rule: RepeatRule,
    pub enabled: bool,
    #[serde(default)]
    pub last_triggered_at: Option<NaiveDateTime>,
    /// Occurrences before this instant never fire.
    #[serde(default)]
    pub armed_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub sound: Option<String>,
}

/// User-editable fields of an alarm.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlarmDraft {
    pub label: String,
    pub time_of_day: TimeOfDay,
    pub repeat_rule: RepeatRule,
    pub sound: Option<String>,
}

impl AlarmDraft {
    pub fn new(label: impl Into<String>, time_of_day: TimeOfDay, repeat_rule: RepeatRule) -> Self {
        Self {
            label: label.into(),
            time_of_day,
            repeat_rule,
            sound: None,
        }
    }

    pub fn sound(mut self, sound: impl Into<String>) -> Self {
        self.sound = Some(sound.into());
        self
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.label.trim().is_empty() {
            return Err(AppError::invalid_schedule("alarm label is empty"));
        }
        self.repeat_rule.validate()
    }
}

impl Alarm {
    pub fn new(draft: AlarmDraft, armed_at: NaiveDateTime) -> Self {
        Self {
            id: 0, // Will be set by storage
            label: draft.label.trim().to_string(),
            time_of_day: draft.time_of_day,
            repeat_rule: draft.repeat_rule,
            enabled: true,
            last_triggered_at: None,
            armed_at: Some(armed_at),
            sound: draft.sound,
        }
    }

    /// Replace the user-editable fields. Re-arms from `now` only when the
    /// schedule itself changed; a relabel keeps pending occurrences live.
    pub fn apply(&mut self, draft: AlarmDraft, now: NaiveDateTime) {
        let rescheduled =
            draft.time_of_day != self.time_of_day || draft.repeat_rule != self.repeat_rule;
        self.label = draft.label.trim().to_string();
        self.time_of_day = draft.time_of_day;
        self.repeat_rule = draft.repeat_rule;
        self.sound = draft.sound;
        if rescheduled {
            self.armed_at = Some(now);
        }
    }

    pub fn set_enabled(&mut self, enabled: bool, now: NaiveDateTime) {
        if enabled && !self.enabled {
            self.armed_at = Some(now);
        }
        self.enabled = enabled;
    }

    /// A `once` alarm is spent after firing since it was last armed.
    pub fn is_spent(&self) -> bool {
        if self.repeat_rule != RepeatRule::Once {
            return false;
        }
        match (self.last_triggered_at, self.armed_at) {
            (Some(fired), Some(armed)) => fired >= armed,
            (Some(_), None) => true,
            (None, _) => false,
        }
    }
}
