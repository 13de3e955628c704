use crate::eligibility::{self, CellState};
use crate::errors::TrackerError;
use crate::ledger::CompletionLedger;
use crate::registry::HabitRegistry;
use chrono::{Datelike, Months, NaiveDate, Weekday};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Version written into every stored profile blob.
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MonthName {
    January,
    February,
    March,
    April,
    May,
    June,
    July,
    August,
    September,
    October,
    November,
    December,
}

impl MonthName {
    pub const ALL: [MonthName; 12] = [
        MonthName::January,
        MonthName::February,
        MonthName::March,
        MonthName::April,
        MonthName::May,
        MonthName::June,
        MonthName::July,
        MonthName::August,
        MonthName::September,
        MonthName::October,
        MonthName::November,
        MonthName::December,
    ];

    /// Zero-based index, January = 0.
    pub fn index(self) -> u32 {
        self as u32
    }

    pub fn from_index(index: u32) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            MonthName::January => "January",
            MonthName::February => "February",
            MonthName::March => "March",
            MonthName::April => "April",
            MonthName::May => "May",
            MonthName::June => "June",
            MonthName::July => "July",
            MonthName::August => "August",
            MonthName::September => "September",
            MonthName::October => "October",
            MonthName::November => "November",
            MonthName::December => "December",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|month| month.name().eq_ignore_ascii_case(value))
    }
}

impl fmt::Display for MonthName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The tracked period. `days` always matches the calendar, so the only way to
/// get a different month is to build a new config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MonthConfig {
    year: i32,
    month: MonthName,
    days: u32,
}

impl MonthConfig {
    pub fn new(year: i32, month: MonthName) -> Result<Self, TrackerError> {
        let days = days_in_month(year, month)
            .ok_or_else(|| TrackerError::validation(format!("year {year} is out of range")))?;
        Ok(Self { year, month, days })
    }

    pub fn containing(date: NaiveDate) -> Self {
        let month = MonthName::from_index(date.month0()).unwrap_or(MonthName::January);
        let days = days_in_month(date.year(), month).unwrap_or(31);
        Self {
            year: date.year(),
            month,
            days,
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> MonthName {
        self.month
    }

    pub fn month_index(&self) -> u32 {
        self.month.index()
    }

    pub fn days(&self) -> u32 {
        self.days
    }

    pub fn contains_day(&self, day: u32) -> bool {
        (1..=self.days).contains(&day)
    }

    pub fn label(&self) -> String {
        format!("{} {}", self.month, self.year)
    }

    pub fn weekday(&self, day: u32) -> Option<Weekday> {
        NaiveDate::from_ymd_opt(self.year, self.month.index() + 1, day).map(|date| date.weekday())
    }
}

fn days_in_month(year: i32, month: MonthName) -> Option<u32> {
    let first = NaiveDate::from_ymd_opt(year, month.index() + 1, 1)?;
    let next = first.checked_add_months(Months::new(1))?;
    u32::try_from(next.signed_duration_since(first).num_days()).ok()
}

/// Opaque habit identifier. Older profiles carry numeric ids, newer ones may
/// carry text; both are compared by their canonical text form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HabitId(String);

impl HabitId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_number(&self) -> Option<u64> {
        self.0.parse::<u64>().ok().filter(|n| n.to_string() == self.0)
    }
}

impl fmt::Display for HabitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for HabitId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<u64> for HabitId {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

impl Serialize for HabitId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if let Some(n) = self.as_number() {
            return serializer.serialize_u64(n);
        }
        if let Ok(n) = self.0.parse::<i64>() {
            if n.to_string() == self.0 {
                return serializer.serialize_i64(n);
            }
        }
        if let Ok(n) = self.0.parse::<f64>() {
            if n.is_finite() && n.to_string() == self.0 {
                return serializer.serialize_f64(n);
            }
        }
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for HabitId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct IdVisitor;

        impl serde::de::Visitor<'_> for IdVisitor {
            type Value = HabitId;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a habit id as number or string")
            }

            fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<HabitId, E> {
                Ok(HabitId(v.to_string()))
            }

            fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<HabitId, E> {
                Ok(HabitId(v.to_string()))
            }

            fn visit_f64<E: serde::de::Error>(self, v: f64) -> Result<HabitId, E> {
                Ok(HabitId(v.to_string()))
            }

            fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<HabitId, E> {
                Ok(HabitId(v.to_string()))
            }
        }

        deserializer.deserialize_any(IdVisitor)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Habit {
    pub id: HabitId,
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_top: bool,
    #[serde(default = "first_day", deserialize_with = "start_day")]
    pub start_date: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub details: String,
}

impl Habit {
    pub fn new(id: HabitId, name: impl Into<String>, start_date: u32) -> Self {
        Self {
            id,
            name: name.into(),
            is_top: false,
            start_date: start_date.max(1),
            details: String::new(),
        }
    }

    /// Days of `month` on which this habit can be ticked at all.
    pub fn active_days(&self, month: &MonthConfig) -> std::ops::RangeInclusive<u32> {
        self.start_date.max(1)..=month.days()
    }

    pub fn is_active_on(&self, day: u32) -> bool {
        day >= self.start_date
    }
}

fn first_day() -> u32 {
    1
}

// Missing, null and zero all mean "active from day 1".
fn start_day<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    let value = Option::<u32>::deserialize(deserializer)?;
    Ok(value.filter(|day| *day > 0).unwrap_or(1))
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

pub type DailyNotes = BTreeMap<u32, String>;

/// Everything one profile owns. Persisted as a single blob and always
/// replaced as a whole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StoredUserData", into = "StoredUserData")]
pub struct UserData {
    pub month: MonthConfig,
    pub habits: HabitRegistry,
    pub progress: CompletionLedger,
    pub notes: String,
    pub daily_notes: DailyNotes,
}

impl UserData {
    pub fn new(month: MonthConfig, habits: HabitRegistry) -> Self {
        Self {
            month,
            habits,
            progress: CompletionLedger::default(),
            notes: String::new(),
            daily_notes: DailyNotes::new(),
        }
    }

    /// First-run setup: blank names fall back to "Habit N", names listed in
    /// `top` are flagged as top priority.
    pub fn onboard(
        year: i32,
        month: MonthName,
        names: &[String],
        top: &[String],
    ) -> Result<Self, TrackerError> {
        let config = MonthConfig::new(year, month)?;
        let mut habits = HabitRegistry::default();
        for (idx, name) in names.iter().enumerate() {
            let name = match name.trim() {
                "" => format!("Habit {}", idx + 1),
                trimmed => trimmed.to_string(),
            };
            let is_top = top.iter().any(|t| t.trim() == name);
            let id = habits.add_habit(&name, 1)?;
            if is_top {
                habits.set_top(&id, true)?;
            }
        }
        Ok(Self::new(config, habits))
    }

    pub fn cell_state(&self, habit: &Habit, day: u32, today: NaiveDate) -> CellState {
        eligibility::cell_state(habit, day, &self.month, &self.progress, today)
    }

    /// Marks a cell done. Rejects unknown habits and locked cells before
    /// touching the ledger.
    pub fn check(&mut self, id: &HabitId, day: u32, today: NaiveDate) -> Result<(), TrackerError> {
        let habit = self
            .habits
            .get(id)
            .ok_or_else(|| TrackerError::habit_not_found(id))?;
        if eligibility::is_locked(habit, day, &self.month, today) {
            return Err(TrackerError::LockedDay {
                habit: id.clone(),
                day,
            });
        }
        self.progress.mark(id, day);
        Ok(())
    }

    pub fn uncheck(&mut self, id: &HabitId, day: u32) -> Result<(), TrackerError> {
        if self.habits.get(id).is_none() {
            return Err(TrackerError::habit_not_found(id));
        }
        self.progress.unmark(id, day);
        Ok(())
    }

    pub fn clear_progress(&mut self) {
        self.progress.clear();
    }

    pub fn note(&self, day: u32) -> &str {
        self.daily_notes.get(&day).map(String::as_str).unwrap_or("")
    }

    pub fn set_note(&mut self, day: u32, text: impl Into<String>) -> Result<(), TrackerError> {
        if !self.month.contains_day(day) {
            return Err(TrackerError::validation(format!(
                "day {day} is outside {}",
                self.month.label()
            )));
        }
        self.daily_notes.insert(day, text.into());
        Ok(())
    }

    pub fn clear_note(&mut self, day: u32) -> Result<(), TrackerError> {
        self.set_note(day, String::new())
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredUserData {
    #[serde(default)]
    schema_version: u32,
    #[serde(deserialize_with = "year_from_number_or_text")]
    year: i32,
    month: MonthName,
    #[serde(default)]
    days: Option<u32>,
    #[serde(default, deserialize_with = "null_as_default")]
    habits: HabitRegistry,
    #[serde(default, deserialize_with = "null_as_default")]
    progress: CompletionLedger,
    #[serde(default, deserialize_with = "null_as_default")]
    notes: String,
    #[serde(default, deserialize_with = "null_as_default")]
    daily_notes: DailyNotes,
}

impl TryFrom<StoredUserData> for UserData {
    type Error = TrackerError;

    fn try_from(stored: StoredUserData) -> Result<Self, Self::Error> {
        if stored.schema_version > SCHEMA_VERSION {
            return Err(TrackerError::Storage(format!(
                "schema version {} is newer than supported {SCHEMA_VERSION}",
                stored.schema_version
            )));
        }
        let month = MonthConfig::new(stored.year, stored.month)
            .map_err(|err| TrackerError::Storage(err.to_string()))?;
        if let Some(days) = stored.days {
            if days != month.days() {
                return Err(TrackerError::Storage(format!(
                    "{} has {} days, record says {days}",
                    month.label(),
                    month.days()
                )));
            }
        }
        Ok(Self {
            month,
            habits: stored.habits,
            progress: stored.progress,
            notes: stored.notes,
            daily_notes: stored.daily_notes,
        })
    }
}

impl From<UserData> for StoredUserData {
    fn from(data: UserData) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            year: data.month.year(),
            month: data.month.month(),
            days: Some(data.month.days()),
            habits: data.habits,
            progress: data.progress,
            notes: data.notes,
            daily_notes: data.daily_notes,
        }
    }
}

fn year_from_number_or_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i32, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Year {
        Number(i32),
        Text(String),
    }

    match Year::deserialize(deserializer)? {
        Year::Number(year) => Ok(year),
        Year::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid year {text:?}"))),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccount {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatView {
    #[default]
    Monthly,
    Weekly,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub create: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub username: Option<String>,
    pub created: bool,
    pub needs_onboarding: bool,
}

#[derive(Debug, Deserialize)]
pub struct OnboardingRequest {
    pub year: i32,
    pub month: String,
    #[serde(default)]
    pub habits: Vec<String>,
    #[serde(default)]
    pub top: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct CellRequest {
    pub habit_id: HabitId,
    pub day: u32,
}

#[derive(Debug, Deserialize)]
pub struct PasswordRequest {
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct AddHabitRequest {
    pub name: String,
    #[serde(default)]
    pub start_from_today: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpdateHabitRequest {
    pub name: Option<String>,
    pub details: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MoveHabitRequest {
    pub index: usize,
}

#[derive(Debug, Deserialize)]
pub struct TopHabitsRequest {
    pub ids: Vec<HabitId>,
}

#[derive(Debug, Deserialize)]
pub struct NoteRequest {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct ViewRequest {
    pub selected_day: Option<u32>,
    pub stat_view: Option<StatView>,
    pub graph_visible: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct MasterSetupRequest {
    pub password: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct SwitchProfileRequest {
    pub password: String,
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub struct RecoverRequest {
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct AccountSummary {
    pub username: String,
    pub password: String,
    pub period: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct WeekBucket {
    pub label: String,
    pub start_day: u32,
    pub end_day: u32,
    pub percent: u8,
    pub checked: u32,
    pub possible: u32,
}

#[derive(Debug, Serialize)]
pub struct WeekSummary {
    #[serde(flatten)]
    pub bucket: WeekBucket,
    pub is_current: bool,
}

#[derive(Debug, Serialize)]
pub struct TopHabit {
    pub id: HabitId,
    pub name: String,
    pub percent: u8,
}

#[derive(Debug, Serialize)]
pub struct HabitRow {
    pub id: HabitId,
    pub name: String,
    pub is_top: bool,
    pub start_date: u32,
    pub details: String,
    pub percent: u8,
    pub cells: Vec<CellState>,
}

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub username: String,
    pub month: MonthConfig,
    pub selected_day: u32,
    pub stat_view: StatView,
    pub headline_label: String,
    pub headline_percent: u8,
    pub monthly_percent: u8,
    pub weeks: Vec<WeekSummary>,
    pub daily_series: Vec<u8>,
    pub top_habits: Vec<TopHabit>,
    pub habits: Vec<HabitRow>,
    pub note: String,
    pub graph_visible: bool,
}
