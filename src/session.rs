use crate::errors::TrackerError;
use crate::models::{MonthName, StatView, UserData};
use chrono::{Datelike, NaiveDate};

/// The logged-in profile and what the dashboard is currently showing.
///
/// `data` is `None` until the profile finishes onboarding.
#[derive(Debug, Clone)]
pub struct Session {
    pub username: String,
    pub data: Option<UserData>,
    pub selected_day: u32,
    pub stat_view: StatView,
    pub graph_visible: bool,
}

impl Session {
    pub fn new(username: impl Into<String>, today: NaiveDate) -> Self {
        Self {
            username: username.into(),
            data: None,
            selected_day: today.day(),
            stat_view: StatView::default(),
            graph_visible: false,
        }
    }

    pub fn with_data(mut self, data: Option<UserData>) -> Self {
        self.data = data;
        self.clamp_selection();
        self
    }

    pub fn needs_onboarding(&self) -> bool {
        self.data.is_none()
    }

    pub fn data(&self) -> Result<&UserData, TrackerError> {
        self.data.as_ref().ok_or_else(not_onboarded)
    }

    pub fn data_mut(&mut self) -> Result<&mut UserData, TrackerError> {
        self.data.as_mut().ok_or_else(not_onboarded)
    }

    pub fn onboard(
        &mut self,
        year: i32,
        month: &str,
        habits: &[String],
        top: &[String],
    ) -> Result<(), TrackerError> {
        let month = MonthName::parse(month)
            .ok_or_else(|| TrackerError::validation(format!("unknown month {month:?}")))?;
        self.data = Some(UserData::onboard(year, month, habits, top)?);
        self.clamp_selection();
        Ok(())
    }

    pub fn select_day(&mut self, day: u32) -> Result<(), TrackerError> {
        let data = self.data()?;
        if !data.month.contains_day(day) {
            return Err(TrackerError::validation(format!(
                "day {day} is outside {}",
                data.month.label()
            )));
        }
        self.selected_day = day;
        Ok(())
    }

    /// Jumps to today's day-of-month when the tracked month has that day.
    pub fn go_to_today(&mut self, today: NaiveDate) -> Result<u32, TrackerError> {
        self.select_day(today.day())?;
        Ok(self.selected_day)
    }

    pub fn set_note_for_selected(&mut self, text: &str) -> Result<(), TrackerError> {
        let day = self.selected_day;
        self.data_mut()?.set_note(day, text)
    }

    fn clamp_selection(&mut self) {
        if let Some(data) = &self.data {
            self.selected_day = self.selected_day.clamp(1, data.month.days());
        }
    }
}

fn not_onboarded() -> TrackerError {
    TrackerError::NotFound("tracking month for this profile".to_string())
}
