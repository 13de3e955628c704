use crate::ledger::CompletionLedger;
use crate::models::{Habit, MonthConfig};
use chrono::{Datelike, NaiveDate};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CellState {
    Locked,
    Open,
    Done,
}

/// Whether the `(habit, day)` cell refuses toggles as of `today`.
///
/// A cell is open only once the habit is active and the day has actually
/// happened. Days outside the configured month are always locked.
pub fn is_locked(habit: &Habit, day: u32, month: &MonthConfig, today: NaiveDate) -> bool {
    if !month.contains_day(day) {
        return true;
    }
    if day < habit.start_date {
        return true;
    }
    if month.year() > today.year() {
        return true;
    }
    if month.year() == today.year() {
        if month.month_index() > today.month0() {
            return true;
        }
        if month.month_index() == today.month0() && day > today.day() {
            return true;
        }
    }
    false
}

pub fn cell_state(
    habit: &Habit,
    day: u32,
    month: &MonthConfig,
    ledger: &CompletionLedger,
    today: NaiveDate,
) -> CellState {
    if is_locked(habit, day, month, today) {
        CellState::Locked
    } else if ledger.is_checked(&habit.id, day) {
        CellState::Done
    } else {
        CellState::Open
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{HabitId, MonthName};

    fn habit(start: u32) -> Habit {
        Habit::new(HabitId::from(1u64), "Stretch", start)
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn days_before_activation_are_locked() {
        let month = MonthConfig::new(2024, MonthName::September).unwrap();
        let h = habit(10);
        let today = date(2025, 1, 1);
        for day in 1..10 {
            assert!(is_locked(&h, day, &month, today), "day {day}");
        }
        assert!(!is_locked(&h, 10, &month, today));
        assert!(!is_locked(&h, 15, &month, today));
    }

    #[test]
    fn future_year_and_month_are_locked() {
        let month = MonthConfig::new(2026, MonthName::March).unwrap();
        let h = habit(1);
        assert!(is_locked(&h, 1, &month, date(2025, 12, 31)));
        assert!(is_locked(&h, 1, &month, date(2026, 2, 28)));
        assert!(!is_locked(&h, 31, &month, date(2026, 4, 1)));
        assert!(!is_locked(&h, 1, &month, date(2027, 1, 1)));
    }

    #[test]
    fn current_month_locks_days_after_today() {
        let month = MonthConfig::new(2026, MonthName::October).unwrap();
        let h = habit(1);
        let today = date(2026, 10, 16);
        assert!(!is_locked(&h, 16, &month, today));
        assert!(is_locked(&h, 17, &month, today));
    }

    #[test]
    fn days_outside_month_are_locked() {
        let month = MonthConfig::new(2024, MonthName::February).unwrap();
        let h = habit(1);
        let today = date(2030, 1, 1);
        assert!(is_locked(&h, 0, &month, today));
        assert!(is_locked(&h, 30, &month, today));
        assert!(!is_locked(&h, 29, &month, today));
    }

    #[test]
    fn cell_state_reflects_ledger() {
        let month = MonthConfig::new(2024, MonthName::February).unwrap();
        let h = habit(3);
        let mut ledger = CompletionLedger::default();
        ledger.mark(&h.id, 4);
        let today = date(2024, 2, 10);
        assert_eq!(cell_state(&h, 2, &month, &ledger, today), CellState::Locked);
        assert_eq!(cell_state(&h, 4, &month, &ledger, today), CellState::Done);
        assert_eq!(cell_state(&h, 5, &month, &ledger, today), CellState::Open);
        assert_eq!(cell_state(&h, 11, &month, &ledger, today), CellState::Locked);
    }
}
