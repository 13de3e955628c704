use crate::ledger::CompletionLedger;
use crate::models::{
    DashboardResponse, Habit, HabitRow, MonthConfig, StatView, TopHabit, UserData, WeekBucket,
    WeekSummary,
};
use crate::session::Session;
use chrono::NaiveDate;

const WEEK_LENGTH: u32 = 7;

/// Raw counts behind a percentage. Sum tallies, never percentages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RangeTally {
    pub checked: u32,
    pub possible: u32,
}

impl RangeTally {
    pub fn percent(self) -> u8 {
        percent(self.checked, self.possible)
    }
}

impl std::ops::Add for RangeTally {
    type Output = RangeTally;

    fn add(self, rhs: RangeTally) -> RangeTally {
        RangeTally {
            checked: self.checked + rhs.checked,
            possible: self.possible + rhs.possible,
        }
    }
}

/// `round(100 * checked / possible)` with halves rounded up, 0 when nothing
/// was possible.
pub fn percent(checked: u32, possible: u32) -> u8 {
    if possible == 0 {
        return 0;
    }
    let checked = u64::from(checked.min(possible));
    let possible = u64::from(possible);
    ((200 * checked + possible) / (2 * possible)) as u8
}

/// Read-only view over one month of tracking data. Every figure is derived
/// on demand from the three inputs.
#[derive(Debug, Clone, Copy)]
pub struct Progress<'a> {
    month: &'a MonthConfig,
    habits: &'a [Habit],
    ledger: &'a CompletionLedger,
}

impl<'a> Progress<'a> {
    pub fn new(month: &'a MonthConfig, habits: &'a [Habit], ledger: &'a CompletionLedger) -> Self {
        Self {
            month,
            habits,
            ledger,
        }
    }

    pub fn of(data: &'a UserData) -> Self {
        Self::new(&data.month, data.habits.as_slice(), &data.progress)
    }

    pub fn habit_tally(&self, habit: &Habit) -> RangeTally {
        let mut tally = RangeTally::default();
        for day in habit.active_days(self.month) {
            tally.possible += 1;
            if self.ledger.is_checked(&habit.id, day) {
                tally.checked += 1;
            }
        }
        tally
    }

    pub fn habit_percent(&self, habit: &Habit) -> u8 {
        self.habit_tally(habit).percent()
    }

    /// Counts every `(habit, day)` pair in `[start_day, end_day]` where the
    /// habit is active. Days outside the month never count.
    pub fn range_tally(&self, start_day: u32, end_day: u32) -> RangeTally {
        let start = start_day.max(1);
        let end = end_day.min(self.month.days());
        let mut tally = RangeTally::default();
        for day in start..=end {
            for habit in self.habits.iter().filter(|habit| habit.is_active_on(day)) {
                tally.possible += 1;
                if self.ledger.is_checked(&habit.id, day) {
                    tally.checked += 1;
                }
            }
        }
        tally
    }

    pub fn range_percent(&self, start_day: u32, end_day: u32) -> u8 {
        self.range_tally(start_day, end_day).percent()
    }

    /// 7-day windows from day 1; the last one stops at month end.
    pub fn weekly_buckets(&self) -> Vec<WeekBucket> {
        let days = self.month.days();
        (0..days.div_ceil(WEEK_LENGTH))
            .map(|k| {
                let start_day = k * WEEK_LENGTH + 1;
                let end_day = (start_day + WEEK_LENGTH - 1).min(days);
                let tally = self.range_tally(start_day, end_day);
                WeekBucket {
                    label: format!("Week {}", k + 1),
                    start_day,
                    end_day,
                    percent: tally.percent(),
                    checked: tally.checked,
                    possible: tally.possible,
                }
            })
            .collect()
    }

    pub fn monthly_tally(&self) -> RangeTally {
        self.range_tally(1, self.month.days())
    }

    pub fn monthly_percent(&self) -> u8 {
        self.monthly_tally().percent()
    }

    pub fn current_week_percent(&self, selected_day: u32) -> u8 {
        self.weekly_buckets()
            .into_iter()
            .find(|bucket| (bucket.start_day..=bucket.end_day).contains(&selected_day))
            .map_or(0, |bucket| bucket.percent)
    }

    /// One value per day of the month, feeding the trend chart.
    pub fn daily_series(&self) -> Vec<u8> {
        (1..=self.month.days())
            .map(|day| self.range_percent(day, day))
            .collect()
    }

    pub fn top_habits(&self) -> Vec<TopHabit> {
        self.habits
            .iter()
            .filter(|habit| habit.is_top)
            .map(|habit| TopHabit {
                id: habit.id.clone(),
                name: habit.name.clone(),
                percent: self.habit_percent(habit),
            })
            .collect()
    }
}

pub fn build_dashboard_at(today: NaiveDate, session: &Session, data: &UserData) -> DashboardResponse {
    let progress = Progress::of(data);
    let selected_day = session.selected_day.clamp(1, data.month.days());
    let monthly_percent = progress.monthly_percent();

    let weeks: Vec<WeekSummary> = progress
        .weekly_buckets()
        .into_iter()
        .map(|bucket| WeekSummary {
            is_current: (bucket.start_day..=bucket.end_day).contains(&selected_day),
            bucket,
        })
        .collect();

    let (headline_label, headline_percent) = match session.stat_view {
        StatView::Monthly => ("Monthly Progress", monthly_percent),
        StatView::Weekly => (
            "Current Week Progress",
            progress.current_week_percent(selected_day),
        ),
    };

    let habits = data
        .habits
        .iter()
        .map(|habit| HabitRow {
            id: habit.id.clone(),
            name: habit.name.clone(),
            is_top: habit.is_top,
            start_date: habit.start_date,
            details: habit.details.clone(),
            percent: progress.habit_percent(habit),
            cells: (1..=data.month.days())
                .map(|day| data.cell_state(habit, day, today))
                .collect(),
        })
        .collect();

    DashboardResponse {
        username: session.username.clone(),
        month: data.month,
        selected_day,
        stat_view: session.stat_view,
        headline_label: headline_label.to_string(),
        headline_percent,
        monthly_percent,
        weeks,
        daily_series: progress.daily_series(),
        top_habits: progress.top_habits(),
        habits,
        note: data.note(selected_day).to_string(),
        graph_visible: session.graph_visible,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{HabitId, MonthName};

    fn month(year: i32, name: MonthName) -> MonthConfig {
        MonthConfig::new(year, name).unwrap()
    }

    fn habit(id: u64, start: u32) -> Habit {
        Habit::new(HabitId::from(id), format!("Habit {id}"), start)
    }

    fn ledger(entries: &[(u64, u32)]) -> CompletionLedger {
        let mut ledger = CompletionLedger::default();
        for (id, day) in entries {
            ledger.mark(&HabitId::from(*id), *day);
        }
        ledger
    }

    #[test]
    fn percent_rounds_half_up() {
        assert_eq!(percent(0, 0), 0);
        assert_eq!(percent(1, 8), 13);
        assert_eq!(percent(1, 200), 1);
        assert_eq!(percent(1, 7), 14);
        assert_eq!(percent(7, 7), 100);
    }

    #[test]
    fn leap_february_scenario() {
        let month = month(2024, MonthName::February);
        let habits = vec![habit(1, 1)];
        let checks: Vec<(u64, u32)> = (1..=15).map(|d| (1, d)).collect();
        let ledger = ledger(&checks);
        let progress = Progress::new(&month, &habits, &ledger);

        assert_eq!(progress.habit_percent(&habits[0]), 52);
        assert_eq!(progress.range_percent(1, 7), 100);
        assert_eq!(progress.range_percent(8, 14), 100);
        assert_eq!(progress.range_percent(15, 21), 14);
    }

    #[test]
    fn late_start_habit_without_checks() {
        let month = month(2024, MonthName::September);
        let habits = vec![habit(1, 10)];
        let ledger = CompletionLedger::default();
        let progress = Progress::new(&month, &habits, &ledger);
        assert_eq!(progress.habit_percent(&habits[0]), 0);
        assert_eq!(progress.habit_tally(&habits[0]).possible, 21);
        assert_eq!(progress.range_tally(1, 9).possible, 0);
    }

    #[test]
    fn no_habits_means_zero_everywhere() {
        let month = month(2025, MonthName::January);
        let ledger = ledger(&[(9, 3)]);
        let progress = Progress::new(&month, &[], &ledger);
        assert_eq!(progress.monthly_percent(), 0);
        assert_eq!(progress.daily_series(), vec![0; 31]);
        assert!(progress.weekly_buckets().iter().all(|w| w.percent == 0));
        assert_eq!(progress.current_week_percent(3), 0);
    }

    #[test]
    fn start_after_month_end_contributes_nothing() {
        let month = month(2023, MonthName::February);
        let habits = vec![habit(1, 31), habit(2, 1)];
        let ledger = ledger(&[(1, 28), (2, 28)]);
        let progress = Progress::new(&month, &habits, &ledger);
        assert_eq!(progress.habit_percent(&habits[0]), 0);
        assert_eq!(progress.habit_tally(&habits[0]), RangeTally::default());
        assert_eq!(progress.monthly_tally(), RangeTally { checked: 1, possible: 28 });
    }

    #[test]
    fn weekly_buckets_cover_month() {
        let habits = vec![habit(1, 1)];
        let ledger = CompletionLedger::default();

        let feb = month(2023, MonthName::February);
        let weeks = Progress::new(&feb, &habits, &ledger).weekly_buckets();
        assert_eq!(weeks.len(), 4);

        let may = month(2023, MonthName::May);
        let weeks = Progress::new(&may, &habits, &ledger).weekly_buckets();
        assert_eq!(weeks.len(), 5);
        assert_eq!(weeks[4].label, "Week 5");
        assert_eq!((weeks[4].start_day, weeks[4].end_day), (29, 31));
        assert_eq!(weeks[4].possible, 3);
    }

    #[test]
    fn monthly_matches_summed_weekly_tallies() {
        let month = month(2024, MonthName::March);
        let habits = vec![habit(1, 1), habit(2, 5), habit(3, 20)];
        let ledger = ledger(&[(1, 1), (1, 2), (1, 30), (2, 5), (2, 6), (2, 29), (3, 31), (4, 3), (1, 99)]);
        let progress = Progress::new(&month, &habits, &ledger);

        let summed = progress
            .weekly_buckets()
            .iter()
            .map(|week| RangeTally {
                checked: week.checked,
                possible: week.possible,
            })
            .fold(RangeTally::default(), |acc, t| acc + t);
        assert_eq!(summed, progress.monthly_tally());
        assert_eq!(progress.monthly_percent(), summed.percent());
        assert_eq!(progress.monthly_percent(), progress.range_percent(1, month.days()));

        let possible: u32 = habits.iter().map(|h| month.days() - h.start_date + 1).sum();
        assert_eq!(progress.monthly_tally().possible, possible);
        assert_eq!(progress.monthly_tally().checked, 7);
    }

    #[test]
    fn current_week_follows_selected_day() {
        let month = month(2024, MonthName::February);
        let habits = vec![habit(1, 1)];
        let checks: Vec<(u64, u32)> = (1..=15).map(|d| (1, d)).collect();
        let ledger = ledger(&checks);
        let progress = Progress::new(&month, &habits, &ledger);
        assert_eq!(progress.current_week_percent(3), 100);
        assert_eq!(progress.current_week_percent(15), 14);
        assert_eq!(progress.current_week_percent(29), 0);
        assert_eq!(progress.current_week_percent(0), 0);
        assert_eq!(progress.current_week_percent(30), 0);
    }

    #[test]
    fn daily_series_counts_active_habits_only() {
        let month = month(2024, MonthName::February);
        let habits = vec![habit(1, 1), habit(2, 3)];
        let ledger = ledger(&[(1, 1), (1, 3), (2, 3), (2, 4)]);
        let series = Progress::new(&month, &habits, &ledger).daily_series();
        assert_eq!(series.len(), 29);
        assert_eq!(&series[..4], &[100, 0, 100, 50]);
    }

    #[test]
    fn top_habits_report_their_percent() {
        let month = month(2024, MonthName::February);
        let mut habits = vec![habit(1, 1), habit(2, 1)];
        habits[1].is_top = true;
        let ledger = ledger(&[(2, 1)]);
        let top = Progress::new(&month, &habits, &ledger).top_habits();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].id, HabitId::from(2u64));
        assert_eq!(top[0].percent, 3);
    }

    #[test]
    fn dashboard_headline_follows_stat_view() {
        let mut data = UserData::onboard(
            2024,
            MonthName::February,
            &["Read".to_string()],
            &["Read".to_string()],
        )
        .unwrap();
        let id = data.habits.as_slice()[0].id.clone();
        let today = NaiveDate::from_ymd_opt(2024, 2, 20).unwrap();
        for day in 1..=15 {
            data.check(&id, day, today).unwrap();
        }
        let mut session = Session::new("ana", today);
        session.selected_day = 15;

        let dashboard = build_dashboard_at(today, &session, &data);
        assert_eq!(dashboard.headline_percent, 52);
        assert_eq!(dashboard.monthly_percent, 52);
        assert!(dashboard.weeks[2].is_current);
        assert_eq!(dashboard.top_habits.len(), 1);
        assert_eq!(dashboard.habits[0].cells.len(), 29);
        assert_eq!(dashboard.habits[0].cells[0], crate::eligibility::CellState::Done);
        assert_eq!(dashboard.habits[0].cells[15], crate::eligibility::CellState::Open);
        assert_eq!(dashboard.habits[0].cells[20], crate::eligibility::CellState::Locked);

        session.stat_view = StatView::Weekly;
        let dashboard = build_dashboard_at(today, &session, &data);
        assert_eq!(dashboard.headline_label, "Current Week Progress");
        assert_eq!(dashboard.headline_percent, 14);
    }
}
