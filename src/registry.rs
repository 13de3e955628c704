use crate::errors::TrackerError;
use crate::models::{Habit, HabitId};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Ordered list of habits. Order is the display order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HabitRegistry {
    habits: Vec<Habit>,
}

impl HabitRegistry {
    pub fn as_slice(&self) -> &[Habit] {
        &self.habits
    }

    pub fn iter(&self) -> impl Iterator<Item = &Habit> {
        self.habits.iter()
    }

    pub fn len(&self) -> usize {
        self.habits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.habits.is_empty()
    }

    pub fn get(&self, id: &HabitId) -> Option<&Habit> {
        self.habits.iter().find(|habit| &habit.id == id)
    }

    fn get_mut(&mut self, id: &HabitId) -> Result<&mut Habit, TrackerError> {
        self.habits
            .iter_mut()
            .find(|habit| &habit.id == id)
            .ok_or_else(|| TrackerError::habit_not_found(id))
    }

    pub fn add_habit(&mut self, name: &str, start_date: u32) -> Result<HabitId, TrackerError> {
        let name = valid_name(name)?;
        let id = self.next_id(Utc::now().timestamp_millis());
        self.habits.push(Habit::new(id.clone(), name, start_date));
        Ok(id)
    }

    pub fn rename_habit(&mut self, id: &HabitId, name: &str) -> Result<(), TrackerError> {
        let name = valid_name(name)?;
        self.get_mut(id)?.name = name;
        Ok(())
    }

    pub fn set_details(&mut self, id: &HabitId, details: &str) -> Result<(), TrackerError> {
        self.get_mut(id)?.details = details.to_string();
        Ok(())
    }

    pub fn set_top(&mut self, id: &HabitId, is_top: bool) -> Result<(), TrackerError> {
        self.get_mut(id)?.is_top = is_top;
        Ok(())
    }

    /// Drops the habit. Its ledger entries stay behind and are simply never
    /// read again.
    pub fn remove_habit(&mut self, id: &HabitId) -> Result<Habit, TrackerError> {
        let idx = self
            .habits
            .iter()
            .position(|habit| &habit.id == id)
            .ok_or_else(|| TrackerError::habit_not_found(id))?;
        Ok(self.habits.remove(idx))
    }

    pub fn move_habit(&mut self, id: &HabitId, to_index: usize) -> Result<(), TrackerError> {
        let from = self
            .habits
            .iter()
            .position(|habit| &habit.id == id)
            .ok_or_else(|| TrackerError::habit_not_found(id))?;
        let habit = self.habits.remove(from);
        let to = to_index.min(self.habits.len());
        self.habits.insert(to, habit);
        Ok(())
    }

    /// Replaces the whole top-priority selection: exactly the habits in
    /// `ids` end up flagged. Unknown ids are rejected before anything changes.
    pub fn set_top_priority(&mut self, ids: &HashSet<HabitId>) -> Result<(), TrackerError> {
        if let Some(unknown) = ids.iter().find(|id| self.get(id).is_none()) {
            return Err(TrackerError::habit_not_found(unknown));
        }
        for habit in &mut self.habits {
            habit.is_top = ids.contains(&habit.id);
        }
        Ok(())
    }

    // Millisecond timestamps, bumped past every numeric id already present so
    // two adds in the same millisecond still differ.
    fn next_id(&self, now_millis: i64) -> HabitId {
        let floor = u64::try_from(now_millis).unwrap_or(0);
        let next = self
            .habits
            .iter()
            .filter_map(|habit| habit.id.as_number())
            .max()
            .map_or(floor, |max| floor.max(max.saturating_add(1)));
        HabitId::from(next)
    }
}

fn valid_name(name: &str) -> Result<String, TrackerError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(TrackerError::validation("habit name cannot be empty"));
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(names: &[&str]) -> HabitRegistry {
        let mut registry = HabitRegistry::default();
        for name in names {
            registry.add_habit(name, 1).unwrap();
        }
        registry
    }

    fn ids(registry: &HabitRegistry) -> Vec<HabitId> {
        registry.iter().map(|habit| habit.id.clone()).collect()
    }

    #[test]
    fn add_assigns_distinct_ids_and_defaults() {
        let registry = registry(&["Read", "Walk", "Write"]);
        let ids = ids(&registry);
        let unique: HashSet<_> = ids.iter().collect();
        assert_eq!(unique.len(), 3);
        let first = &registry.as_slice()[0];
        assert!(!first.is_top);
        assert_eq!(first.details, "");
        assert_eq!(first.start_date, 1);
    }

    #[test]
    fn add_rejects_blank_names() {
        let mut registry = HabitRegistry::default();
        let err = registry.add_habit("   ", 1).unwrap_err();
        assert!(matches!(err, TrackerError::Validation(_)));
        assert!(registry.is_empty());
    }

    #[test]
    fn zero_start_date_defaults_to_first_day() {
        let mut registry = HabitRegistry::default();
        let id = registry.add_habit("Read", 0).unwrap();
        assert_eq!(registry.get(&id).unwrap().start_date, 1);
    }

    #[test]
    fn rename_trims_and_validates() {
        let mut registry = registry(&["Read"]);
        let id = ids(&registry)[0].clone();
        registry.rename_habit(&id, "  Read more ").unwrap();
        assert_eq!(registry.get(&id).unwrap().name, "Read more");
        assert!(registry.rename_habit(&id, "").is_err());
        assert_eq!(registry.get(&id).unwrap().name, "Read more");
        assert!(matches!(
            registry.rename_habit(&HabitId::from("missing"), "x"),
            Err(TrackerError::NotFound(_))
        ));
    }

    #[test]
    fn remove_and_move_keep_order() {
        let mut registry = registry(&["A", "B", "C"]);
        let ids = ids(&registry);
        registry.move_habit(&ids[0], 10).unwrap();
        let names: Vec<_> = registry.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, ["B", "C", "A"]);

        registry.remove_habit(&ids[2]).unwrap();
        let names: Vec<_> = registry.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, ["B", "A"]);
        assert!(registry.remove_habit(&ids[2]).is_err());
    }

    #[test]
    fn top_priority_is_full_replace() {
        let mut registry = registry(&["A", "B"]);
        let ids = ids(&registry);
        registry.set_top(&ids[0], true).unwrap();

        let selection: HashSet<HabitId> = [ids[1].clone()].into_iter().collect();
        registry.set_top_priority(&selection).unwrap();
        assert!(!registry.get(&ids[0]).unwrap().is_top);
        assert!(registry.get(&ids[1]).unwrap().is_top);
        assert_eq!(registry.iter().filter(|habit| habit.is_top).count(), 1);
    }

    #[test]
    fn top_priority_with_unknown_id_changes_nothing() {
        let mut registry = registry(&["A", "B"]);
        let ids = ids(&registry);
        registry.set_top(&ids[0], true).unwrap();
        let selection: HashSet<HabitId> =
            [ids[1].clone(), HabitId::from("ghost")].into_iter().collect();
        assert!(registry.set_top_priority(&selection).is_err());
        assert!(registry.get(&ids[0]).unwrap().is_top);
        assert!(!registry.get(&ids[1]).unwrap().is_top);
    }

    #[test]
    fn next_id_skips_past_existing_numbers() {
        let mut registry = HabitRegistry::default();
        registry.habits.push(Habit::new(HabitId::from(5000u64), "A", 1));
        assert_eq!(registry.next_id(10), HabitId::from(5001u64));
        assert_eq!(registry.next_id(9000), HabitId::from(9000u64));
    }
}
