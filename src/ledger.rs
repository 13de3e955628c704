use crate::models::HabitId;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, HashSet};
use tracing::warn;

/// One cell of the tracking grid.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LedgerKey {
    pub habit: HabitId,
    pub day: u32,
}

impl LedgerKey {
    pub fn new(habit: HabitId, day: u32) -> Self {
        Self { habit, day }
    }

    /// Stored form, `<habit id>_<day>`.
    pub fn encode(&self) -> String {
        format!("{}_{}", self.habit, self.day)
    }

    /// Splits on the last underscore so ids that contain `_` survive.
    pub fn decode(raw: &str) -> Option<Self> {
        let (habit, day) = raw.rsplit_once('_')?;
        let day = day.parse::<u32>().ok().filter(|day| *day >= 1)?;
        if habit.is_empty() {
            return None;
        }
        Some(Self::new(HabitId::new(habit), day))
    }
}

/// Sparse record of completed cells. A cell is done iff its key is present;
/// nothing is ever stored as "not done".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletionLedger {
    entries: HashSet<LedgerKey>,
}

impl CompletionLedger {
    pub fn is_checked(&self, habit: &HabitId, day: u32) -> bool {
        self.entries.contains(&LedgerKey::new(habit.clone(), day))
    }

    /// Records a completion without looking at lock state; callers gate on
    /// eligibility first.
    pub fn mark(&mut self, habit: &HabitId, day: u32) {
        self.entries.insert(LedgerKey::new(habit.clone(), day));
    }

    pub fn unmark(&mut self, habit: &HabitId, day: u32) -> bool {
        self.entries.remove(&LedgerKey::new(habit.clone(), day))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for CompletionLedger {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut keys: Vec<&LedgerKey> = self.entries.iter().collect();
        keys.sort();
        let mut map = serializer.serialize_map(Some(keys.len()))?;
        for key in keys {
            map.serialize_entry(&key.encode(), &true)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for CompletionLedger {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, serde_json::Value>::deserialize(deserializer)?;
        let mut ledger = CompletionLedger::default();
        for (key, value) in raw {
            if value != serde_json::Value::Bool(true) {
                continue;
            }
            match LedgerKey::decode(&key) {
                Some(key) => {
                    ledger.entries.insert(key);
                }
                None => warn!("dropping malformed progress key {key:?}"),
            }
        }
        Ok(ledger)
    }
}
