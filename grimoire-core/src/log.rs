//! Activity log entries produced by the casting engine.
//!
//! The engine builds entries; where they are stored is up to the host,
//! through the [`ActivityLog`] trait.

use crate::casting::MethodType;
use crate::character::RestType;
use crate::dice::DiceRollResult;
use crate::effects::EffectResult;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActivityEntry {
    SpellCast {
        ability_id: String,
        ability_name: String,
        method: MethodType,
        tier: u8,
        action_cost: u32,
        resource_spent: Option<(String, i32)>,
    },
    DiceRoll {
        label: String,
        roll: DiceRollResult,
    },
    EffectsApplied {
        source: String,
        results: Vec<EffectResult>,
    },
    Rest {
        rest_type: RestType,
        restored: Vec<String>,
    },
}

impl ActivityEntry {
    pub fn summary(&self) -> String {
        match self {
            ActivityEntry::SpellCast {
                ability_name,
                method,
                tier,
                resource_spent,
                ..
            } => match resource_spent {
                Some((resource, amount)) => format!(
                    "Cast {ability_name} at tier {tier} via {method} ({amount} {resource})"
                ),
                None => format!("Cast {ability_name} at tier {tier} via {method}"),
            },
            ActivityEntry::DiceRoll { label, roll } => format!("{label}: {roll}"),
            ActivityEntry::EffectsApplied { source, results } => {
                let failed = results.iter().filter(|r| !r.success).count();
                if failed == 0 {
                    format!("{source}: {} effect(s) applied", results.len())
                } else {
                    format!(
                        "{source}: {} effect(s) applied, {failed} failed",
                        results.len() - failed
                    )
                }
            }
            ActivityEntry::Rest {
                rest_type,
                restored,
            } => {
                let kind = match rest_type {
                    RestType::Short => "Short rest",
                    RestType::Long => "Long rest",
                };
                if restored.is_empty() {
                    kind.to_string()
                } else {
                    format!("{kind}: restored {}", restored.join(", "))
                }
            }
        }
    }
}

/// A log entry with its own id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: Uuid,
    pub entry: ActivityEntry,
}

impl LogEntry {
    pub fn new(entry: ActivityEntry) -> Self {
        Self {
            id: Uuid::new_v4(),
            entry,
        }
    }
}

/// Sink for activity log entries.
pub trait ActivityLog {
    fn add_log_entry(&mut self, entry: LogEntry);
}

/// Keeps entries in memory, oldest first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryLog {
    entries: Vec<LogEntry>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The most recent `count` entries, oldest first.
    pub fn recent(&self, count: usize) -> &[LogEntry] {
        let start = self.entries.len().saturating_sub(count);
        &self.entries[start..]
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl ActivityLog for MemoryLog {
    fn add_log_entry(&mut self, entry: LogEntry) {
        self.entries.push(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cast_entry(name: &str) -> LogEntry {
        LogEntry::new(ActivityEntry::SpellCast {
            ability_id: name.to_lowercase(),
            ability_name: name.to_string(),
            method: MethodType::Mana,
            tier: 2,
            action_cost: 1,
            resource_spent: Some(("mana".to_string(), 2)),
        })
    }

    #[test]
    fn test_memory_log_keeps_order() {
        let mut log = MemoryLog::new();
        log.add_log_entry(cast_entry("First"));
        log.add_log_entry(cast_entry("Second"));
        log.add_log_entry(cast_entry("Third"));

        assert_eq!(log.len(), 3);
        let recent = log.recent(2);
        assert_eq!(recent.len(), 2);
        assert!(recent[1].entry.summary().contains("Third"));
    }

    #[test]
    fn test_spell_cast_summary() {
        let entry = cast_entry("Shield");
        assert_eq!(
            entry.entry.summary(),
            "Cast Shield at tier 2 via mana (2 mana)"
        );
    }

    #[test]
    fn test_rest_summary() {
        let entry = ActivityEntry::Rest {
            rest_type: RestType::Long,
            restored: vec!["Mana".to_string(), "Spell Slots".to_string()],
        };
        assert_eq!(entry.summary(), "Long rest: restored Mana, Spell Slots");
    }

    #[test]
    fn test_entries_get_unique_ids() {
        let a = cast_entry("A");
        let b = cast_entry("A");
        assert_ne!(a.id, b.id);
    }
}
