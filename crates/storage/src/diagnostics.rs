use std::fmt;

use serde_json::{Map, Value};
use tracing::info;

use crate::error::StorageError;
use crate::kv::KeyValueStore;
use crate::persistence::{ensure_object, repair_value, STORAGE_VERSION};

/// Structural health of a statistics slot, checked outermost first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotReport {
    Empty,
    Unparseable(String),
    MissingState,
    MissingUserStats,
    MissingPractice,
    Valid { version: Option<u64> },
}

impl fmt::Display for SlotReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "no data in slot"),
            Self::Unparseable(reason) => write!(f, "slot is not valid json: {reason}"),
            Self::MissingState => write!(f, "missing state property"),
            Self::MissingUserStats => write!(f, "missing userStats property"),
            Self::MissingPractice => write!(f, "missing practice property"),
            Self::Valid {
                version: Some(version),
            } => write!(f, "valid structure (version {version})"),
            Self::Valid { version: None } => write!(f, "valid structure (unversioned)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepairOutcome {
    NothingToRepair,
    Unparseable(String),
    Rewritten,
}

pub fn inspect<S: KeyValueStore>(store: &S, key: &str) -> Result<SlotReport, StorageError> {
    let Some(text) = store.get_item(key)? else {
        return Ok(SlotReport::Empty);
    };
    let value: Value = match serde_json::from_str(&text) {
        Ok(value) => value,
        Err(err) => return Ok(SlotReport::Unparseable(err.to_string())),
    };
    let report = match value.get("state") {
        None | Some(Value::Null) => SlotReport::MissingState,
        Some(state) => match state.get("userStats") {
            None | Some(Value::Null) => SlotReport::MissingUserStats,
            Some(user_stats) if !user_stats.get("practice").is_some_and(Value::is_object) => {
                SlotReport::MissingPractice
            }
            Some(_) => SlotReport::Valid {
                version: value.get("version").and_then(Value::as_u64),
            },
        },
    };
    Ok(report)
}

/// Rebuilds any missing structure in the slot and stamps the current version.
pub fn repair<S: KeyValueStore>(store: &S, key: &str) -> Result<RepairOutcome, StorageError> {
    let Some(text) = store.get_item(key)? else {
        return Ok(RepairOutcome::NothingToRepair);
    };
    let mut value: Value = match serde_json::from_str(&text) {
        Ok(value) => value,
        Err(err) => return Ok(RepairOutcome::Unparseable(err.to_string())),
    };
    let Some(root) = value.as_object_mut() else {
        return Ok(RepairOutcome::Unparseable("slot is not a json object".into()));
    };
    ensure_object(root, "state", empty_object);
    if let Some(state) = root.get_mut("state").and_then(Value::as_object_mut) {
        ensure_object(state, "userStats", empty_object);
    }
    root.insert("version".into(), Value::from(STORAGE_VERSION));
    repair_value(&mut value, None);

    store.set_item(key, &serde_json::to_string(&value)?)?;
    info!(key, "rewrote statistics slot");
    Ok(RepairOutcome::Rewritten)
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryStore;
    use crate::persistence::{PersistenceAdapter, STORAGE_KEY};

    fn store_with(text: &str) -> MemoryStore {
        let store = MemoryStore::new();
        store.set_item(STORAGE_KEY, text).unwrap();
        store
    }

    #[test]
    fn inspect_reports_outermost_problem() {
        let empty = MemoryStore::new();
        assert_eq!(inspect(&empty, STORAGE_KEY).unwrap(), SlotReport::Empty);
        assert!(matches!(
            inspect(&store_with("nope"), STORAGE_KEY).unwrap(),
            SlotReport::Unparseable(_)
        ));
        assert_eq!(
            inspect(&store_with(r#"{"version":2}"#), STORAGE_KEY).unwrap(),
            SlotReport::MissingState
        );
        assert_eq!(
            inspect(&store_with(r#"{"state":{}}"#), STORAGE_KEY).unwrap(),
            SlotReport::MissingUserStats
        );
        assert_eq!(
            inspect(&store_with(r#"{"state":{"userStats":{"exam":{}}}}"#), STORAGE_KEY).unwrap(),
            SlotReport::MissingPractice
        );
        assert_eq!(
            inspect(
                &store_with(r#"{"state":{"userStats":{"practice":{}}},"version":2}"#),
                STORAGE_KEY
            )
            .unwrap(),
            SlotReport::Valid { version: Some(2) }
        );
    }

    #[test]
    fn repair_rebuilds_structure_and_stamps_version() {
        let store = store_with(r#"{"state":{"userStats":{"totalQuestionsAnswered":12}}}"#);
        assert_eq!(repair(&store, STORAGE_KEY).unwrap(), RepairOutcome::Rewritten);
        assert_eq!(
            inspect(&store, STORAGE_KEY).unwrap(),
            SlotReport::Valid { version: Some(2) }
        );
        let stats = PersistenceAdapter::new(store).load().unwrap();
        assert_eq!(stats.total_questions_answered, Some(12));
        assert_eq!(stats.exam.total_exams, 0);
    }

    #[test]
    fn repair_fills_empty_object() {
        let store = store_with("{}");
        assert_eq!(repair(&store, STORAGE_KEY).unwrap(), RepairOutcome::Rewritten);
        let stats = PersistenceAdapter::new(store).load().unwrap();
        assert_eq!(stats, certprep_domain::UserStatistics::new());
    }

    #[test]
    fn repair_leaves_unusable_slots_alone() {
        let empty = MemoryStore::new();
        assert_eq!(repair(&empty, STORAGE_KEY).unwrap(), RepairOutcome::NothingToRepair);
        let garbage = store_with("[1, 2");
        assert!(matches!(
            repair(&garbage, STORAGE_KEY).unwrap(),
            RepairOutcome::Unparseable(_)
        ));
        assert_eq!(garbage.get_item(STORAGE_KEY).unwrap().as_deref(), Some("[1, 2"));
    }
}
