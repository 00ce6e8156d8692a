use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, error, warn};

use certprep_domain::UserStatistics;
use certprep_tracker::StatsListener;

use crate::error::StorageError;
use crate::kv::KeyValueStore;

/// Slot name the statistics live under.
pub const STORAGE_KEY: &str = "quiz-storage";
/// Bump when the persisted shape changes.
pub const STORAGE_VERSION: u64 = 2;

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    state: StateRef<'a>,
    version: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StateRef<'a> {
    user_stats: &'a UserStatistics,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedState {
    user_stats: UserStatistics,
}

/// Maps [`UserStatistics`] to and from one slot of a [`KeyValueStore`].
///
/// Writes are best effort: the in-memory statistics stay authoritative when
/// the store rejects a write.
#[derive(Debug, Clone)]
pub struct PersistenceAdapter<S> {
    store: S,
    key: String,
}

impl<S: KeyValueStore> PersistenceAdapter<S> {
    pub fn new(store: S) -> Self {
        Self::with_key(store, STORAGE_KEY)
    }

    pub fn with_key(store: S, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn try_save(&self, stats: &UserStatistics) -> Result<(), StorageError> {
        let envelope = EnvelopeRef {
            state: StateRef { user_stats: stats },
            version: STORAGE_VERSION,
        };
        let text = serde_json::to_string(&envelope)?;
        self.store.set_item(&self.key, &text)
    }

    pub fn save(&self, stats: &UserStatistics) {
        match self.try_save(stats) {
            Ok(()) => debug!(key = %self.key, "persisted statistics"),
            Err(err) => error!(key = %self.key, %err, "failed to persist statistics"),
        }
    }

    /// Reads the slot back, repairing missing subtrees on the way.
    ///
    /// Returns `None` when the slot is empty, unreadable or corrupt; callers
    /// then start from zero statistics.
    pub fn load(&self) -> Option<UserStatistics> {
        let text = match self.store.get_item(&self.key) {
            Ok(Some(text)) => text,
            Ok(None) => {
                debug!(key = %self.key, "no persisted statistics");
                return None;
            }
            Err(err) => {
                warn!(key = %self.key, %err, "could not read persisted statistics");
                return None;
            }
        };
        let mut value: Value = match serde_json::from_str(&text) {
            Ok(value) => value,
            Err(err) => {
                warn!(key = %self.key, %err, "discarding unparseable statistics");
                return None;
            }
        };
        let version = value.get("version").and_then(Value::as_u64);
        if repair_value(&mut value, version) {
            debug!(key = %self.key, ?version, "repaired persisted statistics");
        }
        let state = value.get_mut("state").map(Value::take)?;
        match serde_json::from_value::<PersistedState>(state) {
            Ok(state) => Some(state.user_stats),
            Err(err) => {
                warn!(key = %self.key, %err, "discarding malformed statistics");
                None
            }
        }
    }

    pub fn clear(&self) -> Result<(), StorageError> {
        self.store.remove_item(&self.key)
    }
}

impl<S: KeyValueStore> StatsListener for PersistenceAdapter<S> {
    fn statistics_changed(&self, stats: &UserStatistics) {
        self.save(stats);
    }
}

pub(crate) fn empty_practice() -> Value {
    json!({
        "totalQuestionsAttempted": 0,
        "totalCorrectAnswers": 0,
        "totalTimeSpent": 0,
        "chapterStats": {}
    })
}

pub(crate) fn empty_exam() -> Value {
    json!({
        "totalExams": 0,
        "examsPassed": 0,
        "examsFailed": 0,
        "averageScore": 0,
        "checkpointStats": {}
    })
}

/// Ensures `practice` and `exam` exist under `state.userStats`; for slots written
/// before the current version also ensures their per-key maps exist.
///
/// Does nothing when there is no `state.userStats` object. Returns whether
/// anything changed.
pub(crate) fn repair_value(value: &mut Value, version: Option<u64>) -> bool {
    let Some(user_stats) = value
        .pointer_mut("/state/userStats")
        .and_then(Value::as_object_mut)
    else {
        return false;
    };
    let mut changed = false;
    changed |= ensure_object(user_stats, "practice", empty_practice);
    changed |= ensure_object(user_stats, "exam", empty_exam);

    if version.map_or(true, |v| v < STORAGE_VERSION) {
        for (subtree, map) in [("practice", "chapterStats"), ("exam", "checkpointStats")] {
            if let Some(subtree) = user_stats.get_mut(subtree).and_then(Value::as_object_mut) {
                changed |= ensure_object(subtree, map, || Value::Object(Map::new()));
            }
        }
    }
    changed
}

pub(crate) fn ensure_object(parent: &mut Map<String, Value>, field: &str, fill: fn() -> Value) -> bool {
    if parent.get(field).is_some_and(Value::is_object) {
        return false;
    }
    parent.insert(field.to_string(), fill());
    true
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::kv::MemoryStore;
    use certprep_tracker::StatisticsStore;
    use time::macros::datetime;
    use time::OffsetDateTime;

    struct RejectingStore;

    impl KeyValueStore for RejectingStore {
        fn get_item(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Ok(None)
        }

        fn set_item(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::unavailable("quota exceeded"))
        }

        fn remove_item(&self, _key: &str) -> Result<(), StorageError> {
            Ok(())
        }
    }

    fn populated() -> UserStatistics {
        fn clock() -> OffsetDateTime {
            datetime!(2024-05-12 18:45:03.250 +02:00)
        }
        let mut store = StatisticsStore::new().with_clock(clock);
        store.record_practice_session(1, 8, 10, 300).unwrap();
        store.record_practice_session(7, 2, 6, 95).unwrap();
        store.record_exam_attempt("checkpoint1", 30, 40, 1800, true).unwrap();
        store.record_exam_attempt("checkpoint1", 20, 40, 1500, false).unwrap();
        store.statistics().clone()
    }

    fn adapter_with(text: &str) -> PersistenceAdapter<MemoryStore> {
        let store = MemoryStore::new();
        store.set_item(STORAGE_KEY, text).unwrap();
        PersistenceAdapter::new(store)
    }

    #[test]
    fn save_then_load_round_trips() {
        let adapter = PersistenceAdapter::new(MemoryStore::new());
        let stats = populated();
        adapter.try_save(&stats).unwrap();
        let loaded = adapter.load().unwrap();
        assert_eq!(loaded, stats);
        assert_eq!(
            loaded.practice.chapters[&7].last_attempt,
            datetime!(2024-05-12 16:45:03.250 UTC)
        );
    }

    #[test]
    fn envelope_carries_version_and_iso_strings() {
        let adapter = PersistenceAdapter::new(MemoryStore::new());
        adapter.save(&populated());
        let text = adapter.store().get_item(STORAGE_KEY).unwrap().unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["version"], 2);
        let last = value["state"]["userStats"]["exam"]["checkpointStats"]["checkpoint1"]
            ["lastAttempt"]
            .as_str()
            .unwrap();
        assert!(last.starts_with("2024-05-12T18:45:03.25"));
    }

    #[test]
    fn load_of_absent_or_corrupt_slot_is_none() {
        assert!(PersistenceAdapter::new(MemoryStore::new()).load().is_none());
        assert!(adapter_with("{not json").load().is_none());
        assert!(adapter_with(r#"{"version":2}"#).load().is_none());
        assert!(adapter_with(
            r#"{"state":{"userStats":{"practice":{"totalQuestionsAttempted":-4}}},"version":2}"#
        )
        .load()
        .is_none());
    }

    #[test]
    fn load_fills_missing_subtrees() {
        let adapter = adapter_with(
            r#"{"state":{"userStats":{"exam":{"totalExams":1,"examsPassed":1,"averageScore":90,
            "checkpointStats":{"final-short":{"attempts":1,"bestScore":90,"passed":true,
            "averageScore":90,"completionTimes":[2400],"lastAttempt":"2024-02-02T10:00:00.000Z"}}}}},
            "version":2}"#,
        );
        let stats = adapter.load().unwrap();
        assert_eq!(stats.practice.total_questions_attempted, 0);
        assert!(stats.practice.chapters.is_empty());
        let exam = &stats.exam.exam_types["final-short"];
        assert!(exam.passed);
        assert_eq!(exam.last_attempt, datetime!(2024-02-02 10:00:00 UTC));
    }

    #[test]
    fn repair_is_version_gated() {
        let mut old = json!({"state":{"userStats":{"practice":{"totalQuestionsAttempted":3}}}});
        assert!(repair_value(&mut old, None));
        assert!(old["state"]["userStats"]["practice"]["chapterStats"].is_object());
        assert!(old["state"]["userStats"]["exam"]["checkpointStats"].is_object());

        let mut current =
            json!({"state":{"userStats":{"practice":{"totalQuestionsAttempted":3},"exam":{}}}});
        assert!(!repair_value(&mut current, Some(STORAGE_VERSION)));
        assert!(current["state"]["userStats"]["practice"]
            .get("chapterStats")
            .is_none());

        let mut no_state = json!({"version": 1});
        assert!(!repair_value(&mut no_state, Some(1)));
    }

    #[test]
    fn edited_slot_with_huge_counters_keeps_working() {
        let adapter = adapter_with(
            r#"{"state":{"userStats":{"practice":{"totalQuestionsAttempted":300000000000000000,
            "totalCorrectAnswers":200000000000000000,"totalTimeSpent":900000000000000000,
            "chapterStats":{"1":{"questionsAttempted":300000000000000000,
            "correctAnswers":200000000000000000,"incorrectAnswers":100000000000000000,
            "totalTimeSpent":900000000000000000,"attempts":4,
            "lastAttempt":"2024-03-01T12:00:00.000Z"}}}}},"version":2}"#,
        );
        let mut store = StatisticsStore::with_statistics(adapter.load().unwrap());
        store.record_practice_session(1, 1, 1, 0).unwrap();

        let chapter = store.chapter_stats(1).unwrap();
        assert_eq!(chapter.correct_answers, 200_000_000_000_000_001);
        assert_eq!(chapter.success_rate, 67);
        assert_eq!(chapter.average_time_per_question, 3);
        let overview = store.overview();
        assert_eq!(overview.practice_success_rate, 67);
        assert_eq!(overview.average_time_per_question, 3);
    }

    #[test]
    fn clear_removes_slot() {
        let adapter = PersistenceAdapter::new(MemoryStore::new());
        adapter.save(&populated());
        adapter.clear().unwrap();
        assert!(adapter.load().is_none());
    }

    #[test]
    fn rejected_writes_are_swallowed() {
        let adapter = PersistenceAdapter::new(RejectingStore);
        adapter.save(&populated());
        assert!(adapter.try_save(&populated()).is_err());
    }

    #[test]
    fn adapter_persists_as_listener() {
        let shared = Arc::new(MemoryStore::new());
        let mut store = StatisticsStore::new();
        store.subscribe(PersistenceAdapter::new(Arc::clone(&shared)));
        store.record_practice_session(3, 4, 5, 60).unwrap();

        let reader = PersistenceAdapter::new(shared);
        assert_eq!(reader.load().as_ref(), Some(store.statistics()));

        store.reset_all();
        let reloaded = reader.load().unwrap();
        assert_eq!(reloaded, UserStatistics::new());
    }
}
