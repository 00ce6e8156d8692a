//! Upgrades the legacy flat statistics shape into the nested practice/exam shape.
//!
//! The legacy shape only kept global question counters and a per-chapter score,
//! so time and per-chapter counters of migrated chapters start at zero.

use certprep_domain::{PracticeAggregate, PracticeChapterAggregate, UserStatistics};
use certprep_tracker::StatisticsStore;
use tracing::info;

use crate::kv::KeyValueStore;
use crate::persistence::PersistenceAdapter;

/// True when the nested practice data is empty and legacy counters are present.
///
/// When both shapes carry data the nested one wins and nothing is migrated.
pub fn needs_migration(stats: &UserStatistics) -> bool {
    stats.practice.total_questions_attempted == 0 && stats.has_legacy_data()
}

pub fn migrate_legacy(mut stats: UserStatistics) -> UserStatistics {
    if !needs_migration(&stats) {
        return stats;
    }
    let mut practice = PracticeAggregate {
        total_questions_attempted: stats.total_questions_answered.unwrap_or(0),
        total_correct_answers: stats.correct_answers.unwrap_or(0),
        ..PracticeAggregate::default()
    };
    for (chapter, progress) in stats.chapter_progress.iter().flatten() {
        let migrated = PracticeChapterAggregate {
            success_rate: progress.score,
            best_score: progress.score,
            attempts: progress.attempts.filter(|attempts| *attempts > 0).unwrap_or(1),
            ..PracticeChapterAggregate::empty(progress.last_attempt)
        };
        practice.chapters.insert(*chapter, migrated);
    }
    info!(
        questions = practice.total_questions_attempted,
        chapters = practice.chapters.len(),
        "migrated legacy statistics"
    );
    stats.practice = practice;
    stats
}

/// Startup path: load the slot (or start from zero), migrate, and persist the
/// migrated shape when migration changed anything.
pub fn load_and_migrate<S: KeyValueStore>(adapter: &PersistenceAdapter<S>) -> UserStatistics {
    let stats = adapter.load().unwrap_or_default();
    if !needs_migration(&stats) {
        return stats;
    }
    let migrated = migrate_legacy(stats);
    adapter.save(&migrated);
    migrated
}

/// Builds the application's store from persisted state and wires it to write
/// every change back through `adapter`.
pub fn open_store<S>(adapter: PersistenceAdapter<S>) -> StatisticsStore
where
    S: KeyValueStore + 'static,
{
    let stats = load_and_migrate(&adapter);
    let mut store = StatisticsStore::with_statistics(stats);
    store.subscribe(adapter);
    store
}
