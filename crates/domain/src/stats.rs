use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::math;

/// Minimum percentage that counts as a pass or a strong chapter.
pub const PASS_THRESHOLD_PERCENT: u32 = 70;

pub type ChapterId = u32;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct PracticeChapterAggregate {
    pub questions_attempted: u64,
    pub correct_answers: u64,
    pub incorrect_answers: u64,
    pub success_rate: u32,
    pub total_time_spent: u64,
    pub average_time_per_question: u64,
    pub best_score: u32,
    pub attempts: u32,
    #[serde(with = "time::serde::rfc3339")]
    pub last_attempt: OffsetDateTime,
}

impl PracticeChapterAggregate {
    pub fn empty(at: OffsetDateTime) -> Self {
        Self {
            questions_attempted: 0,
            correct_answers: 0,
            incorrect_answers: 0,
            success_rate: 0,
            total_time_spent: 0,
            average_time_per_question: 0,
            best_score: 0,
            attempts: 0,
            last_attempt: at,
        }
    }

    /// Recomputes the derived fields from the cumulative counters.
    pub fn rederive(&mut self) {
        self.success_rate = math::running_rate(self.correct_answers, self.questions_attempted);
        self.average_time_per_question =
            math::average(self.total_time_spent, self.questions_attempted);
    }
}

impl Default for PracticeChapterAggregate {
    fn default() -> Self {
        Self::empty(OffsetDateTime::now_utc())
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct PracticeAggregate {
    pub total_questions_attempted: u64,
    pub total_correct_answers: u64,
    pub total_time_spent: u64,
    #[serde(rename = "chapterStats")]
    pub chapters: BTreeMap<ChapterId, PracticeChapterAggregate>,
}

/// Statistics for one exam type, such as a checkpoint or a final exam variant.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ExamTypeAggregate {
    pub attempts: u32,
    pub best_score: u32,
    pub passed: bool,
    pub average_score: u32,
    pub completion_times: Vec<u64>,
    #[serde(with = "time::serde::rfc3339")]
    pub last_attempt: OffsetDateTime,
}

impl ExamTypeAggregate {
    pub fn empty(at: OffsetDateTime) -> Self {
        Self {
            attempts: 0,
            best_score: 0,
            passed: false,
            average_score: 0,
            completion_times: Vec::new(),
            last_attempt: at,
        }
    }

    pub fn average_completion_time(&self) -> u64 {
        let total = self
            .completion_times
            .iter()
            .fold(0u64, |sum, secs| sum.saturating_add(*secs));
        math::average(total, self.completion_times.len() as u64)
    }
}

impl Default for ExamTypeAggregate {
    fn default() -> Self {
        Self::empty(OffsetDateTime::now_utc())
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ExamAggregate {
    pub total_exams: u32,
    pub exams_passed: u32,
    pub exams_failed: u32,
    pub average_score: u32,
    #[serde(rename = "checkpointStats")]
    pub exam_types: BTreeMap<String, ExamTypeAggregate>,
}

/// Per-chapter entry of the legacy flat schema.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LegacyChapterProgress {
    #[serde(default)]
    pub completed: bool,
    pub score: u32,
    #[serde(with = "time::serde::rfc3339", default = "OffsetDateTime::now_utc")]
    pub last_attempt: OffsetDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,
}

/// Root of everything the application remembers about a learner.
///
/// The optional top-level counters and `chapter_progress` belong to the legacy
/// flat schema and are only read by the migrator.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserStatistics {
    #[serde(default)]
    pub practice: PracticeAggregate,
    #[serde(default)]
    pub exam: ExamAggregate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_questions_answered: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_answers: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter_progress: Option<BTreeMap<ChapterId, LegacyChapterProgress>>,
}

impl UserStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_legacy_data(&self) -> bool {
        self.total_questions_answered.is_some_and(|total| total > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn zero_state_has_no_entries() {
        let stats = UserStatistics::new();
        assert_eq!(stats.practice.total_questions_attempted, 0);
        assert!(stats.practice.chapters.is_empty());
        assert_eq!(stats.exam.total_exams, 0);
        assert!(stats.exam.exam_types.is_empty());
        assert!(!stats.has_legacy_data());
    }

    #[test]
    fn serializes_camel_case_with_iso_timestamps() {
        let mut stats = UserStatistics::new();
        let mut chapter = PracticeChapterAggregate::empty(datetime!(2024-03-01 12:30:00 UTC));
        chapter.questions_attempted = 10;
        chapter.correct_answers = 7;
        chapter.incorrect_answers = 3;
        chapter.rederive();
        stats.practice.chapters.insert(3, chapter);

        let json = serde_json::to_value(&stats).unwrap();
        let entry = &json["practice"]["chapterStats"]["3"];
        assert_eq!(entry["questionsAttempted"], 10);
        assert_eq!(entry["successRate"], 70);
        assert_eq!(entry["lastAttempt"], "2024-03-01T12:30:00Z");
        assert!(json.get("totalQuestionsAnswered").is_none());
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let stats: UserStatistics = serde_json::from_str(
            r#"{"exam":{"totalExams":2,"checkpointStats":{"final-full":{"attempts":2,"lastAttempt":"2024-01-05T08:00:00.000Z"}}}}"#,
        )
        .unwrap();
        assert_eq!(stats.practice, PracticeAggregate::default());
        let final_full = &stats.exam.exam_types["final-full"];
        assert_eq!(final_full.attempts, 2);
        assert!(!final_full.passed);
        assert_eq!(final_full.last_attempt, datetime!(2024-01-05 08:00:00 UTC));
    }

    #[test]
    fn average_completion_time_rounds() {
        let mut exam = ExamTypeAggregate::empty(OffsetDateTime::UNIX_EPOCH);
        assert_eq!(exam.average_completion_time(), 0);
        exam.completion_times = vec![600, 900, 1000];
        assert_eq!(exam.average_completion_time(), 833);
        exam.completion_times = vec![u64::MAX, u64::MAX];
        assert_eq!(exam.average_completion_time(), 1 << 63);
    }
}
