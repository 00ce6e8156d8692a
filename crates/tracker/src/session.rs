use serde::{Deserialize, Serialize};

use certprep_domain::{math, ChapterId, DomainError, PASS_THRESHOLD_PERCENT};

use crate::store::StatisticsStore;

/// What a finished (or abandoned) quiz hands to the statistics store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum SessionOutcome {
    Practice {
        chapter: ChapterId,
        correct: u32,
        total: u32,
        time_spent_secs: u64,
    },
    Exam {
        exam_type: String,
        score: u32,
        total_questions: u32,
        time_spent_secs: u64,
        passed: bool,
    },
}

impl SessionOutcome {
    /// Builds an exam outcome whose pass flag comes from the pass threshold.
    pub fn graded_exam(
        exam_type: impl Into<String>,
        score: u32,
        total_questions: u32,
        time_spent_secs: u64,
    ) -> Self {
        let percentage = math::running_rate(u64::from(score), u64::from(total_questions));
        Self::Exam {
            exam_type: exam_type.into(),
            score,
            total_questions,
            time_spent_secs,
            passed: total_questions > 0 && percentage >= PASS_THRESHOLD_PERCENT,
        }
    }

    pub fn percentage(&self) -> u32 {
        let (correct, total) = match self {
            Self::Practice { correct, total, .. } => (*correct, *total),
            Self::Exam {
                score,
                total_questions,
                ..
            } => (*score, *total_questions),
        };
        math::running_rate(u64::from(correct), u64::from(total))
    }
}

impl StatisticsStore {
    pub fn record(&mut self, outcome: &SessionOutcome) -> Result<(), DomainError> {
        match outcome {
            SessionOutcome::Practice {
                chapter,
                correct,
                total,
                time_spent_secs,
            } => self.record_practice_session(*chapter, *correct, *total, *time_spent_secs),
            SessionOutcome::Exam {
                exam_type,
                score,
                total_questions,
                time_spent_secs,
                passed,
            } => self.record_exam_attempt(
                exam_type,
                *score,
                *total_questions,
                *time_spent_secs,
                *passed,
            ),
        }
    }
}
