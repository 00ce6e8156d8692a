use serde::{Deserialize, Serialize};

use certprep_domain::{math, UserStatistics, PASS_THRESHOLD_PERCENT};

/// Headline figures shown on the statistics screen.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatsOverview {
    pub practice_success_rate: u32,
    pub chapters_attempted: usize,
    pub average_time_per_question: u64,
    pub strong_chapters: usize,
    pub weak_chapters: usize,
    pub exam_pass_rate: u32,
    pub exam_types_attempted: usize,
    pub exam_types_passed: usize,
}

impl StatsOverview {
    pub fn from_statistics(stats: &UserStatistics) -> Self {
        let practice = &stats.practice;
        let exam = &stats.exam;
        let rates = || practice.chapters.values().map(|chapter| chapter.success_rate);
        Self {
            practice_success_rate: math::running_rate(
                practice.total_correct_answers,
                practice.total_questions_attempted,
            ),
            chapters_attempted: practice.chapters.len(),
            average_time_per_question: math::average(
                practice.total_time_spent,
                practice.total_questions_attempted,
            ),
            strong_chapters: rates().filter(|rate| *rate >= PASS_THRESHOLD_PERCENT).count(),
            weak_chapters: rates()
                .filter(|rate| *rate > 0 && *rate < PASS_THRESHOLD_PERCENT)
                .count(),
            exam_pass_rate: math::running_rate(
                u64::from(exam.exams_passed),
                u64::from(exam.total_exams),
            ),
            exam_types_attempted: exam.exam_types.len(),
            exam_types_passed: exam.exam_types.values().filter(|e| e.passed).count(),
        }
    }
}
