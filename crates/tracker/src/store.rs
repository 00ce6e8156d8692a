use certprep_domain::{
    math, ChapterId, DomainError, ExamTypeAggregate, PracticeChapterAggregate, UserStatistics,
};
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::overview::StatsOverview;

/// Receives the committed state after every mutation of a [`StatisticsStore`].
pub trait StatsListener {
    fn statistics_changed(&self, stats: &UserStatistics);
}

impl<F> StatsListener for F
where
    F: Fn(&UserStatistics),
{
    fn statistics_changed(&self, stats: &UserStatistics) {
        self(stats)
    }
}

/// Authoritative in-memory statistics.
///
/// Every operation validates its input before touching state, so a rejected
/// call leaves the aggregates exactly as they were and listeners are not told.
pub struct StatisticsStore {
    stats: UserStatistics,
    listeners: Vec<Box<dyn StatsListener>>,
    clock: fn() -> OffsetDateTime,
}

impl StatisticsStore {
    pub fn new() -> Self {
        Self::with_statistics(UserStatistics::new())
    }

    pub fn with_statistics(stats: UserStatistics) -> Self {
        Self {
            stats,
            listeners: Vec::new(),
            clock: OffsetDateTime::now_utc,
        }
    }

    /// Replaces the source of `lastAttempt` timestamps.
    pub fn with_clock(mut self, clock: fn() -> OffsetDateTime) -> Self {
        self.clock = clock;
        self
    }

    pub fn subscribe(&mut self, listener: impl StatsListener + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn statistics(&self) -> &UserStatistics {
        &self.stats
    }

    pub fn overview(&self) -> StatsOverview {
        StatsOverview::from_statistics(&self.stats)
    }

    pub fn chapter_stats(&self, chapter: ChapterId) -> Option<&PracticeChapterAggregate> {
        self.stats.practice.chapters.get(&chapter)
    }

    pub fn exam_type_stats(&self, exam_type: &str) -> Option<&ExamTypeAggregate> {
        self.stats.exam.exam_types.get(exam_type.trim())
    }

    /// Folds one finished practice session into the chapter and practice totals.
    pub fn record_practice_session(
        &mut self,
        chapter: ChapterId,
        correct: u32,
        total: u32,
        time_spent_secs: u64,
    ) -> Result<(), DomainError> {
        if let Err(err) = validate_practice(chapter, correct, total) {
            warn!(chapter, correct, total, %err, "rejected practice session");
            return Err(err);
        }
        let at = (self.clock)();
        let (correct, total) = (u64::from(correct), u64::from(total));
        let session_score = math::running_rate(correct, total);

        let entry = self
            .stats
            .practice
            .chapters
            .entry(chapter)
            .or_insert_with(|| PracticeChapterAggregate::empty(at));
        entry.questions_attempted = entry.questions_attempted.saturating_add(total);
        entry.correct_answers = entry.correct_answers.saturating_add(correct);
        entry.incorrect_answers = entry.incorrect_answers.saturating_add(total - correct);
        entry.total_time_spent = entry.total_time_spent.saturating_add(time_spent_secs);
        entry.rederive();
        entry.best_score = math::max_score(entry.best_score, session_score);
        entry.attempts = entry.attempts.saturating_add(1);
        entry.last_attempt = at;

        let practice = &mut self.stats.practice;
        practice.total_questions_attempted =
            practice.total_questions_attempted.saturating_add(total);
        practice.total_correct_answers = practice.total_correct_answers.saturating_add(correct);
        practice.total_time_spent = practice.total_time_spent.saturating_add(time_spent_secs);

        debug!(chapter, session_score, "recorded practice session");
        self.notify();
        Ok(())
    }

    /// Folds one finished exam attempt into the exam type and exam totals.
    pub fn record_exam_attempt(
        &mut self,
        exam_type: &str,
        score: u32,
        total_questions: u32,
        time_spent_secs: u64,
        passed: bool,
    ) -> Result<(), DomainError> {
        let exam_type = exam_type.trim();
        if let Err(err) = validate_exam(exam_type, score, total_questions) {
            warn!(exam_type, score, total_questions, %err, "rejected exam attempt");
            return Err(err);
        }
        let at = (self.clock)();
        let percentage = math::running_rate(u64::from(score), u64::from(total_questions));

        let exam = &mut self.stats.exam;
        let entry = exam
            .exam_types
            .entry(exam_type.to_string())
            .or_insert_with(|| ExamTypeAggregate::empty(at));
        entry.completion_times.push(time_spent_secs);
        entry.best_score = math::max_score(entry.best_score, percentage);
        entry.average_score = math::running_mean(entry.average_score, entry.attempts, percentage);
        entry.passed = passed || entry.passed;
        entry.attempts = entry.attempts.saturating_add(1);
        entry.last_attempt = at;

        exam.average_score = math::running_mean(exam.average_score, exam.total_exams, percentage);
        exam.total_exams = exam.total_exams.saturating_add(1);
        if passed {
            exam.exams_passed = exam.exams_passed.saturating_add(1);
        } else {
            exam.exams_failed = exam.exams_failed.saturating_add(1);
        }

        debug!(exam_type, percentage, passed, "recorded exam attempt");
        self.notify();
        Ok(())
    }

    /// Forgets everything and tells listeners, which persist the zero state.
    pub fn reset_all(&mut self) {
        info!("resetting all statistics");
        self.stats = UserStatistics::new();
        self.notify();
    }

    fn notify(&self) {
        for listener in &self.listeners {
            listener.statistics_changed(&self.stats);
        }
    }
}

impl Default for StatisticsStore {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_practice(chapter: ChapterId, correct: u32, total: u32) -> Result<(), DomainError> {
    if chapter == 0 {
        return Err(DomainError::validation("chapter numbers start at 1"));
    }
    if total == 0 {
        return Err(DomainError::validation("a session needs at least one question"));
    }
    if correct > total {
        return Err(DomainError::validation(format!(
            "{correct} correct answers exceed {total} questions"
        )));
    }
    Ok(())
}

fn validate_exam(exam_type: &str, score: u32, total_questions: u32) -> Result<(), DomainError> {
    if exam_type.is_empty() {
        return Err(DomainError::validation("exam type must not be empty"));
    }
    if total_questions == 0 {
        return Err(DomainError::validation("an exam needs at least one question"));
    }
    if score > total_questions {
        return Err(DomainError::validation(format!(
            "score {score} exceeds {total_questions} questions"
        )));
    }
    Ok(())
}
