use std::fmt::Write;

use serde::{Deserialize, Serialize};

use crate::{error::DomainError, stats::UserStatistics};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum ExportFormat {
    /// The whole statistics tree as pretty JSON.
    Json,
    /// One row per practiced chapter.
    Csv,
}

const CSV_HEADER: &str = "chapter,questions_attempted,correct_answers,incorrect_answers,success_rate,total_time_spent,average_time_per_question,best_score,attempts";

pub fn export(stats: &UserStatistics, format: ExportFormat) -> Result<Vec<u8>, DomainError> {
    match format {
        ExportFormat::Json => serde_json::to_vec_pretty(stats)
            .map_err(|err| DomainError::Serialization(err.to_string())),
        ExportFormat::Csv => Ok(chapter_rows(stats).into_bytes()),
    }
}

fn chapter_rows(stats: &UserStatistics) -> String {
    let mut out = String::from(CSV_HEADER);
    out.push('\n');
    for (chapter, agg) in &stats.practice.chapters {
        let _ = writeln!(
            out,
            "{},{},{},{},{},{},{},{},{}",
            chapter,
            agg.questions_attempted,
            agg.correct_answers,
            agg.incorrect_answers,
            agg.success_rate,
            agg.total_time_spent,
            agg.average_time_per_question,
            agg.best_score,
            agg.attempts
        );
    }
    out
}
