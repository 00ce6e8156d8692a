pub mod error;
pub mod io;
pub mod math;
pub mod stats;

pub use crate::error::DomainError;
pub use crate::io::{export, ExportFormat};
pub use crate::stats::{
    ChapterId, ExamAggregate, ExamTypeAggregate, LegacyChapterProgress, PracticeAggregate,
    PracticeChapterAggregate, UserStatistics, PASS_THRESHOLD_PERCENT,
};
