use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use certprep_domain::{ExportFormat, UserStatistics};
use certprep_storage::{inspect, open_store, repair, FileStore, PersistenceAdapter, RepairOutcome};
use certprep_tracker::{SessionOutcome, StatisticsStore};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod format;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Record and review certification quiz statistics"
)]
struct Cli {
    /// Directory holding the statistics slot (defaults to the platform data directory)
    #[arg(long, env = "CERTPREP_DATA_DIR", global = true)]
    data_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Record a finished practice session
    Practice {
        chapter: u32,
        correct: u32,
        total: u32,
        /// Seconds spent on the session
        #[arg(long, default_value_t = 0)]
        time: u64,
    },
    /// Record a finished exam attempt
    Exam {
        exam_type: String,
        score: u32,
        total: u32,
        /// Seconds spent on the attempt
        #[arg(long, default_value_t = 0)]
        time: u64,
        /// Override the pass decision (default: 70% or better passes)
        #[arg(long, conflicts_with = "failed")]
        passed: bool,
        #[arg(long)]
        failed: bool,
    },
    /// Print overall statistics
    Show,
    /// Print statistics for one chapter
    Chapter { chapter: u32 },
    /// Print statistics for one exam type
    ExamType { exam_type: String },
    /// Write the statistics to stdout
    Export {
        #[arg(long, value_enum, default_value_t = Format::Json)]
        format: Format,
    },
    /// Forget all statistics
    Reset {
        /// Confirm that the statistics should be erased
        #[arg(long)]
        yes: bool,
    },
    /// Check the structure of the stored slot
    Inspect,
    /// Rebuild missing structure in the stored slot
    Repair,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
    Json,
    Csv,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let file_store = match cli.data_dir {
        Some(dir) => FileStore::new(dir),
        None => FileStore::in_data_dir()?,
    };
    info!(root = %file_store.root().display(), "using statistics directory");
    let file_store = Arc::new(file_store);
    let adapter = PersistenceAdapter::new(Arc::clone(&file_store));

    match cli.command {
        Command::Inspect => {
            println!("{}", inspect(file_store.as_ref(), adapter.key())?);
            return Ok(());
        }
        Command::Repair => {
            match repair(file_store.as_ref(), adapter.key())? {
                RepairOutcome::NothingToRepair => println!("No data to repair"),
                RepairOutcome::Unparseable(reason) => {
                    bail!("slot cannot be repaired: {reason}")
                }
                RepairOutcome::Rewritten => println!("Slot repaired"),
            }
            return Ok(());
        }
        _ => {}
    }

    let mut store = open_store(adapter);
    match cli.command {
        Command::Practice {
            chapter,
            correct,
            total,
            time,
        } => {
            store.record(&SessionOutcome::Practice {
                chapter,
                correct,
                total,
                time_spent_secs: time,
            })?;
            if let Some(stats) = store.chapter_stats(chapter) {
                println!(
                    "Chapter {chapter}: {}% success, best {}%, {} attempts",
                    stats.success_rate, stats.best_score, stats.attempts
                );
            }
        }
        Command::Exam {
            exam_type,
            score,
            total,
            time,
            passed,
            failed,
        } => {
            let outcome = match (passed, failed) {
                (false, false) => SessionOutcome::graded_exam(&exam_type, score, total, time),
                _ => SessionOutcome::Exam {
                    exam_type: exam_type.clone(),
                    score,
                    total_questions: total,
                    time_spent_secs: time,
                    passed,
                },
            };
            let percentage = outcome.percentage();
            store.record(&outcome)?;
            if let Some(stats) = store.exam_type_stats(&exam_type) {
                println!(
                    "{exam_type}: scored {percentage}%, best {}%, {}",
                    stats.best_score,
                    if stats.passed { "passed" } else { "not passed yet" }
                );
            }
        }
        Command::Show => print_overview(&store),
        Command::Chapter { chapter } => match store.chapter_stats(chapter) {
            Some(stats) => {
                println!("Chapter {chapter}");
                println!(
                    "  questions:   {} ({} correct, {} incorrect)",
                    stats.questions_attempted, stats.correct_answers, stats.incorrect_answers
                );
                println!("  success:     {}%", stats.success_rate);
                println!("  best score:  {}%", stats.best_score);
                println!("  attempts:    {}", stats.attempts);
                println!(
                    "  time:        {} ({} per question)",
                    format::time_spent(stats.total_time_spent),
                    format::short_duration(stats.average_time_per_question)
                );
                println!("  last:        {}", stats.last_attempt);
            }
            None => println!("Chapter {chapter} has not been practiced yet"),
        },
        Command::ExamType { exam_type } => match store.exam_type_stats(&exam_type) {
            Some(stats) => {
                println!("{exam_type}");
                println!("  attempts:    {}", stats.attempts);
                println!("  best score:  {}%", stats.best_score);
                println!("  average:     {}%", stats.average_score);
                println!("  passed:      {}", if stats.passed { "yes" } else { "no" });
                println!(
                    "  avg time:    {}",
                    format::short_duration(stats.average_completion_time())
                );
                println!("  last:        {}", stats.last_attempt);
            }
            None => println!("{exam_type} has not been attempted yet"),
        },
        Command::Export { format } => export(store.statistics(), format)?,
        Command::Reset { yes } => {
            if !yes {
                bail!("refusing to erase statistics without --yes");
            }
            store.reset_all();
            println!("All statistics were reset");
        }
        // slot commands ran before the store was opened
        Command::Inspect | Command::Repair => {}
    }
    Ok(())
}

fn print_overview(store: &StatisticsStore) {
    let stats = store.statistics();
    let overview = store.overview();
    println!("Practice");
    println!(
        "  questions:   {} ({}% correct)",
        stats.practice.total_questions_attempted, overview.practice_success_rate
    );
    println!("  chapters:    {}", overview.chapters_attempted);
    println!(
        "  strong/weak: {}/{}",
        overview.strong_chapters, overview.weak_chapters
    );
    println!(
        "  time:        {} ({} per question)",
        format::time_spent(stats.practice.total_time_spent),
        format::short_duration(overview.average_time_per_question)
    );
    println!("Exams");
    println!(
        "  taken:       {} ({} passed, {} failed, {}% pass rate)",
        stats.exam.total_exams,
        stats.exam.exams_passed,
        stats.exam.exams_failed,
        overview.exam_pass_rate
    );
    println!("  average:     {}%", stats.exam.average_score);
    println!(
        "  exam types:  {} attempted, {} passed",
        overview.exam_types_attempted, overview.exam_types_passed
    );
}

fn export(stats: &UserStatistics, format: Format) -> Result<()> {
    let format = match format {
        Format::Json => ExportFormat::Json,
        Format::Csv => ExportFormat::Csv,
    };
    let bytes = certprep_domain::export(stats, format)?;
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&bytes)?;
    stdout.write_all(b"\n")?;
    Ok(())
}
