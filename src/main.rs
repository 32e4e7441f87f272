use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use legato::analyzer::legato_metrics;
use legato::analyzer::report::ScoreReport;
use legato::analyzer::{self, Analysis, AnalyzeRequest};
use legato::config::AppConfig;
use legato::db::Database;
use legato::db::models::{LessonProgress, PracticeAttempt};
use legato::practice::history::HistorySummary;
use legato::practice::{self, AttemptFields};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "legato", version, about = "Legato practice scorer")]
struct Cli {
    /// Path to the SQLite database
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score a practice attempt without saving it
    Analyze {
        /// JSON file with detectedNotes, expectedNotes and optional bpm
        request: PathBuf,

        /// Override the request's bpm
        #[arg(long)]
        bpm: Option<f64>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,

        /// Show per-note timing errors
        #[arg(long)]
        detail: bool,
    },

    /// Score (if needed) and save a practice attempt
    Record {
        /// JSON file with attempt fields, plus either scores or the note arrays
        request: PathBuf,

        /// User to record as (defaults to config `user`)
        #[arg(short, long)]
        user: Option<String>,
    },

    /// Show recent attempts with running statistics
    History {
        /// User to read (defaults to config `user`)
        #[arg(short, long)]
        user: Option<String>,

        /// Number of attempts (clamped to 1-50)
        #[arg(short = 'n', long)]
        limit: Option<i64>,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show best and latest accuracy per lesson
    Progress {
        /// User to read (defaults to config `user`)
        #[arg(short, long)]
        user: Option<String>,
    },

    /// Show practice database statistics
    Stats,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load config file (optional, defaults if missing)
    let config = AppConfig::load();

    let cli_db_path = cli.db_path;

    match cli.command {
        Commands::Analyze { request, bpm, json, detail } => {
            let req: AnalyzeRequest = serde_json::from_value(read_json(&request)?)
                .context("Request is not a JSON object")?;
            let analysis = analyzer::analyze_detailed(
                &req.detected_notes,
                &req.expected_notes,
                bpm.or(req.bpm()),
            )
            .context("Analysis failed")?;

            if json {
                println!("{}", serde_json::to_string_pretty(&analysis.report)?);
            } else {
                print_report(&analysis.report, analysis.bpm);
                if detail {
                    println!();
                    print_timing_detail(&analysis);
                }
            }
        }

        Commands::Record { request, user } => {
            let user = user.or(config.user.clone());
            let user = practice::authenticate(user.as_deref())?;

            let value = read_json(&request)?;
            let mut fields: AttemptFields = serde_json::from_value(value.clone())
                .context("Invalid attempt fields")?;

            if fields.scores.is_none() {
                let req: AnalyzeRequest = serde_json::from_value(value)
                    .context("Request is not a JSON object")?;
                let report = analyzer::analyze(
                    &req.detected_notes,
                    &req.expected_notes,
                    req.bpm().or(fields.bpm),
                )
                .context("Request has neither scores nor note arrays to analyze")?;
                fields = fields.with_report(&report);
            }

            let db = open_database(cli_db_path, &config)?;
            let attempt = practice::record_attempt(&db, user, fields)
                .context("Failed to record attempt")?;
            println!("Recorded attempt #{} ({})", attempt.id, attempt.created_at);
            println!();
            print_attempt_table(std::slice::from_ref(&attempt));
        }

        Commands::History { user, limit, json } => {
            let user = user.or(config.user.clone());
            let limit = limit.or(Some(config.history.default_limit));
            let db = open_database(cli_db_path, &config)?;
            let summary = practice::history::get_history(&db, user.as_deref(), limit)
                .context("Failed to load history")?;

            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else if summary.attempts.is_empty() {
                println!("No practice attempts recorded yet.");
            } else {
                print_history(&summary);
            }
        }

        Commands::Progress { user } => {
            let user = user.or(config.user.clone());
            let user = practice::authenticate(user.as_deref())?;
            let db = open_database(cli_db_path, &config)?;
            let progress = db.lesson_progress(user).context("Query failed")?;

            if progress.is_empty() {
                println!("No practice attempts recorded for {}.", user);
                return Ok(());
            }

            println!("Lesson progress for {}:", user);
            println!();
            print_progress_table(&progress);
        }

        Commands::Stats => {
            let db = open_database(cli_db_path, &config)?;
            let stats = db.stats().context("Failed to get stats")?;
            println!("Practice Statistics");
            println!("===================");
            println!("Total attempts:   {}", stats.total_attempts);
            println!("Users:            {}", stats.users);
            println!("Lessons:          {}", stats.lessons);
            println!("Mean accuracy:    {:.3}", stats.average_accuracy);
            println!("Practice time:    {:.1} hours", stats.total_practice_hours);
            println!();

            if !stats.levels.is_empty() {
                println!("Levels:");
                for (level, count) in &stats.levels {
                    println!("  {:<14} {}", level, count);
                }
            }
        }
    }

    Ok(())
}

/// Open the database. Path resolution: CLI > config > XDG default.
fn open_database(cli_path: Option<PathBuf>, config: &AppConfig) -> Result<Database> {
    let db_path = cli_path
        .or(config.db_path.clone())
        .unwrap_or_else(legato::config::default_db_path);
    log::info!("Database: {}", db_path.display());

    Database::open(&db_path).context("Failed to open database")
}

/// Shorten a title to `max` characters for table display.
fn truncate(title: &str, max: usize) -> String {
    if title.chars().count() > max {
        let head: String = title.chars().take(max - 3).collect();
        format!("{head}...")
    } else {
        title.to_string()
    }
}

/// Read and parse a JSON request file.
fn read_json(path: &Path) -> Result<serde_json::Value> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("{} is not valid JSON", path.display()))
}

/// Print a score report as a labelled list.
fn print_report(r: &ScoreReport, bpm: f64) {
    println!(
        "Notes: {} detected / {} expected at {} bpm",
        r.total_detected, r.total_expected, bpm
    );
    println!();
    println!("  Accuracy     {:.3}", r.accuracy);
    println!("  Timing       {:.3}", r.timing_score);
    println!("  Clarity      {:.3}", r.clarity_score);
    println!("  Speed        {:.3}", r.speed_score);
    println!("  Consistency  {:.3}", r.consistency);
}

/// Print the per-note timing errors behind the timing score.
fn print_timing_detail(a: &Analysis) {
    let Some(timing) = &a.timing else {
        println!("No timing detail (empty sequence).");
        return;
    };

    let tolerance =
        legato_metrics::MATCH_TOLERANCE_BEATS * legato_metrics::beat_duration(a.bpm);
    println!("{:>5} {:>10}", "Note", "Error (s)");
    println!("{}", "-".repeat(24));
    for (i, err) in timing.errors.iter().enumerate() {
        let mark = if *err <= tolerance { "ok" } else { "off" };
        println!("{:>5} {:>10.3}  {}", i + 1, err, mark);
    }
    println!();
    println!(
        "{} of {} expected notes within ±{:.3}s",
        timing.matches, a.report.total_expected, tolerance
    );
}

/// Print a table of attempts.
fn print_attempt_table(attempts: &[PracticeAttempt]) {
    println!(
        "{:<24} {:<12} {:<12} {:>5} {:>6}  {:>5} {:>5} {:>5} {:>5} {:>5}",
        "When", "Lesson", "Level", "BPM", "Notes",
        "Acc", "Tim", "Clr", "Spd", "Cns"
    );
    println!("{}", "-".repeat(98));

    for a in attempts {
        let lesson = truncate(&a.lesson_title, 12);
        println!(
            "{:<24} {:<12} {:<12} {:>5.0} {:>6}  {:>5.3} {:>5.3} {:>5.3} {:>5.3} {:>5.3}",
            a.created_at,
            lesson,
            a.level,
            a.bpm,
            format!("{}/{}", a.notes_detected, a.notes_expected),
            a.scores.accuracy,
            a.scores.timing_score,
            a.scores.clarity_score,
            a.scores.speed_score,
            a.scores.consistency,
        );
    }
}

/// Print a history window with its statistics.
fn print_history(summary: &HistorySummary) {
    print_attempt_table(&summary.attempts);
    println!();
    println!("Acc=Accuracy  Tim=Timing  Clr=Clarity  Spd=Speed  Cns=Consistency");
    println!(
        "Sessions: {}  Average accuracy: {:.3}",
        summary.stats.sessions, summary.stats.average_accuracy
    );
}

/// Print per-lesson progress.
fn print_progress_table(progress: &[LessonProgress]) {
    println!(
        "{:<30} {:>8} {:>6} {:>6}  {}",
        "Lesson", "Attempts", "Best", "Last", "Last practiced"
    );
    println!("{}", "-".repeat(80));

    for p in progress {
        let title = truncate(&p.lesson_title, 30);
        println!(
            "{:<30} {:>8} {:>6.3} {:>6.3}  {}",
            title, p.attempts, p.best_accuracy, p.last_accuracy, p.last_practiced_at
        );
    }
}
