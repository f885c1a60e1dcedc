use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

mod db;
mod error;
mod grade;
mod models;
mod pipeline;
mod report;
mod risk;
mod sentiment;

use risk::{RiskConfig, RiskEngine};

#[derive(Parser)]
#[command(name = "student-analytics")]
#[command(about = "Academic risk scoring and GPA analytics over per-student CSV data", long_about = None)]
struct Cli {
    /// Optional JSON file overriding the default risk thresholds
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import academic records from a CSV file and run the full analysis
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Re-run grade/risk analytics for one student or everyone
    Process {
        #[arg(long)]
        roll: Option<String>,
    },
    /// Generate a markdown dashboard report
    Report {
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// List students above a risk threshold with suggested interventions
    Alerts {
        #[arg(long, default_value_t = report::ALERT_RISK)]
        min_risk: f64,
    },
    /// Record free-text feedback for a student and score its sentiment
    Feedback {
        #[arg(long)]
        roll: String,
        #[arg(long)]
        text: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => RiskConfig::from_json_file(path)?,
        None => RiskConfig::default(),
    };
    let engine = RiskEngine::new(config);

    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a Postgres instance")?;
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let inserted = db::seed(&pool).await?;
            println!("Seed data inserted ({inserted} subject records).");
        }
        Commands::Import { csv } => {
            let outcome = pipeline::ingest_csv(&pool, &engine, &csv).await?;
            println!(
                "Processed {} students, {} subject records, {} semester rollups; \
                 {} risk evaluations, {} entries skipped.",
                outcome.students,
                outcome.records,
                outcome.semesters,
                outcome.evaluated,
                outcome.skipped
            );
        }
        Commands::Process { roll } => {
            let evaluated = pipeline::process_students(&pool, &engine, roll.as_deref()).await?;
            if let (Some(_), [(roll, evaluation)]) = (&roll, evaluated.as_slice()) {
                println!("{roll}: {}", serde_json::to_string_pretty(evaluation)?);
            } else {
                println!("Re-evaluated {} students.", evaluated.len());
            }
        }
        Commands::Report { out } => {
            let stats = db::fetch_dashboard_stats(&pool).await?;
            let summaries = db::fetch_semester_summaries(&pool).await?;
            let predictions = db::fetch_predictions(&pool, 0.0).await?;
            let subjects = db::fetch_all_subject_rows(&pool).await?;
            let report =
                report::build_report(&stats, &summaries, &predictions, &subjects, &engine);
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
        Commands::Alerts { min_risk } => {
            let predictions = db::fetch_predictions(&pool, min_risk).await?;
            if predictions.is_empty() {
                println!("No students above risk {min_risk}.");
                return Ok(());
            }
            for p in &predictions {
                let guidance = report::alert_guidance(
                    p.risk_score,
                    p.average_attendance,
                    p.average_marks,
                    &engine,
                );
                println!(
                    "- {} ({}) risk {:.2} [{}] {}: {}",
                    p.student_name,
                    p.roll_number,
                    p.risk_score,
                    guidance.status,
                    guidance.main_cause,
                    guidance.actions.join(", ")
                );
            }
        }
        Commands::Feedback { roll, text } => {
            let students = db::fetch_students(&pool, Some(&roll)).await?;
            let student = students
                .first()
                .with_context(|| format!("no student with roll number {roll}"))?;
            let analyzer = sentiment::SentimentAnalyzer::new();
            let result = analyzer.analyze(&text);
            db::insert_feedback(&pool, student.id, &text, &result).await?;
            println!(
                "Feedback for {} recorded: {} (compound {:.3}).",
                student.name, result.label, result.score
            );
        }
    }

    Ok(())
}
