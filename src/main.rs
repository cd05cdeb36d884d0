mod convert;
mod db;
mod error;
mod import;
mod parser;
mod settings;
mod storage;

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};

use error::ImportError;
use parser::ParsedDocument;
use storage::ObjectStore;

#[derive(Parser)]
#[command(name = "qbank", about = "Exam question bank importer")]
struct Cli {
    /// Settings file (default: ./qbank.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database (overrides settings)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import .docx, .html or .txt question documents
    Import {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Convert, parse and save one document at a time
        #[arg(long)]
        sequential: bool,
    },
    /// Print one question with its children as JSON
    Show { id: String },
    /// Show entity counts
    Stats,
    /// Questions overview table
    Overview {
        /// Filter by subject (e.g. "Trauma")
        #[arg(short, long)]
        subject: Option<String>,
        /// Filter by question bank (ABSITE, ABS QE)
        #[arg(short, long)]
        bank: Option<String>,
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },
    /// Tags with usage counts
    Tags,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let mut settings = settings::load(cli.config.as_deref())?;
    if let Some(db) = cli.db {
        settings.db_path = db;
    }

    let conn = db::connect(&settings.db_path)?;
    db::init_schema(&conn)?;

    let result = match cli.command {
        Commands::Import { files, sequential } => {
            let objects = storage::from_settings(&settings.storage)?;
            println!("Importing {} documents into {:?}...", files.len(), settings.db_path);
            let counts = if sequential {
                import_sequential(&conn, objects.as_ref(), &files)?
            } else {
                import_batch(&conn, objects.as_ref(), &files)?
            };
            counts.print();
            Ok(())
        }
        Commands::Show { id } => {
            match db::fetch_question(&conn, &id)? {
                Some(q) => println!("{}", serde_json::to_string_pretty(&q)?),
                None => println!("No question with id {}", id),
            }
            Ok(())
        }
        Commands::Overview { subject, bank, limit } => {
            let rows = db::fetch_overview(&conn, subject.as_deref(), bank.as_deref(), limit)?;
            if rows.is_empty() {
                println!("No questions found.");
                return Ok(());
            }

            println!(
                "{:>3} | {:<36} | {:<7} | {:<16} | {:<24} | {:>3} | {:>3}",
                "#", "Id", "Bank", "Subject", "Topic", "Ans", "QH"
            );
            println!("{}", "-".repeat(110));

            for (i, r) in rows.iter().enumerate() {
                println!(
                    "{:>3} | {:<36} | {:<7} | {:<16} | {:<24} | {:>3} | {:>3}",
                    i + 1,
                    r.id,
                    truncate(&r.question_bank, 7),
                    truncate(&r.subject, 16),
                    truncate(&r.topic, 24),
                    r.choices,
                    r.quick_hits
                );
            }

            let with_tags: Vec<_> = rows.iter().filter(|r| !r.tags.is_empty()).collect();
            if !with_tags.is_empty() {
                println!("\n--- Tags ---");
                for r in &with_tags {
                    println!("  {}: {}", &r.id[..8], r.tags);
                }
            }

            println!("\n{} questions | qbank show <id>", rows.len());
            Ok(())
        }
        Commands::Tags => {
            let tags = db::fetch_tags(&conn)?;
            if tags.is_empty() {
                println!("No tags.");
            }
            for (name, count) in tags {
                println!("{:>5}  {}", count, name);
            }
            Ok(())
        }
        Commands::Stats => {
            let s = db::get_stats(&conn)?;
            println!("Questions:         {}", s.questions);
            println!("Answer choices:    {}", s.answer_choices);
            println!("Articles:          {}", s.articles);
            println!("Quick hits:        {}", s.quick_hits);
            println!("Quick hit answers: {}", s.quick_hit_answers);
            println!("Tags:              {}", s.tags);
            println!("Imports:           {} ({} failed)", s.imports, s.failed_imports);
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

#[derive(Default)]
struct ImportCounts {
    documents: usize,
    failed: usize,
    questions: usize,
}

impl ImportCounts {
    fn print(&self) {
        println!(
            "Imported {} questions from {} documents ({} failed).",
            self.questions,
            self.documents - self.failed,
            self.failed,
        );
    }
}

fn source_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

fn progress(len: usize) -> indicatif::ProgressBar {
    use indicatif::{ProgressBar, ProgressStyle};

    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );
    pb
}

/// Log the attempt and tally it. A failed document never stops the batch.
fn finish_document(
    conn: &rusqlite::Connection,
    pb: &indicatif::ProgressBar,
    counts: &mut ImportCounts,
    source: String,
    format: Option<&str>,
    outcome: Result<usize, String>,
    elapsed: Duration,
) -> anyhow::Result<()> {
    counts.documents += 1;
    let (question_count, error) = match outcome {
        Ok(n) => {
            counts.questions += n;
            (n, None)
        }
        Err(e) => {
            counts.failed += 1;
            pb.println(format!("  failed {}: {}", source, e));
            (0, Some(e))
        }
    };
    db::record_import(
        conn,
        &db::ImportLogRow {
            source,
            format: format.map(str::to_string),
            question_count,
            error,
            elapsed_ms: elapsed.as_millis() as i64,
        },
    )?;
    pb.inc(1);
    Ok(())
}

fn import_sequential(
    conn: &rusqlite::Connection,
    objects: &dyn ObjectStore,
    files: &[PathBuf],
) -> anyhow::Result<ImportCounts> {
    let pb = progress(files.len());
    let mut counts = ImportCounts::default();

    for path in files {
        let t = Instant::now();
        let source = source_name(path);
        pb.set_message(source.clone());
        let outcome = std::fs::read(path)
            .map_err(ImportError::from)
            .and_then(|bytes| import::import_document(&bytes, conn, objects));
        let format = outcome.as_ref().ok().map(|o| o.format.as_str());
        let outcome = outcome
            .map(|o| o.question_ids.len())
            .map_err(|e| e.to_string());
        finish_document(conn, &pb, &mut counts, source, format, outcome, t.elapsed())?;
    }

    pb.finish_and_clear();
    Ok(counts)
}

struct Pending {
    source: String,
    elapsed: Duration,
    parsed: Result<ParsedDocument, ImportError>,
}

/// Convert in order (image uploads keep document order), parse in parallel,
/// then save one document at a time.
fn import_batch(
    conn: &rusqlite::Connection,
    objects: &dyn ObjectStore,
    files: &[PathBuf],
) -> anyhow::Result<ImportCounts> {
    use rayon::prelude::*;

    let pb = progress(files.len());
    let mut counts = ImportCounts::default();

    pb.set_message("converting");
    let mut converted = Vec::with_capacity(files.len());
    for path in files {
        let t = Instant::now();
        let markup = std::fs::read(path)
            .map_err(ImportError::from)
            .and_then(|bytes| import::convert_document(&bytes, objects));
        converted.push((source_name(path), t.elapsed(), markup));
    }

    pb.set_message("parsing");
    let pending: Vec<Pending> = converted
        .into_par_iter()
        .map(|(source, elapsed, markup)| {
            let t = Instant::now();
            let parsed = markup.and_then(|c| parser::parse_markup(&c.markup));
            Pending {
                source,
                elapsed: elapsed + t.elapsed(),
                parsed,
            }
        })
        .collect();

    pb.set_message("saving");
    for doc in pending {
        let t = Instant::now();
        let format = doc.parsed.as_ref().ok().map(|p| p.format.as_str());
        let outcome = match doc.parsed {
            Ok(p) => import::persist(conn, &p.questions)
                .map(|ids| ids.len())
                .map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        finish_document(conn, &pb, &mut counts, doc.source, format, outcome, doc.elapsed + t.elapsed())?;
    }

    pb.finish_and_clear();
    Ok(counts)
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
