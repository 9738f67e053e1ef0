use anyhow::{Result, anyhow};
use chrono::Local;
use clap::{Parser, Subcommand};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rs_mail_events::classify::classify_store;
use rs_mail_events::classify::model::{BagOfWordsModel, TrainParams, evaluate, split_train_test};
use rs_mail_events::config::{
    Config, load_config, load_config_from, resolve_db_path, resolve_interchange_path,
    resolve_model_path,
};
use rs_mail_events::domain::timestamp::Watermark;
use rs_mail_events::error::IngestError;
use rs_mail_events::extract::extract_store;
use rs_mail_events::extract::ollama::OllamaExtractor;
use rs_mail_events::ingest::driver::{IngestReport, IngestionDriver};
use rs_mail_events::ingest::interchange::{read_records, write_records};
use rs_mail_events::ingest::source::EmlDirSource;
use rs_mail_events::mail::decoders::normalize_snippet;
use rs_mail_events::store::repo::EmailRepository;
use rs_mail_events::store::sqlite::SqliteRepo;

#[derive(Parser)]
#[command(name = "rs_mail_events")]
#[command(about = "Ingest downloaded webmail and pull out upcoming events", long_about = None)]
struct Cli {
    /// Config file (default: <config dir>/rs_mail_events/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse downloaded messages newer than the stored watermark into the interchange file
    Ingest {
        /// Directory with the .eml downloads and manifest.json
        #[arg(long)]
        source: PathBuf,

        /// Delete each .eml once parsed
        #[arg(long)]
        remove_consumed: bool,
    },

    /// Append the interchange file to the email store and remove it
    Persist,

    /// Label stored emails by hand for training
    Label {
        #[arg(long, default_value_t = 270)]
        limit: usize,
    },

    /// Train the event classifier on labeled emails
    Train,

    /// Mark stored emails that look like events
    Classify,

    /// Ask the local model for event details of every event email
    Extract,

    /// ingest, persist, classify and extract in one go
    Pipeline {
        #[arg(long)]
        source: PathBuf,

        #[arg(long)]
        remove_consumed: bool,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let cfg = match &cli.config {
        Some(path) => load_config_from(path),
        None => load_config(),
    }
    .map_err(|e| anyhow!("Configuration error: {e}"))?;

    match cli.cmd {
        Command::Ingest {
            source,
            remove_consumed,
        } => ingest(&cfg, &source, remove_consumed),
        Command::Persist => persist(&cfg),
        Command::Label { limit } => label(&cfg, limit),
        Command::Train => train(&cfg),
        Command::Classify => classify(&cfg),
        Command::Extract => extract(&cfg),
        Command::Pipeline {
            source,
            remove_consumed,
        } => {
            // Records kept before a source failure are still persisted.
            let ingested = ingest(&cfg, &source, remove_consumed);
            persist(&cfg)?;
            ingested?;
            classify(&cfg)?;
            extract(&cfg)
        }
    }
}

fn ingest(cfg: &Config, source_dir: &Path, remove_consumed: bool) -> Result<()> {
    let watermark = {
        let repo = SqliteRepo::open(&resolve_db_path(cfg)?)?;
        let latest = repo.latest_date()?;
        if latest.is_none() {
            println!("First run: looking back {} days", cfg.lookback_days());
        }
        Watermark::seed(
            latest.as_deref(),
            Local::now().naive_local(),
            cfg.lookback_days(),
        )
    };
    println!("Downloading until: {watermark}");

    let stop = Arc::new(AtomicBool::new(false));
    let s2 = stop.clone();
    ctrlc::set_handler(move || {
        s2.store(true, Ordering::SeqCst);
    })?;

    let mut source = EmlDirSource::open(source_dir)?.remove_consumed(remove_consumed);
    let driver = IngestionDriver::new(cfg.ingest_config()).with_stop_flag(stop);
    let out = resolve_interchange_path(cfg)?;

    match driver.run(&mut source, watermark) {
        Ok(report) => {
            write_records(&out, &report.records)?;
            print_report(&report, watermark, &out);
            Ok(())
        }
        Err(IngestError::SourceLost { partial, source }) => {
            write_records(&out, &partial.records)?;
            print_report(&partial, watermark, &out);
            Err(anyhow!("message source lost: {source}"))
        }
    }
}

fn print_report(report: &IngestReport, watermark: Watermark, out: &Path) {
    println!(
        "Parsed {} message(s), kept {} email(s) ({:?}); saved to {}",
        report.messages_seen,
        report.records.len(),
        report.stopped,
        out.display()
    );
    println!(
        "Next watermark: {}",
        watermark.advance(report.watermark_candidate)
    );
}

fn persist(cfg: &Config) -> Result<()> {
    let path = resolve_interchange_path(cfg)?;
    let records = read_records(&path)?;
    let db_path = resolve_db_path(cfg)?;
    let repo = SqliteRepo::open(&db_path)?;
    let n = repo.append_emails(&records)?;
    if path.exists() {
        std::fs::remove_file(&path)?;
    }
    println!("Inserted {n} email(s) into {}", db_path.display());
    Ok(())
}

fn label(cfg: &Config, limit: usize) -> Result<()> {
    let repo = SqliteRepo::open(&resolve_db_path(cfg)?)?;
    let todo = repo.unlabeled(limit)?;
    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();

    for email in &todo {
        println!("\n{}", "=".repeat(60));
        println!("ID: {}", email.id);
        println!("From: {}", email.sender);
        println!("Date: {}", email.date);
        println!("Subject: {}", email.subject);
        println!("Body:\n{}", normalize_snippet(&email.body, 500));
        println!("{}", "=".repeat(60));

        loop {
            print!("Is this about an upcoming event? [1 = Yes, 0 = No, s = skip, q = quit] ");
            std::io::stdout().flush()?;
            let Some(line) = lines.next() else {
                return Ok(());
            };
            match line?.trim().to_lowercase().as_str() {
                "1" => {
                    repo.set_label(email.id, true)?;
                    break;
                }
                "0" => {
                    repo.set_label(email.id, false)?;
                    break;
                }
                "s" => break,
                "q" => {
                    println!("Exiting early.");
                    return Ok(());
                }
                _ => println!("Invalid input. Please enter 1, 0, s, or q."),
            }
        }
    }

    println!("Finished labeling {} email(s).", todo.len());
    Ok(())
}

fn train(cfg: &Config) -> Result<()> {
    let repo = SqliteRepo::open(&resolve_db_path(cfg)?)?;
    let samples: Vec<_> = repo
        .labeled()?
        .into_iter()
        .map(|e| {
            let y = e.is_event == Some(true);
            (e, y)
        })
        .collect();
    let (train_set, test_set) = split_train_test(&samples);

    let texts: Vec<_> = train_set.iter().map(|(e, y)| (e.text(), *y)).collect();
    let model = BagOfWordsModel::train(&texts, &TrainParams::default())?;

    let held_out: Vec<_> = test_set
        .iter()
        .map(|(e, y)| (e.subject.clone(), e.body.clone(), *y))
        .collect();
    let eval = evaluate(&model, &held_out);
    println!(
        "Held-out: support {}, accuracy {:.2}, event precision {:.2}, event recall {:.2}",
        eval.support, eval.accuracy, eval.precision, eval.recall
    );

    let path = resolve_model_path(cfg)?;
    model.save(&path)?;
    println!("Model saved to {}", path.display());
    Ok(())
}

fn classify(cfg: &Config) -> Result<()> {
    let model = BagOfWordsModel::load(&resolve_model_path(cfg)?)?;
    let repo = SqliteRepo::open(&resolve_db_path(cfg)?)?;
    let events = classify_store(&repo, &model)?;
    println!("Marked {} email(s) as events", events.len());
    Ok(())
}

fn extract(cfg: &Config) -> Result<()> {
    let extractor = OllamaExtractor::new(cfg.ollama_url(), cfg.ollama_model())?;
    let repo = SqliteRepo::open(&resolve_db_path(cfg)?)?;
    let n = extract_store(&repo, &extractor)?;
    println!("Extracted structured info from {n} email(s)");
    Ok(())
}
