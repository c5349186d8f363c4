use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

mod analytics;
mod classifier;
mod db;
mod error;
mod events;
mod ingest;
mod lexicon;
mod models;
mod store;
mod stream;

#[derive(Parser)]
#[command(name = "event-feedback-analytics")]
#[command(about = "Feedback analytics aggregation engine for event dashboards", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load demo events and feedback
    Seed,
    /// Submit one feedback record
    Submit {
        #[arg(long)]
        event: String,
        #[arg(long)]
        activity: String,
        #[arg(long)]
        rating: i32,
        #[arg(long)]
        comment: Option<String>,
    },
    /// Print the current analytics snapshot for an event
    Analytics {
        #[arg(long)]
        event: String,
    },
    /// Subscribe to the push channel and print stream events as JSON lines
    Watch {
        #[arg(long)]
        event: String,
    },
    /// Import feedback records from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Run the sentiment classifier on a piece of text
    Classify {
        #[arg(long)]
        text: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    // Classification needs no database.
    if let Commands::Classify { text } = &cli.command {
        let classifier = classifier::SentimentClassifier::preloaded();
        let verdict = classifier.classify(text);
        println!("{}", serde_json::to_string_pretty(&verdict)?);
        return Ok(());
    }

    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a Postgres instance")?;
    let pool = db::connect(&database_url).await?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Submit {
            event,
            activity,
            rating,
            comment,
        } => {
            let store: Arc<dyn store::FeedbackStore> =
                Arc::new(store::PgFeedbackStore::new(pool.clone()));
            let resolver: Arc<dyn events::EventResolver> =
                Arc::new(events::PgEventResolver::new(pool.clone()));
            let ingestor = ingest::FeedbackIngestor::new(
                store,
                resolver,
                classifier::SentimentClassifier::load(),
            );

            let input = models::NewFeedback {
                event_id: event,
                activity,
                star_rating: rating,
                comment,
            };
            match ingestor.submit(input).await {
                Ok(record) => println!("{}", serde_json::to_string_pretty(&record)?),
                Err(err) if !err.is_retryable() => {
                    eprintln!("rejected: {err}");
                    std::process::exit(2);
                }
                Err(err) => return Err(err.into()),
            }
        }
        Commands::Analytics { event } => {
            let store = store::PgFeedbackStore::new(pool.clone());
            let snapshot = analytics::compute_snapshot(&store, &event).await?;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
        Commands::Watch { event } => {
            let store: Arc<dyn store::FeedbackStore> =
                Arc::new(store::PgFeedbackStore::new(pool.clone()));
            let broadcaster = stream::AnalyticsBroadcaster::new(store);
            let mut subscription = broadcaster.subscribe(&event);
            while let Some(update) = subscription.next_event().await {
                println!("{}", serde_json::to_string(&update)?);
            }
        }
        Commands::Import { csv } => {
            let inserted = db::import_csv(&pool, &csv).await?;
            println!("Inserted {inserted} feedback records from {}.", csv.display());
        }
        Commands::Classify { .. } => unreachable!(),
    }

    Ok(())
}
