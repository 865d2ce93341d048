use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use painpoint_common::{AnalysisResult, Config};
use painpoint_scout::traits::LogProgress;
use painpoint_scout::{generator, Analyzer};
use reddit_client::RedditClient;

#[derive(Parser)]
#[command(name = "painpoint-scout", about = "Discover and group user pain points from Reddit")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyze what people complain about for a search term
    Analyze {
        /// Product, brand or topic to analyze
        term: String,

        /// Cap on posts kept after retrieval
        #[arg(long)]
        max_documents: Option<usize>,

        /// Minimum engagement score (upvotes + 2 x replies)
        #[arg(long)]
        min_engagement: Option<i64>,

        #[arg(long, value_enum, default_value_t = Format::Json)]
        format: Format,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Json,
    Text,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("painpoint=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = Config::from_env()?;
    config.log_redacted();

    match cli.command {
        Command::Analyze {
            term,
            max_documents,
            min_engagement,
            format,
        } => {
            if let Some(max) = max_documents {
                config.pipeline.max_documents = max;
            }
            if let Some(min) = min_engagement {
                config.pipeline.min_engagement = min;
            }

            let reddit = RedditClient::new(
                config.reddit_client_id.clone(),
                config.reddit_client_secret.clone(),
                &config.reddit_user_agent,
            )
            .context("Failed to build Reddit client")?;

            let analyzer = Analyzer::new(
                Arc::new(reddit),
                generator::from_config(&config),
                config.pipeline.clone(),
            )
            .with_progress(Arc::new(LogProgress));

            info!(term = term.as_str(), "Painpoint scout starting...");
            let result = analyzer.analyze(&term).await?;

            match format {
                Format::Json => println!("{}", serde_json::to_string_pretty(&result)?),
                Format::Text => print!("{}", render_text(&result)),
            }
        }
    }

    Ok(())
}

fn render_text(result: &AnalysisResult) -> String {
    let mut out = format!(
        "Pain points for \"{}\" ({} posts, {} pain points)\n",
        result.search_term, result.total_posts_analyzed, result.total_pain_points
    );

    if let Some(message) = &result.message {
        out.push_str(&format!("\n{message}\n"));
    }

    for (rank, category) in result.top_categories.iter().enumerate() {
        out.push_str(&format!(
            "\n{}. {} ({} pain points, avg engagement {})\n   {}\n",
            rank + 1,
            category.name,
            category.count,
            category.average_engagement,
            category.summary
        ));
        for pain_point in category.pain_points.iter().take(3) {
            out.push_str(&format!("   - {} ({})\n", pain_point.content, pain_point.url));
        }
    }

    for warning in &result.warnings {
        out.push_str(&format!("\nwarning: {warning}\n"));
    }
    out
}
