//! Ask questions about a PDF using a local language model

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use papertrail_common::AppConfig;
use papertrail_docqa::{DocQaError, DocumentAssistant};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "docqa", version, about = "Ask questions about a PDF document")]
struct Args {
    /// PDF file to load
    pdf: PathBuf,

    /// Ask a single question and exit
    #[arg(short, long)]
    question: Option<String>,

    /// Model name, overrides configuration
    #[arg(short, long)]
    model: Option<String>,

    /// Inference server URL, overrides configuration
    #[arg(long)]
    endpoint: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let mut config = AppConfig::load().context("Failed to load configuration")?.assistant;
    if let Some(model) = args.model {
        config.model = model;
    }
    if let Some(endpoint) = args.endpoint {
        config.endpoint = endpoint;
    }

    // Logs go to stderr so answers on stdout stay clean
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut assistant = DocumentAssistant::from_config(&config)?;
    let loaded = assistant
        .load(&args.pdf)
        .await
        .with_context(|| format!("Failed to load {}", args.pdf.display()))?;

    info!(
        path = %loaded.path.display(),
        chunks = loaded.chunks,
        model = %config.model,
        endpoint = %config.endpoint,
        "Ready"
    );

    match args.question {
        Some(question) => {
            let answer = assistant.ask(&question).await?;
            println!("{answer}");
        }
        None => interactive(&assistant).await?,
    }

    Ok(())
}

async fn interactive(assistant: &DocumentAssistant) -> Result<()> {
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    stdout
        .write_all(b"Document loaded. Type a question, or 'exit' to quit.\n")
        .await?;

    loop {
        stdout.write_all(b"\nQuestion: ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let question = line.trim();

        if question.is_empty() {
            continue;
        }
        if question.eq_ignore_ascii_case("exit") || question.eq_ignore_ascii_case("quit") {
            break;
        }

        match assistant.ask(question).await {
            Ok(answer) => stdout.write_all(format!("\nAnswer: {answer}\n").as_bytes()).await?,
            Err(e @ DocQaError::Unreachable { .. }) | Err(e @ DocQaError::Inference { .. }) => {
                warn!(error = %e, "Model request failed");
                stdout.write_all(format!("\nError: {e}\n").as_bytes()).await?;
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}
