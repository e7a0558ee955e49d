use anyhow::{Context, Result};
use clap::Parser;
use corpus_cli::{Cli, Commands};
use corpus_core::config;
use corpus_core::{AddSummary, Engine};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load(cli.config.as_deref())?;
    let engine = Engine::from_config(&cfg)
        .await
        .context("opening corpus engine")?;

    match cli.command {
        Commands::Create { json } => {
            let summary = engine.create_searchable_data().await?;
            report("create", &summary, json)
        }
        Commands::Add { folder, ocr, json } => {
            let summary = engine.add_documents(folder.as_deref(), ocr).await?;
            report("add", &summary, json)
        }
        Commands::Search(cmd) => {
            let (request, mode) = cmd.to_request()?;
            let response = engine.search(&request, mode)?;
            info!(results = response.results.len(), "search finished");
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }
        Commands::Show { name } => {
            let entry = engine
                .lookup(&name)
                .await?
                .with_context(|| format!("no ledger entry named '{name}'"))?;
            println!("{}", serde_json::to_string_pretty(&entry)?);
            Ok(())
        }
    }
}

fn report(label: &str, summary: &AddSummary, json: bool) -> Result<()> {
    if json {
        let out = serde_json::json!({
            "status": "ok",
            "mode": label,
            "extracted": summary.extracted,
            "indexed": summary.indexed,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!(
            "{label}: extracted {}, indexed {}",
            summary.extracted, summary.indexed
        );
    }
    Ok(())
}
