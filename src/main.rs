use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use document_agent::core::AppConfig;
use document_agent::delivery::{DeliveryOutcome, DeliveryRequest, DeliveryService};
use document_agent::service::{DeliveryReport, ReportRequest, ReportService};

const SEND_BODY: &str = "Dear client,\n\n\
Please find your document analysis report attached.\n\n\
Best regards,\n\
Your AI Agent";

#[derive(Parser, Debug)]
#[command(name = "docagent", version, about = "Document analysis and report delivery")]
struct Cli {
    #[arg(long, global = true, help = "Path to a TOML configuration file")]
    config: Option<PathBuf>,
    #[arg(long, global = true, help = "Output machine-readable JSON")]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Analyze a UTF-8 text file, render a PDF report and optionally mail it.
    Analyze {
        file: PathBuf,
        #[arg(long, help = "Recipient address for the report")]
        to: Option<String>,
        #[arg(long)]
        subject: Option<String>,
        #[arg(long, help = "Directory for report artifacts")]
        output_dir: Option<PathBuf>,
    },
    /// Mail an existing report artifact.
    Send {
        artifact: PathBuf,
        #[arg(long)]
        to: String,
        #[arg(long)]
        subject: Option<String>,
    },
    /// Download every file the configured backends need.
    FetchModels,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = AppConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Analyze {
            file,
            to,
            subject,
            output_dir,
        } => {
            if let Some(dir) = output_dir {
                config.reports.output_dir = dir;
            }
            let bytes =
                std::fs::read(&file).with_context(|| format!("failed to read {file:?}"))?;

            let service = ReportService::from_config(&config).await?;
            let request = ReportRequest {
                bytes,
                recipient: to,
                subject,
            };
            let response = match service.handle(request) {
                Ok(response) => response,
                Err(err) => {
                    tracing::error!(error = %err, "analysis request failed");
                    anyhow::bail!(err.user_message());
                }
            };

            if cli.json {
                let delivery = match response.delivery() {
                    DeliveryReport::NotRequested => serde_json::Value::Null,
                    DeliveryReport::Misconfigured { recipient, error } => serde_json::json!({
                        "recipient": recipient,
                        "status": "NOT_CONFIGURED",
                        "error": error.to_string(),
                    }),
                    DeliveryReport::Attempted { recipient, outcome } => serde_json::json!({
                        "recipient": recipient,
                        "status": outcome.status(),
                        "error": outcome.error().map(ToString::to_string),
                    }),
                };
                let output = serde_json::json!({
                    "report": response.report(),
                    "delivery": delivery,
                    "message": response.message(),
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                let analysis = response.analysis();
                println!("Sentiment:  {}", analysis.sentiment());
                println!("Confidence: {:.4}", analysis.confidence());
                println!("Summary:    {}", analysis.summary());
                println!("Report:     {}", response.report().path().display());
                println!("{}", response.message());
            }
            service.shutdown();
        }
        Commands::Send {
            artifact,
            to,
            subject,
        } => {
            let service = DeliveryService::new(config.smtp.clone());
            let request = DeliveryRequest::new(
                to.as_str(),
                subject.unwrap_or_else(|| config.mail.subject.clone()),
                SEND_BODY,
                artifact,
            );
            let outcome = service
                .deliver(&request)
                .context("email configuration error; email not sent")?;
            match &outcome {
                DeliveryOutcome::Sent => println!("Email sent to {to}."),
                DeliveryOutcome::SentWithoutAttachment { warning } => {
                    println!("Email sent to {to} without attachment: {warning}")
                }
                DeliveryOutcome::Failed(err) => {
                    anyhow::bail!("failed to send email to {to}: {err}")
                }
            }
        }
        Commands::FetchModels => {
            for (name, backend) in [
                ("classifier", config.classifier.backend()),
                ("summarizer", config.summarizer.backend()),
            ] {
                let files = backend
                    .fetch()
                    .await
                    .with_context(|| format!("failed to fetch {name} files"))?;
                if cli.json {
                    println!(
                        "{}",
                        serde_json::json!({
                            "backend": name,
                            "config": files.config,
                            "tokenizer": files.tokenizer,
                            "weights": files.weights,
                        })
                    );
                } else {
                    println!("{name}:");
                    println!("  config:    {}", files.config.display());
                    println!("  tokenizer: {}", files.tokenizer.display());
                    println!("  weights:   {}", files.weights.display());
                }
            }
        }
    }

    Ok(())
}
