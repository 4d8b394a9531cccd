//! Request boundary: uploaded bytes in, rendered artifact and delivery report out.

use std::path::{Path, PathBuf};

use minijinja::{context, Environment};
use tracing::{info, warn};

use crate::core::config::DEFAULT_MAIL_BODY;
use crate::core::{AppConfig, DeliveryConfigError, MailConfig, PipelineError};
use crate::delivery::{DeliveryOutcome, DeliveryRequest, DeliveryService};
use crate::pipelines::analysis::{
    AnalysisPipeline, AnalysisPipelineBuilder, AnalysisResult, Document,
};
use crate::report::{Report, ReportRenderer};

/// One upload. `recipient` and `subject` are optional form fields; a blank
/// recipient means no delivery.
#[derive(Debug, Clone, Default)]
pub struct ReportRequest {
    pub bytes: Vec<u8>,
    pub recipient: Option<String>,
    pub subject: Option<String>,
}

impl ReportRequest {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            ..Self::default()
        }
    }

    pub fn deliver_to(mut self, recipient: impl Into<String>) -> Self {
        self.recipient = Some(recipient.into());
        self
    }

    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }
}

/// What happened to the optional delivery stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryReport {
    NotRequested,
    Misconfigured {
        recipient: String,
        error: DeliveryConfigError,
    },
    Attempted {
        recipient: String,
        outcome: DeliveryOutcome,
    },
}

impl DeliveryReport {
    pub fn is_error(&self) -> bool {
        match self {
            DeliveryReport::NotRequested => false,
            DeliveryReport::Misconfigured { .. } => true,
            DeliveryReport::Attempted { outcome, .. } => !outcome.is_sent(),
        }
    }
}

/// A produced report. Delivery problems are reported here and never turn a
/// rendered report into an error.
#[derive(Debug, Clone)]
pub struct ReportResponse {
    report: Report,
    artifact: Vec<u8>,
    delivery: DeliveryReport,
}

impl ReportResponse {
    pub fn report(&self) -> &Report {
        &self.report
    }

    pub fn analysis(&self) -> &AnalysisResult {
        self.report.analysis()
    }

    /// The rendered artifact, byte for byte as written to disk.
    pub fn artifact(&self) -> &[u8] {
        &self.artifact
    }

    pub fn into_artifact(self) -> Vec<u8> {
        self.artifact
    }

    pub fn delivery(&self) -> &DeliveryReport {
        &self.delivery
    }

    /// Human-readable status line for the whole request.
    pub fn message(&self) -> String {
        let mut message = String::from("Report generated successfully. ");
        match &self.delivery {
            DeliveryReport::NotRequested => {
                message.push_str("No email address provided for delivery.")
            }
            DeliveryReport::Misconfigured { error, .. } => {
                message.push_str(&format!("Email configuration error: {error}. Email not sent."))
            }
            DeliveryReport::Attempted { recipient, outcome } => match outcome {
                DeliveryOutcome::Sent => message.push_str(&format!("Email sent to {recipient}.")),
                DeliveryOutcome::SentWithoutAttachment { .. } => message.push_str(&format!(
                    "Email sent to {recipient} without the report attached."
                )),
                DeliveryOutcome::Failed(err) => {
                    message.push_str(&format!("Failed to send email to {recipient}: {err}."))
                }
            },
        }
        message
    }
}

/// Runs decode, analysis, rendering and optional delivery for one request
/// on the calling thread.
pub struct ReportService {
    pipeline: AnalysisPipeline,
    renderer: ReportRenderer,
    delivery: DeliveryService,
    output_dir: PathBuf,
    mail: MailConfig,
}

impl ReportService {
    pub fn new(
        pipeline: AnalysisPipeline,
        delivery: DeliveryService,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            pipeline,
            renderer: ReportRenderer::new(),
            delivery,
            output_dir: output_dir.into(),
            mail: MailConfig::default(),
        }
    }

    /// Loads both backends and wires everything from `config`.
    pub async fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let pipeline = AnalysisPipelineBuilder::from_config(config).await?.build()?;
        Ok(Self::new(
            pipeline,
            DeliveryService::new(config.smtp.clone()),
            &config.reports.output_dir,
        )
        .with_mail(config.mail.clone()))
    }

    pub fn with_mail(mut self, mail: MailConfig) -> Self {
        self.mail = mail;
        self
    }

    pub fn pipeline(&self) -> &AnalysisPipeline {
        &self.pipeline
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn handle(&self, request: ReportRequest) -> Result<ReportResponse, PipelineError> {
        let document = Document::from_bytes(&request.bytes)?;
        let analysis = self.pipeline.analyze(&document)?;
        let (report, artifact) =
            self.renderer
                .render(document.text(), &analysis, &self.output_dir)?;

        let delivery = match request
            .recipient
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
        {
            None => DeliveryReport::NotRequested,
            Some(recipient) => {
                let subject = request
                    .subject
                    .as_deref()
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .unwrap_or(&self.mail.subject);
                let body = self.mail_body(&analysis);
                let delivery_request =
                    DeliveryRequest::for_report(&report, recipient, subject, body);
                match self.delivery.deliver(&delivery_request) {
                    Ok(outcome) => DeliveryReport::Attempted {
                        recipient: recipient.to_string(),
                        outcome,
                    },
                    Err(error) => {
                        warn!(%error, "delivery is not configured");
                        DeliveryReport::Misconfigured {
                            recipient: recipient.to_string(),
                            error,
                        }
                    }
                }
            }
        };

        let response = ReportResponse {
            report,
            artifact,
            delivery,
        };
        info!(outcome = %response.message(), "request completed");
        Ok(response)
    }

    fn mail_body(&self, analysis: &AnalysisResult) -> String {
        let rendered = Environment::new().render_str(
            &self.mail.body_template,
            context! {
                sentiment => analysis.sentiment().to_string(),
                confidence => analysis.confidence(),
                summary => analysis.summary(),
            },
        );
        match rendered {
            Ok(body) => body,
            Err(err) => {
                warn!(error = %err, "mail body template failed; using the default letter");
                DEFAULT_MAIL_BODY.to_string()
            }
        }
    }

    /// Releases both inference backends.
    pub fn shutdown(self) {
        self.pipeline.shutdown();
    }
}
