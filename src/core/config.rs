//! Application configuration: an optional TOML file plus environment overrides.
//!
//! Every section has defaults, so an empty file (or no file) is a valid
//! configuration. SMTP credentials are normally supplied through the
//! environment (`SMTP_USERNAME`, `SMTP_PASSWORD`) rather than the file.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::loaders::BackendSpec;
use crate::models::SummarizerParams;
use crate::pipelines::analysis::StageExecution;
use crate::pipelines::labels::{LabelMap, LabelPreset};
use crate::pipelines::traits::SummaryBounds;
use crate::pipelines::utils::DeviceRequest;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub device: DeviceRequest,
    pub execution: StageExecution,
    pub classifier: ClassifierConfig,
    pub summarizer: SummarizerConfig,
    pub reports: ReportConfig,
    pub smtp: SmtpSettings,
    pub mail: MailConfig,
}

impl AppConfig {
    /// Reads `path` (if any), applies process environment overrides and validates.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {path:?}"))?;
        toml::from_str(&content).with_context(|| format!("failed to parse config file {path:?}"))
    }

    /// Applies overrides from `lookup`, keyed by environment variable name.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(host) = non_empty("SMTP_SERVER") {
            self.smtp.host = host;
        }
        if let Some(port) = non_empty("SMTP_PORT") {
            self.smtp.port = port
                .trim()
                .parse()
                .with_context(|| format!("SMTP_PORT {port:?} is not a valid port"))?;
        }
        if let Some(username) = non_empty("SMTP_USERNAME") {
            self.smtp.username = Some(username);
        }
        if let Some(password) = non_empty("SMTP_PASSWORD") {
            self.smtp.password = Some(password);
        }
        if let Some(from) = non_empty("SMTP_FROM") {
            self.smtp.from = Some(from);
        }
        if let Some(dir) = non_empty("REPORTS_DIR") {
            self.reports.output_dir = PathBuf::from(dir);
        }
        if let Some(model) = non_empty("CLASSIFIER_MODEL") {
            self.classifier.model = model;
        }
        if let Some(model) = non_empty("SUMMARIZER_MODEL") {
            self.summarizer.model = model;
        }
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            !self.classifier.model.trim().is_empty(),
            "classifier model reference is empty"
        );
        anyhow::ensure!(
            !self.summarizer.model.trim().is_empty(),
            "summarizer model reference is empty"
        );
        self.summarizer.bounds()?;
        anyhow::ensure!(
            self.summarizer.max_input_tokens > 0,
            "summarizer max_input_tokens must be positive"
        );
        minijinja::Environment::new()
            .template_from_str(&self.mail.body_template)
            .context("mail body template is invalid")?;
        Ok(())
    }
}

/// Label table selection: a built-in preset name or an explicit table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LabelConfig {
    Preset(LabelPreset),
    Table(LabelMap),
}

impl LabelConfig {
    pub fn to_map(&self) -> LabelMap {
        match self {
            LabelConfig::Preset(preset) => LabelMap::preset(*preset),
            LabelConfig::Table(map) => map.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Hub repository id or local model directory.
    pub model: String,
    /// Separate tokenizer location; defaults to `model`.
    pub tokenizer: Option<String>,
    pub revision: String,
    pub labels: LabelConfig,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            model: "textattack/bert-base-uncased-SST-2".to_string(),
            tokenizer: Some("bert-base-uncased".to_string()),
            revision: "main".to_string(),
            labels: LabelConfig::Preset(LabelPreset::IndexedBinary),
        }
    }
}

impl ClassifierConfig {
    pub fn backend(&self) -> BackendSpec {
        BackendSpec::new(&self.model, self.tokenizer.as_deref(), &self.revision)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarizerConfig {
    pub model: String,
    pub tokenizer: Option<String>,
    pub revision: String,
    pub min_length: usize,
    pub max_length: usize,
    pub max_input_tokens: usize,
    pub prefix: String,
    pub repeat_penalty: f32,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            model: "t5-small".to_string(),
            tokenizer: None,
            revision: "main".to_string(),
            min_length: 40,
            max_length: 150,
            max_input_tokens: 512,
            prefix: "summarize: ".to_string(),
            repeat_penalty: 1.0,
        }
    }
}

impl SummarizerConfig {
    pub fn backend(&self) -> BackendSpec {
        BackendSpec::new(&self.model, self.tokenizer.as_deref(), &self.revision)
    }

    pub fn bounds(&self) -> anyhow::Result<SummaryBounds> {
        SummaryBounds::new(self.min_length, self.max_length)
    }

    pub fn params(&self) -> SummarizerParams {
        SummarizerParams {
            prefix: self.prefix.clone(),
            max_input_tokens: self.max_input_tokens,
            repeat_penalty: self.repeat_penalty,
            ..SummarizerParams::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub output_dir: PathBuf,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("analysis_reports"),
        }
    }
}

/// Mail transport settings. STARTTLS is always used.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Sender address; the username is used when absent.
    pub from: Option<String>,
    pub timeout_secs: u64,
}

impl SmtpSettings {
    /// Username and password, if both are present and non-empty.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        let username = self.username.as_deref().filter(|u| !u.is_empty())?;
        let password = self.password.as_deref().filter(|p| !p.is_empty())?;
        Some((username, password))
    }

    pub fn sender(&self) -> Option<&str> {
        self.from
            .as_deref()
            .filter(|f| !f.is_empty())
            .or(self.username.as_deref())
    }
}

impl Default for SmtpSettings {
    fn default() -> Self {
        Self {
            host: "smtp.gmail.com".to_string(),
            port: 587,
            username: None,
            password: None,
            from: None,
            timeout_secs: 30,
        }
    }
}

impl fmt::Debug for SmtpSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("from", &self.from)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

pub const DEFAULT_MAIL_BODY: &str = "Dear client,\n\n\
Please find your AI document analysis report attached. \
The report provides sentiment analysis and a summary of your uploaded document.\n\n\
Best regards,\n\
Your AI Analysis Service";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    pub subject: String,
    /// minijinja template; `sentiment`, `confidence` and `summary` are in scope.
    pub body_template: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            subject: "Your Document Analysis Report".to_string(),
            body_template: DEFAULT_MAIL_BODY.to_string(),
        }
    }
}
