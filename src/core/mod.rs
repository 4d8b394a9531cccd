pub mod config;
pub mod error;

pub use config::{
    AppConfig, ClassifierConfig, LabelConfig, MailConfig, ReportConfig, SmtpSettings,
    SummarizerConfig,
};
pub use error::{
    DecodeError, DeliveryConfigError, DeliveryTransportError, InferenceError, InferenceErrorKind,
    PipelineError, RenderError, Stage,
};
