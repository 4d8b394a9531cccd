pub mod core;
pub mod delivery;
pub mod loaders;
pub mod models;
pub mod pipelines;
pub mod report;
pub mod service;

// Re-export the types most callers need
pub use core::{AppConfig, PipelineError};
pub use delivery::{DeliveryOutcome, DeliveryRequest, DeliveryService};
pub use pipelines::analysis::{AnalysisPipeline, AnalysisPipelineBuilder, AnalysisResult, Document};
pub use pipelines::{Sentiment, TextClassifier, TextSummarizer};
pub use report::{Report, ReportRenderer};
pub use service::{ReportRequest, ReportResponse, ReportService};
