//! Document analysis pipeline: sentiment + summary in one unit of work.
//!
//! ## Main Types
//!
//! - [`AnalysisPipeline`] - Runs both inference stages and normalizes the result
//! - [`AnalysisPipelineBuilder`] - Builder pattern for pipeline configuration
//! - [`Document`] - Validated UTF-8 input text
//! - [`AnalysisResult`] - Canonical sentiment, confidence and summary
//!
//! ## Usage Example
//!
//! ```rust,ignore
//! use document_agent::pipelines::analysis::*;
//! use document_agent::core::AppConfig;
//!
//! let config = AppConfig::load(None)?;
//! let pipeline = AnalysisPipelineBuilder::from_config(&config).await?.build()?;
//!
//! let document = Document::new("The product was amazing and exceeded expectations.")?;
//! let result = pipeline.analyze(&document)?;
//! println!("{} ({:.2}): {}", result.sentiment(), result.confidence(), result.summary());
//! ```

pub mod builder;
pub mod document;
pub mod pipeline;

pub use builder::AnalysisPipelineBuilder;
pub use document::{AnalysisResult, Document};
pub use pipeline::{AnalysisPipeline, StageExecution};
