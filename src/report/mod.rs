//! Report artifacts: deterministic layout plus atomic PDF persistence.

pub mod layout;
pub mod renderer;

pub use layout::{PlacedLine, ReportLayout, TextStyle};
pub use renderer::{Report, ReportFormat, ReportId, ReportRenderer};
