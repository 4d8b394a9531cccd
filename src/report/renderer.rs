use std::fmt;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use printpdf::{BuiltinFont, Mm, PdfDocument};
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use super::layout::{ReportLayout, PAGE_HEIGHT_MM, PAGE_WIDTH_MM, REPORT_TITLE};
use crate::core::RenderError;
use crate::pipelines::analysis::AnalysisResult;

const MAX_NAME_ATTEMPTS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    Pdf,
}

impl ReportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ReportFormat::Pdf => "pdf",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ReportFormat::Pdf => "application/pdf",
        }
    }
}

/// Collision-resistant artifact identifier: UTC timestamp plus 64 random bits.
/// Never derived from content, so identical documents get distinct artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ReportId(String);

impl ReportId {
    pub fn generate() -> Self {
        Self(format!(
            "report-{}-{:016x}",
            Utc::now().format("%Y%m%dT%H%M%S%3fZ"),
            rand::random::<u64>()
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A persisted report artifact and the analysis it was rendered from.
/// The file is never deleted by this crate.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    id: ReportId,
    path: PathBuf,
    format: ReportFormat,
    analysis: AnalysisResult,
    #[serde(skip)]
    original_text: String,
}

impl Report {
    pub fn id(&self) -> &ReportId {
        &self.id
    }

    /// Absolute path of the written artifact.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> ReportFormat {
        self.format
    }

    pub fn analysis(&self) -> &AnalysisResult {
        &self.analysis
    }

    pub fn original_text(&self) -> &str {
        &self.original_text
    }

    /// The page layout embedded in the artifact.
    pub fn layout(&self) -> ReportLayout {
        ReportLayout::new(&self.original_text, &self.analysis)
    }

    pub fn file_name(&self) -> String {
        format!("{}.{}", self.id, self.format.extension())
    }
}

/// Renders analyses into PDF artifacts.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportRenderer;

impl ReportRenderer {
    pub fn new() -> Self {
        Self
    }

    /// Writes a report into `output_dir` (created if absent) and returns it.
    pub fn build(
        &self,
        original_text: &str,
        analysis: &AnalysisResult,
        output_dir: &Path,
    ) -> Result<Report, RenderError> {
        self.render(original_text, analysis, output_dir)
            .map(|(report, _)| report)
    }

    /// Like [`ReportRenderer::build`] but also hands back the artifact bytes.
    pub fn render(
        &self,
        original_text: &str,
        analysis: &AnalysisResult,
        output_dir: &Path,
    ) -> Result<(Report, Vec<u8>), RenderError> {
        let layout = ReportLayout::new(original_text, analysis);
        let bytes = self.to_pdf(&layout)?;
        debug!(
            pages = layout.page_count(),
            bytes = bytes.len(),
            "report laid out"
        );
        if layout.substituted_chars() > 0 {
            warn!(
                substituted = layout.substituted_chars(),
                "text outside the WinAnsi character set was replaced with '?'"
            );
        }

        let dir = ensure_dir(output_dir)?;
        let (id, path) = persist(&dir, &bytes, ReportFormat::Pdf)?;
        info!(path = %path.display(), "report written");

        let report = Report {
            id,
            path,
            format: ReportFormat::Pdf,
            analysis: analysis.clone(),
            original_text: original_text.to_string(),
        };
        Ok((report, bytes))
    }

    pub fn to_pdf(&self, layout: &ReportLayout) -> Result<Vec<u8>, RenderError> {
        let format_err = |e: printpdf::Error| RenderError::Format(e.to_string());

        let (doc, first_page, first_layer) = PdfDocument::new(
            REPORT_TITLE,
            Mm(PAGE_WIDTH_MM),
            Mm(PAGE_HEIGHT_MM),
            "Page 1",
        );
        let regular = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(format_err)?;
        let bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(format_err)?;

        for (index, lines) in layout.pages().iter().enumerate() {
            let (page, layer) = if index == 0 {
                (first_page, first_layer)
            } else {
                doc.add_page(
                    Mm(PAGE_WIDTH_MM),
                    Mm(PAGE_HEIGHT_MM),
                    format!("Page {}", index + 1),
                )
            };
            let layer = doc.get_page(page).get_layer(layer);
            for line in lines {
                let font = if line.style.is_bold() { &bold } else { &regular };
                layer.use_text(
                    line.text.as_str(),
                    line.style.size_pt(),
                    Mm(line.x_mm),
                    Mm(line.y_mm),
                    font,
                );
            }
        }

        doc.save_to_bytes().map_err(format_err)
    }
}

fn ensure_dir(output_dir: &Path) -> Result<PathBuf, RenderError> {
    let create_err = |source| RenderError::CreateDir {
        path: output_dir.to_path_buf(),
        source,
    };
    std::fs::create_dir_all(output_dir).map_err(create_err)?;
    let dir = output_dir.canonicalize().map_err(create_err)?;
    if !dir.is_dir() {
        return Err(create_err(std::io::Error::new(
            ErrorKind::AlreadyExists,
            "path exists and is not a directory",
        )));
    }
    Ok(dir)
}

/// Writes `bytes` to a hidden temp file in `dir`, then links it into place
/// under a fresh id. The final name only ever appears with complete content;
/// on failure the temp file is removed when dropped.
fn persist(
    dir: &Path,
    bytes: &[u8],
    format: ReportFormat,
) -> Result<(ReportId, PathBuf), RenderError> {
    let write_err = |source| RenderError::Write {
        dir: dir.to_path_buf(),
        source,
    };

    let mut file = tempfile::Builder::new()
        .prefix(".report-")
        .suffix(".partial")
        .tempfile_in(dir)
        .map_err(write_err)?;
    file.write_all(bytes).map_err(write_err)?;
    file.as_file().sync_all().map_err(write_err)?;

    let mut pending: NamedTempFile = file;
    for _ in 0..MAX_NAME_ATTEMPTS {
        let id = ReportId::generate();
        let path = dir.join(format!("{id}.{}", format.extension()));
        match pending.persist_noclobber(&path) {
            Ok(_) => return Ok((id, path)),
            Err(err) if err.error.kind() == ErrorKind::AlreadyExists => {
                debug!(path = %path.display(), "report name taken, retrying");
                pending = err.file;
            }
            Err(err) => return Err(write_err(err.error)),
        }
    }
    Err(write_err(std::io::Error::new(
        ErrorKind::AlreadyExists,
        "could not find a free report name",
    )))
}
