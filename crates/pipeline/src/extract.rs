//! Extract job: pull invoice number and issue date out of every PDF in the
//! workspace into a tab-separated text file.
//!
//! Text comes from the PDF's own text layer; scanned invoices without one
//! yield empty columns rather than an error.

use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use docdesk_core::body::{JobBody, JobContext, JobError, JobOutput};
use docdesk_core::job::JobKind;
use docdesk_core::progress::ProgressSink;
use regex::Regex;

use crate::scan::{collect_files, extension_lower, file_name};

/// Header line of the result file.
pub const RESULT_HEADER: &str = "文件名\t发票号码\t开票日期";

static INVOICE_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"发票号码[:：]?\s*([0-9]{8,})").expect("valid regex"));
static ISSUE_DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"开票日期[:：]?\s*([0-9]{4}年[0-9]{2}月[0-9]{2}日)").expect("valid regex")
});

/// Fields found on one invoice. Missing fields are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvoiceFields {
    pub number: String,
    pub date: String,
}

/// Find the invoice fields in a page's text.
///
/// Spaces and newlines are removed first, since PDF text layers often split
/// labels and values across runs.
pub fn parse_invoice_text(text: &str) -> InvoiceFields {
    let compact: String = text.chars().filter(|c| *c != ' ' && *c != '\n').collect();
    let capture = |re: &Regex| {
        re.captures(&compact)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default()
    };
    InvoiceFields {
        number: capture(&INVOICE_NUMBER_RE),
        date: capture(&ISSUE_DATE_RE),
    }
}

/// Source of a PDF's text.
pub trait TextSource: Send + Sync {
    fn text(&self, pdf: &Path) -> Result<String, JobError>;
}

/// Reads the text layer with `lopdf`.
#[derive(Debug, Default)]
pub struct PdfTextLayer;

impl TextSource for PdfTextLayer {
    fn text(&self, pdf: &Path) -> Result<String, JobError> {
        let name = file_name(pdf);
        let doc = lopdf::Document::load(pdf)
            .map_err(|e| JobError::Failed(format!("Cannot open PDF {name}: {e}")))?;
        let pages: Vec<u32> = doc.get_pages().keys().copied().collect();
        doc.extract_text(&pages)
            .map_err(|e| JobError::Failed(format!("Cannot read text of {name}: {e}")))
    }
}

/// Job body for [`JobKind::Extract`].
pub struct ExtractBody {
    text: Arc<dyn TextSource>,
}

impl ExtractBody {
    pub fn new() -> Self {
        Self::with_text_source(Arc::new(PdfTextLayer))
    }

    pub fn with_text_source(text: Arc<dyn TextSource>) -> Self {
        Self { text }
    }
}

impl Default for ExtractBody {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobBody for ExtractBody {
    fn kind(&self) -> JobKind {
        JobKind::Extract
    }

    async fn run(&self, ctx: JobContext) -> Result<JobOutput, JobError> {
        let output = ctx.artifact_dir.join(format!(
            "invoice_{}.txt",
            chrono::Local::now().format("%Y%m%d_%H%M%S")
        ));
        let work_dir = ctx.work_dir;
        let progress = ctx.progress;
        let text = Arc::clone(&self.text);

        tokio::task::spawn_blocking(move || {
            extract_dir(&work_dir, &output, text.as_ref(), &progress)
        })
        .await?
    }
}

/// Blocking extraction over every PDF below `src`, written to `output`.
pub fn extract_dir(
    src: &Path,
    output: &Path,
    text: &dyn TextSource,
    progress: &ProgressSink,
) -> Result<JobOutput, JobError> {
    let mut pdfs: Vec<PathBuf> = collect_files(src)?
        .into_iter()
        .filter(|p| extension_lower(p).as_deref() == Some("pdf"))
        .collect();
    pdfs.sort_by_key(|p| file_name(p));

    tracing::info!(job_id = %progress.job_id(), pdfs = pdfs.len(), "Extracting invoice fields");

    let mut lines = vec![RESULT_HEADER.to_string()];
    let total = pdfs.len();
    for (idx, pdf) in pdfs.iter().enumerate() {
        let fields = parse_invoice_text(&text.text(pdf)?);
        lines.push(format!("{}\t{}\t{}", file_name(pdf), fields.number, fields.date));
        progress.report_step(idx + 1, total);
    }

    let mut body = lines.join("\n");
    body.push('\n');
    std::fs::write(output, body)?;
    progress.report(100);

    Ok(JobOutput {
        artifact: output.to_path_buf(),
        warnings: Vec::new(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
