//! Merge job: pair invoice PDFs with screenshots and lay each pair out on
//! one landscape page.
//!
//! Files are paired by key, the file name up to its first `.`, so
//! `A123.pdf` pairs with `A123.jpg` and `A123.receipt.png`. Files left
//! without a partner are reported as warnings, which makes the job
//! `partial`.

pub mod compose;
pub mod layout;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use docdesk_core::body::{JobBody, JobContext, JobError, JobOutput};
use docdesk_core::job::JobKind;
use docdesk_core::params::JobParams;
use docdesk_core::progress::ProgressSink;

use self::compose::PdfComposer;
use crate::scan::{collect_files, extension_lower, file_name};

/// Extensions considered screenshots.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// One invoice + screenshot pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Pair {
    pub key: String,
    pub invoice: PathBuf,
    pub screenshot: PathBuf,
}

/// Outcome of pairing a workspace's files.
#[derive(Debug, Default, PartialEq)]
pub struct Pairing {
    /// Sorted by key, descending.
    pub pairs: Vec<Pair>,
    /// File names that found no partner, in key order.
    pub unpaired: Vec<String>,
}

#[derive(Default)]
struct Slot {
    pdf: Option<PathBuf>,
    image: Option<PathBuf>,
}

/// Group the given files into pairs. Files with other extensions are
/// ignored; a later file with the same key and role replaces an earlier one.
pub fn pair_files(files: &[PathBuf]) -> Pairing {
    let mut registry: BTreeMap<String, Slot> = BTreeMap::new();

    for path in files {
        let Some(ext) = extension_lower(path) else {
            continue;
        };
        let is_pdf = ext == "pdf";
        if !is_pdf && !IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            continue;
        }
        let name = file_name(path);
        let key = name.split('.').next().unwrap_or_default().to_string();

        let slot = registry.entry(key).or_default();
        if is_pdf {
            slot.pdf = Some(path.clone());
        } else {
            slot.image = Some(path.clone());
        }
    }

    let mut pairing = Pairing::default();
    for (key, slot) in registry {
        match (slot.pdf, slot.image) {
            (Some(invoice), Some(screenshot)) => pairing.pairs.push(Pair {
                key,
                invoice,
                screenshot,
            }),
            (pdf, image) => pairing
                .unpaired
                .extend(pdf.into_iter().chain(image).map(|p| file_name(&p))),
        }
    }
    pairing.pairs.sort_by(|a, b| b.key.cmp(&a.key));
    pairing
}

/// Job body for [`JobKind::Merge`].
#[derive(Debug, Default)]
pub struct MergeBody;

impl MergeBody {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl JobBody for MergeBody {
    fn kind(&self) -> JobKind {
        JobKind::Merge
    }

    async fn run(&self, ctx: JobContext) -> Result<JobOutput, JobError> {
        let JobParams::Merge(params) = ctx.params else {
            return Err(JobError::WrongParams {
                kind: JobKind::Merge,
            });
        };

        let output = ctx.artifact_dir.join(format!(
            "result_{}_{}.pdf",
            chrono::Local::now().format("%Y%m%d_%H%M%S"),
            ctx.id.short()
        ));
        let work_dir = ctx.work_dir;
        let progress = ctx.progress;

        tokio::task::spawn_blocking(move || {
            merge_dir(&work_dir, &output, params.inv_ratio, &progress)
        })
        .await?
    }
}

/// Blocking merge of every pair found under `src` into `output`.
pub fn merge_dir(
    src: &Path,
    output: &Path,
    inv_ratio: f64,
    progress: &ProgressSink,
) -> Result<JobOutput, JobError> {
    if !src.is_dir() {
        return Err(JobError::Failed(format!(
            "source directory does not exist: {}",
            src.display()
        )));
    }

    let files = collect_files(src)?;
    let Pairing { pairs, unpaired } = pair_files(&files);
    if pairs.is_empty() {
        return Err(JobError::Failed(
            "no complete PDF + image pair found".to_string(),
        ));
    }

    tracing::info!(
        job_id = %progress.job_id(),
        pairs = pairs.len(),
        unpaired = unpaired.len(),
        "Merging invoice pairs",
    );

    let mut composer = PdfComposer::new();
    let total = pairs.len();
    for (idx, pair) in pairs.iter().enumerate() {
        composer.add_pair(&pair.invoice, &pair.screenshot, inv_ratio)?;
        progress.report_step(idx + 1, total);
    }
    composer.save(output)?;
    progress.report(100);

    Ok(JobOutput {
        artifact: output.to_path_buf(),
        warnings: unpaired,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
