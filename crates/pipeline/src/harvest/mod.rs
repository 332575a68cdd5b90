//! Harvest job: page through the public-resource listing search for one
//! category and date window, map each record, and write CSV or JSON.
//!
//! Harvest takes no uploads. Its workspace only holds the artifact until it
//! is downloaded.

pub mod client;
pub mod output;
pub mod processors;
pub mod query;

use std::time::Duration;

use async_trait::async_trait;
use docdesk_core::body::{JobBody, JobContext, JobError, JobOutput};
use docdesk_core::error::CoreError;
use docdesk_core::job::JobKind;
use docdesk_core::params::JobParams;

use self::client::{HarvestError, SearchClient};
use self::processors::ListingRow;
use self::query::{page_count, SearchQuery};

/// Default search endpoint.
pub const DEFAULT_ENDPOINT: &str =
    "https://ggzyjy.sc.gov.cn/inteligentsearch/rest/esinteligentsearch/getFullTextDataNew";

/// Default origin for relative listing links.
pub const DEFAULT_LINK_BASE: &str = "https://ggzyjy.sc.gov.cn";

/// Default pause between page requests.
pub const DEFAULT_PAGE_DELAY: Duration = Duration::from_millis(400);

/// Where and how politely to harvest.
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    pub endpoint: String,
    pub link_base: String,
    pub page_delay: Duration,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            link_base: DEFAULT_LINK_BASE.to_string(),
            page_delay: DEFAULT_PAGE_DELAY,
        }
    }
}

/// Job body for [`JobKind::Harvest`].
pub struct HarvestBody {
    config: HarvestConfig,
    client: SearchClient,
}

impl HarvestBody {
    pub fn new(config: HarvestConfig) -> Result<Self, HarvestError> {
        let client = SearchClient::new(config.endpoint.clone(), &config.link_base)?;
        Ok(Self { config, client })
    }

    /// Replace the HTTP client, e.g. to shorten retry delays.
    pub fn with_client(mut self, client: SearchClient) -> Self {
        self.client = client;
        self
    }
}

#[async_trait]
impl JobBody for HarvestBody {
    fn kind(&self) -> JobKind {
        JobKind::Harvest
    }

    fn validate(&self, params: &JobParams) -> Result<(), CoreError> {
        let JobParams::Harvest(params) = params else {
            return Ok(());
        };
        if processors::lookup(&params.category).is_none() {
            return Err(CoreError::Validation(format!(
                "unknown category '{}', available: {}",
                params.category,
                processors::categories().join(", ")
            )));
        }
        Ok(())
    }

    async fn run(&self, ctx: JobContext) -> Result<JobOutput, JobError> {
        let JobParams::Harvest(params) = ctx.params else {
            return Err(JobError::WrongParams {
                kind: JobKind::Harvest,
            });
        };
        let processor = processors::lookup(&params.category).ok_or_else(|| {
            JobError::Failed(format!("unknown category '{}'", params.category))
        })?;
        let query = SearchQuery::new(params.category.clone(), params.start, params.end);
        let job_id = ctx.progress.job_id().clone();

        let total = self
            .client
            .post_json(&query.probe())
            .await
            .map_err(harvest_failed)?
            .total();
        let pages = page_count(total, params.page_size);
        tracing::info!(
            job_id = %job_id,
            category = processor.category(),
            label = processor.label(),
            total,
            pages,
            "Harvesting listings"
        );

        let mut rows: Vec<ListingRow> = Vec::new();
        for page in 0..pages {
            if page > 0 && !self.config.page_delay.is_zero() {
                tokio::time::sleep(self.config.page_delay).await;
            }
            let pn = page * u64::from(params.page_size);
            let records = self
                .client
                .post_json(&query.payload(pn, params.page_size))
                .await
                .map_err(harvest_failed)?
                .into_records();
            tracing::debug!(
                job_id = %job_id,
                page = page + 1,
                pages,
                fetched = records.len(),
                "Page fetched"
            );
            rows.extend(
                records
                    .iter()
                    .map(|record| processor.process(record, &self.config.link_base)),
            );
            ctx.progress.report_step(page as usize + 1, pages as usize);
        }

        let artifact = ctx.artifact_dir.join(format!(
            "{}_{}.{}",
            params.category,
            chrono::Local::now().format("%Y%m%d_%H%M%S"),
            params.format.extension()
        ));
        let path = artifact.clone();
        let format = params.format;
        tokio::task::spawn_blocking(move || output::write_rows(&path, &rows, format)).await??;
        ctx.progress.report(100);

        Ok(JobOutput {
            artifact,
            warnings: Vec::new(),
        })
    }
}

fn harvest_failed(err: HarvestError) -> JobError {
    JobError::Failed(err.to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
