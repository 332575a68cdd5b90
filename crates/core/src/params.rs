//! Per-kind job parameters and their validation.
//!
//! Parameters arrive as loose text fields (multipart form values) and are
//! parsed into a typed [`JobParams`] before any job record is created.

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::error::CoreError;
use crate::job::JobKind;

/// Default share of the usable page width given to the invoice.
pub const DEFAULT_INV_RATIO: f64 = 0.75;

/// Default listing category for harvest jobs (tender plans).
pub const DEFAULT_HARVEST_CATEGORY: &str = "002001009";

/// Default number of listing records fetched per page.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Upper bound for the harvest page size.
pub const MAX_PAGE_SIZE: u32 = 1000;

/// Default harvest window when no dates are given.
pub const DEFAULT_WINDOW_DAYS: i64 = 30;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Typed parameters for one job.
#[derive(Debug, Clone, PartialEq)]
pub enum JobParams {
    Merge(MergeParams),
    Extract,
    Harvest(HarvestParams),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergeParams {
    /// Fraction of the usable width reserved for the invoice page.
    pub inv_ratio: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HarvestParams {
    /// Listing category code.
    pub category: String,
    pub page_size: u32,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub format: OutputFormat,
}

/// File format of a harvest artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Csv,
    Json,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Json => "json",
        }
    }
}

/// Server-side defaults applied when a field is omitted.
#[derive(Debug, Clone)]
pub struct ParamDefaults {
    pub inv_ratio: f64,
}

impl Default for ParamDefaults {
    fn default() -> Self {
        Self {
            inv_ratio: DEFAULT_INV_RATIO,
        }
    }
}

impl JobParams {
    /// Parse the raw form fields for `kind`.
    ///
    /// Blank values count as absent.
    pub fn parse(
        kind: JobKind,
        fields: &HashMap<String, String>,
        defaults: &ParamDefaults,
    ) -> Result<Self, CoreError> {
        let field = |name: &str| {
            fields
                .get(name)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
        };

        match kind {
            JobKind::Merge => {
                let inv_ratio = match field("inv_ratio") {
                    Some(raw) => parse_ratio(raw)?,
                    None => defaults.inv_ratio,
                };
                Ok(JobParams::Merge(MergeParams { inv_ratio }))
            }
            JobKind::Extract => Ok(JobParams::Extract),
            JobKind::Harvest => {
                let category = field("category")
                    .unwrap_or(DEFAULT_HARVEST_CATEGORY)
                    .to_string();

                let page_size = match field("page_size") {
                    Some(raw) => raw.parse::<u32>().map_err(|_| {
                        CoreError::Validation(format!("page_size must be an integer, got '{raw}'"))
                    })?,
                    None => DEFAULT_PAGE_SIZE,
                };
                if page_size == 0 || page_size > MAX_PAGE_SIZE {
                    return Err(CoreError::Validation(format!(
                        "page_size must be between 1 and {MAX_PAGE_SIZE}, got {page_size}"
                    )));
                }

                let today = chrono::Local::now().date_naive();
                let end = match field("end") {
                    Some(raw) => parse_date("end", raw)?,
                    None => today,
                };
                let start = match field("start") {
                    Some(raw) => parse_date("start", raw)?,
                    None => end - chrono::Duration::days(DEFAULT_WINDOW_DAYS),
                };
                if start > end {
                    return Err(CoreError::Validation(format!(
                        "start ({start}) must not be after end ({end})"
                    )));
                }

                let format = match field("format") {
                    None | Some("csv") => OutputFormat::Csv,
                    Some("json") => OutputFormat::Json,
                    Some(other) => {
                        return Err(CoreError::Validation(format!(
                            "format must be 'csv' or 'json', got '{other}'"
                        )))
                    }
                };

                Ok(JobParams::Harvest(HarvestParams {
                    category,
                    page_size,
                    start,
                    end,
                    format,
                }))
            }
        }
    }

    pub fn kind(&self) -> JobKind {
        match self {
            JobParams::Merge(_) => JobKind::Merge,
            JobParams::Extract => JobKind::Extract,
            JobParams::Harvest(_) => JobKind::Harvest,
        }
    }
}

/// Parse a merge ratio. Only non-numeric and non-finite values are rejected;
/// values outside `(0, 1)` pass through unclamped and are merely logged.
fn parse_ratio(raw: &str) -> Result<f64, CoreError> {
    let ratio: f64 = raw
        .parse()
        .map_err(|_| CoreError::Validation(format!("inv_ratio must be a number, got '{raw}'")))?;
    if !ratio.is_finite() {
        return Err(CoreError::Validation(format!(
            "inv_ratio must be finite, got '{raw}'"
        )));
    }
    if ratio <= 0.0 || ratio >= 1.0 {
        tracing::warn!(inv_ratio = ratio, "inv_ratio outside (0, 1), using as-is");
    }
    Ok(ratio)
}

fn parse_date(name: &str, raw: &str) -> Result<NaiveDate, CoreError> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|_| {
        CoreError::Validation(format!("{name} must be a YYYY-MM-DD date, got '{raw}'"))
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
