//! Per-category mapping from raw listing records to output rows.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::Value;

static BR_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<br\s*/?>").expect("valid regex"));
static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Column headers of the CSV output, in order. The first column is the
/// 1-based row number.
pub const CSV_FIELDS: [&str; 8] = [
    "序号",
    "项目名称",
    "项目所在地",
    "网页链接",
    "公示时间",
    "内容",
    "设计统计",
    "施工统计",
];

/// One harvested listing, ready for output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ListingRow {
    #[serde(rename = "项目名称")]
    pub title: String,
    #[serde(rename = "项目所在地")]
    pub location: String,
    #[serde(rename = "网页链接")]
    pub link: String,
    #[serde(rename = "公示时间")]
    pub published: String,
    #[serde(rename = "内容")]
    pub content: String,
    #[serde(rename = "设计统计")]
    pub design_mentions: usize,
    #[serde(rename = "施工统计")]
    pub construction_mentions: usize,
}

impl ListingRow {
    /// Cells in [`CSV_FIELDS`] order, numbered `index`.
    pub fn csv_cells(&self, index: usize) -> [String; 8] {
        [
            index.to_string(),
            self.title.clone(),
            self.location.clone(),
            self.link.clone(),
            self.published.clone(),
            self.content.clone(),
            self.design_mentions.to_string(),
            self.construction_mentions.to_string(),
        ]
    }
}

/// Maps listing records of one category.
pub trait ListingProcessor: Send + Sync {
    /// Category code this processor handles.
    fn category(&self) -> &'static str;

    /// Human-readable category name.
    fn label(&self) -> &'static str;

    /// Map one search record. `link_base` is prepended to relative links.
    fn process(&self, record: &Value, link_base: &str) -> ListingRow;
}

/// Tender plans (招标计划).
#[derive(Debug, Default)]
pub struct TenderPlanProcessor;

impl ListingProcessor for TenderPlanProcessor {
    fn category(&self) -> &'static str {
        "002001009"
    }

    fn label(&self) -> &'static str {
        "招标计划"
    }

    fn process(&self, record: &Value, link_base: &str) -> ListingRow {
        let content = clean_html_breaks(&text_field(record, "content"));
        ListingRow {
            title: text_field(record, "titlenew"),
            location: text_field(record, "zhuanzai"),
            link: absolute_link(&text_field(record, "linkurl"), link_base),
            published: text_field(record, "infodate"),
            design_mentions: content.matches("设计").count(),
            construction_mentions: content.matches("施工").count(),
            content,
        }
    }
}

static TENDER_PLAN: TenderPlanProcessor = TenderPlanProcessor;
static REGISTRY: [&dyn ListingProcessor; 1] = [&TENDER_PLAN];

/// Processor registered for `category`.
pub fn lookup(category: &str) -> Option<&'static dyn ListingProcessor> {
    REGISTRY.iter().copied().find(|p| p.category() == category)
}

/// Every registered category code.
pub fn categories() -> Vec<&'static str> {
    REGISTRY.iter().map(|p| p.category()).collect()
}

/// Trimmed string value of `key`, empty when missing or not a string.
fn text_field(record: &Value, key: &str) -> String {
    record
        .get(key)
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

/// Replace `<br>` tags with a full-width comma and collapse whitespace.
pub fn clean_html_breaks(text: &str) -> String {
    let replaced = BR_TAG_RE.replace_all(text, "，");
    WHITESPACE_RE.replace_all(&replaced, " ").trim().to_string()
}

/// Make a site-relative link absolute against `base`.
pub fn absolute_link(link: &str, base: &str) -> String {
    if link.is_empty() || link.starts_with("http") {
        return link.to_string();
    }
    let base = base.trim_end_matches('/');
    if link.starts_with('/') {
        format!("{base}{link}")
    } else {
        format!("{base}/{link}")
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    const BASE: &str = "https://example.test";

    #[test]
    fn tender_plan_maps_and_counts() {
        let record = json!({
            "titlenew": "  某某道路工程  ",
            "zhuanzai": "成都市",
            "linkurl": "/jyxx/002001/abc.html",
            "infodate": "2025-03-01",
            "content": "设计<br>施工<BR/>  设计   施工\n总包",
        });

        let row = TenderPlanProcessor.process(&record, BASE);

        assert_eq!(row.title, "某某道路工程");
        assert_eq!(row.location, "成都市");
        assert_eq!(row.link, "https://example.test/jyxx/002001/abc.html");
        assert_eq!(row.published, "2025-03-01");
        assert_eq!(row.content, "设计，施工， 设计 施工 总包");
        assert_eq!(row.design_mentions, 2);
        assert_eq!(row.construction_mentions, 2);
    }

    #[test]
    fn missing_fields_become_empty() {
        let row = TenderPlanProcessor.process(&json!({"titlenew": null}), BASE);
        assert_eq!(row, ListingRow::default());
    }

    #[test]
    fn absolute_links_are_kept_and_relative_ones_joined() {
        assert_eq!(absolute_link("https://a/b", BASE), "https://a/b");
        assert_eq!(
            absolute_link("x/y.html", "https://example.test/"),
            "https://example.test/x/y.html"
        );
        assert_eq!(absolute_link("", BASE), "");
    }

    #[test]
    fn registry_knows_tender_plans_only() {
        assert!(lookup("002001009").is_some());
        assert!(lookup("999").is_none());
        assert_eq!(categories(), vec!["002001009"]);
    }
}
