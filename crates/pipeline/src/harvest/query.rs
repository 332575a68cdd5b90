//! Request payloads for the full-text listing search.

use chrono::NaiveDate;
use serde_json::{json, Value};

/// Search window and category for one harvest run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub category: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl SearchQuery {
    pub fn new(category: impl Into<String>, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            category: category.into(),
            start,
            end,
        }
    }

    /// Payload for the page starting at record offset `pn`, `rn` records long.
    ///
    /// The window covers whole days: `start 00:00:00` through `end 23:59:59`.
    pub fn payload(&self, pn: u64, rn: u32) -> Value {
        json!({
            "token": "",
            "pn": pn,
            "rn": rn,
            "sdt": "",
            "edt": "",
            "wd": "",
            "inc_wd": "",
            "exc_wd": "",
            "fields": "",
            "cnum": "",
            "sort": "{\"webdate\":\"0\"}",
            "ssort": "",
            "cl": 10000,
            "terminal": "",
            "condition": [{
                "fieldName": "categorynum",
                "equal": self.category,
                "notEqual": null,
                "equalList": null,
                "notEqualList": null,
                "isLike": true,
                "likeType": 2,
            }],
            "time": [{
                "fieldName": "webdate",
                "startTime": format!("{} 00:00:00", self.start.format("%Y-%m-%d")),
                "endTime": format!("{} 23:59:59", self.end.format("%Y-%m-%d")),
            }],
            "highlights": "",
            "statistics": null,
            "unionCondition": null,
            "accuracy": "",
            "noParticiple": "1",
            "searchRange": null,
            "noWd": true,
        })
    }

    /// Single-record request used to learn the total count.
    pub fn probe(&self) -> Value {
        self.payload(0, 1)
    }
}

/// Number of pages of `page_size` needed for `total` records.
pub fn page_count(total: u64, page_size: u32) -> u64 {
    if page_size == 0 {
        return 0;
    }
    total.div_ceil(u64::from(page_size))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query() -> SearchQuery {
        SearchQuery::new(
            "002001009",
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 1, 31).unwrap(),
        )
    }

    #[test]
    fn payload_carries_category_window_and_paging() {
        let body = query().payload(200, 100);

        assert_eq!(body["pn"], 200);
        assert_eq!(body["rn"], 100);
        assert_eq!(body["condition"][0]["equal"], "002001009");
        assert_eq!(body["time"][0]["startTime"], "2025-01-01 00:00:00");
        assert_eq!(body["time"][0]["endTime"], "2025-01-31 23:59:59");
        assert_eq!(body["noWd"], true);
    }

    #[test]
    fn probe_asks_for_one_record() {
        let body = query().probe();
        assert_eq!(body["pn"], 0);
        assert_eq!(body["rn"], 1);
    }

    #[test]
    fn page_count_rounds_up() {
        assert_eq!(page_count(0, 100), 0);
        assert_eq!(page_count(1, 100), 1);
        assert_eq!(page_count(100, 100), 1);
        assert_eq!(page_count(250, 100), 3);
    }
}
