use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

pub const DEFAULT_CATEGORIES: &[&str] = &["GitHub Trending", "Open Source"];
pub const DEFAULT_TAGS: &[&str] = &["GitHub", "Trending", "Open Source", "Daily Pick", "Automated"];

/// One entry of the trending listing.
///
/// The URL is the identity: two items with the same URL are the same
/// repository, whatever their name or description say.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateItem {
    pub name: String,
    pub url: String,
    pub desc: String,
    /// Popularity indicator exactly as the listing renders it (`"12,345"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stars: Option<String>,
    /// Day the item was discovered on the listing.
    #[serde(with = "iso_date")]
    pub date: Date,
}

impl CandidateItem {
    pub fn identity(&self) -> &str {
        &self.url
    }
}

/// Output of the generator stage, input of the publisher stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostRecord {
    pub title: String,
    /// HTML markup of the article body.
    pub content: String,
    #[serde(rename = "repo_info")]
    pub source: CandidateItem,
    #[serde(default = "default_categories")]
    pub categories: Vec<String>,
    #[serde(default = "default_tags")]
    pub tags: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub generated_at: OffsetDateTime,
}

pub fn default_categories() -> Vec<String> {
    DEFAULT_CATEGORIES.iter().map(|s| (*s).to_owned()).collect()
}

pub fn default_tags() -> Vec<String> {
    DEFAULT_TAGS.iter().map(|s| (*s).to_owned()).collect()
}

pub fn today_utc() -> Date {
    OffsetDateTime::now_utc().date()
}

pub fn format_date(date: Date) -> String {
    format!(
        "{}-{:02}-{:02}",
        date.year(),
        date.month() as u8,
        date.day()
    )
}

#[cfg(test)]
mod tests {
    use time::macros::{date, datetime};

    use super::*;

    #[test]
    fn candidate_uses_plain_iso_date() {
        let item = CandidateItem {
            name: "octo/tool".into(),
            url: "https://github.com/octo/tool".into(),
            desc: "A tool".into(),
            stars: None,
            date: date!(2024 - 03 - 01),
        };

        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["date"], "2024-03-01");
        assert!(json.get("stars").is_none());

        let back: CandidateItem = serde_json::from_value(json).unwrap();
        assert_eq!(back, item);
    }

    #[test]
    fn post_record_defaults_classification_when_absent() {
        let json = serde_json::json!({
            "title": "Hello",
            "content": "<p>body</p>",
            "repo_info": {
                "name": "octo/tool",
                "url": "https://github.com/octo/tool",
                "desc": "A tool",
                "stars": "1,024",
                "date": "2024-03-01"
            },
            "generated_at": "2024-03-01T09:30:00+08:00"
        });

        let record: PostRecord = serde_json::from_value(json).unwrap();
        assert_eq!(record.categories, default_categories());
        assert_eq!(record.tags, default_tags());
        assert_eq!(record.source.stars.as_deref(), Some("1,024"));
        assert_eq!(record.generated_at, datetime!(2024-03-01 09:30 +8));
    }

    #[test]
    fn format_date_pads() {
        assert_eq!(format_date(date!(2024 - 03 - 01)), "2024-03-01");
        assert_eq!(format_date(date!(2031 - 12 - 25)), "2031-12-25");
    }
}
