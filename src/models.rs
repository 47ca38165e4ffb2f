use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One extracted business record.
///
/// Every field is raw text as seen on the page; an empty string means the
/// field could not be extracted. `whatsapp_link` is the only derived field
/// (computed from `phone`, never scraped).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Lead {
    pub name: String,
    pub address: String,
    pub phone: String,
    pub whatsapp_link: String,
    pub website: String,
    pub email: String,
    /// Canonical URL of the detail view at extraction time.
    pub maps_link: String,
    /// Locale-formatted numeric string, e.g. "4.5" or "4,5".
    pub rating: String,
    /// May carry a descriptive label, e.g. "1,234 reviews".
    pub reviews: String,
    /// Set only when the lead came from a bulk run; records which
    /// (keyword, city, country) triple produced it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_query: Option<String>,
}

impl Lead {
    pub fn has_name(&self) -> bool {
        !self.name.trim().is_empty()
    }
}

/// A (keyword, city, country) triple identifying one search.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SearchQuery {
    pub keyword: String,
    pub city: String,
    pub country: String,
}

impl SearchQuery {
    pub fn new(keyword: impl Into<String>, city: impl Into<String>, country: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            city: city.into(),
            country: country.into(),
        }
    }

    /// Canonical human-readable form, also used as the origin tag on
    /// bulk-run leads and as the query text in the Maps search URL.
    pub fn label(&self) -> String {
        format!("{} in {}, {}", self.keyword, self.city, self.country)
    }
}

/// One row of the search history listing (no lead payload).
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SearchSummary {
    pub id: i32,
    pub keyword: String,
    pub city: String,
    pub country: String,
    pub leads_count: i32,
    /// "YYYY-MM-DD HH:MM"
    pub created_at: String,
}

/// A fully loaded history record, leads included.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SearchRecord {
    pub id: i32,
    pub keyword: String,
    pub city: String,
    pub country: String,
    pub leads_count: i32,
    pub leads: Vec<Lead>,
    pub created_at: String,
}

pub(crate) fn format_created_at(ts: NaiveDateTime) -> String {
    ts.format("%Y-%m-%d %H:%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_label_joins_parts() {
        let q = SearchQuery::new("Bakery", "Leeds", "UK");
        assert_eq!(q.label(), "Bakery in Leeds, UK");
    }

    #[test]
    fn lead_with_blank_name_has_no_name() {
        let lead = Lead {
            name: "   ".into(),
            phone: "123".into(),
            ..Lead::default()
        };
        assert!(!lead.has_name());
    }
}
