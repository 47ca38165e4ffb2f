//! Post-run lead processing: deduplication, predicate filtering, and
//! CSV rendering. Pure functions over extracted leads; nothing here
//! touches the browser or the database.

use anyhow::Context;

use crate::models::Lead;

/// Removes duplicates by case-insensitive (name, address), keeping the
/// first occurrence. Leads without a name are dropped outright.
pub fn dedupe_leads(leads: &[Lead]) -> Vec<Lead> {
    let mut seen = std::collections::HashSet::new();
    let mut unique = Vec::new();

    for lead in leads {
        let key = (
            lead.name.trim().to_lowercase(),
            lead.address.trim().to_lowercase(),
        );
        if key.0.is_empty() {
            continue;
        }
        if seen.insert(key) {
            unique.push(lead.clone());
        }
    }
    unique
}

/// Independent optional predicates, combined with logical AND.
/// `Some(true)` requires the field, `Some(false)` requires its absence,
/// `None` ignores it.
#[derive(Debug, Clone, Default)]
pub struct LeadFilter {
    pub has_phone: Option<bool>,
    pub has_website: Option<bool>,
    pub has_email: Option<bool>,
    pub has_whatsapp: Option<bool>,
    pub min_rating: Option<f64>,
}

impl LeadFilter {
    pub fn is_empty(&self) -> bool {
        self.has_phone.is_none()
            && self.has_website.is_none()
            && self.has_email.is_none()
            && self.has_whatsapp.is_none()
            && self.min_rating.is_none()
    }

    fn matches(&self, lead: &Lead) -> bool {
        let presence = |want: Option<bool>, value: &str| match want {
            Some(true) => !value.is_empty(),
            Some(false) => value.is_empty(),
            None => true,
        };
        presence(self.has_phone, &lead.phone)
            && presence(self.has_website, &lead.website)
            && presence(self.has_email, &lead.email)
            && presence(self.has_whatsapp, &lead.whatsapp_link)
            && self
                .min_rating
                .map_or(true, |min| parse_rating(&lead.rating) >= min)
    }
}

pub fn filter_leads(leads: &[Lead], filter: &LeadFilter) -> Vec<Lead> {
    leads
        .iter()
        .filter(|lead| filter.matches(lead))
        .cloned()
        .collect()
}

/// Parses a locale-formatted rating string, accepting both "." and ","
/// as the decimal separator. Unparseable values read as 0 so they fall
/// below any positive minimum.
pub fn parse_rating(raw: &str) -> f64 {
    raw.trim().replace(',', ".").parse::<f64>().unwrap_or(0.0)
}

const CSV_HEADERS: &[&str] = &[
    "Business Name",
    "Address",
    "Phone",
    "WhatsApp Link",
    "Website",
    "Email",
    "Google Maps Link",
    "Rating",
    "Reviews",
];

/// Renders leads as CSV with a header row. The "Search Query" column is
/// appended only when at least one lead carries an origin query.
pub fn leads_to_csv(leads: &[Lead]) -> anyhow::Result<String> {
    let with_query = leads.iter().any(|lead| lead.search_query.is_some());
    let mut writer = csv::Writer::from_writer(Vec::new());

    let mut headers: Vec<&str> = CSV_HEADERS.to_vec();
    if with_query {
        headers.push("Search Query");
    }
    writer.write_record(&headers)?;

    for lead in leads {
        let mut record = vec![
            lead.name.as_str(),
            lead.address.as_str(),
            lead.phone.as_str(),
            lead.whatsapp_link.as_str(),
            lead.website.as_str(),
            lead.email.as_str(),
            lead.maps_link.as_str(),
            lead.rating.as_str(),
            lead.reviews.as_str(),
        ];
        if with_query {
            record.push(lead.search_query.as_deref().unwrap_or(""));
        }
        writer.write_record(&record)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("flushing csv writer: {e}"))?;
    String::from_utf8(bytes).context("csv output was not valid utf-8")
}
