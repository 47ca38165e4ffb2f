//! Field extraction from an open detail view.
//!
//! Every field either resolves or stays empty; nothing here returns an
//! error or blocks beyond the session's own lookups. Selector chains are
//! tried in order, first non-empty value wins, then phone and email fall
//! back to regex over the page's visible text. Email is regex-only: no
//! per-field markup has held still long enough to be worth a selector.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::Lead;
use crate::selectors;
use crate::session::PageSession;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}").unwrap());

static PHONE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\+?[\d][\d\s\-().]{8,}\d").unwrap());

/// First email address appearing anywhere in `text`.
pub fn first_email(text: &str) -> Option<String> {
    EMAIL_RE.find(text).map(|m| m.as_str().to_string())
}

/// First phone-shaped run of digits/separators in `text`.
pub fn first_phone(text: &str) -> Option<String> {
    PHONE_RE.find(text).map(|m| m.as_str().trim().to_string())
}

/// Derives the messaging link from a raw phone string: strip everything
/// but digits and '+', or empty when nothing remains.
pub fn whatsapp_link(phone: &str) -> String {
    let clean: String = phone
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '+')
        .collect();
    if clean.is_empty() {
        String::new()
    } else {
        format!("https://wa.me/{clean}")
    }
}

/// True when the URL points back at the mapping service itself. Those
/// are "open in maps" utility links, not the business's own site.
pub fn is_maps_internal(url: &str) -> bool {
    let host = url
        .split("://")
        .nth(1)
        .unwrap_or(url)
        .split('/')
        .next()
        .unwrap_or("");
    let host = host.split('@').last().unwrap_or(host);
    let host = host.split(':').next().unwrap_or(host);
    host.eq_ignore_ascii_case("google.com")
        || host.to_ascii_lowercase().ends_with(".google.com")
}

/// Strips an accessibility-label prefix like "Address: " when the value
/// came from `aria-label` rather than element text.
fn strip_label(value: &str, label: &str) -> String {
    value.trim().trim_start_matches(label).trim().to_string()
}

fn nonempty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// First selector in `chain` whose element text is non-empty.
fn text_chain(session: &dyn PageSession, chain: &[&str]) -> Option<String> {
    chain.iter().find_map(|&css| nonempty(session.text(css)))
}

/// Like [`text_chain`] but falls back to the element's `aria-label`
/// when its text is empty (Maps renders some fields label-only).
fn text_or_aria_chain(session: &dyn PageSession, chain: &[&str]) -> Option<String> {
    chain.iter().find_map(|&css| {
        nonempty(session.text(css)).or_else(|| nonempty(session.attr(css, "aria-label")))
    })
}

/// Extracts a [`Lead`] from the currently displayed detail view.
pub fn extract_lead(session: &dyn PageSession) -> Lead {
    let mut lead = Lead {
        maps_link: session.current_url(),
        ..Lead::default()
    };

    if let Some(name) = text_chain(session, selectors::NAME) {
        lead.name = name;
    }

    if let Some(address) = text_or_aria_chain(session, selectors::ADDRESS) {
        lead.address = strip_label(&address, "Address: ");
    }

    if let Some(phone) = text_or_aria_chain(session, selectors::PHONE) {
        lead.phone = strip_label(&phone, "Phone: ");
    }

    if let Some(website) = selectors::WEBSITE.iter().find_map(|&css| {
        // A rejected maps-internal link does not end the chain; a later
        // strategy may still surface the business's real site.
        nonempty(session.attr(css, "href")).filter(|href| !is_maps_internal(href))
    }) {
        lead.website = website;
    }

    let body = session.body_text();
    if !body.is_empty() {
        if lead.phone.is_empty() {
            if let Some(phone) = first_phone(&body) {
                lead.phone = phone;
            }
        }
        if let Some(email) = first_email(&body) {
            lead.email = email;
        }
    }
    lead.whatsapp_link = whatsapp_link(&lead.phone);

    if let Some(rating) = nonempty(session.text(selectors::RATING)) {
        lead.rating = rating;
    }
    if let Some(reviews) = nonempty(session.attr(selectors::REVIEWS, "aria-label")) {
        lead.reviews = reviews;
    }

    lead
}
