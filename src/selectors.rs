//! CSS selectors for the Google Maps result page.
//!
//! Maps renders the same semantic field with different markup depending
//! on locale and experiment bucket, so most fields carry an ordered
//! fallback chain: earlier entries are the variants observed most often,
//! later ones the generic catch-alls. First non-empty match wins.
//!
//! When extraction starts coming back empty, this file is the place to
//! update; the orchestration and extraction logic never hard-code a
//! selector.

/// Root of a Maps text search; the percent-encoded query is appended.
pub const MAPS_SEARCH_ROOT: &str = "https://www.google.com/maps/search/";

/// The scrollable results panel, in lookup order. `role=feed` is the
/// stable accessibility handle; the class chains are older variants.
pub const RESULT_CONTAINERS: &[&str] = &[
    "div[role='feed']",
    "div.m6QErb.DxyBCb.kA9KIf.dS8AEf",
    "div.m6QErb",
];

/// One result card inside the panel.
pub const RESULT_CARD: &str = "div.Nv2PK";

/// The card's anchor; carries the business name in `aria-label` and
/// opens the detail view on click.
pub const CARD_LINK: &str = "a.hfpxzc";

/// Dedicated control for returning from a detail view to the list.
pub const BACK_BUTTON: &str = "button[aria-label='Back']";

/// Affirmative words scanned (case-insensitively) across visible button
/// text to dismiss the consent interstitial.
pub const CONSENT_WORDS: &[&str] = &["accept all", "i agree", "accept", "agree"];

pub const NAME: &[&str] = &[
    "h1.DUwDvf",
    "h1.fontHeadlineLarge",
    "div.lMbq3e h1",
    "h1",
];

pub const ADDRESS: &[&str] = &[
    "button[data-item-id='address'] div.fontBodyMedium",
    "button[data-item-id='address']",
    "button[data-tooltip='Copy address'] div.fontBodyMedium",
    "div[data-item-id='address']",
];

pub const PHONE: &[&str] = &[
    "button[data-item-id^='phone:tel'] div.fontBodyMedium",
    "button[data-item-id^='phone'] div.fontBodyMedium",
    "button[data-tooltip='Copy phone number'] div.fontBodyMedium",
    "a[data-item-id^='phone']",
];

pub const WEBSITE: &[&str] = &[
    "a[data-item-id='authority']",
    "a[data-tooltip='Open website']",
    "a[aria-label*='website']",
];

// Rating and review markup has been stable; no fallback chain.
pub const RATING: &str = "div.F7nice span[aria-hidden='true']";
pub const REVIEWS: &str = "div.F7nice span[aria-label*='review']";
