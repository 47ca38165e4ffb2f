//! The search run itself: navigate, consent, locate the results panel,
//! grow it, then walk the cards one by one through their detail views.
//!
//! Recovery policy: anything that breaks while iterating cards reloads
//! the listing URL and moves on. Only a failed browser launch or a
//! failed initial navigation aborts the run; "no results panel" and
//! "no cards" are normal empty outcomes.

use std::collections::HashSet;
use std::time::Duration;

use crate::chrome::ChromeSession;
use crate::error::ScrapeError;
use crate::extract::extract_lead;
use crate::models::{Lead, SearchQuery};
use crate::progress::{ProgressSink, SubSearchSink};
use crate::selectors;
use crate::session::{PageSession, SessionError};
use crate::wait::poll_until;

/// Consecutive no-growth scroll iterations tolerated before concluding
/// the site has no more results to render.
const MAX_SCROLL_STALLS: usize = 20;

/// Deadlines and pauses for page-state waits. All waits are bounded
/// polls except the two settle pauses, which have no observable
/// condition to wait on.
#[derive(Debug, Clone)]
pub struct Timing {
    /// Results container present after a navigation.
    pub page_load: Duration,
    /// Detail view rendered after a card click.
    pub detail_render: Duration,
    /// Results container back after leaving a detail view.
    pub list_restore: Duration,
    /// Card count growth after one scroll step.
    pub scroll_growth: Duration,
    /// Pause after dismissing the consent dialog.
    pub consent_settle: Duration,
    /// Pause after scrolling a card into view, before clicking it.
    pub focus_settle: Duration,
    pub poll_interval: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            page_load: Duration::from_secs(10),
            detail_render: Duration::from_secs(5),
            list_restore: Duration::from_secs(3),
            scroll_growth: Duration::from_millis(1500),
            consent_settle: Duration::from_secs(2),
            focus_settle: Duration::from_millis(400),
            poll_interval: Duration::from_millis(150),
        }
    }
}

/// Maps search URL for a query, e.g.
/// `https://www.google.com/maps/search/Bakery%20in%20Leeds%2C%20UK`.
pub fn compose_search_url(query: &SearchQuery) -> String {
    format!(
        "{}{}",
        selectors::MAPS_SEARCH_ROOT,
        urlencoding::encode(&query.label())
    )
}

/// Runs one search in a freshly launched Chrome session.
pub fn scrape_search(
    query: &SearchQuery,
    max_results: usize,
    timing: &Timing,
    progress: &dyn ProgressSink,
) -> Result<Vec<Lead>, ScrapeError> {
    let mut session = ChromeSession::launch().map_err(ScrapeError::Session)?;
    run_search(&mut session, query, max_results, timing, progress)
}

/// Runs each query sequentially in its own Chrome session, tagging
/// every lead with its origin query. Failed sub-runs are skipped.
pub fn scrape_bulk(
    queries: &[SearchQuery],
    max_results: usize,
    timing: &Timing,
    progress: &dyn ProgressSink,
) -> Vec<Lead> {
    run_bulk(queries, max_results, timing, progress, || {
        ChromeSession::launch().map(|s| Box::new(s) as Box<dyn PageSession>)
    })
}

/// One full search against an already-established session.
pub fn run_search(
    session: &mut dyn PageSession,
    query: &SearchQuery,
    max_results: usize,
    timing: &Timing,
    progress: &dyn ProgressSink,
) -> Result<Vec<Lead>, ScrapeError> {
    let url = compose_search_url(query);
    let mut leads: Vec<Lead> = Vec::new();
    let mut processed: HashSet<String> = HashSet::new();

    progress.report(0, "Starting browser...");
    session.navigate(&url).map_err(ScrapeError::Navigation)?;
    progress.report(5, "Loading search results...");

    dismiss_consent(session, timing);

    let Some(container) = locate_container(session, timing) else {
        progress.report(0, "Could not find results container. Try different search terms.");
        return Ok(leads);
    };
    tracing::debug!(container, query = %query.label(), "results container located");

    progress.report(10, "Scrolling to load more results...");
    grow_result_list(session, container, max_results, timing, progress);

    progress.report(40, "Extracting business details...");
    let total = session.count(selectors::RESULT_CARD).min(max_results);
    if total == 0 {
        progress.report(0, "No businesses found. Try different search terms.");
        return Ok(leads);
    }

    for idx in 0..total {
        progress.report(
            card_percent(idx, total),
            &format!("Extracting lead {} of {}...", idx + 1, total),
        );
        match process_card(session, idx, &mut leads, &mut processed, timing) {
            Ok(()) => {
                // The back-navigation can land us anywhere; without a
                // results panel the remaining indices mean nothing.
                if find_container(session).is_none() {
                    recover(session, &url, timing);
                }
            }
            Err(err) => {
                tracing::warn!(card = idx, error = %err, "card interaction failed, reloading listing");
                recover(session, &url, timing);
            }
        }
    }

    progress.report(100, &format!("Completed! Found {} leads.", leads.len()));
    Ok(leads)
}

/// Runs [`run_search`] once per query with sessions drawn from
/// `new_session`, rescaling each sub-run's progress into its slice.
pub fn run_bulk<F>(
    queries: &[SearchQuery],
    max_results: usize,
    timing: &Timing,
    progress: &dyn ProgressSink,
    mut new_session: F,
) -> Vec<Lead>
where
    F: FnMut() -> Result<Box<dyn PageSession>, SessionError>,
{
    let mut all: Vec<Lead> = Vec::new();
    let total = queries.len();

    for (idx, query) in queries.iter().enumerate() {
        let sub = SubSearchSink::new(progress, idx, total);
        let outcome = new_session()
            .map_err(ScrapeError::Session)
            .and_then(|mut session| run_search(session.as_mut(), query, max_results, timing, &sub));
        match outcome {
            Ok(leads) => {
                let label = query.label();
                all.extend(leads.into_iter().map(|mut lead| {
                    lead.search_query = Some(label.clone());
                    lead
                }));
            }
            Err(err) => {
                tracing::warn!(search = %query.label(), error = %err, "bulk sub-search failed, skipping");
                progress.report(0, &format!("Error in search {}: {err}", idx + 1));
            }
        }
    }

    progress.report(
        100,
        &format!("Bulk search completed! Found {} total leads.", all.len()),
    );
    all
}

/// Grows the virtualized result list toward `target` by scrolling the
/// container and waiting for the card count to move. Stops early after
/// [`MAX_SCROLL_STALLS`] consecutive iterations without growth.
/// Returns the loaded card count.
pub fn grow_result_list(
    session: &mut dyn PageSession,
    container_css: &str,
    target: usize,
    timing: &Timing,
    progress: &dyn ProgressSink,
) -> usize {
    let mut last_count = session.count(selectors::RESULT_CARD);
    let mut stalls = 0usize;

    while stalls < MAX_SCROLL_STALLS {
        if let Err(err) = session.scroll_to_bottom(container_css) {
            tracing::debug!(error = %err, "scroll step failed, counting as stall");
            stalls += 1;
            continue;
        }
        poll_until(timing.scroll_growth, timing.poll_interval, || {
            session.count(selectors::RESULT_CARD) > last_count
        });

        let current = session.count(selectors::RESULT_CARD);
        if current >= target {
            break;
        }
        if current > last_count {
            stalls = 0;
            last_count = current;
        } else {
            stalls += 1;
        }
        progress.report(
            scroll_percent(stalls),
            &format!("Loading results... found {current} businesses"),
        );
    }

    session.count(selectors::RESULT_CARD)
}

/// Opens the idx-th card, extracts a lead, and returns to the list.
/// Skips silently when the card's display name was already processed.
fn process_card(
    session: &mut dyn PageSession,
    idx: usize,
    leads: &mut Vec<Lead>,
    processed: &mut HashSet<String>,
    timing: &Timing,
) -> Result<(), SessionError> {
    if idx >= session.count(selectors::RESULT_CARD) {
        // List shrank across a recovery; nothing at this index anymore.
        return Ok(());
    }

    let card_name = session
        .child_attr(selectors::RESULT_CARD, idx, selectors::CARD_LINK, "aria-label")
        .unwrap_or_default();
    if !card_name.is_empty() && processed.contains(&card_name) {
        return Ok(());
    }

    session.scroll_into_view(selectors::RESULT_CARD, idx)?;
    std::thread::sleep(timing.focus_settle);
    session.click_child(selectors::RESULT_CARD, idx, selectors::CARD_LINK)?;
    poll_until(timing.detail_render, timing.poll_interval, || {
        selectors::NAME.iter().any(|&css| session.exists(css))
    });

    let mut lead = extract_lead(session);
    if lead.name.is_empty() && !card_name.is_empty() {
        // The detail view gave us nothing; the card's own label is
        // still a usable name.
        lead.name = card_name.clone();
    }
    if lead.has_name() {
        processed.insert(lead.name.clone());
        leads.push(lead);
    }

    let back_done = session.exists(selectors::BACK_BUTTON)
        && session.click_nth(selectors::BACK_BUTTON, 0).is_ok();
    if !back_done {
        session.back()?;
    }
    poll_until(timing.list_restore, timing.poll_interval, || {
        find_container(session).is_some()
    });
    Ok(())
}

/// Best-effort consent dismissal: click the first visible button whose
/// text contains an affirmative word. Never fails the run.
fn dismiss_consent(session: &mut dyn PageSession, timing: &Timing) {
    let buttons = session.count("button");
    for idx in 0..buttons {
        let Some(text) = session.nth_text("button", idx) else {
            continue;
        };
        let text = text.to_lowercase();
        if selectors::CONSENT_WORDS.iter().any(|w| text.contains(w)) {
            if session.click_nth("button", idx).is_ok() {
                tracing::debug!(button = %text.trim(), "consent dialog dismissed");
                std::thread::sleep(timing.consent_settle);
            }
            return;
        }
    }
}

fn find_container(session: &dyn PageSession) -> Option<&'static str> {
    selectors::RESULT_CONTAINERS
        .iter()
        .copied()
        .find(|&css| session.exists(css))
}

fn locate_container(session: &mut dyn PageSession, timing: &Timing) -> Option<&'static str> {
    poll_until(timing.page_load, timing.poll_interval, || {
        find_container(session).is_some()
    });
    find_container(session)
}

/// FAIL-RECOVER: reload the listing URL and wait for the container.
/// Failures here are logged and ignored; the card loop keeps going.
fn recover(session: &mut dyn PageSession, url: &str, timing: &Timing) {
    if let Err(err) = session.navigate(url) {
        tracing::warn!(error = %err, "listing reload failed");
        return;
    }
    poll_until(timing.page_load, timing.poll_interval, || {
        find_container(session).is_some()
    });
}

/// Scroll phase progress: a bounded function of the stall counter in
/// the 10–40 band. Gives the observer motion, not an ETA.
fn scroll_percent(stalls: usize) -> u8 {
    (10 + stalls * 3).min(40) as u8
}

/// Card phase progress: linear in cards processed, 40–95 band.
fn card_percent(idx: usize, total: usize) -> u8 {
    (40 + idx * 55 / total.max(1)) as u8
}
