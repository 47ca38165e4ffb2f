//! End-to-end orchestrator runs against a scripted in-memory page
//! session: a virtualized result list that grows on scroll, detail
//! views with uneven field coverage, a consent dialog, and a session
//! that dies on navigation.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use lead_crawler::models::SearchQuery;
use lead_crawler::progress::ProgressSink;
use lead_crawler::scraper::{run_bulk, run_search, Timing};
use lead_crawler::selectors;
use lead_crawler::session::{PageSession, SessionError};

#[derive(Clone, Default)]
struct FakeCard {
    display: String,
    detail_name: String,
    address: String,
    /// Address only exposed via aria-label, with the "Address: " prefix.
    aria_address: bool,
    phone: String,
    website: String,
    rating: String,
    reviews: String,
    body: String,
}

fn card(display: &str) -> FakeCard {
    FakeCard {
        display: display.to_string(),
        detail_name: display.to_string(),
        address: format!("{display} street 1"),
        phone: "020 7946 0958".to_string(),
        website: format!("https://{}.example/", display.to_lowercase().replace(' ', "-")),
        rating: "4.5".to_string(),
        reviews: "120 reviews".to_string(),
        ..FakeCard::default()
    }
}

#[derive(Clone, Copy, PartialEq)]
enum View {
    Listing,
    Detail(usize),
}

struct ScriptedSession {
    cards: Vec<FakeCard>,
    view: View,
    loaded: usize,
    grow_step: usize,
    consent_pending: bool,
    has_container: bool,
    fail_navigation: bool,
    listing_url: String,
}

impl ScriptedSession {
    fn new(cards: Vec<FakeCard>, initially_loaded: usize) -> Self {
        let loaded = initially_loaded.min(cards.len());
        Self {
            cards,
            view: View::Listing,
            loaded,
            grow_step: 4,
            consent_pending: true,
            has_container: true,
            fail_navigation: false,
            listing_url: String::new(),
        }
    }

    fn detail(&self) -> Option<&FakeCard> {
        match self.view {
            View::Detail(idx) => self.cards.get(idx),
            View::Listing => None,
        }
    }
}

fn nonempty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

impl PageSession for ScriptedSession {
    fn navigate(&mut self, url: &str) -> Result<(), SessionError> {
        if self.fail_navigation {
            return Err(SessionError::Navigation("connection reset".to_string()));
        }
        self.listing_url = url.to_string();
        self.view = View::Listing;
        Ok(())
    }

    fn current_url(&self) -> String {
        match self.view {
            View::Detail(idx) => format!("https://www.google.com/maps/place/biz-{idx}"),
            View::Listing => self.listing_url.clone(),
        }
    }

    fn count(&self, css: &str) -> usize {
        if css == selectors::RESULT_CARD {
            return self.loaded;
        }
        if selectors::RESULT_CONTAINERS.contains(&css) {
            return usize::from(self.has_container && css == selectors::RESULT_CONTAINERS[0]);
        }
        if css == "button" {
            return if self.consent_pending { 2 } else { 0 };
        }
        if css == selectors::BACK_BUTTON {
            return usize::from(matches!(self.view, View::Detail(_)));
        }
        if selectors::NAME.contains(&css) {
            return usize::from(self.detail().is_some_and(|c| !c.detail_name.is_empty()));
        }
        0
    }

    fn nth_text(&self, css: &str, index: usize) -> Option<String> {
        if css == "button" && self.consent_pending {
            return ["Reject all", "Accept all"].get(index).map(|s| s.to_string());
        }
        if index != 0 {
            return None;
        }
        let card = self.detail()?;
        if selectors::NAME.contains(&css) {
            return nonempty(&card.detail_name);
        }
        if selectors::ADDRESS.contains(&css) {
            if card.aria_address {
                return None;
            }
            return nonempty(&card.address);
        }
        if selectors::PHONE.contains(&css) {
            return nonempty(&card.phone);
        }
        if css == selectors::RATING {
            return nonempty(&card.rating);
        }
        None
    }

    fn nth_attr(&self, css: &str, index: usize, name: &str) -> Option<String> {
        if index != 0 {
            return None;
        }
        let card = self.detail()?;
        if css == selectors::REVIEWS && name == "aria-label" {
            return nonempty(&card.reviews);
        }
        if selectors::WEBSITE.contains(&css) && name == "href" {
            return nonempty(&card.website);
        }
        if selectors::ADDRESS.contains(&css) && name == "aria-label" && card.aria_address {
            return Some(format!("Address: {}", card.address));
        }
        None
    }

    fn child_text(&self, _css: &str, _index: usize, _child_css: &str) -> Option<String> {
        None
    }

    fn child_attr(&self, css: &str, index: usize, child_css: &str, name: &str) -> Option<String> {
        if css == selectors::RESULT_CARD
            && child_css == selectors::CARD_LINK
            && name == "aria-label"
            && index < self.loaded
        {
            return Some(self.cards[index].display.clone());
        }
        None
    }

    fn click_nth(&mut self, css: &str, index: usize) -> Result<(), SessionError> {
        if css == "button" && self.consent_pending && index == 1 {
            self.consent_pending = false;
            return Ok(());
        }
        if css == selectors::BACK_BUTTON && matches!(self.view, View::Detail(_)) {
            self.view = View::Listing;
            return Ok(());
        }
        Err(SessionError::Interaction(format!("nothing at {css}[{index}]")))
    }

    fn click_child(&mut self, css: &str, index: usize, child_css: &str) -> Result<(), SessionError> {
        if css == selectors::RESULT_CARD && child_css == selectors::CARD_LINK && index < self.loaded
        {
            self.view = View::Detail(index);
            return Ok(());
        }
        Err(SessionError::Interaction(format!("nothing at {css}[{index}]")))
    }

    fn scroll_into_view(&mut self, css: &str, index: usize) -> Result<(), SessionError> {
        if css == selectors::RESULT_CARD && index < self.loaded {
            Ok(())
        } else {
            Err(SessionError::Interaction(format!("nothing at {css}[{index}]")))
        }
    }

    fn scroll_to_bottom(&mut self, _css: &str) -> Result<(), SessionError> {
        self.loaded = (self.loaded + self.grow_step).min(self.cards.len());
        Ok(())
    }

    fn body_text(&self) -> String {
        self.detail().map(|c| c.body.clone()).unwrap_or_default()
    }

    fn back(&mut self) -> Result<(), SessionError> {
        self.view = View::Listing;
        Ok(())
    }
}

fn fast() -> Timing {
    Timing {
        page_load: Duration::from_millis(20),
        detail_render: Duration::from_millis(10),
        list_restore: Duration::from_millis(10),
        scroll_growth: Duration::from_millis(5),
        consent_settle: Duration::from_millis(1),
        focus_settle: Duration::from_millis(1),
        poll_interval: Duration::from_millis(1),
    }
}

#[derive(Default)]
struct Recorder(Arc<Mutex<Vec<(u8, String)>>>);

impl ProgressSink for Recorder {
    fn report(&self, percent: u8, message: &str) {
        self.0.lock().unwrap().push((percent, message.to_string()));
    }
}

fn capture() -> (Arc<Mutex<Vec<(u8, String)>>>, Recorder) {
    let recorder = Recorder::default();
    (recorder.0.clone(), recorder)
}

/// Twelve simulated cards, two of which share a display name. One card
/// hides its name in the detail view, one exposes its address only as
/// an aria-label, one has no direct phone markup, one links back to the
/// mapping service instead of a real website.
fn twelve_cards() -> Vec<FakeCard> {
    let mut cards: Vec<FakeCard> = (0..12).map(|i| card(&format!("Bakery {i}"))).collect();

    cards[7] = card("Bakery 2"); // display-name collision with cards[2]

    cards[5].detail_name = String::new(); // card-level name fallback

    cards[6].aria_address = true;
    cards[6].address = "14 Mill Lane".to_string();

    cards[3].phone = String::new();
    cards[3].body =
        "Family bakery. Call us: 0113 496 0000 or write to hello@bakery3.example".to_string();

    cards[4].website = "https://www.google.com/maps/place/bakery-4".to_string();

    cards
}

#[test]
fn twelve_cards_with_one_name_collision_yield_eleven_leads() {
    let mut session = ScriptedSession::new(twelve_cards(), 8);
    let (events, sink) = capture();
    let query = SearchQuery::new("Bakery", "Leeds", "UK");

    let leads = run_search(&mut session, &query, 20, &fast(), &sink).unwrap();

    assert_eq!(leads.len(), 11);
    assert!(leads.iter().all(|lead| !lead.maps_link.is_empty()));
    assert!(leads.iter().all(|lead| !lead.name.is_empty()));
    assert_eq!(
        leads.iter().filter(|lead| lead.name == "Bakery 2").count(),
        1
    );

    // Consent got dismissed along the way.
    assert!(!session.consent_pending);

    // Progress ran to completion.
    let events = events.lock().unwrap();
    assert_eq!(events.last().unwrap().0, 100);
    assert!(events.last().unwrap().1.contains("11 leads"));
}

#[test]
fn extraction_fallbacks_fill_sparse_detail_views() {
    let mut session = ScriptedSession::new(twelve_cards(), 8);
    let query = SearchQuery::new("Bakery", "Leeds", "UK");

    let leads = run_search(&mut session, &query, 20, &fast(), &lead_crawler::progress::NullSink)
        .unwrap();

    // Detail view had no name; the card's own label fills in.
    assert!(leads.iter().any(|lead| lead.name == "Bakery 5"));

    // aria-label address with its prefix stripped.
    let aria = leads.iter().find(|lead| lead.name == "Bakery 6").unwrap();
    assert_eq!(aria.address, "14 Mill Lane");

    // Phone recovered from visible text, and the messaging link derived
    // from it; email is regex-only and comes from the same text.
    let texty = leads.iter().find(|lead| lead.name == "Bakery 3").unwrap();
    assert_eq!(texty.phone, "0113 496 0000");
    assert_eq!(texty.whatsapp_link, "https://wa.me/01134960000");
    assert_eq!(texty.email, "hello@bakery3.example");

    // Maps-internal link rejected, field left empty.
    let utility = leads.iter().find(|lead| lead.name == "Bakery 4").unwrap();
    assert_eq!(utility.website, "");

    // Everyone else keeps their real site and derived link.
    let plain = leads.iter().find(|lead| lead.name == "Bakery 0").unwrap();
    assert_eq!(plain.website, "https://bakery-0.example/");
    assert_eq!(plain.whatsapp_link, "https://wa.me/02079460958");
    assert_eq!(plain.rating, "4.5");
    assert_eq!(plain.reviews, "120 reviews");
}

#[test]
fn target_caps_how_many_cards_are_opened() {
    let mut session = ScriptedSession::new(twelve_cards(), 8);
    let query = SearchQuery::new("Bakery", "Leeds", "UK");

    let leads = run_search(&mut session, &query, 10, &fast(), &lead_crawler::progress::NullSink)
        .unwrap();

    // Ten cards iterated, one display-name collision inside the window.
    assert_eq!(leads.len(), 9);
}

#[test]
fn missing_container_is_a_normal_empty_run() {
    let mut session = ScriptedSession::new(twelve_cards(), 8);
    session.has_container = false;
    let (events, sink) = capture();
    let query = SearchQuery::new("Plumber", "Nowhere", "XX");

    let leads = run_search(&mut session, &query, 20, &fast(), &sink).unwrap();

    assert!(leads.is_empty());
    let events = events.lock().unwrap();
    assert!(events.last().unwrap().1.contains("results container"));
}

#[test]
fn bulk_continues_past_a_dead_sub_search() {
    let queries = vec![
        SearchQuery::new("Coffee", "York", "UK"),
        SearchQuery::new("Coffee", "Hull", "UK"),
    ];
    let (events, sink) = capture();

    let mut calls = 0;
    let leads = run_bulk(&queries, 10, &fast(), &sink, || {
        calls += 1;
        let mut session = ScriptedSession::new(
            (0..5).map(|i| card(&format!("Coffee {i}"))).collect(),
            5,
        );
        session.fail_navigation = calls > 1;
        Ok(Box::new(session) as Box<dyn PageSession>)
    });

    assert_eq!(calls, 2);
    assert_eq!(leads.len(), 5);
    assert!(leads
        .iter()
        .all(|lead| lead.search_query.as_deref() == Some("Coffee in York, UK")));

    let events = events.lock().unwrap();
    assert!(events.iter().any(|(_, m)| m.starts_with("[Search 1/2] ")));
    assert!(events.iter().any(|(_, m)| m.contains("Error in search 2")));
    assert_eq!(events.last().unwrap().0, 100);
    assert!(events.last().unwrap().1.contains("5 total leads"));
}

#[test]
fn bulk_with_no_session_at_all_reports_and_returns_empty() {
    let queries = vec![SearchQuery::new("Coffee", "York", "UK")];
    let leads = run_bulk(&queries, 10, &fast(), &lead_crawler::progress::NullSink, || {
        Err(SessionError::Launch("no chrome binary".to_string()))
    });
    assert!(leads.is_empty());
}
