use thiserror::Error;

/// Failures surfaced by a [`PageSession`] implementation.
///
/// "Element not found" is deliberately not an error: lookups return
/// `Option`/counts so that a missing node reads as an empty field or an
/// empty list, which is the normal case on a page whose markup shifts
/// under us. Errors are reserved for operations that should have worked
/// on a healthy session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("browser launch failed: {0}")]
    Launch(String),

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("page interaction failed: {0}")]
    Interaction(String),
}

/// The browser capability the scraping core drives.
///
/// Elements are addressed by (selector, index) and re-resolved on every
/// call; nothing here hands out element handles. The page behind a
/// session mutates constantly (virtualized lists, panel swaps), so a
/// cached handle would be stale by the time it was used.
pub trait PageSession {
    fn navigate(&mut self, url: &str) -> Result<(), SessionError>;

    fn current_url(&self) -> String;

    /// Number of elements currently matching `css`.
    fn count(&self, css: &str) -> usize;

    /// Inner text of the index-th element matching `css`.
    fn nth_text(&self, css: &str, index: usize) -> Option<String>;

    /// Attribute of the index-th element matching `css`.
    fn nth_attr(&self, css: &str, index: usize, name: &str) -> Option<String>;

    /// Text of the first `child_css` descendant of the index-th `css` match.
    fn child_text(&self, css: &str, index: usize, child_css: &str) -> Option<String>;

    /// Attribute of the first `child_css` descendant of the index-th `css` match.
    fn child_attr(&self, css: &str, index: usize, child_css: &str, name: &str) -> Option<String>;

    fn click_nth(&mut self, css: &str, index: usize) -> Result<(), SessionError>;

    /// Click the first `child_css` descendant of the index-th `css` match.
    fn click_child(&mut self, css: &str, index: usize, child_css: &str) -> Result<(), SessionError>;

    fn scroll_into_view(&mut self, css: &str, index: usize) -> Result<(), SessionError>;

    /// Scroll the first element matching `css` to its own bottom.
    fn scroll_to_bottom(&mut self, css: &str) -> Result<(), SessionError>;

    /// Full visible text of the page body; empty when unavailable.
    fn body_text(&self) -> String;

    /// History-back. Implementations are not required to block until the
    /// previous view has rendered; callers wait on a condition instead.
    fn back(&mut self) -> Result<(), SessionError>;

    /// First match text, shorthand for `nth_text(css, 0)`.
    fn text(&self, css: &str) -> Option<String> {
        self.nth_text(css, 0)
    }

    /// First match attribute, shorthand for `nth_attr(css, 0, name)`.
    fn attr(&self, css: &str, name: &str) -> Option<String> {
        self.nth_attr(css, 0, name)
    }

    fn exists(&self, css: &str) -> bool {
        self.count(css) > 0
    }
}
