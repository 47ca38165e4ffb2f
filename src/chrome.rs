//! [`PageSession`] over a real headless Chrome instance.
//!
//! One session owns one browser process and one tab. Dropping the
//! session tears the browser down, which is what guarantees cleanup on
//! every exit path of a run.

use std::ffi::OsStr;
use std::sync::Arc;

use headless_chrome::{Browser, Element, LaunchOptions, Tab};

use crate::session::{PageSession, SessionError};

/// Fixed user agent; matches a plain desktop Chrome of the era the
/// selectors were captured against.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

pub struct ChromeSession {
    _browser: Browser,
    tab: Arc<Tab>,
}

impl ChromeSession {
    pub fn launch() -> Result<Self, SessionError> {
        let ua_arg = format!("--user-agent={USER_AGENT}");
        let args = vec![
            OsStr::new("--disable-blink-features=AutomationControlled"),
            OsStr::new("--no-sandbox"),
            OsStr::new("--disable-dev-shm-usage"),
            OsStr::new("--disable-gpu"),
            OsStr::new(ua_arg.as_str()),
        ];

        let browser = Browser::new(LaunchOptions {
            headless: true,
            window_size: Some((1920, 1080)),
            args,
            ..Default::default()
        })
        .map_err(|e| SessionError::Launch(e.to_string()))?;

        let tab = browser
            .new_tab()
            .map_err(|e| SessionError::Launch(e.to_string()))?;

        Ok(Self {
            _browser: browser,
            tab,
        })
    }

    /// All current matches for `css`; a failed lookup reads as none.
    fn elements(&self, css: &str) -> Vec<Element<'_>> {
        self.tab.find_elements(css).unwrap_or_default()
    }

    fn nth(&self, css: &str, index: usize) -> Option<Element<'_>> {
        self.elements(css).into_iter().nth(index)
    }

    fn missing(css: &str, index: usize) -> SessionError {
        SessionError::Interaction(format!("no element at {css}[{index}]"))
    }
}

impl PageSession for ChromeSession {
    fn navigate(&mut self, url: &str) -> Result<(), SessionError> {
        self.tab
            .navigate_to(url)
            .map_err(|e| SessionError::Navigation(e.to_string()))?;
        self.tab
            .wait_until_navigated()
            .map_err(|e| SessionError::Navigation(e.to_string()))?;
        Ok(())
    }

    fn current_url(&self) -> String {
        self.tab.get_url()
    }

    fn count(&self, css: &str) -> usize {
        self.elements(css).len()
    }

    fn nth_text(&self, css: &str, index: usize) -> Option<String> {
        self.nth(css, index)?.get_inner_text().ok()
    }

    fn nth_attr(&self, css: &str, index: usize, name: &str) -> Option<String> {
        self.nth(css, index)?.get_attribute_value(name).ok().flatten()
    }

    fn child_text(&self, css: &str, index: usize, child_css: &str) -> Option<String> {
        self.nth(css, index)?
            .find_element(child_css)
            .ok()?
            .get_inner_text()
            .ok()
    }

    fn child_attr(&self, css: &str, index: usize, child_css: &str, name: &str) -> Option<String> {
        self.nth(css, index)?
            .find_element(child_css)
            .ok()?
            .get_attribute_value(name)
            .ok()
            .flatten()
    }

    fn click_nth(&mut self, css: &str, index: usize) -> Result<(), SessionError> {
        let element = self.nth(css, index).ok_or_else(|| Self::missing(css, index))?;
        element
            .click()
            .map_err(|e| SessionError::Interaction(e.to_string()))?;
        Ok(())
    }

    fn click_child(&mut self, css: &str, index: usize, child_css: &str) -> Result<(), SessionError> {
        let parent = self.nth(css, index).ok_or_else(|| Self::missing(css, index))?;
        let child = parent
            .find_element(child_css)
            .map_err(|e| SessionError::Interaction(e.to_string()))?;
        child
            .click()
            .map_err(|e| SessionError::Interaction(e.to_string()))?;
        Ok(())
    }

    fn scroll_into_view(&mut self, css: &str, index: usize) -> Result<(), SessionError> {
        let element = self.nth(css, index).ok_or_else(|| Self::missing(css, index))?;
        element
            .scroll_into_view()
            .map_err(|e| SessionError::Interaction(e.to_string()))?;
        Ok(())
    }

    fn scroll_to_bottom(&mut self, css: &str) -> Result<(), SessionError> {
        // Selector goes through a JSON literal so quoting in it cannot
        // break out of the script.
        let selector = serde_json::to_string(css).unwrap_or_else(|_| "\"\"".to_string());
        let script = format!(
            "(() => {{ const el = document.querySelector({selector}); \
             if (el) el.scrollTop = el.scrollHeight; }})()"
        );
        self.tab
            .evaluate(&script, false)
            .map_err(|e| SessionError::Interaction(e.to_string()))?;
        Ok(())
    }

    fn body_text(&self) -> String {
        self.tab
            .find_element("body")
            .ok()
            .and_then(|body| body.get_inner_text().ok())
            .unwrap_or_default()
    }

    fn back(&mut self) -> Result<(), SessionError> {
        self.tab
            .evaluate("window.history.back()", false)
            .map_err(|e| SessionError::Navigation(e.to_string()))?;
        Ok(())
    }
}
