use thiserror::Error;

use crate::session::SessionError;

/// Failures that abort an entire run.
///
/// Everything past the initial navigation is handled locally
/// (skip-and-reload); only these two conditions reach the caller.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("browser session could not be started: {0}")]
    Session(#[source] SessionError),

    #[error("search page could not be loaded: {0}")]
    Navigation(#[source] SessionError),
}
