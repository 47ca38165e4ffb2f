pub mod api;
pub mod chrome;
pub mod db;
pub mod error;
pub mod extract;
pub mod models;
pub mod postprocess;
pub mod progress;
pub mod scraper;
pub mod selectors;
pub mod session;
pub mod wait;

pub use error::ScrapeError;
pub use models::{Lead, SearchQuery};
pub use progress::ProgressSink;
pub use session::{PageSession, SessionError};
