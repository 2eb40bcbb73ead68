use reqwest::StatusCode;
use thiserror::Error;

/// Failure kinds produced while scraping one page. Fetch errors abort the
/// whole run when they come from the listing endpoint; for the per-filer
/// activity endpoint they stay scoped to that filer's unit of work.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// Non-success HTTP status. The URL identifies the letter/filer that hit it.
    #[error("GET {url} returned {status}")]
    Fetch { url: String, status: StatusCode },

    /// The page is missing structure the current markup version promises
    /// (a table at a known index or id, a cell at a known offset).
    #[error("missing expected structure: {0}")]
    MissingStructure(String),

    /// A currency-formatted cell did not resolve to a finite number.
    /// Never coerced to zero; a failure here usually means the site layout moved.
    #[error("cannot parse currency amount from {value:?}")]
    Currency { value: String },
}
