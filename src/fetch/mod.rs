// src/fetch/mod.rs

pub mod activity;
pub mod filers;

use std::time::Duration;

use anyhow::Result;
use reqwest::Client;
use scraper::ElementRef;

/// Listing endpoint: all $5K filers whose names start with one letter.
pub const LISTING_URL: &str = "https://cal-access.sos.ca.gov/Lobbying/Payments/list.aspx";
/// Detail endpoint: one filer's quarterly financial activity.
pub const DETAIL_URL: &str = "https://cal-access.sos.ca.gov/Lobbying/Payments/Detail.aspx";

/// A hung request would otherwise stall its wave's drain barrier indefinitely.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Build the shared HTTP client used by both scrape phases.
pub fn client() -> Result<Client> {
    let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
    Ok(client)
}

/// Trimmed text content of one element, descendants included.
pub(crate) fn text_of(el: ElementRef) -> String {
    el.text().collect::<String>().trim().to_string()
}
