use anyhow::{Context, Result};
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::info;
use url::Url;

use super::{text_of, LISTING_URL};
use crate::error::ScrapeError;
use crate::model::FilerRecord;

/// Element id anchoring the $5K payments table on the listing page.
const PAYMENTS_TABLE_ID: &str = "_ctl3_payments";
/// The listing table's first row is its header.
const LISTING_HEADER_ROWS: usize = 1;

/// Fetch every $5K filer whose name starts with `letter` for one session.
///
/// A non-success status here is fatal for the run: the listing page exists
/// for every letter, so a missing one means something systemic, not a
/// transient hiccup.
pub async fn fetch_filers(
    client: &Client,
    letter: char,
    session: &str,
) -> Result<Vec<FilerRecord>> {
    fetch_filers_at(client, LISTING_URL, letter, session).await
}

/// Same as [`fetch_filers`] against an explicit listing endpoint.
pub async fn fetch_filers_at(
    client: &Client,
    listing_url: &str,
    letter: char,
    session: &str,
) -> Result<Vec<FilerRecord>> {
    let url = Url::parse_with_params(
        listing_url,
        &[("letter", letter.to_string().as_str()), ("session", session)],
    )?;

    let resp = client
        .get(url.clone())
        .send()
        .await
        .with_context(|| format!("GET {url}"))?;
    let status = resp.status();
    if !status.is_success() {
        return Err(ScrapeError::Fetch {
            url: url.to_string(),
            status,
        }
        .into());
    }
    let html = resp
        .text()
        .await
        .with_context(|| format!("reading body from {url}"))?;

    let filers = parse_listing(&html, session).with_context(|| format!("parsing {url}"))?;
    info!(%letter, session, count = filers.len(), "found $5K filers");
    Ok(filers)
}

/// Extract filer records from one listing page. Each data row carries the
/// filer name in its first cell and the site-assigned id in its second.
pub fn parse_listing(html: &str, session: &str) -> Result<Vec<FilerRecord>> {
    let table_selector = Selector::parse(&format!("table#{PAYMENTS_TABLE_ID}"))
        .expect("listing table selector should be valid");
    let row_selector = Selector::parse("tr").expect("row selector should be valid");
    let cell_selector = Selector::parse("td").expect("cell selector should be valid");

    let doc = Html::parse_document(html);
    let table = doc.select(&table_selector).next().ok_or_else(|| {
        ScrapeError::MissingStructure(format!("payments table #{PAYMENTS_TABLE_ID} not on page"))
    })?;

    let mut filers = Vec::new();
    for (i, row) in table
        .select(&row_selector)
        .enumerate()
        .skip(LISTING_HEADER_ROWS)
    {
        let cells: Vec<_> = row.select(&cell_selector).collect();
        let (name, filer_id) = match (cells.first(), cells.get(1)) {
            (Some(&name), Some(&id)) => (text_of(name), text_of(id)),
            _ => {
                return Err(ScrapeError::MissingStructure(format!(
                    "listing row {i} has {} cells, expected name and filer id",
                    cells.len()
                ))
                .into())
            }
        };
        filers.push(FilerRecord {
            session: session.to_string(),
            name,
            filer_id,
            quarters: Vec::new(),
        });
    }

    Ok(filers)
}
