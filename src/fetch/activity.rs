use anyhow::{Context, Result};
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info};
use url::Url;

use super::{text_of, DETAIL_URL};
use crate::error::ScrapeError;
use crate::model::QuarterRecord;

// Positional layout of the activity view. These indices ARE the external
// contract with the current CalAccess markup and will break whenever the
// site is retemplated; update them together.
/// Index of the quarterly-payments table among all tables on the page.
const PAYMENTS_TABLE_INDEX: usize = 5;
/// Table count for a filer with no recorded lobbying subjects. The
/// lobbied-on table only exists when the page has more tables than this.
const BASE_TABLE_COUNT: usize = 6;
/// Index of the lobbied-on table when present.
const LOBBIED_TABLE_INDEX: usize = 6;
/// Both tables carry two header rows ahead of the data rows.
const HEADER_ROWS: usize = 2;
/// Cell of a lobbied-on row holding the free-text subject.
const LOBBIED_TEXT_CELL: usize = 2;

/// Fetch one filer's quarterly activity for one session.
///
/// Unlike discovery, a failure here is scoped to this filer: the caller
/// logs it and keeps the rest of the wave.
pub async fn fetch_activity(
    client: &Client,
    filer_id: &str,
    session: &str,
) -> Result<Vec<QuarterRecord>> {
    fetch_activity_at(client, DETAIL_URL, filer_id, session).await
}

/// Same as [`fetch_activity`] against an explicit detail endpoint.
pub async fn fetch_activity_at(
    client: &Client,
    detail_url: &str,
    filer_id: &str,
    session: &str,
) -> Result<Vec<QuarterRecord>> {
    let url = Url::parse_with_params(
        detail_url,
        &[("id", filer_id), ("session", session), ("view", "activity")],
    )?;
    info!(filer_id, "scraping financial activity");

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

    let quarters = parse_activity(&html).with_context(|| format!("parsing {url}"))?;
    if quarters.is_empty() {
        debug!(filer_id, "no financial activity recorded");
    }
    Ok(quarters)
}

/// Extract quarter records from one activity page by cross-referencing the
/// payments table against the lobbied-on table.
///
/// A page with exactly [`BASE_TABLE_COUNT`] tables is a filer with no
/// recorded subjects and yields an empty list. Fewer tables than that means
/// the markup no longer matches our positional constants, which has to
/// surface as an error rather than as silently empty data.
pub fn parse_activity(html: &str) -> Result<Vec<QuarterRecord>> {
    let table_selector = Selector::parse("table").expect("table selector should be valid");
    let row_selector = Selector::parse("tr").expect("row selector should be valid");
    let cell_selector = Selector::parse("td").expect("cell selector should be valid");

    let doc = Html::parse_document(html);
    let tables: Vec<ElementRef> = doc.select(&table_selector).collect();

    if tables.len() < BASE_TABLE_COUNT {
        return Err(ScrapeError::MissingStructure(format!(
            "activity page has {} tables, expected at least {BASE_TABLE_COUNT}",
            tables.len()
        ))
        .into());
    }
    if tables.len() == BASE_TABLE_COUNT {
        // No lobbied-on table: this filer reported no activity.
        return Ok(Vec::new());
    }

    let payment_rows = cell_grid(tables[PAYMENTS_TABLE_INDEX], &row_selector, &cell_selector);
    let lobbied_rows: Vec<Vec<String>> =
        cell_grid(tables[LOBBIED_TABLE_INDEX], &row_selector, &cell_selector)
            .into_iter()
            .skip(HEADER_ROWS)
            .collect();

    let mut quarters = Vec::new();
    for (i, cells) in payment_rows.into_iter().enumerate().skip(HEADER_ROWS) {
        if cells.len() < 4 {
            return Err(ScrapeError::MissingStructure(format!(
                "payments row {i} has {} cells, expected session, quarter and two amounts",
                cells.len()
            ))
            .into());
        }
        let session = cells[0].clone();
        let quarter = cells[1].clone();
        let payments_to_influence = parse_currency(&cells[2])?;
        let puc_lobbying = parse_currency(&cells[3])?;

        // The payments table prints a single year while the lobbied-on table
        // sometimes spans the biennium ("2021-2022"), so the session match is
        // a substring test; quarters compare exactly. An empty session label
        // would substring-match every row, so it matches none.
        let lobbied_on = lobbied_rows
            .iter()
            .find(|row| {
                !session.is_empty()
                    && row.len() > LOBBIED_TEXT_CELL
                    && row[0].contains(&session)
                    && row[1] == quarter
            })
            .map(|row| row[LOBBIED_TEXT_CELL].clone())
            .unwrap_or_default();

        quarters.push(QuarterRecord {
            session,
            quarter,
            payments_to_influence,
            puc_lobbying,
            lobbied_on,
        });
    }

    Ok(quarters)
}

/// Parse a currency-formatted cell ("$1,234.00", "1234") into a finite
/// number. Malformed or empty input is an error, never zero: a sudden run
/// of unparseable cells is how a site layout change announces itself.
pub fn parse_currency(raw: &str) -> Result<f64, ScrapeError> {
    let cleaned = raw.trim().trim_start_matches('$').replace(',', "");
    let amount: f64 = cleaned.parse().map_err(|_| ScrapeError::Currency {
        value: raw.trim().to_string(),
    })?;
    if !amount.is_finite() {
        return Err(ScrapeError::Currency {
            value: raw.trim().to_string(),
        });
    }
    Ok(amount)
}

fn cell_grid(table: ElementRef, rows: &Selector, cells: &Selector) -> Vec<Vec<String>> {
    table
        .select(rows)
        .map(|row| row.select(cells).map(text_of).collect())
        .collect()
}
