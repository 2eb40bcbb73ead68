use anyhow::{bail, Context, Result};
use calscrape::model::FilerRecord;
use calscrape::{fetch, persist, pool::TaskPool};
use std::{env, path::PathBuf};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

/// Letter prefixes the listing endpoint buckets filers under: A-Z plus "0"
/// for names that start with a digit.
const LETTERS: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ0";
const DEFAULT_SESSION: &str = "2023";
const DEFAULT_CONCURRENCY: usize = 4;
const DEFAULT_CSV_PATH: &str = "5k-filers.csv";

const USAGE: &str = "Usage: calscrape [--snapshot] [--concurrency N] [--out PATH] [SESSION]";

struct RunConfig {
    session: String,
    concurrency: usize,
    /// Snapshot flow scrapes per-filer activity and writes a session JSON
    /// document; the default merge flow stops at discovery and merges into
    /// the shared CSV.
    snapshot: bool,
    out: Option<PathBuf>,
}

fn parse_args() -> Result<RunConfig> {
    let mut config = RunConfig {
        session: DEFAULT_SESSION.to_string(),
        concurrency: DEFAULT_CONCURRENCY,
        snapshot: false,
        out: None,
    };

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--snapshot" => config.snapshot = true,
            "--concurrency" => {
                let value = args.next().with_context(|| USAGE.to_string())?;
                config.concurrency = value
                    .parse()
                    .with_context(|| format!("--concurrency must be a number; {USAGE}"))?;
            }
            "--out" => {
                config.out = Some(PathBuf::from(
                    args.next().with_context(|| USAGE.to_string())?,
                ));
            }
            other if !other.starts_with('-') => config.session = other.to_string(),
            other => bail!("unknown flag {other}; {USAGE}"),
        }
    }
    if config.concurrency == 0 {
        bail!("--concurrency must be at least 1; {USAGE}");
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    // ─── init logging ────────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(env).init();

    let config = parse_args()?;
    info!(
        session = %config.session,
        flow = if config.snapshot { "snapshot" } else { "merge" },
        "scraping $5K filers"
    );

    let client = fetch::client()?;

    // ─── wave 1: filer discovery across every letter prefix ──────────
    let mut discovery: TaskPool<Vec<FilerRecord>> = TaskPool::new(config.concurrency);
    for letter in LETTERS.chars() {
        let client = client.clone();
        let session = config.session.clone();
        discovery.spawn(async move { fetch::filers::fetch_filers(&client, letter, &session).await });
    }

    let mut filers = Vec::new();
    for result in discovery.drain().await {
        // Listing pages exist for every letter; a failed one is systemic
        // and nothing downstream can proceed without the filer list.
        filers.extend(result?);
    }
    info!(count = filers.len(), "discovery complete");

    if config.snapshot {
        // ─── wave 2: per-filer financial activity ────────────────────
        let mut activity: TaskPool<FilerRecord> = TaskPool::new(config.concurrency);
        for mut filer in filers {
            let client = client.clone();
            let session = config.session.clone();
            activity.spawn(async move {
                let quarters =
                    fetch::activity::fetch_activity(&client, &filer.filer_id, &session)
                        .await
                        .with_context(|| {
                            format!("filer {} ({})", filer.filer_id, filer.name)
                        })?;
                filer.quarters = quarters;
                Ok(filer)
            });
        }

        let mut scraped = Vec::new();
        let mut failures = 0usize;
        for result in activity.drain().await {
            match result {
                Ok(filer) => scraped.push(filer),
                Err(err) => {
                    // One malformed or unreachable detail page must not
                    // discard the rest of the wave.
                    error!("activity scrape failed: {err:#}");
                    failures += 1;
                }
            }
        }
        if failures > 0 {
            warn!(failures, kept = scraped.len(), "some filers could not be scraped");
        }

        // Completion order is network order; sort before persisting.
        scraped.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.filer_id.cmp(&b.filer_id)));

        let dir = config.out.unwrap_or_else(|| PathBuf::from("."));
        persist::write_snapshot(&dir, &config.session, scraped)?;
    } else {
        let path = config
            .out
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CSV_PATH));
        persist::merge_filers(&path, &config.session, &filers)?;
    }

    info!("all done");
    Ok(())
}
