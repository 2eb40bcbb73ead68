// src/persist/mod.rs

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::model::FilerRecord;

/// Flattened CSV row for the merge flow: one line per filer, quarters
/// are not carried in this artifact. The id column is named `fppcId` on
/// the wire so files written by earlier single-phase scrapes still merge.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FilerRow {
    session: String,
    name: String,
    #[serde(rename = "fppcId")]
    filer_id: String,
}

impl From<&FilerRecord> for FilerRow {
    fn from(filer: &FilerRecord) -> Self {
        Self {
            session: filer.session.clone(),
            name: filer.name.clone(),
            filer_id: filer.filer_id.clone(),
        }
    }
}

/// One session's full scrape, written as a standalone JSON document.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session: String,
    pub scraped_at: DateTime<Utc>,
    pub filers: Vec<FilerRecord>,
}

/// Merge freshly scraped filers into the CSV at `path`: every existing row
/// for `session` is dropped and replaced wholesale, rows for other sessions
/// are carried through untouched, then the combined set is rewritten in
/// (session desc, name asc, filer id asc) order. Rerunning a session is
/// idempotent with respect to every other session's data.
pub fn merge_filers(path: &Path, session: &str, scraped: &[FilerRecord]) -> Result<()> {
    let mut rows = read_rows(path)?;
    rows.retain(|row| row.session != session);
    rows.extend(scraped.iter().map(FilerRow::from));
    rows.sort_by(|a, b| {
        b.session
            .cmp(&a.session)
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.filer_id.cmp(&b.filer_id))
    });

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("opening {} for writing", path.display()))?;
    for row in &rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    info!(path = %path.display(), rows = rows.len(), "wrote merged filer file");
    Ok(())
}

fn read_rows(path: &Path) -> Result<Vec<FilerRow>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let mut reader =
        csv::Reader::from_path(path).with_context(|| format!("reading {}", path.display()))?;
    let mut rows = Vec::new();
    for record in reader.deserialize() {
        rows.push(record.with_context(|| format!("malformed row in {}", path.display()))?);
    }
    Ok(rows)
}

/// Write one session's filers (nested quarters included) under `dir`. The
/// filename encodes the session, so a rerun replaces the whole file; no
/// prior state is read.
pub fn write_snapshot(dir: &Path, session: &str, filers: Vec<FilerRecord>) -> Result<PathBuf> {
    let path = dir.join(format!("5k-filers-{session}.json"));
    let snapshot = SessionSnapshot {
        session: session.to_string(),
        scraped_at: Utc::now(),
        filers,
    };

    let file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), &snapshot)
        .with_context(|| format!("writing {}", path.display()))?;
    info!(path = %path.display(), filers = snapshot.filers.len(), "wrote session snapshot");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::QuarterRecord;
    use std::fs;
    use tempfile::tempdir;

    fn filer(session: &str, name: &str, id: &str) -> FilerRecord {
        FilerRecord {
            session: session.to_string(),
            name: name.to_string(),
            filer_id: id.to_string(),
            quarters: Vec::new(),
        }
    }

    #[test]
    fn merge_creates_file_when_none_exists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("5k-filers.csv");

        merge_filers(&path, "2023", &[filer("2023", "Acme Lobbying", "1001")]).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("session,name,fppcId"));
        assert!(text.contains("2023,Acme Lobbying,1001"));
    }

    #[test]
    fn merges_into_file_written_by_single_phase_scraper() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("5k-filers.csv");
        fs::write(&path, "session,name,fppcId\n2021,Old Guard,900\n").unwrap();

        merge_filers(&path, "2023", &[filer("2023", "Acme Lobbying", "1001")]).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let rows: Vec<FilerRow> = reader.deserialize().map(|r| r.unwrap()).collect();

        assert_eq!(rows.len(), 2);
        assert!(rows.iter().any(|r| r.session == "2021" && r.filer_id == "900"));
        assert!(rows.iter().any(|r| r.session == "2023" && r.filer_id == "1001"));
    }

    #[test]
    fn rerun_replaces_current_session_only() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("5k-filers.csv");

        merge_filers(&path, "2021", &[filer("2021", "Old Guard", "900")]).unwrap();
        merge_filers(&path, "2023", &[filer("2023", "Acme Lobbying", "1001")]).unwrap();
        // rescrape 2023 with a different result set
        merge_filers(&path, "2023", &[filer("2023", "Apex Group", "1002")]).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let rows: Vec<FilerRow> = reader.deserialize().map(|r| r.unwrap()).collect();

        assert_eq!(rows.len(), 2);
        assert!(rows.iter().any(|r| r.session == "2021" && r.filer_id == "900"));
        assert!(rows.iter().any(|r| r.session == "2023" && r.filer_id == "1002"));
        assert!(!rows.iter().any(|r| r.filer_id == "1001"));
    }

    #[test]
    fn merge_twice_with_same_input_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("5k-filers.csv");
        let scraped = vec![
            filer("2023", "Acme Lobbying", "1001"),
            filer("2023", "Apex Group", "1002"),
        ];

        merge_filers(&path, "2023", &scraped).unwrap();
        let first = fs::read_to_string(&path).unwrap();
        merge_filers(&path, "2023", &scraped).unwrap();
        let second = fs::read_to_string(&path).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn rows_sort_session_desc_then_name_then_id() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("5k-filers.csv");

        merge_filers(&path, "2021", &[filer("2021", "Zeta", "1")]).unwrap();
        merge_filers(
            &path,
            "2023",
            &[
                filer("2023", "Beta", "20"),
                filer("2023", "Alpha", "11"),
                filer("2023", "Alpha", "10"),
            ],
        )
        .unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let keys: Vec<(String, String, String)> = reader
            .deserialize::<FilerRow>()
            .map(|r| r.unwrap())
            .map(|r| (r.session, r.name, r.filer_id))
            .collect();

        assert_eq!(
            keys,
            vec![
                ("2023".into(), "Alpha".into(), "10".into()),
                ("2023".into(), "Alpha".into(), "11".into()),
                ("2023".into(), "Beta".into(), "20".into()),
                ("2021".into(), "Zeta".into(), "1".into()),
            ]
        );
    }

    #[test]
    fn snapshot_round_trips_nested_quarters() {
        let dir = tempdir().unwrap();
        let mut with_quarters = filer("2023", "Acme Lobbying", "1001");
        with_quarters.quarters.push(QuarterRecord {
            session: "2023".to_string(),
            quarter: "Q1".to_string(),
            payments_to_influence: 1234.0,
            puc_lobbying: 0.0,
            lobbied_on: "Rate design".to_string(),
        });

        let path = write_snapshot(dir.path(), "2023", vec![with_quarters]).unwrap();
        assert!(path.ends_with("5k-filers-2023.json"));

        let snapshot: SessionSnapshot =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(snapshot.session, "2023");
        assert_eq!(snapshot.filers.len(), 1);
        assert_eq!(snapshot.filers[0].quarters[0].lobbied_on, "Rate design");
        assert_eq!(snapshot.filers[0].quarters[0].payments_to_influence, 1234.0);
    }

    #[test]
    fn snapshot_overwrites_prior_file_for_session() {
        let dir = tempdir().unwrap();

        write_snapshot(dir.path(), "2023", vec![filer("2023", "Old", "1")]).unwrap();
        let path =
            write_snapshot(dir.path(), "2023", vec![filer("2023", "New", "2")]).unwrap();

        let snapshot: SessionSnapshot =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(snapshot.filers.len(), 1);
        assert_eq!(snapshot.filers[0].name, "New");
    }
}
