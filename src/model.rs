use serde::{Deserialize, Serialize};

/// One lobbying-payment "$5K filer" for one legislative session.
///
/// `(session, filer_id)` is the logical key. The source site may repeat a
/// filer across letters when name matching is ambiguous; that noise is kept
/// as-is rather than deduplicated here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilerRecord {
    /// Legislative session start year, e.g. "2023".
    pub session: String,
    /// Filer name as listed; empty if the source cell was blank.
    pub name: String,
    /// Site-assigned filer identifier.
    pub filer_id: String,
    /// Quarterly figures, filled in by the activity scraper.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub quarters: Vec<QuarterRecord>,
}

/// One quarter's reported figures for one filer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuarterRecord {
    /// Session label as printed on the detail page; the lobbied-subjects
    /// table sometimes spans the full biennium, e.g. "2021-2022".
    pub session: String,
    /// Quarter label, e.g. "Q1".
    pub quarter: String,
    pub payments_to_influence: f64,
    pub puc_lobbying: f64,
    /// Free-text lobbying subject; empty when the filer reported none
    /// for this quarter.
    pub lobbied_on: String,
}
