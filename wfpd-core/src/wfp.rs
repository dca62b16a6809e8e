//! WFP splitting and grouping.
//!
//! A WFP blob is a sequence of records, each of the form
//! `file=<md5>,<size>,<path>` followed by fingerprint lines. Records are
//! split on the `file=` marker and regrouped into batches sized for one
//! engine invocation. The declared byte size in each record header is
//! parsed for telemetry only and never re-derived from the content.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::error::ScanError;

pub const RECORD_MARKER: &str = "file=";
pub const HPSM_MARKER: &str = "hpsm=";

static RECORD_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<md5>[0-9a-fA-F]{32}),(?P<size>\d+),(?P<path>[^\n]*)")
        .expect("record header regex must compile")
});

/// One fingerprint entry, kept in its original textual form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WfpRecord {
    text: String,
}

impl WfpRecord {
    /// The full record text, `file=` prefix included.
    pub fn as_text(&self) -> &str {
        &self.text
    }

    /// MD5 from the record header, if the header parses.
    pub fn md5(&self) -> Option<&str> {
        self.header().map(|c| c.0)
    }

    /// Declared byte size from the record header, if the header parses.
    /// Used for telemetry only; a record with an unparseable header is
    /// still scanned, just unaccounted.
    pub fn declared_size(&self) -> Option<u64> {
        self.header().and_then(|c| c.1.parse().ok())
    }

    fn header(&self) -> Option<(&str, &str)> {
        let body = self.text.strip_prefix(RECORD_MARKER)?;
        let caps = RECORD_HEADER.captures(body)?;
        Some((
            caps.name("md5").map(|m| m.as_str())?,
            caps.name("size").map(|m| m.as_str())?,
        ))
    }
}

/// An ordered group of records serialized back to engine input form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WfpBatch {
    records: Vec<WfpRecord>,
}

impl WfpBatch {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Serialize the batch back to `file=...` text form.
    pub fn to_text(&self) -> String {
        self.records
            .iter()
            .map(|r| r.as_text())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Split a raw WFP blob into records.
///
/// Fails with `Validation` on empty input or input without a single
/// `file=` marker, and with `Policy` when the content requests HPSM while
/// the server has it disabled. Both checks run before any engine work.
pub fn split_wfp(contents: &str, hpsm_enabled: bool) -> Result<Vec<WfpRecord>, ScanError> {
    let trimmed = contents.trim();
    if trimmed.is_empty() {
        return Err(ScanError::validation("no WFP contents supplied"));
    }
    if !hpsm_enabled && trimmed.contains(HPSM_MARKER) {
        return Err(ScanError::policy(
            "HPSM fingerprints are not enabled on this server",
        ));
    }
    let parts: Vec<&str> = trimmed.split(RECORD_MARKER).collect();
    // First split segment is always empty, so the record count is parts - 1.
    if parts.len() <= 1 {
        return Err(ScanError::validation(
            "no WFP file contents (file=...) supplied",
        ));
    }
    let records: Vec<WfpRecord> = parts
        .into_iter()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| WfpRecord {
            text: format!("{RECORD_MARKER}{p}"),
        })
        .collect();
    if records.is_empty() {
        return Err(ScanError::validation(
            "no WFP file contents (file=...) supplied",
        ));
    }
    let declared: u64 = records.iter().filter_map(WfpRecord::declared_size).sum();
    debug!(
        records = records.len(),
        declared_bytes = declared,
        "split WFP input"
    );
    Ok(records)
}

/// Group records into batches of up to `grouping` entries. A non-full
/// trailing batch is still produced. A grouping of zero behaves as one.
pub fn group_records(records: Vec<WfpRecord>, grouping: usize) -> Vec<WfpBatch> {
    let grouping = grouping.max(1);
    records
        .chunks(grouping)
        .map(|chunk| WfpBatch {
            records: chunk.to_vec(),
        })
        .collect()
}
