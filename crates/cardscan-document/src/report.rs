// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Run report persistence and crop fingerprints.

use std::path::Path;

use cardscan_core::error::Result;
use cardscan_core::types::RunReport;
use sha2::{Digest, Sha256};
use tracing::{info, instrument};

/// SHA-256 of `data` as a lowercase hex string.
///
/// Recorded for every written crop so repeated runs can be compared without
/// diffing images.
pub fn fingerprint(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Write `report` as pretty-printed JSON.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn write_report(report: &RunReport, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json)?;
    info!(
        pages = report.pages.len(),
        aligned = report.aligned_pages(),
        fields = report.extracted_fields(),
        "Run report written"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardscan_core::types::{PageReport, PageStatus, RunId};
    use chrono::Utc;

    #[test]
    fn fingerprint_known_value() {
        assert_eq!(
            fingerprint(b"hello"),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn report_is_written_as_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let mut page = PageReport::new(0);
        page.status = PageStatus::AlignmentRejected {
            best_score: Some(0.31),
            threshold: 0.6,
        };
        let report = RunReport {
            run_id: RunId::new(),
            source: "cards.pdf".into(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            pages: vec![page],
        };

        write_report(&report, &path).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["source"], "cards.pdf");
        assert_eq!(value["pages"][0]["status"], "alignment_rejected");
    }
}
