//! Per-stage counters returned by an import run.

use std::collections::BTreeMap;

use serde::Serialize;

use super::batch::Written;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StageReport {
    pub inserted: u64,
    pub updated: u64,
    pub unchanged: u64,
    /// Rows that could not be placed (unknown parent, missing number, ...).
    pub skipped: u64,
    /// Malformed input lines.
    pub errors: u64,
}

impl StageReport {
    pub(crate) fn record(&mut self, written: Written) {
        self.inserted += written.inserted;
        self.updated += written.updated;
    }

    /// Rows this stage wrote.
    pub fn writes(&self) -> u64 {
        self.inserted + self.updated
    }

    fn absorb(&mut self, other: &StageReport) {
        self.inserted += other.inserted;
        self.updated += other.updated;
        self.unchanged += other.unchanged;
        self.skipped += other.skipped;
        self.errors += other.errors;
    }
}

/// Outcome of one full import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub titles: StageReport,
    /// Movie and show subtype records created for new titles.
    pub subtypes: StageReport,
    pub genres: StageReport,
    pub seasons: StageReport,
    pub episodes: StageReport,
    pub ratings: StageReport,
    /// Known kind tokens that are deliberately not imported, with row counts.
    pub discarded_kinds: BTreeMap<String, u64>,
    /// Kind tokens outside the known vocabulary, with row counts.
    pub unrecognized_kinds: BTreeMap<String, u64>,
}

impl ImportReport {
    pub fn totals(&self) -> StageReport {
        let mut total = StageReport::default();
        for stage in [
            &self.titles,
            &self.subtypes,
            &self.genres,
            &self.seasons,
            &self.episodes,
            &self.ratings,
        ] {
            total.absorb(stage);
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn totals_sum_every_stage() {
        let report = ImportReport {
            titles: StageReport { inserted: 2, unchanged: 1, ..Default::default() },
            episodes: StageReport { updated: 3, skipped: 4, ..Default::default() },
            ratings: StageReport { errors: 1, ..Default::default() },
            ..Default::default()
        };
        let total = report.totals();
        assert_eq!(total.inserted, 2);
        assert_eq!(total.updated, 3);
        assert_eq!(total.unchanged, 1);
        assert_eq!(total.skipped, 4);
        assert_eq!(total.errors, 1);
        assert_eq!(total.writes(), 5);
    }

    #[test]
    fn record_adds_written_counts() {
        let mut stage = StageReport::default();
        stage.record(Written::inserted(5));
        stage.record(Written::updated(2));
        assert_eq!(stage.inserted, 5);
        assert_eq!(stage.updated, 2);
    }
}
