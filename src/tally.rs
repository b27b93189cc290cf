//! Running label counts, rebuilt from the history at session start.

use std::fmt;

use serde::Serialize;

use crate::history::HistoryRecord;
use crate::label::{Label, LabelScheme};

/// Counts of Present and Absent decisions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub present: usize,
    pub absent: usize,
}

impl Tally {
    pub fn new(present: usize, absent: usize) -> Self {
        Self { present, absent }
    }

    /// Counts one more decision. `Ignore` leaves the tally unchanged.
    pub fn record(&mut self, label: Label) {
        match label {
            Label::Present => self.present += 1,
            Label::Absent => self.absent += 1,
            Label::Ignore => {}
        }
    }

    pub fn total(&self) -> usize {
        self.present + self.absent
    }

    /// Renders the tally with the scheme's label names.
    pub fn describe(&self, scheme: &LabelScheme) -> String {
        format!(
            "{} count: {}, {} count: {}",
            scheme.present, self.present, scheme.absent, self.absent
        )
    }
}

impl fmt::Display for Tally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Present count: {}, Absent count: {}",
            self.present, self.absent
        )
    }
}

/// Derives the tally from the persisted history.
///
/// Rows whose label matches neither the Present nor the Absent name are not
/// counted.
pub fn reconcile(records: &[HistoryRecord], scheme: &LabelScheme) -> Tally {
    records
        .iter()
        .fold(Tally::default(), |mut tally, record| {
            if let Some(label) = scheme.parse_name(&record.label) {
                tally.record(label);
            }
            tally
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_history_reconciles_to_zero() {
        assert_eq!(reconcile(&[], &LabelScheme::default()), Tally::new(0, 0));
    }

    #[test]
    fn counts_each_label_and_skips_unknown_rows() {
        let records = vec![
            HistoryRecord::new("1", "Present"),
            HistoryRecord::new("2", "Absent"),
            HistoryRecord::new("3", "Present"),
            HistoryRecord::new("4", "Unsure"),
            HistoryRecord::new("5", "Ignore"),
        ];
        assert_eq!(
            reconcile(&records, &LabelScheme::default()),
            Tally::new(2, 1)
        );
    }

    #[test]
    fn renamed_labels_are_counted_by_name() {
        let scheme = LabelScheme {
            present: "Wildlife".to_string(),
            absent: "Empty".to_string(),
            ..Default::default()
        };
        let records = vec![
            HistoryRecord::new("1", "Wildlife"),
            HistoryRecord::new("2", "Present"),
        ];
        let tally = reconcile(&records, &scheme);
        assert_eq!(tally, Tally::new(1, 0));
        assert_eq!(tally.describe(&scheme), "Wildlife count: 1, Empty count: 0");
    }

    #[test]
    fn ignore_does_not_move_the_tally() {
        let mut tally = Tally::default();
        tally.record(Label::Ignore);
        tally.record(Label::Absent);
        assert_eq!(tally, Tally::new(0, 1));
        assert_eq!(tally.total(), 1);
    }
}
