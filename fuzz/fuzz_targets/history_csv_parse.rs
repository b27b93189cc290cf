//! Fuzz target for labelling history parsing.

#![no_main]

use libfuzzer_sys::fuzz_target;
use wildlabel::history::from_history_csv_slice;
use wildlabel::label::LabelScheme;
use wildlabel::tally::reconcile;

fuzz_target!(|data: &[u8]| {
    if data.len() > 10 * 1024 * 1024 {
        return;
    }

    if let Ok(records) = from_history_csv_slice(data) {
        let tally = reconcile(&records, &LabelScheme::default());
        assert!(tally.total() <= records.len());
    }
});
