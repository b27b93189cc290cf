use std::collections::HashSet;

use proptest::prelude::*;

use wildlabel::dataset::{from_dataset_csv_str, AggregateOptions, Candidate, CandidateTable};
use wildlabel::dedup::{filter_candidates, filter_file_names};
use wildlabel::history::{labelled_ids, HistoryRecord};
use wildlabel::label::LabelScheme;
use wildlabel::tally::{reconcile, Tally};

const SPECIES: &[&str] = &[
    "Felis catus",
    "Vulpes vulpes",
    "Meles meles",
    "Capreolus capreolus",
];

fn arb_ids(max: usize) -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec((0u16..200).prop_map(|n| n.to_string()), 0..max)
}

fn arb_label() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("Present".to_string()),
        Just("Absent".to_string()),
        Just("Ignore".to_string()),
        "[a-z]{1,6}",
    ]
}

fn config() -> ProptestConfig {
    ProptestConfig {
        cases: 64,
        ..ProptestConfig::default()
    }
}

proptest! {
    #![proptest_config(config())]

    #[test]
    fn dedup_excludes_every_labelled_id(candidates in arb_ids(40), history in arb_ids(40)) {
        let records: Vec<HistoryRecord> = history
            .iter()
            .map(|id| HistoryRecord::new(id.clone(), "Present"))
            .collect();
        let labelled = labelled_ids(&records);

        let table = CandidateTable {
            candidates: candidates.iter().cloned().map(Candidate::from_id).collect(),
        };
        let kept: Vec<String> = filter_candidates(table, &labelled)
            .ids()
            .map(str::to_string)
            .collect();
        let expected: Vec<String> = candidates
            .iter()
            .filter(|id| !labelled.contains(*id))
            .cloned()
            .collect();

        prop_assert!(kept.iter().all(|id| !labelled.contains(id)));
        prop_assert_eq!(&kept, &expected);
        prop_assert_eq!(filter_file_names(candidates, &labelled), expected);
    }

    #[test]
    fn reconcile_matches_label_counts(labels in prop::collection::vec(arb_label(), 0..60)) {
        let records: Vec<HistoryRecord> = labels
            .iter()
            .enumerate()
            .map(|(i, label)| HistoryRecord::new(i.to_string(), label.clone()))
            .collect();

        let expected = Tally::new(
            labels.iter().filter(|l| l.as_str() == "Present").count(),
            labels.iter().filter(|l| l.as_str() == "Absent").count(),
        );
        prop_assert_eq!(reconcile(&records, &LabelScheme::default()), expected);
    }

    #[test]
    fn aggregation_never_keeps_excluded_species(
        rows in prop::collection::vec((0u32..1000, 0usize..SPECIES.len()), 0..50)
    ) {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(["id", "taxon_species_name", "image_url"]).unwrap();
        for (id, species) in &rows {
            writer
                .write_record([id.to_string(), SPECIES[*species].to_string(), format!("https://img.test/{id}.jpg")])
                .unwrap();
        }
        let csv = String::from_utf8(writer.into_inner().unwrap()).unwrap();

        let table = from_dataset_csv_str(&csv, &AggregateOptions::default()).unwrap();
        let kept_species: HashSet<&str> = table
            .candidates
            .iter()
            .filter_map(|c| c.species.as_deref())
            .collect();

        prop_assert!(!kept_species.contains("Felis catus"));
        prop_assert_eq!(
            table.len(),
            rows.iter().filter(|(_, s)| SPECIES[*s] != "Felis catus").count()
        );
    }
}
