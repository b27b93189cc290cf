//! Removal of already-labelled candidates.

use crate::dataset::{Candidate, CandidateTable};
use crate::history::LabelledIds;

/// Something that can be matched against the labelling history.
pub trait Identified {
    fn identifier(&self) -> &str;
}

impl Identified for Candidate {
    fn identifier(&self) -> &str {
        &self.id
    }
}

/// A file name in the staging directory is its own identifier.
impl Identified for String {
    fn identifier(&self) -> &str {
        self
    }
}

/// Keeps only items whose identifier has no recorded label, in order.
pub fn filter_unlabelled<T: Identified>(items: Vec<T>, labelled: &LabelledIds) -> Vec<T> {
    items
        .into_iter()
        .filter(|item| !labelled.contains(item.identifier()))
        .collect()
}

/// Drops labelled rows from an aggregated candidate table.
pub fn filter_candidates(table: CandidateTable, labelled: &LabelledIds) -> CandidateTable {
    CandidateTable {
        candidates: filter_unlabelled(table.candidates, labelled),
    }
}

/// Drops labelled files from a staging directory listing.
pub fn filter_file_names(file_names: Vec<String>, labelled: &LabelledIds) -> Vec<String> {
    filter_unlabelled(file_names, labelled)
}
