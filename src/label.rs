//! Labels, raw key tokens, and the mapping between them.
//!
//! A key press arrives as a raw key code (`u32`). The [`LabelScheme`] decodes
//! it into one of the three [`Label`] variants, or reports it as
//! [`Decoded::Unrecognized`], which the labelling loop treats as an abort.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::WildlabelError;

/// Key code for `1`.
pub const KEY_ONE: u32 = 49;
/// Key code for `0`.
pub const KEY_ZERO: u32 = 48;
/// Key code for the space bar.
pub const KEY_SPACE: u32 = 32;
/// Key code for Escape.
pub const KEY_ESCAPE: u32 = 27;

/// The closed set of labels an operator can assign.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Label {
    /// Wildlife is visible in the image.
    Present,
    /// No wildlife is visible.
    Absent,
    /// Skip the image without recording anything.
    Ignore,
}

impl Label {
    /// Returns true for labels that are persisted and placed.
    #[inline]
    pub fn is_recorded(self) -> bool {
        !matches!(self, Label::Ignore)
    }
}

/// Result of decoding a raw key code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decoded {
    Label(Label),
    Unrecognized(u32),
}

/// Display names and key bindings for the three labels.
///
/// The names are what end up in the history file and in the output
/// directory tree, so renaming them between sessions splits the tally.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelScheme {
    pub present: String,
    pub absent: String,
    pub ignore: String,
    pub tokens: BTreeMap<u32, Label>,
}

impl Default for LabelScheme {
    fn default() -> Self {
        let mut tokens = BTreeMap::new();
        tokens.insert(KEY_ONE, Label::Present);
        tokens.insert(KEY_ZERO, Label::Absent);
        tokens.insert(KEY_SPACE, Label::Ignore);

        Self {
            present: "Present".to_string(),
            absent: "Absent".to_string(),
            ignore: "Ignore".to_string(),
            tokens,
        }
    }
}

impl LabelScheme {
    /// Decodes a raw key code.
    pub fn decode(&self, token: u32) -> Decoded {
        match self.tokens.get(&token) {
            Some(label) => Decoded::Label(*label),
            None => Decoded::Unrecognized(token),
        }
    }

    /// Returns the configured display name of a label.
    pub fn name(&self, label: Label) -> &str {
        match label {
            Label::Present => &self.present,
            Label::Absent => &self.absent,
            Label::Ignore => &self.ignore,
        }
    }

    /// Maps a persisted label string back to a label, if it matches one.
    pub fn parse_name(&self, name: &str) -> Option<Label> {
        [Label::Present, Label::Absent, Label::Ignore]
            .into_iter()
            .find(|label| self.name(*label) == name)
    }

    /// Checks that the scheme can be used for a session.
    pub fn validate(&self) -> Result<(), WildlabelError> {
        let names = [&self.present, &self.absent, &self.ignore];
        if names.iter().any(|name| name.trim().is_empty()) {
            return Err(WildlabelError::InvalidConfig(
                "label names must not be empty".to_string(),
            ));
        }
        if self.present == self.absent || self.present == self.ignore || self.absent == self.ignore
        {
            return Err(WildlabelError::InvalidConfig(
                "label names must be distinct".to_string(),
            ));
        }

        for required in [Label::Present, Label::Absent] {
            if !self.tokens.values().any(|label| *label == required) {
                return Err(WildlabelError::InvalidConfig(format!(
                    "no key is bound to the '{}' label",
                    self.name(required)
                )));
            }
        }

        Ok(())
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Present => write!(f, "Present"),
            Label::Absent => write!(f, "Absent"),
            Label::Ignore => write!(f, "Ignore"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_scheme_decodes_bound_keys() {
        let scheme = LabelScheme::default();
        assert_eq!(scheme.decode(KEY_ONE), Decoded::Label(Label::Present));
        assert_eq!(scheme.decode(KEY_ZERO), Decoded::Label(Label::Absent));
        assert_eq!(scheme.decode(KEY_SPACE), Decoded::Label(Label::Ignore));
    }

    #[test]
    fn unbound_key_is_unrecognized() {
        let scheme = LabelScheme::default();
        assert_eq!(scheme.decode(KEY_ESCAPE), Decoded::Unrecognized(KEY_ESCAPE));
        assert_eq!(scheme.decode(u32::from('q')), Decoded::Unrecognized(113));
    }

    #[test]
    fn names_round_trip_through_parse() {
        let scheme = LabelScheme {
            present: "Wildlife".to_string(),
            ..Default::default()
        };
        assert_eq!(scheme.parse_name("Wildlife"), Some(Label::Present));
        assert_eq!(scheme.parse_name("Present"), None);
        assert_eq!(scheme.parse_name("Absent"), Some(Label::Absent));
    }

    #[test]
    fn validate_rejects_duplicate_names_and_missing_bindings() {
        let duplicate = LabelScheme {
            absent: "Present".to_string(),
            ..Default::default()
        };
        assert!(duplicate.validate().is_err());

        let mut unbound = LabelScheme::default();
        unbound.tokens.remove(&KEY_ZERO);
        assert!(unbound.validate().is_err());

        assert!(LabelScheme::default().validate().is_ok());
    }

    #[test]
    fn ignore_is_not_recorded() {
        assert!(Label::Present.is_recorded());
        assert!(Label::Absent.is_recorded());
        assert!(!Label::Ignore.is_recorded());
    }
}
