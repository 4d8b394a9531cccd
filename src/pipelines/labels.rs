//! Canonical sentiment taxonomy and backend label tables.
//!
//! Every classifier speaks its own label vocabulary (`LABEL_0`, `POSITIVE`,
//! `negative`, ...). A [`LabelMap`] translates that vocabulary into the fixed
//! [`Sentiment`] used by reports, so swapping the classifier never changes
//! the report schema. Labels missing from the table come through as
//! [`Sentiment::Unmapped`] instead of failing the request.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The three canonical sentiment values a label table can map to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    Negative,
    Neutral,
    Positive,
}

/// Canonical sentiment of an analyzed document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Sentiment {
    Negative,
    Neutral,
    Positive,
    /// A backend label with no entry in the active table, kept verbatim.
    Unmapped(String),
}

impl Sentiment {
    pub fn is_mapped(&self) -> bool {
        !matches!(self, Sentiment::Unmapped(_))
    }
}

impl From<Polarity> for Sentiment {
    fn from(polarity: Polarity) -> Self {
        match polarity {
            Polarity::Negative => Sentiment::Negative,
            Polarity::Neutral => Sentiment::Neutral,
            Polarity::Positive => Sentiment::Positive,
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sentiment::Negative => f.write_str("NEGATIVE"),
            Sentiment::Neutral => f.write_str("NEUTRAL"),
            Sentiment::Positive => f.write_str("POSITIVE"),
            Sentiment::Unmapped(raw) => write!(f, "UNMAPPED({raw})"),
        }
    }
}

/// Built-in label tables for commonly deployed sentiment heads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LabelPreset {
    /// Binary heads exported without names: `LABEL_0` negative, `LABEL_1` positive.
    IndexedBinary,
    /// Three-way heads exported without names: `LABEL_0`..`LABEL_2`.
    IndexedThreeWay,
    /// SST-2 style heads: `NEGATIVE` / `POSITIVE`.
    Sst2,
    /// Named three-way heads: `negative` / `neutral` / `positive`.
    NamedThreeWay,
}

/// Fixed mapping from backend label to canonical [`Polarity`].
///
/// Matching is exact and case-sensitive: the table is meant to be reviewed
/// against a backend's documented `id2label`, not guessed at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelMap {
    entries: BTreeMap<String, Polarity>,
}

impl LabelMap {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, Polarity)>,
        S: Into<String>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(label, polarity)| (label.into(), polarity))
                .collect(),
        }
    }

    pub fn preset(preset: LabelPreset) -> Self {
        match preset {
            LabelPreset::IndexedBinary => Self::new([
                ("LABEL_0", Polarity::Negative),
                ("LABEL_1", Polarity::Positive),
            ]),
            LabelPreset::IndexedThreeWay => Self::new([
                ("LABEL_0", Polarity::Negative),
                ("LABEL_1", Polarity::Neutral),
                ("LABEL_2", Polarity::Positive),
            ]),
            LabelPreset::Sst2 => Self::new([
                ("NEGATIVE", Polarity::Negative),
                ("POSITIVE", Polarity::Positive),
            ]),
            LabelPreset::NamedThreeWay => Self::new([
                ("negative", Polarity::Negative),
                ("neutral", Polarity::Neutral),
                ("positive", Polarity::Positive),
            ]),
        }
    }

    /// Maps a raw backend label. Never fails: unknown labels pass through as
    /// [`Sentiment::Unmapped`].
    pub fn normalize(&self, raw_label: &str) -> Sentiment {
        match self.entries.get(raw_label) {
            Some(polarity) => Sentiment::from(*polarity),
            None => Sentiment::Unmapped(raw_label.to_string()),
        }
    }

    /// Backend labels this table knows about.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Labels from a backend's `id2label` that this table would leave unmapped.
    pub fn missing<'a, I>(&self, backend_labels: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        backend_labels
            .into_iter()
            .filter(|label| !self.entries.contains_key(*label))
            .map(str::to_string)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<LabelPreset> for LabelMap {
    fn from(preset: LabelPreset) -> Self {
        LabelMap::preset(preset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(LabelPreset::IndexedBinary, "LABEL_0", Sentiment::Negative)]
    #[case(LabelPreset::IndexedBinary, "LABEL_1", Sentiment::Positive)]
    #[case(LabelPreset::IndexedThreeWay, "LABEL_0", Sentiment::Negative)]
    #[case(LabelPreset::IndexedThreeWay, "LABEL_1", Sentiment::Neutral)]
    #[case(LabelPreset::IndexedThreeWay, "LABEL_2", Sentiment::Positive)]
    #[case(LabelPreset::Sst2, "NEGATIVE", Sentiment::Negative)]
    #[case(LabelPreset::Sst2, "POSITIVE", Sentiment::Positive)]
    #[case(LabelPreset::NamedThreeWay, "negative", Sentiment::Negative)]
    #[case(LabelPreset::NamedThreeWay, "neutral", Sentiment::Neutral)]
    #[case(LabelPreset::NamedThreeWay, "positive", Sentiment::Positive)]
    fn presets_cover_documented_labels(
        #[case] preset: LabelPreset,
        #[case] raw: &str,
        #[case] expected: Sentiment,
    ) {
        assert_eq!(LabelMap::preset(preset).normalize(raw), expected);
    }

    #[rstest]
    #[case(LabelPreset::IndexedBinary, &["LABEL_0", "LABEL_1"])]
    #[case(LabelPreset::IndexedThreeWay, &["LABEL_0", "LABEL_1", "LABEL_2"])]
    #[case(LabelPreset::Sst2, &["NEGATIVE", "POSITIVE"])]
    #[case(LabelPreset::NamedThreeWay, &["negative", "neutral", "positive"])]
    fn presets_are_exhaustive_for_their_backend(
        #[case] preset: LabelPreset,
        #[case] backend_labels: &[&str],
    ) {
        let map = LabelMap::preset(preset);
        assert!(map.missing(backend_labels.iter().copied()).is_empty());
        assert_eq!(map.len(), backend_labels.len());
    }

    #[test]
    fn unknown_label_passes_through() {
        let map = LabelMap::preset(LabelPreset::IndexedThreeWay);
        assert_eq!(
            map.normalize("LABEL_9"),
            Sentiment::Unmapped("LABEL_9".to_string())
        );
    }

    #[test]
    fn matching_is_case_sensitive() {
        let map = LabelMap::preset(LabelPreset::Sst2);
        assert_eq!(
            map.normalize("positive"),
            Sentiment::Unmapped("positive".to_string())
        );
    }

    #[test]
    fn wrong_preset_reports_missing_labels() {
        let map = LabelMap::preset(LabelPreset::IndexedBinary);
        let missing = map.missing(["LABEL_0", "LABEL_1", "LABEL_2"]);
        assert_eq!(missing, vec!["LABEL_2".to_string()]);
    }

    #[test]
    fn display_uses_canonical_names() {
        assert_eq!(Sentiment::Positive.to_string(), "POSITIVE");
        assert_eq!(
            Sentiment::Unmapped("LABEL_9".into()).to_string(),
            "UNMAPPED(LABEL_9)"
        );
    }

    #[test]
    fn table_deserializes_from_plain_mapping() {
        let map: LabelMap =
            serde_json::from_str(r#"{"LABEL_0":"negative","LABEL_1":"positive"}"#).unwrap();
        assert_eq!(map, LabelMap::preset(LabelPreset::IndexedBinary));
    }
}
