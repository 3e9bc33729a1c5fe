//! Lookup tables attached to outcome declarations.
//!
//! Only the table shapes live here; applying a table to a source value is
//! the evaluator's job.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchEntry {
    pub source_value: String,
    pub target_value: String,
}

/// Exact source → target pairs, consulted in table order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MatchTable {
    #[serde(default)]
    pub default_value: Option<String>,
    #[serde(default)]
    pub entries: Vec<MatchEntry>,
}

/// Whether a source equal to a breakpoint selects that breakpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryMode {
    #[default]
    Inclusive,
    Exclusive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterpolationEntry {
    pub source_value: f64,
    /// Per-entry override of the table's boundary mode.
    #[serde(default)]
    pub include_boundary: Option<bool>,
    pub target_value: String,
}

/// Numeric breakpoints; see `apply_lookup_table` in the evaluator.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InterpolationTable {
    #[serde(default)]
    pub default_value: Option<String>,
    #[serde(default)]
    pub boundary: BoundaryMode,
    #[serde(default)]
    pub entries: Vec<InterpolationEntry>,
}

impl InterpolationTable {
    /// Entries sorted by ascending breakpoint. Equal breakpoints keep their
    /// declared order.
    pub fn sorted_entries(&self) -> Vec<&InterpolationEntry> {
        let mut entries: Vec<&InterpolationEntry> = self.entries.iter().collect();
        entries.sort_by(|a, b| a.source_value.total_cmp(&b.source_value));
        entries
    }

    pub fn includes_boundary(&self, entry: &InterpolationEntry) -> bool {
        entry
            .include_boundary
            .unwrap_or(self.boundary == BoundaryMode::Inclusive)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupTable {
    Match(MatchTable),
    Interpolation(InterpolationTable),
}

impl LookupTable {
    pub fn default_value(&self) -> Option<&str> {
        match self {
            LookupTable::Match(t) => t.default_value.as_deref(),
            LookupTable::Interpolation(t) => t.default_value.as_deref(),
        }
    }

    /// Convenience constructor for match tables.
    pub fn matching<'a>(
        entries: impl IntoIterator<Item = (&'a str, &'a str)>,
        default_value: Option<&str>,
    ) -> Self {
        LookupTable::Match(MatchTable {
            default_value: default_value.map(str::to_owned),
            entries: entries
                .into_iter()
                .map(|(s, t)| MatchEntry {
                    source_value: s.to_string(),
                    target_value: t.to_string(),
                })
                .collect(),
        })
    }

    /// Convenience constructor for inclusive interpolation tables.
    pub fn interpolating<'a>(
        entries: impl IntoIterator<Item = (f64, &'a str)>,
        default_value: Option<&str>,
    ) -> Self {
        LookupTable::Interpolation(InterpolationTable {
            default_value: default_value.map(str::to_owned),
            boundary: BoundaryMode::Inclusive,
            entries: entries
                .into_iter()
                .map(|(s, t)| InterpolationEntry {
                    source_value: s,
                    include_boundary: None,
                    target_value: t.to_string(),
                })
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorted_entries_are_ascending() {
        let LookupTable::Interpolation(t) =
            LookupTable::interpolating([(10.0, "c"), (1.0, "a"), (5.0, "b")], None)
        else {
            panic!("expected interpolation table");
        };
        let order: Vec<&str> = t
            .sorted_entries()
            .iter()
            .map(|e| e.target_value.as_str())
            .collect();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn entry_override_beats_table_mode() {
        let mut t = InterpolationTable {
            boundary: BoundaryMode::Exclusive,
            ..InterpolationTable::default()
        };
        t.entries.push(InterpolationEntry {
            source_value: 1.0,
            include_boundary: Some(true),
            target_value: "x".into(),
        });
        assert!(t.includes_boundary(&t.entries[0]));
        t.entries[0].include_boundary = None;
        assert!(!t.includes_boundary(&t.entries[0]));
    }

    #[test]
    fn match_table_from_json() {
        let table: LookupTable = serde_json::from_value(serde_json::json!({
            "match": {
                "default_value": "0",
                "entries": [{ "source_value": "A", "target_value": "1" }]
            }
        }))
        .unwrap();
        assert_eq!(table.default_value(), Some("0"));
    }
}
