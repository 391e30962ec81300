//! Depth normalization.
//!
//! Raw depth value/unit pairs from any parser are funneled through
//! [`DepthNormalizer::normalize`]: coerce to a number, resolve the unit
//! against an injected [`UnitTable`], convert to feet, round to 2 decimal
//! places, and range-check. Each stage short-circuits on failure; everything
//! after the fact is reported as tagged issues, never panics.
//!
//! The unit vocabulary is configuration data handed to the normalizer at
//! construction, so locale-specific tables can coexist.

use serde::{Deserialize, Serialize};

use crate::classify::ExtractionIssue;

/// Highest depth accepted, in feet.
const MAX_DEPTH_FT: f64 = 1000.0;
/// Depths beyond this are suspicious for a strata chart and draw a warning.
const DEEP_WARNING_FT: f64 = 500.0;
/// Tolerance before rounding counts as precision loss.
const PRECISION_TOLERANCE: f64 = 0.001;
/// Minimum meaningful spacing between successive depth boundaries, in feet.
const GAP_THRESHOLD_FT: f64 = 0.1;

/// One unit with its aliases and its fixed multiplier to feet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitEntry {
    pub aliases: Vec<String>,
    pub to_feet: f64,
}

/// Injected unit vocabulary. Resolution is exact alias match first, then
/// substring partial match, longest alias first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitTable {
    pub entries: Vec<UnitEntry>,
}

impl Default for UnitTable {
    fn default() -> Self {
        Self {
            entries: vec![
                UnitEntry {
                    aliases: vec!["ft".into(), "feet".into(), "foot".into(), "'".into()],
                    to_feet: 1.0,
                },
                UnitEntry {
                    aliases: vec![
                        "m".into(),
                        "meter".into(),
                        "meters".into(),
                        "metre".into(),
                        "metres".into(),
                    ],
                    to_feet: 3.28084,
                },
            ],
        }
    }
}

impl UnitTable {
    /// Resolve a raw unit string to its feet multiplier. `None` when the
    /// string matches nothing in the table.
    pub fn resolve(&self, raw: &str) -> Option<f64> {
        let needle = raw.trim().trim_matches('.').trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }

        for entry in &self.entries {
            if entry.aliases.iter().any(|a| a.to_lowercase() == needle) {
                return Some(entry.to_feet);
            }
        }

        // Partial pass: longest aliases first so "meters" wins over "metre".
        // Single-character aliases only participate in exact matching; "m"
        // as a substring would claim words like "fathoms".
        let mut candidates: Vec<(&str, f64)> = self
            .entries
            .iter()
            .flat_map(|e| e.aliases.iter().map(move |a| (a.as_str(), e.to_feet)))
            .filter(|(a, _)| a.len() >= 2)
            .collect();
        candidates.sort_by_key(|(a, _)| std::cmp::Reverse(a.len()));

        for (alias, to_feet) in candidates {
            let alias_lower = alias.to_lowercase();
            if needle.contains(&alias_lower) || alias_lower.contains(&needle) {
                return Some(to_feet);
            }
        }
        None
    }
}

/// Outcome of normalizing one depth value.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedDepth {
    /// Canonical depth in feet, rounded to 2 decimal places. `None` when a
    /// stage failed.
    pub value: Option<f64>,
    pub issues: Vec<ExtractionIssue>,
}

impl NormalizedDepth {
    pub fn success(&self) -> bool {
        self.value.is_some()
    }

    pub fn errors(&self) -> Vec<&ExtractionIssue> {
        self.issues.iter().filter(|i| i.is_error()).collect()
    }

    pub fn warnings(&self) -> Vec<&ExtractionIssue> {
        self.issues.iter().filter(|i| !i.is_error()).collect()
    }
}

/// Outcome of normalizing a batch. `values` is index-aligned with the input;
/// issues carry their original index for traceable messages.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome {
    pub values: Vec<Option<f64>>,
    pub issues: Vec<ExtractionIssue>,
}

impl BatchOutcome {
    pub fn all_ok(&self) -> bool {
        self.values.iter().all(|v| v.is_some())
    }
}

/// Parses raw depth value/unit pairs into canonical feet.
#[derive(Debug, Clone, Default)]
pub struct DepthNormalizer {
    units: UnitTable,
}

impl DepthNormalizer {
    pub fn new(units: UnitTable) -> Self {
        Self { units }
    }

    /// Normalize one raw depth string. The unit may come from a column
    /// header or a per-cell suffix; `None` means feet.
    pub fn normalize(&self, raw: &str, unit: Option<&str>) -> NormalizedDepth {
        self.normalize_indexed(raw, unit, 0)
    }

    /// Normalize with the value's original index, for batch traceability.
    pub fn normalize_indexed(&self, raw: &str, unit: Option<&str>, index: usize) -> NormalizedDepth {
        let cleaned: String = raw.chars().filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-').collect();

        let parsed = if cleaned.is_empty() { None } else { cleaned.parse::<f64>().ok() };

        match parsed {
            Some(value) => self.normalize_value_indexed(value, unit, index),
            None => NormalizedDepth {
                value: None,
                issues: vec![ExtractionIssue::InvalidDepthValue {
                    index,
                    raw: raw.to_string(),
                }],
            },
        }
    }

    /// Normalize an already-numeric depth.
    pub fn normalize_value(&self, value: f64, unit: Option<&str>) -> NormalizedDepth {
        self.normalize_value_indexed(value, unit, 0)
    }

    pub fn normalize_value_indexed(&self, value: f64, unit: Option<&str>, index: usize) -> NormalizedDepth {
        let mut issues = Vec::new();

        if !value.is_finite() {
            return NormalizedDepth {
                value: None,
                issues: vec![ExtractionIssue::InvalidDepthValue {
                    index,
                    raw: value.to_string(),
                }],
            };
        }

        let multiplier = match unit {
            None => 1.0,
            Some(raw_unit) => match self.units.resolve(raw_unit) {
                Some(m) => m,
                None => {
                    issues.push(ExtractionIssue::UnitUnresolved {
                        raw: raw_unit.to_string(),
                    });
                    1.0
                }
            },
        };

        let in_feet = value * multiplier;
        let rounded = round2(in_feet);

        if rounded < 0.0 || rounded > MAX_DEPTH_FT {
            issues.push(ExtractionIssue::DepthOutOfRange { index, depth: rounded });
            return NormalizedDepth { value: None, issues };
        }

        if rounded > DEEP_WARNING_FT {
            issues.push(ExtractionIssue::DeepReading { index, depth: rounded });
        }

        if (rounded - in_feet).abs() > PRECISION_TOLERANCE {
            issues.push(ExtractionIssue::PrecisionLoss {
                index,
                delta: round4(rounded - in_feet),
            });
        }

        NormalizedDepth {
            value: Some(rounded),
            issues,
        }
    }

    /// Normalize a batch of raw strings with one shared unit hint.
    pub fn normalize_batch<S: AsRef<str>>(&self, raws: &[S], unit: Option<&str>) -> BatchOutcome {
        let mut values = Vec::with_capacity(raws.len());
        let mut issues = Vec::new();
        for (index, raw) in raws.iter().enumerate() {
            let outcome = self.normalize_indexed(raw.as_ref(), unit, index);
            values.push(outcome.value);
            issues.extend(outcome.issues);
        }
        BatchOutcome { values, issues }
    }

    /// Normalize a batch of numeric depths with one shared unit hint.
    pub fn normalize_batch_values(&self, depths: &[f64], unit: Option<&str>) -> BatchOutcome {
        let mut values = Vec::with_capacity(depths.len());
        let mut issues = Vec::new();
        for (index, depth) in depths.iter().enumerate() {
            let outcome = self.normalize_value_indexed(*depth, unit, index);
            values.push(outcome.value);
            issues.extend(outcome.issues);
        }
        BatchOutcome { values, issues }
    }

    /// Check successive boundary values for overlaps (a later boundary above
    /// an earlier one) and sub-threshold spacing. Each finding is tagged with
    /// the index of the offending pair's second element.
    pub fn validate_sequence(&self, boundaries: &[f64]) -> Vec<ExtractionIssue> {
        let mut issues = Vec::new();
        for index in 1..boundaries.len() {
            let delta = boundaries[index] - boundaries[index - 1];
            if delta < -1e-9 {
                issues.push(ExtractionIssue::SequenceOverlap {
                    index,
                    overlap: round2(-delta),
                });
            } else if delta < GAP_THRESHOLD_FT {
                issues.push(ExtractionIssue::SequenceGap {
                    index,
                    gap: round2(delta),
                });
            }
        }
        issues
    }
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}
