//! Source-independent validation of depth sequences and layer boundaries.
//!
//! The validation service never fails: every check returns a structured
//! report of tagged issues so the coordinator can always assemble a full
//! diagnostic result, even for hopeless input.

use serde::{Deserialize, Serialize};

use crate::classify::ExtractionIssue;
use crate::normalize::round2;
use crate::types::ExtractedLayer;

/// Outcome of one validation pass. `valid` means no error-grade issues.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub issues: Vec<ExtractionIssue>,
}

impl ValidationReport {
    pub fn ok() -> Self {
        Self {
            valid: true,
            issues: Vec::new(),
        }
    }

    fn from_issues(issues: Vec<ExtractionIssue>) -> Self {
        let valid = !issues.iter().any(|i| i.is_error());
        Self { valid, issues }
    }

    pub fn error_messages(&self) -> Vec<String> {
        self.issues.iter().filter(|i| i.is_error()).map(|i| i.to_string()).collect()
    }

    pub fn warning_messages(&self) -> Vec<String> {
        self.issues.iter().filter(|i| !i.is_error()).map(|i| i.to_string()).collect()
    }
}

/// Interval-regularity summary for a depth sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntervalConsistency {
    pub consistent: bool,
    /// Most common interval, rounded to 1 decimal place. `None` when the
    /// sequence has fewer than two intervals.
    pub modal_interval: Option<f64>,
    /// Fraction of intervals within 10% of the modal interval.
    pub within_ratio: f64,
}

/// Checks depth-sequence health and layer-boundary health.
#[derive(Debug, Clone)]
pub struct ValidationService {
    /// Intervals beyond this multiple of the mean are flagged as outliers.
    outlier_factor: f64,
    /// Maximum tolerated gap between consecutive layers, in feet.
    gap_tolerance: f64,
    /// Minority/majority step-direction ratio above which the sequence is
    /// flagged as direction-inconsistent.
    direction_ratio: f64,
    /// Relative distance from the modal interval still counted as regular.
    interval_tolerance: f64,
    /// Minimum fraction of regular intervals for a consistent sequence.
    consistency_threshold: f64,
}

impl Default for ValidationService {
    fn default() -> Self {
        Self {
            outlier_factor: 3.0,
            gap_tolerance: 0.1,
            direction_ratio: 0.2,
            interval_tolerance: 0.1,
            consistency_threshold: 0.8,
        }
    }
}

impl ValidationService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate a raw depth sequence in document order.
    pub fn validate_depth_sequence(&self, depths: &[f64]) -> ValidationReport {
        if depths.is_empty() {
            return ValidationReport::from_issues(vec![ExtractionIssue::EmptyDepthSequence]);
        }

        let finite: Vec<(usize, f64)> = depths
            .iter()
            .copied()
            .enumerate()
            .filter(|(_, d)| d.is_finite())
            .collect();
        if finite.is_empty() {
            return ValidationReport::from_issues(vec![ExtractionIssue::NonNumericDepths]);
        }

        let mut issues = Vec::new();

        for (index, depth) in &finite {
            if *depth < 0.0 {
                issues.push(ExtractionIssue::NegativeDepth {
                    index: *index,
                    depth: *depth,
                });
            }
        }

        let mut increasing = 0usize;
        let mut decreasing = 0usize;
        for pair in finite.windows(2) {
            let (_, a) = pair[0];
            let (_, b) = pair[1];
            if b > a {
                increasing += 1;
            } else if b < a {
                decreasing += 1;
            }
        }
        let minority = increasing.min(decreasing);
        let majority = increasing.max(decreasing);
        if minority > 0 && majority > 0 && (minority as f64) / (majority as f64) > self.direction_ratio {
            issues.push(ExtractionIssue::InconsistentDirection { increasing, decreasing });
        }

        for i in 0..finite.len() {
            for j in (i + 1)..finite.len() {
                if (finite[i].1 - finite[j].1).abs() < 1e-9 {
                    issues.push(ExtractionIssue::DuplicateDepth {
                        index: finite[j].0,
                        depth: finite[j].1,
                    });
                    break;
                }
            }
        }

        let intervals: Vec<(usize, f64)> = finite
            .windows(2)
            .map(|pair| (pair[1].0, (pair[1].1 - pair[0].1).abs()))
            .collect();
        if !intervals.is_empty() {
            let mean = intervals.iter().map(|(_, v)| v).sum::<f64>() / intervals.len() as f64;
            if mean > 0.0 {
                for (index, interval) in &intervals {
                    if *interval > self.outlier_factor * mean {
                        issues.push(ExtractionIssue::OutlierInterval {
                            index: *index,
                            interval: round2(*interval),
                            mean: round2(mean),
                        });
                    }
                }
            }
        }

        ValidationReport::from_issues(issues)
    }

    /// Interval-regularity check: the modal interval (rounded to 1 decimal)
    /// must cover at least 80% of intervals within 10%.
    pub fn check_depth_interval_consistency(&self, depths: &[f64]) -> IntervalConsistency {
        let finite: Vec<f64> = depths.iter().copied().filter(|d| d.is_finite()).collect();
        if finite.len() < 3 {
            return IntervalConsistency {
                consistent: true,
                modal_interval: None,
                within_ratio: 1.0,
            };
        }

        let intervals: Vec<f64> = finite.windows(2).map(|p| (p[1] - p[0]).abs()).collect();

        // Modal interval at 1 decimal; smallest value wins a tie for a
        // deterministic outcome.
        let mut counts: Vec<(f64, usize)> = Vec::new();
        for interval in &intervals {
            let rounded = (interval * 10.0).round() / 10.0;
            match counts.iter_mut().find(|(v, _)| (*v - rounded).abs() < 1e-9) {
                Some((_, count)) => *count += 1,
                None => counts.push((rounded, 1)),
            }
        }
        counts.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal)));
        let modal = counts[0].0;

        let within = intervals
            .iter()
            .filter(|interval| {
                if modal == 0.0 {
                    interval.abs() < 1e-9
                } else {
                    (*interval - modal).abs() <= self.interval_tolerance * modal
                }
            })
            .count();
        let within_ratio = within as f64 / intervals.len() as f64;

        IntervalConsistency {
            consistent: within_ratio >= self.consistency_threshold,
            modal_interval: Some(modal),
            within_ratio,
        }
    }

    /// Validate layer boundaries: inverted layers are errors, overlaps and
    /// oversized gaps between consecutive layers are warnings.
    pub fn validate_layer_boundaries(&self, layers: &[ExtractedLayer]) -> ValidationReport {
        if layers.is_empty() {
            return ValidationReport::ok();
        }

        let mut issues = Vec::new();

        let mut order: Vec<usize> = (0..layers.len()).collect();
        order.sort_by(|a, b| {
            layers[*a]
                .start_depth
                .partial_cmp(&layers[*b].start_depth)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        for &index in &order {
            if layers[index].start_depth > layers[index].end_depth {
                issues.push(ExtractionIssue::InvertedLayer { index });
            }
        }

        for pair in order.windows(2) {
            let prev = &layers[pair[0]];
            let cur = &layers[pair[1]];
            let delta = cur.start_depth - prev.end_depth;
            if delta < -1e-9 {
                issues.push(ExtractionIssue::LayerOverlap {
                    index: pair[1],
                    overlap: round2(-delta),
                });
            } else if delta > self.gap_tolerance {
                issues.push(ExtractionIssue::LayerGap {
                    index: pair[1],
                    gap: round2(delta),
                });
            }
        }

        ValidationReport::from_issues(issues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ConfidenceLevel, LayerSource};

    fn layer(start: f64, end: f64) -> ExtractedLayer {
        ExtractedLayer {
            material: "Clay".into(),
            start_depth: start,
            end_depth: end,
            confidence: ConfidenceLevel::High,
            source: LayerSource::ExcelImport,
            original_color: None,
            user_edited: false,
        }
    }

    #[test]
    fn test_empty_sequence_is_invalid() {
        let report = ValidationService::new().validate_depth_sequence(&[]);
        assert!(!report.valid);
        assert!(report.error_messages().iter().any(|m| m.contains("No depth values")));
    }

    #[test]
    fn test_clean_sequence_round_trip() {
        let report = ValidationService::new().validate_depth_sequence(&[0.0, 5.0, 10.0, 15.0]);
        assert!(report.valid);
        assert!(report.issues.is_empty());
    }

    #[test]
    fn test_fully_non_numeric_is_invalid() {
        let report = ValidationService::new().validate_depth_sequence(&[f64::NAN, f64::NAN]);
        assert!(!report.valid);
        assert!(report.issues.contains(&ExtractionIssue::NonNumericDepths));
    }

    #[test]
    fn test_negative_depths_warn_but_stay_valid() {
        let report = ValidationService::new().validate_depth_sequence(&[-2.0, 0.0, 5.0]);
        assert!(report.valid);
        assert!(report.issues.iter().any(|i| matches!(i, ExtractionIssue::NegativeDepth { index: 0, .. })));
    }

    #[test]
    fn test_inconsistent_direction_warns() {
        // 3 increasing vs 2 decreasing steps: 2/3 > 0.2.
        let report = ValidationService::new().validate_depth_sequence(&[0.0, 5.0, 3.0, 8.0, 6.0, 12.0]);
        assert!(report.issues.iter().any(|i| matches!(i, ExtractionIssue::InconsistentDirection { .. })));
    }

    #[test]
    fn test_single_reversal_in_long_run_stays_quiet() {
        // 1 decreasing vs 8 increasing: 1/8 < 0.2.
        let depths = [0.0, 2.0, 4.0, 6.0, 8.0, 7.9, 10.0, 12.0, 14.0, 16.0];
        let report = ValidationService::new().validate_depth_sequence(&depths);
        assert!(!report.issues.iter().any(|i| matches!(i, ExtractionIssue::InconsistentDirection { .. })));
    }

    #[test]
    fn test_duplicate_depths_warn() {
        let report = ValidationService::new().validate_depth_sequence(&[0.0, 5.0, 5.0, 10.0]);
        assert!(report.valid);
        assert!(report.issues.iter().any(|i| matches!(i, ExtractionIssue::DuplicateDepth { index: 2, .. })));
    }

    #[test]
    fn test_outlier_interval_warns() {
        let report = ValidationService::new().validate_depth_sequence(&[0.0, 5.0, 10.0, 15.0, 100.0]);
        assert!(report.valid);
        assert!(report.issues.iter().any(|i| matches!(i, ExtractionIssue::OutlierInterval { index: 4, .. })));
    }

    #[test]
    fn test_interval_consistency_regular() {
        let summary = ValidationService::new().check_depth_interval_consistency(&[0.0, 5.0, 10.0, 15.0, 20.0]);
        assert!(summary.consistent);
        assert_eq!(summary.modal_interval, Some(5.0));
        assert_eq!(summary.within_ratio, 1.0);
    }

    #[test]
    fn test_interval_consistency_irregular() {
        let summary = ValidationService::new().check_depth_interval_consistency(&[0.0, 5.0, 7.0, 20.0, 21.0]);
        assert!(!summary.consistent);
    }

    #[test]
    fn test_short_sequence_trivially_consistent() {
        let summary = ValidationService::new().check_depth_interval_consistency(&[0.0, 5.0]);
        assert!(summary.consistent);
        assert_eq!(summary.modal_interval, None);
    }

    #[test]
    fn test_layer_boundaries_clean() {
        let layers = vec![layer(0.0, 5.0), layer(5.0, 10.0)];
        let report = ValidationService::new().validate_layer_boundaries(&layers);
        assert!(report.valid);
        assert!(report.issues.is_empty());
    }

    #[test]
    fn test_inverted_layer_is_error() {
        let layers = vec![layer(0.0, 5.0), layer(10.0, 7.0)];
        let report = ValidationService::new().validate_layer_boundaries(&layers);
        assert!(!report.valid);
        assert!(report.issues.iter().any(|i| matches!(i, ExtractionIssue::InvertedLayer { index: 1 })));
    }

    #[test]
    fn test_overlap_and_gap_warn() {
        let layers = vec![layer(0.0, 6.0), layer(5.0, 10.0), layer(10.5, 12.0)];
        let report = ValidationService::new().validate_layer_boundaries(&layers);
        assert!(report.valid);
        assert!(report.issues.iter().any(|i| matches!(i, ExtractionIssue::LayerOverlap { index: 1, .. })));
        assert!(report.issues.iter().any(|i| matches!(i, ExtractionIssue::LayerGap { index: 2, .. })));
    }

    #[test]
    fn test_boundaries_checked_in_sorted_order() {
        // Out-of-order input sorts by start depth before pairing.
        let layers = vec![layer(5.0, 10.0), layer(0.0, 5.0)];
        let report = ValidationService::new().validate_layer_boundaries(&layers);
        assert!(report.valid);
        assert!(report.issues.is_empty());
    }
}
