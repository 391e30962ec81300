//! Confidence scoring for layers and whole extractions.
//!
//! Per-layer confidence is a function of signal completeness alone: material
//! text earns `high` (with or without a color), a bare color earns `medium`,
//! and `low` is reserved for placeholder layers out of recovery paths.
//!
//! The overall score is a weighted blend of completeness, labeling coverage,
//! validation outcome, and parser-specific structure signals, clamped to
//! `[0, 1]` and bucketed against configurable thresholds.

use crate::types::{
    ConfidenceLevel, ConfidenceReport, ExtractedLayer, SignalKind, SourceFormat, StructureHints,
};

/// Neutral starting score before any evidence is weighed in.
const BASE_SCORE: f64 = 0.3;
/// Bonus when every layer carries a material and a well-formed interval.
const COMPLETENESS_BONUS: f64 = 0.2;
/// Maximum bonus for the fraction of layers with a real material label.
const LABELED_BONUS: f64 = 0.2;
/// Bonus for passing validation.
const VALIDATION_BONUS: f64 = 0.2;
/// Per-error validation penalty, capped.
const VALIDATION_PENALTY_STEP: f64 = 0.1;
const VALIDATION_PENALTY_CAP: f64 = 0.3;
/// Maximum bonus from parser structure signals.
const STRUCTURE_BONUS: f64 = 0.1;
/// Flat per-error penalty, capped.
const ERROR_PENALTY_STEP: f64 = 0.05;
const ERROR_PENALTY_CAP: f64 = 0.2;
/// Columns a fully mapped tabular chart provides (depth, material, color).
const FULL_COLUMN_SET: f64 = 3.0;
/// Text volume at which a position-based source earns the full bonus.
const FULL_TEXT_VOLUME: f64 = 4000.0;

/// Evidence feeding one overall confidence score.
#[derive(Debug, Clone)]
pub struct ScoreInputs<'a> {
    pub layers: &'a [ExtractedLayer],
    pub validation_passed: bool,
    /// Error-grade issue count accumulated across the whole call.
    pub error_count: usize,
    pub structure: &'a StructureHints,
    pub format: Option<SourceFormat>,
}

/// Derives per-layer levels and the overall extraction score.
#[derive(Debug, Clone)]
pub struct ConfidenceScorer {
    min_threshold: f64,
    high_threshold: f64,
}

impl Default for ConfidenceScorer {
    fn default() -> Self {
        Self {
            min_threshold: 0.5,
            high_threshold: 0.8,
        }
    }
}

impl ConfidenceScorer {
    pub fn new(min_threshold: f64, high_threshold: f64) -> Self {
        Self {
            min_threshold,
            high_threshold,
        }
    }

    /// Level implied by a signal point's completeness.
    pub fn layer_level(kind: SignalKind) -> ConfidenceLevel {
        match kind {
            SignalKind::TextOnly | SignalKind::Both => ConfidenceLevel::High,
            SignalKind::ColorOnly => ConfidenceLevel::Medium,
            SignalKind::Neither => ConfidenceLevel::Low,
        }
    }

    /// Weighted overall score for one extraction.
    pub fn score(&self, inputs: &ScoreInputs<'_>) -> ConfidenceReport {
        let mut score = BASE_SCORE;

        let complete = !inputs.layers.is_empty()
            && inputs.layers.iter().all(|l| {
                !l.material.trim().is_empty() && l.start_depth < l.end_depth
            });
        if complete {
            score += COMPLETENESS_BONUS;
        }

        if !inputs.layers.is_empty() {
            let labeled = inputs
                .layers
                .iter()
                .filter(|l| l.material != crate::segment::UNKNOWN_MATERIAL)
                .count();
            score += LABELED_BONUS * labeled as f64 / inputs.layers.len() as f64;
        }

        if inputs.validation_passed {
            score += VALIDATION_BONUS;
        } else {
            score -= (VALIDATION_PENALTY_STEP * inputs.error_count as f64).min(VALIDATION_PENALTY_CAP);
        }

        match inputs.format {
            Some(SourceFormat::Excel) => {
                let ratio = (inputs.structure.mapped_columns as f64 / FULL_COLUMN_SET).min(1.0);
                score += STRUCTURE_BONUS * ratio;
            }
            Some(SourceFormat::Pdf) => {
                let ratio = (inputs.structure.text_length as f64 / FULL_TEXT_VOLUME).min(1.0);
                score += STRUCTURE_BONUS * ratio;
            }
            None => {}
        }

        score -= (ERROR_PENALTY_STEP * inputs.error_count as f64).min(ERROR_PENALTY_CAP);

        let score = score.clamp(0.0, 1.0);
        ConfidenceReport {
            score,
            level: self.level_for(score),
        }
    }

    /// Bucket a score: `low < min ≤ medium < high ≤ high`.
    pub fn level_for(&self, score: f64) -> ConfidenceLevel {
        if score >= self.high_threshold {
            ConfidenceLevel::High
        } else if score >= self.min_threshold {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        }
    }

    /// A human-edited layer is trusted: confidence is forced to `high` and
    /// the edit is marked, regardless of prior state. Returns a new record.
    pub fn update_for_edit(layer: &ExtractedLayer) -> ExtractedLayer {
        let mut edited = layer.clone();
        edited.confidence = ConfidenceLevel::High;
        edited.user_edited = true;
        edited
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LayerSource;

    fn layer(material: &str, start: f64, end: f64, confidence: ConfidenceLevel) -> ExtractedLayer {
        ExtractedLayer {
            material: material.into(),
            start_depth: start,
            end_depth: end,
            confidence,
            source: LayerSource::ExcelImport,
            original_color: None,
            user_edited: false,
        }
    }

    #[test]
    fn test_layer_level_monotonicity() {
        let both = ConfidenceScorer::layer_level(SignalKind::Both);
        let text = ConfidenceScorer::layer_level(SignalKind::TextOnly);
        let color = ConfidenceScorer::layer_level(SignalKind::ColorOnly);
        let neither = ConfidenceScorer::layer_level(SignalKind::Neither);

        assert!(both >= color);
        assert!(text >= color);
        assert_ne!(color, ConfidenceLevel::High);
        assert_eq!(neither, ConfidenceLevel::Low);
    }

    #[test]
    fn test_update_for_edit_invariant() {
        for level in [ConfidenceLevel::Low, ConfidenceLevel::Medium, ConfidenceLevel::High] {
            let edited = ConfidenceScorer::update_for_edit(&layer("Clay", 0.0, 5.0, level));
            assert_eq!(edited.confidence, ConfidenceLevel::High);
            assert!(edited.user_edited);
        }
    }

    #[test]
    fn test_update_for_edit_returns_new_record() {
        let original = layer("Clay", 0.0, 5.0, ConfidenceLevel::Low);
        let edited = ConfidenceScorer::update_for_edit(&original);
        assert!(!original.user_edited);
        assert!(edited.user_edited);
    }

    #[test]
    fn test_bucket_thresholds() {
        let scorer = ConfidenceScorer::default();
        assert_eq!(scorer.level_for(0.49), ConfidenceLevel::Low);
        assert_eq!(scorer.level_for(0.5), ConfidenceLevel::Medium);
        assert_eq!(scorer.level_for(0.79), ConfidenceLevel::Medium);
        assert_eq!(scorer.level_for(0.8), ConfidenceLevel::High);
    }

    #[test]
    fn test_clean_excel_extraction_scores_high() {
        let layers = vec![
            layer("Clay", 0.0, 5.0, ConfidenceLevel::High),
            layer("Sand", 5.0, 10.0, ConfidenceLevel::High),
        ];
        let structure = StructureHints {
            mapped_columns: 3,
            has_header_row: true,
            consistent_column_count: true,
            ..Default::default()
        };
        let report = ConfidenceScorer::default().score(&ScoreInputs {
            layers: &layers,
            validation_passed: true,
            error_count: 0,
            structure: &structure,
            format: Some(SourceFormat::Excel),
        });
        assert_eq!(report.level, ConfidenceLevel::High);
        assert!((report.score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_unlabeled_layers_drag_score_down() {
        let labeled = vec![layer("Clay", 0.0, 5.0, ConfidenceLevel::High)];
        let unlabeled = vec![layer(crate::segment::UNKNOWN_MATERIAL, 0.0, 5.0, ConfidenceLevel::Medium)];
        let structure = StructureHints::default();

        let scorer = ConfidenceScorer::default();
        let base = |layers| {
            scorer
                .score(&ScoreInputs {
                    layers,
                    validation_passed: true,
                    error_count: 0,
                    structure: &structure,
                    format: None,
                })
                .score
        };
        assert!(base(&labeled) > base(&unlabeled));
    }

    #[test]
    fn test_errors_penalize_score() {
        let layers = vec![layer("Clay", 0.0, 5.0, ConfidenceLevel::High)];
        let structure = StructureHints::default();
        let scorer = ConfidenceScorer::default();

        let clean = scorer.score(&ScoreInputs {
            layers: &layers,
            validation_passed: true,
            error_count: 0,
            structure: &structure,
            format: None,
        });
        let dirty = scorer.score(&ScoreInputs {
            layers: &layers,
            validation_passed: false,
            error_count: 4,
            structure: &structure,
            format: None,
        });
        assert!(dirty.score < clean.score);
        // 0.3 validation cap + 0.2 flat cap at most.
        assert!(clean.score - dirty.score <= 0.5 + 0.2 + 1e-9);
    }

    #[test]
    fn test_empty_layers_score_low() {
        let structure = StructureHints::default();
        let report = ConfidenceScorer::default().score(&ScoreInputs {
            layers: &[],
            validation_passed: false,
            error_count: 2,
            structure: &structure,
            format: None,
        });
        assert_eq!(report.level, ConfidenceLevel::Low);
    }

    #[test]
    fn test_score_is_clamped() {
        let structure = StructureHints::default();
        let report = ConfidenceScorer::default().score(&ScoreInputs {
            layers: &[],
            validation_passed: false,
            error_count: 50,
            structure: &structure,
            format: None,
        });
        assert!(report.score >= 0.0);
    }

    #[test]
    fn test_pdf_text_volume_signal() {
        let layers = vec![layer("Clay", 0.0, 5.0, ConfidenceLevel::High)];
        let scorer = ConfidenceScorer::default();
        let sparse = StructureHints {
            text_length: 100,
            ..Default::default()
        };
        let dense = StructureHints {
            text_length: 10_000,
            ..Default::default()
        };
        let score_with = |structure: &StructureHints| {
            scorer
                .score(&ScoreInputs {
                    layers: &layers,
                    validation_passed: true,
                    error_count: 0,
                    structure,
                    format: Some(SourceFormat::Pdf),
                })
                .score
        };
        assert!(score_with(&dense) > score_with(&sparse));
    }
}
