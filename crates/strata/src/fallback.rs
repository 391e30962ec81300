//! Tiered fallback selection and execution.
//!
//! When an extraction fails or lands below the confidence thresholds, the
//! [`FallbackManager`] picks one recovery strategy for the attempt:
//!
//! 1. abort → a non-recoverable strategy, immediately, nothing else tried;
//! 2. `PARTIAL_EXTRACTION` - layers exist and the score clears the partial
//!    threshold: review and complete;
//! 3. `GUIDED_CORRECTION` - the score sits between the minimum and partial
//!    thresholds: walk the user through the flagged findings;
//! 4. `TEMPLATE_BASED` - the source shows structural regularity;
//! 5. `MANUAL_ENTRY` - the universal last resort, side by side with the
//!    original file.
//!
//! Executing a strategy produces a [`RecoverySession`] for the host's review
//! UI. No path saves data silently; every path ends in a human-facing
//! artifact except outright abort.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::classify::{ClassificationReport, ExtractionIssue, IssueSeverity};
use crate::core::config::ExtractorConfig;
use crate::types::{ExtractedLayer, StructureHints};

/// Recovery plan family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FallbackKind {
    PartialExtraction,
    GuidedCorrection,
    TemplateBased,
    ManualEntry,
}

/// Rough effort the user should expect from a recovery plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecoveryEffort {
    Low,
    Medium,
    High,
    None,
}

/// A selected recovery plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallbackStrategy {
    #[serde(rename = "type")]
    pub kind: FallbackKind,
    pub can_recover: bool,
    pub estimated_effort: RecoveryEffort,
    pub user_guidance: String,
}

/// Everything the manager knows about one failed or low-confidence attempt.
#[derive(Debug, Clone, Copy)]
pub struct FallbackContext<'a> {
    pub file_name: &'a str,
    pub layers: &'a [ExtractedLayer],
    pub score: f64,
    pub issues: &'a [ExtractionIssue],
    pub structure: &'a StructureHints,
}

/// One concrete action inside a recovery session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryStep {
    pub action: String,
    pub detail: String,
}

/// Artifact describing the next steps for the external review UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoverySession {
    pub id: String,
    pub strategy: FallbackKind,
    pub guidance: String,
    pub steps: Vec<RecoveryStep>,
    /// The original document, kept available as a side-by-side reference.
    pub reference_file: String,
    /// Layers carried into the review step, possibly incomplete.
    pub prefilled_layers: Vec<ExtractedLayer>,
}

/// Selects and executes recovery strategies.
#[derive(Debug, Clone)]
pub struct FallbackManager {
    partial_threshold: f64,
    minimum_threshold: f64,
    guided_correction: bool,
    template_matching: bool,
}

impl Default for FallbackManager {
    fn default() -> Self {
        Self {
            partial_threshold: 0.5,
            minimum_threshold: 0.3,
            guided_correction: true,
            template_matching: true,
        }
    }
}

impl FallbackManager {
    pub fn from_config(config: &ExtractorConfig) -> Self {
        Self {
            partial_threshold: config.min_confidence_threshold,
            minimum_threshold: config.guided_minimum_threshold,
            guided_correction: config.enable_guided_correction,
            template_matching: config.enable_template_matching,
        }
    }

    /// Pick the recovery strategy for one attempt.
    pub fn select_strategy(&self, ctx: &FallbackContext<'_>, report: &ClassificationReport) -> FallbackStrategy {
        if report.should_abort {
            let detail = report
                .classifications
                .iter()
                .find(|c| c.should_abort)
                .map(|c| c.message.clone())
                .unwrap_or_else(|| "the document could not be read".to_string());
            return FallbackStrategy {
                kind: FallbackKind::ManualEntry,
                can_recover: false,
                estimated_effort: RecoveryEffort::None,
                user_guidance: format!(
                    "Automatic extraction was aborted ({}). Enter the strata manually using '{}' as a reference.",
                    detail, ctx.file_name
                ),
            };
        }

        if !ctx.layers.is_empty() && ctx.score >= self.partial_threshold {
            return FallbackStrategy {
                kind: FallbackKind::PartialExtraction,
                can_recover: true,
                estimated_effort: RecoveryEffort::Low,
                user_guidance: format!(
                    "{} layers were recovered. Review and complete the missing details before saving.",
                    ctx.layers.len()
                ),
            };
        }

        if self.guided_correction && ctx.score >= self.minimum_threshold && ctx.score < self.partial_threshold {
            return FallbackStrategy {
                kind: FallbackKind::GuidedCorrection,
                can_recover: true,
                estimated_effort: RecoveryEffort::Medium,
                user_guidance: guided_guidance(ctx.issues),
            };
        }

        if self.template_matching && shows_structure(ctx.structure) {
            return FallbackStrategy {
                kind: FallbackKind::TemplateBased,
                can_recover: true,
                estimated_effort: RecoveryEffort::Medium,
                user_guidance: "The document layout was recognized. Confirm the detected column mapping and re-run extraction against it.".to_string(),
            };
        }

        FallbackStrategy {
            kind: FallbackKind::ManualEntry,
            can_recover: true,
            estimated_effort: RecoveryEffort::High,
            user_guidance: format!(
                "Automatic extraction was incomplete. Enter the strata manually with '{}' open as a side-by-side reference.",
                ctx.file_name
            ),
        }
    }

    /// Turn a selected strategy into a recovery session for the review UI.
    pub fn execute(&self, strategy: &FallbackStrategy, ctx: &FallbackContext<'_>) -> RecoverySession {
        let steps = match strategy.kind {
            FallbackKind::PartialExtraction => partial_steps(ctx),
            FallbackKind::GuidedCorrection => correction_steps(ctx),
            FallbackKind::TemplateBased => template_steps(ctx),
            FallbackKind::ManualEntry => manual_steps(ctx),
        };

        let prefilled_layers = match strategy.kind {
            FallbackKind::ManualEntry => Vec::new(),
            _ => ctx.layers.to_vec(),
        };

        RecoverySession {
            id: Uuid::new_v4().to_string(),
            strategy: strategy.kind,
            guidance: strategy.user_guidance.clone(),
            steps,
            reference_file: ctx.file_name.to_string(),
            prefilled_layers,
        }
    }
}

fn shows_structure(structure: &StructureHints) -> bool {
    structure.format_recognized && structure.has_header_row && structure.consistent_column_count
}

/// Build the guided-correction guidance: findings grouped by kind,
/// prioritized by severity and then by the number of affected items.
fn guided_guidance(issues: &[ExtractionIssue]) -> String {
    let mut groups: Vec<(IssueSeverity, &'static str, usize)> = Vec::new();
    for issue in issues {
        let label = issue_label(issue);
        let severity = issue.severity();
        match groups.iter_mut().find(|(s, l, _)| *l == label && *s == severity) {
            Some((_, _, count)) => *count += 1,
            None => groups.push((severity, label, 1)),
        }
    }
    groups.sort_by(|a, b| b.0.cmp(&a.0).then(b.2.cmp(&a.2)).then(a.1.cmp(b.1)));

    if groups.is_empty() {
        return "Confidence is low. Review every extracted layer against the source document.".to_string();
    }

    let summary: Vec<String> = groups
        .iter()
        .take(3)
        .map(|(_, label, count)| {
            if *count == 1 {
                format!("1 {}", label)
            } else {
                format!("{} {}s", count, label)
            }
        })
        .collect();
    format!("Correct the flagged findings, starting with: {}.", summary.join(", "))
}

fn issue_label(issue: &ExtractionIssue) -> &'static str {
    use ExtractionIssue::*;
    match issue {
        DuplicateDepth { .. } => "duplicate depth",
        OutlierInterval { .. } => "outlier interval",
        InconsistentDirection { .. } => "direction reversal",
        NegativeDepth { .. } => "negative depth",
        InvalidDepthValue { .. } => "unreadable depth value",
        DepthOutOfRange { .. } => "out-of-range depth",
        InvertedLayer { .. } => "inverted layer",
        LayerOverlap { .. } => "layer overlap",
        LayerGap { .. } => "layer gap",
        SequenceOverlap { .. } => "sequence overlap",
        SequenceGap { .. } => "sub-threshold spacing",
        UnmatchedMaterial { .. } => "unmatched material",
        UnitUnresolved { .. } => "ambiguous unit",
        PrecisionLoss { .. } => "precision loss",
        IrregularIntervals { .. } => "irregular interval",
        _ => "extraction finding",
    }
}

fn partial_steps(ctx: &FallbackContext<'_>) -> Vec<RecoveryStep> {
    let mut steps = vec![RecoveryStep {
        action: "review".to_string(),
        detail: format!("Check the {} extracted layers against the source chart.", ctx.layers.len()),
    }];
    let unlabeled = ctx
        .layers
        .iter()
        .filter(|l| l.material == crate::segment::UNKNOWN_MATERIAL)
        .count();
    if unlabeled > 0 {
        steps.push(RecoveryStep {
            action: "complete".to_string(),
            detail: format!("Assign materials to the {} unlabeled layers.", unlabeled),
        });
    }
    steps.push(RecoveryStep {
        action: "confirm".to_string(),
        detail: "Confirm layer boundaries, then save.".to_string(),
    });
    steps
}

fn correction_steps(ctx: &FallbackContext<'_>) -> Vec<RecoveryStep> {
    let mut flagged: Vec<&ExtractionIssue> = ctx.issues.iter().collect();
    flagged.sort_by(|a, b| b.severity().cmp(&a.severity()));

    let mut steps: Vec<RecoveryStep> = flagged
        .iter()
        .take(8)
        .map(|issue| RecoveryStep {
            action: "fix".to_string(),
            detail: issue.to_string(),
        })
        .collect();
    steps.push(RecoveryStep {
        action: "confirm".to_string(),
        detail: "Re-check the corrected layers, then save.".to_string(),
    });
    steps
}

fn template_steps(ctx: &FallbackContext<'_>) -> Vec<RecoveryStep> {
    vec![
        RecoveryStep {
            action: "confirm-mapping".to_string(),
            detail: format!(
                "Confirm the detected columns ({} recognized) against the chart layout.",
                ctx.structure.mapped_columns
            ),
        },
        RecoveryStep {
            action: "reapply".to_string(),
            detail: "Re-run extraction with the confirmed template.".to_string(),
        },
    ]
}

fn manual_steps(ctx: &FallbackContext<'_>) -> Vec<RecoveryStep> {
    vec![
        RecoveryStep {
            action: "open-reference".to_string(),
            detail: format!("Open '{}' next to the layer editor.", ctx.file_name),
        },
        RecoveryStep {
            action: "enter-layers".to_string(),
            detail: "Enter each layer top-down: material, start depth, end depth.".to_string(),
        },
    ]
}
