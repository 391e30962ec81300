//! Error classification: severity taxonomy and save/abort/review policy.
//!
//! Issues are produced as tagged [`ExtractionIssue`] variants at their source
//! (parser, normalizer, validator), so classification reads a tag instead of
//! re-deriving meaning from free text. A single text-based rule table remains
//! for errors arriving from less-controlled boundaries (third-party format
//! libraries) and is funneled through [`ExtractionIssue::Foreign`].
//!
//! Classification is deterministic: the same issue (or the same message)
//! always yields the same classification.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity taxonomy for extraction findings.
///
/// - `Fatal`: document unreadable, empty, or fundamentally malformed. Abort,
///   no save, no fallback beyond manual entry.
/// - `Recoverable`: depth-sequence or boundary inconsistencies. Automated
///   repair is attempted, else the finding routes to guided correction.
/// - `Warning`: degraded-confidence signals. Never blocks save, always
///   surfaced to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    Warning,
    Recoverable,
    Fatal,
}

/// A finding produced somewhere in the extraction pipeline, tagged at the
/// source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExtractionIssue {
    // Readability and document-level failures. Each of the three readability
    // conditions is a distinct variant with a distinct message so the
    // classifier and fallback manager can react differently.
    EmptyDocument,
    NoDepthsFound,
    NoMaterialsFound,
    UnreadableFile { detail: String },
    CorruptDocument { detail: String },
    UnsupportedFileType { extension: String },

    // Depth-sequence and layer-boundary errors.
    EmptyDepthSequence,
    NonNumericDepths,
    InvalidDepthValue { index: usize, raw: String },
    DepthOutOfRange { index: usize, depth: f64 },
    InvertedLayer { index: usize },
    NoLayersDetected,

    // Degraded-confidence findings.
    NegativeDepth { index: usize, depth: f64 },
    DeepReading { index: usize, depth: f64 },
    UnitUnresolved { raw: String },
    PrecisionLoss { index: usize, delta: f64 },
    InconsistentDirection { increasing: usize, decreasing: usize },
    DuplicateDepth { index: usize, depth: f64 },
    OutlierInterval { index: usize, interval: f64, mean: f64 },
    IrregularIntervals { modal_interval: f64, within_ratio: f64 },
    SequenceOverlap { index: usize, overlap: f64 },
    SequenceGap { index: usize, gap: f64 },
    LayerOverlap { index: usize, overlap: f64 },
    LayerGap { index: usize, gap: f64 },
    UnmatchedMaterial { index: usize },

    /// An error string from an uncontrolled boundary (format library, host).
    /// Severity is derived by the text rule table.
    Foreign { message: String },
}

impl ExtractionIssue {
    /// Severity of this issue. Deterministic per variant; `Foreign` issues
    /// are graded by the default classifier's rule table.
    pub fn severity(&self) -> IssueSeverity {
        use ExtractionIssue::*;
        match self {
            EmptyDocument | NoDepthsFound | NoMaterialsFound | UnreadableFile { .. } | CorruptDocument { .. }
            | UnsupportedFileType { .. } => IssueSeverity::Fatal,
            EmptyDepthSequence
            | NonNumericDepths
            | InvalidDepthValue { .. }
            | DepthOutOfRange { .. }
            | InvertedLayer { .. }
            | NoLayersDetected => IssueSeverity::Recoverable,
            Foreign { message } => ErrorClassifier::text_severity(message),
            _ => IssueSeverity::Warning,
        }
    }

    /// True when the issue is error-grade (fatal or recoverable).
    pub fn is_error(&self) -> bool {
        self.severity() != IssueSeverity::Warning
    }
}

impl fmt::Display for ExtractionIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use ExtractionIssue::*;
        match self {
            EmptyDocument => write!(f, "No text content found in document"),
            NoDepthsFound => write!(f, "No depth values found in document"),
            NoMaterialsFound => write!(f, "No material descriptions found in document"),
            UnreadableFile { detail } => write!(f, "Unreadable file: {}", detail),
            CorruptDocument { detail } => write!(f, "Corrupt document: {}", detail),
            UnsupportedFileType { extension } => write!(f, "Unsupported file type: {}", extension),
            EmptyDepthSequence => write!(f, "No depth values in sequence"),
            NonNumericDepths => write!(f, "Depth sequence contains no numeric values"),
            InvalidDepthValue { index, raw } => {
                write!(f, "Depth value at index {} is not numeric: '{}'", index, raw)
            }
            DepthOutOfRange { index, depth } => {
                write!(f, "Depth {} ft at index {} is outside the valid range 0-1000 ft", depth, index)
            }
            InvertedLayer { index } => {
                write!(f, "Layer {} has start depth greater than end depth", index)
            }
            NoLayersDetected => write!(f, "No layers could be detected from extracted signals"),
            NegativeDepth { index, depth } => write!(f, "Negative depth {} at index {}", depth, index),
            DeepReading { index, depth } => {
                write!(f, "Depth {} ft at index {} exceeds 500 ft", depth, index)
            }
            UnitUnresolved { raw } => write!(f, "Unrecognized depth unit '{}', assuming feet", raw),
            PrecisionLoss { index, delta } => {
                write!(f, "Rounding changed depth at index {} by {}", index, delta)
            }
            InconsistentDirection { increasing, decreasing } => write!(
                f,
                "Inconsistent depth direction: {} increasing vs {} decreasing steps",
                increasing, decreasing
            ),
            DuplicateDepth { index, depth } => write!(f, "Duplicate depth {} at index {}", depth, index),
            OutlierInterval { index, interval, mean } => write!(
                f,
                "Interval {} at index {} exceeds 3x the mean interval {}",
                interval, index, mean
            ),
            IrregularIntervals {
                modal_interval,
                within_ratio,
            } => write!(
                f,
                "Depth intervals are irregular: only {:.0}% within 10% of the modal interval {}",
                within_ratio * 100.0,
                modal_interval
            ),
            SequenceOverlap { index, overlap } => {
                write!(f, "Depth sequence overlaps by {} at index {}", overlap, index)
            }
            SequenceGap { index, gap } => {
                write!(f, "Depth spacing {} at index {} is below the 0.1 ft threshold", gap, index)
            }
            LayerOverlap { index, overlap } => {
                write!(f, "Layer {} overlaps the previous layer by {}", index, overlap)
            }
            LayerGap { index, gap } => {
                write!(f, "Gap of {} between layer {} and the previous layer", gap, index)
            }
            UnmatchedMaterial { index } => {
                write!(f, "Signal at index {} has no matched material description", index)
            }
            Foreign { message } => f.write_str(message),
        }
    }
}

/// Classification of one finding: severity plus the save/abort/review policy
/// it implies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorClassification {
    #[serde(rename = "type")]
    pub severity: IssueSeverity,
    pub should_abort: bool,
    pub allow_save: bool,
    pub force_review: bool,
    pub message: String,
}

/// Aggregated classification over all findings of one extraction.
///
/// `should_abort` is an OR over items; `allow_save` is true only when *no*
/// item withheld it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub classifications: Vec<ErrorClassification>,
    pub should_abort: bool,
    pub allow_save: bool,
    pub force_review: bool,
}

impl ClassificationReport {
    pub fn empty() -> Self {
        Self {
            classifications: Vec::new(),
            should_abort: false,
            allow_save: true,
            force_review: false,
        }
    }
}

/// Maps findings to the severity taxonomy and save/abort/review policy.
#[derive(Debug, Clone, Default)]
pub struct ErrorClassifier;

/// Substring rules for text arriving from uncontrolled boundaries, checked in
/// order against the lowercased message. First match wins; no match grades as
/// a warning.
const FATAL_NEEDLES: &[&str] = &[
    "corrupt",
    "unreadable",
    "invalid format",
    "no data found",
    "no text content",
    "no depth values found",
    "no material descriptions",
    "parsing failure",
    "failed to parse",
    "cannot open",
    "unsupported file type",
];

const RECOVERABLE_NEEDLES: &[&str] = &[
    "validation",
    "sequence",
    "monotonic",
    "inverted",
    "out of range",
    "not numeric",
    "no layers",
];

impl ErrorClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Classify a tagged issue. Same issue, same classification, every run.
    pub fn classify(&self, issue: &ExtractionIssue) -> ErrorClassification {
        let severity = issue.severity();
        let (should_abort, allow_save, force_review) = match severity {
            IssueSeverity::Fatal => (true, false, false),
            IssueSeverity::Recoverable => (false, Self::recoverable_allows_save(issue), true),
            IssueSeverity::Warning => (false, true, false),
        };
        ErrorClassification {
            severity,
            should_abort,
            allow_save,
            force_review,
            message: issue.to_string(),
        }
    }

    /// Text fallback for error strings from uncontrolled boundaries.
    pub fn classify_message(&self, message: &str) -> ErrorClassification {
        self.classify(&ExtractionIssue::Foreign {
            message: message.to_string(),
        })
    }

    /// Aggregate a set of findings into one report.
    pub fn classify_all(&self, issues: &[ExtractionIssue]) -> ClassificationReport {
        let classifications: Vec<ErrorClassification> = issues.iter().map(|i| self.classify(i)).collect();
        let should_abort = classifications.iter().any(|c| c.should_abort);
        let allow_save = classifications.iter().all(|c| c.allow_save);
        let force_review = classifications.iter().any(|c| c.force_review);
        ClassificationReport {
            classifications,
            should_abort,
            allow_save,
            force_review,
        }
    }

    /// Whether a recoverable finding still permits saving. Structural
    /// failures withhold save; value-level findings leave the decision to
    /// the review step.
    fn recoverable_allows_save(issue: &ExtractionIssue) -> bool {
        !matches!(
            issue,
            ExtractionIssue::EmptyDepthSequence
                | ExtractionIssue::NonNumericDepths
                | ExtractionIssue::InvertedLayer { .. }
                | ExtractionIssue::NoLayersDetected
        )
    }

    pub(crate) fn text_severity(message: &str) -> IssueSeverity {
        let lowered = message.to_lowercase();
        if FATAL_NEEDLES.iter().any(|n| lowered.contains(n)) {
            IssueSeverity::Fatal
        } else if RECOVERABLE_NEEDLES.iter().any(|n| lowered.contains(n)) {
            IssueSeverity::Recoverable
        } else {
            IssueSeverity::Warning
        }
    }
}
