//! Core data model for strata extraction.
//!
//! The pipeline moves through three representations:
//!
//! 1. [`RawExtraction`] - what a format parser saw: depth-keyed signal points
//!    plus structural hints about the source document.
//! 2. [`ExtractedLayer`] - a depth interval with a single material
//!    classification, produced by run-length segmentation.
//! 3. [`ExtractionResult`] - the terminal artifact handed to the host
//!    application: layers, confidence, diagnostics, and (when extraction was
//!    incomplete) a recovery strategy.
//!
//! All host-facing types serialize with the wire names the host's persistence
//! layer expects (`"excel-import"`, `"high"`, …).

use serde::{Deserialize, Serialize};

use crate::fallback::FallbackStrategy;

/// Completeness of one detected signal point.
///
/// Replaces the boolean pair "has text" / "has color": a point either carries
/// material text, a color/fill signal, both, or neither.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    TextOnly,
    ColorOnly,
    Both,
    Neither,
}

/// One detected (depth, material?, color?) tuple prior to layer segmentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalPoint {
    /// Depth of the signal, in the source document's unit until normalized.
    pub depth: f64,
    /// Material description, title-cased, when the source carried one.
    pub material: Option<String>,
    /// Color/fill signal, lowercased, when the source carried one.
    pub color: Option<String>,
}

impl SignalPoint {
    pub fn new(depth: f64) -> Self {
        Self {
            depth,
            material: None,
            color: None,
        }
    }

    pub fn with_material(depth: f64, material: impl Into<String>) -> Self {
        Self {
            depth,
            material: Some(material.into()),
            color: None,
        }
    }

    pub fn with_color(depth: f64, color: impl Into<String>) -> Self {
        Self {
            depth,
            material: None,
            color: Some(color.into()),
        }
    }

    pub fn kind(&self) -> SignalKind {
        match (self.material.is_some(), self.color.is_some()) {
            (true, true) => SignalKind::Both,
            (true, false) => SignalKind::TextOnly,
            (false, true) => SignalKind::ColorOnly,
            (false, false) => SignalKind::Neither,
        }
    }

    /// Identifying key used by run-length segmentation: the material when
    /// present, otherwise `color:<color>`. Points with neither signal have no
    /// key and never seed a layer.
    pub fn segment_key(&self) -> Option<String> {
        if let Some(material) = &self.material {
            let trimmed = material.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
        self.color.as_ref().map(|c| format!("color:{}", c.trim()))
    }
}

/// Structural regularity hints a parser observed while reading the document.
///
/// These feed the parser-specific share of the confidence score and the
/// template-matching gate in the fallback manager.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructureHints {
    /// Number of recognized columns (depth/material/color) in a tabular source.
    #[serde(default)]
    pub mapped_columns: usize,
    /// Total character volume of extracted text in a position-based source.
    #[serde(default)]
    pub text_length: usize,
    /// A header row with recognizable labels was found.
    #[serde(default)]
    pub has_header_row: bool,
    /// All data rows carried the same column count.
    #[serde(default)]
    pub consistent_column_count: bool,
    /// The document matched a known chart layout (labels, units, ranges).
    #[serde(default)]
    pub format_recognized: bool,
    /// Page count for position-based sources.
    #[serde(default)]
    pub page_count: usize,
    /// Sheet the signals were read from, for tabular sources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheet_name: Option<String>,
}

/// Parser output: the raw signal points of one document, prior to
/// normalization and segmentation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawExtraction {
    /// Signal points in document order. Not yet sorted or normalized.
    pub points: Vec<SignalPoint>,
    /// Unit hint for the depth values (`"ft"`, `"m"`, …), when the document
    /// declared one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth_unit: Option<String>,
    /// Structural regularity observed while reading.
    #[serde(default)]
    pub structure: StructureHints,
}

impl RawExtraction {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn depths(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.depth).collect()
    }

    /// Number of points carrying material text.
    pub fn material_count(&self) -> usize {
        self.points.iter().filter(|p| p.material.is_some()).count()
    }

    /// Number of points carrying a color signal.
    pub fn color_count(&self) -> usize {
        self.points.iter().filter(|p| p.color.is_some()).count()
    }
}

/// Qualitative trust bucket for a layer or a whole extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
}

impl ConfidenceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceLevel::Low => "low",
            ConfidenceLevel::Medium => "medium",
            ConfidenceLevel::High => "high",
        }
    }
}

impl std::fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a layer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LayerSource {
    ExcelImport,
    PdfImport,
    Fallback,
}

/// A depth interval assigned a single material classification.
///
/// Invariants: `start_depth < end_depth`; `material` non-empty after trim.
/// Layers from one extraction form a depth-ordered sequence where adjacent
/// layers abut (`end_depth == next.start_depth`); gaps and overlaps are
/// validation findings, not structural violations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedLayer {
    pub material: String,
    pub start_depth: f64,
    pub end_depth: f64,
    pub confidence: ConfidenceLevel,
    pub source: LayerSource,
    pub original_color: Option<String>,
    #[serde(default)]
    pub user_edited: bool,
}

impl ExtractedLayer {
    pub fn thickness(&self) -> f64 {
        self.end_depth - self.start_depth
    }
}

/// Overall extraction confidence: continuous score plus its bucket.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceReport {
    /// Weighted blend in `[0, 1]`.
    pub score: f64,
    pub level: ConfidenceLevel,
}

/// Source document family, derived from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Excel,
    Pdf,
}

impl SourceFormat {
    pub fn layer_source(&self) -> LayerSource {
        match self {
            SourceFormat::Excel => LayerSource::ExcelImport,
            SourceFormat::Pdf => LayerSource::PdfImport,
        }
    }
}

/// Outcome of one parse attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Succeeded { points: usize },
    Failed { error: String },
}

/// One entry of the attempt log: which strategy ran and how it ended.
///
/// Every attempt is recorded for diagnostics, never discarded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub strategy: String,
    #[serde(flatten)]
    pub outcome: AttemptOutcome,
}

/// Diagnostic metadata attached to every extraction result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionMetadata {
    pub file_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_format: Option<SourceFormat>,
    /// Unit the source declared, before conversion to feet.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depth_unit: Option<String>,
    /// Number of signal points the winning parse attempt produced.
    #[serde(default)]
    pub signal_count: usize,
    #[serde(default)]
    pub structure: StructureHints,
    /// Full attempt log, in execution order.
    #[serde(default)]
    pub attempts: Vec<AttemptRecord>,
}

/// Terminal artifact of one extraction call.
///
/// Created fresh per call and immutable once returned; a user edit in the
/// review step produces a *new* result via
/// [`StrataExtractor::apply_edit`](crate::core::engine::StrataExtractor::apply_edit),
/// never a mutation of history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub success: bool,
    pub data: Option<Vec<ExtractedLayer>>,
    pub confidence: ConfidenceReport,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub metadata: ExtractionMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_strategy: Option<FallbackStrategy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_guidance: Option<String>,
}

impl ExtractionResult {
    /// Number of layers recovered, zero when `data` is absent.
    pub fn layer_count(&self) -> usize {
        self.data.as_ref().map_or(0, |layers| layers.len())
    }
}

/// Supported extensions grouped by parser family (§external interface).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupportedFileTypes {
    pub excel: Vec<String>,
    pub pdf: Vec<String>,
}
