//! Main extraction entry points.
//!
//! [`StrataExtractor`] drives the whole pipeline for one document: file-type
//! detection, the parser strategy chain, depth normalization, validation with
//! automated repair, layer detection with alternates, confidence scoring,
//! error classification, and fallback selection. Parser failures are caught
//! per attempt and logged; validation and classification never throw - the
//! coordinator always produces *some* [`ExtractionResult`], even a failed one
//! with full diagnostic detail. The only errors returned to the caller are
//! I/O failures and unsupported file types.

use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use once_cell::sync::Lazy;
use tracing::{debug, warn};

use crate::classify::{ClassificationReport, ErrorClassifier, ExtractionIssue, IssueSeverity};
use crate::confidence::{ConfidenceScorer, ScoreInputs};
use crate::core::config::ExtractorConfig;
use crate::core::formats;
use crate::error::{Result, StrataError};
use crate::fallback::{FallbackContext, FallbackManager, RecoverySession};
use crate::normalize::DepthNormalizer;
use crate::parsers::{self, DocumentInput};
use crate::segment::LayerDetector;
use crate::types::{
    AttemptOutcome, AttemptRecord, ExtractedLayer, ExtractionMetadata, ExtractionResult, RawExtraction,
    SignalKind, SourceFormat, SupportedFileTypes,
};
use crate::validation::ValidationService;

/// Global Tokio runtime backing the synchronous wrappers.
///
/// Lazily initialized on first use and shared across all sync calls; creating
/// a runtime per call would dwarf the extraction work itself. Failure to
/// build it means the process is already out of resources, so failing fast is
/// the right move.
static GLOBAL_RUNTIME: Lazy<tokio::runtime::Runtime> = Lazy::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to create global Tokio runtime - system may be out of resources")
});

/// Top-level coordinator for the extraction-validate-recover pipeline.
///
/// The instance is reusable across files and safe to share behind `Arc`; all
/// in-flight state lives on the stack of a single call. Only the attempt log
/// of the most recent call is retained, for diagnostics, and cleared by
/// [`reset`](Self::reset).
pub struct StrataExtractor {
    config: ExtractorConfig,
    normalizer: DepthNormalizer,
    validator: ValidationService,
    classifier: ErrorClassifier,
    detector: LayerDetector,
    scorer: ConfidenceScorer,
    fallback: FallbackManager,
    cancel_flag: Option<Arc<AtomicBool>>,
    last_attempts: Mutex<Vec<AttemptRecord>>,
}

impl Default for StrataExtractor {
    fn default() -> Self {
        Self::new(ExtractorConfig::default())
    }
}

impl StrataExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        Self {
            normalizer: DepthNormalizer::new(config.units.clone()),
            validator: ValidationService::new(),
            classifier: ErrorClassifier::new(),
            detector: LayerDetector::new(),
            scorer: ConfidenceScorer::new(config.min_confidence_threshold, config.high_confidence_threshold),
            fallback: FallbackManager::from_config(&config),
            cancel_flag: None,
            last_attempts: Mutex::new(Vec::new()),
            config,
        }
    }

    /// Install a cooperative cancellation flag. The coordinator checks it
    /// between parse attempts; an attempt already running completes.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel_flag = Some(flag);
        self
    }

    pub fn is_file_supported(&self, file_name: &str) -> bool {
        formats::is_file_supported(file_name)
    }

    pub fn supported_file_types(&self) -> SupportedFileTypes {
        formats::supported_file_types()
    }

    /// Extract from a file on disk. IO errors bubble unchanged; an unknown
    /// extension fails with `UnsupportedFormat` before any bytes are read.
    pub async fn extract_file(&self, path: impl AsRef<Path>) -> Result<ExtractionResult> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        if formats::detect_file_type(&file_name).is_none() {
            return Err(unsupported(&file_name));
        }

        let bytes = tokio::fs::read(path).await?;
        self.extract_bytes(&bytes, &file_name).await
    }

    /// Extract from in-memory bytes, dispatching on the file name's
    /// extension.
    pub async fn extract_bytes(&self, bytes: &[u8], file_name: &str) -> Result<ExtractionResult> {
        let Some(format) = formats::detect_file_type(file_name) else {
            return Err(unsupported(file_name));
        };
        Ok(self.run_pipeline(bytes, file_name, format))
    }

    /// Synchronous wrapper over [`extract_file`](Self::extract_file).
    pub fn extract_file_sync(&self, path: impl AsRef<Path>) -> Result<ExtractionResult> {
        GLOBAL_RUNTIME.block_on(self.extract_file(path))
    }

    /// Synchronous wrapper over [`extract_bytes`](Self::extract_bytes).
    pub fn extract_bytes_sync(&self, bytes: &[u8], file_name: &str) -> Result<ExtractionResult> {
        GLOBAL_RUNTIME.block_on(self.extract_bytes(bytes, file_name))
    }

    /// Clear retained diagnostics. Nothing else survives across calls.
    pub fn reset(&self) {
        if let Ok(mut attempts) = self.last_attempts.lock() {
            attempts.clear();
        }
    }

    /// Attempt log of the most recent call.
    pub fn last_attempts(&self) -> Vec<AttemptRecord> {
        self.last_attempts.lock().map(|a| a.clone()).unwrap_or_default()
    }

    /// Post-hoc confidence update for a human-edited layer: always `high`,
    /// always `user_edited`.
    pub fn update_confidence_for_edit(&self, layer: &ExtractedLayer) -> ExtractedLayer {
        ConfidenceScorer::update_for_edit(layer)
    }

    /// Produce a *new* result with one layer replaced by its edited version
    /// and overall confidence re-derived. The input result is not touched.
    pub fn apply_edit(
        &self,
        result: &ExtractionResult,
        index: usize,
        edited: ExtractedLayer,
    ) -> Result<ExtractionResult> {
        let Some(layers) = result.data.as_ref() else {
            return Err(StrataError::validation("Result carries no layers to edit"));
        };
        if index >= layers.len() {
            return Err(StrataError::validation(format!(
                "Layer index {} out of bounds ({} layers)",
                index,
                layers.len()
            )));
        }

        let mut new_layers = layers.clone();
        new_layers[index] = ConfidenceScorer::update_for_edit(&edited);

        let boundary = if self.config.auto_validate {
            self.validator.validate_layer_boundaries(&new_layers)
        } else {
            crate::validation::ValidationReport::ok()
        };
        let issues = boundary.issues.clone();
        let report = self.classifier.classify_all(&issues);
        let (errors, warnings) = split_messages(&report);

        let confidence = self.scorer.score(&ScoreInputs {
            layers: &new_layers,
            validation_passed: boundary.valid,
            error_count: errors.len(),
            structure: &result.metadata.structure,
            format: result.metadata.source_format,
        });

        let success = report.allow_save && confidence.score >= self.config.min_confidence_threshold;

        Ok(ExtractionResult {
            success,
            data: Some(new_layers),
            confidence,
            errors,
            warnings,
            metadata: result.metadata.clone(),
            fallback_strategy: None,
            user_guidance: None,
        })
    }

    /// Build the recovery session for a result that carries a fallback
    /// strategy, for the host's review UI.
    pub fn recovery_session(&self, result: &ExtractionResult) -> Option<RecoverySession> {
        let strategy = result.fallback_strategy.as_ref()?;
        let issues: Vec<ExtractionIssue> = result
            .errors
            .iter()
            .chain(result.warnings.iter())
            .map(|message| ExtractionIssue::Foreign {
                message: message.clone(),
            })
            .collect();
        let empty: Vec<ExtractedLayer> = Vec::new();
        let ctx = FallbackContext {
            file_name: &result.metadata.file_name,
            layers: result.data.as_deref().unwrap_or(&empty),
            score: result.confidence.score,
            issues: &issues,
            structure: &result.metadata.structure,
        };
        Some(self.fallback.execute(strategy, &ctx))
    }

    fn cancelled(&self) -> bool {
        self.cancel_flag
            .as_ref()
            .map(|flag| flag.load(Ordering::Acquire))
            .unwrap_or(false)
    }

    /// The whole pipeline for one document. Never fails: every outcome is an
    /// `ExtractionResult`.
    fn run_pipeline(&self, bytes: &[u8], file_name: &str, format: SourceFormat) -> ExtractionResult {
        let input = DocumentInput { bytes, file_name };
        let mut attempts: Vec<AttemptRecord> = Vec::new();
        let mut issues: Vec<ExtractionIssue> = Vec::new();
        let mut parse_failures: Vec<ExtractionIssue> = Vec::new();
        let mut raw: Option<RawExtraction> = None;

        // (2) parser strategy chain: primary first, alternates after it.
        let strategies = parsers::strategies_for(format, &self.config);
        if strategies.is_empty() {
            issues.push(ExtractionIssue::UnsupportedFileType {
                extension: formats::file_extension(file_name).unwrap_or_default(),
            });
        }

        for strategy in &strategies {
            if self.cancelled() {
                debug!(strategy = strategy.name(), "extraction cancelled between attempts");
                issues.push(ExtractionIssue::Foreign {
                    message: "Extraction cancelled by caller".to_string(),
                });
                break;
            }

            match strategy.attempt(&input) {
                Ok(extraction) => {
                    debug!(strategy = strategy.name(), points = extraction.len(), "parse attempt succeeded");
                    attempts.push(AttemptRecord {
                        strategy: strategy.name().to_string(),
                        outcome: AttemptOutcome::Succeeded {
                            points: extraction.len(),
                        },
                    });
                    raw = Some(extraction);
                    break;
                }
                Err(error) => {
                    debug!(strategy = strategy.name(), %error, "parse attempt failed");
                    attempts.push(AttemptRecord {
                        strategy: strategy.name().to_string(),
                        outcome: AttemptOutcome::Failed {
                            error: error.to_string(),
                        },
                    });
                    parse_failures.push(match error {
                        StrataError::Unreadable { issue } => issue,
                        other => ExtractionIssue::Foreign {
                            message: other.to_string(),
                        },
                    });
                }
            }
        }

        if let Ok(mut log) = self.last_attempts.lock() {
            *log = attempts.clone();
        }

        let Some(raw) = raw else {
            // Failed attempts only matter when nothing succeeded; a primary
            // miss recovered by an alternate is not a finding.
            issues.extend(parse_failures);
            warn!(file = file_name, "all parse strategies exhausted");
            return self.finish(file_name, Some(format), None, &[], issues, false, attempts);
        };

        // Color-only points are unmatched materials by definition.
        for (index, point) in raw.points.iter().enumerate() {
            if point.kind() == SignalKind::ColorOnly {
                issues.push(ExtractionIssue::UnmatchedMaterial { index });
            }
        }

        // (3) normalize depths, then repair what the sequence checks flag.
        let batch = self
            .normalizer
            .normalize_batch_values(&raw.depths(), raw.depth_unit.as_deref());
        issues.extend(batch.issues.clone());

        let interpolated = interpolate_missing(&batch.values);
        let mut points: Vec<crate::types::SignalPoint> = raw
            .points
            .iter()
            .zip(interpolated.iter())
            .filter_map(|(point, value)| {
                value.map(|depth| crate::types::SignalPoint {
                    depth,
                    material: point.material.clone(),
                    color: point.color.clone(),
                })
            })
            .collect();

        let mut validation_passed = true;
        if self.config.auto_validate {
            let depths: Vec<f64> = points.iter().map(|p| p.depth).collect();
            let sequence_report = self.validator.validate_depth_sequence(&depths);
            issues.extend(sequence_report.issues.clone());

            points = repair_sequence(points, &sequence_report.issues);

            // Re-check quietly after repair; only the post-repair verdict
            // feeds the score.
            let repaired: Vec<f64> = points.iter().map(|p| p.depth).collect();
            validation_passed = self.validator.validate_depth_sequence(&repaired).valid;

            let consistency = self.validator.check_depth_interval_consistency(&repaired);
            if !consistency.consistent
                && let Some(modal) = consistency.modal_interval
            {
                issues.push(ExtractionIssue::IrregularIntervals {
                    modal_interval: modal,
                    within_ratio: consistency.within_ratio,
                });
            }

            let mut sorted = repaired.clone();
            sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            issues.extend(self.normalizer.validate_sequence(&sorted));
        }

        let normalized = RawExtraction {
            points,
            depth_unit: Some("ft".to_string()),
            structure: raw.structure.clone(),
        };

        // (4) layer detection, with alternates before giving up.
        let source = format.layer_source();
        let mut layers = self.detector.detect(&normalized, source);
        if layers.is_empty() {
            debug!("run-length detection empty, trying color-only segmentation");
            layers = self.detector.detect_color_only(&normalized, source);
        }
        if layers.is_empty() {
            debug!("color-only detection empty, trying thickness-based segmentation");
            layers = self.detector.detect_by_thickness(&normalized, source);
        }
        if layers.is_empty() {
            issues.push(ExtractionIssue::NoLayersDetected);
        }

        if self.config.auto_validate && !layers.is_empty() {
            let boundary_report = self.validator.validate_layer_boundaries(&layers);
            validation_passed = validation_passed && boundary_report.valid;
            issues.extend(boundary_report.issues);
        }

        self.finish(
            file_name,
            Some(format),
            Some(raw),
            &layers,
            issues,
            validation_passed,
            attempts,
        )
    }

    /// Steps (5)-(7): score, classify, and either succeed or attach a
    /// recovery strategy.
    #[allow(clippy::too_many_arguments)]
    fn finish(
        &self,
        file_name: &str,
        format: Option<SourceFormat>,
        raw: Option<RawExtraction>,
        layers: &[ExtractedLayer],
        issues: Vec<ExtractionIssue>,
        validation_passed: bool,
        attempts: Vec<AttemptRecord>,
    ) -> ExtractionResult {
        let structure = raw.as_ref().map(|r| r.structure.clone()).unwrap_or_default();
        let report = self.classifier.classify_all(&issues);
        let (errors, warnings) = split_messages(&report);

        let confidence = self.scorer.score(&ScoreInputs {
            layers,
            validation_passed,
            error_count: errors.len(),
            structure: &structure,
            format,
        });

        let metadata = ExtractionMetadata {
            file_name: file_name.to_string(),
            source_format: format,
            depth_unit: raw.as_ref().and_then(|r| r.depth_unit.clone()),
            signal_count: raw.as_ref().map(|r| r.len()).unwrap_or(0),
            structure: structure.clone(),
            attempts,
        };

        let success = report.allow_save
            && !report.should_abort
            && !layers.is_empty()
            && confidence.score >= self.config.min_confidence_threshold;

        if success {
            debug!(file = file_name, score = confidence.score, layers = layers.len(), "extraction succeeded");
            return ExtractionResult {
                success: true,
                data: Some(layers.to_vec()),
                confidence,
                errors,
                warnings,
                metadata,
                fallback_strategy: None,
                user_guidance: None,
            };
        }

        let ctx = FallbackContext {
            file_name,
            layers,
            score: confidence.score,
            issues: &issues,
            structure: &structure,
        };
        let strategy = self.fallback.select_strategy(&ctx, &report);
        warn!(
            file = file_name,
            score = confidence.score,
            strategy = ?strategy.kind,
            "extraction incomplete, recovery strategy selected"
        );
        let user_guidance = strategy.user_guidance.clone();

        ExtractionResult {
            success: false,
            data: if layers.is_empty() { None } else { Some(layers.to_vec()) },
            confidence,
            errors,
            warnings,
            metadata,
            fallback_strategy: Some(strategy),
            user_guidance: Some(user_guidance),
        }
    }
}

fn unsupported(file_name: &str) -> StrataError {
    let label = formats::file_extension(file_name)
        .map(|e| format!(".{}", e))
        .unwrap_or_else(|| file_name.to_string());
    StrataError::UnsupportedFormat(label)
}

fn split_messages(report: &ClassificationReport) -> (Vec<String>, Vec<String>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    for classification in &report.classifications {
        if classification.severity == IssueSeverity::Warning {
            warnings.push(classification.message.clone());
        } else {
            errors.push(classification.message.clone());
        }
    }
    (errors, warnings)
}

/// Linear interpolation of interior missing depths; leading and trailing
/// misses stay missing and their points are dropped.
fn interpolate_missing(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut result = values.to_vec();
    for index in 0..result.len() {
        if result[index].is_some() {
            continue;
        }
        let before = result[..index]
            .iter()
            .enumerate()
            .rev()
            .find_map(|(i, v)| v.map(|value| (i, value)));
        let after = values[index + 1..]
            .iter()
            .enumerate()
            .find_map(|(offset, v)| v.map(|value| (index + 1 + offset, value)));
        if let (Some((i, a)), Some((k, b))) = (before, after) {
            let fraction = (index - i) as f64 / (k - i) as f64;
            result[index] = Some(crate::normalize::round2(a + (b - a) * fraction));
        }
    }
    result
}

/// Automated sequence repair: drop exact duplicates, drop a trailing outlier
/// reading. Anything beyond that routes to guided correction instead.
fn repair_sequence(
    points: Vec<crate::types::SignalPoint>,
    issues: &[ExtractionIssue],
) -> Vec<crate::types::SignalPoint> {
    let has_duplicates = issues.iter().any(|i| matches!(i, ExtractionIssue::DuplicateDepth { .. }));
    let trailing_outlier = issues
        .iter()
        .any(|i| matches!(i, ExtractionIssue::OutlierInterval { index, .. } if *index == points.len().saturating_sub(1)));

    let mut repaired = points;

    if has_duplicates {
        let mut seen: Vec<f64> = Vec::new();
        repaired.retain(|point| {
            if seen.iter().any(|d| (d - point.depth).abs() < 1e-9) {
                false
            } else {
                seen.push(point.depth);
                true
            }
        });
    }

    if trailing_outlier && repaired.len() > 2 {
        repaired.pop();
    }

    repaired
}
