//! Format parsers.
//!
//! Each document family contributes an ordered list of [`ParseStrategy`]
//! values - primary first, progressively more permissive alternates after it.
//! The coordinator iterates the list generically; a strategy either returns a
//! readable [`RawExtraction`] or fails the attempt with a `StrataError`.

pub mod signal;

#[cfg(feature = "excel")]
pub mod excel;
#[cfg(feature = "pdf")]
pub mod pdf;

use crate::classify::ExtractionIssue;
use crate::core::config::ExtractorConfig;
use crate::error::{Result, StrataError};
use crate::types::{RawExtraction, SourceFormat};

/// The document under extraction: raw bytes plus the name they arrived with.
#[derive(Debug, Clone, Copy)]
pub struct DocumentInput<'a> {
    pub bytes: &'a [u8],
    pub file_name: &'a str,
}

/// One way of reading a document.
///
/// Strategies are stateless beyond their construction-time configuration and
/// safe to reuse across calls.
pub trait ParseStrategy: Send + Sync {
    /// Short identifier recorded in the attempt log.
    fn name(&self) -> &str;

    /// Try to extract raw signals. Must run the readability check before
    /// returning a success.
    fn attempt(&self, input: &DocumentInput<'_>) -> Result<RawExtraction>;
}

/// Ordered strategy list for a document family, primary first.
pub fn strategies_for(format: SourceFormat, config: &ExtractorConfig) -> Vec<Box<dyn ParseStrategy>> {
    match format {
        #[cfg(feature = "excel")]
        SourceFormat::Excel => excel::strategies(config),
        #[cfg(feature = "pdf")]
        SourceFormat::Pdf => pdf::strategies(config),
        #[allow(unreachable_patterns)]
        _ => Vec::new(),
    }
}

/// Pre-flight test that a parsed document contains enough signal to proceed.
///
/// The three conditions are distinct fatal issues with distinct messages so
/// the classifier and fallback manager can react differently to each.
pub fn readability_check(raw: &RawExtraction) -> Result<()> {
    if raw.structure.text_length == 0 {
        return Err(StrataError::unreadable(ExtractionIssue::EmptyDocument));
    }
    if raw.points.is_empty() {
        return Err(StrataError::unreadable(ExtractionIssue::NoDepthsFound));
    }
    if raw.material_count() == 0 {
        return Err(StrataError::unreadable(ExtractionIssue::NoMaterialsFound));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SignalPoint, StructureHints};

    fn raw_with(points: Vec<SignalPoint>, text_length: usize) -> RawExtraction {
        RawExtraction {
            points,
            depth_unit: None,
            structure: StructureHints {
                text_length,
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_readability_distinct_failures() {
        let empty = raw_with(vec![], 0);
        let err = readability_check(&empty).unwrap_err();
        assert_eq!(err.issue(), Some(&ExtractionIssue::EmptyDocument));

        let no_depths = raw_with(vec![], 120);
        let err = readability_check(&no_depths).unwrap_err();
        assert_eq!(err.issue(), Some(&ExtractionIssue::NoDepthsFound));

        let no_materials = raw_with(vec![SignalPoint::with_color(0.0, "gray")], 120);
        let err = readability_check(&no_materials).unwrap_err();
        assert_eq!(err.issue(), Some(&ExtractionIssue::NoMaterialsFound));
    }

    #[test]
    fn test_readability_passes_with_material_signal() {
        let raw = raw_with(vec![SignalPoint::with_material(0.0, "Clay")], 40);
        assert!(readability_check(&raw).is_ok());
    }
}
