//! Strata - Borehole Chart Extraction Library
//!
//! Strata converts borehole strata charts supplied as spreadsheet or PDF
//! documents into normalized, depth-ordered geological layer sequences. The
//! pipeline tolerates malformed, ambiguous, or partially unreadable source
//! documents without ever fabricating data: every extraction ends in a
//! confidence-annotated result, and incomplete extractions carry a staged
//! recovery strategy instead of a bare failure.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use strata::{ExtractorConfig, StrataExtractor};
//!
//! # fn main() -> strata::Result<()> {
//! let extractor = StrataExtractor::new(ExtractorConfig::default());
//! let result = extractor.extract_file_sync("boring_log.xlsx")?;
//! println!("{} layers, confidence {}", result.layer_count(), result.confidence.level);
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! Data flows strictly upward:
//!
//! - **Parsers** (`parsers`): format strategies producing raw signal points
//! - **Normalizer** (`normalize`): depth unit resolution and range checks
//! - **Validation** (`validation`): sequence and boundary health
//! - **Detection** (`segment`) and **scoring** (`confidence`)
//! - **Classification** (`classify`): fatal / recoverable / warning policy
//! - **Fallback** (`fallback`): staged recovery selection
//! - **Coordinator** (`core::engine`): the only entry point external callers
//!   use

#![deny(unsafe_code)]

pub mod classify;
pub mod confidence;
pub mod core;
pub mod error;
pub mod fallback;
pub mod normalize;
pub mod parsers;
pub mod segment;
pub mod types;
pub mod validation;

pub use error::{Result, StrataError};
pub use types::*;

pub use classify::{ClassificationReport, ErrorClassification, ErrorClassifier, ExtractionIssue, IssueSeverity};
pub use confidence::ConfidenceScorer;
pub use core::config::ExtractorConfig;
pub use core::engine::StrataExtractor;
pub use core::formats::{detect_file_type, is_file_supported, supported_file_types};
pub use fallback::{FallbackKind, FallbackManager, FallbackStrategy, RecoveryEffort, RecoverySession};
pub use normalize::{DepthNormalizer, UnitTable};
pub use parsers::signal::MaterialVocabulary;
pub use segment::LayerDetector;
pub use validation::{ValidationReport, ValidationService};
