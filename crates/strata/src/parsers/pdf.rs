//! PDF chart parser built on lopdf.
//!
//! PDF charts carry no table structure, so signals are recovered line by
//! line: depth labels anchor a line, and material/color text is correlated by
//! proximity - the nearest line within a maximum distance that carries a
//! description but no depth of its own. Unmatched depth labels keep
//! `material = None` and surface later as low-confidence layers.
//!
//! Three strategies, tried in order by the coordinator:
//!
//! 1. `pdf-layout-text` - single text extraction pass over all pages.
//! 2. `pdf-page-by-page` - per-page extraction that tolerates broken pages.
//! 3. `pdf-relaxed-patterns` - looser depth patterns over the whole text.

use lopdf::Document;

use crate::classify::ExtractionIssue;
use crate::core::config::ExtractorConfig;
use crate::error::{Result, StrataError};
use crate::parsers::signal::{DepthToken, SignalScanner};
use crate::parsers::{DocumentInput, ParseStrategy, readability_check};
use crate::types::{RawExtraction, SignalPoint, StructureHints};

/// Ordered strategy list for position-based sources.
pub fn strategies(config: &ExtractorConfig) -> Vec<Box<dyn ParseStrategy>> {
    vec![
        Box::new(LayoutTextStrategy {
            scanner: SignalScanner::new(config.materials.clone()),
            max_distance: config.max_correlation_distance,
        }),
        Box::new(PageByPageStrategy {
            scanner: SignalScanner::new(config.materials.clone()),
            max_distance: config.max_correlation_distance,
        }),
        Box::new(RelaxedPatternStrategy {
            scanner: SignalScanner::new(config.materials.clone()),
            max_distance: config.max_correlation_distance,
        }),
    ]
}

struct LayoutTextStrategy {
    scanner: SignalScanner,
    max_distance: usize,
}

impl ParseStrategy for LayoutTextStrategy {
    fn name(&self) -> &str {
        "pdf-layout-text"
    }

    fn attempt(&self, input: &DocumentInput<'_>) -> Result<RawExtraction> {
        let doc = load_document(input)?;
        let page_numbers: Vec<u32> = doc.get_pages().keys().copied().collect();

        let text = doc
            .extract_text(&page_numbers)
            .map_err(|e| StrataError::parsing_with_source("PDF text extraction failed", e))?;

        let raw = assemble(&text, page_numbers.len(), &self.scanner, self.max_distance, false);
        readability_check(&raw)?;
        Ok(raw)
    }
}

struct PageByPageStrategy {
    scanner: SignalScanner,
    max_distance: usize,
}

impl ParseStrategy for PageByPageStrategy {
    fn name(&self) -> &str {
        "pdf-page-by-page"
    }

    fn attempt(&self, input: &DocumentInput<'_>) -> Result<RawExtraction> {
        let doc = load_document(input)?;
        let page_numbers: Vec<u32> = doc.get_pages().keys().copied().collect();

        let mut text = String::new();
        let mut readable_pages = 0usize;
        for number in &page_numbers {
            match doc.extract_text(&[*number]) {
                Ok(page_text) => {
                    readable_pages += 1;
                    if !text.is_empty() {
                        text.push('\n');
                    }
                    text.push_str(&page_text);
                }
                Err(e) => {
                    tracing::debug!(page = *number, error = %e, "skipping unreadable PDF page");
                }
            }
        }

        if readable_pages == 0 && !page_numbers.is_empty() {
            return Err(StrataError::unreadable(ExtractionIssue::UnreadableFile {
                detail: "no PDF page could be read".to_string(),
            }));
        }

        let raw = assemble(&text, page_numbers.len(), &self.scanner, self.max_distance, false);
        readability_check(&raw)?;
        Ok(raw)
    }
}

struct RelaxedPatternStrategy {
    scanner: SignalScanner,
    max_distance: usize,
}

impl ParseStrategy for RelaxedPatternStrategy {
    fn name(&self) -> &str {
        "pdf-relaxed-patterns"
    }

    fn attempt(&self, input: &DocumentInput<'_>) -> Result<RawExtraction> {
        let doc = load_document(input)?;
        let page_numbers: Vec<u32> = doc.get_pages().keys().copied().collect();

        let mut text = String::new();
        for number in &page_numbers {
            if let Ok(page_text) = doc.extract_text(&[*number]) {
                if !text.is_empty() {
                    text.push('\n');
                }
                text.push_str(&page_text);
            }
        }

        let raw = assemble(&text, page_numbers.len(), &self.scanner, self.max_distance, true);
        readability_check(&raw)?;
        Ok(raw)
    }
}

fn load_document(input: &DocumentInput<'_>) -> Result<Document> {
    if input.bytes.is_empty() {
        return Err(StrataError::unreadable(ExtractionIssue::UnreadableFile {
            detail: "empty file".to_string(),
        }));
    }
    Document::load_mem(input.bytes).map_err(|e| {
        StrataError::unreadable(ExtractionIssue::UnreadableFile {
            detail: format!("cannot open PDF document: {}", e),
        })
    })
}

/// Per-line signals prior to correlation.
#[derive(Debug, Clone)]
struct LineSignals {
    depth: Option<DepthToken>,
    material: Option<String>,
    color: Option<String>,
}

fn assemble(
    text: &str,
    page_count: usize,
    scanner: &SignalScanner,
    max_distance: usize,
    relaxed: bool,
) -> RawExtraction {
    let lines = scan_lines(text, scanner, relaxed);
    let (points, depth_unit) = correlate(lines, max_distance);

    let lowered = text.to_lowercase();
    let format_recognized = lowered.contains("depth") || lowered.contains("boring") || lowered.contains("strata");

    RawExtraction {
        points,
        depth_unit,
        structure: StructureHints {
            mapped_columns: 0,
            text_length: text.trim().len(),
            has_header_row: false,
            consistent_column_count: false,
            format_recognized,
            page_count,
            sheet_name: None,
        },
    }
}

fn scan_lines(text: &str, scanner: &SignalScanner, relaxed: bool) -> Vec<LineSignals> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| LineSignals {
            depth: if relaxed {
                scanner.scan_depth_relaxed(line)
            } else {
                scanner.scan_depth(line)
            },
            material: scanner.scan_material(line),
            color: scanner.scan_color(line),
        })
        .collect()
}

/// Correlate depth-anchored lines with nearby description lines.
///
/// A depth line missing a material borrows from the nearest line within
/// `max_distance` that has a material but no depth label; each description
/// line is consumed at most once. The line after the anchor is preferred on
/// distance ties, matching how chart labels sit above their descriptions.
fn correlate(mut lines: Vec<LineSignals>, max_distance: usize) -> (Vec<SignalPoint>, Option<String>) {
    let mut points = Vec::new();
    let mut depth_unit: Option<String> = None;
    let mut consumed = vec![false; lines.len()];
    let mut trailing_range_end: Option<f64> = None;

    for index in 0..lines.len() {
        let Some(token) = lines[index].depth.clone() else {
            continue;
        };

        if depth_unit.is_none() {
            depth_unit = token.unit.clone();
        }
        trailing_range_end = token.end;

        let material = match lines[index].material.take() {
            Some(material) => Some(material),
            None => {
                nearest_description(&lines, &consumed, index, max_distance).map(|found| {
                    consumed[found] = true;
                    lines[found].material.clone().unwrap_or_default()
                })
            }
        };

        let color = lines[index]
            .color
            .clone()
            .or_else(|| nearest_color(&lines, index, max_distance));

        points.push(SignalPoint {
            depth: token.value,
            material: material.filter(|m| !m.is_empty()),
            color,
        });
    }

    if let Some(end) = trailing_range_end {
        points.push(SignalPoint::new(end));
    }

    (points, depth_unit)
}

fn nearest_description(lines: &[LineSignals], consumed: &[bool], index: usize, max_distance: usize) -> Option<usize> {
    for distance in 1..=max_distance {
        let below = index + distance;
        if below < lines.len() && !consumed[below] && lines[below].depth.is_none() && lines[below].material.is_some() {
            return Some(below);
        }
        if index >= distance {
            let above = index - distance;
            if !consumed[above] && lines[above].depth.is_none() && lines[above].material.is_some() {
                return Some(above);
            }
        }
    }
    None
}

fn nearest_color(lines: &[LineSignals], index: usize, max_distance: usize) -> Option<String> {
    for distance in 1..=max_distance {
        let below = index + distance;
        if below < lines.len()
            && lines[below].depth.is_none()
            && let Some(color) = &lines[below].color
        {
            return Some(color.clone());
        }
        if index >= distance {
            let above = index - distance;
            if lines[above].depth.is_none()
                && let Some(color) = &lines[above].color
            {
                return Some(color.clone());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assemble_default(text: &str, relaxed: bool) -> RawExtraction {
        assemble(text, 1, &SignalScanner::default(), 2, relaxed)
    }

    #[test]
    fn test_same_line_signals() {
        let text = "Depth: 0 ft gray sandy clay\nDepth: 5 ft brown gravel\n";
        let raw = assemble_default(text, false);
        assert_eq!(raw.points.len(), 2);
        assert_eq!(raw.points[0].material.as_deref(), Some("Sandy Clay"));
        assert_eq!(raw.points[0].color.as_deref(), Some("gray"));
        assert_eq!(raw.points[1].material.as_deref(), Some("Gravel"));
        assert_eq!(raw.depth_unit.as_deref(), Some("ft"));
    }

    #[test]
    fn test_cross_line_correlation_prefers_next_line() {
        let text = "Depth: 0 ft\nstiff CLAY\nDepth: 6 ft\nfine SAND\n";
        let raw = assemble_default(text, false);
        assert_eq!(raw.points.len(), 2);
        assert_eq!(raw.points[0].material.as_deref(), Some("Stiff Clay"));
        assert_eq!(raw.points[1].material.as_deref(), Some("Fine Sand"));
    }

    #[test]
    fn test_description_lines_consumed_once() {
        // One description between two depth labels: only the nearer label
        // gets it, the other stays unmatched.
        let text = "Depth: 0 ft\nsilty SAND\nDepth: 4 ft\nDepth: 9 ft\n";
        let raw = assemble_default(text, false);
        assert_eq!(raw.points.len(), 3);
        let matched = raw.points.iter().filter(|p| p.material.is_some()).count();
        assert_eq!(matched, 1);
        assert_eq!(raw.points[0].material.as_deref(), Some("Silty Sand"));
    }

    #[test]
    fn test_correlation_respects_max_distance() {
        let text = "Depth: 0 ft\n-\n-\n-\nweathered SHALE\n";
        let raw = assemble(text, 1, &SignalScanner::default(), 2, false);
        assert_eq!(raw.points.len(), 1);
        assert_eq!(raw.points[0].material, None);
    }

    #[test]
    fn test_range_labels_pin_chart_bottom() {
        let text = "0 - 5 ft Topsoil\n5 - 18 ft sandy GRAVEL\n";
        let raw = assemble_default(text, false);
        assert_eq!(raw.points.len(), 3);
        assert_eq!(raw.points[2].depth, 18.0);
        assert_eq!(raw.points[2].material, None);
    }

    #[test]
    fn test_relaxed_patterns_catch_prose() {
        let text = "clay observed down to 12 feet\nsand continues past 20 feet\n";
        let strict = assemble_default(text, false);
        assert!(strict.points.is_empty());

        let relaxed = assemble_default(text, true);
        assert_eq!(relaxed.points.len(), 2);
        assert_eq!(relaxed.points[0].depth, 12.0);
        assert_eq!(relaxed.points[0].material.as_deref(), Some("Clay"));
    }

    #[test]
    fn test_format_recognition_hint() {
        let raw = assemble_default("Boring log B-1\nDepth: 0 ft CLAY\n", false);
        assert!(raw.structure.format_recognized);
        assert_eq!(raw.structure.page_count, 1);
    }

    #[test]
    fn test_empty_bytes_unreadable() {
        let strategy = LayoutTextStrategy {
            scanner: SignalScanner::default(),
            max_distance: 2,
        };
        let err = strategy
            .attempt(&DocumentInput {
                bytes: b"",
                file_name: "chart.pdf",
            })
            .unwrap_err();
        assert!(matches!(err, StrataError::Unreadable { .. }));
    }

    #[test]
    fn test_garbage_bytes_unreadable() {
        let strategy = LayoutTextStrategy {
            scanner: SignalScanner::default(),
            max_distance: 2,
        };
        let err = strategy
            .attempt(&DocumentInput {
                bytes: b"definitely not a pdf",
                file_name: "chart.pdf",
            })
            .unwrap_err();
        assert!(matches!(err, StrataError::Unreadable { .. }));
    }
}
