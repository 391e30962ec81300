//! Layer detection: run-length segmentation over ordered signal points.
//!
//! Signal points are sorted by depth and walked once; a new layer starts
//! whenever the identifying key (material, else `color:<c>`) changes from the
//! previous point. The same material recurring after an intervening different
//! material therefore yields two separate layers - segmentation is over the
//! ordered key stream, never a group-by.

use crate::types::{ConfidenceLevel, ExtractedLayer, LayerSource, RawExtraction, SignalPoint};

/// Placeholder material for layers identified only by a color or a thickness
/// pattern. The review step is expected to replace it.
pub const UNKNOWN_MATERIAL: &str = "Unknown";

/// Converts raw signal points into ordered layer records.
#[derive(Debug, Clone)]
pub struct LayerDetector {
    /// End-depth extension for a trailing single-point layer that has no
    /// previous layer to borrow a thickness from.
    ///
    /// Inherited heuristic, kept for compatibility with existing charts; no
    /// geological basis is documented for the value.
    default_extension: f64,
}

impl Default for LayerDetector {
    fn default() -> Self {
        Self { default_extension: 3.0 }
    }
}

impl LayerDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Detect layers from the sorted signal stream.
    ///
    /// Points carrying neither material nor color have no identifying key and
    /// never seed a layer; they still close the run in progress, so a keyless
    /// trailing point pins the bottom of the chart exactly.
    pub fn detect(&self, raw: &RawExtraction, source: LayerSource) -> Vec<ExtractedLayer> {
        let points = sorted_points(&raw.points, |_| true);
        self.segment(&points, source)
    }

    /// Alternative detection that ignores material text and segments purely
    /// by color runs. Used when regular detection yields nothing.
    pub fn detect_color_only(&self, raw: &RawExtraction, source: LayerSource) -> Vec<ExtractedLayer> {
        let stripped: Vec<SignalPoint> = raw
            .points
            .iter()
            .filter(|p| p.color.is_some())
            .map(|p| SignalPoint {
                depth: p.depth,
                material: None,
                color: p.color.clone(),
            })
            .collect();
        let points = sorted_points(&stripped, |_| true);
        self.segment(&points, source)
    }

    /// Last-ditch detection: every consecutive pair of distinct depths
    /// becomes a placeholder layer. Produces low-confidence records that
    /// exist only to be completed by a human.
    pub fn detect_by_thickness(&self, raw: &RawExtraction, source: LayerSource) -> Vec<ExtractedLayer> {
        let mut depths: Vec<f64> = raw.points.iter().map(|p| p.depth).filter(|d| d.is_finite()).collect();
        depths.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        depths.dedup_by(|a, b| (*a - *b).abs() < 1e-9);

        depths
            .windows(2)
            .map(|pair| ExtractedLayer {
                material: UNKNOWN_MATERIAL.to_string(),
                start_depth: pair[0],
                end_depth: pair[1],
                confidence: ConfidenceLevel::Low,
                source,
                original_color: None,
                user_edited: false,
            })
            .collect()
    }

    fn segment(&self, points: &[SignalPoint], source: LayerSource) -> Vec<ExtractedLayer> {
        let mut layers: Vec<ExtractedLayer> = Vec::new();
        let mut run: Option<Run> = None;

        for point in points {
            match point.segment_key() {
                None => {
                    // A keyless point closes the run in progress.
                    if let Some(open) = run.take() {
                        layers.push(open.close(point.depth, source));
                    }
                }
                Some(key) => match &mut run {
                    Some(open) if open.key == key => {
                        open.last = point.depth;
                        if open.color.is_none() {
                            open.color = point.color.clone();
                        }
                    }
                    Some(open) => {
                        layers.push(open.clone().close(point.depth, source));
                        run = Some(Run::start(key, point));
                    }
                    None => run = Some(Run::start(key, point)),
                },
            }
        }

        // A trailing open run with real extent closes at its last point; a
        // zero-thickness trailing run is extended by the previous layer's
        // thickness (default 3.0 when it is the only layer).
        if let Some(open) = run {
            let end = if open.last > open.start + 1e-9 {
                open.last
            } else {
                match layers.last() {
                    Some(prev) => open.start + prev.thickness(),
                    None => open.start + self.default_extension,
                }
            };
            layers.push(open.close(end, source));
        }

        layers
    }
}

/// A layer run in progress during the segmentation walk.
#[derive(Debug, Clone)]
struct Run {
    key: String,
    start: f64,
    last: f64,
    material: Option<String>,
    color: Option<String>,
}

impl Run {
    fn start(key: String, point: &SignalPoint) -> Self {
        Self {
            key,
            start: point.depth,
            last: point.depth,
            material: point.material.clone(),
            color: point.color.clone(),
        }
    }

    fn close(self, end: f64, source: LayerSource) -> ExtractedLayer {
        build_layer(self.start, end, &self.material, &self.color, source)
    }
}

fn sorted_points<F>(points: &[SignalPoint], keep: F) -> Vec<SignalPoint>
where
    F: Fn(&SignalPoint) -> bool,
{
    let mut kept: Vec<SignalPoint> = points
        .iter()
        .filter(|p| p.depth.is_finite() && keep(p))
        .cloned()
        .collect();
    kept.sort_by(|a, b| a.depth.partial_cmp(&b.depth).unwrap_or(std::cmp::Ordering::Equal));
    kept
}

fn build_layer(
    start: f64,
    end: f64,
    material: &Option<String>,
    color: &Option<String>,
    source: LayerSource,
) -> ExtractedLayer {
    let (name, confidence) = match material {
        Some(m) if !m.trim().is_empty() => (m.trim().to_string(), ConfidenceLevel::High),
        _ if color.is_some() => (UNKNOWN_MATERIAL.to_string(), ConfidenceLevel::Medium),
        _ => (UNKNOWN_MATERIAL.to_string(), ConfidenceLevel::Low),
    };
    ExtractedLayer {
        material: name,
        start_depth: start,
        end_depth: end,
        confidence,
        source,
        original_color: color.clone(),
        user_edited: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StructureHints;

    fn raw(points: Vec<SignalPoint>) -> RawExtraction {
        RawExtraction {
            points,
            depth_unit: None,
            structure: StructureHints::default(),
        }
    }

    #[test]
    fn test_single_material_collapses_to_one_layer() {
        let input = raw(vec![
            SignalPoint::with_material(0.0, "Clay"),
            SignalPoint::with_material(5.0, "Clay"),
            SignalPoint::with_material(10.0, "Clay"),
        ]);
        let layers = LayerDetector::new().detect(&input, LayerSource::ExcelImport);
        assert_eq!(layers.len(), 1);
        assert_eq!(layers[0].start_depth, 0.0);
        assert_eq!(layers[0].end_depth, 10.0);
        assert_eq!(layers[0].material, "Clay");
    }

    #[test]
    fn test_recurring_material_yields_separate_layers() {
        let materials = ["A", "A", "A", "B", "B", "B", "A", "A", "A"];
        let points = materials
            .iter()
            .enumerate()
            .map(|(i, m)| SignalPoint::with_material(i as f64, *m))
            .collect();
        let layers = LayerDetector::new().detect(&raw(points), LayerSource::ExcelImport);
        assert_eq!(layers.len(), 3);
        assert_eq!(layers[0].material, "A");
        assert_eq!(layers[1].material, "B");
        assert_eq!(layers[2].material, "A");
    }

    #[test]
    fn test_boundaries_drawn_from_input_depths() {
        let input = raw(vec![
            SignalPoint::with_material(2.0, "Clay"),
            SignalPoint::with_material(7.0, "Sand"),
            SignalPoint::with_material(12.0, "Sand"),
        ]);
        let layers = LayerDetector::new().detect(&input, LayerSource::ExcelImport);
        assert_eq!(layers.first().unwrap().start_depth, 2.0);
        assert_eq!(layers.last().unwrap().end_depth, 12.0);
        for layer in &layers {
            for boundary in [layer.start_depth, layer.end_depth] {
                assert!([2.0, 7.0, 12.0].contains(&boundary));
            }
        }
    }

    #[test]
    fn test_trailing_single_point_extrapolates_previous_thickness() {
        let input = raw(vec![
            SignalPoint::with_material(0.0, "Clay"),
            SignalPoint::with_material(5.0, "Clay"),
            SignalPoint::with_material(10.0, "Sand"),
        ]);
        let layers = LayerDetector::new().detect(&input, LayerSource::ExcelImport);
        assert_eq!(layers.len(), 2);
        assert_eq!(layers[0].end_depth, 10.0);
        // Sand borrows the Clay layer's 10 ft thickness.
        assert_eq!(layers[1].start_depth, 10.0);
        assert_eq!(layers[1].end_depth, 20.0);
    }

    #[test]
    fn test_lone_layer_uses_default_extension() {
        let input = raw(vec![SignalPoint::with_material(5.0, "Fill")]);
        let layers = LayerDetector::new().detect(&input, LayerSource::ExcelImport);
        assert_eq!(layers.len(), 1);
        assert_eq!(layers[0].start_depth, 5.0);
        assert_eq!(layers[0].end_depth, 8.0);
    }

    #[test]
    fn test_keyless_points_do_not_seed_layers() {
        let input = raw(vec![
            SignalPoint::with_material(0.0, "Clay"),
            SignalPoint::with_material(5.0, "Clay"),
            SignalPoint::with_material(10.0, "Sand"),
            SignalPoint::new(20.0),
        ]);
        let layers = LayerDetector::new().detect(&input, LayerSource::ExcelImport);
        assert_eq!(layers.len(), 2);
        assert_eq!(layers[0].material, "Clay");
        assert_eq!(layers[1].material, "Sand");
        assert_eq!(layers[1].start_depth, 10.0);
        assert_eq!(layers[1].end_depth, 20.0);
    }

    #[test]
    fn test_terminator_beats_extrapolation() {
        // The keyless point at 13 pins the Sand bottom; borrowing the Clay
        // thickness would have ended it at 8.
        let input = raw(vec![
            SignalPoint::with_material(0.0, "Clay"),
            SignalPoint::with_material(4.0, "Sand"),
            SignalPoint::new(13.0),
        ]);
        let layers = LayerDetector::new().detect(&input, LayerSource::ExcelImport);
        assert_eq!(layers.len(), 2);
        assert_eq!(layers[1].end_depth, 13.0);
    }

    #[test]
    fn test_keyless_gap_splits_runs() {
        let input = raw(vec![
            SignalPoint::with_material(0.0, "Clay"),
            SignalPoint::new(5.0),
            SignalPoint::with_material(10.0, "Clay"),
            SignalPoint::with_material(15.0, "Clay"),
        ]);
        let layers = LayerDetector::new().detect(&input, LayerSource::ExcelImport);
        assert_eq!(layers.len(), 2);
        assert_eq!(layers[0].end_depth, 5.0);
        assert_eq!(layers[1].start_depth, 10.0);
        assert_eq!(layers[1].end_depth, 15.0);
    }

    #[test]
    fn test_unsorted_input_is_sorted_first() {
        let input = raw(vec![
            SignalPoint::with_material(10.0, "Sand"),
            SignalPoint::with_material(0.0, "Clay"),
            SignalPoint::with_material(5.0, "Clay"),
        ]);
        let layers = LayerDetector::new().detect(&input, LayerSource::ExcelImport);
        assert_eq!(layers[0].material, "Clay");
        assert_eq!(layers[0].start_depth, 0.0);
    }

    #[test]
    fn test_color_run_is_medium_confidence_unknown() {
        let input = raw(vec![
            SignalPoint::with_color(0.0, "gray"),
            SignalPoint::with_color(4.0, "gray"),
            SignalPoint::with_color(8.0, "brown"),
            SignalPoint::with_color(12.0, "brown"),
        ]);
        let layers = LayerDetector::new().detect(&input, LayerSource::PdfImport);
        assert_eq!(layers.len(), 2);
        assert_eq!(layers[0].material, UNKNOWN_MATERIAL);
        assert_eq!(layers[0].confidence, ConfidenceLevel::Medium);
        assert_eq!(layers[0].original_color.as_deref(), Some("gray"));
    }

    #[test]
    fn test_color_only_detection_ignores_material() {
        let input = raw(vec![
            SignalPoint {
                depth: 0.0,
                material: Some("Clay".into()),
                color: Some("gray".into()),
            },
            SignalPoint {
                depth: 5.0,
                material: Some("Sand".into()),
                color: Some("gray".into()),
            },
            SignalPoint::with_color(10.0, "brown"),
        ]);
        let layers = LayerDetector::new().detect_color_only(&input, LayerSource::PdfImport);
        assert_eq!(layers.len(), 2);
        assert_eq!(layers[0].original_color.as_deref(), Some("gray"));
        assert_eq!(layers[0].end_depth, 10.0);
    }

    #[test]
    fn test_thickness_detection_builds_placeholders() {
        let input = raw(vec![
            SignalPoint::new(0.0),
            SignalPoint::new(5.0),
            SignalPoint::new(5.0),
            SignalPoint::new(12.0),
        ]);
        let layers = LayerDetector::new().detect_by_thickness(&input, LayerSource::Fallback);
        assert_eq!(layers.len(), 2);
        assert_eq!(layers[0].confidence, ConfidenceLevel::Low);
        assert_eq!(layers[0].material, UNKNOWN_MATERIAL);
        assert_eq!(layers[1].start_depth, 5.0);
        assert_eq!(layers[1].end_depth, 12.0);
    }

    #[test]
    fn test_empty_input_yields_no_layers() {
        let layers = LayerDetector::new().detect(&raw(vec![]), LayerSource::ExcelImport);
        assert!(layers.is_empty());
    }
}
