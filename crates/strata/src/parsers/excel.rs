//! Tabular chart parser (XLSX, XLS, CSV) built on calamine.
//!
//! Three strategies, tried in order by the coordinator:
//!
//! 1. `excel-primary-sheet` - first sheet, recognizable header row required.
//! 2. `excel-alternate-sheets` - every sheet, first one that maps and yields
//!    signal points wins.
//! 3. `excel-relaxed-scan` - no header required; every cell is scanned for
//!    depth patterns, materials and colors are taken from sibling cells.

use std::io::Cursor;

use calamine::{Data, Range, Reader};

use crate::classify::ExtractionIssue;
use crate::core::config::ExtractorConfig;
use crate::core::formats;
use crate::error::{Result, StrataError};
use crate::parsers::signal::{DepthToken, SignalScanner};
use crate::parsers::{DocumentInput, ParseStrategy, readability_check};
use crate::types::{RawExtraction, SignalPoint, StructureHints};

/// Header synonyms for the depth column.
const DEPTH_HEADERS: &[&str] = &["depth", "from", "top", "start", "elevation"];
/// Header synonyms for the material column.
const MATERIAL_HEADERS: &[&str] = &["material", "soil", "description", "strata", "lithology", "type"];
/// Header synonyms for the color/fill column.
const COLOR_HEADERS: &[&str] = &["color", "colour", "fill"];

/// Ordered strategy list for tabular sources.
pub fn strategies(config: &ExtractorConfig) -> Vec<Box<dyn ParseStrategy>> {
    vec![
        Box::new(PrimarySheetStrategy {
            scanner: SignalScanner::new(config.materials.clone()),
        }),
        Box::new(AlternateSheetStrategy {
            scanner: SignalScanner::new(config.materials.clone()),
        }),
        Box::new(RelaxedCellScanStrategy {
            scanner: SignalScanner::new(config.materials.clone()),
        }),
    ]
}

/// One sheet reduced to stringified cells. `None` marks an empty cell.
struct SheetData {
    name: String,
    rows: Vec<Vec<Option<String>>>,
}

impl SheetData {
    fn text_length(&self) -> usize {
        self.rows
            .iter()
            .flatten()
            .map(|cell| cell.as_deref().map_or(0, str::len))
            .sum()
    }
}

/// Recognized columns of one sheet.
struct ColumnMap {
    header_row: usize,
    depth: usize,
    material: Option<usize>,
    color: Option<usize>,
    unit_hint: Option<String>,
}

impl ColumnMap {
    fn mapped_columns(&self) -> usize {
        1 + usize::from(self.material.is_some()) + usize::from(self.color.is_some())
    }
}

struct PrimarySheetStrategy {
    scanner: SignalScanner,
}

impl ParseStrategy for PrimarySheetStrategy {
    fn name(&self) -> &str {
        "excel-primary-sheet"
    }

    fn attempt(&self, input: &DocumentInput<'_>) -> Result<RawExtraction> {
        let sheets = load_sheets(input)?;
        let Some(sheet) = sheets.first() else {
            return Err(StrataError::unreadable(ExtractionIssue::EmptyDocument));
        };

        let map = map_columns(&sheet.rows).ok_or_else(|| {
            StrataError::parsing(format!(
                "No recognizable depth/material columns in sheet '{}'",
                sheet.name
            ))
        })?;

        let raw = extract_mapped(sheet, &map, &self.scanner);
        readability_check(&raw)?;
        Ok(raw)
    }
}

struct AlternateSheetStrategy {
    scanner: SignalScanner,
}

impl ParseStrategy for AlternateSheetStrategy {
    fn name(&self) -> &str {
        "excel-alternate-sheets"
    }

    fn attempt(&self, input: &DocumentInput<'_>) -> Result<RawExtraction> {
        let sheets = load_sheets(input)?;

        for sheet in &sheets {
            let Some(map) = map_columns(&sheet.rows) else {
                continue;
            };
            let raw = extract_mapped(sheet, &map, &self.scanner);
            if !raw.points.is_empty() {
                readability_check(&raw)?;
                return Ok(raw);
            }
        }

        Err(StrataError::parsing(
            "No sheet with recognizable strata columns".to_string(),
        ))
    }
}

struct RelaxedCellScanStrategy {
    scanner: SignalScanner,
}

impl ParseStrategy for RelaxedCellScanStrategy {
    fn name(&self) -> &str {
        "excel-relaxed-scan"
    }

    fn attempt(&self, input: &DocumentInput<'_>) -> Result<RawExtraction> {
        let sheets = load_sheets(input)?;

        // Sheets carry independent depth scales; keep the richest one instead
        // of conflating them.
        let best = sheets
            .iter()
            .map(|sheet| relaxed_scan(sheet, &self.scanner))
            .max_by_key(|raw| raw.points.len());

        match best {
            Some(raw) => {
                readability_check(&raw)?;
                Ok(raw)
            }
            None => Err(StrataError::unreadable(ExtractionIssue::EmptyDocument)),
        }
    }
}

/// Decode the workbook into stringified sheets. Fatal when the document
/// cannot be opened at all.
fn load_sheets(input: &DocumentInput<'_>) -> Result<Vec<SheetData>> {
    let extension = formats::file_extension(input.file_name).unwrap_or_else(|| "xlsx".to_string());

    match extension.as_str() {
        "csv" => parse_csv(input.bytes),
        "xls" => {
            let workbook = calamine::Xls::new(Cursor::new(input.bytes)).map_err(|e| {
                StrataError::unreadable(ExtractionIssue::UnreadableFile {
                    detail: format!("cannot open XLS workbook: {}", e),
                })
            })?;
            Ok(collect_sheets(workbook))
        }
        _ => {
            let workbook = calamine::Xlsx::new(Cursor::new(input.bytes)).map_err(|e| {
                StrataError::unreadable(ExtractionIssue::UnreadableFile {
                    detail: format!("cannot open XLSX workbook: {}", e),
                })
            })?;
            Ok(collect_sheets(workbook))
        }
    }
}

fn collect_sheets<RS, R>(mut workbook: R) -> Vec<SheetData>
where
    RS: std::io::Read + std::io::Seek,
    R: Reader<RS>,
{
    let sheet_names = workbook.sheet_names();
    let mut sheets = Vec::with_capacity(sheet_names.len());

    for name in &sheet_names {
        if let Ok(range) = workbook.worksheet_range(name) {
            sheets.push(SheetData {
                name: name.clone(),
                rows: range_rows(&range),
            });
        }
    }

    sheets
}

fn range_rows(range: &Range<Data>) -> Vec<Vec<Option<String>>> {
    range
        .rows()
        .map(|row| row.iter().map(cell_text).collect())
        .collect()
}

fn cell_text(data: &Data) -> Option<String> {
    match data {
        Data::Empty => None,
        Data::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() { None } else { Some(trimmed.to_string()) }
        }
        Data::Float(f) => Some(if f.fract() == 0.0 {
            format!("{:.0}", f)
        } else {
            f.to_string()
        }),
        Data::Int(i) => Some(i.to_string()),
        Data::Bool(b) => Some(b.to_string()),
        Data::DateTimeIso(s) => Some(s.clone()),
        _ => None,
    }
}

fn parse_csv(bytes: &[u8]) -> Result<Vec<SheetData>> {
    let text = String::from_utf8_lossy(bytes);
    let rows = text
        .lines()
        .map(split_csv_line)
        .filter(|row| !row.is_empty())
        .collect();
    Ok(vec![SheetData {
        name: "csv".to_string(),
        rows,
    }])
}

/// Split a CSV line on unquoted commas, honoring double-quoted fields.
fn split_csv_line(line: &str) -> Vec<Option<String>> {
    let mut cells = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for ch in line.chars() {
        match ch {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                cells.push(finish_cell(&mut current));
            }
            _ => current.push(ch),
        }
    }
    cells.push(finish_cell(&mut current));
    cells
}

fn finish_cell(buffer: &mut String) -> Option<String> {
    let cell = buffer.trim().trim_matches('"').trim().to_string();
    buffer.clear();
    if cell.is_empty() { None } else { Some(cell) }
}

/// Locate the header row and its depth/material/color columns within the
/// first rows of a sheet. A usable map needs at least depth and material.
fn map_columns(rows: &[Vec<Option<String>>]) -> Option<ColumnMap> {
    for (row_idx, row) in rows.iter().take(5).enumerate() {
        let mut depth: Option<(usize, Option<String>)> = None;
        let mut material = None;
        let mut color = None;

        for (col, cell) in row.iter().enumerate() {
            let Some(text) = cell else { continue };
            let lower = text.to_lowercase();
            if depth.is_none() && DEPTH_HEADERS.iter().any(|h| lower.contains(h)) {
                depth = Some((col, unit_from_header(&lower)));
            } else if material.is_none() && MATERIAL_HEADERS.iter().any(|h| lower.contains(h)) {
                material = Some(col);
            } else if color.is_none() && COLOR_HEADERS.iter().any(|h| lower.contains(h)) {
                color = Some(col);
            }
        }

        if let Some((depth_col, unit_hint)) = depth
            && material.is_some()
        {
            return Some(ColumnMap {
                header_row: row_idx,
                depth: depth_col,
                material,
                color,
                unit_hint,
            });
        }
    }
    None
}

fn unit_from_header(lower: &str) -> Option<String> {
    if lower.contains("(m)") || lower.contains("meter") || lower.contains("metre") {
        Some("m".to_string())
    } else if lower.contains("ft") || lower.contains("feet") {
        Some("ft".to_string())
    } else {
        None
    }
}

/// Read signal points through a column map.
fn extract_mapped(sheet: &SheetData, map: &ColumnMap, scanner: &SignalScanner) -> RawExtraction {
    let mut points = Vec::new();
    let mut depth_unit = map.unit_hint.clone();
    let mut trailing_range_end: Option<f64> = None;
    let mut cell_counts = Vec::new();

    for row in sheet.rows.iter().skip(map.header_row + 1) {
        cell_counts.push(row.iter().filter(|c| c.is_some()).count());

        let Some(Some(depth_cell)) = row.get(map.depth) else {
            continue;
        };
        let Some(token) = scanner.scan_depth(depth_cell) else {
            continue;
        };

        if depth_unit.is_none() {
            depth_unit = token.unit.clone();
        }
        trailing_range_end = token.end;

        let material_cell = map.material.and_then(|col| row.get(col)).and_then(|c| c.as_deref());
        let material = material_cell.and_then(|text| scanner.scan_material(text));

        // The color may live in its own column or inside the description
        // ("gray stiff clay").
        let color = map
            .color
            .and_then(|col| row.get(col))
            .and_then(|c| c.as_deref())
            .and_then(|text| scanner.scan_color(text))
            .or_else(|| material_cell.and_then(|text| scanner.scan_color(text)));

        points.push(SignalPoint {
            depth: token.value,
            material,
            color,
        });
    }

    // A trailing range row ("25 - 30 ft") pins the chart bottom with a
    // keyless terminator point.
    if let Some(end) = trailing_range_end {
        points.push(SignalPoint::new(end));
    }

    let consistent = !cell_counts.is_empty() && cell_counts.iter().all(|c| *c == cell_counts[0]);

    RawExtraction {
        points,
        depth_unit,
        structure: StructureHints {
            mapped_columns: map.mapped_columns(),
            text_length: sheet.text_length(),
            has_header_row: true,
            consistent_column_count: consistent,
            format_recognized: true,
            page_count: 0,
            sheet_name: Some(sheet.name.clone()),
        },
    }
}

/// Header-free scan: the first cell with a depth pattern anchors the row,
/// materials and colors come from any sibling cell.
fn relaxed_scan(sheet: &SheetData, scanner: &SignalScanner) -> RawExtraction {
    let mut points = Vec::new();
    let mut depth_unit: Option<String> = None;
    let mut trailing_range_end: Option<f64> = None;

    for row in &sheet.rows {
        let mut token: Option<DepthToken> = None;
        let mut depth_col = 0;
        for (col, cell) in row.iter().enumerate() {
            if let Some(text) = cell
                && let Some(found) = scanner.scan_depth_relaxed(text)
            {
                token = Some(found);
                depth_col = col;
                break;
            }
        }
        let Some(token) = token else { continue };

        if depth_unit.is_none() {
            depth_unit = token.unit.clone();
        }
        trailing_range_end = token.end;

        let mut material = None;
        let mut color = None;
        for (col, cell) in row.iter().enumerate() {
            let Some(text) = cell else { continue };
            if material.is_none() && col != depth_col {
                material = scanner.scan_material(text);
            }
            if color.is_none() {
                color = scanner.scan_color(text);
            }
        }

        points.push(SignalPoint {
            depth: token.value,
            material,
            color,
        });
    }

    if let Some(end) = trailing_range_end {
        points.push(SignalPoint::new(end));
    }

    RawExtraction {
        points,
        depth_unit,
        structure: StructureHints {
            mapped_columns: 0,
            text_length: sheet.text_length(),
            has_header_row: false,
            consistent_column_count: false,
            format_recognized: false,
            page_count: 0,
            sheet_name: Some(sheet.name.clone()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input<'a>(bytes: &'a [u8], name: &'a str) -> DocumentInput<'a> {
        DocumentInput { bytes, file_name: name }
    }

    fn primary() -> PrimarySheetStrategy {
        PrimarySheetStrategy {
            scanner: SignalScanner::default(),
        }
    }

    #[test]
    fn test_csv_with_headers() {
        let csv = b"Depth (ft),Material,Color\n0,Topsoil,brown\n2,Sandy Clay,\n8,Gravel,gray\n";
        let raw = primary().attempt(&input(csv, "bore.csv")).unwrap();

        assert_eq!(raw.points.len(), 3);
        assert_eq!(raw.depth_unit.as_deref(), Some("ft"));
        assert_eq!(raw.points[0].material.as_deref(), Some("Topsoil"));
        assert_eq!(raw.points[0].color.as_deref(), Some("brown"));
        assert_eq!(raw.points[1].material.as_deref(), Some("Sandy Clay"));
        assert_eq!(raw.points[1].color, None);
        assert_eq!(raw.structure.mapped_columns, 3);
        assert!(raw.structure.has_header_row);
        assert!(raw.structure.format_recognized);
    }

    #[test]
    fn test_csv_color_from_description() {
        let csv = b"Depth,Description\n0,gray stiff clay\n5,brown sand\n";
        let raw = primary().attempt(&input(csv, "bore.csv")).unwrap();
        assert_eq!(raw.points[0].material.as_deref(), Some("Stiff Clay"));
        assert_eq!(raw.points[0].color.as_deref(), Some("gray"));
        assert_eq!(raw.points[1].color.as_deref(), Some("brown"));
    }

    #[test]
    fn test_csv_range_rows_pin_chart_bottom() {
        let csv = b"Depth,Material\n0 - 5,Clay\n5 - 12,Sand\n";
        let raw = primary().attempt(&input(csv, "bore.csv")).unwrap();
        // Two keyed points plus the keyless terminator at 12.
        assert_eq!(raw.points.len(), 3);
        assert_eq!(raw.points[2].depth, 12.0);
        assert_eq!(raw.points[2].material, None);
        assert_eq!(raw.points[2].color, None);
    }

    #[test]
    fn test_unmatched_material_becomes_null() {
        let csv = b"Depth,Material\n0,Clay\n5,XK-42\n";
        let raw = primary().attempt(&input(csv, "bore.csv")).unwrap();
        assert_eq!(raw.points[0].material.as_deref(), Some("Clay"));
        assert_eq!(raw.points[1].material, None);
    }

    #[test]
    fn test_primary_fails_without_headers() {
        let csv = b"0,Clay\n5,Sand\n";
        let err = primary().attempt(&input(csv, "bore.csv")).unwrap_err();
        assert!(err.to_string().contains("No recognizable depth/material columns"));
    }

    #[test]
    fn test_relaxed_scan_recovers_headerless_chart() {
        let csv = b"0,Clay\n5,Sand\n10,Gravel\n";
        let strategy = RelaxedCellScanStrategy {
            scanner: SignalScanner::default(),
        };
        let raw = strategy.attempt(&input(csv, "bore.csv")).unwrap();
        assert_eq!(raw.points.len(), 3);
        assert_eq!(raw.points[2].material.as_deref(), Some("Gravel"));
        assert!(!raw.structure.has_header_row);
    }

    #[test]
    fn test_empty_csv_fails_readability() {
        let err = primary().attempt(&input(b"", "bore.csv")).unwrap_err();
        assert_eq!(err.issue(), Some(&ExtractionIssue::EmptyDocument));
    }

    #[test]
    fn test_headers_without_depth_rows_fails_readability() {
        let csv = b"Depth,Material\nnone,none\n";
        let err = primary().attempt(&input(csv, "bore.csv")).unwrap_err();
        assert_eq!(err.issue(), Some(&ExtractionIssue::NoDepthsFound));
    }

    #[test]
    fn test_depths_without_materials_fails_readability() {
        let csv = b"Depth,Material\n0,#####\n5,#####\n";
        let err = primary().attempt(&input(csv, "bore.csv")).unwrap_err();
        assert_eq!(err.issue(), Some(&ExtractionIssue::NoMaterialsFound));
    }

    #[test]
    fn test_corrupt_xlsx_is_unreadable() {
        let err = primary().attempt(&input(b"not a zip archive", "bore.xlsx")).unwrap_err();
        assert!(matches!(err, StrataError::Unreadable { .. }));
    }

    #[test]
    fn test_quoted_csv_fields() {
        let cells = split_csv_line("0,\"Sandy, wet Clay\",brown");
        assert_eq!(cells.len(), 3);
        assert_eq!(cells[1].as_deref(), Some("Sandy, wet Clay"));
    }

    #[test]
    fn test_meters_header_sets_unit_hint() {
        let csv = b"Depth (m),Soil Type\n0,Clay\n3,Sand\n";
        let raw = primary().attempt(&input(csv, "bore.csv")).unwrap();
        assert_eq!(raw.depth_unit.as_deref(), Some("m"));
    }
}
