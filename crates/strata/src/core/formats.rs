//! File type detection from extensions.

use crate::types::{SourceFormat, SupportedFileTypes};

pub const EXCEL_EXTENSIONS: &[&str] = &["xlsx", "xls", "csv"];
pub const PDF_EXTENSIONS: &[&str] = &["pdf"];

/// Lowercased extension of a file name, without the dot.
pub fn file_extension(file_name: &str) -> Option<String> {
    let name = file_name.rsplit(['/', '\\']).next().unwrap_or(file_name);
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_lowercase())
}

/// Detect the parser family for a file name. `None` for unsupported types.
pub fn detect_file_type(file_name: &str) -> Option<SourceFormat> {
    let ext = file_extension(file_name)?;
    if EXCEL_EXTENSIONS.contains(&ext.as_str()) {
        Some(SourceFormat::Excel)
    } else if PDF_EXTENSIONS.contains(&ext.as_str()) {
        Some(SourceFormat::Pdf)
    } else {
        None
    }
}

pub fn is_file_supported(file_name: &str) -> bool {
    detect_file_type(file_name).is_some()
}

/// Supported extensions grouped by family.
pub fn supported_file_types() -> SupportedFileTypes {
    SupportedFileTypes {
        excel: EXCEL_EXTENSIONS.iter().map(|e| format!(".{}", e)).collect(),
        pdf: PDF_EXTENSIONS.iter().map(|e| format!(".{}", e)).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_known_extensions() {
        assert_eq!(detect_file_type("bore.xlsx"), Some(SourceFormat::Excel));
        assert_eq!(detect_file_type("BORE.XLS"), Some(SourceFormat::Excel));
        assert_eq!(detect_file_type("log.csv"), Some(SourceFormat::Excel));
        assert_eq!(detect_file_type("chart.pdf"), Some(SourceFormat::Pdf));
    }

    #[test]
    fn test_unknown_extension_is_none() {
        assert_eq!(detect_file_type("report.docx"), None);
        assert_eq!(detect_file_type("no_extension"), None);
        assert_eq!(detect_file_type(".hidden"), None);
    }

    #[test]
    fn test_extension_from_path() {
        assert_eq!(file_extension("/tmp/charts/bore.PDF").as_deref(), Some("pdf"));
        assert_eq!(file_extension(r"C:\charts\bore.xlsx").as_deref(), Some("xlsx"));
    }

    #[test]
    fn test_is_file_supported() {
        assert!(is_file_supported("a.csv"));
        assert!(!is_file_supported("a.txt"));
    }

    #[test]
    fn test_supported_file_types_grouping() {
        let types = supported_file_types();
        assert_eq!(types.excel, vec![".xlsx", ".xls", ".csv"]);
        assert_eq!(types.pdf, vec![".pdf"]);
    }
}
