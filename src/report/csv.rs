//! CSV report writer
//!
//! UTF-8, header first, CRLF line endings. Cells are quoted only when they
//! contain a delimiter, a quote or a line break; quotes are doubled.

use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::{QcError, QcResult};
use crate::observability::{log_event_with_fields, Event};

const LINE_END: &str = "\r\n";

/// Quote a cell if needed
pub fn escape_cell(cell: &str) -> String {
    if cell.contains([',', '"', '\r', '\n']) {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}

/// A report buffered in memory and written in one go
#[derive(Debug, Clone)]
pub struct CsvReport {
    path: PathBuf,
    header: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl CsvReport {
    pub fn new(path: impl Into<PathBuf>, header: &[&str]) -> Self {
        Self {
            path: path.into(),
            header: header.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    /// Report with a header built at runtime
    pub fn with_header(path: impl Into<PathBuf>, header: Vec<String>) -> Self {
        Self {
            path: path.into(),
            header,
            rows: Vec::new(),
        }
    }

    pub fn push<I, S>(&mut self, row: I)
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        self.rows.push(row.into_iter().map(|c| c.to_string()).collect());
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Render the whole document
    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in std::iter::once(&self.header).chain(self.rows.iter()) {
            let cells: Vec<String> = line.iter().map(|c| escape_cell(c)).collect();
            out.push_str(&cells.join(","));
            out.push_str(LINE_END);
        }
        out
    }

    /// Write the report, replacing any previous file
    pub fn write(&self) -> QcResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| QcError::report(self.path.display().to_string(), e))?;
            }
        }
        fs::write(&self.path, self.render())
            .map_err(|e| QcError::report(self.path.display().to_string(), e))?;
        log_event_with_fields(
            Event::ReportWritten,
            &[
                ("path", &self.path.display().to_string()),
                ("rows", &self.rows.len().to_string()),
            ],
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_escape_cell() {
        assert_eq!(escape_cell("plain"), "plain");
        assert_eq!(escape_cell("a,b"), "\"a,b\"");
        assert_eq!(escape_cell("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(escape_cell("two\nlines"), "\"two\nlines\"");
    }

    #[test]
    fn test_render_header_first() {
        let mut report = CsvReport::new("r.csv", &["Source File", "PARCELNO"]);
        report.push(["a.mdb", "12"]);
        report.push(vec!["b, c.mdb".to_string(), "7".to_string()]);
        assert_eq!(
            report.render(),
            "Source File,PARCELNO\r\na.mdb,12\r\n\"b, c.mdb\",7\r\n"
        );
        assert_eq!(report.row_count(), 2);
    }

    #[test]
    fn test_write_creates_parent_dirs() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested/out.csv");
        let report = CsvReport::new(&path, &["A"]);
        report.write().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "A\r\n");
    }

    #[test]
    fn test_write_failure_is_report_error() {
        let tmp = TempDir::new().unwrap();
        // A file where a directory is expected
        let blocker = tmp.path().join("blocker");
        fs::write(&blocker, "x").unwrap();
        let report = CsvReport::new(blocker.join("out.csv"), &["A"]);
        assert_eq!(report.write().unwrap_err().code(), "QC_REPORT_IO");
    }
}
