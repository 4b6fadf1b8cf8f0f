use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;

use crate::core::{FindingRecord, ReportShape, SeverityLevel};
use crate::error::{ErrorKind, PageError, Stage};

#[derive(Debug)]
pub struct PageRecords {
    pub path: PathBuf,
    pub records: Vec<FindingRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportTable {
    pub shape: ReportShape,
    pub header: &'static [&'static str],
    pub rows: Vec<Vec<String>>,
}

impl ReportTable {
    pub fn empty(shape: ReportShape) -> Self {
        Self {
            shape,
            header: shape.columns(),
            rows: Vec::new(),
        }
    }

    /// Concatenates per-page record lists in the given page order. Each record is
    /// checked against the shape's schema before it becomes a row.
    pub fn merge(shape: ReportShape, pages: Vec<PageRecords>) -> Result<Self, PageError> {
        let mut table = Self::empty(shape);
        let expected = table.header.len();
        table.rows.reserve(pages.iter().map(|p| p.records.len()).sum());

        for page in pages {
            for record in page.records {
                if record.shape() != shape {
                    return Err(ErrorKind::SchemaMerge {
                        shape,
                        expected,
                        actual: record.shape().columns().len(),
                    }
                    .at(page.path, Stage::Merge));
                }
                let cells = record.into_cells();
                if cells.len() != expected {
                    return Err(ErrorKind::SchemaMerge {
                        shape,
                        expected,
                        actual: cells.len(),
                    }
                    .at(page.path, Stage::Merge));
                }
                table.rows.push(cells);
            }
        }

        Ok(table)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.header.iter().position(|h| *h == name)
    }

    pub fn severity_counts(&self) -> BTreeMap<SeverityLevel, usize> {
        let mut counts = BTreeMap::new();
        let Some(idx) = self.column_index("漏洞级别") else {
            return counts;
        };
        for row in &self.rows {
            if let Some(level) = row.get(idx).and_then(|c| SeverityLevel::from_label(c)) {
                *counts.entry(level).or_insert(0) += 1;
            }
        }
        counts
    }
}
