use std::path::Path;

use anyhow::{Context, Result};
use rust_xlsxwriter::{Format, Workbook};

use crate::config::OutputConfig;
use crate::core::ReportTable;

const XLSX_MAX_CELL_CHARS: usize = 32_767;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Xlsx,
    Csv,
    Json,
}

impl OutputFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "xlsx" => Some(Self::Xlsx),
            "csv" => Some(Self::Csv),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Xlsx => "xlsx",
            Self::Csv => "csv",
            Self::Json => "json",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct WriteSummary {
    pub truncated_cells: usize,
}

pub fn write(
    table: &ReportTable,
    path: &Path,
    format: OutputFormat,
    cfg: &OutputConfig,
) -> Result<WriteSummary> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("输出目录创建失败: {}", parent.display()))?;
    }

    let summary = match format {
        OutputFormat::Xlsx => write_xlsx(table, path, &cfg.sheet_name)?,
        OutputFormat::Csv => {
            write_csv(table, path)?;
            WriteSummary::default()
        }
        OutputFormat::Json => {
            let buf = serde_json::to_vec_pretty(table).context("表格 (JSON) 序列化失败")?;
            std::fs::write(path, buf)
                .with_context(|| format!("文件写入失败: {}", path.display()))?;
            WriteSummary::default()
        }
    };

    tracing::debug!(
        path = %path.display(),
        format = format.as_str(),
        rows = table.rows.len(),
        "表格已写出"
    );
    Ok(summary)
}

fn write_xlsx(table: &ReportTable, path: &Path, sheet_name: &str) -> Result<WriteSummary> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet
        .set_name(sheet_name)
        .with_context(|| format!("工作表名称不正确: {sheet_name}"))?;

    let bold = Format::new().set_bold();
    for (col, name) in table.header.iter().enumerate() {
        sheet.write_string_with_format(0, col_index(col)?, *name, &bold)?;
    }

    let mut summary = WriteSummary::default();
    for (i, row) in table.rows.iter().enumerate() {
        let row_idx = u32::try_from(i + 1).context("行数超出 Excel 上限")?;
        for (col, cell) in row.iter().enumerate() {
            let text = match truncate_chars(cell, XLSX_MAX_CELL_CHARS) {
                Some(short) => {
                    summary.truncated_cells += 1;
                    tracing::warn!(
                        row = i + 1,
                        column = table.header.get(col).copied().unwrap_or(""),
                        chars = cell.chars().count(),
                        "单元格超出 Excel 长度上限，已截断"
                    );
                    short
                }
                None => cell.as_str(),
            };
            sheet.write_string(row_idx, col_index(col)?, text)?;
        }
    }

    workbook
        .save(path)
        .with_context(|| format!("Excel 文件保存失败: {}", path.display()))?;
    Ok(summary)
}

fn write_csv(table: &ReportTable, path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)
        .with_context(|| format!("文件写入失败: {}", path.display()))?;
    wtr.write_record(table.header)?;
    for row in &table.rows {
        wtr.write_record(row)?;
    }
    wtr.flush()
        .with_context(|| format!("文件写入失败: {}", path.display()))?;
    Ok(())
}

fn col_index(col: usize) -> Result<u16> {
    u16::try_from(col).context("列数超出 Excel 上限")
}

fn truncate_chars(s: &str, max_chars: usize) -> Option<&str> {
    let (idx, _) = s.char_indices().nth(max_chars)?;
    Some(&s[..idx])
}
