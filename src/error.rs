use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::core::ReportShape;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Load,
    Classify,
    Extract,
    Merge,
}

impl Stage {
    pub const fn as_str(self) -> &'static str {
        match self {
            Stage::Load => "load",
            Stage::Classify => "classify",
            Stage::Extract => "extract",
            Stage::Merge => "merge",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum ErrorKind {
    #[error("无法读取文件: {0}")]
    Io(#[source] std::io::Error),

    #[error("页面格式错误: {0}")]
    MalformedPage(String),

    #[error("不支持的报表模板: {template}（章节标题: {}）", .titles.join(", "))]
    UnsupportedShape {
        template: String,
        titles: Vec<String>,
    },

    #[error("页面属于 {found} 报表，与索引页判定的 {expected} 报表不一致")]
    ShapeMismatch {
        expected: ReportShape,
        found: ReportShape,
    },

    #[error("未知的漏洞级别: {0:?}（应为 low|middle|high）")]
    UnknownSeverityLevel(String),

    #[error("未知的危险插件标记: {0}（应为 true|false）")]
    UnknownFlagValue(String),

    #[error("报表结构不符合预期（{pointer}）: {message}")]
    Schema { pointer: String, message: String },

    #[error("记录与表头不一致: {shape} 表应为 {expected} 列，实际 {actual} 列")]
    SchemaMerge {
        shape: ReportShape,
        expected: usize,
        actual: usize,
    },
}

impl ErrorKind {
    pub fn schema(pointer: impl Into<String>, message: impl fmt::Display) -> Self {
        ErrorKind::Schema {
            pointer: pointer.into(),
            message: message.to_string(),
        }
    }

    pub fn at(self, path: impl Into<PathBuf>, stage: Stage) -> PageError {
        PageError {
            path: path.into(),
            stage,
            kind: self,
        }
    }
}

#[derive(Debug, Error)]
#[error("[{stage}] {}", .path.display())]
pub struct PageError {
    pub path: PathBuf,
    pub stage: Stage,
    #[source]
    pub kind: ErrorKind,
}

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("索引页处理失败")]
    Index(#[source] PageError),

    #[error("{} 个报表页面处理失败（共 {total} 个）", .failures.len())]
    Pages {
        shape: ReportShape,
        failures: Vec<PageError>,
        total: usize,
    },
}

impl ConvertError {
    pub fn is_unsupported_shape(&self) -> bool {
        matches!(
            self,
            ConvertError::Index(PageError {
                kind: ErrorKind::UnsupportedShape { .. },
                ..
            })
        )
    }

    /// Shape detected from the index page, when detection got that far.
    pub fn shape(&self) -> Option<ReportShape> {
        match self {
            ConvertError::Index(_) => None,
            ConvertError::Pages { shape, .. } => Some(*shape),
        }
    }

    pub fn page_errors(&self) -> Vec<&PageError> {
        match self {
            ConvertError::Index(err) => vec![err],
            ConvertError::Pages { failures, .. } => failures.iter().collect(),
        }
    }
}
