use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::core::ReportShape;
use crate::error::PageError;

#[derive(Debug, Serialize)]
struct ConvertLog {
    schema_version: &'static str,
    tool_version: String,
    command: &'static str,
    started_at: String,
    finished_at: String,
    status: &'static str,
    input: String,
    output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    shape: Option<ReportShape>,
    pages: usize,
    rows: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    errors: Vec<ConvertLogError>,
}

#[derive(Debug, Serialize)]
struct ConvertLogError {
    path: String,
    stage: String,
    error: String,
}

#[derive(Debug)]
pub struct ConvertRun<'a> {
    pub input: &'a Path,
    pub output: &'a Path,
    pub bundle_root: Option<&'a Path>,
    pub started_at: OffsetDateTime,
    pub finished_at: OffsetDateTime,
    pub shape: Option<ReportShape>,
    pub pages: usize,
    pub rows: usize,
    pub failures: Vec<&'a PageError>,
    pub fatal: Option<String>,
}

pub fn logs_dir(home_dir: &Path) -> PathBuf {
    crate::config::config_dir(home_dir).join("logs")
}

pub fn write_convert_log(home_dir: &Path, run: &ConvertRun<'_>) -> Result<PathBuf> {
    let dir = logs_dir(home_dir);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("日志目录创建失败: {}", dir.display()))?;

    let pid = std::process::id();
    let ts = run.finished_at.unix_timestamp_nanos();
    let path = dir.join(format!("convert-{pid}-{ts}.json"));

    let mut errors: Vec<ConvertLogError> = run
        .failures
        .iter()
        .map(|f| ConvertLogError {
            path: page_path(&f.path, run.bundle_root, home_dir),
            stage: f.stage.to_string(),
            error: f.kind.to_string(),
        })
        .collect();
    if let Some(fatal) = &run.fatal {
        errors.push(ConvertLogError {
            path: mask_home(run.input, home_dir),
            stage: "run".to_string(),
            error: fatal.clone(),
        });
    }

    let log = ConvertLog {
        schema_version: "1.0",
        tool_version: env!("CARGO_PKG_VERSION").to_string(),
        command: "convert",
        started_at: format_time(run.started_at),
        finished_at: format_time(run.finished_at),
        status: if errors.is_empty() { "ok" } else { "error" },
        input: mask_home(run.input, home_dir),
        output: mask_home(run.output, home_dir),
        shape: run.shape,
        pages: run.pages,
        rows: run.rows,
        errors,
    };

    let buf = serde_json::to_vec_pretty(&log).context("日志 (JSON) 序列化失败")?;
    std::fs::write(&path, buf)
        .with_context(|| format!("日志写入失败: {}", path.display()))?;
    Ok(path)
}

fn format_time(t: OffsetDateTime) -> String {
    t.format(&Rfc3339).unwrap_or_else(|_| "unknown".to_string())
}

fn page_path(path: &Path, bundle_root: Option<&Path>, home_dir: &Path) -> String {
    match bundle_root.and_then(|root| path.strip_prefix(root).ok()) {
        Some(rel) => rel.display().to_string(),
        None => mask_home(path, home_dir),
    }
}

fn mask_home(path: &Path, home_dir: &Path) -> String {
    match path.strip_prefix(home_dir) {
        Ok(rel) if rel.as_os_str().is_empty() => "~".to_string(),
        Ok(rel) => format!("~/{}", rel.display()),
        Err(_) => path.display().to_string(),
    }
}
