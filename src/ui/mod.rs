use anyhow::Error;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::{self, Write};
use unicode_width::UnicodeWidthChar;

use crate::core::{ReportShape, SeverityLevel};
use crate::engine::Inspection;
use crate::error::ConvertError;

#[derive(Debug, Clone)]
pub struct UiConfig {
    pub color: bool,
    pub quiet: bool,
    pub verbose: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConvertSummary {
    pub input: String,
    pub output: String,
    pub format: &'static str,
    pub shape: ReportShape,
    pub pages: usize,
    pub rows: usize,
    pub severity: BTreeMap<SeverityLevel, usize>,
    #[serde(skip_serializing_if = "is_zero")]
    pub truncated_cells: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_path: Option<String>,
}

fn is_zero(n: &usize) -> bool {
    *n == 0
}

pub fn eprintln_error(err: &Error) {
    let mut stderr = io::stderr().lock();
    let _ = writeln!(stderr, "错误:");
    let _ = writeln!(stderr, "  {err}");

    let mut causes = err.chain().skip(1).peekable();
    if causes.peek().is_some() {
        let _ = writeln!(stderr, "原因:");
        for cause in causes {
            let _ = writeln!(stderr, "  - {cause}");
        }
    }

    if let Some(ConvertError::Pages { failures, .. }) =
        err.chain().find_map(|c| c.downcast_ref::<ConvertError>())
    {
        let _ = writeln!(stderr, "失败的页面:");
        for failure in failures {
            let _ = writeln!(stderr, "  - {failure}");
            let mut source: Option<&dyn std::error::Error> = Some(&failure.kind);
            while let Some(cause) = source {
                let _ = writeln!(stderr, "      {cause}");
                source = cause.source();
            }
        }
    }

    let _ = writeln!(stderr, "下一步:");
    let _ = writeln!(stderr, "  - 加上 `--verbose` 重新运行可查看详细日志");
    let _ = writeln!(
        stderr,
        "  - 可用的命令与选项请参阅 `rsasconv --help`"
    );
}

pub fn print_convert_summary(summary: &ConvertSummary, cfg: &UiConfig) {
    if cfg.quiet {
        return;
    }

    let mut out = io::stdout().lock();
    let _ = writeln!(out, "转换完成: {}", summary.output);
    let _ = writeln!(out, "- 报表类型: {}", summary.shape.label());
    let _ = writeln!(out, "- 页面数: {}", summary.pages);
    let _ = writeln!(out, "- 记录数: {}", summary.rows);
    if summary.rows > 0 {
        let _ = writeln!(out);
        print_severity_table(&mut out, &summary.severity, cfg.color);
    }
    if summary.truncated_cells > 0 {
        let _ = writeln!(
            out,
            "注意: {} 个单元格超出 Excel 长度上限，已截断",
            summary.truncated_cells
        );
    }
    if cfg.verbose {
        let _ = writeln!(out, "- 输入: {}", summary.input);
        if let Some(log_path) = &summary.log_path {
            let _ = writeln!(out, "- 运行日志: {log_path}");
        }
    }
}

pub fn print_inspect(info: &Inspection, cfg: &UiConfig) {
    if cfg.quiet {
        return;
    }

    let mut out = io::stdout().lock();
    let _ = writeln!(out, "报表类型: {}（{}）", info.shape.label(), info.shape);
    let _ = writeln!(
        out,
        "扫描模板: {}",
        info.template.as_deref().unwrap_or("(未知)")
    );
    let _ = writeln!(out, "页面数: {}", info.pages);
    if cfg.verbose {
        let _ = writeln!(out, "章节:");
        for title in &info.titles {
            let _ = writeln!(out, "  - {title}");
        }
    }
}

fn print_severity_table(out: &mut dyn Write, counts: &BTreeMap<SeverityLevel, usize>, color: bool) {
    let label_level = "漏洞级别";
    let label_count = "数量";

    let level_w = visible_width_ansi(label_level);
    let count_w = SeverityLevel::ALL
        .iter()
        .map(|l| counts.get(l).copied().unwrap_or(0).to_string().len())
        .max()
        .unwrap_or(0)
        .max(visible_width_ansi(label_count));

    let _ = writeln!(
        out,
        "{}  {}",
        pad_end_display(label_level, level_w),
        pad_start_display(label_count, count_w)
    );
    let _ = writeln!(out, "{}  {}", "-".repeat(level_w), "-".repeat(count_w));
    for level in SeverityLevel::ALL {
        let n = counts.get(&level).copied().unwrap_or(0);
        let _ = writeln!(
            out,
            "{}  {}",
            pad_end_display(&format_level(level, color), level_w),
            pad_start_display(&n.to_string(), count_w)
        );
    }
}

fn format_level(level: SeverityLevel, color: bool) -> String {
    let s = level.label();
    if !color {
        return s.to_string();
    }

    let code = match level {
        SeverityLevel::Low => "32",
        SeverityLevel::Middle => "33",
        SeverityLevel::High => "31",
    };
    format!("\x1b[{code}m{s}\x1b[0m")
}

fn pad_end_display(s: &str, width: usize) -> String {
    let w = visible_width_ansi(s);
    if w >= width {
        return s.to_string();
    }
    format!("{s}{}", " ".repeat(width - w))
}

fn pad_start_display(s: &str, width: usize) -> String {
    let w = visible_width_ansi(s);
    if w >= width {
        return s.to_string();
    }
    format!("{}{}", " ".repeat(width - w), s)
}

fn visible_width_ansi(s: &str) -> usize {
    let mut width: usize = 0;
    let mut chars = s.chars();
    while let Some(ch) = chars.next() {
        if ch == '\x1b' {
            for ch2 in chars.by_ref() {
                if ch2 == 'm' {
                    break;
                }
            }
            continue;
        }
        width = width.saturating_add(UnicodeWidthChar::width(ch).unwrap_or(0));
    }
    width
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visible_width_counts_wide_chars_and_skips_ansi() {
        assert_eq!(visible_width_ansi("漏洞级别"), 8);
        assert_eq!(visible_width_ansi("\x1b[31m高\x1b[0m"), 2);
        assert_eq!(visible_width_ansi("abc"), 3);
    }

    #[test]
    fn colored_level_pads_to_plain_width() {
        let plain = pad_end_display(&format_level(SeverityLevel::High, false), 8);
        let colored = pad_end_display(&format_level(SeverityLevel::High, true), 8);
        assert_eq!(visible_width_ansi(&plain), 8);
        assert_eq!(visible_width_ansi(&colored), 8);
    }

    #[test]
    fn severity_table_lists_every_level_high_first() {
        let mut counts = BTreeMap::new();
        counts.insert(SeverityLevel::Low, 12);
        counts.insert(SeverityLevel::High, 3);

        let mut buf = Vec::new();
        print_severity_table(&mut buf, &counts, false);
        let text = String::from_utf8(buf).expect("utf8");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[2].starts_with('高') && lines[2].ends_with(" 3"), "{text}");
        assert!(lines[3].starts_with('中') && lines[3].ends_with(" 0"), "{text}");
        assert!(lines[4].starts_with('低') && lines[4].ends_with("12"), "{text}");
    }
}
