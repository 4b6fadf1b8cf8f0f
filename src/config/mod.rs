use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

pub const SUPPORTED_RSAS_VERSIONS: [&str; 1] = ["V6.0R04F04SP06"];

const MAX_SHEET_NAME_CHARS: usize = 31;

#[derive(Debug, Clone, Serialize)]
pub struct EffectiveConfig {
    pub rsas_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_path: Option<String>,
    pub bundle: BundleConfig,
    pub run: RunConfig,
    pub output: OutputConfig,
    pub logs: LogsConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct BundleConfig {
    pub htmls_folder: String,
    pub html_name_template: String,
    pub index_html: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunConfig {
    pub workers: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tmp_folder: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OutputConfig {
    pub sheet_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogsConfig {
    pub enabled: bool,
}

impl Default for BundleConfig {
    fn default() -> Self {
        Self {
            htmls_folder: "host".to_string(),
            html_name_template: "*.html".to_string(),
            index_html: "index.html".to_string(),
        }
    }
}

impl Default for EffectiveConfig {
    fn default() -> Self {
        Self {
            rsas_version: SUPPORTED_RSAS_VERSIONS[0].to_string(),
            config_path: None,
            bundle: BundleConfig::default(),
            run: RunConfig {
                workers: 0,
                tmp_folder: None,
            },
            output: OutputConfig {
                sheet_name: "漏洞列表".to_string(),
            },
            logs: LogsConfig { enabled: true },
        }
    }
}

impl EffectiveConfig {
    pub fn worker_count(&self) -> usize {
        if self.run.workers > 0 {
            return self.run.workers;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    rsas_version: Option<String>,
    bundle: Option<RawBundleConfig>,
    run: Option<RawRunConfig>,
    output: Option<RawOutputConfig>,
    logs: Option<RawLogsConfig>,
}

#[derive(Debug, Deserialize)]
struct RawBundleConfig {
    htmls_folder: Option<String>,
    html_name_template: Option<String>,
    index_html: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawRunConfig {
    workers: Option<usize>,
    tmp_folder: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawOutputConfig {
    sheet_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawLogsConfig {
    enabled: Option<bool>,
}

pub fn home_dir() -> Result<PathBuf> {
    std::env::var_os("HOME")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .ok_or_else(|| anyhow!("环境变量 HOME 未设置"))
}

pub fn config_dir(home_dir: &Path) -> PathBuf {
    home_dir.join(".config/rsasconv")
}

pub fn default_config_path(home_dir: &Path) -> PathBuf {
    config_dir(home_dir).join("config.toml")
}

pub fn load(config_path: Option<&Path>, home_dir: &Path) -> Result<EffectiveConfig> {
    let mut cfg = EffectiveConfig::default();

    let path = config_path
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| default_config_path(home_dir));

    if path.exists() {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("配置文件读取失败: {}", path.display()))?;
        let raw: RawConfig = toml::from_str(&s).context("配置文件 (TOML) 解析失败")?;
        apply_raw_config(&mut cfg, raw);
        cfg.config_path = Some(path.display().to_string());
    } else if config_path.is_some() {
        return Err(anyhow!("配置文件不存在: {}", path.display()));
    }

    apply_env_overrides(&mut cfg)?;
    validate(&cfg)?;

    Ok(cfg)
}

fn apply_raw_config(cfg: &mut EffectiveConfig, raw: RawConfig) {
    if let Some(version) = raw.rsas_version {
        cfg.rsas_version = version;
    }

    if let Some(bundle) = raw.bundle {
        if let Some(htmls_folder) = bundle.htmls_folder {
            cfg.bundle.htmls_folder = htmls_folder;
        }
        if let Some(html_name_template) = bundle.html_name_template {
            cfg.bundle.html_name_template = html_name_template;
        }
        if let Some(index_html) = bundle.index_html {
            cfg.bundle.index_html = index_html;
        }
    }

    if let Some(run) = raw.run {
        if let Some(workers) = run.workers {
            cfg.run.workers = workers;
        }
        if let Some(tmp_folder) = run.tmp_folder {
            cfg.run.tmp_folder = non_empty_path(&tmp_folder);
        }
    }

    if let Some(output) = raw.output {
        if let Some(sheet_name) = output.sheet_name {
            cfg.output.sheet_name = sheet_name;
        }
    }

    if let Some(logs) = raw.logs {
        if let Some(enabled) = logs.enabled {
            cfg.logs.enabled = enabled;
        }
    }
}

fn apply_env_overrides(cfg: &mut EffectiveConfig) -> Result<()> {
    if let Ok(v) = std::env::var("RSASCONV_RSAS_VERSION") {
        let v = v.trim();
        if !v.is_empty() {
            cfg.rsas_version = v.to_string();
        }
    }
    if let Ok(v) = std::env::var("RSASCONV_BUNDLE_HTMLS_FOLDER") {
        cfg.bundle.htmls_folder = v.trim().to_string();
    }
    if let Ok(v) = std::env::var("RSASCONV_BUNDLE_HTML_NAME_TEMPLATE") {
        let v = v.trim();
        if !v.is_empty() {
            cfg.bundle.html_name_template = v.to_string();
        }
    }
    if let Ok(v) = std::env::var("RSASCONV_BUNDLE_INDEX_HTML") {
        let v = v.trim();
        if !v.is_empty() {
            cfg.bundle.index_html = v.to_string();
        }
    }
    if let Ok(v) = std::env::var("RSASCONV_RUN_WORKERS") {
        cfg.run.workers = v
            .trim()
            .parse::<usize>()
            .with_context(|| "RSASCONV_RUN_WORKERS")?;
    }
    if let Ok(v) = std::env::var("RSASCONV_RUN_TMP_FOLDER") {
        cfg.run.tmp_folder = non_empty_path(&v);
    }
    if let Ok(v) = std::env::var("RSASCONV_OUTPUT_SHEET_NAME") {
        let v = v.trim();
        if !v.is_empty() {
            cfg.output.sheet_name = v.to_string();
        }
    }
    if let Ok(v) = std::env::var("RSASCONV_LOGS_ENABLED") {
        cfg.logs.enabled = parse_bool(&v).with_context(|| "RSASCONV_LOGS_ENABLED")?;
    }

    Ok(())
}

pub fn validate(cfg: &EffectiveConfig) -> Result<()> {
    if !SUPPORTED_RSAS_VERSIONS.contains(&cfg.rsas_version.as_str()) {
        return Err(anyhow!(
            "不支持的 RSAS 报表版本: {}（支持: {}）",
            cfg.rsas_version,
            SUPPORTED_RSAS_VERSIONS.join(", ")
        ));
    }
    crate::bundle::validate_name_template(&cfg.bundle.html_name_template)?;
    if cfg.bundle.index_html.trim().is_empty() {
        return Err(anyhow!("bundle.index_html 不能为空"));
    }

    let sheet = cfg.output.sheet_name.as_str();
    if sheet.trim().is_empty() || sheet.chars().count() > MAX_SHEET_NAME_CHARS {
        return Err(anyhow!(
            "工作表名称不正确: {sheet:?}（1..={MAX_SHEET_NAME_CHARS} 个字符）"
        ));
    }
    if let Some(c) = sheet.chars().find(|c| "[]:*?/\\".contains(*c)) {
        return Err(anyhow!("工作表名称包含非法字符 {c:?}: {sheet}"));
    }

    Ok(())
}

fn non_empty_path(s: &str) -> Option<PathBuf> {
    let s = s.trim();
    if s.is_empty() {
        None
    } else {
        Some(PathBuf::from(s))
    }
}

fn parse_bool(s: &str) -> Result<bool> {
    let s = s.trim().to_ascii_lowercase();
    match s.as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(anyhow!(
            "布尔值不正确: {s}（可用 true|false|1|0|yes|no|on|off）"
        )),
    }
}
