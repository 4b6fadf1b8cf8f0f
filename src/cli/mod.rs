use std::io;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use serde::Serialize;
use time::OffsetDateTime;

use crate::bundle::OpenedBundle;
use crate::config::EffectiveConfig;
use crate::engine::{Engine, EngineOptions};
use crate::output::OutputFormat;
use crate::ui::{ConvertSummary, UiConfig};

#[derive(Debug, Parser)]
#[command(
    name = "rsasconv",
    version,
    about = "将 RSAS 漏洞扫描报表（HTML 压缩包）转换为 Excel / CSV / JSON 表格"
)]
pub struct Cli {
    #[arg(long, global = true)]
    pub json: bool,
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,
    #[arg(long, global = true)]
    pub verbose: bool,
    #[arg(long, global = true)]
    pub quiet: bool,
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    Convert(ConvertArgs),
    Inspect(InspectArgs),
    Completion(CompletionArgs),
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
pub struct ConvertArgs {
    #[arg(short, long)]
    pub input: PathBuf,
    #[arg(short, long)]
    pub output: PathBuf,
    #[arg(long)]
    pub workers: Option<usize>,
}

#[derive(Debug, Args)]
pub struct InspectArgs {
    #[arg(short, long)]
    pub input: PathBuf,
}

#[derive(Debug, Args)]
pub struct CompletionArgs {
    pub shell: String,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[arg(long)]
    pub show: bool,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.quiet);

    let home_dir = crate::config::home_dir().map_err(crate::exit::invalid_args_err)?;

    let env_config_path = std::env::var_os("RSASCONV_CONFIG").map(PathBuf::from);
    let cfg = crate::config::load(
        cli.config.as_deref().or(env_config_path.as_deref()),
        &home_dir,
    )
    .map_err(crate::exit::invalid_args_err)?;

    let ui_cfg = UiConfig {
        color: io::stdout().is_terminal() && !cli.no_color,
        quiet: cli.quiet,
        verbose: cli.verbose,
    };
    let show_progress = io::stderr().is_terminal() && !cli.quiet && !cli.json;

    match cli.command {
        Commands::Convert(args) => {
            let summary = convert(&args, &cfg, &home_dir, show_progress)?;
            if cli.json {
                write_json(&summary)?;
            } else {
                crate::ui::print_convert_summary(&summary, &ui_cfg);
            }
        }
        Commands::Inspect(args) => {
            let opened = open_input(&args.input, &cfg)?;
            let engine = Engine::new(EngineOptions {
                workers: 1,
                show_progress: false,
            });
            let info = engine
                .inspect(&opened.bundle)
                .with_context(|| format!("报表识别失败: {}", args.input.display()))?;
            if cli.json {
                write_json(&info)?;
            } else {
                crate::ui::print_inspect(&info, &ui_cfg);
            }
        }
        Commands::Completion(args) => {
            let shell = parse_shell(&args.shell)?;
            let mut cmd = Cli::command();
            let mut out = io::stdout().lock();
            clap_complete::generate(shell, &mut cmd, "rsasconv", &mut out);
        }
        Commands::Config(args) => {
            if args.show {
                if cli.json {
                    write_json(&cfg)?;
                } else {
                    println!("{}", toml::to_string_pretty(&cfg)?);
                }
            } else if !ui_cfg.quiet {
                eprintln!("config: 请使用 `rsasconv config --show`");
            }
        }
    }

    Ok(())
}

fn convert(
    args: &ConvertArgs,
    cfg: &EffectiveConfig,
    home_dir: &Path,
    show_progress: bool,
) -> Result<ConvertSummary> {
    let format = OutputFormat::from_path(&args.output).ok_or_else(|| {
        crate::exit::invalid_args(format!(
            "不支持的输出格式: {}（请使用 .xlsx / .csv / .json）",
            args.output.display()
        ))
    })?;
    if args.workers == Some(0) {
        return Err(crate::exit::invalid_args("--workers 必须大于 0"));
    }
    let workers = args.workers.unwrap_or_else(|| cfg.worker_count());

    let started_at = OffsetDateTime::now_utc();
    let opened = open_input(&args.input, cfg)?;
    let engine = Engine::new(EngineOptions {
        workers,
        show_progress,
    });
    tracing::debug!(
        workers,
        pages = opened.bundle.pages.len(),
        extracted = ?opened.extracted_entries,
        "开始转换"
    );

    let table = match engine.convert(&opened.bundle) {
        Ok(table) => table,
        Err(err) => {
            let run = crate::logs::ConvertRun {
                shape: err.shape(),
                failures: err.page_errors(),
                ..new_run(args, &opened, started_at)
            };
            write_run_log(cfg, home_dir, &run);
            return Err(anyhow::Error::from(err)
                .context(format!("报表转换失败: {}", args.input.display())));
        }
    };

    let written = crate::output::write(&table, &args.output, format, &cfg.output)
        .with_context(|| format!("输出写入失败: {}", args.output.display()));
    let mut run = crate::logs::ConvertRun {
        shape: Some(table.shape),
        rows: table.rows.len(),
        ..new_run(args, &opened, started_at)
    };
    let written = match written {
        Ok(written) => written,
        Err(err) => {
            run.fatal = Some(format!("{err:#}"));
            write_run_log(cfg, home_dir, &run);
            return Err(crate::exit::write_failed_err(err));
        }
    };
    let log_path = write_run_log(cfg, home_dir, &run);

    Ok(ConvertSummary {
        input: args.input.display().to_string(),
        output: args.output.display().to_string(),
        format: format.as_str(),
        shape: table.shape,
        pages: opened.bundle.pages.len(),
        rows: table.rows.len(),
        severity: table.severity_counts(),
        truncated_cells: written.truncated_cells,
        log_path: log_path.map(|p| p.display().to_string()),
    })
}

fn new_run<'a>(
    args: &'a ConvertArgs,
    opened: &'a OpenedBundle,
    started_at: OffsetDateTime,
) -> crate::logs::ConvertRun<'a> {
    crate::logs::ConvertRun {
        input: &args.input,
        output: &args.output,
        bundle_root: Some(&opened.bundle.root),
        started_at,
        finished_at: OffsetDateTime::now_utc(),
        shape: None,
        pages: opened.bundle.pages.len(),
        rows: 0,
        failures: vec![],
        fatal: None,
    }
}

fn open_input(input: &Path, cfg: &EffectiveConfig) -> Result<OpenedBundle> {
    if !input.exists() {
        return Err(crate::exit::invalid_args(format!(
            "输入不存在: {}",
            input.display()
        )));
    }
    crate::bundle::open(input, &cfg.bundle, cfg.run.tmp_folder.as_deref())
        .with_context(|| format!("报表包打开失败: {}", input.display()))
}

fn write_run_log(
    cfg: &EffectiveConfig,
    home_dir: &Path,
    run: &crate::logs::ConvertRun<'_>,
) -> Option<PathBuf> {
    if !cfg.logs.enabled {
        return None;
    }
    match crate::logs::write_convert_log(home_dir, run) {
        Ok(path) => Some(path),
        Err(err) => {
            tracing::warn!(error = %format!("{err:#}"), "运行日志写入失败");
            None
        }
    }
}

fn init_tracing(verbose: bool, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    let default_level = if verbose {
        "debug"
    } else if quiet {
        "error"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn write_json<T: Serialize>(value: &T) -> Result<()> {
    use std::io::Write;

    let buf = serde_json::to_vec_pretty(value)?;

    let mut stdout = io::stdout().lock();
    match stdout.write_all(&buf) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::BrokenPipe => return Ok(()),
        Err(err) => return Err(err.into()),
    }
    match stdout.write_all(b"\n") {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        Err(err) => Err(err.into()),
    }
}

fn parse_shell(s: &str) -> Result<clap_complete::Shell> {
    let s = s.trim().to_ascii_lowercase();
    match s.as_str() {
        "bash" => Ok(clap_complete::Shell::Bash),
        "zsh" => Ok(clap_complete::Shell::Zsh),
        "fish" => Ok(clap_complete::Shell::Fish),
        other => Err(crate::exit::invalid_args(format!(
            "不支持的 shell: {other}（请指定 bash|zsh|fish）"
        ))),
    }
}
